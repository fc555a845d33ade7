pub mod activity;
pub mod command;
pub mod dto;
pub mod error;
pub mod governor;
pub mod leaderboard;
pub mod live;
pub mod models;
pub mod service;
pub mod snapshot;
pub mod store;

pub use error::{EngineError, Result};
pub use service::RaceService;
