pub mod hub;
pub mod sessions;

pub use hub::LiveDataHub;
pub use sessions::{DEFAULT_QUEUE_CAPACITY, SessionId, SessionRegistry};
