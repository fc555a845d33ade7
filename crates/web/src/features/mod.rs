pub mod data;
pub mod leaderboard;
pub mod live;
pub mod points;
pub mod races;
pub mod settings;
pub mod transport;
pub mod vehicles;
