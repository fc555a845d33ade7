pub mod points;
pub mod race;
pub mod telemetry;
pub mod vehicle;
