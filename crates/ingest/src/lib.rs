pub mod archive;
pub mod decoder;
pub mod error;
pub mod message_log;
pub mod pipeline;
pub mod resilience;
pub mod traits;
pub mod transport;

pub use error::{IngestError, Result};
pub use message_log::MessageLog;
pub use pipeline::TelemetryPipeline;
pub use traits::{InboundMessage, TelemetryArchive, TelemetryPoint, Transport};
