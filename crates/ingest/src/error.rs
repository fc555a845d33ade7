use engine::EngineError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, IngestError>;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Malformed topic: {0}")]
    MalformedTopic(String),

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Failed to parse JSON: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("MQTT client error: {0}")]
    ClientError(#[from] rumqttc::ClientError),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Transport is not connected")]
    NotConnected,
}

impl From<IngestError> for EngineError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::Engine(e) => e,
            IngestError::MalformedTopic(_)
            | IngestError::MalformedPayload(_)
            | IngestError::ParseError(_) => EngineError::MalformedInput(err.to_string()),
            _ => EngineError::UpstreamUnavailable(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_failures_classify_as_malformed_input() {
        let err: EngineError = IngestError::MalformedTopic("PSU_OUT".to_string()).into();
        assert!(matches!(err, EngineError::MalformedInput(_)));
    }

    #[test]
    fn test_transport_failures_classify_as_upstream_unavailable() {
        let err: EngineError = IngestError::NotConnected.into();
        assert!(matches!(err, EngineError::UpstreamUnavailable(_)));
    }

    #[test]
    fn test_engine_errors_pass_through() {
        let err: EngineError = IngestError::Engine(EngineError::vehicle_not_found("3")).into();
        assert!(err.is_not_found());
    }
}
