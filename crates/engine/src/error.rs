use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;

impl EngineError {
    pub fn vehicle_not_found(vehicle_id: &str) -> Self {
        Self::NotFound(format!("vehicle '{vehicle_id}' not found"))
    }

    pub fn race_not_found(race: impl std::fmt::Display) -> Self {
        Self::NotFound(format!("race '{race}' not found"))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, EngineError::NotFound(_))
    }

    pub fn is_invalid_state(&self) -> bool {
        matches!(self, EngineError::InvalidState(_))
    }

    /// Short classification used in bulk operation outcomes.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::InvalidState(_) => "invalid_state",
            Self::MalformedInput(_) => "malformed_input",
            Self::UpstreamUnavailable(_) => "upstream_unavailable",
            Self::Io(_) | Self::Serialization(_) => "internal",
        }
    }
}
