use engine::RaceService;
use ingest::{MessageLog, TelemetryArchive};
use std::sync::Arc;

/// Shared handles for every request handler.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<RaceService>,
    pub log: Arc<MessageLog>,
    pub archive: Arc<dyn TelemetryArchive>,
}

impl AppState {
    pub fn new(
        service: Arc<RaceService>,
        log: Arc<MessageLog>,
        archive: Arc<dyn TelemetryArchive>,
    ) -> Self {
        Self {
            service,
            log,
            archive,
        }
    }
}
