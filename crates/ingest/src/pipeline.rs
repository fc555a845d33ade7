//! Per-channel ingestion pipeline.
//!
//! A dispatcher routes inbound messages to one worker per telemetry channel,
//! so ordering holds within a channel and channels progress independently.
//! Each message is logged, decoded, applied to the race service and archived.
//! Failures are logged and the message is dropped.

use engine::{EngineError, RaceService};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::decoder::{self, Channel, Reading, Telemetry};
use crate::error::{IngestError, Result};
use crate::message_log::MessageLog;
use crate::traits::{InboundMessage, TelemetryArchive, TelemetryPoint};

const WORKER_QUEUE_CAPACITY: usize = 256;

pub struct TelemetryPipeline {
    service: Arc<RaceService>,
    log: Arc<MessageLog>,
    archive: Arc<dyn TelemetryArchive>,
}

impl TelemetryPipeline {
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

    /// Processes one message end to end.
    pub async fn handle(&self, message: InboundMessage) -> Result<()> {
        self.service.activity().touch();
        self.log.record(&message);

        let telemetry = decoder::decode(&message.topic, &message.payload)?;
        debug!(vehicle_id = %telemetry.vehicle_id, reading = ?telemetry.reading, "Decoded telemetry");

        let applied = self.apply(&telemetry).await;

        let point = TelemetryPoint {
            measurement: telemetry.reading.channel().measurement(),
            race: self.service.store().current_race(&telemetry.vehicle_id),
            vehicle_id: telemetry.vehicle_id,
            fields: telemetry.reading.fields(),
            recorded_at: message.received_at,
        };
        if let Err(e) = self.archive.record(&point).await {
            warn!(
                archive = self.archive.name(),
                vehicle_id = %point.vehicle_id,
                error = %e,
                "Failed to archive telemetry"
            );
        }

        applied.map_err(IngestError::from)
    }

    async fn apply(&self, telemetry: &Telemetry) -> engine::Result<()> {
        let vehicle_id = telemetry.vehicle_id.as_str();
        match &telemetry.reading {
            Reading::Power(reading) => {
                self.service.ingest_power(vehicle_id, reading)?;
            }
            Reading::Position(reading) => {
                self.service.ingest_position(vehicle_id, reading).await?;
            }
            Reading::Acceleration(reading) => {
                self.service.ingest_acceleration(vehicle_id, reading)?;
            }
            Reading::Suspension(event) => {
                self.service.ingest_suspension(vehicle_id, event)?;
            }
        }
        Ok(())
    }

    /// Routes inbound messages to per-channel workers until cancelled or the
    /// inbound channel closes.
    pub async fn run(
        self: Arc<Self>,
        mut inbound: mpsc::Receiver<InboundMessage>,
        shutdown: CancellationToken,
    ) {
        let mut senders = HashMap::new();
        let mut workers = Vec::new();
        for channel in Channel::ALL {
            let (tx, rx) = mpsc::channel(WORKER_QUEUE_CAPACITY);
            senders.insert(channel, tx);
            workers.push(tokio::spawn(self.clone().work(channel, rx)));
        }
        info!(workers = workers.len(), "Telemetry pipeline started");

        loop {
            let message = tokio::select! {
                _ = shutdown.cancelled() => break,
                message = inbound.recv() => match message {
                    Some(message) => message,
                    None => break,
                },
            };

            let Some(channel) = Channel::from_topic(&message.topic) else {
                self.service.activity().touch();
                self.log.record(&message);
                warn!(topic = %message.topic, "Message on unknown channel dropped");
                continue;
            };
            if let Some(tx) = senders.get(&channel)
                && tx.send(message).await.is_err()
            {
                error!(channel = channel.measurement(), "Channel worker is gone");
            }
        }

        drop(senders);
        for worker in workers {
            if let Err(e) = worker.await {
                error!(error = %e, "Channel worker panicked");
            }
        }
        info!("Telemetry pipeline stopped");
    }

    async fn work(self: Arc<Self>, channel: Channel, mut rx: mpsc::Receiver<InboundMessage>) {
        while let Some(message) = rx.recv().await {
            let topic = message.topic.clone();
            if let Err(e) = self.handle(message).await {
                report(channel, &topic, &e);
            }
        }
    }
}

fn report(channel: Channel, topic: &str, err: &IngestError) {
    let channel = channel.measurement();
    match err {
        IngestError::Engine(EngineError::InvalidState(_)) => {
            debug!(channel, topic, error = %err, "Telemetry not applied")
        }
        IngestError::Engine(EngineError::NotFound(_)) => {
            warn!(channel, topic, error = %err, "Telemetry for unknown vehicle or race")
        }
        IngestError::MalformedTopic(_)
        | IngestError::MalformedPayload(_)
        | IngestError::ParseError(_) => {
            warn!(channel, topic, error = %err, "Malformed telemetry dropped")
        }
        _ => error!(channel, topic, error = %err, "Telemetry processing failed"),
    }
}
