//! MQTT transport built on `rumqttc`.
//!
//! Each `connect` builds a new client and spawns a driver task that polls the
//! event loop and forwards publishes to the inbound channel. Every connection
//! carries its own connected flag, so a dying link never clears the state of
//! its replacement. The driver stops on the first connection error and leaves
//! reconnection to the reconnector.

use async_trait::async_trait;
use engine::EngineError;
use engine::command::CommandPublisher;
use parking_lot::Mutex;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{IngestError, Result};
use crate::traits::{InboundMessage, Transport};

const REQUEST_CAPACITY: usize = 64;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const PUBLISH_TIMEOUT: Duration = Duration::from_secs(5);

/// Last-known connection options.
#[derive(Debug, Clone)]
pub struct MqttSettings {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub keep_alive: Duration,
}

impl MqttSettings {
    fn options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(&self.client_id, &self.host, self.port);
        options.set_keep_alive(self.keep_alive);
        options.set_clean_session(true);
        if let Some(username) = &self.username {
            options.set_credentials(username, self.password.clone().unwrap_or_default());
        }
        options
    }
}

struct Connection {
    client: AsyncClient,
    driver: JoinHandle<()>,
    stop: CancellationToken,
    connected: Arc<AtomicBool>,
}

impl Connection {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Stops the driver without waiting on the event loop.
    fn close(self) -> AsyncClient {
        self.connected.store(false, Ordering::Relaxed);
        self.stop.cancel();
        self.driver.abort();
        self.client
    }
}

pub struct MqttTransport {
    settings: MqttSettings,
    inbound: mpsc::Sender<InboundMessage>,
    connection: Mutex<Option<Connection>>,
}

impl MqttTransport {
    pub fn new(settings: MqttSettings, inbound: mpsc::Sender<InboundMessage>) -> Self {
        Self {
            settings,
            inbound,
            connection: Mutex::new(None),
        }
    }

    fn client(&self) -> Result<AsyncClient> {
        self.connection
            .lock()
            .as_ref()
            .filter(|c| c.is_connected())
            .map(|c| c.client.clone())
            .ok_or(IngestError::NotConnected)
    }
}

#[async_trait]
impl Transport for MqttTransport {
    fn is_connected(&self) -> bool {
        self.connection
            .lock()
            .as_ref()
            .is_some_and(Connection::is_connected)
    }

    async fn connect(&self) -> Result<()> {
        let old = self.connection.lock().take();
        if let Some(old) = old {
            old.close();
        }

        let (client, eventloop) = AsyncClient::new(self.settings.options(), REQUEST_CAPACITY);
        let (ready_tx, ready_rx) = oneshot::channel();
        let stop = CancellationToken::new();
        let connected = Arc::new(AtomicBool::new(false));
        let driver = tokio::spawn(drive(
            eventloop,
            self.inbound.clone(),
            connected.clone(),
            ready_tx,
            stop.clone(),
        ));
        *self.connection.lock() = Some(Connection {
            client,
            driver,
            stop,
            connected,
        });

        match tokio::time::timeout(CONNECT_TIMEOUT, ready_rx).await {
            Ok(Ok(Ok(()))) => {
                info!(
                    host = %self.settings.host,
                    port = self.settings.port,
                    client_id = %self.settings.client_id,
                    "Connected to MQTT broker"
                );
                Ok(())
            }
            Ok(Ok(Err(reason))) => Err(IngestError::ConnectionError(reason)),
            Ok(Err(_)) => Err(IngestError::ConnectionError(
                "event loop stopped before the broker answered".to_string(),
            )),
            Err(_) => Err(IngestError::ConnectionError(format!(
                "no answer from {}:{} within {:?}",
                self.settings.host, self.settings.port, CONNECT_TIMEOUT
            ))),
        }
    }

    async fn subscribe(&self, filters: &[String]) -> Result<()> {
        let client = self.client()?;
        for filter in filters {
            client.subscribe(filter.as_str(), QoS::AtLeastOnce).await?;
            debug!(filter = %filter, "Subscribed");
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        let Some(connection) = self.connection.lock().take() else {
            return Ok(());
        };

        // The event loop is gone by now; this only fails fast.
        if let Err(e) = connection.close().try_disconnect() {
            debug!(error = %e, "Disconnect request not delivered");
        }
        info!("Disconnected from MQTT broker");
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        let client = self.client()?;
        let request = client.publish(topic, QoS::AtLeastOnce, false, payload);
        match tokio::time::timeout(PUBLISH_TIMEOUT, request).await {
            Ok(sent) => Ok(sent?),
            Err(_) => Err(IngestError::ConnectionError(format!(
                "publish to {topic} not queued within {PUBLISH_TIMEOUT:?}"
            ))),
        }
    }
}

#[async_trait]
impl CommandPublisher for MqttTransport {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> engine::Result<()> {
        Transport::publish(self, topic, payload)
            .await
            .map_err(EngineError::from)
    }
}

async fn drive(
    mut eventloop: EventLoop,
    inbound: mpsc::Sender<InboundMessage>,
    connected: Arc<AtomicBool>,
    ready: oneshot::Sender<std::result::Result<(), String>>,
    stop: CancellationToken,
) {
    let mut ready = Some(ready);

    loop {
        let event = tokio::select! {
            _ = stop.cancelled() => break,
            event = eventloop.poll() => event,
        };

        match event {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                connected.store(true, Ordering::Relaxed);
                if let Some(tx) = ready.take() {
                    let _ = tx.send(Ok(()));
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let message = InboundMessage::new(publish.topic, publish.payload.to_vec());
                let sent = tokio::select! {
                    _ = stop.cancelled() => break,
                    sent = inbound.send(message) => sent,
                };
                if sent.is_err() {
                    debug!("Inbound channel closed, stopping MQTT driver");
                    break;
                }
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                warn!("Broker closed the connection");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "MQTT connection error");
                if let Some(tx) = ready.take() {
                    let _ = tx.send(Err(e.to_string()));
                }
                break;
            }
        }
    }

    connected.store(false, Ordering::Relaxed);
}
