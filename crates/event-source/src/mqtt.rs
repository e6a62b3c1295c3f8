//! MQTT Event Source
//!
//! A spawned session task owns the rumqttc event loop and drives it without
//! interruption, so the CONNECT/CONNACK handshake and TLS setup can take as
//! long as the broker needs. Payloads are forwarded over a channel; the
//! control loop only ever waits on that channel, which is safe to abandon
//! at any point.

use crate::{EventSource, SourceError, SourceEvent};
use rumqttc::{
    AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Packet, QoS,
    TlsConfiguration, Transport,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Payloads buffered between the session task and the control loop
const PAYLOAD_QUEUE: usize = 16;

/// Fixed header (1 + 4 length bytes), topic length prefix and packet id
const PUBLISH_OVERHEAD_BYTES: usize = 9;

/// Client certificate material for mutual TLS brokers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsFiles {
    /// CA certificate (PEM)
    pub ca_path: PathBuf,
    /// Device certificate (PEM)
    pub cert_path: Option<PathBuf>,
    /// Device private key (PEM)
    pub key_path: Option<PathBuf>,
}

/// MQTT source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    /// Broker host name
    pub broker_host: String,
    /// Broker port
    pub broker_port: u16,
    /// Client id; a random one is generated when unset
    pub client_id: Option<String>,
    /// Topic filter carrying detection events
    pub topic: String,
    /// Keep-alive interval (seconds)
    pub keep_alive_secs: u64,
    /// Delay before reconnecting after a transport error (ms)
    pub reconnect_delay_ms: u64,
    /// TLS material, plain TCP when unset
    pub tls: Option<TlsFiles>,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker_host: "localhost".to_string(),
            broker_port: 1883,
            client_id: None,
            topic: "detections/people".to_string(),
            keep_alive_secs: 30,
            reconnect_delay_ms: 100,
            tls: None,
        }
    }
}

impl MqttConfig {
    fn client_id(&self) -> String {
        self.client_id.clone().unwrap_or_else(|| {
            let id = Uuid::new_v4().simple().to_string();
            format!("presence-indicator-{}", &id[..8])
        })
    }
}

/// Largest incoming packet accepted for a given decoder limit.
///
/// Leaves room for payloads up to twice the decoder limit plus the publish
/// headers, so an oversized event still reaches the decoder and is
/// reported there instead of closing the session.
pub fn incoming_packet_limit(max_payload_bytes: usize, topic: &str) -> usize {
    max_payload_bytes * 2 + topic.len() + PUBLISH_OVERHEAD_BYTES
}

/// Detection events delivered over MQTT
pub struct MqttSource {
    payloads: mpsc::Receiver<Vec<u8>>,
    connected: Arc<AtomicBool>,
    session: JoinHandle<()>,
}

impl MqttSource {
    /// Build the client and start the session task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: &MqttConfig, max_payload_bytes: usize) -> Result<Self, SourceError> {
        if config.topic.is_empty() {
            return Err(SourceError::Config("topic must not be empty".to_string()));
        }

        let client_id = config.client_id();
        let packet_limit = incoming_packet_limit(max_payload_bytes, &config.topic);
        let mut options = MqttOptions::new(&client_id, &config.broker_host, config.broker_port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));
        options.set_max_packet_size(packet_limit, packet_limit);

        if let Some(tls) = &config.tls {
            options.set_transport(Transport::tls_with_config(load_tls(tls)?));
        }

        let (client, eventloop) = AsyncClient::new(options, 10);
        let (payload_tx, payloads) = mpsc::channel(PAYLOAD_QUEUE);
        let connected = Arc::new(AtomicBool::new(false));

        let session = Session {
            client,
            eventloop,
            topic: config.topic.clone(),
            connected: connected.clone(),
            reconnect_delay: Duration::from_millis(config.reconnect_delay_ms),
            payloads: payload_tx,
        };
        let session = tokio::spawn(session.run());

        info!(
            "MQTT source {} for {}:{} topic {} (packet limit {} bytes)",
            client_id, config.broker_host, config.broker_port, config.topic, packet_limit
        );

        Ok(Self {
            payloads,
            connected,
            session,
        })
    }
}

impl Drop for MqttSource {
    fn drop(&mut self) {
        self.session.abort();
    }
}

impl EventSource for MqttSource {
    async fn poll(&mut self, timeout: Duration) -> SourceEvent {
        let deadline = Instant::now() + timeout;

        match tokio::time::timeout_at(deadline, self.payloads.recv()).await {
            Ok(Some(bytes)) => SourceEvent::Payload(bytes),
            Ok(None) => {
                // Session task has ended; keep the poll bounded
                self.connected.store(false, Ordering::Relaxed);
                tokio::time::sleep_until(deadline).await;
                SourceEvent::Idle
            }
            Err(_) => SourceEvent::Idle,
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}

/// Owner of the rumqttc event loop
struct Session {
    client: AsyncClient,
    eventloop: EventLoop,
    topic: String,
    connected: Arc<AtomicBool>,
    reconnect_delay: Duration,
    payloads: mpsc::Sender<Vec<u8>>,
}

impl Session {
    async fn run(mut self) {
        loop {
            match self.eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => self.on_connected(ack.code),
                Ok(Event::Incoming(Packet::SubAck(ack))) => {
                    info!("Subscribed to {} ({:?})", self.topic, ack.return_codes);
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    if !topic_matches(&publish.topic, &self.topic) {
                        debug!("Ignoring publish on {}", publish.topic);
                        continue;
                    }
                    if self.payloads.send(publish.payload.to_vec()).await.is_err() {
                        debug!("Event source dropped, stopping MQTT session");
                        return;
                    }
                }
                Ok(Event::Incoming(Packet::Disconnect)) => {
                    warn!("Broker closed the session");
                    self.connected.store(false, Ordering::Relaxed);
                }
                Ok(_) => {}
                Err(e) => {
                    if self.connected.swap(false, Ordering::Relaxed) {
                        warn!("MQTT session lost: {}", e);
                    } else {
                        debug!("MQTT connect failed: {}", e);
                    }
                    // The next poll reconnects
                    tokio::time::sleep(self.reconnect_delay).await;
                }
            }
        }
    }

    fn on_connected(&mut self, code: ConnectReturnCode) {
        if code != ConnectReturnCode::Success {
            warn!("Broker refused connection: {:?}", code);
            return;
        }

        self.connected.store(true, Ordering::Relaxed);
        info!("Connected to MQTT broker");

        // Resubscribe on every session, the broker may have dropped state
        match self.client.try_subscribe(&self.topic, QoS::AtLeastOnce) {
            Ok(()) => debug!("Subscribe requested for {}", self.topic),
            Err(e) => error!("Subscribe request for {} failed: {}", self.topic, e),
        }
    }
}

fn load_tls(files: &TlsFiles) -> Result<TlsConfiguration, SourceError> {
    let read = |path: &PathBuf| {
        std::fs::read(path).map_err(|source| SourceError::Credentials {
            path: path.display().to_string(),
            source,
        })
    };

    let ca = read(&files.ca_path)?;
    let client_auth = match (&files.cert_path, &files.key_path) {
        (Some(cert), Some(key)) => Some((read(cert)?, read(key)?)),
        (None, None) => None,
        _ => {
            return Err(SourceError::Config(
                "cert_path and key_path must be set together".to_string(),
            ))
        }
    };

    Ok(TlsConfiguration::Simple {
        ca,
        alpn: None,
        client_auth,
    })
}

/// MQTT topic filter matching with `+` and `#` wildcards
pub fn topic_matches(topic: &str, filter: &str) -> bool {
    let mut topic_levels = topic.split('/');
    let mut filter_levels = filter.split('/');

    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => {}
            (Some(f), Some(t)) if f == t => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}
