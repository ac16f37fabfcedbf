//! MQTT event publishing.
//!
//! `EventPublisher` is the seam between the decode pipeline and the
//! transport: the receive loop enqueues each event and never waits on
//! network delivery. `MqttPublisher` drives a rumqttc client from a
//! background pump task and flushes queued traffic on shutdown.

use std::time::Duration;

use airtrack_core::types::Event;
use anyhow::{Context, Result};
use async_trait::async_trait;
use rumqttc::{AsyncClient, Event as MqttEvent, MqttOptions, Outgoing, Packet, QoS};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Publish capability the receive loop depends on.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Enqueue one event for delivery. Fire-and-forget: implementations
    /// must not block on network delivery, and delivery guarantees belong
    /// to the transport.
    async fn publish(&self, event: &Event) -> Result<()>;
}

// ---------------------------------------------------------------------------
// MqttPublisher
// ---------------------------------------------------------------------------

/// rumqttc-backed publisher with a fixed topic, resolved once at startup.
pub struct MqttPublisher {
    client: AsyncClient,
    topic: String,
    pump: JoinHandle<()>,
    token: CancellationToken,
}

impl MqttPublisher {
    /// Create the client and start the background event-loop pump.
    ///
    /// The pump reconnects with a fixed backoff on transport errors; a
    /// broker outage never stops the relay.
    pub fn connect(host: &str, port: u16, topic: &str) -> Self {
        let client_id = format!("airtrack-relay-{}", std::process::id());
        let mut options = MqttOptions::new(client_id, host, port);
        options.set_keep_alive(Duration::from_secs(30));
        let (client, mut eventloop) = AsyncClient::new(options, 64);

        let token = CancellationToken::new();
        let pump_token = token.clone();
        let pump = tokio::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(MqttEvent::Incoming(Packet::ConnAck(_))) => {
                        info!("connected to MQTT broker");
                    }
                    Ok(MqttEvent::Outgoing(Outgoing::Disconnect)) => {
                        // Queued publishes ahead of the disconnect have
                        // been written to the transport
                        debug!("MQTT disconnect flushed");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) if pump_token.is_cancelled() => {
                        debug!(error = %e, "MQTT event loop stopped");
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "MQTT connection error, retrying");
                        tokio::time::sleep(Duration::from_secs(2)).await;
                    }
                }
            }
        });

        MqttPublisher {
            client,
            topic: topic.to_string(),
            pump,
            token,
        }
    }

    /// Drain queued publishes, disconnect, and stop the pump task.
    ///
    /// Called on every exit path so the transport's resources are
    /// released before the process ends.
    pub async fn shutdown(self) {
        self.token.cancel();
        if let Err(e) = self.client.disconnect().await {
            warn!(error = %e, "MQTT disconnect request failed");
        }
        if let Err(e) = self.pump.await {
            warn!(error = %e, "MQTT pump task join failed");
        }
    }
}

#[async_trait]
impl EventPublisher for MqttPublisher {
    async fn publish(&self, event: &Event) -> Result<()> {
        let payload = serde_json::to_vec(event).context("serializing event")?;
        self.client
            .publish(self.topic.as_str(), QoS::AtMostOnce, false, payload)
            .await
            .context("enqueueing event for publish")?;
        Ok(())
    }
}
