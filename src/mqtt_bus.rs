use std::sync::Arc;
use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use tokio::time::sleep;

use crate::config::MqttSettings;
use crate::dispatcher::MessageBus;
use crate::error::PublishError;
use crate::health::HealthSignal;

const REQUEST_CAPACITY: usize = 64;
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// MQTT implementation of the outbound bus.
#[derive(Clone)]
pub struct MqttBus {
    client: AsyncClient,
    retain: bool,
}

impl MqttBus {
    /// Creates the client and spawns the task driving its connection.
    pub fn connect(
        settings: &MqttSettings,
        retain: bool,
        health: Arc<dyn HealthSignal>,
    ) -> Self {
        let mut options = MqttOptions::new(&settings.client_id, &settings.host, settings.port);
        options.set_keep_alive(Duration::from_secs(30));
        if let Some((user, pass)) = &settings.credentials {
            options.set_credentials(user, pass);
        }

        tracing::info!(
            "Connecting to MQTT broker {}:{} as {}",
            settings.host,
            settings.port,
            settings.client_id
        );
        let (client, eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);
        tokio::spawn(drive_connection(eventloop, health));

        Self::from_client(client, retain)
    }

    pub fn from_client(client: AsyncClient, retain: bool) -> Self {
        Self { client, retain }
    }
}

impl MessageBus for MqttBus {
    fn publish(&self, topic: &str, payload: String) -> Result<(), PublishError> {
        self.client
            .try_publish(topic, QoS::AtLeastOnce, self.retain, payload)
            .map_err(|e| PublishError::Rejected {
                topic: topic.to_string(),
                reason: e.to_string(),
            })
    }
}

/// Polls the event loop forever. rumqttc reconnects on the next poll after an error.
async fn drive_connection(mut eventloop: EventLoop, health: Arc<dyn HealthSignal>) {
    let mut connected = false;
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                tracing::info!("MQTT connected");
                connected = true;
                health.healthy();
            }
            Ok(_) => {}
            Err(e) => {
                if connected {
                    tracing::warn!("MQTT disconnected: {e}");
                } else {
                    tracing::warn!("MQTT connection failed: {e}");
                }
                connected = false;
                health.unhealthy();
                sleep(RECONNECT_DELAY).await;
            }
        }
    }
}
