use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, Incoming, MqttOptions, QoS, SubscribeReasonCode};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::config::Config;
use crate::eq3;
use crate::error::{Error, Result};

use super::session::{Commands, Listeners, Session, SessionState, Transport};
use super::topics::Topics;

impl Transport for AsyncClient {
    fn publish(&self, topic: &str, payload: &str) -> Result<()> {
        self.try_publish(topic, QoS::AtMostOnce, false, payload.as_bytes().to_vec())
            .map_err(|e| Error::Transport(e.to_string()))
    }

    fn subscribe(&self, topic: &str) -> Result<()> {
        self.try_subscribe(topic, QoS::AtMostOnce)
            .map_err(|e| Error::Transport(e.to_string()))
    }
}

/// Runs a [`Session`] on top of a rumqttc connection to the broker.
pub struct MqttClient {
    eventloop: EventLoop,
    session: Session<AsyncClient>,
    reconnect_delay: Duration,
}

impl MqttClient {
    pub fn new(config: &Config) -> Self {
        let mut mqttopts = MqttOptions::new(
            &config.mqtt.client_id,
            &config.mqtt.broker_host,
            config.mqtt.broker_port,
        );
        mqttopts.set_keep_alive(Duration::from_secs(config.mqtt.keep_alive_secs));

        if let (Some(user), Some(pass)) = (&config.mqtt.username, &config.mqtt.password) {
            mqttopts.set_credentials(user, pass);
        }

        debug!(
            "Connecting to MQTT broker mqtt://{}:{}",
            config.mqtt.broker_host, config.mqtt.broker_port
        );
        let (client, eventloop) = AsyncClient::new(mqttopts, 100);
        let session = Session::new(client, Topics::new(&config.mqtt.mqtt_id));

        Self {
            eventloop,
            session,
            reconnect_delay: Duration::from_secs(config.mqtt.reconnect_delay_secs),
        }
    }

    /// A handle for issuing thermostat commands while [`run`](Self::run) owns the connection.
    pub fn commands(&self) -> Commands<AsyncClient> {
        self.session.commands().clone()
    }

    /// Register for events. The returned handle stays valid after [`run`](Self::run) starts.
    pub fn listeners(&self) -> Listeners {
        self.session.listeners()
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<eq3::Event> {
        self.session.subscribe()
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// Drive the connection forever.
    ///
    /// A failed poll is logged and the loop polls again after the configured
    /// pause, which makes rumqttc reconnect; the next ConnAck resubscribes
    /// and rescans.
    pub async fn run(mut self) {
        self.session.on_connecting();
        loop {
            match self.eventloop.poll().await {
                Ok(Event::Incoming(incoming)) => self.handle_incoming(incoming),
                Ok(Event::Outgoing(_)) => {}
                Err(e) => {
                    self.session.on_connection_error(&e.to_string());
                    tokio::time::sleep(self.reconnect_delay).await;
                    self.session.on_connecting();
                    continue;
                }
            }
            if self.session.queued() > 0 {
                self.session.flush_outbox();
            }
        }
    }

    fn handle_incoming(&mut self, incoming: Incoming) {
        match incoming {
            Incoming::ConnAck(_) => self.session.on_connected(),
            Incoming::SubAck(suback) => {
                for code in suback.return_codes {
                    let granted = matches!(code, SubscribeReasonCode::Success(_));
                    self.session.on_subscribe_ack(granted);
                }
            }
            Incoming::Publish(publish) => {
                if let Err(e) = self.session.on_message(&publish.topic, &publish.payload) {
                    warn!("Dropping message: {}", e);
                }
            }
            _ => {}
        }
    }
}
