//! MQTT client adapter.
//!
//! Implements [`MqttPort`].  One [`connect`](MqttPort::connect) call is one
//! attempt; the node's retry loop calls it repeatedly until the session is
//! up or the budget is spent.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `EspMqttClient` with an event callback that
//!   tracks the session state in an atomic flag.
//! - **all other targets**: in-memory broker simulation that records every
//!   publish for host-side tests.

use log::{info, warn};

use crate::app::ports::MqttPort;
use crate::error::CommsError;

#[cfg(target_os = "espidf")]
use std::sync::Arc;
#[cfg(target_os = "espidf")]
use std::sync::atomic::{AtomicBool, Ordering};

#[cfg(target_os = "espidf")]
use esp_idf_svc::mqtt::client::{EspMqttClient, EventPayload, MqttClientConfiguration, QoS};

/// Broker URLs are built into a fixed buffer: `mqtt://` + host + `:` + port.
#[cfg(target_os = "espidf")]
type BrokerUrl = heapless::String<64>;

/// A publish seen by the simulated broker.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimPublish {
    pub topic: String,
    pub payload: Vec<u8>,
}

pub struct MqttAdapter {
    #[cfg(target_os = "espidf")]
    client: Option<EspMqttClient<'static>>,
    #[cfg(target_os = "espidf")]
    connected: Arc<AtomicBool>,

    #[cfg(not(target_os = "espidf"))]
    connected: bool,
    #[cfg(not(target_os = "espidf"))]
    sim_broker_up: bool,
    #[cfg(not(target_os = "espidf"))]
    sim_failing_publishes: u32,
    #[cfg(not(target_os = "espidf"))]
    sim_published: Vec<SimPublish>,
}

impl Default for MqttAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl MqttAdapter {
    pub fn new() -> Self {
        Self {
            #[cfg(target_os = "espidf")]
            client: None,
            #[cfg(target_os = "espidf")]
            connected: Arc::new(AtomicBool::new(false)),

            #[cfg(not(target_os = "espidf"))]
            connected: false,
            #[cfg(not(target_os = "espidf"))]
            sim_broker_up: true,
            #[cfg(not(target_os = "espidf"))]
            sim_failing_publishes: 0,
            #[cfg(not(target_os = "espidf"))]
            sim_published: Vec::new(),
        }
    }

    // ── Simulation controls ───────────────────────────────────

    /// Simulation: bring the broker up or down.  Going down drops the session.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_set_broker_up(&mut self, up: bool) {
        self.sim_broker_up = up;
        if !up {
            self.connected = false;
        }
    }

    /// Simulation: make the next `count` publishes fail.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_fail_publishes(&mut self, count: u32) {
        self.sim_failing_publishes = count;
    }

    /// Simulation: every publish the broker accepted, oldest first.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_published(&self) -> &[SimPublish] {
        &self.sim_published
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_connect(&mut self, server: &str, port: u16, client_id: &str) -> Result<(), CommsError> {
        use core::fmt::Write;

        if self.client.is_none() {
            let mut url = BrokerUrl::new();
            write!(url, "mqtt://{}:{}", server, port).map_err(|_| CommsError::MqttConnectFailed)?;

            let conf = MqttClientConfiguration {
                client_id: Some(client_id),
                ..Default::default()
            };
            let flag = Arc::clone(&self.connected);
            let client = EspMqttClient::new_cb(url.as_str(), &conf, move |event| {
                match event.payload() {
                    EventPayload::Connected(_) => flag.store(true, Ordering::Release),
                    EventPayload::Disconnected => flag.store(false, Ordering::Release),
                    _ => {}
                }
            })
            .map_err(|e| {
                warn!("MQTT(espidf): client init failed ({})", e);
                CommsError::MqttConnectFailed
            })?;
            self.client = Some(client);
        }

        // The client connects in the background; report whether the
        // session is up yet so the caller's retry loop can wait on it.
        if self.connected.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(CommsError::MqttConnectFailed)
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_connect(&mut self, server: &str, port: u16, _client_id: &str) -> Result<(), CommsError> {
        if !self.sim_broker_up {
            return Err(CommsError::MqttConnectFailed);
        }
        info!("MQTT(sim): session open with {}:{}", server, port);
        self.connected = true;
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), CommsError> {
        let client = self.client.as_mut().ok_or(CommsError::MqttDisconnected)?;
        client
            .publish(topic, QoS::AtMostOnce, false, payload)
            .map(|_| ())
            .map_err(|e| {
                warn!("MQTT(espidf): publish to '{}' failed ({})", topic, e);
                CommsError::MqttPublishFailed
            })
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), CommsError> {
        if self.sim_failing_publishes > 0 {
            self.sim_failing_publishes -= 1;
            return Err(CommsError::MqttPublishFailed);
        }
        self.sim_published.push(SimPublish {
            topic: topic.to_owned(),
            payload: payload.to_vec(),
        });
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_is_connected(&self) -> bool {
        self.connected
    }
}

impl MqttPort for MqttAdapter {
    fn connect(&mut self, server: &str, port: u16, client_id: &str) -> Result<(), CommsError> {
        self.platform_connect(server, port, client_id)?;
        info!("MQTT: connected to {}:{} as '{}'", server, port, client_id);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.platform_is_connected()
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), CommsError> {
        if !self.platform_is_connected() {
            warn!("MQTT: publish to '{}' dropped, not connected", topic);
            return Err(CommsError::MqttDisconnected);
        }
        self.platform_publish(topic, payload)
    }
}
