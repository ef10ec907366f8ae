//! Mock adapters for integration tests.
//!
//! Every mock records what the node did to it so tests can assert on the
//! full interaction history without a radio, a broker or flash.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::net::Ipv4Addr;

use embedded_hal::delay::DelayNs;
use pinwatch::app::events::AppEvent;
use pinwatch::app::ports::{
    ConfigError, ConfigPort, ConnectivityError, ConnectivityPort, EventSink, MqttPort, PinReader,
};
use pinwatch::config::{ConfigField, DeviceConfig};
use pinwatch::error::CommsError;
use pinwatch::pins::PinId;
use pinwatch::throttle::ReadKind;

pub fn field(s: &str) -> ConfigField {
    let mut f = ConfigField::new();
    f.push_str(s).unwrap();
    f
}

pub fn provisioned_config() -> DeviceConfig {
    DeviceConfig {
        ssid: field("HomeNetwork"),
        password: field("password1"),
        mqtt_server: field("192.168.1.10"),
        mqtt_port: 1883,
    }
}

// ── MockPins ──────────────────────────────────────────────────

/// Pin levels set by the test; unknown pins read `0`.
#[derive(Default)]
pub struct MockPins {
    levels: HashMap<PinId, i32>,
    pub reads: Vec<(PinId, ReadKind)>,
}

#[allow(dead_code)]
impl MockPins {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, pin: PinId, value: i32) {
        self.levels.insert(pin, value);
    }
}

impl PinReader for MockPins {
    fn read(&mut self, pin: PinId, kind: ReadKind) -> i32 {
        self.reads.push((pin, kind));
        self.levels.get(&pin).copied().unwrap_or(0)
    }
}

// ── MockWifi ──────────────────────────────────────────────────

pub struct MockWifi {
    pub reachable: bool,
    pub connected: bool,
    pub ap_active: bool,
    pub ap_fails: bool,
    pub attempts: u32,
    pub credentials: Option<(String, String)>,
}

#[allow(dead_code)]
impl MockWifi {
    pub fn new() -> Self {
        Self {
            reachable: true,
            connected: false,
            ap_active: false,
            ap_fails: false,
            attempts: 0,
            credentials: None,
        }
    }

    pub fn unreachable() -> Self {
        Self {
            reachable: false,
            ..Self::new()
        }
    }
}

impl Default for MockWifi {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectivityPort for MockWifi {
    fn set_credentials(&mut self, ssid: &str, password: &str) -> Result<(), ConnectivityError> {
        if ssid.is_empty() {
            return Err(ConnectivityError::InvalidSsid);
        }
        self.credentials = Some((ssid.to_owned(), password.to_owned()));
        Ok(())
    }

    fn connect(&mut self) -> Result<(), ConnectivityError> {
        if self.credentials.is_none() {
            return Err(ConnectivityError::NoCredentials);
        }
        self.attempts += 1;
        if self.reachable {
            self.connected = true;
            Ok(())
        } else {
            Err(ConnectivityError::ConnectionFailed)
        }
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn start_access_point(&mut self, _ssid: &str, _password: &str) -> Result<(), ConnectivityError> {
        if self.ap_fails {
            return Err(ConnectivityError::AccessPointFailed);
        }
        self.ap_active = true;
        Ok(())
    }

    fn local_ip(&self) -> Option<Ipv4Addr> {
        if self.ap_active {
            Some(Ipv4Addr::new(192, 168, 4, 1))
        } else if self.connected {
            Some(Ipv4Addr::new(192, 168, 1, 50))
        } else {
            None
        }
    }
}

// ── MockMqtt ──────────────────────────────────────────────────

pub struct MockMqtt {
    pub broker_up: bool,
    pub connected: bool,
    pub connect_attempts: u32,
    /// Publishes that fail before the broker starts accepting again.
    pub failing_publishes: u32,
    pub published: Vec<(String, Vec<u8>)>,
}

#[allow(dead_code)]
impl MockMqtt {
    pub fn new() -> Self {
        Self {
            broker_up: true,
            connected: false,
            connect_attempts: 0,
            failing_publishes: 0,
            published: Vec::new(),
        }
    }

    /// Payloads published to `topic`, as UTF-8.
    pub fn payloads(&self, topic: &str) -> Vec<String> {
        self.published
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, p)| String::from_utf8_lossy(p).into_owned())
            .collect()
    }
}

impl Default for MockMqtt {
    fn default() -> Self {
        Self::new()
    }
}

impl MqttPort for MockMqtt {
    fn connect(&mut self, _server: &str, _port: u16, _client_id: &str) -> Result<(), CommsError> {
        self.connect_attempts += 1;
        if self.broker_up {
            self.connected = true;
            Ok(())
        } else {
            Err(CommsError::MqttConnectFailed)
        }
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), CommsError> {
        if !self.connected {
            return Err(CommsError::MqttDisconnected);
        }
        if self.failing_publishes > 0 {
            self.failing_publishes -= 1;
            return Err(CommsError::MqttPublishFailed);
        }
        self.published.push((topic.to_owned(), payload.to_vec()));
        Ok(())
    }
}

// ── MockNvs ───────────────────────────────────────────────────

#[derive(Default)]
pub struct MockNvs {
    stored: RefCell<DeviceConfig>,
    pub resets: Cell<u32>,
    pub corrupted: Cell<bool>,
}

#[allow(dead_code)]
impl MockNvs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(config: DeviceConfig) -> Self {
        Self {
            stored: RefCell::new(config),
            ..Self::default()
        }
    }

    pub fn stored(&self) -> DeviceConfig {
        self.stored.borrow().clone()
    }
}

impl ConfigPort for MockNvs {
    fn load(&self) -> Result<DeviceConfig, ConfigError> {
        if self.corrupted.get() {
            return Err(ConfigError::Corrupted);
        }
        Ok(self.stored.borrow().clone())
    }

    fn save(&self, config: &DeviceConfig) -> Result<(), ConfigError> {
        *self.stored.borrow_mut() = config.clone();
        Ok(())
    }

    fn reset(&self) -> Result<(), ConfigError> {
        self.resets.set(self.resets.get() + 1);
        *self.stored.borrow_mut() = DeviceConfig::default();
        Ok(())
    }
}

// ── RecordingSink ────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, event: &AppEvent) -> bool {
        self.events.contains(event)
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── NoopDelay ────────────────────────────────────────────────

/// Records requested delays instead of sleeping.
#[derive(Default)]
pub struct NoopDelay {
    pub total_ns: u64,
}

#[allow(dead_code)]
impl NoopDelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_ms(&self) -> u64 {
        self.total_ns / 1_000_000
    }
}

impl DelayNs for NoopDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns += u64::from(ns);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.total_ns += u64::from(ms) * 1_000_000;
    }
}
