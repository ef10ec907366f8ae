//! Node service — the hexagonal core of the sensor node.
//!
//! [`NodeService`] owns the WiFi and MQTT adapters, the device
//! configuration and the [`PinThrottle`].  Per-call dependencies (config
//! store, pin reader, delay, event sink) are injected at call sites, so
//! the whole service runs against mock adapters in host tests.
//!
//! ```text
//!  ConfigPort ──▶ ┌──────────────────────────────┐ ──▶ EventSink
//!                 │         NodeService          │
//!  PinReader  ──▶ │  supervision · PinThrottle   │ ──▶ MqttPort
//!                 └──────────────────────────────┘
//!                        │ ConnectivityPort
//! ```
//!
//! Two modes, fixed at boot:
//!
//! - **Provisioning**: no usable config; the soft-AP is up.  `tick` does
//!   nothing.
//! - **Sensor**: every `tick` verifies WiFi and MQTT, then runs one
//!   throttle cycle with the MQTT client as callback context.
//!
//! The host loop serves the provisioning portal in both modes.
//! Exhausting a retry budget wipes the stored config and asks the host
//! loop for a restart, which brings the node back up in provisioning mode.

use embedded_hal::delay::DelayNs;
use log::{debug, error, info, warn};

use crate::config::{DeviceConfig, RuntimeConfig};
use crate::drivers::hw_init;
use crate::error::CommsError;
use crate::pins::{self, MOTION_SENSOR_GPIO};
use crate::throttle::{DEFAULT_CAPACITY, PinThrottle, ReadKind, TriggerPolicy};

use super::events::AppEvent;
use super::ports::{ConfigPort, ConnectivityError, ConnectivityPort, EventSink, MqttPort, PinReader};

/// Operating mode chosen by [`NodeService::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeMode {
    /// Not started yet.
    Booting,
    Provisioning,
    Sensor,
}

/// What the host loop must do after a service call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum TickOutcome {
    Continue,
    Restart,
}

// ───────────────────────────────────────────────────────────────
// NodeService
// ───────────────────────────────────────────────────────────────

pub struct NodeService<W, M, const N: usize = DEFAULT_CAPACITY> {
    runtime: RuntimeConfig,
    device: DeviceConfig,
    mode: NodeMode,
    wifi: W,
    mqtt: M,
    throttle: PinThrottle<M, N>,
    /// Station link state seen at the end of the last check.
    link_up: bool,
}

impl<W, M, const N: usize> NodeService<W, M, N>
where
    W: ConnectivityPort,
    M: MqttPort + 'static,
{
    /// Construct the service.  Does **not** touch the radio; call
    /// [`start`](Self::start) next.
    pub fn new(runtime: RuntimeConfig, wifi: W, mqtt: M) -> Self {
        Self {
            runtime,
            device: DeviceConfig::default(),
            mode: NodeMode::Booting,
            wifi,
            mqtt,
            throttle: PinThrottle::new(),
            link_up: false,
        }
    }

    // ── Setup ─────────────────────────────────────────────────

    /// Register the PIR motion monitor: publishes `"1"` on HIGH and `"0"`
    /// on LOW to the motion topic, on every level change.
    pub fn register_motion_sensor(&mut self) -> crate::error::Result<()> {
        let topic = self.runtime.motion_topic;
        self.throttle.register(
            MOTION_SENSOR_GPIO,
            ReadKind::Digital,
            TriggerPolicy::OnChange,
            0,
            move |value, mqtt: &mut M| {
                let payload: &[u8] = if value != 0 { b"1" } else { b"0" };
                mqtt.publish(topic, payload)?;
                Ok(())
            },
        )?;
        Ok(())
    }

    /// Claim ADC1 for every analog monitor registered so far.  Call once,
    /// after all monitors are registered and before the first `tick`.
    pub fn init_analog_inputs(&self) -> crate::error::Result<()> {
        let channels: heapless::Vec<u32, N> = self
            .throttle
            .entries()
            .filter(|m| m.read_kind == ReadKind::Analog)
            .filter_map(|m| pins::adc1_channel(m.pin))
            .collect();
        hw_init::init_adc(&channels)?;
        Ok(())
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Load the stored config and enter provisioning or sensor mode.
    pub fn start(
        &mut self,
        store: &impl ConfigPort,
        delay: &mut impl DelayNs,
        sink: &mut impl EventSink,
    ) -> TickOutcome {
        self.device = match store.load() {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!("Node: stored config unusable ({}), starting blank", e);
                DeviceConfig::default()
            }
        };
        info!(
            "Node: ssid='{}' broker={}:{} password={}",
            self.device.ssid,
            self.device.mqtt_server,
            self.device.mqtt_port,
            if self.device.password.is_empty() { "unset" } else { "set" }
        );

        delay.delay_ms(self.runtime.boot_settle_ms);

        if !self.device.is_initialized() {
            self.mode = NodeMode::Provisioning;
            sink.emit(&AppEvent::Started { provisioned: false });
            return self.start_provisioning(sink);
        }

        self.mode = NodeMode::Sensor;
        sink.emit(&AppEvent::Started { provisioned: true });

        if let Err(e) = self
            .wifi
            .set_credentials(&self.device.ssid, &self.device.password)
        {
            error!("Node: stored WiFi credentials rejected ({})", e);
            return self.fall_back_to_provisioning(store, sink);
        }

        self.supervise(store, delay, sink)
    }

    /// One main-loop iteration.  In sensor mode: verify the connection,
    /// then run a throttle cycle at `now_ms`.
    pub fn tick(
        &mut self,
        now_ms: u32,
        reader: &mut impl PinReader,
        store: &impl ConfigPort,
        delay: &mut impl DelayNs,
        sink: &mut impl EventSink,
    ) -> TickOutcome {
        if self.mode != NodeMode::Sensor {
            return TickOutcome::Continue;
        }

        if self.supervise(store, delay, sink) == TickOutcome::Restart {
            return TickOutcome::Restart;
        }

        let report = self
            .throttle
            .process_all_counted(now_ms, reader, &mut self.mqtt);
        if report.fired > 0 || report.failed > 0 {
            sink.emit(&AppEvent::MonitorsFired(report));
        }
        TickOutcome::Continue
    }

    // ── Connection supervision ────────────────────────────────

    fn start_provisioning(&mut self, sink: &mut impl EventSink) -> TickOutcome {
        match self
            .wifi
            .start_access_point(self.runtime.ap_ssid, self.runtime.ap_password)
        {
            Ok(()) => {
                sink.emit(&AppEvent::AccessPointUp {
                    ip: self.wifi.local_ip(),
                });
                TickOutcome::Continue
            }
            Err(e) => {
                error!("Node: soft-AP '{}' failed ({})", self.runtime.ap_ssid, e);
                sink.emit(&AppEvent::ConnectionFailed(e.into()));
                sink.emit(&AppEvent::RestartRequested);
                TickOutcome::Restart
            }
        }
    }

    fn supervise(
        &mut self,
        store: &impl ConfigPort,
        delay: &mut impl DelayNs,
        sink: &mut impl EventSink,
    ) -> TickOutcome {
        match self.verify_connection(delay, sink) {
            Ok(()) => TickOutcome::Continue,
            Err(e) => {
                sink.emit(&AppEvent::ConnectionFailed(e));
                self.fall_back_to_provisioning(store, sink)
            }
        }
    }

    /// Bring WiFi, then MQTT, up if either is down.
    fn verify_connection(
        &mut self,
        delay: &mut impl DelayNs,
        sink: &mut impl EventSink,
    ) -> Result<(), CommsError> {
        if !self.wifi.is_connected() {
            if self.link_up {
                self.link_up = false;
                sink.emit(&AppEvent::WifiLost);
            }
            self.connect_wifi(delay)?;
            self.link_up = true;
            sink.emit(&AppEvent::WifiConnected {
                ip: self.wifi.local_ip(),
            });
        }

        if !self.mqtt.is_connected() {
            self.connect_mqtt(delay)?;
            sink.emit(&AppEvent::MqttConnected);
        }
        Ok(())
    }

    fn connect_wifi(&mut self, delay: &mut impl DelayNs) -> Result<(), CommsError> {
        let retries = self.runtime.wifi_retries;
        for attempt in 1..=retries {
            match self.wifi.connect() {
                Ok(()) | Err(ConnectivityError::AlreadyConnected) => return Ok(()),
                Err(e) => debug!("Node: WiFi attempt {}/{} failed ({})", attempt, retries, e),
            }
            if attempt < retries {
                delay.delay_ms(self.runtime.wifi_retry_delay_ms);
            }
        }
        error!("Node: WiFi '{}' unreachable after {} attempts", self.device.ssid, retries);
        Err(CommsError::WifiConnectFailed)
    }

    fn connect_mqtt(&mut self, delay: &mut impl DelayNs) -> Result<(), CommsError> {
        let retries = self.runtime.mqtt_retries;
        for attempt in 1..=retries {
            match self.mqtt.connect(
                &self.device.mqtt_server,
                self.device.mqtt_port,
                self.runtime.mqtt_client_name,
            ) {
                Ok(()) => return Ok(()),
                Err(e) => debug!("Node: MQTT attempt {}/{} failed ({})", attempt, retries, e),
            }
            if attempt < retries {
                delay.delay_ms(self.runtime.mqtt_retry_delay_ms);
            }
        }
        error!(
            "Node: broker {}:{} unreachable after {} attempts",
            self.device.mqtt_server, self.device.mqtt_port, retries
        );
        Err(CommsError::MqttConnectFailed)
    }

    /// Wipe the stored config and request a restart into provisioning.
    fn fall_back_to_provisioning(
        &mut self,
        store: &impl ConfigPort,
        sink: &mut impl EventSink,
    ) -> TickOutcome {
        if let Err(e) = store.reset() {
            error!("Node: could not clear stored config ({})", e);
        } else {
            sink.emit(&AppEvent::ConfigReset);
        }
        self.device = DeviceConfig::default();
        self.wifi.disconnect();
        self.link_up = false;
        sink.emit(&AppEvent::RestartRequested);
        TickOutcome::Restart
    }

    // ── Accessors ─────────────────────────────────────────────

    pub fn mode(&self) -> NodeMode {
        self.mode
    }

    pub fn device_config(&self) -> &DeviceConfig {
        &self.device
    }

    pub fn throttle(&self) -> &PinThrottle<M, N> {
        &self.throttle
    }

    pub fn wifi(&self) -> &W {
        &self.wifi
    }

    pub fn wifi_mut(&mut self) -> &mut W {
        &mut self.wifi
    }

    pub fn mqtt(&self) -> &M {
        &self.mqtt
    }

    pub fn mqtt_mut(&mut self) -> &mut M {
        &mut self.mqtt
    }
}
