//! Device and runtime configuration.
//!
//! [`DeviceConfig`] is what the provisioning portal collects and the NVS
//! adapter persists.  [`RuntimeConfig`] carries the compile-time tunables
//! of the node (retry budgets, topics, soft-AP identity).

use heapless::String;
use serde::{Deserialize, Serialize};

/// Capacity of every credential field, matching the 32-byte slots the
/// provisioning form has always used.
pub const FIELD_CAPACITY: usize = 32;

pub type ConfigField = String<FIELD_CAPACITY>;

/// Credentials and broker address written by the provisioning portal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub ssid: ConfigField,
    pub password: ConfigField,
    pub mqtt_server: ConfigField,
    pub mqtt_port: u16,
}

impl DeviceConfig {
    /// A device is provisioned once every field has been filled in.
    pub fn is_initialized(&self) -> bool {
        !self.ssid.is_empty()
            && !self.password.is_empty()
            && !self.mqtt_server.is_empty()
            && self.mqtt_port > 0
    }
}

/// Fixed operating parameters of the sensor node.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    // --- WiFi ---
    /// Association attempts before giving up and falling back to provisioning.
    pub wifi_retries: u32,
    /// Pause between association attempts (milliseconds).
    pub wifi_retry_delay_ms: u32,

    // --- MQTT ---
    pub mqtt_retries: u32,
    pub mqtt_retry_delay_ms: u32,
    /// Client identifier presented to the broker.
    pub mqtt_client_name: &'static str,
    /// Topic the motion monitor publishes to.
    pub motion_topic: &'static str,

    // --- Provisioning ---
    /// Soft-AP SSID broadcast while unprovisioned.
    pub ap_ssid: &'static str,
    /// Soft-AP WPA2 passphrase.
    pub ap_password: &'static str,
    /// TCP port of the provisioning portal.
    pub portal_port: u16,
    /// Delay between serving the success page and restarting (milliseconds).
    pub restart_delay_ms: u32,

    // --- Timing ---
    /// Settle time after power-on before touching the radio (milliseconds).
    pub boot_settle_ms: u32,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            // WiFi: 40 × 500 ms ≈ 20 s
            wifi_retries: 40,
            wifi_retry_delay_ms: 500,

            // MQTT: 40 × 1 s
            mqtt_retries: 40,
            mqtt_retry_delay_ms: 1_000,
            mqtt_client_name: "esp32-motion-sensor",
            motion_topic: "interior/motion",

            // Provisioning
            ap_ssid: "ESP32-AP",
            ap_password: "toto-je-silne-heslo",
            portal_port: 80,
            restart_delay_ms: 3_000,

            boot_settle_ms: 1_000,
        }
    }
}
