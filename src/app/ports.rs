//! Port traits — the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ NodeService / PinThrottle (domain)
//! ```
//!
//! Driven adapters (pin readers, WiFi, MQTT, storage, event sinks)
//! implement these traits.  The [`NodeService`](super::service::NodeService)
//! and the [`PinThrottle`](crate::throttle::PinThrottle) consume them via
//! generics, so the domain core never touches hardware directly.
//!
//! Delays in retry loops go through `embedded_hal::delay::DelayNs` rather
//! than a port of our own.
//!
//! ## Security notes
//!
//! - **ConfigPort** implementations MUST validate before persisting.
//! - The stored WiFi password is a secret; adapters must never log it.

use core::fmt;
use core::net::Ipv4Addr;

use crate::config::DeviceConfig;
use crate::error::CommsError;
use crate::pins::PinId;
use crate::throttle::ReadKind;

// ───────────────────────────────────────────────────────────────
// Pin read port (driven adapter: hardware → throttle engine)
// ───────────────────────────────────────────────────────────────

/// Read primitive consumed by the throttle engine once per entry per cycle.
///
/// Implementations must be fast and free of side effects.  Digital reads
/// return `0` or `1`; analog reads return the raw ADC count.  `-1` is
/// reserved as the engine's "never observed" sentinel and must never be
/// returned.
pub trait PinReader {
    fn read(&mut self, pin: PinId, kind: ReadKind) -> i32;
}

// ───────────────────────────────────────────────────────────────
// MQTT port (driven adapter: domain → broker)
// ───────────────────────────────────────────────────────────────

/// Minimal MQTT client surface used by the node and by monitor callbacks.
pub trait MqttPort {
    /// Open a session with the broker.  One attempt; retries are the
    /// caller's business.
    fn connect(&mut self, server: &str, port: u16, client_id: &str) -> Result<(), CommsError>;

    fn is_connected(&self) -> bool;

    /// Publish `payload` to `topic` (QoS 0, not retained).
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), CommsError>;
}

// ───────────────────────────────────────────────────────────────
// Connectivity port (driven adapter: domain ↔ WiFi radio)
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityError {
    NoCredentials,
    InvalidSsid,
    InvalidPassword,
    ConnectionFailed,
    AlreadyConnected,
    AccessPointFailed,
}

impl fmt::Display for ConnectivityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCredentials => write!(f, "no WiFi credentials configured"),
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassword => {
                write!(f, "password invalid (must be 8-64 bytes for WPA2, or empty for open)")
            }
            Self::ConnectionFailed => write!(f, "WiFi connection failed"),
            Self::AlreadyConnected => write!(f, "already connected to AP"),
            Self::AccessPointFailed => write!(f, "soft-AP could not be started"),
        }
    }
}

impl From<ConnectivityError> for CommsError {
    fn from(e: ConnectivityError) -> Self {
        match e {
            ConnectivityError::AccessPointFailed => Self::AccessPointFailed,
            _ => Self::WifiConnectFailed,
        }
    }
}

/// Station / soft-AP control of the WiFi radio.
pub trait ConnectivityPort {
    fn set_credentials(&mut self, ssid: &str, password: &str) -> Result<(), ConnectivityError>;

    /// Single association attempt with the stored credentials.
    fn connect(&mut self) -> Result<(), ConnectivityError>;

    fn disconnect(&mut self);

    fn is_connected(&self) -> bool;

    /// Bring up an open-for-provisioning access point.
    fn start_access_point(&mut self, ssid: &str, password: &str) -> Result<(), ConnectivityError>;

    /// Address of the active interface (station or soft-AP), if any.
    fn local_ip(&self) -> Option<Ipv4Addr>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists the provisioned device configuration.
///
/// # Security
///
/// Implementations MUST validate config values before persisting.
/// Invalid values are rejected with [`ConfigError::ValidationFailed`],
/// never silently truncated.
pub trait ConfigPort {
    /// Load configuration from persistent storage.
    /// Returns [`DeviceConfig::default()`] (unprovisioned) if nothing is stored.
    fn load(&self) -> Result<DeviceConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &DeviceConfig) -> Result<(), ConfigError>;

    /// Overwrite the stored configuration with the blank, unprovisioned one.
    fn reset(&self) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::error::Error for ConfigError {}
