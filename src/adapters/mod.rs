//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements         | Connects to                  |
//! |------------|--------------------|------------------------------|
//! | `hardware` | PinReader          | GPIO inputs, ADC1 oneshot    |
//! | `log_sink` | EventSink          | Serial log output            |
//! | `mqtt`     | MqttPort           | ESP-IDF MQTT client          |
//! | `nvs`      | ConfigPort         | NVS / in-memory store        |
//! | `portal`   | —                  | Provisioning HTTP server     |
//! | `time`     | —                  | ESP32 system timer           |
//! | `wifi`     | ConnectivityPort   | ESP-IDF WiFi STA / soft-AP   |

pub mod hardware;
pub mod log_sink;
pub mod mqtt;
pub mod nvs;
pub mod portal;
pub mod time;
pub(super) mod utils;
pub mod wifi;
