//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (which goes to UART / USB-CDC in production).

use log::{debug, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started { provisioned } => {
                info!(
                    "START | mode={}",
                    if *provisioned { "sensor" } else { "provisioning" }
                );
            }
            AppEvent::AccessPointUp { ip } => match ip {
                Some(ip) => info!("NET   | soft-AP up, portal at http://{}/", ip),
                None => info!("NET   | soft-AP up"),
            },
            AppEvent::WifiConnected { ip } => match ip {
                Some(ip) => info!("NET   | WiFi connected, ip={}", ip),
                None => info!("NET   | WiFi connected"),
            },
            AppEvent::WifiLost => warn!("NET   | WiFi link lost"),
            AppEvent::MqttConnected => info!("NET   | MQTT connected"),
            AppEvent::ConnectionFailed(e) => warn!("NET   | {}", e),
            AppEvent::ConfigReset => warn!("CONFIG| stored settings cleared"),
            AppEvent::RestartRequested => warn!("POWER | restart requested"),
            AppEvent::MonitorsFired(report) => {
                debug!(
                    "CYCLE | evaluated={} fired={} failed={}",
                    report.evaluated, report.fired, report.failed
                );
            }
        }
    }
}
