//! Outbound application events.
//!
//! The [`NodeService`](super::service::NodeService) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them.

use core::net::Ipv4Addr;

use crate::error::CommsError;
use crate::throttle::CycleReport;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// The node booted; `provisioned` tells which mode it entered.
    Started { provisioned: bool },

    /// Soft-AP is up and the provisioning portal is reachable.
    AccessPointUp { ip: Option<Ipv4Addr> },

    /// Station associated with the configured network.
    WifiConnected { ip: Option<Ipv4Addr> },

    /// Station link was down at the start of a tick.
    WifiLost,

    MqttConnected,

    /// A retry budget was exhausted.
    ConnectionFailed(CommsError),

    /// Stored credentials were wiped; next boot enters provisioning.
    ConfigReset,

    /// The host loop is about to restart the device.
    RestartRequested,

    /// A process cycle in which at least one monitor fired or failed.
    MonitorsFired(CycleReport),
}
