//! Integration tests for NodeService: boot modes, connection supervision
//! and the motion monitor, end to end against mock adapters.

use std::net::Ipv4Addr;

use pinwatch::app::events::AppEvent;
use pinwatch::app::service::{NodeMode, NodeService, TickOutcome};
use pinwatch::config::RuntimeConfig;
use pinwatch::error::CommsError;
use pinwatch::pins::MOTION_SENSOR_GPIO;
use pinwatch::throttle::CycleReport;

use crate::mock_hw::{MockMqtt, MockNvs, MockPins, MockWifi, NoopDelay, RecordingSink, provisioned_config};

const TOPIC: &str = "interior/motion";

type Node = NodeService<MockWifi, MockMqtt>;

fn node_with(wifi: MockWifi, mqtt: MockMqtt) -> Node {
    let mut node = Node::new(RuntimeConfig::default(), wifi, mqtt);
    node.register_motion_sensor().unwrap();
    node
}

struct Rig {
    nvs: MockNvs,
    pins: MockPins,
    delay: NoopDelay,
    sink: RecordingSink,
}

impl Rig {
    fn provisioned() -> Self {
        Self {
            nvs: MockNvs::with(provisioned_config()),
            pins: MockPins::new(),
            delay: NoopDelay::new(),
            sink: RecordingSink::new(),
        }
    }

    fn blank() -> Self {
        Self {
            nvs: MockNvs::new(),
            ..Self::provisioned()
        }
    }

    fn start(&mut self, node: &mut Node) -> TickOutcome {
        node.start(&self.nvs, &mut self.delay, &mut self.sink)
    }

    fn tick(&mut self, node: &mut Node, now_ms: u32) -> TickOutcome {
        node.tick(now_ms, &mut self.pins, &self.nvs, &mut self.delay, &mut self.sink)
    }
}

// ── Boot modes ───────────────────────────────────────────────

#[test]
fn unprovisioned_boot_starts_access_point() {
    let mut rig = Rig::blank();
    let mut node = node_with(MockWifi::new(), MockMqtt::new());

    assert_eq!(rig.start(&mut node), TickOutcome::Continue);
    assert_eq!(node.mode(), NodeMode::Provisioning);
    assert!(node.wifi().ap_active);
    assert_eq!(
        rig.sink.events,
        vec![
            AppEvent::Started { provisioned: false },
            AppEvent::AccessPointUp {
                ip: Some(Ipv4Addr::new(192, 168, 4, 1))
            },
        ]
    );

    // Ticks are inert while provisioning: no reads, no connects.
    assert_eq!(rig.tick(&mut node, 0), TickOutcome::Continue);
    assert!(rig.pins.reads.is_empty());
    assert_eq!(node.wifi().attempts, 0);
}

#[test]
fn corrupted_config_boots_into_provisioning() {
    let mut rig = Rig::provisioned();
    rig.nvs.corrupted.set(true);
    let mut node = node_with(MockWifi::new(), MockMqtt::new());

    assert_eq!(rig.start(&mut node), TickOutcome::Continue);
    assert_eq!(node.mode(), NodeMode::Provisioning);
}

#[test]
fn access_point_failure_requests_restart() {
    let mut rig = Rig::blank();
    let mut wifi = MockWifi::new();
    wifi.ap_fails = true;
    let mut node = node_with(wifi, MockMqtt::new());

    assert_eq!(rig.start(&mut node), TickOutcome::Restart);
    assert!(rig.sink.contains(&AppEvent::ConnectionFailed(CommsError::AccessPointFailed)));
    assert!(rig.sink.contains(&AppEvent::RestartRequested));
    // Nothing stored to wipe.
    assert_eq!(rig.nvs.resets.get(), 0);
}

#[test]
fn provisioned_boot_connects_wifi_then_mqtt() {
    let mut rig = Rig::provisioned();
    let mut node = node_with(MockWifi::new(), MockMqtt::new());

    assert_eq!(rig.start(&mut node), TickOutcome::Continue);
    assert_eq!(node.mode(), NodeMode::Sensor);
    assert_eq!(
        node.wifi().credentials,
        Some(("HomeNetwork".to_owned(), "password1".to_owned()))
    );
    assert_eq!(
        rig.sink.events,
        vec![
            AppEvent::Started { provisioned: true },
            AppEvent::WifiConnected {
                ip: Some(Ipv4Addr::new(192, 168, 1, 50))
            },
            AppEvent::MqttConnected,
        ]
    );
    // Only the boot settle delay; both links came up first try.
    assert_eq!(rig.delay.total_ms(), 1_000);
}

// ── Retry exhaustion ─────────────────────────────────────────

#[test]
fn wifi_exhaustion_resets_config_and_requests_restart() {
    let mut rig = Rig::provisioned();
    let mut node = node_with(MockWifi::unreachable(), MockMqtt::new());

    assert_eq!(rig.start(&mut node), TickOutcome::Restart);

    let rt = RuntimeConfig::default();
    assert_eq!(node.wifi().attempts, rt.wifi_retries);
    assert_eq!(
        rig.delay.total_ms(),
        u64::from(rt.boot_settle_ms) + u64::from(rt.wifi_retries - 1) * u64::from(rt.wifi_retry_delay_ms)
    );
    assert_eq!(rig.nvs.resets.get(), 1);
    assert!(!rig.nvs.stored().is_initialized());
    assert!(!node.device_config().is_initialized());
    assert!(rig.sink.contains(&AppEvent::ConnectionFailed(CommsError::WifiConnectFailed)));
    assert!(rig.sink.contains(&AppEvent::ConfigReset));
    assert_eq!(rig.sink.events.last(), Some(&AppEvent::RestartRequested));
    // MQTT never attempted.
    assert_eq!(node.mqtt().connect_attempts, 0);
}

#[test]
fn mqtt_exhaustion_resets_config_and_requests_restart() {
    let mut rig = Rig::provisioned();
    let mut mqtt = MockMqtt::new();
    mqtt.broker_up = false;
    let mut node = node_with(MockWifi::new(), mqtt);

    assert_eq!(rig.start(&mut node), TickOutcome::Restart);
    assert_eq!(node.mqtt().connect_attempts, RuntimeConfig::default().mqtt_retries);
    assert_eq!(rig.nvs.resets.get(), 1);
    assert!(rig.sink.contains(&AppEvent::ConnectionFailed(CommsError::MqttConnectFailed)));
    assert!(!node.wifi().connected, "radio released before restart");
}

#[test]
fn wifi_drop_is_recovered_on_next_tick() {
    let mut rig = Rig::provisioned();
    let mut node = node_with(MockWifi::new(), MockMqtt::new());
    assert_eq!(rig.start(&mut node), TickOutcome::Continue);
    rig.sink.events.clear();

    node.wifi_mut().connected = false;
    assert_eq!(rig.tick(&mut node, 100), TickOutcome::Continue);
    assert_eq!(rig.sink.events[0], AppEvent::WifiLost);
    assert!(matches!(rig.sink.events[1], AppEvent::WifiConnected { .. }));
    assert_eq!(node.wifi().attempts, 2);
}

#[test]
fn mqtt_drop_mid_operation_exhausts_and_restarts() {
    let mut rig = Rig::provisioned();
    let mut node = node_with(MockWifi::new(), MockMqtt::new());
    assert_eq!(rig.start(&mut node), TickOutcome::Continue);

    node.mqtt_mut().connected = false;
    node.mqtt_mut().broker_up = false;
    assert_eq!(rig.tick(&mut node, 100), TickOutcome::Restart);
    assert_eq!(rig.nvs.resets.get(), 1);
    // The cycle is skipped when supervision fails.
    assert!(rig.pins.reads.is_empty());
}

// ── Motion monitor ───────────────────────────────────────────

#[test]
fn motion_changes_publish_one_and_zero() {
    let mut rig = Rig::provisioned();
    let mut node = node_with(MockWifi::new(), MockMqtt::new());
    assert_eq!(rig.start(&mut node), TickOutcome::Continue);

    for (t, level) in [(0, 0), (10, 0), (20, 1), (30, 1), (40, 1), (50, 0), (60, 1)] {
        rig.pins.set(MOTION_SENSOR_GPIO, level);
        assert_eq!(rig.tick(&mut node, t), TickOutcome::Continue);
    }

    // First evaluation fires regardless, then only on transitions.
    assert_eq!(node.mqtt().payloads(TOPIC), vec!["0", "1", "0", "1"]);
}

#[test]
fn failed_publish_is_retried_next_tick() {
    let mut rig = Rig::provisioned();
    let mut node = node_with(MockWifi::new(), MockMqtt::new());
    assert_eq!(rig.start(&mut node), TickOutcome::Continue);
    rig.sink.events.clear();

    node.mqtt_mut().failing_publishes = 1;
    rig.pins.set(MOTION_SENSOR_GPIO, 1);

    assert_eq!(rig.tick(&mut node, 0), TickOutcome::Continue);
    assert!(node.mqtt().published.is_empty());
    assert_eq!(
        rig.sink.events,
        vec![AppEvent::MonitorsFired(CycleReport {
            evaluated: 1,
            fired: 0,
            failed: 1
        })]
    );

    assert_eq!(rig.tick(&mut node, 1), TickOutcome::Continue);
    assert_eq!(node.mqtt().payloads(TOPIC), vec!["1"]);
}

#[test]
fn quiet_cycles_emit_nothing() {
    let mut rig = Rig::provisioned();
    let mut node = node_with(MockWifi::new(), MockMqtt::new());
    assert_eq!(rig.start(&mut node), TickOutcome::Continue);

    assert_eq!(rig.tick(&mut node, 0), TickOutcome::Continue);
    rig.sink.events.clear();
    for t in 1..20 {
        assert_eq!(rig.tick(&mut node, t), TickOutcome::Continue);
    }
    assert!(rig.sink.events.is_empty());
    assert_eq!(rig.pins.reads.len(), 20);
}
