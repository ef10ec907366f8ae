//! Integration tests for the throttle engine with several monitors
//! sharing one reader and one context.

use pinwatch::app::ports::MqttPort;
use pinwatch::error::CapacityExceeded;
use pinwatch::throttle::{DEFAULT_CAPACITY, PinThrottle, ReadKind, TriggerPolicy};

use crate::mock_hw::{MockMqtt, MockPins};

const DOOR: i32 = 4;
const LIGHT: i32 = 5;

fn connected_mqtt() -> MockMqtt {
    let mut mqtt = MockMqtt::new();
    mqtt.connect("broker", 1883, "test").unwrap();
    mqtt
}

#[test]
fn mixed_monitors_follow_their_own_policies() {
    let mut throttle: PinThrottle<MockMqtt> = PinThrottle::new();
    throttle
        .register(DOOR, ReadKind::Digital, TriggerPolicy::OnChange, 0, |v, mqtt: &mut MockMqtt| {
            mqtt.publish("door", v.to_string().as_bytes())?;
            Ok(())
        })
        .unwrap();
    throttle
        .register(LIGHT, ReadKind::Analog, TriggerPolicy::OnTimer, 1_000, |v, mqtt: &mut MockMqtt| {
            mqtt.publish("light", v.to_string().as_bytes())?;
            Ok(())
        })
        .unwrap();

    let mut pins = MockPins::new();
    let mut mqtt = connected_mqtt();

    // t, door, light
    let script = [
        (0, 0, 100),
        (250, 0, 120),
        (500, 1, 130),
        (999, 1, 140),
        (1_000, 1, 150),
        (1_500, 0, 160),
        (2_000, 0, 170),
    ];
    for (t, door, light) in script {
        pins.set(DOOR, door);
        pins.set(LIGHT, light);
        throttle.process_all(t, &mut pins, &mut mqtt);
    }

    assert_eq!(mqtt.payloads("door"), vec!["0", "1", "0"]);
    assert_eq!(mqtt.payloads("light"), vec!["100", "150", "170"]);

    // Reads happen in registration order, once per entry per cycle.
    assert_eq!(pins.reads.len(), 2 * script.len());
    assert_eq!(pins.reads[0], (DOOR, ReadKind::Digital));
    assert_eq!(pins.reads[1], (LIGHT, ReadKind::Analog));
}

#[test]
fn and_policy_waits_for_interval_with_pending_change() {
    let mut throttle: PinThrottle<MockMqtt> = PinThrottle::new();
    throttle
        .register(LIGHT, ReadKind::Analog, TriggerPolicy::OnTimerAndChange, 1_000, |v, mqtt: &mut MockMqtt| {
            mqtt.publish("light", v.to_string().as_bytes())?;
            Ok(())
        })
        .unwrap();
    let mut pins = MockPins::new();
    let mut mqtt = connected_mqtt();

    pins.set(LIGHT, 10);
    throttle.process_all(0, &mut pins, &mut mqtt);
    pins.set(LIGHT, 20);
    throttle.process_all(300, &mut pins, &mut mqtt); // changed, too soon
    throttle.process_all(1_000, &mut pins, &mut mqtt); // change still pending
    throttle.process_all(1_500, &mut pins, &mut mqtt); // nothing new

    assert_eq!(mqtt.payloads("light"), vec!["10", "20"]);
}

#[test]
fn broker_outage_defers_publish_until_recovery() {
    let mut throttle: PinThrottle<MockMqtt> = PinThrottle::new();
    throttle
        .register(DOOR, ReadKind::Digital, TriggerPolicy::OnChange, 0, |v, mqtt: &mut MockMqtt| {
            mqtt.publish("door", v.to_string().as_bytes())?;
            Ok(())
        })
        .unwrap();
    let mut pins = MockPins::new();
    let mut mqtt = MockMqtt::new(); // not connected: every publish fails

    pins.set(DOOR, 1);
    for t in 0..5 {
        let report = throttle.process_all_counted(t, &mut pins, &mut mqtt);
        assert_eq!(report.failed, 1);
    }
    mqtt.connect("broker", 1883, "test").unwrap();
    let report = throttle.process_all_counted(5, &mut pins, &mut mqtt);
    assert_eq!(report.fired, 1);
    assert_eq!(mqtt.payloads("door"), vec!["1"]);
}

#[test]
fn default_registry_holds_default_capacity() {
    let mut throttle: PinThrottle<MockMqtt> = PinThrottle::new();
    for pin in 0..DEFAULT_CAPACITY as i32 {
        throttle
            .register_infallible(pin, ReadKind::Digital, TriggerPolicy::OnTimer, 10, |_, _| {})
            .unwrap();
    }
    assert!(throttle.is_full());
    assert_eq!(
        throttle.register_infallible(99, ReadKind::Digital, TriggerPolicy::OnTimer, 10, |_, _| {}),
        Err(CapacityExceeded {
            capacity: DEFAULT_CAPACITY
        })
    );
    assert_eq!(throttle.len(), DEFAULT_CAPACITY);
    assert!(throttle.entries().all(|m| m.pin != 99));
}

#[test]
fn timer_survives_clock_wraparound() {
    let mut throttle: PinThrottle<MockMqtt> = PinThrottle::new();
    throttle
        .register(LIGHT, ReadKind::Analog, TriggerPolicy::OnTimer, 100, |v, mqtt: &mut MockMqtt| {
            mqtt.publish("light", v.to_string().as_bytes())?;
            Ok(())
        })
        .unwrap();
    let mut pins = MockPins::new();
    let mut mqtt = connected_mqtt();

    let start = u32::MAX - 49;
    for step in 0..4u32 {
        pins.set(LIGHT, step as i32);
        throttle.process_all(start.wrapping_add(step * 50), &mut pins, &mut mqtt);
    }
    // Fires at start and at start + 100 (wrapped to 50).
    assert_eq!(mqtt.payloads("light"), vec!["0", "2"]);
}
