//! GPIO / peripheral pin assignments for the sensor node.
//!
//! Single source of truth — drivers and monitor registrations reference
//! this module rather than hard-coding pin numbers.

/// Opaque hardware pin identifier (ESP-IDF `gpio_num_t`).
pub type PinId = i32;

// ---------------------------------------------------------------------------
// Monitored inputs
// ---------------------------------------------------------------------------

/// PIR motion sensor output.  HIGH = motion detected.
/// Same wire as `D0` on ESP8266 NodeMCU boards.
pub const MOTION_SENSOR_GPIO: PinId = 16;

// ---------------------------------------------------------------------------
// ADC
// ---------------------------------------------------------------------------

/// Largest raw value a 12-bit ADC1 oneshot read can return.
pub const ADC_MAX_RAW: u16 = 4095;

/// Map an ADC1-capable GPIO to its ADC1 channel (ESP32-S3 layout:
/// GPIO1..=GPIO10 → channel 0..=9).  `None` for non-ADC pins.
pub const fn adc1_channel(pin: PinId) -> Option<u32> {
    if pin >= 1 && pin <= 10 {
        Some((pin - 1) as u32)
    } else {
        None
    }
}
