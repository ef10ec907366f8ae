//! One-shot ADC1 initialization and raw reads.
//!
//! Configures the ADC1 oneshot unit and the channels of the analog
//! monitors using raw ESP-IDF sys calls.  Called once through
//! `NodeService::init_analog_inputs` before the main loop starts.
//! Digital inputs are owned by `PinDriver`s and need nothing here.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::info;

// ── Error type ────────────────────────────────────────────────

/// Errors during one-shot peripheral initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    AdcInitFailed(i32),
    AdcChannelFailed { channel: u32, rc: i32 },
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::AdcInitFailed(rc) => write!(f, "ADC1 init failed (rc={})", rc),
            Self::AdcChannelFailed { channel, rc } => {
                write!(f, "ADC1 channel {} config failed (rc={})", channel, rc)
            }
        }
    }
}

impl core::error::Error for HwInitError {}

// ── ADC (oneshot) ─────────────────────────────────────────────

#[cfg(target_os = "espidf")]
static mut ADC1_HANDLE: adc_oneshot_unit_handle_t = core::ptr::null_mut();

/// SAFETY: Must be called only from the single-threaded init path or the
/// main-loop read path.  `init_adc()` completes before the loop starts.
#[cfg(target_os = "espidf")]
unsafe fn adc1_handle() -> adc_oneshot_unit_handle_t {
    unsafe { ADC1_HANDLE }
}

/// Create the ADC1 unit and configure `channels` (12 dB, 12-bit).
///
/// An empty slice is a no-op: nodes without analog monitors never
/// claim the unit.
#[cfg(target_os = "espidf")]
pub fn init_adc(channels: &[u32]) -> Result<(), HwInitError> {
    if channels.is_empty() {
        return Ok(());
    }

    let init_cfg = adc_oneshot_unit_init_cfg_t {
        unit_id: adc_unit_t_ADC_UNIT_1,
        ulp_mode: adc_ulp_mode_t_ADC_ULP_MODE_DISABLE,
        ..Default::default()
    };
    // SAFETY: ADC1_HANDLE is only written here, once at boot.
    let ret = unsafe { adc_oneshot_new_unit(&init_cfg, &raw mut ADC1_HANDLE) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::AdcInitFailed(ret));
    }

    let chan_cfg = adc_oneshot_chan_cfg_t {
        atten: adc_atten_t_ADC_ATTEN_DB_12,
        bitwidth: adc_bitwidth_t_ADC_BITWIDTH_12,
    };
    for &channel in channels {
        let ret = unsafe { adc_oneshot_config_channel(adc1_handle(), channel, &chan_cfg) };
        if ret != ESP_OK as i32 {
            return Err(HwInitError::AdcChannelFailed { channel, rc: ret });
        }
    }

    info!("hw_init: ADC1 configured ({} channels)", channels.len());
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_adc(channels: &[u32]) -> Result<(), HwInitError> {
    log::info!("hw_init(sim): ADC1 init skipped ({} channels)", channels.len());
    Ok(())
}

/// Raw 12-bit sample, `0` on a failed conversion.
#[cfg(target_os = "espidf")]
pub fn adc1_read(channel: u32) -> u16 {
    let mut raw: i32 = 0;
    // SAFETY: adc1_handle() contract — single-threaded main-loop access only.
    let ret = unsafe { adc_oneshot_read(adc1_handle(), channel, &mut raw) };
    if ret != ESP_OK as i32 {
        return 0;
    }
    raw.max(0) as u16
}

#[cfg(not(target_os = "espidf"))]
mod sim {
    use core::sync::atomic::{AtomicU16, Ordering};

    const CHANNELS: usize = 10;

    static ADC1: [AtomicU16; CHANNELS] = [const { AtomicU16::new(0) }; CHANNELS];

    pub(super) fn get(channel: u32) -> u16 {
        ADC1.get(channel as usize).map_or(0, |v| v.load(Ordering::Relaxed))
    }

    pub(super) fn set(channel: u32, raw: u16) {
        if let Some(v) = ADC1.get(channel as usize) {
            v.store(raw, Ordering::Relaxed);
        }
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn adc1_read(channel: u32) -> u16 {
    sim::get(channel)
}

/// Simulation: set the value the next `adc1_read(channel)` returns.
/// Values above 12 bits are clamped.
#[cfg(not(target_os = "espidf"))]
pub fn sim_set_adc(channel: u32, raw: u16) {
    sim::set(channel, raw.min(crate::pins::ADC_MAX_RAW));
}
