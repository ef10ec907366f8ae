//! Hardware adapter — bridges real pins to the [`PinReader`] port.
//!
//! Digital monitors read through `embedded_hal::digital::InputPin`
//! drivers registered per [`PinId`] (on ESP-IDF a
//! `PinDriver<AnyInputPin, Input>`).  Analog monitors go through the
//! ADC1 oneshot helper in [`hw_init`](crate::drivers::hw_init).  This is
//! the only module that reads pins for the throttle engine.

use embedded_hal::digital::{Error as _, InputPin};
use heapless::Vec;
use log::{info, warn};

use crate::app::ports::PinReader;
use crate::drivers::hw_init;
use crate::error::CapacityExceeded;
use crate::pins::{self, PinId};
use crate::throttle::ReadKind;

/// Concrete pin reader for up to `N` digital inputs.
pub struct HardwareReader<D, const N: usize = 8> {
    digital: Vec<(PinId, D), N>,
}

impl<D: InputPin, const N: usize> Default for HardwareReader<D, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: InputPin, const N: usize> HardwareReader<D, N> {
    pub const fn new() -> Self {
        Self { digital: Vec::new() }
    }

    /// Attach a digital input driver to `pin`.
    pub fn add_digital(&mut self, pin: PinId, driver: D) -> Result<(), CapacityExceeded> {
        self.digital
            .push((pin, driver))
            .map_err(|_| CapacityExceeded { capacity: N })?;
        info!("HardwareReader: digital input on GPIO{}", pin);
        Ok(())
    }

    fn read_digital(&mut self, pin: PinId) -> i32 {
        let Some((_, driver)) = self.digital.iter_mut().find(|(p, _)| *p == pin) else {
            warn!("HardwareReader: GPIO{} has no digital driver", pin);
            return 0;
        };
        match driver.is_high() {
            Ok(high) => i32::from(high),
            Err(e) => {
                warn!("HardwareReader: GPIO{} read failed ({:?})", pin, e.kind());
                0
            }
        }
    }

    fn read_analog(pin: PinId) -> i32 {
        match pins::adc1_channel(pin) {
            Some(channel) => i32::from(hw_init::adc1_read(channel)),
            None => {
                warn!("HardwareReader: GPIO{} is not an ADC1 pin", pin);
                0
            }
        }
    }
}

impl<D: InputPin, const N: usize> PinReader for HardwareReader<D, N> {
    fn read(&mut self, pin: PinId, kind: ReadKind) -> i32 {
        match kind {
            ReadKind::Digital => self.read_digital(pin),
            ReadKind::Analog => Self::read_analog(pin),
        }
    }
}
