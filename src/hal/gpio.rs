//! GPIO HAL: sampled inputs plus the sync and status outputs.
//!
//! Lines are addressed by number at run time (the pin set comes from NVS),
//! so this goes through the ESP-IDF GPIO driver directly instead of the
//! typed `PinDriver`s.

use esp_idf_svc::sys::{
    esp, gpio_get_level, gpio_mode_t_GPIO_MODE_INPUT, gpio_mode_t_GPIO_MODE_OUTPUT,
    gpio_pull_mode_t_GPIO_FLOATING, gpio_reset_pin, gpio_set_direction, gpio_set_level,
    gpio_set_pull_mode, EspError,
};

use crate::link::{DigitalInputs, SignalOutputs};
use crate::pins::{LineId, PinSet};

/// Configured input and output lines.
pub struct EspLines {
    sync: LineId,
    status: LineId,
}

impl EspLines {
    /// Configure every line in `inputs` as a floating input and drive
    /// `sync` and `status` low.
    pub fn new(inputs: &PinSet, sync: LineId, status: LineId) -> Result<Self, EspError> {
        for &line in inputs.as_slice() {
            let gpio = line as i32;
            // SAFETY: line numbers are validated against the board table
            unsafe {
                esp!(gpio_reset_pin(gpio))?;
                esp!(gpio_set_direction(gpio, gpio_mode_t_GPIO_MODE_INPUT))?;
                esp!(gpio_set_pull_mode(gpio, gpio_pull_mode_t_GPIO_FLOATING))?;
            }
        }

        for line in [sync, status] {
            let gpio = line as i32;
            unsafe {
                esp!(gpio_reset_pin(gpio))?;
                esp!(gpio_set_direction(gpio, gpio_mode_t_GPIO_MODE_OUTPUT))?;
                esp!(gpio_set_level(gpio, 0))?;
            }
        }

        Ok(Self { sync, status })
    }

    fn drive(line: LineId, level: bool) {
        // Only fails for an invalid GPIO number, which `new` already rejected
        unsafe {
            gpio_set_level(line as i32, level as u32);
        }
    }
}

impl DigitalInputs for EspLines {
    #[inline]
    fn read_line(&mut self, line: LineId) -> bool {
        unsafe { gpio_get_level(line as i32) != 0 }
    }
}

impl SignalOutputs for EspLines {
    #[inline]
    fn write_sync(&mut self, level: bool) {
        Self::drive(self.sync, level);
    }

    fn write_status(&mut self, running: bool) {
        Self::drive(self.status, running);
    }
}
