//! Time base: esp_timer for timestamps, FreeRTOS for delays.

use esp_idf_svc::hal::delay::FreeRtos;

use crate::link::Timer;

/// Boot-relative clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct EspTimer;

impl Timer for EspTimer {
    #[inline]
    fn now_us(&self) -> i64 {
        // SAFETY: esp_timer is started by ESP-IDF before app_main
        unsafe { esp_idf_svc::sys::esp_timer_get_time() }
    }

    fn delay_ms(&mut self, ms: u32) {
        FreeRtos::delay_ms(ms);
    }
}
