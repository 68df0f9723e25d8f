//! Hardware Abstraction Layer for RustDioStreamer (ESP32-S3, esp-idf).
//!
//! Thin wrappers around ESP-IDF peripherals that implement the capability
//! traits in [`crate::link`]. Business logic stays in core modules, HAL is
//! just I/O.

pub mod gpio;
pub mod timer;
pub mod uart_log;
pub mod usb;

pub use gpio::EspLines;
pub use timer::EspTimer;
pub use uart_log::{UartLogConfig, UartLogPort};
pub use usb::EspUsbLink;

use crate::link::{DigitalInputs, LinkError, LogPort, SerialLink, SignalOutputs, Timer};
use crate::pins::LineId;

/// Everything the session needs, assembled from the HAL pieces.
pub struct EspPlatform {
    pub lines: EspLines,
    pub link: EspUsbLink,
    pub timer: EspTimer,
    pub log: UartLogPort,
}

impl DigitalInputs for EspPlatform {
    #[inline]
    fn read_line(&mut self, line: LineId) -> bool {
        self.lines.read_line(line)
    }

    #[inline]
    fn with_scan_window<R>(&mut self, scan: impl FnOnce(&mut Self) -> R) -> R
    where
        Self: Sized,
    {
        esp_idf_svc::hal::interrupt::free(|| scan(self))
    }
}

impl SignalOutputs for EspPlatform {
    #[inline]
    fn write_sync(&mut self, level: bool) {
        self.lines.write_sync(level);
    }

    fn write_status(&mut self, running: bool) {
        self.lines.write_status(running);
    }
}

impl SerialLink for EspPlatform {
    fn open_link(&mut self) -> Result<(), LinkError> {
        self.link.open_link()
    }

    fn close_link(&mut self) {
        self.link.close_link();
    }

    fn is_open(&self) -> bool {
        self.link.is_open()
    }

    #[inline]
    fn write_bytes(&mut self, buf: &[u8]) -> Result<(), LinkError> {
        self.link.write_bytes(buf)
    }

    #[inline]
    fn try_read_byte(&mut self) -> Option<u8> {
        self.link.try_read_byte()
    }

    fn hard_reset_link(&mut self) -> Result<(), LinkError> {
        self.link.hard_reset_link()
    }
}

impl Timer for EspPlatform {
    #[inline]
    fn now_us(&self) -> i64 {
        self.timer.now_us()
    }

    fn delay_ms(&mut self, ms: u32) {
        self.timer.delay_ms(ms);
    }
}

impl LogPort for EspPlatform {
    fn write_log(&mut self, bytes: &[u8]) {
        self.log.write_log(bytes);
    }
}
