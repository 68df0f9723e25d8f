//! UART log output on GPIO6.
//!
//! The USB link carries frames only, so logs go out on UART1 TX.
//! Requires external USB-UART adapter (CH340, CP2102, etc).
//!
//! # Hardware Setup
//!
//! ```text
//! ESP32-S3 GPIO6 (TX) ──────▶ USB-UART RX
//!                              └─▶ PC Serial Monitor
//! ```
//!
//! **WARNING**: GPIO6 conflicts with Octal PSRAM. Only use on Quad flash boards!

use esp_idf_svc::hal::gpio;
use esp_idf_svc::hal::peripheral::Peripheral;
use esp_idf_svc::hal::uart::{self, UartTxDriver, UART1};
use esp_idf_svc::hal::units::Hertz;
use esp_idf_svc::sys::EspError;

use crate::config::board;
use crate::link::LogPort;

/// UART configuration for logging.
pub struct UartLogConfig {
    pub baud_rate: u32,
}

impl Default for UartLogConfig {
    fn default() -> Self {
        Self {
            baud_rate: board::LOG_BAUD,
        }
    }
}

/// TX-only UART1 log sink.
pub struct UartLogPort {
    uart: UartTxDriver<'static>,
}

impl UartLogPort {
    /// Initialize UART1 TX-only on `tx_pin`.
    pub fn new(
        uart: impl Peripheral<P = UART1> + 'static,
        tx_pin: impl Peripheral<P = impl gpio::OutputPin> + 'static,
        config: &UartLogConfig,
    ) -> Result<Self, EspError> {
        let uart_config = uart::config::Config::default().baudrate(Hertz(config.baud_rate));

        let uart = UartTxDriver::new(
            uart,
            tx_pin,
            Option::<gpio::AnyIOPin>::None, // CTS
            Option::<gpio::AnyIOPin>::None, // RTS
            &uart_config,
        )?;

        Ok(Self { uart })
    }
}

impl LogPort for UartLogPort {
    fn write_log(&mut self, bytes: &[u8]) {
        // Nowhere to report a failed log write
        let _ = self.uart.write(bytes);
    }
}
