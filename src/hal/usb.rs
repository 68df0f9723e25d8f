//! Data link over the ESP32-S3 USB-Serial-JTAG controller.
//!
//! Open = driver installed, close = driver uninstalled. The controller's
//! pad registers let us drop the D+ pull-up, which the host sees as an
//! unplug; that is the hard reset.
//!
//! # Safety
//!
//! Only one `EspUsbLink` may exist. The driver calls are global.

use core::ffi::c_void;

use esp_idf_svc::hal::delay::FreeRtos;
use esp_idf_svc::sys::{
    configTICK_RATE_HZ, esp, usb_serial_jtag_driver_config_t, usb_serial_jtag_driver_install,
    usb_serial_jtag_driver_uninstall, usb_serial_jtag_read_bytes, usb_serial_jtag_write_bytes,
};

use crate::link::{LinkError, SerialLink};

/// USB_SERIAL_JTAG_CONF0_REG (ESP32-S3 TRM, USB Serial/JTAG registers)
const USB_SERIAL_JTAG_CONF0_REG: u32 = 0x6003_8018;
const CONF0_PAD_PULL_OVERRIDE: u32 = 1 << 8;
const CONF0_DP_PULLUP: u32 = 1 << 9;

/// How long D+ stays released during a hard reset.
const DETACH_MS: u32 = 100;

const TX_BUFFER_SIZE: u32 = 4096;
const RX_BUFFER_SIZE: u32 = 256;

fn ms_to_ticks(ms: u32) -> u32 {
    ((ms as u64 * configTICK_RATE_HZ as u64) / 1000).max(1) as u32
}

/// The USB-Serial-JTAG link.
pub struct EspUsbLink {
    installed: bool,
    write_timeout_ticks: u32,
}

impl EspUsbLink {
    /// A closed link. Writes that make no progress within
    /// `write_timeout_ms` count as stalled.
    pub fn new(write_timeout_ms: u32) -> Self {
        Self {
            installed: false,
            write_timeout_ticks: ms_to_ticks(write_timeout_ms),
        }
    }
}

impl SerialLink for EspUsbLink {
    fn open_link(&mut self) -> Result<(), LinkError> {
        if self.installed {
            return Ok(());
        }
        let mut config = usb_serial_jtag_driver_config_t {
            tx_buffer_size: TX_BUFFER_SIZE,
            rx_buffer_size: RX_BUFFER_SIZE,
        };
        // SAFETY: single owner, see module docs
        unsafe { esp!(usb_serial_jtag_driver_install(&mut config)) }
            .map_err(|_| LinkError::OpenFailed)?;
        self.installed = true;
        Ok(())
    }

    fn close_link(&mut self) {
        if self.installed {
            unsafe {
                usb_serial_jtag_driver_uninstall();
            }
            self.installed = false;
        }
    }

    fn is_open(&self) -> bool {
        self.installed
    }

    fn write_bytes(&mut self, buf: &[u8]) -> Result<(), LinkError> {
        if !self.installed {
            return Err(LinkError::NotOpen);
        }

        let mut written = 0usize;
        while written < buf.len() {
            let rest = &buf[written..];
            let n = unsafe {
                usb_serial_jtag_write_bytes(
                    rest.as_ptr() as *const c_void,
                    rest.len() as _,
                    self.write_timeout_ticks,
                )
            };
            if n <= 0 {
                return Err(LinkError::Stalled {
                    written,
                    expected: buf.len(),
                });
            }
            written += n as usize;
        }
        Ok(())
    }

    fn try_read_byte(&mut self) -> Option<u8> {
        if !self.installed {
            return None;
        }
        let mut byte = 0u8;
        let n = unsafe { usb_serial_jtag_read_bytes(&mut byte as *mut u8 as *mut c_void, 1, 0) };
        (n == 1).then_some(byte)
    }

    fn hard_reset_link(&mut self) -> Result<(), LinkError> {
        self.close_link();

        // SAFETY: CONF0 is owned by the USB-Serial-JTAG controller, whose
        // driver is uninstalled at this point.
        unsafe {
            let reg = USB_SERIAL_JTAG_CONF0_REG as *mut u32;
            let conf = core::ptr::read_volatile(reg);
            core::ptr::write_volatile(reg, (conf | CONF0_PAD_PULL_OVERRIDE) & !CONF0_DP_PULLUP);
            FreeRtos::delay_ms(DETACH_MS);
            core::ptr::write_volatile(reg, conf & !CONF0_PAD_PULL_OVERRIDE);
        }
        Ok(())
    }
}

impl Drop for EspUsbLink {
    fn drop(&mut self) {
        self.close_link();
    }
}
