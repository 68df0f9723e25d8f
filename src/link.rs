//! Platform capabilities consumed by the sampling core.
//!
//! The core never touches registers or drivers. Everything hardware-shaped
//! arrives through these traits: the `hal` module implements them with
//! esp-idf, tests implement them with scripted mocks.
//!
//! # Rules
//!
//! - Writes are blocking and complete before the next iteration starts
//! - `try_read_byte` never blocks
//! - A write that cannot complete returns `Err`, never a silent short write

use core::fmt;

use crate::pins::LineId;

/// Transport failures surfaced to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    /// Write or read on a closed link.
    NotOpen,
    /// Only part of a write went out before the transport gave up.
    Stalled { written: usize, expected: usize },
    /// The transport could not be (re)opened.
    OpenFailed,
    /// Device-level re-enumeration failed.
    ResetFailed,
    /// Driver-level I/O error.
    Io,
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotOpen => write!(f, "link not open"),
            Self::Stalled { written, expected } => {
                write!(f, "write stalled after {}/{} bytes", written, expected)
            }
            Self::OpenFailed => write!(f, "link open failed"),
            Self::ResetFailed => write!(f, "link reset failed"),
            Self::Io => write!(f, "link I/O error"),
        }
    }
}

/// Instantaneous level of the sampled input lines.
pub trait DigitalInputs {
    /// True when `line` reads logic-high.
    fn read_line(&mut self, line: LineId) -> bool;

    /// Run one full scan without interruption.
    ///
    /// Hardware overrides this with a critical section so the snapshot
    /// cannot tear. The default just runs the scan.
    #[inline]
    fn with_scan_window<R>(&mut self, scan: impl FnOnce(&mut Self) -> R) -> R
    where
        Self: Sized,
    {
        scan(self)
    }
}

/// Auxiliary output lines driven by the core.
pub trait SignalOutputs {
    /// Drive the sample-window synchronization line.
    fn write_sync(&mut self, level: bool);

    /// Drive the "session running" indicator.
    fn write_status(&mut self, running: bool);
}

/// Byte-stream transport to the host.
pub trait SerialLink {
    /// Bring the transport up. Idempotent on an open link.
    fn open_link(&mut self) -> Result<(), LinkError>;

    /// Tear the transport down. Never fails.
    fn close_link(&mut self);

    /// True while the transport is usable.
    fn is_open(&self) -> bool;

    /// Write every byte of `buf` or fail.
    fn write_bytes(&mut self, buf: &[u8]) -> Result<(), LinkError>;

    /// Wait until queued output has left the device.
    fn flush_link(&mut self) -> Result<(), LinkError> {
        Ok(())
    }

    /// Next inbound byte, if one is already waiting.
    fn try_read_byte(&mut self) -> Option<u8>;

    /// Force the host to re-enumerate the link. Best effort.
    fn hard_reset_link(&mut self) -> Result<(), LinkError>;
}

/// Time source and coarse delays.
pub trait Timer {
    /// Monotonic microseconds since boot.
    fn now_us(&self) -> i64;

    /// Sleep for `ms` milliseconds.
    fn delay_ms(&mut self, ms: u32);
}

/// Sink for drained log records. Off the hot path, may block.
pub trait LogPort {
    fn write_log(&mut self, bytes: &[u8]);
}

/// Everything a [`Session`](crate::session::Session) needs from the board.
pub trait Platform: DigitalInputs + SignalOutputs + SerialLink + Timer + LogPort {}

impl<T> Platform for T where T: DigitalInputs + SignalOutputs + SerialLink + Timer + LogPort {}
