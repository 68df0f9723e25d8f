//! Link fault state.
//!
//! The streamer has no error channel back to the host: a host that stops
//! receiving frames infers failure from silence. Faults are recorded here
//! for the log and for the recovery path, which escalates to a hard link
//! reset when the last session ended on a fault.

use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

use crate::link::LinkError;

/// Fault codes indicating why a session ended abnormally.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum FaultCode {
    /// No fault (normal operation).
    None = 0,

    /// A frame or chunk write did not complete.
    /// Data: bytes written before the stall.
    WriteStall = 1,

    /// The transport reported closed or an I/O error mid-session.
    LinkLost = 2,

    /// Reopening the transport failed during recovery.
    OpenFailed = 3,

    /// Device-level re-enumeration failed.
    ResetFailed = 4,
}

impl FaultCode {
    /// Convert from raw u8 value.
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => FaultCode::WriteStall,
            2 => FaultCode::LinkLost,
            3 => FaultCode::OpenFailed,
            4 => FaultCode::ResetFailed,
            _ => FaultCode::None,
        }
    }

    /// Classify a transport error. Returns the code and its data word.
    pub fn from_link_error(err: LinkError) -> (Self, u32) {
        match err {
            LinkError::Stalled { written, .. } => (FaultCode::WriteStall, written as u32),
            LinkError::NotOpen | LinkError::Io => (FaultCode::LinkLost, 0),
            LinkError::OpenFailed => (FaultCode::OpenFailed, 0),
            LinkError::ResetFailed => (FaultCode::ResetFailed, 0),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FaultCode::None => "none",
            FaultCode::WriteStall => "write stall",
            FaultCode::LinkLost => "link lost",
            FaultCode::OpenFailed => "open failed",
            FaultCode::ResetFailed => "reset failed",
        }
    }
}

/// Fault register.
///
/// Set by the session when a transport call fails, cleared once a
/// recovery pass reopens the link.
pub struct FaultState {
    /// True if fault is active.
    active: AtomicBool,

    /// Fault code (reason for fault).
    code: AtomicU8,

    /// Additional data (e.g. bytes written before a stall).
    data: AtomicU32,

    /// Total fault count since boot (never cleared).
    count: AtomicU32,
}

impl FaultState {
    /// Create new fault state (no fault).
    pub const fn new() -> Self {
        Self {
            active: AtomicBool::new(false),
            code: AtomicU8::new(0),
            data: AtomicU32::new(0),
            count: AtomicU32::new(0),
        }
    }

    /// Set fault state and bump the counter.
    #[inline]
    pub fn set(&self, code: FaultCode, data: u32) {
        self.code.store(code as u8, Ordering::Release);
        self.data.store(data, Ordering::Release);
        self.count.fetch_add(1, Ordering::Relaxed);
        self.active.store(true, Ordering::Release);
    }

    /// Record a transport error.
    #[inline]
    pub fn record(&self, err: LinkError) -> FaultCode {
        let (code, data) = FaultCode::from_link_error(err);
        self.set(code, data);
        code
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Get fault code (only meaningful if `is_active()` is true).
    #[inline]
    pub fn code(&self) -> FaultCode {
        FaultCode::from_u8(self.code.load(Ordering::Acquire))
    }

    #[inline]
    pub fn data(&self) -> u32 {
        self.data.load(Ordering::Acquire)
    }

    /// Get total fault count since boot.
    #[inline]
    pub fn count(&self) -> u32 {
        self.count.load(Ordering::Relaxed)
    }

    /// Clear the active flag. The counter keeps its history.
    #[inline]
    pub fn clear(&self) {
        self.active.store(false, Ordering::Release);
    }

    /// Get a snapshot of the current fault state.
    #[inline]
    pub fn snapshot(&self) -> FaultSnapshot {
        FaultSnapshot {
            active: self.is_active(),
            code: self.code(),
            data: self.data(),
            count: self.count(),
        }
    }
}

impl Default for FaultState {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of fault state at a point in time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FaultSnapshot {
    pub active: bool,
    pub code: FaultCode,
    pub data: u32,
    pub count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_state_basic() {
        let fault = FaultState::new();

        assert!(!fault.is_active());
        assert_eq!(fault.code(), FaultCode::None);
        assert_eq!(fault.count(), 0);

        fault.set(FaultCode::WriteStall, 42);

        assert!(fault.is_active());
        assert_eq!(fault.code(), FaultCode::WriteStall);
        assert_eq!(fault.data(), 42);
        assert_eq!(fault.count(), 1);

        fault.clear();

        assert!(!fault.is_active());
        assert_eq!(fault.count(), 1); // Count preserved
    }

    #[test]
    fn test_record_classifies_link_errors() {
        let fault = FaultState::new();

        let code = fault.record(LinkError::Stalled { written: 33, expected: 1100 });
        assert_eq!(code, FaultCode::WriteStall);
        assert_eq!(fault.data(), 33);

        assert_eq!(fault.record(LinkError::NotOpen), FaultCode::LinkLost);
        assert_eq!(fault.record(LinkError::ResetFailed), FaultCode::ResetFailed);
        assert_eq!(fault.count(), 3);
    }
}
