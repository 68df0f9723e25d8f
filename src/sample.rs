//! Module: sample
//!
//! Purpose: Sampled line states and the scanner that produces them.
//! One `SampledState` is one snapshot of every line in the [`PinSet`],
//! taken inside a single bracketed window.
//!
//! Architecture:
//! - `SampledState` is a 64-bit bitmask, bit i = `PinSet[i]` was high
//! - Scan order is PinSet order; no comparison or I/O interleaves the scan
//! - Sync line is high for exactly the duration of each counted scan
//!
//! Safety: Safe. No unsafe blocks. Copy types only.

use crate::link::{DigitalInputs, SignalOutputs};
use crate::pins::{PinSet, ENCODABLE_LINES};

/// Snapshot of all sampled lines.
///
/// Bit layout:
/// - Bit i: level of `PinSet[i]` (1 = high)
/// - Bits >= `PinSet::len()`: always 0
/// - Bits 40-63: sampled, but dropped by the frame encoder
#[repr(transparent)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct SampledState(u64);

impl SampledState {
    /// All lines low.
    pub const LOW: Self = Self(0);

    /// Bits the frame can carry.
    pub const ENCODABLE_MASK: u64 = (1u64 << ENCODABLE_LINES) - 1;

    /// Create state from raw bits
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Get raw bits value
    pub const fn bits(&self) -> u64 {
        self.0
    }

    /// Check if line at bit `index` was high
    pub const fn is_high(&self, index: usize) -> bool {
        index < 64 && (self.0 >> index) & 1 == 1
    }

    /// Return a copy with bit `index` set to `high`
    pub const fn with_line(self, index: usize, high: bool) -> Self {
        if index >= 64 {
            return self;
        }
        if high {
            Self(self.0 | (1u64 << index))
        } else {
            Self(self.0 & !(1u64 << index))
        }
    }

    /// Bits that differ from `other`
    pub const fn changed_from(&self, other: SampledState) -> u64 {
        self.0 ^ other.0
    }

    /// The part of this state that survives encoding.
    ///
    /// Truncation is the documented ceiling of the wire format, not a fault.
    pub const fn encodable(&self) -> u64 {
        self.0 & Self::ENCODABLE_MASK
    }

    /// Number of lines high
    pub const fn count_high(&self) -> u32 {
        self.0.count_ones()
    }
}

/// Reads a [`PinSet`] into a [`SampledState`].
///
/// The scan runs inside the platform's scan window (a critical section on
/// hardware). [`Sampler::sample`] brackets the reads with the sync line so
/// external instrumentation can align each window with a sequence number.
#[derive(Clone, Copy, Debug)]
pub struct Sampler {
    pins: PinSet,
}

impl Sampler {
    /// Create a sampler over a validated pin set.
    pub const fn new(pins: PinSet) -> Self {
        Self { pins }
    }

    /// Lines scanned, in bit order.
    pub fn pins(&self) -> &PinSet {
        &self.pins
    }

    /// Counted sample: sync asserted before the first read, deasserted
    /// after the last.
    #[inline]
    pub fn sample<P>(&self, io: &mut P) -> SampledState
    where
        P: DigitalInputs + SignalOutputs,
    {
        io.with_scan_window(|io| {
            io.write_sync(true);
            let state = self.scan(io);
            io.write_sync(false);
            state
        })
    }

    /// Uncounted snapshot (no sync pulse). Used to prime change detection
    /// at session start.
    #[inline]
    pub fn snapshot<P>(&self, io: &mut P) -> SampledState
    where
        P: DigitalInputs,
    {
        io.with_scan_window(|io| self.scan(io))
    }

    #[inline]
    fn scan<P: DigitalInputs>(&self, io: &mut P) -> SampledState {
        let mut bits = 0u64;
        for (i, &line) in self.pins.as_slice().iter().enumerate() {
            if io.read_line(line) {
                bits |= 1u64 << i;
            }
        }
        SampledState(bits)
    }
}

// ============================================================================
// Tests
// ============================================================================
