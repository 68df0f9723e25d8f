//! Module: pins
//!
//! Purpose: The ordered set of digital lines sampled each iteration.
//!
//! Architecture:
//! - Position in the set is the bit index in every [`SampledState`]
//! - Fixed-capacity storage, no allocation, immutable after construction
//! - Validation happens once, at construction; a `PinSet` that exists is valid
//!
//! Safety: Safe. No unsafe blocks. Copy types only.
//!
//! [`SampledState`]: crate::sample::SampledState

use core::fmt;

/// Platform identifier of one digital line (GPIO number on ESP32).
pub type LineId = u8;

/// Hard ceiling on sampled lines: one bit each in a `u64` state.
pub const MAX_LINES: usize = 64;

/// Lines that survive framing. A frame carries 5 mask bytes, so bits
/// 40..63 of the state are silently dropped by the encoder.
pub const ENCODABLE_LINES: usize = 40;

/// Configuration errors. Any of these keeps the firmware out of
/// `WaitingForStart`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// No lines to sample.
    EmptyPinSet,
    /// More lines than fit in a 64-bit state.
    TooManyLines { count: usize },
    /// The same line appears twice.
    DuplicateLine { line: LineId },
    /// Chunked delivery needs room for at least one message.
    ZeroChunkCapacity,
    /// Chunk capacity exceeds the static chunk storage.
    ChunkCapacityTooLarge { capacity: usize, max: usize },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyPinSet => write!(f, "pin set is empty"),
            Self::TooManyLines { count } => {
                write!(f, "pin set has {} lines, at most {} supported", count, MAX_LINES)
            }
            Self::DuplicateLine { line } => write!(f, "line {} listed twice", line),
            Self::ZeroChunkCapacity => write!(f, "chunk capacity must be at least 1"),
            Self::ChunkCapacityTooLarge { capacity, max } => {
                write!(f, "chunk capacity {} exceeds maximum {}", capacity, max)
            }
        }
    }
}

/// Ordered, deduplicated set of sampled lines.
///
/// Bit *i* of every sampled state corresponds to `pins.get(i)`.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PinSet {
    lines: [LineId; MAX_LINES],
    len: u8,
}

impl PinSet {
    /// Build a pin set, preserving order.
    ///
    /// # Errors
    ///
    /// `EmptyPinSet`, `TooManyLines` or `DuplicateLine`.
    pub fn new(lines: &[LineId]) -> Result<Self, ConfigError> {
        if lines.is_empty() {
            return Err(ConfigError::EmptyPinSet);
        }
        if lines.len() > MAX_LINES {
            return Err(ConfigError::TooManyLines { count: lines.len() });
        }

        let mut seen = [false; 256];
        for &line in lines {
            if seen[line as usize] {
                return Err(ConfigError::DuplicateLine { line });
            }
            seen[line as usize] = true;
        }

        let mut set = Self {
            lines: [0; MAX_LINES],
            len: lines.len() as u8,
        };
        set.lines[..lines.len()].copy_from_slice(lines);
        Ok(set)
    }

    /// Number of lines.
    #[inline]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// Always false for a constructed set; kept for API symmetry.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Lines in bit order.
    #[inline]
    pub fn as_slice(&self) -> &[LineId] {
        &self.lines[..self.len()]
    }

    /// Line mapped to bit `index`.
    #[inline]
    pub fn get(&self, index: usize) -> Option<LineId> {
        self.as_slice().get(index).copied()
    }

    /// Bit index of `line`, if sampled.
    pub fn position(&self, line: LineId) -> Option<usize> {
        self.as_slice().iter().position(|&l| l == line)
    }

    /// True when every line fits in a frame without truncation.
    #[inline]
    pub fn is_fully_encodable(&self) -> bool {
        self.len() <= ENCODABLE_LINES
    }

    /// Mask of the bits this set can ever produce.
    #[inline]
    pub fn mask(&self) -> u64 {
        if self.len() == MAX_LINES {
            u64::MAX
        } else {
            (1u64 << self.len()) - 1
        }
    }
}

impl fmt::Debug for PinSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}
