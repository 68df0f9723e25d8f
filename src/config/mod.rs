//! Module: config
//!
//! Purpose: Load-time configuration of the streamer.
//!
//! Architecture:
//! - `StreamerConfig`: plain Copy struct, validated once before a session exists
//! - `board`: static line assignment for the supported board
//! - `nvs`: schema-versioned overrides read from flash at boot
//!
//! Nothing here changes while a session runs.

pub mod board;
pub mod nvs;

use crate::delivery::{DeliveryMode, DEFAULT_CHUNK_MESSAGES, MAX_CHUNK_MESSAGES};
use crate::pins::{ConfigError, PinSet};

/// What a recovery pass does after closing the link.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum RecoveryPolicy {
    /// Reopen; hard-reset only if reopening fails or the session faulted.
    ReopenFirst = 0,
    /// Always force re-enumeration (host closes the port on stop).
    AlwaysReset = 1,
}

impl RecoveryPolicy {
    /// Convert from raw u8 value.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::ReopenFirst),
            1 => Some(Self::AlwaysReset),
            _ => None,
        }
    }
}

impl Default for RecoveryPolicy {
    fn default() -> Self {
        RecoveryPolicy::ReopenFirst
    }
}

/// Streamer configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamerConfig {
    /// Lines sampled, in bit order.
    pub pins: PinSet,

    /// Delivery strategy.
    pub mode: DeliveryMode,

    /// Frames per chunk (Chunked mode only).
    pub chunk_capacity: usize,

    /// Pause after each `Running` iteration. 0 = run flat out.
    pub sample_delay_ms: u32,

    /// Recovery escalation.
    pub recovery: RecoveryPolicy,

    /// Settle time around close/reset/reopen.
    pub reset_settle_ms: u32,

    /// While waiting with the link down, retry recovery this often.
    pub relink_interval_ms: u32,

    /// Transport write timeout before a write counts as stalled.
    pub write_timeout_ms: u32,
}

impl StreamerConfig {
    /// Defaults for the given pin set.
    pub fn with_pins(pins: PinSet) -> Self {
        Self {
            pins,
            mode: DeliveryMode::default(),
            chunk_capacity: DEFAULT_CHUNK_MESSAGES,
            sample_delay_ms: 0,
            recovery: RecoveryPolicy::default(),
            reset_settle_ms: 1000,
            relink_interval_ms: 5000,
            write_timeout_ms: 100,
        }
    }

    /// Board defaults.
    pub fn board_default() -> Result<Self, ConfigError> {
        Ok(Self::with_pins(PinSet::new(&board::INPUT_LINES)?))
    }

    /// Check everything a session relies on.
    ///
    /// The pin set validated itself at construction; a pin set wider than
    /// the frame is allowed (top bits truncate) and only warned about.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pins.is_empty() {
            return Err(ConfigError::EmptyPinSet);
        }
        if self.mode == DeliveryMode::Chunked {
            if self.chunk_capacity == 0 {
                return Err(ConfigError::ZeroChunkCapacity);
            }
            if self.chunk_capacity > MAX_CHUNK_MESSAGES {
                return Err(ConfigError::ChunkCapacityTooLarge {
                    capacity: self.chunk_capacity,
                    max: MAX_CHUNK_MESSAGES,
                });
            }
        }
        Ok(())
    }
}
