//! Delivery strategies: when an encoded sample is handed to the transport.
//!
//! Two modes share the encoder and the sequence discipline:
//! - **Change-Triggered**: one standalone write per observed transition
//! - **Chunked-Buffered**: every sample buffered, flushed `C` at a time
//!
//! # Rules
//!
//! - The sequence number is assigned by the session, never here
//! - A chunk is written in one `write_bytes` call or not at all
//! - A failed flush is returned to the caller, never swallowed

use crate::frame::{encode, Message, MESSAGE_SIZE};
use crate::link::{LinkError, SerialLink};
use crate::pins::ConfigError;
use crate::sample::SampledState;

/// Largest chunk the static buffer can hold.
pub const MAX_CHUNK_MESSAGES: usize = 256;

/// Default chunk capacity.
pub const DEFAULT_CHUNK_MESSAGES: usize = 100;

/// Selected delivery strategy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum DeliveryMode {
    /// Send one frame whenever the state differs from the last sent one.
    ChangeTriggered = 0,
    /// Buffer every frame, send full chunks.
    Chunked = 1,
}

impl DeliveryMode {
    /// Convert from raw u8 value.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::ChangeTriggered),
            1 => Some(Self::Chunked),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ChangeTriggered => "change-triggered",
            Self::Chunked => "chunked",
        }
    }
}

impl Default for DeliveryMode {
    fn default() -> Self {
        if cfg!(feature = "chunked") {
            DeliveryMode::Chunked
        } else {
            DeliveryMode::ChangeTriggered
        }
    }
}

/// What happened to one iteration's sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Unchanged state, nothing sent.
    Skipped,
    /// One frame written immediately.
    Sent,
    /// Frame appended to the chunk buffer.
    Buffered,
    /// Frame appended and the full chunk written.
    Flushed { messages: usize },
}

/// Change-Triggered state: the last state handed to the host.
#[derive(Clone, Copy, Debug, Default)]
pub struct ChangeTriggered {
    previous: SampledState,
}

impl ChangeTriggered {
    pub const fn new() -> Self {
        Self {
            previous: SampledState::LOW,
        }
    }

    /// Reset the comparison baseline (session start).
    #[inline]
    pub fn prime(&mut self, state: SampledState) {
        self.previous = state;
    }

    /// Frame to send for `state`, or `None` if nothing changed.
    #[inline]
    pub fn offer(&mut self, state: SampledState, seq: u32) -> Option<Message> {
        if state == self.previous {
            return None;
        }
        self.previous = state;
        Some(encode(state, seq))
    }

    /// Last accepted state.
    #[inline]
    pub fn previous(&self) -> SampledState {
        self.previous
    }
}

/// Fixed-capacity, append-only run of frames stored contiguously.
pub struct ChunkBuffer {
    bytes: [u8; MAX_CHUNK_MESSAGES * MESSAGE_SIZE],
    len: usize,
    capacity: usize,
}

impl ChunkBuffer {
    /// Create an empty buffer holding `capacity` frames.
    ///
    /// # Errors
    ///
    /// `ZeroChunkCapacity` or `ChunkCapacityTooLarge`.
    pub fn new(capacity: usize) -> Result<Self, ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::ZeroChunkCapacity);
        }
        if capacity > MAX_CHUNK_MESSAGES {
            return Err(ConfigError::ChunkCapacityTooLarge {
                capacity,
                max: MAX_CHUNK_MESSAGES,
            });
        }
        Ok(Self {
            bytes: [0u8; MAX_CHUNK_MESSAGES * MESSAGE_SIZE],
            len: 0,
            capacity,
        })
    }

    /// Append a frame. Returns true when the buffer is now full.
    ///
    /// Callers flush before pushing into a full buffer; a push into a
    /// full buffer is ignored.
    #[inline]
    pub fn push(&mut self, msg: &Message) -> bool {
        if self.is_full() {
            return true;
        }
        let at = self.len * MESSAGE_SIZE;
        self.bytes[at..at + MESSAGE_SIZE].copy_from_slice(msg.as_bytes());
        self.len += 1;
        self.is_full()
    }

    /// Frames buffered.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len == self.capacity
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Buffered frames, back to back.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len * MESSAGE_SIZE]
    }

    /// Drop buffered frames.
    #[inline]
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Write everything buffered as one transfer and empty the buffer.
    ///
    /// Returns the number of frames written (0 writes nothing). The buffer
    /// is emptied even on error; the error carries the failure upward.
    pub fn flush<L: SerialLink>(&mut self, link: &mut L) -> Result<usize, LinkError> {
        if self.is_empty() {
            return Ok(0);
        }
        let messages = self.len;
        let result = link.write_bytes(self.as_bytes());
        self.clear();
        result.map(|()| messages)
    }
}

/// The active strategy for a session.
pub enum Delivery {
    ChangeTriggered(ChangeTriggered),
    Chunked(ChunkBuffer),
}

impl Delivery {
    /// Build the strategy for `mode`. `chunk_capacity` is ignored by
    /// Change-Triggered.
    pub fn new(mode: DeliveryMode, chunk_capacity: usize) -> Result<Self, ConfigError> {
        Ok(match mode {
            DeliveryMode::ChangeTriggered => Delivery::ChangeTriggered(ChangeTriggered::new()),
            DeliveryMode::Chunked => Delivery::Chunked(ChunkBuffer::new(chunk_capacity)?),
        })
    }

    pub fn mode(&self) -> DeliveryMode {
        match self {
            Delivery::ChangeTriggered(_) => DeliveryMode::ChangeTriggered,
            Delivery::Chunked(_) => DeliveryMode::Chunked,
        }
    }

    /// Session start: set the change baseline, drop stale frames.
    pub fn prime(&mut self, state: SampledState) {
        match self {
            Delivery::ChangeTriggered(ct) => ct.prime(state),
            Delivery::Chunked(chunk) => chunk.clear(),
        }
    }

    /// Hand one iteration's sample to the strategy.
    #[inline]
    pub fn deliver<L: SerialLink>(
        &mut self,
        state: SampledState,
        seq: u32,
        link: &mut L,
    ) -> Result<Outcome, LinkError> {
        match self {
            Delivery::ChangeTriggered(ct) => match ct.offer(state, seq) {
                Some(msg) => {
                    link.write_bytes(msg.as_bytes())?;
                    Ok(Outcome::Sent)
                }
                None => Ok(Outcome::Skipped),
            },
            Delivery::Chunked(chunk) => {
                if chunk.push(&encode(state, seq)) {
                    let messages = chunk.flush(link)?;
                    Ok(Outcome::Flushed { messages })
                } else {
                    Ok(Outcome::Buffered)
                }
            }
        }
    }

    /// Session stop: write any partial chunk. Returns frames written.
    pub fn finish<L: SerialLink>(&mut self, link: &mut L) -> Result<usize, LinkError> {
        match self {
            Delivery::ChangeTriggered(_) => Ok(0),
            Delivery::Chunked(chunk) => chunk.flush(link),
        }
    }

    /// Frames waiting in the chunk buffer.
    pub fn pending(&self) -> usize {
        match self {
            Delivery::ChangeTriggered(_) => 0,
            Delivery::Chunked(chunk) => chunk.len(),
        }
    }
}
