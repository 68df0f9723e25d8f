//! Wire frame: 11 bytes per sample, sentinel-delimited.
//!
//! # Layout
//!
//! ```text
//! [0x01][s3][m4][s2][m3][s1][m2][s0][m1][m0][0x02]
//!   0    1   2   3   4   5   6   7   8   9   10
//! ```
//!
//! `s3..s0` are the big-endian bytes of the 32-bit sequence number,
//! `m4..m0` the big-endian bytes of the low 40 bits of the sampled state.
//! Sequence and mask bytes interleave until the sequence runs out; the
//! last mask byte follows directly. This layout is a host contract.
//!
//! Bits 40..63 of the state are not representable and are dropped.

use core::fmt;

use crate::sample::SampledState;

/// Frame length in bytes.
pub const MESSAGE_SIZE: usize = 11;

/// First byte of every frame.
pub const START_BYTE: u8 = 0x01;

/// Last byte of every frame.
pub const END_BYTE: u8 = 0x02;

/// Byte positions of sequence bytes, most significant first.
const SEQ_POS: [usize; 4] = [1, 3, 5, 7];

/// Byte positions of mask bytes, most significant first.
const MASK_POS: [usize; 5] = [2, 4, 6, 8, 9];

/// Frame parse failures (host side).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// Input is not exactly one frame long.
    Length { len: usize },
    /// Byte 0 is not `START_BYTE`.
    BadStart(u8),
    /// Byte 10 is not `END_BYTE`.
    BadEnd(u8),
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Length { len } => write!(f, "frame is {} bytes, expected {}", len, MESSAGE_SIZE),
            Self::BadStart(b) => write!(f, "bad start byte 0x{:02x}", b),
            Self::BadEnd(b) => write!(f, "bad end byte 0x{:02x}", b),
        }
    }
}

/// One encoded frame.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Message([u8; MESSAGE_SIZE]);

impl Message {
    /// Raw frame bytes.
    #[inline]
    pub const fn as_bytes(&self) -> &[u8; MESSAGE_SIZE] {
        &self.0
    }

    /// Consume into raw bytes.
    #[inline]
    pub const fn into_bytes(self) -> [u8; MESSAGE_SIZE] {
        self.0
    }

    /// Sequence number carried by this frame.
    pub fn sequence(&self) -> u32 {
        let mut seq = 0u32;
        for pos in SEQ_POS {
            seq = (seq << 8) | self.0[pos] as u32;
        }
        seq
    }

    /// Sampled state carried by this frame (bits 40..63 always 0).
    pub fn state(&self) -> SampledState {
        let mut bits = 0u64;
        for pos in MASK_POS {
            bits = (bits << 8) | self.0[pos] as u64;
        }
        SampledState::from_bits(bits)
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("seq", &self.sequence())
            .field("state", &format_args!("{:#012x}", self.state().bits()))
            .finish()
    }
}

/// Pack `(state, seq)` into a frame. Pure, no allocation.
#[inline]
pub fn encode(state: SampledState, seq: u32) -> Message {
    let mut out = [0u8; MESSAGE_SIZE];
    out[0] = START_BYTE;

    let seq_bytes = seq.to_be_bytes();
    for (pos, byte) in SEQ_POS.iter().zip(seq_bytes) {
        out[*pos] = byte;
    }

    let mask_bytes = state.encodable().to_be_bytes();
    // u64 big-endian: the low 5 bytes are indices 3..8
    for (pos, byte) in MASK_POS.iter().zip(&mask_bytes[3..]) {
        out[*pos] = *byte;
    }

    out[MESSAGE_SIZE - 1] = END_BYTE;
    Message(out)
}

/// Parse one frame back into `(sequence, state)`.
pub fn decode(bytes: &[u8]) -> Result<(u32, SampledState), FrameError> {
    let frame: [u8; MESSAGE_SIZE] = bytes
        .try_into()
        .map_err(|_| FrameError::Length { len: bytes.len() })?;

    if frame[0] != START_BYTE {
        return Err(FrameError::BadStart(frame[0]));
    }
    if frame[MESSAGE_SIZE - 1] != END_BYTE {
        return Err(FrameError::BadEnd(frame[MESSAGE_SIZE - 1]));
    }

    let msg = Message(frame);
    Ok((msg.sequence(), msg.state()))
}

/// Iterate the frames in a back-to-back stream (one chunk flush, say).
///
/// A trailing partial frame yields a `Length` error.
pub fn frames(stream: &[u8]) -> Frames<'_> {
    Frames { rest: stream }
}

/// Iterator returned by [`frames`].
pub struct Frames<'a> {
    rest: &'a [u8],
}

impl<'a> Iterator for Frames<'a> {
    type Item = Result<(u32, SampledState), FrameError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest.is_empty() {
            return None;
        }
        let take = self.rest.len().min(MESSAGE_SIZE);
        let (frame, rest) = self.rest.split_at(take);
        self.rest = rest;
        Some(decode(frame))
    }
}
