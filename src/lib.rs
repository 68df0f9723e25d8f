//! # RustDioStreamer
//!
//! Samples up to 64 digital input lines as fast as the hardware allows and
//! streams each sample to a host as an 11-byte frame tagged with a
//! monotonic sequence number.
//!
//! ## Architecture
//!
//! One [`Session`] owns the loop. Each `Running` iteration:
//! 1. [`Sampler`] scans the [`PinSet`] inside a sync-bracketed window
//! 2. [`Delivery`] decides whether the sample becomes a [`Message`] on the wire
//! 3. The session polls (never blocks) for the host's stop byte
//!
//! The hardware is reached only through the capability traits in [`link`].
//! Single-threaded, no callbacks, no locks.

#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod delivery;
pub mod fault;
pub mod frame;
pub mod link;
pub mod logging;
pub mod pins;
pub mod sample;
pub mod session;

#[cfg(target_os = "espidf")]
pub mod hal;

pub use config::{RecoveryPolicy, StreamerConfig};
pub use delivery::{ChangeTriggered, ChunkBuffer, Delivery, DeliveryMode};
pub use fault::{FaultCode, FaultState};
pub use frame::{decode, encode, Message, MESSAGE_SIZE};
pub use link::{LinkError, Platform};
pub use logging::LogStream;
pub use pins::{ConfigError, LineId, PinSet};
pub use sample::{SampledState, Sampler};
pub use session::{Session, SessionState, SessionStats};
