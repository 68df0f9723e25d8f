//! Session state machine: start/stop handshake, sampling loop, link recovery.
//!
//! ```text
//!            's' / ack 's'                'e' / flush
//! WaitingForStart ──────────▶ Running ──────────────▶ Recovering
//!       ▲                        │  write failure           │
//!       │                        └──────────────────────────┤
//!       └───────────────────────────────────────────────────┘
//!                       close, settle, [reset], reopen
//! ```
//!
//! # Rules
//!
//! - One `Session` owns the platform, the delivery buffer and all counters
//! - The sequence number advances exactly once per `Running` iteration
//! - Inbound bytes are only observed by non-blocking polls
//! - Logs are drained only outside `Running`

use crate::config::{RecoveryPolicy, StreamerConfig};
use crate::delivery::{Delivery, Outcome};
use crate::fault::FaultState;
use crate::frame::MESSAGE_SIZE;
use crate::link::{LinkError, Platform};
use crate::logging::LogStream;
use crate::pins::{ConfigError, ENCODABLE_LINES};
use crate::sample::Sampler;
use crate::{rt_debug, rt_error, rt_info, rt_warn};

/// Host → device: start streaming.
pub const CMD_START: u8 = b's';

/// Host → device: stop streaming.
pub const CMD_STOP: u8 = b'e';

/// Device → host: start acknowledged.
pub const ACK_START: u8 = b's';

/// Session lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Idle, polling for `CMD_START`.
    WaitingForStart,
    /// Sampling and streaming.
    Running,
    /// Tearing down and re-establishing the link.
    Recovering,
}

/// Counters since boot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Sessions started.
    pub sessions: u32,
    /// Sampling iterations (all sessions).
    pub iterations: u64,
    /// Frames handed to the transport.
    pub messages_sent: u64,
    /// Transport writes carrying frames.
    pub writes: u64,
    /// Frame bytes written.
    pub bytes_sent: u64,
    /// Recovery passes.
    pub recoveries: u32,
    /// Hard link resets attempted.
    pub hard_resets: u32,
}

impl SessionStats {
    fn count_write(&mut self, messages: usize) {
        self.messages_sent += messages as u64;
        self.writes += 1;
        self.bytes_sent += (messages * MESSAGE_SIZE) as u64;
    }
}

/// The streamer.
pub struct Session<'a, P: Platform> {
    platform: P,
    config: StreamerConfig,
    sampler: Sampler,
    delivery: Delivery,
    state: SessionState,
    seq: u32,
    fault: FaultState,
    stats: SessionStats,
    log: &'a LogStream,
    last_relink_us: i64,
}

impl<'a, P: Platform> Session<'a, P> {
    /// Validate `config` and bring the link up.
    ///
    /// A link that fails to open is not fatal: the session starts in
    /// `WaitingForStart` with a fault recorded and retries on the relink
    /// interval.
    ///
    /// # Errors
    ///
    /// Any [`ConfigError`]. No session exists after a configuration error.
    pub fn new(
        mut platform: P,
        config: StreamerConfig,
        log: &'a LogStream,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let delivery = Delivery::new(config.mode, config.chunk_capacity)?;

        let now = platform.now_us();
        rt_info!(
            log,
            now,
            "config: {} lines, mode={}, chunk={}, delay={}ms",
            config.pins.len(),
            config.mode.as_str(),
            config.chunk_capacity,
            config.sample_delay_ms
        );
        if !config.pins.is_fully_encodable() {
            rt_warn!(
                log,
                now,
                "{} lines sampled, only the first {} are framed",
                config.pins.len(),
                ENCODABLE_LINES
            );
        }

        platform.write_sync(false);
        platform.write_status(false);

        let fault = FaultState::new();
        if let Err(e) = platform.open_link() {
            let code = fault.record(e);
            rt_error!(log, now, "link open failed at boot: {} ({})", e, code.as_str());
        }

        Ok(Self {
            platform,
            config,
            sampler: Sampler::new(config.pins),
            delivery,
            state: SessionState::WaitingForStart,
            seq: 0,
            fault,
            stats: SessionStats::default(),
            log,
            last_relink_us: now,
        })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Sequence number the next iteration will carry.
    pub fn sequence(&self) -> u32 {
        self.seq
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn fault(&self) -> &FaultState {
        &self.fault
    }

    pub fn config(&self) -> &StreamerConfig {
        &self.config
    }

    /// Frames waiting in the chunk buffer.
    pub fn pending(&self) -> usize {
        self.delivery.pending()
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    pub fn into_platform(self) -> P {
        self.platform
    }

    /// Run forever.
    pub fn run(&mut self) -> ! {
        loop {
            self.step();
        }
    }

    /// Do one unit of work for the current state and return the new state.
    ///
    /// - `WaitingForStart`: one poll of the inbound stream
    /// - `Running`: one sampling iteration
    /// - `Recovering`: one complete recovery pass
    pub fn step(&mut self) -> SessionState {
        match self.state {
            SessionState::WaitingForStart => self.poll_start(),
            SessionState::Running => self.iterate(),
            SessionState::Recovering => self.recover(),
        }
        self.state
    }

    /// Write pending log records to the log port.
    pub fn drain_logs(&mut self) -> usize {
        self.log.drain_to(&mut self.platform)
    }

    // --- WaitingForStart ---

    fn poll_start(&mut self) {
        while let Some(byte) = self.platform.try_read_byte() {
            if byte == CMD_START {
                self.start();
                return;
            }
            rt_debug!(self.log, self.platform.now_us(), "ignored 0x{:02x} while waiting", byte);
        }

        if !self.platform.is_open() {
            let now = self.platform.now_us();
            let interval_us = self.config.relink_interval_ms as i64 * 1000;
            if now.saturating_sub(self.last_relink_us) >= interval_us {
                rt_info!(self.log, now, "link down, retrying recovery");
                self.state = SessionState::Recovering;
                return;
            }
        }

        self.drain_logs();
    }

    fn start(&mut self) {
        if let Err(e) = self.platform.write_bytes(&[ACK_START]) {
            self.link_fault(e);
            return;
        }

        self.seq = 0;
        let prime = self.sampler.snapshot(&mut self.platform);
        self.delivery.prime(prime);
        self.platform.write_status(true);
        self.stats.sessions += 1;
        self.state = SessionState::Running;

        rt_info!(
            self.log,
            self.platform.now_us(),
            "session {} started, initial state 0x{:010x}",
            self.stats.sessions,
            prime.bits()
        );
    }

    // --- Running ---

    fn iterate(&mut self) {
        let state = self.sampler.sample(&mut self.platform);
        let seq = self.seq;
        let outcome = self.delivery.deliver(state, seq, &mut self.platform);

        self.seq = self.seq.wrapping_add(1);
        self.stats.iterations += 1;

        match outcome {
            Ok(Outcome::Sent) => self.stats.count_write(1),
            Ok(Outcome::Flushed { messages }) => self.stats.count_write(messages),
            Ok(Outcome::Skipped) | Ok(Outcome::Buffered) => {}
            Err(e) => {
                self.link_fault(e);
                return;
            }
        }

        if let Some(byte) = self.platform.try_read_byte() {
            if byte == CMD_STOP {
                self.stop();
                return;
            }
            rt_debug!(self.log, self.platform.now_us(), "ignored 0x{:02x} while running", byte);
        }

        if self.config.sample_delay_ms > 0 {
            self.platform.delay_ms(self.config.sample_delay_ms);
        }
    }

    fn stop(&mut self) {
        match self.delivery.finish(&mut self.platform) {
            Ok(0) => {}
            Ok(messages) => self.stats.count_write(messages),
            Err(e) => {
                self.link_fault(e);
                return;
            }
        }
        if let Err(e) = self.platform.flush_link() {
            self.link_fault(e);
            return;
        }

        self.platform.write_status(false);
        self.state = SessionState::Recovering;

        rt_info!(
            self.log,
            self.platform.now_us(),
            "session {} stopped after {} iterations, {} frames sent since boot",
            self.stats.sessions,
            self.seq,
            self.stats.messages_sent
        );
    }

    /// A transport call failed: record it and end the session.
    fn link_fault(&mut self, err: LinkError) {
        let code = self.fault.record(err);
        self.platform.write_status(false);
        self.state = SessionState::Recovering;

        rt_error!(
            self.log,
            self.platform.now_us(),
            "link fault at seq {}: {} ({})",
            self.seq,
            err,
            code.as_str()
        );
    }

    // --- Recovering ---

    fn recover(&mut self) {
        self.stats.recoveries += 1;
        let settle = self.config.reset_settle_ms;

        self.platform.close_link();
        self.platform.delay_ms(settle);

        let escalate = self.config.recovery == RecoveryPolicy::AlwaysReset || self.fault.is_active();
        let result = if escalate {
            self.reset_and_reopen()
        } else {
            match self.platform.open_link() {
                Ok(()) => Ok(()),
                Err(e) => {
                    rt_warn!(self.log, self.platform.now_us(), "reopen failed: {}", e);
                    self.reset_and_reopen()
                }
            }
        };

        let now = self.platform.now_us();
        match result {
            Ok(()) => {
                self.fault.clear();
                rt_info!(self.log, now, "link up, waiting for start");
            }
            Err(e) => {
                let code = self.fault.record(e);
                rt_error!(self.log, now, "link recovery failed: {} ({})", e, code.as_str());
            }
        }

        self.last_relink_us = now;
        self.state = SessionState::WaitingForStart;
        self.drain_logs();
    }

    /// Force re-enumeration, then exactly one more open.
    fn reset_and_reopen(&mut self) -> Result<(), LinkError> {
        self.stats.hard_resets += 1;
        rt_info!(self.log, self.platform.now_us(), "forcing link re-enumeration");

        if let Err(e) = self.platform.hard_reset_link() {
            self.fault.record(e);
            rt_warn!(self.log, self.platform.now_us(), "hard reset: {}", e);
        }
        self.platform.delay_ms(self.config.reset_settle_ms);

        self.platform.open_link()
    }
}
