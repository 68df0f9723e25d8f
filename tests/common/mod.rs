//! Scripted board for integration tests.
//!
//! Input levels are kept by pin position (bit i = i-th line of the pin
//! set). Each counted sample (sync rising edge) pops the next scripted
//! state, if any; snapshots read whatever is current.

#![allow(dead_code)]

use std::collections::VecDeque;

use rust_dio_streamer::link::{DigitalInputs, LinkError, LogPort, SerialLink, SignalOutputs, Timer};
use rust_dio_streamer::pins::LineId;

pub struct MockPlatform {
    pub pins: Vec<LineId>,
    pub levels: u64,
    pub script: VecDeque<u64>,

    pub sync: bool,
    pub sync_pulses: u32,
    pub status: bool,
    pub status_history: Vec<bool>,

    pub open: bool,
    pub open_calls: u32,
    pub close_calls: u32,
    pub reset_calls: u32,
    pub open_results: VecDeque<Result<(), LinkError>>,
    pub writes: Vec<Vec<u8>>,
    pub write_calls: usize,
    pub fail_write_at: Option<usize>,
    pub inbound: VecDeque<u8>,

    pub now_us: i64,
    pub delays: Vec<u32>,

    pub log: Vec<u8>,
}

impl MockPlatform {
    pub fn new(pins: &[LineId]) -> Self {
        Self {
            pins: pins.to_vec(),
            levels: 0,
            script: VecDeque::new(),
            sync: false,
            sync_pulses: 0,
            status: false,
            status_history: Vec::new(),
            open: false,
            open_calls: 0,
            close_calls: 0,
            reset_calls: 0,
            open_results: VecDeque::new(),
            writes: Vec::new(),
            write_calls: 0,
            fail_write_at: None,
            inbound: VecDeque::new(),
            now_us: 0,
            delays: Vec::new(),
            log: Vec::new(),
        }
    }

    /// Queue states for the next counted samples.
    pub fn script(&mut self, states: &[u64]) {
        self.script.extend(states.iter().copied());
    }

    /// Queue inbound bytes from the host.
    pub fn send(&mut self, bytes: &[u8]) {
        self.inbound.extend(bytes.iter().copied());
    }

    /// Everything written, concatenated.
    pub fn wire(&self) -> Vec<u8> {
        self.writes.concat()
    }

    pub fn log_text(&self) -> String {
        String::from_utf8_lossy(&self.log).into_owned()
    }
}

impl DigitalInputs for MockPlatform {
    fn read_line(&mut self, line: LineId) -> bool {
        match self.pins.iter().position(|&l| l == line) {
            Some(i) => self.levels & (1u64 << i) != 0,
            None => false,
        }
    }
}

impl SignalOutputs for MockPlatform {
    fn write_sync(&mut self, level: bool) {
        if level && !self.sync {
            self.sync_pulses += 1;
            if let Some(next) = self.script.pop_front() {
                self.levels = next;
            }
        }
        self.sync = level;
    }

    fn write_status(&mut self, running: bool) {
        self.status = running;
        self.status_history.push(running);
    }
}

impl SerialLink for MockPlatform {
    fn open_link(&mut self) -> Result<(), LinkError> {
        self.open_calls += 1;
        let result = self.open_results.pop_front().unwrap_or(Ok(()));
        if result.is_ok() {
            self.open = true;
        }
        result
    }

    fn close_link(&mut self) {
        self.close_calls += 1;
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn write_bytes(&mut self, buf: &[u8]) -> Result<(), LinkError> {
        if !self.open {
            return Err(LinkError::NotOpen);
        }
        let call = self.write_calls;
        self.write_calls += 1;
        if self.fail_write_at == Some(call) {
            return Err(LinkError::Stalled {
                written: 0,
                expected: buf.len(),
            });
        }
        self.writes.push(buf.to_vec());
        Ok(())
    }

    fn try_read_byte(&mut self) -> Option<u8> {
        if !self.open {
            return None;
        }
        self.inbound.pop_front()
    }

    fn hard_reset_link(&mut self) -> Result<(), LinkError> {
        self.reset_calls += 1;
        self.open = false;
        Ok(())
    }
}

impl Timer for MockPlatform {
    fn now_us(&self) -> i64 {
        self.now_us
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delays.push(ms);
        self.now_us += ms as i64 * 1000;
    }
}

impl LogPort for MockPlatform {
    fn write_log(&mut self, bytes: &[u8]) {
        self.log.extend_from_slice(bytes);
    }
}
