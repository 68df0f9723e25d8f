//! Integration tests for the session state machine
//!
//! Drives a `Session` over a scripted board:
//! - Start/stop handshake and status line
//! - Change-Triggered and Chunked delivery end to end
//! - Link faults, recovery escalation and relink retries

mod common;

use common::MockPlatform;
use rust_dio_streamer::config::{RecoveryPolicy, StreamerConfig};
use rust_dio_streamer::delivery::DeliveryMode;
use rust_dio_streamer::fault::FaultCode;
use rust_dio_streamer::frame::{decode, frames, MESSAGE_SIZE};
use rust_dio_streamer::link::LinkError;
use rust_dio_streamer::logging::LogStream;
use rust_dio_streamer::pins::{ConfigError, PinSet};
use rust_dio_streamer::session::{Session, SessionState, ACK_START};

const PINS: [u8; 4] = [10, 11, 12, 13];

fn config(mode: DeliveryMode) -> StreamerConfig {
    let mut config = StreamerConfig::with_pins(PinSet::new(&PINS).unwrap());
    config.mode = mode;
    config
}

fn chunked(capacity: usize) -> StreamerConfig {
    let mut config = config(DeliveryMode::Chunked);
    config.chunk_capacity = capacity;
    config
}

/// Boot, receive 's', and return the running session.
fn started<'a>(
    mut platform: MockPlatform,
    config: StreamerConfig,
    log: &'a LogStream,
) -> Session<'a, MockPlatform> {
    platform.send(b"s");
    let mut session = Session::new(platform, config, log).unwrap();
    assert_eq!(session.state(), SessionState::WaitingForStart);
    assert_eq!(session.step(), SessionState::Running);
    session
}

/// Frames written after the start ack, decoded.
fn sent_frames(platform: &MockPlatform) -> Vec<(u32, u64)> {
    let wire = platform.wire();
    assert_eq!(wire[0], ACK_START);
    frames(&wire[1..])
        .map(|f| {
            let (seq, state) = f.unwrap();
            (seq, state.bits())
        })
        .collect()
}

// ============================================================================
// Handshake
// ============================================================================

#[test]
fn test_boot_opens_link_and_waits() {
    let log: LogStream = LogStream::new();
    let session = Session::new(MockPlatform::new(&PINS), config(DeliveryMode::ChangeTriggered), &log)
        .unwrap();

    assert_eq!(session.state(), SessionState::WaitingForStart);
    assert!(session.platform().open);
    assert_eq!(session.platform().open_calls, 1);
    assert!(!session.platform().status);
    assert!(!session.platform().sync);
    assert!(!session.fault().is_active());
}

#[test]
fn test_start_acks_and_raises_status() {
    let log: LogStream = LogStream::new();
    let session = started(MockPlatform::new(&PINS), config(DeliveryMode::ChangeTriggered), &log);

    assert_eq!(session.platform().writes, vec![vec![ACK_START]]);
    assert!(session.platform().status);
    assert_eq!(session.sequence(), 0);
    assert_eq!(session.stats().sessions, 1);
    // Priming snapshot is not a counted sample
    assert_eq!(session.platform().sync_pulses, 0);
}

#[test]
fn test_other_bytes_ignored_while_waiting() {
    let log: LogStream = LogStream::new();
    let mut platform = MockPlatform::new(&PINS);
    platform.send(b"xe\n");
    let mut session = Session::new(platform, config(DeliveryMode::ChangeTriggered), &log).unwrap();

    assert_eq!(session.step(), SessionState::WaitingForStart);
    assert!(session.platform().writes.is_empty());

    session.platform_mut().send(b"?s");
    assert_eq!(session.step(), SessionState::Running);
}

#[test]
fn test_other_bytes_ignored_while_running() {
    let log: LogStream = LogStream::new();
    let mut session = started(MockPlatform::new(&PINS), config(DeliveryMode::ChangeTriggered), &log);

    session.platform_mut().send(b"s");
    assert_eq!(session.step(), SessionState::Running);
    session.platform_mut().send(b"x");
    assert_eq!(session.step(), SessionState::Running);
    assert_eq!(session.sequence(), 2);
}

#[test]
fn test_failed_ack_ends_in_recovery() {
    let log: LogStream = LogStream::new();
    let mut platform = MockPlatform::new(&PINS);
    platform.fail_write_at = Some(0);
    platform.send(b"s");
    let mut session = Session::new(platform, config(DeliveryMode::ChangeTriggered), &log).unwrap();

    assert_eq!(session.step(), SessionState::Recovering);
    assert_eq!(session.stats().sessions, 0);
    assert_eq!(session.fault().code(), FaultCode::WriteStall);
}

// ============================================================================
// Change-Triggered
// ============================================================================

#[test]
fn test_change_triggered_example() {
    // Primed with [0,1,0,0]; samples [0,1,0,0], [0,1,0,0], [1,1,0,0]
    let log: LogStream = LogStream::new();
    let mut platform = MockPlatform::new(&PINS);
    platform.levels = 0b0010;
    platform.script(&[0b0010, 0b0010, 0b0011]);
    let mut session = started(platform, config(DeliveryMode::ChangeTriggered), &log);

    for _ in 0..3 {
        assert_eq!(session.step(), SessionState::Running);
    }

    let writes = &session.platform().writes;
    assert_eq!(writes.len(), 2);
    assert_eq!(writes[1].len(), MESSAGE_SIZE);

    let (seq, state) = decode(&writes[1]).unwrap();
    assert_eq!(seq, 2);
    assert_eq!(state.bits(), 0b0011);
    assert_eq!(session.sequence(), 3);
    assert_eq!(session.stats().messages_sent, 1);
}

#[test]
fn test_sequence_advances_once_per_iteration() {
    let log: LogStream = LogStream::new();
    let mut platform = MockPlatform::new(&PINS);
    // Every sample differs from the one before
    platform.script(&[1, 0, 1, 0, 1, 0, 1, 0, 1, 0]);
    let mut session = started(platform, config(DeliveryMode::ChangeTriggered), &log);

    for _ in 0..10 {
        session.step();
    }

    let seqs: Vec<u32> = sent_frames(session.platform()).iter().map(|&(s, _)| s).collect();
    assert_eq!(seqs, (0..10).collect::<Vec<u32>>());
    assert_eq!(session.platform().sync_pulses, 10);
    assert!(!session.platform().sync);
}

#[test]
fn test_frames_match_adjacent_changes() {
    let log: LogStream = LogStream::new();
    let script = [0, 0, 1, 1, 1, 2, 2, 0];
    let mut platform = MockPlatform::new(&PINS);
    platform.script(&script);
    let mut session = started(platform, config(DeliveryMode::ChangeTriggered), &log);

    for _ in 0..script.len() {
        session.step();
    }

    assert_eq!(sent_frames(session.platform()), vec![(2, 1), (5, 2), (7, 0)]);
    assert_eq!(session.stats().iterations, script.len() as u64);
}

#[test]
fn test_restart_resets_sequence_and_baseline() {
    let log: LogStream = LogStream::new();
    let mut platform = MockPlatform::new(&PINS);
    platform.script(&[1, 1]);
    let mut session = started(platform, config(DeliveryMode::ChangeTriggered), &log);

    session.step();
    session.step();
    session.platform_mut().send(b"e");
    assert_eq!(session.step(), SessionState::Recovering);
    assert_eq!(session.step(), SessionState::WaitingForStart);

    // Lines still at 1: the new baseline, so no frame until they change
    session.platform_mut().script(&[1, 3]);
    session.platform_mut().send(b"s");
    assert_eq!(session.step(), SessionState::Running);
    assert_eq!(session.sequence(), 0);
    session.step();
    session.step();

    let last = session.platform().writes.last().unwrap().clone();
    assert_eq!(decode(&last).unwrap().0, 1);
    assert_eq!(session.stats().sessions, 2);
}

// ============================================================================
// Chunked
// ============================================================================

#[test]
fn test_chunked_full_and_partial_flushes() {
    let log: LogStream = LogStream::new();
    let mut session = started(MockPlatform::new(&PINS), chunked(3), &log);

    for i in 0..7 {
        if i == 6 {
            session.platform_mut().send(b"e");
        }
        session.step();
    }
    assert_eq!(session.state(), SessionState::Recovering);

    let sizes: Vec<usize> = session.platform().writes.iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![1, 3 * MESSAGE_SIZE, 3 * MESSAGE_SIZE, MESSAGE_SIZE]);

    let seqs: Vec<u32> = sent_frames(session.platform()).iter().map(|&(s, _)| s).collect();
    assert_eq!(seqs, (0..7).collect::<Vec<u32>>());

    let stats = session.stats();
    assert_eq!(stats.messages_sent, 7);
    assert_eq!(stats.writes, 3);
    assert_eq!(stats.bytes_sent, 77);
    assert_eq!(session.pending(), 0);
}

#[test]
fn test_chunked_sends_unchanged_samples() {
    let log: LogStream = LogStream::new();
    let mut platform = MockPlatform::new(&PINS);
    platform.levels = 0b1111;
    let mut session = started(platform, chunked(2), &log);

    session.step();
    session.step();

    assert_eq!(sent_frames(session.platform()), vec![(0, 0b1111), (1, 0b1111)]);
}

#[test]
fn test_chunked_exact_multiple_has_no_trailing_write() {
    let log: LogStream = LogStream::new();
    let mut session = started(MockPlatform::new(&PINS), chunked(2), &log);

    session.step();
    session.platform_mut().send(b"e");
    session.step();

    assert_eq!(session.state(), SessionState::Recovering);
    assert_eq!(session.platform().writes.len(), 2);
}

#[test]
fn test_stop_lowers_status() {
    let log: LogStream = LogStream::new();
    let mut session = started(MockPlatform::new(&PINS), chunked(100), &log);

    session.platform_mut().send(b"e");
    session.step();

    assert_eq!(session.platform().status_history, vec![false, true, false]);
}

// ============================================================================
// Recovery
// ============================================================================

#[test]
fn test_clean_stop_reopens_without_reset() {
    let log: LogStream = LogStream::new();
    let mut session = started(MockPlatform::new(&PINS), config(DeliveryMode::ChangeTriggered), &log);

    session.platform_mut().send(b"e");
    session.step();
    assert_eq!(session.step(), SessionState::WaitingForStart);

    let p = session.platform();
    assert_eq!(p.close_calls, 1);
    assert_eq!(p.reset_calls, 0);
    assert_eq!(p.open_calls, 2);
    assert!(p.open);
    assert!(p.delays.contains(&1000));
    assert_eq!(session.stats().recoveries, 1);
}

#[test]
fn test_always_reset_policy() {
    let log: LogStream = LogStream::new();
    let mut cfg = config(DeliveryMode::ChangeTriggered);
    cfg.recovery = RecoveryPolicy::AlwaysReset;
    let mut session = started(MockPlatform::new(&PINS), cfg, &log);

    session.platform_mut().send(b"e");
    session.step();
    session.step();

    assert_eq!(session.platform().reset_calls, 1);
    assert_eq!(session.platform().open_calls, 2);
    assert_eq!(session.stats().hard_resets, 1);
}

#[test]
fn test_write_stall_escalates_to_reset() {
    let log: LogStream = LogStream::new();
    let mut platform = MockPlatform::new(&PINS);
    platform.script(&[1]);
    platform.fail_write_at = Some(1);
    let mut session = started(platform, config(DeliveryMode::ChangeTriggered), &log);

    assert_eq!(session.step(), SessionState::Recovering);
    assert!(session.fault().is_active());
    assert_eq!(session.fault().code(), FaultCode::WriteStall);
    assert!(!session.platform().status);

    assert_eq!(session.step(), SessionState::WaitingForStart);
    let p = session.platform();
    assert_eq!(p.reset_calls, 1);
    // Exactly one open after the reset
    assert_eq!(p.open_calls, 2);
    assert!(p.open);
    assert!(!session.fault().is_active());
    assert_eq!(session.fault().count(), 1);
}

#[test]
fn test_failed_reopen_falls_back_to_reset() {
    let log: LogStream = LogStream::new();
    let mut platform = MockPlatform::new(&PINS);
    platform.open_results.extend([Ok(()), Err(LinkError::OpenFailed)]);
    let mut session = started(platform, config(DeliveryMode::ChangeTriggered), &log);

    session.platform_mut().send(b"e");
    session.step();
    assert_eq!(session.step(), SessionState::WaitingForStart);

    let p = session.platform();
    assert_eq!(p.open_calls, 3);
    assert_eq!(p.reset_calls, 1);
    assert!(p.open);
}

#[test]
fn test_failed_recovery_retries_after_interval() {
    let log: LogStream = LogStream::new();
    let mut platform = MockPlatform::new(&PINS);
    platform
        .open_results
        .extend([Ok(()), Err(LinkError::OpenFailed), Err(LinkError::OpenFailed)]);
    let mut session = started(platform, config(DeliveryMode::ChangeTriggered), &log);

    session.platform_mut().send(b"e");
    session.step();
    assert_eq!(session.step(), SessionState::WaitingForStart);
    assert!(!session.platform().open);
    assert_eq!(session.fault().code(), FaultCode::OpenFailed);

    // Link down, interval not elapsed
    assert_eq!(session.step(), SessionState::WaitingForStart);
    session.platform_mut().now_us += 4_999_000;
    assert_eq!(session.step(), SessionState::WaitingForStart);

    session.platform_mut().now_us += 1_000;
    assert_eq!(session.step(), SessionState::Recovering);
    assert_eq!(session.step(), SessionState::WaitingForStart);
    assert!(session.platform().open);
    assert!(!session.fault().is_active());
}

#[test]
fn test_boot_open_failure_is_not_fatal() {
    let log: LogStream = LogStream::new();
    let mut platform = MockPlatform::new(&PINS);
    platform.open_results.push_back(Err(LinkError::OpenFailed));
    let mut session = Session::new(platform, config(DeliveryMode::ChangeTriggered), &log).unwrap();

    assert_eq!(session.state(), SessionState::WaitingForStart);
    assert!(session.fault().is_active());

    session.platform_mut().now_us += 5_000_000;
    assert_eq!(session.step(), SessionState::Recovering);
    assert_eq!(session.step(), SessionState::WaitingForStart);
    assert_eq!(session.platform().reset_calls, 1);
    assert!(session.platform().open);
}

// ============================================================================
// Configuration and logging
// ============================================================================

#[test]
fn test_invalid_config_rejected() {
    let log: LogStream = LogStream::new();
    let result = Session::new(MockPlatform::new(&PINS), chunked(0), &log);
    assert!(matches!(result, Err(ConfigError::ZeroChunkCapacity)));
}

#[test]
fn test_sample_delay_applied_per_iteration() {
    let log: LogStream = LogStream::new();
    let mut cfg = config(DeliveryMode::ChangeTriggered);
    cfg.sample_delay_ms = 2;
    let mut session = started(MockPlatform::new(&PINS), cfg, &log);

    session.step();
    session.step();

    assert_eq!(session.platform().delays, vec![2, 2]);
}

#[test]
fn test_wide_pin_set_warns() {
    let log: LogStream = LogStream::new();
    let lines: Vec<u8> = (0..41).collect();
    let cfg = StreamerConfig::with_pins(PinSet::new(&lines).unwrap());
    let mut session = Session::new(MockPlatform::new(&lines), cfg, &log).unwrap();

    session.drain_logs();
    assert!(session.platform().log_text().contains("only the first 40"));
}

#[test]
fn test_logs_drained_outside_running() {
    let log: LogStream = LogStream::new();
    let mut session = started(MockPlatform::new(&PINS), config(DeliveryMode::ChangeTriggered), &log);

    session.step();
    assert!(!session.platform().log_text().contains("session 1 started"));

    session.platform_mut().send(b"e");
    session.step();
    session.step();

    let text = session.platform().log_text();
    assert!(text.contains("session 1 started"));
    assert!(text.contains("stopped"));
    assert!(text.contains("link up"));
}
