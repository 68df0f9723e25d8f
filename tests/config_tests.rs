//! Integration tests for configuration
//!
//! Tests board defaults, pin set validation and NVS override handling.

use rust_dio_streamer::config::board;
use rust_dio_streamer::config::nvs::{self, apply_overrides, check_version, MigrationResult, NvsError, StoredValues};
use rust_dio_streamer::config::{RecoveryPolicy, StreamerConfig};
use rust_dio_streamer::delivery::{DeliveryMode, MAX_CHUNK_MESSAGES};
use rust_dio_streamer::pins::{ConfigError, PinSet, ENCODABLE_LINES, MAX_LINES};

#[test]
fn test_board_defaults() {
    let config = StreamerConfig::board_default().unwrap();

    assert_eq!(config.pins.as_slice(), &board::INPUT_LINES);
    assert!(config.pins.len() <= ENCODABLE_LINES);
    assert_eq!(config.chunk_capacity, 100);
    assert_eq!(config.recovery, RecoveryPolicy::ReopenFirst);
    assert_eq!(config.reset_settle_ms, 1000);
    assert!(config.validate().is_ok());
}

#[test]
fn test_pin_set_validation() {
    assert_eq!(PinSet::new(&[]), Err(ConfigError::EmptyPinSet));
    assert_eq!(PinSet::new(&[3, 4, 3]), Err(ConfigError::DuplicateLine { line: 3 }));

    let too_many: Vec<u8> = (0..=MAX_LINES as u8).collect();
    assert_eq!(
        PinSet::new(&too_many),
        Err(ConfigError::TooManyLines { count: MAX_LINES + 1 })
    );

    let all: Vec<u8> = (0..MAX_LINES as u8).collect();
    let pins = PinSet::new(&all).unwrap();
    assert!(!pins.is_fully_encodable());
    assert_eq!(pins.mask(), u64::MAX);
}

#[test]
fn test_pin_order_preserved() {
    let pins = PinSet::new(&[40, 2, 17]).unwrap();
    assert_eq!(pins.get(0), Some(40));
    assert_eq!(pins.position(17), Some(2));
    assert_eq!(pins.get(3), None);
}

#[test]
fn test_error_messages() {
    let msg = ConfigError::ChunkCapacityTooLarge { capacity: 300, max: MAX_CHUNK_MESSAGES }.to_string();
    assert!(msg.contains("300"));
    assert!(msg.contains("256"));
    assert_eq!(ConfigError::DuplicateLine { line: 9 }.to_string(), "line 9 listed twice");
}

#[test]
fn test_nvs_version_handling() {
    assert_eq!(check_version(0).unwrap(), MigrationResult::FreshInstall);
    assert_eq!(check_version(nvs::CURRENT_SCHEMA_VERSION).unwrap(), MigrationResult::UpToDate);

    let err = check_version(nvs::CURRENT_SCHEMA_VERSION + 1).unwrap_err();
    assert!(err.to_string().contains("newer"));
}

#[test]
fn test_nvs_overrides_build_chunked_config() {
    let base = StreamerConfig::board_default().unwrap();
    let stored = StoredValues {
        mode: Some(DeliveryMode::Chunked as u8),
        chunk_cap: Some(64),
        pins: Some(&[4, 5, 6]),
        ..Default::default()
    };

    let config = apply_overrides(base, &stored).unwrap();
    assert_eq!(config.mode, DeliveryMode::Chunked);
    assert_eq!(config.chunk_capacity, 64);
    assert_eq!(config.pins.len(), 3);
    assert_eq!(config.sample_delay_ms, base.sample_delay_ms);
}

#[test]
fn test_nvs_oversized_chunk_rejected() {
    let base = StreamerConfig::board_default().unwrap();
    let stored = StoredValues {
        mode: Some(DeliveryMode::Chunked as u8),
        chunk_cap: Some(10_000),
        ..Default::default()
    };
    assert!(matches!(
        apply_overrides(base, &stored),
        Err(ConfigError::ChunkCapacityTooLarge { capacity: 10_000, .. })
    ));
}

#[test]
fn test_nvs_unavailable_on_host() {
    let base = StreamerConfig::board_default().unwrap();
    assert!(matches!(nvs::load_config(base), Err(NvsError::NotAvailable)));
}
