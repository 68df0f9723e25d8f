//! NVS overrides for the streamer configuration, with schema versioning.
//!
//! Values are provisioned into flash (e.g. with `nvs_partition_gen`) and
//! read once at boot. Anything missing keeps the board default.
//!
//! # Version History
//!
//! - **v1** (current): delay_ms, mode, chunk_cap, recovery, pins (blob)

use core::cmp::Ordering;
use core::fmt;

use super::{RecoveryPolicy, StreamerConfig};
use crate::delivery::DeliveryMode;
use crate::pins::{ConfigError, PinSet};

#[cfg(target_os = "espidf")]
use crate::pins::MAX_LINES;

#[cfg(target_os = "espidf")]
use esp_idf_svc::nvs::*;
#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::EspError;

/// Current NVS schema version
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// NVS namespace for streamer configuration
pub const NVS_NAMESPACE: &str = "dio_cfg";

/// NVS keys
pub mod nvs_keys {
    pub const VERSION: &str = "schema_ver";
    pub const DELAY_MS: &str = "delay_ms";
    pub const MODE: &str = "mode";
    pub const CHUNK_CAP: &str = "chunk_cap";
    pub const RECOVERY: &str = "recovery";
    pub const PINS: &str = "pins";
}

/// Load result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationResult {
    /// Fresh install, defaults stamped into flash
    FreshInstall,
    /// Schema up-to-date, overrides applied
    UpToDate,
}

/// NVS operation errors
#[derive(Debug)]
pub enum NvsError {
    /// NVS read/write error
    #[cfg(target_os = "espidf")]
    Io(EspError),
    /// Schema version too new (downgrade not supported)
    TooNew { stored_version: u32 },
    /// Stored values do not form a valid configuration
    Invalid(ConfigError),
    /// Feature not available on this platform
    #[cfg(not(target_os = "espidf"))]
    NotAvailable,
}

#[cfg(target_os = "espidf")]
impl From<EspError> for NvsError {
    fn from(e: EspError) -> Self {
        NvsError::Io(e)
    }
}

impl From<ConfigError> for NvsError {
    fn from(e: ConfigError) -> Self {
        NvsError::Invalid(e)
    }
}

impl fmt::Display for NvsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            #[cfg(target_os = "espidf")]
            NvsError::Io(e) => write!(f, "NVS I/O: {}", e),
            NvsError::TooNew { stored_version } => write!(
                f,
                "NVS schema v{} newer than supported v{}",
                stored_version, CURRENT_SCHEMA_VERSION
            ),
            NvsError::Invalid(e) => write!(f, "NVS config invalid: {}", e),
            #[cfg(not(target_os = "espidf"))]
            NvsError::NotAvailable => write!(f, "NVS not available on this platform"),
        }
    }
}

/// Raw values read from flash. `None` = key absent.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoredValues<'a> {
    pub delay_ms: Option<u32>,
    pub mode: Option<u8>,
    pub chunk_cap: Option<u32>,
    pub recovery: Option<u8>,
    pub pins: Option<&'a [u8]>,
}

/// Apply stored values over `base` and validate the result.
///
/// Unknown enum codes keep the base value; a bad pin list is an error.
pub fn apply_overrides(
    base: StreamerConfig,
    stored: &StoredValues<'_>,
) -> Result<StreamerConfig, ConfigError> {
    let mut config = base;

    if let Some(pins) = stored.pins {
        config.pins = PinSet::new(pins)?;
    }
    if let Some(delay) = stored.delay_ms {
        config.sample_delay_ms = delay;
    }
    if let Some(mode) = stored.mode.and_then(DeliveryMode::from_u8) {
        config.mode = mode;
    }
    if let Some(cap) = stored.chunk_cap {
        config.chunk_capacity = cap as usize;
    }
    if let Some(recovery) = stored.recovery.and_then(RecoveryPolicy::from_u8) {
        config.recovery = recovery;
    }

    config.validate()?;
    Ok(config)
}

/// Decide what to do with the stored schema version.
pub fn check_version(stored_version: u32) -> Result<MigrationResult, NvsError> {
    match stored_version.cmp(&CURRENT_SCHEMA_VERSION) {
        Ordering::Equal => Ok(MigrationResult::UpToDate),
        // 0 = key absent; there is no older schema to migrate from yet
        Ordering::Less => Ok(MigrationResult::FreshInstall),
        Ordering::Greater => Err(NvsError::TooNew { stored_version }),
    }
}

/// Load configuration overrides from NVS
///
/// # Returns
///
/// - `Ok((config, FreshInstall))`: nothing stored, defaults written back
/// - `Ok((config, UpToDate))`: stored overrides applied
/// - `Err(NvsError::TooNew)`: schema version too new
/// - `Err(NvsError)`: other NVS errors or an invalid stored config
#[cfg(target_os = "espidf")]
pub fn load_config(base: StreamerConfig) -> Result<(StreamerConfig, MigrationResult), NvsError> {
    let nvs_default = EspDefaultNvsPartition::take()?;
    let mut storage = EspNvs::new(nvs_default, NVS_NAMESPACE, true)?;

    let stored_version = storage.get_u32(nvs_keys::VERSION)?.unwrap_or(0);

    match check_version(stored_version)? {
        MigrationResult::UpToDate => {
            let mut pin_buf = [0u8; MAX_LINES];
            let stored = StoredValues {
                delay_ms: storage.get_u32(nvs_keys::DELAY_MS)?,
                mode: storage.get_u8(nvs_keys::MODE)?,
                chunk_cap: storage.get_u32(nvs_keys::CHUNK_CAP)?,
                recovery: storage.get_u8(nvs_keys::RECOVERY)?,
                pins: storage.get_raw(nvs_keys::PINS, &mut pin_buf)?,
            };
            let config = apply_overrides(base, &stored)?;
            Ok((config, MigrationResult::UpToDate))
        }
        MigrationResult::FreshInstall => {
            save_config(&mut storage, &base)?;
            Ok((base, MigrationResult::FreshInstall))
        }
    }
}

/// Stub for non-ESP platforms
#[cfg(not(target_os = "espidf"))]
pub fn load_config(_base: StreamerConfig) -> Result<(StreamerConfig, MigrationResult), NvsError> {
    Err(NvsError::NotAvailable)
}

#[cfg(target_os = "espidf")]
fn save_config(storage: &mut EspNvs<NvsDefault>, config: &StreamerConfig) -> Result<(), NvsError> {
    storage.set_u32(nvs_keys::DELAY_MS, config.sample_delay_ms)?;
    storage.set_u8(nvs_keys::MODE, config.mode as u8)?;
    storage.set_u32(nvs_keys::CHUNK_CAP, config.chunk_capacity as u32)?;
    storage.set_u8(nvs_keys::RECOVERY, config.recovery as u8)?;
    storage.set_raw(nvs_keys::PINS, config.pins.as_slice())?;

    // Version last: a torn write reads back as a fresh install
    storage.set_u32(nvs_keys::VERSION, CURRENT_SCHEMA_VERSION)?;
    Ok(())
}
