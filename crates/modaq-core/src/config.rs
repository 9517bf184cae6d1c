//! Per-run scan configuration.
//!
//! The engine takes a [`ScanConfig`] by value when a run starts; the
//! configuration is immutable for the duration of the run. Changing a
//! value requires starting a new run — there is no shared mutable
//! settings tree.
//!
//! Values can be loaded from a TOML file with `MODAQ_SCAN_*` environment
//! overrides (figment), or built in code via the `Default` impl.

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{ScanError, ScanResult};

/// Compression filter settings applied to newly created arrays.
///
/// Filters are stamped on arrays at creation time as attributes; changing
/// them later does not retroactively recompress existing arrays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreFilters {
    /// Codec name (e.g. "zlib", "none").
    pub compression_kind: String,
    /// Codec level, codec-specific meaning.
    pub compression_level: u8,
}

impl Default for StoreFilters {
    fn default() -> Self {
        Self {
            compression_kind: "zlib".to_string(),
            compression_level: 5,
        }
    }
}

/// Immutable per-run configuration consumed by the scan engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Number of times the whole scan is repeated and stored along a
    /// leading averaging dimension. Must be >= 1.
    pub averages: usize,
    /// Deadline for all actuators to acknowledge a move.
    pub move_timeout_ms: u64,
    /// Deadline for all detectors to acknowledge a grab.
    pub grab_timeout_ms: u64,
    /// Optional settle delay between move completion and grab start.
    pub wait_between_move_and_grab_ms: u64,
    /// Optional delay after each scan step.
    pub wait_after_step_ms: u64,
    /// Compression filters for newly created arrays.
    pub filters: StoreFilters,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            averages: 1,
            move_timeout_ms: 10_000,
            grab_timeout_ms: 10_000,
            wait_between_move_and_grab_ms: 0,
            wait_after_step_ms: 0,
            filters: StoreFilters::default(),
        }
    }
}

impl ScanConfig {
    /// Load from a TOML file, with `MODAQ_SCAN_*` environment overrides.
    pub fn load(path: impl AsRef<Path>) -> ScanResult<Self> {
        let config: ScanConfig = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("MODAQ_SCAN_"))
            .extract()
            .map_err(|e| ScanError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that parse but are semantically invalid.
    pub fn validate(&self) -> ScanResult<()> {
        if self.averages == 0 {
            return Err(ScanError::Config("averages must be >= 1".to_string()));
        }
        Ok(())
    }

    pub fn move_timeout(&self) -> Duration {
        Duration::from_millis(self.move_timeout_ms)
    }

    pub fn grab_timeout(&self) -> Duration {
        Duration::from_millis(self.grab_timeout_ms)
    }

    pub fn wait_between_move_and_grab(&self) -> Duration {
        Duration::from_millis(self.wait_between_move_and_grab_ms)
    }

    pub fn wait_after_step(&self) -> Duration {
        Duration::from_millis(self.wait_after_step_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = ScanConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.averages, 1);
        assert_eq!(config.move_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn zero_averages_rejected() {
        let config = ScanConfig {
            averages: 0,
            ..ScanConfig::default()
        };
        assert!(matches!(config.validate(), Err(ScanError::Config(_))));
    }

    #[test]
    fn load_from_toml() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            "averages = 3\nmove_timeout_ms = 500\n\n[filters]\ncompression_kind = \"none\"\ncompression_level = 0"
        )
        .unwrap();

        let config = ScanConfig::load(file.path()).unwrap();
        assert_eq!(config.averages, 3);
        assert_eq!(config.move_timeout_ms, 500);
        // Unset keys fall back to defaults.
        assert_eq!(config.grab_timeout_ms, 10_000);
        assert_eq!(config.filters.compression_kind, "none");
    }
}
