//! Engine configuration.
//!
//! Every field has a default, so a configuration file only needs to name what
//! it changes:
//!
//! ```
//! use ironstream::config::{EngineConfig, MinTsPolicy};
//!
//! let cfg = EngineConfig::from_json_str(r#"{ "window_size_ms": 5000, "min_ts_policy": "first_window" }"#)?;
//! assert_eq!(cfg.window_size_ms, 5000);
//! assert_eq!(cfg.min_ts_policy, MinTsPolicy::FirstWindow);
//! assert!(cfg.purge);
//! # anyhow::Result::<()>::Ok(())
//! ```

use crate::runner::ExecMode;
use crate::window::DurationMs;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How a reducer recomputes its retained `min_ts` after purging windows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MinTsPolicy {
    /// Inspect only the oldest remaining window. Cheap, but late data landing
    /// in a newer window can hold a smaller timestamp than the oldest window.
    FirstWindow,
    /// Take the minimum over every remaining window.
    #[default]
    ScanAll,
}

/// What a watermark does when asked to move backwards.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegressionPolicy {
    /// Log a warning and keep the current (higher) watermark.
    #[default]
    Warn,
    /// Treat regression as a broken invariant and panic.
    Strict,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Size of every fixed window.
    pub window_size_ms: DurationMs,
    /// Whether reducers drop windows from their state once fired.
    pub purge: bool,
    pub min_ts_policy: MinTsPolicy,
    pub regression_policy: RegressionPolicy,
    pub exec_mode: ExecMode,
    /// Minimum spacing between sink throughput reports.
    pub report_interval_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window_size_ms: 1_000,
            purge: true,
            min_ts_policy: MinTsPolicy::default(),
            regression_policy: RegressionPolicy::default(),
            exec_mode: ExecMode::default(),
            report_interval_ms: 1_000,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or a value is out of range.
    pub fn from_json_str(s: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(s).context("parsing engine config")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load and validate a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or fails validation.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading engine config {}", path.display()))?;
        Self::from_json_str(&raw)
    }

    /// # Errors
    ///
    /// Returns an error if `window_size_ms` is not positive or the thread count is zero.
    pub fn validate(&self) -> Result<()> {
        if self.window_size_ms <= 0 {
            bail!("window_size_ms must be positive, got {}", self.window_size_ms);
        }
        if let ExecMode::Parallel { threads: Some(0) } = self.exec_mode {
            bail!("exec_mode.threads must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_positive_window() {
        let err = EngineConfig::from_json_str(r#"{ "window_size_ms": 0 }"#).unwrap_err();
        assert!(err.to_string().contains("window_size_ms"));
    }

    #[test]
    fn empty_object_is_default() -> Result<()> {
        assert_eq!(EngineConfig::from_json_str("{}")?, EngineConfig::default());
        Ok(())
    }
}
