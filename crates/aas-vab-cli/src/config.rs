//! CLI configuration.

use aas_vab_provider::ProviderConfig;
use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;

/// CLI configuration.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// Submodel to serve instead of the built-in demo
    pub submodel_file: Option<PathBuf>,

    /// Provider settings
    pub provider: ProviderConfig,
}

impl CliConfig {
    /// Load configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `VAB_SUBMODEL_FILE`: JSON submodel file
    /// - `VAB_ASYNC_TIMEOUT_MS`: async invocation wait bound in milliseconds,
    ///   must be positive
    /// - `VAB_RESULT_RETENTION_MS`: how long unpolled results are kept,
    ///   `0` keeps them until polled
    ///
    /// # Errors
    ///
    /// Returns error if a variable holds an invalid value.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = lookup("VAB_SUBMODEL_FILE") {
            config.submodel_file = Some(PathBuf::from(path));
        }

        if let Some(ms) = lookup("VAB_ASYNC_TIMEOUT_MS") {
            let ms: u64 = ms.trim().parse().context("Invalid VAB_ASYNC_TIMEOUT_MS")?;
            if ms == 0 {
                bail!("VAB_ASYNC_TIMEOUT_MS must be greater than 0");
            }
            config.provider = config.provider.with_async_timeout(Duration::from_millis(ms));
        }

        if let Some(ms) = lookup("VAB_RESULT_RETENTION_MS") {
            let ms: u64 = ms.trim().parse().context("Invalid VAB_RESULT_RETENTION_MS")?;
            config.provider = config
                .provider
                .with_result_retention(Duration::from_millis(ms));
        }

        Ok(config)
    }

    /// Read the configured submodel file, if any.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or is not JSON.
    pub fn load_submodel(&self) -> Result<Option<Value>> {
        let Some(path) = &self.submodel_file else {
            return Ok(None);
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let submodel = serde_json::from_str(&text)
            .with_context(|| format!("Invalid submodel JSON in {}", path.display()))?;
        Ok(Some(submodel))
    }
}
