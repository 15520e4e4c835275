use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::{RefreshError, RefreshResult};
use crate::types::SelectionRequest;

/// Seconds an outlet must have gone without updating before it is refreshed again.
pub const DEFAULT_STALE_AFTER_SECS: i64 = 300;

/// Locality threshold used when a country is set without a percentage.
pub const DEFAULT_LOCAL_PERCENTAGE: f64 = 0.0;

/// Process configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshConfig {
    /// Home country the locality filter compares against.
    pub country: Option<String>,
    /// JSON file holding the outlet id whitelist.
    pub whitelist_path: Option<PathBuf>,
    pub local_percentage: Option<f64>,
    pub stale_after_secs: i64,
    pub database_url: Option<String>,
}

impl RefreshConfig {
    /// Load configuration from the process environment (and `.env`, when present).
    pub fn from_env() -> RefreshResult<Self> {
        dotenvy::dotenv().ok();
        let config = Self::from_lookup(|key| std::env::var(key).ok())?;
        config.log_redacted();
        Ok(config)
    }

    /// Build configuration from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> RefreshResult<Self> {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let local_percentage: Option<f64> = parse_var(&var, "POSTREFRESH_LOCAL_PERCENTAGE")?;
        if local_percentage.is_some_and(|p| !p.is_finite()) {
            return Err(RefreshError::Config(
                "POSTREFRESH_LOCAL_PERCENTAGE must be a finite number".to_string(),
            ));
        }

        let stale_after_secs = parse_var(&var, "POSTREFRESH_STALE_AFTER_SECS")?
            .unwrap_or(DEFAULT_STALE_AFTER_SECS);
        if stale_after_secs < 0 {
            return Err(RefreshError::Config(
                "POSTREFRESH_STALE_AFTER_SECS must not be negative".to_string(),
            ));
        }

        Ok(Self {
            country: var("POSTREFRESH_COUNTRY"),
            whitelist_path: var("POSTREFRESH_WHITELIST_PATH").map(PathBuf::from),
            local_percentage,
            stale_after_secs,
            database_url: var("DATABASE_URL"),
        })
    }

    /// The filter set a run uses when no config file overrides it: the staleness
    /// check always, locality when a country or threshold is set, whitelist when a
    /// file is set.
    pub fn filter_defaults(&self) -> FilterConfig {
        let local_percentage = self
            .local_percentage
            .or(self.country.as_ref().map(|_| DEFAULT_LOCAL_PERCENTAGE));

        FilterConfig {
            stale_after_secs: Some(self.stale_after_secs),
            local_percentage,
            country: self.country.clone(),
            whitelist_only: self.whitelist_path.is_some(),
            ..FilterConfig::default()
        }
    }

    pub fn log_redacted(&self) {
        fn or_unset(val: Option<String>) -> String {
            val.unwrap_or_else(|| "<not set>".to_string())
        }

        tracing::info!("Config loaded:");
        tracing::info!("  POSTREFRESH_COUNTRY: {}", or_unset(self.country.clone()));
        tracing::info!(
            "  POSTREFRESH_WHITELIST_PATH: {}",
            or_unset(self.whitelist_path.as_ref().map(|p| p.display().to_string()))
        );
        tracing::info!(
            "  POSTREFRESH_LOCAL_PERCENTAGE: {}",
            or_unset(self.local_percentage.map(|p| p.to_string()))
        );
        tracing::info!("  POSTREFRESH_STALE_AFTER_SECS: {}", self.stale_after_secs);
        tracing::info!(
            "  DATABASE_URL: {}",
            or_unset(self.database_url.as_ref().map(|_| "<redacted>".to_string()))
        );
    }
}

fn parse_var<T>(var: &impl Fn(&str) -> Option<String>, key: &str) -> RefreshResult<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    var(key)
        .map(|raw| {
            raw.parse()
                .map_err(|e| RefreshError::Config(format!("{key}={raw:?} is invalid: {e}")))
        })
        .transpose()
}

/// Which eligibility predicates a run enables, and their parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilterConfig {
    /// Only this outlet id.
    pub media_id: Option<String>,
    /// Only outlets tagged with this category.
    pub category: Option<String>,
    pub require_active: bool,
    /// Enables the staleness check with this threshold.
    pub stale_after_secs: Option<i64>,
    /// Enables the locality check with this threshold.
    pub local_percentage: Option<f64>,
    pub country: Option<String>,
    pub whitelist_only: bool,
}

/// TOML-backed description of a default batch.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub selection: Option<SelectionRequest>,
    pub filters: Option<FilterConfig>,
}

/// Load and parse a TOML config file.
pub fn load_config(path: &Path) -> Result<FileConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config: FileConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
    Ok(config)
}
