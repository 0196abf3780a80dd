//! Matching configuration for orgmap-ei
//!
//! Thresholds and pacing resolve with Database → ENV → TOML priority,
//! falling back to compiled defaults.

use orgmap_common::config::TomlConfig;
use orgmap_common::Result;
use sqlx::SqlitePool;
use tracing::warn;

/// Confidence thresholds and external-call pacing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchingConfig {
    /// Scores at or above this are treated as exact-equivalent (0-100)
    pub exact_threshold: u8,
    /// Scores in [similar_threshold, exact_threshold) are fuzzy candidates
    pub similar_threshold: u8,
    /// Fixed pacing between FWC agreement search calls, in milliseconds
    pub fwc_pacing_ms: u64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            exact_threshold: 80,
            similar_threshold: 60,
            fwc_pacing_ms: 1000,
        }
    }
}

impl MatchingConfig {
    /// Resolve configuration from the settings table, environment, and
    /// TOML config, in that priority order
    pub async fn resolve(db: &SqlitePool, toml_config: &TomlConfig) -> Result<Self> {
        let defaults = Self::default();

        let exact_threshold = resolve_u64(
            db,
            "exact_threshold",
            "ORGMAP_EXACT_THRESHOLD",
            toml_config.exact_threshold.map(u64::from),
            u64::from(defaults.exact_threshold),
        )
        .await? as u8;

        let similar_threshold = resolve_u64(
            db,
            "similar_threshold",
            "ORGMAP_SIMILAR_THRESHOLD",
            toml_config.similar_threshold.map(u64::from),
            u64::from(defaults.similar_threshold),
        )
        .await? as u8;

        let fwc_pacing_ms = resolve_u64(
            db,
            "fwc_pacing_ms",
            "ORGMAP_FWC_PACING_MS",
            toml_config.fwc_pacing_ms,
            defaults.fwc_pacing_ms,
        )
        .await?;

        let config = Self {
            exact_threshold,
            similar_threshold,
            fwc_pacing_ms,
        };
        config.validate();

        Ok(config)
    }

    /// Warn about threshold orderings that would make the fuzzy band empty
    fn validate(&self) {
        if self.similar_threshold >= self.exact_threshold {
            warn!(
                similar = self.similar_threshold,
                exact = self.exact_threshold,
                "similar_threshold >= exact_threshold: fuzzy band is empty"
            );
        }
    }
}

/// Resolve a single numeric parameter with Database → ENV → TOML priority
async fn resolve_u64(
    db: &SqlitePool,
    setting_key: &str,
    env_var: &str,
    toml_value: Option<u64>,
    default: u64,
) -> Result<u64> {
    if let Some(raw) = crate::db::settings::get_setting(db, setting_key).await? {
        match raw.parse::<u64>() {
            Ok(v) => return Ok(v),
            Err(_) => warn!(
                key = setting_key,
                value = %raw,
                "Ignoring non-numeric value in settings table"
            ),
        }
    }

    if let Ok(raw) = std::env::var(env_var) {
        match raw.parse::<u64>() {
            Ok(v) => return Ok(v),
            Err(_) => warn!(var = env_var, value = %raw, "Ignoring non-numeric environment value"),
        }
    }

    if let Some(v) = toml_value {
        return Ok(v);
    }

    Ok(default)
}
