//! Engine configuration loading from TOML

use serde::Deserialize;
use std::path::Path;

use crate::types::{LedgerError, LedgerResult};

/// Tuning knobs for the ledger engine
///
/// Every field has a default, so an empty TOML document is a valid config.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Extra attempts after an optimistic concurrency conflict before the
    /// conflict is surfaced to the caller
    pub max_conflict_retries: u32,
    /// Longest span, in days, a date-ranged report may cover
    pub max_report_days: i64,
    /// Whether a non-zero `others` amount needs remarks
    pub require_remarks_for_others: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_conflict_retries: 5,
            max_report_days: 15,
            require_remarks_for_others: true,
        }
    }
}

impl LedgerConfig {
    /// Parse configuration from a TOML string
    pub fn from_toml_str(contents: &str) -> LedgerResult<Self> {
        let config: LedgerConfig = toml::from_str(contents)
            .map_err(|e| LedgerError::Config(format!("Failed to parse ledger config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> LedgerResult<Self> {
        let path_ref = path.as_ref();
        tracing::debug!("Loading ledger configuration from: {:?}", path_ref);
        let contents = std::fs::read_to_string(path_ref).map_err(|e| {
            LedgerError::Config(format!("Failed to read config file {path_ref:?}: {e}"))
        })?;
        Self::from_toml_str(&contents)
    }

    fn validate(&self) -> LedgerResult<()> {
        if self.max_report_days < 1 {
            return Err(LedgerError::Config(
                "max_report_days must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
