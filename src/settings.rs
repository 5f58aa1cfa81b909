//! Deployment-wide matching configuration

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

use crate::types::*;

/// Tolerances used by every matching pass.
///
/// Fixed per deployment and injected into the engine at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconConfig {
    /// Largest absolute amount difference still treated as equal (inclusive)
    pub match_tolerance: BigDecimal,
    /// Largest whole-day distance between two timestamps still treated as the same day
    pub date_tolerance_days: u32,
}

impl Default for ReconConfig {
    fn default() -> Self {
        Self {
            // 0.01
            match_tolerance: BigDecimal::new(1.into(), 2),
            date_tolerance_days: 1,
        }
    }
}

impl ReconConfig {
    /// Create a validated configuration
    pub fn new(match_tolerance: BigDecimal, date_tolerance_days: u32) -> ReconResult<Self> {
        let config = Self {
            match_tolerance,
            date_tolerance_days,
        };
        config.validate()?;
        Ok(config)
    }

    /// Convenience constructor taking the tolerance as decimal text, e.g. `"0.05"`
    pub fn with_tolerance(match_tolerance: &str, date_tolerance_days: u32) -> ReconResult<Self> {
        let tolerance = BigDecimal::from_str(match_tolerance).map_err(|e| {
            ReconError::Config(format!(
                "Invalid match tolerance '{}': {}",
                match_tolerance, e
            ))
        })?;
        Self::new(tolerance, date_tolerance_days)
    }

    /// Load configuration from an optional file layered with `RECON_*` environment variables.
    ///
    /// Missing keys fall back to [`ReconConfig::default`].
    pub fn load(path: impl AsRef<Path>) -> ReconResult<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()).required(false))
            .add_source(config::Environment::with_prefix("RECON"))
            .build()?;

        let config: ReconConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ReconResult<()> {
        if self.match_tolerance <= BigDecimal::from(0) {
            return Err(ReconError::Config(format!(
                "match_tolerance must be positive, got {}",
                self.match_tolerance
            )));
        }
        Ok(())
    }

    /// Whether two amounts are equal within the configured tolerance
    pub fn amounts_within_tolerance(&self, a: &BigDecimal, b: &BigDecimal) -> bool {
        (a - b).abs() <= self.match_tolerance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ReconConfig::default();
        assert_eq!(config.match_tolerance, BigDecimal::from_str("0.01").unwrap());
        assert_eq!(config.date_tolerance_days, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_non_positive_tolerance_rejected() {
        assert!(ReconConfig::with_tolerance("0", 1).is_err());
        assert!(ReconConfig::with_tolerance("-0.05", 1).is_err());
        assert!(ReconConfig::with_tolerance("abc", 1).is_err());
        assert!(ReconConfig::with_tolerance("0.05", 0).is_ok());
    }

    #[test]
    fn test_tolerance_is_inclusive() {
        let config = ReconConfig::with_tolerance("0.05", 1).unwrap();
        let base = BigDecimal::from_str("100.00").unwrap();
        let edge = BigDecimal::from_str("100.05").unwrap();
        let over = BigDecimal::from_str("100.0500001").unwrap();

        assert!(config.amounts_within_tolerance(&base, &edge));
        assert!(config.amounts_within_tolerance(&edge, &base));
        assert!(!config.amounts_within_tolerance(&base, &over));
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let config = ReconConfig::load("does-not-exist.toml").unwrap();
        assert_eq!(config.date_tolerance_days, 1);
    }
}
