use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::engine::error::RentalError;
use crate::engine::rental::RentalType;

/// Interval between countdown ticks while a ride is in progress.
pub const TICK_INTERVAL_MS: u64 = 1000;

/// Maximum allotment for a commuter rental (24 h).
pub const COMMUTER_MAX_SECONDS: u64 = 24 * 60 * 60;

/// Maximum allotment for a regular rental (4 h).
pub const REGULAR_MAX_SECONDS: u64 = 4 * 60 * 60;

/// Remaining time at which the rider gets an "ending soon" notification (15 min).
pub const EXPIRY_WARNING_SECONDS: u64 = 15 * 60;

/// Address the HTTP surface binds to when none is configured.
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";

/// A bike the fleet is seeded with at startup. Every seeded bike starts
/// available; only the coordinator takes bikes out of the pool.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct BikeSeed {
    pub id: String,
    pub battery_percent: u8,
    #[serde(default)]
    pub condition_note: String,
}

impl BikeSeed {
    pub fn new(id: &str, battery_percent: u8, condition_note: &str) -> Self {
        Self {
            id: id.to_string(),
            battery_percent,
            condition_note: condition_note.to_string(),
        }
    }
}

/// Top-level configuration for the rental engine.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Milliseconds between countdown ticks.
    pub tick_interval_ms: u64,
    /// Allotted seconds for a commuter rental, capped at the type maximum.
    pub commuter_duration_secs: u64,
    /// Allotted seconds for a regular rental, capped at the type maximum.
    pub regular_duration_secs: u64,
    /// Remaining seconds that trigger the one-shot "ending soon" signal.
    pub expiry_warning_secs: u64,
    /// Socket address for the HTTP surface.
    pub listen_addr: String,
    /// Whether the rider has cleared onboarding.
    pub rider_eligible: bool,
    /// Bikes present at startup.
    pub fleet: Vec<BikeSeed>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: TICK_INTERVAL_MS,
            commuter_duration_secs: COMMUTER_MAX_SECONDS,
            regular_duration_secs: REGULAR_MAX_SECONDS,
            expiry_warning_secs: EXPIRY_WARNING_SECONDS,
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            rider_eligible: true,
            fleet: default_fleet(),
        }
    }
}

/// The five-bike campus fleet.
pub fn default_fleet() -> Vec<BikeSeed> {
    vec![
        BikeSeed::new("BIKE-001", 72, "Good condition"),
        BikeSeed::new("BIKE-002", 35, "Minor scratches"),
        BikeSeed::new("BIKE-003", 92, "Excellent condition"),
        BikeSeed::new("BIKE-004", 18, "Needs charging"),
        BikeSeed::new("BIKE-005", 55, "Good condition"),
    ]
}

impl EngineConfig {
    /// Parse a TOML document. Missing keys fall back to defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(raw).context("invalid engine config")?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML config file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<(), RentalError> {
        let mut seen = HashSet::new();
        for bike in &self.fleet {
            if bike.id.trim().is_empty() {
                return Err(invalid("bike id must not be empty"));
            }
            if !seen.insert(bike.id.as_str()) {
                return Err(invalid(format!("duplicate bike id {}", bike.id)));
            }
            if bike.battery_percent > 100 {
                return Err(invalid(format!(
                    "bike {} battery {} exceeds 100",
                    bike.id, bike.battery_percent
                )));
            }
        }
        if self.tick_interval_ms == 0 {
            return Err(invalid("tick_interval_ms must be > 0"));
        }
        for rental_type in [RentalType::Commuter, RentalType::Regular] {
            let secs = self.configured_duration(rental_type);
            if secs == 0 || secs > rental_type.max_duration_secs() {
                return Err(invalid(format!(
                    "{} duration {}s must be within 1..={}",
                    rental_type,
                    secs,
                    rental_type.max_duration_secs()
                )));
            }
        }
        Ok(())
    }

    /// Seconds allotted to a new rental of the given type.
    pub fn rental_duration(&self, rental_type: RentalType) -> u64 {
        self.configured_duration(rental_type)
            .min(rental_type.max_duration_secs())
    }

    fn configured_duration(&self, rental_type: RentalType) -> u64 {
        match rental_type {
            RentalType::Commuter => self.commuter_duration_secs,
            RentalType::Regular => self.regular_duration_secs,
        }
    }
}

fn invalid(reason: impl Into<String>) -> RentalError {
    RentalError::InvalidConfig {
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.fleet.len(), 5);
        assert_eq!(config.rental_duration(RentalType::Regular), REGULAR_MAX_SECONDS);
        assert_eq!(config.rental_duration(RentalType::Commuter), COMMUTER_MAX_SECONDS);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = EngineConfig::from_toml_str("regular_duration_secs = 2\n").unwrap();
        assert_eq!(config.rental_duration(RentalType::Regular), 2);
        assert_eq!(config.tick_interval_ms, TICK_INTERVAL_MS);
        assert_eq!(config.fleet, default_fleet());
    }

    #[test]
    fn test_rejects_duplicate_ids() {
        let raw = r#"
            [[fleet]]
            id = "A"
            battery_percent = 10

            [[fleet]]
            id = "A"
            battery_percent = 20
        "#;
        assert!(EngineConfig::from_toml_str(raw).is_err());
    }

    #[test]
    fn test_rejects_duration_above_type_maximum() {
        let mut config = EngineConfig::default();
        config.regular_duration_secs = REGULAR_MAX_SECONDS + 1;
        assert!(matches!(
            config.validate(),
            Err(RentalError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_rejects_seeded_availability() {
        let raw = r#"
            [[fleet]]
            id = "A"
            battery_percent = 90
            available = false
        "#;
        assert!(EngineConfig::from_toml_str(raw).is_err());
    }

    #[test]
    fn test_empty_fleet_is_valid() {
        let config = EngineConfig::from_toml_str("fleet = []\n").unwrap();
        assert!(config.fleet.is_empty());
    }

    #[test]
    fn test_rejects_battery_over_100() {
        let mut config = EngineConfig::default();
        config.fleet[0].battery_percent = 101;
        assert!(config.validate().is_err());
    }
}
