//! Logistics configuration: recognised options, defaults, and validation.
//!
//! ```
//! use courier_logic::config::LogisticsConfig;
//!
//! let config = LogisticsConfig::from_json_str(r#"{ "courier_capacity_per_base": 10 }"#).unwrap();
//! assert_eq!(config.courier_capacity_per_base, 10);
//! assert_eq!(config.dispatch_cooldown_ticks, 60);
//! assert!(config.validate().is_empty());
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Simulation frames per second of host time.
pub const TICKS_PER_SECOND: f32 = 60.0;

pub const MIN_COURIER_CAPACITY: u32 = 1;
pub const MAX_COURIER_CAPACITY: u32 = 200;
pub const MIN_SPEED_MULTIPLIER: f32 = 0.1;
pub const MAX_SPEED_MULTIPLIER: f32 = 10.0;

/// What a courier does with cargo the target could not accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Park the remainder in the target's overflow holding area when it has
    /// one; anything left is carried back.
    HoldAtTarget,
    /// Always carry the remainder back to the base.
    CarryBack,
}

/// Options recognised by the base logistics scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogisticsConfig {
    /// Couriers owned by each base (1–200). Fixed when a pool is created.
    pub courier_capacity_per_base: u32,
    /// Frames between dispatch rounds.
    pub dispatch_cooldown_ticks: u32,
    /// Scales the host's courier speed (0.1–10).
    pub courier_speed_multiplier: f32,
    /// Maximum items one courier carries per trip.
    pub per_trip_payload_cap: u32,
    /// Emit per-flight events at info level instead of debug.
    pub debug_logging: bool,
    /// Handling of cargo a target rejects.
    pub overflow_policy: OverflowPolicy,
    /// Dispensers filled above this fraction are not considered in need.
    pub dispenser_stock_ceiling: f32,
}

impl Default for LogisticsConfig {
    fn default() -> Self {
        Self {
            courier_capacity_per_base: 20,
            dispatch_cooldown_ticks: 60,
            courier_speed_multiplier: 2.0,
            per_trip_payload_cap: 100,
            debug_logging: false,
            overflow_policy: OverflowPolicy::HoldAtTarget,
            dispenser_stock_ceiling: 0.8,
        }
    }
}

/// Configuration validation error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("courier_capacity_per_base must be within 1..=200, got {0}")]
    CapacityOutOfRange(u32),
    #[error("dispatch_cooldown_ticks must be at least 1")]
    ZeroCooldown,
    #[error("courier_speed_multiplier must be within 0.1..=10, got {0}")]
    SpeedOutOfRange(f32),
    #[error("per_trip_payload_cap must be at least 1")]
    ZeroPayloadCap,
    #[error("dispenser_stock_ceiling must be within (0, 1], got {0}")]
    CeilingOutOfRange(f32),
    #[error("config parse error: {0}")]
    Parse(String),
}

impl LogisticsConfig {
    /// Validate every option, returning all errors found.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if !(MIN_COURIER_CAPACITY..=MAX_COURIER_CAPACITY)
            .contains(&self.courier_capacity_per_base)
        {
            errors.push(ConfigError::CapacityOutOfRange(
                self.courier_capacity_per_base,
            ));
        }
        if self.dispatch_cooldown_ticks == 0 {
            errors.push(ConfigError::ZeroCooldown);
        }
        // NaN fails the range check too.
        if !(MIN_SPEED_MULTIPLIER..=MAX_SPEED_MULTIPLIER).contains(&self.courier_speed_multiplier) {
            errors.push(ConfigError::SpeedOutOfRange(self.courier_speed_multiplier));
        }
        if self.per_trip_payload_cap == 0 {
            errors.push(ConfigError::ZeroPayloadCap);
        }
        if !(self.dispenser_stock_ceiling > 0.0 && self.dispenser_stock_ceiling <= 1.0) {
            errors.push(ConfigError::CeilingOutOfRange(self.dispenser_stock_ceiling));
        }

        errors
    }

    /// Parse from JSON (missing keys take defaults) and validate.
    pub fn from_json_str(input: &str) -> Result<Self, ConfigError> {
        let config: LogisticsConfig =
            serde_json::from_str(input).map_err(|e| ConfigError::Parse(e.to_string()))?;
        match config.validate().into_iter().next() {
            Some(err) => Err(err),
            None => Ok(config),
        }
    }

    /// Distance a courier covers in one frame given the host's base speed.
    pub fn flight_delta(&self, host_courier_speed: f32) -> f32 {
        (host_courier_speed * self.courier_speed_multiplier / TICKS_PER_SECOND).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = LogisticsConfig::default();
        let errors = config.validate();
        assert!(errors.is_empty(), "default config should be valid: {errors:?}");
    }

    #[test]
    fn capacity_bounds() {
        let mut config = LogisticsConfig::default();
        config.courier_capacity_per_base = 0;
        assert!(config
            .validate()
            .contains(&ConfigError::CapacityOutOfRange(0)));
        config.courier_capacity_per_base = 201;
        assert!(config
            .validate()
            .contains(&ConfigError::CapacityOutOfRange(201)));
        config.courier_capacity_per_base = 200;
        assert!(config.validate().is_empty());
    }

    #[test]
    fn speed_bounds_reject_nan() {
        let mut config = LogisticsConfig::default();
        config.courier_speed_multiplier = f32::NAN;
        assert_eq!(config.validate().len(), 1);
        config.courier_speed_multiplier = 10.5;
        assert!(config.validate().contains(&ConfigError::SpeedOutOfRange(10.5)));
    }

    #[test]
    fn reports_every_problem() {
        let config = LogisticsConfig {
            courier_capacity_per_base: 0,
            dispatch_cooldown_ticks: 0,
            per_trip_payload_cap: 0,
            ..LogisticsConfig::default()
        };
        assert_eq!(config.validate().len(), 3);
    }

    #[test]
    fn json_uses_defaults_for_missing_keys() {
        let config =
            LogisticsConfig::from_json_str(r#"{ "overflow_policy": "carry_back" }"#).unwrap();
        assert_eq!(config.overflow_policy, OverflowPolicy::CarryBack);
        assert_eq!(config.courier_capacity_per_base, 20);
        assert_eq!(config.per_trip_payload_cap, 100);
    }

    #[test]
    fn json_rejects_invalid_values() {
        let err = LogisticsConfig::from_json_str(r#"{ "courier_capacity_per_base": 500 }"#)
            .unwrap_err();
        assert_eq!(err, ConfigError::CapacityOutOfRange(500));
        assert!(matches!(
            LogisticsConfig::from_json_str("not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn flight_delta_scales_with_multiplier() {
        let config = LogisticsConfig::default();
        assert!((config.flight_delta(30.0) - 1.0).abs() < 1e-6);
    }
}
