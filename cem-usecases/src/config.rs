//! Configuration for the use cases
//!
//! Combines the settings of the coordinated EV charging engine and the
//! production-limit use case.

use std::time::Duration;

use cem_spine::model::Currency;
use cem_spine::EntityType;

/// Coordinated EV charging configuration
#[derive(Debug, Clone)]
pub struct CevcConfig {
    /// Remote entity kinds whose events are processed
    pub compatible_entity_types: Vec<EntityType>,

    /// Currency announced in synthesized incentive descriptions
    pub currency: Currency,

    /// Window covered by the default power-limit and incentive slot
    pub default_slot_window: Duration,

    /// Flat price of the default incentive slot
    pub default_incentive_price: f64,

    /// Preferred time to write power limits after a demand notify
    pub power_limit_target: Duration,

    /// Latest time to write power limits after a demand notify
    pub power_limit_deadline: Duration,

    /// Latest time to write incentives after a request
    pub incentive_deadline: Duration,
}

/// Production-limit configuration
#[derive(Debug, Clone)]
pub struct LppConfig {
    /// Remote entity kinds allowed to write limits
    pub compatible_entity_types: Vec<EntityType>,

    /// Shortest accepted failsafe duration
    pub failsafe_duration_min: Duration,

    /// Longest accepted failsafe duration
    pub failsafe_duration_max: Duration,
}

impl Default for CevcConfig {
    fn default() -> Self {
        Self {
            compatible_entity_types: vec![EntityType::Ev],
            currency: Currency::Eur,
            default_slot_window: Duration::from_secs(7 * 24 * 3600),
            default_incentive_price: 0.30,
            power_limit_target: Duration::from_secs(15),
            power_limit_deadline: Duration::from_secs(55),
            incentive_deadline: Duration::from_secs(20),
        }
    }
}

impl Default for LppConfig {
    fn default() -> Self {
        Self {
            compatible_entity_types: vec![EntityType::Cem, EntityType::GridGuard],
            failsafe_duration_min: Duration::from_secs(2 * 3600),
            failsafe_duration_max: Duration::from_secs(24 * 3600),
        }
    }
}

impl CevcConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set currency for incentive descriptions
    pub fn with_currency(mut self, currency: Currency) -> Self {
        self.currency = currency;
        self
    }

    /// Add a compatible entity kind
    pub fn with_entity_type(mut self, entity_type: EntityType) -> Self {
        if !self.compatible_entity_types.contains(&entity_type) {
            self.compatible_entity_types.push(entity_type);
        }
        self
    }

    /// Set default slot window
    pub fn with_default_window(mut self, window: Duration) -> Self {
        self.default_slot_window = window;
        self
    }

    /// Set default incentive price
    pub fn with_default_price(mut self, price: f64) -> Self {
        self.default_incentive_price = price;
        self
    }

    /// Set response windows (target, power-limit deadline, incentive deadline)
    pub fn with_deadlines(mut self, target: Duration, limits: Duration, incentives: Duration) -> Self {
        self.power_limit_target = target;
        self.power_limit_deadline = limits;
        self.incentive_deadline = incentives;
        self
    }
}

impl LppConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set accepted failsafe duration range
    pub fn with_failsafe_range(mut self, min: Duration, max: Duration) -> Self {
        self.failsafe_duration_min = min;
        self.failsafe_duration_max = max;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cevc_defaults() {
        let config = CevcConfig::default();
        assert_eq!(config.compatible_entity_types, vec![EntityType::Ev]);
        assert_eq!(config.default_slot_window, Duration::from_secs(604_800));
        assert_eq!(config.default_incentive_price, 0.30);
        assert!(config.power_limit_target < config.power_limit_deadline);
    }

    #[test]
    fn test_config_builder() {
        let config = CevcConfig::new()
            .with_currency(Currency::Chf)
            .with_entity_type(EntityType::Evse)
            .with_entity_type(EntityType::Evse)
            .with_default_price(0.25);

        assert_eq!(config.currency, Currency::Chf);
        assert_eq!(config.compatible_entity_types.len(), 2);
        assert_eq!(config.default_incentive_price, 0.25);

        let lpp = LppConfig::new().with_failsafe_range(Duration::from_secs(60), Duration::from_secs(120));
        assert_eq!(lpp.failsafe_duration_max, Duration::from_secs(120));
    }
}
