//! Coordinated EV charging domain values
//!
//! Built fresh from the feature snapshot on every call; nothing here is cached.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cem_spine::model::{BoundaryType, Currency, IncentiveType, TierType, Unit};

/// Energy demand of the EV (Wh) and its time window (seconds from now)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Demand {
    pub min_demand: f64,
    pub opt_demand: f64,
    pub max_demand: f64,
    pub duration_until_start: f64,
    /// Zero means direct charging
    pub duration_until_end: f64,
}

/// One slot of a power-limit or incentive write
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DurationSlotValue {
    pub duration: Duration,
    pub value: f64,
}

impl DurationSlotValue {
    pub fn new(duration: Duration, value: f64) -> Self {
        Self { duration, value }
    }
}

/// Slot contract of the power time series; zero means unconstrained
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlotConstraints {
    pub min_slots: u32,
    pub max_slots: u32,
    pub min_slot_duration: Duration,
    pub max_slot_duration: Duration,
    pub slot_duration_step_size: Duration,
}

/// Slot contract of the incentive table; zero means unconstrained
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncentiveSlotConstraints {
    pub min_slots: u32,
    pub max_slots: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargePlanSlotValue {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub value: f64,
    pub min_value: f64,
    pub max_value: f64,
}

/// Chronologically ordered plan announced by the EV
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChargePlan {
    pub slots: Vec<ChargePlanSlotValue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EvChargeStrategy {
    Unknown,
    NoDemand,
    DirectCharging,
    TimedCharging,
    #[serde(rename = "minSoC")]
    MinSoC,
}

// ============================================================================
// Incentive tariff description
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TariffBoundary {
    pub id: u32,
    pub boundary_type: BoundaryType,
    pub unit: Unit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TariffIncentive {
    pub id: u32,
    pub incentive_type: IncentiveType,
    pub currency: Currency,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TariffTier {
    pub id: u32,
    pub tier_type: TierType,
    pub boundaries: Vec<TariffBoundary>,
    pub incentives: Vec<TariffIncentive>,
}

impl TariffTier {
    /// Tier with at least one boundary and one incentive
    pub fn is_complete(&self) -> bool {
        !self.boundaries.is_empty() && !self.incentives.is_empty()
    }
}

/// Tariff -> tiers -> boundaries and incentives
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IncentiveTariffDescription {
    pub tiers: Vec<TariffTier>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_demand_wire_names() {
        let demand = Demand {
            min_demand: 600.0,
            opt_demand: 600.0,
            max_demand: 75600.0,
            ..Default::default()
        };

        let value = serde_json::to_value(demand).unwrap();
        assert_eq!(value["maxDemand"], json!(75600.0));
        assert_eq!(value["durationUntilEnd"], json!(0.0));
    }

    #[test]
    fn test_strategy_names() {
        assert_eq!(serde_json::to_string(&EvChargeStrategy::MinSoC).unwrap(), "\"minSoC\"");
        assert_eq!(
            serde_json::to_string(&EvChargeStrategy::DirectCharging).unwrap(),
            "\"directCharging\""
        );
    }

    #[test]
    fn test_tier_completeness() {
        let mut tier: TariffTier = serde_json::from_value(json!({
            "id": 1,
            "tierType": "dynamicCost",
            "boundaries": [{ "id": 1, "boundaryType": "powerBoundary", "unit": "W" }],
            "incentives": []
        }))
        .unwrap();
        assert!(!tier.is_complete());

        tier.incentives.push(TariffIncentive {
            id: 1,
            incentive_type: IncentiveType::AbsoluteCost,
            currency: Currency::Eur,
            name: None,
        });
        assert!(tier.is_complete());
    }
}
