//! Feature data model
//!
//! Data structures carried by the Time Series, Incentive Table, Electrical
//! Connection, Device Configuration, Load Control and Device Diagnosis
//! features. Field names follow the protocol's camelCase JSON shape; every
//! protocol field is optional on the wire.

use serde::{Deserialize, Serialize};

use crate::values::{AbsoluteOrRelativeTime, DurationType, ScaledNumber, TimePeriod};

// ============================================================================
// Shared enumerations
// ============================================================================

/// Unit of measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Unit {
    W,
    Wh,
    A,
    V,
    #[serde(rename = "%")]
    Percent,
    #[serde(rename = "s")]
    Seconds,
}

/// Scope of a description entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScopeType {
    AcPowerTotal,
    AcPower,
    SimpleIncentiveTable,
    ActivePowerLimit,
}

/// Currency of a monetary incentive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Eur,
    Usd,
    Gbp,
    Chf,
    Dkk,
    Nok,
    Sek,
    Pln,
    Czk,
}

/// Direction of an energy flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EnergyDirection {
    Consume,
    Produce,
}

// ============================================================================
// Time Series
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TimeSeriesType {
    Plan,
    SingleDemand,
    Constraints,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimeSeriesDescription {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_series_id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_series_type: Option<TimeSeriesType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_series_writeable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_required: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<Unit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimeSeriesConstraints {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_series_id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot_count_min: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot_count_max: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot_duration_min: Option<DurationType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot_duration_max: Option<DurationType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot_duration_step_size: Option<DurationType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub earliest_time_slot_start_time: Option<AbsoluteOrRelativeTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_time_slot_end_time: Option<AbsoluteOrRelativeTime>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimeSeriesSlot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_series_slot_id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_period: Option<TimePeriod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<DurationType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<ScaledNumber>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_value: Option<ScaledNumber>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_value: Option<ScaledNumber>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimeSeriesData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_series_id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_period: Option<TimePeriod>,
    pub time_series_slot: Vec<TimeSeriesSlot>,
}

// ============================================================================
// Incentive Table
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TierType {
    FixedCost,
    DynamicCost,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BoundaryType {
    PowerBoundary,
    EnergyBoundary,
    CountBoundary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IncentiveType {
    AbsoluteCost,
    RelativeCost,
    RenewableEnergyPercentage,
    #[serde(rename = "co2Emission")]
    Co2Emission,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TariffDescription {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tariff_id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tariff_writeable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_required: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope_type: Option<ScopeType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TierDescription {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier_id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier_type: Option<TierType>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BoundaryDescription {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boundary_id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boundary_type: Option<BoundaryType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boundary_unit: Option<Unit>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IncentiveDescription {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub incentive_id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub incentive_type: Option<IncentiveType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<Currency>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IncentiveTableDescriptionTier {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier_description: Option<TierDescription>,
    pub boundary_description: Vec<BoundaryDescription>,
    pub incentive_description: Vec<IncentiveDescription>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IncentiveTableDescription {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tariff_description: Option<TariffDescription>,
    pub tier: Vec<IncentiveTableDescriptionTier>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IncentiveSlotConstraints {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot_count_min: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot_count_max: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IncentiveTableConstraints {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tariff_id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub incentive_slot_constraints: Option<IncentiveSlotConstraints>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TierBoundary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boundary_id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lower_boundary_value: Option<ScaledNumber>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upper_boundary_value: Option<ScaledNumber>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Incentive {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub incentive_id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<ScaledNumber>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IncentiveTableTier {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier_id: Option<u32>,
    pub boundary: Vec<TierBoundary>,
    pub incentive: Vec<Incentive>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IncentiveSlot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_interval: Option<TimePeriod>,
    pub tier: Vec<IncentiveTableTier>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IncentiveTable {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tariff_id: Option<u32>,
    pub incentive_slot: Vec<IncentiveSlot>,
}

// ============================================================================
// Electrical Connection
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ElectricalConnectionParameterDescription {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub electrical_connection_id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameter_id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub measurement_id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope_type: Option<ScopeType>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScaledRange {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<ScaledNumber>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<ScaledNumber>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScaledValueSet {
    pub value: Vec<ScaledNumber>,
    pub range: Vec<ScaledRange>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ElectricalConnectionPermittedValueSet {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub electrical_connection_id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameter_id: Option<u32>,
    pub permitted_value_set: Vec<ScaledValueSet>,
}

// ============================================================================
// Device Configuration
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KeyName {
    FailsafeProductionActivePowerLimit,
    FailsafeDurationMinimum,
    AsymmetricChargingSupported,
    CommunicationsStandard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KeyValueType {
    Boolean,
    Duration,
    ScaledNumber,
    String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KeyValueDescription {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_name: Option<KeyName>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_type: Option<KeyValueType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<Unit>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigurationValue {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boolean: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<DurationType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scaled_number: Option<ScaledNumber>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub string: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KeyValue {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<ConfigurationValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_value_changeable: Option<bool>,
}

// ============================================================================
// Load Control
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LimitType {
    MaxValueLimit,
    MinValueLimit,
    SignDependentAbsValueLimit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LimitCategory {
    Obligation,
    Recommendation,
    Optimization,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoadControlLimitDescription {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_type: Option<LimitType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_category: Option<LimitCategory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_direction: Option<EnergyDirection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub measurement_id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<Unit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope_type: Option<ScopeType>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoadControlLimit {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_limit_changeable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_limit_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_period: Option<TimePeriod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<ScaledNumber>,
}

// ============================================================================
// Device Diagnosis
// ============================================================================

/// Outcome of a request; `error_number == 0` means success
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultData {
    pub error_number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ResultData {
    pub fn success() -> Self {
        Self::default()
    }

    pub fn error(error_number: u32, description: impl Into<String>) -> Self {
        Self {
            error_number,
            description: Some(description.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error_number != 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HeartbeatData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heartbeat_counter: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heartbeat_timeout: Option<DurationType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ResultData>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_series_slot_serialization() {
        let slot = TimeSeriesSlot {
            time_series_slot_id: Some(0),
            duration: Some(DurationType::new("PT2H")),
            value: Some(ScaledNumber::new(10000, 0)),
            ..Default::default()
        };

        let json = serde_json::to_string(&slot).unwrap();
        assert_eq!(
            json,
            r#"{"timeSeriesSlotId":0,"duration":"PT2H","value":{"number":10000}}"#
        );

        let parsed: TimeSeriesSlot = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, slot);
    }

    #[test]
    fn test_incentive_description_parses_sparse_json() {
        let json = r#"{
            "tariffDescription": {"tariffId": 1, "updateRequired": true, "scopeType": "simpleIncentiveTable"},
            "tier": [{"tierDescription": {"tierId": 0, "tierType": "dynamicCost"}}]
        }"#;

        let parsed: IncentiveTableDescription = serde_json::from_str(json).unwrap();
        let tariff = parsed.tariff_description.unwrap();
        assert_eq!(tariff.update_required, Some(true));
        assert_eq!(tariff.scope_type, Some(ScopeType::SimpleIncentiveTable));
        assert!(parsed.tier[0].boundary_description.is_empty());
    }

    #[test]
    fn test_result_data() {
        assert!(!ResultData::success().is_error());
        assert!(ResultData::error(7, "timeout").is_error());
    }
}
