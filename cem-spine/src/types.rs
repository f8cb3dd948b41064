//! Core identifiers for the device/entity/feature protocol model

use serde::{Deserialize, Serialize};
use std::fmt;

/// Subject key identifier of a remote device (hex fingerprint of its certificate)
pub type Ski = String;

/// Correlation counter assigned to every outbound or inbound message
pub type MsgCounter = u64;

/// Kind of an entity within a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityType {
    #[serde(rename = "EV")]
    Ev,
    #[serde(rename = "EVSE")]
    Evse,
    #[serde(rename = "CEM")]
    Cem,
    GridGuard,
    Inverter,
    HeatPumpAppliance,
    DeviceInformation,
    Generic,
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityType::Ev => write!(f, "EV"),
            EntityType::Evse => write!(f, "EVSE"),
            EntityType::Cem => write!(f, "CEM"),
            other => write!(f, "{:?}", other),
        }
    }
}

/// Feature categories exposed by entities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeatureType {
    DeviceConfiguration,
    DeviceDiagnosis,
    ElectricalConnection,
    IncentiveTable,
    LoadControl,
    TimeSeries,
}

/// Role a feature plays on its entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Client,
    Server,
    Special,
}

/// Functions (data elements) that can be read, written or notified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Function {
    TimeSeriesDescriptionListData,
    TimeSeriesConstraintsListData,
    TimeSeriesListData,
    IncentiveTableDescriptionData,
    IncentiveTableConstraintsData,
    IncentiveTableData,
    ElectricalConnectionParameterDescriptionListData,
    ElectricalConnectionPermittedValueSetListData,
    DeviceConfigurationKeyValueDescriptionListData,
    DeviceConfigurationKeyValueListData,
    LoadControlLimitDescriptionListData,
    LoadControlLimitListData,
    DeviceDiagnosisHeartbeatData,
}

impl Function {
    /// Feature category this function belongs to
    pub fn feature_type(&self) -> FeatureType {
        match self {
            Function::TimeSeriesDescriptionListData
            | Function::TimeSeriesConstraintsListData
            | Function::TimeSeriesListData => FeatureType::TimeSeries,
            Function::IncentiveTableDescriptionData
            | Function::IncentiveTableConstraintsData
            | Function::IncentiveTableData => FeatureType::IncentiveTable,
            Function::ElectricalConnectionParameterDescriptionListData
            | Function::ElectricalConnectionPermittedValueSetListData => {
                FeatureType::ElectricalConnection
            }
            Function::DeviceConfigurationKeyValueDescriptionListData
            | Function::DeviceConfigurationKeyValueListData => FeatureType::DeviceConfiguration,
            Function::LoadControlLimitDescriptionListData | Function::LoadControlLimitListData => {
                FeatureType::LoadControl
            }
            Function::DeviceDiagnosisHeartbeatData => FeatureType::DeviceDiagnosis,
        }
    }
}

/// Command classifier of a protocol message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CmdClassifier {
    Read,
    Reply,
    Notify,
    Write,
    Call,
    Result,
}

/// What kind of change an event reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    DeviceChange,
    EntityChange,
    DataChange,
    BindingChange,
    SubscriptionChange,
}

/// Direction of an element change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeType {
    Add,
    Remove,
    Update,
}

/// Actors taking part in a use case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UseCaseActor {
    #[serde(rename = "CEM")]
    Cem,
    #[serde(rename = "EV")]
    Ev,
    #[serde(rename = "EVSE")]
    Evse,
    ControllableSystem,
    EnergyGuard,
}

/// Use case identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UseCaseName {
    CoordinatedEvCharging,
    LimitationOfPowerProduction,
    EvCommissioningAndConfiguration,
}

impl fmt::Display for UseCaseName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UseCaseName::CoordinatedEvCharging => write!(f, "coordinatedEVCharging"),
            UseCaseName::LimitationOfPowerProduction => write!(f, "limitationOfPowerProduction"),
            UseCaseName::EvCommissioningAndConfiguration => {
                write!(f, "evCommissioningAndConfiguration")
            }
        }
    }
}

/// Reference to a remote device
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceRef {
    pub ski: Ski,
    pub address: String,
}

/// Reference to an entity on a remote device
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub device: DeviceRef,
    pub address: Vec<u32>,
    pub entity_type: EntityType,
}

impl EntityRef {
    pub fn new(
        ski: impl Into<Ski>,
        device_address: impl Into<String>,
        address: Vec<u32>,
        entity_type: EntityType,
    ) -> Self {
        Self {
            device: DeviceRef {
                ski: ski.into(),
                address: device_address.into(),
            },
            address,
            entity_type,
        }
    }

    pub fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    pub fn device(&self) -> &DeviceRef {
        &self.device
    }

    pub fn ski(&self) -> &str {
        &self.device.ski
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let address: Vec<String> = self.address.iter().map(|a| a.to_string()).collect();
        write!(
            f,
            "{}/{} ({})",
            self.device.address,
            address.join("."),
            self.entity_type
        )
    }
}

/// One scenario of a use case and the server features it needs on the remote side
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UseCaseScenario {
    pub scenario: u32,
    pub mandatory: bool,
    pub server_features: Vec<FeatureType>,
}

/// Announced use case support of a local or remote actor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UseCaseSupport {
    pub actor: UseCaseActor,
    pub name: UseCaseName,
    pub version: String,
    pub scenarios: Vec<u32>,
    pub available: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_display() {
        let entity = EntityRef::new("ski-1", "d:_i:EV_1", vec![1, 1], EntityType::Ev);
        assert_eq!(entity.to_string(), "d:_i:EV_1/1.1 (EV)");
        assert_eq!(entity.ski(), "ski-1");
    }

    #[test]
    fn test_function_feature_mapping() {
        assert_eq!(
            Function::TimeSeriesConstraintsListData.feature_type(),
            FeatureType::TimeSeries
        );
        assert_eq!(
            Function::IncentiveTableData.feature_type(),
            FeatureType::IncentiveTable
        );
        assert_eq!(
            Function::DeviceDiagnosisHeartbeatData.feature_type(),
            FeatureType::DeviceDiagnosis
        );
    }

    #[test]
    fn test_entity_type_serialization() {
        let json = serde_json::to_string(&EntityType::Ev).unwrap();
        assert_eq!(json, "\"EV\"");
        let parsed: EntityType = serde_json::from_str("\"GridGuard\"").unwrap();
        assert_eq!(parsed, EntityType::GridGuard);
    }
}
