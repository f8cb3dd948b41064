//! Event payloads delivered by the feature library
//!
//! Inbound protocol changes arrive as an `EventPayload`. The data element is a
//! closed sum type so receivers match on it exhaustively.

use serde::{Deserialize, Serialize};

use crate::model::*;
use crate::types::*;

/// Data element carried by a protocol message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "camelCase")]
pub enum DataElement {
    TimeSeriesDescriptions(Vec<TimeSeriesDescription>),
    TimeSeriesConstraints(Vec<TimeSeriesConstraints>),
    TimeSeries(Vec<TimeSeriesData>),
    IncentiveTableDescriptions(Vec<IncentiveTableDescription>),
    IncentiveTableConstraints(Vec<IncentiveTableConstraints>),
    IncentiveTables(Vec<IncentiveTable>),
    ElectricalParameterDescriptions(Vec<ElectricalConnectionParameterDescription>),
    ElectricalPermittedValueSets(Vec<ElectricalConnectionPermittedValueSet>),
    KeyValueDescriptions(Vec<KeyValueDescription>),
    KeyValues(Vec<KeyValue>),
    LoadControlLimitDescriptions(Vec<LoadControlLimitDescription>),
    LoadControlLimits(Vec<LoadControlLimit>),
    Heartbeat(HeartbeatData),
}

impl DataElement {
    /// Protocol function this element is the payload of
    pub fn function(&self) -> Function {
        match self {
            DataElement::TimeSeriesDescriptions(_) => Function::TimeSeriesDescriptionListData,
            DataElement::TimeSeriesConstraints(_) => Function::TimeSeriesConstraintsListData,
            DataElement::TimeSeries(_) => Function::TimeSeriesListData,
            DataElement::IncentiveTableDescriptions(_) => Function::IncentiveTableDescriptionData,
            DataElement::IncentiveTableConstraints(_) => Function::IncentiveTableConstraintsData,
            DataElement::IncentiveTables(_) => Function::IncentiveTableData,
            DataElement::ElectricalParameterDescriptions(_) => {
                Function::ElectricalConnectionParameterDescriptionListData
            }
            DataElement::ElectricalPermittedValueSets(_) => {
                Function::ElectricalConnectionPermittedValueSetListData
            }
            DataElement::KeyValueDescriptions(_) => {
                Function::DeviceConfigurationKeyValueDescriptionListData
            }
            DataElement::KeyValues(_) => Function::DeviceConfigurationKeyValueListData,
            DataElement::LoadControlLimitDescriptions(_) => {
                Function::LoadControlLimitDescriptionListData
            }
            DataElement::LoadControlLimits(_) => Function::LoadControlLimitListData,
            DataElement::Heartbeat(_) => Function::DeviceDiagnosisHeartbeatData,
        }
    }

    pub fn feature_type(&self) -> FeatureType {
        self.function().feature_type()
    }
}

/// Event delivered to use cases
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventPayload {
    pub ski: Ski,
    pub device: Option<DeviceRef>,
    pub entity: Option<EntityRef>,
    pub event_type: EventType,
    pub change_type: ChangeType,
    pub data: Option<DataElement>,
    pub function: Option<Function>,
    pub cmd_classifier: Option<CmdClassifier>,
    /// Counter of the inbound message, set for writes awaiting approval
    pub msg_counter: Option<MsgCounter>,
}

impl EventPayload {
    /// Entity added or removed on a remote device
    pub fn entity_change(entity: &EntityRef, change_type: ChangeType) -> Self {
        Self {
            ski: entity.ski().to_string(),
            device: Some(entity.device().clone()),
            entity: Some(entity.clone()),
            event_type: EventType::EntityChange,
            change_type,
            data: None,
            function: None,
            cmd_classifier: None,
            msg_counter: None,
        }
    }

    /// Data of a remote feature was updated by a reply or notify
    pub fn data_update(entity: &EntityRef, data: DataElement, classifier: CmdClassifier) -> Self {
        Self {
            ski: entity.ski().to_string(),
            device: Some(entity.device().clone()),
            entity: Some(entity.clone()),
            event_type: EventType::DataChange,
            change_type: ChangeType::Update,
            function: Some(data.function()),
            data: Some(data),
            cmd_classifier: Some(classifier),
            msg_counter: None,
        }
    }

    /// Remote entity asks to write local data
    pub fn write_request(entity: &EntityRef, data: DataElement, msg_counter: MsgCounter) -> Self {
        Self {
            msg_counter: Some(msg_counter),
            ..Self::data_update(entity, data, CmdClassifier::Write)
        }
    }

    pub fn is_classifier(&self, classifier: CmdClassifier) -> bool {
        self.cmd_classifier == Some(classifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::values::ScaledNumber;

    fn ev() -> EntityRef {
        EntityRef::new("ski-ev", "d:_i:EV", vec![1, 1], EntityType::Ev)
    }

    #[test]
    fn test_data_update_payload() {
        let data = DataElement::TimeSeries(vec![TimeSeriesData::default()]);
        let payload = EventPayload::data_update(&ev(), data, CmdClassifier::Notify);

        assert_eq!(payload.ski, "ski-ev");
        assert_eq!(payload.event_type, EventType::DataChange);
        assert_eq!(payload.function, Some(Function::TimeSeriesListData));
        assert!(payload.is_classifier(CmdClassifier::Notify));
        assert!(payload.msg_counter.is_none());
    }

    #[test]
    fn test_write_request_payload() {
        let data = DataElement::LoadControlLimits(vec![LoadControlLimit {
            limit_id: Some(0),
            value: Some(ScaledNumber::new(4200, 0)),
            ..Default::default()
        }]);
        let payload = EventPayload::write_request(&ev(), data, 42);

        assert_eq!(payload.msg_counter, Some(42));
        assert!(payload.is_classifier(CmdClassifier::Write));
        assert_eq!(payload.function, Some(Function::LoadControlLimitListData));
    }

    #[test]
    fn test_data_element_tagging() {
        let data = DataElement::Heartbeat(HeartbeatData {
            heartbeat_counter: Some(3),
            ..Default::default()
        });
        let json = serde_json::to_string(&data).unwrap();
        assert_eq!(json, r#"{"kind":"heartbeat","data":{"heartbeatCounter":3}}"#);
        assert_eq!(data.feature_type(), FeatureType::DeviceDiagnosis);
    }
}
