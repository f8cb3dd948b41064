//! Limitation of Power Production
//!
//! Controllable-system side: the local entity serves one production limit
//! and two failsafe keys. Remote writes of the limit wait in a pending map
//! until the host approves or denies them; failsafe writes are applied
//! directly when every key in them is valid.

mod public;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use cem_spine::model::{
    EnergyDirection, KeyName, KeyValue, KeyValueDescription, KeyValueType, LimitCategory, LimitType,
    LoadControlLimit, LoadControlLimitDescription, ResultData, ScopeType, Unit,
};
use cem_spine::{
    ChangeType, CmdClassifier, DataElement, DeviceRef, EntityRef, EventPayload, EventType,
    FeatureLibrary, FeatureType, MsgCounter, Role, Ski, UseCaseActor, UseCaseName, UseCaseScenario,
};

use crate::config::LppConfig;
use crate::error::UseCaseError;
use crate::features::{LocalDeviceConfiguration, LocalLoadControl};
use crate::usecase::{EventCallback, UseCase, UseCaseBase, UseCaseEvent};

pub const LPP_VERSION: &str = "1.0.0";

/// Error number answered for a denied or invalid write
const WRITE_DENIED: u32 = 7;

/// Production limit in the local load control feature
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadLimit {
    /// Zero means no end
    pub duration: Duration,
    pub is_changeable: bool,
    pub is_active: bool,
    /// Active power in W
    pub value: f64,
}

impl LoadLimit {
    fn from_wire(limit: &LoadControlLimit) -> Self {
        let duration = limit
            .time_period
            .as_ref()
            .and_then(|period| period.end_time.as_ref())
            .and_then(|end| end.duration().ok())
            .and_then(|end| end.to_std().ok())
            .unwrap_or_default();

        Self {
            duration,
            is_changeable: limit.is_limit_changeable.unwrap_or_default(),
            is_active: limit.is_limit_active.unwrap_or_default(),
            value: limit.value.map(|value| value.value()).unwrap_or_default(),
        }
    }
}

/// Validated value of one failsafe key in a remote write
enum FailsafeChange {
    PowerLimit(f64),
    DurationMinimum(Duration),
}

struct PendingLimit {
    ski: Ski,
    device: Option<DeviceRef>,
    entity: Option<EntityRef>,
    limit: LoadControlLimit,
}

/// Limitation of power production use case (controllable system actor)
pub struct Lpp {
    base: UseCaseBase,
    config: LppConfig,
    pending_limits: Mutex<HashMap<MsgCounter, PendingLimit>>,
}

impl Lpp {
    pub fn new(library: Arc<dyn FeatureLibrary>, config: LppConfig, callback: EventCallback) -> Self {
        let scenario = |scenario: u32, mandatory: bool, features: &[FeatureType]| UseCaseScenario {
            scenario,
            mandatory,
            server_features: features.to_vec(),
        };

        let scenarios = vec![
            scenario(1, true, &[FeatureType::LoadControl]),
            scenario(2, true, &[FeatureType::DeviceConfiguration]),
            scenario(3, true, &[FeatureType::DeviceDiagnosis]),
            scenario(4, false, &[FeatureType::ElectricalConnection]),
        ];

        let base = UseCaseBase::new(
            library,
            UseCaseActor::ControllableSystem,
            UseCaseActor::EnergyGuard,
            UseCaseName::LimitationOfPowerProduction,
            LPP_VERSION,
            scenarios,
            config.compatible_entity_types.clone(),
            callback,
        );

        Self {
            base,
            config,
            pending_limits: Mutex::new(HashMap::new()),
        }
    }

    fn load_control(&self) -> Result<LocalLoadControl<'_>, UseCaseError> {
        LocalLoadControl::new(self.base.library()).map_err(|_| UseCaseError::DataNotAvailable)
    }

    fn device_configuration(&self) -> Result<LocalDeviceConfiguration<'_>, UseCaseError> {
        LocalDeviceConfiguration::new(self.base.library()).map_err(|_| UseCaseError::DataNotAvailable)
    }

    /// Id of the production limit in the local load control feature
    fn limit_id(&self) -> Result<u32, UseCaseError> {
        self.load_control()?
            .limit_descriptions()
            .into_iter()
            .find(|description| {
                description.scope_type == Some(ScopeType::ActivePowerLimit)
                    && description.limit_direction == Some(EnergyDirection::Produce)
            })
            .and_then(|description| description.limit_id)
            .ok_or(UseCaseError::DataNotAvailable)
    }

    fn limit_write_requested(&self, payload: &EventPayload, limits: &[LoadControlLimit]) {
        let Some(msg_counter) = payload.msg_counter else {
            return;
        };
        let Ok(limit_id) = self.limit_id() else {
            return;
        };
        let Some(limit) = limits.iter().find(|limit| limit.limit_id == Some(limit_id)) else {
            return;
        };

        self.pending_limits.lock().insert(
            msg_counter,
            PendingLimit {
                ski: payload.ski.clone(),
                device: payload.device.clone(),
                entity: payload.entity.clone(),
                limit: limit.clone(),
            },
        );

        debug!("Production limit write {} from {} awaits approval", msg_counter, payload.ski);
        self.base.emit(payload, UseCaseEvent::WriteApprovalRequired);
    }

    fn key_values_written(&self, payload: &EventPayload, key_values: &[KeyValue]) {
        let Some(msg_counter) = payload.msg_counter else {
            return;
        };
        let library = self.base.library();
        let Ok(config) = self.device_configuration() else {
            return;
        };
        let descriptions = config.descriptions();
        let key_name = |key_value: &KeyValue| {
            descriptions
                .iter()
                .find(|description| description.key_id == key_value.key_id)
                .and_then(|description| description.key_name)
        };

        let mut changes = Vec::new();
        for key_value in key_values {
            let Some(value) = key_value.value.clone() else {
                continue;
            };

            let change = match key_name(key_value) {
                Some(KeyName::FailsafeProductionActivePowerLimit) => value
                    .scaled_number
                    .ok_or_else(|| UseCaseError::OutOfRange("missing scaled number".into()))
                    .map(|number| FailsafeChange::PowerLimit(number.value())),
                Some(KeyName::FailsafeDurationMinimum) => value
                    .duration
                    .ok_or_else(|| UseCaseError::OutOfRange("missing duration".into()))
                    .and_then(|duration| duration.std_duration().map_err(UseCaseError::from))
                    .and_then(|duration| {
                        self.check_failsafe_duration(duration)?;
                        Ok(FailsafeChange::DurationMinimum(duration))
                    }),
                _ => continue,
            };

            match change {
                Ok(change) => changes.push(change),
                Err(e) => {
                    warn!("Rejected failsafe write {} from {}: {}", msg_counter, payload.ski, e);
                    library.answer_write(msg_counter, ResultData::error(WRITE_DENIED, e.to_string()));
                    return;
                }
            }
        }

        let mut events = Vec::with_capacity(changes.len());
        for change in changes {
            let applied = match change {
                FailsafeChange::PowerLimit(value) => self
                    .set_failsafe_production_active_power_limit(value, true)
                    .map(|_| UseCaseEvent::DataUpdateFailsafeProductionActivePowerLimit),
                FailsafeChange::DurationMinimum(duration) => self
                    .set_failsafe_duration_minimum(duration, true)
                    .map(|_| UseCaseEvent::DataUpdateFailsafeDurationMinimum),
            };

            match applied {
                Ok(event) => events.push(event),
                Err(e) => {
                    warn!("Failsafe write {} from {} failed: {}", msg_counter, payload.ski, e);
                    library.answer_write(msg_counter, ResultData::error(WRITE_DENIED, e.to_string()));
                    return;
                }
            }
        }

        library.answer_write(msg_counter, ResultData::success());
        for event in events {
            self.base.emit(payload, event);
        }
    }
}

impl UseCase for Lpp {
    fn use_case_name(&self) -> UseCaseName {
        self.base.name()
    }

    fn add_features(&self) {
        let library = self.base.library();
        for feature in [
            FeatureType::LoadControl,
            FeatureType::DeviceConfiguration,
            FeatureType::DeviceDiagnosis,
        ] {
            library.add_local_feature(feature, Role::Server);
        }
        library.add_local_feature(FeatureType::DeviceDiagnosis, Role::Client);

        if let Ok(control) = LocalLoadControl::new(library) {
            if self.limit_id().is_err() {
                control.add_limit_description(LoadControlLimitDescription {
                    limit_type: Some(LimitType::SignDependentAbsValueLimit),
                    limit_category: Some(LimitCategory::Obligation),
                    limit_direction: Some(EnergyDirection::Produce),
                    unit: Some(Unit::W),
                    scope_type: Some(ScopeType::ActivePowerLimit),
                    ..Default::default()
                });
            }
        }

        if let Ok(config) = LocalDeviceConfiguration::new(library) {
            config.add_key(KeyValueDescription {
                key_name: Some(KeyName::FailsafeProductionActivePowerLimit),
                value_type: Some(KeyValueType::ScaledNumber),
                unit: Some(Unit::W),
                ..Default::default()
            });
            config.add_key(KeyValueDescription {
                key_name: Some(KeyName::FailsafeDurationMinimum),
                value_type: Some(KeyValueType::Duration),
                ..Default::default()
            });
        }
    }

    fn add_use_case(&self) {
        self.base.add_use_case();
    }

    fn is_use_case_supported(&self, entity: &EntityRef) -> Result<bool, UseCaseError> {
        self.base.is_use_case_supported(entity)
    }

    fn handle_event(&self, payload: &EventPayload) {
        if !self.base.is_compatible_entity(payload.entity.as_ref()) {
            return;
        }

        if payload.event_type == EventType::EntityChange {
            if payload.change_type == ChangeType::Remove {
                info!("Energy guard {} disconnected", payload.ski);
            }
            return;
        }
        if payload.event_type != EventType::DataChange || !payload.is_classifier(CmdClassifier::Write) {
            return;
        }

        match &payload.data {
            Some(DataElement::LoadControlLimits(limits)) => self.limit_write_requested(payload, limits),
            Some(DataElement::KeyValues(key_values)) => self.key_values_written(payload, key_values),
            _ => {}
        }
    }
}
