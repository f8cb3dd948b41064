//! Use case skeleton
//!
//! Every use case registers its local features, announces its support and
//! reacts to inbound `EventPayload`s. Business events are raised to the host
//! through a single callback.

use std::fmt;
use std::sync::Arc;

use cem_spine::{
    DeviceRef, EntityRef, EntityType, EventPayload, FeatureLibrary, FeatureType, UseCaseActor,
    UseCaseName, UseCaseScenario, UseCaseSupport,
};
use serde::Serialize;
use tracing::debug;

use crate::entity::is_compatible_entity;
use crate::error::UseCaseError;

/// Business event raised to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum UseCaseEvent {
    /// Energy demand of the EV changed
    DataUpdateEnergyDemand,
    /// Power limits and incentives must be written now
    DataRequestedPowerLimitsAndIncentives,
    DataUpdateChargePlan,
    DataUpdateTimeSlotConstraints,
    /// Incentive table description must be written now
    DataRequestedIncentiveTableDescription,
    DataUpdateIncentiveTable,
    /// A remote write awaits approval
    WriteApprovalRequired,
    DataUpdateLimit,
    DataUpdateFailsafeProductionActivePowerLimit,
    DataUpdateFailsafeDurationMinimum,
}

impl fmt::Display for UseCaseEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Host callback: (ski, device, entity, event)
pub type EventCallback =
    Arc<dyn Fn(&str, Option<&DeviceRef>, Option<&EntityRef>, UseCaseEvent) + Send + Sync>;

/// Contract every use case exposes to the host
pub trait UseCase: Send + Sync {
    fn use_case_name(&self) -> UseCaseName;

    /// Register the local features this use case needs
    fn add_features(&self);

    /// Announce use case support on the local entity
    fn add_use_case(&self);

    /// Whether the remote entity supports the mandatory scenarios
    fn is_use_case_supported(&self, entity: &EntityRef) -> Result<bool, UseCaseError>;

    /// Handle an inbound event; failures are logged, never returned
    fn handle_event(&self, payload: &EventPayload);
}

/// State shared by all use cases
pub struct UseCaseBase {
    library: Arc<dyn FeatureLibrary>,
    actor: UseCaseActor,
    remote_actor: UseCaseActor,
    name: UseCaseName,
    version: String,
    scenarios: Vec<UseCaseScenario>,
    compatible_entity_types: Vec<EntityType>,
    callback: EventCallback,
}

impl UseCaseBase {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        library: Arc<dyn FeatureLibrary>,
        actor: UseCaseActor,
        remote_actor: UseCaseActor,
        name: UseCaseName,
        version: impl Into<String>,
        scenarios: Vec<UseCaseScenario>,
        compatible_entity_types: Vec<EntityType>,
        callback: EventCallback,
    ) -> Self {
        Self {
            library,
            actor,
            remote_actor,
            name,
            version: version.into(),
            scenarios,
            compatible_entity_types,
            callback,
        }
    }

    pub fn library(&self) -> &dyn FeatureLibrary {
        self.library.as_ref()
    }

    pub fn name(&self) -> UseCaseName {
        self.name
    }

    pub fn scenarios(&self) -> &[UseCaseScenario] {
        &self.scenarios
    }

    pub fn is_compatible_entity(&self, entity: Option<&EntityRef>) -> bool {
        is_compatible_entity(entity, &self.compatible_entity_types)
    }

    /// Compatible entity or `NoCompatibleEntity`
    pub fn compatible_entity<'e>(&self, entity: Option<&'e EntityRef>) -> Result<&'e EntityRef, UseCaseError> {
        match entity {
            Some(entity) if self.is_compatible_entity(Some(entity)) => Ok(entity),
            _ => Err(UseCaseError::NoCompatibleEntity),
        }
    }

    pub fn add_use_case(&self) {
        self.library.add_use_case_support(UseCaseSupport {
            actor: self.actor,
            name: self.name,
            version: self.version.clone(),
            scenarios: self.scenarios.iter().map(|s| s.scenario).collect(),
            available: true,
        });
    }

    pub fn is_use_case_supported(&self, entity: &EntityRef) -> Result<bool, UseCaseError> {
        let entity = self.compatible_entity(Some(entity))?;

        let mandatory: Vec<&UseCaseScenario> = self.scenarios.iter().filter(|s| s.mandatory).collect();
        let scenarios: Vec<u32> = mandatory.iter().map(|s| s.scenario).collect();
        let mut server_features: Vec<FeatureType> = Vec::new();
        for feature in mandatory.iter().flat_map(|s| s.server_features.iter()) {
            if !server_features.contains(feature) {
                server_features.push(*feature);
            }
        }

        Ok(self.library.verify_use_case(
            entity,
            self.remote_actor,
            self.name,
            &scenarios,
            &server_features,
        ))
    }

    /// Raise a business event to the host
    pub fn emit(&self, payload: &EventPayload, event: UseCaseEvent) {
        self.emit_to(&payload.ski, payload.device.as_ref(), payload.entity.as_ref(), event);
    }

    pub fn emit_to(&self, ski: &str, device: Option<&DeviceRef>, entity: Option<&EntityRef>, event: UseCaseEvent) {
        debug!("{} raises {} for {}", self.name, event, ski);
        (self.callback)(ski, device, entity, event);
    }
}
