//! Coordinated EV Charging
//!
//! CEM side of the coordinated EV charging use case:
//! - reads the EV's energy demand and charge strategy from its Time Series
//! - negotiates power-limit and incentive slots within the EV's constraints
//! - reads back the resulting charge plan
//!
//! The engine holds no state of its own. Every accessor re-derives its result
//! from the feature library's snapshot, and the event handler only issues
//! fire-and-forget requests and raises business events.
//!
//! ## Response windows
//!
//! After `DataRequestedPowerLimitsAndIncentives` the host should write power
//! limits within 15 s (at most 55 s) and incentives within 20 s. The engine
//! does not enforce this; see `crate::watchdog`.

mod events;
mod public;
pub mod types;

use std::sync::Arc;

use cem_spine::{
    EntityRef, EventPayload, FeatureLibrary, FeatureType, Role, UseCaseActor, UseCaseName,
    UseCaseScenario,
};

use crate::config::CevcConfig;
use crate::error::UseCaseError;
use crate::usecase::{EventCallback, UseCase, UseCaseBase};

pub use types::*;

pub const CEVC_VERSION: &str = "1.0.1";

/// Coordinated EV charging use case (CEM actor)
pub struct Cevc {
    base: UseCaseBase,
    config: CevcConfig,
}

impl Cevc {
    pub fn new(library: Arc<dyn FeatureLibrary>, config: CevcConfig, callback: EventCallback) -> Self {
        let scenario = |scenario: u32, mandatory: bool, features: &[FeatureType]| UseCaseScenario {
            scenario,
            mandatory,
            server_features: features.to_vec(),
        };

        let scenarios = vec![
            scenario(1, true, &[FeatureType::TimeSeries]),
            scenario(2, true, &[FeatureType::TimeSeries]),
            scenario(3, true, &[FeatureType::IncentiveTable]),
            scenario(4, true, &[FeatureType::IncentiveTable]),
            scenario(5, true, &[FeatureType::TimeSeries]),
            scenario(6, true, &[FeatureType::TimeSeries]),
            scenario(7, false, &[]),
            scenario(8, false, &[]),
        ];

        let base = UseCaseBase::new(
            library,
            UseCaseActor::Cem,
            UseCaseActor::Ev,
            UseCaseName::CoordinatedEvCharging,
            CEVC_VERSION,
            scenarios,
            config.compatible_entity_types.clone(),
            callback,
        );

        Self { base, config }
    }

    pub fn config(&self) -> &CevcConfig {
        &self.config
    }
}

impl UseCase for Cevc {
    fn use_case_name(&self) -> UseCaseName {
        self.base.name()
    }

    fn add_features(&self) {
        let library = self.base.library();
        for feature in [
            FeatureType::DeviceConfiguration,
            FeatureType::TimeSeries,
            FeatureType::IncentiveTable,
            FeatureType::ElectricalConnection,
        ] {
            library.add_local_feature(feature, Role::Client);
        }
    }

    fn add_use_case(&self) {
        self.base.add_use_case();
    }

    fn is_use_case_supported(&self, entity: &EntityRef) -> Result<bool, UseCaseError> {
        self.base.is_use_case_supported(entity)
    }

    fn handle_event(&self, payload: &EventPayload) {
        self.dispatch(payload);
    }
}
