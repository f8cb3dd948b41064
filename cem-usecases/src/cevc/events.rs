//! Event handling of the coordinated EV charging use case

use cem_spine::model::{IncentiveTableDescription, TimeSeriesDescription, TimeSeriesType};
use cem_spine::{ChangeType, CmdClassifier, DataElement, EntityRef, EventPayload, EventType, FeatureError, MsgCounter};
use tracing::{debug, error, info};

use super::Cevc;
use crate::entity::{is_entity_connected, is_entity_disconnected};
use crate::features::{DeviceConfiguration, IncentiveTable, TimeSeries};
use crate::usecase::UseCaseEvent;

/// Log a failed fire-and-forget request
fn log_request(what: &str, entity: &EntityRef, result: Result<MsgCounter, FeatureError>) {
    if let Err(e) = result {
        debug!("{} for {} failed: {}", what, entity, e);
    }
}

impl Cevc {
    pub(super) fn dispatch(&self, payload: &EventPayload) {
        if !self.base.is_compatible_entity(payload.entity.as_ref()) {
            return;
        }
        let Some(entity) = payload.entity.as_ref() else {
            return;
        };

        if is_entity_connected(payload) {
            self.ev_connected(entity);
            return;
        }
        if is_entity_disconnected(payload) {
            info!("EV {} disconnected", entity);
            return;
        }
        if payload.event_type != EventType::DataChange || payload.change_type != ChangeType::Update {
            return;
        }

        match &payload.data {
            Some(DataElement::TimeSeriesDescriptions(descriptions)) => {
                self.time_series_descriptions_updated(payload, entity, descriptions)
            }
            Some(DataElement::TimeSeries(_)) => self.time_series_data_updated(payload, entity),
            Some(DataElement::IncentiveTableDescriptions(descriptions)) => {
                self.incentive_descriptions_updated(payload, entity, descriptions)
            }
            Some(DataElement::IncentiveTableConstraints(_)) | Some(DataElement::IncentiveTables(_)) => {
                self.base.emit(payload, UseCaseEvent::DataUpdateIncentiveTable)
            }
            _ => {}
        }
    }

    /// Subscribe to and request everything the use case needs from a new EV
    fn ev_connected(&self, entity: &EntityRef) {
        info!("EV {} connected", entity);
        let library = self.base.library();

        if let Ok(config) = DeviceConfiguration::new(library, entity) {
            log_request("Device configuration subscription", entity, config.subscribe());
            log_request("Device configuration descriptions", entity, config.request_descriptions());
        }

        if let Ok(series) = TimeSeries::new(library, entity) {
            log_request("Time series subscription", entity, series.subscribe());
            log_request("Time series binding", entity, series.bind());
            log_request("Time series descriptions", entity, series.request_descriptions());
            log_request("Time series constraints", entity, series.request_constraints());
        }

        if let Ok(table) = IncentiveTable::new(library, entity) {
            log_request("Incentive table subscription", entity, table.subscribe());
            log_request("Incentive table binding", entity, table.bind());
            log_request("Incentive table descriptions", entity, table.request_descriptions());
        }
    }

    fn time_series_descriptions_updated(
        &self,
        payload: &EventPayload,
        entity: &EntityRef,
        descriptions: &[TimeSeriesDescription],
    ) {
        let Ok(series) = TimeSeries::new(self.base.library(), entity) else {
            return;
        };

        if payload.is_classifier(CmdClassifier::Reply) {
            if series.request_constraints().is_err() {
                log_request("Time series values", entity, series.request_values());
            }
            return;
        }

        let update_required = descriptions.iter().any(|description| {
            description.time_series_type == Some(TimeSeriesType::Constraints)
                && description.update_required == Some(true)
        });
        if !payload.is_classifier(CmdClassifier::Notify) || !update_required {
            return;
        }

        if let Err(e) = self.energy_demand(Some(entity)) {
            debug!("Energy demand of {} not available: {}", entity, e);
            return;
        }
        self.base.emit(payload, UseCaseEvent::DataUpdateEnergyDemand);

        if let Err(e) = self.time_slot_constraints(Some(entity)) {
            error!("Time slot constraints of {} not available: {}", entity, e);
            return;
        }
        if let Err(e) = self.incentive_constraints(Some(entity)) {
            error!("Incentive constraints of {} not available: {}", entity, e);
            return;
        }
        self.base
            .emit(payload, UseCaseEvent::DataRequestedPowerLimitsAndIncentives);
    }

    fn time_series_data_updated(&self, payload: &EventPayload, entity: &EntityRef) {
        if self.charge_plan(Some(entity)).is_ok() {
            self.base.emit(payload, UseCaseEvent::DataUpdateChargePlan);
        }
        if self.charge_plan_constraints(Some(entity)).is_ok() {
            self.base.emit(payload, UseCaseEvent::DataUpdateTimeSlotConstraints);
        }
    }

    fn incentive_descriptions_updated(
        &self,
        payload: &EventPayload,
        entity: &EntityRef,
        descriptions: &[IncentiveTableDescription],
    ) {
        let Ok(table) = IncentiveTable::new(self.base.library(), entity) else {
            return;
        };

        if payload.is_classifier(CmdClassifier::Reply) {
            if table.request_constraints().is_err() {
                log_request("Incentive table values", entity, table.request_values());
            }
            return;
        }

        let update_required = descriptions.iter().any(|description| {
            description
                .tariff_description
                .as_ref()
                .map_or(false, |tariff| tariff.update_required == Some(true))
        });
        if payload.is_classifier(CmdClassifier::Notify) && update_required {
            self.base
                .emit(payload, UseCaseEvent::DataRequestedIncentiveTableDescription);
        }
    }
}
