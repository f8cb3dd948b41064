//! Scenario API of the production-limit use case

use std::collections::HashMap;
use std::time::Duration;

use tracing::info;

use cem_spine::model::{ConfigurationValue, KeyName, LoadControlLimit, ResultData};
use cem_spine::{AbsoluteOrRelativeTime, DurationType, MsgCounter, ScaledNumber, TimePeriod};

use super::{LoadLimit, Lpp, WRITE_DENIED};
use crate::error::UseCaseError;
use crate::usecase::UseCaseEvent;

impl Lpp {
    // ========================================================================
    // Scenario 1: production limit
    // ========================================================================

    /// Limit writes waiting for approval, keyed by message counter
    pub fn pending_production_limits(&self) -> HashMap<MsgCounter, LoadLimit> {
        self.pending_limits
            .lock()
            .iter()
            .map(|(msg_counter, pending)| (*msg_counter, LoadLimit::from_wire(&pending.limit)))
            .collect()
    }

    /// Answer a pending limit write; an approved limit becomes active locally
    pub fn approve_or_deny_production_limit(
        &self,
        msg_counter: MsgCounter,
        approve: bool,
        reason: &str,
    ) -> Result<(), UseCaseError> {
        if !self.pending_limits.lock().contains_key(&msg_counter) {
            return Err(UseCaseError::UnknownMessage(msg_counter));
        }
        let control = if approve { Some(self.load_control()?) } else { None };

        let pending = self
            .pending_limits
            .lock()
            .remove(&msg_counter)
            .ok_or(UseCaseError::UnknownMessage(msg_counter))?;

        let library = self.base.library();
        let Some(control) = control else {
            info!("Denied production limit write {}: {}", msg_counter, reason);
            library.answer_write(msg_counter, ResultData::error(WRITE_DENIED, reason));
            return Ok(());
        };

        control.set_limit(pending.limit);
        library.answer_write(msg_counter, ResultData::success());
        self.base.emit_to(
            &pending.ski,
            pending.device.as_ref(),
            pending.entity.as_ref(),
            UseCaseEvent::DataUpdateLimit,
        );
        Ok(())
    }

    pub fn production_limit(&self) -> Result<LoadLimit, UseCaseError> {
        let limit_id = self.limit_id()?;
        let limit = self
            .load_control()?
            .limit_for_id(limit_id)
            .map_err(|_| UseCaseError::DataNotAvailable)?;
        Ok(LoadLimit::from_wire(&limit))
    }

    pub fn set_production_limit(&self, limit: LoadLimit) -> Result<(), UseCaseError> {
        let limit_id = self.limit_id()?;
        let time_period = (!limit.duration.is_zero()).then(|| TimePeriod {
            start_time: None,
            end_time: Some(AbsoluteOrRelativeTime::from_duration(limit.duration)),
        });

        self.load_control()?.set_limit(LoadControlLimit {
            limit_id: Some(limit_id),
            is_limit_changeable: Some(limit.is_changeable),
            is_limit_active: Some(limit.is_active),
            time_period,
            value: Some(ScaledNumber::from_f64(limit.value)),
        });
        Ok(())
    }

    // ========================================================================
    // Scenario 2: failsafe values
    // ========================================================================

    pub fn failsafe_production_active_power_limit(&self) -> Result<f64, UseCaseError> {
        self.device_configuration()?
            .key_value_for_name(KeyName::FailsafeProductionActivePowerLimit)
            .ok()
            .and_then(|key_value| key_value.value)
            .and_then(|value| value.scaled_number)
            .map(|number| number.value())
            .ok_or(UseCaseError::DataNotAvailable)
    }

    pub fn set_failsafe_production_active_power_limit(&self, value: f64, is_changeable: bool) -> Result<(), UseCaseError> {
        let value = ConfigurationValue {
            scaled_number: Some(ScaledNumber::from_f64(value)),
            ..Default::default()
        };
        self.device_configuration()?
            .set_key_value_for_name(KeyName::FailsafeProductionActivePowerLimit, value, is_changeable)?;
        Ok(())
    }

    pub fn failsafe_duration_minimum(&self) -> Result<Duration, UseCaseError> {
        let duration = self
            .device_configuration()?
            .key_value_for_name(KeyName::FailsafeDurationMinimum)
            .ok()
            .and_then(|key_value| key_value.value)
            .and_then(|value| value.duration)
            .ok_or(UseCaseError::DataNotAvailable)?;
        Ok(duration.std_duration()?)
    }

    pub(super) fn check_failsafe_duration(&self, duration: Duration) -> Result<(), UseCaseError> {
        if duration < self.config.failsafe_duration_min || duration > self.config.failsafe_duration_max {
            return Err(UseCaseError::OutOfRange(format!(
                "failsafe duration {}s",
                duration.as_secs()
            )));
        }
        Ok(())
    }

    /// Failsafe duration must lie within the configured range (2 h to 24 h)
    pub fn set_failsafe_duration_minimum(&self, duration: Duration, is_changeable: bool) -> Result<(), UseCaseError> {
        self.check_failsafe_duration(duration)?;

        let value = ConfigurationValue {
            duration: Some(DurationType::from_duration(duration)),
            ..Default::default()
        };
        self.device_configuration()?
            .set_key_value_for_name(KeyName::FailsafeDurationMinimum, value, is_changeable)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;
    use crate::config::LppConfig;
    use crate::lpp::PendingLimit;
    use crate::usecase::{EventCallback, UseCase};
    use cem_spine::model::KeyValue;
    use cem_spine::{DataElement, DeviceRef, EntityRef, EntityType, EventPayload, MemoryLibrary};

    fn setup() -> (Arc<MemoryLibrary>, Lpp, Arc<Mutex<Vec<UseCaseEvent>>>) {
        let library = Arc::new(MemoryLibrary::new());
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let callback: EventCallback = Arc::new(
            move |_: &str, _: Option<&DeviceRef>, _: Option<&EntityRef>, event: UseCaseEvent| {
                sink.lock().push(event)
            },
        );

        let lpp = Lpp::new(library.clone(), LppConfig::default(), callback);
        lpp.add_features();
        lpp.add_use_case();
        (library, lpp, events)
    }

    fn guard() -> EntityRef {
        EntityRef::new("ski-guard", "d:_i:GRID", vec![1], EntityType::GridGuard)
    }

    fn limit_write(lpp: &Lpp, value: i64, msg_counter: MsgCounter) -> EventPayload {
        let limit_id = lpp.limit_id().unwrap();
        EventPayload::write_request(
            &guard(),
            DataElement::LoadControlLimits(vec![LoadControlLimit {
                limit_id: Some(limit_id),
                is_limit_active: Some(true),
                value: Some(ScaledNumber::new(value, 0)),
                ..Default::default()
            }]),
            msg_counter,
        )
    }

    #[test]
    fn test_local_features_registered() {
        let (library, lpp, _) = setup();

        assert_eq!(library.local_use_cases().len(), 1);
        assert!(lpp.limit_id().is_ok());
        assert_eq!(lpp.production_limit(), Err(UseCaseError::DataNotAvailable));
    }

    #[test]
    fn test_approve_pending_limit() {
        let (library, lpp, events) = setup();

        lpp.handle_event(&limit_write(&lpp, 4200, 11));
        assert_eq!(events.lock().as_slice(), &[UseCaseEvent::WriteApprovalRequired]);
        assert_eq!(lpp.pending_production_limits()[&11].value, 4200.0);

        lpp.approve_or_deny_production_limit(11, true, "").unwrap();

        assert!(lpp.pending_production_limits().is_empty());
        let limit = lpp.production_limit().unwrap();
        assert_eq!(limit.value, 4200.0);
        assert!(limit.is_active);
        assert_eq!(library.write_answers(), vec![(11, ResultData::success())]);
        assert_eq!(events.lock().last(), Some(&UseCaseEvent::DataUpdateLimit));
    }

    #[test]
    fn test_deny_pending_limit() {
        let (library, lpp, events) = setup();

        lpp.handle_event(&limit_write(&lpp, 4200, 12));
        lpp.approve_or_deny_production_limit(12, false, "grid busy").unwrap();

        assert_eq!(lpp.production_limit(), Err(UseCaseError::DataNotAvailable));
        assert!(library.write_answers()[0].1.is_error());
        assert_eq!(events.lock().len(), 1);
        assert_eq!(
            lpp.approve_or_deny_production_limit(12, true, ""),
            Err(UseCaseError::UnknownMessage(12))
        );
    }

    #[test]
    fn test_incompatible_writer_ignored() {
        let (_, lpp, events) = setup();
        let ev = EntityRef::new("ski-ev", "d:_i:EV", vec![1], EntityType::Ev);
        let limit_id = lpp.limit_id().unwrap();
        let payload = EventPayload::write_request(
            &ev,
            DataElement::LoadControlLimits(vec![LoadControlLimit {
                limit_id: Some(limit_id),
                ..Default::default()
            }]),
            3,
        );

        lpp.handle_event(&payload);
        assert!(events.lock().is_empty());
        assert!(lpp.pending_production_limits().is_empty());
    }

    #[test]
    fn test_set_production_limit() {
        let (_, lpp, _) = setup();
        let limit = LoadLimit {
            duration: Duration::from_secs(3600),
            is_changeable: true,
            is_active: true,
            value: 6000.0,
        };

        lpp.set_production_limit(limit).unwrap();
        assert_eq!(lpp.production_limit().unwrap(), limit);
    }

    #[test]
    fn test_failsafe_values() {
        let (_, lpp, _) = setup();

        lpp.set_failsafe_production_active_power_limit(3000.5, true).unwrap();
        assert_eq!(lpp.failsafe_production_active_power_limit().unwrap(), 3000.5);

        let two_hours = Duration::from_secs(2 * 3600);
        lpp.set_failsafe_duration_minimum(two_hours, true).unwrap();
        assert_eq!(lpp.failsafe_duration_minimum().unwrap(), two_hours);

        assert!(matches!(
            lpp.set_failsafe_duration_minimum(Duration::from_secs(3600), true),
            Err(UseCaseError::OutOfRange(_))
        ));
        assert!(lpp
            .set_failsafe_duration_minimum(Duration::from_secs(25 * 3600), true)
            .is_err());
        assert_eq!(lpp.failsafe_duration_minimum().unwrap(), two_hours);
    }

    #[test]
    fn test_remote_failsafe_write() {
        let (library, lpp, events) = setup();
        let key_id = duration_key_id(&lpp);

        let write = |duration: &str, msg_counter| {
            EventPayload::write_request(
                &guard(),
                DataElement::KeyValues(vec![KeyValue {
                    key_id: Some(key_id),
                    value: Some(ConfigurationValue {
                        duration: Some(DurationType::new(duration)),
                        ..Default::default()
                    }),
                    ..Default::default()
                }]),
                msg_counter,
            )
        };

        lpp.handle_event(&write("PT3H", 21));
        assert_eq!(lpp.failsafe_duration_minimum().unwrap(), Duration::from_secs(3 * 3600));
        assert_eq!(
            events.lock().as_slice(),
            &[UseCaseEvent::DataUpdateFailsafeDurationMinimum]
        );

        lpp.handle_event(&write("PT1H", 22));
        assert!(library.write_answers()[1].1.is_error());
        assert_eq!(lpp.failsafe_duration_minimum().unwrap(), Duration::from_secs(3 * 3600));
    }

    #[test]
    fn test_failsafe_write_applies_all_or_nothing() {
        let (library, lpp, events) = setup();
        let power_key = key_id(&lpp, KeyName::FailsafeProductionActivePowerLimit);
        let duration_key = duration_key_id(&lpp);

        let write = |duration: &str, msg_counter| {
            EventPayload::write_request(
                &guard(),
                DataElement::KeyValues(vec![
                    KeyValue {
                        key_id: Some(power_key),
                        value: Some(ConfigurationValue {
                            scaled_number: Some(ScaledNumber::new(2500, 0)),
                            ..Default::default()
                        }),
                        ..Default::default()
                    },
                    KeyValue {
                        key_id: Some(duration_key),
                        value: Some(ConfigurationValue {
                            duration: Some(DurationType::new(duration)),
                            ..Default::default()
                        }),
                        ..Default::default()
                    },
                ]),
                msg_counter,
            )
        };

        lpp.handle_event(&write("PT1H", 31));
        assert!(library.write_answers()[0].1.is_error());
        assert_eq!(
            lpp.failsafe_production_active_power_limit(),
            Err(UseCaseError::DataNotAvailable)
        );
        assert_eq!(lpp.failsafe_duration_minimum(), Err(UseCaseError::DataNotAvailable));
        assert!(events.lock().is_empty());

        lpp.handle_event(&write("PT4H", 32));
        assert_eq!(library.write_answers()[1], (32, ResultData::success()));
        assert_eq!(lpp.failsafe_production_active_power_limit().unwrap(), 2500.0);
        assert_eq!(lpp.failsafe_duration_minimum().unwrap(), Duration::from_secs(4 * 3600));
        assert_eq!(
            events.lock().as_slice(),
            &[
                UseCaseEvent::DataUpdateFailsafeProductionActivePowerLimit,
                UseCaseEvent::DataUpdateFailsafeDurationMinimum,
            ]
        );
    }

    #[test]
    fn test_approval_keeps_write_pending_without_load_control() {
        let library = Arc::new(MemoryLibrary::new());
        let callback: EventCallback = Arc::new(
            |_: &str, _: Option<&DeviceRef>, _: Option<&EntityRef>, _: UseCaseEvent| {},
        );
        let lpp = Lpp::new(library.clone(), LppConfig::default(), callback);
        lpp.pending_limits.lock().insert(
            41,
            PendingLimit {
                ski: "ski-guard".to_string(),
                device: None,
                entity: None,
                limit: LoadControlLimit {
                    limit_id: Some(0),
                    value: Some(ScaledNumber::new(4200, 0)),
                    ..Default::default()
                },
            },
        );

        assert_eq!(
            lpp.approve_or_deny_production_limit(41, true, ""),
            Err(UseCaseError::DataNotAvailable)
        );
        assert!(lpp.pending_production_limits().contains_key(&41));
        assert!(library.write_answers().is_empty());

        lpp.approve_or_deny_production_limit(41, false, "no load control").unwrap();
        assert!(lpp.pending_production_limits().is_empty());
        assert_eq!(library.write_answers().len(), 1);
        assert!(library.write_answers()[0].1.is_error());
    }

    fn key_id(lpp: &Lpp, name: KeyName) -> u32 {
        lpp.device_configuration()
            .unwrap()
            .descriptions()
            .into_iter()
            .find(|d| d.key_name == Some(name))
            .and_then(|d| d.key_id)
            .unwrap()
    }

    fn duration_key_id(lpp: &Lpp) -> u32 {
        key_id(lpp, KeyName::FailsafeDurationMinimum)
    }
}
