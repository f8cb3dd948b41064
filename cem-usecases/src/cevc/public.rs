//! Scenario API of the coordinated EV charging use case

use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tracing::debug;

use cem_spine::model::{
    BoundaryDescription, BoundaryType, Incentive, IncentiveDescription, IncentiveSlot,
    IncentiveTable as IncentiveTableData, IncentiveTableDescription, IncentiveTableDescriptionTier,
    IncentiveTableTier, IncentiveType, ScopeType, TariffDescription, TierBoundary, TierDescription,
    TierType, TimeSeriesData, TimeSeriesSlot, TimeSeriesType, Unit,
};
use cem_spine::{AbsoluteOrRelativeTime, DurationType, EntityRef, ScaledNumber, TimePeriod};

use super::types::*;
use super::Cevc;
use crate::error::UseCaseError;
use crate::features::{ElectricalConnection, IncentiveTable, TimeSeries};

impl Cevc {
    /// Compatible entity for writers, which report `DataNotAvailable` otherwise
    fn writable_entity<'e>(&self, entity: Option<&'e EntityRef>) -> Result<&'e EntityRef, UseCaseError> {
        self.base
            .compatible_entity(entity)
            .map_err(|_| UseCaseError::DataNotAvailable)
    }

    fn time_series<'a>(&'a self, entity: &'a EntityRef) -> Result<TimeSeries<'a>, UseCaseError> {
        TimeSeries::new(self.base.library(), entity).map_err(|_| UseCaseError::DataNotAvailable)
    }

    fn incentive_table<'a>(&'a self, entity: &'a EntityRef) -> Result<IncentiveTable<'a>, UseCaseError> {
        IncentiveTable::new(self.base.library(), entity).map_err(|_| UseCaseError::DataNotAvailable)
    }

    // ========================================================================
    // Scenario 1: EV energy demand
    // ========================================================================

    /// Charge strategy derived from the first single-demand slot
    pub fn charge_strategy(&self, entity: Option<&EntityRef>) -> EvChargeStrategy {
        let Ok(entity) = self.base.compatible_entity(entity) else {
            return EvChargeStrategy::Unknown;
        };
        let Ok(series) = self.time_series(entity) else {
            return EvChargeStrategy::Unknown;
        };
        let Ok(data) = series.value_for_type(TimeSeriesType::SingleDemand) else {
            return EvChargeStrategy::Unknown;
        };
        match data.time_series_slot.first() {
            Some(slot) => classify_demand_slot(slot),
            None => EvChargeStrategy::Unknown,
        }
    }

    /// Energy demand from the first single-demand slot
    pub fn energy_demand(&self, entity: Option<&EntityRef>) -> Result<Demand, UseCaseError> {
        let entity = self.writable_entity(entity)?;
        let data = self
            .time_series(entity)?
            .value_for_type(TimeSeriesType::SingleDemand)
            .map_err(|_| UseCaseError::DataNotAvailable)?;

        let slot = data
            .time_series_slot
            .first()
            .ok_or(UseCaseError::DataNotAvailable)?;

        Ok(demand_from_slot(&data, slot, Utc::now()))
    }

    // ========================================================================
    // Scenario 2: time slot constraints and power limits
    // ========================================================================

    pub fn time_slot_constraints(&self, entity: Option<&EntityRef>) -> Result<TimeSlotConstraints, UseCaseError> {
        let entity = self.base.compatible_entity(entity)?;
        let constraints = self
            .time_series(entity)?
            .constraints()
            .map_err(|_| UseCaseError::DataNotAvailable)?;
        let constraint = constraints.first().ok_or(UseCaseError::DataNotAvailable)?;

        let bound = |duration: &Option<DurationType>| {
            duration
                .as_ref()
                .and_then(|duration| duration.std_duration().ok())
                .unwrap_or_default()
        };

        Ok(TimeSlotConstraints {
            min_slots: constraint.slot_count_min.unwrap_or_default(),
            max_slots: constraint.slot_count_max.unwrap_or_default(),
            min_slot_duration: bound(&constraint.slot_duration_min),
            max_slot_duration: bound(&constraint.slot_duration_max),
            slot_duration_step_size: bound(&constraint.slot_duration_step_size),
        })
    }

    /// Write the maximum power per slot; an empty list writes one default slot
    /// at the highest permitted power
    pub fn write_power_limits(&self, entity: Option<&EntityRef>, slots: &[DurationSlotValue]) -> Result<(), UseCaseError> {
        let entity = self.writable_entity(entity)?;
        let series = self.time_series(entity)?;

        let slots = if slots.is_empty() {
            let (_, max_power) = ElectricalConnection::new(self.base.library(), entity)
                .and_then(|connection| connection.permitted_range_for_scope(ScopeType::AcPowerTotal))
                .map_err(|_| UseCaseError::DataNotAvailable)?;
            vec![DurationSlotValue::new(self.config.default_slot_window, max_power)]
        } else {
            slots.to_vec()
        };

        let constraints = self.time_slot_constraints(Some(entity))?;
        check_slot_count(slots.len(), constraints.min_slots, constraints.max_slots)?;

        let time_series_id = series
            .description_for_type(TimeSeriesType::Constraints)
            .ok()
            .and_then(|description| description.time_series_id)
            .ok_or(UseCaseError::DataNotAvailable)?;

        let mut time_series_slot = Vec::with_capacity(slots.len());
        let total = for_each_relative_period(&slots, |index, period, slot| {
            time_series_slot.push(TimeSeriesSlot {
                time_series_slot_id: Some(index as u32),
                time_period: Some(period),
                max_value: Some(ScaledNumber::from_f64(slot.value)),
                ..Default::default()
            });
        });

        let data = TimeSeriesData {
            time_series_id: Some(time_series_id),
            time_period: Some(TimePeriod::relative(Duration::ZERO, Some(total))),
            time_series_slot,
        };

        series.write_values(vec![data])?;
        debug!("Wrote {} power limit slots to {}", slots.len(), entity);
        Ok(())
    }

    // ========================================================================
    // Scenario 3: incentive table description and constraints
    // ========================================================================

    pub fn incentive_constraints(&self, entity: Option<&EntityRef>) -> Result<IncentiveSlotConstraints, UseCaseError> {
        let entity = self.base.compatible_entity(entity)?;
        let constraints = self
            .incentive_table(entity)?
            .constraints()
            .map_err(|_| UseCaseError::DataNotAvailable)?;
        let constraint = constraints.first().ok_or(UseCaseError::DataNotAvailable)?;

        let slots = constraint.incentive_slot_constraints.clone().unwrap_or_default();
        Ok(IncentiveSlotConstraints {
            min_slots: slots.slot_count_min.unwrap_or_default(),
            max_slots: slots.slot_count_max.unwrap_or_default(),
        })
    }

    /// Write the tariff structure; incomplete input falls back to a single
    /// dynamic-cost tier with one power boundary and one absolute price
    pub fn write_incentive_table_descriptions(
        &self,
        entity: Option<&EntityRef>,
        tariffs: &[IncentiveTariffDescription],
    ) -> Result<(), UseCaseError> {
        let entity = self.writable_entity(entity)?;
        let table = self.incentive_table(entity)?;

        let existing: Vec<TariffDescription> = table
            .descriptions_for_scope(ScopeType::SimpleIncentiveTable)
            .map_err(|_| UseCaseError::DataNotAvailable)?
            .into_iter()
            .filter_map(|description| description.tariff_description)
            .collect();
        let first = existing.first().cloned().ok_or(UseCaseError::DataNotAvailable)?;

        let forward = tariffs.first().map_or(false, |tariff| !tariff.tiers.is_empty())
            && tariffs
                .iter()
                .flat_map(|tariff| tariff.tiers.iter())
                .all(TariffTier::is_complete);

        let descriptions = if forward {
            tariffs
                .iter()
                .enumerate()
                .map(|(index, tariff)| IncentiveTableDescription {
                    tariff_description: Some(existing.get(index).cloned().unwrap_or_else(|| first.clone())),
                    tier: tariff.tiers.iter().map(describe_tier).collect(),
                })
                .collect()
        } else {
            let fallback = TariffTier {
                id: 0,
                tier_type: TierType::DynamicCost,
                boundaries: vec![TariffBoundary {
                    id: 0,
                    boundary_type: BoundaryType::PowerBoundary,
                    unit: Unit::W,
                }],
                incentives: vec![TariffIncentive {
                    id: 0,
                    incentive_type: IncentiveType::AbsoluteCost,
                    currency: self.config.currency,
                    name: None,
                }],
            };
            vec![IncentiveTableDescription {
                tariff_description: Some(first),
                tier: vec![describe_tier(&fallback)],
            }]
        };

        table.write_descriptions(descriptions)?;
        Ok(())
    }

    // ========================================================================
    // Scenario 4: incentives
    // ========================================================================

    /// Write one price per slot; an empty list writes one default slot at the
    /// configured flat price
    pub fn write_incentives(&self, entity: Option<&EntityRef>, slots: &[DurationSlotValue]) -> Result<(), UseCaseError> {
        let entity = self.writable_entity(entity)?;
        let table = self.incentive_table(entity)?;

        let slots = if slots.is_empty() {
            vec![DurationSlotValue::new(
                self.config.default_slot_window,
                self.config.default_incentive_price,
            )]
        } else {
            slots.to_vec()
        };

        let constraints = self.incentive_constraints(Some(entity))?;
        check_slot_count(slots.len(), constraints.min_slots, constraints.max_slots)?;

        let mut incentive_slot = Vec::with_capacity(slots.len());
        for_each_relative_period(&slots, |_, period, slot| {
            incentive_slot.push(IncentiveSlot {
                time_interval: Some(period),
                tier: vec![IncentiveTableTier {
                    tier_id: Some(0),
                    boundary: vec![TierBoundary {
                        boundary_id: Some(0),
                        lower_boundary_value: Some(ScaledNumber::new(0, 0)),
                        upper_boundary_value: None,
                    }],
                    incentive: vec![Incentive {
                        incentive_id: Some(0),
                        value: Some(ScaledNumber::from_f64(slot.value)),
                    }],
                }],
            });
        });

        table.write_values(vec![IncentiveTableData {
            tariff_id: Some(0),
            incentive_slot,
        }])?;
        debug!("Wrote {} incentive slots to {}", slots.len(), entity);
        Ok(())
    }

    // ========================================================================
    // Scenario 5: charge plan
    // ========================================================================

    /// Slots of the EV's constraints series as (duration, max value)
    pub fn charge_plan_constraints(&self, entity: Option<&EntityRef>) -> Result<Vec<DurationSlotValue>, UseCaseError> {
        let entity = self.base.compatible_entity(entity)?;
        let data = self
            .time_series(entity)?
            .value_for_type(TimeSeriesType::Constraints)
            .map_err(|_| UseCaseError::DataNotAvailable)?;

        if data.time_series_slot.is_empty() {
            return Err(UseCaseError::DataNotAvailable);
        }

        let now = Utc::now();
        let slots = data
            .time_series_slot
            .iter()
            .map(|slot| {
                let duration = match (&slot.duration, &slot.time_period) {
                    (Some(duration), _) => duration.std_duration().unwrap_or_default(),
                    (None, Some(period)) => {
                        let offset = |time: &Option<AbsoluteOrRelativeTime>| {
                            time.as_ref()
                                .and_then(|time| time.duration_at(now).ok())
                                .unwrap_or_else(ChronoDuration::zero)
                        };
                        (offset(&period.end_time) - offset(&period.start_time))
                            .to_std()
                            .unwrap_or_default()
                    }
                    (None, None) => Duration::ZERO,
                };
                DurationSlotValue::new(duration, scaled(&slot.max_value))
            })
            .collect();

        Ok(slots)
    }

    /// Plan announced by the EV, resolved to absolute times
    pub fn charge_plan(&self, entity: Option<&EntityRef>) -> Result<ChargePlan, UseCaseError> {
        let entity = self.base.compatible_entity(entity)?;
        let data = self
            .time_series(entity)?
            .value_for_type(TimeSeriesType::Plan)
            .map_err(|_| UseCaseError::DataNotAvailable)?;

        if data.time_series_slot.is_empty() {
            return Err(UseCaseError::DataNotAvailable);
        }

        Ok(plan_from_series(&data, Utc::now()))
    }
}

// ============================================================================
// Pure helpers
// ============================================================================

fn scaled(number: &Option<ScaledNumber>) -> f64 {
    number.map(|number| number.value()).unwrap_or_default()
}

pub(crate) fn classify_demand_slot(slot: &TimeSeriesSlot) -> EvChargeStrategy {
    let Some(duration) = &slot.duration else {
        return if slot.value.map_or(false, |value| value.value() > 0.0) {
            EvChargeStrategy::DirectCharging
        } else {
            EvChargeStrategy::NoDemand
        };
    };

    if duration.duration().is_err() {
        return EvChargeStrategy::Unknown;
    }
    if slot.min_value.map_or(false, |min| min.value() > 0.0) {
        return EvChargeStrategy::MinSoC;
    }
    match slot.value.map(|value| value.value()) {
        Some(value) if value > 0.0 => EvChargeStrategy::TimedCharging,
        Some(value) if value == 0.0 => EvChargeStrategy::NoDemand,
        _ => EvChargeStrategy::Unknown,
    }
}

pub(crate) fn demand_from_slot(data: &TimeSeriesData, slot: &TimeSeriesSlot, now: DateTime<Utc>) -> Demand {
    let start_of = |period: &Option<TimePeriod>| {
        period
            .as_ref()
            .and_then(|period| period.start_time.as_ref())
            .and_then(|start| start.duration_at(now).ok())
    };

    let duration_until_start = start_of(&data.time_period)
        .or_else(|| start_of(&slot.time_period))
        .map(|start| start.num_milliseconds() as f64 / 1000.0)
        .unwrap_or_default();

    let duration_until_end = slot
        .duration
        .as_ref()
        .and_then(|duration| duration.std_duration().ok())
        .map(|duration| duration.as_secs_f64())
        .unwrap_or_default();

    Demand {
        min_demand: scaled(&slot.min_value),
        opt_demand: scaled(&slot.value),
        max_demand: scaled(&slot.max_value),
        duration_until_start,
        duration_until_end,
    }
}

pub(crate) fn plan_from_series(data: &TimeSeriesData, now: DateTime<Utc>) -> ChargePlan {
    let plan_start = data
        .time_period
        .as_ref()
        .and_then(|period| period.start_time.as_ref())
        .and_then(|start| start.time_at(now).ok())
        .unwrap_or(now);

    let mut slots: Vec<ChargePlanSlotValue> = Vec::with_capacity(data.time_series_slot.len());
    for slot in &data.time_series_slot {
        let period_start = slot
            .time_period
            .as_ref()
            .and_then(|period| period.start_time.as_ref())
            .and_then(|start| start.time_at(now).ok());

        let start = match (period_start, slots.last()) {
            (Some(start), _) => start,
            (None, Some(previous)) => previous.end,
            (None, None) => plan_start,
        };

        let duration = slot
            .duration
            .as_ref()
            .and_then(|duration| duration.duration().ok());
        let has_period_end = slot
            .time_period
            .as_ref()
            .map_or(false, |period| period.end_time.is_some());

        // Without a duration the end is taken from the period start.
        let end = match duration {
            Some(duration) => start + duration,
            None if has_period_end => period_start.unwrap_or(start),
            None => start,
        };

        slots.push(ChargePlanSlotValue {
            start,
            end,
            value: scaled(&slot.value),
            min_value: scaled(&slot.min_value),
            max_value: scaled(&slot.max_value),
        });
    }

    ChargePlan { slots }
}

/// Slot count against constraints where zero means unconstrained
pub(crate) fn check_slot_count(count: usize, min_slots: u32, max_slots: u32) -> Result<(), UseCaseError> {
    if min_slots != 0 && count < min_slots as usize {
        return Err(UseCaseError::TooFewSlots);
    }
    if max_slots != 0 && count > max_slots as usize {
        return Err(UseCaseError::TooManySlots);
    }
    Ok(())
}

/// Relative period per slot: each starts at the cumulative offset and only the
/// last carries an explicit end. Returns the total duration.
fn for_each_relative_period(
    slots: &[DurationSlotValue],
    mut apply: impl FnMut(usize, TimePeriod, &DurationSlotValue),
) -> Duration {
    let mut offset = Duration::ZERO;
    for (index, slot) in slots.iter().enumerate() {
        let start = offset;
        offset += slot.duration;
        let end = (index + 1 == slots.len()).then_some(offset);
        apply(index, TimePeriod::relative(start, end), slot);
    }
    offset
}

fn describe_tier(tier: &TariffTier) -> IncentiveTableDescriptionTier {
    IncentiveTableDescriptionTier {
        tier_description: Some(TierDescription {
            tier_id: Some(tier.id),
            tier_type: Some(tier.tier_type),
        }),
        boundary_description: tier
            .boundaries
            .iter()
            .map(|boundary| BoundaryDescription {
                boundary_id: Some(boundary.id),
                boundary_type: Some(boundary.boundary_type),
                boundary_unit: Some(boundary.unit),
            })
            .collect(),
        incentive_description: tier
            .incentives
            .iter()
            .map(|incentive| IncentiveDescription {
                incentive_id: Some(incentive.id),
                incentive_type: Some(incentive.incentive_type),
                currency: Some(incentive.currency),
                label: incentive.name.clone(),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn slot(value: Option<i64>, min: Option<i64>, duration: Option<&str>) -> TimeSeriesSlot {
        TimeSeriesSlot {
            value: value.map(|v| ScaledNumber::new(v, 0)),
            min_value: min.map(|v| ScaledNumber::new(v, 0)),
            duration: duration.map(DurationType::new),
            ..Default::default()
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_classify_demand_slot() {
        use EvChargeStrategy::*;

        assert_eq!(classify_demand_slot(&slot(Some(5000), None, None)), DirectCharging);
        assert_eq!(classify_demand_slot(&slot(Some(0), None, None)), NoDemand);
        assert_eq!(classify_demand_slot(&slot(None, None, None)), NoDemand);
        assert_eq!(classify_demand_slot(&slot(Some(5000), Some(100), Some("PT2H"))), MinSoC);
        assert_eq!(classify_demand_slot(&slot(None, Some(100), Some("PT2H"))), MinSoC);
        assert_eq!(classify_demand_slot(&slot(Some(5000), None, Some("PT2H"))), TimedCharging);
        assert_eq!(classify_demand_slot(&slot(Some(0), Some(0), Some("PT2H"))), NoDemand);
        assert_eq!(classify_demand_slot(&slot(None, None, Some("PT2H"))), Unknown);
        assert_eq!(classify_demand_slot(&slot(Some(5000), None, Some("2 hours"))), Unknown);
    }

    #[test]
    fn test_demand_start_resolution() {
        let mut data = TimeSeriesData {
            time_series_slot: vec![TimeSeriesSlot {
                time_period: Some(TimePeriod::relative(Duration::from_secs(600), None)),
                ..slot(Some(10000), None, Some("PT1H"))
            }],
            ..Default::default()
        };

        let demand = demand_from_slot(&data, &data.time_series_slot[0], now());
        assert_eq!(demand.duration_until_start, 600.0);
        assert_eq!(demand.duration_until_end, 3600.0);

        data.time_period = Some(TimePeriod {
            start_time: Some(AbsoluteOrRelativeTime::from_time(now() + ChronoDuration::seconds(90))),
            end_time: None,
        });
        let demand = demand_from_slot(&data, &data.time_series_slot[0], now());
        assert_eq!(demand.duration_until_start, 90.0);
    }

    #[test]
    fn test_check_slot_count() {
        assert!(check_slot_count(0, 0, 0).is_ok());
        assert!(check_slot_count(2, 2, 2).is_ok());
        assert_eq!(check_slot_count(1, 2, 0), Err(UseCaseError::TooFewSlots));
        assert_eq!(check_slot_count(3, 0, 2), Err(UseCaseError::TooManySlots));
    }

    #[test]
    fn test_relative_periods() {
        let slots = [
            DurationSlotValue::new(Duration::from_secs(3600), 1.0),
            DurationSlotValue::new(Duration::from_secs(1800), 2.0),
        ];
        let mut periods = Vec::new();
        let total = for_each_relative_period(&slots, |_, period, _| periods.push(period));

        assert_eq!(total, Duration::from_secs(5400));
        assert_eq!(periods[0], TimePeriod::relative(Duration::ZERO, None));
        assert_eq!(
            periods[1],
            TimePeriod::relative(Duration::from_secs(3600), Some(Duration::from_secs(5400)))
        );
    }

    #[test]
    fn test_plan_chains_slots() {
        let data = TimeSeriesData {
            time_period: Some(TimePeriod::relative(Duration::from_secs(60), None)),
            time_series_slot: vec![
                slot(Some(1000), None, Some("PT1H")),
                slot(Some(2000), None, Some("PT30M")),
            ],
            ..Default::default()
        };

        let plan = plan_from_series(&data, now());
        let start = now() + ChronoDuration::seconds(60);
        assert_eq!(plan.slots[0].start, start);
        assert_eq!(plan.slots[0].end, start + ChronoDuration::hours(1));
        assert_eq!(plan.slots[1].start, plan.slots[0].end);
        assert_eq!(plan.slots[1].end, start + ChronoDuration::minutes(90));
        assert_eq!(plan.slots[1].value, 2000.0);
    }

    #[test]
    fn test_plan_end_taken_from_period_start() {
        let explicit_start = now() + ChronoDuration::minutes(10);
        let data = TimeSeriesData {
            time_series_slot: vec![
                TimeSeriesSlot {
                    time_period: Some(TimePeriod {
                        start_time: Some(AbsoluteOrRelativeTime::from_time(explicit_start)),
                        end_time: Some(AbsoluteOrRelativeTime::from_time(now() + ChronoDuration::hours(2))),
                    }),
                    ..slot(Some(1000), None, None)
                },
                TimeSeriesSlot {
                    time_period: Some(TimePeriod {
                        start_time: None,
                        end_time: Some(AbsoluteOrRelativeTime::from_time(now() + ChronoDuration::hours(3))),
                    }),
                    ..slot(Some(500), None, None)
                },
            ],
            ..Default::default()
        };

        let plan = plan_from_series(&data, now());
        assert_eq!(plan.slots[0].start, explicit_start);
        assert_eq!(plan.slots[0].end, explicit_start);
        assert_eq!(plan.slots[1].start, explicit_start);
        assert_eq!(plan.slots[1].end, explicit_start);
    }

    proptest! {
        #[test]
        fn prop_plan_is_chronological(durations in prop::collection::vec(1u64..86_400, 1..8)) {
            let data = TimeSeriesData {
                time_series_slot: durations
                    .iter()
                    .map(|secs| TimeSeriesSlot {
                        duration: Some(DurationType::from_duration(Duration::from_secs(*secs))),
                        ..Default::default()
                    })
                    .collect(),
                ..Default::default()
            };

            let plan = plan_from_series(&data, now());
            prop_assert_eq!(plan.slots[0].start, now());
            for pair in plan.slots.windows(2) {
                prop_assert!(pair[0].start <= pair[0].end);
                prop_assert_eq!(pair[1].start, pair[0].end);
            }
        }
    }
}
