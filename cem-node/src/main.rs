//! CEM Node - coordinated EV charging demo
//!
//! Replays a scripted EV charging session against the CEM use cases, backed
//! by the in-memory feature library.
//!
//! # Usage
//!
//! ```bash
//! # Default session
//! cem-node
//!
//! # 22 kW wallbox, CHF tariff, verbose logging
//! cem-node --max-power 22080 --currency chf --log-level debug
//!
//! # Pretty-printed JSON output
//! cem-node --pretty
//! ```
//!
//! # Demo Scenario
//!
//! 1. EV connects and the engine requests its descriptions
//! 2. EV notifies an energy demand; the CEM writes power limits and incentives
//! 3. EV answers with a charge plan and asks for a new tariff description
//! 4. A grid guard writes a production limit, which the CEM approves
//! 5. The EV heartbeat fails and the device is disconnected

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use cem_spine::model::*;
use cem_spine::{
    ChangeType, CmdClassifier, DataElement, DeviceRef, DurationType, EntityRef, EntityType,
    EventPayload, FeatureLibrary, FeatureType, Function, MemoryLibrary, ScaledNumber, Ski,
    TimePeriod, UseCaseActor, UseCaseName, UseCaseSupport,
};
use cem_usecases::{
    Cevc, CevcConfig, DurationSlotValue, EventCallback, EventRouter, Lpp, LppConfig, Obligation,
    UseCase, UseCaseEvent, Watchdog,
};

/// Coordinated EV charging demo node
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// SKI of the simulated EV
    #[arg(long, default_value = "ev-0001")]
    ev_ski: String,

    /// SKI of the simulated grid guard
    #[arg(long, default_value = "guard-0001")]
    guard_ski: String,

    /// Highest permitted charging power in W
    #[arg(long, default_value = "11000")]
    max_power: u32,

    /// Energy the EV asks for in Wh
    #[arg(long, default_value = "30000")]
    demand: u32,

    /// Base price per kWh
    #[arg(long, default_value = "0.30")]
    price: f64,

    /// Tariff currency (EUR, CHF, ...)
    #[arg(long, default_value = "EUR", value_parser = parse_currency)]
    currency: Currency,

    /// Production limit the grid guard writes in W
    #[arg(long, default_value = "4200")]
    production_limit: u32,

    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Setup logging
    let level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Print banner
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║            CEM Node - Coordinated EV Charging Demo           ║");
    println!("╠══════════════════════════════════════════════════════════════╣");
    println!("║  EV:        {:<49} ║", truncate(&args.ev_ski, 49));
    println!("║  Guard:     {:<49} ║", truncate(&args.guard_ski, 49));
    println!("║  Max power: {:<49} ║", format!("{} W", args.max_power));
    println!("║  Demand:    {:<49} ║", format!("{} Wh", args.demand));
    println!("║  Price:     {:<49} ║", format!("{} {:?}", args.price, args.currency));
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    let mut node = Node::new(&args);
    node.run(&args).await?;

    Ok(())
}

/// Host side of the demo: engine, router and the scripted remotes
struct Node {
    library: Arc<MemoryLibrary>,
    router: EventRouter,
    cevc: Arc<Cevc>,
    lpp: Arc<Lpp>,
    watchdog: Watchdog,
    events: UnboundedReceiver<(Ski, UseCaseEvent)>,
    ev: EntityRef,
    guard: EntityRef,
    pretty: bool,
}

impl Node {
    fn new(args: &Args) -> Self {
        let library = Arc::new(MemoryLibrary::new());

        let (tx, events) = unbounded_channel();
        let callback: EventCallback = Arc::new(
            move |ski: &str, _: Option<&DeviceRef>, _: Option<&EntityRef>, event: UseCaseEvent| {
                let _ = tx.send((ski.to_string(), event));
            },
        );

        let config = CevcConfig::new()
            .with_currency(args.currency)
            .with_default_price(args.price);
        let cevc = Arc::new(Cevc::new(library.clone(), config, callback.clone()));
        let lpp = Arc::new(Lpp::new(library.clone(), LppConfig::default(), callback));

        let mut router = EventRouter::new(library.clone());
        router.register(cevc.clone());
        router.register(lpp.clone());

        let watchdog = Watchdog::new(Arc::new(|ski: &str, obligation: Obligation| {
            warn!("Missed {:?} for {}", obligation, ski);
        }));

        Self {
            library,
            router,
            cevc,
            lpp,
            watchdog,
            events,
            ev: EntityRef::new(args.ev_ski.as_str(), "d:_i:EV_1", vec![1, 1], EntityType::Ev),
            guard: EntityRef::new(args.guard_ski.as_str(), "d:_i:GRID_1", vec![1], EntityType::GridGuard),
            pretty: args.pretty,
        }
    }

    async fn run(&mut self, args: &Args) -> Result<(), Box<dyn std::error::Error>> {
        info!("Connecting EV {}", self.ev);
        self.connect_ev(args);
        self.drain(args)?;

        info!("EV announces a demand of {} Wh", args.demand);
        self.deliver(&self.ev, demand(args.demand), CmdClassifier::Notify);
        self.deliver(&self.ev, series_descriptions(true), CmdClassifier::Notify);
        self.drain(args)?;

        info!("EV answers with a charge plan");
        self.deliver(&self.ev, charge_plan(args.max_power), CmdClassifier::Notify);
        self.deliver(&self.ev, incentive_descriptions(true), CmdClassifier::Notify);
        self.drain(args)?;

        info!("Grid guard writes a production limit");
        self.write_production_limit(args.production_limit);
        self.drain(args)?;

        // Let any armed deadline tick once before the EV drops off
        tokio::time::sleep(Duration::from_millis(10)).await;

        info!("EV heartbeat fails");
        let heartbeat = DataElement::Heartbeat(HeartbeatData {
            heartbeat_counter: Some(42),
            heartbeat_timeout: Some(DurationType::new("PT4S")),
            result: Some(ResultData::error(1, "heartbeat timeout")),
        });
        self.router
            .handle(&EventPayload::data_update(&self.ev, heartbeat, CmdClassifier::Notify));
        self.drain(args)?;

        self.print("disconnects", &self.library.disconnects())?;
        Ok(())
    }

    fn connect_ev(&self, args: &Args) {
        self.library.add_remote_entity(
            self.ev.clone(),
            &[
                FeatureType::DeviceConfiguration,
                FeatureType::TimeSeries,
                FeatureType::IncentiveTable,
                FeatureType::ElectricalConnection,
            ],
        );
        self.library.add_remote_use_case(
            self.ev.ski(),
            UseCaseSupport {
                actor: UseCaseActor::Ev,
                name: UseCaseName::CoordinatedEvCharging,
                version: "1.0.1".into(),
                scenarios: (1..=8).collect(),
                available: true,
            },
        );

        for data in [
            series_descriptions(false),
            series_constraints(),
            incentive_descriptions(false),
            incentive_constraints(),
            power_descriptions(),
            permitted_power(args.max_power),
        ] {
            self.library.set_remote_data(&self.ev, data);
        }

        self.router
            .handle(&EventPayload::entity_change(&self.ev, ChangeType::Add));

        match self.cevc.is_use_case_supported(&self.ev) {
            Ok(supported) => info!("EV supports coordinated charging: {}", supported),
            Err(e) => warn!("Use case check failed: {}", e),
        }
    }

    fn deliver(&self, entity: &EntityRef, data: DataElement, classifier: CmdClassifier) {
        self.library.set_remote_data(entity, data.clone());
        self.router
            .handle(&EventPayload::data_update(entity, data, classifier));
    }

    fn write_production_limit(&self, watts: u32) {
        let limit_id = match self
            .library
            .local_data(Function::LoadControlLimitDescriptionListData)
        {
            Some(DataElement::LoadControlLimitDescriptions(descriptions)) => {
                descriptions.first().and_then(|description| description.limit_id)
            }
            _ => None,
        };

        let limit = LoadControlLimit {
            limit_id,
            is_limit_changeable: Some(true),
            is_limit_active: Some(true),
            time_period: Some(TimePeriod::relative(
                Duration::ZERO,
                Some(Duration::from_secs(2 * 3600)),
            )),
            value: Some(ScaledNumber::new(i64::from(watts), 0)),
        };
        self.router.handle(&EventPayload::write_request(
            &self.guard,
            DataElement::LoadControlLimits(vec![limit]),
            1000,
        ));
    }

    /// React to every business event raised so far
    fn drain(&mut self, args: &Args) -> Result<(), Box<dyn std::error::Error>> {
        while let Ok((ski, event)) = self.events.try_recv() {
            self.print("event", &serde_json::json!({ "ski": ski, "event": event }))?;

            for obligation in Obligation::for_event(event) {
                self.watchdog
                    .arm(&ski, *obligation, obligation.deadline(self.cevc.config()));
            }

            match event {
                UseCaseEvent::DataUpdateEnergyDemand => {
                    let demand = self.cevc.energy_demand(Some(&self.ev))?;
                    self.print("demand", &demand)?;
                    self.print("strategy", &self.cevc.charge_strategy(Some(&self.ev)))?;
                }
                UseCaseEvent::DataRequestedPowerLimitsAndIncentives => {
                    let max = f64::from(args.max_power);
                    let limits = [
                        DurationSlotValue::new(Duration::from_secs(3600), max),
                        DurationSlotValue::new(Duration::from_secs(2 * 3600), max / 2.0),
                    ];
                    self.cevc.write_power_limits(Some(&self.ev), &limits)?;
                    self.watchdog.disarm(&ski, Obligation::PowerLimits);

                    let prices = [
                        DurationSlotValue::new(Duration::from_secs(3600), args.price * 1.5),
                        DurationSlotValue::new(Duration::from_secs(2 * 3600), args.price),
                    ];
                    self.cevc.write_incentives(Some(&self.ev), &prices)?;
                    self.watchdog.disarm(&ski, Obligation::Incentives);
                }
                UseCaseEvent::DataRequestedIncentiveTableDescription => {
                    self.cevc
                        .write_incentive_table_descriptions(Some(&self.ev), &[])?;
                    self.watchdog.disarm(&ski, Obligation::IncentiveDescription);
                }
                UseCaseEvent::DataUpdateChargePlan => {
                    self.print("chargePlan", &self.cevc.charge_plan(Some(&self.ev))?)?;
                }
                UseCaseEvent::DataUpdateTimeSlotConstraints => {
                    let constraints = self.cevc.charge_plan_constraints(Some(&self.ev))?;
                    self.print("chargePlanConstraints", &constraints)?;
                }
                UseCaseEvent::WriteApprovalRequired => {
                    let pending: Vec<_> = self.lpp.pending_production_limits().into_keys().collect();
                    for msg_counter in pending {
                        self.lpp
                            .approve_or_deny_production_limit(msg_counter, true, "")?;
                    }
                }
                UseCaseEvent::DataUpdateLimit => {
                    self.print("productionLimit", &self.lpp.production_limit()?)?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn print<T: serde::Serialize + ?Sized>(&self, label: &str, value: &T) -> Result<(), serde_json::Error> {
        let json = if self.pretty {
            serde_json::to_string_pretty(value)?
        } else {
            serde_json::to_string(value)?
        };
        println!("{:<22} {}", label, json);
        Ok(())
    }
}

// ============================================================================
// Scripted EV data
// ============================================================================

fn series_descriptions(update_required: bool) -> DataElement {
    let description = |id, series_type| TimeSeriesDescription {
        time_series_id: Some(id),
        time_series_type: Some(series_type),
        time_series_writeable: Some(series_type == TimeSeriesType::Constraints),
        update_required: (series_type == TimeSeriesType::Constraints).then_some(update_required),
        unit: Some(Unit::W),
        label: None,
    };
    DataElement::TimeSeriesDescriptions(vec![
        description(0, TimeSeriesType::Constraints),
        description(1, TimeSeriesType::Plan),
        description(2, TimeSeriesType::SingleDemand),
    ])
}

fn series_constraints() -> DataElement {
    DataElement::TimeSeriesConstraints(vec![TimeSeriesConstraints {
        time_series_id: Some(0),
        slot_count_min: Some(1),
        slot_count_max: Some(30),
        slot_duration_min: Some(DurationType::new("PT1M")),
        slot_duration_max: Some(DurationType::new("PT12H")),
        slot_duration_step_size: Some(DurationType::new("PT1S")),
        ..Default::default()
    }])
}

fn demand(energy: u32) -> DataElement {
    DataElement::TimeSeries(vec![TimeSeriesData {
        time_series_id: Some(2),
        time_period: Some(TimePeriod::relative(Duration::ZERO, None)),
        time_series_slot: vec![TimeSeriesSlot {
            time_series_slot_id: Some(0),
            duration: Some(DurationType::new("PT8H")),
            min_value: Some(ScaledNumber::new(0, 0)),
            value: Some(ScaledNumber::new(i64::from(energy), 0)),
            max_value: Some(ScaledNumber::new(i64::from(energy) * 2, 0)),
            ..Default::default()
        }],
    }])
}

fn charge_plan(max_power: u32) -> DataElement {
    let slot = |id, duration: &str, watts: u32| TimeSeriesSlot {
        time_series_slot_id: Some(id),
        duration: Some(DurationType::new(duration)),
        value: Some(ScaledNumber::new(i64::from(watts), 0)),
        ..Default::default()
    };
    DataElement::TimeSeries(vec![TimeSeriesData {
        time_series_id: Some(1),
        time_period: Some(TimePeriod::relative(Duration::ZERO, None)),
        time_series_slot: vec![
            slot(0, "PT1H", max_power),
            slot(1, "PT2H", max_power / 2),
        ],
    }])
}

fn incentive_descriptions(update_required: bool) -> DataElement {
    DataElement::IncentiveTableDescriptions(vec![IncentiveTableDescription {
        tariff_description: Some(TariffDescription {
            tariff_id: Some(0),
            tariff_writeable: Some(true),
            update_required: Some(update_required),
            scope_type: Some(ScopeType::SimpleIncentiveTable),
            label: None,
        }),
        tier: vec![],
    }])
}

fn incentive_constraints() -> DataElement {
    DataElement::IncentiveTableConstraints(vec![IncentiveTableConstraints {
        tariff_id: Some(0),
        incentive_slot_constraints: Some(IncentiveSlotConstraints {
            slot_count_min: Some(1),
            slot_count_max: Some(24),
        }),
    }])
}

fn power_descriptions() -> DataElement {
    DataElement::ElectricalParameterDescriptions(vec![ElectricalConnectionParameterDescription {
        electrical_connection_id: Some(0),
        parameter_id: Some(0),
        measurement_id: None,
        scope_type: Some(ScopeType::AcPowerTotal),
    }])
}

fn permitted_power(max_power: u32) -> DataElement {
    DataElement::ElectricalPermittedValueSets(vec![ElectricalConnectionPermittedValueSet {
        electrical_connection_id: Some(0),
        parameter_id: Some(0),
        permitted_value_set: vec![ScaledValueSet {
            value: vec![],
            range: vec![ScaledRange {
                min: Some(ScaledNumber::new(0, 0)),
                max: Some(ScaledNumber::new(i64::from(max_power), 0)),
            }],
        }],
    }])
}

fn parse_currency(text: &str) -> Result<Currency, String> {
    serde_json::from_value(serde_json::Value::String(text.to_uppercase()))
        .map_err(|_| format!("unknown currency {}", text))
}

/// Truncate string with ellipsis
fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        format!("{}...", &s[..max_len - 3])
    }
}
