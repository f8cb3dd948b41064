//! # CEM Use Cases
//!
//! Energy-management use cases on top of the `cem-spine` feature library.
//!
//! ## Architecture
//!
//! ```text
//! Remote EV / grid guard
//!       │ protocol messages
//!       ▼
//! ┌─────────────────────────────────┐
//! │    FeatureLibrary (cem-spine)   │
//! └─────────────┬───────────────────┘
//!               │ EventPayload
//!               ▼
//! ┌─────────────────────────────────┐
//! │    EventRouter                  │
//! │  ┌───────────┐  ┌────────────┐  │
//! │  │   CEVC    │  │    LPP     │  │
//! │  └───────────┘  └────────────┘  │
//! └─────────────┬───────────────────┘
//!               │ UseCaseEvent
//!               ▼
//!        CEM host callback
//! ```
//!
//! ## Coordinated EV charging flow
//!
//! 1. EV entity connects; the engine subscribes, binds and requests descriptions
//! 2. The EV notifies a demand update with `updateRequired`
//! 3. The engine raises `DataUpdateEnergyDemand` and
//!    `DataRequestedPowerLimitsAndIncentives`
//! 4. The host calls `write_power_limits` and `write_incentives`
//! 5. The EV answers with a charge plan, raised as `DataUpdateChargePlan`
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use cem_spine::{DeviceRef, EntityRef, MemoryLibrary};
//! use cem_usecases::{Cevc, CevcConfig, EventRouter, UseCaseEvent};
//!
//! let library = Arc::new(MemoryLibrary::new());
//! let cevc = Arc::new(Cevc::new(
//!     library.clone(),
//!     CevcConfig::default(),
//!     Arc::new(|ski: &str, _: Option<&DeviceRef>, _: Option<&EntityRef>, event: UseCaseEvent| {
//!         println!("{}: {}", ski, event);
//!     }),
//! ));
//!
//! let mut router = EventRouter::new(library);
//! router.register(cevc);
//! ```

pub mod cevc;
pub mod config;
pub mod entity;
pub mod error;
pub mod features;
pub mod lpp;
pub mod router;
pub mod usecase;
pub mod watchdog;

pub use cevc::{Cevc, ChargePlan, Demand, DurationSlotValue, EvChargeStrategy, IncentiveTariffDescription};
pub use config::{CevcConfig, LppConfig};
pub use error::UseCaseError;
pub use lpp::{LoadLimit, Lpp};
pub use router::EventRouter;
pub use usecase::{EventCallback, UseCase, UseCaseEvent};
pub use watchdog::{Obligation, Watchdog};
