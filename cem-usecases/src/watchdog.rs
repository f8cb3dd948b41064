//! Response-deadline watchdog
//!
//! Optional timer the host arms when the engine asks for power limits,
//! incentives or an incentive description. Disarm it once the write is done;
//! otherwise the expiry callback reports the missed obligation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use cem_spine::Ski;

use crate::config::CevcConfig;
use crate::usecase::UseCaseEvent;

/// Write the host owes the remote after a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Obligation {
    PowerLimits,
    Incentives,
    IncentiveDescription,
}

impl Obligation {
    /// Obligations opened by a business event
    pub fn for_event(event: UseCaseEvent) -> &'static [Obligation] {
        match event {
            UseCaseEvent::DataRequestedPowerLimitsAndIncentives => {
                &[Obligation::PowerLimits, Obligation::Incentives]
            }
            UseCaseEvent::DataRequestedIncentiveTableDescription => &[Obligation::IncentiveDescription],
            _ => &[],
        }
    }

    pub fn deadline(&self, config: &CevcConfig) -> Duration {
        match self {
            Obligation::PowerLimits => config.power_limit_deadline,
            Obligation::Incentives | Obligation::IncentiveDescription => config.incentive_deadline,
        }
    }
}

/// Called with (ski, obligation) when a deadline passes
pub type ExpiryCallback = Arc<dyn Fn(&str, Obligation) + Send + Sync>;

type TimerKey = (Ski, Obligation);

pub struct Watchdog {
    timers: Arc<Mutex<HashMap<TimerKey, (u64, JoinHandle<()>)>>>,
    generation: Mutex<u64>,
    callback: ExpiryCallback,
}

impl Watchdog {
    pub fn new(callback: ExpiryCallback) -> Self {
        Self {
            timers: Arc::new(Mutex::new(HashMap::new())),
            generation: Mutex::new(0),
            callback,
        }
    }

    /// Start or restart the timer for (ski, obligation). Returns false when no
    /// tokio runtime is available.
    pub fn arm(&self, ski: &str, obligation: Obligation, after: Duration) -> bool {
        let Ok(runtime) = Handle::try_current() else {
            warn!("No runtime, {:?} deadline for {} not watched", obligation, ski);
            return false;
        };

        let generation = {
            let mut generation = self.generation.lock();
            *generation += 1;
            *generation
        };

        let key: TimerKey = (ski.to_string(), obligation);
        let timers = self.timers.clone();
        let callback = self.callback.clone();
        let task_key = key.clone();

        // The entry must be in place before the task can look for it
        let mut entries = self.timers.lock();
        let handle = runtime.spawn(async move {
            tokio::time::sleep(after).await;

            let expired = {
                let mut timers = timers.lock();
                match timers.get(&task_key) {
                    Some((armed, _)) if *armed == generation => {
                        timers.remove(&task_key);
                        true
                    }
                    _ => false,
                }
            };

            if expired {
                warn!("{:?} deadline for {} missed", task_key.1, task_key.0);
                callback(&task_key.0, task_key.1);
            }
        });

        let previous = entries.insert(key, (generation, handle));
        drop(entries);

        if let Some((_, previous)) = previous {
            previous.abort();
        }
        debug!("Armed {:?} deadline for {} ({:?})", obligation, ski, after);
        true
    }

    /// Stop the timer; returns false when none was armed
    pub fn disarm(&self, ski: &str, obligation: Obligation) -> bool {
        match self.timers.lock().remove(&(ski.to_string(), obligation)) {
            Some((_, handle)) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_armed(&self, ski: &str, obligation: Obligation) -> bool {
        self.timers
            .lock()
            .contains_key(&(ski.to_string(), obligation))
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        for (_, (_, handle)) in self.timers.lock().drain() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording() -> (Watchdog, Arc<Mutex<Vec<(String, Obligation)>>>) {
        let missed = Arc::new(Mutex::new(Vec::new()));
        let sink = missed.clone();
        let watchdog = Watchdog::new(Arc::new(move |ski: &str, obligation: Obligation| {
            sink.lock().push((ski.to_string(), obligation))
        }));
        (watchdog, missed)
    }

    #[test]
    fn test_obligations_for_event() {
        assert_eq!(
            Obligation::for_event(UseCaseEvent::DataRequestedPowerLimitsAndIncentives).len(),
            2
        );
        assert!(Obligation::for_event(UseCaseEvent::DataUpdateChargePlan).is_empty());

        let config = CevcConfig::default();
        assert_eq!(Obligation::PowerLimits.deadline(&config), Duration::from_secs(55));
        assert_eq!(Obligation::Incentives.deadline(&config), Duration::from_secs(20));
    }

    #[test]
    fn test_arm_without_runtime() {
        let (watchdog, _) = recording();
        assert!(!watchdog.arm("ski", Obligation::PowerLimits, Duration::from_secs(1)));
        assert!(!watchdog.is_armed("ski", Obligation::PowerLimits));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_reports_missed_obligation() {
        let (watchdog, missed) = recording();
        assert!(watchdog.arm("ski", Obligation::Incentives, Duration::from_secs(20)));

        tokio::time::sleep(Duration::from_secs(19)).await;
        assert!(missed.lock().is_empty());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(missed.lock().as_slice(), &[("ski".to_string(), Obligation::Incentives)]);
        assert!(!watchdog.is_armed("ski", Obligation::Incentives));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disarm_cancels() {
        let (watchdog, missed) = recording();
        watchdog.arm("ski", Obligation::PowerLimits, Duration::from_secs(55));

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(watchdog.disarm("ski", Obligation::PowerLimits));
        assert!(!watchdog.disarm("ski", Obligation::PowerLimits));

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(missed.lock().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_immediate_deadline_fires() {
        let (watchdog, missed) = recording();

        for round in 0..50 {
            let ski = format!("ski-{}", round);
            assert!(watchdog.arm(&ski, Obligation::PowerLimits, Duration::ZERO));
        }

        for _ in 0..200 {
            if missed.lock().len() == 50 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        assert_eq!(missed.lock().len(), 50);
        for round in 0..50 {
            assert!(!watchdog.is_armed(&format!("ski-{}", round), Obligation::PowerLimits));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_replaces_timer() {
        let (watchdog, missed) = recording();
        watchdog.arm("ski", Obligation::PowerLimits, Duration::from_secs(10));

        tokio::time::sleep(Duration::from_secs(5)).await;
        watchdog.arm("ski", Obligation::PowerLimits, Duration::from_secs(10));

        tokio::time::sleep(Duration::from_secs(7)).await;
        assert!(missed.lock().is_empty());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(missed.lock().len(), 1);
    }
}
