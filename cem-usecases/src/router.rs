//! Event router
//!
//! Fans every inbound payload out to the registered use cases. A heartbeat
//! notify carrying an error result is fatal for the remote device: the router
//! disconnects it and relies on reconnection to recover.

use std::sync::Arc;

use cem_spine::{CmdClassifier, DataElement, EventPayload, FeatureLibrary};
use tracing::{debug, warn};

use crate::usecase::UseCase;

pub struct EventRouter {
    library: Arc<dyn FeatureLibrary>,
    use_cases: Vec<Arc<dyn UseCase>>,
}

impl EventRouter {
    pub fn new(library: Arc<dyn FeatureLibrary>) -> Self {
        Self {
            library,
            use_cases: Vec::new(),
        }
    }

    /// Register a use case: adds its local features and announces it
    pub fn register(&mut self, use_case: Arc<dyn UseCase>) {
        use_case.add_features();
        use_case.add_use_case();
        debug!("Registered use case {}", use_case.use_case_name());
        self.use_cases.push(use_case);
    }

    pub fn use_cases(&self) -> &[Arc<dyn UseCase>] {
        &self.use_cases
    }

    /// Deliver one payload; returns false when it was consumed as a failure
    pub fn handle(&self, payload: &EventPayload) -> bool {
        if let Some(reason) = heartbeat_failure(payload) {
            warn!("Heartbeat of {} failed, disconnecting: {}", payload.ski, reason);
            self.library.disconnect(&payload.ski, &reason);
            return false;
        }

        for use_case in &self.use_cases {
            use_case.handle_event(payload);
        }
        true
    }
}

fn heartbeat_failure(payload: &EventPayload) -> Option<String> {
    if !payload.is_classifier(CmdClassifier::Notify) {
        return None;
    }
    match &payload.data {
        Some(DataElement::Heartbeat(heartbeat)) => heartbeat
            .result
            .as_ref()
            .filter(|result| result.is_error())
            .map(|result| {
                result
                    .description
                    .clone()
                    .unwrap_or_else(|| format!("error {}", result.error_number))
            }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UseCaseError;
    use cem_spine::model::{HeartbeatData, ResultData};
    use cem_spine::{EntityRef, EntityType, FeatureType, MemoryLibrary, UseCaseName};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<usize>,
    }

    impl UseCase for Recorder {
        fn use_case_name(&self) -> UseCaseName {
            UseCaseName::CoordinatedEvCharging
        }
        fn add_features(&self) {}
        fn add_use_case(&self) {}
        fn is_use_case_supported(&self, _entity: &EntityRef) -> Result<bool, UseCaseError> {
            Ok(false)
        }
        fn handle_event(&self, _payload: &EventPayload) {
            *self.seen.lock() += 1;
        }
    }

    fn heartbeat(result: Option<ResultData>) -> EventPayload {
        let entity = EntityRef::new("ski-ev", "d:_i:EV", vec![1, 1], EntityType::Ev);
        EventPayload::data_update(
            &entity,
            DataElement::Heartbeat(HeartbeatData {
                heartbeat_counter: Some(9),
                result,
                ..Default::default()
            }),
            CmdClassifier::Notify,
        )
    }

    #[test]
    fn test_forwards_healthy_heartbeat() {
        let library = Arc::new(MemoryLibrary::new());
        let recorder = Arc::new(Recorder::default());
        let mut router = EventRouter::new(library.clone());
        router.register(recorder.clone());

        assert!(router.handle(&heartbeat(None)));
        assert!(router.handle(&heartbeat(Some(ResultData::success()))));
        assert_eq!(*recorder.seen.lock(), 2);
        assert!(library.disconnects().is_empty());
    }

    #[test]
    fn test_heartbeat_error_disconnects() {
        let library = Arc::new(MemoryLibrary::new());
        let entity = EntityRef::new("ski-ev", "d:_i:EV", vec![1, 1], EntityType::Ev);
        library.add_remote_entity(entity.clone(), &[FeatureType::TimeSeries]);

        let recorder = Arc::new(Recorder::default());
        let mut router = EventRouter::new(library.clone());
        router.register(recorder.clone());

        assert!(!router.handle(&heartbeat(Some(ResultData::error(1, "timeout")))));

        assert_eq!(*recorder.seen.lock(), 0);
        assert_eq!(library.disconnects(), vec![("ski-ev".to_string(), "timeout".to_string())]);
        assert!(!library.has_remote_feature(&entity, FeatureType::TimeSeries));
    }
}
