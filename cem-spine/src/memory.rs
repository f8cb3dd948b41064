//! In-memory feature library
//!
//! Keeps remote snapshots, local server data and a log of every outbound
//! request behind a single lock. Remote writes are applied to the snapshot
//! the way a cooperating remote would apply them. Used by tests and by the
//! demo node.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::event::DataElement;
use crate::library::{FeatureError, FeatureLibrary};
use crate::model::ResultData;
use crate::types::*;

/// Outbound request recorded by `MemoryLibrary`
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedRequest {
    Subscribe {
        entity: EntityRef,
        feature: FeatureType,
        msg_counter: MsgCounter,
    },
    Bind {
        entity: EntityRef,
        feature: FeatureType,
        msg_counter: MsgCounter,
    },
    Read {
        entity: EntityRef,
        function: Function,
        msg_counter: MsgCounter,
    },
    Write {
        entity: EntityRef,
        data: DataElement,
        msg_counter: MsgCounter,
    },
}

impl RecordedRequest {
    pub fn entity(&self) -> &EntityRef {
        match self {
            RecordedRequest::Subscribe { entity, .. }
            | RecordedRequest::Bind { entity, .. }
            | RecordedRequest::Read { entity, .. }
            | RecordedRequest::Write { entity, .. } => entity,
        }
    }

    pub fn msg_counter(&self) -> MsgCounter {
        match self {
            RecordedRequest::Subscribe { msg_counter, .. }
            | RecordedRequest::Bind { msg_counter, .. }
            | RecordedRequest::Read { msg_counter, .. }
            | RecordedRequest::Write { msg_counter, .. } => *msg_counter,
        }
    }
}

#[derive(Debug, Default)]
struct RemoteEntity {
    features: HashSet<FeatureType>,
    unsupported: HashSet<Function>,
    data: HashMap<Function, DataElement>,
}

#[derive(Debug, Default)]
struct Inner {
    local_features: HashSet<(FeatureType, Role)>,
    local_use_cases: Vec<UseCaseSupport>,
    local_data: HashMap<Function, DataElement>,
    remotes: HashMap<EntityRef, RemoteEntity>,
    remote_use_cases: HashMap<Ski, Vec<UseCaseSupport>>,
    requests: Vec<RecordedRequest>,
    write_answers: Vec<(MsgCounter, ResultData)>,
    disconnects: Vec<(Ski, String)>,
    reject_next_write: Option<String>,
}

impl Inner {
    fn remote(&self, entity: &EntityRef, feature: FeatureType) -> Result<&RemoteEntity, FeatureError> {
        match self.remotes.get(entity) {
            Some(remote) if remote.features.contains(&feature) => Ok(remote),
            _ => Err(FeatureError::FeatureNotFound {
                entity: entity.to_string(),
                feature,
            }),
        }
    }
}

/// Feature library backed by process memory
#[derive(Debug, Default)]
pub struct MemoryLibrary {
    inner: RwLock<Inner>,
    msg_counter: AtomicU64,
}

impl MemoryLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_counter(&self) -> MsgCounter {
        self.msg_counter.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Make a remote entity with the given server features known
    pub fn add_remote_entity(&self, entity: EntityRef, features: &[FeatureType]) {
        let mut inner = self.inner.write();
        let remote = inner.remotes.entry(entity).or_default();
        remote.features.extend(features.iter().copied());
    }

    /// Forget a remote entity and its snapshot
    pub fn remove_remote_entity(&self, entity: &EntityRef) {
        self.inner.write().remotes.remove(entity);
    }

    /// Record a use case announced by a remote device
    pub fn add_remote_use_case(&self, ski: impl Into<Ski>, support: UseCaseSupport) {
        self.inner
            .write()
            .remote_use_cases
            .entry(ski.into())
            .or_default()
            .push(support);
    }

    /// Make read requests for a function fail as unsupported
    pub fn set_unsupported(&self, entity: &EntityRef, function: Function) {
        if let Some(remote) = self.inner.write().remotes.get_mut(entity) {
            remote.unsupported.insert(function);
        }
    }

    /// Replace the cached remote data for the element's function
    pub fn set_remote_data(&self, entity: &EntityRef, data: DataElement) {
        if let Some(remote) = self.inner.write().remotes.get_mut(entity) {
            remote.data.insert(data.function(), data);
        }
    }

    /// Reject the next remote write with the given reason
    pub fn reject_next_write(&self, reason: impl Into<String>) {
        self.inner.write().reject_next_write = Some(reason.into());
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.inner.read().requests.clone()
    }

    /// Drain the request log
    pub fn take_requests(&self) -> Vec<RecordedRequest> {
        std::mem::take(&mut self.inner.write().requests)
    }

    /// Data written to an entity, oldest first
    pub fn writes_to(&self, entity: &EntityRef) -> Vec<DataElement> {
        self.inner
            .read()
            .requests
            .iter()
            .filter_map(|request| match request {
                RecordedRequest::Write { entity: target, data, .. } if target == entity => {
                    Some(data.clone())
                }
                _ => None,
            })
            .collect()
    }

    pub fn local_use_cases(&self) -> Vec<UseCaseSupport> {
        self.inner.read().local_use_cases.clone()
    }

    pub fn write_answers(&self) -> Vec<(MsgCounter, ResultData)> {
        self.inner.read().write_answers.clone()
    }

    pub fn disconnects(&self) -> Vec<(Ski, String)> {
        self.inner.read().disconnects.clone()
    }
}

impl FeatureLibrary for MemoryLibrary {
    fn add_local_feature(&self, feature: FeatureType, role: Role) {
        self.inner.write().local_features.insert((feature, role));
    }

    fn has_local_feature(&self, feature: FeatureType, role: Role) -> bool {
        self.inner.read().local_features.contains(&(feature, role))
    }

    fn add_use_case_support(&self, support: UseCaseSupport) {
        let mut inner = self.inner.write();
        inner
            .local_use_cases
            .retain(|existing| existing.actor != support.actor || existing.name != support.name);
        inner.local_use_cases.push(support);
    }

    fn has_remote_feature(&self, entity: &EntityRef, feature: FeatureType) -> bool {
        self.inner.read().remote(entity, feature).is_ok()
    }

    fn verify_use_case(
        &self,
        entity: &EntityRef,
        actor: UseCaseActor,
        name: UseCaseName,
        scenarios: &[u32],
        server_features: &[FeatureType],
    ) -> bool {
        let inner = self.inner.read();

        let announced = inner
            .remote_use_cases
            .get(entity.ski())
            .map(|supports| {
                supports.iter().any(|support| {
                    support.actor == actor
                        && support.name == name
                        && support.available
                        && scenarios.iter().all(|s| support.scenarios.contains(s))
                })
            })
            .unwrap_or(false);

        announced
            && server_features
                .iter()
                .all(|feature| inner.remote(entity, *feature).is_ok())
    }

    fn subscribe(&self, entity: &EntityRef, feature: FeatureType) -> Result<MsgCounter, FeatureError> {
        let mut inner = self.inner.write();
        inner.remote(entity, feature)?;

        let msg_counter = self.next_counter();
        inner.requests.push(RecordedRequest::Subscribe {
            entity: entity.clone(),
            feature,
            msg_counter,
        });
        Ok(msg_counter)
    }

    fn bind(&self, entity: &EntityRef, feature: FeatureType) -> Result<MsgCounter, FeatureError> {
        let mut inner = self.inner.write();
        inner.remote(entity, feature)?;

        let msg_counter = self.next_counter();
        inner.requests.push(RecordedRequest::Bind {
            entity: entity.clone(),
            feature,
            msg_counter,
        });
        Ok(msg_counter)
    }

    fn request(&self, entity: &EntityRef, function: Function) -> Result<MsgCounter, FeatureError> {
        let mut inner = self.inner.write();
        if inner
            .remote(entity, function.feature_type())?
            .unsupported
            .contains(&function)
        {
            return Err(FeatureError::FunctionNotSupported(function));
        }

        let msg_counter = self.next_counter();
        inner.requests.push(RecordedRequest::Read {
            entity: entity.clone(),
            function,
            msg_counter,
        });
        Ok(msg_counter)
    }

    fn remote_data(&self, entity: &EntityRef, function: Function) -> Option<DataElement> {
        self.inner
            .read()
            .remotes
            .get(entity)
            .and_then(|remote| remote.data.get(&function).cloned())
    }

    fn write(&self, entity: &EntityRef, data: DataElement) -> Result<MsgCounter, FeatureError> {
        let mut inner = self.inner.write();
        inner.remote(entity, data.feature_type())?;

        if let Some(reason) = inner.reject_next_write.take() {
            return Err(FeatureError::Rejected(reason));
        }

        let msg_counter = self.next_counter();
        inner.requests.push(RecordedRequest::Write {
            entity: entity.clone(),
            data: data.clone(),
            msg_counter,
        });

        if let Some(remote) = inner.remotes.get_mut(entity) {
            let function = data.function();
            let merged = merge(remote.data.remove(&function), data);
            remote.data.insert(function, merged);
        }

        debug!("Write {} to {}", msg_counter, entity);
        Ok(msg_counter)
    }

    fn local_data(&self, function: Function) -> Option<DataElement> {
        self.inner.read().local_data.get(&function).cloned()
    }

    fn set_local_data(&self, data: DataElement) {
        self.inner.write().local_data.insert(data.function(), data);
    }

    fn answer_write(&self, msg_counter: MsgCounter, result: ResultData) {
        self.inner.write().write_answers.push((msg_counter, result));
    }

    fn disconnect(&self, ski: &str, reason: &str) {
        let mut inner = self.inner.write();
        inner.remotes.retain(|entity, _| entity.ski() != ski);
        inner.remote_use_cases.remove(ski);
        inner.disconnects.push((ski.to_string(), reason.to_string()));
        info!("Disconnected {}: {}", ski, reason);
    }
}

/// Apply a partial update the way a remote feature merges list writes
fn merge(existing: Option<DataElement>, update: DataElement) -> DataElement {
    match (existing, update) {
        (Some(DataElement::TimeSeries(mut current)), DataElement::TimeSeries(items)) => {
            for item in items {
                upsert(&mut current, item, |data| data.time_series_id);
            }
            DataElement::TimeSeries(current)
        }
        (Some(DataElement::IncentiveTables(mut current)), DataElement::IncentiveTables(items)) => {
            for item in items {
                upsert(&mut current, item, |table| table.tariff_id);
            }
            DataElement::IncentiveTables(current)
        }
        (Some(DataElement::LoadControlLimits(mut current)), DataElement::LoadControlLimits(items)) => {
            for item in items {
                upsert(&mut current, item, |limit| limit.limit_id);
            }
            DataElement::LoadControlLimits(current)
        }
        (Some(DataElement::KeyValues(mut current)), DataElement::KeyValues(items)) => {
            for item in items {
                upsert(&mut current, item, |key_value| key_value.key_id);
            }
            DataElement::KeyValues(current)
        }
        (_, update) => update,
    }
}

fn upsert<T, K: PartialEq + Copy>(items: &mut Vec<T>, item: T, key: impl Fn(&T) -> Option<K>) {
    let position = key(&item).and_then(|id| items.iter().position(|existing| key(existing) == Some(id)));
    match position {
        Some(index) => items[index] = item,
        None => items.push(item),
    }
}
