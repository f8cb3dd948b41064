//! Feature library seam
//!
//! Use cases never talk to the wire directly. They hold an
//! `Arc<dyn FeatureLibrary>` created once by the host and use it to register
//! local features, look up remote features, issue requests and read the
//! library's cached snapshot. Requests are fire-and-forget: the answer arrives
//! later as a new `EventPayload`.

use thiserror::Error;

use crate::event::DataElement;
use crate::model::ResultData;
use crate::types::*;

/// Errors reported by the feature library
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeatureError {
    #[error("feature {feature:?} not available on {entity}")]
    FeatureNotFound { entity: String, feature: FeatureType },

    #[error("data not available")]
    DataNotAvailable,

    #[error("function {0:?} not supported")]
    FunctionNotSupported(Function),

    #[error("write rejected: {0}")]
    Rejected(String),

    #[error("remote device {0} disconnected")]
    Disconnected(Ski),
}

/// Protocol engine operations consumed by use cases
pub trait FeatureLibrary: Send + Sync {
    /// Register a feature on the local entity
    fn add_local_feature(&self, feature: FeatureType, role: Role);

    /// Check whether the local entity carries a feature in the given role
    fn has_local_feature(&self, feature: FeatureType, role: Role) -> bool;

    /// Announce local use case support
    fn add_use_case_support(&self, support: UseCaseSupport);

    /// Check whether the remote entity exposes a server feature
    fn has_remote_feature(&self, entity: &EntityRef, feature: FeatureType) -> bool;

    /// Check that the remote device announced the use case with all given
    /// scenarios and that the entity exposes the given server features
    fn verify_use_case(
        &self,
        entity: &EntityRef,
        actor: UseCaseActor,
        name: UseCaseName,
        scenarios: &[u32],
        server_features: &[FeatureType],
    ) -> bool;

    /// Subscribe to notifications of a remote feature
    fn subscribe(&self, entity: &EntityRef, feature: FeatureType) -> Result<MsgCounter, FeatureError>;

    /// Bind to a remote feature (required before writing)
    fn bind(&self, entity: &EntityRef, feature: FeatureType) -> Result<MsgCounter, FeatureError>;

    /// Send a read request for a remote function
    fn request(&self, entity: &EntityRef, function: Function) -> Result<MsgCounter, FeatureError>;

    /// Copy of the cached remote data for a function
    fn remote_data(&self, entity: &EntityRef, function: Function) -> Option<DataElement>;

    /// Send a write of remote data
    fn write(&self, entity: &EntityRef, data: DataElement) -> Result<MsgCounter, FeatureError>;

    /// Copy of local server data for a function
    fn local_data(&self, function: Function) -> Option<DataElement>;

    /// Replace local server data, notifying subscribers
    fn set_local_data(&self, data: DataElement);

    /// Answer a pending inbound write
    fn answer_write(&self, msg_counter: MsgCounter, result: ResultData);

    /// Drop the connection to a remote device; reconnection recovers it
    fn disconnect(&self, ski: &str, reason: &str);
}
