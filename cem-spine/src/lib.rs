//! CEM spine library
//!
//! Protocol-side building blocks shared by the energy-management use cases:
//! identifiers, wire value codecs, the feature data model, event payloads and
//! the feature library seam a use case talks through.

pub mod types;
pub mod values;
pub mod model;
pub mod event;
pub mod library;
pub mod memory;

pub use types::*;
pub use values::{AbsoluteOrRelativeTime, CodecError, DurationType, ScaledNumber, TimePeriod};
pub use event::{DataElement, EventPayload};
pub use library::{FeatureError, FeatureLibrary};
pub use memory::{MemoryLibrary, RecordedRequest};
