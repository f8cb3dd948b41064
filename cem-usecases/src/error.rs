//! Use case errors

use cem_spine::{CodecError, FeatureError, Function, MsgCounter};
use thiserror::Error;

/// Errors returned by use case accessors and writers
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UseCaseError {
    #[error("no compatible entity")]
    NoCompatibleEntity,

    #[error("data not available")]
    DataNotAvailable,

    #[error("function {0:?} not supported")]
    FunctionNotSupported(Function),

    #[error("too few charge slots provided")]
    TooFewSlots,

    #[error("too many charge slots provided")]
    TooManySlots,

    #[error("unknown message counter {0}")]
    UnknownMessage(MsgCounter),

    #[error("value out of range: {0}")]
    OutOfRange(String),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Feature(#[from] FeatureError),
}

impl UseCaseError {
    /// Data that is simply not known yet
    pub fn is_not_available(&self) -> bool {
        matches!(
            self,
            UseCaseError::DataNotAvailable | UseCaseError::Feature(FeatureError::DataNotAvailable)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_messages() {
        assert_eq!(UseCaseError::TooFewSlots.to_string(), "too few charge slots provided");
        assert_eq!(UseCaseError::TooManySlots.to_string(), "too many charge slots provided");
    }

    #[test]
    fn test_feature_error_passes_through() {
        let error: UseCaseError = FeatureError::Rejected("busy".into()).into();
        assert_eq!(error.to_string(), "write rejected: busy");
        assert!(UseCaseError::from(FeatureError::DataNotAvailable).is_not_available());
    }
}
