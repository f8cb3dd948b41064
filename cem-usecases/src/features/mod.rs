//! Typed feature accessors
//!
//! Thin views over one feature of a remote entity (or of the local entity)
//! resolved through the `FeatureLibrary`. A view is created per call and
//! never cached; snapshot reads return owned copies.
//!
//! - `TimeSeries`, `IncentiveTable`, `ElectricalConnection`,
//!   `DeviceConfiguration`, `LoadControl`: remote server features
//! - `LocalDeviceConfiguration`, `LocalLoadControl`: local server data

pub mod device_configuration;
pub mod electrical_connection;
pub mod incentive_table;
pub mod load_control;
pub mod time_series;

use cem_spine::{DataElement, EntityRef, FeatureError, FeatureLibrary, FeatureType, Function, MsgCounter};

pub use device_configuration::{DeviceConfiguration, LocalDeviceConfiguration};
pub use electrical_connection::ElectricalConnection;
pub use incentive_table::IncentiveTable;
pub use load_control::{LoadControl, LocalLoadControl};
pub use time_series::TimeSeries;

/// One server feature of a remote entity
pub struct RemoteFeature<'a> {
    library: &'a dyn FeatureLibrary,
    entity: &'a EntityRef,
    feature: FeatureType,
}

impl<'a> RemoteFeature<'a> {
    /// Resolve the feature; fails when the entity does not expose it
    pub fn new(
        library: &'a dyn FeatureLibrary,
        entity: &'a EntityRef,
        feature: FeatureType,
    ) -> Result<Self, FeatureError> {
        if !library.has_remote_feature(entity, feature) {
            return Err(FeatureError::FeatureNotFound {
                entity: entity.to_string(),
                feature,
            });
        }
        Ok(Self {
            library,
            entity,
            feature,
        })
    }

    pub fn entity(&self) -> &EntityRef {
        self.entity
    }

    pub fn subscribe(&self) -> Result<MsgCounter, FeatureError> {
        self.library.subscribe(self.entity, self.feature)
    }

    pub fn bind(&self) -> Result<MsgCounter, FeatureError> {
        self.library.bind(self.entity, self.feature)
    }

    pub fn request(&self, function: Function) -> Result<MsgCounter, FeatureError> {
        self.library.request(self.entity, function)
    }

    /// Cached data of a function, `DataNotAvailable` until a reply arrived
    pub fn data(&self, function: Function) -> Result<DataElement, FeatureError> {
        self.library
            .remote_data(self.entity, function)
            .ok_or(FeatureError::DataNotAvailable)
    }

    pub fn write(&self, data: DataElement) -> Result<MsgCounter, FeatureError> {
        self.library.write(self.entity, data)
    }
}

/// Unwrap a cached data element of the expected kind
macro_rules! expect_data {
    ($element:expr, $variant:ident) => {
        match $element {
            cem_spine::DataElement::$variant(items) => Ok(items),
            _ => Err(cem_spine::FeatureError::DataNotAvailable),
        }
    };
}

pub(crate) use expect_data;
