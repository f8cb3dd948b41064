//! Device Configuration accessors

use cem_spine::model::{ConfigurationValue, KeyName, KeyValue, KeyValueDescription};
use cem_spine::{
    DataElement, EntityRef, FeatureError, FeatureLibrary, FeatureType, Function, MsgCounter, Role,
};

use super::{expect_data, RemoteFeature};

/// Device Configuration server of a remote entity
pub struct DeviceConfiguration<'a> {
    feature: RemoteFeature<'a>,
}

impl<'a> DeviceConfiguration<'a> {
    pub fn new(library: &'a dyn FeatureLibrary, entity: &'a EntityRef) -> Result<Self, FeatureError> {
        Ok(Self {
            feature: RemoteFeature::new(library, entity, FeatureType::DeviceConfiguration)?,
        })
    }

    pub fn subscribe(&self) -> Result<MsgCounter, FeatureError> {
        self.feature.subscribe()
    }

    pub fn request_descriptions(&self) -> Result<MsgCounter, FeatureError> {
        self.feature
            .request(Function::DeviceConfigurationKeyValueDescriptionListData)
    }

    pub fn request_values(&self) -> Result<MsgCounter, FeatureError> {
        self.feature.request(Function::DeviceConfigurationKeyValueListData)
    }

    pub fn descriptions(&self) -> Result<Vec<KeyValueDescription>, FeatureError> {
        expect_data!(
            self.feature
                .data(Function::DeviceConfigurationKeyValueDescriptionListData)?,
            KeyValueDescriptions
        )
    }

    pub fn key_value_for_name(&self, name: KeyName) -> Result<KeyValue, FeatureError> {
        let key_id = key_id_for_name(&self.descriptions()?, name)?;
        let values = expect_data!(
            self.feature.data(Function::DeviceConfigurationKeyValueListData)?,
            KeyValues
        )?;
        find_key(values, key_id)
    }
}

/// Device Configuration server of the local entity
pub struct LocalDeviceConfiguration<'a> {
    library: &'a dyn FeatureLibrary,
}

impl<'a> LocalDeviceConfiguration<'a> {
    pub fn new(library: &'a dyn FeatureLibrary) -> Result<Self, FeatureError> {
        if !library.has_local_feature(FeatureType::DeviceConfiguration, Role::Server) {
            return Err(FeatureError::FeatureNotFound {
                entity: "local".to_string(),
                feature: FeatureType::DeviceConfiguration,
            });
        }
        Ok(Self { library })
    }

    pub fn descriptions(&self) -> Vec<KeyValueDescription> {
        match self
            .library
            .local_data(Function::DeviceConfigurationKeyValueDescriptionListData)
        {
            Some(DataElement::KeyValueDescriptions(descriptions)) => descriptions,
            _ => Vec::new(),
        }
    }

    fn values(&self) -> Vec<KeyValue> {
        match self
            .library
            .local_data(Function::DeviceConfigurationKeyValueListData)
        {
            Some(DataElement::KeyValues(values)) => values,
            _ => Vec::new(),
        }
    }

    /// Add a key description, assigning the next free key id
    pub fn add_key(&self, mut description: KeyValueDescription) -> u32 {
        let mut descriptions = self.descriptions();
        if let Some(existing) = description
            .key_name
            .and_then(|name| key_id_for_name(&descriptions, name).ok())
        {
            return existing;
        }

        let key_id = descriptions
            .iter()
            .filter_map(|d| d.key_id)
            .max()
            .map_or(0, |id| id + 1);
        description.key_id = Some(key_id);
        descriptions.push(description);

        self.library
            .set_local_data(DataElement::KeyValueDescriptions(descriptions));
        key_id
    }

    pub fn key_value_for_name(&self, name: KeyName) -> Result<KeyValue, FeatureError> {
        let key_id = key_id_for_name(&self.descriptions(), name)?;
        find_key(self.values(), key_id)
    }

    pub fn set_key_value_for_name(
        &self,
        name: KeyName,
        value: ConfigurationValue,
        is_value_changeable: bool,
    ) -> Result<(), FeatureError> {
        let key_id = key_id_for_name(&self.descriptions(), name)?;

        let mut values = self.values();
        values.retain(|existing| existing.key_id != Some(key_id));
        values.push(KeyValue {
            key_id: Some(key_id),
            value: Some(value),
            is_value_changeable: Some(is_value_changeable),
        });
        values.sort_by_key(|key_value| key_value.key_id);

        self.library.set_local_data(DataElement::KeyValues(values));
        Ok(())
    }
}

fn key_id_for_name(descriptions: &[KeyValueDescription], name: KeyName) -> Result<u32, FeatureError> {
    descriptions
        .iter()
        .find(|description| description.key_name == Some(name))
        .and_then(|description| description.key_id)
        .ok_or(FeatureError::DataNotAvailable)
}

fn find_key(values: Vec<KeyValue>, key_id: u32) -> Result<KeyValue, FeatureError> {
    values
        .into_iter()
        .find(|value| value.key_id == Some(key_id))
        .ok_or(FeatureError::DataNotAvailable)
}
