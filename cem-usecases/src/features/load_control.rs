//! Load Control accessors

use cem_spine::model::{LoadControlLimit, LoadControlLimitDescription};
use cem_spine::{
    DataElement, EntityRef, FeatureError, FeatureLibrary, FeatureType, Function, MsgCounter, Role,
};

use super::{expect_data, RemoteFeature};

/// Load Control server of a remote entity
pub struct LoadControl<'a> {
    feature: RemoteFeature<'a>,
}

impl<'a> LoadControl<'a> {
    pub fn new(library: &'a dyn FeatureLibrary, entity: &'a EntityRef) -> Result<Self, FeatureError> {
        Ok(Self {
            feature: RemoteFeature::new(library, entity, FeatureType::LoadControl)?,
        })
    }

    pub fn subscribe(&self) -> Result<MsgCounter, FeatureError> {
        self.feature.subscribe()
    }

    pub fn bind(&self) -> Result<MsgCounter, FeatureError> {
        self.feature.bind()
    }

    pub fn request_descriptions(&self) -> Result<MsgCounter, FeatureError> {
        self.feature.request(Function::LoadControlLimitDescriptionListData)
    }

    pub fn request_values(&self) -> Result<MsgCounter, FeatureError> {
        self.feature.request(Function::LoadControlLimitListData)
    }

    pub fn limit_descriptions(&self) -> Result<Vec<LoadControlLimitDescription>, FeatureError> {
        expect_data!(
            self.feature.data(Function::LoadControlLimitDescriptionListData)?,
            LoadControlLimitDescriptions
        )
    }

    pub fn limits(&self) -> Result<Vec<LoadControlLimit>, FeatureError> {
        expect_data!(
            self.feature.data(Function::LoadControlLimitListData)?,
            LoadControlLimits
        )
    }

    pub fn write_limits(&self, limits: Vec<LoadControlLimit>) -> Result<MsgCounter, FeatureError> {
        self.feature.write(DataElement::LoadControlLimits(limits))
    }
}

/// Load Control server of the local entity
pub struct LocalLoadControl<'a> {
    library: &'a dyn FeatureLibrary,
}

impl<'a> LocalLoadControl<'a> {
    pub fn new(library: &'a dyn FeatureLibrary) -> Result<Self, FeatureError> {
        if !library.has_local_feature(FeatureType::LoadControl, Role::Server) {
            return Err(FeatureError::FeatureNotFound {
                entity: "local".to_string(),
                feature: FeatureType::LoadControl,
            });
        }
        Ok(Self { library })
    }

    pub fn limit_descriptions(&self) -> Vec<LoadControlLimitDescription> {
        match self
            .library
            .local_data(Function::LoadControlLimitDescriptionListData)
        {
            Some(DataElement::LoadControlLimitDescriptions(descriptions)) => descriptions,
            _ => Vec::new(),
        }
    }

    /// Add a limit description, returning its limit id
    pub fn add_limit_description(&self, mut description: LoadControlLimitDescription) -> u32 {
        let mut descriptions = self.limit_descriptions();
        let limit_id = descriptions
            .iter()
            .filter_map(|d| d.limit_id)
            .max()
            .map_or(0, |id| id + 1);
        description.limit_id = Some(limit_id);
        descriptions.push(description);

        self.library
            .set_local_data(DataElement::LoadControlLimitDescriptions(descriptions));
        limit_id
    }

    pub fn limits(&self) -> Vec<LoadControlLimit> {
        match self.library.local_data(Function::LoadControlLimitListData) {
            Some(DataElement::LoadControlLimits(limits)) => limits,
            _ => Vec::new(),
        }
    }

    pub fn limit_for_id(&self, limit_id: u32) -> Result<LoadControlLimit, FeatureError> {
        self.limits()
            .into_iter()
            .find(|limit| limit.limit_id == Some(limit_id))
            .ok_or(FeatureError::DataNotAvailable)
    }

    /// Insert or replace the limit with the same id
    pub fn set_limit(&self, limit: LoadControlLimit) {
        let mut limits = self.limits();
        match limits.iter_mut().find(|existing| existing.limit_id == limit.limit_id) {
            Some(existing) => *existing = limit,
            None => limits.push(limit),
        }
        self.library.set_local_data(DataElement::LoadControlLimits(limits));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cem_spine::model::LimitType;
    use cem_spine::{EntityType, MemoryLibrary, ScaledNumber};

    #[test]
    fn test_local_limits() {
        let library = MemoryLibrary::new();
        library.add_local_feature(FeatureType::LoadControl, Role::Server);
        let control = LocalLoadControl::new(&library).unwrap();

        let limit_id = control.add_limit_description(LoadControlLimitDescription {
            limit_type: Some(LimitType::SignDependentAbsValueLimit),
            ..Default::default()
        });
        assert_eq!(control.limit_for_id(limit_id), Err(FeatureError::DataNotAvailable));

        for value in [1000, 2000] {
            control.set_limit(LoadControlLimit {
                limit_id: Some(limit_id),
                value: Some(ScaledNumber::new(value, 0)),
                ..Default::default()
            });
        }

        assert_eq!(control.limits().len(), 1);
        assert_eq!(
            control.limit_for_id(limit_id).unwrap().value,
            Some(ScaledNumber::new(2000, 0))
        );
    }

    #[test]
    fn test_remote_write() {
        let library = MemoryLibrary::new();
        let entity = EntityRef::new("ski", "d:_i:CS", vec![1], EntityType::Inverter);
        library.add_remote_entity(entity.clone(), &[FeatureType::LoadControl]);

        let control = LoadControl::new(&library, &entity).unwrap();
        control.bind().unwrap();
        control
            .write_limits(vec![LoadControlLimit {
                limit_id: Some(0),
                is_limit_active: Some(true),
                ..Default::default()
            }])
            .unwrap();

        assert_eq!(control.limits().unwrap()[0].is_limit_active, Some(true));
    }
}
