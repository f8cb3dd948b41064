//! Electrical Connection accessor

use cem_spine::model::{
    ElectricalConnectionParameterDescription, ElectricalConnectionPermittedValueSet, ScopeType,
};
use cem_spine::{EntityRef, FeatureError, FeatureLibrary, FeatureType, Function, MsgCounter};

use super::{expect_data, RemoteFeature};

pub struct ElectricalConnection<'a> {
    feature: RemoteFeature<'a>,
}

impl<'a> ElectricalConnection<'a> {
    pub fn new(library: &'a dyn FeatureLibrary, entity: &'a EntityRef) -> Result<Self, FeatureError> {
        Ok(Self {
            feature: RemoteFeature::new(library, entity, FeatureType::ElectricalConnection)?,
        })
    }

    pub fn subscribe(&self) -> Result<MsgCounter, FeatureError> {
        self.feature.subscribe()
    }

    pub fn request_descriptions(&self) -> Result<MsgCounter, FeatureError> {
        self.feature
            .request(Function::ElectricalConnectionParameterDescriptionListData)
    }

    pub fn request_permitted_values(&self) -> Result<MsgCounter, FeatureError> {
        self.feature
            .request(Function::ElectricalConnectionPermittedValueSetListData)
    }

    pub fn parameter_descriptions(
        &self,
    ) -> Result<Vec<ElectricalConnectionParameterDescription>, FeatureError> {
        expect_data!(
            self.feature
                .data(Function::ElectricalConnectionParameterDescriptionListData)?,
            ElectricalParameterDescriptions
        )
    }

    pub fn parameter_description_for_scope(
        &self,
        scope: ScopeType,
    ) -> Result<ElectricalConnectionParameterDescription, FeatureError> {
        self.parameter_descriptions()?
            .into_iter()
            .find(|description| description.scope_type == Some(scope))
            .ok_or(FeatureError::DataNotAvailable)
    }

    pub fn permitted_value_sets(&self) -> Result<Vec<ElectricalConnectionPermittedValueSet>, FeatureError> {
        expect_data!(
            self.feature
                .data(Function::ElectricalConnectionPermittedValueSetListData)?,
            ElectricalPermittedValueSets
        )
    }

    /// Permitted (min, max) range of the parameter with the given scope
    pub fn permitted_range_for_scope(&self, scope: ScopeType) -> Result<(f64, f64), FeatureError> {
        let description = self.parameter_description_for_scope(scope)?;

        let value_set = self
            .permitted_value_sets()?
            .into_iter()
            .find(|set| {
                set.electrical_connection_id == description.electrical_connection_id
                    && set.parameter_id == description.parameter_id
            })
            .ok_or(FeatureError::DataNotAvailable)?;

        let range = value_set
            .permitted_value_set
            .iter()
            .flat_map(|set| set.range.iter())
            .next()
            .ok_or(FeatureError::DataNotAvailable)?;

        let min = range.min.map(|min| min.value()).unwrap_or_default();
        let max = range.max.map(|max| max.value()).unwrap_or_default();
        Ok((min, max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cem_spine::model::{ScaledRange, ScaledValueSet};
    use cem_spine::{DataElement, EntityType, MemoryLibrary, ScaledNumber};

    #[test]
    fn test_permitted_range() {
        let library = MemoryLibrary::new();
        let entity = EntityRef::new("ski", "d:_i:EV", vec![1, 1], EntityType::Ev);
        library.add_remote_entity(entity.clone(), &[FeatureType::ElectricalConnection]);

        let connection = ElectricalConnection::new(&library, &entity).unwrap();
        assert_eq!(
            connection.permitted_range_for_scope(ScopeType::AcPowerTotal),
            Err(FeatureError::DataNotAvailable)
        );

        library.set_remote_data(
            &entity,
            DataElement::ElectricalParameterDescriptions(vec![ElectricalConnectionParameterDescription {
                electrical_connection_id: Some(0),
                parameter_id: Some(8),
                scope_type: Some(ScopeType::AcPowerTotal),
                ..Default::default()
            }]),
        );
        library.set_remote_data(
            &entity,
            DataElement::ElectricalPermittedValueSets(vec![ElectricalConnectionPermittedValueSet {
                electrical_connection_id: Some(0),
                parameter_id: Some(8),
                permitted_value_set: vec![ScaledValueSet {
                    value: vec![],
                    range: vec![ScaledRange {
                        min: Some(ScaledNumber::new(400, 0)),
                        max: Some(ScaledNumber::new(11, 3)),
                    }],
                }],
            }]),
        );

        assert_eq!(
            connection.permitted_range_for_scope(ScopeType::AcPowerTotal),
            Ok((400.0, 11000.0))
        );
    }
}
