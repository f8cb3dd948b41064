//! Incentive Table accessor

use cem_spine::model::{
    IncentiveTable as IncentiveTableData, IncentiveTableConstraints, IncentiveTableDescription,
    ScopeType,
};
use cem_spine::{
    DataElement, EntityRef, FeatureError, FeatureLibrary, FeatureType, Function, MsgCounter,
};

use super::{expect_data, RemoteFeature};

pub struct IncentiveTable<'a> {
    feature: RemoteFeature<'a>,
}

impl<'a> IncentiveTable<'a> {
    pub fn new(library: &'a dyn FeatureLibrary, entity: &'a EntityRef) -> Result<Self, FeatureError> {
        Ok(Self {
            feature: RemoteFeature::new(library, entity, FeatureType::IncentiveTable)?,
        })
    }

    pub fn subscribe(&self) -> Result<MsgCounter, FeatureError> {
        self.feature.subscribe()
    }

    pub fn bind(&self) -> Result<MsgCounter, FeatureError> {
        self.feature.bind()
    }

    pub fn request_descriptions(&self) -> Result<MsgCounter, FeatureError> {
        self.feature.request(Function::IncentiveTableDescriptionData)
    }

    pub fn request_constraints(&self) -> Result<MsgCounter, FeatureError> {
        self.feature.request(Function::IncentiveTableConstraintsData)
    }

    pub fn request_values(&self) -> Result<MsgCounter, FeatureError> {
        self.feature.request(Function::IncentiveTableData)
    }

    pub fn descriptions(&self) -> Result<Vec<IncentiveTableDescription>, FeatureError> {
        expect_data!(
            self.feature.data(Function::IncentiveTableDescriptionData)?,
            IncentiveTableDescriptions
        )
    }

    /// Tariff descriptions with the given scope
    pub fn descriptions_for_scope(
        &self,
        scope: ScopeType,
    ) -> Result<Vec<IncentiveTableDescription>, FeatureError> {
        let matching: Vec<_> = self
            .descriptions()?
            .into_iter()
            .filter(|description| {
                description
                    .tariff_description
                    .as_ref()
                    .map_or(false, |tariff| tariff.scope_type == Some(scope))
            })
            .collect();

        if matching.is_empty() {
            return Err(FeatureError::DataNotAvailable);
        }
        Ok(matching)
    }

    pub fn constraints(&self) -> Result<Vec<IncentiveTableConstraints>, FeatureError> {
        expect_data!(
            self.feature.data(Function::IncentiveTableConstraintsData)?,
            IncentiveTableConstraints
        )
    }

    pub fn values(&self) -> Result<Vec<IncentiveTableData>, FeatureError> {
        expect_data!(self.feature.data(Function::IncentiveTableData)?, IncentiveTables)
    }

    pub fn write_descriptions(
        &self,
        descriptions: Vec<IncentiveTableDescription>,
    ) -> Result<MsgCounter, FeatureError> {
        self.feature
            .write(DataElement::IncentiveTableDescriptions(descriptions))
    }

    pub fn write_values(&self, tables: Vec<IncentiveTableData>) -> Result<MsgCounter, FeatureError> {
        self.feature.write(DataElement::IncentiveTables(tables))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cem_spine::model::TariffDescription;
    use cem_spine::{EntityType, MemoryLibrary};

    #[test]
    fn test_descriptions_for_scope() {
        let library = MemoryLibrary::new();
        let entity = EntityRef::new("ski", "d:_i:EV", vec![1, 1], EntityType::Ev);
        library.add_remote_entity(entity.clone(), &[FeatureType::IncentiveTable]);
        library.set_remote_data(
            &entity,
            DataElement::IncentiveTableDescriptions(vec![IncentiveTableDescription {
                tariff_description: Some(TariffDescription {
                    tariff_id: Some(4),
                    scope_type: Some(ScopeType::SimpleIncentiveTable),
                    ..Default::default()
                }),
                tier: vec![],
            }]),
        );

        let table = IncentiveTable::new(&library, &entity).unwrap();
        assert_eq!(
            table
                .descriptions_for_scope(ScopeType::SimpleIncentiveTable)
                .unwrap()
                .len(),
            1
        );
        assert_eq!(
            table.descriptions_for_scope(ScopeType::AcPower),
            Err(FeatureError::DataNotAvailable)
        );
        assert_eq!(table.constraints(), Err(FeatureError::DataNotAvailable));
    }
}
