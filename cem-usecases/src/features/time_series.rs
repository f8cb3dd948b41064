//! Time Series accessor

use cem_spine::model::{TimeSeriesConstraints, TimeSeriesData, TimeSeriesDescription, TimeSeriesType};
use cem_spine::{
    DataElement, EntityRef, FeatureError, FeatureLibrary, FeatureType, Function, MsgCounter,
};

use super::{expect_data, RemoteFeature};

pub struct TimeSeries<'a> {
    feature: RemoteFeature<'a>,
}

impl<'a> TimeSeries<'a> {
    pub fn new(library: &'a dyn FeatureLibrary, entity: &'a EntityRef) -> Result<Self, FeatureError> {
        Ok(Self {
            feature: RemoteFeature::new(library, entity, FeatureType::TimeSeries)?,
        })
    }

    pub fn subscribe(&self) -> Result<MsgCounter, FeatureError> {
        self.feature.subscribe()
    }

    pub fn bind(&self) -> Result<MsgCounter, FeatureError> {
        self.feature.bind()
    }

    pub fn request_descriptions(&self) -> Result<MsgCounter, FeatureError> {
        self.feature.request(Function::TimeSeriesDescriptionListData)
    }

    pub fn request_constraints(&self) -> Result<MsgCounter, FeatureError> {
        self.feature.request(Function::TimeSeriesConstraintsListData)
    }

    pub fn request_values(&self) -> Result<MsgCounter, FeatureError> {
        self.feature.request(Function::TimeSeriesListData)
    }

    pub fn descriptions(&self) -> Result<Vec<TimeSeriesDescription>, FeatureError> {
        expect_data!(
            self.feature.data(Function::TimeSeriesDescriptionListData)?,
            TimeSeriesDescriptions
        )
    }

    pub fn description_for_type(
        &self,
        series_type: TimeSeriesType,
    ) -> Result<TimeSeriesDescription, FeatureError> {
        self.descriptions()?
            .into_iter()
            .find(|description| description.time_series_type == Some(series_type))
            .ok_or(FeatureError::DataNotAvailable)
    }

    pub fn constraints(&self) -> Result<Vec<TimeSeriesConstraints>, FeatureError> {
        expect_data!(
            self.feature.data(Function::TimeSeriesConstraintsListData)?,
            TimeSeriesConstraints
        )
    }

    pub fn values(&self) -> Result<Vec<TimeSeriesData>, FeatureError> {
        expect_data!(self.feature.data(Function::TimeSeriesListData)?, TimeSeries)
    }

    /// Values of the series whose description has the given type
    pub fn value_for_type(&self, series_type: TimeSeriesType) -> Result<TimeSeriesData, FeatureError> {
        let id = self
            .description_for_type(series_type)?
            .time_series_id
            .ok_or(FeatureError::DataNotAvailable)?;

        self.values()?
            .into_iter()
            .find(|data| data.time_series_id == Some(id))
            .ok_or(FeatureError::DataNotAvailable)
    }

    pub fn write_values(&self, data: Vec<TimeSeriesData>) -> Result<MsgCounter, FeatureError> {
        self.feature.write(DataElement::TimeSeries(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cem_spine::{EntityType, MemoryLibrary};

    #[test]
    fn test_value_for_type() {
        let library = MemoryLibrary::new();
        let entity = EntityRef::new("ski", "d:_i:EV", vec![1, 1], EntityType::Ev);
        library.add_remote_entity(entity.clone(), &[FeatureType::TimeSeries]);

        let series = TimeSeries::new(&library, &entity).unwrap();
        assert_eq!(
            series.value_for_type(TimeSeriesType::Plan),
            Err(FeatureError::DataNotAvailable)
        );

        library.set_remote_data(
            &entity,
            DataElement::TimeSeriesDescriptions(vec![
                TimeSeriesDescription {
                    time_series_id: Some(1),
                    time_series_type: Some(TimeSeriesType::Constraints),
                    ..Default::default()
                },
                TimeSeriesDescription {
                    time_series_id: Some(2),
                    time_series_type: Some(TimeSeriesType::Plan),
                    ..Default::default()
                },
            ]),
        );
        library.set_remote_data(
            &entity,
            DataElement::TimeSeries(vec![
                TimeSeriesData {
                    time_series_id: Some(1),
                    ..Default::default()
                },
                TimeSeriesData {
                    time_series_id: Some(2),
                    ..Default::default()
                },
            ]),
        );

        assert_eq!(
            series.value_for_type(TimeSeriesType::Plan).unwrap().time_series_id,
            Some(2)
        );
    }

    #[test]
    fn test_missing_feature() {
        let library = MemoryLibrary::new();
        let entity = EntityRef::new("ski", "d:_i:EV", vec![1, 1], EntityType::Ev);

        assert!(matches!(
            TimeSeries::new(&library, &entity),
            Err(FeatureError::FeatureNotFound { .. })
        ));
    }
}
