use std::fmt::Display;

use error_stack::ResultExt;
use log::debug;

use crate::{
    config::{EncodingConfig, VerticalCoordinate},
    dataset::{DatasetLocation, SensorDataset, StationLocation, SubSensor},
    error::EncodeError,
};

use super::feature::StationFeature;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Time,
    Latitude,
    Longitude,
    Vertical(VerticalCoordinate),
}

impl Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dimension::Time => write!(f, "time"),
            Dimension::Latitude => write!(f, "latitude"),
            Dimension::Longitude => write!(f, "longitude"),
            Dimension::Vertical(VerticalCoordinate::Height) => write!(f, "height"),
            Dimension::Vertical(VerticalCoordinate::Depth) => write!(f, "depth"),
        }
    }
}

impl Dimension {
    pub fn standard_name(&self) -> String {
        self.to_string()
    }

    pub fn long_name(&self) -> String {
        match self {
            Dimension::Time => "time".to_string(),
            Dimension::Latitude => "latitude".to_string(),
            Dimension::Longitude => "longitude".to_string(),
            Dimension::Vertical(VerticalCoordinate::Height) => "height of the sensor relative to the vertical datum".to_string(),
            Dimension::Vertical(VerticalCoordinate::Depth) => "depth of the sensor below the vertical datum".to_string(),
        }
    }

    pub fn axis(&self) -> &'static str {
        match self {
            Dimension::Time => "T",
            Dimension::Latitude => "Y",
            Dimension::Longitude => "X",
            Dimension::Vertical(_) => "Z",
        }
    }

    pub fn units(&self) -> &'static str {
        match self {
            Dimension::Time => "seconds since 1970-01-01 00:00:00 UTC",
            Dimension::Latitude => "degrees_north",
            Dimension::Longitude => "degrees_east",
            Dimension::Vertical(_) => "m",
        }
    }
}

/// A named axis with its length, ready to be created in a file.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedDimension {
    pub dimension: Dimension,
    /// Case-normalized name used for both the dimension and its coordinate variable.
    pub name: String,
    pub len: usize,
    pub unlimited: bool,
}

impl PlannedDimension {
    fn new(dimension: Dimension, len: usize, unlimited: bool, config: &EncodingConfig) -> Self {
        let name = config.name_case.apply(&dimension.to_string());
        Self { dimension, name, len, unlimited }
    }
}

/// One position along the vertical dimension.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Level<'d> {
    pub index: usize,
    /// `None` for the implicit single level of a dataset with no sub-sensors.
    pub sub_sensor: Option<&'d SubSensor>,
    /// Height in meters, positive up, before any depth conversion.
    pub height: f64,
}

impl<'d> Level<'d> {
    pub fn sub_sensor_id(&self) -> Option<&'d str> {
        self.sub_sensor.map(|s| s.id())
    }
}

/// The axes of one dataset's file and the vertical levels along them.
#[derive(Debug, Clone)]
pub struct DimensionPlan<'d> {
    pub feature: StationFeature,
    pub station: StationLocation,
    pub time: PlannedDimension,
    pub latitude: PlannedDimension,
    pub longitude: PlannedDimension,
    pub vertical: PlannedDimension,
    pub levels: Vec<Level<'d>>,
}

impl<'d> DimensionPlan<'d> {
    /// Work out the dimensions for `dataset`.
    ///
    /// Fails if the dataset's location varies, if a timeSeriesProfile has a
    /// sub-sensor that is not a vertical level, or if a plain timeSeries has
    /// more than one sub-sensor.
    pub fn new(dataset: &'d SensorDataset, feature: StationFeature, config: &EncodingConfig) -> Result<Self, EncodeError> {
        let station = fixed_station(dataset)?;
        let levels = plan_levels(dataset, feature, &station)?;

        let time = PlannedDimension::new(Dimension::Time, dataset.times().len(), true, config);
        let latitude = PlannedDimension::new(Dimension::Latitude, 1, false, config);
        let longitude = PlannedDimension::new(Dimension::Longitude, 1, false, config);
        let vertical = PlannedDimension::new(
            Dimension::Vertical(config.vertical_coordinate),
            levels.len(),
            false,
            config
        );

        Ok(Self { feature, station, time, latitude, longitude, vertical, levels })
    }

    /// All dimensions in the order they are created.
    pub fn dimensions(&self) -> [&PlannedDimension; 4] {
        [&self.time, &self.latitude, &self.longitude, &self.vertical]
    }

    /// Dimension names of an observed property variable.
    pub fn data_dims(&self) -> Vec<String> {
        match self.feature {
            StationFeature::FixedTimeSeries => vec![self.time.name.clone()],
            StationFeature::TimeSeriesProfile => vec![self.time.name.clone(), self.vertical.name.clone()],
        }
    }

    /// Shape matching [`DimensionPlan::data_dims`].
    pub fn data_shape(&self) -> Vec<usize> {
        match self.feature {
            StationFeature::FixedTimeSeries => vec![self.time.len],
            StationFeature::TimeSeriesProfile => vec![self.time.len, self.vertical.len],
        }
    }

    /// Array index of a data cell for a time index and a level.
    pub fn data_index(&self, time_index: usize, level: &Level) -> Vec<usize> {
        match self.feature {
            StationFeature::FixedTimeSeries => vec![time_index],
            StationFeature::TimeSeriesProfile => vec![time_index, level.index],
        }
    }

    /// Space separated names of the coordinate variables, for the `coordinates` attribute.
    pub fn coordinates_attribute(&self) -> String {
        self.dimensions().iter().map(|d| d.name.as_str()).collect::<Vec<_>>().join(" ")
    }
}

fn fixed_station(dataset: &SensorDataset) -> Result<StationLocation, EncodeError> {
    match dataset.location() {
        DatasetLocation::Fixed(loc) => Ok(*loc),
        DatasetLocation::Varying(positions) => Err(EncodeError::geometry(
            dataset.sensor_id(),
            format!("location varies over {} positions; moving platforms (trajectories) are not supported", positions.len())
        )),
    }
}

fn plan_levels<'d>(dataset: &'d SensorDataset, feature: StationFeature, station: &StationLocation) -> Result<Vec<Level<'d>>, EncodeError> {
    let subs = dataset.sub_sensors();
    if subs.is_empty() {
        return Ok(vec![Level { index: 0, sub_sensor: None, height: station.height.unwrap_or(0.0) }]);
    }

    match feature {
        StationFeature::FixedTimeSeries if subs.len() > 1 => {
            return Err(EncodeError::geometry(
                dataset.sensor_id(),
                format!("a timeSeries can have at most one sub-sensor, got {}", subs.len())
            ));
        },
        _ => (),
    }

    subs.iter()
        .enumerate()
        .map(|(index, sub)| {
            let height = sub.height().ok_or_else(|| EncodeError::geometry(
                dataset.sensor_id(),
                format!("sub-sensor '{}' is not a vertical profile sensor", sub.id())
            ))?;
            Ok(Level { index, sub_sensor: Some(sub), height })
        })
        .collect()
}

/// Create every planned dimension in `nc`; the time dimension is unlimited.
pub(crate) fn create_dims_in_file(nc: &mut netcdf::FileMut, plan: &DimensionPlan) -> error_stack::Result<(), EncodeError> {
    for dim in plan.dimensions() {
        if dim.unlimited {
            nc.add_unlimited_dimension(&dim.name)
                .change_context_lazy(|| EncodeError::io(format!("creating the unlimited '{}' dimension", dim.name)))?;
        } else {
            nc.add_dimension(&dim.name, dim.len)
                .change_context_lazy(|| EncodeError::io(format!("creating the '{}' dimension", dim.name)))?;
        }
        debug!("Dimension {} defined (length {}{})", dim.name, dim.len, if dim.unlimited { ", unlimited" } else { "" });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::NameCase, dataset::CfFeatureType, test_utils};

    #[test]
    fn test_time_series_dimensions() {
        let ds = test_utils::time_series_dataset("urn:test:sensor:a", 3);
        let cfg = EncodingConfig::default();
        let plan = DimensionPlan::new(&ds, StationFeature::FixedTimeSeries, &cfg).unwrap();

        assert_eq!(plan.time.len, 3);
        assert!(plan.time.unlimited);
        assert_eq!(plan.latitude.len, 1);
        assert_eq!(plan.longitude.len, 1);
        assert_eq!(plan.vertical.len, 1);
        assert_eq!(plan.vertical.name, "height");
        assert_eq!(plan.data_dims(), vec!["time".to_string()]);
        assert_eq!(plan.data_shape(), vec![3]);
        assert_eq!(plan.coordinates_attribute(), "time latitude longitude height");
    }

    #[test]
    fn test_profile_dimensions_upper_depth() {
        let ds = test_utils::profile_dataset("urn:test:sensor:adcp", 2, &[1.0, 1.0, 1.0]);
        let cfg = EncodingConfig {
            name_case: NameCase::Upper,
            vertical_coordinate: VerticalCoordinate::Depth,
            ..Default::default()
        };
        let plan = DimensionPlan::new(&ds, StationFeature::TimeSeriesProfile, &cfg).unwrap();

        assert_eq!(plan.time.len, 2);
        assert_eq!(plan.vertical.len, 3);
        assert_eq!(plan.vertical.name, "DEPTH");
        assert_eq!(plan.data_dims(), vec!["TIME".to_string(), "DEPTH".to_string()]);
        assert_eq!(plan.data_index(1, &plan.levels[2]), vec![1, 2]);
        assert_eq!(plan.coordinates_attribute(), "TIME LATITUDE LONGITUDE DEPTH");
    }

    #[test]
    fn test_zero_sub_sensors_same_as_one() {
        let ds = test_utils::time_series_dataset("urn:test:sensor:a", 2);
        let cfg = EncodingConfig::default();
        let plan = DimensionPlan::new(&ds, StationFeature::TimeSeriesProfile, &cfg).unwrap();
        assert_eq!(plan.vertical.len, 1);
        assert_eq!(plan.levels.len(), 1);
        assert_eq!(plan.levels[0].sub_sensor, None);
        assert_eq!(plan.data_shape(), vec![2, 1]);
    }

    #[test]
    fn test_varying_location_rejected() {
        let ds = test_utils::moving_dataset("urn:test:glider");
        let err = DimensionPlan::new(&ds, StationFeature::FixedTimeSeries, &EncodingConfig::default()).unwrap_err();
        assert!(matches!(err, EncodeError::UnsupportedGeometry { .. }));
    }

    #[test]
    fn test_non_vertical_sub_sensor_rejected() {
        let ds = SensorDataset::builder("urn:test:x", CfFeatureType::TimeSeriesProfile, test_utils::station())
            .time(test_utils::hour(0))
            .sub_sensor(SubSensor::Other { id: "camera".to_string() })
            .build()
            .unwrap();
        let err = DimensionPlan::new(&ds, StationFeature::TimeSeriesProfile, &EncodingConfig::default()).unwrap_err();
        match err {
            EncodeError::UnsupportedGeometry { sensor, reason } => {
                assert_eq!(sensor, "urn:test:x");
                assert!(reason.contains("camera"));
            },
            other => panic!("Expected UnsupportedGeometry, got {other:?}"),
        }
    }

    #[test]
    fn test_time_series_with_many_sub_sensors_rejected() {
        let ds = test_utils::profile_dataset("urn:test:adcp", 1, &[1.0, 1.0]);
        let err = DimensionPlan::new(&ds, StationFeature::FixedTimeSeries, &EncodingConfig::default()).unwrap_err();
        assert!(matches!(err, EncodeError::UnsupportedGeometry { .. }));
    }
}
