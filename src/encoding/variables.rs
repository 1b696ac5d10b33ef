//! Variable Builder: one variable per axis and per observed property, plus
//! the `platform`, `crs` and (for profiles) `profile` variables that tie the
//! data to its discrete sampling geometry.
use std::collections::HashSet;

use log::debug;

use crate::{
    config::{EncodingConfig, NetcdfVersion},
    dataset::{ObservedProperty, SensorDataset},
    error::{EncodeError, TypeLabel},
    nc_utils::{AttributeList, NcValueType},
    utils::netcdf_safe_name,
};

use super::{dimensions::{Dimension, DimensionPlan}, feature::StationFeature};

pub const PLATFORM_VAR: &str = "platform";
pub const CRS_VAR: &str = "crs";
pub const PROFILE_VAR: &str = "profile";

/// Everything needed to define one variable in a file.
#[derive(Debug, Clone)]
pub struct VariableSpec {
    pub name: String,
    pub value_type: NcValueType,
    /// Dimension names; empty for scalar container variables.
    pub dims: Vec<String>,
    pub attributes: AttributeList,
    /// Chunk shape, netCDF-4 only.
    pub chunking: Option<Vec<usize>>,
    /// Deflate level, netCDF-4 only.
    pub deflate: Option<i32>,
}

impl VariableSpec {
    fn new(name: String, value_type: NcValueType, dims: Vec<String>, attributes: AttributeList) -> Self {
        Self { name, value_type, dims, attributes, chunking: None, deflate: None }
    }
}

/// A data variable and the property whose values it holds.
#[derive(Debug, Clone)]
pub struct DataVariable<'d> {
    pub property: &'d ObservedProperty,
    pub spec: VariableSpec,
}

#[derive(Debug, Clone)]
pub struct VariablePlan<'d> {
    pub time: VariableSpec,
    pub latitude: VariableSpec,
    pub longitude: VariableSpec,
    pub vertical: VariableSpec,
    pub platform: VariableSpec,
    pub crs: VariableSpec,
    /// Only for timeSeriesProfile.
    pub profile: Option<VariableSpec>,
    pub data: Vec<DataVariable<'d>>,
}

impl<'d> VariablePlan<'d> {
    /// Build the variable specifications for a dataset.
    ///
    /// Fails with [`EncodeError::UnsupportedValueType`] if any stored value is
    /// not a numeric quantity.
    pub fn new(dataset: &'d SensorDataset, dims: &DimensionPlan, config: &EncodingConfig, version: NetcdfVersion) -> Result<Self, EncodeError> {
        check_value_types(dataset)?;

        let precision = NcValueType::from(config.precision);
        let time_chunk = config.time_chunk_size.min(dims.time.len).max(1);
        let is_v4 = version == NetcdfVersion::V4;

        let mut time = axis_variable(&dims.time.name, Dimension::Time, NcValueType::F64, config);
        time.attributes.push("calendar", "gregorian");
        if is_v4 {
            time.chunking = Some(vec![time_chunk]);
        }

        let latitude = axis_variable(&dims.latitude.name, Dimension::Latitude, precision, config);
        let longitude = axis_variable(&dims.longitude.name, Dimension::Longitude, precision, config);
        let mut vertical = axis_variable(&dims.vertical.name, dims.vertical.dimension, precision, config);
        vertical.attributes.push("positive", config.vertical_coordinate.positive());

        let platform = platform_variable(dataset, config);
        let crs = crs_variable(config);
        let profile = match dims.feature {
            StationFeature::FixedTimeSeries => None,
            StationFeature::TimeSeriesProfile => {
                let mut var = profile_variable(dims, config);
                if is_v4 {
                    var.chunking = Some(vec![time_chunk]);
                }
                Some(var)
            },
        };

        let mut taken: HashSet<String> = [&time.name, &latitude.name, &longitude.name, &vertical.name, &platform.name, &crs.name]
            .into_iter()
            .cloned()
            .collect();
        if let Some(p) = &profile {
            taken.insert(p.name.clone());
        }

        let coordinates = dims.coordinates_attribute();
        let mut data = vec![];
        for property in dataset.observed_properties() {
            let name = unique_name(config.name_case.apply(&netcdf_safe_name(property.short_name())), &mut taken);
            let attributes = AttributeList::new()
                .with("standard_name", property.standard_name())
                .with("long_name", property.long_name())
                .with("units", property.units.as_str())
                .with("_FillValue", precision.attribute_value(config.fill_value))
                .with("coordinates", coordinates.as_str())
                .with("grid_mapping", config.name_case.apply(CRS_VAR))
                .with("platform", config.name_case.apply(PLATFORM_VAR));

            let mut spec = VariableSpec::new(name, precision, dims.data_dims(), attributes);
            if is_v4 {
                spec.chunking = Some(match dims.feature {
                    StationFeature::FixedTimeSeries => vec![time_chunk],
                    StationFeature::TimeSeriesProfile => vec![time_chunk, dims.vertical.len],
                });
                spec.deflate = config.deflate_level;
            }
            debug!("Variable {} planned for observed property {}", spec.name, property.identifier);
            data.push(DataVariable { property, spec });
        }

        Ok(Self { time, latitude, longitude, vertical, platform, crs, profile, data })
    }

    /// All variables, in the order they are defined in the file.
    pub fn iter(&self) -> impl Iterator<Item = &VariableSpec> {
        [&self.time, &self.latitude, &self.longitude, &self.vertical, &self.platform, &self.crs]
            .into_iter()
            .chain(self.profile.iter())
            .chain(self.data.iter().map(|d| &d.spec))
    }
}

fn axis_variable(name: &str, dimension: Dimension, value_type: NcValueType, config: &EncodingConfig) -> VariableSpec {
    let attributes = AttributeList::new()
        .with("standard_name", dimension.standard_name())
        .with("long_name", dimension.long_name())
        .with("units", dimension.units())
        .with("axis", dimension.axis())
        .with("_FillValue", value_type.attribute_value(config.fill_value));
    VariableSpec::new(name.to_string(), value_type, vec![name.to_string()], attributes)
}

fn platform_variable(dataset: &SensorDataset, config: &EncodingConfig) -> VariableSpec {
    let long_name = dataset.description()
        .and_then(|d| d.long_name.clone())
        .unwrap_or_else(|| dataset.sensor_id().to_string());
    let attributes = AttributeList::new()
        .with("cf_role", "timeseries_id")
        .with("ioos_code", dataset.sensor_id())
        .with("short_name", dataset.sensor_id())
        .with("long_name", long_name);
    VariableSpec::new(config.name_case.apply(PLATFORM_VAR), NcValueType::I32, vec![], attributes)
}

fn crs_variable(config: &EncodingConfig) -> VariableSpec {
    let attributes = AttributeList::new()
        .with("grid_mapping_name", "latitude_longitude")
        .with("epsg_code", "EPSG:4326")
        .with("semi_major_axis", 6378137.0f64)
        .with("inverse_flattening", 298.257223563f64);
    VariableSpec::new(config.name_case.apply(CRS_VAR), NcValueType::I32, vec![], attributes)
}

fn profile_variable(dims: &DimensionPlan, config: &EncodingConfig) -> VariableSpec {
    let attributes = AttributeList::new()
        .with("cf_role", "profile_id")
        .with("long_name", "profile index")
        .with("_FillValue", NcValueType::I32.attribute_value(config.fill_value));
    VariableSpec::new(config.name_case.apply(PROFILE_VAR), NcValueType::I32, vec![dims.time.name.clone()], attributes)
}

fn unique_name(base: String, taken: &mut HashSet<String>) -> String {
    let mut name = base.clone();
    let mut n = 2;
    while taken.contains(&name) {
        name = format!("{base}_{n}");
        n += 1;
    }
    taken.insert(name.clone());
    name
}

fn check_value_types(dataset: &SensorDataset) -> Result<(), EncodeError> {
    for (_, property, _, value) in dataset.iter_values() {
        if value.as_quantity().is_none() {
            return Err(EncodeError::UnsupportedValueType {
                sensor: dataset.sensor_id().to_string(),
                property: property.to_string(),
                found: value.type_label(),
            });
        }
    }
    Ok(())
}
