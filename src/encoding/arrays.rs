//! Array Populator.
//!
//! Every array starts out entirely at the configured fill value; measured
//! values are then written at `(time index, level index)`, where the time
//! index is the position in the sorted timestamps and the level index is the
//! declared position of the sub-sensor.
use std::{collections::HashMap, fmt::Display};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use log::{debug, warn};

use crate::{
    config::EncodingConfig,
    dataset::SensorDataset,
    nc_utils::NcArray,
};

use super::{dimensions::{DimensionPlan, Level}, variables::VariablePlan};

/// What the vertical spacing of the levels looks like, for `geospatial_vertical_resolution`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinResolution {
    /// Exactly one level.
    Point,
    /// Every level is a bin of this thickness.
    Binned(f64),
    /// Levels declare bin thicknesses that disagree (or only some declare one).
    /// Holds the fill value, which is reported in place of a thickness.
    Inconsistent(f64),
    /// Several point levels with no thickness. `"point"` is reserved for a
    /// single level, so the attribute is left out entirely.
    Unspecified,
}

impl BinResolution {
    pub fn attribute_value(&self) -> Option<String> {
        match self {
            BinResolution::Point => Some("point".to_string()),
            BinResolution::Binned(h) => Some(format!("{h:?} m binned")),
            BinResolution::Inconsistent(fill) => Some(format!("{fill:?} m binned")),
            BinResolution::Unspecified => None,
        }
    }
}

/// Vertical extent in the output coordinate (height or depth), with `min <= max`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VerticalExtent {
    pub min: f64,
    pub max: f64,
}

impl Display for VerticalExtent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} to {} m", self.min, self.max)
    }
}

/// Filled arrays, keyed by variable name, plus the vertical summary the
/// global attributes need.
#[derive(Debug, Clone)]
pub struct PopulatedArrays {
    pub arrays: IndexMap<String, NcArray>,
    pub vertical_extent: VerticalExtent,
    pub resolution: BinResolution,
}

impl PopulatedArrays {
    pub fn new(dataset: &SensorDataset, dims: &DimensionPlan, vars: &VariablePlan, config: &EncodingConfig) -> Self {
        let fill = config.fill_value;
        let times = dataset.sorted_times();
        let mut arrays = IndexMap::new();

        let mut time_arr = NcArray::filled(vars.time.value_type, &[dims.time.len], fill);
        for (i, t) in times.iter().enumerate() {
            time_arr.set(&[i], epoch_seconds(t));
        }
        arrays.insert(vars.time.name.clone(), time_arr);

        let mut lat_arr = NcArray::filled(vars.latitude.value_type, &[1], fill);
        lat_arr.set(&[0], dims.station.latitude);
        arrays.insert(vars.latitude.name.clone(), lat_arr);

        let mut lon_arr = NcArray::filled(vars.longitude.value_type, &[1], fill);
        lon_arr.set(&[0], dims.station.longitude);
        arrays.insert(vars.longitude.name.clone(), lon_arr);

        let mut vert_arr = NcArray::filled(vars.vertical.value_type, &[dims.vertical.len], fill);
        for level in dims.levels.iter() {
            vert_arr.set(&[level.index], config.vertical_coordinate.from_height(level.height));
        }
        arrays.insert(vars.vertical.name.clone(), vert_arr);

        if let Some(profile) = &vars.profile {
            let mut prof_arr = NcArray::filled(profile.value_type, &[dims.time.len], fill);
            for i in 0..dims.time.len {
                prof_arr.set(&[i], i as f64);
            }
            arrays.insert(profile.name.clone(), prof_arr);
        }

        let time_index: HashMap<&DateTime<Utc>, usize> = times.iter().enumerate().map(|(i, t)| (t, i)).collect();
        let mut level_index: HashMap<Option<&str>, &Level> = dims.levels.iter().map(|l| (l.sub_sensor_id(), l)).collect();
        if let [only] = dims.levels.as_slice() {
            level_index.insert(None, only);
        }

        let mut data_arrays: IndexMap<&str, NcArray> = vars.data.iter()
            .map(|d| (d.property.identifier.as_str(), NcArray::filled(d.spec.value_type, &dims.data_shape(), fill)))
            .collect();

        // Value types were checked when the variables were planned.
        for (t, identifier, sub_sensor, value) in dataset.iter_values() {
            let Some(v) = value.as_quantity() else { continue };
            let (Some(&it), Some(level), Some(arr)) = (time_index.get(t), level_index.get(&sub_sensor), data_arrays.get_mut(identifier)) else {
                continue;
            };
            arr.set(&dims.data_index(it, level), v);
        }

        for (data_var, (_, arr)) in vars.data.iter().zip(data_arrays) {
            debug!("Filled {} ({} cells)", data_var.spec.name, arr.shape().iter().product::<usize>());
            arrays.insert(data_var.spec.name.clone(), arr);
        }

        let vertical_extent = vertical_extent(dims, config);
        let resolution = bin_resolution(dims, config);
        if let BinResolution::Inconsistent(_) = resolution {
            warn!("Sub-sensors of {} do not share one bin height, vertical resolution reported as inconsistent", dataset.sensor_id());
        }

        Self { arrays, vertical_extent, resolution }
    }
}

/// Seconds since the Unix epoch, including the fractional part.
pub(crate) fn epoch_seconds(t: &DateTime<Utc>) -> f64 {
    t.timestamp() as f64 + t.timestamp_subsec_nanos() as f64 * 1e-9
}

/// Extent from the first and last declared levels, converted to the output
/// coordinate and ordered.
fn vertical_extent(dims: &DimensionPlan, config: &EncodingConfig) -> VerticalExtent {
    let first = dims.levels.first().map(|l| l.height).unwrap_or(0.0);
    let last = dims.levels.last().map(|l| l.height).unwrap_or(first);
    let a = config.vertical_coordinate.from_height(first);
    let b = config.vertical_coordinate.from_height(last);
    if a <= b {
        VerticalExtent { min: a, max: b }
    } else {
        VerticalExtent { min: b, max: a }
    }
}

fn bin_resolution(dims: &DimensionPlan, config: &EncodingConfig) -> BinResolution {
    if dims.levels.len() == 1 {
        return BinResolution::Point;
    }

    let bins: Vec<Option<f64>> = dims.levels.iter()
        .map(|l| l.sub_sensor.and_then(|s| s.bin_height()))
        .collect();

    if bins.iter().all(|b| b.is_none()) {
        return BinResolution::Unspecified;
    }

    match bins.first().copied().flatten() {
        Some(first) if bins.iter().all(|b| *b == Some(first)) => BinResolution::Binned(first),
        _ => BinResolution::Inconsistent(config.fill_value),
    }
}
