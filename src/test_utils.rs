use std::path::Path;

use chrono::{DateTime, TimeZone, Utc};
use netcdf::AttributeValue;
use tempfile::TempDir;

use crate::{
    config::{EncodingConfig, ProviderMetadata},
    dataset::{CfFeatureType, DatasetLocation, ObservedProperty, PositionAt, SensorDataset, StationLocation, SubSensor},
    encoding::NetcdfArtifact,
};

pub(crate) const LATITUDE: f64 = 44.625;
pub(crate) const LONGITUDE: f64 = -124.045;
pub(crate) const PROVIDER_NAME: &str = "Test Observing System";
pub(crate) const PROVIDER_EMAIL: &str = "data@test.example.org";

const TEMPERATURE: &str = "http://mmisw.org/ont/cf/parameter/sea_water_temperature";
const SPEED: &str = "http://mmisw.org/ont/cf/parameter/sea_water_speed";

/// Whole hours after 2024-05-01T00:00:00Z.
pub(crate) fn hour(h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap() + chrono::Duration::hours(h as i64)
}

pub(crate) fn station() -> DatasetLocation {
    DatasetLocation::Fixed(StationLocation { latitude: LATITUDE, longitude: LONGITUDE, height: None })
}

pub(crate) fn test_config(scratch_root: &Path) -> EncodingConfig {
    EncodingConfig {
        scratch_root: Some(scratch_root.to_path_buf()),
        ..test_config_no_scratch()
    }
}

pub(crate) fn test_config_no_scratch() -> EncodingConfig {
    EncodingConfig {
        provider: ProviderMetadata {
            name: PROVIDER_NAME.to_string(),
            email: PROVIDER_EMAIL.to_string(),
            site: "https://test.example.org".to_string(),
        },
        ..Default::default()
    }
}

/// A timeSeries with `n_times` hourly sea water temperatures and no sub-sensors.
pub(crate) fn time_series_dataset(sensor: &str, n_times: u32) -> SensorDataset {
    let mut builder = SensorDataset::builder(sensor, CfFeatureType::TimeSeries, station())
        .property(ObservedProperty::new(TEMPERATURE, "degC"));
    for i in 0..n_times {
        builder = builder.time(hour(i))
            .quantity(hour(i), TEMPERATURE, None, 10.0 + i as f64);
    }
    builder.build().expect("test time series should be valid")
}

/// A timeSeriesProfile of sea water speed with one bin sub-sensor per entry
/// of `bin_heights`, 1 m apart going down.
pub(crate) fn profile_dataset(sensor: &str, n_times: u32, bin_heights: &[f64]) -> SensorDataset {
    let heights: Vec<f64> = (0..bin_heights.len()).map(|i| -1.0 - i as f64).collect();
    profile_dataset_with_heights(sensor, n_times, &heights, Some(bin_heights))
}

/// A timeSeriesProfile of sea water speed with a sub-sensor at each height;
/// bin sub-sensors if `bin_heights` is given, otherwise point sub-sensors.
pub(crate) fn profile_dataset_with_heights(sensor: &str, n_times: u32, heights: &[f64], bin_heights: Option<&[f64]>) -> SensorDataset {
    let mut builder = SensorDataset::builder(sensor, CfFeatureType::TimeSeriesProfile, station())
        .property(ObservedProperty::new(SPEED, "m s-1"));

    let mut ids = vec![];
    for (i, &height) in heights.iter().enumerate() {
        let id = format!("bin{}", i + 1);
        let sub = match bin_heights {
            Some(bins) => SubSensor::BinProfile { id: id.clone(), height, bin_height: bins[i] },
            None => SubSensor::PointProfile { id: id.clone(), height },
        };
        builder = builder.sub_sensor(sub);
        ids.push(id);
    }

    for it in 0..n_times {
        builder = builder.time(hour(it));
        for (iz, id) in ids.iter().enumerate() {
            builder = builder.quantity(hour(it), SPEED, Some(id), 0.1 * (it as f64 + 1.0) + 0.01 * iz as f64);
        }
    }
    builder.build().expect("test profile should be valid")
}

/// A timeSeries whose position changes between its two times.
pub(crate) fn moving_dataset(sensor: &str) -> SensorDataset {
    let positions = vec![
        PositionAt { time: hour(0), location: StationLocation { latitude: 10.0, longitude: 20.0, height: None } },
        PositionAt { time: hour(1), location: StationLocation { latitude: 10.5, longitude: 20.5, height: None } },
    ];
    SensorDataset::builder(sensor, CfFeatureType::TimeSeries, DatasetLocation::Varying(positions))
        .times([hour(0), hour(1)])
        .property(ObservedProperty::new(TEMPERATURE, "degC"))
        .quantity(hour(0), TEMPERATURE, None, 12.0)
        .build()
        .expect("test moving dataset should be valid")
}

/// Write the artifact's bytes to a temporary directory and open them as a netCDF file.
/// Keep the returned directory alive as long as the file is in use.
pub(crate) fn open_artifact(artifact: &NetcdfArtifact) -> (TempDir, netcdf::File) {
    open_bytes(artifact.bytes())
}

pub(crate) fn open_bytes(bytes: &[u8]) -> (TempDir, netcdf::File) {
    let dir = tempfile::tempdir().expect("creating a temporary directory should not fail");
    let path = dir.path().join("artifact.nc");
    std::fs::write(&path, bytes).expect("writing the artifact should not fail");
    let nc = netcdf::open(&path).expect("the artifact should be a readable netCDF file");
    (dir, nc)
}

pub(crate) fn global_str(nc: &netcdf::File, name: &str) -> String {
    match nc.attribute(name).map(|a| a.value()) {
        Some(Ok(AttributeValue::Str(s))) => s,
        other => panic!("Expected global attribute '{name}' to be a string, got {other:?}"),
    }
}

fn var_str(var: &netcdf::Variable, name: &str) -> String {
    match var.attribute(name).map(|a| a.value()) {
        Some(Ok(AttributeValue::Str(s))) => s,
        other => panic!("Expected attribute '{name}' on '{}' to be a string, got {other:?}", var.name()),
    }
}

/// Check the per-file properties of a single-property timeSeries with `n_times` times
/// made by [`time_series_dataset`].
pub(crate) fn check_scenario_a(nc: &netcdf::File, n_times: u32) {
    assert_eq!(nc.dimension("time").expect("time dimension").len(), n_times as usize);
    assert_eq!(nc.dimension("height").expect("height dimension").len(), 1);
    assert_eq!(nc.dimension("latitude").expect("latitude dimension").len(), 1);
    assert_eq!(nc.dimension("longitude").expect("longitude dimension").len(), 1);

    let data = nc.variable("sea_water_temperature").expect("data variable");
    assert_eq!(var_str(&data, "coordinates"), "time latitude longitude height");
    assert!(data.attribute("_FillValue").is_some());
    for axis in ["time", "latitude", "longitude", "height"] {
        let var = nc.variable(axis).expect("axis variable");
        assert!(var.attribute("_FillValue").is_some(), "{axis} is missing _FillValue");
    }
    assert_eq!(var_str(&nc.variable("height").expect("height variable"), "positive"), "up");

    assert_eq!(global_str(nc, "Conventions"), "CF-1.6");
    assert_eq!(global_str(nc, "featureType"), "timeSeries");
    assert_eq!(global_str(nc, "time_coverage_start"), crate::utils::iso8601(&hour(0)));
    assert_eq!(global_str(nc, "time_coverage_end"), crate::utils::iso8601(&hour(n_times - 1)));
}
