//! File/Archive Emitter.
//!
//! [`NetcdfEncoder::encode_single`] turns exactly one dataset into one netCDF
//! file; [`NetcdfEncoder::encode_archive`] turns any number of datasets into
//! one ZIP of netCDF files. Both work in a scratch directory that is removed
//! before they return, whether or not encoding succeeded.
use std::{
    collections::HashSet,
    io::Cursor,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use error_stack::ResultExt;
use log::{debug, info};
use uuid::Uuid;
use zip::{write::SimpleFileOptions, CompressionMethod};

use crate::{
    config::{EncodingConfig, NetcdfVersion},
    dataset::{DescriptionResolver, SensorDataset},
    error::{EncodeError, Plural},
    utils::{filename_safe_identifier, filename_timestamp},
};

use super::{
    arrays::PopulatedArrays,
    attributes::AttributeContext,
    dimensions::DimensionPlan,
    feature::StationFeature,
    variables::VariablePlan,
    writer::{probe_netcdf4, write_netcdf_file, FileContents},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum ContentType {
    #[strum(to_string = "application/netcdf; version=3")]
    Netcdf3,
    #[strum(to_string = "application/netcdf; version=4")]
    Netcdf4,
    #[strum(to_string = "application/zip; subtype=netcdf; version=3")]
    ZipNetcdf3,
    #[strum(to_string = "application/zip; subtype=netcdf; version=4")]
    ZipNetcdf4,
}

impl ContentType {
    pub fn netcdf(version: NetcdfVersion) -> Self {
        match version {
            NetcdfVersion::V3 => Self::Netcdf3,
            NetcdfVersion::V4 => Self::Netcdf4,
        }
    }

    pub fn zip(version: NetcdfVersion) -> Self {
        match version {
            NetcdfVersion::V3 => Self::ZipNetcdf3,
            NetcdfVersion::V4 => Self::ZipNetcdf4,
        }
    }
}

/// An encoded file held in memory, ready to hand to the transport layer.
#[derive(Debug, Clone)]
pub struct NetcdfArtifact {
    bytes: Vec<u8>,
    content_type: ContentType,
    filename: String,
}

impl NetcdfArtifact {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn content_type(&self) -> ContentType {
        self.content_type
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Write the bytes to `dir` under the artifact's filename and return the full path.
    pub fn write_to_dir(&self, dir: &Path) -> std::io::Result<PathBuf> {
        let path = dir.join(&self.filename);
        std::fs::write(&path, &self.bytes)?;
        Ok(path)
    }
}

/// Encodes [`SensorDataset`]s into netCDF artifacts.
///
/// The encoder only borrows its configuration and holds no other state, so
/// one instance can be shared between threads and calls.
pub struct NetcdfEncoder<'c> {
    config: &'c EncodingConfig,
    resolver: Option<&'c (dyn DescriptionResolver + Sync)>,
}

impl<'c> NetcdfEncoder<'c> {
    pub fn new(config: &'c EncodingConfig) -> Self {
        Self { config, resolver: None }
    }

    /// Use `resolver` to look up sensor descriptions for datasets that do not carry one.
    pub fn with_resolver(mut self, resolver: &'c (dyn DescriptionResolver + Sync)) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Encode exactly one dataset into one netCDF file.
    ///
    /// `version` defaults to the configured one. Fails with
    /// [`EncodeError::UnsupportedCardinality`] before anything is written if
    /// `datasets` does not hold exactly one sensor of exactly one feature type.
    pub fn encode_single(&self, datasets: &[SensorDataset], version: Option<NetcdfVersion>) -> error_stack::Result<NetcdfArtifact, EncodeError> {
        check_single_cardinality(datasets)?;
        let version = version.unwrap_or(self.config.default_version);
        let features = check_feature_types(datasets)?;

        let scratch = self.scratch_dir()?;
        let result = self.encode_into(scratch.path(), datasets, &features, version)
            .and_then(|names| {
                let name = names.into_iter().next()
                    .ok_or_else(|| EncodeError::io("collecting the encoded file"))?;
                let bytes = std::fs::read(scratch.path().join(&name))
                    .change_context_lazy(|| EncodeError::io("reading the encoded file back into memory"))?;
                Ok(NetcdfArtifact { bytes, content_type: ContentType::netcdf(version), filename: name })
            });
        let artifact = finish_scratch(scratch, result)?;
        info!("Encoded {} ({} bytes)", artifact.filename, artifact.bytes.len());
        Ok(artifact)
    }

    /// Encode each dataset into its own netCDF file and bundle them into one ZIP archive.
    pub fn encode_archive(&self, datasets: &[SensorDataset], version: Option<NetcdfVersion>) -> error_stack::Result<NetcdfArtifact, EncodeError> {
        if datasets.is_empty() {
            return Err(EncodeError::UnsupportedCardinality { feature_types: 0, sensors: 0, datasets: 0 }.into());
        }
        let version = version.unwrap_or(self.config.default_version);
        let features = check_feature_types(datasets)?;

        let scratch = self.scratch_dir()?;
        let result = self.encode_into(scratch.path(), datasets, &features, version)
            .and_then(|names| zip_files(scratch.path(), &names))
            .map(|bytes| NetcdfArtifact {
                bytes,
                content_type: ContentType::zip(version),
                filename: archive_file_name(datasets),
            });
        let artifact = finish_scratch(scratch, result)?;
        info!("Encoded {} into {} ({} bytes)", Plural(datasets.len(), "dataset"), artifact.filename, artifact.bytes.len());
        Ok(artifact)
    }

    fn scratch_dir(&self) -> error_stack::Result<tempfile::TempDir, EncodeError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("obsnc-");
        let dir = match &self.config.scratch_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        };
        let dir = dir.change_context_lazy(|| EncodeError::io("creating the scratch directory"))?;
        debug!("Scratch directory is {}", dir.path().display());
        Ok(dir)
    }

    /// Write one file per dataset into `dir`, returning the file names in dataset order.
    fn encode_into(&self, dir: &Path, datasets: &[SensorDataset], features: &[StationFeature], version: NetcdfVersion) -> error_stack::Result<Vec<String>, EncodeError> {
        if version == NetcdfVersion::V4 {
            probe_netcdf4(dir)?;
        }

        datasets.iter()
            .zip(features.iter())
            .map(|(ds, feature)| self.encode_dataset(dir, ds, *feature, version))
            .collect()
    }

    fn encode_dataset(&self, dir: &Path, dataset: &SensorDataset, feature: StationFeature, version: NetcdfVersion) -> error_stack::Result<String, EncodeError> {
        let dims = DimensionPlan::new(dataset, feature, self.config)?;
        let vars = VariablePlan::new(dataset, &dims, self.config, version)?;
        let arrays = PopulatedArrays::new(dataset, &dims, &vars, self.config);

        let file_uuid = Uuid::new_v4();
        let resolver = self.resolver.map(|r| r as &dyn DescriptionResolver);
        let globals = AttributeContext::new(dataset, &dims, &arrays, self.config, resolver, file_uuid).assemble();

        let filename = dataset_file_name(dataset, feature, &file_uuid);
        let contents = FileContents { dims: &dims, vars: &vars, arrays: &arrays, globals: &globals };
        write_netcdf_file(&dir.join(&filename), version, &contents)
            .attach_printable_lazy(|| format!("sensor: {}", dataset.sensor_id()))?;
        debug!("Wrote {filename} ({} {}, {})", Plural(dims.time.len, "time"), Plural(dims.vertical.len, "level"), feature);
        Ok(filename)
    }
}

fn check_single_cardinality(datasets: &[SensorDataset]) -> Result<(), EncodeError> {
    let feature_types: HashSet<_> = datasets.iter().map(|d| d.feature_type()).collect();
    let sensors: HashSet<_> = datasets.iter().map(|d| d.sensor_id()).collect();
    if feature_types.len() != 1 || sensors.len() != 1 || datasets.len() != 1 {
        return Err(EncodeError::UnsupportedCardinality {
            feature_types: feature_types.len(),
            sensors: sensors.len(),
            datasets: datasets.len(),
        });
    }
    Ok(())
}

fn check_feature_types(datasets: &[SensorDataset]) -> Result<Vec<StationFeature>, EncodeError> {
    datasets.iter()
        .map(|d| StationFeature::try_from(d.feature_type()))
        .collect()
}

/// Remove the scratch directory, then return `result`. An encoding error
/// takes precedence over a cleanup error.
fn finish_scratch<T>(scratch: tempfile::TempDir, result: error_stack::Result<T, EncodeError>) -> error_stack::Result<T, EncodeError> {
    let path = scratch.path().to_path_buf();
    let cleanup = scratch.close()
        .change_context_lazy(|| EncodeError::io("removing the scratch directory"))
        .attach_printable_lazy(|| format!("scratch directory: {}", path.display()));
    let value = result?;
    cleanup?;
    Ok(value)
}

fn zip_files(dir: &Path, names: &[String]) -> error_stack::Result<Vec<u8>, EncodeError> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for name in names {
        zip.start_file(name.as_str(), options)
            .change_context_lazy(|| EncodeError::io(format!("adding {name} to the ZIP archive")))?;
        let mut f = std::fs::File::open(dir.join(name))
            .change_context_lazy(|| EncodeError::io(format!("opening {name} to add to the ZIP archive")))?;
        std::io::copy(&mut f, &mut zip)
            .change_context_lazy(|| EncodeError::io(format!("copying {name} into the ZIP archive")))?;
    }

    let cursor = zip.finish()
        .change_context_lazy(|| EncodeError::io("finishing the ZIP archive"))?;
    Ok(cursor.into_inner())
}

fn time_span<'a, I: IntoIterator<Item = &'a SensorDataset>>(datasets: I) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let mut times = datasets.into_iter().flat_map(|d| d.times().iter().copied());
    let first = times.next()?;
    Some(times.fold((first, first), |(lo, hi), t| (lo.min(t), hi.max(t))))
}

/// `<sensor>_<feature type>_<start>_<end>_<uuid prefix>.nc`
fn dataset_file_name(dataset: &SensorDataset, feature: StationFeature, file_uuid: &Uuid) -> String {
    let sensor = filename_safe_identifier(dataset.sensor_id());
    let suffix = &file_uuid.simple().to_string()[..8];
    match time_span([dataset]) {
        Some((start, end)) => format!(
            "{sensor}_{feature}_{}_{}_{suffix}.nc", filename_timestamp(&start), filename_timestamp(&end)
        ),
        None => format!("{sensor}_{feature}_{suffix}.nc"),
    }
}

/// Named after the sensor if all datasets come from one sensor, otherwise a generic name.
fn archive_file_name(datasets: &[SensorDataset]) -> String {
    let sensors: HashSet<_> = datasets.iter().map(|d| d.sensor_id()).collect();
    let stem = match sensors.iter().next() {
        Some(s) if sensors.len() == 1 => filename_safe_identifier(s),
        _ => "sensor-observations".to_string(),
    };
    match time_span(datasets) {
        Some((start, end)) => format!("{stem}_{}_{}.zip", filename_timestamp(&start), filename_timestamp(&end)),
        None => format!("{stem}.zip"),
    }
}
