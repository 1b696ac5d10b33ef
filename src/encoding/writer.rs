use std::path::Path;

use error_stack::ResultExt;
use log::debug;

use crate::{
    config::NetcdfVersion,
    error::EncodeError,
    nc_utils::{AttributeList, NcValueType},
};

use super::{
    arrays::PopulatedArrays,
    dimensions::{create_dims_in_file, DimensionPlan},
    variables::{VariablePlan, VariableSpec},
};

pub(crate) const PROBE_FILE_NAME: &str = "netcdf4-probe.nc";

/// Everything that goes into one file, in the order it is written.
pub(crate) struct FileContents<'a> {
    pub(crate) dims: &'a DimensionPlan<'a>,
    pub(crate) vars: &'a VariablePlan<'a>,
    pub(crate) arrays: &'a PopulatedArrays,
    pub(crate) globals: &'a AttributeList,
}

fn create_options(version: NetcdfVersion) -> netcdf::Options {
    match version {
        NetcdfVersion::V3 => netcdf::Options::_64BIT_OFFSET,
        NetcdfVersion::V4 => netcdf::Options::NETCDF4,
    }
}

/// Write one netCDF file: the schema pass (dimensions, variables with their
/// attributes, global attributes), then the data pass.
///
/// The file handle is closed on every path; on error the partly written file
/// is left for the caller's scratch directory cleanup.
pub(crate) fn write_netcdf_file(path: &Path, version: NetcdfVersion, contents: &FileContents) -> error_stack::Result<(), EncodeError> {
    let mut nc = netcdf::create_with(path, create_options(version))
        .change_context_lazy(|| EncodeError::io("creating the netCDF file"))
        .attach_printable_lazy(|| format!("file path: {}", path.display()))?;

    create_dims_in_file(&mut nc, contents.dims)?;
    for spec in contents.vars.iter() {
        define_variable(&mut nc, spec)?;
    }
    contents.globals.write_to_file(&mut nc)
        .change_context_lazy(|| EncodeError::io("writing the global attributes"))?;
    debug!("Schema pass complete for {}", path.display());

    for (name, arr) in contents.arrays.arrays.iter() {
        let mut var = nc.variable_mut(name)
            .ok_or_else(|| EncodeError::io(format!("looking up variable '{name}' for the data pass")))?;
        arr.put_to(&mut var)
            .change_context_lazy(|| EncodeError::io(format!("writing data for variable '{name}'")))?;
    }
    debug!("Data pass complete for {}", path.display());

    nc.close().change_context_lazy(|| EncodeError::io("closing the netCDF file"))
}

fn define_variable(nc: &mut netcdf::FileMut, spec: &VariableSpec) -> error_stack::Result<(), EncodeError> {
    let dims: Vec<&str> = spec.dims.iter().map(|d| d.as_str()).collect();
    let mut var = match spec.value_type {
        NcValueType::I32 => nc.add_variable::<i32>(&spec.name, &dims),
        NcValueType::F32 => nc.add_variable::<f32>(&spec.name, &dims),
        NcValueType::F64 => nc.add_variable::<f64>(&spec.name, &dims),
    }.change_context_lazy(|| EncodeError::io(format!("defining variable '{}'", spec.name)))?;

    if let Some(chunks) = &spec.chunking {
        var.set_chunking(chunks)
            .change_context_lazy(|| EncodeError::io(format!("setting the chunk shape of '{}'", spec.name)))
            .attach_printable_lazy(|| format!("chunk shape: {chunks:?}"))?;
    }
    if let Some(level) = spec.deflate {
        var.set_compression(level, true)
            .change_context_lazy(|| EncodeError::io(format!("setting compression on '{}'", spec.name)))?;
    }

    spec.attributes.write_to_variable(&mut var)
        .change_context_lazy(|| EncodeError::io(format!("writing attributes of '{}'", spec.name)))?;
    debug!("Variable {} defined with dimensions {:?}", spec.name, spec.dims);
    Ok(())
}

/// Check that the linked netCDF library can create netCDF-4 files by
/// creating (and then removing) a small file in `scratch_dir`.
pub(crate) fn probe_netcdf4(scratch_dir: &Path) -> error_stack::Result<(), EncodeError> {
    let probe = scratch_dir.join(PROBE_FILE_NAME);
    let result = netcdf::create_with(&probe, netcdf::Options::NETCDF4)
        .and_then(|mut nc| {
            nc.add_dimension("probe", 1)?;
            nc.close()
        });

    // The probe may not exist if creation failed outright
    let _ = std::fs::remove_file(&probe);

    result.change_context(EncodeError::NativeLibraryUnavailable)
        .attach_printable_lazy(|| format!("probe file: {}", probe.display()))
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::{
        config::EncodingConfig,
        encoding::{attributes::AttributeContext, feature::StationFeature},
        nc_utils::NcArray,
        test_utils,
    };

    #[test]
    fn test_write_and_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("out.nc");
        let ds = test_utils::profile_dataset("urn:test:adcp", 2, &[1.0, 1.0, 1.0]);
        let cfg = EncodingConfig { deflate_level: Some(4), ..Default::default() };

        let dims = DimensionPlan::new(&ds, StationFeature::TimeSeriesProfile, &cfg).unwrap();
        let vars = VariablePlan::new(&ds, &dims, &cfg, NetcdfVersion::V4).unwrap();
        let arrays = PopulatedArrays::new(&ds, &dims, &vars, &cfg);
        let globals = AttributeContext::new(&ds, &dims, &arrays, &cfg, None, Uuid::new_v4()).assemble();
        let contents = FileContents { dims: &dims, vars: &vars, arrays: &arrays, globals: &globals };
        write_netcdf_file(&path, NetcdfVersion::V4, &contents).unwrap();

        let nc = netcdf::open(&path).unwrap();
        assert_eq!(nc.dimension("time").unwrap().len(), 2);
        assert!(nc.dimension("time").unwrap().is_unlimited());
        assert_eq!(nc.dimension("height").unwrap().len(), 3);
        let var = nc.variable("sea_water_speed").unwrap();
        let data = NcArray::get_from(&var).unwrap();
        assert_eq!(data.shape(), &[2, 3]);
        assert_eq!(data, arrays.arrays["sea_water_speed"]);
        assert!(nc.variable("platform").is_some());
        assert!(nc.variable("crs").is_some());
    }

    #[test]
    fn test_write_v3() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("out.nc");
        let ds = test_utils::time_series_dataset("urn:test:sensor:a", 3);
        let cfg = EncodingConfig::default();

        let dims = DimensionPlan::new(&ds, StationFeature::FixedTimeSeries, &cfg).unwrap();
        let vars = VariablePlan::new(&ds, &dims, &cfg, NetcdfVersion::V3).unwrap();
        let arrays = PopulatedArrays::new(&ds, &dims, &vars, &cfg);
        let globals = AttributeContext::new(&ds, &dims, &arrays, &cfg, None, Uuid::new_v4()).assemble();
        let contents = FileContents { dims: &dims, vars: &vars, arrays: &arrays, globals: &globals };
        write_netcdf_file(&path, NetcdfVersion::V3, &contents).unwrap();

        let nc = netcdf::open(&path).unwrap();
        assert_eq!(nc.dimension("time").unwrap().len(), 3);
        let temp = NcArray::get_from(&nc.variable("sea_water_temperature").unwrap()).unwrap();
        assert_eq!(temp, arrays.arrays["sea_water_temperature"]);
    }

    #[test]
    fn test_probe_leaves_nothing_behind() {
        let tmp = tempfile::tempdir().unwrap();
        probe_netcdf4(tmp.path()).unwrap();
        assert!(!tmp.path().join(PROBE_FILE_NAME).exists());
    }
}
