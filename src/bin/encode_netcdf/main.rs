use std::{
    path::{Path, PathBuf},
    process::ExitCode,
};

use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use error_stack::ResultExt;
use obsnc_rs::{
    config::{EncodingConfig, NetcdfVersion},
    dataset::{DatasetDocument, SensorDataset},
    logging::init_logging,
    NetcdfEncoder,
};

fn main() -> ExitCode {
    let clargs = Cli::parse();

    if let Err(e) = init_logging(clargs.verbosity.log_level_filter()) {
        eprintln!("Could not set up logging: {e}");
    }

    match driver(clargs) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            eprintln!("encode_netcdf did not complete successfully:\n{e:?}");
            ExitCode::FAILURE
        }
    }
}

/// Encode sensor observation datasets (JSON) into a CF/ACDD netCDF file or a ZIP of them.
#[derive(Debug, clap::Parser)]
struct Cli {
    /// Dataset JSON files, one sensor and feature type each.
    #[clap(required = true)]
    datasets: Vec<PathBuf>,

    /// TOML configuration file. Settings can also be given as
    /// OBSNC_* environment variables.
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// netCDF format version; defaults to the configured one.
    #[clap(short, long)]
    format: Option<NetcdfVersion>,

    /// Produce a ZIP archive with one netCDF file per dataset. Required
    /// when more than one dataset is given.
    #[clap(short, long)]
    zip: bool,

    /// Directory to write the output to.
    #[clap(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Print the loaded configuration and stop.
    #[clap(long)]
    check_config_only: bool,

    #[command(flatten)]
    verbosity: Verbosity<InfoLevel>,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("An error occurred while reading the configuration")]
    ReadingConfig,
    #[error("An error occurred while reading the dataset file {}", .0.display())]
    ReadingDataset(PathBuf),
    #[error("An error occurred while encoding the datasets")]
    Encoding,
    #[error("An error occurred while writing the output to {}", .0.display())]
    WritingOutput(PathBuf),
}

fn driver(clargs: Cli) -> error_stack::Result<(), CliError> {
    let config = EncodingConfig::load(clargs.config.as_deref())
        .change_context(CliError::ReadingConfig)?;

    if clargs.check_config_only {
        println!("Loaded configuration:\n{config:#?}");
        return Ok(());
    }

    let datasets = clargs.datasets.iter()
        .map(|p| load_dataset(p))
        .collect::<Result<Vec<_>, _>>()?;
    log::info!("Loaded {} dataset(s)", datasets.len());

    let encoder = NetcdfEncoder::new(&config);
    let artifact = if clargs.zip {
        encoder.encode_archive(&datasets, clargs.format)
    } else {
        encoder.encode_single(&datasets, clargs.format)
    }.change_context(CliError::Encoding)?;

    log::info!("Writing {} ({})", artifact.filename(), artifact.content_type());
    let path = artifact.write_to_dir(&clargs.output_dir)
        .change_context_lazy(|| CliError::WritingOutput(clargs.output_dir.clone()))?;
    log::info!("Wrote {}", path.display());
    Ok(())
}

fn load_dataset(path: &Path) -> error_stack::Result<SensorDataset, CliError> {
    let f = std::fs::File::open(path)
        .change_context_lazy(|| CliError::ReadingDataset(path.to_path_buf()))?;
    let doc: DatasetDocument = serde_json::from_reader(std::io::BufReader::new(f))
        .change_context_lazy(|| CliError::ReadingDataset(path.to_path_buf()))?;
    let ds = SensorDataset::try_from(doc)
        .change_context_lazy(|| CliError::ReadingDataset(path.to_path_buf()))?;
    log::debug!("{} holds {} values for sensor {}", path.display(), ds.num_values(), ds.sensor_id());
    Ok(ds)
}
