pub mod config;
pub mod dataset;
pub mod encoding;
pub mod error;
pub mod logging;
pub mod nc_utils;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_utils;

pub use config::EncodingConfig;
pub use dataset::SensorDataset;
pub use encoding::{NetcdfArtifact, NetcdfEncoder};
pub use error::EncodeError;
