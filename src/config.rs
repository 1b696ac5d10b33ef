//! Process-wide encoder settings.
//!
//! The configuration is read once, normally from a TOML file, and then passed
//! by reference into every stage of the encoder. A minimal file looks like:
//!
//! ```toml
//! fill_value = -9999.9
//! precision = "float"
//! vertical_coordinate = "depth"
//! name_case = "lower"
//!
//! [provider]
//! name = "Example Ocean Observing System"
//! email = "data@example.org"
//! site = "https://example.org"
//! ```
//!
//! Any field left out keeps its default value. Fields can also be overridden
//! from the environment with the `OBSNC_` prefix, using a double underscore to
//! reach into tables, e.g. `OBSNC_PROVIDER__EMAIL=ops@example.org`.
use std::path::{Path, PathBuf};

use figment::{providers::{Env, Format, Serialized, Toml}, Figment};
use serde::{Deserialize, Serialize};

/// Numeric type used for the data and non-time axis variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum NumericPrecision {
    #[default]
    Float,
    Double,
}

/// Whether the vertical axis is written as height (positive up) or depth (positive down).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum VerticalCoordinate {
    #[default]
    Height,
    Depth,
}

impl VerticalCoordinate {
    /// Value of the CF `positive` attribute for this coordinate.
    pub fn positive(&self) -> &'static str {
        match self {
            VerticalCoordinate::Height => "up",
            VerticalCoordinate::Depth => "down",
        }
    }

    /// Convert a height (positive up, in meters) into this coordinate.
    ///
    /// Depth is the negated height, except that zero stays exactly zero
    /// (never `-0.0`).
    pub fn from_height(&self, height: f64) -> f64 {
        match self {
            VerticalCoordinate::Height => height,
            VerticalCoordinate::Depth if height == 0.0 => 0.0,
            VerticalCoordinate::Depth => -height,
        }
    }
}

/// Case applied to dimension and variable names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum NameCase {
    #[default]
    Lower,
    Upper,
}

impl NameCase {
    pub fn apply(&self, name: &str) -> String {
        match self {
            NameCase::Lower => name.to_lowercase(),
            NameCase::Upper => name.to_uppercase(),
        }
    }
}

/// netCDF format generation of the produced files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum NetcdfVersion {
    V3,
    #[default]
    V4,
}

/// Service level provider information, used when a sensor description has
/// no suitable publisher or contributor contact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProviderMetadata {
    pub name: String,
    pub email: String,
    pub site: String,
}

/// Role identifiers to look for in a sensor description's contacts before
/// trying the standard role vocabularies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RoleConfig {
    pub publisher: Option<String>,
    pub contributor: Option<String>,
}

/// Configuration for the netCDF encoder.
///
/// Users should see the [module level documentation](crate::config) for the
/// file format. This is read-only during an encode call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EncodingConfig {
    /// Value written to every array cell that has no measurement.
    pub fill_value: f64,
    pub precision: NumericPrecision,
    pub vertical_coordinate: VerticalCoordinate,
    pub name_case: NameCase,
    /// Chunk length along the time dimension, only used for netCDF-4 files.
    pub time_chunk_size: usize,
    /// If set, deflate level (1-9) applied to data variables in netCDF-4 files.
    pub deflate_level: Option<i32>,
    /// Format to use when the caller does not request one.
    pub default_version: NetcdfVersion,
    pub naming_authority: String,
    pub license: String,
    /// Directory under which per-call scratch directories are created.
    /// Defaults to the system temporary directory.
    pub scratch_root: Option<PathBuf>,
    pub provider: ProviderMetadata,
    pub roles: RoleConfig,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            fill_value: -9999.9,
            precision: NumericPrecision::default(),
            vertical_coordinate: VerticalCoordinate::default(),
            name_case: NameCase::default(),
            time_chunk_size: 1000,
            deflate_level: None,
            default_version: NetcdfVersion::default(),
            naming_authority: String::new(),
            license: "Freely Distributed".to_string(),
            scratch_root: None,
            provider: ProviderMetadata::default(),
            roles: RoleConfig::default(),
        }
    }
}

impl EncodingConfig {
    /// Load the configuration: defaults, then the TOML file (if given), then
    /// `OBSNC_` environment variables.
    pub fn load(toml_file: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(p) = toml_file {
            figment = figment.merge(Toml::file_exact(p));
        }
        figment
            .merge(Env::prefixed("OBSNC_").split("__"))
            .extract()
    }

    /// Parse a configuration from a TOML string on top of the defaults. The
    /// environment is not consulted.
    pub fn from_toml_str(s: &str) -> Result<Self, figment::Error> {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::string(s))
            .extract()
    }

    /// Fill value cast to the configured precision and back, i.e. exactly the
    /// value a reader will see in the file.
    pub fn stored_fill_value(&self) -> f64 {
        match self.precision {
            NumericPrecision::Float => self.fill_value as f32 as f64,
            NumericPrecision::Double => self.fill_value,
        }
    }
}
