//! Common errors across the obsnc-rs crate

use std::fmt::Display;

use crate::dataset::CfFeatureType;

/// The broad class of an [`EncodeError`].
///
/// None of these are transient: each one means the request was malformed or
/// asked for a combination the encoder does not support, so callers should
/// not retry the same input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum ErrorKind {
    UnsupportedCardinality,
    UnsupportedFeatureType,
    UnsupportedGeometry,
    UnsupportedValueType,
    NativeLibraryUnavailable,
    Io,
}

/// Errors that abort an encode call.
///
/// These are normally wrapped in an [`error_stack::Report`], with the
/// underlying netCDF, I/O or ZIP error further down the stack.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    /// The single-file emitter was given something other than exactly one
    /// sensor of exactly one feature type, or an emitter got no datasets at all.
    #[error("Expected exactly one feature type and one sensor, got {feature_types} feature type(s) and {sensors} sensor(s) across {datasets} dataset(s)")]
    UnsupportedCardinality{feature_types: usize, sensors: usize, datasets: usize},

    /// The dataset's feature type has no netCDF template.
    #[error("Feature type '{0}' is not supported, only timeSeries and timeSeriesProfile can be encoded")]
    UnsupportedFeatureType(CfFeatureType),

    /// The dataset's shape cannot be expressed by the supported templates,
    /// e.g. a moving platform or a non-vertical sub-sensor.
    #[error("Sensor '{sensor}' has an unsupported geometry: {reason}")]
    UnsupportedGeometry{sensor: String, reason: String},

    /// A value for an observed property is not a floating point measurement.
    #[error("Sensor '{sensor}' has a {found} value for '{property}', only numeric quantities can be encoded")]
    UnsupportedValueType{sensor: String, property: String, found: &'static str},

    /// netCDF-4 output was requested but the linked netCDF library cannot create netCDF-4 files.
    #[error("netCDF-4 output was requested, but the native netCDF-4/HDF5 library is not available")]
    NativeLibraryUnavailable,

    /// An operating system or netCDF library failure. The contained string
    /// describes what the encoder was doing at the time.
    #[error("I/O failure while {0}")]
    Io(String),
}

impl EncodeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EncodeError::UnsupportedCardinality { .. } => ErrorKind::UnsupportedCardinality,
            EncodeError::UnsupportedFeatureType(_) => ErrorKind::UnsupportedFeatureType,
            EncodeError::UnsupportedGeometry { .. } => ErrorKind::UnsupportedGeometry,
            EncodeError::UnsupportedValueType { .. } => ErrorKind::UnsupportedValueType,
            EncodeError::NativeLibraryUnavailable => ErrorKind::NativeLibraryUnavailable,
            EncodeError::Io(_) => ErrorKind::Io,
        }
    }

    pub(crate) fn io<S: ToString>(doing: S) -> Self {
        Self::Io(doing.to_string())
    }

    pub(crate) fn geometry<S: ToString, R: ToString>(sensor: S, reason: R) -> Self {
        Self::UnsupportedGeometry { sensor: sensor.to_string(), reason: reason.to_string() }
    }
}

/// Failure to obtain a sensor description for the contact attributes.
///
/// This never aborts an encode; the global attribute assembler logs it and
/// falls back to the service provider metadata.
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("No description could be resolved for sensor '{0}'")]
    NotFound(String),
    #[error("Resolving the description of sensor '{sensor}' failed: {cause}")]
    ResolutionFailed{sensor: String, cause: String},
}

/// A short, stable description of the type of an observation value, used in error messages.
pub(crate) trait TypeLabel {
    fn type_label(&self) -> &'static str;
}

/// Wraps a count for a plural-aware message, e.g. "1 file" vs "2 files".
pub(crate) struct Plural<'a>(pub(crate) usize, pub(crate) &'a str);

impl<'a> Display for Plural<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0 == 1 {
            write!(f, "1 {}", self.1)
        } else {
            write!(f, "{} {}s", self.0, self.1)
        }
    }
}
