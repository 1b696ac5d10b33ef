//! The netCDF encoding pipeline.
//!
//! Each dataset flows forward through the stages: the [`dimensions`] are
//! planned, the [`variables`] defined, the [`arrays`] populated, the global
//! [`attributes`] assembled, and finally the [`emitter`] has the [`writer`]
//! put it all in a file. No stage reads back from a later one.
pub mod arrays;
pub mod attributes;
pub mod contacts;
pub mod dimensions;
pub mod emitter;
pub mod feature;
pub mod variables;
pub(crate) mod writer;

pub use emitter::{ContentType, NetcdfArtifact, NetcdfEncoder};
pub use feature::StationFeature;
