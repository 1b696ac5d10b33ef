//! Global Attribute Assembler.
//!
//! The file level attributes are built in independent sections, run in a
//! fixed order. A section that cannot be computed is logged and left out;
//! the others are still written.
use std::borrow::Cow;

use chrono::{DateTime, Utc};
use log::warn;
use uuid::Uuid;

use crate::{
    config::EncodingConfig,
    dataset::{DescriptionResolver, SensorDataset, SensorDescription},
    nc_utils::AttributeList,
    utils::{iso8601, iso8601_duration},
};

use super::{
    arrays::PopulatedArrays,
    contacts::{find_contact, Contact, ContactRole},
    dimensions::DimensionPlan,
    feature::StationFeature,
    variables::{PLATFORM_VAR, PROFILE_VAR},
};

pub const CF_CONVENTIONS: &str = "CF-1.6";
pub const METADATA_CONVENTIONS: &str = "Unidata Dataset Discovery v1.0";
pub const STANDARD_NAME_VOCABULARY: &str = "CF Standard Name Table v28";
const MMI_CF_PARAMETER_PREFIX: &str = "http://mmisw.org/ont/cf/parameter/";

#[derive(Debug, thiserror::Error)]
pub enum SectionError {
    #[error("dataset has no timestamps")]
    NoTimes,
    #[error("{0} is not a finite number ({1})")]
    NonFinite(&'static str, f64),
}

type Section = fn(&AttributeContext) -> Result<AttributeList, SectionError>;

const SECTIONS: [(&str, Section); 9] = [
    ("conventions", conventions),
    ("feature type", feature_type),
    ("spatial extent", spatial_extent),
    ("vertical extent", vertical_extent),
    ("temporal extent", temporal_extent),
    ("identification", identification),
    ("keywords", keywords),
    ("contacts", contacts),
    ("feature extension", feature_extension),
];

/// Everything the sections read from.
pub struct AttributeContext<'a> {
    pub dataset: &'a SensorDataset,
    pub dims: &'a DimensionPlan<'a>,
    pub arrays: &'a PopulatedArrays,
    pub config: &'a EncodingConfig,
    pub description: Option<Cow<'a, SensorDescription>>,
    pub file_uuid: Uuid,
    pub now: DateTime<Utc>,
}

impl<'a> AttributeContext<'a> {
    /// Set up the context for one file. If the dataset does not carry its own
    /// description, `resolver` is asked for one; a failure there is logged and
    /// the contacts fall back to the provider metadata.
    pub fn new(
        dataset: &'a SensorDataset,
        dims: &'a DimensionPlan<'a>,
        arrays: &'a PopulatedArrays,
        config: &'a EncodingConfig,
        resolver: Option<&dyn DescriptionResolver>,
        file_uuid: Uuid,
    ) -> Self {
        let description = resolve_description(dataset, resolver);
        Self { dataset, dims, arrays, config, description, file_uuid, now: Utc::now() }
    }

    /// Run every section in order and collect the results into one list.
    pub fn assemble(&self) -> AttributeList {
        let mut attrs = AttributeList::new();
        for (name, section) in SECTIONS {
            match section(self) {
                Ok(section_attrs) => attrs.extend(section_attrs),
                Err(e) => warn!("Omitting the {name} attributes for {}: {e}", self.dataset.sensor_id()),
            }
        }
        attrs
    }

    fn description(&self) -> Option<&SensorDescription> {
        self.description.as_deref()
    }
}

fn resolve_description<'a>(dataset: &'a SensorDataset, resolver: Option<&dyn DescriptionResolver>) -> Option<Cow<'a, SensorDescription>> {
    if let Some(desc) = dataset.description() {
        return Some(Cow::Borrowed(desc));
    }

    match resolver?.resolve(dataset.sensor_id()) {
        Ok(desc) => Some(Cow::Owned(desc)),
        Err(e) => {
            warn!("{e}; using the service provider metadata for contacts");
            None
        }
    }
}

fn conventions(_ctx: &AttributeContext) -> Result<AttributeList, SectionError> {
    Ok(AttributeList::new()
        .with("Conventions", CF_CONVENTIONS)
        .with("Metadata_Conventions", METADATA_CONVENTIONS)
        .with("standard_name_vocabulary", STANDARD_NAME_VOCABULARY))
}

fn feature_type(ctx: &AttributeContext) -> Result<AttributeList, SectionError> {
    let feature = ctx.dims.feature;
    Ok(AttributeList::new()
        .with("featureType", feature.feature_type())
        .with("cdm_data_type", feature.cdm_data_type())
        .with("nodc_template_version", feature.nodc_template_version()))
}

fn spatial_extent(ctx: &AttributeContext) -> Result<AttributeList, SectionError> {
    let lat = finite("latitude", ctx.dims.station.latitude)?;
    let lon = finite("longitude", ctx.dims.station.longitude)?;
    Ok(AttributeList::new()
        .with("geospatial_lat_min", lat)
        .with("geospatial_lat_max", lat)
        .with("geospatial_lat_units", "degrees_north")
        .with("geospatial_lon_min", lon)
        .with("geospatial_lon_max", lon)
        .with("geospatial_lon_units", "degrees_east"))
}

fn vertical_extent(ctx: &AttributeContext) -> Result<AttributeList, SectionError> {
    let extent = ctx.arrays.vertical_extent;
    let mut attrs = AttributeList::new()
        .with("geospatial_vertical_min", finite("vertical minimum", extent.min)?)
        .with("geospatial_vertical_max", finite("vertical maximum", extent.max)?)
        .with("geospatial_vertical_units", "m")
        .with("geospatial_vertical_positive", ctx.config.vertical_coordinate.positive());
    if let Some(res) = ctx.arrays.resolution.attribute_value() {
        attrs.push("geospatial_vertical_resolution", res);
    }
    Ok(attrs)
}

fn temporal_extent(ctx: &AttributeContext) -> Result<AttributeList, SectionError> {
    let times = ctx.dataset.sorted_times();
    let (start, end) = match (times.first(), times.last()) {
        (Some(s), Some(e)) => (s, e),
        _ => return Err(SectionError::NoTimes),
    };
    Ok(AttributeList::new()
        .with("time_coverage_start", iso8601(start))
        .with("time_coverage_end", iso8601(end))
        .with("time_coverage_duration", iso8601_duration(start, end)))
}

fn identification(ctx: &AttributeContext) -> Result<AttributeList, SectionError> {
    let sensor = ctx.dataset.sensor_id();
    let now = iso8601(&ctx.now);
    let summary = ctx.description()
        .and_then(|d| d.description.clone())
        .unwrap_or_else(|| generated_summary(ctx));

    let mut attrs = AttributeList::new()
        .with("id", sensor)
        .with("title", sensor)
        .with("uuid", ctx.file_uuid.to_string())
        .with("summary", summary);
    if !ctx.config.naming_authority.is_empty() {
        attrs.push("naming_authority", ctx.config.naming_authority.as_str());
    }
    attrs.push("date_created", now.as_str());
    attrs.push("date_modified", now.as_str());
    attrs.push("date_issued", now.as_str());
    attrs.push("license", ctx.config.license.as_str());
    attrs.push("history", format!("{now} created by {} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")));
    Ok(attrs)
}

fn generated_summary(ctx: &AttributeContext) -> String {
    let props = ctx.dataset.observed_properties()
        .iter()
        .map(|p| p.long_name())
        .collect::<Vec<_>>()
        .join(", ");
    let times = ctx.dataset.sorted_times();
    let span = match (times.first(), times.last()) {
        (Some(s), Some(e)) => format!(" from {} to {}", iso8601(s), iso8601(e)),
        _ => String::new(),
    };
    format!("{} observations of {props} by sensor {}{span}", ctx.dims.feature, ctx.dataset.sensor_id())
}

fn keywords(ctx: &AttributeContext) -> Result<AttributeList, SectionError> {
    let props = ctx.dataset.observed_properties();
    let mut attrs = AttributeList::new()
        .with("keywords", props.iter().map(|p| p.identifier.as_str()).collect::<Vec<_>>().join(", "));
    if !props.is_empty() && props.iter().all(|p| p.identifier.starts_with(MMI_CF_PARAMETER_PREFIX)) {
        attrs.push("keywords_vocabulary", STANDARD_NAME_VOCABULARY);
    }
    Ok(attrs)
}

fn contacts(ctx: &AttributeContext) -> Result<AttributeList, SectionError> {
    let mut attrs = Contact::from_provider(ctx.config).attributes("creator");
    attrs.extend(find_contact(ContactRole::Publisher, ctx.description(), ctx.config).attributes("publisher"));
    attrs.extend(find_contact(ContactRole::Contributor, ctx.description(), ctx.config).attributes("contributor"));
    Ok(attrs)
}

fn feature_extension(ctx: &AttributeContext) -> Result<AttributeList, SectionError> {
    let case = ctx.config.name_case;
    let attrs = match ctx.dims.feature {
        StationFeature::FixedTimeSeries => AttributeList::new()
            .with("cdm_timeseries_variables", case.apply(PLATFORM_VAR)),
        StationFeature::TimeSeriesProfile => AttributeList::new()
            .with("cdm_timeseries_variables", case.apply(PLATFORM_VAR))
            .with("cdm_profile_variables", case.apply(PROFILE_VAR)),
    };
    Ok(attrs.with("platform", case.apply(PLATFORM_VAR)))
}

fn finite(what: &'static str, v: f64) -> Result<f64, SectionError> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(SectionError::NonFinite(what, v))
    }
}
