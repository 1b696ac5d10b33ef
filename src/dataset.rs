//! In-memory model of one sensor's observations of one feature type.
//!
//! A [`SensorDataset`] is assembled by the surrounding service (or read from a
//! [`DatasetDocument`] by the command line program) and is read-only to the
//! encoder. Construction goes through [`DatasetBuilder`], which enforces that
//! every stored value refers to a declared time, property and sub-sensor, so
//! the encoder never has to index outside those sets.
use std::collections::HashSet;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::error::{MetadataError, TypeLabel};

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("Dataset for sensor '{0}' has no timestamps")]
    NoTimes(String),
    #[error("Timestamp {0} is declared more than once")]
    DuplicateTime(DateTime<Utc>),
    #[error("Observed property '{0}' is declared more than once")]
    DuplicateProperty(String),
    #[error("Sub-sensor '{0}' is declared more than once")]
    DuplicateSubSensor(String),
    #[error("Value given for undeclared timestamp {0}")]
    UndeclaredTime(DateTime<Utc>),
    #[error("Value given for undeclared observed property '{0}'")]
    UndeclaredProperty(String),
    #[error("Value given for undeclared sub-sensor '{0}'")]
    UndeclaredSubSensor(String),
    #[error("Value for observed property '{0}' does not name a sub-sensor, but the dataset declares several")]
    MissingSubSensor(String),
}

/// CF discrete sampling geometry feature types.
///
/// Only [`CfFeatureType::TimeSeries`] and [`CfFeatureType::TimeSeriesProfile`]
/// can be encoded; the others exist so that requests for them can be rejected
/// with a clear error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum CfFeatureType {
    Point,
    TimeSeries,
    Trajectory,
    Profile,
    TimeSeriesProfile,
    TrajectoryProfile,
}

/// A phenomenon measured by the sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservedProperty {
    /// Identifier of the phenomenon, usually a URI such as
    /// `http://mmisw.org/ont/cf/parameter/sea_water_temperature`.
    pub identifier: String,
    /// Human readable name, used for the `long_name` attribute.
    #[serde(default)]
    pub name: Option<String>,
    /// Units all values of this property are expressed in.
    pub units: String,
    /// CF standard name. If not given, the last segment of the identifier is used.
    #[serde(default)]
    pub standard_name: Option<String>,
}

impl ObservedProperty {
    pub fn new<I: ToString, U: ToString>(identifier: I, units: U) -> Self {
        Self { identifier: identifier.to_string(), name: None, units: units.to_string(), standard_name: None }
    }

    pub fn with_name<S: ToString>(mut self, name: S) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_standard_name<S: ToString>(mut self, standard_name: S) -> Self {
        self.standard_name = Some(standard_name.to_string());
        self
    }

    /// The last path or fragment segment of the identifier, e.g.
    /// `sea_water_temperature` for `http://.../parameter/sea_water_temperature`.
    pub fn short_name(&self) -> &str {
        let trimmed = self.identifier.trim_end_matches(['/', '#', ':']);
        trimmed.rsplit(['/', '#', ':']).next().unwrap_or(trimmed)
    }

    pub fn standard_name(&self) -> &str {
        self.standard_name.as_deref().unwrap_or_else(|| self.short_name())
    }

    pub fn long_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.standard_name().replace('_', " "))
    }
}

/// One vertical level (or other component) of a profiling instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum SubSensor {
    /// A measurement taken at a single height, in meters (positive up).
    PointProfile{id: String, height: f64},
    /// A measurement averaged over a vertical bin centered on `height`,
    /// `bin_height` meters thick.
    BinProfile{id: String, height: f64, bin_height: f64},
    /// A sub-sensor that does not correspond to a vertical level.
    Other{id: String},
}

impl SubSensor {
    pub fn id(&self) -> &str {
        match self {
            SubSensor::PointProfile { id, .. } => id,
            SubSensor::BinProfile { id, .. } => id,
            SubSensor::Other { id } => id,
        }
    }

    pub fn height(&self) -> Option<f64> {
        match self {
            SubSensor::PointProfile { height, .. } => Some(*height),
            SubSensor::BinProfile { height, .. } => Some(*height),
            SubSensor::Other { .. } => None,
        }
    }

    pub fn bin_height(&self) -> Option<f64> {
        match self {
            SubSensor::BinProfile { bin_height, .. } => Some(*bin_height),
            _ => None,
        }
    }
}

/// A single observation result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservationValue {
    Quantity(f64),
    Count(i64),
    Boolean(bool),
    Text(String),
}

impl ObservationValue {
    pub fn as_quantity(&self) -> Option<f64> {
        if let Self::Quantity(v) = self {
            Some(*v)
        } else {
            None
        }
    }
}

impl TypeLabel for ObservationValue {
    fn type_label(&self) -> &'static str {
        match self {
            ObservationValue::Quantity(_) => "quantity",
            ObservationValue::Count(_) => "count",
            ObservationValue::Boolean(_) => "boolean",
            ObservationValue::Text(_) => "text",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StationLocation {
    pub latitude: f64,
    pub longitude: f64,
    /// Height of the station above the vertical datum, in meters.
    #[serde(default)]
    pub height: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionAt {
    pub time: DateTime<Utc>,
    #[serde(flatten)]
    pub location: StationLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetLocation {
    Fixed(StationLocation),
    Varying(Vec<PositionAt>),
}

/// A point of contact listed in a sensor description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponsibleParty {
    /// Role code, usually a URI from a role vocabulary.
    pub role: String,
    pub individual_name: Option<String>,
    pub organization_name: Option<String>,
    pub email: Option<String>,
    pub url: Option<String>,
}

impl ResponsibleParty {
    /// The organization if known, otherwise the person.
    pub fn display_name(&self) -> Option<&str> {
        self.organization_name.as_deref().or(self.individual_name.as_deref())
    }
}

/// The fields of an already parsed procedure description that the encoder uses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorDescription {
    pub long_name: Option<String>,
    pub description: Option<String>,
    pub contacts: Vec<ResponsibleParty>,
}

/// Something that can look up a sensor description when a dataset does not carry one.
pub trait DescriptionResolver {
    fn resolve(&self, sensor_id: &str) -> Result<SensorDescription, MetadataError>;
}

type ValuesBySubSensor = IndexMap<Option<String>, ObservationValue>;
type ValuesByProperty = IndexMap<String, ValuesBySubSensor>;

/// Observations from one sensor for one feature type.
#[derive(Debug, Clone)]
pub struct SensorDataset {
    sensor_id: String,
    feature_type: CfFeatureType,
    location: DatasetLocation,
    description: Option<SensorDescription>,
    times: Vec<DateTime<Utc>>,
    properties: Vec<ObservedProperty>,
    sub_sensors: Vec<SubSensor>,
    values: IndexMap<DateTime<Utc>, ValuesByProperty>,
}

impl SensorDataset {
    pub fn builder<S: ToString>(sensor_id: S, feature_type: CfFeatureType, location: DatasetLocation) -> DatasetBuilder {
        DatasetBuilder::new(sensor_id, feature_type, location)
    }

    pub fn sensor_id(&self) -> &str {
        &self.sensor_id
    }

    pub fn feature_type(&self) -> CfFeatureType {
        self.feature_type
    }

    pub fn location(&self) -> &DatasetLocation {
        &self.location
    }

    pub fn description(&self) -> Option<&SensorDescription> {
        self.description.as_ref()
    }

    /// Timestamps in declaration order.
    pub fn times(&self) -> &[DateTime<Utc>] {
        &self.times
    }

    /// Timestamps in ascending order; ties keep declaration order.
    pub fn sorted_times(&self) -> Vec<DateTime<Utc>> {
        let mut times = self.times.clone();
        times.sort();
        times
    }

    pub fn observed_properties(&self) -> &[ObservedProperty] {
        &self.properties
    }

    pub fn sub_sensors(&self) -> &[SubSensor] {
        &self.sub_sensors
    }

    /// Look up one value. `sub_sensor` is `None` for values of the sensor itself.
    pub fn value(&self, time: &DateTime<Utc>, property: &str, sub_sensor: Option<&str>) -> Option<&ObservationValue> {
        self.values.get(time)?
            .get(property)?
            .iter()
            .find_map(|(s, v)| (s.as_deref() == sub_sensor).then_some(v))
    }

    /// Iterate over every stored value as `(time, property identifier, sub-sensor id, value)`.
    pub fn iter_values(&self) -> impl Iterator<Item = (&DateTime<Utc>, &str, Option<&str>, &ObservationValue)> {
        self.values.iter().flat_map(|(t, by_prop)| {
            by_prop.iter().flat_map(move |(p, by_sub)| {
                by_sub.iter().map(move |(s, v)| (t, p.as_str(), s.as_deref(), v))
            })
        })
    }

    pub fn num_values(&self) -> usize {
        self.iter_values().count()
    }
}

/// Builder for [`SensorDataset`].
#[derive(Debug)]
pub struct DatasetBuilder {
    sensor_id: String,
    feature_type: CfFeatureType,
    location: DatasetLocation,
    description: Option<SensorDescription>,
    times: Vec<DateTime<Utc>>,
    properties: Vec<ObservedProperty>,
    sub_sensors: Vec<SubSensor>,
    values: Vec<(DateTime<Utc>, String, Option<String>, ObservationValue)>,
}

impl DatasetBuilder {
    pub fn new<S: ToString>(sensor_id: S, feature_type: CfFeatureType, location: DatasetLocation) -> Self {
        Self {
            sensor_id: sensor_id.to_string(),
            feature_type,
            location,
            description: None,
            times: vec![],
            properties: vec![],
            sub_sensors: vec![],
            values: vec![],
        }
    }

    pub fn description(mut self, description: SensorDescription) -> Self {
        self.description = Some(description);
        self
    }

    pub fn time(mut self, time: DateTime<Utc>) -> Self {
        self.times.push(time);
        self
    }

    pub fn times<I: IntoIterator<Item = DateTime<Utc>>>(mut self, times: I) -> Self {
        self.times.extend(times);
        self
    }

    pub fn property(mut self, property: ObservedProperty) -> Self {
        self.properties.push(property);
        self
    }

    pub fn sub_sensor(mut self, sub_sensor: SubSensor) -> Self {
        self.sub_sensors.push(sub_sensor);
        self
    }

    /// Add a value. A later value for the same (time, property, sub-sensor) replaces an earlier one.
    pub fn value<P: ToString>(mut self, time: DateTime<Utc>, property: P, sub_sensor: Option<&str>, value: ObservationValue) -> Self {
        self.values.push((time, property.to_string(), sub_sensor.map(|s| s.to_string()), value));
        self
    }

    pub fn quantity<P: ToString>(self, time: DateTime<Utc>, property: P, sub_sensor: Option<&str>, value: f64) -> Self {
        self.value(time, property, sub_sensor, ObservationValue::Quantity(value))
    }

    pub fn build(self) -> Result<SensorDataset, DatasetError> {
        if self.times.is_empty() {
            return Err(DatasetError::NoTimes(self.sensor_id));
        }

        if let Some(t) = self.times.iter().duplicates().next() {
            return Err(DatasetError::DuplicateTime(*t));
        }

        if let Some(p) = self.properties.iter().map(|p| p.identifier.as_str()).duplicates().next() {
            return Err(DatasetError::DuplicateProperty(p.to_string()));
        }

        if let Some(s) = self.sub_sensors.iter().map(|s| s.id()).duplicates().next() {
            return Err(DatasetError::DuplicateSubSensor(s.to_string()));
        }

        let known_times: HashSet<&DateTime<Utc>> = self.times.iter().collect();
        let known_props: HashSet<&str> = self.properties.iter().map(|p| p.identifier.as_str()).collect();
        let known_subs: HashSet<&str> = self.sub_sensors.iter().map(|s| s.id()).collect();

        let mut values: IndexMap<DateTime<Utc>, ValuesByProperty> = IndexMap::new();
        for (time, prop, sub, value) in self.values {
            if !known_times.contains(&time) {
                return Err(DatasetError::UndeclaredTime(time));
            }
            if !known_props.contains(prop.as_str()) {
                return Err(DatasetError::UndeclaredProperty(prop));
            }
            match &sub {
                Some(s) if !known_subs.contains(s.as_str()) => return Err(DatasetError::UndeclaredSubSensor(s.clone())),
                None if known_subs.len() > 1 => return Err(DatasetError::MissingSubSensor(prop)),
                _ => (),
            }

            values.entry(time)
                .or_default()
                .entry(prop)
                .or_default()
                .insert(sub, value);
        }

        Ok(SensorDataset {
            sensor_id: self.sensor_id,
            feature_type: self.feature_type,
            location: self.location,
            description: self.description,
            times: self.times,
            properties: self.properties,
            sub_sensors: self.sub_sensors,
            values,
        })
    }
}

/// One value in a [`DatasetDocument`].
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservationRecord {
    pub time: DateTime<Utc>,
    pub property: String,
    #[serde(default)]
    pub sub_sensor: Option<String>,
    pub value: ObservationValue,
}

/// Serialized form of a [`SensorDataset`], e.g.:
///
/// ```json
/// {
///   "sensor_id": "urn:ioos:sensor:example:station1:ctd",
///   "feature_type": "timeSeries",
///   "location": {"fixed": {"latitude": 44.5, "longitude": -124.1}},
///   "properties": [{"identifier": "http://mmisw.org/ont/cf/parameter/sea_water_temperature", "units": "degC"}],
///   "times": ["2024-05-01T00:00:00Z", "2024-05-01T01:00:00Z"],
///   "observations": [
///     {"time": "2024-05-01T00:00:00Z", "property": "http://mmisw.org/ont/cf/parameter/sea_water_temperature", "value": {"quantity": 11.2}}
///   ]
/// }
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DatasetDocument {
    pub sensor_id: String,
    pub feature_type: CfFeatureType,
    pub location: DatasetLocation,
    #[serde(default)]
    pub description: Option<SensorDescription>,
    pub properties: Vec<ObservedProperty>,
    #[serde(default)]
    pub sub_sensors: Vec<SubSensor>,
    pub times: Vec<DateTime<Utc>>,
    #[serde(default)]
    pub observations: Vec<ObservationRecord>,
}

impl TryFrom<DatasetDocument> for SensorDataset {
    type Error = DatasetError;

    fn try_from(doc: DatasetDocument) -> Result<Self, Self::Error> {
        let mut builder = DatasetBuilder::new(doc.sensor_id, doc.feature_type, doc.location)
            .times(doc.times);
        if let Some(desc) = doc.description {
            builder = builder.description(desc);
        }
        for prop in doc.properties {
            builder = builder.property(prop);
        }
        for sub in doc.sub_sensors {
            builder = builder.sub_sensor(sub);
        }
        for rec in doc.observations {
            builder = builder.value(rec.time, rec.property, rec.sub_sensor.as_deref(), rec.value);
        }
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    fn t(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap()
    }

    fn station() -> DatasetLocation {
        DatasetLocation::Fixed(StationLocation { latitude: 44.5, longitude: -124.1, height: None })
    }

    #[rstest]
    #[case("http://mmisw.org/ont/cf/parameter/sea_water_temperature", "sea_water_temperature")]
    #[case("urn:ogc:def:phenomenon:OGC:1.0.30:salinity", "salinity")]
    #[case("http://example.org/vocab#wind_speed", "wind_speed")]
    #[case("http://example.org/vocab/air_pressure/", "air_pressure")]
    #[case("turbidity", "turbidity")]
    fn test_property_short_name(#[case] identifier: &str, #[case] expected: &str) {
        let prop = ObservedProperty::new(identifier, "1");
        assert_eq!(prop.short_name(), expected);
        assert_eq!(prop.standard_name(), expected);
    }

    #[test]
    fn test_property_names() {
        let prop = ObservedProperty::new("http://mmisw.org/ont/cf/parameter/sea_water_temperature", "degC");
        assert_eq!(prop.long_name(), "sea water temperature");
        let prop = prop.with_name("Water temperature").with_standard_name("sea_water_temperature");
        assert_eq!(prop.long_name(), "Water temperature");
    }

    #[test]
    fn test_build_and_lookup() {
        let ds = SensorDataset::builder("sensor-1", CfFeatureType::TimeSeriesProfile, station())
            .times([t(2), t(0), t(1)])
            .property(ObservedProperty::new("temp", "degC"))
            .sub_sensor(SubSensor::PointProfile { id: "z1".to_string(), height: -1.0 })
            .quantity(t(0), "temp", Some("z1"), 10.0)
            .quantity(t(2), "temp", Some("z1"), 12.0)
            .build()
            .expect("dataset should be valid");

        assert_eq!(ds.times(), &[t(2), t(0), t(1)]);
        assert_eq!(ds.sorted_times(), vec![t(0), t(1), t(2)]);
        assert_eq!(ds.value(&t(0), "temp", Some("z1")), Some(&ObservationValue::Quantity(10.0)));
        assert_eq!(ds.value(&t(1), "temp", Some("z1")), None);
        assert_eq!(ds.value(&t(0), "temp", None), None);
        assert_eq!(ds.num_values(), 2);
    }

    #[test]
    fn test_rejects_undeclared_members() {
        let base = || SensorDataset::builder("s", CfFeatureType::TimeSeries, station())
            .time(t(0))
            .property(ObservedProperty::new("temp", "degC"));

        let err = base().quantity(t(1), "temp", None, 1.0).build().unwrap_err();
        assert!(matches!(err, DatasetError::UndeclaredTime(_)));

        let err = base().quantity(t(0), "salt", None, 1.0).build().unwrap_err();
        assert!(matches!(err, DatasetError::UndeclaredProperty(p) if p == "salt"));

        let err = base().quantity(t(0), "temp", Some("z9"), 1.0).build().unwrap_err();
        assert!(matches!(err, DatasetError::UndeclaredSubSensor(s) if s == "z9"));
    }

    #[test]
    fn test_rejects_unplaced_value_with_several_sub_sensors() {
        let base = || SensorDataset::builder("s", CfFeatureType::TimeSeriesProfile, station())
            .time(t(0))
            .property(ObservedProperty::new("temp", "degC"))
            .sub_sensor(SubSensor::PointProfile { id: "a".to_string(), height: -1.0 });

        // One sub-sensor: a value of the sensor itself still has a level to go to
        let ds = base().quantity(t(0), "temp", None, 5.0).build().expect("dataset should be valid");
        assert_eq!(ds.value(&t(0), "temp", None), Some(&ObservationValue::Quantity(5.0)));

        let err = base()
            .sub_sensor(SubSensor::PointProfile { id: "b".to_string(), height: -2.0 })
            .quantity(t(0), "temp", Some("a"), 4.0)
            .quantity(t(0), "temp", None, 5.0)
            .build()
            .unwrap_err();
        assert!(matches!(err, DatasetError::MissingSubSensor(p) if p == "temp"));
    }

    #[test]
    fn test_rejects_duplicates_and_empty() {
        let err = SensorDataset::builder("s", CfFeatureType::TimeSeries, station())
            .build().unwrap_err();
        assert!(matches!(err, DatasetError::NoTimes(_)));

        let err = SensorDataset::builder("s", CfFeatureType::TimeSeries, station())
            .times([t(0), t(0)])
            .build().unwrap_err();
        assert!(matches!(err, DatasetError::DuplicateTime(_)));

        let err = SensorDataset::builder("s", CfFeatureType::TimeSeries, station())
            .time(t(0))
            .property(ObservedProperty::new("temp", "degC"))
            .property(ObservedProperty::new("temp", "K"))
            .build().unwrap_err();
        assert!(matches!(err, DatasetError::DuplicateProperty(_)));
    }

    #[test]
    fn test_document_round_trip_from_json() {
        let json = r#"{
            "sensor_id": "urn:ioos:sensor:test:station1:adcp",
            "feature_type": "timeSeriesProfile",
            "location": {"fixed": {"latitude": 10.0, "longitude": 20.0, "height": 1.5}},
            "properties": [{"identifier": "http://mmisw.org/ont/cf/parameter/sea_water_speed", "units": "m s-1"}],
            "sub_sensors": [
                {"type": "bin_profile", "id": "bin1", "height": -1.0, "bin_height": 1.0},
                {"type": "point_profile", "id": "pt2", "height": -2.0}
            ],
            "times": ["2024-05-01T00:00:00Z"],
            "observations": [
                {"time": "2024-05-01T00:00:00Z", "property": "http://mmisw.org/ont/cf/parameter/sea_water_speed", "sub_sensor": "bin1", "value": {"quantity": 0.25}}
            ]
        }"#;
        let doc: DatasetDocument = serde_json::from_str(json).expect("document should deserialize");
        let ds = SensorDataset::try_from(doc).expect("document should be a valid dataset");
        assert_eq!(ds.feature_type(), CfFeatureType::TimeSeriesProfile);
        assert_eq!(ds.sub_sensors().len(), 2);
        assert_eq!(ds.sub_sensors()[0].bin_height(), Some(1.0));
        assert_eq!(ds.sub_sensors()[1].bin_height(), None);
        assert_eq!(
            ds.value(&t(0), "http://mmisw.org/ont/cf/parameter/sea_water_speed", Some("bin1")),
            Some(&ObservationValue::Quantity(0.25))
        );
    }

    #[test]
    fn test_feature_type_strings() {
        assert_eq!(CfFeatureType::TimeSeriesProfile.to_string(), "timeSeriesProfile");
        assert_eq!("timeSeries".parse::<CfFeatureType>().unwrap(), CfFeatureType::TimeSeries);
    }
}
