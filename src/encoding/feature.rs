use crate::{dataset::CfFeatureType, error::EncodeError};

/// The feature types the encoder has netCDF templates for.
///
/// Every stage matches on this exhaustively, so supporting another feature
/// type means adding a variant here and handling it everywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum StationFeature {
    /// A fixed station with one implicit vertical level.
    #[strum(to_string = "timeSeries")]
    FixedTimeSeries,
    /// A fixed station observing a vertical profile at every time.
    #[strum(to_string = "timeSeriesProfile")]
    TimeSeriesProfile,
}

impl TryFrom<CfFeatureType> for StationFeature {
    type Error = EncodeError;

    fn try_from(value: CfFeatureType) -> Result<Self, Self::Error> {
        match value {
            CfFeatureType::TimeSeries => Ok(Self::FixedTimeSeries),
            CfFeatureType::TimeSeriesProfile => Ok(Self::TimeSeriesProfile),
            other => Err(EncodeError::UnsupportedFeatureType(other)),
        }
    }
}

impl StationFeature {
    /// Value of the CF `featureType` global attribute.
    pub fn feature_type(&self) -> &'static str {
        match self {
            StationFeature::FixedTimeSeries => "timeSeries",
            StationFeature::TimeSeriesProfile => "timeSeriesProfile",
        }
    }

    /// Value of the ACDD `cdm_data_type` global attribute.
    pub fn cdm_data_type(&self) -> &'static str {
        match self {
            StationFeature::FixedTimeSeries => "Station",
            StationFeature::TimeSeriesProfile => "Station",
        }
    }

    /// NODC template this file follows.
    pub fn nodc_template_version(&self) -> &'static str {
        match self {
            StationFeature::FixedTimeSeries => "NODC_NetCDF_TimeSeries_Orthogonal_Template_v1.1",
            StationFeature::TimeSeriesProfile => "NODC_NetCDF_TimeSeriesProfile_Orthogonal_Template_v1.1",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(CfFeatureType::Point)]
    #[case(CfFeatureType::Trajectory)]
    #[case(CfFeatureType::Profile)]
    #[case(CfFeatureType::TrajectoryProfile)]
    fn test_unsupported_feature_types(#[case] ft: CfFeatureType) {
        let err = StationFeature::try_from(ft).unwrap_err();
        assert!(matches!(err, EncodeError::UnsupportedFeatureType(f) if f == ft));
    }

    #[test]
    fn test_supported_feature_types() {
        let ts = StationFeature::try_from(CfFeatureType::TimeSeries).unwrap();
        assert_eq!(ts, StationFeature::FixedTimeSeries);
        assert_eq!(ts.feature_type(), "timeSeries");
        assert_eq!(ts.to_string(), "timeSeries");

        let tsp = StationFeature::try_from(CfFeatureType::TimeSeriesProfile).unwrap();
        assert_eq!(tsp.feature_type(), "timeSeriesProfile");
        assert_ne!(ts.nodc_template_version(), tsp.nodc_template_version());
    }
}
