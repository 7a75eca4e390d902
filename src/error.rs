use crate::location::GeocodeError;
use thiserror::Error;

/// Failures a forecast caller can see. A partial system failure is not one of
/// them: the result is still produced from the systems that succeeded.
#[derive(Error, Debug)]
pub enum ForecastError {
    #[error("Address not found: '{0}'. Please try a more specific address.")]
    LocationNotFound(String),
    #[error("{0}")]
    NetworkFailure(String),
    #[error("Forecast failed for all {attempted} PV system(s). Please try again later.")]
    AllSystemsFailed { attempted: usize },
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl From<GeocodeError> for ForecastError {
    fn from(err: GeocodeError) -> Self {
        ForecastError::NetworkFailure(format!("Geocoding failed: {}", err))
    }
}
