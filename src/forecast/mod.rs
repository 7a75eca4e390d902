pub mod openmeteo;
pub mod synthetic;
pub mod types;

use crate::cache::{TtlCache, WEATHER_PREFIX};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use types::*;

#[derive(Error, Debug)]
pub enum WeatherError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    #[error("JSON parsing failed: {0}")]
    JsonParsing(#[from] serde_json::Error),
    #[error("Rate limited by weather provider")]
    RateLimited,
    #[error("API error: {0}")]
    ApiError(String),
    #[error("Invalid coordinates")]
    InvalidCoordinates,
    #[error("Response is missing hourly variable '{0}'")]
    MissingVariable(&'static str),
}

/// Source of hourly irradiance/temperature for one panel orientation.
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn hourly_series(
        &self,
        location: Coordinates,
        tilt_deg: f64,
        azimuth_deg: f64,
    ) -> Result<WeatherSeries, WeatherError>;
}

/// Weather lookups memoized per (latitude, longitude, tilt, azimuth).
///
/// Power rating is not part of the key, so arrays sharing an orientation share
/// one provider call.
#[derive(Clone)]
pub struct WeatherFetcher {
    provider: Arc<dyn WeatherProvider>,
    cache: TtlCache,
}

impl WeatherFetcher {
    pub fn new(provider: Arc<dyn WeatherProvider>, cache: TtlCache) -> Self {
        Self { provider, cache }
    }

    pub fn cache_key(location: Coordinates, tilt_deg: f64, azimuth_deg: f64) -> String {
        format!(
            "{}{}:{}:{}:{}",
            WEATHER_PREFIX, location.latitude, location.longitude, tilt_deg, azimuth_deg
        )
    }

    pub async fn fetch(
        &self,
        location: Coordinates,
        tilt_deg: f64,
        azimuth_deg: f64,
    ) -> Result<WeatherSeries, WeatherError> {
        if !location.is_valid() {
            return Err(WeatherError::InvalidCoordinates);
        }

        let key = Self::cache_key(location, tilt_deg, azimuth_deg);
        if let Some(series) = self.cache.get::<WeatherSeries>(&key).await {
            return Ok(series);
        }

        let series = self
            .provider
            .hourly_series(location, tilt_deg, azimuth_deg)
            .await?;
        if !series.is_complete() {
            tracing::warn!(
                "Weather series for {} has {} of {} hours; missing hours count as zero",
                key,
                series.len(),
                FORECAST_HOURS
            );
        }

        self.cache.set_default(&key, &series).await;
        Ok(series)
    }
}
