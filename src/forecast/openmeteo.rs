use super::types::*;
use super::{WeatherError, WeatherProvider};
use crate::config::Config;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

const HOURLY_VARIABLES: &str = "global_tilted_irradiance,temperature_2m";

pub struct OpenMeteoClient {
    client: Client,
    base_url: String,
    forecast_path: String,
}

impl OpenMeteoClient {
    pub fn new(config: &Config) -> Result<Self, WeatherError> {
        let client = Client::builder()
            .user_agent(config.http_user_agent.clone())
            .timeout(config.http_timeout())
            .build()?;

        Ok(Self {
            client,
            base_url: config.weather_base_url.trim_end_matches('/').to_string(),
            forecast_path: config.weather_forecast_path.clone(),
        })
    }

    pub async fn get_hourly(
        &self,
        location: Coordinates,
        tilt_deg: f64,
        azimuth_deg: f64,
    ) -> Result<WeatherSeries, WeatherError> {
        if !location.is_valid() {
            return Err(WeatherError::InvalidCoordinates);
        }

        let url = format!("{}{}", self.base_url, self.forecast_path);
        let response = self
            .make_request(&url, &[
                ("latitude", location.latitude.to_string()),
                ("longitude", location.longitude.to_string()),
                ("hourly", HOURLY_VARIABLES.to_string()),
                ("forecast_days", FORECAST_DAYS.to_string()),
                ("tilt", tilt_deg.to_string()),
                ("azimuth", azimuth_deg.to_string()),
            ])
            .await?;

        let forecast: OpenMeteoResponse = serde_json::from_value(response)?;
        series_from_response(forecast)
    }

    async fn make_request(&self, url: &str, params: &[(&str, String)]) -> Result<Value, WeatherError> {
        tracing::debug!("Requesting weather from {}", url);
        let response = self.client.get(url).query(params).send().await?;

        match response.status() {
            reqwest::StatusCode::OK => Ok(response.json().await?),
            reqwest::StatusCode::TOO_MANY_REQUESTS => {
                tracing::warn!("Rate limited by weather provider");
                Err(WeatherError::RateLimited)
            }
            status => {
                let error_text = response.text().await.unwrap_or_default();
                let reason = serde_json::from_str::<OpenMeteoErrorBody>(&error_text)
                    .map(|body| body.reason)
                    .unwrap_or(error_text);
                Err(WeatherError::ApiError(format!("HTTP {}: {}", status, reason)))
            }
        }
    }
}

#[async_trait]
impl WeatherProvider for OpenMeteoClient {
    async fn hourly_series(
        &self,
        location: Coordinates,
        tilt_deg: f64,
        azimuth_deg: f64,
    ) -> Result<WeatherSeries, WeatherError> {
        self.get_hourly(location, tilt_deg, azimuth_deg).await
    }
}

fn series_from_response(response: OpenMeteoResponse) -> Result<WeatherSeries, WeatherError> {
    let hourly = response.hourly.ok_or(WeatherError::MissingVariable("hourly"))?;
    let irradiance = hourly
        .global_tilted_irradiance
        .ok_or(WeatherError::MissingVariable("global_tilted_irradiance"))?;
    let temperature = hourly
        .temperature_2m
        .ok_or(WeatherError::MissingVariable("temperature_2m"))?;

    // Null samples (provider gaps) contribute nothing.
    Ok(WeatherSeries {
        irradiance_wm2: irradiance.into_iter().map(|v| v.unwrap_or(0.0)).collect(),
        ambient_temp_c: temperature.into_iter().map(|v| v.unwrap_or(0.0)).collect(),
    })
}
