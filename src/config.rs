use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Lower bound for the suggestion quiet period. Shorter values would let
/// keystrokes through faster than the geocoding provider's usage policy allows.
pub const MIN_SUGGEST_DEBOUNCE_MS: u64 = 300;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WeatherProviderKind {
    OpenMeteo,
    Synthetic,
}

impl FromStr for WeatherProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "open-meteo" | "openmeteo" => Ok(Self::OpenMeteo),
            "synthetic" | "offline" => Ok(Self::Synthetic),
            other => Err(anyhow::anyhow!(
                "Unknown weather provider: '{}'. Supported: open-meteo, synthetic",
                other
            )),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub geocoder_base_url: String,
    pub weather_base_url: String,
    pub weather_forecast_path: String,
    pub http_user_agent: String,
    pub http_timeout_secs: u64,
    pub cache_ttl_secs: u64,
    pub suggest_debounce_ms: u64,
    pub weather_provider: WeatherProviderKind,
    pub bind_addr: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database_url: "sqlite:./pv_forecast.db?mode=rwc".to_string(),
            geocoder_base_url: "https://nominatim.openstreetmap.org".to_string(),
            weather_base_url: "https://api.open-meteo.com".to_string(),
            weather_forecast_path: "/v1/forecast".to_string(),
            http_user_agent: "pv_forecast_calculator".to_string(),
            http_timeout_secs: 30,
            cache_ttl_secs: 3600,
            suggest_debounce_ms: MIN_SUGGEST_DEBOUNCE_MS,
            weather_provider: WeatherProviderKind::OpenMeteo,
            bind_addr: "127.0.0.1:8000".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Config::default();

        Ok(Config {
            database_url: env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            geocoder_base_url: env::var("GEOCODER_BASE_URL")
                .unwrap_or(defaults.geocoder_base_url),
            weather_base_url: env::var("WEATHER_BASE_URL").unwrap_or(defaults.weather_base_url),
            weather_forecast_path: env::var("WEATHER_FORECAST_PATH")
                .unwrap_or(defaults.weather_forecast_path),
            http_user_agent: env::var("HTTP_USER_AGENT").unwrap_or(defaults.http_user_agent),
            http_timeout_secs: parse_var("HTTP_TIMEOUT_SECS", defaults.http_timeout_secs)?,
            cache_ttl_secs: parse_var("CACHE_TTL_SECS", defaults.cache_ttl_secs)?,
            suggest_debounce_ms: parse_var("SUGGEST_DEBOUNCE_MS", defaults.suggest_debounce_ms)?
                .max(MIN_SUGGEST_DEBOUNCE_MS),
            weather_provider: parse_var("WEATHER_PROVIDER", defaults.weather_provider)?,
            bind_addr: env::var("BIND_ADDR").unwrap_or(defaults.bind_addr),
        })
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn suggest_debounce(&self) -> Duration {
        Duration::from_millis(self.suggest_debounce_ms.max(MIN_SUGGEST_DEBOUNCE_MS))
    }
}

fn parse_var<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("{} has invalid value '{}': {}", name, raw, e)),
        Err(_) => Ok(default),
    }
}
