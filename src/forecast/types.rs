use serde::{Deserialize, Serialize};

pub const FORECAST_DAYS: usize = 7;
pub const HOURS_PER_DAY: usize = 24;
pub const FORECAST_HOURS: usize = FORECAST_DAYS * HOURS_PER_DAY;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Hourly plane-of-array irradiance and ambient temperature. Index 0 is the
/// first hour of the provider's forecast; day `d` covers `[24d, 24d + 24)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeatherSeries {
    pub irradiance_wm2: Vec<f64>,
    pub ambient_temp_c: Vec<f64>,
}

impl WeatherSeries {
    /// Number of hours for which both channels have a sample.
    pub fn len(&self) -> usize {
        self.irradiance_wm2.len().min(self.ambient_temp_c.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_complete(&self) -> bool {
        self.len() >= FORECAST_HOURS
    }
}

// Open-Meteo forecast response (only the fields we request)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenMeteoResponse {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub hourly: Option<OpenMeteoHourly>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenMeteoHourly {
    #[serde(default)]
    pub time: Vec<String>,
    pub global_tilted_irradiance: Option<Vec<Option<f64>>>,
    pub temperature_2m: Option<Vec<Option<f64>>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenMeteoErrorBody {
    pub reason: String,
}

// Nominatim search result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NominatimPlace {
    pub display_name: String,
    pub lat: String,
    pub lon: String,
}
