//! Photovoltaic energy forecasting: resolve a location, fetch hourly tilted
//! irradiance and temperature, model each PV system and aggregate a 7-day
//! hourly/daily kWh forecast.

pub mod aggregate;
pub mod cache;
pub mod config;
pub mod energy;
pub mod error;
pub mod forecast;
pub mod location;
pub mod routes;
pub mod service;
pub mod session;
pub mod store;
pub mod view;

pub use aggregate::ForecastResult;
pub use energy::{EnergyModel, PvSystemConfig};
pub use error::ForecastError;
pub use service::{ComputedForecast, ForecastService, LocationQuery};
