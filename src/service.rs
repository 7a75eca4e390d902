use crate::aggregate::{build_result, ForecastResult};
use crate::energy::{EnergyModel, PvSystemConfig};
use crate::error::ForecastError;
use crate::forecast::types::Coordinates;
use crate::forecast::{WeatherError, WeatherFetcher};
use crate::location::{LocationResolver, Place};
use futures_util::future::join_all;

pub const MAX_SYSTEMS: usize = 3;
pub const MIN_ADDRESS_CHARS: usize = 3;

/// Where a forecast is computed for.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationQuery {
    /// Free text, geocoded (through the cache) on every compute.
    Address(String),
    /// Previously confirmed coordinates, reused verbatim; the address is only a label.
    Locked(Place),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComputedForecast {
    pub place: Place,
    pub result: ForecastResult,
}

/// Resolve once, fan out per system (fetch + model), fan in, aggregate.
#[derive(Clone)]
pub struct ForecastService {
    resolver: LocationResolver,
    fetcher: WeatherFetcher,
}

impl ForecastService {
    pub fn new(resolver: LocationResolver, fetcher: WeatherFetcher) -> Self {
        Self { resolver, fetcher }
    }

    pub fn resolver(&self) -> &LocationResolver {
        &self.resolver
    }

    pub async fn locate(&self, query: &LocationQuery) -> Result<Place, ForecastError> {
        match query {
            LocationQuery::Locked(place) => {
                if !place.coordinates().is_valid() {
                    return Err(ForecastError::InvalidRequest(format!(
                        "Stored coordinates ({}, {}) are out of range",
                        place.latitude, place.longitude
                    )));
                }
                Ok(place.clone())
            }
            LocationQuery::Address(text) => {
                let text = text.trim();
                if text.chars().count() < MIN_ADDRESS_CHARS {
                    return Err(ForecastError::InvalidRequest(format!(
                        "Address must be at least {} characters",
                        MIN_ADDRESS_CHARS
                    )));
                }
                match self.resolver.resolve(text).await {
                    Ok(Some(place)) => Ok(place),
                    Ok(None) => Err(ForecastError::LocationNotFound(text.to_string())),
                    Err(e) => {
                        tracing::error!("Geocoding error for address '{}': {}", text, e);
                        Err(e.into())
                    }
                }
            }
        }
    }

    pub async fn compute(
        &self,
        query: &LocationQuery,
        systems: &[PvSystemConfig],
        model: EnergyModel,
    ) -> Result<ComputedForecast, ForecastError> {
        validate_systems(systems)?;
        let place = self.locate(query).await?;
        let location = place.coordinates();

        let outcomes = join_all(
            systems
                .iter()
                .map(|system| self.evaluate_system(location, system, model)),
        )
        .await;

        let mut contributions = Vec::with_capacity(systems.len());
        for (index, (system, outcome)) in systems.iter().zip(outcomes).enumerate() {
            match outcome {
                Ok(hourly) => contributions.push(hourly),
                Err(e) => tracing::warn!(
                    "Failed to process PV system {} ({} kWp, tilt {}, azimuth {}): {}",
                    index + 1,
                    system.power_kw,
                    system.inclination_deg,
                    system.azimuth_deg,
                    e
                ),
            }
        }

        if contributions.is_empty() {
            tracing::error!("All {} PV systems failed for {}", systems.len(), place.address);
            return Err(ForecastError::AllSystemsFailed {
                attempted: systems.len(),
            });
        }
        if contributions.len() < systems.len() {
            tracing::warn!(
                "Forecast for {} uses {} of {} PV systems",
                place.address,
                contributions.len(),
                systems.len()
            );
        }

        Ok(ComputedForecast {
            result: build_result(location, &contributions),
            place,
        })
    }

    async fn evaluate_system(
        &self,
        location: Coordinates,
        system: &PvSystemConfig,
        model: EnergyModel,
    ) -> Result<Vec<f64>, WeatherError> {
        let weather = self
            .fetcher
            .fetch(location, system.inclination_deg, system.azimuth_deg)
            .await?;
        Ok(model.hourly_energy(&weather, system))
    }
}

pub fn validate_systems(systems: &[PvSystemConfig]) -> Result<(), ForecastError> {
    if systems.is_empty() || systems.len() > MAX_SYSTEMS {
        return Err(ForecastError::InvalidRequest(format!(
            "Between 1 and {} PV systems are required, got {}",
            MAX_SYSTEMS,
            systems.len()
        )));
    }
    for (index, system) in systems.iter().enumerate() {
        system
            .validate()
            .map_err(|e| ForecastError::InvalidRequest(format!("PV system {}: {}", index + 1, e)))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{TtlCache, DEFAULT_TTL};
    use crate::forecast::types::{WeatherSeries, FORECAST_HOURS};
    use crate::forecast::WeatherProvider;
    use crate::location::{GeocodeError, Geocoder};
    use crate::store::KvStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    struct OnePlace;

    #[async_trait]
    impl Geocoder for OnePlace {
        async fn search(&self, query: &str, _limit: usize) -> Result<Vec<Place>, GeocodeError> {
            if query == "offline" {
                return Err(GeocodeError::ApiError("HTTP 503: down".to_string()));
            }
            if query == "Atlantis" {
                return Ok(Vec::new());
            }
            Ok(vec![Place {
                address: "Lyon, France".to_string(),
                latitude: 45.76,
                longitude: 4.84,
            }])
        }
    }

    /// Constant sun; fails for any tilt listed in `failing_tilts`.
    struct FlakyWeather {
        failing_tilts: Vec<f64>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl WeatherProvider for FlakyWeather {
        async fn hourly_series(
            &self,
            _location: Coordinates,
            tilt_deg: f64,
            _azimuth_deg: f64,
        ) -> Result<WeatherSeries, WeatherError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing_tilts.contains(&tilt_deg) {
                return Err(WeatherError::ApiError("HTTP 500: boom".to_string()));
            }
            Ok(WeatherSeries {
                irradiance_wm2: vec![800.0; FORECAST_HOURS],
                ambient_temp_c: vec![20.0; FORECAST_HOURS],
            })
        }
    }

    fn service(failing_tilts: Vec<f64>) -> (ForecastService, Arc<FlakyWeather>) {
        let cache = TtlCache::new(KvStore::memory(), DEFAULT_TTL);
        let weather = Arc::new(FlakyWeather {
            failing_tilts,
            calls: AtomicUsize::new(0),
        });
        let resolver = LocationResolver::new(Arc::new(OnePlace), cache.clone(), Duration::from_millis(300));
        let fetcher = WeatherFetcher::new(weather.clone(), cache);
        (ForecastService::new(resolver, fetcher), weather)
    }

    fn system(tilt: f64) -> PvSystemConfig {
        PvSystemConfig::new(5.0, tilt, 0.0)
    }

    #[tokio::test]
    async fn test_partial_failure_uses_survivors_only() {
        let (service, _) = service(vec![10.0, 20.0]);
        let query = LocationQuery::Address("Lyon".to_string());

        let degraded = service
            .compute(&query, &[system(10.0), system(20.0), system(30.0)], EnergyModel::default())
            .await
            .unwrap();
        let alone = service
            .compute(&query, &[system(30.0)], EnergyModel::default())
            .await
            .unwrap();

        assert_eq!(degraded.result, alone.result);
        assert_eq!(degraded.result.hourly_total_kwh.len(), FORECAST_HOURS);
        assert!((degraded.result.hourly_total_kwh[0] - 3.2).abs() < 0.011);
    }

    #[tokio::test]
    async fn test_all_systems_failed() {
        let (service, _) = service(vec![10.0, 20.0]);
        let err = service
            .compute(
                &LocationQuery::Address("Lyon".to_string()),
                &[system(10.0), system(20.0)],
                EnergyModel::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ForecastError::AllSystemsFailed { attempted: 2 }));
    }

    #[tokio::test]
    async fn test_systems_sum_per_hour() {
        let (service, weather) = service(vec![]);
        let query = LocationQuery::Address("Lyon".to_string());

        let one = service
            .compute(&query, &[system(30.0)], EnergyModel::default())
            .await
            .unwrap();
        let two = service
            .compute(&query, &[system(30.0), system(30.0)], EnergyModel::default())
            .await
            .unwrap();

        assert!((two.result.daily_totals_kwh[0] - 2.0 * one.result.daily_totals_kwh[0]).abs() < 0.011);
        // Same orientation: one provider call across both computes.
        assert_eq!(weather.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_locked_location_skips_geocoding() {
        let (service, _) = service(vec![]);
        let locked = Place {
            address: "my roof".to_string(),
            latitude: -33.87,
            longitude: 151.21,
        };

        let computed = service
            .compute(&LocationQuery::Locked(locked.clone()), &[system(30.0)], EnergyModel::default())
            .await
            .unwrap();

        assert_eq!(computed.place, locked);
        assert_eq!(computed.result.latitude, -33.87);
    }

    #[tokio::test]
    async fn test_location_errors() {
        let (service, _) = service(vec![]);
        let model = EnergyModel::default();

        let err = service
            .compute(&LocationQuery::Address("Atlantis".to_string()), &[system(30.0)], model)
            .await
            .unwrap_err();
        assert!(matches!(err, ForecastError::LocationNotFound(ref a) if a == "Atlantis"));

        let err = service
            .compute(&LocationQuery::Address("offline".to_string()), &[system(30.0)], model)
            .await
            .unwrap_err();
        assert!(matches!(err, ForecastError::NetworkFailure(_)));
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn test_request_validation() {
        let (service, weather) = service(vec![]);
        let query = LocationQuery::Address("Lyon".to_string());
        let model = EnergyModel::default();

        assert!(matches!(
            service.compute(&query, &[], model).await,
            Err(ForecastError::InvalidRequest(_))
        ));
        assert!(matches!(
            service.compute(&query, &vec![system(30.0); 4], model).await,
            Err(ForecastError::InvalidRequest(_))
        ));
        assert!(matches!(
            service.compute(&query, &[system(95.0)], model).await,
            Err(ForecastError::InvalidRequest(_))
        ));
        assert!(matches!(
            service.compute(&LocationQuery::Address("ab".to_string()), &[system(30.0)], model).await,
            Err(ForecastError::InvalidRequest(_))
        ));
        assert_eq!(weather.calls.load(Ordering::SeqCst), 0);
    }
}
