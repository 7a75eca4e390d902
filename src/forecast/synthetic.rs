use super::types::*;
use super::{WeatherError, WeatherProvider};
use async_trait::async_trait;
use std::f64::consts::PI;

/// Offline weather: a deterministic clear-sky-like week.
///
/// Irradiance follows a half-sine between 06:00 and 18:00, scaled by how well
/// the panel faces the equator and by a per-day cloud factor drawn from a
/// seeded generator. Same inputs always give the same series.
#[derive(Debug, Default, Clone, Copy)]
pub struct SyntheticWeather;

impl SyntheticWeather {
    pub fn new() -> Self {
        Self
    }

    pub fn generate(&self, location: Coordinates, tilt_deg: f64, azimuth_deg: f64) -> WeatherSeries {
        let abs_lat = location.latitude.abs();
        // Best tilt is roughly the latitude; facing away from the equator costs up to half.
        let tilt_factor = ((tilt_deg - abs_lat) * PI / 180.0).cos().max(0.2);
        let facing_factor = 0.75 + 0.25 * (azimuth_deg * PI / 180.0).cos();
        let peak = 1000.0 * (1.0 - abs_lat / 180.0) * tilt_factor * facing_factor;

        let mut irradiance_wm2 = Vec::with_capacity(FORECAST_HOURS);
        let mut ambient_temp_c = Vec::with_capacity(FORECAST_HOURS);

        for day in 0..FORECAST_DAYS {
            let mut rng = fastrand::Rng::with_seed(day_seed(location, day));
            let cloud_factor = 0.55 + 0.45 * rng.f64();
            let mean_temp = 24.0 - abs_lat * 0.25 + 4.0 * (rng.f64() - 0.5);

            for hour in 0..HOURS_PER_DAY {
                let h = hour as f64;
                let sun = if (6..18).contains(&hour) {
                    (PI * (h - 6.0) / 12.0).sin()
                } else {
                    0.0
                };
                irradiance_wm2.push(peak * cloud_factor * sun);
                ambient_temp_c.push(mean_temp + 6.0 * (PI * (h - 9.0) / 12.0).sin());
            }
        }

        WeatherSeries {
            irradiance_wm2,
            ambient_temp_c,
        }
    }
}

#[async_trait]
impl WeatherProvider for SyntheticWeather {
    async fn hourly_series(
        &self,
        location: Coordinates,
        tilt_deg: f64,
        azimuth_deg: f64,
    ) -> Result<WeatherSeries, WeatherError> {
        if !location.is_valid() {
            return Err(WeatherError::InvalidCoordinates);
        }
        Ok(self.generate(location, tilt_deg, azimuth_deg))
    }
}

fn day_seed(location: Coordinates, day: usize) -> u64 {
    let lat = (location.latitude * 1000.0).round() as i64 as u64;
    let lon = (location.longitude * 1000.0).round() as i64 as u64;
    lat.wrapping_mul(31)
        .wrapping_add(lon)
        .wrapping_mul(1_000_003)
        .wrapping_add(day as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_week_is_generated() {
        let series = SyntheticWeather.generate(Coordinates::new(45.0, 7.0), 30.0, 0.0);
        assert_eq!(series.len(), FORECAST_HOURS);
        assert!(series.is_complete());
    }

    #[test]
    fn test_nights_are_dark() {
        let series = SyntheticWeather.generate(Coordinates::new(45.0, 7.0), 30.0, 0.0);
        for day in 0..FORECAST_DAYS {
            assert_eq!(series.irradiance_wm2[day * 24 + 2], 0.0);
            assert_eq!(series.irradiance_wm2[day * 24 + 22], 0.0);
            assert!(series.irradiance_wm2[day * 24 + 12] > 0.0);
        }
    }

    #[test]
    fn test_deterministic() {
        let here = Coordinates::new(-33.9, 18.4);
        assert_eq!(
            SyntheticWeather.generate(here, 20.0, 180.0),
            SyntheticWeather.generate(here, 20.0, 180.0)
        );
    }

    #[test]
    fn test_equator_facing_beats_pole_facing() {
        let here = Coordinates::new(50.0, 8.0);
        let south: f64 = SyntheticWeather.generate(here, 35.0, 0.0).irradiance_wm2.iter().sum();
        let north: f64 = SyntheticWeather.generate(here, 35.0, 180.0).irradiance_wm2.iter().sum();
        assert!(south > north);
    }
}
