use crate::forecast::types::{Coordinates, FORECAST_DAYS, FORECAST_HOURS, HOURS_PER_DAY};
use serde::{Deserialize, Serialize};

/// Result of one forecast computation. Replaced wholesale by the next compute.
///
/// `daily_totals_kwh` is summed from unrounded hourly values and rounded on its
/// own, so it can differ from the sum of the rounded hourly view by a few
/// hundredths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(rename = "hourly_forecast_kwh")]
    pub hourly_total_kwh: Vec<f64>,
    pub daily_totals_kwh: Vec<f64>,
    #[serde(rename = "total_daily_kwh")]
    pub primary_day_total_kwh: f64,
}

impl ForecastResult {
    /// The 24 hourly values of day `day` (0 = first forecast day).
    pub fn day_hours(&self, day: usize) -> Option<&[f64]> {
        if day >= FORECAST_DAYS {
            return None;
        }
        let start = day * HOURS_PER_DAY;
        self.hourly_total_kwh.get(start..start + HOURS_PER_DAY)
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Fits one system's output onto the forecast grid: missing trailing hours are
/// zero, surplus hours are dropped.
pub fn fit_to_horizon(series: &[f64]) -> Vec<f64> {
    let mut hours = vec![0.0; FORECAST_HOURS];
    for (slot, value) in hours.iter_mut().zip(series) {
        *slot = *value;
    }
    hours
}

/// Elementwise sum of per-system contributions over the full horizon.
pub fn sum_contributions<'a, I>(contributions: I) -> Vec<f64>
where
    I: IntoIterator<Item = &'a [f64]>,
{
    let mut total = vec![0.0; FORECAST_HOURS];
    for series in contributions {
        for (slot, value) in total.iter_mut().zip(fit_to_horizon(series)) {
            *slot += value;
        }
    }
    total
}

/// Unrounded per-day sums; day `d` covers hours `[24d, 24d + 24)`.
pub fn daily_sums(hourly: &[f64]) -> Vec<f64> {
    (0..FORECAST_DAYS)
        .map(|day| {
            let start = (day * HOURS_PER_DAY).min(hourly.len());
            let end = (start + HOURS_PER_DAY).min(hourly.len());
            hourly[start..end].iter().sum()
        })
        .collect()
}

pub fn build_result(location: Coordinates, contributions: &[Vec<f64>]) -> ForecastResult {
    let hourly = sum_contributions(contributions.iter().map(Vec::as_slice));
    let daily: Vec<f64> = daily_sums(&hourly).into_iter().map(round2).collect();

    ForecastResult {
        latitude: location.latitude,
        longitude: location.longitude,
        hourly_total_kwh: hourly.into_iter().map(round2).collect(),
        primary_day_total_kwh: daily.first().copied().unwrap_or(0.0),
        daily_totals_kwh: daily,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn here() -> Coordinates {
        Coordinates::new(41.39, 2.17)
    }

    #[test]
    fn test_daily_total_uses_unrounded_hours() {
        // 24 × 0.004 rounds to 0.0 per hour but sums to 0.096 → 0.1 for the day.
        let system = vec![0.004; FORECAST_HOURS];
        let result = build_result(here(), &[system]);

        assert!(result.hourly_total_kwh.iter().all(|&h| h == 0.0));
        assert_eq!(result.daily_totals_kwh, vec![0.1; FORECAST_DAYS]);
        assert_eq!(result.primary_day_total_kwh, 0.1);
    }

    #[test]
    fn test_daily_matches_hourly_within_rounding() {
        let system: Vec<f64> = (0..FORECAST_HOURS)
            .map(|h| ((h % 24) as f64 * 0.137).sin().abs() * 1.2345)
            .collect();
        let result = build_result(here(), &[system.clone()]);

        for day in 0..FORECAST_DAYS {
            let raw: f64 = system[day * 24..day * 24 + 24].iter().sum();
            assert_eq!(result.daily_totals_kwh[day], round2(raw));
            let from_rounded: f64 = result.day_hours(day).unwrap().iter().sum();
            assert!((from_rounded - result.daily_totals_kwh[day]).abs() <= 0.13);
        }
    }

    #[test]
    fn test_short_and_long_series_fit_the_horizon() {
        let short = vec![1.0; 30];
        let long = vec![2.0; FORECAST_HOURS + 12];
        let result = build_result(here(), &[short, long]);

        assert_eq!(result.hourly_total_kwh.len(), FORECAST_HOURS);
        assert_eq!(result.hourly_total_kwh[29], 3.0);
        assert_eq!(result.hourly_total_kwh[30], 2.0);
        assert_eq!(result.daily_totals_kwh[0], 72.0);
        assert_eq!(result.daily_totals_kwh[1], 54.0);
    }

    #[test]
    fn test_no_contributions_is_all_zero_grid() {
        let result = build_result(here(), &[]);
        assert_eq!(result.hourly_total_kwh, vec![0.0; FORECAST_HOURS]);
        assert_eq!(result.daily_totals_kwh, vec![0.0; FORECAST_DAYS]);
    }

    #[test]
    fn test_day_hours_bounds() {
        let result = build_result(here(), &[vec![1.0; FORECAST_HOURS]]);
        assert_eq!(result.day_hours(6).map(<[f64]>::len), Some(24));
        assert_eq!(result.day_hours(7), None);
    }

    #[test]
    fn test_wire_field_names() {
        let result = build_result(here(), &[vec![0.5; FORECAST_HOURS]]);
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("hourly_forecast_kwh").is_some());
        assert!(json.get("daily_totals_kwh").is_some());
        assert_eq!(json["total_daily_kwh"], 12.0);
    }
}
