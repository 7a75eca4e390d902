//! What the presentation layer is looking at: the latest result and the
//! selected day within it.

use crate::aggregate::ForecastResult;
use serde::{Deserialize, Serialize};

pub const MAX_DAY_OFFSET: i32 = 6;

/// Selected day relative to the forecast's first day, kept within ±6.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayCursor {
    offset: i32,
}

impl DayCursor {
    pub fn offset(&self) -> i32 {
        self.offset
    }

    /// Moves by `delta` days. A move that would leave the range is ignored.
    pub fn navigate(&mut self, delta: i32) -> bool {
        match self.offset.checked_add(delta) {
            Some(target) if (-MAX_DAY_OFFSET..=MAX_DAY_OFFSET).contains(&target) => {
                self.offset = target;
                true
            }
            _ => false,
        }
    }

    pub fn previous(&mut self) -> bool {
        self.navigate(-1)
    }

    pub fn next(&mut self) -> bool {
        self.navigate(1)
    }

    pub fn reset(&mut self) {
        self.offset = 0;
    }
}

#[derive(Debug, Clone, Default)]
pub struct ViewState {
    result: Option<ForecastResult>,
    cursor: DayCursor,
}

impl ViewState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the displayed result and returns to the first day.
    pub fn show(&mut self, result: ForecastResult) {
        self.result = Some(result);
        self.cursor.reset();
    }

    pub fn result(&self) -> Option<&ForecastResult> {
        self.result.as_ref()
    }

    pub fn cursor(&self) -> DayCursor {
        self.cursor
    }

    pub fn cursor_mut(&mut self) -> &mut DayCursor {
        &mut self.cursor
    }

    /// Hourly values of the selected day. Offsets before the first forecast
    /// day have no data.
    pub fn selected_day(&self) -> Option<&[f64]> {
        let day = usize::try_from(self.cursor.offset()).ok()?;
        self.result.as_ref()?.day_hours(day)
    }

    pub fn selected_day_total(&self) -> Option<f64> {
        let day = usize::try_from(self.cursor.offset()).ok()?;
        self.result.as_ref()?.daily_totals_kwh.get(day).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::build_result;
    use crate::forecast::types::{Coordinates, FORECAST_HOURS};

    #[test]
    fn test_navigation_stops_at_both_bounds() {
        let mut cursor = DayCursor::default();
        for _ in 0..6 {
            assert!(cursor.previous());
        }
        assert_eq!(cursor.offset(), -MAX_DAY_OFFSET);
        assert!(!cursor.previous());
        assert_eq!(cursor.offset(), -MAX_DAY_OFFSET);

        cursor.reset();
        for _ in 0..6 {
            assert!(cursor.next());
        }
        assert_eq!(cursor.offset(), MAX_DAY_OFFSET);
        assert!(!cursor.next());
        assert_eq!(cursor.offset(), MAX_DAY_OFFSET);
    }

    #[test]
    fn test_back_six_forward_seven_lands_one_past_start() {
        // The lower bound is -6, so none of the seven forward steps is clamped.
        let mut cursor = DayCursor::default();
        for _ in 0..6 {
            cursor.previous();
        }
        for _ in 0..7 {
            assert!(cursor.next());
        }
        assert_eq!(cursor.offset(), 1);
    }

    #[test]
    fn test_out_of_range_jump_is_noop() {
        let mut cursor = DayCursor::default();
        assert!(cursor.navigate(4));
        assert!(!cursor.navigate(3));
        assert_eq!(cursor.offset(), 4);
        assert!(!cursor.navigate(i32::MIN));
        assert_eq!(cursor.offset(), 4);
    }

    #[test]
    fn test_selected_day_slice() {
        let hourly: Vec<f64> = (0..FORECAST_HOURS).map(|h| (h / 24) as f64).collect();
        let mut view = ViewState::new();
        assert_eq!(view.selected_day(), None);

        view.show(build_result(Coordinates::new(0.0, 0.0), &[hourly]));
        view.cursor_mut().navigate(3);
        assert_eq!(view.selected_day(), Some(&[3.0; 24][..]));
        assert_eq!(view.selected_day_total(), Some(72.0));

        view.cursor_mut().navigate(-5);
        assert_eq!(view.selected_day(), None);
        assert_eq!(view.selected_day_total(), None);
    }

    #[test]
    fn test_new_result_resets_cursor() {
        let mut view = ViewState::new();
        view.cursor_mut().navigate(2);
        view.show(build_result(Coordinates::new(0.0, 0.0), &[]));
        assert_eq!(view.cursor().offset(), 0);
    }
}
