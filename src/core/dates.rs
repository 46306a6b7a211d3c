//! Calendar helpers for weekly forecast targets.

use chrono::{Datelike, Duration, NaiveDate};

/// Days in the trailing submission window, excluding the forecast date itself.
pub const WINDOW_DAYS: i64 = 6;

/// Most recent Saturday on or before `date`.
pub fn last_saturday(date: NaiveDate) -> NaiveDate {
    let days_back = (date.weekday().num_days_from_sunday() + 1) % 7;
    date - Duration::days(days_back as i64)
}

/// Saturday that ends the epidemiological week `horizon` weeks ahead.
pub fn target_end_date(forecast_date: NaiveDate, horizon: u32) -> NaiveDate {
    last_saturday(forecast_date) + Duration::days(7 * horizon as i64)
}

/// Inclusive date window `[forecast_date - 6, forecast_date]`.
pub fn forecast_window(forecast_date: NaiveDate) -> (NaiveDate, NaiveDate) {
    (forecast_date - Duration::days(WINDOW_DAYS), forecast_date)
}
