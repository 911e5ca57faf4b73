//! Forecast run date resolution and the labels derived from it.
//!
//! The 18z run of day D is published the next morning; until 09:30 local
//! time the run of two days ago is the newest complete one.

use crate::ForecastHorizon;
use chrono::{Days, Duration, FixedOffset, NaiveDate, NaiveDateTime, Utc};

/// Offset subtracted from the local wall clock before picking the run date.
pub fn publication_cutoff() -> Duration {
    Duration::hours(9) + Duration::minutes(30)
}

/// Date of the forecast run whose files should be loaded.
///
/// `now` is local wall-clock time.
pub fn resolve_target_date(now: NaiveDateTime) -> NaiveDate {
    let shifted = now - publication_cutoff();
    shifted.date() - Days::new(1)
}

/// Date shown to the user for a run (the morning after the run date).
pub fn display_date(target: NaiveDate) -> NaiveDate {
    target + Days::new(1)
}

/// Local wall-clock time for a fixed UTC offset.
pub fn local_now(offset: FixedOffset) -> NaiveDateTime {
    Utc::now().with_timezone(&offset).naive_local()
}

/// Path component for a run date (`YYYYMMDD`).
pub fn run_path_component(target: NaiveDate) -> String {
    target.format("%Y%m%d").to_string()
}

/// `YYYY/MM/DD`
pub fn forecast_date_label(display: NaiveDate) -> String {
    display.format("%Y/%m/%d").to_string()
}

/// Page headline for the displayed forecast date.
pub fn headline(display: NaiveDate) -> String {
    format!("{} 3時の予報", forecast_date_label(display))
}

/// Label for the selected horizon, e.g. `6時間後`.
pub fn horizon_label(horizon: ForecastHorizon) -> String {
    format!("{}時間後", horizon.hours())
}
