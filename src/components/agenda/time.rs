use crate::config::WeekStart;
use crate::error::{validation_error, CalResult};
use chrono::{Datelike, Duration, Months, NaiveDate, NaiveTime};

/// Wire format for calendar dates
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Wire format for times of day, 12-hour clock with AM/PM suffix
pub const CLOCK_FORMAT: &str = "%I:%M %p";

/// Parse a date in YYYY-MM-DD format
pub fn parse_date(date_str: &str) -> CalResult<NaiveDate> {
    NaiveDate::parse_from_str(date_str, DATE_FORMAT)
        .map_err(|e| validation_error(&format!("Invalid date '{}': {}", date_str, e)))
}

/// Format a date in YYYY-MM-DD format
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Parse a time-of-day string like "9:00 AM"
pub fn parse_clock(time_str: &str) -> CalResult<NaiveTime> {
    NaiveTime::parse_from_str(time_str, CLOCK_FORMAT)
        .map_err(|e| validation_error(&format!("Invalid time '{}': {}", time_str, e)))
}

/// Format a time of day as a 12-hour clock string like "9:00 AM"
pub fn format_clock(time: NaiveTime) -> String {
    time.format("%-I:%M %p").to_string()
}

/// First and last day of the canonical week containing `anchor`,
/// inclusive of both boundaries
pub fn week_span(anchor: NaiveDate, week_start: WeekStart) -> (NaiveDate, NaiveDate) {
    let days_into_week = match week_start {
        WeekStart::Monday => anchor.weekday().num_days_from_monday(),
        WeekStart::Sunday => anchor.weekday().num_days_from_sunday(),
    };

    let start = anchor - Duration::days(days_into_week as i64);
    let end = start + Duration::days(6);

    (start, end)
}

/// First and last day of the month containing `anchor`
pub fn month_span(anchor: NaiveDate) -> (NaiveDate, NaiveDate) {
    // with_day(1) cannot fail for an existing date
    let first = anchor.with_day(1).unwrap_or(anchor);
    let last = first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .unwrap_or(anchor);

    (first, last)
}
