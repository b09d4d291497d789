use crate::error::CalResult;
use chrono::{Datelike, NaiveDate};
use serde::Deserialize;
use std::fs;
use tracing::warn;

/// A fixed-date holiday
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Holiday {
    pub date: NaiveDate,
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct HolidayFile {
    #[serde(default)]
    holiday: Vec<Holiday>,
}

/// Holiday list loaded from configuration, queried by date or month.
/// Rendering the list is a presentation concern and happens elsewhere.
#[derive(Debug, Clone, Default)]
pub struct HolidayCalendar {
    holidays: Vec<Holiday>,
}

impl HolidayCalendar {
    /// Load holidays from `config/holidays.toml` if it exists; a missing
    /// or unreadable file yields an empty calendar
    pub fn load() -> Self {
        match fs::read_to_string("config/holidays.toml") {
            Ok(content) => match Self::from_toml(&content) {
                Ok(calendar) => calendar,
                Err(e) => {
                    warn!("Failed to parse config/holidays.toml: {}", e);
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    /// Parse a holiday list from TOML content
    pub fn from_toml(content: &str) -> CalResult<Self> {
        let file: HolidayFile = toml::from_str(content)?;
        Ok(Self {
            holidays: file.holiday,
        })
    }

    /// Whether a date is a holiday
    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.holidays.iter().any(|h| h.date == date)
    }

    /// Holidays falling inside a year and month
    pub fn in_month(&self, year: i32, month: u32) -> Vec<&Holiday> {
        self.holidays
            .iter()
            .filter(|h| h.date.year() == year && h.date.month() == month)
            .collect()
    }
}
