//! Conversions between calendar dates and the textual forms the forum and
//! the comment store use for them.

use crate::error::DateParseError;
use chrono::{Datelike, NaiveDate, Weekday};

const MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// A date read from a post title, with the slug its permalink carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleDate {
    pub date: NaiveDate,
    /// `month_day_year` with the day exactly as written in the title.
    pub slug: String,
}

/// Parses `Month DD, YYYY` (e.g. `November 05, 2021`).
pub fn parse_title_date(text: &str) -> Result<TitleDate, DateParseError> {
    let text = text.trim();
    let (month_name, rest) = text
        .split_once(' ')
        .ok_or_else(|| DateParseError::MissingDelimiter {
            text: text.to_string(),
        })?;
    let (day_text, year_text) =
        rest.split_once(", ")
            .ok_or_else(|| DateParseError::MissingDelimiter {
                text: text.to_string(),
            })?;

    let month = MONTHS
        .iter()
        .position(|m| *m == month_name)
        .map(|index| index as u32 + 1)
        .ok_or_else(|| DateParseError::UnknownMonth {
            month: month_name.to_string(),
        })?;

    let invalid = || DateParseError::InvalidNumber {
        text: text.to_string(),
    };
    let day: u32 = day_text.trim().parse().map_err(|_| invalid())?;
    let year: i32 = year_text.trim().parse().map_err(|_| invalid())?;

    let date =
        NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| DateParseError::OutOfRange {
            text: text.to_string(),
        })?;

    Ok(TitleDate {
        date,
        slug: format!(
            "{}_{}_{}",
            month_name.to_lowercase(),
            day_text.trim(),
            year_text.trim()
        ),
    })
}

pub fn month_name(date: NaiveDate) -> &'static str {
    MONTHS[date.month0() as usize]
}

/// `Month DD, YYYY`, the form the forum prints in titles.
pub fn title_text(date: NaiveDate) -> String {
    format!("{} {:02}, {}", month_name(date), date.day(), date.year())
}

/// `MM-DD-YYYY`, the form used in artifact file names.
pub fn file_date(date: NaiveDate) -> String {
    date.format("%m-%d-%Y").to_string()
}

pub fn parse_file_date(text: &str) -> Option<NaiveDate> {
    if text.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(text, "%m-%d-%Y").ok()
}

/// No daily threads are posted on weekends.
pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}
