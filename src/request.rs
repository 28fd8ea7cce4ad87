//! Parsing of human facing data request strings.
//!
//! A request addresses one dataset as `path:run:variation:time`. Every
//! field after the path may be empty or left off entirely, and deciding
//! what a missing field defaults to is the caller's business: this
//! module only reports what was actually written.

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use tracing::warn;

use crate::error::{CondbError, Result};

lazy_static! {
    static ref TIME_STAMP: Regex = Regex::new(
        r"^(\d{4})(?:-(\d{1,2})(?:-(\d{1,2})(?:-(\d{1,2})(?:-(\d{1,2})(?:-(\d{1,2}))?)?)?)?)?$"
    )
    .unwrap();
}

/// Parses a partial time stamp of the form `YYYY[-MM[-DD[-HH[-mm[-ss]]]]]`.
///
/// Omitted components saturate to the end of the period they leave open:
/// `2012` means the last second of 2012 and `2012-07` the last second of
/// July 2012, so a request cut off at a time reads as "latest data
/// before the period ends".
pub fn parse_time(text: &str) -> Result<NaiveDateTime> {
    let captures = TIME_STAMP
        .captures(text)
        .ok_or_else(|| CondbError::InvalidTime(text.to_owned()))?;
    let component = |index: usize| {
        captures
            .get(index)
            .map(|group| group.as_str().parse::<u32>().unwrap())
    };
    let year = captures[1].parse::<i32>().unwrap();
    let month = component(2).unwrap_or(12);
    let day = match component(3) {
        Some(day) => day,
        None => {
            last_day_of_month(year, month).ok_or_else(|| CondbError::InvalidTime(text.to_owned()))?
        }
    };
    let hour = component(4).unwrap_or(23);
    let minute = component(5).unwrap_or(59);
    let second = component(6).unwrap_or(59);

    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| date.and_hms_opt(hour, minute, second))
        .ok_or_else(|| CondbError::InvalidTime(text.to_owned()))
}

fn last_day_of_month(year: i32, month: u32) -> Option<u32> {
    let next_month = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    next_month.and_then(|date| date.pred_opt()).map(|date| date.day())
}

/// The outcome of picking a request string apart. Fields that were not
/// present stay `None`; a run field that is present but not numeric is
/// flagged instead of failing the whole parse.
#[derive(Debug, Clone, Serialize)]
pub struct RequestParseResult {
    original_request: String,
    path: Option<String>,
    run_number: Option<u64>,
    invalid_run_number: bool,
    variation: Option<String>,
    time: Option<NaiveDateTime>,
    time_string: Option<String>,
}

impl RequestParseResult {
    pub fn original_request(&self) -> &str {
        &self.original_request
    }
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }
    pub fn run_number(&self) -> Option<u64> {
        self.run_number
    }
    pub fn invalid_run_number(&self) -> bool {
        self.invalid_run_number
    }
    pub fn variation(&self) -> Option<&str> {
        self.variation.as_deref()
    }
    pub fn time(&self) -> Option<NaiveDateTime> {
        self.time
    }
    /// The raw time field, kept even when it does not parse.
    pub fn time_string(&self) -> Option<&str> {
        self.time_string.as_deref()
    }
}

/// Splits `path:run:variation:time` into its positional fields.
pub fn parse_request(request: &str) -> RequestParseResult {
    let mut result = RequestParseResult {
        original_request: request.to_owned(),
        path: None,
        run_number: None,
        invalid_run_number: false,
        variation: None,
        time: None,
        time_string: None,
    };
    let mut fields = request.splitn(4, ':');
    if let Some(path) = fields.next() {
        if !path.is_empty() {
            result.path = Some(path.to_owned());
        }
    }
    if let Some(run) = fields.next() {
        if !run.is_empty() {
            match run.parse::<u64>() {
                Ok(number) => result.run_number = Some(number),
                Err(_) => {
                    warn!(field = run, "request carries a non numeric run number");
                    result.invalid_run_number = true;
                }
            }
        }
    }
    if let Some(variation) = fields.next() {
        if !variation.is_empty() {
            result.variation = Some(variation.to_owned());
        }
    }
    if let Some(time) = fields.next() {
        if !time.is_empty() {
            result.time_string = Some(time.to_owned());
            result.time = parse_time(time).ok();
        }
    }
    result
}
