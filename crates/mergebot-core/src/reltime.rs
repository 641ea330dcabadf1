//! Relative time phrases used by `older_than`, e.g. "7 days ago", "tomorrow",
//! "in 2 weeks". Every phrase resolves against an explicit `now`.

use crate::error::{BotError, Result};
use chrono::{DateTime, Duration, Months, Utc};
use regex::Regex;
use std::sync::OnceLock;

static OFFSET_RE: OnceLock<Regex> = OnceLock::new();

fn offset_re() -> &'static Regex {
    OFFSET_RE.get_or_init(|| {
        Regex::new(
            r"^(?:(?P<lead>in)\s+)?(?P<count>\d+|an?)\s+(?P<unit>[a-z]+?)s?(?:\s+(?P<dir>ago|from now))?$",
        )
        .unwrap()
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl Unit {
    fn parse(s: &str) -> Option<Unit> {
        match s {
            "second" | "sec" => Some(Unit::Second),
            "minute" | "min" => Some(Unit::Minute),
            "hour" | "hr" => Some(Unit::Hour),
            "day" => Some(Unit::Day),
            "week" | "wk" => Some(Unit::Week),
            "month" => Some(Unit::Month),
            "year" | "yr" => Some(Unit::Year),
            _ => None,
        }
    }
}

/// Resolve `phrase` to an absolute instant relative to `now`.
///
/// `now` and `today` both mean `now`; `yesterday`/`tomorrow` shift by one
/// day. Calendar units (months, years) shift the calendar date, the rest
/// shift by a fixed duration.
pub fn resolve(phrase: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let normalized = phrase
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    let invalid = || BotError::InvalidRelativeTime(phrase.to_string());

    match normalized.as_str() {
        "now" | "today" => return Ok(now),
        "yesterday" => return shift(now, Unit::Day, 1, false).ok_or_else(invalid),
        "tomorrow" => return shift(now, Unit::Day, 1, true).ok_or_else(invalid),
        _ => {}
    }

    let caps = offset_re().captures(&normalized).ok_or_else(invalid)?;
    let count: u32 = match &caps["count"] {
        "a" | "an" => 1,
        digits => digits.parse().map_err(|_| invalid())?,
    };
    let unit = Unit::parse(&caps["unit"]).ok_or_else(invalid)?;
    let forward = match (caps.name("lead").is_some(), caps.name("dir").map(|m| m.as_str())) {
        (true, None) => true,
        (false, Some("ago")) => false,
        (false, Some(_)) => true,
        // A bare "3 days" reads as "in 3 days".
        (false, None) => true,
        (true, Some(_)) => return Err(invalid()),
    };

    shift(now, unit, count, forward).ok_or_else(invalid)
}

fn shift(now: DateTime<Utc>, unit: Unit, count: u32, forward: bool) -> Option<DateTime<Utc>> {
    let n = i64::from(count);
    let delta = match unit {
        Unit::Second => Duration::try_seconds(n)?,
        Unit::Minute => Duration::try_minutes(n)?,
        Unit::Hour => Duration::try_hours(n)?,
        Unit::Day => Duration::try_days(n)?,
        Unit::Week => Duration::try_weeks(n)?,
        Unit::Month | Unit::Year => {
            let months = if unit == Unit::Year { count.checked_mul(12)? } else { count };
            let months = Months::new(months);
            return if forward {
                now.checked_add_months(months)
            } else {
                now.checked_sub_months(months)
            };
        }
    };
    if forward {
        now.checked_add_signed(delta)
    } else {
        now.checked_sub_signed(delta)
    }
}
