//! Best-effort normalization of the timestamps the listing displays.
//!
//! The site shows post times in several granularities with no
//! machine-readable form: a bare clock time for today's posts ("14:30"),
//! a relative marker for yesterday's ("昨天 14:20"), month-day for this
//! year ("3-14"), and a full date for anything older ("2024-3-14").
//! Patterns are tried in a fixed order and the first predicate match wins;
//! the order is load-bearing because the raw strings are not mutually
//! exclusive by construction.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

static RE_MONTH_DAY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{1,2}-\d{1,2}$").unwrap());
static RE_FULL_DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{1,2}-\d{1,2}$").unwrap());

/// Relative-day markers. The site emits "昨天"; the English form is accepted
/// as well for localized listings.
const YESTERDAY_TOKENS: &[&str] = &["昨天", "yesterday"];

type Predicate = fn(&str) -> bool;
type Handler = fn(&str, NaiveDateTime) -> Option<NaiveDateTime>;

/// Ordered dispatch table, first match wins.
static PATTERNS: &[(Predicate, Handler)] = &[
    (is_clock, parse_clock),
    (is_month_day, parse_month_day),
    (is_full_date, parse_full_date),
    (is_yesterday, parse_yesterday),
];

/// Convert a displayed time string into an absolute timestamp.
///
/// Total: an input matching no pattern, and a matched input whose fields
/// fail to parse (out-of-range day, empty minute digits), both resolve to
/// `now`. Callers never see an error.
pub fn resolve(raw: &str, now: NaiveDateTime) -> NaiveDateTime {
    let raw = raw.trim();
    for (matches, parse) in PATTERNS {
        if matches(raw) {
            return match parse(raw, now) {
                Some(ts) => ts,
                None => {
                    debug!(raw, "time string matched a pattern but failed to parse, using current time");
                    now
                }
            };
        }
    }
    debug!(raw, "unrecognized time format, using current time");
    now
}

fn is_clock(raw: &str) -> bool {
    // The 5-char guard keeps "23:59" in and anything with a suffix out.
    raw.contains(':') && raw.chars().count() <= 5
}

fn is_month_day(raw: &str) -> bool {
    RE_MONTH_DAY.is_match(raw)
}

fn is_full_date(raw: &str) -> bool {
    RE_FULL_DATE.is_match(raw)
}

fn is_yesterday(raw: &str) -> bool {
    YESTERDAY_TOKENS.iter().any(|token| raw.contains(token))
}

/// "9:30" or "23:5", interpreted on the reference date.
fn parse_clock(raw: &str, now: NaiveDateTime) -> Option<NaiveDateTime> {
    let (hour, minute) = parse_hour_minute(raw)?;
    now.date().and_hms_opt(hour, minute, 0)
}

/// "3-14": month-day in the reference year.
fn parse_month_day(raw: &str, now: NaiveDateTime) -> Option<NaiveDateTime> {
    let (month, day) = raw.split_once('-')?;
    NaiveDate::from_ymd_opt(now.year(), month.parse().ok()?, day.parse().ok()?)?
        .and_hms_opt(0, 0, 0)
}

/// "2024-3-14": absolute calendar date, reference ignored.
fn parse_full_date(raw: &str, _now: NaiveDateTime) -> Option<NaiveDateTime> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()?
        .and_hms_opt(0, 0, 0)
}

/// "昨天", optionally followed by a clock time.
fn parse_yesterday(raw: &str, now: NaiveDateTime) -> Option<NaiveDateTime> {
    let mut rest = raw.to_string();
    for token in YESTERDAY_TOKENS {
        rest = rest.replace(token, "");
    }
    let rest = rest.trim();
    let (hour, minute) = if rest.contains(':') {
        parse_hour_minute(rest)?
    } else {
        (0, 0)
    };
    (now - Duration::days(1)).date().and_hms_opt(hour, minute, 0)
}

/// Split "H:M". Minute defaults to 0 only when the component is absent; a
/// present-but-unparseable minute field fails the whole parse.
fn parse_hour_minute(raw: &str) -> Option<(u32, u32)> {
    let mut parts = raw.split(':');
    let hour = parts.next()?.parse().ok()?;
    let minute = match parts.next() {
        Some(m) => m.parse().ok()?,
        None => 0,
    };
    Some((hour, minute))
}
