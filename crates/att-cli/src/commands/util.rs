//! Time argument parsing shared by the commands.

use std::sync::LazyLock;

use anyhow::{Context, bail};
use chrono::{DateTime, Duration, LocalResult, NaiveDate, TimeZone, Utc};
use regex::Regex;

static AGO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s*(m|min|minute|h|hour|d|day|w|week)s?\s+ago$").unwrap());

/// Largest accepted "N units ago", in minutes (about 100 years).
const MAX_AGO_MINUTES: i64 = 100 * 366 * 24 * 60;

/// Parses a time argument relative to `now` and the operator's zone.
///
/// Accepted forms:
/// - RFC 3339: `2024-01-15T10:30:00Z`
/// - a calendar day, meaning its local midnight: `2024-01-15`, `today`, `yesterday`
/// - an offset back from `now`: `90 minutes ago`, `2h ago`, `3 days ago`
pub fn parse_datetime<Tz: TimeZone>(
    value: &str,
    now: DateTime<Utc>,
    tz: &Tz,
) -> anyhow::Result<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Utc));
    }

    let today = now.with_timezone(tz).date_naive();
    let day = match value.to_ascii_lowercase().as_str() {
        "today" => Some(today),
        "yesterday" => today.pred_opt(),
        _ => NaiveDate::parse_from_str(value, "%Y-%m-%d").ok(),
    };
    if let Some(day) = day {
        return local_midnight(day, tz);
    }

    let Some(caps) = AGO_RE.captures(value) else {
        bail!(
            "invalid time {value:?}: use RFC 3339 (2024-01-15T10:30:00Z), a date (2024-01-15, today, yesterday) or '3 days ago'"
        );
    };
    let count: i64 = caps[1]
        .parse()
        .with_context(|| format!("invalid count in {value:?}"))?;
    let unit_minutes = match &caps[2] {
        "m" | "min" | "minute" => 1,
        "h" | "hour" => 60,
        "d" | "day" => 24 * 60,
        _ => 7 * 24 * 60,
    };
    let minutes = count
        .checked_mul(unit_minutes)
        .filter(|minutes| *minutes <= MAX_AGO_MINUTES)
        .with_context(|| format!("{value:?} is too far back"))?;
    Ok(now - Duration::minutes(minutes))
}

/// First instant of `day` in `tz`. A midnight skipped by DST falls forward an hour.
fn local_midnight<Tz: TimeZone>(day: NaiveDate, tz: &Tz) -> anyhow::Result<DateTime<Utc>> {
    let midnight = day.and_hms_opt(0, 0, 0).context("invalid date")?;
    match tz.from_local_datetime(&midnight) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => Ok(dt.with_timezone(&Utc)),
        LocalResult::None => match tz.from_local_datetime(&(midnight + Duration::hours(1))) {
            LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => Ok(dt.with_timezone(&Utc)),
            LocalResult::None => bail!("{day} has no local midnight"),
        },
    }
}
