//! Manual exit correction.
//!
//! An operator closes a shift by typing the time of day the employee left.
//! The correction never edits history: it produces one synthetic exit punch
//! which the caller persists before reconstructing again.

use chrono::{DateTime, LocalResult, NaiveDate, NaiveTime, SecondsFormat, TimeZone, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::punch::{AttendancePunch, PunchKind};
use crate::types::{EmployeeId, PunchId, PunchSource};

/// Rejected manual correction input.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CorrectionError {
    /// The time of day could not be parsed.
    #[error("invalid time of day {value:?}, expected HH:MM")]
    InvalidWallClock { value: String },

    /// The wall-clock time falls in a DST gap on that date.
    #[error("{time} does not exist on {date} in the configured timezone")]
    NonexistentLocalTime { date: NaiveDate, time: NaiveTime },

    /// Rolling over to the next day left the supported calendar.
    #[error("date after {date} is out of range")]
    DateOutOfRange { date: NaiveDate },
}

/// Parses an operator-entered time of day (`HH:MM` or `HH:MM:SS`).
pub fn parse_wall_clock(value: &str) -> Result<NaiveTime, CorrectionError> {
    let trimmed = value.trim();
    NaiveTime::parse_from_str(trimmed, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M:%S"))
        .map_err(|_| CorrectionError::InvalidWallClock {
            value: value.to_string(),
        })
}

/// Combines the entry's local date with `time`.
///
/// If that instant is strictly before the entry, the exit belongs to the
/// next calendar day (overnight shift).
pub fn resolve_exit_time<Tz: TimeZone>(
    entry_time: DateTime<Utc>,
    time: NaiveTime,
    tz: &Tz,
) -> Result<DateTime<Utc>, CorrectionError> {
    let entry_date = entry_time.with_timezone(tz).date_naive();
    let candidate = local_instant(entry_date, time, tz)?;
    if candidate >= entry_time {
        return Ok(candidate);
    }

    let next_day = entry_date
        .succ_opt()
        .ok_or(CorrectionError::DateOutOfRange { date: entry_date })?;
    local_instant(next_day, time, tz)
}

/// Resolves a local date and time to UTC.
/// Ambiguous times (DST fall-back) pick the earlier instant.
fn local_instant<Tz: TimeZone>(
    date: NaiveDate,
    time: NaiveTime,
    tz: &Tz,
) -> Result<DateTime<Utc>, CorrectionError> {
    match tz.from_local_datetime(&date.and_time(time)) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => Ok(dt.with_timezone(&Utc)),
        LocalResult::None => Err(CorrectionError::NonexistentLocalTime { date, time }),
    }
}

/// Builds the synthetic exit punch for a shift that opened at `entry_time`.
///
/// The punch ID is derived from the employee and exit instant, so applying
/// the same correction twice yields the same punch.
pub fn manual_exit_punch<Tz: TimeZone>(
    employee_id: &EmployeeId,
    entry_time: DateTime<Utc>,
    wall_clock: &str,
    tz: &Tz,
) -> Result<AttendancePunch, CorrectionError> {
    let time = parse_wall_clock(wall_clock)?;
    let timestamp = resolve_exit_time(entry_time, time, tz)?;

    Ok(AttendancePunch {
        id: manual_punch_id(employee_id, timestamp),
        employee_id: employee_id.clone(),
        kind: PunchKind::Exit,
        timestamp,
        source: PunchSource::Manual,
    })
}

/// Returns `punches` with a manual exit appended.
///
/// No overlap checks are made; the operator's input is trusted. Re-run
/// reconstruction on the result to see the corrected shift.
pub fn apply_manual_exit<Tz: TimeZone>(
    punches: &[AttendancePunch],
    employee_id: &EmployeeId,
    entry_time: DateTime<Utc>,
    wall_clock: &str,
    tz: &Tz,
) -> Result<Vec<AttendancePunch>, CorrectionError> {
    let punch = manual_exit_punch(employee_id, entry_time, wall_clock, tz)?;
    tracing::info!(
        employee = %employee_id,
        entry = %entry_time,
        exit = %punch.timestamp,
        "applying manual exit"
    );

    let mut updated = Vec::with_capacity(punches.len() + 1);
    updated.extend_from_slice(punches);
    updated.push(punch);
    Ok(updated)
}

fn manual_punch_id(employee_id: &EmployeeId, timestamp: DateTime<Utc>) -> PunchId {
    let content = format!(
        "manual-exit|{employee_id}|{}",
        timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
    );
    PunchId::from(Uuid::new_v5(&Uuid::NAMESPACE_OID, content.as_bytes()))
}
