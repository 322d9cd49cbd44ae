//! Shift reconstruction algorithm.
//!
//! Turns an unordered stream of entry/exit punches plus break intervals into
//! non-overlapping work shifts with a status, a duration and attributed
//! break time.
//!
//! # Algorithm Summary
//!
//! 1. Partition punches by employee, stable-sort each partition by timestamp
//! 2. Walk each timeline keeping an open entry and the latest pending exit
//! 3. Close the open shift at the end of the timeline, or right before an
//!    entry that arrives after the stale-entry threshold
//! 4. Attribute breaks that start inside the closed shift
//!
//! The device feed is noisy, so nothing here fails: duplicate entries and
//! orphan exits are dropped, and uncertainty is expressed through
//! [`ShiftStatus`].

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::punch::{AttendanceLog, AttendancePunch, BreakInterval, PunchKind};
use crate::shift::{Shift, ShiftStatus};
use crate::types::EmployeeId;

/// Policy thresholds for shift reconstruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconstructionConfig {
    /// An entry arriving more than this long after the open entry starts a
    /// new shift instead of being ignored as a duplicate.
    /// Default: 72000000 (20 hours).
    pub stale_entry_threshold_ms: i64,

    /// An open shift older than this at `now` is reported as missing its exit.
    /// Default: 57600000 (16 hours).
    pub missing_exit_threshold_ms: i64,

    /// Breaks starting within this long of the entry count toward a shift
    /// whose exit is unknown.
    /// Default: 86400000 (24 hours).
    pub open_break_window_ms: i64,
}

impl Default for ReconstructionConfig {
    fn default() -> Self {
        Self {
            stale_entry_threshold_ms: 72_000_000,  // 20 hours
            missing_exit_threshold_ms: 57_600_000, // 16 hours
            open_break_window_ms: 86_400_000,      // 24 hours
        }
    }
}

impl ReconstructionConfig {
    fn stale_entry_threshold(&self) -> Duration {
        Duration::milliseconds(self.stale_entry_threshold_ms)
    }

    fn missing_exit_threshold(&self) -> Duration {
        Duration::milliseconds(self.missing_exit_threshold_ms)
    }

    fn open_break_window(&self) -> Duration {
        Duration::milliseconds(self.open_break_window_ms)
    }
}

/// Why an open shift is being closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Closure {
    /// No punches remain for this employee.
    EndOfTimeline,
    /// A later entry is old enough to start a new shift.
    Superseded,
}

/// One employee's punches in processing order.
struct Timeline<'a> {
    employee_id: &'a EmployeeId,
    punches: Vec<&'a AttendancePunch>,
}

/// Reconstructs shifts for every employee in `punches`.
///
/// Deterministic and total: identical input always yields identical output,
/// and no input makes it fail. `now` is only used to decide whether a shift
/// without an exit is still [`ShiftStatus::Ongoing`].
///
/// Shifts are grouped by employee in order of each employee's first punch in
/// the input, then by entry time. Callers wanting another order should sort
/// explicitly (see [`crate::sort_by_entry_desc`]).
pub fn reconstruct(
    punches: &[AttendancePunch],
    breaks: &[BreakInterval],
    config: &ReconstructionConfig,
    now: DateTime<Utc>,
) -> Vec<Shift> {
    let timelines = partition_by_employee(punches);
    let breaks_by_employee = group_breaks(breaks);

    let shifts: Vec<Shift> = timelines
        .par_iter()
        .flat_map_iter(|timeline| {
            let employee_breaks = breaks_by_employee
                .get(timeline.employee_id)
                .map_or(&[][..], Vec::as_slice);
            reconstruct_timeline(&timeline.punches, employee_breaks, config, now)
        })
        .collect();

    tracing::debug!(
        punches = punches.len(),
        breaks = breaks.len(),
        employees = timelines.len(),
        shifts = shifts.len(),
        "reconstructed shifts"
    );
    shifts
}

/// Reconstructs shifts from a loaded attendance batch.
pub fn reconstruct_log(
    log: &AttendanceLog,
    config: &ReconstructionConfig,
    now: DateTime<Utc>,
) -> Vec<Shift> {
    reconstruct(&log.punches, &log.breaks, config, now)
}

/// Groups punches by employee, keeping first-appearance order of employees.
///
/// Each timeline is sorted by timestamp; the sort is stable so ties keep
/// their input order.
fn partition_by_employee(punches: &[AttendancePunch]) -> Vec<Timeline<'_>> {
    let mut slots: HashMap<&EmployeeId, usize> = HashMap::new();
    let mut timelines: Vec<Timeline<'_>> = Vec::new();

    for punch in punches {
        let slot = *slots.entry(&punch.employee_id).or_insert_with(|| {
            timelines.push(Timeline {
                employee_id: &punch.employee_id,
                punches: Vec::new(),
            });
            timelines.len() - 1
        });
        timelines[slot].punches.push(punch);
    }

    for timeline in &mut timelines {
        timeline.punches.sort_by_key(|punch| punch.timestamp);
    }
    timelines
}

fn group_breaks(breaks: &[BreakInterval]) -> HashMap<&EmployeeId, Vec<&BreakInterval>> {
    let mut grouped: HashMap<&EmployeeId, Vec<&BreakInterval>> = HashMap::new();
    for interval in breaks {
        grouped
            .entry(&interval.employee_id)
            .or_default()
            .push(interval);
    }
    grouped
}

/// Walks one employee's sorted punches and emits their shifts.
fn reconstruct_timeline(
    punches: &[&AttendancePunch],
    breaks: &[&BreakInterval],
    config: &ReconstructionConfig,
    now: DateTime<Utc>,
) -> Vec<Shift> {
    let stale_after = config.stale_entry_threshold();
    let mut shifts = Vec::new();
    let mut open_entry: Option<&AttendancePunch> = None;
    let mut pending_exit: Option<&AttendancePunch> = None;

    for (idx, &punch) in punches.iter().enumerate() {
        match (punch.kind, open_entry) {
            (PunchKind::Entry, Some(open)) => {
                // A stale open entry was already closed by the look-ahead on the previous punch
                debug_assert!(
                    punch.timestamp - open.timestamp <= stale_after,
                    "stale entry {} still open at {}",
                    open.id,
                    punch.id
                );
                tracing::trace!(
                    employee = %punch.employee_id,
                    punch = %punch.id,
                    "ignoring duplicate entry under open shift"
                );
            }
            (PunchKind::Entry, None) => {
                open_entry = Some(punch);
                pending_exit = None;
            }
            // Later exits overwrite earlier ones until the shift closes
            (PunchKind::Exit, Some(_)) => pending_exit = Some(punch),
            (PunchKind::Exit, None) => {
                tracing::trace!(
                    employee = %punch.employee_id,
                    punch = %punch.id,
                    "ignoring orphan exit"
                );
            }
        }

        let Some(open) = open_entry else {
            continue;
        };

        // Look ahead so the shift closes before the superseding entry, not one punch late
        let closure = match punches.get(idx + 1) {
            None => Some(Closure::EndOfTimeline),
            Some(next)
                if next.kind == PunchKind::Entry
                    && next.timestamp - open.timestamp > stale_after =>
            {
                tracing::debug!(
                    employee = %open.employee_id,
                    entry = %open.id,
                    next = %next.id,
                    "closing stale entry"
                );
                Some(Closure::Superseded)
            }
            Some(_) => None,
        };

        if let Some(closure) = closure {
            shifts.push(close_shift(open, pending_exit, closure, breaks, config, now));
            open_entry = None;
            pending_exit = None;
        }
    }

    shifts
}

fn close_shift(
    entry: &AttendancePunch,
    exit: Option<&AttendancePunch>,
    closure: Closure,
    breaks: &[&BreakInterval],
    config: &ReconstructionConfig,
    now: DateTime<Utc>,
) -> Shift {
    let exit_time = exit.map(|punch| punch.timestamp);

    let (status, duration_minutes) = match (exit_time, closure) {
        (Some(exit_time), _) => (
            ShiftStatus::Completed,
            Some((exit_time - entry.timestamp).num_minutes()),
        ),
        (None, Closure::Superseded) => (ShiftStatus::MissingExit, None),
        (None, Closure::EndOfTimeline) => {
            if now - entry.timestamp > config.missing_exit_threshold() {
                (ShiftStatus::MissingExit, None)
            } else {
                (ShiftStatus::Ongoing, None)
            }
        }
    };

    let (break_count, total_break_minutes) =
        attribute_breaks(entry.timestamp, exit_time, breaks, config);

    Shift {
        source_entry_id: entry.id.clone(),
        source_exit_id: exit.map(|punch| punch.id.clone()),
        employee_id: entry.employee_id.clone(),
        entry_time: entry.timestamp,
        exit_time,
        status,
        duration_minutes,
        total_break_minutes,
        break_count,
    }
}

/// Counts breaks starting inside `[entry_time, exit_time]`.
///
/// Without an exit the window is bounded by `open_break_window`. Open breaks
/// are counted but contribute no minutes.
fn attribute_breaks(
    entry_time: DateTime<Utc>,
    exit_time: Option<DateTime<Utc>>,
    breaks: &[&BreakInterval],
    config: &ReconstructionConfig,
) -> (usize, i64) {
    let open_window = config.open_break_window();
    breaks
        .iter()
        .filter(|interval| interval.start_time >= entry_time)
        .filter(|interval| match exit_time {
            Some(exit_time) => interval.start_time <= exit_time,
            None => interval.start_time - entry_time <= open_window,
        })
        .fold((0, 0), |(count, minutes), interval| {
            (count + 1, minutes + interval.duration_minutes())
        })
}
