//! Reconstructed work shifts and their display helpers.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{EmployeeId, PunchId};

/// Lifecycle status of a reconstructed shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShiftStatus {
    /// Entry and exit were both observed.
    Completed,
    /// Still open and within the missing-exit threshold.
    Ongoing,
    /// Closed without an exit punch, or open for too long.
    MissingExit,
}

impl ShiftStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Ongoing => "ongoing",
            Self::MissingExit => "missing_exit",
        }
    }

    /// Human-readable label for tables.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Completed => "Completed",
            Self::Ongoing => "Ongoing",
            Self::MissingExit => "Missing exit",
        }
    }

    /// Whether an operator should look at this shift.
    #[must_use]
    pub const fn needs_attention(&self) -> bool {
        matches!(self, Self::MissingExit)
    }
}

impl fmt::Display for ShiftStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A work period derived from one entry punch and, optionally, its exit.
///
/// Shifts are recomputed from scratch on every reconstruction pass and have
/// no identity of their own beyond `source_entry_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shift {
    /// The entry punch that opened this shift.
    pub source_entry_id: PunchId,
    /// The exit punch that closed it, if one was observed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_exit_id: Option<PunchId>,
    pub employee_id: EmployeeId,
    pub entry_time: DateTime<Utc>,
    pub exit_time: Option<DateTime<Utc>>,
    pub status: ShiftStatus,
    /// Present only when `exit_time` is known.
    pub duration_minutes: Option<i64>,
    pub total_break_minutes: i64,
    pub break_count: usize,
}

impl Shift {
    /// Minutes since the shift opened, for live "time elapsed" displays.
    pub fn elapsed_minutes(&self, now: DateTime<Utc>) -> i64 {
        elapsed_minutes(now, self.entry_time)
    }

    /// Duration minus attributed breaks, floored at zero.
    pub fn net_minutes(&self) -> Option<i64> {
        self.duration_minutes
            .map(|minutes| (minutes - self.total_break_minutes).max(0))
    }
}

/// Whole minutes between `entry_time` and `now`, never negative.
pub fn elapsed_minutes(now: DateTime<Utc>, entry_time: DateTime<Utc>) -> i64 {
    (now - entry_time).num_minutes().max(0)
}

/// Formats minutes as a duration string.
/// Returns "Xh Ym" if >= 1 hour, "Xm" if < 1 hour.
/// Negative values render as "0m".
pub fn format_minutes(minutes: i64) -> String {
    if minutes < 0 {
        return "0m".to_string();
    }
    let hours = minutes / 60;
    let rest = minutes % 60;

    if hours >= 1 {
        format!("{hours}h {rest}m")
    } else {
        format!("{rest}m")
    }
}

/// Sorts shifts newest first, breaking ties by employee.
pub fn sort_by_entry_desc(shifts: &mut [Shift]) {
    shifts.sort_by(|a, b| {
        b.entry_time
            .cmp(&a.entry_time)
            .then_with(|| a.employee_id.cmp(&b.employee_id))
    });
}

/// Aggregate counters over a set of shifts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ShiftSummary {
    pub total: usize,
    pub completed: usize,
    pub ongoing: usize,
    pub missing_exit: usize,
    /// Sum of `duration_minutes` over completed shifts.
    pub worked_minutes: i64,
    /// Worked minutes with attributed breaks removed.
    pub net_minutes: i64,
    /// Break minutes attributed to completed shifts.
    pub break_minutes: i64,
}

impl ShiftSummary {
    pub fn from_shifts(shifts: &[Shift]) -> Self {
        let mut summary = Self::default();
        for shift in shifts {
            summary.total += 1;
            match shift.status {
                ShiftStatus::Completed => summary.completed += 1,
                ShiftStatus::Ongoing => summary.ongoing += 1,
                ShiftStatus::MissingExit => summary.missing_exit += 1,
            }
            // Minute totals only cover shifts with a known exit
            if let Some(duration) = shift.duration_minutes {
                summary.worked_minutes += duration;
                summary.net_minutes += shift.net_minutes().unwrap_or(duration);
                summary.break_minutes += shift.total_break_minutes;
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn shift(entry_hour: u32, employee: &str, duration: Option<i64>, breaks: i64) -> Shift {
        let entry_time = Utc
            .with_ymd_and_hms(2024, 3, 4, entry_hour, 0, 0)
            .single()
            .expect("valid test timestamp");
        Shift {
            source_entry_id: PunchId::new(format!("p-{employee}-{entry_hour}")).unwrap(),
            source_exit_id: None,
            employee_id: EmployeeId::new(employee).unwrap(),
            entry_time,
            exit_time: duration.map(|m| entry_time + Duration::minutes(m)),
            status: if duration.is_some() {
                ShiftStatus::Completed
            } else {
                ShiftStatus::Ongoing
            },
            duration_minutes: duration,
            total_break_minutes: breaks,
            break_count: usize::from(breaks > 0),
        }
    }

    #[test]
    fn format_minutes_matches_table_style() {
        assert_eq!(format_minutes(0), "0m");
        assert_eq!(format_minutes(45), "45m");
        assert_eq!(format_minutes(60), "1h 0m");
        assert_eq!(format_minutes(525), "8h 45m");
        assert_eq!(format_minutes(-3), "0m");
    }

    #[test]
    fn net_minutes_subtracts_breaks() {
        assert_eq!(shift(8, "a", Some(480), 30).net_minutes(), Some(450));
        assert_eq!(shift(8, "a", Some(10), 30).net_minutes(), Some(0));
        assert_eq!(shift(8, "a", None, 30).net_minutes(), None);
    }

    #[test]
    fn elapsed_minutes_never_negative() {
        let s = shift(8, "a", None, 0);
        assert_eq!(s.elapsed_minutes(s.entry_time + Duration::minutes(95)), 95);
        assert_eq!(s.elapsed_minutes(s.entry_time - Duration::minutes(5)), 0);
    }

    #[test]
    fn sort_by_entry_desc_orders_newest_first() {
        let mut shifts = vec![shift(6, "b", None, 0), shift(9, "a", None, 0), shift(6, "a", None, 0)];
        sort_by_entry_desc(&mut shifts);
        let order: Vec<_> = shifts
            .iter()
            .map(|s| (s.entry_time.format("%H").to_string(), s.employee_id.to_string()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("09".to_string(), "a".to_string()),
                ("06".to_string(), "a".to_string()),
                ("06".to_string(), "b".to_string()),
            ]
        );
    }

    #[test]
    fn summary_counts_statuses_and_minutes() {
        let mut missing = shift(7, "c", None, 0);
        missing.status = ShiftStatus::MissingExit;
        let shifts = vec![shift(8, "a", Some(480), 30), shift(9, "b", None, 15), missing];

        let summary = ShiftSummary::from_shifts(&shifts);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.ongoing, 1);
        assert_eq!(summary.missing_exit, 1);
        assert_eq!(summary.worked_minutes, 480);
        assert_eq!(summary.net_minutes, 450);
        // The ongoing shift's 15 break minutes stay out of the completed totals
        assert_eq!(summary.break_minutes, 30);
        assert_eq!(summary.worked_minutes - summary.break_minutes, summary.net_minutes);
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&ShiftStatus::MissingExit).unwrap();
        assert_eq!(json, r#""missing_exit""#);
        assert!(ShiftStatus::MissingExit.needs_attention());
        assert!(!ShiftStatus::Ongoing.needs_attention());
    }
}
