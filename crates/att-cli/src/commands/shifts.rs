//! Shifts command: reconstruct shifts from the store and render them.
//!
//! Output is a human-readable table sorted newest first followed by summary
//! counters, or JSON with `--json`.

use std::collections::HashMap;
use std::fmt;
use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use clap::Args;
use serde::Serialize;

use att_core::{
    Shift, ShiftStatus, ShiftSummary, format_minutes, reconstruct_log, sort_by_entry_desc,
};
use att_db::Database;

use crate::Config;
use crate::commands::util::parse_datetime;

#[derive(Debug, Args)]
pub struct ShiftsArgs {
    /// Only show shifts that opened at or after this time (RFC 3339, a date, or "2 days ago").
    #[arg(long)]
    pub since: Option<String>,

    /// Only show shifts that opened before this time (RFC 3339, a date, or "2 days ago").
    #[arg(long)]
    pub until: Option<String>,

    /// Only show shifts for this employee ID.
    #[arg(long)]
    pub employee: Option<String>,

    /// Output JSON instead of a table.
    #[arg(long)]
    pub json: bool,
}

/// A shift with the display fields the table and JSON output share.
#[derive(Debug, Serialize)]
struct ShiftRow<'a> {
    #[serde(flatten)]
    shift: &'a Shift,
    employee_name: Option<&'a str>,
    net_minutes: Option<i64>,
    /// Minutes since entry, only for shifts that are still open.
    #[serde(skip_serializing_if = "Option::is_none")]
    elapsed_minutes: Option<i64>,
}

#[derive(Debug, Serialize)]
struct ShiftsReport<'a> {
    generated_at: DateTime<Utc>,
    shifts: Vec<ShiftRow<'a>>,
    summary: ShiftSummary,
}

pub fn run<W: Write, Tz: TimeZone>(
    writer: &mut W,
    db: &Database,
    args: &ShiftsArgs,
    config: &Config,
    now: DateTime<Utc>,
    tz: &Tz,
) -> Result<()>
where
    Tz::Offset: fmt::Display,
{
    let shifts = load_shifts(db, args, config, now, tz)?;
    let names: HashMap<String, String> = db
        .list_employees()?
        .into_iter()
        .filter_map(|employee| employee.name.map(|name| (employee.id, name)))
        .collect();

    let rows: Vec<ShiftRow<'_>> = shifts
        .iter()
        .map(|shift| ShiftRow {
            shift,
            employee_name: names.get(shift.employee_id.as_str()).map(String::as_str),
            net_minutes: shift.net_minutes(),
            elapsed_minutes: (shift.exit_time.is_none()).then(|| shift.elapsed_minutes(now)),
        })
        .collect();
    let summary = ShiftSummary::from_shifts(&shifts);

    if args.json {
        let report = ShiftsReport {
            generated_at: now,
            shifts: rows,
            summary,
        };
        serde_json::to_writer_pretty(&mut *writer, &report)?;
        writeln!(writer)?;
    } else {
        write_table(writer, &rows, &summary, tz)?;
    }
    Ok(())
}

/// Reconstructs shifts for the requested window, newest first.
///
/// The whole history is rebuilt and then filtered by entry time. A shift's
/// exit can land arbitrarily far past its entry and an earlier duplicate
/// entry decides which later entries open shifts, so no bounded slice of the
/// store reproduces the full result.
fn load_shifts<Tz: TimeZone>(
    db: &Database,
    args: &ShiftsArgs,
    config: &Config,
    now: DateTime<Utc>,
    tz: &Tz,
) -> Result<Vec<Shift>> {
    let since = args
        .since
        .as_deref()
        .map(|s| parse_datetime(s, now, tz))
        .transpose()?;
    let until = args
        .until
        .as_deref()
        .map(|s| parse_datetime(s, now, tz))
        .transpose()?;

    let log = db.load_attendance(None)?;
    let mut shifts = reconstruct_log(&log, &config.reconstruction, now);
    shifts.retain(|shift| {
        since.is_none_or(|since| shift.entry_time >= since)
            && until.is_none_or(|until| shift.entry_time < until)
            && args
                .employee
                .as_deref()
                .is_none_or(|employee| shift.employee_id.as_str() == employee)
    });
    sort_by_entry_desc(&mut shifts);
    Ok(shifts)
}

fn write_table<W: Write, Tz: TimeZone>(
    writer: &mut W,
    rows: &[ShiftRow<'_>],
    summary: &ShiftSummary,
    tz: &Tz,
) -> Result<()>
where
    Tz::Offset: fmt::Display,
{
    if rows.is_empty() {
        writeln!(writer, "No shifts found.")?;
        return Ok(());
    }

    writeln!(
        writer,
        "{:<16}  {:<16}  {:<20}  {:>8}  {:>10}  STATUS",
        "ENTRY", "EXIT", "EMPLOYEE", "DURATION", "BREAKS"
    )?;
    for row in rows {
        let shift = row.shift;
        let exit = shift
            .exit_time
            .map_or_else(|| "-".to_string(), |exit| format_local(exit, tz));
        let employee = row.employee_name.map_or_else(
            || shift.employee_id.to_string(),
            |name| format!("{name} ({})", shift.employee_id),
        );
        let duration = match (shift.duration_minutes, row.elapsed_minutes) {
            (Some(minutes), _) => format_minutes(minutes),
            (None, Some(elapsed)) if shift.status == ShiftStatus::Ongoing => {
                format!("~{}", format_minutes(elapsed))
            }
            _ => "-".to_string(),
        };
        let breaks = if shift.break_count == 0 {
            "0".to_string()
        } else {
            format!(
                "{} ({})",
                shift.break_count,
                format_minutes(shift.total_break_minutes)
            )
        };
        writeln!(
            writer,
            "{:<16}  {:<16}  {:<20}  {:>8}  {:>10}  {}",
            format_local(shift.entry_time, tz),
            exit,
            employee,
            duration,
            breaks,
            shift.status.label()
        )?;
    }

    writeln!(writer)?;
    writeln!(
        writer,
        "{} shifts: {} completed, {} ongoing, {} missing exit",
        summary.total, summary.completed, summary.ongoing, summary.missing_exit
    )?;
    writeln!(
        writer,
        "Worked {} (net {}), breaks {}",
        format_minutes(summary.worked_minutes),
        format_minutes(summary.net_minutes),
        format_minutes(summary.break_minutes)
    )?;
    Ok(())
}

fn format_local<Tz: TimeZone>(timestamp: DateTime<Utc>, tz: &Tz) -> String
where
    Tz::Offset: fmt::Display,
{
    timestamp
        .with_timezone(tz)
        .format("%Y-%m-%d %H:%M")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    use att_core::{AttendancePunch, BreakId, BreakInterval, EmployeeId, PunchId, PunchKind, PunchSource};
    use att_db::EmployeeRecord;
    use insta::assert_snapshot;

    fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, hour, minute, 0).unwrap()
    }

    fn punch(id: &str, employee: &str, kind: PunchKind, timestamp: DateTime<Utc>) -> AttendancePunch {
        AttendancePunch {
            id: PunchId::new(id).unwrap(),
            employee_id: EmployeeId::new(employee).unwrap(),
            kind,
            timestamp,
            source: PunchSource::Device,
        }
    }

    fn seeded_db() -> Database {
        let mut db = Database::open_in_memory().unwrap();
        db.upsert_employees(&[EmployeeRecord {
            id: "emp-1".to_string(),
            name: Some("Ana".to_string()),
        }])
        .unwrap();
        db.insert_punches(&[
            punch("p1", "emp-1", PunchKind::Entry, at(1, 8, 0)),
            punch("p2", "emp-1", PunchKind::Exit, at(1, 16, 45)),
            punch("p3", "emp-2", PunchKind::Entry, at(1, 22, 0)),
            punch("p4", "emp-1", PunchKind::Entry, at(3, 6, 0)),
        ])
        .unwrap();
        db.insert_breaks(&[BreakInterval {
            id: BreakId::new("b1").unwrap(),
            employee_id: EmployeeId::new("emp-1").unwrap(),
            start_time: at(1, 12, 0),
            end_time: Some(at(1, 12, 30)),
        }])
        .unwrap();
        db
    }

    fn args() -> ShiftsArgs {
        ShiftsArgs {
            since: None,
            until: None,
            employee: None,
            json: false,
        }
    }

    #[test]
    fn shifts_table_lists_newest_first_with_summary() {
        let db = seeded_db();
        let mut output = Vec::new();
        run(&mut output, &db, &args(), &Config::default(), at(3, 9, 10), &Utc).unwrap();

        let output = String::from_utf8(output).unwrap();
        assert_snapshot!(output, @r"
        ENTRY             EXIT              EMPLOYEE              DURATION      BREAKS  STATUS
        2024-01-03 06:00  -                 Ana (emp-1)            ~3h 10m           0  Ongoing
        2024-01-01 22:00  -                 emp-2                        -           0  Missing exit
        2024-01-01 08:00  2024-01-01 16:45  Ana (emp-1)             8h 45m     1 (30m)  Completed

        3 shifts: 1 completed, 1 ongoing, 1 missing exit
        Worked 8h 45m (net 8h 15m), breaks 30m
        ");
    }

    #[test]
    fn shifts_filters_by_employee_and_window() {
        let db = seeded_db();
        let config = Config::default();
        let now = at(3, 9, 10);

        let mut by_employee = args();
        by_employee.employee = Some("emp-2".to_string());
        let shifts = load_shifts(&db, &by_employee, &config, now, &Utc).unwrap();
        assert_eq!(shifts.len(), 1);
        assert_eq!(shifts[0].employee_id.as_str(), "emp-2");

        let mut window = args();
        window.since = Some("2024-01-01T10:00:00Z".to_string());
        window.until = Some("2024-01-03T00:00:00Z".to_string());
        let shifts = load_shifts(&db, &window, &config, now, &Utc).unwrap();
        assert_eq!(shifts.len(), 1);
        assert_eq!(shifts[0].source_entry_id.as_str(), "p3");
    }

    #[test]
    fn window_start_keeps_exit_of_straddling_shift() {
        let db = seeded_db();
        let mut window = args();
        window.since = Some("2024-01-01T08:00:00Z".to_string());
        window.until = Some("2024-01-01T09:00:00Z".to_string());

        let shifts = load_shifts(&db, &window, &Config::default(), at(3, 9, 10), &Utc).unwrap();
        assert_eq!(shifts.len(), 1);
        assert_eq!(shifts[0].status, ShiftStatus::Completed);
        assert_eq!(shifts[0].duration_minutes, Some(525));
    }

    /// Timelines whose outcome inside a window depends on punches far outside it.
    fn history_db() -> Database {
        let mut db = seeded_db();
        db.insert_punches(&[
            // A duplicate entry before the window keeps e0 open until e2 supersedes it
            punch("e0", "emp-3", PunchKind::Entry, at(4, 3, 0)),
            punch("e1", "emp-3", PunchKind::Entry, at(4, 5, 0)),
            punch("e2", "emp-3", PunchKind::Entry, at(5, 1, 0)),
            punch("x2", "emp-3", PunchKind::Exit, at(5, 9, 0)),
            // A 30h shift whose exit lands well past the window end
            punch("e3", "emp-4", PunchKind::Entry, at(10, 23, 0)),
            punch("x3", "emp-4", PunchKind::Exit, at(12, 5, 0)),
        ])
        .unwrap();
        db.insert_breaks(&[BreakInterval {
            id: BreakId::new("b2").unwrap(),
            employee_id: EmployeeId::new("emp-4").unwrap(),
            start_time: at(11, 22, 30),
            end_time: Some(at(11, 23, 0)),
        }])
        .unwrap();
        db
    }

    #[test]
    fn duplicate_entry_before_window_does_not_hide_shift() {
        let db = history_db();
        let mut window = args();
        window.since = Some("2024-01-05T00:00:00Z".to_string());
        window.until = Some("2024-01-06T00:00:00Z".to_string());

        let shifts = load_shifts(&db, &window, &Config::default(), at(20, 0, 0), &Utc).unwrap();
        assert_eq!(shifts.len(), 1);
        assert_eq!(shifts[0].source_entry_id.as_str(), "e2");
        assert_eq!(shifts[0].status, ShiftStatus::Completed);
        assert_eq!(shifts[0].duration_minutes, Some(480));
    }

    #[test]
    fn window_end_keeps_late_exit_and_breaks() {
        let db = history_db();
        let mut window = args();
        window.since = Some("2024-01-10T00:00:00Z".to_string());
        window.until = Some("2024-01-11T00:00:00Z".to_string());

        let shifts = load_shifts(&db, &window, &Config::default(), at(20, 0, 0), &Utc).unwrap();
        assert_eq!(shifts.len(), 1);
        assert_eq!(shifts[0].source_entry_id.as_str(), "e3");
        assert_eq!(shifts[0].status, ShiftStatus::Completed);
        assert_eq!(shifts[0].duration_minutes, Some(30 * 60));
        assert_eq!(shifts[0].break_count, 1);
        assert_eq!(shifts[0].total_break_minutes, 30);
    }

    #[test]
    fn windowed_shifts_match_full_rebuild() {
        let db = history_db();
        let config = Config::default();
        let now = at(20, 0, 0);
        let full = load_shifts(&db, &args(), &config, now, &Utc).unwrap();

        let bounds = [
            ("2024-01-01T00:00:00Z", "2024-01-02T00:00:00Z"),
            ("2024-01-01T09:00:00Z", "2024-01-04T04:00:00Z"),
            ("2024-01-04T04:00:00Z", "2024-01-05T02:00:00Z"),
            ("2024-01-05T00:00:00Z", "2024-01-11T00:00:00Z"),
            ("2024-01-10T23:00:00Z", "2024-01-10T23:00:01Z"),
        ];
        for (since, until) in bounds {
            let mut window = args();
            window.since = Some(since.to_string());
            window.until = Some(until.to_string());
            let windowed = load_shifts(&db, &window, &config, now, &Utc).unwrap();

            let since = parse_datetime(since, now, &Utc).unwrap();
            let until = parse_datetime(until, now, &Utc).unwrap();
            let expected: Vec<Shift> = full
                .iter()
                .filter(|shift| shift.entry_time >= since && shift.entry_time < until)
                .cloned()
                .collect();
            assert_eq!(windowed, expected, "window {since} .. {until}");
        }
    }

    #[test]
    fn shifts_json_includes_names_and_summary() {
        let db = seeded_db();
        let mut json_args = args();
        json_args.json = true;
        let mut output = Vec::new();
        run(&mut output, &db, &json_args, &Config::default(), at(3, 9, 10), &Utc).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&output).unwrap();
        let shifts = value["shifts"].as_array().unwrap();
        assert_eq!(shifts.len(), 3);
        assert_eq!(shifts[0]["status"], "ongoing");
        assert_eq!(shifts[0]["employee_name"], "Ana");
        assert_eq!(shifts[0]["elapsed_minutes"], 190);
        assert_eq!(shifts[1]["status"], "missing_exit");
        assert!(shifts[1]["employee_name"].is_null());
        assert_eq!(shifts[2]["duration_minutes"], 525);
        assert_eq!(shifts[2]["net_minutes"], 495);
        assert_eq!(shifts[2]["source_entry_id"], "p1");
        assert_eq!(value["summary"]["missing_exit"], 1);
    }

    #[test]
    fn empty_store_prints_placeholder() {
        let db = Database::open_in_memory().unwrap();
        let mut output = Vec::new();
        run(&mut output, &db, &args(), &Config::default(), at(3, 9, 10), &Utc).unwrap();
        assert_eq!(String::from_utf8(output).unwrap(), "No shifts found.\n");
    }
}
