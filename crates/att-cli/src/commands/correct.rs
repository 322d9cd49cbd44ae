//! Correct-exit command: close a shift with an operator-entered exit time.

use std::fmt;
use std::io::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use clap::Args;

use att_core::{EmployeeId, ShiftStatus, format_minutes, manual_exit_punch, reconstruct_log};
use att_db::Database;

use crate::Config;
use crate::commands::util::parse_datetime;

#[derive(Debug, Args)]
pub struct CorrectExitArgs {
    /// Employee whose shift is being closed.
    #[arg(long)]
    pub employee: String,

    /// Entry time of the shift (ISO 8601, as shown by `att shifts --json`).
    #[arg(long)]
    pub entry: String,

    /// Local time of day the employee left (HH:MM).
    #[arg(long)]
    pub time: String,
}

pub fn run<W: Write, Tz: TimeZone>(
    writer: &mut W,
    db: &mut Database,
    args: &CorrectExitArgs,
    config: &Config,
    now: DateTime<Utc>,
    tz: &Tz,
) -> Result<()>
where
    Tz::Offset: fmt::Display,
{
    let employee_id = EmployeeId::new(args.employee.as_str()).context("invalid --employee")?;
    let entry_time = parse_datetime(&args.entry, now, tz).context("invalid --entry")?;

    let punch = manual_exit_punch(&employee_id, entry_time, &args.time, tz)?;
    tracing::info!(
        employee = %employee_id,
        entry = %entry_time,
        exit = %punch.timestamp,
        "recording manual exit"
    );

    let exit_local = punch.timestamp.with_timezone(tz).format("%Y-%m-%d %H:%M");
    if db.append_punch(&punch)? {
        writeln!(writer, "Recorded manual exit for {employee_id} at {exit_local}")?;
    } else {
        writeln!(
            writer,
            "Manual exit for {employee_id} at {exit_local} was already recorded"
        )?;
    }

    let shifts = reconstruct_log(&db.load_attendance(None)?, &config.reconstruction, now);
    let Some(shift) = shifts
        .iter()
        .find(|shift| shift.employee_id == employee_id && shift.entry_time == entry_time)
    else {
        tracing::warn!(employee = %employee_id, entry = %entry_time, "no shift opens at entry");
        writeln!(
            writer,
            "Warning: no shift for {employee_id} opens at {}",
            entry_time.with_timezone(tz).format("%Y-%m-%d %H:%M")
        )?;
        return Ok(());
    };

    let duration = shift
        .duration_minutes
        .map_or_else(|| "-".to_string(), format_minutes);
    writeln!(
        writer,
        "Shift {} -> {}: {} ({})",
        shift.entry_time.with_timezone(tz).format("%Y-%m-%d %H:%M"),
        shift.exit_time.map_or_else(
            || "-".to_string(),
            |exit| exit.with_timezone(tz).format("%Y-%m-%d %H:%M").to_string()
        ),
        duration,
        shift.status.label()
    )?;
    if shift.status != ShiftStatus::Completed {
        writeln!(
            writer,
            "Warning: the manual exit did not close this shift; check `att shifts`"
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use att_core::{AttendancePunch, PunchId, PunchKind, PunchSource};
    use chrono::FixedOffset;

    fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, hour, minute, 0).unwrap()
    }

    fn db_with_open_entry() -> Database {
        let mut db = Database::open_in_memory().unwrap();
        db.insert_punches(&[AttendancePunch {
            id: PunchId::new("p1").unwrap(),
            employee_id: EmployeeId::new("emp-1").unwrap(),
            kind: PunchKind::Entry,
            timestamp: at(1, 22, 0),
            source: PunchSource::Device,
        }])
        .unwrap();
        db
    }

    fn args(entry: &str, time: &str) -> CorrectExitArgs {
        CorrectExitArgs {
            employee: "emp-1".to_string(),
            entry: entry.to_string(),
            time: time.to_string(),
        }
    }

    #[test]
    fn correction_closes_overnight_shift() {
        let mut db = db_with_open_entry();
        let mut output = Vec::new();
        run(
            &mut output,
            &mut db,
            &args("2024-01-01T22:00:00Z", "06:00"),
            &Config::default(),
            at(3, 9, 0),
            &Utc,
        )
        .unwrap();

        let output = String::from_utf8(output).unwrap();
        assert_eq!(
            output,
            "Recorded manual exit for emp-1 at 2024-01-02 06:00\n\
             Shift 2024-01-01 22:00 -> 2024-01-02 06:00: 8h 0m (Completed)\n"
        );

        let punches = db.list_punches().unwrap();
        assert_eq!(punches.len(), 2);
        assert_eq!(punches[1].kind, "exit");
        assert_eq!(punches[1].source, "manual");
    }

    #[test]
    fn repeated_correction_is_not_stored_twice() {
        let mut db = db_with_open_entry();
        let correction = args("2024-01-01T22:00:00Z", "06:00");
        let config = Config::default();

        run(&mut Vec::new(), &mut db, &correction, &config, at(3, 9, 0), &Utc).unwrap();
        let mut output = Vec::new();
        run(&mut output, &mut db, &correction, &config, at(3, 9, 0), &Utc).unwrap();

        let output = String::from_utf8(output).unwrap();
        assert!(output.starts_with("Manual exit for emp-1 at 2024-01-02 06:00 was already recorded"));
        assert_eq!(db.list_punches().unwrap().len(), 2);
    }

    #[test]
    fn wall_clock_is_read_in_configured_offset() {
        let mut db = db_with_open_entry();
        // 22:00Z is 23:00 at UTC+1, so 07:00 local is 06:00Z the next day
        let tz = FixedOffset::east_opt(3600).unwrap();
        let mut output = Vec::new();
        run(
            &mut output,
            &mut db,
            &args("2024-01-01T22:00:00Z", "07:00"),
            &Config::default(),
            at(3, 9, 0),
            &tz,
        )
        .unwrap();

        let punches = db.list_punches().unwrap();
        assert_eq!(punches[1].timestamp, "2024-01-02T06:00:00.000Z");
        assert!(String::from_utf8(output).unwrap().contains("(Completed)"));
    }

    #[test]
    fn unknown_entry_warns() {
        let mut db = db_with_open_entry();
        let mut output = Vec::new();
        run(
            &mut output,
            &mut db,
            &args("2024-01-01T21:00:00Z", "23:00"),
            &Config::default(),
            at(3, 9, 0),
            &Utc,
        )
        .unwrap();

        let output = String::from_utf8(output).unwrap();
        assert!(output.contains("Warning: no shift for emp-1 opens at 2024-01-01 21:00"));
    }

    #[test]
    fn correction_is_recorded_without_reading_history() {
        let mut db = Database::open_in_memory().unwrap();
        let mut output = Vec::new();
        run(
            &mut output,
            &mut db,
            &args("2024-01-01T22:00:00Z", "06:00"),
            &Config::default(),
            at(3, 9, 0),
            &Utc,
        )
        .unwrap();

        let output = String::from_utf8(output).unwrap();
        assert!(output.starts_with("Recorded manual exit for emp-1 at 2024-01-02 06:00\n"));
        assert!(output.contains("Warning: no shift for emp-1 opens at 2024-01-01 22:00"));
        let punches = db.list_punches().unwrap();
        assert_eq!(punches.len(), 1);
        assert_eq!(punches[0].source, "manual");
    }

    #[test]
    fn invalid_time_stores_nothing() {
        let mut db = db_with_open_entry();
        let result = run(
            &mut Vec::new(),
            &mut db,
            &args("2024-01-01T22:00:00Z", "25:00"),
            &Config::default(),
            at(3, 9, 0),
            &Utc,
        );

        assert!(result.is_err());
        assert_eq!(db.list_punches().unwrap().len(), 1);
    }
}
