//! Import command for loading attendance records into the local `SQLite` store.
//!
//! Input is JSONL, one record per line, tagged by `record`:
//!
//! ```text
//! {"record":"employee","id":"emp-1","name":"Ana"}
//! {"record":"punch","id":"p-1","employee_id":"emp-1","kind":"entrada","timestamp":"2024-01-01T08:00:00Z"}
//! {"record":"break","id":"b-1","employee_id":"emp-1","start_time":"2024-01-01T12:00:00Z","end_time":null}
//! ```

use std::io::BufRead;

use anyhow::{Context, Result};
use serde::Deserialize;

use att_core::{AttendancePunch, BreakInterval, EmployeeId};
use att_db::{Database, EmployeeRecord};

/// Counts of newly stored records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportStats {
    pub employees: usize,
    pub punches: usize,
    pub breaks: usize,
}

pub fn run<R: BufRead>(reader: R, db: &mut Database) -> Result<ImportStats> {
    let batch = parse_records(reader)?;
    let stats = ImportStats {
        employees: db.upsert_employees(&batch.employees)?,
        punches: db.insert_punches(&batch.punches)?,
        breaks: db.insert_breaks(&batch.breaks)?,
    };
    tracing::debug!(?stats, "import finished");
    Ok(stats)
}

#[derive(Debug, Default)]
struct ImportBatch {
    employees: Vec<EmployeeRecord>,
    punches: Vec<AttendancePunch>,
    breaks: Vec<BreakInterval>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "record", rename_all = "snake_case")]
enum ImportRecord {
    Employee {
        id: EmployeeId,
        #[serde(default)]
        name: Option<String>,
    },
    Punch(AttendancePunch),
    Break(BreakInterval),
}

fn parse_records<R: BufRead>(reader: R) -> Result<ImportBatch> {
    let mut batch = ImportBatch::default();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("failed to read line {}", idx + 1))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let record: ImportRecord = serde_json::from_str(trimmed)
            .with_context(|| format!("invalid record on line {}", idx + 1))?;
        match record {
            ImportRecord::Employee { id, name } => batch.employees.push(EmployeeRecord {
                id: id.into(),
                name: name
                    .map(|name| name.trim().to_string())
                    .filter(|name| !name.is_empty()),
            }),
            ImportRecord::Punch(punch) => batch.punches.push(punch),
            ImportRecord::Break(interval) => batch.breaks.push(interval),
        }
    }
    Ok(batch)
}
