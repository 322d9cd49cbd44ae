//! Status command for showing store contents and the last punch per employee.

use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

use anyhow::Result;

use att_db::Database;

pub fn run<W: Write>(writer: &mut W, db: &Database, database_path: &Path) -> Result<()> {
    let counts = db.counts()?;
    let last_punches = db.last_punch_by_employee()?;
    let names: HashMap<String, String> = db
        .list_employees()?
        .into_iter()
        .filter_map(|employee| employee.name.map(|name| (employee.id, name)))
        .collect();

    writeln!(writer, "Attendance status")?;
    writeln!(writer, "Database: {}", database_path.display())?;
    writeln!(
        writer,
        "Records: {} employees, {} punches, {} breaks",
        counts.employees, counts.punches, counts.breaks
    )?;

    if last_punches.is_empty() {
        writeln!(writer, "No punches recorded.")?;
        return Ok(());
    }

    writeln!(writer, "Last punch:")?;
    for last in last_punches {
        match names.get(&last.employee_id) {
            Some(name) => writeln!(
                writer,
                "- {name} ({}): {} at {}",
                last.employee_id, last.kind, last.last_punch
            )?,
            None => writeln!(
                writer,
                "- {}: {} at {}",
                last.employee_id, last.kind, last.last_punch
            )?,
        }
    }

    Ok(())
}
