//! Storage layer for attendance data.
//!
//! Persists clock punches, break intervals and the employee directory using
//! `rusqlite`. The store is append-only from the engine's point of view:
//! corrections add new punches, nothing is edited in place, so rebuilding
//! shifts from the full history is always reproducible.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! Wrap it in a `Mutex` or open one instance per thread for concurrent use.
//!
//! # Schema
//!
//! ## Timestamp Format
//!
//! Timestamps are stored as TEXT in RFC 3339 UTC with millisecond precision
//! (e.g., `2024-01-15T10:30:00.000Z`). A single fixed format keeps
//! lexicographic ordering equal to chronological ordering, which the range
//! queries rely on.
//!
//! ## Punch Order
//!
//! Punches sharing a timestamp are returned in insertion order (`rowid`),
//! which is the order the device feed delivered them.

use std::path::Path;

use att_core::{
    AttendanceLog, AttendancePunch, BreakId, BreakInterval, EmployeeId, PunchId, PunchKind,
    PunchSource,
};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, params};
use thiserror::Error;

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Failed to parse a stored timestamp.
    #[error("invalid timestamp for record {record_id}: {timestamp}")]
    TimestampParse {
        record_id: String,
        timestamp: String,
        #[source]
        source: chrono::ParseError,
    },
    /// A stored row does not describe a valid punch or break.
    #[error("invalid record {record_id}: {message}")]
    InvalidRecord { record_id: String, message: String },
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

/// A punch row as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PunchRecord {
    pub id: String,
    pub employee_id: String,
    pub kind: String,
    pub timestamp: String,
    pub source: String,
}

/// A break row as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakRecord {
    pub id: String,
    pub employee_id: String,
    pub start_time: String,
    pub end_time: Option<String>,
}

/// Directory entry used to resolve employee IDs to display names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmployeeRecord {
    pub id: String,
    pub name: Option<String>,
}

/// Latest punch per employee.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmployeeLastPunch {
    pub employee_id: String,
    pub kind: String,
    pub last_punch: String,
}

/// Row counts per table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordCounts {
    pub employees: usize,
    pub punches: usize,
    pub breaks: usize,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS employees (
                id TEXT PRIMARY KEY,
                name TEXT
            );

            -- Punches table: raw clock actions, never updated
            -- kind: 'entry' or 'exit'
            -- source: 'device' or 'manual'
            CREATE TABLE IF NOT EXISTS punches (
                id TEXT PRIMARY KEY,
                employee_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                source TEXT NOT NULL DEFAULT 'device',
                recorded_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_punches_timestamp ON punches(timestamp);
            CREATE INDEX IF NOT EXISTS idx_punches_employee ON punches(employee_id);

            -- Breaks table: end_time is NULL while the break is open
            CREATE TABLE IF NOT EXISTS breaks (
                id TEXT PRIMARY KEY,
                employee_id TEXT NOT NULL,
                start_time TEXT NOT NULL,
                end_time TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_breaks_start ON breaks(start_time);
            CREATE INDEX IF NOT EXISTS idx_breaks_employee ON breaks(employee_id);
            ",
        )?;
        Ok(())
    }

    /// Inserts a batch of punches, ignoring duplicates by ID.
    pub fn insert_punches(&mut self, punches: &[AttendancePunch]) -> Result<usize, DbError> {
        if punches.is_empty() {
            return Ok(0);
        }
        let recorded_at = format_timestamp(Utc::now());
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "
                INSERT OR IGNORE INTO punches (id, employee_id, kind, timestamp, source, recorded_at)
                VALUES (?, ?, ?, ?, ?, ?)
                ",
            )?;
            for punch in punches {
                inserted += stmt.execute(params![
                    punch.id.as_str(),
                    punch.employee_id.as_str(),
                    punch.kind.as_str(),
                    format_timestamp(punch.timestamp),
                    punch.source.as_str(),
                    recorded_at,
                ])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    /// Appends a single corrective punch.
    ///
    /// Returns `false` if a punch with the same ID already exists.
    pub fn append_punch(&mut self, punch: &AttendancePunch) -> Result<bool, DbError> {
        let inserted = self.insert_punches(std::slice::from_ref(punch))? > 0;
        tracing::debug!(
            punch = %punch.id,
            employee = %punch.employee_id,
            source = %punch.source,
            inserted,
            "appended punch"
        );
        Ok(inserted)
    }

    /// Inserts a batch of breaks, ignoring duplicates by ID.
    pub fn insert_breaks(&mut self, breaks: &[BreakInterval]) -> Result<usize, DbError> {
        if breaks.is_empty() {
            return Ok(0);
        }
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "
                INSERT OR IGNORE INTO breaks (id, employee_id, start_time, end_time)
                VALUES (?, ?, ?, ?)
                ",
            )?;
            for interval in breaks {
                inserted += stmt.execute(params![
                    interval.id.as_str(),
                    interval.employee_id.as_str(),
                    format_timestamp(interval.start_time),
                    interval.end_time.map(format_timestamp),
                ])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    /// Inserts or renames directory entries.
    pub fn upsert_employees(&mut self, employees: &[EmployeeRecord]) -> Result<usize, DbError> {
        if employees.is_empty() {
            return Ok(0);
        }
        let tx = self.conn.transaction()?;
        let mut written = 0;
        {
            let mut stmt = tx.prepare(
                "
                INSERT INTO employees (id, name) VALUES (?, ?)
                ON CONFLICT(id) DO UPDATE SET name = COALESCE(excluded.name, employees.name)
                ",
            )?;
            for employee in employees {
                written += stmt.execute(params![employee.id, employee.name])?;
            }
        }
        tx.commit()?;
        Ok(written)
    }

    /// Lists all punches ordered by timestamp then insertion order.
    pub fn list_punches(&self) -> Result<Vec<PunchRecord>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT id, employee_id, kind, timestamp, source
            FROM punches
            ORDER BY timestamp ASC, rowid ASC
            ",
        )?;
        let rows = stmt.query_map([], punch_from_row)?;
        let mut punches = Vec::new();
        for row in rows {
            punches.push(row?);
        }
        Ok(punches)
    }

    /// Lists punches within a time range.
    ///
    /// The range is inclusive of `start` and exclusive of `end`.
    pub fn list_punches_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<PunchRecord>, DbError> {
        if end <= start {
            return Ok(Vec::new());
        }
        let mut stmt = self.conn.prepare(
            "
            SELECT id, employee_id, kind, timestamp, source
            FROM punches
            WHERE timestamp >= ? AND timestamp < ?
            ORDER BY timestamp ASC, rowid ASC
            ",
        )?;
        let rows = stmt.query_map(
            [format_timestamp(start), format_timestamp(end)],
            punch_from_row,
        )?;
        let mut punches = Vec::new();
        for row in rows {
            punches.push(row?);
        }
        Ok(punches)
    }

    /// Lists all breaks ordered by start time.
    pub fn list_breaks(&self) -> Result<Vec<BreakRecord>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT id, employee_id, start_time, end_time
            FROM breaks
            ORDER BY start_time ASC, rowid ASC
            ",
        )?;
        let rows = stmt.query_map([], break_from_row)?;
        let mut breaks = Vec::new();
        for row in rows {
            breaks.push(row?);
        }
        Ok(breaks)
    }

    /// Lists breaks starting within a time range.
    ///
    /// The range is inclusive of `start` and exclusive of `end`.
    pub fn list_breaks_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<BreakRecord>, DbError> {
        if end <= start {
            return Ok(Vec::new());
        }
        let mut stmt = self.conn.prepare(
            "
            SELECT id, employee_id, start_time, end_time
            FROM breaks
            WHERE start_time >= ? AND start_time < ?
            ORDER BY start_time ASC, rowid ASC
            ",
        )?;
        let rows = stmt.query_map(
            [format_timestamp(start), format_timestamp(end)],
            break_from_row,
        )?;
        let mut breaks = Vec::new();
        for row in rows {
            breaks.push(row?);
        }
        Ok(breaks)
    }

    /// Lists the employee directory ordered by ID.
    pub fn list_employees(&self) -> Result<Vec<EmployeeRecord>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name FROM employees ORDER BY id ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok(EmployeeRecord {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?;
        let mut employees = Vec::new();
        for row in rows {
            employees.push(row?);
        }
        Ok(employees)
    }

    /// Lists the most recent punch per employee, most recent first.
    pub fn last_punch_by_employee(&self) -> Result<Vec<EmployeeLastPunch>, DbError> {
        // SQLite returns the bare `kind` column from the row holding MAX(timestamp)
        let mut stmt = self.conn.prepare(
            "
            SELECT employee_id, kind, MAX(timestamp) AS last_punch
            FROM punches
            GROUP BY employee_id
            ORDER BY last_punch DESC, employee_id ASC
            ",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(EmployeeLastPunch {
                employee_id: row.get(0)?,
                kind: row.get(1)?,
                last_punch: row.get(2)?,
            })
        })?;
        let mut latest = Vec::new();
        for row in rows {
            latest.push(row?);
        }
        Ok(latest)
    }

    /// Counts rows in each table.
    pub fn counts(&self) -> Result<RecordCounts, DbError> {
        let count = |table: &str| -> Result<usize, DbError> {
            let n: i64 = self
                .conn
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
            Ok(usize::try_from(n).unwrap_or_default())
        };
        Ok(RecordCounts {
            employees: count("employees")?,
            punches: count("punches")?,
            breaks: count("breaks")?,
        })
    }

    /// Loads punches and breaks as typed values for reconstruction.
    ///
    /// With a range, punches are filtered by timestamp and breaks by start
    /// time, both half-open `[start, end)`.
    pub fn load_attendance(
        &self,
        range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Result<AttendanceLog, DbError> {
        let (punches, breaks) = match range {
            Some((start, end)) => (
                self.list_punches_in_range(start, end)?,
                self.list_breaks_in_range(start, end)?,
            ),
            None => (self.list_punches()?, self.list_breaks()?),
        };

        let log = AttendanceLog {
            punches: punches
                .into_iter()
                .map(PunchRecord::into_punch)
                .collect::<Result<_, _>>()?,
            breaks: breaks
                .into_iter()
                .map(BreakRecord::into_break)
                .collect::<Result<_, _>>()?,
        };
        tracing::debug!(
            punches = log.punches.len(),
            breaks = log.breaks.len(),
            "loaded attendance"
        );
        Ok(log)
    }
}

impl PunchRecord {
    /// Parses the stored strings into a typed punch.
    pub fn into_punch(self) -> Result<AttendancePunch, DbError> {
        let timestamp = parse_timestamp(&self.timestamp, &self.id)?;
        let invalid = |message: String| DbError::InvalidRecord {
            record_id: self.id.clone(),
            message,
        };
        let kind: PunchKind = self.kind.parse().map_err(|e| invalid(format!("{e}")))?;
        let source: PunchSource = self.source.parse().map_err(|e| invalid(format!("{e}")))?;
        let employee_id = EmployeeId::new(self.employee_id.as_str()).map_err(|e| invalid(format!("{e}")))?;
        let id = PunchId::new(self.id.as_str()).map_err(|e| invalid(format!("{e}")))?;
        Ok(AttendancePunch {
            id,
            employee_id,
            kind,
            timestamp,
            source,
        })
    }
}

impl BreakRecord {
    /// Parses the stored strings into a typed break interval.
    pub fn into_break(self) -> Result<BreakInterval, DbError> {
        let start_time = parse_timestamp(&self.start_time, &self.id)?;
        let end_time = self
            .end_time
            .as_deref()
            .map(|end| parse_timestamp(end, &self.id))
            .transpose()?;
        let invalid = |message: String| DbError::InvalidRecord {
            record_id: self.id.clone(),
            message,
        };
        let employee_id = EmployeeId::new(self.employee_id.as_str()).map_err(|e| invalid(format!("{e}")))?;
        let id = BreakId::new(self.id.as_str()).map_err(|e| invalid(format!("{e}")))?;
        Ok(BreakInterval {
            id,
            employee_id,
            start_time,
            end_time,
        })
    }
}

fn punch_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PunchRecord> {
    Ok(PunchRecord {
        id: row.get(0)?,
        employee_id: row.get(1)?,
        kind: row.get(2)?,
        timestamp: row.get(3)?,
        source: row.get(4)?,
    })
}

fn break_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<BreakRecord> {
    Ok(BreakRecord {
        id: row.get(0)?,
        employee_id: row.get(1)?,
        start_time: row.get(2)?,
        end_time: row.get(3)?,
    })
}

fn parse_timestamp(timestamp: &str, record_id: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|source| DbError::TimestampParse {
            record_id: record_id.to_string(),
            timestamp: timestamp.to_string(),
            source,
        })
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}
