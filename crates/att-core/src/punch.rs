//! Raw attendance inputs: clock punches and break intervals.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{BreakId, EmployeeId, PunchId, PunchSource, ValidationError};

/// Direction of a clock action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PunchKind {
    Entry,
    Exit,
}

impl PunchKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Entry => "entry",
            Self::Exit => "exit",
        }
    }
}

impl fmt::Display for PunchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PunchKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "entry" | "entrada" => Ok(Self::Entry),
            "exit" | "salida" => Ok(Self::Exit),
            _ => Err(ValidationError::UnknownPunchKind {
                value: s.to_string(),
            }),
        }
    }
}

impl Serialize for PunchKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for PunchKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A single timestamped entry or exit event for one employee.
///
/// Punches are immutable and append-only. Corrections add new punches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendancePunch {
    pub id: PunchId,
    pub employee_id: EmployeeId,
    pub kind: PunchKind,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub source: PunchSource,
}

/// A break taken by an employee.
///
/// `end_time = None` means the break was never closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakInterval {
    pub id: BreakId,
    pub employee_id: EmployeeId,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
}

impl BreakInterval {
    /// Whole minutes between start and end.
    ///
    /// Open breaks and intervals that end before they start contribute 0.
    pub fn duration_minutes(&self) -> i64 {
        self.end_time
            .map_or(0, |end| (end - self.start_time).num_minutes().max(0))
    }
}

/// The complete batch of attendance data for one reconstruction pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceLog {
    pub punches: Vec<AttendancePunch>,
    pub breaks: Vec<BreakInterval>,
}
