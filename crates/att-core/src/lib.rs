//! Core domain logic for attendance shift reconstruction.
//!
//! This crate contains the fundamental types and logic for:
//! - Reconstruction: turning raw entry/exit punches and breaks into shifts
//! - Correction: appending operator-supplied exit punches
//! - Output shaping: durations, status labels and summary counters
//!
//! Nothing here performs I/O or reads the system clock; `now` is always a
//! parameter.

pub mod correction;
mod punch;
mod reconstruct;
mod shift;
pub mod types;

pub use correction::{CorrectionError, apply_manual_exit, manual_exit_punch, parse_wall_clock};
pub use punch::{AttendanceLog, AttendancePunch, BreakInterval, PunchKind};
pub use reconstruct::{ReconstructionConfig, reconstruct, reconstruct_log};
pub use shift::{
    Shift, ShiftStatus, ShiftSummary, elapsed_minutes, format_minutes, sort_by_entry_desc,
};
pub use types::{BreakId, EmployeeId, PunchId, PunchSource, ValidationError};
