//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::commands::correct::CorrectExitArgs;
use crate::commands::shifts::ShiftsArgs;

/// Attendance shift reconstruction.
///
/// Rebuilds work shifts from raw clock punches and break records, and lets an
/// operator close shifts whose exit punch is missing.
#[derive(Debug, Parser)]
#[command(name = "att", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show store contents and the last punch per employee.
    Status,

    /// Import punches, breaks and employees as JSONL from stdin.
    Import,

    /// Reconstruct and list shifts.
    Shifts(ShiftsArgs),

    /// Close a shift by recording a manual exit punch.
    CorrectExit(CorrectExitArgs),
}
