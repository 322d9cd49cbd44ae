//! Attendance CLI library.
//!
//! This crate provides the command-line interface over the attendance store
//! and the shift reconstruction engine.

mod cli;
pub mod commands;
mod config;

pub use cli::{Cli, Commands};
pub use config::Config;
