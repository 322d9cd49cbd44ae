//! CLI subcommand implementations.

pub mod correct;
pub mod import;
pub mod shifts;
pub mod status;
pub mod util;
