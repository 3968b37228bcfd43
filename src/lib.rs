pub mod cli;
pub mod commands;
pub mod config;
pub mod generate;
pub mod notmuch;
pub mod pipeline;
pub mod report;
pub mod runner;

/// UTC timestamp used in log and report file names
pub const FILE_STAMP_FORMAT: &str = "%Y%m%dT%H%M%SZ";
