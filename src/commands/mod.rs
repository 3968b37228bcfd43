//! Step runners behind each CLI subcommand.

pub mod backup;
pub mod doctor;
pub mod index;
pub mod run;
pub mod sync;
pub mod verify;

use anyhow::{Context, Result};

use crate::config::Config;
use crate::generate::{write_generated_configs, GeneratedConfigPaths};

/// Label used for logs and reports when no account is selected
pub const DEFAULT_ACCOUNT_LABEL: &str = "default";

/// Most stderr shown in a one-line failure report
pub const STDERR_EXCERPT_CHARS: usize = 500;

#[derive(Debug, Clone, Copy, Default)]
pub struct StepOptions {
    pub verbose: bool,
    pub dry_run: bool,
}

pub fn account_label(account: Option<&str>) -> &str {
    account.unwrap_or(DEFAULT_ACCOUNT_LABEL)
}

pub fn print_dry_run(command: &[String]) {
    println!("[dry-run] Would execute: {}", command.join(" "));
}

/// Write the generated tool configs, or on a dry run only report where they
/// would go.
pub fn prepare_generated(config: &Config, dry_run: bool) -> Result<GeneratedConfigPaths> {
    if dry_run {
        let paths = GeneratedConfigPaths::in_dir(&config.paths.generated_config_dir);
        println!(
            "[dry-run] Would write generated configs to {}",
            config.paths.generated_config_dir.display()
        );
        return Ok(paths);
    }
    write_generated_configs(config).with_context(|| {
        format!(
            "Could not write generated configs to {}",
            config.paths.generated_config_dir.display()
        )
    })
}
