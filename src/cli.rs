//! Command line surface: argument parsing, config loading and dispatch.

use std::path::PathBuf;

use clap::{Args, CommandFactory, Parser, Subcommand};

use crate::commands::backup::run_backup;
use crate::commands::doctor::run_doctor;
use crate::commands::index::run_index;
use crate::commands::run::run_all;
use crate::commands::sync::run_sync;
use crate::commands::verify::run_verify;
use crate::commands::{prepare_generated, StepOptions};
use crate::config::{Config, ConfigError};
use crate::generate::GeneratedConfigPaths;
use crate::runner::RunResult;

#[derive(Parser, Debug)]
#[command(name = "email-archiver")]
#[command(author, version, about = "Sync, index, verify and back up IMAP mail archives", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Mirror IMAP folders into the local maildir with mbsync
    Sync(CommonArgs),
    /// Index the maildir with notmuch
    Index(CommonArgs),
    /// Check the index and write a verification report
    Verify(CommonArgs),
    /// Run the configured backup command
    Backup(CommonArgs),
    /// Sync, index, verify, then back up only if verification passed
    Run(CommonArgs),
    /// Check tools, secrets and paths
    Doctor(CommonArgs),
}

#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// Path to config.toml
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Account to operate on (default: all accounts)
    #[arg(short, long)]
    pub account: Option<String>,
    /// Stream subprocess output and print extra detail
    #[arg(short, long)]
    pub verbose: bool,
    /// Print what would run without executing anything
    #[arg(long)]
    pub dry_run: bool,
}

impl Command {
    pub fn common(&self) -> &CommonArgs {
        match self {
            Command::Sync(args)
            | Command::Index(args)
            | Command::Verify(args)
            | Command::Backup(args)
            | Command::Run(args)
            | Command::Doctor(args) => args,
        }
    }
}

impl CommonArgs {
    fn step_options(&self) -> StepOptions {
        StepOptions {
            verbose: self.verbose,
            dry_run: self.dry_run,
        }
    }
}

/// Map a step exit code onto a process exit status. Anything the OS could not
/// carry, such as the "could not run" sentinel, becomes a generic failure.
pub fn process_exit_code(code: i32) -> i32 {
    match code {
        0 => 0,
        1..=255 => code,
        _ => 1,
    }
}

fn load_config(args: &CommonArgs) -> Result<Config, ConfigError> {
    let config = Config::load(args.config.as_deref())?;
    if let Some(name) = args.account.as_deref() {
        if config.get_account(name).is_none() {
            return Err(ConfigError::Invalid {
                field: "account".to_string(),
                message: format!(
                    "unknown account '{}' (configured: {})",
                    name,
                    config.account_names().join(", ")
                ),
            });
        }
    }
    Ok(config)
}

fn step_exit(result: &RunResult) -> i32 {
    process_exit_code(result.exit_code)
}

/// Execute a parsed command line and return the process exit code
pub fn run(cli: Cli) -> i32 {
    let Some(command) = cli.command else {
        let _ = Cli::command().print_help();
        println!();
        return 1;
    };

    let args = command.common();
    let config = match load_config(args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return 1;
        }
    };
    tracing::debug!(accounts = ?config.account_names(), "configuration loaded");

    let account = args.account.as_deref();
    let opts = args.step_options();

    match &command {
        Command::Sync(_) => with_generated(&config, opts.dry_run, |paths| {
            step_exit(&run_sync(&config, account, opts, &paths.mbsyncrc))
        }),
        Command::Index(_) => with_generated(&config, opts.dry_run, |paths| {
            step_exit(&run_index(&config, opts, &paths.notmuch_config))
        }),
        Command::Verify(_) => with_generated(&config, opts.dry_run, |paths| {
            let outcome = run_verify(&config, account, opts, &paths.notmuch_config);
            if outcome.passed() { 0 } else { 1 }
        }),
        Command::Backup(_) => step_exit(&run_backup(&config, opts)),
        Command::Run(_) => match run_all(&config, account, opts) {
            Ok(outcome) => process_exit_code(outcome.exit_code),
            Err(e) => {
                eprintln!("Error: {:#}", e);
                1
            }
        },
        Command::Doctor(_) => {
            if run_doctor(&config, args.verbose) { 0 } else { 1 }
        }
    }
}

fn with_generated(config: &Config, dry_run: bool, step: impl FnOnce(&GeneratedConfigPaths) -> i32) -> i32 {
    match prepare_generated(config, dry_run) {
        Ok(paths) => step(&paths),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            1
        }
    }
}
