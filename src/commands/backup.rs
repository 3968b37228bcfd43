use std::time::Duration;

use super::{print_dry_run, StepOptions, STDERR_EXCERPT_CHARS};
use crate::config::Config;
use crate::runner::{run_command, RunOptions, RunResult};

pub const NO_BACKUP_NOTE: &str = "No backup command configured";

/// Split the configured command line shell-style. `Ok(None)` when no command
/// is configured, `Err` on unbalanced quotes.
pub fn backup_command(config: &Config) -> Result<Option<Vec<String>>, String> {
    let line = config.backup.command.trim();
    if line.is_empty() {
        return Ok(None);
    }
    match shlex::split(line) {
        Some(argv) if !argv.is_empty() => Ok(Some(argv)),
        Some(_) => Ok(None),
        None => Err(format!("Could not parse backup command: {}", line)),
    }
}

/// Run the configured backup command. No command configured is a successful
/// no-op, not a failure.
pub fn run_backup(config: &Config, opts: StepOptions) -> RunResult {
    let cmd = match backup_command(config) {
        Ok(Some(cmd)) => cmd,
        Ok(None) => {
            println!("No backup command configured. Skipping backup.");
            return RunResult::skipped(NO_BACKUP_NOTE);
        }
        Err(reason) if opts.dry_run => {
            // A preview never fails; the raw line is shown as configured
            tracing::warn!(%reason, "backup command will not run as configured");
            let raw = vec![config.backup.command.trim().to_string()];
            print_dry_run(&raw);
            return RunResult::dry_run(raw);
        }
        Err(reason) => {
            println!("Backup failed: {}", reason);
            return RunResult::not_run(vec![config.backup.command.clone()], reason, Duration::ZERO);
        }
    };

    if opts.dry_run {
        print_dry_run(&cmd);
        return RunResult::dry_run(cmd);
    }

    println!("Running backup: {}", cmd.join(" "));
    let run_opts = RunOptions {
        stream: opts.verbose,
        timeout: config.orchestration.step_timeout(),
        ..RunOptions::default()
    };
    let result = run_command(&cmd, &run_opts);

    if result.ok() {
        println!("Backup completed successfully ({:.1}s)", result.duration_seconds);
    } else {
        println!("Backup failed (exit {})", result.exit_code);
        if !result.stderr.is_empty() {
            println!("stderr: {}", result.stderr_excerpt(STDERR_EXCERPT_CHARS));
        }
    }
    result
}
