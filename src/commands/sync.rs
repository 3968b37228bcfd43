use chrono::Utc;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::{account_label, print_dry_run, StepOptions, STDERR_EXCERPT_CHARS};
use crate::config::Config;
use crate::runner::{run_command, RunOptions, RunResult};
use crate::FILE_STAMP_FORMAT;

/// mbsync invocation: the account's group when one is selected, else `-a`
pub fn sync_command(config: &Config, account: Option<&str>, verbose: bool, mbsyncrc: &Path) -> Vec<String> {
    let mut cmd = vec![
        config.tools.mbsync.clone(),
        "-c".to_string(),
        mbsyncrc.to_string_lossy().into_owned(),
    ];
    if verbose {
        cmd.push("-V".to_string());
    }
    match account {
        Some(name) => cmd.push(name.to_string()),
        None => cmd.push("-a".to_string()),
    }
    cmd
}

fn render_log(result: &RunResult) -> String {
    format!(
        "command: {}\nexit_code: {}\nduration: {:.1}s\n--- stdout ---\n{}\n--- stderr ---\n{}\n",
        result.command_line(),
        result.exit_code,
        result.duration_seconds,
        result.stdout,
        result.stderr
    )
}

/// Write `logs_dir/<account>/sync-<stamp>.log`
pub fn write_log(config: &Config, result: &RunResult, account: &str) -> io::Result<PathBuf> {
    let dir = config.paths.logs_dir.join(account);
    fs::create_dir_all(&dir)?;

    let stamp = Utc::now().format(FILE_STAMP_FORMAT);
    let path = dir.join(format!("sync-{}.log", stamp));
    fs::write(&path, render_log(result))?;
    Ok(path)
}

/// Run mbsync against the generated config. A run log is written whether
/// or not the sync succeeded.
pub fn run_sync(config: &Config, account: Option<&str>, opts: StepOptions, mbsyncrc: &Path) -> RunResult {
    let cmd = sync_command(config, account, opts.verbose, mbsyncrc);

    if opts.dry_run {
        print_dry_run(&cmd);
        return RunResult::dry_run(cmd);
    }

    println!("Running: {}", cmd.join(" "));
    let run_opts = RunOptions {
        stream: opts.verbose,
        timeout: config.orchestration.step_timeout(),
        ..RunOptions::default()
    };
    let result = run_command(&cmd, &run_opts);

    match write_log(config, &result, account_label(account)) {
        Ok(path) => {
            if opts.verbose {
                println!("Log written to {}", path.display());
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "could not write sync log");
            println!("Warning: could not write sync log: {}", e);
        }
    }

    if result.ok() {
        println!("Sync completed successfully ({:.1}s)", result.duration_seconds);
    } else {
        println!("Sync failed (exit {})", result.exit_code);
        if !result.stderr.is_empty() {
            println!("stderr: {}", result.stderr_excerpt(STDERR_EXCERPT_CHARS));
        }
    }
    result
}
