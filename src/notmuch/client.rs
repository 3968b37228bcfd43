use chrono::{DateTime, Utc};
use std::path::Path;
use std::time::Duration;

use super::types::{SortOrder, ThreadSummary};
use crate::generate::NOTMUCH_CONFIG_ENV;
use crate::runner::{run_command, RunOptions, RunResult};

/// notmuch invocations bound to one generated config file
pub struct Notmuch<'a> {
    program: &'a str,
    config_path: &'a Path,
}

impl<'a> Notmuch<'a> {
    pub fn new(program: &'a str, config_path: &'a Path) -> Self {
        Self {
            program,
            config_path,
        }
    }

    pub fn command(&self, args: &[&str]) -> Vec<String> {
        let mut cmd = vec![self.program.to_string()];
        cmd.extend(args.iter().map(|a| a.to_string()));
        cmd
    }

    pub fn options(&self) -> RunOptions {
        RunOptions::default().with_env(NOTMUCH_CONFIG_ENV, self.config_path.to_string_lossy())
    }

    fn run(&self, args: &[&str]) -> RunResult {
        run_command(&self.command(args), &self.options())
    }

    /// `notmuch new`: scan the maildir and index new mail
    pub fn new_mail(&self, stream: bool, timeout: Option<Duration>) -> RunResult {
        let opts = RunOptions {
            stream,
            timeout,
            ..self.options()
        };
        run_command(&self.command(&["new"]), &opts)
    }

    /// `notmuch count '*'`, with the count only when the query succeeded
    pub fn count_all(&self) -> (RunResult, Option<u64>) {
        let result = self.run(&["count", "*"]);
        let count = if result.ok() {
            parse_count(&result.stdout)
        } else {
            None
        };
        (result, count)
    }

    /// Date of the oldest or newest indexed message
    pub fn date_boundary(&self, sort: SortOrder) -> (RunResult, Option<String>) {
        let sort_arg = format!("--sort={}", sort.as_str());
        let result = self.run(&["search", "--format=json", &sort_arg, "--limit=1", "*"]);
        let date = if result.ok() {
            parse_boundary(&result.stdout)
        } else {
            None
        };
        (result, date)
    }
}

pub fn parse_count(stdout: &str) -> Option<u64> {
    stdout.trim().parse().ok()
}

/// First summary's timestamp as ISO-8601 UTC, falling back to its relative
/// date. Anything unparseable yields `None`.
pub fn parse_boundary(stdout: &str) -> Option<String> {
    let stdout = stdout.trim();
    if stdout.is_empty() {
        return None;
    }

    let threads: Vec<ThreadSummary> = serde_json::from_str(stdout).ok()?;
    let first = threads.into_iter().next()?;

    if let Some(date) = first.timestamp.filter(|&ts| ts != 0).and_then(format_timestamp) {
        return Some(date);
    }
    first.date_relative.filter(|d| !d.trim().is_empty())
}

/// Unix seconds as `2020-01-01T00:00:00+00:00`
pub fn format_timestamp(ts: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp(ts, 0).map(|dt| dt.to_rfc3339())
}
