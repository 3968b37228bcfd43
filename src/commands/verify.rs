use std::path::Path;

use super::{account_label, StepOptions};
use crate::config::Config;
use crate::generate::ensure_notmuch_init;
use crate::notmuch::{Notmuch, SortOrder};
use crate::report::{build_report, write_report, VerificationReport};
use crate::runner::RunResult;

#[derive(Debug, Clone)]
pub enum VerifyOutcome {
    /// Checks ran; the report has been written (or the write was warned about)
    Checked(VerificationReport),
    /// Dry run: nothing executed and no report exists
    Previewed,
}

impl VerifyOutcome {
    /// Whether the pipeline may continue. A preview never produces a PASS
    /// report, it only lets the rest of a dry run be previewed too.
    pub fn passed(&self) -> bool {
        match self {
            VerifyOutcome::Checked(report) => report.passed(),
            VerifyOutcome::Previewed => true,
        }
    }

    pub fn report(&self) -> Option<&VerificationReport> {
        match self {
            VerifyOutcome::Checked(report) => Some(report),
            VerifyOutcome::Previewed => None,
        }
    }
}

fn log_boundary_query(label: &str, result: &RunResult, date: Option<&str>) {
    // Boundary failures only matter through the missing date, but keep the
    // query result around for diagnosis.
    if !result.ok() {
        tracing::debug!(
            boundary = label,
            summary = %result.summary(),
            stderr = %result.stderr,
            "boundary query failed"
        );
    } else if date.is_none() {
        tracing::debug!(boundary = label, stdout = %result.stdout, "boundary query returned no date");
    }
}

/// Query the index for message count and date coverage, decide PASS/FAIL,
/// and write the report pair.
pub fn run_verify(
    config: &Config,
    account: Option<&str>,
    opts: StepOptions,
    notmuch_config: &Path,
) -> VerifyOutcome {
    let notmuch = Notmuch::new(&config.tools.notmuch, notmuch_config);
    let acct_name = account_label(account);

    if opts.dry_run {
        println!("[dry-run] Would verify account '{}' with:", acct_name);
        for args in [
            vec!["count", "*"],
            vec!["search", "--format=json", "--sort=oldest-first", "--limit=1", "*"],
            vec!["search", "--format=json", "--sort=newest-first", "--limit=1", "*"],
        ] {
            println!("  {}", notmuch.command(&args).join(" "));
        }
        return VerifyOutcome::Previewed;
    }

    ensure_notmuch_init(config, notmuch_config);

    println!("Running verification for account '{}'...", acct_name);

    let (count_result, message_count) = notmuch.count_all();
    if opts.verbose {
        println!("  notmuch count: {:?}", message_count);
    }
    if !count_result.ok() {
        tracing::debug!(summary = %count_result.summary(), stderr = %count_result.stderr, "count query failed");
    }

    let (oldest_result, oldest) = notmuch.date_boundary(SortOrder::OldestFirst);
    log_boundary_query("oldest", &oldest_result, oldest.as_deref());
    let (newest_result, newest) = notmuch.date_boundary(SortOrder::NewestFirst);
    log_boundary_query("newest", &newest_result, newest.as_deref());
    if opts.verbose {
        println!("  oldest message: {:?}", oldest);
        println!("  newest message: {:?}", newest);
    }

    let report = build_report(acct_name, &count_result, message_count, oldest, newest);

    match write_report(&report, &config.paths.verification_dir) {
        Ok(paths) => {
            println!("  Report written to:");
            println!("    JSON: {}", paths.json.display());
            println!("    Text: {}", paths.text.display());
        }
        Err(e) => {
            tracing::warn!(error = %e, "could not write verification report");
            println!("  Warning: could not write verification report: {}", e);
        }
    }

    print_summary(&report);
    VerifyOutcome::Checked(report)
}

fn print_summary(report: &VerificationReport) {
    match report.failure_reason() {
        None => println!(
            "  Verification: PASS ({} messages, {} -> {})",
            report.notmuch.total_message_count.unwrap_or_default(),
            report.coverage.oldest_message.as_deref().unwrap_or("?"),
            report.coverage.newest_message.as_deref().unwrap_or("?"),
        ),
        Some(reason) => {
            println!("  Verification: FAIL");
            println!("    {}", reason);
        }
    }
}
