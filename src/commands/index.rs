use std::path::Path;

use super::{print_dry_run, StepOptions, STDERR_EXCERPT_CHARS};
use crate::config::Config;
use crate::generate::ensure_notmuch_init;
use crate::notmuch::Notmuch;
use crate::runner::RunResult;

/// Run `notmuch new` against the generated notmuch config, creating the
/// database first if needed.
pub fn run_index(config: &Config, opts: StepOptions, notmuch_config: &Path) -> RunResult {
    let notmuch = Notmuch::new(&config.tools.notmuch, notmuch_config);
    let cmd = notmuch.command(&["new"]);

    if opts.dry_run {
        print_dry_run(&cmd);
        return RunResult::dry_run(cmd);
    }

    ensure_notmuch_init(config, notmuch_config);

    println!("Running: {}", cmd.join(" "));
    let result = notmuch.new_mail(opts.verbose, config.orchestration.step_timeout());

    if result.ok() {
        println!("Index completed successfully ({:.1}s)", result.duration_seconds);
        let summary = result.stdout.trim();
        if !summary.is_empty() {
            println!("  {}", summary);
        }
    } else {
        println!("Index failed (exit {})", result.exit_code);
        if !result.stderr.is_empty() {
            println!("stderr: {}", result.stderr_excerpt(STDERR_EXCERPT_CHARS));
        }
    }
    result
}
