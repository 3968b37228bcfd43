//! Verification-gated pipeline: sync, index, verify, then backup.
//!
//! Steps run strictly in order and the first failure ends the run with that
//! step's exit code. Backup is only reachable after a verification that
//! passed in the same run; `backup_after_verify` can skip it but never
//! force it.

use anyhow::Result;
use std::fmt;

use crate::commands::verify::VerifyOutcome;
use crate::config::Config;
use crate::generate::GeneratedConfigPaths;
use crate::runner::RunResult;

/// Exit code when verification did not pass
pub const VERIFY_FAILED_EXIT_CODE: i32 = 1;

/// The four steps, plus config generation, as seen by the orchestrator
pub trait Steps {
    /// Produce the generated config files; called once per run
    fn prepare(&mut self) -> Result<GeneratedConfigPaths>;
    fn sync(&mut self, generated: &GeneratedConfigPaths) -> RunResult;
    fn index(&mut self, generated: &GeneratedConfigPaths) -> RunResult;
    fn verify(&mut self, generated: &GeneratedConfigPaths) -> VerifyOutcome;
    fn backup(&mut self) -> RunResult;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    Syncing,
    Indexing,
    Verifying,
    BackingUp,
    Skipped,
    Done,
    Failed(FailedStep),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailedStep {
    Sync,
    Index,
    Verify,
    Backup,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Init => write!(f, "init"),
            Stage::Syncing => write!(f, "syncing"),
            Stage::Indexing => write!(f, "indexing"),
            Stage::Verifying => write!(f, "verifying"),
            Stage::BackingUp => write!(f, "backing up"),
            Stage::Skipped => write!(f, "backup skipped"),
            Stage::Done => write!(f, "done"),
            Stage::Failed(step) => write!(f, "failed ({:?})", step),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOutcome {
    /// Terminal stage: `Done` or `Failed`
    pub stage: Stage,
    pub exit_code: i32,
    /// Whether backup was skipped by configuration after a passing verify
    pub backup_skipped: bool,
}

fn banner(title: &str) {
    println!();
    println!("{}", "=".repeat(60));
    println!("{}", title);
    println!("{}", "=".repeat(60));
}

fn transition(from: Stage, to: Stage) -> Stage {
    tracing::debug!(from = %from, to = %to, "pipeline transition");
    to
}

/// Drive the steps to completion and return the terminal stage with the exit
/// code for the caller. Only a failure to produce the generated configs is an
/// error; step failures are reported through the outcome.
pub fn run_pipeline<S: Steps>(config: &Config, steps: &mut S) -> Result<PipelineOutcome> {
    let generated = steps.prepare()?;

    let mut stage = transition(Stage::Init, Stage::Syncing);
    let mut backup_skipped = false;

    let exit_code = loop {
        match stage {
            Stage::Syncing => {
                banner("Step 1/4: Sync");
                let result = steps.sync(&generated);
                if !result.ok() {
                    println!("\nSync failed, aborting pipeline.");
                    stage = transition(stage, Stage::Failed(FailedStep::Sync));
                    break result.exit_code;
                }
                stage = transition(stage, Stage::Indexing);
            }
            Stage::Indexing => {
                banner("Step 2/4: Index");
                let result = steps.index(&generated);
                if !result.ok() {
                    println!("\nIndex failed, aborting pipeline.");
                    stage = transition(stage, Stage::Failed(FailedStep::Index));
                    break result.exit_code;
                }
                stage = transition(stage, Stage::Verifying);
            }
            Stage::Verifying => {
                banner("Step 3/4: Verify");
                let outcome = steps.verify(&generated);
                if !outcome.passed() {
                    println!("\nVerification FAILED, skipping backup.");
                    stage = transition(stage, Stage::Failed(FailedStep::Verify));
                    break VERIFY_FAILED_EXIT_CODE;
                }
                stage = if config.orchestration.backup_after_verify {
                    transition(stage, Stage::BackingUp)
                } else {
                    transition(stage, Stage::Skipped)
                };
            }
            Stage::BackingUp => {
                banner("Step 4/4: Backup (verify passed)");
                let result = steps.backup();
                if !result.ok() {
                    println!("\nBackup failed.");
                    stage = transition(stage, Stage::Failed(FailedStep::Backup));
                    break result.exit_code;
                }
                stage = transition(stage, Stage::Done);
            }
            Stage::Skipped => {
                println!("\nBackup disabled by orchestration.backup_after_verify.");
                backup_skipped = true;
                stage = transition(stage, Stage::Done);
            }
            Stage::Done => {
                println!("\nPipeline completed successfully.");
                break 0;
            }
            Stage::Init | Stage::Failed(_) => unreachable!("pipeline loop entered {}", stage),
        }
    };

    Ok(PipelineOutcome {
        stage,
        exit_code,
        backup_skipped,
    })
}
