use anyhow::Result;

use super::backup::run_backup;
use super::index::run_index;
use super::sync::run_sync;
use super::verify::{run_verify, VerifyOutcome};
use super::{prepare_generated, StepOptions};
use crate::config::Config;
use crate::generate::GeneratedConfigPaths;
use crate::pipeline::{run_pipeline, PipelineOutcome, Steps};
use crate::runner::RunResult;

/// Steps backed by the real external tools
pub struct ToolSteps<'a> {
    config: &'a Config,
    account: Option<&'a str>,
    opts: StepOptions,
}

impl<'a> ToolSteps<'a> {
    pub fn new(config: &'a Config, account: Option<&'a str>, opts: StepOptions) -> Self {
        Self {
            config,
            account,
            opts,
        }
    }
}

impl Steps for ToolSteps<'_> {
    fn prepare(&mut self) -> Result<GeneratedConfigPaths> {
        prepare_generated(self.config, self.opts.dry_run)
    }

    fn sync(&mut self, generated: &GeneratedConfigPaths) -> RunResult {
        run_sync(self.config, self.account, self.opts, &generated.mbsyncrc)
    }

    fn index(&mut self, generated: &GeneratedConfigPaths) -> RunResult {
        run_index(self.config, self.opts, &generated.notmuch_config)
    }

    fn verify(&mut self, generated: &GeneratedConfigPaths) -> VerifyOutcome {
        run_verify(self.config, self.account, self.opts, &generated.notmuch_config)
    }

    fn backup(&mut self) -> RunResult {
        run_backup(self.config, self.opts)
    }
}

/// Full sync, index, verify, backup run against the configured tools
pub fn run_all(config: &Config, account: Option<&str>, opts: StepOptions) -> Result<PipelineOutcome> {
    let mut steps = ToolSteps::new(config, account, opts);
    run_pipeline(config, &mut steps)
}
