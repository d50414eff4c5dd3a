//! Model shard retrieval.

use async_trait::async_trait;
use std::path::PathBuf;

use super::{probe_result, run_logged};
use crate::config::RigConfig;
use crate::errors::StepError;
use crate::probes;
use crate::step::{ProbeStatus, Step};

/// Count probe over the local shard set; the action invokes the downloader,
/// which skips already-complete shards, so re-running against a partial set
/// fetches only what is missing. The verify gate re-counts, catching a
/// download that "succeeded" but left the set incomplete.
pub struct FetchModelStep {
    downloader: String,
    repo: String,
    include: String,
    dir: PathBuf,
    expected: usize,
    log: PathBuf,
}

impl FetchModelStep {
    pub fn new(config: &RigConfig) -> Self {
        let m = &config.toml.model;
        Self {
            downloader: m.downloader.clone(),
            repo: m.repo.clone(),
            include: m.include.clone(),
            dir: config.model_dir.clone(),
            expected: m.expected_shards,
            log: config.download_log(),
        }
    }
}

#[async_trait]
impl Step for FetchModelStep {
    fn name(&self) -> &str {
        "fetch-model"
    }

    async fn probe(&self) -> Result<ProbeStatus, StepError> {
        probe_result(probes::shard_status(&self.dir, &self.include, self.expected))
    }

    async fn action(&self) -> Result<(), StepError> {
        run_logged(
            &self.downloader,
            &[
                "download".to_string(),
                self.repo.clone(),
                "--include".to_string(),
                self.include.clone(),
                "--local-dir".to_string(),
                self.dir.display().to_string(),
            ],
            None,
            &self.log,
        )
        .await
    }
}
