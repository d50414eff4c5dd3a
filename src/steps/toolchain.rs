//! GPU toolchain presence and installation.

use async_trait::async_trait;
use std::path::PathBuf;

use super::{probe_result, run_shell};
use crate::config::RigConfig;
use crate::errors::StepError;
use crate::probes;
use crate::step::{ProbeStatus, Step};

/// Presence probe on the CUDA compiler with a minimum version; the action
/// runs the configured installer command via the shell.
pub struct ToolchainStep {
    check: String,
    version_args: Vec<String>,
    min_version: Option<(u32, u32)>,
    installer: String,
    log: PathBuf,
}

impl ToolchainStep {
    pub fn new(config: &RigConfig) -> Self {
        let tc = &config.toml.toolchain;
        Self {
            check: tc.check.clone(),
            version_args: tc.version_args.clone(),
            min_version: tc.min_version.as_deref().and_then(probes::parse_version),
            installer: tc.installer.clone(),
            log: config.install_log(),
        }
    }
}

#[async_trait]
impl Step for ToolchainStep {
    fn name(&self) -> &str {
        "gpu-toolchain"
    }

    async fn probe(&self) -> Result<ProbeStatus, StepError> {
        probe_result(probes::presence(&self.check, &self.version_args, self.min_version).await)
    }

    async fn action(&self) -> Result<(), StepError> {
        run_shell(&self.installer, &self.log).await
    }
}
