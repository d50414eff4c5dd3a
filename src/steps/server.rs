//! Supervised launch of the inference server.

use anyhow::anyhow;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::config::RigConfig;
use crate::errors::StepError;
use crate::probes;
use crate::step::{ProbeStatus, Step};
use crate::supervisor::{self, HttpReadiness, ReadinessCheck, ServerSlot, log_tail};

/// Launches the server detached and deposits the handle in the shared slot so
/// the run can poll readiness after the sequence completes.
///
/// The probe asks the health endpoint: an already-healthy server satisfies the
/// step, which is what makes a whole-run re-entry a no-op. The action first
/// terminates any recorded stale owner of the endpoint, so at most one
/// recorded instance exists per endpoint. Verify only confirms the process
/// did not exit immediately — full readiness is the supervisor's job, where a
/// slow start is a warning rather than a failure.
pub struct LaunchServerStep {
    binary: PathBuf,
    config: RigConfig,
    health_url: String,
    pidfile: PathBuf,
    log_path: PathBuf,
    grace: Duration,
    slot: Arc<ServerSlot>,
}

impl LaunchServerStep {
    pub fn new(config: &RigConfig, slot: Arc<ServerSlot>) -> Self {
        Self {
            binary: config.server_binary(),
            health_url: config.health_url(),
            pidfile: config.pidfile(),
            log_path: config.server_log(),
            grace: Duration::from_secs(config.toml.server.grace_secs),
            config: config.clone(),
            slot,
        }
    }
}

#[async_trait]
impl Step for LaunchServerStep {
    fn name(&self) -> &str {
        "launch-server"
    }

    async fn probe(&self) -> Result<ProbeStatus, StepError> {
        if HttpReadiness::new(&self.health_url).check().await {
            Ok(ProbeStatus::Satisfied)
        } else {
            Ok(ProbeStatus::Unsatisfied(format!(
                "no healthy server at {}",
                self.health_url
            )))
        }
    }

    async fn action(&self) -> Result<(), StepError> {
        supervisor::terminate_stale(&self.pidfile, self.grace)
            .await
            .map_err(|e| StepError::Action(e.into()))?;

        let model = probes::first_shard(&self.config.model_dir, &self.config.toml.model.include)
            .ok_or_else(|| {
                StepError::Action(anyhow!(
                    "no model shard matching '{}' under {}",
                    self.config.toml.model.include,
                    self.config.model_dir.display()
                ))
            })?;

        let args = self.config.server_args(&model);
        let process = supervisor::launch(
            &self.binary.display().to_string(),
            &args,
            &[],
            &self.log_path,
        )
        .map_err(|e| StepError::Action(e.into()))?;

        supervisor::write_pidfile(&self.pidfile, process.pid)
            .map_err(|e| StepError::Action(anyhow!("failed to record pidfile: {e}")))?;
        self.slot.put(process);
        Ok(())
    }

    /// Readiness polling happens after the sequence; here only catch a server
    /// that died on the spot (bad flags, missing shared libraries).
    async fn verify(&self) -> Result<(), StepError> {
        match self.slot.exited() {
            Some(exit_code) => {
                let tail = log_tail(&self.log_path, 15);
                Err(StepError::Unverified(format!(
                    "server exited immediately (code {}){}",
                    exit_code.map_or("unknown".to_string(), |c| c.to_string()),
                    if tail.is_empty() {
                        String::new()
                    } else {
                        format!("\n{tail}")
                    }
                )))
            }
            None => Ok(()),
        }
    }
}
