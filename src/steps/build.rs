//! Source build of the inference server.

use async_trait::async_trait;
use std::path::PathBuf;

use super::run_logged;
use crate::config::RigConfig;
use crate::errors::StepError;
use crate::step::{ProbeStatus, Step};

/// Clones the server source (skipped when the checkout already exists) and
/// drives the CMake configure + build. The probe is the built binary itself,
/// so an interrupted build re-runs from configure on the next invocation.
pub struct BuildServerStep {
    source_repo: String,
    checkout_dir: PathBuf,
    binary: PathBuf,
    cmake_flags: Vec<String>,
    jobs: Option<u32>,
    log: PathBuf,
}

impl BuildServerStep {
    pub fn new(config: &RigConfig) -> Self {
        Self {
            source_repo: config.toml.build.source_repo.clone(),
            checkout_dir: config.checkout_dir.clone(),
            binary: config.server_binary(),
            cmake_flags: config.toml.build.cmake_flags.clone(),
            jobs: config.toml.build.jobs,
            log: config.build_log(),
        }
    }
}

#[async_trait]
impl Step for BuildServerStep {
    fn name(&self) -> &str {
        "build-server"
    }

    async fn probe(&self) -> Result<ProbeStatus, StepError> {
        if self.binary.is_file() {
            Ok(ProbeStatus::Satisfied)
        } else {
            Ok(ProbeStatus::Unsatisfied(format!(
                "{} not built",
                self.binary.display()
            )))
        }
    }

    async fn action(&self) -> Result<(), StepError> {
        if !self.checkout_dir.join(".git").exists() {
            run_logged(
                "git",
                &[
                    "clone".to_string(),
                    self.source_repo.clone(),
                    self.checkout_dir.display().to_string(),
                ],
                None,
                &self.log,
            )
            .await?;
        }

        let mut configure = vec![
            "-B".to_string(),
            "build".to_string(),
            "-DCMAKE_BUILD_TYPE=Release".to_string(),
        ];
        configure.extend(self.cmake_flags.iter().cloned());
        run_logged("cmake", &configure, Some(&self.checkout_dir), &self.log).await?;

        let mut build = vec![
            "--build".to_string(),
            "build".to_string(),
            "--config".to_string(),
            "Release".to_string(),
            "--target".to_string(),
            "llama-server".to_string(),
        ];
        if let Some(jobs) = self.jobs {
            build.push("-j".to_string());
            build.push(jobs.to_string());
        }
        run_logged("cmake", &build, Some(&self.checkout_dir), &self.log).await
    }
}
