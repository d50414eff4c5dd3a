//! Concrete provisioning steps and the preflight check.
//!
//! Step order is significant and fixed here: the build needs the toolchain,
//! the server needs the build output and the model shards, and the chat UI
//! container is wired before the server launch hands off to the supervisor.

mod build;
mod model;
mod server;
mod toolchain;
mod webui;

pub use build::BuildServerStep;
pub use model::FetchModelStep;
pub use server::LaunchServerStep;
pub use toolchain::ToolchainStep;
pub use webui::{ChatUiContainerStep, ChatUiImageStep};

use anyhow::anyhow;
use std::io::Write;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;

use crate::config::RigConfig;
use crate::container::ContainerRuntime;
use crate::errors::{ProvisionError, StepError};
use crate::probes;
use crate::step::{ProbeStatus, Step};
use crate::supervisor::ServerSlot;

/// Assemble the ordered step list from configuration. Disabled sections drop
/// their steps; the server launch is always last so the run can hand the
/// process to the readiness poll.
pub fn build_steps(config: &RigConfig, slot: Arc<ServerSlot>) -> Vec<Box<dyn Step>> {
    let mut steps: Vec<Box<dyn Step>> = Vec::new();
    if config.toml.toolchain.enabled {
        steps.push(Box::new(ToolchainStep::new(config)));
    }
    steps.push(Box::new(BuildServerStep::new(config)));
    steps.push(Box::new(FetchModelStep::new(config)));
    if config.toml.webui.enabled {
        steps.push(Box::new(ChatUiImageStep::new(config)));
        steps.push(Box::new(ChatUiContainerStep::new(config)));
    }
    steps.push(Box::new(LaunchServerStep::new(config, slot)));
    steps
}

/// Environment checks that must hold before any step executes. These cover
/// what the provisioner cannot fix itself: tools it shells out to, privilege
/// for the toolchain installer, and the container runtime.
pub async fn preflight(config: &RigConfig) -> Result<(), ProvisionError> {
    let required = [config.toml.model.downloader.as_str(), "git", "cmake"];
    for tool in required {
        if probes::binary_on_path(tool).is_none() {
            return Err(ProvisionError::Precondition(format!(
                "required tool '{tool}' not found on PATH"
            )));
        }
    }

    if config.toml.toolchain.enabled {
        let tc = &config.toml.toolchain;
        let min = tc.min_version.as_deref().and_then(probes::parse_version);
        let status = probes::presence(&tc.check, &tc.version_args, min)
            .await
            .map_err(|e| ProvisionError::Precondition(e.to_string()))?;
        // Only demand privilege when the installer would actually run.
        if !status.is_satisfied() && unsafe { libc::geteuid() } != 0 {
            return Err(ProvisionError::Precondition(format!(
                "toolchain '{}' needs installing, which requires root (re-run with sudo)",
                tc.check
            )));
        }
    }

    if config.toml.webui.enabled {
        let runtime = ContainerRuntime::connect()
            .map_err(|e| ProvisionError::Precondition(e.to_string()))?;
        runtime
            .ping()
            .await
            .map_err(|e| ProvisionError::Precondition(format!("container runtime: {e}")))?;
    }

    Ok(())
}

/// Run an external command with stdout and stderr appended to `log`, with a
/// timestamped header line so consecutive actions stay readable in one sink.
pub(crate) async fn run_logged(
    program: &str,
    args: &[String],
    cwd: Option<&Path>,
    log: &Path,
) -> Result<(), StepError> {
    let command_line = format!("{} {}", program, args.join(" "));
    let mut file = open_log(log)?;
    let _ = writeln!(file, "\n=== {} $ {}", chrono::Utc::now().to_rfc3339(), command_line);
    let err_file = file
        .try_clone()
        .map_err(|e| StepError::Action(anyhow!("failed to clone log handle: {e}")))?;

    let mut cmd = tokio::process::Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::from(file))
        .stderr(Stdio::from(err_file));
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }

    tracing::debug!(command = command_line.as_str(), "running action command");
    let status = cmd
        .status()
        .await
        .map_err(|e| StepError::Action(anyhow!("failed to run '{command_line}': {e}")))?;

    if status.success() {
        Ok(())
    } else {
        Err(StepError::ActionExit {
            command: command_line,
            code: status.code().unwrap_or(-1),
            log: log.to_path_buf(),
        })
    }
}

/// Run a configured shell command line (installer strings need a shell).
pub(crate) async fn run_shell(command_line: &str, log: &Path) -> Result<(), StepError> {
    run_logged(
        "sh",
        &["-c".to_string(), command_line.to_string()],
        None,
        log,
    )
    .await
}

fn open_log(log: &Path) -> Result<std::fs::File, StepError> {
    if let Some(parent) = log.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| StepError::Action(anyhow!("failed to create log directory: {e}")))?;
    }
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log)
        .map_err(|e| StepError::Action(anyhow!("failed to open log {}: {e}", log.display())))
}

/// Map a probe-helper result into the step error space.
pub(crate) fn probe_result(result: anyhow::Result<ProbeStatus>) -> Result<ProbeStatus, StepError> {
    result.map_err(StepError::Probe)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RigToml;
    use tempfile::tempdir;

    fn config() -> RigConfig {
        let mut toml = RigToml::default();
        toml.paths.workspace = "/tmp/rig-test".to_string();
        RigConfig::resolve(toml).unwrap()
    }

    #[test]
    fn build_steps_order_ends_with_server_launch() {
        let cfg = config();
        let steps = build_steps(&cfg, Arc::new(ServerSlot::default()));
        let names: Vec<&str> = steps.iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            vec![
                "gpu-toolchain",
                "build-server",
                "fetch-model",
                "chat-ui-image",
                "chat-ui-container",
                "launch-server"
            ]
        );
    }

    #[test]
    fn disabled_sections_drop_their_steps() {
        let mut toml = RigToml::default();
        toml.toolchain.enabled = false;
        toml.webui.enabled = false;
        let cfg = RigConfig::resolve(toml).unwrap();

        let steps = build_steps(&cfg, Arc::new(ServerSlot::default()));
        let names: Vec<&str> = steps.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["build-server", "fetch-model", "launch-server"]);
    }

    #[tokio::test]
    async fn run_logged_captures_output_and_success() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("logs/action.log");
        run_logged(
            "sh",
            &["-c".to_string(), "echo into the sink".to_string()],
            None,
            &log,
        )
        .await
        .unwrap();

        let content = std::fs::read_to_string(&log).unwrap();
        assert!(content.contains("into the sink"));
        assert!(content.contains("=== "));
    }

    #[tokio::test]
    async fn run_logged_nonzero_exit_carries_code_and_log() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("action.log");
        let err = run_logged(
            "sh",
            &["-c".to_string(), "exit 3".to_string()],
            None,
            &log,
        )
        .await
        .unwrap_err();

        match err {
            StepError::ActionExit { code, log: path, .. } => {
                assert_eq!(code, 3);
                assert_eq!(path, log);
            }
            other => panic!("expected ActionExit, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn preflight_rejects_missing_downloader() {
        let mut toml = RigToml::default();
        toml.toolchain.enabled = false;
        toml.webui.enabled = false;
        toml.model.downloader = "definitely-not-a-real-binary-xyz".to_string();
        let cfg = RigConfig::resolve(toml).unwrap();

        match preflight(&cfg).await {
            Err(ProvisionError::Precondition(msg)) => {
                assert!(msg.contains("definitely-not-a-real-binary-xyz"));
            }
            other => panic!("expected Precondition, got {other:?}"),
        }
    }
}
