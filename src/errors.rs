//! Typed error hierarchy for the rigup provisioner.
//!
//! Three top-level enums cover the three subsystems:
//! - `ProvisionError` — run-level failures (preconditions, failed steps)
//! - `StepError` — a single step's probe/action/verify failures
//! - `SupervisorError` — launching and signalling the inference server

use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a provisioning run.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// The environment is unfit before any step executes: a required external
    /// tool is absent and not something we install, privilege is missing, or
    /// the container runtime is unreachable.
    #[error("precondition not met: {0}")]
    Precondition(String),

    #[error("step '{step}' failed: {source}")]
    Step {
        step: String,
        #[source]
        source: StepError,
    },

    #[error(transparent)]
    Supervisor(#[from] SupervisorError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors from a single step execution.
#[derive(Debug, Error)]
pub enum StepError {
    #[error("probe failed: {0}")]
    Probe(#[source] anyhow::Error),

    #[error("action failed: {0}")]
    Action(#[source] anyhow::Error),

    #[error("'{command}' exited with code {code}, log at {}", log.display())]
    ActionExit {
        command: String,
        code: i32,
        log: PathBuf,
    },

    /// The action reported success but the step's goal state still does not
    /// hold (e.g. a partially-downloaded artifact set).
    #[error("goal state unmet after action: {0}")]
    Unverified(String),
}

/// Errors from the process supervisor.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to open log sink at {}: {source}", path.display())]
    LogSink {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to signal pid {pid}: {message}")]
    Signal { pid: i32, message: String },

    #[error("stale instance (pid {pid}) survived SIGKILL")]
    StaleSurvived { pid: i32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precondition_carries_message() {
        let err = ProvisionError::Precondition("cmake not found on PATH".into());
        assert!(err.to_string().contains("cmake"));
        assert!(matches!(err, ProvisionError::Precondition(_)));
    }

    #[test]
    fn step_error_wraps_into_provision_error() {
        let err = ProvisionError::Step {
            step: "fetch-model".into(),
            source: StepError::Unverified("3 of 11 shards present".into()),
        };
        match &err {
            ProvisionError::Step { step, source } => {
                assert_eq!(step, "fetch-model");
                assert!(matches!(source, StepError::Unverified(_)));
            }
            _ => panic!("expected Step variant"),
        }
        assert!(err.to_string().contains("fetch-model"));
    }

    #[test]
    fn action_exit_carries_code_and_log_path() {
        let err = StepError::ActionExit {
            command: "cmake --build build".into(),
            code: 2,
            log: PathBuf::from("/tmp/build.log"),
        };
        assert!(err.to_string().contains("code 2"));
        assert!(err.to_string().contains("build.log"));
    }

    #[test]
    fn supervisor_spawn_is_matchable() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "llama-server not found");
        let err = SupervisorError::Spawn {
            command: "llama-server".into(),
            source: io_err,
        };
        match &err {
            SupervisorError::Spawn { source, .. } => {
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            _ => panic!("expected Spawn variant"),
        }
    }

    #[test]
    fn supervisor_error_converts_into_provision_error() {
        let err: ProvisionError = SupervisorError::StaleSurvived { pid: 4321 }.into();
        assert!(matches!(
            err,
            ProvisionError::Supervisor(SupervisorError::StaleSurvived { pid: 4321 })
        ));
    }

    #[test]
    fn all_error_types_implement_std_error_trait() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&ProvisionError::Precondition("x".into()));
        assert_std_error(&StepError::Unverified("y".into()));
        assert_std_error(&SupervisorError::StaleSurvived { pid: 1 });
    }
}
