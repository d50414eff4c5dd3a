//! Ordered execution of provisioning steps with probe-based skip-ahead.
//!
//! The sequencer walks a caller-supplied list of steps in order, skipping any
//! step whose probe reports the goal state already satisfied and aborting the
//! whole run on the first action or verify failure. It never reorders or
//! parallelizes: later steps assume the filesystem and environment side
//! effects of earlier ones.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{ProvisionError, StepError};
use crate::step::{ProbeStatus, Step};
use crate::ui::ProvisionUI;

/// How a step was satisfied during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    /// The probe reported the goal state already held; no action ran.
    Satisfied,
    /// The action ran and verify confirmed the goal state.
    Executed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub name: String,
    pub disposition: Disposition,
}

/// Outcome of one sequencer invocation. Immutable once produced.
#[derive(Debug)]
pub struct RunResult {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Steps finished before the run ended, in execution order.
    pub completed: Vec<StepRecord>,
    pub failed_step: Option<String>,
    pub cause: Option<ProvisionError>,
}

impl RunResult {
    pub fn success(&self) -> bool {
        self.failed_step.is_none()
    }

    /// True when at least one action actually executed, as opposed to a re-run
    /// where every probe reported satisfied.
    pub fn did_work(&self) -> bool {
        self.completed
            .iter()
            .any(|s| s.disposition == Disposition::Executed)
    }
}

pub struct Sequencer<'a> {
    ui: Option<&'a ProvisionUI>,
}

impl<'a> Sequencer<'a> {
    pub fn new(ui: Option<&'a ProvisionUI>) -> Self {
        Self { ui }
    }

    /// Run the steps in order. Returns on the first fatal failure with
    /// `failed_step` set and `completed` holding everything finished so far.
    pub async fn run(&self, steps: &[Box<dyn Step>]) -> RunResult {
        let started_at = Utc::now();
        let mut completed = Vec::new();

        for step in steps {
            let name = step.name().to_string();

            let status = match step.probe().await {
                Ok(status) => status,
                Err(e) => return Self::fail(started_at, completed, name, e, self.ui),
            };

            match status {
                ProbeStatus::Satisfied => {
                    tracing::debug!(step = %name, "probe satisfied, skipping action");
                    if let Some(ui) = self.ui {
                        ui.step_satisfied(&name);
                    }
                    completed.push(StepRecord {
                        name,
                        disposition: Disposition::Satisfied,
                    });
                }
                ProbeStatus::Unsatisfied(why) => {
                    tracing::debug!(step = %name, reason = %why, "running action");
                    if let Some(ui) = self.ui {
                        ui.step_start(&name, &why);
                    }
                    if let Err(e) = step.action().await {
                        return Self::fail(started_at, completed, name, e, self.ui);
                    }
                    if let Err(e) = step.verify().await {
                        return Self::fail(started_at, completed, name, e, self.ui);
                    }
                    if let Some(ui) = self.ui {
                        ui.step_executed(&name);
                    }
                    completed.push(StepRecord {
                        name,
                        disposition: Disposition::Executed,
                    });
                }
            }
        }

        RunResult {
            started_at,
            finished_at: Utc::now(),
            completed,
            failed_step: None,
            cause: None,
        }
    }

    fn fail(
        started_at: DateTime<Utc>,
        completed: Vec<StepRecord>,
        step: String,
        source: StepError,
        ui: Option<&ProvisionUI>,
    ) -> RunResult {
        let cause = ProvisionError::Step {
            step: step.clone(),
            source,
        };
        if let Some(ui) = ui {
            ui.step_failed(&step, &cause.to_string());
        }
        RunResult {
            started_at,
            finished_at: Utc::now(),
            completed,
            failed_step: Some(step),
            cause: Some(cause),
        }
    }
}
