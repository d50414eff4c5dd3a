//! Step definition for the provisioning sequencer.
//!
//! A step is one named, idempotent unit of provisioning work: a side-effect-free
//! probe that reports whether the goal state already holds, an effectful action,
//! and a post-condition verify.

use async_trait::async_trait;

use crate::errors::StepError;

/// Result of evaluating a step's probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeStatus {
    /// Goal state already holds; the action can be skipped.
    Satisfied,
    /// Goal state does not hold; carries a short reason for the operator
    /// (e.g. "3 of 11 shards present").
    Unsatisfied(String),
}

impl ProbeStatus {
    pub fn is_satisfied(&self) -> bool {
        matches!(self, ProbeStatus::Satisfied)
    }
}

/// One unit of provisioning work.
///
/// `probe` must be repeatable without mutating any state — the sequencer calls
/// it on every run to decide whether the action can be skipped, and `status`
/// evaluates it outside any run. `verify` is only invoked after `action` within
/// the same run; the default implementation re-evaluates the probe and converts
/// a still-unsatisfied state into [`StepError::Unverified`], so an action that
/// "succeeded" without reaching the goal state cannot let the sequence proceed.
#[async_trait]
pub trait Step: Send + Sync {
    fn name(&self) -> &str;

    async fn probe(&self) -> Result<ProbeStatus, StepError>;

    async fn action(&self) -> Result<(), StepError>;

    async fn verify(&self) -> Result<(), StepError> {
        match self.probe().await? {
            ProbeStatus::Satisfied => Ok(()),
            ProbeStatus::Unsatisfied(why) => Err(StepError::Unverified(why)),
        }
    }
}
