//! Run audit records.
//!
//! Every sequencer invocation writes one immutable JSON record under the
//! workspace `runs/` directory; `rigup status` surfaces the latest one.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::sequencer::{RunResult, StepRecord};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub steps: Vec<StepRecord>,
    pub failed_step: Option<String>,
    pub cause: Option<String>,
    /// Readiness note: "ready", "timed-out", "process-died", "already-running".
    pub readiness: Option<String>,
    pub success: bool,
    pub did_work: bool,
}

impl RunRecord {
    pub fn from_result(result: &RunResult) -> Self {
        Self {
            started_at: result.started_at,
            finished_at: result.finished_at,
            steps: result.completed.clone(),
            failed_step: result.failed_step.clone(),
            cause: result.cause.as_ref().map(|c| c.to_string()),
            readiness: None,
            success: result.success(),
            did_work: result.did_work(),
        }
    }
}

pub struct AuditLog {
    dir: PathBuf,
}

impl AuditLog {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Persist a record; returns the path it was written to.
    pub fn record(&self, record: &RunRecord) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create runs directory: {}", self.dir.display()))?;
        let path = self.dir.join(format!(
            "run-{}.json",
            record.started_at.format("%Y%m%d-%H%M%S")
        ));
        let content =
            serde_json::to_string_pretty(record).context("failed to serialize run record")?;
        std::fs::write(&path, content)
            .with_context(|| format!("failed to write run record: {}", path.display()))?;
        Ok(path)
    }

    /// Most recent record, by filename order. `None` when no run happened yet.
    pub fn latest(&self) -> Result<Option<RunRecord>> {
        if !self.dir.exists() {
            return Ok(None);
        }
        let mut paths: Vec<PathBuf> = std::fs::read_dir(&self.dir)
            .with_context(|| format!("failed to read runs directory: {}", self.dir.display()))?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();
        let Some(path) = paths.pop() else {
            return Ok(None);
        };
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read run record: {}", path.display()))?;
        let record = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse run record: {}", path.display()))?;
        Ok(Some(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencer::Disposition;
    use tempfile::tempdir;

    fn sample(started_at: DateTime<Utc>, failed: bool) -> RunRecord {
        RunRecord {
            started_at,
            finished_at: started_at,
            steps: vec![StepRecord {
                name: "gpu-toolchain".into(),
                disposition: Disposition::Satisfied,
            }],
            failed_step: failed.then(|| "build-server".to_string()),
            cause: failed.then(|| "action failed".to_string()),
            readiness: None,
            success: !failed,
            did_work: false,
        }
    }

    #[test]
    fn record_then_latest_roundtrip() {
        let dir = tempdir().unwrap();
        let log = AuditLog::new(dir.path());
        assert!(log.latest().unwrap().is_none());

        let record = sample(Utc::now(), false);
        let path = log.record(&record).unwrap();
        assert!(path.exists());

        let loaded = log.latest().unwrap().unwrap();
        assert!(loaded.success);
        assert_eq!(loaded.steps.len(), 1);
        assert_eq!(loaded.steps[0].name, "gpu-toolchain");
    }

    #[test]
    fn latest_prefers_most_recent_run() {
        let dir = tempdir().unwrap();
        let log = AuditLog::new(dir.path());

        let older = "2026-01-01T00:00:00Z".parse().unwrap();
        let newer = "2026-06-01T00:00:00Z".parse().unwrap();
        log.record(&sample(older, false)).unwrap();
        log.record(&sample(newer, true)).unwrap();

        let latest = log.latest().unwrap().unwrap();
        assert_eq!(latest.failed_step.as_deref(), Some("build-server"));
    }

    #[test]
    fn latest_in_missing_dir_is_none() {
        let dir = tempdir().unwrap();
        let log = AuditLog::new(dir.path().join("never-created"));
        assert!(log.latest().unwrap().is_none());
    }
}
