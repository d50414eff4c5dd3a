//! Background process supervision for the inference server.
//!
//! Launches the server detached with its output redirected to a durable log
//! sink, then polls a readiness check until the server reports healthy, the
//! timeout elapses, or the process is observed dead — whichever comes first.
//! A process that dies before readiness is always fatal; a timeout is not,
//! since a large model can legitimately take longer to load than the polling
//! window.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::errors::SupervisorError;
use crate::ui::ProvisionUI;

/// Number of log lines surfaced when the supervised process dies.
const LOG_TAIL_LINES: usize = 30;

/// A long-running child launched by the supervisor.
///
/// The handle owns the child only for the duration of readiness polling; call
/// [`SupervisedProcess::release`] once the run succeeds so the server outlives
/// the provisioner.
#[derive(Debug)]
pub struct SupervisedProcess {
    child: tokio::process::Child,
    pub pid: u32,
    pub log_path: PathBuf,
}

impl SupervisedProcess {
    /// Non-blocking exit check. `Some(code)` once the process has exited
    /// (`None` inside for signal deaths), `None` while it is still running.
    pub fn try_exit(&mut self) -> Option<Option<i32>> {
        match self.child.try_wait() {
            Ok(Some(status)) => Some(status.code()),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, "could not poll child status");
                None
            }
        }
    }

    /// Drop the handle without killing the process; it is meant to keep
    /// serving after the provisioner exits.
    pub fn release(self) {}
}

/// Outcome of a bounded readiness poll.
#[derive(Debug)]
pub enum ReadyOutcome {
    Ready { attempts: u32 },
    TimedOut { waited: Duration },
    ProcessDied {
        exit_code: Option<i32>,
        log_tail: String,
    },
}

/// An idempotent external readiness query. Errors are treated as not-ready.
#[async_trait]
pub trait ReadinessCheck: Send + Sync {
    async fn check(&self) -> bool;
}

/// HTTP readiness: GET the health endpoint; a 2xx response whose JSON body
/// carries `"status": "ok"` (or any 2xx without a status token) means ready.
pub struct HttpReadiness {
    url: String,
    client: reqwest::Client,
}

impl HttpReadiness {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ReadinessCheck for HttpReadiness {
    async fn check(&self) -> bool {
        let resp = match self
            .client
            .get(&self.url)
            .timeout(Duration::from_secs(2))
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(_) => return false,
        };
        if !resp.status().is_success() {
            return false;
        }
        match resp.json::<serde_json::Value>().await {
            Ok(body) => body
                .get("status")
                .and_then(|s| s.as_str())
                .map(|s| s == "ok")
                .unwrap_or(true),
            Err(_) => true,
        }
    }
}

/// Launch `program` detached, with stdout and stderr appended to the log sink
/// at `log_path`. The child keeps running after this handle (and the whole
/// process) goes away.
pub fn launch(
    program: &str,
    args: &[String],
    env: &[(String, String)],
    log_path: &Path,
) -> Result<SupervisedProcess, SupervisorError> {
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| SupervisorError::LogSink {
            path: log_path.to_path_buf(),
            source: e,
        })?;
    }
    let log = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .map_err(|e| SupervisorError::LogSink {
            path: log_path.to_path_buf(),
            source: e,
        })?;
    let log_err = log.try_clone().map_err(|e| SupervisorError::LogSink {
        path: log_path.to_path_buf(),
        source: e,
    })?;

    let mut cmd = tokio::process::Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::from(log))
        .stderr(Stdio::from(log_err))
        .kill_on_drop(false);
    for (k, v) in env {
        cmd.env(k, v);
    }

    let child = cmd.spawn().map_err(|e| SupervisorError::Spawn {
        command: format!("{} {}", program, args.join(" ")),
        source: e,
    })?;
    let pid = child.id().unwrap_or(0);
    tracing::info!(pid, program, "launched supervised process");

    Ok(SupervisedProcess {
        child,
        pid,
        log_path: log_path.to_path_buf(),
    })
}

/// Poll `check` at `poll_interval` until the process is ready, the timeout
/// elapses, or the process dies.
///
/// Each iteration observes process death first — a process that exited before
/// readiness is always reported as `ProcessDied`, even if the endpoint would
/// still have answered — then the readiness check, then the deadline, so a
/// check that reports ready on the same attempt the deadline expires wins.
pub async fn await_ready(
    process: &mut SupervisedProcess,
    check: &dyn ReadinessCheck,
    timeout: Duration,
    poll_interval: Duration,
    ui: Option<&ProvisionUI>,
) -> ReadyOutcome {
    let start = Instant::now();
    let deadline = start + timeout;
    let mut attempts: u32 = 0;

    loop {
        if let Some(exit_code) = process.try_exit() {
            tracing::error!(pid = process.pid, ?exit_code, "process died before readiness");
            return ReadyOutcome::ProcessDied {
                exit_code,
                log_tail: log_tail(&process.log_path, LOG_TAIL_LINES),
            };
        }

        attempts += 1;
        if let Some(ui) = ui {
            ui.poll_tick(attempts, start.elapsed());
        }
        if check.check().await {
            return ReadyOutcome::Ready { attempts };
        }

        if Instant::now() >= deadline {
            return ReadyOutcome::TimedOut {
                waited: start.elapsed(),
            };
        }
        tokio::time::sleep(poll_interval).await;
    }
}

/// Last `lines` lines of the log sink, for death diagnostics. Missing or
/// unreadable logs yield an empty string.
pub fn log_tail(path: &Path, lines: usize) -> String {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let mut tail: Vec<&str> = content.lines().rev().take(lines).collect();
            tail.reverse();
            tail.join("\n")
        }
        Err(_) => String::new(),
    }
}

// ─── Endpoint ownership ───────────────────────────────────────────────────

/// Shared slot the launch step deposits the supervised process into, so the
/// caller can poll readiness after the sequence completes.
#[derive(Default)]
pub struct ServerSlot(Mutex<Option<SupervisedProcess>>);

impl ServerSlot {
    pub fn put(&self, process: SupervisedProcess) {
        *self.0.lock().expect("server slot lock") = Some(process);
    }

    pub fn take(&self) -> Option<SupervisedProcess> {
        self.0.lock().expect("server slot lock").take()
    }

    /// Exit status of the deposited process, if it has already exited.
    pub fn exited(&self) -> Option<Option<i32>> {
        self.0
            .lock()
            .expect("server slot lock")
            .as_mut()
            .and_then(|p| p.try_exit())
    }
}

pub fn write_pidfile(path: &Path, pid: u32) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, format!("{pid}\n"))
}

pub fn read_pidfile(path: &Path) -> Option<i32> {
    std::fs::read_to_string(path).ok()?.trim().parse().ok()
}

fn alive(pid: i32) -> bool {
    // Signal 0 probes for existence without delivering anything.
    unsafe { libc::kill(pid, 0) == 0 }
}

/// Terminate a previously recorded instance bound to our endpoint: SIGTERM,
/// wait for the grace period, then SIGKILL. Guarantees at most one recorded
/// instance per endpoint before a new launch.
///
/// A missing pidfile or an already-dead pid is not an error; the pidfile is
/// removed in either case.
pub async fn terminate_stale(pidfile: &Path, grace: Duration) -> Result<(), SupervisorError> {
    let Some(pid) = read_pidfile(pidfile) else {
        return Ok(());
    };
    if pid <= 0 {
        let _ = std::fs::remove_file(pidfile);
        return Ok(());
    }
    if !alive(pid) {
        let _ = std::fs::remove_file(pidfile);
        return Ok(());
    }

    tracing::info!(pid, "terminating stale server instance");
    if unsafe { libc::kill(pid, libc::SIGTERM) } != 0 {
        return Err(SupervisorError::Signal {
            pid,
            message: std::io::Error::last_os_error().to_string(),
        });
    }

    let deadline = Instant::now() + grace;
    while Instant::now() < deadline {
        if !alive(pid) {
            let _ = std::fs::remove_file(pidfile);
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    tracing::warn!(pid, "stale instance ignored SIGTERM, sending SIGKILL");
    unsafe { libc::kill(pid, libc::SIGKILL) };
    tokio::time::sleep(Duration::from_millis(200)).await;
    if alive(pid) {
        return Err(SupervisorError::StaleSurvived { pid });
    }
    let _ = std::fs::remove_file(pidfile);
    Ok(())
}
