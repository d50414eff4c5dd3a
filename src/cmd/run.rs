//! The full provisioning sequence — `rigup run`.

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use rigup::audit::{AuditLog, RunRecord};
use rigup::config::{RigConfig, RigToml};
use rigup::sequencer::Sequencer;
use rigup::steps::{build_steps, preflight};
use rigup::supervisor::{self, HttpReadiness, ReadyOutcome, ServerSlot};
use rigup::ui::ProvisionUI;

pub async fn cmd_run(verbose: bool, config_path: &Path) -> Result<()> {
    let toml = RigToml::load_or_default(config_path)?;
    let config = RigConfig::resolve(toml)?;
    for warning in config.validate() {
        eprintln!("{} {}", console::style("warning:").yellow().bold(), warning);
    }
    config.ensure_directories()?;

    preflight(&config).await?;

    let slot = Arc::new(ServerSlot::default());
    let steps = build_steps(&config, slot.clone());
    let ui = ProvisionUI::new(steps.len() as u64, verbose);
    ui.banner("Provisioning inference rig");

    let result = Sequencer::new(Some(&ui)).run(&steps).await;
    let audit = AuditLog::new(&config.runs_dir);

    if let Some(failed) = result.failed_step.clone() {
        audit.record(&RunRecord::from_result(&result))?;
        anyhow::bail!(
            "provisioning failed at step '{failed}': {}",
            result
                .cause
                .as_ref()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "unknown cause".to_string())
        );
    }

    // Hand the launched server over to the readiness poll. An empty slot
    // means the launch step's probe found a healthy server already running.
    let timeout = Duration::from_secs(config.toml.server.ready_timeout_secs);
    let interval = Duration::from_millis(config.toml.server.poll_interval_ms);
    let mut record = RunRecord::from_result(&result);

    if let Some(mut process) = slot.take() {
        let check = HttpReadiness::new(config.health_url());
        ui.await_ready_start(&config.health_url(), timeout);
        match supervisor::await_ready(&mut process, &check, timeout, interval, Some(&ui)).await {
            ReadyOutcome::Ready { attempts } => {
                ui.ready(attempts);
                record.readiness = Some("ready".to_string());
                process.release();
            }
            ReadyOutcome::TimedOut { .. } => {
                // Slow is not dead: the model may still be loading. Report a
                // warning and leave the server running.
                ui.ready_timeout(&config.server_log());
                record.readiness = Some("timed-out".to_string());
                process.release();
            }
            ReadyOutcome::ProcessDied {
                exit_code,
                log_tail,
            } => {
                ui.process_died(exit_code, &log_tail);
                record.readiness = Some("process-died".to_string());
                record.success = false;
                audit.record(&record)?;
                anyhow::bail!("inference server exited before becoming ready");
            }
        }
    } else {
        record.readiness = Some("already-running".to_string());
    }

    audit.record(&record)?;

    let webui_url = config.toml.webui.enabled.then(|| config.webui_url());
    ui.summary(
        result.did_work(),
        &config.server_url(),
        webui_url.as_deref(),
        &config.server_log(),
    );
    Ok(())
}
