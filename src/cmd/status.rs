//! Probe evaluation and live health — `rigup status`.
//!
//! Evaluates every step's probe plus the server health endpoint and the
//! latest run record. Mutates nothing: probes are side-effect free.

use anyhow::Result;
use console::style;
use std::path::Path;
use std::sync::Arc;

use rigup::audit::AuditLog;
use rigup::config::{RigConfig, RigToml};
use rigup::step::ProbeStatus;
use rigup::steps::build_steps;
use rigup::supervisor::{HttpReadiness, ReadinessCheck, ServerSlot};

pub async fn cmd_status(config_path: &Path) -> Result<()> {
    let toml = RigToml::load_or_default(config_path)?;
    let config = RigConfig::resolve(toml)?;

    println!("{}", style("Provisioning state").bold());
    let steps = build_steps(&config, Arc::new(ServerSlot::default()));
    for step in &steps {
        match step.probe().await {
            Ok(ProbeStatus::Satisfied) => {
                println!("  {} {}", style("✓").green(), step.name());
            }
            Ok(ProbeStatus::Unsatisfied(why)) => {
                println!(
                    "  {} {} {}",
                    style("✗").red(),
                    step.name(),
                    style(format!("— {why}")).dim()
                );
            }
            Err(e) => {
                println!(
                    "  {} {} {}",
                    style("?").yellow(),
                    step.name(),
                    style(format!("— check failed: {e}")).dim()
                );
            }
        }
    }

    let healthy = HttpReadiness::new(config.health_url()).check().await;
    println!();
    if healthy {
        println!(
            "{} server answering at {}",
            style("✓").green(),
            style(config.health_url()).cyan()
        );
    } else {
        println!(
            "{} no healthy server at {}",
            style("✗").red(),
            style(config.health_url()).cyan()
        );
    }

    if let Some(record) = AuditLog::new(&config.runs_dir).latest()? {
        println!();
        println!("{}", style("Last run").bold());
        println!(
            "  started {}  {}",
            record.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
            if record.success {
                style("succeeded").green().to_string()
            } else {
                style("failed").red().to_string()
            }
        );
        if let Some(failed) = &record.failed_step {
            println!("  failed step: {}", style(failed).red());
        }
        if let Some(readiness) = &record.readiness {
            println!("  readiness: {readiness}");
        }
    }

    Ok(())
}
