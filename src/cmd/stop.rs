//! Graceful teardown — `rigup stop`.
//!
//! Stops the supervised server recorded in the pidfile (SIGTERM, grace,
//! SIGKILL) and the chat UI container. The server and container are meant to
//! outlive provisioning runs, so this is the only place rigup takes them down.

use anyhow::Result;
use console::style;
use dialoguer::Confirm;
use std::path::Path;
use std::time::Duration;

use rigup::config::{RigConfig, RigToml};
use rigup::container::ContainerRuntime;
use rigup::supervisor;

pub async fn cmd_stop(yes: bool, config_path: &Path) -> Result<()> {
    let toml = RigToml::load_or_default(config_path)?;
    let config = RigConfig::resolve(toml)?;

    if !yes {
        let confirmed = Confirm::new()
            .with_prompt("Stop the inference server and chat UI?")
            .default(false)
            .interact()
            .unwrap_or(false);
        if !confirmed {
            println!("Aborted");
            return Ok(());
        }
    }

    let pidfile = config.pidfile();
    if supervisor::read_pidfile(&pidfile).is_some() {
        supervisor::terminate_stale(&pidfile, Duration::from_secs(config.toml.server.grace_secs))
            .await?;
        println!("{} inference server stopped", style("✓").green());
    } else {
        println!("{} no recorded server instance", style("·").dim());
    }

    if config.toml.webui.enabled {
        match ContainerRuntime::connect() {
            Ok(runtime) => match runtime.stop(&config.toml.webui.container).await {
                Ok(()) => println!(
                    "{} container '{}' stopped",
                    style("✓").green(),
                    config.toml.webui.container
                ),
                Err(e) => eprintln!(
                    "{} could not stop container: {e}",
                    style("warning:").yellow().bold()
                ),
            },
            Err(e) => eprintln!(
                "{} container runtime unreachable: {e}",
                style("warning:").yellow().bold()
            ),
        }
    }

    Ok(())
}
