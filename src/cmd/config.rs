//! Configuration view and scaffolding — `rigup config`.

use anyhow::Result;
use console::style;
use std::path::Path;

use rigup::config::{RigConfig, RigToml};

/// Print the resolved configuration: the effective TOML (defaults filled in)
/// plus the derived paths and endpoints.
pub fn cmd_config_show(config_path: &Path) -> Result<()> {
    let toml = RigToml::load_or_default(config_path)?;
    let config = RigConfig::resolve(toml)?;

    if config_path.exists() {
        println!("{} {}", style("Config file:").dim(), config_path.display());
    } else {
        println!(
            "{} {} (not present, showing defaults)",
            style("Config file:").dim(),
            config_path.display()
        );
    }
    println!();
    print!("{}", toml::to_string_pretty(&config.toml)?);
    println!();
    println!("{}", style("Derived").bold());
    println!("  workspace:  {}", config.workspace.display());
    println!("  binary:     {}", config.server_binary().display());
    println!("  server:     {}", config.server_url());
    println!("  health:     {}", config.health_url());
    if config.toml.webui.enabled {
        println!("  chat UI:    {}", config.webui_url());
    }

    for warning in config.validate() {
        println!("{} {}", style("warning:").yellow().bold(), warning);
    }
    Ok(())
}

/// Write a default `rigup.toml` for editing before the first run.
pub fn cmd_config_init(config_path: &Path, force: bool) -> Result<()> {
    if config_path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            config_path.display()
        );
    }
    RigToml::default().save(config_path)?;
    println!(
        "Wrote {} — edit it, then run 'rigup run'",
        config_path.display()
    );
    Ok(())
}
