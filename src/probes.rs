//! Reusable probe helpers for the recurring provisioning patterns.
//!
//! Two probe shapes recur across steps: a presence probe (is a tool on PATH,
//! optionally at a minimum version) and a count probe (are all N expected
//! artifact shards present under a path). Probes never write and never touch
//! the network.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::step::ProbeStatus;

/// Locate an executable on PATH.
pub fn binary_on_path(name: &str) -> Option<PathBuf> {
    which::which(name).ok()
}

/// Extract the first `major.minor` pair from version-command output.
///
/// Tolerates arbitrary surrounding text, e.g.
/// `"Cuda compilation tools, release 12.4, V12.4.131"` parses as `(12, 4)`.
pub fn parse_version(output: &str) -> Option<(u32, u32)> {
    let re = regex::Regex::new(r"(\d+)\.(\d+)").expect("static version regex is valid");
    let caps = re.captures(output)?;
    Some((caps[1].parse().ok()?, caps[2].parse().ok()?))
}

pub fn version_at_least(found: (u32, u32), min: (u32, u32)) -> bool {
    found >= min
}

/// Presence probe: is `binary` on PATH and, when `min` is given, does its
/// version output satisfy the minimum?
pub async fn presence(
    binary: &str,
    version_args: &[String],
    min: Option<(u32, u32)>,
) -> Result<ProbeStatus> {
    let Some(path) = binary_on_path(binary) else {
        return Ok(ProbeStatus::Unsatisfied(format!(
            "{binary} not found on PATH"
        )));
    };
    let Some(min) = min else {
        return Ok(ProbeStatus::Satisfied);
    };

    let output = tokio::process::Command::new(&path)
        .args(version_args)
        .output()
        .await
        .with_context(|| format!("failed to run {} {}", binary, version_args.join(" ")))?;
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));

    match parse_version(&text) {
        Some(found) if version_at_least(found, min) => Ok(ProbeStatus::Satisfied),
        Some(found) => Ok(ProbeStatus::Unsatisfied(format!(
            "{binary} {}.{} is older than required {}.{}",
            found.0, found.1, min.0, min.1
        ))),
        None => Ok(ProbeStatus::Unsatisfied(format!(
            "could not determine {binary} version"
        ))),
    }
}

/// Count the files matching `pattern` directly under `dir`.
///
/// A missing directory counts as zero shards rather than an error, so a fresh
/// host probes cleanly.
pub fn count_shards(dir: &Path, pattern: &str) -> Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }
    let full = dir.join(pattern);
    let paths = glob::glob(&full.to_string_lossy())
        .with_context(|| format!("invalid shard pattern: {pattern}"))?;
    Ok(paths.filter_map(|entry| entry.ok()).filter(|p| p.is_file()).count())
}

/// Count probe: all `expected` shards present under `dir`?
pub fn shard_status(dir: &Path, pattern: &str, expected: usize) -> Result<ProbeStatus> {
    let found = count_shards(dir, pattern)?;
    if found >= expected {
        Ok(ProbeStatus::Satisfied)
    } else {
        Ok(ProbeStatus::Unsatisfied(format!(
            "{found} of {expected} shards present"
        )))
    }
}

/// First shard in lexical order, used as the model argument for the server
/// (the engine resolves the remaining shards of a split model itself).
pub fn first_shard(dir: &Path, pattern: &str) -> Option<PathBuf> {
    let full = dir.join(pattern);
    let mut paths: Vec<PathBuf> = glob::glob(&full.to_string_lossy())
        .ok()?
        .filter_map(|entry| entry.ok())
        .filter(|p| p.is_file())
        .collect();
    paths.sort();
    paths.into_iter().next()
}
