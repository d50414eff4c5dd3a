//! Integration tests for rigup
//!
//! These exercise the CLI end-to-end against an empty host: no GPU, no
//! container runtime, no model shards. Everything that inspects state must
//! still work there; everything that would mutate state is not invoked.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

/// Helper to create a rigup Command
fn rigup() -> Command {
    cargo_bin_cmd!("rigup")
}

/// Helper to create a temporary working directory
fn temp_dir() -> TempDir {
    TempDir::new().unwrap()
}

// =============================================================================
// Basic CLI Tests
// =============================================================================

mod cli_basics {
    use super::*;

    #[test]
    fn test_help() {
        rigup().arg("--help").assert().success();
    }

    #[test]
    fn test_version() {
        rigup().arg("--version").assert().success();
    }

    #[test]
    fn test_unknown_subcommand_fails() {
        rigup().arg("frobnicate").assert().failure();
    }
}

// =============================================================================
// Config Command Tests
// =============================================================================

mod config_cmd {
    use super::*;

    #[test]
    fn test_config_init_creates_file() {
        let dir = temp_dir();

        rigup()
            .current_dir(dir.path())
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("rigup.toml"));

        let content = std::fs::read_to_string(dir.path().join("rigup.toml")).unwrap();
        assert!(content.contains("[server]"));
        assert!(content.contains("[model]"));
    }

    #[test]
    fn test_config_init_refuses_overwrite_without_force() {
        let dir = temp_dir();

        rigup()
            .current_dir(dir.path())
            .args(["config", "init"])
            .assert()
            .success();

        rigup()
            .current_dir(dir.path())
            .args(["config", "init"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("--force"));

        rigup()
            .current_dir(dir.path())
            .args(["config", "init", "--force"])
            .assert()
            .success();
    }

    #[test]
    fn test_config_show_defaults_without_file() {
        let dir = temp_dir();

        rigup()
            .current_dir(dir.path())
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("showing defaults"))
            .stdout(predicate::str::contains("http://127.0.0.1:8080"));
    }

    #[test]
    fn test_config_show_reads_custom_file() {
        let dir = temp_dir();
        std::fs::write(
            dir.path().join("custom.toml"),
            "[server]\nport = 9999\n",
        )
        .unwrap();

        rigup()
            .current_dir(dir.path())
            .args(["--config", "custom.toml", "config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("9999"));
    }

    #[test]
    fn test_config_show_warns_on_port_clash() {
        let dir = temp_dir();
        std::fs::write(
            dir.path().join("rigup.toml"),
            "[server]\nport = 3000\n",
        )
        .unwrap();

        rigup()
            .current_dir(dir.path())
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("warning"));
    }
}

// =============================================================================
// Status Command Tests
// =============================================================================

mod status_cmd {
    use super::*;

    #[test]
    fn test_status_on_empty_host_lists_unsatisfied_steps() {
        let dir = temp_dir();
        // Point the workspace inside the temp dir so nothing on the host
        // machine satisfies a probe by accident.
        std::fs::write(
            dir.path().join("rigup.toml"),
            format!(
                "[paths]\nworkspace = \"{}\"\n",
                dir.path().join("rig").display()
            ),
        )
        .unwrap();

        rigup()
            .current_dir(dir.path())
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains("build-server"))
            .stdout(predicate::str::contains("fetch-model"))
            .stdout(predicate::str::contains("launch-server"))
            .stdout(predicate::str::contains("no healthy server"));
    }

    #[test]
    fn test_status_does_not_create_workspace() {
        let dir = temp_dir();
        let workspace = dir.path().join("rig");
        std::fs::write(
            dir.path().join("rigup.toml"),
            format!("[paths]\nworkspace = \"{}\"\n", workspace.display()),
        )
        .unwrap();

        rigup().current_dir(dir.path()).arg("status").assert().success();
        assert!(!workspace.exists(), "status must not mutate the host");
    }
}

// =============================================================================
// Stop Command Tests
// =============================================================================

mod stop_cmd {
    use super::*;

    #[test]
    fn test_stop_with_nothing_running_succeeds() {
        let dir = temp_dir();
        std::fs::write(
            dir.path().join("rigup.toml"),
            format!(
                "[paths]\nworkspace = \"{}\"\n",
                dir.path().join("rig").display()
            ),
        )
        .unwrap();

        // --yes skips the confirmation prompt; an absent pidfile and an
        // unreachable container runtime are both tolerated.
        rigup()
            .current_dir(dir.path())
            .args(["--yes", "stop"])
            .assert()
            .success()
            .stdout(predicate::str::contains("no recorded server instance"));
    }
}
