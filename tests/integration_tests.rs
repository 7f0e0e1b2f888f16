//! Integration tests for the round-monitor binary.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Helper to create a round-monitor Command with a clean environment
fn monitor() -> Command {
    let mut cmd = cargo_bin_cmd!("round-monitor");
    cmd.env_remove("RUST_LOG")
        .env_remove("CORE_TOKEN")
        .env_remove("CORE_P2P_PORT")
        .env_remove("ROUND_MONITOR_API_URL");
    cmd
}

fn create_temp_dir() -> TempDir {
    TempDir::new().unwrap()
}

// =============================================================================
// Basic CLI Tests
// =============================================================================

mod cli_basics {
    use super::*;

    #[test]
    fn test_help() {
        monitor()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("restart"))
            .stdout(predicate::str::contains("cancel"));
    }

    #[test]
    fn test_version() {
        monitor().arg("--version").assert().success();
    }

    #[test]
    fn test_unknown_subcommand_fails() {
        monitor().arg("explode").assert().failure();
    }
}

// =============================================================================
// Config Commands
// =============================================================================

mod config_commands {
    use super::*;

    #[test]
    fn test_config_init_creates_file() {
        let dir = create_temp_dir();

        monitor()
            .current_dir(dir.path())
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Created round-monitor.toml"));

        let content = fs::read_to_string(dir.path().join("round-monitor.toml")).unwrap();
        assert!(content.contains("restart_time_buffer = 180"));
    }

    #[test]
    fn test_config_init_does_not_overwrite() {
        let dir = create_temp_dir();
        let path = dir.path().join("round-monitor.toml");
        fs::write(&path, "restart_time_buffer = 60\n").unwrap();

        monitor()
            .current_dir(dir.path())
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("already exists"));

        assert_eq!(fs::read_to_string(&path).unwrap(), "restart_time_buffer = 60\n");
    }

    #[test]
    fn test_config_show_defaults() {
        let dir = create_temp_dir();

        monitor()
            .current_dir(dir.path())
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Using default configuration"))
            .stdout(predicate::str::contains("control server = 127.0.0.1:5001"));
    }

    #[test]
    fn test_config_show_custom_path() {
        let dir = create_temp_dir();
        let path = dir.path().join("custom.toml");
        fs::write(&path, "delegate = \"genesis_7\"\n\n[server]\nport = 6100\n").unwrap();

        monitor()
            .args(["--config", path.to_str().unwrap(), "config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("genesis_7"))
            .stdout(predicate::str::contains("127.0.0.1:6100"));
    }

    #[test]
    fn test_config_validate_reports_warnings() {
        let dir = create_temp_dir();
        fs::write(
            dir.path().join("round-monitor.toml"),
            "status_level = \"loud\"\ndelegate = \"genesis_1\"\n",
        )
        .unwrap();

        monitor()
            .current_dir(dir.path())
            .args(["config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Invalid status_level 'loud'"));
    }

    #[test]
    fn test_config_validate_clean_file() {
        let dir = create_temp_dir();
        fs::write(
            dir.path().join("round-monitor.toml"),
            "delegate = [\"genesis_1\", \"genesis_2\"]\n",
        )
        .unwrap();

        monitor()
            .current_dir(dir.path())
            .args(["config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Configuration is valid."));
    }

    #[test]
    fn test_config_invalid_toml_fails() {
        let dir = create_temp_dir();
        fs::write(dir.path().join("round-monitor.toml"), "enabled = [").unwrap();

        monitor()
            .current_dir(dir.path())
            .args(["config", "show"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Failed to parse config file"));
    }
}

// =============================================================================
// Run and Control Commands
// =============================================================================

mod runtime {
    use super::*;

    #[test]
    fn test_run_disabled_exits_cleanly() {
        let dir = create_temp_dir();
        fs::write(
            dir.path().join("round-monitor.toml"),
            "enabled = false\n\n[log]\nlevel = \"info\"\n",
        )
        .unwrap();

        monitor()
            .current_dir(dir.path())
            .arg("run")
            .assert()
            .success()
            .stdout(predicate::str::contains("Round monitor is disabled"));
    }

    #[test]
    fn test_run_fails_when_node_unreachable() {
        let dir = create_temp_dir();
        fs::write(
            dir.path().join("round-monitor.toml"),
            "[node]\napi_url = \"http://127.0.0.1:1\"\nrequest_timeout_ms = 500\n",
        )
        .unwrap();

        monitor()
            .current_dir(dir.path())
            .args(["run", "--port", "0"])
            .assert()
            .failure();
    }

    #[test]
    fn test_restart_without_running_monitor_fails() {
        monitor()
            .args(["restart", "--url", "http://127.0.0.1:1"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Failed to reach round monitor"));
    }

    #[test]
    fn test_cancel_without_running_monitor_fails() {
        monitor()
            .args(["cancel", "--url", "http://127.0.0.1:1"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Failed to reach round monitor"));
    }
}
