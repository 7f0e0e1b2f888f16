//! Control-server client: `round-monitor restart`, `cancel` and `status`.

use anyhow::{Context, Result, bail};
use serde_json::Value;
use std::path::Path;

/// Base URL of the running monitor's control server.
fn control_url(config_path: &Path, url: Option<&str>) -> Result<String> {
    use round_monitor::config::MonitorConfig;

    if let Some(url) = url {
        return Ok(url.trim_end_matches('/').to_string());
    }
    let config = MonitorConfig::with_cli_args(config_path, None, None)?;
    Ok(format!(
        "http://{}:{}",
        config.server_host(),
        config.server_port()
    ))
}

async fn post(base: &str, path: &str) -> Result<String> {
    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{}{}", base, path))
        .send()
        .await
        .with_context(|| format!("Failed to reach round monitor at {}", base))?;

    let status = resp.status();
    let body: Value = resp
        .json()
        .await
        .context("Failed to parse round monitor response")?;
    let message = body["message"].as_str().unwrap_or_default().to_string();

    if status.is_success() {
        Ok(message)
    } else {
        bail!("{}", message)
    }
}

pub async fn cmd_restart(config_path: &Path, url: Option<&str>) -> Result<()> {
    let base = control_url(config_path, url)?;
    let message = post(&base, "/restart").await?;
    println!("{}", message);
    Ok(())
}

pub async fn cmd_cancel(config_path: &Path, url: Option<&str>) -> Result<()> {
    let base = control_url(config_path, url)?;
    let message = post(&base, "/cancel").await?;
    println!("{}", message);
    Ok(())
}

pub async fn cmd_status(config_path: &Path, url: Option<&str>) -> Result<()> {
    let base = control_url(config_path, url)?;
    let snapshot: Value = reqwest::get(format!("{}/status", base))
        .await
        .with_context(|| format!("Failed to reach round monitor at {}", base))?
        .error_for_status()
        .context("Round monitor returned error status")?
        .json()
        .await
        .context("Failed to parse round monitor status")?;

    println!();
    match snapshot["status_line"].as_str() {
        Some(line) => println!("{}", line),
        None => println!("No status reported yet."),
    }
    if let Some(round) = snapshot["round"].as_u64() {
        println!("  round = {}", round);
    }
    if let Some(height) = snapshot["height"].as_u64() {
        println!("  height = {}", height);
    }
    println!(
        "  restart = {}",
        snapshot["restart"].as_str().unwrap_or("unknown")
    );
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_url_prefers_explicit_url() {
        let url = control_url(Path::new("/nonexistent.toml"), Some("http://10.0.0.5:5001/")).unwrap();
        assert_eq!(url, "http://10.0.0.5:5001");
    }

    #[test]
    fn test_control_url_from_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("round-monitor.toml");
        std::fs::write(&path, "[server]\nhost = \"127.0.0.1\"\nport = 6001\n").unwrap();

        assert_eq!(control_url(&path, None).unwrap(), "http://127.0.0.1:6001");
    }
}
