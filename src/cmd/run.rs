//! Monitor runtime: `round-monitor run`.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

pub async fn cmd_run(config_path: &Path, port: Option<u16>, api_url: Option<String>) -> Result<()> {
    use monitor_common::{BlockEvents, ChainState, Directory, SystemClock};
    use round_monitor::config::MonitorConfig;
    use round_monitor::forge_status::ForgeStatusTracker;
    use round_monitor::monitor::{Monitor, MonitorDeps, MonitorSettings, StatusSnapshot};
    use round_monitor::node::{BlockPoller, NodeClient};
    use round_monitor::process::Pm2;
    use round_monitor::restart::{RestartControl, RestartCoordinator};
    use round_monitor::scheduler::{SchedulerExit, SlotScheduler};
    use round_monitor::server::{ControlServer, ControlState};
    use round_monitor::telemetry::init_tracing;

    let config = MonitorConfig::with_cli_args(config_path, port, api_url)?;
    let _log_guard = init_tracing(&config.toml.log)?;

    if !config.enabled() {
        info!("Round monitor is disabled");
        return Ok(());
    }

    let node = Arc::new(NodeClient::new(&config.api_url(), config.request_timeout())?);
    let chain: Arc<dyn ChainState> = node.clone();
    let directory: Arc<dyn Directory> = node;
    info!(api_url = %config.api_url(), "Using node API");

    let restart = Arc::new(RestartControl::new());
    let (status_tx, status_rx) = watch::channel(StatusSnapshot::default());

    let mut server = ControlServer::new(ControlState {
        restart: restart.clone(),
        status: status_rx,
    });
    server
        .start(config.server_host(), config.server_port())
        .await?;

    let poller = BlockPoller::spawn(chain.clone(), config.poll_interval());
    let blocks = poller.subscribe();

    let tracker = {
        let secrets = config.secrets()?;
        ForgeStatusTracker::from_sources(&secrets, &config.delegate_names(), directory.as_ref())
    };

    let coordinator = RestartCoordinator::new(
        restart,
        Arc::new(Pm2::new()),
        config.restart_plan(),
        config.restart_time_buffer(),
    );
    let settings = MonitorSettings {
        show_forging_order: config.toml.show_forging_order,
        status_level: config.status_level(),
        report: config.report_options(),
    };
    let deps = MonitorDeps {
        chain,
        directory,
        clock: Arc::new(SystemClock),
        restart: coordinator,
        status: status_tx,
    };

    let monitor = Monitor::boot(deps, settings, tracker)
        .await
        .context("Failed to boot round monitor")?;

    let exit = SlotScheduler::new(monitor, blocks)
        .run(shutdown_signal())
        .await;

    server.stop();
    drop(poller);

    match exit {
        SchedulerExit::Restarted => info!("Node restart issued, round monitor exiting"),
        SchedulerExit::Shutdown => info!("Round monitor stopped"),
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
