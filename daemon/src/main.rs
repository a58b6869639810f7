//! Callsheet daemon binary
//!
//! Polls the notification service, accepts real-time pushes over TCP and
//! shows desktop toasts until interrupted.

use callsheet_core::config::{load_daemon_config_from_toml_path, DaemonFile};
use callsheet_core::utils::init_tracing;
use clap::Parser;
use daemon::toast_renderer::DesktopNotifier;
use daemon::{build_cache, build_service, Daemon};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "callsheetd")]
#[command(about = "Notification delivery daemon for Callsheet")]
#[command(version)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(long, value_name = "FILE", env = "CALLSHEET_CONFIG")]
    config: Option<PathBuf>,

    /// Tracing filter, e.g. `info` or `callsheet_core=debug`
    #[arg(long)]
    log_level: Option<String>,

    /// Address for the push listener
    #[arg(long, value_name = "ADDR")]
    push_bind: Option<String>,

    /// Disable the push listener
    #[arg(long)]
    no_push: bool,

    /// Bearer token for the notification service
    #[arg(long, env = "CALLSHEET_TOKEN", hide_env_values = true)]
    token: Option<String>,
}

impl Args {
    fn into_config(self) -> callsheet_core::Result<DaemonFile> {
        let mut config = match &self.config {
            Some(path) => load_daemon_config_from_toml_path(path)?,
            None => DaemonFile::default(),
        };
        if let Some(level) = self.log_level {
            config.log_level = Some(level);
        }
        if let Some(bind) = self.push_bind {
            config.push.bind = bind;
        }
        if self.no_push {
            config.push.enabled = false;
        }
        if let Some(token) = self.token {
            config.remote.token = Some(token);
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> daemon::Result<()> {
    let config = Args::parse().into_config()?;
    init_tracing(config.log_level())?;

    info!("Starting Callsheet daemon");

    let cache = build_cache(&config.cache)?;
    let service = build_service(&config.remote)?;
    let backend = Arc::new(DesktopNotifier::new(config.coordinator.toast_duration()));

    let daemon = Daemon::start(&config, service, cache, backend).await?;
    if let Some(addr) = daemon.push_addr() {
        info!("Accepting pushes on {}", addr);
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
    } else {
        info!("Received Ctrl+C, shutting down...");
    }

    daemon.stop().await;
    Ok(())
}
