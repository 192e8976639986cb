//! Runnable entry point for the OMS service: loads configuration,
//! initializes `tracing`, opens a broker connection, and runs the service
//! to completion or until `SIGINT`/`SIGTERM`.
//!
//! Exit codes: 0 clean shutdown, 1 handshake failure at startup, 2
//! unrecoverable read-loop error.

use anyhow::Context;
use lineoms::{error::ConnectionError, oms::OmsService, Config};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    Config::init_logging();

    let config = Config::from_env();

    let service = match connect_with_retries(&config)
        .await
        .context("failed to establish the broker handshake")
    {
        Ok(service) => service,
        Err(e) => {
            error!(error = ?e, attempts = config.reconnect_attempts, "handshake failed at startup");
            std::process::exit(1);
        }
    };

    tokio::select! {
        _ = service.run() => {
            error!("OMS service loop exited unexpectedly");
            std::process::exit(2);
        }
        _ = shutdown_signal() => {
            info!("shutdown signal received, exiting cleanly");
            std::process::exit(0);
        }
    }
}

/// Attempt the initial handshake, retrying up to `config.reconnect_attempts`
/// times with `config.reconnect_delay` between tries — the same
/// loop-and-sleep shape the broker's own listener uses to reconnect after an
/// established session drops, bounded here since this is a one-shot startup
/// attempt rather than a long-lived session.
async fn connect_with_retries(config: &Config) -> Result<OmsService, ConnectionError> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        info!(addr = %config.addr(), attempt, "connecting to broker");
        match OmsService::connect(config.clone()).await {
            Ok(service) => return Ok(service),
            Err(e) if attempt <= config.reconnect_attempts => {
                warn!(error = %e, attempt, "broker connect failed, retrying");
                tokio::time::sleep(config.reconnect_delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Waits for `SIGINT` (works everywhere) or `SIGTERM` (unix only).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
