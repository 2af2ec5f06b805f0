//! Daemon wiring and lifecycle.
//!
//! Startup order matters: alarms are reconciled from the store before
//! the API accepts events, so a restart never loses track of a door that
//! was left open while the process was down.

use std::sync::Arc;

use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;

use crate::alarm::AlarmScheduler;
use crate::api::{self, SharedState};
use crate::clock::SystemClock;
use crate::config::{Config, format_hms};
use crate::error::Result;
use crate::monitor::Monitor;
use crate::notify::PushoverGateway;
use crate::sensor::{SensorRegistry, SledStore};
use crate::tracing::prelude::*;

/// Run the daemon until SIGINT or SIGTERM.
pub async fn run(config: Config) -> Result<()> {
    info!(
        grace_period = %format_hms(config.grace_period),
        database = %config.database_path.display(),
        "Starting doorwatch"
    );

    let shutdown = CancellationToken::new();
    wait_for_signal(shutdown.clone())?;

    let store = Arc::new(SledStore::open(&config.database_path)?);
    let gateway = Arc::new(PushoverGateway::new(config.pushover.clone())?);
    let clock = Arc::new(SystemClock);

    let (scheduler, coordinator) = AlarmScheduler::new(config.grace_period, gateway, clock.clone());
    let coordinator = tokio::spawn(coordinator.run(shutdown.clone()));

    let registry = SensorRegistry::new(store, clock);
    let monitor = Arc::new(Monitor::new(registry, scheduler.clone()));

    monitor.reconcile();

    let served = api::serve(config.api_addr, SharedState { monitor }, shutdown.clone()).await;
    if served.is_err() {
        // Bind failure: nothing else will stop the coordinator.
        shutdown.cancel();
    }

    info!(
        live_alarms = scheduler.live_alarms().len(),
        "Shutting down, pending alarms will not fire"
    );
    if let Err(e) = coordinator.await {
        error!(error = %e, "Alarm coordinator task failed");
    }
    scheduler.shutdown().await;
    info!("Exiting");

    served?;
    Ok(())
}

/// Cancel `shutdown` on the first SIGINT or SIGTERM.
fn wait_for_signal(shutdown: CancellationToken) -> std::io::Result<()> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    tokio::spawn(async move {
        tokio::select! {
            _ = sigint.recv() => info!("Received SIGINT"),
            _ = sigterm.recv() => info!("Received SIGTERM"),
            _ = shutdown.cancelled() => return,
        }
        shutdown.cancel();
    });

    Ok(())
}
