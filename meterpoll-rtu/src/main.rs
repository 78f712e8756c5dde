//! Modbus RTU energy-meter poller.
//!
//! Polls the meter on a fixed cadence and keeps a JSON snapshot of the
//! latest readings on disk.

use anyhow::{Context, Result};
use meterpoll_common::{PollerHealth, ServiceArgs, ServiceConfig};
use std::sync::Arc;
use tracing::info;

use meterpoll_rtu::config::MeterPollConfig;
use meterpoll_rtu::poller::RegisterPoller;
use meterpoll_rtu::scheduler::CycleScheduler;
use meterpoll_rtu::snapshot::SnapshotWriter;
use meterpoll_rtu::transport::RtuTransport;

#[tokio::main]
async fn main() -> Result<()> {
    let args = ServiceArgs::parse_with_default("meterpoll.json5");

    // Load configuration
    let config = MeterPollConfig::load(&args.config)
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;

    // Initialize logging
    let log_config = config
        .logging()
        .with_level_override(args.log_level.as_deref());
    meterpoll_common::init_tracing(&log_config).context("Failed to init tracing")?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting meterpoll-rtu");
    info!("Loaded configuration from {:?}", args.config);

    let table = config
        .register_table()
        .context("Invalid register table")?;

    // The poll loop is useless without a bus, so this is fatal
    let transport = RtuTransport::open(
        &config.meter.serial,
        config.meter.slave_id,
        config.meter.timeout(),
    )
    .with_context(|| format!("Failed to open Modbus RTU on {}", config.meter.serial.port))?;

    let health = Arc::new(PollerHealth::new("meterpoll-rtu"));
    let poller = RegisterPoller::new(
        transport,
        table,
        config.meter.slave_id,
        config.polling.register_delay(),
    );
    let mut scheduler = CycleScheduler::new(
        poller,
        SnapshotWriter::new(&config.snapshot.path),
        config.polling.cycle_interval(),
        health.clone(),
    )
    .with_status_path(config.snapshot.status_path.clone());

    scheduler.startup().await;

    if args.once {
        let report = scheduler.run_cycle().await;
        info!(status = %report.status(), "Single cycle finished");
        return Ok(());
    }

    tokio::select! {
        _ = scheduler.run() => {}
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("Received shutdown signal");
        }
    }

    let snapshot = health.snapshot();
    info!(
        status = %snapshot.status,
        cycles = snapshot.cycles_completed,
        registers_read = snapshot.registers_read,
        registers_failed = snapshot.registers_failed,
        snapshots_failed = snapshot.snapshots_failed,
        "Meter poller stopped"
    );

    Ok(())
}
