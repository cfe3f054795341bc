use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};
use std::sync::Arc;
use tokio::sync::watch;

use modbus_collector_agent::cli::CliArgs;
use modbus_collector_agent::config::{AgentSettings, CollectorConfig};
use modbus_collector_agent::devices::ConnectionManager;
use modbus_collector_agent::metrics::{host_identity, MetricRegistry};
use modbus_collector_agent::modbus::TcpTransport;
use modbus_collector_agent::services::{PollCycle, Scheduler};

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&args.log_level))
        .format_timestamp_millis()
        .init();

    let settings = AgentSettings::from_args(&args).context("Invalid settings")?;
    let config = CollectorConfig::load(settings).context("Failed to load configuration")?;
    config.print_summary();

    if args.check_config {
        info!("✅ Configuration is valid");
        return Ok(());
    }

    let host = host_identity();
    let metrics = MetricRegistry::new(&config.points, &config.device.id, &host)
        .context("Failed to register metrics")?;
    info!("📊 Registered {} point metrics (host {})", metrics.len(), host);

    #[cfg(feature = "api")]
    let mut exporter = match config.settings.exporter_port {
        0 => None,
        port => {
            let mut exporter = modbus_collector_agent::services::MetricsExporter::new(
                metrics.prometheus_registry().clone(),
            );
            exporter
                .start(port)
                .await
                .context("Failed to start metrics exporter")?;
            Some(exporter)
        }
    };
    #[cfg(not(feature = "api"))]
    if config.settings.exporter_port != 0 {
        log::warn!("⚠️  Built without the `api` feature, local exporter disabled");
    }

    let connection = ConnectionManager::new(config.device.clone(), Arc::new(TcpTransport::new()));
    let mut cycle = PollCycle::new(connection, config.points.clone(), metrics);

    if let Some(gateway) = &config.settings.push_gateway {
        #[cfg(feature = "push")]
        {
            let sender = modbus_collector_agent::output::PushGatewaySender::new(
                gateway,
                &config.device.id,
                config.settings.push_timeout(),
            )
            .context("Failed to create push gateway sender")?;
            cycle = cycle.with_publisher(Box::new(sender));
        }
        #[cfg(not(feature = "push"))]
        log::warn!("⚠️  Built without the `push` feature, ignoring push gateway {}", gateway);
    }

    if args.once {
        let report = cycle.run().await;
        println!("{}", report);
    } else {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("🛑 Received Ctrl+C, shutting down...");
                    let _ = shutdown_tx.send(true);
                }
                Err(e) => error!("❌ Unable to listen for shutdown signal: {}", e),
            }
        });

        let stats = Scheduler::new(config.settings.interval())
            .run(&mut cycle, shutdown_rx)
            .await;
        info!(
            "📈 Completed {} cycles ({} failed, {} abandoned)",
            stats.cycles, stats.failed_cycles, stats.abandoned_cycles
        );
    }

    #[cfg(feature = "api")]
    if let Some(exporter) = exporter.as_mut() {
        exporter.stop().await;
    }

    info!("👋 Collector stopped");
    Ok(())
}
