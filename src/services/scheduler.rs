use async_trait::async_trait;
use log::{error, info, warn};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, timeout, MissedTickBehavior};

use crate::services::poll_cycle::CycleReport;
use crate::utils::error::CollectorError;

/// A unit of periodic work driven by [`Scheduler`].
#[async_trait]
pub trait CycleTask: Send {
    async fn run_cycle(&mut self) -> Result<CycleReport, CollectorError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub cycles: u64,
    pub failed_cycles: u64,
    pub abandoned_cycles: u64,
}

/// Runs a [`CycleTask`] at a fixed interval until the shutdown channel flips
/// to `true`.
///
/// Cancellation is observed before each cycle, during the wait between cycles
/// and while a cycle is in flight. An in-flight cycle gets `shutdown_grace` to
/// finish before it is dropped. Errors from a cycle are logged and the loop
/// carries on with the next tick.
pub struct Scheduler {
    interval: Duration,
    shutdown_grace: Duration,
}

impl Scheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            shutdown_grace: Duration::from_secs(10),
        }
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    pub async fn run<T: CycleTask + ?Sized>(
        &self,
        task: &mut T,
        mut shutdown: watch::Receiver<bool>,
    ) -> SchedulerStats {
        let mut stats = SchedulerStats::default();
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("🚀 Scheduler started, interval {:?}", self.interval);

        loop {
            tokio::select! {
                biased;
                _ = wait_for_shutdown(&mut shutdown) => break,
                _ = ticker.tick() => {}
            }

            info!("🔄 Starting data collection...");
            let outcome = {
                let cycle = task.run_cycle();
                tokio::pin!(cycle);
                tokio::select! {
                    result = &mut cycle => Some(result),
                    _ = wait_for_shutdown(&mut shutdown) => {
                        warn!("🛑 Shutdown requested during a cycle, allowing {:?} to finish", self.shutdown_grace);
                        timeout(self.shutdown_grace, &mut cycle).await.ok()
                    }
                }
            };

            stats.cycles += 1;
            match outcome {
                Some(Ok(report)) => {
                    info!("✅ Data collection complete: {}", report);
                    info!("⏳ Next collection in {:?}", self.interval);
                }
                Some(Err(e)) => {
                    stats.failed_cycles += 1;
                    error!("❌ Error during collection: {}", e);
                }
                None => {
                    stats.abandoned_cycles += 1;
                    warn!("⚠️  Abandoned in-flight cycle at shutdown");
                    break;
                }
            }
        }

        info!(
            "🛑 Scheduler stopped after {} cycles ({} failed)",
            stats.cycles, stats.failed_cycles
        );
        stats
    }
}

/// Resolves once `true` is observed. A dropped sender can never cancel, so
/// this then stays pending.
async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
