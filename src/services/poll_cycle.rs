use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::{PointGroup, PointSchema};
use crate::devices::ConnectionManager;
use crate::metrics::MetricRegistry;
use crate::modbus::{decode, ModbusSession};
use crate::output::MetricsPublisher;
use crate::services::scheduler::CycleTask;
use crate::utils::error::CollectorError;

/// Outcome of one collection pass.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    /// Address used for the cycle, or the next one to try if the attempt failed.
    pub ip: String,
    pub connected: bool,
    pub groups_read: usize,
    pub groups_failed: usize,
    pub metrics_updated: usize,
    pub decode_failures: usize,
    /// `None` when nothing was published this cycle.
    pub published: Option<bool>,
    pub duration: Duration,
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.connected {
            return write!(
                f,
                "no session ({}), next address {}, {:.3}s",
                self.started_at.format("%Y-%m-%d %H:%M:%S"),
                self.ip,
                self.duration.as_secs_f64()
            );
        }
        write!(
            f,
            "{} via {}: {} groups read, {} failed, {} metrics updated, {} decode failures, {:.3}s",
            self.started_at.format("%Y-%m-%d %H:%M:%S"),
            self.ip,
            self.groups_read,
            self.groups_failed,
            self.metrics_updated,
            self.decode_failures,
            self.duration.as_secs_f64()
        )
    }
}

/// One device's collection pipeline: connect, read every group, decode into
/// the registry, record counters, optionally publish.
pub struct PollCycle {
    connection: ConnectionManager,
    schema: PointSchema,
    metrics: MetricRegistry,
    publisher: Option<Box<dyn MetricsPublisher>>,
}

impl PollCycle {
    pub fn new(connection: ConnectionManager, schema: PointSchema, metrics: MetricRegistry) -> Self {
        Self {
            connection,
            schema,
            metrics,
            publisher: None,
        }
    }

    pub fn with_publisher(mut self, publisher: Box<dyn MetricsPublisher>) -> Self {
        info!(
            "📤 Added {} publisher to {}",
            publisher.publisher_type(),
            publisher.destination()
        );
        self.publisher = Some(publisher);
        self
    }

    pub fn metrics(&self) -> &MetricRegistry {
        &self.metrics
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    pub async fn run(&mut self) -> CycleReport {
        let started = Instant::now();
        let mut report = CycleReport {
            started_at: Utc::now(),
            ip: self.connection.current_ip().to_string(),
            connected: false,
            groups_read: 0,
            groups_failed: 0,
            metrics_updated: 0,
            decode_failures: 0,
            published: None,
            duration: Duration::ZERO,
        };

        if let Some(session) = self.connection.acquire(&self.metrics).await {
            let ip = self.connection.current_ip().to_string();
            report.connected = true;
            self.metrics.inc_read_total(&ip);

            let mut session = Some(session);
            let mut reopen_failed = false;
            for group in &self.schema.metric_groups {
                // A timed-out or broken read leaves the stream out of step, so
                // the next group gets a fresh session.
                if session.is_none() && !reopen_failed {
                    session = self.connection.reopen(&self.metrics).await;
                    reopen_failed = session.is_none();
                }

                let result = match session.as_mut() {
                    Some(active) => read_group(active.as_mut(), group).await,
                    None => Err(CollectorError::ConnectionError(format!(
                        "No session to {}",
                        ip
                    ))),
                };

                match result {
                    Ok(words) => {
                        report.groups_read += 1;
                        let (updated, failed) = apply_group(&self.metrics, group, &words);
                        report.metrics_updated += updated;
                        report.decode_failures += failed;
                    }
                    Err(e) => {
                        error!(
                            "❌ Read error from unit {}, address {}: {}",
                            group.device_unit_id, group.start_address, e
                        );
                        self.metrics.inc_read_errors(&ip);
                        report.groups_failed += 1;

                        if e.poisons_session() {
                            if let Some(stale) = session.take() {
                                close_session(stale, &ip).await;
                            }
                        }
                    }
                }
            }

            if let Some(active) = session {
                close_session(active, &ip).await;
            }
        }

        let duration = started.elapsed();
        report.ip = self.connection.current_ip().to_string();
        report.duration = duration;
        self.metrics
            .set_read_duration(&report.ip, duration.as_secs_f64());
        debug!(
            "⏱️  Collection for device {} finished in {:.3}s",
            self.connection.device().name,
            duration.as_secs_f64()
        );

        if report.connected {
            if let Some(publisher) = &self.publisher {
                report.published = Some(match publisher.publish(&self.metrics).await {
                    Ok(()) => true,
                    Err(e) => {
                        error!(
                            "❌ Failed to push metrics to {}: {}",
                            publisher.destination(),
                            e
                        );
                        false
                    }
                });
            }
        }

        report
    }
}

#[async_trait]
impl CycleTask for PollCycle {
    async fn run_cycle(&mut self) -> Result<CycleReport, CollectorError> {
        Ok(self.run().await)
    }
}

async fn close_session(mut session: Box<dyn ModbusSession>, ip: &str) {
    if let Err(e) = session.close().await {
        warn!("⚠️  Failed to close session to {}: {}", ip, e);
    }
}

async fn read_group(
    session: &mut dyn ModbusSession,
    group: &PointGroup,
) -> Result<Vec<u16>, CollectorError> {
    let address = group.zero_based_address()?;
    debug!(
        "📊 Reading {} registers from unit {} at address {}",
        group.register_count, group.device_unit_id, address
    );

    let words = session
        .read_holding_registers(group.device_unit_id, address, group.register_count)
        .await?;
    if words.is_empty() {
        return Err(CollectorError::ProtocolException {
            unit_id: group.device_unit_id,
            message: "Empty register response".to_string(),
        });
    }
    Ok(words)
}

/// Decode every point of `group`; returns (updated, failed).
fn apply_group(metrics: &MetricRegistry, group: &PointGroup, words: &[u16]) -> (usize, usize) {
    let mut updated = 0;
    let mut failed = 0;

    for metric in &group.metrics {
        match decode(words, metric) {
            Ok(value) => {
                metrics.set_point(&metric.id, value);
                debug!("📈 Updated metric {} = {}", metric.id, value);
                updated += 1;
            }
            Err(e) => {
                error!("❌ Error processing metric {}: {}", metric.id, e);
                failed += 1;
            }
        }
    }

    (updated, failed)
}
