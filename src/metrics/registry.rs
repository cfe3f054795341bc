use log::debug;
use prometheus::proto::MetricType;
use prometheus::{Encoder, GaugeVec, IntCounterVec, Opts, Registry, TextEncoder};
use std::collections::HashMap;

use crate::config::points::PointSchema;
use crate::utils::error::CollectorError;

pub const CONNECTION_STATUS: &str = "device_connection_status";
pub const READ_TOTAL: &str = "device_read_total";
pub const READ_ERRORS: &str = "device_read_errors_total";
pub const READ_DURATION: &str = "device_read_duration";

/// Hostname of the collector, used as the `host` label on every series.
pub fn host_identity() -> String {
    gethostname::gethostname().to_string_lossy().into_owned()
}

/// Per-device health series, labelled `{device, ip, host}`.
///
/// The `ip` label follows failover, so each address keeps its own history.
struct DeviceCounters {
    connection_status: GaugeVec,
    read_total: IntCounterVec,
    read_errors: IntCounterVec,
    read_duration: GaugeVec,
}

impl DeviceCounters {
    fn register(registry: &Registry) -> Result<Self, CollectorError> {
        let labels = ["device", "ip", "host"];

        let connection_status = GaugeVec::new(
            Opts::new(CONNECTION_STATUS, "Device connection status (1=connected, 0=disconnected)"),
            &labels,
        )?;
        let read_total = IntCounterVec::new(Opts::new(READ_TOTAL, "Total device read cycles"), &labels)?;
        let read_errors =
            IntCounterVec::new(Opts::new(READ_ERRORS, "Total failed register group reads"), &labels)?;
        let read_duration = GaugeVec::new(
            Opts::new(READ_DURATION, "Duration of the last collection cycle in seconds"),
            &labels,
        )?;

        registry.register(Box::new(connection_status.clone()))?;
        registry.register(Box::new(read_total.clone()))?;
        registry.register(Box::new(read_errors.clone()))?;
        registry.register(Box::new(read_duration.clone()))?;

        Ok(Self {
            connection_status,
            read_total,
            read_errors,
            read_duration,
        })
    }
}

/// Decoded point values and device counters for one device.
///
/// Built once from the point schema; the set of series never changes after
/// construction. A point's series appears on its first successful decode and
/// keeps its last value until overwritten.
pub struct MetricRegistry {
    registry: Registry,
    device_id: String,
    host: String,
    points: HashMap<String, GaugeVec>,
    counters: DeviceCounters,
}

impl MetricRegistry {
    pub fn new(schema: &PointSchema, device_id: &str, host: &str) -> Result<Self, CollectorError> {
        let registry = Registry::new();
        let mut points = HashMap::new();

        for metric in schema.metrics() {
            let gauge = GaugeVec::new(Opts::new(metric.id.clone(), metric.help_text()), &["device", "host"])?;
            registry.register(Box::new(gauge.clone())).map_err(|e| {
                CollectorError::MetricsError(format!("Cannot register metric '{}': {}", metric.id, e))
            })?;
            debug!("📈 Created metric: {} - {}", metric.id, metric.display_name);
            points.insert(metric.id.clone(), gauge);
        }

        let counters = DeviceCounters::register(&registry)?;

        Ok(Self {
            registry,
            device_id: device_id.to_string(),
            host: host.to_string(),
            points,
            counters,
        })
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Underlying registry, shared with the exporter.
    pub fn prometheus_registry(&self) -> &Registry {
        &self.registry
    }

    /// Returns false when `metric_id` is not part of the schema.
    pub fn set_point(&self, metric_id: &str, value: f64) -> bool {
        match self.points.get(metric_id) {
            Some(gauge) => {
                gauge.with_label_values(&[&self.device_id, &self.host]).set(value);
                true
            }
            None => false,
        }
    }

    pub fn point_value(&self, metric_id: &str) -> Option<f64> {
        self.sample(metric_id, &[("device", &self.device_id), ("host", &self.host)])
    }

    pub fn set_connection_status(&self, ip: &str, connected: bool) {
        self.counters
            .connection_status
            .with_label_values(&[&self.device_id, ip, &self.host])
            .set(if connected { 1.0 } else { 0.0 });
    }

    pub fn inc_read_total(&self, ip: &str) {
        self.counters
            .read_total
            .with_label_values(&[&self.device_id, ip, &self.host])
            .inc();
    }

    pub fn inc_read_errors(&self, ip: &str) {
        self.counters
            .read_errors
            .with_label_values(&[&self.device_id, ip, &self.host])
            .inc();
    }

    pub fn set_read_duration(&self, ip: &str, seconds: f64) {
        self.counters
            .read_duration
            .with_label_values(&[&self.device_id, ip, &self.host])
            .set(seconds);
    }

    pub fn connection_status(&self, ip: &str) -> Option<f64> {
        self.device_sample(CONNECTION_STATUS, ip)
    }

    pub fn read_total(&self, ip: &str) -> u64 {
        self.device_sample(READ_TOTAL, ip).unwrap_or(0.0) as u64
    }

    pub fn read_errors(&self, ip: &str) -> u64 {
        self.device_sample(READ_ERRORS, ip).unwrap_or(0.0) as u64
    }

    pub fn read_duration(&self, ip: &str) -> Option<f64> {
        self.device_sample(READ_DURATION, ip)
    }

    /// Prometheus text exposition of every series in this registry.
    pub fn encode_text(&self) -> Result<String, CollectorError> {
        encode_registry(&self.registry)
    }

    fn device_sample(&self, name: &str, ip: &str) -> Option<f64> {
        self.sample(
            name,
            &[("device", &self.device_id), ("ip", ip), ("host", &self.host)],
        )
    }

    fn sample(&self, name: &str, labels: &[(&str, &str)]) -> Option<f64> {
        let families = self.registry.gather();
        let family = families.iter().find(|f| f.get_name() == name)?;
        let metric = family.get_metric().iter().find(|m| {
            labels.iter().all(|(key, value)| {
                m.get_label()
                    .iter()
                    .any(|l| l.get_name() == *key && l.get_value() == *value)
            })
        })?;

        match family.get_field_type() {
            MetricType::GAUGE => Some(metric.get_gauge().get_value()),
            MetricType::COUNTER => Some(metric.get_counter().get_value()),
            _ => None,
        }
    }
}

pub fn encode_registry(registry: &Registry) -> Result<String, CollectorError> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| CollectorError::SerializationError(e.to_string()))
}
