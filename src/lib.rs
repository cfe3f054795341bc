//! Modbus TCP Collector Agent
//!
//! Polls a single Modbus TCP device (with a primary and a backup address) at a
//! fixed interval, decodes the configured holding registers into Prometheus
//! gauges and either serves them locally or pushes them to a push gateway.

pub mod config;
pub mod modbus;
pub mod devices;
pub mod metrics;
pub mod services;
pub mod output;
pub mod utils;
pub mod cli;

// Re-export commonly used types
pub use config::{AgentSettings, CollectorConfig, DataType, DeviceConfig, MetricDef, PointGroup, PointSchema};
pub use devices::{ConnectionManager, ConnectionState};
pub use metrics::MetricRegistry;
pub use modbus::{decode, DecodeError, ModbusSession, ModbusTransport, TcpTransport};
pub use output::MetricsPublisher;
pub use services::{CycleReport, CycleTask, PollCycle, Scheduler, SchedulerStats};
pub use utils::error::CollectorError;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
