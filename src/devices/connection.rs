use log::{error, info, warn};
use std::fmt;
use std::sync::Arc;
use tokio::time::Instant;

use crate::config::DeviceConfig;
use crate::metrics::MetricRegistry;
use crate::modbus::{ModbusSession, ModbusTransport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Failed => write!(f, "failed"),
        }
    }
}

/// Owns the runtime connection state of the device and applies the
/// primary/backup failover policy.
///
/// After a failed attempt the manager stays quiet for `retry_interval`, then
/// tries the other address. The switch is symmetric: once on the backup it only
/// returns to the primary after the backup fails too.
pub struct ConnectionManager {
    device: DeviceConfig,
    transport: Arc<dyn ModbusTransport>,
    current_ip: String,
    last_fail_time: Option<Instant>,
    state: ConnectionState,
}

impl ConnectionManager {
    pub fn new(device: DeviceConfig, transport: Arc<dyn ModbusTransport>) -> Self {
        let current_ip = device.primary_ip.clone();
        Self {
            device,
            transport,
            current_ip,
            last_fail_time: None,
            state: ConnectionState::Disconnected,
        }
    }

    pub fn device(&self) -> &DeviceConfig {
        &self.device
    }

    pub fn current_ip(&self) -> &str {
        &self.current_ip
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn last_fail_time(&self) -> Option<Instant> {
        self.last_fail_time
    }

    /// True while a previous failure still blocks reconnection.
    pub fn in_cooldown(&self, now: Instant) -> bool {
        match (self.state, self.last_fail_time) {
            (ConnectionState::Failed, Some(failed_at)) => {
                now.saturating_duration_since(failed_at) < self.device.retry_interval_duration()
            }
            _ => false,
        }
    }

    /// Open a session to the current address, or `None` if in cooldown or the
    /// attempt failed. Failures never escape as errors.
    pub async fn acquire(&mut self, metrics: &MetricRegistry) -> Option<Box<dyn ModbusSession>> {
        if self.in_cooldown(Instant::now()) {
            return None;
        }

        let ip = self.current_ip.clone();
        match self
            .transport
            .open(&ip, self.device.port, self.device.timeout_duration())
            .await
        {
            Ok(session) => {
                info!("✅ Connected to device {} ({})", self.device.name, ip);
                self.state = ConnectionState::Connected;
                metrics.set_connection_status(&ip, true);
                Some(session)
            }
            Err(e) => {
                error!("❌ Error connecting to device {} ({}): {}", self.device.name, ip, e);
                self.handle_connection_failure(&ip, metrics);
                None
            }
        }
    }

    /// Replace a session whose stream can no longer be trusted with a fresh one
    /// to the same address. Failure here does not fail over or start a
    /// cooldown; the next `acquire()` deals with an unreachable device.
    pub async fn reopen(&mut self, metrics: &MetricRegistry) -> Option<Box<dyn ModbusSession>> {
        let ip = self.current_ip.clone();
        info!("🔄 Reopening session to device {} ({})", self.device.name, ip);
        match self
            .transport
            .open(&ip, self.device.port, self.device.timeout_duration())
            .await
        {
            Ok(session) => Some(session),
            Err(e) => {
                error!("❌ Error reopening session to device {} ({}): {}", self.device.name, ip, e);
                self.state = ConnectionState::Disconnected;
                metrics.set_connection_status(&ip, false);
                None
            }
        }
    }

    fn handle_connection_failure(&mut self, failed_ip: &str, metrics: &MetricRegistry) {
        warn!("⚠️  Connection to device {} ({}) failed", self.device.name, failed_ip);
        self.last_fail_time = Some(Instant::now());
        self.state = ConnectionState::Failed;
        metrics.set_connection_status(failed_ip, false);

        self.current_ip = self.device.alternate_ip(failed_ip).to_string();
        if self.current_ip == self.device.backup_ip {
            info!("🔀 Switching to backup IP: {}", self.current_ip);
        } else {
            info!("🔀 Switching to primary IP: {}", self.current_ip);
        }
    }
}
