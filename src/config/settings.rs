use log::info;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use super::device::DeviceConfig;
use super::points::PointSchema;
use crate::cli::CliArgs;
use crate::utils::error::CollectorError;

/// Process-level settings: where configuration lives and which collaborators
/// (exporter, push gateway) are enabled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// Device config file path or inline JSON.
    pub device_config: Option<String>,
    pub points_file: String,
    pub push_gateway: Option<String>,
    pub push_timeout_seconds: u64,
    /// 0 disables the local exporter.
    pub exporter_port: u16,
    pub interval_seconds: u64,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            device_config: None,
            points_file: "plc_points.json".to_string(),
            push_gateway: None,
            push_timeout_seconds: 10,
            exporter_port: 0,
            interval_seconds: 5,
        }
    }
}

impl AgentSettings {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, CollectorError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            CollectorError::ConfigError(format!(
                "Cannot read settings file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        let settings: AgentSettings = toml::from_str(&content)?;
        Ok(settings)
    }

    /// Settings file (if any) first, then command line overrides.
    pub fn from_args(args: &CliArgs) -> Result<Self, CollectorError> {
        let mut settings = match &args.settings {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        if let Some(config) = &args.config {
            settings.device_config = Some(config.clone());
        }
        if let Some(points) = &args.points {
            settings.points_file = points.clone();
        }
        if let Some(gateway) = &args.push_gateway {
            settings.push_gateway = Some(gateway.clone());
        }
        if let Some(port) = args.port {
            settings.exporter_port = port;
        }
        if let Some(interval) = args.interval {
            settings.interval_seconds = interval;
        }

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), CollectorError> {
        if self.device_config.as_deref().map_or(true, |c| c.trim().is_empty()) {
            return Err(CollectorError::ConfigError(
                "A device config (--config) is required".to_string(),
            ));
        }
        if self.interval_seconds == 0 {
            return Err(CollectorError::ConfigError(
                "Poll interval must be at least 1 second".to_string(),
            ));
        }
        if self.push_gateway.as_deref().is_some_and(|g| g.trim().is_empty()) {
            return Err(CollectorError::ConfigError(
                "Push gateway URL must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    pub fn push_timeout(&self) -> Duration {
        Duration::from_secs(self.push_timeout_seconds)
    }
}

/// Everything the collector needs, validated before any connection attempt.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub settings: AgentSettings,
    pub device: DeviceConfig,
    pub points: PointSchema,
}

impl CollectorConfig {
    pub fn load(settings: AgentSettings) -> Result<Self, CollectorError> {
        let source = settings.device_config.as_deref().ok_or_else(|| {
            CollectorError::ConfigError("A device config (--config) is required".to_string())
        })?;
        let device = DeviceConfig::load(source)?;
        let points = PointSchema::from_file(&settings.points_file)?;

        Ok(Self {
            settings,
            device,
            points,
        })
    }

    pub fn print_summary(&self) {
        info!("🏭 Modbus Collector Agent v{}", crate::VERSION);
        info!("═══════════════════════════════════════");
        self.device.log_summary();
        info!(
            "📋 Points: {} groups, {} metrics from {}",
            self.points.metric_groups.len(),
            self.points.total_points(),
            self.settings.points_file
        );
        info!("🔄 Polling: {} second intervals", self.settings.interval_seconds);
        match self.settings.exporter_port {
            0 => info!("🌐 Local exporter: DISABLED"),
            port => info!("🌐 Local exporter: port {}", port),
        }
        match &self.settings.push_gateway {
            Some(url) => info!("📤 Push gateway: {}", url),
            None => info!("📤 Push gateway: DISABLED"),
        }
    }
}
