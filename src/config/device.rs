use log::{debug, info};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::utils::error::CollectorError;

fn default_timeout() -> f64 {
    3.0
}

fn default_retry_interval() -> f64 {
    60.0
}

/// Identity and connectivity parameters for the single polled device.
///
/// Only the static part lives here. The runtime connection state (current IP,
/// last failure, state) belongs to [`crate::devices::ConnectionManager`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    #[serde(deserialize_with = "id_from_string_or_number")]
    pub id: String,
    pub name: String,
    pub primary_ip: String,
    pub backup_ip: String,
    pub port: u16,
    /// Connect and per-request timeout, in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: f64,
    /// Cooldown after a failed connection attempt, in seconds.
    #[serde(default = "default_retry_interval")]
    pub retry_interval: f64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DeviceId {
    Text(String),
    Number(i64),
}

fn id_from_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match DeviceId::deserialize(deserializer)? {
        DeviceId::Text(text) => text,
        DeviceId::Number(number) => number.to_string(),
    })
}

fn seconds_to_duration(field: &str, seconds: f64) -> Result<Duration, CollectorError> {
    Duration::try_from_secs_f64(seconds).map_err(|e| {
        CollectorError::ConfigError(format!(
            "Device {} must be a non-negative number of seconds, got {} ({})",
            field, seconds, e
        ))
    })
}

impl DeviceConfig {
    pub fn from_json_str(content: &str) -> Result<Self, CollectorError> {
        let config: DeviceConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, CollectorError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            CollectorError::ConfigError(format!(
                "Cannot read device config {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_json_str(&content)
    }

    /// Accepts either a path to a JSON file or the JSON document itself.
    pub fn load(source: &str) -> Result<Self, CollectorError> {
        let path = Path::new(source);
        if path.is_file() {
            debug!("📄 Loading device config from file {}", source);
            Self::from_file(path)
        } else {
            debug!("📄 Parsing inline device config");
            Self::from_json_str(source)
        }
    }

    pub fn validate(&self) -> Result<(), CollectorError> {
        let required = [
            ("id", &self.id),
            ("name", &self.name),
            ("primary_ip", &self.primary_ip),
            ("backup_ip", &self.backup_ip),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(CollectorError::ConfigError(format!(
                    "Device field '{}' must not be empty",
                    field
                )));
            }
        }

        if self.port == 0 {
            return Err(CollectorError::ConfigError(
                "Device port must be nonzero".to_string(),
            ));
        }

        if seconds_to_duration("timeout", self.timeout)?.is_zero() {
            return Err(CollectorError::ConfigError(format!(
                "Device timeout must be a positive number of seconds, got {}",
                self.timeout
            )));
        }
        seconds_to_duration("retry_interval", self.retry_interval)?;

        Ok(())
    }

    /// Saturates instead of panicking; `validate()` rejects values that do not
    /// fit a `Duration`.
    pub fn timeout_duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout).unwrap_or(Duration::MAX)
    }

    pub fn retry_interval_duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.retry_interval).unwrap_or(Duration::MAX)
    }

    /// The address to switch to after `failed_ip` could not be reached.
    pub fn alternate_ip(&self, failed_ip: &str) -> &str {
        if failed_ip == self.primary_ip {
            &self.backup_ip
        } else {
            &self.primary_ip
        }
    }

    pub fn log_summary(&self) {
        info!("🏷️  Device: {} [{}]", self.name, self.id);
        info!(
            "📡 Primary: {}:{} | Backup: {}:{}",
            self.primary_ip, self.port, self.backup_ip, self.port
        );
        info!(
            "⏱️  Timeout: {}s | Retry interval: {}s",
            self.timeout, self.retry_interval
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const DEVICE_JSON: &str = r#"{
        "id": "plc-01",
        "name": "Boiler PLC",
        "primary_ip": "10.0.0.1",
        "backup_ip": "10.0.0.2",
        "port": 502
    }"#;

    #[test]
    fn test_defaults_applied() {
        let config = DeviceConfig::from_json_str(DEVICE_JSON).unwrap();
        assert_eq!(config.id, "plc-01");
        assert_eq!(config.timeout, 3.0);
        assert_eq!(config.retry_interval, 60.0);
        assert_eq!(config.retry_interval_duration(), Duration::from_secs(60));
    }

    #[test]
    fn test_numeric_id_accepted() {
        let json = r#"{"id": 7, "name": "n", "primary_ip": "a", "backup_ip": "b", "port": 502, "timeout": 1.5}"#;
        let config = DeviceConfig::from_json_str(json).unwrap();
        assert_eq!(config.id, "7");
        assert_eq!(config.timeout_duration(), Duration::from_millis(1500));
    }

    #[test]
    fn test_missing_required_field_is_fatal() {
        let json = r#"{"id": "x", "name": "n", "primary_ip": "10.0.0.1", "port": 502}"#;
        let err = DeviceConfig::from_json_str(json).unwrap_err();
        assert!(matches!(err, CollectorError::SerializationError(_)));
        assert!(err.to_string().contains("backup_ip"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let json = r#"{"id": "x", "name": "n", "primary_ip": "a", "backup_ip": "b", "port": 0}"#;
        assert!(matches!(
            DeviceConfig::from_json_str(json),
            Err(CollectorError::ConfigError(_))
        ));

        let json = r#"{"id": "x", "name": "n", "primary_ip": "a", "backup_ip": "b", "port": 502, "timeout": 0}"#;
        assert!(matches!(
            DeviceConfig::from_json_str(json),
            Err(CollectorError::ConfigError(_))
        ));

        let json = r#"{"id": " ", "name": "n", "primary_ip": "a", "backup_ip": "b", "port": 502}"#;
        assert!(matches!(
            DeviceConfig::from_json_str(json),
            Err(CollectorError::ConfigError(_))
        ));
    }

    #[test]
    fn test_durations_out_of_range_rejected() {
        for (field, value) in [
            ("timeout", "1e30"),
            ("timeout", "-1"),
            ("retry_interval", "1e30"),
            ("retry_interval", "-0.5"),
        ] {
            let json = format!(
                r#"{{"id": "x", "name": "n", "primary_ip": "a", "backup_ip": "b", "port": 502, "{}": {}}}"#,
                field, value
            );
            let err = DeviceConfig::from_json_str(&json).unwrap_err();
            assert!(
                matches!(err, CollectorError::ConfigError(ref msg) if msg.contains(field)),
                "{} = {} gave {}",
                field,
                value,
                err
            );
        }
    }

    #[test]
    fn test_duration_accessors_saturate() {
        let mut config = DeviceConfig::from_json_str(DEVICE_JSON).unwrap();
        config.timeout = 1e30;
        config.retry_interval = f64::INFINITY;
        assert_eq!(config.timeout_duration(), Duration::MAX);
        assert_eq!(config.retry_interval_duration(), Duration::MAX);
    }

    #[test]
    fn test_load_from_path_or_inline() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(DEVICE_JSON.as_bytes()).unwrap();

        let from_file = DeviceConfig::load(file.path().to_str().unwrap()).unwrap();
        let inline = DeviceConfig::load(DEVICE_JSON).unwrap();
        assert_eq!(from_file, inline);
    }

    #[test]
    fn test_alternate_ip_is_symmetric() {
        let config = DeviceConfig::from_json_str(DEVICE_JSON).unwrap();
        assert_eq!(config.alternate_ip("10.0.0.1"), "10.0.0.2");
        assert_eq!(config.alternate_ip("10.0.0.2"), "10.0.0.1");
    }
}
