use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use crate::utils::error::CollectorError;

/// Holding registers are addressed 40001-based in point files.
pub const HOLDING_REGISTER_BASE: u32 = 40001;

/// Upper bound on registers per read-holding-registers request.
pub const MAX_REGISTERS_PER_READ: u16 = 125;

/// Register encodings understood by the decoder.
///
/// Unknown names are kept rather than rejected so that a single bad point does
/// not stop collection of its neighbours; decoding such a point always fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DataType {
    Int16,
    Float32,
    Unsupported(String),
}

impl Default for DataType {
    fn default() -> Self {
        DataType::Int16
    }
}

impl From<String> for DataType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "INT16" => DataType::Int16,
            "FLOAT32" => DataType::Float32,
            _ => DataType::Unsupported(value),
        }
    }
}

impl From<DataType> for String {
    fn from(value: DataType) -> Self {
        value.to_string()
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Int16 => write!(f, "INT16"),
            DataType::Float32 => write!(f, "FLOAT32"),
            DataType::Unsupported(name) => write!(f, "{}", name),
        }
    }
}

impl DataType {
    /// Number of consecutive 16-bit words one value occupies.
    pub fn register_width(&self) -> Option<u16> {
        match self {
            DataType::Int16 => Some(1),
            DataType::Float32 => Some(2),
            DataType::Unsupported(_) => None,
        }
    }
}

fn default_scale_factor() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDef {
    pub id: String,
    #[serde(rename = "name")]
    pub display_name: String,
    #[serde(default)]
    pub unit: String,
    pub register_offset: u16,
    #[serde(default)]
    pub data_type: DataType,
    /// Divisor applied to INT16 raw values.
    #[serde(default = "default_scale_factor")]
    pub scale_factor: f64,
}

impl MetricDef {
    pub fn help_text(&self) -> String {
        format!("{} ({})", self.display_name, self.unit)
    }

    /// Whether the value fits inside a read of `register_count` words.
    pub fn fits_in(&self, register_count: u16) -> bool {
        match self.data_type.register_width() {
            Some(width) => u32::from(self.register_offset) + u32::from(width) <= u32::from(register_count),
            None => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointGroup {
    #[serde(rename = "device_id")]
    pub device_unit_id: u8,
    pub start_address: u32,
    #[serde(rename = "count")]
    pub register_count: u16,
    pub metrics: Vec<MetricDef>,
}

impl PointGroup {
    /// Protocol address of the first register, `start_address - 40001`.
    pub fn zero_based_address(&self) -> Result<u16, CollectorError> {
        self.start_address
            .checked_sub(HOLDING_REGISTER_BASE)
            .and_then(|offset| u16::try_from(offset).ok())
            .ok_or_else(|| {
                CollectorError::ConfigError(format!(
                    "Start address {} is outside the holding register range",
                    self.start_address
                ))
            })
    }

    fn validate(&self, index: usize) -> Result<(), CollectorError> {
        let address = self.zero_based_address()?;

        if self.register_count == 0 || self.register_count > MAX_REGISTERS_PER_READ {
            return Err(CollectorError::ConfigError(format!(
                "Group {} (start {}): count must be between 1 and {}, got {}",
                index, self.start_address, MAX_REGISTERS_PER_READ, self.register_count
            )));
        }

        if u32::from(address) + u32::from(self.register_count) > u32::from(u16::MAX) + 1 {
            return Err(CollectorError::ConfigError(format!(
                "Group {} (start {}): {} registers run past the end of the address space",
                index, self.start_address, self.register_count
            )));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PointSchema {
    pub metric_groups: Vec<PointGroup>,
}

impl PointSchema {
    pub fn from_json_str(content: &str) -> Result<Self, CollectorError> {
        let schema: PointSchema = serde_json::from_str(content)?;
        schema.validate()?;
        Ok(schema)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, CollectorError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            CollectorError::ConfigError(format!(
                "Cannot read points config {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        let schema = Self::from_json_str(&content)?;
        info!(
            "📋 Loaded {} point groups with {} monitored points",
            schema.metric_groups.len(),
            schema.total_points()
        );
        Ok(schema)
    }

    pub fn total_points(&self) -> usize {
        self.metric_groups.iter().map(|g| g.metrics.len()).sum()
    }

    pub fn metrics(&self) -> impl Iterator<Item = &MetricDef> {
        self.metric_groups.iter().flat_map(|g| g.metrics.iter())
    }

    /// Structural problems are fatal. Points whose offset or type can never
    /// decode are only warned about; they are skipped every cycle.
    pub fn validate(&self) -> Result<(), CollectorError> {
        if self.metric_groups.is_empty() {
            warn!("⚠️  Points config contains no metric groups");
        }

        let mut seen = HashSet::new();
        for (index, group) in self.metric_groups.iter().enumerate() {
            group.validate(index)?;

            for metric in &group.metrics {
                if !is_valid_metric_name(&metric.id) {
                    return Err(CollectorError::ConfigError(format!(
                        "Metric id '{}' is not a valid metric name",
                        metric.id
                    )));
                }

                if !seen.insert(metric.id.as_str()) {
                    return Err(CollectorError::ConfigError(format!(
                        "Metric id '{}' is defined more than once",
                        metric.id
                    )));
                }

                if !metric.scale_factor.is_finite() || metric.scale_factor == 0.0 {
                    return Err(CollectorError::ConfigError(format!(
                        "Metric '{}' has invalid scale_factor {}",
                        metric.id, metric.scale_factor
                    )));
                }

                if let DataType::Unsupported(name) = &metric.data_type {
                    warn!(
                        "⚠️  Metric '{}' uses unsupported data type '{}', it will never update",
                        metric.id, name
                    );
                } else if !metric.fits_in(group.register_count) {
                    warn!(
                        "⚠️  Metric '{}' ({} at offset {}) does not fit in a {}-register read",
                        metric.id, metric.data_type, metric.register_offset, group.register_count
                    );
                }
            }
        }

        Ok(())
    }
}

/// `[a-zA-Z_:][a-zA-Z0-9_:]*`
fn is_valid_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}
