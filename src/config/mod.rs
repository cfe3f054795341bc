pub mod device;
pub mod points;
pub mod settings;

pub use device::DeviceConfig;
pub use points::{DataType, MetricDef, PointGroup, PointSchema, HOLDING_REGISTER_BASE};
pub use settings::{AgentSettings, CollectorConfig};
