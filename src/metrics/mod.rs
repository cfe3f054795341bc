pub mod registry;

pub use registry::{encode_registry, host_identity, MetricRegistry};
