pub mod pushgateway;

pub use pushgateway::{job_name, MetricsPublisher};
#[cfg(feature = "push")]
pub use pushgateway::{push_url, PushGatewaySender};
