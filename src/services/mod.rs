pub mod poll_cycle;
pub mod scheduler;
#[cfg(feature = "api")]
pub mod exporter;

pub use poll_cycle::{CycleReport, PollCycle};
pub use scheduler::{CycleTask, Scheduler, SchedulerStats};
#[cfg(feature = "api")]
pub use exporter::MetricsExporter;
