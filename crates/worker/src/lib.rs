pub mod config;
pub mod job;
pub mod logging;
pub mod metrics;
pub mod processor;
pub mod queue;

pub use config::{LogFormat, WorkerConfig};
pub use job::{JobOutcome, JobStatus, WorkItem, WorkerError};
pub use metrics::{MetricsSnapshot, WorkerMetrics};
pub use processor::{Disposition, JobProcessor};
pub use queue::{Delivery, JobQueue, JsonLinesQueue, MemoryQueue};
