//! Core monitoring functionality: targets, statistics and the scheduler

pub mod clock;
pub mod config;
pub mod error;
pub mod scheduler;
pub mod stats;
pub mod target;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{MonitorConfig, MonitorConfigBuilder, BURST_SIZE, DEFAULT_MAX_TARGETS, HISTORY_LEN};
pub use error::MonitorError;
pub use scheduler::{ProbeScheduler, SchedulerState, TickReport};
pub use stats::{ProbeStats, Sample, DOWN_RTT_MS, UNKNOWN_TTL};
pub use target::{HostSource, ProbeTarget};
