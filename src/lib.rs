//! pingmon - A cooperative ICMP liveness and latency monitor
//!
//! This library probes a small, fixed set of endpoints in bursts of three
//! echo requests, keeps a short rolling history per endpoint, and reports
//! once every endpoint has finished a burst. Probing is driven by repeated
//! calls to [`ProbeScheduler::tick`], each of which works within a soft
//! time budget so the monitor can share a single thread with other work.
//!
//! # Examples
//!
//! ```no_run
//! use pingmon::{MonitorConfig, ProbeScheduler, SystemClock};
//! use pingmon::dns::HostResolver;
//! use pingmon::socket::IcmpEchoTransport;
//! use std::rc::Rc;
//!
//! fn main() -> anyhow::Result<()> {
//!     let runtime = Rc::new(
//!         tokio::runtime::Builder::new_current_thread().enable_all().build()?,
//!     );
//!     let transport = IcmpEchoTransport::open(HostResolver::new(runtime), None)?;
//!     let mut scheduler = ProbeScheduler::new(transport, SystemClock::new(), MonitorConfig::default());
//!     scheduler.add_target("dns", "1.1.1.1")?;
//!
//!     loop {
//!         if scheduler.tick()?.published {
//!             println!("{:?}", scheduler.stats(0));
//!         }
//!         std::thread::sleep(std::time::Duration::from_millis(100));
//!     }
//! }
//! ```

pub mod config;
pub mod dns;
pub mod monitor;
pub mod probe;
pub mod public_ip;
pub mod socket;

#[cfg(test)]
mod tests;

// Re-export core types for library users
pub use config::TimingConfig;
pub use monitor::{
    Clock, HostSource, ManualClock, MonitorConfig, MonitorConfigBuilder, MonitorError,
    ProbeScheduler, ProbeStats, ProbeTarget, Sample, SchedulerState, SystemClock, TickReport,
};
pub use probe::{ProbeLine, ProbeOutcome, ProbeRequest, ProbeTransport};
