//! A single monitored endpoint
//!
//! A [`ProbeTarget`] keeps the last [`HISTORY_LEN`] probe outcomes of one
//! host in a ring and decides, each time it is updated, whether a probe is
//! due. Probes come in bursts of [`BURST_SIZE`] spaced `burst_spacing`
//! apart, followed by an idle `sweep_period`.

use crate::monitor::clock::Clock;
use crate::monitor::config::{MonitorConfig, BURST_SIZE, HISTORY_LEN};
use crate::monitor::stats::{ProbeStats, Sample};
use crate::monitor::MonitorError;
use crate::probe::{ProbeLine, ProbeOutcome, ProbeRequest, ProbeTransport};
use std::borrow::Cow;
use std::fmt;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Identifier reported for a target that was never reset
pub const INVALID_ID: &str = "<INVALID>";

/// Where a target's host name or address comes from
pub enum HostSource {
    /// A fixed host name or address
    Fixed(String),
    /// Looked up again every time the target is probed
    Resolver(Box<dyn FnMut() -> String>),
}

impl HostSource {
    /// Wrap a resolver callback
    pub fn resolver(f: impl FnMut() -> String + 'static) -> Self {
        HostSource::Resolver(Box::new(f))
    }

    /// Produce the host to probe right now
    pub fn resolve(&mut self) -> String {
        match self {
            HostSource::Fixed(host) => host.clone(),
            HostSource::Resolver(f) => f(),
        }
    }

    /// Whether the host is looked up dynamically
    pub fn is_dynamic(&self) -> bool {
        matches!(self, HostSource::Resolver(_))
    }
}

impl Default for HostSource {
    fn default() -> Self {
        HostSource::Fixed(String::new())
    }
}

impl fmt::Debug for HostSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostSource::Fixed(host) => f.debug_tuple("Fixed").field(host).finish(),
            HostSource::Resolver(_) => f.write_str("Resolver(..)"),
        }
    }
}

impl From<&str> for HostSource {
    fn from(host: &str) -> Self {
        HostSource::Fixed(host.to_string())
    }
}

impl From<String> for HostSource {
    fn from(host: String) -> Self {
        HostSource::Fixed(host)
    }
}

/// One monitored endpoint and its recent probe history
#[derive(Debug, Default)]
pub struct ProbeTarget {
    id: Option<Cow<'static, str>>,
    host: HostSource,
    history: [Sample; HISTORY_LEN],
    cursor: usize,
    total_responses: u32,
    last_probe_at: Duration,
}

impl ProbeTarget {
    /// Create an empty target; it becomes usable after [`reset`](Self::reset)
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a target ready to be probed
    pub fn with_host(id: impl Into<Cow<'static, str>>, host: impl Into<HostSource>) -> Self {
        let mut target = Self::new();
        target.reset(id, host);
        target
    }

    /// Give the target a new identity and clear all history
    pub fn reset(&mut self, id: impl Into<Cow<'static, str>>, host: impl Into<HostSource>) {
        self.id = Some(id.into());
        self.host = host.into();
        self.history = [Sample::Unset; HISTORY_LEN];
        self.cursor = 0;
        self.total_responses = 0;
        self.last_probe_at = Duration::ZERO;
    }

    /// Display name, or [`INVALID_ID`] if the target was never reset
    pub fn id(&self) -> &str {
        self.id.as_deref().unwrap_or(INVALID_ID)
    }

    /// Whether the target has been given an identity
    pub fn is_valid(&self) -> bool {
        self.id.is_some()
    }

    /// The host source of this target
    pub fn host_source(&self) -> &HostSource {
        &self.host
    }

    /// Look up the host to probe; dynamic sources are asked again on every call
    pub fn resolve_host(&mut self) -> String {
        self.host.resolve()
    }

    /// Number of completed probe attempts since the last reset
    pub fn total_responses(&self) -> u32 {
        self.total_responses
    }

    /// Clock time of the last completed probe attempt
    pub fn last_probe_at(&self) -> Duration {
        self.last_probe_at
    }

    /// Index of the history slot that will be written next
    pub fn history_cursor(&self) -> usize {
        self.cursor
    }

    /// History slots from oldest to newest
    pub fn samples(&self) -> impl Iterator<Item = &Sample> + '_ {
        self.history[self.cursor..]
            .iter()
            .chain(self.history[..self.cursor].iter())
    }

    /// Record an answered probe
    pub fn record_reply(&mut self, rtt_ms: u32, ttl: Option<u8>) {
        self.push(Sample::reply(rtt_ms, ttl));
    }

    /// Record a probe that timed out
    pub fn record_timeout(&mut self) {
        self.push(Sample::TimedOut);
    }

    /// Fold a transport outcome into the history
    pub fn record(&mut self, outcome: ProbeOutcome) {
        match outcome {
            ProbeOutcome::Reply { rtt_ms, ttl } => self.record_reply(rtt_ms, ttl),
            ProbeOutcome::TimedOut => self.record_timeout(),
        }
    }

    fn push(&mut self, sample: Sample) {
        self.history[self.cursor] = sample;
        self.cursor = (self.cursor + 1) % HISTORY_LEN;
    }

    /// Whether a probe should be sent at clock time `now`
    ///
    /// Due when the sweep period has passed, when nothing was ever probed,
    /// or when a burst is in progress and the burst spacing has passed.
    pub fn is_due(&self, now: Duration, config: &MonitorConfig) -> bool {
        let elapsed = now.saturating_sub(self.last_probe_at);
        if elapsed > config.sweep_period {
            return true;
        }
        if self.total_responses == 0 {
            return true;
        }
        self.total_responses % BURST_SIZE != 0 && elapsed >= config.burst_spacing
    }

    /// Whether the target has just completed a full burst
    ///
    /// A target that was never probed is not ready.
    pub fn is_ready(&self) -> bool {
        self.total_responses > 0 && self.total_responses % BURST_SIZE == 0
    }

    /// Statistics over the history window
    pub fn stats(&self) -> ProbeStats {
        ProbeStats::from_samples(&self.history)
    }

    /// Probe the target if it is due
    ///
    /// Returns `Ok(true)` when a probe attempt was made. The call blocks
    /// until the transport reports an outcome. A probe the transport could
    /// not issue is logged and still counts as an attempt, but leaves the
    /// history untouched. Only a reentrancy violation is returned as an error.
    pub fn update<T, C>(
        &mut self,
        line: &mut ProbeLine<T>,
        clock: &C,
        config: &MonitorConfig,
    ) -> Result<bool, MonitorError>
    where
        T: ProbeTransport,
        C: Clock,
    {
        if !self.is_due(clock.now(), config) {
            trace!(target_id = self.id(), "not due");
            return Ok(false);
        }

        let host = self.resolve_host();
        let request = ProbeRequest::single(config.probe_timeout);

        match line.start(self.id(), &host, request, clock.now()) {
            Ok(ticket) => {
                let outcome = line.wait(ticket, clock, config.poll_interval);
                self.record(outcome);
                debug!(target_id = self.id(), host = %host, ?outcome, "probe complete");
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(target_id = self.id(), host = %host, error = %e, "probe not sent");
            }
        }

        self.last_probe_at = clock.now();
        self.total_responses += 1;
        Ok(true)
    }
}
