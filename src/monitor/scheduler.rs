//! Cooperative round-robin probe scheduler
//!
//! The caller drives the scheduler by calling [`ProbeScheduler::tick`] as
//! often as it likes. Each tick walks the targets starting where the last
//! one stopped, lets every target probe if it is due, and stops early once
//! the soft time budget is used up. A single `update` may block for up to
//! the probe timeout, so a tick can overshoot the budget by that much.
//!
//! When a complete pass finds every target at the end of a burst and at
//! least one probe ran since the last report, the publish callback fires.

use crate::monitor::clock::Clock;
use crate::monitor::config::{MonitorConfig, DEFAULT_MAX_TARGETS};
use crate::monitor::stats::ProbeStats;
use crate::monitor::target::{HostSource, ProbeTarget};
use crate::monitor::MonitorError;
use crate::probe::{ProbeLine, ProbeTransport};
use std::borrow::Cow;
use std::fmt;
use tracing::{info, trace, warn};

/// Coarse scheduler state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// No targets registered
    Idle,
    /// Targets are being probed; the current round is not complete
    Sweeping,
    /// Every target finished its burst and a publish is pending
    RoundComplete,
}

/// What a single tick did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Number of targets whose `update` ran
    pub visited: usize,
    /// Number of probe attempts made
    pub probed: usize,
    /// Whether every target was visited within the budget
    pub completed_round: bool,
    /// Whether the publish callback fired
    pub published: bool,
}

/// Round-robin scheduler over at most `N` targets sharing one probe line
pub struct ProbeScheduler<T, C, const N: usize = DEFAULT_MAX_TARGETS> {
    targets: [ProbeTarget; N],
    len: usize,
    cursor: usize,
    publish_pending: bool,
    publish: Option<Box<dyn FnMut()>>,
    line: ProbeLine<T>,
    clock: C,
    config: MonitorConfig,
}

impl<T: ProbeTransport, C: Clock> ProbeScheduler<T, C, DEFAULT_MAX_TARGETS> {
    /// Create a scheduler with the default capacity
    pub fn new(transport: T, clock: C, config: MonitorConfig) -> Self {
        Self::bounded(transport, clock, config)
    }
}

impl<T: ProbeTransport, C: Clock, const N: usize> ProbeScheduler<T, C, N> {
    /// Create a scheduler holding at most `N` targets
    pub fn bounded(transport: T, clock: C, config: MonitorConfig) -> Self {
        Self {
            targets: std::array::from_fn(|_| ProbeTarget::default()),
            len: 0,
            cursor: 0,
            publish_pending: false,
            publish: None,
            line: ProbeLine::new(transport),
            clock,
            config,
        }
    }

    /// Register a target
    ///
    /// Returns the index of the new target, or
    /// [`MonitorError::CapacityExceeded`] when all `N` slots are taken.
    pub fn add_target(
        &mut self,
        id: impl Into<Cow<'static, str>>,
        host: impl Into<HostSource>,
    ) -> Result<usize, MonitorError> {
        if self.len >= N {
            let id = id.into();
            warn!(target_id = %id, capacity = N, "target dropped, scheduler is full");
            return Err(MonitorError::CapacityExceeded { capacity: N });
        }
        let index = self.len;
        self.targets[index].reset(id, host);
        self.len += 1;
        Ok(index)
    }

    fn registered(&self) -> &[ProbeTarget] {
        &self.targets[..self.len]
    }

    /// Register the callback invoked when a round is ready to be reported
    ///
    /// Replaces any previously registered callback. The callback runs inside
    /// `tick` and therefore inside the caller's time budget.
    pub fn on_publish(&mut self, callback: impl FnMut() + 'static) {
        self.publish = Some(Box::new(callback));
    }

    /// Do zero or more probes, depending on the time and on how much has
    /// been done already
    ///
    /// Only a reentrancy violation on the probe line is returned as an
    /// error; the cursor then points at the target that hit it.
    pub fn tick(&mut self) -> Result<TickReport, MonitorError> {
        let started = self.clock.now();
        let mut report = TickReport::default();

        let count = self.len;
        if count == 0 {
            return Ok(report);
        }

        let mut all_ready = true;
        while report.visited < count {
            let index = (self.cursor + report.visited) % count;
            let target = &mut self.targets[index];

            let probed = match target.update(&mut self.line, &self.clock, &self.config) {
                Ok(probed) => probed,
                Err(e) => {
                    self.cursor = index;
                    return Err(e);
                }
            };
            report.visited += 1;

            if probed {
                report.probed += 1;
                self.publish_pending = true;
            }
            all_ready &= target.is_ready();

            if self.clock.now().saturating_sub(started) > self.config.tick_budget {
                trace!(
                    visited = report.visited,
                    remaining = count - report.visited,
                    "tick budget exhausted"
                );
                break;
            }
        }

        self.cursor = (self.cursor + report.visited) % count;
        report.completed_round = report.visited == count;

        if report.completed_round && all_ready && self.publish_pending {
            info!(targets = count, "round complete, publishing");
            if let Some(publish) = self.publish.as_mut() {
                publish();
            }
            self.publish_pending = false;
            report.published = true;
        }

        Ok(report)
    }

    /// Statistics of the target at `index`
    pub fn stats(&self, index: usize) -> Option<ProbeStats> {
        self.registered().get(index).map(ProbeTarget::stats)
    }

    /// The target at `index`
    pub fn target(&self, index: usize) -> Option<&ProbeTarget> {
        self.registered().get(index)
    }

    /// All registered targets in registration order
    pub fn targets(&self) -> impl Iterator<Item = &ProbeTarget> + '_ {
        self.registered().iter()
    }

    /// Number of registered targets
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether no targets are registered
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Maximum number of targets
    pub fn capacity(&self) -> usize {
        N
    }

    /// Index of the target the next tick starts with
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Whether a probe has run since the last publish
    pub fn publish_pending(&self) -> bool {
        self.publish_pending
    }

    /// Current coarse state
    pub fn state(&self) -> SchedulerState {
        if self.len == 0 {
            SchedulerState::Idle
        } else if self.publish_pending && self.registered().iter().all(ProbeTarget::is_ready) {
            SchedulerState::RoundComplete
        } else {
            SchedulerState::Sweeping
        }
    }

    /// Scheduler timing parameters
    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// The time source
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// The shared probe line
    pub fn probe_line(&self) -> &ProbeLine<T> {
        &self.line
    }

    /// Mutable access to the shared probe line, for out-of-band probes
    pub fn probe_line_mut(&mut self) -> &mut ProbeLine<T> {
        &mut self.line
    }
}

impl<T, C, const N: usize> fmt::Debug for ProbeScheduler<T, C, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProbeScheduler")
            .field("targets", &&self.targets[..self.len])
            .field("cursor", &self.cursor)
            .field("publish_pending", &self.publish_pending)
            .field("capacity", &N)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
