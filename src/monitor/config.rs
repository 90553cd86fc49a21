//! Configuration types for the probe scheduler

use crate::config::timing;
use crate::monitor::MonitorError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default maximum number of targets a scheduler holds
pub const DEFAULT_MAX_TARGETS: usize = 6;

/// Number of probes in one burst
pub const BURST_SIZE: u32 = 3;

/// Number of probe outcomes retained per target
pub const HISTORY_LEN: usize = 4;

/// Timing parameters of a monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Soft time budget of one tick (default: 500ms)
    pub tick_budget: Duration,
    /// Echo reply timeout (default: 1000ms)
    pub probe_timeout: Duration,
    /// Minimum spacing between probes of one burst (default: 1s)
    pub burst_spacing: Duration,
    /// Idle period between bursts (default: 120s)
    pub sweep_period: Duration,
    /// Transport poll interval while a probe is outstanding (default: 10ms)
    pub poll_interval: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            tick_budget: timing::tick_budget(),
            probe_timeout: timing::probe_timeout(),
            burst_spacing: timing::burst_spacing(),
            sweep_period: timing::sweep_period(),
            poll_interval: timing::poll_interval(),
        }
    }
}

impl MonitorConfig {
    /// Create a new MonitorConfig builder
    pub fn builder() -> MonitorConfigBuilder {
        MonitorConfigBuilder::new()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), MonitorError> {
        if self.probe_timeout.is_zero() {
            return Err(MonitorError::Config(
                "probe_timeout must be greater than 0".to_string(),
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(MonitorError::Config(
                "poll_interval must be greater than 0".to_string(),
            ));
        }
        if self.poll_interval > self.probe_timeout {
            return Err(MonitorError::Config(
                "poll_interval must not exceed probe_timeout".to_string(),
            ));
        }
        if self.burst_spacing > self.sweep_period {
            return Err(MonitorError::Config(
                "burst_spacing must not exceed sweep_period".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for MonitorConfig
pub struct MonitorConfigBuilder {
    config: MonitorConfig,
}

impl MonitorConfigBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self {
            config: MonitorConfig::default(),
        }
    }

    /// Set the per-tick time budget
    pub fn tick_budget(mut self, budget: Duration) -> Self {
        self.config.tick_budget = budget;
        self
    }

    /// Set the probe timeout
    pub fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.config.probe_timeout = timeout;
        self
    }

    /// Set the spacing between probes of one burst
    pub fn burst_spacing(mut self, spacing: Duration) -> Self {
        self.config.burst_spacing = spacing;
        self
    }

    /// Set the idle period between bursts
    pub fn sweep_period(mut self, period: Duration) -> Self {
        self.config.sweep_period = period;
        self
    }

    /// Set the transport poll interval
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<MonitorConfig, MonitorError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for MonitorConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
