//! Global timing configuration with compile-time defaults and runtime overrides
//!
//! Default values are compile-time constants. A [`TimingConfig`] can be
//! installed once at program startup (CLI or library API); every accessor
//! falls back to the constant when nothing was installed.

use once_cell::sync::OnceCell;
use std::time::Duration;

// Compile-time defaults as public constants (in milliseconds)
/// Soft per-tick time budget in milliseconds
pub const DEFAULT_TICK_BUDGET_MS: u64 = 500;
/// Echo reply timeout in milliseconds
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 1000;
/// Minimum spacing between the probes of one burst in milliseconds
pub const DEFAULT_BURST_SPACING_MS: u64 = 1000;
/// Idle period after which a quiescent target is probed again, in milliseconds
///
/// A target is due once strictly more than this much time has elapsed.
pub const DEFAULT_SWEEP_PERIOD_MS: u64 = 120_000;
/// Interval between transport polls while waiting for an outcome, in milliseconds
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10;
/// How long a public IP answer stays fresh, in milliseconds (15 minutes)
pub const DEFAULT_PUBLIC_IP_CACHE_TTL_MS: u64 = 15 * 60 * 1000;

/// Runtime timing overrides
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimingConfig {
    /// Soft per-tick time budget
    pub tick_budget: Duration,
    /// Echo reply timeout
    pub probe_timeout: Duration,
    /// Spacing between probes of one burst
    pub burst_spacing: Duration,
    /// Idle period between bursts
    pub sweep_period: Duration,
    /// Transport poll interval
    pub poll_interval: Duration,
    /// Public IP cache lifetime
    pub public_ip_cache_ttl: Duration,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            tick_budget: Duration::from_millis(DEFAULT_TICK_BUDGET_MS),
            probe_timeout: Duration::from_millis(DEFAULT_PROBE_TIMEOUT_MS),
            burst_spacing: Duration::from_millis(DEFAULT_BURST_SPACING_MS),
            sweep_period: Duration::from_millis(DEFAULT_SWEEP_PERIOD_MS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            public_ip_cache_ttl: Duration::from_millis(DEFAULT_PUBLIC_IP_CACHE_TTL_MS),
        }
    }
}

// Runtime override storage - set once at program startup
static OVERRIDE_CONFIG: OnceCell<TimingConfig> = OnceCell::new();

/// Get the soft per-tick budget
pub fn tick_budget() -> Duration {
    OVERRIDE_CONFIG
        .get()
        .map(|c| c.tick_budget)
        .unwrap_or_else(|| Duration::from_millis(DEFAULT_TICK_BUDGET_MS))
}

/// Get the echo reply timeout
pub fn probe_timeout() -> Duration {
    OVERRIDE_CONFIG
        .get()
        .map(|c| c.probe_timeout)
        .unwrap_or_else(|| Duration::from_millis(DEFAULT_PROBE_TIMEOUT_MS))
}

/// Get the spacing between the probes of one burst
pub fn burst_spacing() -> Duration {
    OVERRIDE_CONFIG
        .get()
        .map(|c| c.burst_spacing)
        .unwrap_or_else(|| Duration::from_millis(DEFAULT_BURST_SPACING_MS))
}

/// Get the idle period between bursts
pub fn sweep_period() -> Duration {
    OVERRIDE_CONFIG
        .get()
        .map(|c| c.sweep_period)
        .unwrap_or_else(|| Duration::from_millis(DEFAULT_SWEEP_PERIOD_MS))
}

/// Get the transport poll interval
pub fn poll_interval() -> Duration {
    OVERRIDE_CONFIG
        .get()
        .map(|c| c.poll_interval)
        .unwrap_or_else(|| Duration::from_millis(DEFAULT_POLL_INTERVAL_MS))
}

/// Get the public IP cache lifetime
pub fn public_ip_cache_ttl() -> Duration {
    OVERRIDE_CONFIG
        .get()
        .map(|c| c.public_ip_cache_ttl)
        .unwrap_or_else(|| Duration::from_millis(DEFAULT_PUBLIC_IP_CACHE_TTL_MS))
}

/// Set the global timing configuration
///
/// This should be called once at program startup if custom timing is needed.
/// Returns the rejected configuration if one has already been set.
pub fn set_config(config: TimingConfig) -> Result<(), TimingConfig> {
    OVERRIDE_CONFIG.set(config)
}

/// Check if custom timing configuration has been set
pub fn is_custom_config_set() -> bool {
    OVERRIDE_CONFIG.get().is_some()
}
