//! Error types for monitor operations

use thiserror::Error;

/// Errors that can occur while configuring or driving the monitor
#[derive(Debug, Error)]
pub enum MonitorError {
    /// The scheduler already holds its maximum number of targets
    ///
    /// The rejected target is not registered; the target count is unchanged.
    #[error("Target capacity exceeded (maximum {capacity})")]
    CapacityExceeded {
        /// Fixed maximum number of targets
        capacity: usize,
    },

    /// A probe was started while another one was still outstanding
    ///
    /// This is a programming error in the driver, not a transient condition.
    #[error("Probe for {target} started while another probe is in flight")]
    ProbeInFlight {
        /// Identifier of the target whose probe was rejected
        target: String,
    },

    /// The transport could not issue the probe
    #[error("Failed to issue probe: {0}")]
    Transport(String),

    /// The target host could not be resolved to an address
    #[error("Failed to resolve host: {0}")]
    Resolution(String),

    /// Invalid configuration provided
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl MonitorError {
    /// Whether this error indicates misuse of the monitor rather than a
    /// network condition
    pub fn is_fatal(&self) -> bool {
        matches!(self, MonitorError::ProbeInFlight { .. })
    }
}
