//! Probe transport abstraction and the single in-flight probe line
//!
//! The transport underneath the monitor can only track one echo request at
//! a time. [`ProbeLine`] owns the transport together with a busy flag, hands
//! out a [`ProbeTicket`] for the one outstanding probe, and refuses to start
//! another until that ticket has been redeemed through [`ProbeLine::wait`].

use crate::monitor::clock::Clock;
use crate::monitor::MonitorError;
use anyhow::Result;
use std::time::Duration;
use tracing::{error, trace, warn};

/// Number of echo requests sent per probe
pub const ECHO_REQUESTS_PER_PROBE: u16 = 1;

/// Parameters of one probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeRequest {
    /// Number of echo requests to send
    pub count: u16,
    /// How long the transport waits for a reply before reporting a timeout
    pub timeout: Duration,
}

impl ProbeRequest {
    /// A single echo request with the given timeout
    pub fn single(timeout: Duration) -> Self {
        Self {
            count: ECHO_REQUESTS_PER_PROBE,
            timeout,
        }
    }
}

/// Terminal outcome of one probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The host answered
    Reply {
        /// Round-trip time in milliseconds
        rtt_ms: u32,
        /// TTL of the reply packet, if the transport could observe it
        ttl: Option<u8>,
    },
    /// No reply arrived within the timeout
    TimedOut,
}

impl ProbeOutcome {
    /// Whether the host answered
    pub fn is_reply(&self) -> bool {
        matches!(self, ProbeOutcome::Reply { .. })
    }
}

/// Something that can send echo requests and report their outcome
///
/// `issue` starts a probe and returns immediately; the outcome is collected
/// later through non-blocking calls to `poll`. A transport is only ever asked
/// to track one probe at a time.
pub trait ProbeTransport {
    /// Start a probe towards `host`
    fn issue(&mut self, host: &str, request: &ProbeRequest) -> Result<()>;

    /// Return the outcome of the outstanding probe if it has one yet
    fn poll(&mut self) -> Option<ProbeOutcome>;

    /// Forget the outstanding probe without waiting for it
    fn abandon(&mut self) {}
}

impl<T: ProbeTransport + ?Sized> ProbeTransport for Box<T> {
    fn issue(&mut self, host: &str, request: &ProbeRequest) -> Result<()> {
        (**self).issue(host, request)
    }

    fn poll(&mut self) -> Option<ProbeOutcome> {
        (**self).poll()
    }

    fn abandon(&mut self) {
        (**self).abandon();
    }
}

/// Proof that a probe is outstanding on a [`ProbeLine`]
#[derive(Debug)]
#[must_use = "an outstanding probe must be waited for"]
pub struct ProbeTicket {
    issued_at: Duration,
    timeout: Duration,
}

impl ProbeTicket {
    /// Clock time at which the probe was issued
    pub fn issued_at(&self) -> Duration {
        self.issued_at
    }

    /// Clock time after which the line gives up on the transport
    fn give_up_at(&self) -> Duration {
        self.issued_at + self.timeout + self.timeout
    }
}

/// A transport plus the guard that keeps at most one probe in flight
#[derive(Debug)]
pub struct ProbeLine<T> {
    transport: T,
    in_flight: bool,
}

impl<T: ProbeTransport> ProbeLine<T> {
    /// Wrap a transport
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            in_flight: false,
        }
    }

    /// Whether a probe is currently outstanding
    pub fn is_busy(&self) -> bool {
        self.in_flight
    }

    /// Access the underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Mutable access to the underlying transport
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Issue a probe on behalf of `target`
    ///
    /// Fails with [`MonitorError::ProbeInFlight`] if a ticket is still
    /// outstanding, and with a transport or resolution error if the
    /// transport could not send the request. The line stays free in the
    /// latter case.
    pub fn start(
        &mut self,
        target: &str,
        host: &str,
        request: ProbeRequest,
        now: Duration,
    ) -> Result<ProbeTicket, MonitorError> {
        if self.in_flight {
            error!(target_id = target, host, "programming error: probe already in flight");
            return Err(MonitorError::ProbeInFlight {
                target: target.to_string(),
            });
        }

        self.transport.issue(host, &request).map_err(|e| {
            match e.downcast::<MonitorError>() {
                Ok(monitor_error) => monitor_error,
                Err(other) => MonitorError::Transport(format!("{other:#}")),
            }
        })?;

        self.in_flight = true;
        Ok(ProbeTicket {
            issued_at: now,
            timeout: request.timeout,
        })
    }

    /// Block until the outstanding probe has an outcome
    ///
    /// Polls the transport, sleeping `poll_interval` on `clock` between
    /// polls. If the transport has not answered after twice the probe
    /// timeout the probe is abandoned and counted as timed out.
    pub fn wait<C: Clock>(
        &mut self,
        ticket: ProbeTicket,
        clock: &C,
        poll_interval: Duration,
    ) -> ProbeOutcome {
        let outcome = loop {
            if let Some(outcome) = self.transport.poll() {
                break outcome;
            }
            if clock.now() >= ticket.give_up_at() {
                warn!(
                    timeout_ms = ticket.timeout.as_millis() as u64,
                    "transport never reported an outcome, counting probe as timed out"
                );
                self.transport.abandon();
                break ProbeOutcome::TimedOut;
            }
            clock.sleep(poll_interval);
        };

        trace!(?outcome, "probe line released");
        self.in_flight = false;
        outcome
    }
}
