//! Probe samples and the statistics aggregated from them

use serde::Serialize;

/// TTL value recorded when the reply TTL is unknown or out of range
pub const UNKNOWN_TTL: u8 = 255;

/// Round-trip time reported when every recorded probe timed out
pub const DOWN_RTT_MS: u32 = 999;

/// One slot of a target's history window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Sample {
    /// Nothing recorded in this slot yet
    #[default]
    Unset,
    /// The probe timed out
    TimedOut,
    /// The probe was answered
    Reply {
        /// Round-trip time in milliseconds
        rtt_ms: u32,
        /// Reply TTL in `0..=254`, or [`UNKNOWN_TTL`]
        ttl: u8,
    },
}

impl Sample {
    /// Build a reply sample, mapping unknown or out-of-range TTLs to [`UNKNOWN_TTL`]
    pub fn reply(rtt_ms: u32, ttl: Option<u8>) -> Self {
        Sample::Reply {
            rtt_ms,
            ttl: ttl.unwrap_or(UNKNOWN_TTL),
        }
    }

    /// Whether a probe outcome is recorded in this slot
    pub fn is_set(&self) -> bool {
        !matches!(self, Sample::Unset)
    }
}

/// Health summary of one target over its history window
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProbeStats {
    /// Number of recorded probe outcomes
    pub sent: u32,
    /// Number of recorded timeouts
    pub lost: u32,
    /// Share of lost probes, 0-100; 100 when nothing has been recorded
    pub loss_percent: f32,
    /// Mean round-trip time of the answered probes, [`DOWN_RTT_MS`] when none answered
    pub avg_rtt_ms: u32,
    /// Truncated mean TTL of the answered probes whose TTL is known, 0 when there are none
    pub avg_ttl: u8,
}

impl ProbeStats {
    /// Aggregate a history window
    pub fn from_samples<'a>(samples: impl IntoIterator<Item = &'a Sample>) -> Self {
        let mut sent = 0u32;
        let mut lost = 0u32;
        let mut rtt_sum = 0u64;
        let mut ttl_sum = 0u32;
        let mut ttl_known = 0u32;

        for sample in samples {
            match *sample {
                Sample::Unset => {}
                Sample::TimedOut => {
                    sent += 1;
                    lost += 1;
                }
                Sample::Reply { rtt_ms, ttl } => {
                    sent += 1;
                    rtt_sum += u64::from(rtt_ms);
                    if ttl != UNKNOWN_TTL {
                        ttl_sum += u32::from(ttl);
                        ttl_known += 1;
                    }
                }
            }
        }

        if sent > lost {
            let answered = sent - lost;
            ProbeStats {
                sent,
                lost,
                loss_percent: lost as f32 * 100.0 / sent as f32,
                avg_rtt_ms: (rtt_sum / u64::from(answered)) as u32,
                avg_ttl: ttl_sum.checked_div(ttl_known).unwrap_or(0) as u8,
            }
        } else {
            // Nothing answered: either no samples at all or only timeouts
            ProbeStats {
                sent,
                lost,
                loss_percent: 100.0,
                avg_rtt_ms: DOWN_RTT_MS,
                avg_ttl: 0,
            }
        }
    }

    /// Whether no recorded probe was answered
    pub fn is_down(&self) -> bool {
        self.sent == self.lost
    }
}
