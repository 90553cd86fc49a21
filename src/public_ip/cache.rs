//! Cached "what is my public IP" lookups
//!
//! The answer is refreshed when nothing has been fetched yet, when the
//! lookup URL changes, or when the last fetch is older than the cache TTL.
//! A failed fetch keeps the previous answer and is not retried before the
//! TTL runs out again.

use super::providers::IpFetcher;
use crate::config::timing;
use crate::monitor::clock::Clock;
use std::time::Duration;
use tracing::{debug, warn};

/// Last fetch attempt
#[derive(Debug, Clone)]
struct LastFetch {
    url: String,
    at: Duration,
}

/// Public IP lookup with a time-to-live cache
#[derive(Debug)]
pub struct WhatsMyIp<F> {
    fetcher: F,
    ttl: Duration,
    answer: Option<String>,
    last_fetch: Option<LastFetch>,
}

impl<F: IpFetcher> WhatsMyIp<F> {
    /// Create a lookup with the configured cache TTL (15 minutes by default)
    pub fn new(fetcher: F) -> Self {
        Self::with_ttl(fetcher, timing::public_ip_cache_ttl())
    }

    /// Create a lookup with a custom cache TTL
    pub fn with_ttl(fetcher: F, ttl: Duration) -> Self {
        Self {
            fetcher,
            ttl,
            answer: None,
            last_fetch: None,
        }
    }

    fn is_stale(&self, url: &str, now: Duration) -> bool {
        match &self.last_fetch {
            None => true,
            Some(last) => last.url != url || now.saturating_sub(last.at) > self.ttl,
        }
    }

    /// Current public IP as reported by `url`, fetching only when stale
    pub fn get<C: Clock>(&mut self, url: &str, clock: &C) -> Option<&str> {
        let now = clock.now();
        if self.is_stale(url, now) {
            match self.fetcher.fetch(url) {
                Ok(answer) => {
                    debug!(url, %answer, "public IP refreshed");
                    self.answer = Some(answer);
                }
                Err(e) => warn!(url, error = %e, "public IP lookup failed, keeping previous answer"),
            }
            self.last_fetch = Some(LastFetch {
                url: url.to_string(),
                at: now,
            });
        }
        self.answer.as_deref()
    }

    /// Last known answer without fetching
    pub fn cached(&self) -> Option<&str> {
        self.answer.as_deref()
    }
}
