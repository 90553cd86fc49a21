//! Short-lived cache of forward lookups
//!
//! Entries expire after a fixed TTL, kept short so that hosts behind dynamic
//! DNS are picked up quickly. The monitor is single-threaded, so the cache
//! uses interior mutability instead of a lock.

use std::cell::RefCell;
use std::collections::HashMap;
use std::net::IpAddr;
use std::time::{Duration, Instant};

/// Default lifetime of a cached answer
pub const DEFAULT_HOST_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy)]
struct Answer {
    addr: IpAddr,
    expires_at: Instant,
}

/// Host name to address answers, each valid for `ttl`
#[derive(Debug)]
pub struct HostCache {
    answers: RefCell<HashMap<String, Answer>>,
    ttl: Duration,
}

impl HostCache {
    /// Create an empty cache whose answers live for `ttl`
    pub fn new(ttl: Duration) -> Self {
        Self {
            answers: RefCell::new(HashMap::new()),
            ttl,
        }
    }

    /// Lifetime of a cached answer
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached address of `host`, if it has not expired
    pub fn get(&self, host: &str) -> Option<IpAddr> {
        let mut answers = self.answers.borrow_mut();
        match answers.get(host) {
            Some(answer) if Instant::now() < answer.expires_at => Some(answer.addr),
            Some(_) => {
                answers.remove(host);
                None
            }
            None => None,
        }
    }

    /// Remember `addr` as the answer for `host`, dropping expired answers
    pub fn insert(&self, host: &str, addr: IpAddr) {
        let now = Instant::now();
        let mut answers = self.answers.borrow_mut();
        answers.retain(|_, answer| now < answer.expires_at);
        answers.insert(
            host.to_string(),
            Answer {
                addr,
                expires_at: now + self.ttl,
            },
        );
    }

    /// Number of stored answers, expired ones included
    pub fn len(&self) -> usize {
        self.answers.borrow().len()
    }

    /// Whether nothing is stored
    pub fn is_empty(&self) -> bool {
        self.answers.borrow().is_empty()
    }

    /// Forget every answer
    pub fn clear(&self) {
        self.answers.borrow_mut().clear();
    }
}

impl Default for HostCache {
    fn default() -> Self {
        Self::new(DEFAULT_HOST_TTL)
    }
}
