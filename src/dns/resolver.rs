//! Forward resolution of target host names
//!
//! The monitor core runs on a single thread without an async executor, so
//! lookups are driven to completion on a caller-supplied current-thread
//! tokio runtime.

use super::cache::HostCache;
use crate::monitor::MonitorError;
use hickory_resolver::config::ResolverConfig;
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::TokioResolver;
use std::net::IpAddr;
use std::rc::Rc;
use tokio::runtime::Runtime;
use tracing::debug;

/// Resolves host names to IPv4 addresses, with caching
pub struct HostResolver {
    runtime: Rc<Runtime>,
    resolver: TokioResolver,
    cache: HostCache,
}

impl HostResolver {
    /// Create a resolver using the system configuration, falling back to
    /// Cloudflare's public resolvers when none is available
    pub fn new(runtime: Rc<Runtime>) -> Self {
        let resolver = {
            let _guard = runtime.enter();
            match TokioResolver::builder_tokio() {
                Ok(builder) => builder.build(),
                Err(e) => {
                    debug!(error = %e, "no system resolver configuration, using Cloudflare");
                    TokioResolver::builder_with_config(
                        ResolverConfig::cloudflare(),
                        TokioConnectionProvider::default(),
                    )
                    .build()
                }
            }
        };

        Self {
            runtime,
            resolver,
            cache: HostCache::default(),
        }
    }

    /// Replace the lookup cache
    pub fn with_cache(mut self, cache: HostCache) -> Self {
        self.cache = cache;
        self
    }

    /// Resolve a host name or address literal
    pub fn resolve(&self, host: &str) -> Result<IpAddr, MonitorError> {
        // Try parsing as IP first
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(ip);
        }
        if host.is_empty() {
            return Err(MonitorError::Resolution("empty host name".to_string()));
        }

        if let Some(ip) = self.cache.get(host) {
            return Ok(ip);
        }

        let lookup = self
            .runtime
            .block_on(self.resolver.ipv4_lookup(host))
            .map_err(|e| MonitorError::Resolution(format!("{host}: {e}")))?;

        let ip = lookup
            .iter()
            .next()
            .map(|a| IpAddr::V4(a.0))
            .ok_or_else(|| MonitorError::Resolution(format!("{host}: no IPv4 address")))?;

        debug!(host, %ip, "resolved");
        self.cache.insert(host, ip);
        Ok(ip)
    }
}
