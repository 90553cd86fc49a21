//! Host name resolution for the probe transport

pub mod cache;
pub mod resolver;

pub use cache::HostCache;
pub use resolver::HostResolver;
