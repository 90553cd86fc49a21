//! Public IP detection, used to monitor a dynamically addressed endpoint

pub mod cache;
pub mod providers;

pub use cache::WhatsMyIp;
pub use providers::{HttpFetcher, IpFetcher, PublicIpError, PublicIpProvider};
