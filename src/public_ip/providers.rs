//! "What is my IP" services and the HTTP fetcher behind them

use std::net::IpAddr;
use std::rc::Rc;
use std::str::FromStr;
use std::time::Duration;
use tokio::runtime::Runtime;

/// Error type for public IP lookups
#[derive(Debug, thiserror::Error)]
pub enum PublicIpError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    /// The service answered with a non-success status
    #[error("HTTP status {0}")]
    Status(u16),

    /// The service answered with an empty body
    #[error("Empty response body")]
    EmptyBody,

    /// The body is not an IP address
    #[error("Not an IP address: {0}")]
    NotAnAddress(String),

    /// Request timeout
    #[error("Request timed out")]
    Timeout,
}

/// Well-known plain-text "what is my IP" services
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PublicIpProvider {
    /// checkip.amazonaws.com
    #[default]
    AwsCheckIp,
    /// api.ipify.org
    Ipify,
    /// icanhazip.com
    ICanHazIp,
}

impl PublicIpProvider {
    const ALL: [PublicIpProvider; 3] = [
        PublicIpProvider::AwsCheckIp,
        PublicIpProvider::Ipify,
        PublicIpProvider::ICanHazIp,
    ];

    /// Lookup URL of the service
    pub fn url(self) -> &'static str {
        match self {
            PublicIpProvider::AwsCheckIp => "https://checkip.amazonaws.com",
            PublicIpProvider::Ipify => "https://api.ipify.org",
            PublicIpProvider::ICanHazIp => "https://icanhazip.com",
        }
    }

    /// Short name accepted by [`FromStr`]
    pub fn name(self) -> &'static str {
        match self {
            PublicIpProvider::AwsCheckIp => "aws",
            PublicIpProvider::Ipify => "ipify",
            PublicIpProvider::ICanHazIp => "icanhazip",
        }
    }

    /// Turn a provider name or a URL into a lookup URL
    pub fn lookup_url(name_or_url: &str) -> String {
        name_or_url
            .parse::<PublicIpProvider>()
            .map_or_else(|()| name_or_url.to_string(), |p| p.url().to_string())
    }
}

impl FromStr for PublicIpProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(s))
            .ok_or(())
    }
}

/// Something that can fetch the caller's public address from a URL
pub trait IpFetcher {
    /// Fetch `url` and return its trimmed body, which must be an IP address
    fn fetch(&mut self, url: &str) -> Result<String, PublicIpError>;
}

/// Check that a response body names an address, returning it trimmed
pub fn parse_body(body: &str) -> Result<String, PublicIpError> {
    let body = body.trim();
    if body.is_empty() {
        return Err(PublicIpError::EmptyBody);
    }
    body.parse::<IpAddr>()
        .map_err(|_| PublicIpError::NotAnAddress(body.chars().take(64).collect()))?;
    Ok(body.to_string())
}

/// Fetches over HTTP(S) with reqwest, driven on a current-thread runtime
pub struct HttpFetcher {
    runtime: Rc<Runtime>,
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Create a fetcher with the given request timeout
    pub fn new(runtime: Rc<Runtime>, timeout: Duration) -> Result<Self, PublicIpError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PublicIpError::HttpError(e.to_string()))?;
        Ok(Self { runtime, client })
    }
}

impl IpFetcher for HttpFetcher {
    fn fetch(&mut self, url: &str) -> Result<String, PublicIpError> {
        let client = &self.client;
        let body = self.runtime.block_on(async move {
            let response = client.get(url).send().await.map_err(|e| {
                if e.is_timeout() {
                    PublicIpError::Timeout
                } else {
                    PublicIpError::HttpError(e.to_string())
                }
            })?;

            let status = response.status();
            if !status.is_success() {
                return Err(PublicIpError::Status(status.as_u16()));
            }

            response
                .text()
                .await
                .map_err(|e| PublicIpError::HttpError(e.to_string()))
        })?;
        parse_body(&body)
    }
}
