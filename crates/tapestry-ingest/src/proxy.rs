//! Round-robin proxy rotation
//!
//! A `ProxyRotator` holds the configured proxy endpoints and hands out
//! the next one on each call, wrapping around. The cursor is a single
//! atomic index, so one rotator instance can be shared by concurrently
//! running pipelines. Dead proxies are the fetcher's problem; the
//! rotator does no health checking.

use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};

use thiserror::Error;

/// Environment variable read when no explicit proxy list is given.
pub const PROXY_LIST_ENV: &str = "PROXY_LIST";

#[derive(Error, Debug, PartialEq, Eq)]
#[error("invalid proxy endpoint '{endpoint}': expected host:port or host:port:username:password")]
pub struct InvalidProxy {
    pub endpoint: String,
}

/// One proxy endpoint, in the `host:port[:username:password]` format the
/// deployment configuration uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyEndpoint {
    pub host: String,
    pub port: u16,
    pub auth: Option<(String, String)>,
}

impl ProxyEndpoint {
    /// URL form consumed by the HTTP client, without credentials.
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl FromStr for ProxyEndpoint {
    type Err = InvalidProxy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidProxy {
            endpoint: s.to_string(),
        };
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 2 && parts.len() != 4 {
            return Err(invalid());
        }
        let host = parts[0].trim();
        if host.is_empty() {
            return Err(invalid());
        }
        let port: u16 = parts[1].trim().parse().map_err(|_| invalid())?;
        let auth = if parts.len() == 4 {
            Some((parts[2].trim().to_string(), parts[3].trim().to_string()))
        } else {
            None
        };
        Ok(Self {
            host: host.to_string(),
            port,
            auth,
        })
    }
}

impl std::fmt::Display for ProxyEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Thread-safe round-robin rotation over a fixed proxy list.
#[derive(Debug, Default)]
pub struct ProxyRotator {
    proxies: Vec<ProxyEndpoint>,
    cursor: AtomicUsize,
}

impl ProxyRotator {
    /// Build from a comma-separated list. Blank entries are skipped;
    /// malformed entries are an error.
    pub fn from_list(list: &str) -> Result<Self, InvalidProxy> {
        let proxies = list
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(ProxyEndpoint::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            proxies,
            cursor: AtomicUsize::new(0),
        })
    }

    /// Build from the explicit list when given, otherwise from the
    /// `PROXY_LIST` environment variable, otherwise empty.
    pub fn from_config(list: Option<&str>) -> Result<Self, InvalidProxy> {
        match list {
            Some(l) => Self::from_list(l),
            None => match std::env::var(PROXY_LIST_ENV) {
                Ok(l) => Self::from_list(&l),
                Err(_) => Ok(Self::default()),
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }

    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    /// Next proxy in rotation, or `None` when no proxies are configured.
    pub fn next(&self) -> Option<&ProxyEndpoint> {
        if self.proxies.is_empty() {
            return None;
        }
        let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % self.proxies.len();
        Some(&self.proxies[idx])
    }
}
