//! HTTP transport
//!
//! A thin wrapper over reqwest: perform a page request with the
//! configured timeout, optionally through the next rotated proxy, and
//! return the body or a typed failure. Clients are cached per proxy
//! endpoint because reqwest binds a proxy at client-build time.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::debug;

use crate::page::{HttpMethod, PageRequest};
use crate::proxy::{ProxyEndpoint, ProxyRotator};

const USER_AGENT: &str = concat!("tapestry-ingest/", env!("CARGO_PKG_VERSION"));

/// Transport-level failure. Any of these ends the current pipeline run
/// early; none of them is retried here.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: StatusCode },

    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// HTTP fetcher with timeout and optional proxy rotation.
pub struct Fetcher {
    timeout: Duration,
    rotator: Option<Arc<ProxyRotator>>,
    direct: Client,
    proxied: Mutex<HashMap<String, Client>>,
}

impl Fetcher {
    pub fn new(
        timeout: Duration,
        rotator: Option<Arc<ProxyRotator>>,
    ) -> Result<Self, TransportError> {
        let direct = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(TransportError::Client)?;
        Ok(Self {
            timeout,
            rotator,
            direct,
            proxied: Mutex::new(HashMap::new()),
        })
    }

    /// Perform the request and return the response body.
    ///
    /// Non-2xx statuses are failures; redirects are followed by the
    /// client before we ever see them.
    pub async fn fetch(&self, request: &PageRequest) -> Result<String, TransportError> {
        let client = self.client_for_next_proxy()?;

        let builder = match request.method {
            HttpMethod::Get => client.get(&request.url),
            HttpMethod::Post => client.post(&request.url),
        };
        let builder = match &request.body {
            Some(body) => builder.json(body),
            None => builder,
        };

        let response = builder
            .send()
            .await
            .map_err(|e| Self::classify(&request.url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                url: request.url.clone(),
                status,
            });
        }

        response
            .text()
            .await
            .map_err(|e| Self::classify(&request.url, e))
    }

    fn classify(url: &str, error: reqwest::Error) -> TransportError {
        if error.is_timeout() {
            TransportError::Timeout {
                url: url.to_string(),
            }
        } else {
            TransportError::Request {
                url: url.to_string(),
                source: error,
            }
        }
    }

    fn client_for_next_proxy(&self) -> Result<Client, TransportError> {
        let endpoint = match self.rotator.as_ref().and_then(|r| r.next()) {
            Some(e) => e.clone(),
            None => return Ok(self.direct.clone()),
        };
        debug!(proxy = %endpoint, "routing request through proxy");

        let key = endpoint.url();
        {
            #[allow(clippy::unwrap_used)] // mutex poisoning only on a prior panic
            let cache = self.proxied.lock().unwrap();
            if let Some(client) = cache.get(&key) {
                return Ok(client.clone());
            }
        }

        let client = self.build_proxied(&endpoint)?;
        #[allow(clippy::unwrap_used)]
        self.proxied.lock().unwrap().insert(key, client.clone());
        Ok(client)
    }

    fn build_proxied(&self, endpoint: &ProxyEndpoint) -> Result<Client, TransportError> {
        let mut proxy = reqwest::Proxy::all(endpoint.url()).map_err(TransportError::Client)?;
        if let Some((user, pass)) = &endpoint.auth {
            proxy = proxy.basic_auth(user, pass);
        }
        Client::builder()
            .timeout(self.timeout)
            .user_agent(USER_AGENT)
            .proxy(proxy)
            .build()
            .map_err(TransportError::Client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::PageRequest;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher() -> Fetcher {
        Fetcher::new(Duration::from_secs(5), None).unwrap()
    }

    #[tokio::test]
    async fn test_get_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
            .mount(&server)
            .await;

        let body = fetcher()
            .fetch(&PageRequest::get(format!("{}/page", server.uri())))
            .await
            .unwrap();
        assert_eq!(body, "hello");
    }

    #[tokio::test]
    async fn test_post_sends_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .and(body_json(serde_json::json!({"q": "maps"})))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let request = PageRequest::post(
            format!("{}/search", server.uri()),
            serde_json::json!({"q": "maps"}),
        );
        assert_eq!(fetcher().fetch(&request).await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn test_non_success_status_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = fetcher()
            .fetch(&PageRequest::get(format!("{}/gone", server.uri())))
            .await
            .unwrap_err();
        match err {
            TransportError::Status { status, .. } => {
                assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE)
            },
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_timeout_classified() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(
                ResponseTemplate::new(200).set_delay(Duration::from_millis(300)),
            )
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(Duration::from_millis(50), None).unwrap();
        let err = fetcher
            .fetch(&PageRequest::get(format!("{}/slow", server.uri())))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Timeout { .. }));
    }
}
