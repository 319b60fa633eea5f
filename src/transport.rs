//! HTTP seam between the clients and the network.
//!
//! Clients build an [`HttpRequest`], hand it to a [`Transport`] and classify
//! the [`HttpResponse`] themselves. Only connection-level failures come back
//! as [`TransportError`]; every HTTP status, success or not, is a response.

use std::fmt;
use std::time::Duration;

use futures::future::BoxFuture;
use serde::Serialize;

/// HTTP method used by the clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET
    Get,
    /// POST
    Post,
}

/// A request as the clients describe it.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    /// HTTP method.
    pub method: Method,
    /// URL without query string.
    pub url: String,
    /// Query parameters, in order; values are unencoded.
    pub query: Vec<(String, String)>,
    /// Extra headers.
    pub headers: Vec<(String, String)>,
    /// JSON body, if any.
    pub body: Option<serde_json::Value>,
}

impl HttpRequest {
    /// GET request for `url`.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// POST request for `url`.
    pub fn post(url: impl Into<String>) -> Self {
        Self {
            method: Method::Post,
            ..Self::get(url)
        }
    }

    /// Append a query parameter.
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Append a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Attach a JSON body.
    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self, serde_json::Error> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    /// Look up a query parameter.
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Look up a header, case-insensitively.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// URL and query with secret-bearing parameters masked, for logs.
    ///
    /// Masks the `key` and `apiKey` query values and a `/bot<token>/` path
    /// segment.
    pub fn redacted(&self) -> String {
        let mut out = redact_path(&self.url);
        for (i, (key, value)) in self.query.iter().enumerate() {
            out.push(if i == 0 { '?' } else { '&' });
            out.push_str(key);
            out.push('=');
            if key.eq_ignore_ascii_case("key") || key.eq_ignore_ascii_case("apikey") {
                out.push_str("***");
            } else {
                out.push_str(value);
            }
        }
        out
    }
}

fn redact_path(url: &str) -> String {
    let (scheme, rest) = match url.split_once("://") {
        Some((scheme, rest)) => (Some(scheme), rest),
        None => (None, url),
    };
    let path: Vec<&str> = rest
        .split('/')
        .enumerate()
        .map(|(i, segment)| {
            if i > 0 && segment.len() > 3 && segment.starts_with("bot") {
                "bot***"
            } else {
                segment
            }
        })
        .collect();
    match scheme {
        Some(scheme) => format!("{scheme}://{}", path.join("/")),
        None => path.join("/"),
    }
}

/// A response as the clients see it.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: Vec<(String, String)>,
    /// Body text.
    pub body: String,
}

impl HttpResponse {
    /// Response with a status and a body.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// Response with a JSON body.
    pub fn json(status: u16, body: &serde_json::Value) -> Self {
        Self::new(status, body.to_string())
    }

    /// Append a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// True for 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Look up a header, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Parse the body as JSON.
    pub fn json_body<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }

    /// Delay declared by a `Retry-After` header given in whole seconds.
    pub fn retry_after(&self) -> Option<Duration> {
        self.header("retry-after")?
            .trim()
            .parse::<u64>()
            .ok()
            .map(Duration::from_secs)
    }
}

/// The request never produced an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    message: String,
}

impl TransportError {
    /// Create a transport error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Error description.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for TransportError {}

/// Sends requests. Implementations must be shareable across sessions.
pub trait Transport: Send + Sync {
    /// Send one request and wait for its response.
    fn send(&self, request: HttpRequest) -> BoxFuture<'_, Result<HttpResponse, TransportError>>;
}

#[cfg(feature = "http")]
pub use self::reqwest_transport::ReqwestTransport;

#[cfg(feature = "http")]
mod reqwest_transport {
    use std::time::Duration;

    use futures::future::BoxFuture;
    use futures::FutureExt;
    use reqwest::Client;
    use tracing::debug;

    use super::{HttpRequest, HttpResponse, Method, Transport, TransportError};

    /// [`Transport`] backed by a `reqwest::Client`.
    #[derive(Debug, Clone)]
    pub struct ReqwestTransport {
        client: Client,
    }

    impl ReqwestTransport {
        /// Build a transport with a per-request timeout.
        pub fn new(timeout_seconds: u64) -> Result<Self, TransportError> {
            let client = Client::builder()
                .timeout(Duration::from_secs(timeout_seconds))
                .build()
                .map_err(|e| TransportError::new(e.to_string()))?;
            Ok(Self { client })
        }

        /// Wrap an existing client.
        pub fn from_client(client: Client) -> Self {
            Self { client }
        }

        async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            debug!(url = %request.redacted(), "sending request");

            let mut builder = match request.method {
                Method::Get => self.client.get(&request.url),
                Method::Post => self.client.post(&request.url),
            };
            if !request.query.is_empty() {
                builder = builder.query(&request.query);
            }
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            if let Some(body) = &request.body {
                builder = builder.json(body);
            }

            let response = builder
                .send()
                .await
                .map_err(scrubbed)?;

            let status = response.status().as_u16();
            let headers = response
                .headers()
                .iter()
                .filter_map(|(name, value)| {
                    value
                        .to_str()
                        .ok()
                        .map(|v| (name.as_str().to_string(), v.to_string()))
                })
                .collect();
            let body = response
                .text()
                .await
                .map_err(scrubbed)?;

            debug!(status, "received response");
            Ok(HttpResponse {
                status,
                headers,
                body,
            })
        }
    }

    // reqwest puts the full request URL, credentials included, in its message.
    fn scrubbed(error: reqwest::Error) -> TransportError {
        TransportError::new(error.without_url().to_string())
    }

    impl Transport for ReqwestTransport {
        fn send(
            &self,
            request: HttpRequest,
        ) -> BoxFuture<'_, Result<HttpResponse, TransportError>> {
            self.execute(request).boxed()
        }
    }
}
