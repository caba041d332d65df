//! Request/response model and the transport seam.
//!
//! The interceptor treats the pipe underneath it as "send a request, get a
//! response or a failure with a status code". Anything satisfying
//! [`Transport`] works; [`HttpTransport`] adapts a shared `reqwest::Client`
//! for production use, tests script a fake.

use async_trait::async_trait;
use serde_json::Value;

/// HTTP method of an outbound request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

/// An outbound request descriptor.
///
/// `skip_auth` marks a public endpoint: the interceptor will neither attach
/// a bearer token nor react to a 401 from it. Callers set it per request;
/// there is no URL allowlist.
#[derive(Clone, Debug)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
    pub skip_auth: bool,
}

impl Request {
    #[must_use]
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self { method, url: url.into(), headers: Vec::new(), body: None, skip_auth: false }
    }

    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Mark this request as a public endpoint call.
    #[must_use]
    pub fn public(mut self) -> Self {
        self.skip_auth = true;
        self
    }

    /// Set (or replace) the `Authorization` header with a bearer credential.
    pub fn set_bearer(&mut self, token: &str) {
        self.headers.retain(|(name, _)| !name.eq_ignore_ascii_case("authorization"));
        self.headers.push(("Authorization".to_owned(), format!("Bearer {token}")));
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn has_authorization(&self) -> bool {
        self.header("authorization").is_some()
    }
}

/// A successful response: status plus a decoded JSON body (`Null` when the
/// body is empty or not JSON).
#[derive(Clone, Debug)]
pub struct Response {
    pub status: u16,
    pub body: Value,
}

/// A failed exchange. `status == 0` means the failure happened below HTTP
/// (connection refused, DNS, aborted) and no response was received.
#[derive(Clone, Debug)]
pub struct TransportFailure {
    pub status: u16,
    pub message: String,
}

impl TransportFailure {
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self { status: 0, message: message.into() }
    }

    #[must_use]
    pub fn is_network(&self) -> bool {
        self.status == 0
    }
}

impl std::fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_network() {
            write!(f, "network failure: {}", self.message)
        } else {
            write!(f, "HTTP {}: {}", self.status, self.message)
        }
    }
}

impl std::error::Error for TransportFailure {}

/// The request/response pipe the interceptor wraps.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: Request) -> Result<Response, TransportFailure>;
}

// =============================================================================
// REQWEST ADAPTER
// =============================================================================

/// Production transport backed by a shared `reqwest::Client`.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: Request) -> Result<Response, TransportFailure> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportFailure::network(e.to_string()))?;

        let status = response.status().as_u16();
        if response.status().is_success() {
            let body = response.json::<Value>().await.unwrap_or(Value::Null);
            Ok(Response { status, body })
        } else {
            let message = response.text().await.unwrap_or_default();
            Err(TransportFailure { status, message })
        }
    }
}

#[cfg(test)]
#[path = "transport_test.rs"]
mod tests;
