//! HTTP transport seam.
//!
//! The engine only ever sees the narrow [`HttpTransport`] trait: a request
//! descriptor in, a status code and optional JSON body out. The production
//! implementation wraps a shared `reqwest::Client`; tests substitute scripted
//! transports.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::TransportError;

/// HTTP method subset used by load flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One request as the engine describes it: the transport owns the base URL,
/// connection pool and default headers.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

impl RequestSpec {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// What came back: status code plus the body parsed as JSON when possible.
/// Business semantics stay with the caller-supplied verifications.
#[derive(Debug, Clone)]
pub struct ResponseInfo {
    pub status: u16,
    pub body: Option<Value>,
}

impl ResponseInfo {
    pub fn new(status: u16) -> Self {
        Self { status, body: None }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn is_2xx(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Top-level field of the JSON body, if the body parsed as an object.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.body.as_ref().and_then(|body| body.get(name))
    }
}

/// The only capability the engine needs from the outside world.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(&self, request: &RequestSpec) -> Result<ResponseInfo, TransportError>;
}

/// Production transport backed by `reqwest`.
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl ReqwestTransport {
    pub fn new(
        base_url: impl Into<String>,
        headers: &HashMap<String, String>,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let mut header_map = reqwest::header::HeaderMap::new();
        for (name, value) in headers {
            let name = reqwest::header::HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| TransportError::Request(format!("invalid header '{name}': {e}")))?;
            let value = reqwest::header::HeaderValue::from_str(value)
                .map_err(|e| TransportError::Request(format!("invalid header value: {e}")))?;
            header_map.insert(name, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(header_map)
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let base_url = base_url.into();
        let base_url = base_url.trim_end_matches('/').to_string();

        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: &RequestSpec) -> Result<ResponseInfo, TransportError> {
        let url = format!("{}{}", self.base_url, request.path);

        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.client.request(method, &url);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout(self.timeout)
            } else if e.is_builder() {
                TransportError::InvalidUrl(url.clone())
            } else {
                TransportError::Request(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        // Bodies that are not JSON (or empty) are fine; checks that need a
        // body will fail their predicate instead of erroring here.
        let body = response.json::<Value>().await.ok();

        Ok(ResponseInfo { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_response_field_lookup() {
        let response = ResponseInfo::new(200).with_body(json!({ "id": 42 }));

        assert_eq!(response.field("id"), Some(&json!(42)));
        assert_eq!(response.field("missing"), None);
        assert!(response.is_2xx());
    }

    #[test]
    fn test_response_without_body_has_no_fields() {
        let response = ResponseInfo::new(204);

        assert_eq!(response.field("id"), None);
        assert!(response.is_2xx());
        assert!(!ResponseInfo::new(500).is_2xx());
    }

    #[test]
    fn test_request_spec_builder() {
        let request = RequestSpec::new(Method::Post, "/api/test/users")
            .with_body(json!({ "name": "user-1" }));

        assert_eq!(request.method.as_str(), "POST");
        assert_eq!(request.path, "/api/test/users");
        assert!(request.body.is_some());
    }

    #[test]
    fn test_reqwest_transport_strips_trailing_slash() {
        let transport = ReqwestTransport::new(
            "http://localhost:8080/",
            &HashMap::new(),
            Duration::from_secs(30),
        )
        .unwrap();

        assert_eq!(transport.base_url, "http://localhost:8080");
    }
}
