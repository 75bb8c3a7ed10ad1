//! HTTP transport
//!
//! The store never talks HTTP directly; it hands `ApiRequest`s to a
//! `Transport`. `HttpTransport` is the reqwest-backed implementation used
//! against a real server.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, COOKIE};
use serde_json::Value;
use tracing::debug;

use crate::error::{SyncError, SyncResult};

/// Header carrying the CSRF token on mutating requests
pub const CSRF_HEADER: &str = "X-CSRFToken";

/// HTTP verb of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    /// Whether requests with this verb change server state
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Method::Get)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        };
        f.write_str(name)
    }
}

/// A request against the REST service
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path from the server root, including any query string
    pub path: String,
    /// JSON body, sent for mutating requests
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            body: Some(body),
        }
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Put,
            path: path.into(),
            body: Some(body),
        }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            method: Method::Delete,
            path: path.into(),
            body: Some(Value::Object(Default::default())),
        }
    }
}

/// Sends requests and returns the decoded JSON body
///
/// An empty success body is returned as `Value::Null`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> SyncResult<Value>;
}

/// Credentials attached to every request
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    /// Value for the CSRF header and cookie
    pub csrf_token: Option<String>,
    /// Session cookie value
    pub session_id: Option<String>,
}

impl Credentials {
    fn cookie_header(&self) -> Option<String> {
        let mut cookies = Vec::new();
        if let Some(ref token) = self.csrf_token {
            cookies.push(format!("csrftoken={}", token));
        }
        if let Some(ref session) = self.session_id {
            cookies.push(format!("sessionid={}", session));
        }
        (!cookies.is_empty()).then(|| cookies.join("; "))
    }
}

/// reqwest-backed transport
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    credentials: Credentials,
}

impl HttpTransport {
    /// Create a transport for a server root such as `https://host`
    pub fn new(
        base_url: impl Into<String>,
        credentials: Credentials,
        timeout: Duration,
    ) -> SyncResult<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(cookie) = credentials.cookie_header() {
            let value = HeaderValue::from_str(&cookie)
                .map_err(|e| SyncError::transport(base_url.clone(), e))?;
            headers.insert(COOKIE, value);
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .user_agent(concat!("partsync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SyncError::transport(base_url.clone(), e))?;

        Ok(Self {
            client,
            base_url,
            credentials,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn builder(&self, method: Method, url: &str) -> reqwest::RequestBuilder {
        match method {
            Method::Get => self.client.get(url),
            Method::Post => self.client.post(url),
            Method::Put => self.client.put(url),
            Method::Delete => self.client.delete(url),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> SyncResult<Value> {
        let url = self.url(&request.path);
        debug!("{} {}", request.method, url);

        let mut builder = self.builder(request.method, &url);
        if request.method.is_mutating() {
            if let Some(ref token) = self.credentials.csrf_token {
                builder = builder.header(CSRF_HEADER, token);
            }
            let body = request
                .body
                .unwrap_or_else(|| Value::Object(Default::default()));
            builder = builder
                .header(CONTENT_TYPE, "application/json")
                .body(body.to_string());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| SyncError::transport(url.clone(), e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| SyncError::transport(url.clone(), e))?;

        if !status.is_success() {
            return Err(SyncError::Status {
                url,
                status: status.as_u16(),
                body: text,
            });
        }

        decode_body(&url, &text)
    }
}

/// Decode a success body, treating an empty body as `null`
pub(crate) fn decode_body(url: &str, text: &str) -> SyncResult<Value> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(text).map_err(|e| SyncError::malformed(url, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use serde_json::json;

    #[test]
    fn test_cookie_header() {
        let creds = Credentials {
            csrf_token: Some("tok".to_string()),
            session_id: Some("sess".to_string()),
        };
        assert_eq!(
            creds.cookie_header().as_deref(),
            Some("csrftoken=tok; sessionid=sess")
        );
        assert!(Credentials::default().cookie_header().is_none());
    }

    #[test]
    fn test_delete_carries_empty_body() {
        let req = ApiRequest::delete("/api/documents/1/parts/2/lines/3/");
        assert_eq!(req.method, Method::Delete);
        assert_eq!(req.body, Some(json!({})));
        assert!(req.method.is_mutating());
        assert!(!ApiRequest::get("/").method.is_mutating());
    }

    #[test]
    fn test_decode_body() {
        assert_eq!(decode_body("/x", "").unwrap(), Value::Null);
        assert_eq!(decode_body("/x", "{\"pk\": 1}").unwrap(), json!({"pk": 1}));

        let err = decode_body("/x", "<html>oops</html>").unwrap_err();
        assert_eq!(err.kind(), FailureKind::Malformed);
    }

    #[test]
    fn test_base_url_is_trimmed() {
        let transport = HttpTransport::new(
            "http://localhost:8000/",
            Credentials::default(),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(
            transport.url("/api/documents/1/parts/2/"),
            "http://localhost:8000/api/documents/1/parts/2/"
        );
    }

    #[test]
    fn test_method_display() {
        assert_eq!(Method::Put.to_string(), "PUT");
        assert_eq!(Method::Delete.to_string(), "DELETE");
    }
}
