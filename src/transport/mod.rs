//! HTTP transport layer for the Drive API and the OAuth2 token endpoint.

use crate::config::UploaderConfig;
use crate::errors::TransportError;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::{Client, Method, StatusCode};
use url::Url;

/// HTTP transport abstraction for testability.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send an HTTP request and receive a response.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// HTTP request representation.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// HTTP method.
    pub method: HttpMethod,
    /// Request URL.
    pub url: Url,
    /// Request headers.
    pub headers: HeaderMap,
    /// Request body.
    pub body: Option<RequestBody>,
    /// Request timeout.
    pub timeout: Option<std::time::Duration>,
}

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// POST method.
    Post,
    /// PUT method.
    Put,
}

impl From<HttpMethod> for Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
        }
    }
}

/// Request body variants.
#[derive(Clone)]
pub enum RequestBody {
    /// Fixed-size bytes. The content type is taken from the request headers.
    Bytes(Bytes),
    /// Multipart body carrying JSON metadata and file content.
    Multipart(MultipartBody),
}

impl RequestBody {
    /// Returns the serialized body.
    pub fn to_bytes(&self) -> Bytes {
        match self {
            RequestBody::Bytes(bytes) => bytes.clone(),
            RequestBody::Multipart(multipart) => multipart.to_bytes(),
        }
    }
}

impl std::fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestBody::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
            RequestBody::Multipart(multipart) => {
                write!(f, "Multipart({} content bytes)", multipart.content.len())
            }
        }
    }
}

/// `multipart/related` body used by Drive's multipart upload.
#[derive(Clone)]
pub struct MultipartBody {
    /// Metadata part (JSON).
    pub metadata: Bytes,
    /// Content part.
    pub content: Bytes,
    /// Content type of the content part.
    pub content_type: String,
    /// Boundary string.
    pub boundary: String,
}

impl MultipartBody {
    /// Creates a new multipart body.
    pub fn new(metadata: Bytes, content: Bytes, content_type: impl Into<String>) -> Self {
        Self {
            metadata,
            content,
            content_type: content_type.into(),
            boundary: Self::generate_boundary(),
        }
    }

    fn generate_boundary() -> String {
        use std::time::{SystemTime, UNIX_EPOCH};
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        format!("==============={}", timestamp)
    }

    /// Converts to bytes.
    pub fn to_bytes(&self) -> Bytes {
        let mut result = Vec::with_capacity(self.metadata.len() + self.content.len() + 256);

        result.extend_from_slice(format!("--{}\r\n", self.boundary).as_bytes());
        result.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
        result.extend_from_slice(&self.metadata);
        result.extend_from_slice(b"\r\n");

        result.extend_from_slice(format!("--{}\r\n", self.boundary).as_bytes());
        result.extend_from_slice(format!("Content-Type: {}\r\n\r\n", self.content_type).as_bytes());
        result.extend_from_slice(&self.content);
        result.extend_from_slice(format!("\r\n--{}--", self.boundary).as_bytes());

        Bytes::from(result)
    }

    /// Gets the content type header value.
    pub fn content_type_header(&self) -> String {
        format!("multipart/related; boundary={}", self.boundary)
    }
}

/// HTTP response representation.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Response status code.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Response body.
    pub body: Bytes,
}

impl HttpResponse {
    /// Creates a new HTTP response.
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Returns a header value as a string, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Reqwest-based HTTP transport implementation.
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Creates a new reqwest transport.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Creates a transport whose client honours the configured timeouts and
    /// user agent.
    pub fn from_config(config: &UploaderConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| TransportError::Http(format!("Failed to create client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let method: Method = request.method.into();
        let mut req = self.client.request(method, request.url.clone());

        for (key, value) in request.headers.iter() {
            req = req.header(key, value);
        }

        if let Some(timeout) = request.timeout {
            req = req.timeout(timeout);
        }

        if let Some(body) = request.body {
            match body {
                RequestBody::Bytes(bytes) => {
                    req = req.body(bytes);
                }
                RequestBody::Multipart(multipart) => {
                    if !request.headers.contains_key(CONTENT_TYPE) {
                        req = req.header(CONTENT_TYPE, multipart.content_type_header());
                    }
                    req = req.body(multipart.to_bytes());
                }
            }
        }

        let response = req.send().await?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        Ok(HttpResponse::new(status, headers, body))
    }
}
