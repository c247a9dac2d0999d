//! Mock implementations for testing.
//!
//! [`MockHttpTransport`] replays queued responses and records every request so
//! tests can assert on call order. [`RecordingLogger`] captures log lines.
//!
//! These are test doubles: their helpers panic on misuse or failed assertions.

use crate::auth::AccessToken;
use crate::errors::TransportError;
use crate::observability::Logger;
use crate::transport::{HttpMethod, HttpRequest, HttpResponse, HttpTransport};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{Duration, Utc};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::StatusCode;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// RSA key used to sign test assertions. Not valid anywhere outside tests.
pub const TEST_PRIVATE_KEY: &str = include_str!("../../tests/fixtures/test_private_key.pem");

/// Builds the JSON text of a service-account key file.
pub fn service_account_json(private_key: &str, token_uri: &str) -> String {
    serde_json::json!({
        "type": "service_account",
        "project_id": "orders-test",
        "private_key_id": "test-key-1",
        "private_key": private_key,
        "client_email": "uploader@orders-test.iam.gserviceaccount.com",
        "client_id": "1234567890",
        "token_uri": token_uri,
    })
    .to_string()
}

/// A bearer token valid for one hour.
pub fn bearer_token(token: &str) -> AccessToken {
    AccessToken::new(
        token,
        "Bearer",
        Utc::now() + Duration::hours(1),
        vec![crate::auth::scopes::DRIVE.to_string()],
    )
}

/// Mock HTTP transport for testing.
pub struct MockHttpTransport {
    responses: Arc<Mutex<VecDeque<Result<HttpResponse, TransportError>>>>,
    requests: Arc<Mutex<Vec<HttpRequest>>>,
}

impl MockHttpTransport {
    /// Create a new mock HTTP transport.
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Enqueue a response to be returned by the next request.
    pub fn enqueue_response(&self, response: Result<HttpResponse, TransportError>) {
        self.responses.lock().unwrap().push_back(response);
    }

    /// Enqueue a JSON response with the given status code and body.
    pub fn enqueue_json_response(&self, status: u16, body: &str) {
        self.enqueue_response_with_headers(status, &[("content-type", "application/json")], body);
    }

    /// Enqueue a response with explicit headers.
    pub fn enqueue_response_with_headers(&self, status: u16, headers: &[(&str, &str)], body: &str) {
        let mut map = HeaderMap::new();
        for (name, value) in headers {
            map.insert(
                HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }

        self.enqueue_response(Ok(HttpResponse::new(
            StatusCode::from_u16(status).unwrap(),
            map,
            Bytes::from(body.to_string()),
        )));
    }

    /// Enqueue a transport-level error.
    pub fn enqueue_error(&self, error: TransportError) {
        self.enqueue_response(Err(error));
    }

    /// Get all requests that were made.
    pub fn get_requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Verify that exactly `expected` requests were made.
    pub fn verify_request_count(&self, expected: usize) {
        let actual = self.requests.lock().unwrap().len();
        assert_eq!(actual, expected, "Expected {} requests, got {}", expected, actual);
    }

    /// Verify that a request was made with the expected method and URL.
    pub fn verify_request(&self, index: usize, method: HttpMethod, url_contains: &str) {
        let requests = self.requests.lock().unwrap();
        assert!(index < requests.len(), "No request at index {}", index);

        let request = &requests[index];
        assert_eq!(
            request.method, method,
            "Expected method {:?}, got {:?}",
            method, request.method
        );
        assert!(
            request.url.as_str().contains(url_contains),
            "Expected URL to contain '{}', got '{}'",
            url_contains,
            request.url
        );
    }

    /// Verify that a request carries a header with the given value.
    pub fn verify_header(&self, index: usize, header_name: &str, header_value: &str) {
        let requests = self.requests.lock().unwrap();
        assert!(index < requests.len(), "No request at index {}", index);

        let actual = requests[index]
            .headers
            .get(header_name)
            .and_then(|v| v.to_str().ok());
        assert_eq!(
            actual,
            Some(header_value),
            "Expected header '{}' to be '{}', got {:?}",
            header_name,
            header_value,
            actual
        );
    }

    /// Returns the body of a recorded request as lossy UTF-8.
    pub fn request_body_text(&self, index: usize) -> String {
        let requests = self.requests.lock().unwrap();
        requests[index]
            .body
            .as_ref()
            .map(|body| String::from_utf8_lossy(&body.to_bytes()).into_owned())
            .unwrap_or_default()
    }
}

impl Default for MockHttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpTransport for MockHttpTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().unwrap().push(request);

        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(TransportError::Http(
                    "No response configured in MockHttpTransport".to_string(),
                ))
            })
    }
}

/// A captured log line.
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// `DEBUG`, `INFO`, `WARN` or `ERROR`.
    pub level: &'static str,
    /// Log message.
    pub message: String,
    /// Structured context.
    pub fields: Value,
}

/// Logger that keeps every entry in memory.
#[derive(Default)]
pub struct RecordingLogger {
    entries: Mutex<Vec<LogEntry>>,
}

impl RecordingLogger {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// All captured entries, oldest first.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().unwrap().clone()
    }

    /// Number of entries at `level`.
    pub fn count(&self, level: &str) -> usize {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|entry| entry.level == level)
            .count()
    }

    fn push(&self, level: &'static str, message: &str, fields: Value) {
        self.entries.lock().unwrap().push(LogEntry {
            level,
            message: message.to_string(),
            fields,
        });
    }
}

impl Logger for RecordingLogger {
    fn debug(&self, message: &str, fields: Value) {
        self.push("DEBUG", message, fields);
    }

    fn info(&self, message: &str, fields: Value) {
        self.push("INFO", message, fields);
    }

    fn warn(&self, message: &str, fields: Value) {
        self.push("WARN", message, fields);
    }

    fn error(&self, message: &str, fields: Value) {
        self.push("ERROR", message, fields);
    }
}
