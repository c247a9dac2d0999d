//! Request executor with auth and error mapping.

use crate::auth::AccessToken;
use crate::config::UploaderConfig;
use crate::errors::{
    AuthenticationError, AuthorizationError, QuotaError, RemoteError, RemoteResult, RequestError,
    ResourceError, ResponseError, ServerError,
};
use crate::transport::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, RequestBody};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Request executor that attaches the session token, sends requests through
/// the transport and maps HTTP failures to [`RemoteError`]s.
pub struct RequestExecutor {
    config: Arc<UploaderConfig>,
    transport: Arc<dyn HttpTransport>,
    token: AccessToken,
}

impl RequestExecutor {
    /// Creates a new request executor.
    pub fn new(
        config: Arc<UploaderConfig>,
        transport: Arc<dyn HttpTransport>,
        token: AccessToken,
    ) -> Self {
        Self {
            config,
            transport,
            token,
        }
    }

    /// Builds a metadata URL from a path and query parameters.
    pub fn build_url(&self, path: &str, query: &[(&str, &str)]) -> RemoteResult<Url> {
        join(&self.config.base_url, path, query)
    }

    /// Builds a media upload URL from a path and query parameters.
    pub fn build_upload_url(&self, path: &str, query: &[(&str, &str)]) -> RemoteResult<Url> {
        join(&self.config.upload_url, path, query)
    }

    /// Sends a request and deserializes the JSON response.
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        method: HttpMethod,
        url: Url,
        body: Option<RequestBody>,
        headers: HeaderMap,
    ) -> RemoteResult<T> {
        let response = self.send(method, url, body, headers).await?;
        decode(&response)
    }

    /// Sends a request and returns the successful response.
    ///
    /// JSON is assumed for byte bodies unless `headers` already carries a
    /// content type.
    pub async fn send(
        &self,
        method: HttpMethod,
        url: Url,
        body: Option<RequestBody>,
        mut headers: HeaderMap,
    ) -> RemoteResult<HttpResponse> {
        if self.token.is_expired() {
            return Err(RemoteError::Authentication(AuthenticationError::ExpiredToken(
                format!("Session token expired at {}", self.token.expires_at),
            )));
        }

        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&self.token.authorization_header()).map_err(|e| {
                RemoteError::Request(RequestError::ValidationError(format!(
                    "Invalid auth header: {}",
                    e
                )))
            })?,
        );

        match &body {
            Some(RequestBody::Multipart(multipart)) => {
                let value = HeaderValue::from_str(&multipart.content_type_header()).map_err(|e| {
                    RemoteError::request(format!("Invalid multipart boundary: {}", e))
                })?;
                headers.insert(CONTENT_TYPE, value);
            }
            Some(RequestBody::Bytes(_)) if !headers.contains_key(CONTENT_TYPE) => {
                headers.insert(
                    CONTENT_TYPE,
                    HeaderValue::from_static("application/json; charset=UTF-8"),
                );
            }
            _ => {}
        }

        let request = HttpRequest {
            method,
            url,
            headers,
            body,
            timeout: Some(self.config.timeout),
        };

        let response = self.transport.send(request).await?;

        if !response.status.is_success() {
            return Err(map_error_response(&response));
        }

        Ok(response)
    }
}

/// Decodes a JSON response body.
pub(crate) fn decode<T: DeserializeOwned>(response: &HttpResponse) -> RemoteResult<T> {
    serde_json::from_slice(&response.body).map_err(|e| {
        RemoteError::Response(ResponseError::DeserializationError(format!(
            "Failed to deserialize response: {}",
            e
        )))
    })
}

fn join(base: &Url, path: &str, query: &[(&str, &str)]) -> RemoteResult<Url> {
    let mut url = base
        .join(path.trim_start_matches('/'))
        .map_err(|e| RemoteError::request(format!("Invalid URL: {}", e)))?;

    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query.iter());
    }

    Ok(url)
}

/// Maps an unsuccessful Drive API response to a domain error.
pub(crate) fn map_error_response(response: &HttpResponse) -> RemoteError {
    let status = response.status;

    #[derive(serde::Deserialize)]
    struct ErrorResponse {
        error: ErrorDetail,
    }

    #[derive(serde::Deserialize)]
    struct ErrorDetail {
        message: String,
        errors: Option<Vec<ErrorItem>>,
    }

    #[derive(serde::Deserialize)]
    struct ErrorItem {
        reason: Option<String>,
    }

    let error_detail: Option<ErrorResponse> = serde_json::from_slice(&response.body).ok();

    let (message, reason) = error_detail
        .map(|e| {
            let reason = e
                .error
                .errors
                .and_then(|errs| errs.into_iter().next())
                .and_then(|err| err.reason);
            (e.error.message, reason)
        })
        .unwrap_or_else(|| {
            (
                format!(
                    "HTTP {}: {}",
                    status.as_u16(),
                    String::from_utf8_lossy(&response.body)
                ),
                None,
            )
        });

    let retry_after = response
        .header("retry-after")
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs);

    match status {
        StatusCode::BAD_REQUEST => match reason.as_deref() {
            Some("invalidParameter") => {
                RemoteError::Request(RequestError::InvalidParameter(message))
            }
            _ => RemoteError::Request(RequestError::BadRequest(message)),
        },
        StatusCode::UNAUTHORIZED => {
            RemoteError::Authentication(AuthenticationError::InvalidToken(message))
        }
        StatusCode::FORBIDDEN => match reason.as_deref() {
            Some("userRateLimitExceeded") => RemoteError::Quota(QuotaError::UserRateLimitExceeded {
                message,
                retry_after,
            }),
            Some("rateLimitExceeded") => RemoteError::Quota(QuotaError::ProjectRateLimitExceeded {
                message,
                retry_after,
            }),
            Some("storageQuotaExceeded") => {
                RemoteError::Quota(QuotaError::StorageQuotaExceeded(message))
            }
            Some("insufficientPermissions") => {
                RemoteError::Authorization(AuthorizationError::InsufficientPermissions(message))
            }
            Some("domainPolicy") => {
                RemoteError::Authorization(AuthorizationError::DomainPolicy(message))
            }
            _ => RemoteError::Authorization(AuthorizationError::Forbidden(message)),
        },
        StatusCode::NOT_FOUND => RemoteError::Resource(ResourceError::FileNotFound(message)),
        StatusCode::TOO_MANY_REQUESTS => RemoteError::Quota(QuotaError::UserRateLimitExceeded {
            message,
            retry_after,
        }),
        StatusCode::BAD_GATEWAY => RemoteError::Server(ServerError::BadGateway(message)),
        StatusCode::SERVICE_UNAVAILABLE => RemoteError::Server(ServerError::ServiceUnavailable {
            message,
            retry_after,
        }),
        s if s.is_server_error() => RemoteError::Server(ServerError::InternalError(message)),
        _ => RemoteError::Request(RequestError::BadRequest(format!(
            "HTTP {}: {}",
            status.as_u16(),
            message
        ))),
    }
}
