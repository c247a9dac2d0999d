//! Error types for the Drive upload flow.
//!
//! Two layers exist. [`RemoteError`] describes the failure of a single call to
//! the Drive API and knows whether that call may be retried. [`DriveError`] is
//! what a flow invocation returns and names the step that failed.

use reqwest::StatusCode;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type for flow-level operations.
pub type DriveResult<T> = Result<T, DriveError>;

/// Result type for a single remote call.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Top-level error returned by the upload flow and its steps.
#[derive(Debug, Error)]
pub enum DriveError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// The credential could not be turned into a session.
    #[error("Authentication error: {0}")]
    Authentication(#[from] AuthenticationError),

    /// The file to upload does not exist or is not a regular file.
    #[error("Local file not found: {}", path.display())]
    LocalFileNotFound {
        /// Path that was checked.
        path: PathBuf,
    },

    /// The file to upload exists but could not be read.
    #[error("Failed to read local file {}: {source}", path.display())]
    LocalFileRead {
        /// Path that was read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The destination folder could not be created.
    #[error("Failed to create folder '{folder}': {source}")]
    FolderCreation {
        /// Requested folder name.
        folder: String,
        /// Last remote failure.
        #[source]
        source: RemoteError,
    },

    /// The file could not be uploaded.
    #[error("Failed to upload '{file}': {source}")]
    Upload {
        /// Uploaded file name.
        file: String,
        /// Last remote failure.
        #[source]
        source: RemoteError,
    },
}

impl DriveError {
    /// Name of the flow step the error belongs to.
    pub fn step(&self) -> &'static str {
        match self {
            DriveError::Configuration(_) => "configuration",
            DriveError::Authentication(_) => "authenticate",
            DriveError::FolderCreation { .. } => "create_folder",
            DriveError::LocalFileNotFound { .. }
            | DriveError::LocalFileRead { .. }
            | DriveError::Upload { .. } => "upload_file",
        }
    }

    /// Returns true if the failure came from exhausted retries on a transient
    /// remote error rather than from configuration or local input.
    pub fn is_transient(&self) -> bool {
        match self {
            DriveError::FolderCreation { source, .. } | DriveError::Upload { source, .. } => {
                source.is_transient()
            }
            _ => false,
        }
    }
}

/// Failure of a single remote call.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Authentication rejected by the API (expired or revoked token).
    #[error("Authentication error: {0}")]
    Authentication(#[from] AuthenticationError),

    /// Authorization error.
    #[error("Authorization error: {0}")]
    Authorization(#[from] AuthorizationError),

    /// Request error.
    #[error("Request error: {0}")]
    Request(#[from] RequestError),

    /// Resource error.
    #[error("Resource error: {0}")]
    Resource(#[from] ResourceError),

    /// Quota error.
    #[error("Quota error: {0}")]
    Quota(#[from] QuotaError),

    /// Upload error.
    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    /// Network error.
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    /// Server error.
    #[error("Server error: {0}")]
    Server(#[from] ServerError),

    /// Response error.
    #[error("Response error: {0}")]
    Response(#[from] ResponseError),
}

impl RemoteError {
    /// Creates a request validation error.
    pub fn request(msg: impl Into<String>) -> Self {
        RemoteError::Request(RequestError::ValidationError(msg.into()))
    }

    /// Creates a network error.
    pub fn network(msg: impl Into<String>) -> Self {
        RemoteError::Network(NetworkError::ConnectionFailed(msg.into()))
    }

    /// Creates a deserialization error.
    pub fn deserialization(msg: impl Into<String>) -> Self {
        RemoteError::Response(ResponseError::DeserializationError(msg.into()))
    }

    /// Returns true if the call may succeed when repeated.
    ///
    /// Every failure reported by the API is transient, whatever its status,
    /// as are network failures and interrupted uploads. Checks made before a
    /// request leaves the process (missing name, bad URL, expired session,
    /// serialization) are not, and neither is an unreadable success response:
    /// the resource behind it may already exist.
    pub fn is_transient(&self) -> bool {
        match self {
            RemoteError::Network(_)
            | RemoteError::Server(_)
            | RemoteError::Quota(_)
            | RemoteError::Authorization(_)
            | RemoteError::Resource(_) => true,
            RemoteError::Request(error) => matches!(
                error,
                RequestError::BadRequest(_) | RequestError::InvalidParameter(_)
            ),
            RemoteError::Authentication(error) => {
                matches!(error, AuthenticationError::InvalidToken(_))
            }
            RemoteError::Upload(error) => matches!(error, UploadError::UploadInterrupted(_)),
            RemoteError::Response(_) => false,
        }
    }

    /// Returns the retry delay hint sent by the server, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            RemoteError::Quota(QuotaError::UserRateLimitExceeded { retry_after, .. })
            | RemoteError::Quota(QuotaError::ProjectRateLimitExceeded { retry_after, .. })
            | RemoteError::Server(ServerError::ServiceUnavailable { retry_after, .. }) => {
                *retry_after
            }
            _ => None,
        }
    }

    /// Returns the HTTP status code associated with the error, if applicable.
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            RemoteError::Authentication(_) => Some(StatusCode::UNAUTHORIZED),
            RemoteError::Authorization(_) => Some(StatusCode::FORBIDDEN),
            RemoteError::Request(_) => Some(StatusCode::BAD_REQUEST),
            RemoteError::Resource(_) => Some(StatusCode::NOT_FOUND),
            RemoteError::Quota(_) => Some(StatusCode::TOO_MANY_REQUESTS),
            RemoteError::Server(ServerError::InternalError(_)) => {
                Some(StatusCode::INTERNAL_SERVER_ERROR)
            }
            RemoteError::Server(ServerError::ServiceUnavailable { .. }) => {
                Some(StatusCode::SERVICE_UNAVAILABLE)
            }
            RemoteError::Server(ServerError::BadGateway(_)) => Some(StatusCode::BAD_GATEWAY),
            _ => None,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// A required setting is absent.
    #[error("Missing setting: {0}")]
    MissingSetting(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Authentication errors. None of these are retried.
#[derive(Debug, Error)]
pub enum AuthenticationError {
    /// The credential file could not be read.
    #[error("Credential file {} unreadable: {source}", path.display())]
    CredentialUnreadable {
        /// Credential path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The credential file is not a usable service-account key.
    #[error("Malformed credential: {0}")]
    MalformedCredential(String),

    /// JWT encoding error.
    #[error("JWT encoding error: {0}")]
    JwtEncoding(String),

    /// The token endpoint could not be reached or answered garbage.
    #[error("Token exchange failed: {0}")]
    TokenExchangeFailed(String),

    /// The token endpoint refused the credential.
    #[error("Credential rejected with status {status}: {message}")]
    Rejected {
        /// HTTP status returned by the token endpoint.
        status: u16,
        /// Response body or error description.
        message: String,
    },

    /// Invalid token.
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// Expired token.
    #[error("Expired token: {0}")]
    ExpiredToken(String),
}

/// Authorization errors.
#[derive(Debug, Error)]
pub enum AuthorizationError {
    /// Forbidden.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Insufficient permissions.
    #[error("Insufficient permissions: {0}")]
    InsufficientPermissions(String),

    /// Domain policy.
    #[error("Domain policy violation: {0}")]
    DomainPolicy(String),
}

/// Request errors.
#[derive(Debug, Error)]
pub enum RequestError {
    /// Validation error.
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Request rejected by the API.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Invalid parameter.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Missing parameter.
    #[error("Missing parameter: {0}")]
    MissingParameter(String),
}

/// Resource errors.
#[derive(Debug, Error)]
pub enum ResourceError {
    /// File or parent folder not found.
    #[error("File not found: {0}")]
    FileNotFound(String),
}

/// Quota errors.
#[derive(Debug, Error)]
pub enum QuotaError {
    /// Storage quota exceeded.
    #[error("Storage quota exceeded: {0}")]
    StorageQuotaExceeded(String),

    /// User rate limit exceeded.
    #[error("User rate limit exceeded: {message}")]
    UserRateLimitExceeded {
        /// Error message.
        message: String,
        /// Retry after duration.
        retry_after: Option<Duration>,
    },

    /// Project rate limit exceeded.
    #[error("Project rate limit exceeded: {message}")]
    ProjectRateLimitExceeded {
        /// Error message.
        message: String,
        /// Retry after duration.
        retry_after: Option<Duration>,
    },
}

/// Upload errors.
#[derive(Debug, Error)]
pub enum UploadError {
    /// Upload interrupted.
    #[error("Upload interrupted: {0}")]
    UploadInterrupted(String),

    /// Invalid upload request.
    #[error("Invalid upload request: {0}")]
    InvalidUploadRequest(String),
}

/// Network errors.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// Connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Timeout.
    #[error("Request timeout: {0}")]
    Timeout(String),
}

/// Server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Internal error.
    #[error("Internal server error: {0}")]
    InternalError(String),

    /// Service unavailable.
    #[error("Service unavailable: {message}")]
    ServiceUnavailable {
        /// Error message.
        message: String,
        /// Retry after duration.
        retry_after: Option<Duration>,
    },

    /// Bad gateway.
    #[error("Bad gateway: {0}")]
    BadGateway(String),
}

/// Response errors.
#[derive(Debug, Error)]
pub enum ResponseError {
    /// Deserialization error.
    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    /// Unexpected format.
    #[error("Unexpected response format: {0}")]
    UnexpectedFormat(String),
}

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network error.
    #[error("Network error: {0}")]
    Network(String),

    /// Timeout error.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// HTTP error.
    #[error("HTTP error: {0}")]
    Http(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout(err.to_string())
        } else if err.is_connect() || err.is_request() || err.is_body() {
            TransportError::Network(err.to_string())
        } else {
            TransportError::Http(err.to_string())
        }
    }
}

impl From<TransportError> for RemoteError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout(msg) => RemoteError::Network(NetworkError::Timeout(msg)),
            TransportError::Network(msg) => {
                RemoteError::Network(NetworkError::ConnectionFailed(msg))
            }
            TransportError::Http(msg) => {
                RemoteError::Response(ResponseError::UnexpectedFormat(msg))
            }
        }
    }
}
