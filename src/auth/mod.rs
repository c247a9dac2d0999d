//! Service-account authentication for Google Drive.
//!
//! A service-account key file is exchanged for a short-lived bearer token using
//! the OAuth 2.0 JWT bearer grant: a JWT signed with the key's RSA private key
//! (RS256) is posted to the token endpoint, which answers with an access token.
//!
//! # Example
//!
//! ```no_run
//! use integrations_drive_uploader::auth::Authenticator;
//! use integrations_drive_uploader::config::UploaderConfig;
//! use integrations_drive_uploader::observability::TracingLogger;
//! use integrations_drive_uploader::transport::ReqwestTransport;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Arc::new(UploaderConfig::builder().build()?);
//! let transport = Arc::new(ReqwestTransport::from_config(&config)?);
//! let authenticator = Authenticator::new(config, transport, TracingLogger::shared());
//!
//! let session = authenticator.authenticate("/etc/drive/service-account.json").await?;
//! println!("token scopes: {:?}", session.token().scopes);
//! # Ok(())
//! # }
//! ```

use crate::client::Session;
use crate::config::UploaderConfig;
use crate::errors::AuthenticationError;
use crate::observability::Logger;
use crate::transport::{HttpMethod, HttpRequest, HttpTransport, RequestBody};
use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use url::Url;

/// Default Google OAuth2 token URL.
pub const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// JWT lifetime for service account tokens (1 hour).
pub const JWT_LIFETIME_SECONDS: i64 = 3600;

/// Grant type for the JWT bearer flow.
pub const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// OAuth 2.0 scopes for Google Drive.
pub mod scopes {
    /// Full access to Drive files. Folder and file creation need exactly this.
    pub const DRIVE: &str = "https://www.googleapis.com/auth/drive";
}

/// Access token with metadata.
#[derive(Debug, Clone)]
pub struct AccessToken {
    /// The token string.
    pub token: SecretString,

    /// Token type (usually "Bearer").
    pub token_type: String,

    /// Expiration time.
    pub expires_at: DateTime<Utc>,

    /// Scopes granted.
    pub scopes: Vec<String>,
}

impl AccessToken {
    /// Creates a new access token.
    pub fn new(
        token: impl Into<String>,
        token_type: impl Into<String>,
        expires_at: DateTime<Utc>,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            token: SecretString::new(token.into()),
            token_type: token_type.into(),
            expires_at,
            scopes,
        }
    }

    /// Checks if the token is expired.
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Returns the authorization header value.
    pub fn authorization_header(&self) -> String {
        format!("{} {}", self.token_type, self.token.expose_secret())
    }
}

/// Contents of a service-account JSON key file.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    /// Key type; must be `service_account`.
    #[serde(rename = "type")]
    pub key_type: String,

    /// Service account email, used as the JWT issuer.
    pub client_email: String,

    /// PEM-encoded RSA private key.
    pub private_key: SecretString,

    /// Key ID, sent as the JWT `kid` header.
    #[serde(default)]
    pub private_key_id: Option<String>,

    /// Token endpoint advertised by the key.
    #[serde(default)]
    pub token_uri: Option<String>,
}

impl ServiceAccountKey {
    /// Parses and validates a key from its JSON text.
    pub fn from_json(text: &str) -> Result<Self, AuthenticationError> {
        let key: ServiceAccountKey = serde_json::from_str(text).map_err(|e| {
            AuthenticationError::MalformedCredential(format!("Invalid key file: {}", e))
        })?;

        if key.key_type != "service_account" {
            return Err(AuthenticationError::MalformedCredential(format!(
                "Expected key type 'service_account', found '{}'",
                key.key_type
            )));
        }
        if key.client_email.trim().is_empty() {
            return Err(AuthenticationError::MalformedCredential(
                "client_email is empty".to_string(),
            ));
        }
        if key.private_key.expose_secret().trim().is_empty() {
            return Err(AuthenticationError::MalformedCredential(
                "private_key is empty".to_string(),
            ));
        }

        Ok(key)
    }

    /// Reads and validates a key file.
    pub async fn from_file(path: &Path) -> Result<Self, AuthenticationError> {
        let text = tokio::fs::read_to_string(path).await.map_err(|source| {
            AuthenticationError::CredentialUnreadable {
                path: path.to_path_buf(),
                source,
            }
        })?;
        Self::from_json(&text)
    }

    /// Signs a JWT bearer assertion for `scopes`, addressed to `audience`.
    pub fn create_jwt(
        &self,
        scopes: &[String],
        audience: &str,
    ) -> Result<String, AuthenticationError> {
        #[derive(Serialize)]
        struct Claims<'a> {
            iss: &'a str,
            scope: String,
            aud: &'a str,
            exp: i64,
            iat: i64,
        }

        let now = Utc::now().timestamp();

        let claims = Claims {
            iss: &self.client_email,
            scope: scopes.join(" "),
            aud: audience,
            exp: now + JWT_LIFETIME_SECONDS,
            iat: now,
        };

        let mut header = Header::new(Algorithm::RS256);
        if let Some(ref key_id) = self.private_key_id {
            header.kid = Some(key_id.clone());
        }

        let key = EncodingKey::from_rsa_pem(self.private_key.expose_secret().as_bytes())
            .map_err(|e| AuthenticationError::JwtEncoding(format!("Invalid private key: {}", e)))?;

        encode(&header, &claims, &key)
            .map_err(|e| AuthenticationError::JwtEncoding(format!("JWT encoding failed: {}", e)))
    }
}

/// Turns a credential file into a [`Session`].
///
/// Authentication failures are configuration problems and are never retried.
pub struct Authenticator {
    config: Arc<UploaderConfig>,
    transport: Arc<dyn HttpTransport>,
    logger: Arc<dyn Logger>,
    scopes: Vec<String>,
}

impl Authenticator {
    /// Creates an authenticator requesting the Drive scope.
    pub fn new(
        config: Arc<UploaderConfig>,
        transport: Arc<dyn HttpTransport>,
        logger: Arc<dyn Logger>,
    ) -> Self {
        Self {
            config,
            transport,
            logger,
            scopes: vec![scopes::DRIVE.to_string()],
        }
    }

    /// Scopes requested for every session.
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    /// Exchanges the key file at `credential_path` for an authenticated session.
    pub async fn authenticate(
        &self,
        credential_path: impl AsRef<Path>,
    ) -> Result<Session, AuthenticationError> {
        let credential_path = credential_path.as_ref();
        let key = ServiceAccountKey::from_file(credential_path).await?;
        let token_url = self.token_url(&key)?;

        let token = self.exchange_jwt_for_token(&key, &token_url).await?;

        self.logger.info(
            "Authenticated service account",
            json!({
                "client_email": key.client_email,
                "scopes": token.scopes,
                "expires_at": token.expires_at.to_rfc3339(),
            }),
        );

        Ok(Session::new(token, self.config.clone(), self.transport.clone()))
    }

    fn token_url(&self, key: &ServiceAccountKey) -> Result<Url, AuthenticationError> {
        if let Some(ref url) = self.config.token_url {
            return Ok(url.clone());
        }

        match key.token_uri.as_deref() {
            Some(uri) => Url::parse(uri).map_err(|e| {
                AuthenticationError::MalformedCredential(format!("Invalid token_uri: {}", e))
            }),
            None => Url::parse(TOKEN_URL)
                .map_err(|e| AuthenticationError::TokenExchangeFailed(e.to_string())),
        }
    }

    async fn exchange_jwt_for_token(
        &self,
        key: &ServiceAccountKey,
        token_url: &Url,
    ) -> Result<AccessToken, AuthenticationError> {
        #[derive(Serialize)]
        struct TokenRequest<'a> {
            grant_type: &'a str,
            assertion: &'a str,
        }

        #[derive(Deserialize)]
        struct TokenResponse {
            access_token: String,
            #[serde(default = "default_token_type")]
            token_type: String,
            #[serde(default = "default_expires_in")]
            expires_in: i64,
        }

        #[derive(Deserialize)]
        struct TokenErrorResponse {
            error: String,
            #[serde(default)]
            error_description: Option<String>,
        }

        let jwt = key.create_jwt(&self.scopes, token_url.as_str())?;

        let form = serde_urlencoded::to_string(TokenRequest {
            grant_type: JWT_BEARER_GRANT,
            assertion: &jwt,
        })
        .map_err(|e| {
            AuthenticationError::TokenExchangeFailed(format!("Failed to encode request: {}", e))
        })?;

        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );

        let request = HttpRequest {
            method: HttpMethod::Post,
            url: token_url.clone(),
            headers,
            body: Some(RequestBody::Bytes(Bytes::from(form))),
            timeout: Some(self.config.timeout),
        };

        let response = self.transport.send(request).await.map_err(|e| {
            AuthenticationError::TokenExchangeFailed(format!("HTTP request failed: {}", e))
        })?;

        if !response.status.is_success() {
            let message = match serde_json::from_slice::<TokenErrorResponse>(&response.body) {
                Ok(err) => match err.error_description {
                    Some(description) => format!("{}: {}", err.error, description),
                    None => err.error,
                },
                Err(_) => String::from_utf8_lossy(&response.body).into_owned(),
            };
            self.logger.error(
                "Token endpoint rejected credential",
                json!({ "status": response.status.as_u16(), "client_email": key.client_email }),
            );
            return Err(AuthenticationError::Rejected {
                status: response.status.as_u16(),
                message,
            });
        }

        let token_response: TokenResponse = serde_json::from_slice(&response.body).map_err(|e| {
            AuthenticationError::TokenExchangeFailed(format!("Failed to parse response: {}", e))
        })?;

        if token_response.access_token.is_empty() {
            return Err(AuthenticationError::TokenExchangeFailed(
                "Token response carried an empty access_token".to_string(),
            ));
        }

        if token_response.expires_in <= 0 {
            return Err(AuthenticationError::TokenExchangeFailed(format!(
                "Token response carried a non-positive expires_in: {}",
                token_response.expires_in
            )));
        }

        let expires_at = Duration::try_seconds(token_response.expires_in)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
            .ok_or_else(|| {
                AuthenticationError::TokenExchangeFailed(format!(
                    "Token response carried an out-of-range expires_in: {}",
                    token_response.expires_in
                ))
            })?;

        Ok(AccessToken::new(
            token_response.access_token,
            token_response.token_type,
            expires_at,
            self.scopes.clone(),
        ))
    }
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

fn default_expires_in() -> i64 {
    JWT_LIFETIME_SECONDS
}
