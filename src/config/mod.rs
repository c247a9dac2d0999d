//! Configuration for the uploader.

use crate::errors::{ConfigurationError, DriveResult};
use crate::resilience::RetryPolicy;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Default Drive API base URL.
pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/drive/v3/";

/// Default Drive upload base URL.
pub const DEFAULT_UPLOAD_URL: &str = "https://www.googleapis.com/upload/drive/v3/";

/// Configuration for the uploader.
#[derive(Debug, Clone)]
pub struct UploaderConfig {
    /// Base URL for metadata calls. Always ends with `/`.
    pub base_url: Url,

    /// Base URL for media uploads. Always ends with `/`.
    pub upload_url: Url,

    /// Token endpoint override. When unset the key file's `token_uri` is used.
    pub token_url: Option<Url>,

    /// Default timeout for requests.
    pub timeout: Duration,

    /// Connection timeout.
    pub connect_timeout: Duration,

    /// Retry policy applied to every remote call.
    pub retry: RetryPolicy,

    /// User agent string.
    pub user_agent: String,
}

impl UploaderConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> UploaderConfigBuilder {
        UploaderConfigBuilder::new()
    }

    /// Builds a configuration from `DRIVE_*` environment variables, falling back
    /// to defaults for anything unset.
    ///
    /// Recognised variables: `DRIVE_BASE_URL`, `DRIVE_UPLOAD_URL`,
    /// `DRIVE_TOKEN_URL`, `DRIVE_TIMEOUT_SECS`, `DRIVE_MAX_ATTEMPTS`,
    /// `DRIVE_RETRY_DELAY_SECS`.
    pub fn from_env() -> DriveResult<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_vars<F>(lookup: F) -> DriveResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = Self::builder();

        if let Some(url) = lookup("DRIVE_BASE_URL") {
            builder = builder.base_url(url);
        }
        if let Some(url) = lookup("DRIVE_UPLOAD_URL") {
            builder = builder.upload_url(url);
        }
        if let Some(url) = lookup("DRIVE_TOKEN_URL") {
            builder = builder.token_url(url);
        }
        if let Some(secs) = lookup("DRIVE_TIMEOUT_SECS") {
            let secs = parse_number("DRIVE_TIMEOUT_SECS", &secs)?;
            builder = builder.timeout(Duration::from_secs(secs));
        }

        let mut retry = RetryPolicy::default();
        if let Some(attempts) = lookup("DRIVE_MAX_ATTEMPTS") {
            retry.max_attempts = parse_number("DRIVE_MAX_ATTEMPTS", &attempts)?;
        }
        if let Some(secs) = lookup("DRIVE_RETRY_DELAY_SECS") {
            retry.inter_attempt_delay =
                Duration::from_secs(parse_number("DRIVE_RETRY_DELAY_SECS", &secs)?);
        }

        builder.retry(retry).build()
    }

    /// Validates the configuration.
    pub fn validate(&self) -> DriveResult<()> {
        check_url("base URL", &self.base_url)?;
        check_url("upload URL", &self.upload_url)?;
        if let Some(ref token_url) = self.token_url {
            check_url("token URL", token_url)?;
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigurationError::InvalidConfiguration(
                "max_attempts must be at least 1".to_string(),
            )
            .into());
        }

        Ok(())
    }
}

/// Builder for UploaderConfig.
pub struct UploaderConfigBuilder {
    base_url: Option<String>,
    upload_url: Option<String>,
    token_url: Option<String>,
    timeout: Duration,
    connect_timeout: Duration,
    retry: RetryPolicy,
    user_agent: Option<String>,
}

impl UploaderConfigBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self {
            base_url: None,
            upload_url: None,
            token_url: None,
            timeout: Duration::from_secs(300),
            connect_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            user_agent: None,
        }
    }

    /// Sets the base URL.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the upload URL.
    pub fn upload_url(mut self, url: impl Into<String>) -> Self {
        self.upload_url = Some(url.into());
        self
    }

    /// Overrides the OAuth2 token endpoint.
    pub fn token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = Some(url.into());
        self
    }

    /// Sets the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the retry policy.
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the user agent string.
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> DriveResult<UploaderConfig> {
        let base_url = parse_base(
            "base URL",
            self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL),
        )?;
        let upload_url = parse_base(
            "upload URL",
            self.upload_url.as_deref().unwrap_or(DEFAULT_UPLOAD_URL),
        )?;
        let token_url = self
            .token_url
            .as_deref()
            .map(|url| parse_url("token URL", url))
            .transpose()?;

        let user_agent = self.user_agent.unwrap_or_else(|| {
            format!("integrations-drive-uploader/{}", env!("CARGO_PKG_VERSION"))
        });

        let config = UploaderConfig {
            base_url,
            upload_url,
            token_url,
            timeout: self.timeout,
            connect_timeout: self.connect_timeout,
            retry: self.retry,
            user_agent,
        };

        config.validate()?;

        Ok(config)
    }
}

impl Default for UploaderConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Caller-side defaults for a flow invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowSettings {
    /// Path to the service-account key file.
    pub credentials_path: PathBuf,

    /// Folder under which per-order folders are created. `None` means the
    /// service account's root.
    pub parent_folder_id: Option<String>,
}

impl FlowSettings {
    /// Reads `GDRIVE_CREDENTIALS` (required) and `GDRIVE_PARENT_ID` (optional).
    pub fn from_env() -> DriveResult<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_vars<F>(lookup: F) -> DriveResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let credentials_path = lookup("GDRIVE_CREDENTIALS")
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from)
            .ok_or_else(|| ConfigurationError::MissingSetting("GDRIVE_CREDENTIALS".to_string()))?;

        let parent_folder_id = lookup("GDRIVE_PARENT_ID").filter(|value| !value.trim().is_empty());

        Ok(Self {
            credentials_path,
            parent_folder_id,
        })
    }
}

fn parse_url(what: &str, raw: &str) -> Result<Url, ConfigurationError> {
    Url::parse(raw)
        .map_err(|e| ConfigurationError::InvalidConfiguration(format!("Invalid {}: {}", what, e)))
}

// Url::join drops the last path segment unless the base ends with a slash.
fn parse_base(what: &str, raw: &str) -> Result<Url, ConfigurationError> {
    let mut url = parse_url(what, raw)?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn check_url(what: &str, url: &Url) -> Result<(), ConfigurationError> {
    match url.scheme() {
        "https" => Ok(()),
        "http" if is_loopback(url) => Ok(()),
        _ => Err(ConfigurationError::InvalidConfiguration(format!(
            "{} must use HTTPS: {}",
            what, url
        ))),
    }
}

fn is_loopback(url: &Url) -> bool {
    match url.host() {
        Some(url::Host::Domain(domain)) => domain == "localhost",
        Some(url::Host::Ipv4(ip)) => ip.is_loopback(),
        Some(url::Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ConfigurationError> {
    raw.trim().parse().map_err(|_| {
        ConfigurationError::InvalidConfiguration(format!("{} is not a valid number: {}", key, raw))
    })
}
