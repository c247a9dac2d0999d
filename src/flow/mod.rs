//! End-to-end upload flow: authenticate, create the order folder, upload the
//! document into it.
//!
//! # Example
//!
//! ```no_run
//! use integrations_drive_uploader::config::{FlowSettings, UploaderConfig};
//! use integrations_drive_uploader::flow::UploadOrchestrator;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let orchestrator = UploadOrchestrator::new(UploaderConfig::from_env()?)?;
//! let settings = FlowSettings::from_env()?;
//!
//! let file_id = orchestrator
//!     .run_with_settings(&settings, "order-1001", "/tmp/order-1001.pdf")
//!     .await?;
//! println!("uploaded as {}", file_id);
//! # Ok(())
//! # }
//! ```

use crate::auth::Authenticator;
use crate::config::{FlowSettings, UploaderConfig};
use crate::errors::{ConfigurationError, DriveResult};
use crate::observability::{Logger, TracingLogger};
use crate::services::{FolderService, UploadService};
use crate::transport::{HttpTransport, ReqwestTransport};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;

/// Runs the authenticate → create folder → upload sequence.
///
/// Steps run strictly one after another and the first failure ends the flow.
/// Only the individual remote calls are retried, never the flow as a whole.
/// A folder created before a failed upload is left in place.
///
/// The orchestrator holds no per-invocation state, so one instance can serve
/// concurrent `run` calls.
pub struct UploadOrchestrator {
    config: Arc<UploaderConfig>,
    transport: Arc<dyn HttpTransport>,
    logger: Arc<dyn Logger>,
}

impl UploadOrchestrator {
    /// Creates an orchestrator backed by a reqwest transport and the tracing
    /// logger.
    pub fn new(config: UploaderConfig) -> DriveResult<Self> {
        config.validate()?;
        let transport = ReqwestTransport::from_config(&config)
            .map_err(|e| ConfigurationError::InvalidConfiguration(e.to_string()))?;

        Ok(Self {
            config: Arc::new(config),
            transport: Arc::new(transport),
            logger: TracingLogger::shared(),
        })
    }

    /// Creates an orchestrator with an explicit transport and logger.
    pub fn with_transport(
        config: UploaderConfig,
        transport: Arc<dyn HttpTransport>,
        logger: Arc<dyn Logger>,
    ) -> DriveResult<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            transport,
            logger,
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &UploaderConfig {
        &self.config
    }

    /// Uploads `local_path` into a new folder named `identifier` and returns
    /// the uploaded file's ID.
    ///
    /// `parent_folder_id` of `None` (or empty) creates the folder at the
    /// service account's root.
    pub async fn run(
        &self,
        credential_path: impl AsRef<Path>,
        identifier: &str,
        local_path: impl AsRef<Path>,
        parent_folder_id: Option<&str>,
    ) -> DriveResult<String> {
        let local_path = local_path.as_ref();

        self.logger.info(
            "Starting upload flow",
            json!({
                "identifier": identifier,
                "local_path": local_path.display().to_string(),
                "parent_folder_id": parent_folder_id,
            }),
        );

        let authenticator = Authenticator::new(
            self.config.clone(),
            self.transport.clone(),
            self.logger.clone(),
        );
        let session = authenticator.authenticate(credential_path).await?;

        let folders = FolderService::new(self.config.retry.clone(), self.logger.clone());
        let folder_id = folders
            .create_folder(&session, identifier, parent_folder_id)
            .await?;

        let uploads = UploadService::new(self.config.retry.clone(), self.logger.clone());
        let file_id = uploads.upload_file(&session, local_path, &folder_id).await?;

        self.logger.info(
            "Upload flow finished",
            json!({
                "identifier": identifier,
                "folder_id": folder_id,
                "file_id": file_id,
            }),
        );

        Ok(file_id)
    }

    /// Runs the flow with the credential path and parent folder taken from
    /// `settings`.
    pub async fn run_with_settings(
        &self,
        settings: &FlowSettings,
        identifier: &str,
        local_path: impl AsRef<Path>,
    ) -> DriveResult<String> {
        self.run(
            &settings.credentials_path,
            identifier,
            local_path,
            settings.parent_folder_id.as_deref(),
        )
        .await
    }
}

impl std::fmt::Debug for UploadOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadOrchestrator")
            .field("base_url", &self.config.base_url.as_str())
            .field("retry", &self.config.retry)
            .finish()
    }
}
