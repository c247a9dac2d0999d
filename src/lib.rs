//! Google Drive order-document uploader.
//!
//! Uploads a generated document (an order PDF) into a per-order folder on
//! Google Drive. One invocation authenticates with a service-account key,
//! creates a folder named after the order, and uploads the local file into it.
//!
//! # Features
//!
//! - **Authentication**: Service-account JWT bearer flow, scoped to Drive
//! - **Folders**: One new folder per invocation, optionally under a parent
//! - **Uploads**: Multipart for small documents, resumable sessions for large ones
//! - **Resilience**: Bounded fixed-delay retry around every remote call
//! - **Observability**: Injected structured logger with secret redaction
//!
//! # Example
//!
//! ```no_run
//! use integrations_drive_uploader::{UploadOrchestrator, UploaderConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let orchestrator = UploadOrchestrator::new(UploaderConfig::builder().build()?)?;
//!
//! let file_id = orchestrator
//!     .run(
//!         "/etc/drive/service-account.json",
//!         "order-1001",
//!         "/tmp/order-1001.pdf",
//!         Some("root-abc"),
//!     )
//!     .await?;
//! println!("Uploaded file: {}", file_id);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Core modules
pub mod auth;
pub mod client;
pub mod config;
pub mod errors;
pub mod flow;
pub mod observability;
pub mod resilience;
pub mod services;
pub mod transport;
pub mod types;

// Development/testing modules - always available for integration tests
pub mod mocks;

// Re-exports for convenience
pub use auth::{AccessToken, Authenticator, ServiceAccountKey};
pub use client::Session;
pub use config::{FlowSettings, UploaderConfig, UploaderConfigBuilder};
pub use errors::{DriveError, DriveResult, RemoteError, RemoteResult};
pub use flow::UploadOrchestrator;
pub use resilience::{RemoteOperation, RetryExecutor, RetryPolicy};

/// Prelude module with commonly used types and traits.
///
/// ```no_run
/// use integrations_drive_uploader::prelude::*;
/// ```
pub mod prelude {
    // Flow
    pub use crate::flow::UploadOrchestrator;

    // Configuration
    pub use crate::config::{FlowSettings, UploaderConfig, UploaderConfigBuilder};

    // Authentication
    pub use crate::auth::{AccessToken, Authenticator};
    pub use crate::client::Session;

    // Services
    pub use crate::services::{FolderService, UploadService};

    // Resilience
    pub use crate::resilience::{RemoteOperation, RetryExecutor, RetryPolicy};

    // Logging
    pub use crate::observability::{Logger, TracingLogger};

    // Errors
    pub use crate::errors::{DriveError, DriveResult, RemoteError, RemoteResult};
}
