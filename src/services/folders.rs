//! Folder creation.

use crate::client::Session;
use crate::errors::{DriveError, DriveResult, RemoteError, RemoteResult, RequestError};
use crate::observability::Logger;
use crate::resilience::{RemoteOperation, RetryExecutor, RetryPolicy};
use crate::transport::{HttpMethod, RequestBody};
use crate::types::{DriveFile, FileMetadata, DRIVE_FILE_FIELDS};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::HeaderMap;
use serde_json::json;
use std::sync::Arc;

/// Creates the destination folder for an upload.
///
/// Drive does not enforce unique names, so calling this twice with the same
/// name yields two folders.
pub struct FolderService {
    policy: RetryPolicy,
    logger: Arc<dyn Logger>,
}

impl FolderService {
    /// Creates a new folder service.
    pub fn new(policy: RetryPolicy, logger: Arc<dyn Logger>) -> Self {
        Self { policy, logger }
    }

    /// Creates a folder named `name`, nested under `parent_id` when given, and
    /// returns its ID.
    ///
    /// An empty `parent_id` is treated as no parent.
    pub async fn create_folder(
        &self,
        session: &Session,
        name: &str,
        parent_id: Option<&str>,
    ) -> DriveResult<String> {
        let parent_id = parent_id.filter(|id| !id.is_empty());
        let call = CreateFolderCall {
            session,
            name,
            parent_id,
        };

        let retry = RetryExecutor::new(self.policy.clone(), self.logger.clone());
        match retry.execute(&call).await {
            Ok(folder) => {
                self.logger.info(
                    "Created folder",
                    json!({
                        "folder_id": folder.id,
                        "name": folder.name,
                        "parent_id": parent_id,
                    }),
                );
                Ok(folder.id)
            }
            Err(source) => {
                self.logger.error(
                    "Folder creation failed",
                    json!({
                        "name": name,
                        "status": source.status_code().map(|s| s.as_u16()),
                        "error": source.to_string(),
                    }),
                );
                Err(DriveError::FolderCreation {
                    folder: name.to_string(),
                    source,
                })
            }
        }
    }
}

struct CreateFolderCall<'a> {
    session: &'a Session,
    name: &'a str,
    parent_id: Option<&'a str>,
}

#[async_trait]
impl RemoteOperation for CreateFolderCall<'_> {
    type Output = DriveFile;

    fn name(&self) -> &str {
        "create_folder"
    }

    async fn invoke(&self) -> RemoteResult<DriveFile> {
        if self.name.trim().is_empty() {
            return Err(RemoteError::Request(RequestError::MissingParameter(
                "Folder name must not be empty".to_string(),
            )));
        }

        let executor = self.session.executor();
        let metadata = FileMetadata::folder(self.name, self.parent_id);
        let body = serde_json::to_vec(&metadata)
            .map_err(|e| RemoteError::request(format!("Failed to serialize metadata: {}", e)))?;

        let url = executor.build_url("files", &[("fields", DRIVE_FILE_FIELDS)])?;
        let folder: DriveFile = executor
            .send_json(
                HttpMethod::Post,
                url,
                Some(RequestBody::Bytes(Bytes::from(body))),
                HeaderMap::new(),
            )
            .await?;

        if folder.id.is_empty() {
            return Err(RemoteError::deserialization(
                "Folder created without an ID",
            ));
        }

        Ok(folder)
    }
}
