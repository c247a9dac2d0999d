//! Request and response types for the Drive API.

use serde::{Deserialize, Serialize};

/// MIME type Drive uses for folders.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Partial response fields requested on every create call.
pub const DRIVE_FILE_FIELDS: &str = "id,name,mimeType,parents";

/// A file or folder as returned by the Drive API.
///
/// Only the fields requested through [`DRIVE_FILE_FIELDS`] are modelled; `id`
/// and `name` are mandatory and a response without them fails to decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    /// File ID.
    pub id: String,

    /// File name.
    pub name: String,

    /// MIME type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,

    /// Parent folder IDs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parents: Option<Vec<String>>,
}

/// Metadata sent when creating a file or folder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    /// File name.
    pub name: String,

    /// MIME type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,

    /// Parent folder IDs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parents: Option<Vec<String>>,
}

impl FileMetadata {
    /// Metadata for a folder, optionally nested under `parent_id`.
    pub fn folder(name: impl Into<String>, parent_id: Option<&str>) -> Self {
        Self {
            name: name.into(),
            mime_type: Some(FOLDER_MIME_TYPE.to_string()),
            parents: parent_id.map(|id| vec![id.to_string()]),
        }
    }

    /// Metadata for a PDF document stored in `folder_id`.
    pub fn pdf(name: impl Into<String>, folder_id: &str) -> Self {
        Self {
            name: name.into(),
            mime_type: Some(mime::APPLICATION_PDF.to_string()),
            parents: Some(vec![folder_id.to_string()]),
        }
    }
}
