//! Document upload into an existing folder.
//!
//! Small documents go up in a single `multipart/related` request. Anything
//! above [`MULTIPART_UPLOAD_LIMIT`] uses a resumable session: the metadata is
//! posted first, Drive answers with a session URI in `Location`, and the
//! content is sent to that URI with one `PUT`.
//!
//! Either way the whole transfer is one [`RemoteOperation`], so a transient
//! failure restarts it from the beginning.

use crate::client::Session;
use crate::errors::{DriveError, DriveResult, RemoteError, RemoteResult, UploadError};
use crate::observability::Logger;
use crate::resilience::{RemoteOperation, RetryExecutor, RetryPolicy};
use crate::transport::{HttpMethod, MultipartBody, RequestBody};
use crate::types::{DriveFile, FileMetadata, DRIVE_FILE_FIELDS};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde_json::json;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;
use url::Url;

/// Largest document sent as a multipart upload (5 MiB).
pub const MULTIPART_UPLOAD_LIMIT: usize = 5 * 1024 * 1024;

/// Uploads local documents into Drive folders.
pub struct UploadService {
    policy: RetryPolicy,
    logger: Arc<dyn Logger>,
}

impl UploadService {
    /// Creates a new upload service.
    pub fn new(policy: RetryPolicy, logger: Arc<dyn Logger>) -> Self {
        Self { policy, logger }
    }

    /// Uploads the PDF at `local_path` into `folder_id` and returns the new
    /// file's ID.
    ///
    /// The file must exist before any remote call is made; a missing file
    /// fails with [`DriveError::LocalFileNotFound`] and is never retried.
    pub async fn upload_file(
        &self,
        session: &Session,
        local_path: &Path,
        folder_id: &str,
    ) -> DriveResult<String> {
        let content = read_local_file(local_path).await?;
        let file_name = local_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| DriveError::LocalFileNotFound {
                path: local_path.to_path_buf(),
            })?;

        let metadata = FileMetadata::pdf(file_name.clone(), folder_id);
        let size = content.len();
        let retry = RetryExecutor::new(self.policy.clone(), self.logger.clone());

        let result = if size <= MULTIPART_UPLOAD_LIMIT {
            let call = MultipartUploadCall {
                session,
                metadata: &metadata,
                content,
            };
            retry.execute(&call).await
        } else {
            let call = ResumableUploadCall {
                session,
                metadata: &metadata,
                content,
            };
            retry.execute(&call).await
        };

        match result {
            Ok(file) => {
                self.logger.info(
                    "Uploaded file",
                    json!({
                        "file_id": file.id,
                        "name": file.name,
                        "folder_id": folder_id,
                        "size": size,
                    }),
                );
                Ok(file.id)
            }
            Err(source) => {
                self.logger.error(
                    "File upload failed",
                    json!({
                        "name": file_name,
                        "folder_id": folder_id,
                        "status": source.status_code().map(|s| s.as_u16()),
                        "error": source.to_string(),
                    }),
                );
                Err(DriveError::Upload {
                    file: file_name,
                    source,
                })
            }
        }
    }
}

async fn read_local_file(path: &Path) -> DriveResult<Bytes> {
    let not_found = || DriveError::LocalFileNotFound {
        path: path.to_path_buf(),
    };

    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => {}
        Ok(_) => return Err(not_found()),
        Err(e) if e.kind() == ErrorKind::NotFound => return Err(not_found()),
        Err(source) => {
            return Err(DriveError::LocalFileRead {
                path: path.to_path_buf(),
                source,
            })
        }
    }

    tokio::fs::read(path)
        .await
        .map(Bytes::from)
        .map_err(|source| DriveError::LocalFileRead {
            path: path.to_path_buf(),
            source,
        })
}

fn metadata_bytes(metadata: &FileMetadata) -> RemoteResult<Bytes> {
    serde_json::to_vec(metadata)
        .map(Bytes::from)
        .map_err(|e| RemoteError::request(format!("Failed to serialize metadata: {}", e)))
}

fn pdf_content_type() -> HeaderValue {
    HeaderValue::from_static("application/pdf")
}

struct MultipartUploadCall<'a> {
    session: &'a Session,
    metadata: &'a FileMetadata,
    content: Bytes,
}

#[async_trait]
impl RemoteOperation for MultipartUploadCall<'_> {
    type Output = DriveFile;

    fn name(&self) -> &str {
        "upload_file"
    }

    async fn invoke(&self) -> RemoteResult<DriveFile> {
        let executor = self.session.executor();
        let url = executor.build_upload_url(
            "files",
            &[("uploadType", "multipart"), ("fields", DRIVE_FILE_FIELDS)],
        )?;

        let body = MultipartBody::new(
            metadata_bytes(self.metadata)?,
            self.content.clone(),
            mime::APPLICATION_PDF.as_ref(),
        );

        executor
            .send_json(
                HttpMethod::Post,
                url,
                Some(RequestBody::Multipart(body)),
                HeaderMap::new(),
            )
            .await
    }
}

struct ResumableUploadCall<'a> {
    session: &'a Session,
    metadata: &'a FileMetadata,
    content: Bytes,
}

impl ResumableUploadCall<'_> {
    async fn start_session(&self) -> RemoteResult<Url> {
        let executor = self.session.executor();
        let url = executor.build_upload_url(
            "files",
            &[("uploadType", "resumable"), ("fields", DRIVE_FILE_FIELDS)],
        )?;

        let mut headers = HeaderMap::new();
        headers.insert("x-upload-content-type", pdf_content_type());
        headers.insert(
            "x-upload-content-length",
            HeaderValue::from(self.content.len() as u64),
        );

        let response = executor
            .send(
                HttpMethod::Post,
                url,
                Some(RequestBody::Bytes(metadata_bytes(self.metadata)?)),
                headers,
            )
            .await?;

        let location = response.header("location").ok_or_else(|| {
            UploadError::InvalidUploadRequest("No Location header in response".to_string())
        })?;

        Url::parse(location).map_err(|e| {
            RemoteError::from(UploadError::InvalidUploadRequest(format!(
                "Invalid upload session URI: {}",
                e
            )))
        })
    }
}

#[async_trait]
impl RemoteOperation for ResumableUploadCall<'_> {
    type Output = DriveFile;

    fn name(&self) -> &str {
        "upload_file"
    }

    async fn invoke(&self) -> RemoteResult<DriveFile> {
        let session_uri = self.start_session().await?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, pdf_content_type());

        self.session
            .executor()
            .send_json(
                HttpMethod::Put,
                session_uri,
                Some(RequestBody::Bytes(self.content.clone())),
                headers,
            )
            .await
            .map_err(|e| match e {
                RemoteError::Network(cause) => {
                    RemoteError::from(UploadError::UploadInterrupted(cause.to_string()))
                }
                other => other,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UploaderConfig;
    use crate::errors::QuotaError;
    use crate::mocks::{bearer_token, MockHttpTransport, RecordingLogger};
    use std::time::Duration;

    fn session(transport: Arc<MockHttpTransport>) -> Session {
        let config = Arc::new(UploaderConfig::builder().build().unwrap());
        Session::new(bearer_token("ya29.test"), config, transport)
    }

    fn service(logger: Arc<RecordingLogger>) -> UploadService {
        UploadService::new(RetryPolicy::new(3, Duration::from_secs(2)), logger)
    }

    fn write_pdf(dir: &tempfile::TempDir, name: &str, len: usize) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut content = b"%PDF-1.4\n".to_vec();
        content.resize(len.max(content.len()), b'x');
        std::fs::write(&path, content).unwrap();
        path
    }

    #[tokio::test]
    async fn test_multipart_upload() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_pdf(&dir, "order-1001.pdf", 64);
        let transport = Arc::new(MockHttpTransport::new());
        transport.enqueue_json_response(
            200,
            r#"{"id":"file-1","name":"order-1001.pdf","mimeType":"application/pdf"}"#,
        );
        let logger = Arc::new(RecordingLogger::new());

        let id = service(logger.clone())
            .upload_file(&session(transport.clone()), &path, "folder-1")
            .await
            .unwrap();

        assert_eq!(id, "file-1");
        transport.verify_request_count(1);
        transport.verify_request(
            0,
            HttpMethod::Post,
            "/upload/drive/v3/files?uploadType=multipart",
        );

        let body = transport.request_body_text(0);
        assert!(body.contains(r#""name":"order-1001.pdf""#));
        assert!(body.contains(r#""mimeType":"application/pdf""#));
        assert!(body.contains(r#""parents":["folder-1"]"#));
        assert!(body.contains("%PDF-1.4"));

        let content_type = transport.get_requests()[0]
            .headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .unwrap();
        assert!(content_type.starts_with("multipart/related; boundary="));
        assert_eq!(logger.count("INFO"), 1);
    }

    #[tokio::test]
    async fn test_missing_file_makes_no_remote_call() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.pdf");
        let transport = Arc::new(MockHttpTransport::new());

        let error = service(Arc::new(RecordingLogger::new()))
            .upload_file(&session(transport.clone()), &path, "folder-1")
            .await
            .unwrap_err();

        assert!(matches!(error, DriveError::LocalFileNotFound { path: ref p } if *p == path));
        assert_eq!(error.step(), "upload_file");
        transport.verify_request_count(0);
    }

    #[tokio::test]
    async fn test_directory_is_not_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(MockHttpTransport::new());

        let error = service(Arc::new(RecordingLogger::new()))
            .upload_file(&session(transport.clone()), dir.path(), "folder-1")
            .await
            .unwrap_err();

        assert!(matches!(error, DriveError::LocalFileNotFound { .. }));
        transport.verify_request_count(0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_upload_is_retried() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_pdf(&dir, "order-3.pdf", 32);
        let transport = Arc::new(MockHttpTransport::new());
        transport.enqueue_json_response(429, r#"{"error":{"code":429,"message":"slow down"}}"#);
        transport.enqueue_json_response(200, r#"{"id":"file-3","name":"order-3.pdf"}"#);
        let logger = Arc::new(RecordingLogger::new());

        let id = service(logger.clone())
            .upload_file(&session(transport.clone()), &path, "folder-3")
            .await
            .unwrap();

        assert_eq!(id, "file-3");
        transport.verify_request_count(2);
        assert_eq!(logger.count("WARN"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_storage_quota_is_retried_until_exhausted() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_pdf(&dir, "order-4.pdf", 32);
        let transport = Arc::new(MockHttpTransport::new());
        for _ in 0..3 {
            transport.enqueue_json_response(
                403,
                r#"{"error":{"code":403,"message":"full",
                    "errors":[{"reason":"storageQuotaExceeded"}]}}"#,
            );
        }
        let logger = Arc::new(RecordingLogger::new());

        let error = service(logger.clone())
            .upload_file(&session(transport.clone()), &path, "folder-4")
            .await
            .unwrap_err();

        assert!(error.is_transient());
        match error {
            DriveError::Upload { file, source } => {
                assert_eq!(file, "order-4.pdf");
                assert!(matches!(
                    source,
                    RemoteError::Quota(QuotaError::StorageQuotaExceeded(_))
                ));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        transport.verify_request_count(3);
        assert_eq!(logger.count("WARN"), 3);
    }

    #[tokio::test]
    async fn test_large_file_uses_resumable_session() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_pdf(&dir, "scan.pdf", MULTIPART_UPLOAD_LIMIT + 1);
        let transport = Arc::new(MockHttpTransport::new());
        transport.enqueue_response_with_headers(
            200,
            &[("location", "https://www.googleapis.com/upload/drive/v3/files?upload_id=xyz")],
            "",
        );
        transport.enqueue_json_response(200, r#"{"id":"file-big","name":"scan.pdf"}"#);

        let id = service(Arc::new(RecordingLogger::new()))
            .upload_file(&session(transport.clone()), &path, "folder-5")
            .await
            .unwrap();

        assert_eq!(id, "file-big");
        transport.verify_request_count(2);
        transport.verify_request(0, HttpMethod::Post, "uploadType=resumable");
        transport.verify_header(0, "x-upload-content-type", "application/pdf");
        transport.verify_header(
            0,
            "x-upload-content-length",
            &(MULTIPART_UPLOAD_LIMIT + 1).to_string(),
        );
        transport.verify_request(1, HttpMethod::Put, "upload_id=xyz");
        transport.verify_header(1, "content-type", "application/pdf");
        assert_eq!(
            transport.get_requests()[1].body.as_ref().unwrap().to_bytes().len(),
            MULTIPART_UPLOAD_LIMIT + 1
        );
    }

    #[tokio::test]
    async fn test_resumable_without_location_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_pdf(&dir, "scan.pdf", MULTIPART_UPLOAD_LIMIT + 1);
        let transport = Arc::new(MockHttpTransport::new());
        transport.enqueue_json_response(200, "{}");

        let error = service(Arc::new(RecordingLogger::new()))
            .upload_file(&session(transport.clone()), &path, "folder-5")
            .await
            .unwrap_err();

        assert!(matches!(
            error,
            DriveError::Upload {
                source: RemoteError::Upload(UploadError::InvalidUploadRequest(_)),
                ..
            }
        ));
        transport.verify_request_count(1);
    }
}
