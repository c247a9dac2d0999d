//! Flow-level tests against the recording mock transport.

use integrations_drive_uploader::errors::{
    AuthenticationError, QuotaError, RemoteError, RequestError, ResourceError,
};
use integrations_drive_uploader::mocks::{
    service_account_json, MockHttpTransport, RecordingLogger, TEST_PRIVATE_KEY,
};
use integrations_drive_uploader::transport::HttpMethod;
use integrations_drive_uploader::{
    DriveError, FlowSettings, RetryPolicy, UploadOrchestrator, UploaderConfig,
};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const TOKEN_RESPONSE: &str =
    r#"{"access_token":"ya29.flow","token_type":"Bearer","expires_in":3600}"#;

struct Fixture {
    dir: TempDir,
    transport: Arc<MockHttpTransport>,
    logger: Arc<RecordingLogger>,
    orchestrator: UploadOrchestrator,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("service-account.json"),
            service_account_json(TEST_PRIVATE_KEY, "https://oauth2.googleapis.com/token"),
        )
        .unwrap();

        let transport = Arc::new(MockHttpTransport::new());
        let logger = Arc::new(RecordingLogger::new());
        let config = UploaderConfig::builder()
            .retry(RetryPolicy::new(3, Duration::from_secs(2)))
            .build()
            .unwrap();
        let orchestrator =
            UploadOrchestrator::with_transport(config, transport.clone(), logger.clone()).unwrap();

        Self {
            dir,
            transport,
            logger,
            orchestrator,
        }
    }

    fn credentials(&self) -> PathBuf {
        self.dir.path().join("service-account.json")
    }

    fn document(&self, name: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, b"%PDF-1.4\n1 0 obj << /Type /Catalog >> endobj\n%%EOF").unwrap();
        path
    }

    fn enqueue_repeated(&self, times: usize, status: u16, body: &str) {
        for _ in 0..times {
            self.transport.enqueue_json_response(status, body);
        }
    }

    fn body_json(&self, index: usize) -> Value {
        serde_json::from_str(&self.transport.request_body_text(index)).unwrap()
    }
}

fn folder_response(id: &str, name: &str) -> String {
    json!({
        "id": id,
        "name": name,
        "mimeType": "application/vnd.google-apps.folder",
    })
    .to_string()
}

fn google_error(code: u16, message: &str, reason: &str) -> String {
    json!({
        "error": {
            "code": code,
            "message": message,
            "errors": [{ "reason": reason }],
        }
    })
    .to_string()
}

fn file_response(id: &str, name: &str) -> String {
    json!({ "id": id, "name": name, "mimeType": "application/pdf" }).to_string()
}

#[tokio::test]
async fn test_successful_run_creates_folder_then_uploads() {
    let fx = Fixture::new();
    let document = fx.document("order-42.pdf");
    fx.transport.enqueue_json_response(200, TOKEN_RESPONSE);
    fx.transport
        .enqueue_json_response(200, &folder_response("folder-42", "order-42"));
    fx.transport
        .enqueue_json_response(200, &file_response("file-42", "order-42.pdf"));

    let file_id = fx
        .orchestrator
        .run(fx.credentials(), "order-42", &document, None)
        .await
        .unwrap();

    assert_eq!(file_id, "file-42");
    fx.transport.verify_request_count(3);
    fx.transport
        .verify_request(0, HttpMethod::Post, "https://oauth2.googleapis.com/token");
    fx.transport
        .verify_request(1, HttpMethod::Post, "/drive/v3/files?fields=");
    fx.transport
        .verify_request(2, HttpMethod::Post, "/upload/drive/v3/files?uploadType=multipart");
    fx.transport.verify_header(1, "authorization", "Bearer ya29.flow");
    fx.transport.verify_header(2, "authorization", "Bearer ya29.flow");

    let token_form = fx.transport.request_body_text(0);
    assert!(token_form
        .contains("grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer"));
    assert!(token_form.contains("assertion="));

    let folder = fx.body_json(1);
    assert_eq!(folder["name"], "order-42");
    assert!(folder.get("parents").is_none());

    let upload = fx.transport.request_body_text(2);
    assert!(upload.contains(r#""parents":["folder-42"]"#));
    assert!(upload.contains(r#""name":"order-42.pdf""#));
}

#[tokio::test]
async fn test_order_scenario_with_parent_folder() {
    let fx = Fixture::new();
    let document = fx.document("order-1001.pdf");
    fx.transport.enqueue_json_response(200, TOKEN_RESPONSE);
    fx.transport
        .enqueue_json_response(200, &folder_response("fld-1001", "order-1001"));
    fx.transport
        .enqueue_json_response(200, &file_response("pdf-1001", "order-1001.pdf"));

    let file_id = tokio_test::assert_ok!(
        fx.orchestrator
            .run(fx.credentials(), "order-1001", &document, Some("root-abc"))
            .await
    );

    assert!(!file_id.is_empty());
    let folder = fx.body_json(1);
    assert_eq!(folder["name"], "order-1001");
    assert_eq!(folder["mimeType"], "application/vnd.google-apps.folder");
    assert_eq!(folder["parents"], json!(["root-abc"]));
    assert!(fx
        .transport
        .request_body_text(2)
        .contains(r#""parents":["fld-1001"]"#));
}

#[tokio::test]
async fn test_missing_document_fails_after_folder_creation() {
    let fx = Fixture::new();
    let missing = fx.dir.path().join("order-7.pdf");
    fx.transport.enqueue_json_response(200, TOKEN_RESPONSE);
    fx.transport
        .enqueue_json_response(200, &folder_response("folder-7", "order-7"));

    let error = fx
        .orchestrator
        .run(fx.credentials(), "order-7", &missing, None)
        .await
        .unwrap_err();

    assert!(matches!(error, DriveError::LocalFileNotFound { ref path } if *path == missing));
    assert!(!error.is_transient());
    fx.transport.verify_request_count(2);
}

#[tokio::test(start_paused = true)]
async fn test_folder_failure_skips_upload() {
    let fx = Fixture::new();
    let document = fx.document("order-8.pdf");
    fx.transport.enqueue_json_response(200, TOKEN_RESPONSE);
    fx.enqueue_repeated(3, 400, &google_error(400, "Invalid parent", "invalidParameter"));

    let error = fx
        .orchestrator
        .run(fx.credentials(), "order-8", &document, Some("bogus"))
        .await
        .unwrap_err();

    match error {
        DriveError::FolderCreation { folder, source } => {
            assert_eq!(folder, "order-8");
            assert!(matches!(
                source,
                RemoteError::Request(RequestError::InvalidParameter(_))
            ));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    fx.transport.verify_request_count(4);
}

#[tokio::test]
async fn test_empty_identifier_is_rejected_once() {
    let fx = Fixture::new();
    let document = fx.document("order.pdf");
    fx.transport.enqueue_json_response(200, TOKEN_RESPONSE);

    let error = fx
        .orchestrator
        .run(fx.credentials(), "", &document, None)
        .await
        .unwrap_err();

    assert!(matches!(
        error,
        DriveError::FolderCreation {
            source: RemoteError::Request(RequestError::MissingParameter(_)),
            ..
        }
    ));
    fx.transport.verify_request_count(1);
    assert_eq!(fx.logger.count("WARN"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_transient_folder_failure_is_retried() {
    let fx = Fixture::new();
    let document = fx.document("order-9.pdf");
    fx.transport.enqueue_json_response(200, TOKEN_RESPONSE);
    fx.transport
        .enqueue_json_response(503, r#"{"error":{"code":503,"message":"Backend Error"}}"#);
    fx.transport
        .enqueue_json_response(200, &folder_response("folder-9", "order-9"));
    fx.transport
        .enqueue_json_response(200, &file_response("file-9", "order-9.pdf"));

    let start = tokio::time::Instant::now();
    let file_id = fx
        .orchestrator
        .run(fx.credentials(), "order-9", &document, None)
        .await
        .unwrap();

    assert_eq!(file_id, "file-9");
    fx.transport.verify_request_count(4);
    fx.transport.verify_request(1, HttpMethod::Post, "/drive/v3/files");
    fx.transport.verify_request(2, HttpMethod::Post, "/drive/v3/files");
    assert!(start.elapsed() >= Duration::from_secs(2));
    assert_eq!(fx.logger.count("WARN"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_upload_failure_leaves_folder_in_place() {
    let fx = Fixture::new();
    let document = fx.document("order-10.pdf");
    fx.transport.enqueue_json_response(200, TOKEN_RESPONSE);
    fx.transport
        .enqueue_json_response(200, &folder_response("folder-10", "order-10"));
    fx.enqueue_repeated(3, 403, &google_error(403, "No access", "insufficientPermissions"));

    let error = fx
        .orchestrator
        .run(fx.credentials(), "order-10", &document, None)
        .await
        .unwrap_err();

    assert!(matches!(error, DriveError::Upload { ref file, .. } if file == "order-10.pdf"));
    assert_eq!(error.step(), "upload_file");
    fx.transport.verify_request_count(5);
    fx.transport.verify_request(1, HttpMethod::Post, "/drive/v3/files");
    for index in 2..5 {
        fx.transport
            .verify_request(index, HttpMethod::Post, "/upload/drive/v3/files");
    }
}

#[tokio::test]
async fn test_rejected_credentials_abort_the_flow() {
    let fx = Fixture::new();
    let document = fx.document("order-11.pdf");
    fx.transport.enqueue_json_response(
        400,
        r#"{"error":"invalid_grant","error_description":"Invalid JWT Signature."}"#,
    );

    let error = fx
        .orchestrator
        .run(fx.credentials(), "order-11", &document, None)
        .await
        .unwrap_err();

    match error {
        DriveError::Authentication(AuthenticationError::Rejected { status, message }) => {
            assert_eq!(status, 400);
            assert!(message.contains("invalid_grant"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    fx.transport.verify_request_count(1);
}

#[tokio::test]
async fn test_run_with_settings_uses_configured_parent() {
    let fx = Fixture::new();
    let document = fx.document("order-12.pdf");
    let settings = FlowSettings {
        credentials_path: fx.credentials(),
        parent_folder_id: Some("orders-root".to_string()),
    };
    fx.transport.enqueue_json_response(200, TOKEN_RESPONSE);
    fx.transport
        .enqueue_json_response(200, &folder_response("folder-12", "order-12"));
    fx.transport
        .enqueue_json_response(200, &file_response("file-12", "order-12.pdf"));

    let file_id = fx
        .orchestrator
        .run_with_settings(&settings, "order-12", &document)
        .await
        .unwrap();

    assert_eq!(file_id, "file-12");
    assert_eq!(fx.body_json(1)["parents"], json!(["orders-root"]));
    assert!(fx.logger.count("INFO") >= 3);
}

#[tokio::test(start_paused = true)]
async fn test_storage_quota_on_folder_is_retried_for_every_attempt() {
    let fx = Fixture::new();
    let document = fx.document("order-13.pdf");
    fx.transport.enqueue_json_response(200, TOKEN_RESPONSE);
    fx.enqueue_repeated(3, 403, &google_error(403, "Quota full", "storageQuotaExceeded"));

    let error = fx
        .orchestrator
        .run(fx.credentials(), "order-13", &document, None)
        .await
        .unwrap_err();

    assert!(matches!(
        error,
        DriveError::FolderCreation {
            source: RemoteError::Quota(QuotaError::StorageQuotaExceeded(_)),
            ..
        }
    ));
    assert!(error.is_transient());
    fx.transport.verify_request_count(4);
    assert_eq!(fx.logger.count("WARN"), 3);
}

#[tokio::test(start_paused = true)]
async fn test_missing_parent_is_retried_for_every_attempt() {
    let fx = Fixture::new();
    let document = fx.document("order-14.pdf");
    fx.transport.enqueue_json_response(200, TOKEN_RESPONSE);
    fx.enqueue_repeated(3, 404, &google_error(404, "File not found: gone", "notFound"));

    let start = tokio::time::Instant::now();
    let error = fx
        .orchestrator
        .run(fx.credentials(), "order-14", &document, Some("gone"))
        .await
        .unwrap_err();

    assert!(matches!(
        error,
        DriveError::FolderCreation {
            source: RemoteError::Resource(ResourceError::FileNotFound(_)),
            ..
        }
    ));
    fx.transport.verify_request_count(4);
    assert!(start.elapsed() >= Duration::from_secs(4));
}
