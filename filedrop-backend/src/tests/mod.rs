use crate::archive::testzip::ZipBuilder;
use crate::entity::file;
use crate::{build_app, handle_error, AppState};
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum_test::multipart::{MultipartForm, Part};
use axum_test::*;
use filedrop_shared::file::OCTET_STREAM;
use rand::Rng;
use std::sync::{Arc, Once};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

static INIT: Once = Once::new();

fn setup_test_server() -> TestServer {
    INIT.call_once(|| {
        let _ = tracing_subscriber::registry()
            .with(tracing_subscriber::EnvFilter::new(
                "filedrop_backend=debug,tower_http=debug",
            ))
            .with(tracing_subscriber::fmt::layer())
            .try_init();
    });
    let shared_state = Arc::new(AppState::test());
    let app: axum::Router = build_app(&shared_state, &["*".to_string()]);

    let config = TestServerConfig {
        expect_success_by_default: true,
        restrict_requests_with_http_schema: false,
        default_content_type: None,
        default_scheme: Some("http".into()),
        ..Default::default()
    };

    TestServer::new_with_config(app, config).unwrap()
}

fn file_part(name: &str, mime_type: &str, content: &[u8]) -> Part {
    Part::bytes(content.to_vec())
        .file_name(name.to_string())
        .mime_type(mime_type.to_string())
}

#[tokio::test]
async fn test_failing_setup_server() {
    let suffix: u64 = rand::rng().random();
    // parent directory does not exist, and start_db does not create it
    crate::storage::start_db(Some(
        &format!("/filedrop-missing-{suffix:x}/nested/files.sqlite3").into(),
    ))
    .await
    .expect_err("Should fail to open DB");
}

#[tokio::test]
async fn test_handle_error() {
    let err = tower::timeout::error::Elapsed::new();
    let res = handle_error(Box::new(err)).await.into_response();
    assert_eq!(res.status(), StatusCode::REQUEST_TIMEOUT);

    let err = tower::load_shed::error::Overloaded::new();
    let res = handle_error(Box::new(err)).await.into_response();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);

    let err = std::io::Error::other("boom");
    let res = handle_error(Box::new(err)).await.into_response();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_api_list_before_any_upload() {
    let server = setup_test_server();

    let res = server.get("/").await;
    res.assert_status_ok();
    assert!(res.json::<Vec<file::Model>>().is_empty());
    assert_eq!(
        res.header(CACHE_CONTROL).to_str().unwrap(),
        "private, no-transform, max-age=0"
    );
}

#[tokio::test]
async fn test_api_report_round_trip() {
    let server = setup_test_server();

    let form = MultipartForm::new().add_part("files", file_part("report.txt", "text/plain", b"hello"));
    let res = server.post("/").multipart(form).await;
    res.assert_status_ok();
    let uploaded: Vec<file::Model> = res.json();
    assert_eq!(uploaded.len(), 1);
    assert_eq!(uploaded[0].file_name, "report.txt");

    let res = server.get("/").await;
    let files: Vec<file::Model> = res.json();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].size, 5);
    assert_eq!(files[0].mime_type.as_deref(), Some("text/plain"));
    assert_eq!(files[0].content.as_deref(), Some(&b"hello"[..]));

    let res = server.get("/report.txt").await;
    res.assert_status_ok();
    assert_eq!(res.as_bytes().as_ref(), b"hello");
    let content_type = res.header(CONTENT_TYPE);
    assert_eq!(content_type.to_str().unwrap(), OCTET_STREAM);

    let res = server.delete("/report.txt").await;
    res.assert_status(StatusCode::NO_CONTENT);

    let res = server.get("/report.txt").expect_failure().await;
    assert_eq!(res.status_code(), 404);
    assert!(res.text().contains("error"));
}

#[tokio::test]
async fn test_api_upload_zip() {
    let server = setup_test_server();

    let zip = ZipBuilder::new()
        .stored("docs/a.txt", b"a")
        .directory("docs/sub/")
        .deflated("docs/sub/b.txt", b"bbbbbbbbbbbbbbbb")
        .finish();

    let form = MultipartForm::new().add_part("files", file_part("docs.zip", "application/zip", &zip));
    info!("uploading zip of {} bytes", zip.len());
    let res = server.post("/").multipart(form).await;
    res.assert_status_ok();

    let uploaded: Vec<file::Model> = res.json();
    assert_eq!(uploaded.len(), 2);
    assert_eq!(uploaded[0].file_name, "a.txt");
    assert_eq!(uploaded[0].path.as_deref(), Some("docs/a.txt"));
    assert_eq!(uploaded[1].file_name, "b.txt");
    assert_eq!(uploaded[1].path.as_deref(), Some("docs/sub/b.txt"));
    assert_eq!(uploaded[1].size, 16);
    for record in &uploaded {
        assert_eq!(record.mime_type.as_deref(), Some(OCTET_STREAM));
    }

    // archive entries are stored base64 encoded
    let res = server.get("/a.txt").await;
    assert_eq!(res.as_bytes().as_ref(), b"YQ==");
}

#[tokio::test]
async fn test_api_upload_several_files() {
    let server = setup_test_server();

    let zip = ZipBuilder::new().stored("inner.txt", b"inner").finish();
    let form = MultipartForm::new()
        .add_text("comment", "not a file")
        .add_part("files", file_part("one.txt", "text/plain", b"1"))
        .add_part("files", file_part("bundle.zip", "application/zip", &zip))
        .add_part("files", file_part("two.bin", "application/octet-stream", b"22"));

    let res = server.post("/").multipart(form).await;
    res.assert_status_ok();
    let names: Vec<String> = res
        .json::<Vec<file::Model>>()
        .into_iter()
        .map(|f| f.file_name)
        .collect();
    assert_eq!(names, vec!["one.txt", "inner.txt", "two.bin"]);

    let res = server.get("/").await;
    assert_eq!(res.json::<Vec<file::Model>>().len(), 3);
}

#[tokio::test]
async fn test_api_upload_invalid_zip() {
    let server = setup_test_server();

    let form = MultipartForm::new()
        .add_part("files", file_part("ok.txt", "text/plain", b"ok"))
        .add_part("files", file_part("broken.zip", "application/zip", b"PK but not really"));
    let res = server.post("/").multipart(form).expect_failure().await;
    assert_eq!(res.status_code(), 400);

    // uploads before the broken archive are kept
    let res = server.get("/").await;
    let files: Vec<file::Model> = res.json();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].file_name, "ok.txt");
}

#[tokio::test]
async fn test_api_upload_without_files() {
    let server = setup_test_server();

    let form = MultipartForm::new().add_text("comment", "nothing attached");
    let res = server.post("/").multipart(form).expect_failure().await;
    assert_eq!(res.status_code(), 400);
}

#[tokio::test]
async fn test_api_delete_missing_name() {
    let server = setup_test_server();

    let res = server.delete("/does-not-exist.txt").await;
    res.assert_status(StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_api_get_and_delete_by_id() {
    let server = setup_test_server();

    let form = MultipartForm::new().add_part("files", file_part("a.txt", "text/plain", b"a"));
    let uploaded: Vec<file::Model> = server.post("/").multipart(form).await.json();
    let id = uploaded[0].id;

    let res = server.get(&format!("/id/{}", id)).await;
    res.assert_status_ok();
    assert_eq!(res.json::<file::Model>(), uploaded[0]);

    server
        .delete(&format!("/id/{}", id))
        .await
        .assert_status(StatusCode::NO_CONTENT);

    let res = server.get(&format!("/id/{}", id)).expect_failure().await;
    assert_eq!(res.status_code(), 404);

    let res = server.get("/id/not-a-number").expect_failure().await;
    assert_eq!(res.status_code(), 400);
}

#[tokio::test]
async fn test_api_delete_all() {
    let server = setup_test_server();

    let form = MultipartForm::new()
        .add_part("files", file_part("a.txt", "text/plain", b"a"))
        .add_part("files", file_part("b.txt", "text/plain", b"b"));
    server.post("/").multipart(form).await.assert_status_ok();

    server.delete("/").await.assert_status(StatusCode::NO_CONTENT);
    assert!(server.get("/").await.json::<Vec<file::Model>>().is_empty());
}

#[tokio::test]
async fn test_api_openapi_doc() {
    let server = setup_test_server();

    let res = server.get("/api/v1/openapi.json").await;
    res.assert_status_ok();
    let doc: serde_json::Value = res.json();
    assert!(doc["paths"].get("/{file_name}").is_some());
    assert!(doc["paths"].get("/id/{id}").is_some());
}
