pub mod archive;
pub mod cli;
pub mod entity;
pub mod files;
pub mod ingest;
pub mod logging;
pub mod middleware;
pub mod migration;
pub mod openapi;
pub mod service;
pub mod storage;
#[cfg(test)]
mod tests;

use axum::{
    body::Body,
    error_handling::HandleErrorLayer,
    extract::DefaultBodyLimit,
    http::{header, Response, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use files::{
    delete_file, delete_file_by_id, delete_files, get_file_by_id, get_file_content, get_files,
    post_files,
};
use std::{borrow::Cow, path::PathBuf, sync::Arc, time::Duration};
use tower::{BoxError, ServiceBuilder};
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::error;

use crate::{
    cli::{db_path_default, CliOpts},
    logging::logging_layer,
    service::FileService,
    storage::FileStore,
};

/// Largest accepted upload request
pub const MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub service: FileService,
}

impl AppState {
    /// The store is opened lazily, on the first request that needs it.
    pub fn new(cli: &CliOpts) -> Self {
        let db_path = cli
            .db_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(db_path_default()));
        let store = Arc::new(FileStore::new(Some(db_path)));
        Self {
            service: FileService::new(store).with_archive_content(cli.archive_content),
        }
    }

    #[cfg(test)]
    pub fn test() -> Self {
        Self {
            service: FileService::new(Arc::new(FileStore::in_memory())),
        }
    }
}

pub fn build_app<T>(shared_state: &SharedState, cors_origins: &[String]) -> Router<T> {
    let router = Router::new()
        .route(
            "/",
            get(get_files)
                .post(post_files)
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
                .delete(delete_files),
        )
        .route(
            "/{file_name}",
            get(get_file_content).delete(delete_file),
        )
        .route("/id/{id}", get(get_file_by_id).delete(delete_file_by_id))
        .merge(openapi::api_route());

    router
        // Add middleware to all routes
        .layer(
            ServiceBuilder::new()
                .layer(middleware::corslayer(cors_origins))
                .layer(SetResponseHeaderLayer::overriding(
                    header::CACHE_CONTROL,
                    |response: &Response<Body>| {
                        if response.status() == StatusCode::OK {
                            "private, no-transform, max-age=0".parse().ok()
                        } else {
                            None
                        }
                    },
                ))
                // Handle errors from middleware
                .layer(HandleErrorLayer::new(handle_error))
                .load_shed()
                .concurrency_limit(1024)
                .timeout(REQUEST_TIMEOUT)
                .layer(logging_layer()),
        )
        .with_state(shared_state.clone())
}

async fn handle_error(error: BoxError) -> impl IntoResponse {
    if error.is::<tower::timeout::error::Elapsed>() {
        return (StatusCode::REQUEST_TIMEOUT, Cow::from("request timed out"));
    }

    if error.is::<tower::load_shed::error::Overloaded>() {
        let msg = "service is overloaded, try again later";
        error!("{}", msg);
        return (StatusCode::SERVICE_UNAVAILABLE, Cow::from(msg));
    }

    let msg = format!("Unhandled internal error: {error}");
    error!("{}", msg);
    (StatusCode::INTERNAL_SERVER_ERROR, Cow::from(msg))
}
