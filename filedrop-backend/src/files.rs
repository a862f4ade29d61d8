use axum::extract::{Multipart, Path, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use filedrop_shared::error::FileError;
use filedrop_shared::file::OCTET_STREAM;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};
use utoipa::ToSchema;

use crate::entity::file;
use crate::ingest::Upload;
use crate::SharedState;

#[derive(Debug)]
pub struct WebError {
    status: StatusCode,
    message: String,
}

impl WebError {
    pub fn new(status: StatusCode, message: String) -> Self {
        WebError { status, message }
    }

    pub fn not_found(message: String) -> Self {
        WebError {
            status: StatusCode::NOT_FOUND,
            message,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

#[derive(Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<FileError> for WebError {
    fn from(err: FileError) -> Self {
        match err {
            FileError::NotFound(message) => WebError::not_found(message),
            FileError::Format(message) => WebError::new(StatusCode::BAD_REQUEST, message),
            FileError::Store(message) => {
                error!("Store error: {}", message);
                WebError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Database error: {}", message),
                )
            }
        }
    }
}

/// Multipart form accepted by [`post_files`]
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct UploadForm {
    /// One or more files, zip archives are expanded
    #[schema(value_type = Vec<String>, format = Binary)]
    files: Vec<Vec<u8>>,
}

/// List every stored file
#[utoipa::path(
    get,
    path = "/",
    tag = "files",
    responses(
        (status = 200, description = "All stored files", body = Vec<file::Model>),
        (status = 500, description = "Store failure", body = ErrorBody)
    )
)]
pub async fn get_files(
    State(state): State<SharedState>,
) -> Result<Json<Vec<file::Model>>, WebError> {
    let files = state.service.list_all().await?;
    debug!("Listed {} files", files.len());
    Ok(Json(files))
}

/// Fetch the content of a file by name
#[utoipa::path(
    get,
    path = "/{file_name}",
    tag = "files",
    params(("file_name" = String, Path, description = "Name of the file")),
    responses(
        (status = 200, description = "Stored bytes of one file with this name"),
        (status = 404, description = "No file has this name", body = ErrorBody)
    )
)]
pub async fn get_file_content(
    State(state): State<SharedState>,
    Path(file_name): Path<String>,
) -> Result<Response, WebError> {
    let content = state.service.get_content(&file_name).await?;
    debug!("Sending {} ({} bytes)", file_name, content.len());
    Ok((StatusCode::OK, [(CONTENT_TYPE, OCTET_STREAM)], content).into_response())
}

/// Fetch a file record by id
#[utoipa::path(
    get,
    path = "/id/{id}",
    tag = "files",
    params(("id" = i64, Path, description = "File id")),
    responses(
        (status = 200, description = "The file", body = file::Model),
        (status = 404, description = "No file has this id", body = ErrorBody)
    )
)]
pub async fn get_file_by_id(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<Json<file::Model>, WebError> {
    Ok(Json(state.service.get_by_id(id).await?))
}

/// Upload files, expanding zip archives into their entries
#[utoipa::path(
    post,
    path = "/",
    tag = "files",
    request_body(
        content = UploadForm,
        content_type = "multipart/form-data",
        description = "Every part carrying a file name is stored",
    ),
    responses(
        (status = 200, description = "The stored files, in upload order", body = Vec<file::Model>),
        (status = 400, description = "Unreadable form or invalid archive", body = ErrorBody),
        (status = 413, description = "Upload too large")
    )
)]
pub async fn post_files(
    State(state): State<SharedState>,
    mut multipart: Multipart,
) -> Result<Json<Vec<file::Model>>, WebError> {
    let mut uploads = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        error!("Failed to read multipart field: {:?}", e);
        WebError::new(
            StatusCode::BAD_REQUEST,
            format!("Failed to read multipart field: {}", e),
        )
    })? {
        let field_name = field.name().unwrap_or("").to_string();

        let Some(file_name) = field.file_name().map(|s| s.to_string()) else {
            debug!("Ignoring multipart field without a file: {}", field_name);
            continue;
        };
        let content_type = field.content_type().map(|s| s.to_string());

        let data = field.bytes().await.map_err(|e| {
            error!("Failed to read file data: {:?}", e);
            WebError::new(
                StatusCode::BAD_REQUEST,
                format!("Failed to read file data: {}", e),
            )
        })?;

        debug!(
            "Received {} from field {} ({:?}, {} bytes)",
            file_name,
            field_name,
            content_type,
            data.len()
        );

        uploads.push(Upload {
            file_name,
            content_type,
            data: data.to_vec(),
        });
    }

    if uploads.is_empty() {
        return Err(WebError::new(
            StatusCode::BAD_REQUEST,
            "No files in upload".to_string(),
        ));
    }

    Ok(Json(state.service.ingest(uploads).await?))
}

/// Delete every file with this name
#[utoipa::path(
    delete,
    path = "/{file_name}",
    tag = "files",
    params(("file_name" = String, Path, description = "Name of the file")),
    responses((status = 204, description = "Deleted, or nothing had this name"))
)]
pub async fn delete_file(
    State(state): State<SharedState>,
    Path(file_name): Path<String>,
) -> Result<StatusCode, WebError> {
    state.service.delete_by_name(&file_name).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Delete a file by id
#[utoipa::path(
    delete,
    path = "/id/{id}",
    tag = "files",
    params(("id" = i64, Path, description = "File id")),
    responses((status = 204, description = "Deleted, or nothing had this id"))
)]
pub async fn delete_file_by_id(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, WebError> {
    state.service.delete_by_id(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Delete every stored file
#[utoipa::path(
    delete,
    path = "/",
    tag = "files",
    responses((status = 204, description = "Everything deleted"))
)]
pub async fn delete_files(State(state): State<SharedState>) -> Result<StatusCode, WebError> {
    state.service.delete_all().await?;
    Ok(StatusCode::NO_CONTENT)
}
