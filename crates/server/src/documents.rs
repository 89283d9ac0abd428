//! Document lifecycle routes.
//!
//! Endpoints (all JSON unless noted):
//! - `GET    /api/documents`                        — list documents, newest first
//! - `GET    /api/documents/status-count`           — counts per lifecycle status
//! - `POST   /api/documents`                        — create a draft
//! - `GET    /api/documents/{id}`                   — fetch one document
//! - `PUT    /api/documents/{id}`                   — partial update (draft/rejected only)
//! - `DELETE /api/documents/{id}`                   — delete document, files, and ledger
//! - `POST   /api/documents/{id}/submit`            — draft/rejected -> pending
//! - `POST   /api/documents/{id}/approve`           — pending -> approved
//! - `POST   /api/documents/{id}/reject`            — pending -> rejected (comment required)
//! - `GET    /api/documents/{id}/approvals`         — approval ledger for one document
//! - `POST   /api/documents/{id}/files`             — multipart upload, at most 5 files
//! - `GET    /api/documents/{id}/files`             — list attachments
//! - `GET    /api/documents/{id}/files/{file_id}`   — download bytes
//! - `DELETE /api/documents/{id}/files/{file_id}`   — remove one attachment

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::error;

use intranet_core::commands::{
    ApproveDocument, AttachFiles, CreateDocument, RejectDocument, UpdateDocument, UploadFile,
    MAX_FILES_PER_UPLOAD, MAX_FILE_SIZE_BYTES,
};
use intranet_core::domain::attachment::{Attachment, AttachmentId};
use intranet_core::domain::document::{Document, DocumentId};
use intranet_core::errors::LifecycleError;
use intranet_db::LifecycleOrchestrator;

#[derive(Clone)]
pub struct DocumentsState {
    pub orchestrator: Arc<LifecycleOrchestrator>,
}

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateDocumentRequest {
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub doc_type: Option<String>,
    pub content: Option<String>,
    pub department_id: Option<i64>,
    pub due_date: Option<NaiveDate>,
    pub created_by: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateDocumentRequest {
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub doc_type: Option<String>,
    pub content: Option<String>,
    pub department_id: Option<i64>,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct ApproveRequest {
    pub approver_id: Option<i64>,
    pub comments: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    pub rejector_id: Option<i64>,
    pub comments: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
}

pub(crate) type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn router(orchestrator: Arc<LifecycleOrchestrator>) -> Router {
    // Body limit sized for a full upload batch, with room for multipart
    // framing.
    let upload_limit = MAX_FILES_PER_UPLOAD * MAX_FILE_SIZE_BYTES + 64 * 1024;

    Router::new()
        .route("/api/documents", get(list_documents).post(create_document))
        .route("/api/documents/status-count", get(status_counts))
        .route(
            "/api/documents/{id}",
            get(get_document).put(update_document).delete(delete_document),
        )
        .route("/api/documents/{id}/submit", post(submit_document))
        .route("/api/documents/{id}/approve", post(approve_document))
        .route("/api/documents/{id}/reject", post(reject_document))
        .route("/api/documents/{id}/approvals", get(list_approvals))
        .route(
            "/api/documents/{id}/files",
            get(list_files).post(upload_files).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route(
            "/api/documents/{id}/files/{file_id}",
            get(download_file).delete(delete_file),
        )
        .with_state(DocumentsState { orchestrator })
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn list_documents(
    State(state): State<DocumentsState>,
) -> ApiResult<Json<Vec<intranet_db::DocumentSummary>>> {
    let documents = state.orchestrator.list().await.map_err(into_response)?;
    Ok(Json(documents))
}

async fn status_counts(
    State(state): State<DocumentsState>,
) -> ApiResult<Json<Vec<intranet_db::StatusCount>>> {
    let counts = state.orchestrator.status_counts().await.map_err(into_response)?;
    Ok(Json(counts))
}

async fn create_document(
    State(state): State<DocumentsState>,
    Json(body): Json<CreateDocumentRequest>,
) -> ApiResult<(StatusCode, Json<Document>)> {
    let command = CreateDocument {
        title: body.title.unwrap_or_default(),
        doc_type: body.doc_type.unwrap_or_default(),
        content: body.content,
        department_id: body.department_id,
        due_date: body.due_date,
        created_by: body.created_by,
    };
    let document = state.orchestrator.create(command).await.map_err(into_response)?;
    Ok((StatusCode::CREATED, Json(document)))
}

async fn get_document(
    Path(id): Path<String>,
    State(state): State<DocumentsState>,
) -> ApiResult<Json<Document>> {
    let document = state.orchestrator.get(&DocumentId(id)).await.map_err(into_response)?;
    Ok(Json(document))
}

async fn update_document(
    Path(id): Path<String>,
    State(state): State<DocumentsState>,
    Json(body): Json<UpdateDocumentRequest>,
) -> ApiResult<Json<Document>> {
    let command = UpdateDocument {
        title: body.title,
        doc_type: body.doc_type,
        content: body.content,
        department_id: body.department_id,
        due_date: body.due_date,
    };
    let document =
        state.orchestrator.update(&DocumentId(id), command).await.map_err(into_response)?;
    Ok(Json(document))
}

async fn delete_document(
    Path(id): Path<String>,
    State(state): State<DocumentsState>,
) -> ApiResult<Json<MessageResponse>> {
    state.orchestrator.delete_document(&DocumentId(id)).await.map_err(into_response)?;
    Ok(Json(MessageResponse { message: "document deleted".to_string() }))
}

async fn submit_document(
    Path(id): Path<String>,
    State(state): State<DocumentsState>,
) -> ApiResult<Json<Document>> {
    let document = state.orchestrator.submit(&DocumentId(id)).await.map_err(into_response)?;
    Ok(Json(document))
}

async fn approve_document(
    Path(id): Path<String>,
    State(state): State<DocumentsState>,
    Json(body): Json<ApproveRequest>,
) -> ApiResult<Json<Document>> {
    let command = ApproveDocument { actor_id: body.approver_id, comment: body.comments };
    let document =
        state.orchestrator.approve(&DocumentId(id), command).await.map_err(into_response)?;
    Ok(Json(document))
}

async fn reject_document(
    Path(id): Path<String>,
    State(state): State<DocumentsState>,
    Json(body): Json<RejectRequest>,
) -> ApiResult<Json<Document>> {
    let command = RejectDocument { actor_id: body.rejector_id, comment: body.comments };
    let document =
        state.orchestrator.reject(&DocumentId(id), command).await.map_err(into_response)?;
    Ok(Json(document))
}

async fn list_approvals(
    Path(id): Path<String>,
    State(state): State<DocumentsState>,
) -> ApiResult<Json<Vec<intranet_core::ApprovalRecord>>> {
    let records =
        state.orchestrator.approval_history(&DocumentId(id)).await.map_err(into_response)?;
    Ok(Json(records))
}

async fn list_files(
    Path(id): Path<String>,
    State(state): State<DocumentsState>,
) -> ApiResult<Json<Vec<Attachment>>> {
    let attachments =
        state.orchestrator.attachments(&DocumentId(id)).await.map_err(into_response)?;
    Ok(Json(attachments))
}

async fn upload_files(
    Path(id): Path<String>,
    State(state): State<DocumentsState>,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<Vec<Attachment>>)> {
    let files = collect_files(multipart).await.map_err(into_response)?;
    let attached = state
        .orchestrator
        .attach_files(&DocumentId(id), AttachFiles { files })
        .await
        .map_err(into_response)?;
    Ok((StatusCode::CREATED, Json(attached)))
}

async fn download_file(
    Path((id, file_id)): Path<(String, String)>,
    State(state): State<DocumentsState>,
) -> ApiResult<impl IntoResponse> {
    let (meta, data) = state
        .orchestrator
        .open_attachment(&DocumentId(id), &AttachmentId(file_id))
        .await
        .map_err(into_response)?;

    let headers = [
        (header::CONTENT_TYPE, meta.content_type.clone()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", meta.file_name),
        ),
    ];
    Ok((headers, data))
}

async fn delete_file(
    Path((id, file_id)): Path<(String, String)>,
    State(state): State<DocumentsState>,
) -> ApiResult<Json<MessageResponse>> {
    state
        .orchestrator
        .remove_file(&DocumentId(id), &AttachmentId(file_id))
        .await
        .map_err(into_response)?;
    Ok(Json(MessageResponse { message: "file deleted".to_string() }))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn collect_files(mut multipart: Multipart) -> Result<Vec<UploadFile>, LifecycleError> {
    let mut files = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(|error| {
        LifecycleError::Validation(format!("malformed multipart body: {error}"))
    })? {
        if field.name() != Some("files") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("upload.bin").to_string();
        let content_type = field.content_type().unwrap_or("application/octet-stream").to_string();
        let data = field.bytes().await.map_err(|error| {
            LifecycleError::Validation(format!("could not read upload `{file_name}`: {error}"))
        })?;
        files.push(UploadFile { file_name, content_type, data });
    }

    Ok(files)
}

pub(crate) fn into_response(error: LifecycleError) -> (StatusCode, Json<ApiError>) {
    let status = match &error {
        LifecycleError::Validation(_) => StatusCode::BAD_REQUEST,
        LifecycleError::NotFound { .. } => StatusCode::NOT_FOUND,
        LifecycleError::Conflict { .. } => StatusCode::CONFLICT,
        LifecycleError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!(error = %error, "document route storage error");
        return (status, Json(ApiError { error: "an internal error occurred".to_string() }));
    }

    (status, Json(ApiError { error: error.to_string() }))
}
