//! Document template routes: plain CRUD with a soft-delete flag.
//!
//! - `GET    /api/document-templates`                 — list active templates
//! - `GET    /api/document-templates/type/{type}`     — list active templates for one type
//! - `GET    /api/document-templates/{id}`            — fetch one active template
//! - `POST   /api/document-templates`                 — create
//! - `PUT    /api/document-templates/{id}`            — partial update
//! - `DELETE /api/document-templates/{id}`            — deactivate

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::error;
use uuid::Uuid;

use intranet_core::domain::template::{DocumentTemplate, TemplateId};
use intranet_db::repositories::template;
use intranet_db::{DbPool, RepositoryError, TemplateChanges};

use crate::documents::{ApiError, ApiResult, MessageResponse};

#[derive(Clone)]
pub struct TemplatesState {
    pub db_pool: DbPool,
}

#[derive(Debug, Deserialize)]
pub struct CreateTemplateRequest {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub template_type: Option<String>,
    pub template_data: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTemplateRequest {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub template_type: Option<String>,
    pub template_data: Option<serde_json::Value>,
    pub is_active: Option<bool>,
}

pub fn router(db_pool: DbPool) -> Router {
    Router::new()
        .route("/api/document-templates", get(list_templates).post(create_template))
        .route("/api/document-templates/type/{template_type}", get(list_templates_by_type))
        .route(
            "/api/document-templates/{id}",
            get(get_template).put(update_template).delete(deactivate_template),
        )
        .with_state(TemplatesState { db_pool })
}

async fn list_templates(
    State(state): State<TemplatesState>,
) -> ApiResult<Json<Vec<DocumentTemplate>>> {
    let templates = template::list_active(&state.db_pool).await.map_err(db_error)?;
    Ok(Json(templates))
}

async fn list_templates_by_type(
    Path(template_type): Path<String>,
    State(state): State<TemplatesState>,
) -> ApiResult<Json<Vec<DocumentTemplate>>> {
    let templates = template::list_active_by_type(&state.db_pool, &template_type)
        .await
        .map_err(db_error)?;
    Ok(Json(templates))
}

async fn get_template(
    Path(id): Path<String>,
    State(state): State<TemplatesState>,
) -> ApiResult<Json<DocumentTemplate>> {
    let found = template::find_by_id(&state.db_pool, &TemplateId(id.clone()))
        .await
        .map_err(db_error)?
        .filter(|found| found.is_active);

    match found {
        Some(found) => Ok(Json(found)),
        None => Err(not_found(&id)),
    }
}

async fn create_template(
    State(state): State<TemplatesState>,
    Json(body): Json<CreateTemplateRequest>,
) -> ApiResult<(StatusCode, Json<DocumentTemplate>)> {
    let (name, template_type, template_data) = match (
        body.name.filter(|name| !name.trim().is_empty()),
        body.template_type.filter(|template_type| !template_type.trim().is_empty()),
        body.template_data,
    ) {
        (Some(name), Some(template_type), Some(template_data)) => {
            (name, template_type, template_data)
        }
        _ => {
            return Err((
                StatusCode::BAD_REQUEST,
                Json(ApiError {
                    error: "name, type, and template_data are required".to_string(),
                }),
            ))
        }
    };

    let now = Utc::now();
    let created = DocumentTemplate {
        id: TemplateId(format!("TPL-{}", &Uuid::new_v4().simple().to_string()[..12])),
        name,
        template_type,
        template_data,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    template::insert(&state.db_pool, &created).await.map_err(db_error)?;

    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_template(
    Path(id): Path<String>,
    State(state): State<TemplatesState>,
    Json(body): Json<UpdateTemplateRequest>,
) -> ApiResult<Json<DocumentTemplate>> {
    let template_id = TemplateId(id.clone());
    let changes = TemplateChanges {
        name: body.name,
        template_type: body.template_type,
        template_data: body.template_data,
        is_active: body.is_active,
    };

    let changed = template::update_fields(&state.db_pool, &template_id, &changes, Utc::now())
        .await
        .map_err(db_error)?;
    if !changed {
        return Err(not_found(&id));
    }

    let found = template::find_by_id(&state.db_pool, &template_id)
        .await
        .map_err(db_error)?
        .ok_or_else(|| not_found(&id))?;
    Ok(Json(found))
}

async fn deactivate_template(
    Path(id): Path<String>,
    State(state): State<TemplatesState>,
) -> ApiResult<Json<MessageResponse>> {
    let removed = template::deactivate(&state.db_pool, &TemplateId(id.clone()), Utc::now())
        .await
        .map_err(db_error)?;
    if !removed {
        return Err(not_found(&id));
    }

    Ok(Json(MessageResponse { message: "template deactivated".to_string() }))
}

fn not_found(id: &str) -> (StatusCode, Json<ApiError>) {
    (StatusCode::NOT_FOUND, Json(ApiError { error: format!("template `{id}` not found") }))
}

fn db_error(error: RepositoryError) -> (StatusCode, Json<ApiError>) {
    error!(error = %error, "template route database error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiError { error: "an internal error occurred".to_string() }),
    )
}
