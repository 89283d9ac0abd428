use sqlx::{Row, SqliteExecutor};

use intranet_core::domain::template::{DocumentTemplate, TemplateId};

use super::document::{decode, parse_timestamp};
use super::RepositoryError;

/// Partial template update; only present fields are changed.
#[derive(Clone, Debug, Default)]
pub struct TemplateChanges {
    pub name: Option<String>,
    pub template_type: Option<String>,
    pub template_data: Option<serde_json::Value>,
    pub is_active: Option<bool>,
}

pub async fn insert(
    db: impl SqliteExecutor<'_>,
    template: &DocumentTemplate,
) -> Result<(), RepositoryError> {
    let data = serde_json::to_string(&template.template_data)
        .map_err(|error| RepositoryError::Decode(error.to_string()))?;

    sqlx::query(
        "INSERT INTO document_templates
            (id, name, template_type, template_data, is_active, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&template.id.0)
    .bind(&template.name)
    .bind(&template.template_type)
    .bind(data)
    .bind(template.is_active)
    .bind(template.created_at.to_rfc3339())
    .bind(template.updated_at.to_rfc3339())
    .execute(db)
    .await?;

    Ok(())
}

pub async fn find_by_id(
    db: impl SqliteExecutor<'_>,
    id: &TemplateId,
) -> Result<Option<DocumentTemplate>, RepositoryError> {
    let row = sqlx::query(
        "SELECT id, name, template_type, template_data, is_active, created_at, updated_at
         FROM document_templates WHERE id = ?",
    )
    .bind(&id.0)
    .fetch_optional(db)
    .await?;

    match row {
        Some(ref row) => Ok(Some(row_to_template(row)?)),
        None => Ok(None),
    }
}

pub async fn list_active(
    db: impl SqliteExecutor<'_>,
) -> Result<Vec<DocumentTemplate>, RepositoryError> {
    let rows = sqlx::query(
        "SELECT id, name, template_type, template_data, is_active, created_at, updated_at
         FROM document_templates WHERE is_active = 1 ORDER BY template_type, name",
    )
    .fetch_all(db)
    .await?;

    rows.iter().map(row_to_template).collect()
}

pub async fn list_active_by_type(
    db: impl SqliteExecutor<'_>,
    template_type: &str,
) -> Result<Vec<DocumentTemplate>, RepositoryError> {
    let rows = sqlx::query(
        "SELECT id, name, template_type, template_data, is_active, created_at, updated_at
         FROM document_templates WHERE template_type = ? AND is_active = 1 ORDER BY name",
    )
    .bind(template_type)
    .fetch_all(db)
    .await?;

    rows.iter().map(row_to_template).collect()
}

/// Applies a partial update. Returns false when no row matched the id.
pub async fn update_fields(
    db: impl SqliteExecutor<'_>,
    id: &TemplateId,
    changes: &TemplateChanges,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<bool, RepositoryError> {
    let data = changes
        .template_data
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|error| RepositoryError::Decode(error.to_string()))?;

    let result = sqlx::query(
        "UPDATE document_templates
         SET name = COALESCE(?, name),
             template_type = COALESCE(?, template_type),
             template_data = COALESCE(?, template_data),
             is_active = COALESCE(?, is_active),
             updated_at = ?
         WHERE id = ?",
    )
    .bind(&changes.name)
    .bind(&changes.template_type)
    .bind(data)
    .bind(changes.is_active)
    .bind(now.to_rfc3339())
    .bind(&id.0)
    .execute(db)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Soft delete. Returns false when no row matched the id.
pub async fn deactivate(
    db: impl SqliteExecutor<'_>,
    id: &TemplateId,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<bool, RepositoryError> {
    let result =
        sqlx::query("UPDATE document_templates SET is_active = 0, updated_at = ? WHERE id = ?")
            .bind(now.to_rfc3339())
            .bind(&id.0)
            .execute(db)
            .await?;
    Ok(result.rows_affected() > 0)
}

fn row_to_template(row: &sqlx::sqlite::SqliteRow) -> Result<DocumentTemplate, RepositoryError> {
    let data_raw: String = row.try_get("template_data").map_err(decode)?;
    let template_data = serde_json::from_str(&data_raw)
        .map_err(|error| RepositoryError::Decode(format!("bad template_data: {error}")))?;

    Ok(DocumentTemplate {
        id: TemplateId(row.try_get("id").map_err(decode)?),
        name: row.try_get("name").map_err(decode)?,
        template_type: row.try_get("template_type").map_err(decode)?,
        template_data,
        is_active: row.try_get("is_active").map_err(decode)?,
        created_at: parse_timestamp(&row.try_get::<String, _>("created_at").map_err(decode)?)?,
        updated_at: parse_timestamp(&row.try_get::<String, _>("updated_at").map_err(decode)?)?,
    })
}
