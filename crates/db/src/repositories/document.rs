use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Row, SqliteExecutor};

use intranet_core::domain::document::{Document, DocumentId, DocumentKind, DocumentStatus};

use super::RepositoryError;

/// Extra columns written alongside a conditional status change.
#[derive(Clone, Debug)]
pub enum StatusExtra {
    /// Stamp the submission time and clear any previous rejection mark.
    Submitted { at: DateTime<Utc> },
    Approved { by: i64 },
    Rejected { by: i64 },
}

/// Partial field update; only present fields are changed.
#[derive(Clone, Debug, Default)]
pub struct DocumentChanges {
    pub title: Option<String>,
    pub kind: Option<DocumentKind>,
    pub content: Option<String>,
    pub department_id: Option<i64>,
    pub due_date: Option<NaiveDate>,
}

/// Listing projection, newest first.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct DocumentSummary {
    pub id: DocumentId,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: DocumentKind,
    pub status: DocumentStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct StatusCount {
    pub status: DocumentStatus,
    pub count: i64,
}

pub async fn insert(
    db: impl SqliteExecutor<'_>,
    document: &Document,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO documents
            (id, title, doc_type, content, department_id, due_date, created_by,
             status, approved_by, rejected_by, submitted_at, attachment_count,
             created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&document.id.0)
    .bind(&document.title)
    .bind(document.kind.as_str())
    .bind(&document.content)
    .bind(document.department_id)
    .bind(document.due_date.map(|date| date.to_string()))
    .bind(document.created_by)
    .bind(document.status.as_str())
    .bind(document.approved_by)
    .bind(document.rejected_by)
    .bind(document.submitted_at.map(|at| at.to_rfc3339()))
    .bind(document.attachment_count)
    .bind(document.created_at.to_rfc3339())
    .bind(document.updated_at.to_rfc3339())
    .execute(db)
    .await?;

    Ok(())
}

pub async fn find_by_id(
    db: impl SqliteExecutor<'_>,
    id: &DocumentId,
) -> Result<Option<Document>, RepositoryError> {
    let row = sqlx::query(
        "SELECT id, title, doc_type, content, department_id, due_date, created_by,
                status, approved_by, rejected_by, submitted_at, attachment_count,
                created_at, updated_at
         FROM documents WHERE id = ?",
    )
    .bind(&id.0)
    .fetch_optional(db)
    .await?;

    match row {
        Some(ref row) => Ok(Some(row_to_document(row)?)),
        None => Ok(None),
    }
}

pub async fn list(db: impl SqliteExecutor<'_>) -> Result<Vec<DocumentSummary>, RepositoryError> {
    let rows = sqlx::query(
        "SELECT id, title, doc_type, status, created_at
         FROM documents ORDER BY created_at DESC",
    )
    .fetch_all(db)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(DocumentSummary {
                id: DocumentId(row.try_get("id").map_err(decode)?),
                title: row.try_get("title").map_err(decode)?,
                kind: parse_kind(&row.try_get::<String, _>("doc_type").map_err(decode)?)?,
                status: parse_status(&row.try_get::<String, _>("status").map_err(decode)?)?,
                created_at: parse_timestamp(
                    &row.try_get::<String, _>("created_at").map_err(decode)?,
                )?,
            })
        })
        .collect()
}

pub async fn status_counts(
    db: impl SqliteExecutor<'_>,
) -> Result<Vec<StatusCount>, RepositoryError> {
    let rows = sqlx::query(
        "SELECT status, COUNT(*) AS count FROM documents GROUP BY status ORDER BY status",
    )
    .fetch_all(db)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(StatusCount {
                status: parse_status(&row.try_get::<String, _>("status").map_err(decode)?)?,
                count: row.try_get("count").map_err(decode)?,
            })
        })
        .collect()
}

/// Applies a partial update. Returns false when no row matched the id.
pub async fn update_fields(
    db: impl SqliteExecutor<'_>,
    id: &DocumentId,
    changes: &DocumentChanges,
    now: DateTime<Utc>,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        "UPDATE documents
         SET title = COALESCE(?, title),
             doc_type = COALESCE(?, doc_type),
             content = COALESCE(?, content),
             department_id = COALESCE(?, department_id),
             due_date = COALESCE(?, due_date),
             updated_at = ?
         WHERE id = ?",
    )
    .bind(&changes.title)
    .bind(changes.kind.map(|kind| kind.as_str()))
    .bind(&changes.content)
    .bind(changes.department_id)
    .bind(changes.due_date.map(|date| date.to_string()))
    .bind(now.to_rfc3339())
    .bind(&id.0)
    .execute(db)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Conditional status write: applies `to` plus the extra columns only when
/// the current status is one of `from`, in a single atomic statement.
///
/// Returns false when the guard did not match (row absent or concurrent
/// transition won). This is the system's only concurrency-control
/// mechanism; a read-then-write pair here would reintroduce the
/// lost-update race it exists to prevent.
pub async fn set_status(
    db: impl SqliteExecutor<'_>,
    id: &DocumentId,
    from: &[DocumentStatus],
    to: DocumentStatus,
    extra: &StatusExtra,
    now: DateTime<Utc>,
) -> Result<bool, RepositoryError> {
    let guard =
        from.iter().map(|status| format!("'{}'", status.as_str())).collect::<Vec<_>>().join(", ");

    let result = match extra {
        StatusExtra::Submitted { at } => {
            sqlx::query(&format!(
                "UPDATE documents
                 SET status = ?, submitted_at = ?, rejected_by = NULL, updated_at = ?
                 WHERE id = ? AND status IN ({guard})"
            ))
            .bind(to.as_str())
            .bind(at.to_rfc3339())
            .bind(now.to_rfc3339())
            .bind(&id.0)
            .execute(db)
            .await?
        }
        StatusExtra::Approved { by } => {
            sqlx::query(&format!(
                "UPDATE documents
                 SET status = ?, approved_by = ?, updated_at = ?
                 WHERE id = ? AND status IN ({guard})"
            ))
            .bind(to.as_str())
            .bind(by)
            .bind(now.to_rfc3339())
            .bind(&id.0)
            .execute(db)
            .await?
        }
        StatusExtra::Rejected { by } => {
            sqlx::query(&format!(
                "UPDATE documents
                 SET status = ?, rejected_by = ?, updated_at = ?
                 WHERE id = ? AND status IN ({guard})"
            ))
            .bind(to.as_str())
            .bind(by)
            .bind(now.to_rfc3339())
            .bind(&id.0)
            .execute(db)
            .await?
        }
    };

    Ok(result.rows_affected() > 0)
}

pub async fn delete(db: impl SqliteExecutor<'_>, id: &DocumentId) -> Result<bool, RepositoryError> {
    let result = sqlx::query("DELETE FROM documents WHERE id = ?").bind(&id.0).execute(db).await?;
    Ok(result.rows_affected() > 0)
}

/// Recomputes the derived attachment count from the live attachment rows.
/// Always called in the same transaction as an attachment insert or delete;
/// the count is never incremented or decremented independently.
pub async fn recount_attachments(
    db: impl SqliteExecutor<'_>,
    id: &DocumentId,
    now: DateTime<Utc>,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "UPDATE documents
         SET attachment_count =
                 (SELECT COUNT(*) FROM document_files WHERE document_id = documents.id),
             updated_at = ?
         WHERE id = ?",
    )
    .bind(now.to_rfc3339())
    .bind(&id.0)
    .execute(db)
    .await?;

    Ok(())
}

pub(crate) fn row_to_document(row: &sqlx::sqlite::SqliteRow) -> Result<Document, RepositoryError> {
    let due_date: Option<String> = row.try_get("due_date").map_err(decode)?;
    let submitted_at: Option<String> = row.try_get("submitted_at").map_err(decode)?;

    Ok(Document {
        id: DocumentId(row.try_get("id").map_err(decode)?),
        title: row.try_get("title").map_err(decode)?,
        kind: parse_kind(&row.try_get::<String, _>("doc_type").map_err(decode)?)?,
        content: row.try_get("content").map_err(decode)?,
        department_id: row.try_get("department_id").map_err(decode)?,
        due_date: due_date.map(|raw| parse_date(&raw)).transpose()?,
        created_by: row.try_get("created_by").map_err(decode)?,
        status: parse_status(&row.try_get::<String, _>("status").map_err(decode)?)?,
        approved_by: row.try_get("approved_by").map_err(decode)?,
        rejected_by: row.try_get("rejected_by").map_err(decode)?,
        submitted_at: submitted_at.map(|raw| parse_timestamp(&raw)).transpose()?,
        attachment_count: row.try_get("attachment_count").map_err(decode)?,
        created_at: parse_timestamp(&row.try_get::<String, _>("created_at").map_err(decode)?)?,
        updated_at: parse_timestamp(&row.try_get::<String, _>("updated_at").map_err(decode)?)?,
    })
}

pub(crate) fn decode(error: sqlx::Error) -> RepositoryError {
    RepositoryError::Decode(error.to_string())
}

pub(crate) fn parse_status(raw: &str) -> Result<DocumentStatus, RepositoryError> {
    DocumentStatus::parse(raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown document status `{raw}`")))
}

fn parse_kind(raw: &str) -> Result<DocumentKind, RepositoryError> {
    DocumentKind::parse(raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown document type `{raw}`")))
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|error| RepositoryError::Decode(format!("bad timestamp `{raw}`: {error}")))
}

fn parse_date(raw: &str) -> Result<NaiveDate, RepositoryError> {
    raw.parse::<NaiveDate>()
        .map_err(|error| RepositoryError::Decode(format!("bad date `{raw}`: {error}")))
}
