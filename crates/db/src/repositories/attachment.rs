use sqlx::{Row, SqliteExecutor};

use intranet_core::domain::attachment::{Attachment, AttachmentId};
use intranet_core::domain::document::DocumentId;

use super::document::{decode, parse_timestamp};
use super::RepositoryError;

pub async fn insert(
    db: impl SqliteExecutor<'_>,
    attachment: &Attachment,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO document_files
            (id, document_id, file_name, storage_path, file_size, content_type, uploaded_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&attachment.id.0)
    .bind(&attachment.document_id.0)
    .bind(&attachment.file_name)
    .bind(&attachment.storage_path)
    .bind(attachment.file_size)
    .bind(&attachment.content_type)
    .bind(attachment.uploaded_at.to_rfc3339())
    .execute(db)
    .await?;

    Ok(())
}

/// Looks up an attachment scoped to its owning document; an id that exists
/// under a different document resolves to None.
pub async fn find_for_document(
    db: impl SqliteExecutor<'_>,
    document_id: &DocumentId,
    attachment_id: &AttachmentId,
) -> Result<Option<Attachment>, RepositoryError> {
    let row = sqlx::query(
        "SELECT id, document_id, file_name, storage_path, file_size, content_type, uploaded_at
         FROM document_files WHERE id = ? AND document_id = ?",
    )
    .bind(&attachment_id.0)
    .bind(&document_id.0)
    .fetch_optional(db)
    .await?;

    match row {
        Some(ref row) => Ok(Some(row_to_attachment(row)?)),
        None => Ok(None),
    }
}

pub async fn list_for_document(
    db: impl SqliteExecutor<'_>,
    document_id: &DocumentId,
) -> Result<Vec<Attachment>, RepositoryError> {
    let rows = sqlx::query(
        "SELECT id, document_id, file_name, storage_path, file_size, content_type, uploaded_at
         FROM document_files WHERE document_id = ? ORDER BY uploaded_at ASC",
    )
    .bind(&document_id.0)
    .fetch_all(db)
    .await?;

    rows.iter().map(row_to_attachment).collect()
}

pub async fn delete(
    db: impl SqliteExecutor<'_>,
    attachment_id: &AttachmentId,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query("DELETE FROM document_files WHERE id = ?")
        .bind(&attachment_id.0)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete_for_document(
    db: impl SqliteExecutor<'_>,
    document_id: &DocumentId,
) -> Result<u64, RepositoryError> {
    let result = sqlx::query("DELETE FROM document_files WHERE document_id = ?")
        .bind(&document_id.0)
        .execute(db)
        .await?;
    Ok(result.rows_affected())
}

fn row_to_attachment(row: &sqlx::sqlite::SqliteRow) -> Result<Attachment, RepositoryError> {
    Ok(Attachment {
        id: AttachmentId(row.try_get("id").map_err(decode)?),
        document_id: DocumentId(row.try_get("document_id").map_err(decode)?),
        file_name: row.try_get("file_name").map_err(decode)?,
        storage_path: row.try_get("storage_path").map_err(decode)?,
        file_size: row.try_get("file_size").map_err(decode)?,
        content_type: row.try_get("content_type").map_err(decode)?,
        uploaded_at: parse_timestamp(&row.try_get::<String, _>("uploaded_at").map_err(decode)?)?,
    })
}
