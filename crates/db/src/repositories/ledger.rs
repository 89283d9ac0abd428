//! Append-only audit trail of approve/reject decisions.
//!
//! Entries are only ever inserted, always inside the same transaction as the
//! status change they describe. The single exception to immutability is the
//! cascade that removes a document and everything it owns.

use sqlx::{Row, SqliteExecutor};

use intranet_core::domain::approval::{ApprovalRecord, ApprovalRecordId, Decision};
use intranet_core::domain::document::DocumentId;

use super::document::{decode, parse_timestamp};
use super::RepositoryError;

pub async fn record(
    db: impl SqliteExecutor<'_>,
    entry: &ApprovalRecord,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO approval_records (id, document_id, actor_id, decision, comment, decided_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&entry.id.0)
    .bind(&entry.document_id.0)
    .bind(entry.actor_id)
    .bind(entry.decision.as_str())
    .bind(&entry.comment)
    .bind(entry.decided_at.to_rfc3339())
    .execute(db)
    .await?;

    Ok(())
}

pub async fn list_for_document(
    db: impl SqliteExecutor<'_>,
    document_id: &DocumentId,
) -> Result<Vec<ApprovalRecord>, RepositoryError> {
    let rows = sqlx::query(
        "SELECT id, document_id, actor_id, decision, comment, decided_at
         FROM approval_records WHERE document_id = ? ORDER BY decided_at ASC",
    )
    .bind(&document_id.0)
    .fetch_all(db)
    .await?;

    rows.iter()
        .map(|row| {
            let decision_raw: String = row.try_get("decision").map_err(decode)?;
            Ok(ApprovalRecord {
                id: ApprovalRecordId(row.try_get("id").map_err(decode)?),
                document_id: DocumentId(row.try_get("document_id").map_err(decode)?),
                actor_id: row.try_get("actor_id").map_err(decode)?,
                decision: Decision::parse(&decision_raw).ok_or_else(|| {
                    RepositoryError::Decode(format!("unknown decision `{decision_raw}`"))
                })?,
                comment: row.try_get("comment").map_err(decode)?,
                decided_at: parse_timestamp(
                    &row.try_get::<String, _>("decided_at").map_err(decode)?,
                )?,
            })
        })
        .collect()
}

pub async fn delete_for_document(
    db: impl SqliteExecutor<'_>,
    document_id: &DocumentId,
) -> Result<u64, RepositoryError> {
    let result = sqlx::query("DELETE FROM approval_records WHERE document_id = ?")
        .bind(&document_id.0)
        .execute(db)
        .await?;
    Ok(result.rows_affected())
}
