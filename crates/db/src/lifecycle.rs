//! The lifecycle orchestrator.
//!
//! Every multi-step operation (submit, approve, reject, attach, remove,
//! delete) runs its repository and ledger writes inside one transaction and
//! orders non-transactional blob I/O around the commit point. Concurrent
//! transitions against the same document are arbitrated solely by the
//! conditional status write in the document repository: the loser of a race
//! observes a conflict, never a partial state.
//!
//! Failure handling is asymmetric on purpose. A metadata row without bytes
//! is a hard consistency failure, so blobs are written before the
//! transaction and scrubbed if it fails. A blob without a metadata row is a
//! reclaimable leak, so physical deletes happen after commit and merely log
//! when they fail.

use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use intranet_core::commands::{
    ApproveDocument, AttachFiles, CreateDocument, RejectDocument, UpdateDocument,
};
use intranet_core::domain::approval::{ApprovalRecord, ApprovalRecordId, Decision};
use intranet_core::domain::attachment::{Attachment, AttachmentId};
use intranet_core::domain::document::{Document, DocumentId, DocumentStatus};
use intranet_core::errors::LifecycleError;

use crate::attachment_store::{AttachmentStore, StoreError};
use crate::repositories::{
    attachment, document, ledger, DocumentChanges, DocumentSummary, StatusCount, StatusExtra,
};
use crate::DbPool;

pub struct LifecycleOrchestrator {
    pool: DbPool,
    store: Arc<dyn AttachmentStore>,
}

impl LifecycleOrchestrator {
    pub fn new(pool: DbPool, store: Arc<dyn AttachmentStore>) -> Self {
        Self { pool, store }
    }

    pub async fn create(&self, command: CreateDocument) -> Result<Document, LifecycleError> {
        let (kind, created_by) = command.validate()?;
        let now = Utc::now();

        let doc = Document {
            id: DocumentId(short_id("DOC")),
            title: command.title.trim().to_string(),
            kind,
            content: command.content,
            department_id: command.department_id,
            due_date: command.due_date,
            created_by,
            status: DocumentStatus::Draft,
            approved_by: None,
            rejected_by: None,
            submitted_at: None,
            attachment_count: 0,
            created_at: now,
            updated_at: now,
        };
        document::insert(&self.pool, &doc).await?;

        info!(
            event_name = "document.created",
            document_id = %doc.id,
            doc_type = %doc.kind,
            created_by = doc.created_by,
            "document created"
        );
        Ok(doc)
    }

    pub async fn get(&self, id: &DocumentId) -> Result<Document, LifecycleError> {
        document::find_by_id(&self.pool, id)
            .await?
            .ok_or_else(|| LifecycleError::document_not_found(id.0.clone()))
    }

    pub async fn list(&self) -> Result<Vec<DocumentSummary>, LifecycleError> {
        Ok(document::list(&self.pool).await?)
    }

    pub async fn status_counts(&self) -> Result<Vec<StatusCount>, LifecycleError> {
        Ok(document::status_counts(&self.pool).await?)
    }

    pub async fn update(
        &self,
        id: &DocumentId,
        command: UpdateDocument,
    ) -> Result<Document, LifecycleError> {
        let kind = command.validate()?;
        let current = self.get(id).await?;
        if !current.status.allows_edit() {
            return Err(conflict(
                id,
                format!("edits are only permitted while draft or rejected, found `{}`", current.status),
            ));
        }

        let changes = DocumentChanges {
            title: command.title.map(|title| title.trim().to_string()),
            kind,
            content: command.content,
            department_id: command.department_id,
            due_date: command.due_date,
        };
        let changed = document::update_fields(&self.pool, id, &changes, Utc::now()).await?;
        if !changed {
            return Err(LifecycleError::document_not_found(id.0.clone()));
        }

        self.get(id).await
    }

    /// `draft | rejected -> pending`. Resubmitting a rejected document
    /// clears its rejection mark in the same conditional write.
    pub async fn submit(&self, id: &DocumentId) -> Result<Document, LifecycleError> {
        let now = Utc::now();
        let applied = document::set_status(
            &self.pool,
            id,
            &[DocumentStatus::Draft, DocumentStatus::Rejected],
            DocumentStatus::Pending,
            &StatusExtra::Submitted { at: now },
            now,
        )
        .await?;

        if !applied {
            let current = self.get(id).await?;
            return Err(conflict(id, format!("cannot submit from `{}`", current.status)));
        }

        info!(event_name = "document.submitted", document_id = %id, "document submitted");
        self.get(id).await
    }

    /// `pending -> approved`. The status write and the ledger append land
    /// in one transaction; the conditional write decides which of two
    /// concurrent approvers wins.
    pub async fn approve(
        &self,
        id: &DocumentId,
        command: ApproveDocument,
    ) -> Result<Document, LifecycleError> {
        let actor_id = command.validate()?;
        let now = Utc::now();

        let mut tx = self.pool.begin().await.map_err(storage)?;
        let applied = document::set_status(
            &mut *tx,
            id,
            &[DocumentStatus::Pending],
            DocumentStatus::Approved,
            &StatusExtra::Approved { by: actor_id },
            now,
        )
        .await?;

        if !applied {
            tx.rollback().await.map_err(storage)?;
            let current = self.get(id).await?;
            return Err(conflict(id, format!("expected `pending`, found `{}`", current.status)));
        }

        let record = ApprovalRecord {
            id: ApprovalRecordId(short_id("APR")),
            document_id: id.clone(),
            actor_id,
            decision: Decision::Approved,
            comment: normalize_comment(command.comment),
            decided_at: now,
        };
        ledger::record(&mut *tx, &record).await?;
        tx.commit().await.map_err(storage)?;

        info!(
            event_name = "document.approved",
            document_id = %id,
            actor_id,
            "document approved"
        );
        self.get(id).await
    }

    /// `pending -> rejected`. A non-empty comment is a business invariant
    /// and is re-validated here regardless of what the boundary enforced.
    pub async fn reject(
        &self,
        id: &DocumentId,
        command: RejectDocument,
    ) -> Result<Document, LifecycleError> {
        let (actor_id, comment) = command.validate()?;
        let now = Utc::now();

        let mut tx = self.pool.begin().await.map_err(storage)?;
        let applied = document::set_status(
            &mut *tx,
            id,
            &[DocumentStatus::Pending],
            DocumentStatus::Rejected,
            &StatusExtra::Rejected { by: actor_id },
            now,
        )
        .await?;

        if !applied {
            tx.rollback().await.map_err(storage)?;
            let current = self.get(id).await?;
            return Err(conflict(id, format!("expected `pending`, found `{}`", current.status)));
        }

        let record = ApprovalRecord {
            id: ApprovalRecordId(short_id("APR")),
            document_id: id.clone(),
            actor_id,
            decision: Decision::Rejected,
            comment: Some(comment),
            decided_at: now,
        };
        ledger::record(&mut *tx, &record).await?;
        tx.commit().await.map_err(storage)?;

        info!(
            event_name = "document.rejected",
            document_id = %id,
            actor_id,
            "document rejected"
        );
        self.get(id).await
    }

    /// Writes every blob before opening the transaction, then inserts the
    /// metadata rows and recounts atomically. Any failure after a physical
    /// write scrubs the batch's blobs before the error surfaces; a partial
    /// batch is never left attached.
    pub async fn attach_files(
        &self,
        id: &DocumentId,
        command: AttachFiles,
    ) -> Result<Vec<Attachment>, LifecycleError> {
        command.validate()?;
        let current = self.get(id).await?;
        if !current.status.allows_attachments() {
            return Err(conflict(
                id,
                format!("attachments are not permitted once `{}`", current.status),
            ));
        }

        let mut written: Vec<Attachment> = Vec::with_capacity(command.files.len());
        for file in &command.files {
            match self.store.write(&file.data, &file.content_type).await {
                Ok(locator) => written.push(Attachment {
                    id: AttachmentId(short_id("FIL")),
                    document_id: id.clone(),
                    file_name: file.file_name.clone(),
                    storage_path: locator,
                    file_size: file.data.len() as i64,
                    content_type: file.content_type.clone(),
                    uploaded_at: Utc::now(),
                }),
                Err(error) => {
                    self.scrub_blobs(&written).await;
                    return Err(LifecycleError::Storage(format!(
                        "failed to store `{}`: {error}",
                        file.file_name
                    )));
                }
            }
        }

        if let Err(error) = self.persist_attachment_rows(id, &written).await {
            self.scrub_blobs(&written).await;
            return Err(error);
        }

        info!(
            event_name = "document.files_attached",
            document_id = %id,
            count = written.len(),
            "attachments stored"
        );
        Ok(written)
    }

    pub async fn attachments(&self, id: &DocumentId) -> Result<Vec<Attachment>, LifecycleError> {
        self.get(id).await?;
        Ok(attachment::list_for_document(&self.pool, id).await?)
    }

    pub async fn open_attachment(
        &self,
        id: &DocumentId,
        file_id: &AttachmentId,
    ) -> Result<(Attachment, Bytes), LifecycleError> {
        let found = attachment::find_for_document(&self.pool, id, file_id)
            .await?
            .ok_or_else(|| LifecycleError::attachment_not_found(file_id.0.clone()))?;

        let data = self.store.read(&found.storage_path).await.map_err(|error| match error {
            // A metadata row without bytes is a hard consistency failure,
            // not a missing resource.
            StoreError::NotFound(locator) => {
                LifecycleError::Storage(format!("attachment bytes missing at `{locator}`"))
            }
            other => LifecycleError::Storage(other.to_string()),
        })?;

        Ok((found, data))
    }

    /// Deletes the metadata row and recounts in one transaction, then
    /// removes the bytes. The metadata is authoritative: a failed physical
    /// delete still reports success and leaves a logged, reclaimable blob.
    pub async fn remove_file(
        &self,
        id: &DocumentId,
        file_id: &AttachmentId,
    ) -> Result<(), LifecycleError> {
        let found = attachment::find_for_document(&self.pool, id, file_id)
            .await?
            .ok_or_else(|| LifecycleError::attachment_not_found(file_id.0.clone()))?;

        let mut tx = self.pool.begin().await.map_err(storage)?;
        let removed = attachment::delete(&mut *tx, &found.id).await?;
        if !removed {
            tx.rollback().await.map_err(storage)?;
            return Err(LifecycleError::attachment_not_found(file_id.0.clone()));
        }
        document::recount_attachments(&mut *tx, id, Utc::now()).await?;
        tx.commit().await.map_err(storage)?;

        if let Err(error) = self.store.delete(&found.storage_path).await {
            warn!(
                event_name = "attachment.orphaned_blob",
                document_id = %id,
                locator = %found.storage_path,
                error = %error,
                "blob deletion failed after metadata removal; orphan left for cleanup"
            );
        }

        info!(
            event_name = "document.file_removed",
            document_id = %id,
            attachment_id = %file_id,
            "attachment removed"
        );
        Ok(())
    }

    /// Removes the document and everything it owns: blobs first
    /// (best-effort, aggregated), then ledger rows, attachment rows, and
    /// the document row in one transaction.
    pub async fn delete_document(&self, id: &DocumentId) -> Result<(), LifecycleError> {
        self.get(id).await?;
        let attachments = attachment::list_for_document(&self.pool, id).await?;

        let mut orphaned: Vec<String> = Vec::new();
        for entry in &attachments {
            if let Err(error) = self.store.delete(&entry.storage_path).await {
                warn!(
                    event_name = "attachment.blob_delete_failed",
                    document_id = %id,
                    locator = %entry.storage_path,
                    error = %error,
                    "blob deletion failed during document delete"
                );
                orphaned.push(entry.storage_path.clone());
            }
        }
        if !orphaned.is_empty() {
            warn!(
                event_name = "document.blob_cleanup_incomplete",
                document_id = %id,
                orphaned = orphaned.len(),
                "some attachment blobs could not be removed; row deletion proceeds"
            );
        }

        let mut tx = self.pool.begin().await.map_err(storage)?;
        ledger::delete_for_document(&mut *tx, id).await?;
        attachment::delete_for_document(&mut *tx, id).await?;
        let removed = document::delete(&mut *tx, id).await?;
        if !removed {
            tx.rollback().await.map_err(storage)?;
            return Err(LifecycleError::document_not_found(id.0.clone()));
        }
        tx.commit().await.map_err(storage)?;

        info!(event_name = "document.deleted", document_id = %id, "document deleted");
        Ok(())
    }

    pub async fn approval_history(
        &self,
        id: &DocumentId,
    ) -> Result<Vec<ApprovalRecord>, LifecycleError> {
        self.get(id).await?;
        Ok(ledger::list_for_document(&self.pool, id).await?)
    }

    async fn persist_attachment_rows(
        &self,
        id: &DocumentId,
        rows: &[Attachment],
    ) -> Result<(), LifecycleError> {
        let mut tx = self.pool.begin().await.map_err(storage)?;
        for row in rows {
            attachment::insert(&mut *tx, row).await?;
        }
        document::recount_attachments(&mut *tx, id, Utc::now()).await?;
        tx.commit().await.map_err(storage)?;
        Ok(())
    }

    /// Compensation: removes blobs written for a batch whose metadata never
    /// landed.
    async fn scrub_blobs(&self, written: &[Attachment]) {
        for entry in written {
            if let Err(error) = self.store.delete(&entry.storage_path).await {
                warn!(
                    event_name = "attachment.compensation_failed",
                    locator = %entry.storage_path,
                    error = %error,
                    "could not remove blob while compensating a failed attach"
                );
            }
        }
    }
}

fn conflict(id: &DocumentId, detail: String) -> LifecycleError {
    LifecycleError::Conflict { id: id.0.clone(), detail }
}

fn storage(error: sqlx::Error) -> LifecycleError {
    LifecycleError::Storage(error.to_string())
}

fn short_id(prefix: &str) -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("{prefix}-{}", &id[..12])
}

fn normalize_comment(comment: Option<String>) -> Option<String> {
    comment.map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bytes::Bytes;

    use intranet_core::commands::{
        ApproveDocument, AttachFiles, CreateDocument, RejectDocument, UpdateDocument, UploadFile,
    };
    use intranet_core::domain::approval::Decision;
    use intranet_core::domain::document::{DocumentId, DocumentStatus};
    use intranet_core::errors::LifecycleError;

    use super::LifecycleOrchestrator;
    use crate::attachment_store::InMemoryAttachmentStore;
    use crate::repositories::{attachment, ledger};
    use crate::{connect_with_settings, migrations, DbPool};

    async fn memory_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    async fn setup() -> (LifecycleOrchestrator, DbPool, Arc<InMemoryAttachmentStore>) {
        let pool = memory_pool().await;
        let store = Arc::new(InMemoryAttachmentStore::default());
        (LifecycleOrchestrator::new(pool.clone(), store.clone()), pool, store)
    }

    /// File-backed database so concurrent tasks see the same data through
    /// separate pooled connections.
    async fn setup_concurrent(
        dir: &tempfile::TempDir,
    ) -> (LifecycleOrchestrator, DbPool, Arc<InMemoryAttachmentStore>) {
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("portal.db").display());
        let pool = connect_with_settings(&url, 4, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        let store = Arc::new(InMemoryAttachmentStore::default());
        (LifecycleOrchestrator::new(pool.clone(), store.clone()), pool, store)
    }

    fn create_command() -> CreateDocument {
        CreateDocument {
            title: "Q3 report".to_string(),
            doc_type: "attendance_report".to_string(),
            content: Some("hours for September".to_string()),
            created_by: Some(1),
            ..CreateDocument::default()
        }
    }

    fn pdf(name: &str) -> UploadFile {
        UploadFile {
            file_name: name.to_string(),
            content_type: "application/pdf".to_string(),
            data: Bytes::from_static(b"%PDF-1.7 fake body"),
        }
    }

    #[tokio::test]
    async fn full_approval_scenario() {
        let (orchestrator, _pool, _store) = setup().await;

        let doc = orchestrator.create(create_command()).await.expect("create");
        assert_eq!(doc.status, DocumentStatus::Draft);
        assert!(doc.submitted_at.is_none());

        let doc = orchestrator.submit(&doc.id).await.expect("submit");
        assert_eq!(doc.status, DocumentStatus::Pending);
        assert!(doc.submitted_at.is_some());

        let doc = orchestrator
            .approve(&doc.id, ApproveDocument { actor_id: Some(2), comment: Some("ok".into()) })
            .await
            .expect("approve");
        assert_eq!(doc.status, DocumentStatus::Approved);
        assert_eq!(doc.approved_by, Some(2));
        assert!(doc.decision_marks_consistent());

        let records = orchestrator.approval_history(&doc.id).await.expect("history");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].decision, Decision::Approved);
        assert_eq!(records[0].actor_id, 2);
        assert_eq!(records[0].comment.as_deref(), Some("ok"));

        // The document left `pending`; a second decision loses the guard.
        let error = orchestrator
            .approve(&doc.id, ApproveDocument { actor_id: Some(3), comment: None })
            .await
            .expect_err("second approve should conflict");
        assert!(matches!(error, LifecycleError::Conflict { .. }));

        let records = orchestrator.approval_history(&doc.id).await.expect("history");
        assert_eq!(records.len(), 1, "the losing approve must not append a ledger entry");
    }

    #[tokio::test]
    async fn reject_without_comment_changes_nothing() {
        let (orchestrator, _pool, _store) = setup().await;
        let doc = orchestrator.create(create_command()).await.expect("create");
        let doc = orchestrator.submit(&doc.id).await.expect("submit");

        let error = orchestrator
            .reject(&doc.id, RejectDocument { actor_id: Some(5), comment: None })
            .await
            .expect_err("reject without comment");
        assert!(matches!(error, LifecycleError::Validation(_)));

        let doc = orchestrator.get(&doc.id).await.expect("get");
        assert_eq!(doc.status, DocumentStatus::Pending);
        assert!(orchestrator.approval_history(&doc.id).await.expect("history").is_empty());
    }

    #[tokio::test]
    async fn rejected_documents_can_be_edited_and_resubmitted() {
        let (orchestrator, _pool, _store) = setup().await;
        let doc = orchestrator.create(create_command()).await.expect("create");
        let doc = orchestrator.submit(&doc.id).await.expect("submit");

        let doc = orchestrator
            .reject(
                &doc.id,
                RejectDocument { actor_id: Some(5), comment: Some("missing figures".into()) },
            )
            .await
            .expect("reject");
        assert_eq!(doc.status, DocumentStatus::Rejected);
        assert_eq!(doc.rejected_by, Some(5));
        assert!(doc.decision_marks_consistent());

        let doc = orchestrator
            .update(
                &doc.id,
                UpdateDocument {
                    title: Some("Q3 report (rev)".to_string()),
                    ..UpdateDocument::default()
                },
            )
            .await
            .expect("edit after rejection");
        assert_eq!(doc.title, "Q3 report (rev)");

        let doc = orchestrator.submit(&doc.id).await.expect("resubmit");
        assert_eq!(doc.status, DocumentStatus::Pending);
        assert_eq!(doc.rejected_by, None, "resubmission clears the rejection mark");

        let doc = orchestrator
            .approve(&doc.id, ApproveDocument { actor_id: Some(2), comment: None })
            .await
            .expect("approve after resubmit");
        assert_eq!(doc.status, DocumentStatus::Approved);

        let records = orchestrator.approval_history(&doc.id).await.expect("history");
        assert_eq!(records.len(), 2, "one record per decision across the resubmit cycle");
    }

    #[tokio::test]
    async fn edits_are_blocked_while_pending() {
        let (orchestrator, _pool, _store) = setup().await;
        let doc = orchestrator.create(create_command()).await.expect("create");
        let doc = orchestrator.submit(&doc.id).await.expect("submit");

        let error = orchestrator
            .update(
                &doc.id,
                UpdateDocument { title: Some("late edit".to_string()), ..UpdateDocument::default() },
            )
            .await
            .expect_err("pending documents are read-only");
        assert!(matches!(error, LifecycleError::Conflict { .. }));
    }

    #[tokio::test]
    async fn double_submit_yields_exactly_one_conflict() {
        let (orchestrator, _pool, _store) = setup().await;
        let doc = orchestrator.create(create_command()).await.expect("create");

        orchestrator.submit(&doc.id).await.expect("first submit");
        let error = orchestrator.submit(&doc.id).await.expect_err("second submit");
        assert!(matches!(error, LifecycleError::Conflict { .. }));
    }

    #[tokio::test]
    async fn concurrent_submits_have_one_winner() {
        let dir = tempfile::tempdir().expect("temp dir");
        let (orchestrator, _pool, _store) = setup_concurrent(&dir).await;
        let doc = orchestrator.create(create_command()).await.expect("create");

        let (first, second) =
            tokio::join!(orchestrator.submit(&doc.id), orchestrator.submit(&doc.id));

        let successes = [&first, &second].iter().filter(|result| result.is_ok()).count();
        assert_eq!(successes, 1, "exactly one submit may win");
        for result in [first, second] {
            if let Err(error) = result {
                assert!(matches!(error, LifecycleError::Conflict { .. }));
            }
        }

        let doc = orchestrator.get(&doc.id).await.expect("get");
        assert_eq!(doc.status, DocumentStatus::Pending);
    }

    #[tokio::test]
    async fn concurrent_approve_and_reject_record_one_decision() {
        let dir = tempfile::tempdir().expect("temp dir");
        let (orchestrator, pool, _store) = setup_concurrent(&dir).await;
        let doc = orchestrator.create(create_command()).await.expect("create");
        let doc = orchestrator.submit(&doc.id).await.expect("submit");

        let (approved, rejected) = tokio::join!(
            orchestrator.approve(
                &doc.id,
                ApproveDocument { actor_id: Some(2), comment: None },
            ),
            orchestrator.reject(
                &doc.id,
                RejectDocument { actor_id: Some(5), comment: Some("not ready".into()) },
            ),
        );

        let successes =
            [approved.is_ok(), rejected.is_ok()].iter().filter(|won| **won).count();
        assert_eq!(successes, 1, "exactly one decision may win");

        let final_doc = orchestrator.get(&doc.id).await.expect("get");
        assert!(final_doc.status.is_terminal());
        assert!(final_doc.decision_marks_consistent());

        let records = ledger::list_for_document(&pool, &doc.id).await.expect("ledger");
        assert_eq!(records.len(), 1, "the loser must not append a ledger entry");
    }

    #[tokio::test]
    async fn attach_and_remove_keep_the_count_consistent() {
        let (orchestrator, pool, store) = setup().await;
        let doc = orchestrator.create(create_command()).await.expect("create");

        let attached = orchestrator
            .attach_files(&doc.id, AttachFiles { files: vec![pdf("a.pdf"), pdf("b.pdf")] })
            .await
            .expect("attach");
        assert_eq!(attached.len(), 2);

        let doc = orchestrator.get(&doc.id).await.expect("get");
        assert_eq!(doc.attachment_count, 2);
        assert_eq!(store.object_count().await, 2);

        let removed_id = attached[0].id.clone();
        orchestrator.remove_file(&doc.id, &removed_id).await.expect("remove");

        let doc = orchestrator.get(&doc.id).await.expect("get");
        assert_eq!(doc.attachment_count, 1);
        assert_eq!(store.object_count().await, 1);
        assert!(!store.contains(&attached[0].storage_path).await);

        let error = orchestrator
            .open_attachment(&doc.id, &removed_id)
            .await
            .expect_err("removed attachment is gone");
        assert!(matches!(error, LifecycleError::NotFound { .. }));

        let rows = attachment::list_for_document(&pool, &doc.id).await.expect("rows");
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn attachment_download_round_trips() {
        let (orchestrator, _pool, _store) = setup().await;
        let doc = orchestrator.create(create_command()).await.expect("create");

        let attached = orchestrator
            .attach_files(&doc.id, AttachFiles { files: vec![pdf("timesheet.pdf")] })
            .await
            .expect("attach");

        let (meta, data) =
            orchestrator.open_attachment(&doc.id, &attached[0].id).await.expect("open");
        assert_eq!(meta.file_name, "timesheet.pdf");
        assert_eq!(data, Bytes::from_static(b"%PDF-1.7 fake body"));
    }

    #[tokio::test]
    async fn attachment_is_scoped_to_its_document() {
        let (orchestrator, _pool, _store) = setup().await;
        let owner = orchestrator.create(create_command()).await.expect("create owner");
        let other = orchestrator.create(create_command()).await.expect("create other");

        let attached = orchestrator
            .attach_files(&owner.id, AttachFiles { files: vec![pdf("a.pdf")] })
            .await
            .expect("attach");

        let error = orchestrator
            .open_attachment(&other.id, &attached[0].id)
            .await
            .expect_err("attachment does not belong to the stated document");
        assert!(matches!(error, LifecycleError::NotFound { .. }));
    }

    #[tokio::test]
    async fn mid_batch_write_failure_leaves_no_rows_and_no_blobs() {
        let pool = memory_pool().await;
        let store = Arc::new(InMemoryAttachmentStore::failing_after(2));
        let orchestrator = LifecycleOrchestrator::new(pool.clone(), store.clone());
        let doc = orchestrator.create(create_command()).await.expect("create");

        let error = orchestrator
            .attach_files(
                &doc.id,
                AttachFiles { files: vec![pdf("a.pdf"), pdf("b.pdf"), pdf("c.pdf")] },
            )
            .await
            .expect_err("third write fails");
        assert!(matches!(error, LifecycleError::Storage(_)));

        assert_eq!(store.object_count().await, 0, "previously written blobs are scrubbed");
        let rows = attachment::list_for_document(&pool, &doc.id).await.expect("rows");
        assert!(rows.is_empty());

        let doc = orchestrator.get(&doc.id).await.expect("get");
        assert_eq!(doc.attachment_count, 0);
    }

    #[tokio::test]
    async fn failed_metadata_insert_scrubs_written_blobs() {
        let (orchestrator, pool, store) = setup().await;
        let doc = orchestrator.create(create_command()).await.expect("create");

        // Force the metadata insert to fail after the physical write
        // succeeded.
        sqlx::query("DROP TABLE document_files").execute(&pool).await.expect("drop table");

        let error = orchestrator
            .attach_files(&doc.id, AttachFiles { files: vec![pdf("a.pdf")] })
            .await
            .expect_err("metadata insert fails");
        assert!(matches!(error, LifecycleError::Storage(_)));
        assert_eq!(store.object_count().await, 0, "no orphaned bytes may remain");
    }

    #[tokio::test]
    async fn attachments_are_rejected_in_terminal_states() {
        let (orchestrator, _pool, _store) = setup().await;
        let doc = orchestrator.create(create_command()).await.expect("create");
        let doc = orchestrator.submit(&doc.id).await.expect("submit");
        let doc = orchestrator
            .approve(&doc.id, ApproveDocument { actor_id: Some(2), comment: None })
            .await
            .expect("approve");

        let error = orchestrator
            .attach_files(&doc.id, AttachFiles { files: vec![pdf("late.pdf")] })
            .await
            .expect_err("approved documents accept no files");
        assert!(matches!(error, LifecycleError::Conflict { .. }));
    }

    #[tokio::test]
    async fn delete_document_removes_rows_ledger_and_blobs() {
        let (orchestrator, pool, store) = setup().await;
        let doc = orchestrator.create(create_command()).await.expect("create");
        orchestrator
            .attach_files(&doc.id, AttachFiles { files: vec![pdf("a.pdf"), pdf("b.pdf")] })
            .await
            .expect("attach");
        let doc = orchestrator.submit(&doc.id).await.expect("submit");
        orchestrator
            .approve(&doc.id, ApproveDocument { actor_id: Some(2), comment: None })
            .await
            .expect("approve");

        orchestrator.delete_document(&doc.id).await.expect("delete");

        let error = orchestrator.get(&doc.id).await.expect_err("document is gone");
        assert!(matches!(error, LifecycleError::NotFound { .. }));
        assert_eq!(store.object_count().await, 0);

        let rows = attachment::list_for_document(&pool, &doc.id).await.expect("rows");
        assert!(rows.is_empty());
        let records = ledger::list_for_document(&pool, &doc.id).await.expect("ledger");
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn operations_on_missing_documents_return_not_found() {
        let (orchestrator, _pool, _store) = setup().await;
        let missing = DocumentId("DOC-404".to_string());

        assert!(matches!(
            orchestrator.get(&missing).await,
            Err(LifecycleError::NotFound { .. })
        ));
        assert!(matches!(
            orchestrator.submit(&missing).await,
            Err(LifecycleError::NotFound { .. })
        ));
        assert!(matches!(
            orchestrator
                .approve(&missing, ApproveDocument { actor_id: Some(2), comment: None })
                .await,
            Err(LifecycleError::NotFound { .. })
        ));
        assert!(matches!(
            orchestrator.delete_document(&missing).await,
            Err(LifecycleError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn create_validates_required_fields() {
        let (orchestrator, _pool, _store) = setup().await;

        let error = orchestrator
            .create(CreateDocument { title: "untyped".to_string(), ..CreateDocument::default() })
            .await
            .expect_err("missing type and creator");
        assert!(matches!(error, LifecycleError::Validation(_)));

        let error = orchestrator
            .create(CreateDocument {
                title: "bad type".to_string(),
                doc_type: "expense_report".to_string(),
                created_by: Some(1),
                ..CreateDocument::default()
            })
            .await
            .expect_err("type outside the catalog");
        assert!(matches!(error, LifecycleError::Validation(_)));
    }

    #[tokio::test]
    async fn listing_and_status_counts_reflect_lifecycle() {
        let (orchestrator, _pool, _store) = setup().await;

        let first = orchestrator.create(create_command()).await.expect("create first");
        let second = orchestrator.create(create_command()).await.expect("create second");
        orchestrator.submit(&second.id).await.expect("submit second");

        let listed = orchestrator.list().await.expect("list");
        assert_eq!(listed.len(), 2);

        let counts = orchestrator.status_counts().await.expect("counts");
        assert!(counts
            .iter()
            .any(|entry| entry.status == DocumentStatus::Draft && entry.count == 1));
        assert!(counts
            .iter()
            .any(|entry| entry.status == DocumentStatus::Pending && entry.count == 1));

        orchestrator.delete_document(&first.id).await.expect("delete draft");
        let counts = orchestrator.status_counts().await.expect("counts");
        assert!(!counts.iter().any(|entry| entry.status == DocumentStatus::Draft));
    }
}
