//! End-to-end lifecycle flow against a file-backed database and the real
//! filesystem attachment store.

use std::sync::Arc;

use bytes::Bytes;

use intranet_core::commands::{
    ApproveDocument, AttachFiles, CreateDocument, RejectDocument, UploadFile,
};
use intranet_core::domain::approval::Decision;
use intranet_core::domain::document::DocumentStatus;
use intranet_core::errors::LifecycleError;
use intranet_db::{
    connect_with_settings, migrations, AttachmentStore, FsAttachmentStore, LifecycleOrchestrator,
};

async fn orchestrator(
    dir: &tempfile::TempDir,
) -> (LifecycleOrchestrator, Arc<FsAttachmentStore>) {
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("portal.db").display());
    let pool = connect_with_settings(&url, 4, 30).await.expect("connect");
    migrations::run_pending(&pool).await.expect("migrations");

    let store = Arc::new(FsAttachmentStore::new(dir.path().join("blobs")));
    (LifecycleOrchestrator::new(pool, store.clone()), store)
}

fn report(title: &str) -> CreateDocument {
    CreateDocument {
        title: title.to_string(),
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
        data: Bytes::from_static(b"%PDF-1.7 integration body"),
    }
}

#[tokio::test]
async fn submit_reject_resubmit_approve_with_files() {
    let dir = tempfile::tempdir().expect("temp dir");
    let (orchestrator, store) = orchestrator(&dir).await;

    let doc = orchestrator.create(report("Q3 report")).await.expect("create");
    let attached = orchestrator
        .attach_files(&doc.id, AttachFiles { files: vec![pdf("timesheet.pdf"), pdf("notes.pdf")] })
        .await
        .expect("attach");
    assert_eq!(attached.len(), 2);
    for entry in &attached {
        assert!(store.exists(&entry.storage_path).await.expect("exists"));
    }

    let doc = orchestrator.submit(&doc.id).await.expect("submit");
    assert_eq!(doc.status, DocumentStatus::Pending);
    assert_eq!(doc.attachment_count, 2);

    let doc = orchestrator
        .reject(
            &doc.id,
            RejectDocument { actor_id: Some(5), comment: Some("wrong month".to_string()) },
        )
        .await
        .expect("reject");
    assert_eq!(doc.status, DocumentStatus::Rejected);

    let doc = orchestrator.submit(&doc.id).await.expect("resubmit");
    assert_eq!(doc.status, DocumentStatus::Pending);
    assert_eq!(doc.rejected_by, None);

    let doc = orchestrator
        .approve(&doc.id, ApproveDocument { actor_id: Some(2), comment: Some("ok".to_string()) })
        .await
        .expect("approve");
    assert_eq!(doc.status, DocumentStatus::Approved);
    assert_eq!(doc.approved_by, Some(2));
    assert!(doc.decision_marks_consistent());

    let history = orchestrator.approval_history(&doc.id).await.expect("history");
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].decision, Decision::Rejected);
    assert_eq!(history[1].decision, Decision::Approved);

    // Download round-trips through the filesystem store.
    let (meta, data) = orchestrator
        .open_attachment(&doc.id, &attached[0].id)
        .await
        .expect("open attachment");
    assert_eq!(meta.file_name, "timesheet.pdf");
    assert_eq!(data, Bytes::from_static(b"%PDF-1.7 integration body"));

    // Deleting the document reclaims every blob.
    orchestrator.delete_document(&doc.id).await.expect("delete");
    for entry in &attached {
        assert!(!store.exists(&entry.storage_path).await.expect("exists"));
    }
    assert!(matches!(
        orchestrator.get(&doc.id).await,
        Err(LifecycleError::NotFound { .. })
    ));
}

#[tokio::test]
async fn concurrent_decisions_leave_one_ledger_entry() {
    let dir = tempfile::tempdir().expect("temp dir");
    let (orchestrator, _store) = orchestrator(&dir).await;

    let doc = orchestrator.create(report("Q3 report")).await.expect("create");
    let doc = orchestrator.submit(&doc.id).await.expect("submit");

    let (approved, rejected) = tokio::join!(
        orchestrator.approve(&doc.id, ApproveDocument { actor_id: Some(2), comment: None }),
        orchestrator.reject(
            &doc.id,
            RejectDocument { actor_id: Some(5), comment: Some("not ready".to_string()) },
        ),
    );

    assert_eq!(
        [approved.is_ok(), rejected.is_ok()].iter().filter(|won| **won).count(),
        1,
        "exactly one decision may win"
    );

    let doc = orchestrator.get(&doc.id).await.expect("get");
    assert!(doc.status.is_terminal());
    assert!(doc.decision_marks_consistent());
    assert_eq!(orchestrator.approval_history(&doc.id).await.expect("history").len(), 1);
}
