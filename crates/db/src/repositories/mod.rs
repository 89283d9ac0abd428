//! Row-level persistence for documents, attachments, the approval ledger,
//! and document templates.
//!
//! Every function takes a sqlite executor so the orchestrator can run it
//! either directly against the pool or inside an open transaction
//! (`&mut *tx`). Multi-statement atomicity is owned by the caller; these
//! functions never begin or commit transactions themselves.

use thiserror::Error;

use intranet_core::errors::LifecycleError;

pub mod attachment;
pub mod document;
pub mod ledger;
pub mod template;

pub use document::{DocumentChanges, DocumentSummary, StatusCount, StatusExtra};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for LifecycleError {
    fn from(value: RepositoryError) -> Self {
        LifecycleError::Storage(value.to_string())
    }
}
