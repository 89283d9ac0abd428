use thiserror::Error;

/// Error taxonomy for every document lifecycle operation.
///
/// Classification drives both the compensation behavior at the orchestrator
/// boundary and the transport status the HTTP layer maps each failure to.
/// None of these are retried implicitly; a retried approve or reject could
/// double-record a ledger entry.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LifecycleError {
    /// Caller-supplied input violates a precondition.
    #[error("validation failed: {0}")]
    Validation(String),
    /// The referenced entity does not exist or is not owned by the stated parent.
    #[error("{entity} `{id}` not found")]
    NotFound { entity: &'static str, id: String },
    /// The document's current state does not match the operation's precondition.
    #[error("document `{id}` is not in the expected state: {detail}")]
    Conflict { id: String, detail: String },
    /// Backing storage failed; compensation has already run (or been
    /// abandoned with a logged orphan) by the time this surfaces.
    #[error("storage failure: {0}")]
    Storage(String),
}

impl LifecycleError {
    pub fn document_not_found(id: impl Into<String>) -> Self {
        Self::NotFound { entity: "document", id: id.into() }
    }

    pub fn attachment_not_found(id: impl Into<String>) -> Self {
        Self::NotFound { entity: "attachment", id: id.into() }
    }

    pub fn template_not_found(id: impl Into<String>) -> Self {
        Self::NotFound { entity: "template", id: id.into() }
    }
}
