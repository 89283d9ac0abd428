//! Typed commands for the lifecycle orchestrator.
//!
//! Each operation owns its validation instead of sharing one loosely-shaped
//! request body. Validation here is the business boundary: the HTTP layer may
//! pre-check the same rules for friendlier errors, but the orchestrator always
//! re-validates before touching storage.

use bytes::Bytes;
use chrono::NaiveDate;

use crate::domain::document::DocumentKind;
use crate::errors::LifecycleError;

/// Upper bound for a single uploaded file.
pub const MAX_FILE_SIZE_BYTES: usize = 10 * 1024 * 1024;

/// Upper bound for one attach batch.
pub const MAX_FILES_PER_UPLOAD: usize = 5;

/// Content types accepted for attachments: PDF, the common office document
/// formats, JPEG, and PNG.
pub const ALLOWED_CONTENT_TYPES: [&str; 7] = [
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "image/jpeg",
    "image/png",
];

pub fn content_type_allowed(content_type: &str) -> bool {
    ALLOWED_CONTENT_TYPES.contains(&content_type)
}

#[derive(Clone, Debug, Default)]
pub struct CreateDocument {
    pub title: String,
    pub doc_type: String,
    pub content: Option<String>,
    pub department_id: Option<i64>,
    pub due_date: Option<NaiveDate>,
    pub created_by: Option<i64>,
}

impl CreateDocument {
    pub fn validate(&self) -> Result<(DocumentKind, i64), LifecycleError> {
        if self.title.trim().is_empty() {
            return Err(LifecycleError::Validation("title is required".to_string()));
        }
        let kind = self.doc_type.parse::<DocumentKind>()?;
        let created_by = self
            .created_by
            .ok_or_else(|| LifecycleError::Validation("created_by is required".to_string()))?;
        Ok((kind, created_by))
    }
}

/// Partial update: only fields that are present are changed.
#[derive(Clone, Debug, Default)]
pub struct UpdateDocument {
    pub title: Option<String>,
    pub doc_type: Option<String>,
    pub content: Option<String>,
    pub department_id: Option<i64>,
    pub due_date: Option<NaiveDate>,
}

impl UpdateDocument {
    pub fn validate(&self) -> Result<Option<DocumentKind>, LifecycleError> {
        if let Some(title) = &self.title {
            if title.trim().is_empty() {
                return Err(LifecycleError::Validation("title must not be empty".to_string()));
            }
        }
        match &self.doc_type {
            Some(doc_type) => Ok(Some(doc_type.parse::<DocumentKind>()?)),
            None => Ok(None),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ApproveDocument {
    pub actor_id: Option<i64>,
    pub comment: Option<String>,
}

impl ApproveDocument {
    pub fn validate(&self) -> Result<i64, LifecycleError> {
        self.actor_id
            .ok_or_else(|| LifecycleError::Validation("approver_id is required".to_string()))
    }
}

#[derive(Clone, Debug, Default)]
pub struct RejectDocument {
    pub actor_id: Option<i64>,
    pub comment: Option<String>,
}

impl RejectDocument {
    /// The rejection reason is a business invariant, not a UI nicety:
    /// the orchestrator re-validates it even when the presentation layer
    /// already did.
    pub fn validate(&self) -> Result<(i64, String), LifecycleError> {
        let actor_id = self
            .actor_id
            .ok_or_else(|| LifecycleError::Validation("rejector_id is required".to_string()))?;
        let comment = self.comment.as_deref().map(str::trim).unwrap_or_default();
        if comment.is_empty() {
            return Err(LifecycleError::Validation(
                "a rejection comment is required".to_string(),
            ));
        }
        Ok((actor_id, comment.to_string()))
    }
}

#[derive(Clone, Debug)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: String,
    pub data: Bytes,
}

#[derive(Clone, Debug, Default)]
pub struct AttachFiles {
    pub files: Vec<UploadFile>,
}

impl AttachFiles {
    pub fn validate(&self) -> Result<(), LifecycleError> {
        if self.files.is_empty() {
            return Err(LifecycleError::Validation("no files supplied".to_string()));
        }
        if self.files.len() > MAX_FILES_PER_UPLOAD {
            return Err(LifecycleError::Validation(format!(
                "at most {MAX_FILES_PER_UPLOAD} files may be attached per upload"
            )));
        }
        for file in &self.files {
            if file.file_name.trim().is_empty() {
                return Err(LifecycleError::Validation("file name is required".to_string()));
            }
            if file.data.is_empty() {
                return Err(LifecycleError::Validation(format!(
                    "file `{}` is empty",
                    file.file_name
                )));
            }
            if file.data.len() > MAX_FILE_SIZE_BYTES {
                return Err(LifecycleError::Validation(format!(
                    "file `{}` exceeds the {} MiB limit",
                    file.file_name,
                    MAX_FILE_SIZE_BYTES / (1024 * 1024)
                )));
            }
            if !content_type_allowed(&file.content_type) {
                return Err(LifecycleError::Validation(format!(
                    "content type `{}` is not allowed",
                    file.content_type
                )));
            }
        }
        Ok(())
    }
}
