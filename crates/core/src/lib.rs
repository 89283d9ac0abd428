pub mod commands;
pub mod config;
pub mod domain;
pub mod errors;

pub use commands::{
    content_type_allowed, ApproveDocument, AttachFiles, CreateDocument, RejectDocument,
    UpdateDocument, UploadFile, ALLOWED_CONTENT_TYPES, MAX_FILES_PER_UPLOAD, MAX_FILE_SIZE_BYTES,
};
pub use domain::approval::{ApprovalRecord, ApprovalRecordId, Decision};
pub use domain::attachment::{Attachment, AttachmentId};
pub use domain::document::{Document, DocumentId, DocumentKind, DocumentStatus};
pub use domain::template::{DocumentTemplate, TemplateId};
pub use errors::LifecycleError;
