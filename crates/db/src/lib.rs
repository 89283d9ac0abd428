pub mod attachment_store;
pub mod connection;
pub mod lifecycle;
pub mod migrations;
pub mod repositories;

pub use attachment_store::{
    AttachmentStore, FsAttachmentStore, InMemoryAttachmentStore, StoreError,
};
pub use connection::{connect, connect_with_settings, DbPool};
pub use lifecycle::LifecycleOrchestrator;
pub use repositories::template::TemplateChanges;
pub use repositories::{
    DocumentChanges, DocumentSummary, RepositoryError, StatusCount, StatusExtra,
};
