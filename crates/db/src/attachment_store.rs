//! Binary storage for attachment content.
//!
//! Pure storage: locators are generated to be collision-free, an existing
//! locator is never overwritten, and nothing here knows about documents.
//! The metadata rows in `document_files` are authoritative; the orchestrator
//! orders calls into this store around its transaction boundaries.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no stored object at `{0}`")]
    NotFound(String),
    #[error("stored object already exists at `{0}`")]
    AlreadyExists(String),
    #[error("attachment store I/O failure: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait AttachmentStore: Send + Sync {
    /// Stores the content and returns an opaque locator for it.
    async fn write(&self, data: &Bytes, content_type: &str) -> Result<String, StoreError>;

    async fn read(&self, locator: &str) -> Result<Bytes, StoreError>;

    /// Idempotent: deleting an already-absent locator is not an error.
    async fn delete(&self, locator: &str) -> Result<(), StoreError>;

    async fn exists(&self, locator: &str) -> Result<bool, StoreError>;
}

fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "application/pdf" => "pdf",
        "application/msword" => "doc",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => "docx",
        "application/vnd.ms-excel" => "xls",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => "xlsx",
        "image/jpeg" => "jpg",
        "image/png" => "png",
        _ => "bin",
    }
}

fn new_locator(content_type: &str) -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("{}/{}.{}", &id[..2], id, extension_for(content_type))
}

/// Filesystem-backed store. Locators are relative paths with a two-level
/// fan-out directory derived from the generated id.
pub struct FsAttachmentStore {
    root: PathBuf,
}

impl FsAttachmentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn full_path(&self, locator: &str) -> PathBuf {
        self.root.join(locator)
    }
}

#[async_trait]
impl AttachmentStore for FsAttachmentStore {
    async fn write(&self, data: &Bytes, content_type: &str) -> Result<String, StoreError> {
        let locator = new_locator(content_type);
        let path = self.full_path(&locator);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        if matches!(fs::metadata(&path).await, Ok(_)) {
            return Err(StoreError::AlreadyExists(locator));
        }

        let mut file = fs::File::create(&path).await?;
        file.write_all(data).await?;
        file.flush().await?;

        debug!(locator = %locator, size = data.len(), "attachment store: wrote object");
        Ok(locator)
    }

    async fn read(&self, locator: &str) -> Result<Bytes, StoreError> {
        let path = self.full_path(locator);
        let data = fs::read(&path).await.map_err(|error| {
            if error.kind() == std::io::ErrorKind::NotFound {
                StoreError::NotFound(locator.to_string())
            } else {
                StoreError::Io(error)
            }
        })?;
        Ok(Bytes::from(data))
    }

    async fn delete(&self, locator: &str) -> Result<(), StoreError> {
        let path = self.full_path(locator);
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(locator = %locator, "attachment store: deleted object");
                Ok(())
            }
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                debug!(locator = %locator, "attachment store: delete of absent object");
                Ok(())
            }
            Err(error) => Err(StoreError::Io(error)),
        }
    }

    async fn exists(&self, locator: &str) -> Result<bool, StoreError> {
        match fs::metadata(self.full_path(locator)).await {
            Ok(_) => Ok(true),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(error) => Err(StoreError::Io(error)),
        }
    }
}

/// In-memory store for tests, with optional write-failure injection for
/// exercising compensation paths.
#[derive(Default)]
pub struct InMemoryAttachmentStore {
    objects: RwLock<HashMap<String, Bytes>>,
    fail_writes_after: Option<usize>,
    writes: AtomicUsize,
}

impl InMemoryAttachmentStore {
    /// The first `successes` writes succeed; every later write fails.
    pub fn failing_after(successes: usize) -> Self {
        Self { fail_writes_after: Some(successes), ..Self::default() }
    }

    pub async fn object_count(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn contains(&self, locator: &str) -> bool {
        self.objects.read().await.contains_key(locator)
    }
}

#[async_trait]
impl AttachmentStore for InMemoryAttachmentStore {
    async fn write(&self, data: &Bytes, content_type: &str) -> Result<String, StoreError> {
        let attempt = self.writes.fetch_add(1, Ordering::SeqCst);
        if let Some(limit) = self.fail_writes_after {
            if attempt >= limit {
                return Err(StoreError::Io(std::io::Error::other("injected write failure")));
            }
        }

        let locator = new_locator(content_type);
        let mut objects = self.objects.write().await;
        if objects.contains_key(&locator) {
            return Err(StoreError::AlreadyExists(locator));
        }
        objects.insert(locator.clone(), data.clone());
        Ok(locator)
    }

    async fn read(&self, locator: &str) -> Result<Bytes, StoreError> {
        self.objects
            .read()
            .await
            .get(locator)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(locator.to_string()))
    }

    async fn delete(&self, locator: &str) -> Result<(), StoreError> {
        self.objects.write().await.remove(locator);
        Ok(())
    }

    async fn exists(&self, locator: &str) -> Result<bool, StoreError> {
        Ok(self.objects.read().await.contains_key(locator))
    }
}
