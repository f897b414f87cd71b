//! Storage abstraction trait
//!
//! This module defines the BlobStore trait that all storage backends must implement.

use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("List failed: {0}")]
    ListFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Object already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Whether a write may replace an existing object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Overwrite,
    /// Fail with `StorageError::AlreadyExists` if the key is taken
    CreateOnly,
}

/// Attributes attached to an object at write time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectAttributes {
    /// Transport content type served with the object
    pub content_type: String,
    /// User metadata (tenant id, upload timestamp)
    pub metadata: BTreeMap<String, String>,
}

/// What the store knows about an object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    /// Key relative to the container
    pub key: String,
    pub size_bytes: u64,
    pub last_modified: DateTime<Utc>,
    pub content_type: Option<String>,
    pub metadata: BTreeMap<String, String>,
}

/// A downloaded object
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub info: ObjectInfo,
    pub data: Bytes,
}

/// Storage abstraction trait
///
/// All storage backends (S3, local filesystem) must implement this trait.
/// The gateway only ever talks to the store through it.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Make sure a container exists, creating it without public access if needed.
    /// Idempotent.
    async fn ensure_container(&self, container: &str) -> StorageResult<()>;

    /// Write an object and return its URL
    async fn put(
        &self,
        container: &str,
        key: &str,
        data: Bytes,
        attributes: ObjectAttributes,
        mode: WriteMode,
    ) -> StorageResult<String>;

    /// Read an object with the attributes recorded for it
    async fn get(&self, container: &str, key: &str) -> StorageResult<StoredObject>;

    /// Look an object up without reading it. `None` when absent.
    async fn head(&self, container: &str, key: &str) -> StorageResult<Option<ObjectInfo>>;

    /// Delete an object together with anything the backend keeps alongside it.
    /// Returns `false` when there was nothing to delete.
    async fn delete(&self, container: &str, key: &str) -> StorageResult<bool>;

    /// List every object in a container whose key starts with `prefix`.
    /// `prefix` ends with `/` and is matched per path segment.
    async fn list(&self, container: &str, prefix: &str) -> StorageResult<Vec<ObjectInfo>>;

    /// Mint a time-limited read-only URL.
    ///
    /// Returns `Ok(None)` when the backend cannot mint scoped credentials.
    async fn presigned_read_url(
        &self,
        container: &str,
        key: &str,
        expires_in: Duration,
    ) -> StorageResult<Option<String>>;

    /// The bare (unsigned) URL of an object
    fn object_url(&self, container: &str, key: &str) -> String;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
