//! Tenantvault Storage Library
//!
//! This crate provides the object store seam the gateway writes through: the
//! `BlobStore` trait and implementations for S3 and the local filesystem.
//!
//! # Storage key format
//!
//! Objects are addressed by `(container, key)`. Containers are the allow-listed
//! top-level groupings; keys are `{tenant}/{file_name}` and are produced by the
//! gateway's path sanitizer, never taken from a client. Backends still refuse
//! keys containing `..` or a leading `/`.

pub mod factory;
pub(crate) mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use tenantvault_core::StorageBackend;
pub use traits::{
    BlobStore, ObjectAttributes, ObjectInfo, StorageError, StorageResult, StoredObject, WriteMode,
};
