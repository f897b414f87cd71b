//! Tenantvault Core Library
//!
//! This crate provides the configuration, error types, and domain models
//! shared by the storage backends, the gateway, and the CLI.

pub mod config;
pub mod error;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use config::{
    GatewayConfig, OverwritePolicy, SizeLimits, MAX_CONTAINER_NAME_LEN, MAX_TEMP_ACCESS_EXPIRY_MINUTES,
};
pub use error::{ErrorMetadata, GatewayError, GatewayResult, LogLevel};
pub use models::{
    generate_backup_id, AccessPermission, BackupEntry, BackupManifest, BackupMetadata,
    RestoreResult, StoredObjectMetadata, TemporaryAccess, METADATA_TENANT_ID,
    METADATA_UPLOADED_AT,
};
pub use storage_types::StorageBackend;
