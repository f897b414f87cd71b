//! Data models for the gateway
//!
//! Plain data carried across the gateway boundary. Each sub-module
//! represents one feature area.

mod access;
mod backup;
mod object;

// Re-export all models for convenient imports
pub use access::{AccessPermission, TemporaryAccess};
pub use backup::{generate_backup_id, BackupEntry, BackupManifest, BackupMetadata, RestoreResult};
pub use object::{StoredObjectMetadata, METADATA_TENANT_ID, METADATA_UPLOADED_AT};
