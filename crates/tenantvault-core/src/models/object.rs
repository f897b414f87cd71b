use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Object metadata key holding the owning tenant's sanitized id.
pub const METADATA_TENANT_ID: &str = "tenant-id";
/// Object metadata key holding the RFC 3339 upload timestamp.
pub const METADATA_UPLOADED_AT: &str = "uploaded-at";

/// Metadata recorded for a stored object
///
/// Attached at write time; only an overwrite replaces it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObjectMetadata {
    pub content_type: String,
    pub size_bytes: u64,
    pub last_modified: DateTime<Utc>,
    pub tenant_id: String,
    pub uploaded_at: DateTime<Utc>,
}
