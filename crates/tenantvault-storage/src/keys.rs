//! Shared location checks for storage backends.
//!
//! Keys come from the gateway's sanitizer, so a failure here means a caller
//! bypassed it.

use crate::traits::{StorageError, StorageResult};

/// Reject container names that could escape their namespace.
pub fn validate_container(container: &str) -> StorageResult<()> {
    if container.is_empty()
        || !container
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-')
    {
        return Err(StorageError::InvalidKey(format!(
            "Invalid container name: {}",
            container
        )));
    }
    Ok(())
}

/// Reject keys with traversal sequences, absolute paths or empty segments.
pub fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty()
        || key.contains("..")
        || key.starts_with('/')
        || key.contains('\\')
        || key.split('/').any(str::is_empty)
    {
        return Err(StorageError::InvalidKey(
            "Storage key contains invalid characters".to_string(),
        ));
    }
    Ok(())
}

/// Check a prefix as used by `BlobStore::list`: a key followed by `/`.
pub fn validate_prefix(prefix: &str) -> StorageResult<()> {
    match prefix.strip_suffix('/') {
        Some(inner) => validate_key(inner),
        None => Err(StorageError::InvalidKey(format!(
            "List prefix must end with '/': {}",
            prefix
        ))),
    }
}
