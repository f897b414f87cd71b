//! Tenant path resolution.
//!
//! `ObjectKey` has no public constructor besides [`PathSanitizer::sanitize`],
//! so every key the gateway sends to the store went through it.

use std::fmt::{Display, Formatter, Result as FmtResult};
use tenantvault_core::{GatewayError, GatewayResult};

/// Longest segment the gateway stores. Filesystems stop at 255 bytes and the
/// local backend appends `.json` for the attribute file.
pub const MAX_SEGMENT_LEN: usize = 250;

/// Longest file name a caller may upload under. Leaves room for the
/// `{backup_id}.{container}.` prefix of a backup copy.
pub const MAX_FILE_NAME_LEN: usize = 150;

/// Fully resolved storage key: `{sanitized_tenant}/{sanitized_file_name}`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectKey {
    tenant: String,
    file_name: String,
}

impl ObjectKey {
    pub fn tenant_segment(&self) -> &str {
        &self.tenant
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn as_key(&self) -> String {
        self.to_string()
    }
}

impl Display for ObjectKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}/{}", self.tenant, self.file_name)
    }
}

pub struct PathSanitizer;

impl PathSanitizer {
    /// Resolve a tenant id and file name into a traversal-free key.
    ///
    /// Fails with `InvalidPath` when either input is blank or nothing survives
    /// sanitization.
    pub fn sanitize(tenant_id: &str, file_name: &str) -> GatewayResult<ObjectKey> {
        Ok(ObjectKey {
            tenant: Self::sanitize_segment(tenant_id, "tenant id")?,
            file_name: Self::sanitize_segment(file_name, "file name")?,
        })
    }

    /// [`sanitize`](Self::sanitize) for a new caller-named object; the file
    /// name is held to [`MAX_FILE_NAME_LEN`].
    pub fn sanitize_new(tenant_id: &str, file_name: &str) -> GatewayResult<ObjectKey> {
        let key = Self::sanitize(tenant_id, file_name)?;
        if key.file_name.len() > MAX_FILE_NAME_LEN {
            return Err(GatewayError::InvalidPath(format!(
                "file name is {} bytes long (max: {})",
                key.file_name.len(),
                MAX_FILE_NAME_LEN
            )));
        }
        Ok(key)
    }

    /// The list prefix owning every key of a tenant, e.g. `acme/`.
    pub fn tenant_prefix(tenant_id: &str) -> GatewayResult<String> {
        Ok(format!("{}/", Self::sanitize_segment(tenant_id, "tenant id")?))
    }

    /// Sanitize one path segment.
    ///
    /// Keeps ASCII alphanumerics, `-`, `_` and `.`; strips `..` until none is
    /// left; trims leading and trailing `.`, `-` and `_`. Idempotent. The
    /// result is at most [`MAX_SEGMENT_LEN`] bytes.
    pub fn sanitize_segment(raw: &str, what: &str) -> GatewayResult<String> {
        if raw.trim().is_empty() {
            return Err(GatewayError::InvalidPath(format!("{} must not be empty", what)));
        }

        let mut segment: String = raw
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            .collect();

        // A single pass can leave a fresh `..` behind (`....` -> `..`).
        while segment.contains("..") {
            segment = segment.replace("..", "");
        }

        let segment = segment.trim_matches(|c| matches!(c, '.' | '-' | '_'));
        if segment.is_empty() {
            return Err(GatewayError::InvalidPath(format!(
                "{} '{}' has no usable characters",
                what,
                raw.escape_debug()
            )));
        }

        if segment.len() > MAX_SEGMENT_LEN {
            return Err(GatewayError::InvalidPath(format!(
                "{} is {} bytes long (max: {})",
                what,
                segment.len(),
                MAX_SEGMENT_LEN
            )));
        }

        Ok(segment.to_string())
    }
}
