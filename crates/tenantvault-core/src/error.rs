//! Error types module
//!
//! This module provides the error taxonomy of the gateway. Validation and path
//! errors are raised before any store round-trip; store faults are wrapped with
//! the operation, container and tenant they happened under.

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for rejections worth auditing
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
/// This trait allows errors to self-describe their HTTP response characteristics
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "CONTENT_MISMATCH")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the client
    fn suggested_action(&self) -> Option<&'static str>;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden in production
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Unknown container: {0}")]
    UnknownContainer(String),

    #[error("Content does not match declared type {content_type}")]
    ContentMismatch { content_type: String },

    #[error("Payload too large (max: {max} bytes)")]
    PayloadTooLarge { max: u64 },

    #[error("Unreadable payload: {0}")]
    InvalidPayload(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Object already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid expiry: {minutes} minutes (allowed: 1..={max})")]
    InvalidExpiry { minutes: u32, max: u32 },

    #[error("Storage unavailable during {operation} on '{container}' for tenant '{tenant}': {message}")]
    StorageUnavailable {
        operation: &'static str,
        container: String,
        tenant: String,
        message: String,
    },

    #[error("Corrupt backup manifest {backup_id}: {reason}")]
    CorruptManifest { backup_id: String, reason: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Static metadata for each variant: (http_status, error_code, recoverable, suggested_action, sensitive, log_level).
fn gateway_error_static_metadata(
    err: &GatewayError,
) -> (
    u16,
    &'static str,
    bool,
    Option<&'static str>,
    bool,
    LogLevel,
) {
    match err {
        GatewayError::InvalidPath(_) => (
            400,
            "INVALID_PATH",
            false,
            Some("Use a non-empty tenant id and file name"),
            false,
            LogLevel::Debug,
        ),
        GatewayError::UnknownContainer(_) => (
            400,
            "UNKNOWN_CONTAINER",
            false,
            Some("Use one of the configured containers"),
            false,
            LogLevel::Debug,
        ),
        GatewayError::ContentMismatch { .. } => (
            415,
            "CONTENT_MISMATCH",
            false,
            Some("Upload a file whose content matches its declared type"),
            false,
            LogLevel::Warn,
        ),
        GatewayError::PayloadTooLarge { .. } => (
            413,
            "PAYLOAD_TOO_LARGE",
            false,
            Some("Compress or split the file and try again"),
            false,
            LogLevel::Debug,
        ),
        GatewayError::InvalidPayload(_) => (
            400,
            "INVALID_PAYLOAD",
            false,
            Some("Resend the file"),
            false,
            LogLevel::Debug,
        ),
        GatewayError::NotFound(_) => (
            404,
            "NOT_FOUND",
            false,
            Some("Verify the file name exists for this tenant"),
            false,
            LogLevel::Debug,
        ),
        GatewayError::AlreadyExists(_) => (
            409,
            "ALREADY_EXISTS",
            false,
            Some("Delete the existing file or choose another name"),
            false,
            LogLevel::Debug,
        ),
        GatewayError::InvalidExpiry { .. } => (
            400,
            "INVALID_EXPIRY",
            false,
            Some("Request an expiry within the allowed range"),
            false,
            LogLevel::Debug,
        ),
        GatewayError::StorageUnavailable { .. } => (
            503,
            "STORAGE_UNAVAILABLE",
            true,
            Some("Retry with exponential backoff"),
            true,
            LogLevel::Error,
        ),
        GatewayError::CorruptManifest { .. } => (
            422,
            "CORRUPT_MANIFEST",
            false,
            Some("Restore from a different backup"),
            false,
            LogLevel::Error,
        ),
        GatewayError::Cancelled => (
            499,
            "CANCELLED",
            false,
            Some("Verify the final state before retrying"),
            false,
            LogLevel::Debug,
        ),
        GatewayError::Config(_) => (
            500,
            "CONFIGURATION_ERROR",
            false,
            Some("Contact support if this error persists"),
            true,
            LogLevel::Error,
        ),
    }
}

impl GatewayError {
    /// Get the error type name for detailed error responses
    pub fn error_type(&self) -> &str {
        match self {
            GatewayError::InvalidPath(_) => "InvalidPath",
            GatewayError::UnknownContainer(_) => "UnknownContainer",
            GatewayError::ContentMismatch { .. } => "ContentMismatch",
            GatewayError::PayloadTooLarge { .. } => "PayloadTooLarge",
            GatewayError::InvalidPayload(_) => "InvalidPayload",
            GatewayError::NotFound(_) => "NotFound",
            GatewayError::AlreadyExists(_) => "AlreadyExists",
            GatewayError::InvalidExpiry { .. } => "InvalidExpiry",
            GatewayError::StorageUnavailable { .. } => "StorageUnavailable",
            GatewayError::CorruptManifest { .. } => "CorruptManifest",
            GatewayError::Cancelled => "Cancelled",
            GatewayError::Config(_) => "Config",
        }
    }
}

impl ErrorMetadata for GatewayError {
    fn http_status_code(&self) -> u16 {
        gateway_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        gateway_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        gateway_error_static_metadata(self).2
    }

    fn suggested_action(&self) -> Option<&'static str> {
        gateway_error_static_metadata(self).3
    }

    fn is_sensitive(&self) -> bool {
        gateway_error_static_metadata(self).4
    }

    fn log_level(&self) -> LogLevel {
        gateway_error_static_metadata(self).5
    }

    fn client_message(&self) -> String {
        match self {
            GatewayError::InvalidPath(ref msg) => msg.clone(),
            GatewayError::UnknownContainer(ref name) => format!("Unknown container: {}", name),
            GatewayError::ContentMismatch { content_type } => format!(
                "File content does not match the declared type {}",
                content_type
            ),
            GatewayError::PayloadTooLarge { max } => {
                format!("File too large: the limit for this type is {} bytes", max)
            }
            GatewayError::InvalidPayload(_) => "The uploaded payload could not be read".to_string(),
            GatewayError::NotFound(ref msg) => msg.clone(),
            GatewayError::AlreadyExists(ref msg) => format!("File already exists: {}", msg),
            GatewayError::InvalidExpiry { minutes, max } => format!(
                "Expiry of {} minutes is outside the allowed range 1..={}",
                minutes, max
            ),
            GatewayError::StorageUnavailable { .. } => {
                "Storage is temporarily unavailable".to_string()
            }
            GatewayError::CorruptManifest { backup_id, .. } => {
                format!("Backup {} is unreadable", backup_id)
            }
            GatewayError::Cancelled => "The operation was cancelled".to_string(),
            GatewayError::Config(_) => "Internal server error".to_string(),
        }
    }
}
