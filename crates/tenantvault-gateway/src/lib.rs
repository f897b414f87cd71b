//! Tenantvault Gateway Library
//!
//! The governance layer in front of the object store. Every operation takes a
//! container from the configured allow-list, a tenant id and a file name; keys
//! are derived by [`PathSanitizer`] and nothing else.
//!
//! Upload validation happens before any store round-trip: the declared content
//! type is checked against the payload's binary signature
//! ([`SignatureValidator`]) and its size tier ([`SizeLimiter`]).

pub mod backup;
pub mod gateway;
pub mod limits;
pub mod sanitize;
pub mod signature;

pub use backup::BackupOrchestrator;
pub use gateway::{build_gateway, DownloadedObject, StorageGateway, UploadOutcome};
pub use limits::SizeLimiter;
pub use sanitize::{ObjectKey, PathSanitizer, MAX_FILE_NAME_LEN, MAX_SEGMENT_LEN};
pub use signature::{normalize_content_type, SignatureValidator};
pub use tokio_util::sync::CancellationToken;
