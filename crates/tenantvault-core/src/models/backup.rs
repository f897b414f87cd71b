use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One object captured by a backup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupEntry {
    pub container: String,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: u64,
    /// Hex-encoded SHA-256 of the object content
    pub sha256: String,
}

/// Durable record of one backup, stored next to the copies it describes.
/// Never rewritten once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupManifest {
    pub backup_id: String,
    pub tenant_id: String,
    pub containers: Vec<String>,
    pub file_count: usize,
    pub total_size_bytes: u64,
    pub created_at: DateTime<Utc>,
    pub entries: Vec<BackupEntry>,
}

impl BackupManifest {
    /// Check the summary fields against the recorded entries.
    pub fn is_consistent(&self) -> bool {
        self.file_count == self.entries.len()
            && self.total_size_bytes == self.entries.iter().map(|e| e.size_bytes).sum::<u64>()
            && self
                .entries
                .iter()
                .all(|e| self.containers.iter().any(|c| c == &e.container))
    }
}

/// Manifest summary returned by backup listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupMetadata {
    pub backup_id: String,
    pub tenant_id: String,
    pub containers: Vec<String>,
    pub file_count: usize,
    pub total_size_bytes: u64,
    pub created_at: DateTime<Utc>,
}

impl From<&BackupManifest> for BackupMetadata {
    fn from(manifest: &BackupManifest) -> Self {
        Self {
            backup_id: manifest.backup_id.clone(),
            tenant_id: manifest.tenant_id.clone(),
            containers: manifest.containers.clone(),
            file_count: manifest.file_count,
            total_size_bytes: manifest.total_size_bytes,
            created_at: manifest.created_at,
        }
    }
}

/// Outcome of a restore. Partial failure is reported here, not raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreResult {
    pub backup_id: String,
    pub files_restored: usize,
    pub files_failed: usize,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Generate a backup id: `bk-{yyyymmddHHMMSS}-{12 hex chars}`.
pub fn generate_backup_id(now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("bk-{}-{}", now.format("%Y%m%d%H%M%S"), &suffix[..12])
}
