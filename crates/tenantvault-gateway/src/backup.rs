//! Tenant backups
//!
//! A backup lives in the reserved backup container under the tenant's own
//! prefix: one copy per source object named `{backup_id}.{container}.{file}`
//! and a JSON manifest `{backup_id}.manifest.json` written last. Everything
//! goes through [`StorageGateway`], so sanitization, signature checks and
//! tenant isolation apply to backup objects as well.

use crate::gateway::StorageGateway;
use crate::sanitize::PathSanitizer;
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Instant;
use tenantvault_core::{
    generate_backup_id, BackupEntry, BackupManifest, BackupMetadata, GatewayError, GatewayResult,
    OverwritePolicy, RestoreResult,
};
use tokio_util::sync::CancellationToken;

const MANIFEST_SUFFIX: &str = ".manifest.json";
const MANIFEST_CONTENT_TYPE: &str = "application/json";

fn manifest_name(backup_id: &str) -> String {
    format!("{}{}", backup_id, MANIFEST_SUFFIX)
}

fn copy_name(backup_id: &str, container: &str, file_name: &str) -> String {
    format!("{}.{}.{}", backup_id, container, file_name)
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// `bk-{YYYYmmddHHMMSS}-{12 lowercase hex}`, the shape `generate_backup_id`
/// produces.
pub(crate) fn is_backup_id(id: &str) -> bool {
    let Some((stamp, suffix)) = id.strip_prefix("bk-").and_then(|rest| rest.split_once('-'))
    else {
        return false;
    };
    stamp.len() == 14
        && stamp.bytes().all(|b| b.is_ascii_digit())
        && suffix.len() == 12
        && suffix.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Copies and manifests: everything named `{backup_id}.…`.
pub(crate) fn is_backup_object_name(name: &str) -> bool {
    name.split_once('.').is_some_and(|(id, _)| is_backup_id(id))
}

fn validate_backup_id(backup_id: &str) -> GatewayResult<()> {
    if is_backup_id(backup_id) {
        Ok(())
    } else {
        Err(GatewayError::InvalidPath(format!(
            "'{}' is not a backup id",
            backup_id.escape_debug()
        )))
    }
}

/// Creates, restores, lists and deletes tenant backups.
pub struct BackupOrchestrator {
    gateway: Arc<StorageGateway>,
}

impl BackupOrchestrator {
    pub fn new(gateway: Arc<StorageGateway>) -> Self {
        Self { gateway }
    }

    /// Copy every object the tenant owns in `containers` and persist a
    /// manifest describing them.
    ///
    /// The manifest is written last with a create-only precondition; on
    /// failure the copies written so far are removed (unless cancelled) and
    /// the error is returned.
    pub async fn create_backup(
        &self,
        tenant_id: &str,
        containers: &[String],
        cancel: &CancellationToken,
    ) -> GatewayResult<BackupManifest> {
        let tenant = PathSanitizer::sanitize_segment(tenant_id, "tenant id")?;
        let backup_container = self.gateway.backup_container().to_string();

        let mut sources: Vec<String> = Vec::with_capacity(containers.len());
        for container in containers {
            if *container == backup_container {
                return Err(GatewayError::UnknownContainer(format!(
                    "{} (reserved for backups)",
                    container
                )));
            }
            self.gateway.check_container(container)?;
            if !sources.contains(container) {
                sources.push(container.clone());
            }
        }

        let start = Instant::now();
        let created_at = Utc::now();
        let backup_id = generate_backup_id(created_at);
        let mut written: Vec<String> = Vec::new();

        let result = self
            .write_backup(&tenant, &backup_id, created_at, &sources, &mut written, cancel)
            .await;

        match result {
            Ok(manifest) => {
                tracing::info!(
                    tenant = %tenant,
                    backup_id = %backup_id,
                    file_count = manifest.file_count,
                    total_size_bytes = manifest.total_size_bytes,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Backup created"
                );
                Ok(manifest)
            }
            Err(err) => {
                tracing::error!(
                    error = %err,
                    tenant = %tenant,
                    backup_id = %backup_id,
                    copies_written = written.len(),
                    "Backup failed"
                );
                if !matches!(err, GatewayError::Cancelled) {
                    self.discard_copies(&tenant, &written).await;
                }
                Err(err)
            }
        }
    }

    async fn write_backup(
        &self,
        tenant: &str,
        backup_id: &str,
        created_at: chrono::DateTime<Utc>,
        sources: &[String],
        written: &mut Vec<String>,
        cancel: &CancellationToken,
    ) -> GatewayResult<BackupManifest> {
        let backup_container = self.gateway.backup_container();
        let mut entries = Vec::new();

        for container in sources {
            let names = self.gateway.list(container, tenant, cancel).await?;
            for file_name in names {
                let object = self
                    .gateway
                    .download(container, tenant, &file_name, cancel)
                    .await?;
                let copy = copy_name(backup_id, container, &file_name);
                self.gateway
                    .upload_with_policy(
                        backup_container,
                        tenant,
                        &copy,
                        object.data.as_ref(),
                        &object.metadata.content_type,
                        OverwritePolicy::Reject,
                        cancel,
                    )
                    .await?;
                written.push(copy);

                entries.push(BackupEntry {
                    container: container.clone(),
                    file_name,
                    content_type: object.metadata.content_type,
                    size_bytes: object.data.len() as u64,
                    sha256: sha256_hex(&object.data),
                });
            }
        }

        let manifest = BackupManifest {
            backup_id: backup_id.to_string(),
            tenant_id: tenant.to_string(),
            containers: sources.to_vec(),
            file_count: entries.len(),
            total_size_bytes: entries.iter().map(|e| e.size_bytes).sum(),
            created_at,
            entries,
        };

        let body = serde_json::to_vec_pretty(&manifest).map_err(|e| {
            GatewayError::CorruptManifest {
                backup_id: backup_id.to_string(),
                reason: e.to_string(),
            }
        })?;
        self.gateway
            .upload_with_policy(
                backup_container,
                tenant,
                &manifest_name(backup_id),
                body.as_slice(),
                MANIFEST_CONTENT_TYPE,
                OverwritePolicy::Reject,
                cancel,
            )
            .await?;

        Ok(manifest)
    }

    async fn discard_copies(&self, tenant: &str, copies: &[String]) {
        let cleanup = CancellationToken::new();
        for copy in copies {
            if let Err(e) = self
                .gateway
                .delete_backup_object(tenant, copy, &cleanup)
                .await
            {
                tracing::warn!(error = %e, tenant = %tenant, copy = %copy, "Failed to discard partial backup copy");
            }
        }
    }

    async fn load_manifest(
        &self,
        tenant: &str,
        backup_id: &str,
        cancel: &CancellationToken,
    ) -> GatewayResult<BackupManifest> {
        let object = self
            .gateway
            .download(
                self.gateway.backup_container(),
                tenant,
                &manifest_name(backup_id),
                cancel,
            )
            .await?;

        let corrupt = |reason: String| GatewayError::CorruptManifest {
            backup_id: backup_id.to_string(),
            reason,
        };

        let manifest: BackupManifest =
            serde_json::from_slice(&object.data).map_err(|e| corrupt(e.to_string()))?;
        if manifest.backup_id != backup_id {
            return Err(corrupt(format!("manifest names backup {}", manifest.backup_id)));
        }
        if manifest.tenant_id != tenant {
            return Err(corrupt("manifest belongs to another tenant".to_string()));
        }
        if !manifest.is_consistent() {
            return Err(corrupt("summary does not match entries".to_string()));
        }
        Ok(manifest)
    }

    /// Copy every object recorded in a backup back to its original container
    /// and name, replacing what is there.
    ///
    /// Entries that fail (missing copy, checksum mismatch, rejected upload)
    /// are counted in the result. Storage faults and cancellation abort the
    /// restore and are returned as errors. The backup itself is never changed.
    pub async fn restore_backup(
        &self,
        tenant_id: &str,
        backup_id: &str,
        cancel: &CancellationToken,
    ) -> GatewayResult<RestoreResult> {
        let tenant = PathSanitizer::sanitize_segment(tenant_id, "tenant id")?;
        validate_backup_id(backup_id)?;
        let start = Instant::now();

        let manifest = self.load_manifest(&tenant, backup_id, cancel).await?;

        let mut files_restored = 0;
        let mut failures = Vec::new();
        for entry in &manifest.entries {
            match self.restore_entry(&tenant, backup_id, entry, cancel).await {
                Ok(()) => files_restored += 1,
                Err(err @ (GatewayError::StorageUnavailable { .. } | GatewayError::Cancelled)) => {
                    return Err(err);
                }
                Err(err) => {
                    tracing::warn!(
                        error = %err,
                        tenant = %tenant,
                        backup_id = %backup_id,
                        container = %entry.container,
                        file_name = %entry.file_name,
                        "Backup entry not restored"
                    );
                    failures.push(format!("{}/{}: {}", entry.container, entry.file_name, err));
                }
            }
        }

        let files_failed = failures.len();
        tracing::info!(
            tenant = %tenant,
            backup_id = %backup_id,
            files_restored = files_restored,
            files_failed = files_failed,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Backup restore finished"
        );

        Ok(RestoreResult {
            backup_id: backup_id.to_string(),
            files_restored,
            files_failed,
            success: failures.is_empty(),
            error_message: (!failures.is_empty()).then(|| failures.join("; ")),
        })
    }

    async fn restore_entry(
        &self,
        tenant: &str,
        backup_id: &str,
        entry: &BackupEntry,
        cancel: &CancellationToken,
    ) -> GatewayResult<()> {
        let copy = copy_name(backup_id, &entry.container, &entry.file_name);
        let object = self
            .gateway
            .download(self.gateway.backup_container(), tenant, &copy, cancel)
            .await?;

        if object.data.len() as u64 != entry.size_bytes || sha256_hex(&object.data) != entry.sha256 {
            return Err(GatewayError::CorruptManifest {
                backup_id: backup_id.to_string(),
                reason: format!("checksum mismatch for {}", copy),
            });
        }

        self.gateway
            .upload_with_policy(
                &entry.container,
                tenant,
                &entry.file_name,
                object.data.as_ref(),
                &entry.content_type,
                OverwritePolicy::Allow,
                cancel,
            )
            .await?;
        Ok(())
    }

    /// Summaries of the tenant's backups, newest first. Unreadable manifests
    /// are skipped.
    pub async fn list_backups(
        &self,
        tenant_id: &str,
        cancel: &CancellationToken,
    ) -> GatewayResult<Vec<BackupMetadata>> {
        let tenant = PathSanitizer::sanitize_segment(tenant_id, "tenant id")?;
        let names = self
            .gateway
            .list(self.gateway.backup_container(), &tenant, cancel)
            .await?;

        let mut backups = Vec::new();
        for name in names {
            // Copies of user files named `*.manifest.json` end the same way.
            let Some(backup_id) = name
                .strip_suffix(MANIFEST_SUFFIX)
                .filter(|id| is_backup_id(id))
            else {
                continue;
            };
            match self.load_manifest(&tenant, backup_id, cancel).await {
                Ok(manifest) => backups.push(BackupMetadata::from(&manifest)),
                // Deleted between listing and reading.
                Err(GatewayError::NotFound(_)) => {}
                Err(err @ (GatewayError::StorageUnavailable { .. } | GatewayError::Cancelled)) => {
                    return Err(err);
                }
                Err(err) => {
                    tracing::warn!(
                        error = %err,
                        tenant = %tenant,
                        manifest = %name,
                        "Skipping unreadable backup manifest"
                    );
                }
            }
        }

        backups.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.backup_id.cmp(&a.backup_id))
        });
        Ok(backups)
    }

    /// Delete the copies a backup's manifest records, any other object named
    /// after the backup id, then the manifest. `false` when the backup had no
    /// objects.
    ///
    /// An unreadable manifest does not block the delete; the id-named objects
    /// are still removed.
    pub async fn delete_backup(
        &self,
        tenant_id: &str,
        backup_id: &str,
        cancel: &CancellationToken,
    ) -> GatewayResult<bool> {
        let tenant = PathSanitizer::sanitize_segment(tenant_id, "tenant id")?;
        validate_backup_id(backup_id)?;
        let manifest = manifest_name(backup_id);

        let mut targets: Vec<String> = match self.load_manifest(&tenant, backup_id, cancel).await {
            Ok(recorded) => recorded
                .entries
                .iter()
                .map(|entry| copy_name(backup_id, &entry.container, &entry.file_name))
                .collect(),
            Err(GatewayError::NotFound(_)) => Vec::new(),
            Err(err @ GatewayError::CorruptManifest { .. }) => {
                tracing::warn!(
                    error = %err,
                    tenant = %tenant,
                    backup_id = %backup_id,
                    "Deleting backup with unreadable manifest"
                );
                Vec::new()
            }
            Err(err) => return Err(err),
        };

        // Copies of a backup that failed before its manifest was written.
        let prefix = format!("{}.", backup_id);
        let listed = self
            .gateway
            .list(self.gateway.backup_container(), &tenant, cancel)
            .await?;
        for name in listed {
            if name.starts_with(&prefix) && name != manifest && !targets.contains(&name) {
                targets.push(name);
            }
        }
        // Manifest last: an interrupted delete stays visible in listings.
        targets.push(manifest);

        let mut deleted = 0usize;
        for name in &targets {
            if self
                .gateway
                .delete_backup_object(&tenant, name, cancel)
                .await?
            {
                deleted += 1;
            }
        }

        tracing::info!(
            tenant = %tenant,
            backup_id = %backup_id,
            objects_deleted = deleted,
            "Backup deleted"
        );
        Ok(deleted > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backup_object_names() {
        let id = "bk-20261019083000-0123456789ab";
        assert_eq!(manifest_name(id), "bk-20261019083000-0123456789ab.manifest.json");
        assert_eq!(
            copy_name(id, "images", "logo.png"),
            "bk-20261019083000-0123456789ab.images.logo.png"
        );
    }

    #[test]
    fn copy_names_survive_sanitization() {
        let id = generate_backup_id(Utc::now());
        let copy = copy_name(&id, "documents", "Q3_report.v2.pdf");
        assert_eq!(PathSanitizer::sanitize_segment(&copy, "copy").unwrap(), copy);
    }

    #[test]
    fn backup_ids_are_validated() {
        assert!(validate_backup_id("bk-20261019083000-0123456789ab").is_ok());
        assert!(validate_backup_id(&generate_backup_id(Utc::now())).is_ok());
        for bad in [
            "../bk-1",
            "bk/1",
            "",
            "report",
            "bk-1",
            "bk-20261019083000-0123456789AB",
            "bk-2026101908300-0123456789abc",
            "bk-20261019083000-0123456789a",
            "bk-20261019083000-0123456789ab.images",
        ] {
            assert!(validate_backup_id(bad).is_err(), "{:?}", bad);
        }
    }

    #[test]
    fn backup_object_names_are_recognized() {
        let id = "bk-20261019083000-0123456789ab";
        assert!(is_backup_object_name(&manifest_name(id)));
        assert!(is_backup_object_name(&copy_name(id, "images", "logo.png")));
        assert!(!is_backup_object_name("report.pdf"));
        assert!(!is_backup_object_name("bk-notes.txt"));
        assert!(!is_backup_object_name(id));
    }

    #[test]
    fn longest_copy_name_fits_a_segment() {
        use crate::sanitize::{MAX_FILE_NAME_LEN, MAX_SEGMENT_LEN};
        use tenantvault_core::MAX_CONTAINER_NAME_LEN;

        let id = generate_backup_id(Utc::now());
        let container = "c".repeat(MAX_CONTAINER_NAME_LEN);
        let file_name = "f".repeat(MAX_FILE_NAME_LEN);
        let copy = copy_name(&id, &container, &file_name);
        assert!(copy.len() <= MAX_SEGMENT_LEN);
        assert_eq!(PathSanitizer::sanitize_segment(&copy, "copy").unwrap(), copy);
    }

    #[test]
    fn sha256_is_hex_encoded() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
