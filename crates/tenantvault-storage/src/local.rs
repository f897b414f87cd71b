use crate::keys::{validate_container, validate_key, validate_prefix};
use crate::traits::{
    BlobStore, ObjectAttributes, ObjectInfo, StorageError, StorageResult, StoredObject, WriteMode,
};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Directory under the base path holding per-object attribute sidecars.
/// Container names cannot start with `.`, so it never collides with one.
const META_DIR: &str = ".meta";

/// Attributes persisted next to each object
#[derive(Debug, Default, Serialize, Deserialize)]
struct Sidecar {
    content_type: String,
    #[serde(default)]
    metadata: BTreeMap<String, String>,
}

/// Local filesystem storage implementation
///
/// Layout: `{base}/{container}/{key}` for content and
/// `{base}/.meta/{container}/{key}.json` for attributes. It cannot mint
/// scoped credentials, so temporary access through it is always unscoped.
#[derive(Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
    base_url: String,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory for object storage (e.g., "/var/lib/tenantvault")
    /// * `base_url` - Base URL the files are served from (e.g., "http://localhost:3000/storage")
    pub async fn new(base_path: impl Into<PathBuf>, base_url: String) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage {
            base_path,
            base_url,
        })
    }

    fn container_path(&self, container: &str) -> StorageResult<PathBuf> {
        validate_container(container)?;
        Ok(self.base_path.join(container))
    }

    /// Convert a container and key to the content path
    fn object_path(&self, container: &str, key: &str) -> StorageResult<PathBuf> {
        validate_key(key)?;
        Ok(self.container_path(container)?.join(key))
    }

    fn sidecar_path(&self, container: &str, key: &str) -> StorageResult<PathBuf> {
        validate_container(container)?;
        validate_key(key)?;
        Ok(self
            .base_path
            .join(META_DIR)
            .join(container)
            .join(format!("{}.json", key)))
    }

    /// Ensure parent directory exists
    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Remove what a failed `put` left behind. A content file without its
    /// attribute file would break every listing of its prefix.
    async fn discard_partial(&self, path: &Path, sidecar_path: &Path) {
        for leftover in [path, sidecar_path] {
            match fs::remove_file(leftover).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        path = %leftover.display(),
                        "Failed to remove partial upload"
                    );
                }
            }
        }
    }

    async fn read_sidecar(&self, container: &str, key: &str) -> StorageResult<Sidecar> {
        let path = self.sidecar_path(container, key)?;
        match fs::read(&path).await {
            Ok(raw) => serde_json::from_slice(&raw).map_err(|e| {
                StorageError::BackendError(format!(
                    "Corrupt attribute file {}: {}",
                    path.display(),
                    e
                ))
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Sidecar::default()),
            Err(e) => Err(StorageError::IoError(e)),
        }
    }

    async fn info_for(
        &self,
        container: &str,
        key: &str,
        fs_meta: &std::fs::Metadata,
    ) -> StorageResult<ObjectInfo> {
        let sidecar = self.read_sidecar(container, key).await?;
        let last_modified = fs_meta
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        Ok(ObjectInfo {
            key: key.to_string(),
            size_bytes: fs_meta.len(),
            last_modified,
            content_type: Some(sidecar.content_type).filter(|ct| !ct.is_empty()),
            metadata: sidecar.metadata,
        })
    }

    /// Generate public URL for file
    fn generate_url(&self, container: &str, key: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            container,
            key
        )
    }
}

#[cfg(unix)]
async fn restrict_to_owner(path: &Path) -> StorageResult<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, std::fs::Permissions::from_mode(0o700)).await?;
    Ok(())
}

#[cfg(not(unix))]
async fn restrict_to_owner(_path: &Path) -> StorageResult<()> {
    Ok(())
}

#[async_trait]
impl BlobStore for LocalStorage {
    async fn ensure_container(&self, container: &str) -> StorageResult<()> {
        let path = self.container_path(container)?;
        if fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(());
        }

        fs::create_dir_all(&path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create container directory {}: {}",
                path.display(),
                e
            ))
        })?;
        restrict_to_owner(&path).await?;

        tracing::info!(container = %container, path = %path.display(), "Local container created");
        Ok(())
    }

    async fn put(
        &self,
        container: &str,
        key: &str,
        data: Bytes,
        attributes: ObjectAttributes,
        mode: WriteMode,
    ) -> StorageResult<String> {
        let path = self.object_path(container, key)?;
        let sidecar_path = self.sidecar_path(container, key)?;
        let size = data.len();

        self.ensure_parent_dir(&path).await?;
        self.ensure_parent_dir(&sidecar_path).await?;

        let start = std::time::Instant::now();

        let mut options = fs::OpenOptions::new();
        options.write(true);
        match mode {
            WriteMode::Overwrite => options.create(true).truncate(true),
            WriteMode::CreateOnly => options.create_new(true),
        };

        let mut file = options.open(&path).await.map_err(|e| {
            if e.kind() == ErrorKind::AlreadyExists {
                StorageError::AlreadyExists(format!("{}/{}", container, key))
            } else {
                StorageError::UploadFailed(format!(
                    "Failed to create file {}: {}",
                    path.display(),
                    e
                ))
            }
        })?;

        let written = async {
            file.write_all(&data).await.map_err(|e| {
                StorageError::UploadFailed(format!("Failed to write file {}: {}", path.display(), e))
            })?;

            file.sync_all().await.map_err(|e| {
                StorageError::UploadFailed(format!("Failed to sync file {}: {}", path.display(), e))
            })?;

            let sidecar = Sidecar {
                content_type: attributes.content_type,
                metadata: attributes.metadata,
            };
            let raw = serde_json::to_vec(&sidecar).map_err(|e| {
                StorageError::UploadFailed(format!("Failed to encode attributes: {}", e))
            })?;
            fs::write(&sidecar_path, raw).await.map_err(|e| {
                StorageError::UploadFailed(format!(
                    "Failed to write attributes {}: {}",
                    sidecar_path.display(),
                    e
                ))
            })
        }
        .await;

        if let Err(e) = written {
            drop(file);
            self.discard_partial(&path, &sidecar_path).await;
            return Err(e);
        }

        let url = self.generate_url(container, key);

        tracing::info!(
            path = %path.display(),
            container = %container,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage upload successful"
        );

        Ok(url)
    }

    async fn get(&self, container: &str, key: &str) -> StorageResult<StoredObject> {
        let path = self.object_path(container, key)?;
        let start = std::time::Instant::now();

        let fs_meta = match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => meta,
            Ok(_) => return Err(StorageError::NotFound(format!("{}/{}", container, key))),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::NotFound(format!("{}/{}", container, key)))
            }
            Err(e) => return Err(StorageError::IoError(e)),
        };

        let data = fs::read(&path).await.map_err(|e| {
            StorageError::DownloadFailed(format!("Failed to read file {}: {}", path.display(), e))
        })?;
        let info = self.info_for(container, key, &fs_meta).await?;

        tracing::info!(
            path = %path.display(),
            container = %container,
            key = %key,
            size_bytes = data.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage download successful"
        );

        Ok(StoredObject {
            info,
            data: Bytes::from(data),
        })
    }

    async fn head(&self, container: &str, key: &str) -> StorageResult<Option<ObjectInfo>> {
        let path = self.object_path(container, key)?;
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(Some(self.info_for(container, key, &meta).await?)),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::IoError(e)),
        }
    }

    async fn delete(&self, container: &str, key: &str) -> StorageResult<bool> {
        let path = self.object_path(container, key)?;
        let sidecar_path = self.sidecar_path(container, key)?;
        let start = std::time::Instant::now();

        match fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => {
                return Err(StorageError::DeleteFailed(format!(
                    "Failed to delete file {}: {}",
                    path.display(),
                    e
                )))
            }
        }

        match fs::remove_file(&sidecar_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    path = %sidecar_path.display(),
                    "Failed to delete attribute file"
                );
            }
        }

        tracing::info!(
            path = %path.display(),
            container = %container,
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage delete successful"
        );

        Ok(true)
    }

    async fn list(&self, container: &str, prefix: &str) -> StorageResult<Vec<ObjectInfo>> {
        validate_prefix(prefix)?;
        let container_root = self.container_path(container)?;
        let start_dir = container_root.join(prefix.trim_end_matches('/'));

        let mut objects = Vec::new();
        let mut pending = vec![start_dir];

        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(StorageError::ListFailed(format!(
                        "Failed to read directory {}: {}",
                        dir.display(),
                        e
                    )))
                }
            };

            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let fs_meta = entry.metadata().await?;
                if fs_meta.is_dir() {
                    pending.push(path);
                    continue;
                }

                let Ok(relative) = path.strip_prefix(&container_root) else {
                    continue;
                };
                let key = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                objects.push(self.info_for(container, &key, &fs_meta).await?);
            }
        }

        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }

    async fn presigned_read_url(
        &self,
        container: &str,
        key: &str,
        _expires_in: Duration,
    ) -> StorageResult<Option<String>> {
        self.object_path(container, key)?;
        Ok(None)
    }

    fn object_url(&self, container: &str, key: &str) -> String {
        self.generate_url(container, key)
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}
