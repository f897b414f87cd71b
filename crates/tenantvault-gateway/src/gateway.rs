//! Storage gateway
//!
//! Every operation validates its container against the allow-list and derives
//! the object key through [`PathSanitizer`] before touching the store. Store
//! round-trips race the caller's cancellation token.

use crate::backup::is_backup_object_name;
use crate::limits::SizeLimiter;
use crate::sanitize::{ObjectKey, PathSanitizer};
use crate::signature::{normalize_content_type, SignatureValidator};
use bytes::Bytes;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::future::Future;
use std::io::Cursor;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tenantvault_core::{
    AccessPermission, GatewayConfig, GatewayError, GatewayResult, OverwritePolicy,
    StoredObjectMetadata, TemporaryAccess, MAX_TEMP_ACCESS_EXPIRY_MINUTES, METADATA_TENANT_ID,
    METADATA_UPLOADED_AT,
};
use tenantvault_storage::{create_storage, BlobStore, ObjectAttributes, StorageError, WriteMode};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::sync::CancellationToken;

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Result of a successful upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadOutcome {
    /// External URI of the stored object
    pub uri: String,
    /// `{tenant}/{file}` key inside the container
    pub object_key: String,
    pub size_bytes: u64,
    /// Normalized content type the object is served with
    pub content_type: String,
}

/// Downloaded content with the metadata recorded at upload
#[derive(Debug, Clone)]
pub struct DownloadedObject {
    pub data: Bytes,
    pub metadata: StoredObjectMetadata,
}

impl DownloadedObject {
    /// A seekable reader over the content.
    pub fn reader(&self) -> Cursor<Bytes> {
        Cursor::new(self.data.clone())
    }
}

/// Governance layer over a [`BlobStore`].
///
/// Holds configuration only; all object state lives in the store, so one
/// instance can be shared across tasks behind an `Arc`.
pub struct StorageGateway {
    store: Arc<dyn BlobStore>,
    allowed_containers: Vec<String>,
    backup_container: String,
    validator: SignatureValidator,
    limits: SizeLimiter,
    overwrite_policy: OverwritePolicy,
    default_expiry_minutes: u32,
    clock_skew_minutes: u32,
}

/// Build a gateway over the backend selected by `config`.
pub async fn build_gateway(config: &GatewayConfig) -> GatewayResult<StorageGateway> {
    config
        .validate()
        .map_err(|e| GatewayError::Config(e.to_string()))?;

    let store = create_storage(config)
        .await
        .map_err(|e| map_storage_error(e, "initialize", "*", "*"))?;

    tracing::info!(
        backend = %store.backend_type(),
        containers = ?config.allowed_containers,
        overwrite_policy = %config.overwrite_policy,
        "Storage gateway initialized"
    );

    Ok(StorageGateway::new(store, config))
}

impl StorageGateway {
    pub fn new(store: Arc<dyn BlobStore>, config: &GatewayConfig) -> Self {
        Self {
            store,
            allowed_containers: config.allowed_containers.clone(),
            backup_container: config.backup_container.clone(),
            validator: SignatureValidator::new(),
            limits: SizeLimiter::new(config.size_limits),
            overwrite_policy: config.overwrite_policy,
            default_expiry_minutes: config.temp_access_expiry_minutes,
            clock_skew_minutes: config.temp_access_clock_skew_minutes,
        }
    }

    /// Reserved container holding backup copies and manifests.
    pub fn backup_container(&self) -> &str {
        &self.backup_container
    }

    pub(crate) fn check_container(&self, container: &str) -> GatewayResult<()> {
        if self.allowed_containers.iter().any(|c| c == container) {
            Ok(())
        } else {
            Err(GatewayError::UnknownContainer(container.to_string()))
        }
    }

    /// Backup copies and manifests are written and removed only by the
    /// backup orchestrator.
    fn check_not_reserved(&self, container: &str, key: &ObjectKey) -> GatewayResult<()> {
        if container == self.backup_container && is_backup_object_name(key.file_name()) {
            return Err(GatewayError::InvalidPath(format!(
                "'{}' is reserved for backup objects",
                key.file_name()
            )));
        }
        Ok(())
    }

    /// Upload a file for a tenant under the configured overwrite policy.
    ///
    /// The payload is buffered up to its size limit plus one byte, checked
    /// against the declared content type's signature, then written with the
    /// tenant id and upload time attached.
    pub async fn upload<R>(
        &self,
        container: &str,
        tenant_id: &str,
        file_name: &str,
        reader: R,
        content_type: &str,
        cancel: &CancellationToken,
    ) -> GatewayResult<UploadOutcome>
    where
        R: AsyncRead + Unpin + Send,
    {
        self.check_container(container)?;
        let key = PathSanitizer::sanitize_new(tenant_id, file_name)?;
        self.check_not_reserved(container, &key)?;

        self.upload_with_policy(
            container,
            tenant_id,
            file_name,
            reader,
            content_type,
            self.overwrite_policy,
            cancel,
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) async fn upload_with_policy<R>(
        &self,
        container: &str,
        tenant_id: &str,
        file_name: &str,
        reader: R,
        content_type: &str,
        policy: OverwritePolicy,
        cancel: &CancellationToken,
    ) -> GatewayResult<UploadOutcome>
    where
        R: AsyncRead + Unpin + Send,
    {
        self.check_container(container)?;
        let key = PathSanitizer::sanitize(tenant_id, file_name)?;
        let content_type = normalize_content_type(content_type);
        let max = self.limits.max_bytes(&content_type);

        let mut buffer = Vec::new();
        let mut limited = reader.take(max.saturating_add(1));
        let read = limited.read_to_end(&mut buffer);
        race(cancel, async {
            read.await
                .map_err(|e| GatewayError::InvalidPayload(e.to_string()))
        })
        .await?;

        if !self
            .validator
            .validate(&mut Cursor::new(buffer.as_slice()), &content_type)
        {
            tracing::warn!(
                container = %container,
                tenant = %key.tenant_segment(),
                key = %key,
                content_type = %content_type,
                "Upload rejected: content does not match declared type"
            );
            return Err(GatewayError::ContentMismatch { content_type });
        }

        let size = buffer.len() as u64;
        // Reading stopped one byte past the limit; the true size is unknown.
        if size > max {
            tracing::debug!(
                container = %container,
                key = %key,
                content_type = %content_type,
                max_bytes = max,
                "Upload rejected: payload too large"
            );
            return Err(GatewayError::PayloadTooLarge { max });
        }

        let start = Instant::now();
        race(cancel, async {
            self.store
                .ensure_container(container)
                .await
                .map_err(|e| map_storage_error(e, "upload", container, key.tenant_segment()))
        })
        .await?;

        let mut metadata = BTreeMap::new();
        metadata.insert(METADATA_TENANT_ID.to_string(), key.tenant_segment().to_string());
        metadata.insert(METADATA_UPLOADED_AT.to_string(), Utc::now().to_rfc3339());
        let attributes = ObjectAttributes {
            content_type: content_type.clone(),
            metadata,
        };
        let mode = match policy {
            OverwritePolicy::Allow => WriteMode::Overwrite,
            OverwritePolicy::Reject => WriteMode::CreateOnly,
        };

        let object_key = key.as_key();
        let uri = race(cancel, async {
            self.store
                .put(container, &object_key, Bytes::from(buffer), attributes, mode)
                .await
                .map_err(|e| {
                    let err = map_storage_error(e, "upload", container, key.tenant_segment());
                    log_failure(&err, "upload", container, &object_key, start);
                    err
                })
        })
        .await?;

        tracing::info!(
            container = %container,
            key = %object_key,
            size_bytes = size,
            content_type = %content_type,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Upload successful"
        );

        Ok(UploadOutcome {
            uri,
            object_key,
            size_bytes: size,
            content_type,
        })
    }

    /// Download a tenant's file with its recorded metadata.
    pub async fn download(
        &self,
        container: &str,
        tenant_id: &str,
        file_name: &str,
        cancel: &CancellationToken,
    ) -> GatewayResult<DownloadedObject> {
        self.check_container(container)?;
        let key = PathSanitizer::sanitize(tenant_id, file_name)?;
        let object_key = key.as_key();
        let start = Instant::now();

        let stored = race(cancel, async {
            self.store.get(container, &object_key).await.map_err(|e| {
                let err = map_storage_error(e, "download", container, key.tenant_segment());
                log_failure(&err, "download", container, &object_key, start);
                err
            })
        })
        .await?;

        let info = stored.info;
        let uploaded_at = info
            .metadata
            .get(METADATA_UPLOADED_AT)
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or(info.last_modified);
        let metadata = StoredObjectMetadata {
            content_type: info
                .content_type
                .unwrap_or_else(|| FALLBACK_CONTENT_TYPE.to_string()),
            size_bytes: stored.data.len() as u64,
            last_modified: info.last_modified,
            tenant_id: info
                .metadata
                .get(METADATA_TENANT_ID)
                .cloned()
                .unwrap_or_else(|| key.tenant_segment().to_string()),
            uploaded_at,
        };

        tracing::info!(
            container = %container,
            key = %object_key,
            size_bytes = metadata.size_bytes,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Download successful"
        );

        Ok(DownloadedObject {
            data: stored.data,
            metadata,
        })
    }

    /// Delete a tenant's file. `false` when there was nothing to delete.
    pub async fn delete(
        &self,
        container: &str,
        tenant_id: &str,
        file_name: &str,
        cancel: &CancellationToken,
    ) -> GatewayResult<bool> {
        self.check_container(container)?;
        let key = PathSanitizer::sanitize(tenant_id, file_name)?;
        self.check_not_reserved(container, &key)?;
        self.delete_key(container, &key, cancel).await
    }

    pub(crate) async fn delete_backup_object(
        &self,
        tenant_id: &str,
        file_name: &str,
        cancel: &CancellationToken,
    ) -> GatewayResult<bool> {
        let key = PathSanitizer::sanitize(tenant_id, file_name)?;
        self.delete_key(&self.backup_container, &key, cancel).await
    }

    async fn delete_key(
        &self,
        container: &str,
        key: &ObjectKey,
        cancel: &CancellationToken,
    ) -> GatewayResult<bool> {
        let object_key = key.as_key();
        let start = Instant::now();

        let deleted = race(cancel, async {
            self.store.delete(container, &object_key).await.map_err(|e| {
                let err = map_storage_error(e, "delete", container, key.tenant_segment());
                log_failure(&err, "delete", container, &object_key, start);
                err
            })
        })
        .await?;

        tracing::info!(
            container = %container,
            key = %object_key,
            deleted = deleted,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Delete completed"
        );

        Ok(deleted)
    }

    /// File names a tenant owns in a container, sorted, without the tenant
    /// prefix. Each call re-enumerates the store.
    pub async fn list(
        &self,
        container: &str,
        tenant_id: &str,
        cancel: &CancellationToken,
    ) -> GatewayResult<Vec<String>> {
        self.check_container(container)?;
        let prefix = PathSanitizer::tenant_prefix(tenant_id)?;
        let tenant = prefix.trim_end_matches('/');
        let start = Instant::now();

        let objects = race(cancel, async {
            self.store.list(container, &prefix).await.map_err(|e| {
                let err = map_storage_error(e, "list", container, tenant);
                log_failure(&err, "list", container, &prefix, start);
                err
            })
        })
        .await?;

        let mut names: Vec<String> = objects
            .into_iter()
            .filter_map(|object| {
                object
                    .key
                    .strip_prefix(prefix.as_str())
                    .filter(|name| !name.is_empty() && !name.contains('/'))
                    .map(str::to_string)
            })
            .collect();
        names.sort();

        tracing::debug!(
            container = %container,
            tenant = %tenant,
            count = names.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "List successful"
        );

        Ok(names)
    }

    /// Issue read access to one object.
    ///
    /// `expiry_minutes` defaults to the configured expiry and must lie in
    /// `1..=10080`. Backends that cannot presign yield
    /// [`TemporaryAccess::Unscoped`].
    pub async fn temporary_access(
        &self,
        container: &str,
        tenant_id: &str,
        file_name: &str,
        expiry_minutes: Option<u32>,
        cancel: &CancellationToken,
    ) -> GatewayResult<TemporaryAccess> {
        let minutes = expiry_minutes.unwrap_or(self.default_expiry_minutes);
        if minutes == 0 || minutes > MAX_TEMP_ACCESS_EXPIRY_MINUTES {
            return Err(GatewayError::InvalidExpiry {
                minutes,
                max: MAX_TEMP_ACCESS_EXPIRY_MINUTES,
            });
        }

        self.check_container(container)?;
        let key = PathSanitizer::sanitize(tenant_id, file_name)?;
        let object_key = key.as_key();
        let tenant = key.tenant_segment();

        let exists = race(cancel, async {
            self.store
                .head(container, &object_key)
                .await
                .map_err(|e| map_storage_error(e, "temporary_access", container, tenant))
        })
        .await?;
        if exists.is_none() {
            return Err(GatewayError::NotFound(object_key));
        }

        let issued_at = Utc::now();
        let expires_in = Duration::from_secs(u64::from(minutes) * 60);
        let signed = race(cancel, async {
            self.store
                .presigned_read_url(container, &object_key, expires_in)
                .await
                .map_err(|e| map_storage_error(e, "temporary_access", container, tenant))
        })
        .await?;

        match signed {
            Some(url) => {
                tracing::info!(
                    container = %container,
                    key = %object_key,
                    expiry_minutes = minutes,
                    "Scoped read access issued"
                );
                Ok(TemporaryAccess::Scoped {
                    url,
                    starts_at: issued_at
                        - ChronoDuration::minutes(i64::from(self.clock_skew_minutes)),
                    expires_at: issued_at + ChronoDuration::minutes(i64::from(minutes)),
                    permission: AccessPermission::Read,
                })
            }
            None => {
                tracing::warn!(
                    container = %container,
                    key = %object_key,
                    backend = %self.store.backend_type(),
                    "Store cannot mint scoped credentials; returning unscoped object URL"
                );
                Ok(TemporaryAccess::Unscoped {
                    url: self.store.object_url(container, &object_key),
                })
            }
        }
    }
}

/// Run `operation` unless `cancel` fires first.
pub(crate) async fn race<T, F>(cancel: &CancellationToken, operation: F) -> GatewayResult<T>
where
    F: Future<Output = GatewayResult<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(GatewayError::Cancelled),
        result = operation => result,
    }
}

pub(crate) fn map_storage_error(
    err: StorageError,
    operation: &'static str,
    container: &str,
    tenant: &str,
) -> GatewayError {
    match err {
        StorageError::NotFound(key) => GatewayError::NotFound(key),
        StorageError::AlreadyExists(key) => GatewayError::AlreadyExists(key),
        StorageError::InvalidKey(reason) => GatewayError::InvalidPath(reason),
        StorageError::ConfigError(reason) => GatewayError::Config(reason),
        other => GatewayError::StorageUnavailable {
            operation,
            container: container.to_string(),
            tenant: tenant.to_string(),
            message: other.to_string(),
        },
    }
}

fn log_failure(err: &GatewayError, operation: &str, container: &str, key: &str, start: Instant) {
    if matches!(err, GatewayError::StorageUnavailable { .. }) {
        tracing::error!(
            error = %err,
            operation = operation,
            container = %container,
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Storage operation failed"
        );
    }
}
