use crate::keys::{validate_container, validate_key, validate_prefix};
use crate::traits::{
    BlobStore, ObjectAttributes, ObjectInfo, StorageError, StorageResult, StoredObject, WriteMode,
};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use http::Method;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path;
use object_store::signer::Signer;
use object_store::Error as ObjectStoreError;
use object_store::{
    Attribute, AttributeValue, Attributes, ObjectMeta, ObjectStore, ObjectStoreExt, PutMode,
    PutOptions, PutPayload, Result as ObjectResult,
};
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;
use tokio::sync::RwLock;

/// Zero-byte object marking a container as created. Tenant prefixes can never
/// match it because sanitized tenant ids do not start with `.`.
const CONTAINER_MARKER: &str = ".container";

/// S3 storage implementation
///
/// Containers are top-level prefixes of a single private bucket. Nothing here
/// sets an ACL, so objects inherit the bucket's (private) access policy.
pub struct S3Storage {
    store: AmazonS3,
    bucket: String,
    region: String,
    endpoint_url: Option<String>, // Custom endpoint for S3-compatible providers
    known_containers: RwLock<HashSet<String>>,
}

impl S3Storage {
    /// Create a new S3Storage instance
    ///
    /// # Arguments
    /// * `bucket` - S3 bucket name
    /// * `region` - AWS region (or region identifier for S3-compatible providers)
    /// * `endpoint_url` - Optional custom endpoint URL for S3-compatible providers
    ///   (e.g., "http://localhost:9000" for MinIO)
    pub async fn new(
        bucket: String,
        region: String,
        endpoint_url: Option<String>,
    ) -> StorageResult<Self> {
        // Build AmazonS3 object store from environment and explicit settings.
        let mut builder = AmazonS3Builder::from_env()
            .with_region(region.clone())
            .with_bucket_name(bucket.clone());

        if let Some(ref endpoint) = endpoint_url {
            let allow_http = endpoint.starts_with("http://");
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(allow_http);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        Ok(S3Storage {
            store,
            bucket,
            region,
            endpoint_url,
            known_containers: RwLock::new(HashSet::new()),
        })
    }

    fn location(container: &str, key: &str) -> StorageResult<Path> {
        validate_container(container)?;
        validate_key(key)?;
        Ok(Path::from(format!("{}/{}", container, key)))
    }

    fn encode_attributes(attributes: ObjectAttributes) -> Attributes {
        let mut encoded = Attributes::new();
        encoded.insert(
            Attribute::ContentType,
            AttributeValue::from(attributes.content_type),
        );
        for (name, value) in attributes.metadata {
            encoded.insert(Attribute::Metadata(name.into()), AttributeValue::from(value));
        }
        encoded
    }

    fn object_info(container: &str, meta: &ObjectMeta, attributes: Option<&Attributes>) -> ObjectInfo {
        let full = meta.location.to_string();
        let key = full
            .strip_prefix(container)
            .and_then(|rest| rest.strip_prefix('/'))
            .unwrap_or(&full)
            .to_string();

        let mut content_type = None;
        let mut metadata = BTreeMap::new();
        for (attribute, value) in attributes.into_iter().flat_map(|a| a.iter()) {
            let value: &str = value.as_ref();
            match attribute {
                Attribute::ContentType => content_type = Some(value.to_string()),
                Attribute::Metadata(name) => {
                    metadata.insert(name.to_string(), value.to_string());
                }
                _ => {}
            }
        }

        ObjectInfo {
            key,
            size_bytes: meta.size,
            last_modified: meta.last_modified,
            content_type,
            metadata,
        }
    }

    /// Generate public URL for S3 object
    ///
    /// For AWS S3, uses the standard format: https://{bucket}.s3.{region}.amazonaws.com/{key}
    /// For S3-compatible providers, uses the endpoint URL if provided
    fn generate_url(&self, container: &str, key: &str) -> String {
        if let Some(ref endpoint) = self.endpoint_url {
            // Path-style for compatibility: {endpoint}/{bucket}/{container}/{key}
            let base_url = endpoint.trim_end_matches('/');
            format!("{}/{}/{}/{}", base_url, self.bucket, container, key)
        } else {
            format!(
                "https://{}.s3.{}.amazonaws.com/{}/{}",
                self.bucket, self.region, container, key
            )
        }
    }
}

#[async_trait]
impl BlobStore for S3Storage {
    async fn ensure_container(&self, container: &str) -> StorageResult<()> {
        validate_container(container)?;
        if self.known_containers.read().await.contains(container) {
            return Ok(());
        }

        let marker = Path::from(format!("{}/{}", container, CONTAINER_MARKER));
        let options = PutOptions {
            mode: PutMode::Create,
            ..Default::default()
        };
        let result: ObjectResult<_> = self
            .store
            .put_opts(&marker, PutPayload::from(Bytes::new()), options)
            .await;

        match result {
            Ok(_) => {
                tracing::info!(bucket = %self.bucket, container = %container, "S3 container created");
            }
            Err(ObjectStoreError::AlreadyExists { .. }) => {}
            Err(e) => {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    container = %container,
                    "S3 container creation failed"
                );
                return Err(StorageError::BackendError(e.to_string()));
            }
        }

        self.known_containers
            .write()
            .await
            .insert(container.to_string());
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
        let location = Self::location(container, key)?;
        let size = data.len() as u64;
        let start = std::time::Instant::now();

        let options = PutOptions {
            mode: match mode {
                WriteMode::Overwrite => PutMode::Overwrite,
                WriteMode::CreateOnly => PutMode::Create,
            },
            attributes: Self::encode_attributes(attributes),
            ..Default::default()
        };

        let result: ObjectResult<_> = self
            .store
            .put_opts(&location, PutPayload::from(data), options)
            .await;

        result.map_err(|e| match e {
            ObjectStoreError::AlreadyExists { .. } => {
                StorageError::AlreadyExists(format!("{}/{}", container, key))
            }
            other => {
                tracing::error!(
                    error = %other,
                    bucket = %self.bucket,
                    container = %container,
                    key = %key,
                    size_bytes = size,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 upload failed"
                );
                StorageError::UploadFailed(other.to_string())
            }
        })?;

        let url = self.generate_url(container, key);

        tracing::info!(
            bucket = %self.bucket,
            container = %container,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
        );

        Ok(url)
    }

    async fn get(&self, container: &str, key: &str) -> StorageResult<StoredObject> {
        let start = std::time::Instant::now();
        let location = Self::location(container, key)?;

        let result: ObjectResult<_> = self.store.get(&location).await;

        let result = result.map_err(|e| match e {
            ObjectStoreError::NotFound { .. } => {
                StorageError::NotFound(format!("{}/{}", container, key))
            }
            other => {
                tracing::error!(
                    error = %other,
                    bucket = %self.bucket,
                    container = %container,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 download failed"
                );
                StorageError::DownloadFailed(other.to_string())
            }
        })?;

        let info = Self::object_info(container, &result.meta, Some(&result.attributes));
        let data = result
            .bytes()
            .await
            .map_err(|e| StorageError::DownloadFailed(e.to_string()))?;

        tracing::info!(
            bucket = %self.bucket,
            container = %container,
            key = %key,
            size_bytes = data.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 download successful"
        );

        Ok(StoredObject { info, data })
    }

    async fn head(&self, container: &str, key: &str) -> StorageResult<Option<ObjectInfo>> {
        let location = Self::location(container, key)?;
        match self.store.head(&location).await {
            Ok(meta) => Ok(Some(Self::object_info(container, &meta, None))),
            Err(ObjectStoreError::NotFound { .. }) => Ok(None),
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }

    async fn delete(&self, container: &str, key: &str) -> StorageResult<bool> {
        // S3 deletes are silent for absent keys, so existence is checked first.
        if self.head(container, key).await?.is_none() {
            return Ok(false);
        }

        let start = std::time::Instant::now();
        let location = Self::location(container, key)?;

        let result: ObjectResult<_> = self.store.delete(&location).await;

        result.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %self.bucket,
                container = %container,
                key = %key,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 delete failed"
            );
            StorageError::DeleteFailed(e.to_string())
        })?;

        tracing::info!(
            bucket = %self.bucket,
            container = %container,
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 delete successful"
        );

        Ok(true)
    }

    async fn list(&self, container: &str, prefix: &str) -> StorageResult<Vec<ObjectInfo>> {
        validate_container(container)?;
        validate_prefix(prefix)?;
        let start = std::time::Instant::now();
        // object_store matches prefixes per path segment, so `images/acme`
        // never matches `images/acme2/...`.
        let location = Path::from(format!("{}/{}", container, prefix.trim_end_matches('/')));

        let metas: Vec<ObjectMeta> = self
            .store
            .list(Some(&location))
            .try_collect()
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    container = %container,
                    prefix = %prefix,
                    "S3 list failed"
                );
                StorageError::ListFailed(e.to_string())
            })?;

        let mut objects: Vec<ObjectInfo> = metas
            .iter()
            .map(|meta| Self::object_info(container, meta, None))
            .collect();
        objects.sort_by(|a, b| a.key.cmp(&b.key));

        tracing::debug!(
            bucket = %self.bucket,
            container = %container,
            prefix = %prefix,
            count = objects.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 list successful"
        );

        Ok(objects)
    }

    async fn presigned_read_url(
        &self,
        container: &str,
        key: &str,
        expires_in: Duration,
    ) -> StorageResult<Option<String>> {
        let location = Self::location(container, key)?;
        let url_result: ObjectResult<_> = self
            .store
            .signed_url(Method::GET, &location, expires_in)
            .await;

        let url = url_result
            .map_err(|e| StorageError::BackendError(e.to_string()))?
            .to_string();

        Ok(Some(url))
    }

    fn object_url(&self, container: &str, key: &str) -> String {
        self.generate_url(container, key)
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }
}
