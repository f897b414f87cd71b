//! Store double wrapping `LocalStorage`: optional presigning and a switchable
//! outage that fails every call with a backend error.

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tenantvault_storage::{
    BlobStore, LocalStorage, ObjectAttributes, ObjectInfo, StorageBackend, StorageError,
    StorageResult, StoredObject, WriteMode,
};

pub struct TestStore {
    inner: LocalStorage,
    signing: bool,
    outage: AtomicBool,
}

impl TestStore {
    pub fn new(inner: LocalStorage, signing: bool) -> Self {
        Self {
            inner,
            signing,
            outage: AtomicBool::new(false),
        }
    }

    pub fn set_outage(&self, down: bool) {
        self.outage.store(down, Ordering::SeqCst);
    }

    fn check(&self) -> StorageResult<()> {
        if self.outage.load(Ordering::SeqCst) {
            Err(StorageError::BackendError("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl BlobStore for TestStore {
    async fn ensure_container(&self, container: &str) -> StorageResult<()> {
        self.check()?;
        self.inner.ensure_container(container).await
    }

    async fn put(
        &self,
        container: &str,
        key: &str,
        data: Bytes,
        attributes: ObjectAttributes,
        mode: WriteMode,
    ) -> StorageResult<String> {
        self.check()?;
        self.inner.put(container, key, data, attributes, mode).await
    }

    async fn get(&self, container: &str, key: &str) -> StorageResult<StoredObject> {
        self.check()?;
        self.inner.get(container, key).await
    }

    async fn head(&self, container: &str, key: &str) -> StorageResult<Option<ObjectInfo>> {
        self.check()?;
        self.inner.head(container, key).await
    }

    async fn delete(&self, container: &str, key: &str) -> StorageResult<bool> {
        self.check()?;
        self.inner.delete(container, key).await
    }

    async fn list(&self, container: &str, prefix: &str) -> StorageResult<Vec<ObjectInfo>> {
        self.check()?;
        self.inner.list(container, prefix).await
    }

    async fn presigned_read_url(
        &self,
        container: &str,
        key: &str,
        expires_in: Duration,
    ) -> StorageResult<Option<String>> {
        self.check()?;
        if !self.signing {
            return self.inner.presigned_read_url(container, key, expires_in).await;
        }
        Ok(Some(format!(
            "{}?X-Expires={}&X-Signature=test",
            self.inner.object_url(container, key),
            expires_in.as_secs()
        )))
    }

    fn object_url(&self, container: &str, key: &str) -> String {
        self.inner.object_url(container, key)
    }

    fn backend_type(&self) -> StorageBackend {
        self.inner.backend_type()
    }
}
