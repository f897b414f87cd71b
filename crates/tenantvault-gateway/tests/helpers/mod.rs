//! Test helpers: build a gateway over a tempdir-backed local store.
//!
//! Run from workspace root: `cargo test -p tenantvault-gateway`.

#![allow(dead_code)]

pub mod fixtures;
pub mod storage;

use bytes::Bytes;
use std::collections::BTreeMap;
use std::sync::Arc;
use storage::TestStore;
use tempfile::TempDir;
use tenantvault_core::GatewayConfig;
use tenantvault_gateway::{BackupOrchestrator, CancellationToken, StorageGateway};
use tenantvault_storage::{BlobStore, LocalStorage, ObjectAttributes, WriteMode};

pub const BASE_URL: &str = "http://localhost:3000/storage";

/// Gateway, backup orchestrator and the store double behind them.
pub struct TestGateway {
    pub gateway: Arc<StorageGateway>,
    pub backups: BackupOrchestrator,
    pub store: Arc<TestStore>,
    pub cancel: CancellationToken,
    pub _temp_dir: TempDir,
}

impl TestGateway {
    /// Write a key straight to the store, past every gateway check.
    pub async fn put_raw(&self, container: &str, key: &str, data: &[u8], content_type: &str) {
        self.store
            .ensure_container(container)
            .await
            .expect("Failed to create container");
        self.store
            .put(
                container,
                key,
                Bytes::copy_from_slice(data),
                ObjectAttributes {
                    content_type: content_type.to_string(),
                    metadata: BTreeMap::new(),
                },
                WriteMode::Overwrite,
            )
            .await
            .expect("Failed to write object");
    }

    /// Delete a key straight from the store.
    pub async fn delete_raw(&self, container: &str, key: &str) -> bool {
        self.store
            .delete(container, key)
            .await
            .expect("Failed to delete object")
    }
}

/// Local backend, default configuration, no presigning.
pub async fn setup_gateway() -> TestGateway {
    setup_gateway_with(GatewayConfig::default(), false).await
}

/// Same as [`setup_gateway`] but the store mints presigned URLs.
pub async fn setup_signing_gateway() -> TestGateway {
    setup_gateway_with(GatewayConfig::default(), true).await
}

pub async fn setup_gateway_with(config: GatewayConfig, signing: bool) -> TestGateway {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let local = LocalStorage::new(temp_dir.path(), BASE_URL.to_string())
        .await
        .expect("Failed to create local storage");
    let store = Arc::new(TestStore::new(local, signing));

    let gateway = Arc::new(StorageGateway::new(store.clone(), &config));
    let backups = BackupOrchestrator::new(gateway.clone());

    TestGateway {
        gateway,
        backups,
        store,
        cancel: CancellationToken::new(),
        _temp_dir: temp_dir,
    }
}
