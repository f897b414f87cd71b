//! Backup orchestrator integration tests.
//!
//! Run with: `cargo test -p tenantvault-gateway --test backup_test`

mod helpers;

use helpers::fixtures::{create_tagged_png, create_test_pdf};
use helpers::{setup_gateway, TestGateway};
use tenantvault_core::{GatewayError, RestoreResult};
use tenantvault_gateway::MAX_FILE_NAME_LEN;

fn containers(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

/// acme: 3 images and 2 documents; beta: 1 image.
async fn seed(app: &TestGateway) {
    for (i, name) in ["a.png", "b.png", "c.png"].into_iter().enumerate() {
        let png = create_tagged_png(i as u8);
        app.gateway
            .upload("images", "acme", name, png.as_slice(), "image/png", &app.cancel)
            .await
            .unwrap();
    }
    let pdf = create_test_pdf();
    app.gateway
        .upload("documents", "acme", "report.pdf", pdf.as_slice(), "application/pdf", &app.cancel)
        .await
        .unwrap();
    app.gateway
        .upload("documents", "acme", "notes.txt", &b"quarterly notes"[..], "text/plain", &app.cancel)
        .await
        .unwrap();

    let png = create_tagged_png(9);
    app.gateway
        .upload("images", "beta", "a.png", png.as_slice(), "image/png", &app.cancel)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_create_backup_counts_files_and_is_listed() {
    let app = setup_gateway().await;
    seed(&app).await;

    let manifest = app
        .backups
        .create_backup("acme", &containers(&["images", "documents"]), &app.cancel)
        .await
        .unwrap();
    assert_eq!(manifest.file_count, 5);
    assert_eq!(manifest.entries.len(), 5);
    assert_eq!(manifest.tenant_id, "acme");
    assert!(manifest.backup_id.starts_with("bk-"));
    assert!(manifest.is_consistent());

    let listed = app.backups.list_backups("acme", &app.cancel).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].backup_id, manifest.backup_id);
    assert_eq!(listed[0].file_count, 5);
    assert_eq!(listed[0].total_size_bytes, manifest.total_size_bytes);

    // The manifest is a real object in the backup container.
    let stored = app
        .gateway
        .list("backups", "acme", &app.cancel)
        .await
        .unwrap();
    assert!(stored.contains(&format!("{}.manifest.json", manifest.backup_id)));
    assert_eq!(stored.len(), 6);

    assert!(app.backups.list_backups("beta", &app.cancel).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_restore_brings_back_deleted_files() {
    let app = setup_gateway().await;
    seed(&app).await;
    let manifest = app
        .backups
        .create_backup("acme", &containers(&["images", "documents"]), &app.cancel)
        .await
        .unwrap();

    for name in ["a.png", "b.png", "c.png"] {
        assert!(app.gateway.delete("images", "acme", name, &app.cancel).await.unwrap());
    }
    app.gateway
        .upload("documents", "acme", "notes.txt", &b"edited after backup"[..], "text/plain", &app.cancel)
        .await
        .unwrap();

    let result = app
        .backups
        .restore_backup("acme", &manifest.backup_id, &app.cancel)
        .await
        .unwrap();
    assert_eq!(
        result,
        RestoreResult {
            backup_id: manifest.backup_id.clone(),
            files_restored: 5,
            files_failed: 0,
            success: true,
            error_message: None,
        }
    );

    let images = app.gateway.list("images", "acme", &app.cancel).await.unwrap();
    assert_eq!(images, vec!["a.png", "b.png", "c.png"]);
    let notes = app
        .gateway
        .download("documents", "acme", "notes.txt", &app.cancel)
        .await
        .unwrap();
    assert_eq!(notes.data.as_ref(), b"quarterly notes");
    let b = app.gateway.download("images", "acme", "b.png", &app.cancel).await.unwrap();
    assert_eq!(b.data.as_ref(), create_tagged_png(1).as_slice());

    // Restoring leaves the backup intact and repeatable.
    let again = app
        .backups
        .restore_backup("acme", &manifest.backup_id, &app.cancel)
        .await
        .unwrap();
    assert!(again.success);
}

#[tokio::test]
async fn test_tampered_copy_is_reported_not_raised() {
    let app = setup_gateway().await;
    seed(&app).await;
    let manifest = app
        .backups
        .create_backup("acme", &containers(&["images"]), &app.cancel)
        .await
        .unwrap();

    let copy = format!("acme/{}.images.a.png", manifest.backup_id);
    let forged = create_tagged_png(42);
    app.put_raw("backups", &copy, forged.as_slice(), "image/png").await;

    let result = app
        .backups
        .restore_backup("acme", &manifest.backup_id, &app.cancel)
        .await
        .unwrap();
    assert!(!result.success);
    assert_eq!(result.files_restored, 2);
    assert_eq!(result.files_failed, 1);
    let message = result.error_message.unwrap();
    assert!(message.contains("images/a.png"), "{}", message);

    let a = app.gateway.download("images", "acme", "a.png", &app.cancel).await.unwrap();
    assert_eq!(a.data.as_ref(), create_tagged_png(0).as_slice());
}

#[tokio::test]
async fn test_missing_copy_is_a_partial_restore() {
    let app = setup_gateway().await;
    seed(&app).await;
    let manifest = app
        .backups
        .create_backup("acme", &containers(&["documents"]), &app.cancel)
        .await
        .unwrap();

    let copy = format!("acme/{}.documents.report.pdf", manifest.backup_id);
    assert!(app.delete_raw("backups", &copy).await);

    let result = app
        .backups
        .restore_backup("acme", &manifest.backup_id, &app.cancel)
        .await
        .unwrap();
    assert!(!result.success);
    assert_eq!(result.files_restored, 1);
    assert_eq!(result.files_failed, 1);
}

#[tokio::test]
async fn test_corrupt_manifest_is_reported_and_skipped() {
    let app = setup_gateway().await;
    let bogus_id = "bk-20260101000000-000000000000";
    app.put_raw(
        "backups",
        &format!("acme/{}.manifest.json", bogus_id),
        b"{\"not\": \"a manifest\"}",
        "application/json",
    )
    .await;

    let restore = app.backups.restore_backup("acme", bogus_id, &app.cancel).await;
    assert!(matches!(restore, Err(GatewayError::CorruptManifest { .. })));

    let listed = app.backups.list_backups("acme", &app.cancel).await.unwrap();
    assert!(listed.is_empty());
}

#[tokio::test]
async fn test_manifest_of_another_tenant_is_corrupt() {
    let app = setup_gateway().await;
    seed(&app).await;
    let manifest = app
        .backups
        .create_backup("beta", &containers(&["images"]), &app.cancel)
        .await
        .unwrap();

    // Plant beta's manifest under acme's prefix.
    let name = format!("{}.manifest.json", manifest.backup_id);
    let body = app
        .gateway
        .download("backups", "beta", &name, &app.cancel)
        .await
        .unwrap();
    app.put_raw("backups", &format!("acme/{}", name), body.data.as_ref(), "application/json")
        .await;

    let restore = app
        .backups
        .restore_backup("acme", &manifest.backup_id, &app.cancel)
        .await;
    assert!(matches!(restore, Err(GatewayError::CorruptManifest { .. })));
}

#[tokio::test]
async fn test_restore_unknown_backup_is_not_found() {
    let app = setup_gateway().await;
    let result = app
        .backups
        .restore_backup("acme", "bk-20260101000000-ffffffffffff", &app.cancel)
        .await;
    assert!(matches!(result, Err(GatewayError::NotFound(_))));

    let invalid = app.backups.restore_backup("acme", "../bk-1", &app.cancel).await;
    assert!(matches!(invalid, Err(GatewayError::InvalidPath(_))));
}

#[tokio::test]
async fn test_backups_are_listed_newest_first() {
    let app = setup_gateway().await;
    seed(&app).await;

    let first = app
        .backups
        .create_backup("acme", &containers(&["images"]), &app.cancel)
        .await
        .unwrap();
    let second = app
        .backups
        .create_backup("acme", &containers(&["documents"]), &app.cancel)
        .await
        .unwrap();

    let listed = app.backups.list_backups("acme", &app.cancel).await.unwrap();
    let ids: Vec<&str> = listed.iter().map(|b| b.backup_id.as_str()).collect();
    assert_eq!(ids, vec![second.backup_id.as_str(), first.backup_id.as_str()]);
}

#[tokio::test]
async fn test_delete_backup_removes_all_objects() {
    let app = setup_gateway().await;
    seed(&app).await;
    let keep = app
        .backups
        .create_backup("acme", &containers(&["documents"]), &app.cancel)
        .await
        .unwrap();
    let manifest = app
        .backups
        .create_backup("acme", &containers(&["images", "documents"]), &app.cancel)
        .await
        .unwrap();

    let deleted = app
        .backups
        .delete_backup("acme", &manifest.backup_id, &app.cancel)
        .await
        .unwrap();
    assert!(deleted);

    let remaining = app.gateway.list("backups", "acme", &app.cancel).await.unwrap();
    assert!(remaining.iter().all(|name| name.starts_with(&keep.backup_id)));
    assert_eq!(remaining.len(), 3);

    let again = app
        .backups
        .delete_backup("acme", &manifest.backup_id, &app.cancel)
        .await
        .unwrap();
    assert!(!again);

    let listed = app.backups.list_backups("acme", &app.cancel).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].backup_id, keep.backup_id);
}

#[tokio::test]
async fn test_backup_container_cannot_be_a_source() {
    let app = setup_gateway().await;
    let result = app
        .backups
        .create_backup("acme", &containers(&["backups"]), &app.cancel)
        .await;
    assert!(matches!(result, Err(GatewayError::UnknownContainer(_))));

    let unknown = app
        .backups
        .create_backup("acme", &containers(&["secrets"]), &app.cancel)
        .await;
    assert!(matches!(unknown, Err(GatewayError::UnknownContainer(_))));
}

#[tokio::test]
async fn test_outage_propagates_from_backup_operations() {
    let app = setup_gateway().await;
    seed(&app).await;
    let manifest = app
        .backups
        .create_backup("acme", &containers(&["images"]), &app.cancel)
        .await
        .unwrap();

    app.store.set_outage(true);

    let restore = app
        .backups
        .restore_backup("acme", &manifest.backup_id, &app.cancel)
        .await;
    assert!(matches!(restore, Err(GatewayError::StorageUnavailable { .. })));

    let create = app
        .backups
        .create_backup("acme", &containers(&["images"]), &app.cancel)
        .await;
    assert!(matches!(create, Err(GatewayError::StorageUnavailable { .. })));

    let list = app.backups.list_backups("acme", &app.cancel).await;
    assert!(matches!(list, Err(GatewayError::StorageUnavailable { .. })));
}

#[tokio::test]
async fn test_delete_backup_requires_a_backup_id() {
    let app = setup_gateway().await;
    let pdf = create_test_pdf();
    app.gateway
        .upload("backups", "acme", "report.pdf", pdf.as_slice(), "application/pdf", &app.cancel)
        .await
        .unwrap();

    for id in ["report", "report.pdf", "bk-1"] {
        let result = app.backups.delete_backup("acme", id, &app.cancel).await;
        assert!(matches!(result, Err(GatewayError::InvalidPath(_))), "{}", id);
    }

    let remaining = app.gateway.list("backups", "acme", &app.cancel).await.unwrap();
    assert_eq!(remaining, vec!["report.pdf"]);
}

#[tokio::test]
async fn test_delete_backup_leaves_other_objects_alone() {
    let app = setup_gateway().await;
    seed(&app).await;
    let manifest = app
        .backups
        .create_backup("acme", &containers(&["documents"]), &app.cancel)
        .await
        .unwrap();
    let pdf = create_test_pdf();
    app.gateway
        .upload("backups", "acme", "report.pdf", pdf.as_slice(), "application/pdf", &app.cancel)
        .await
        .unwrap();

    assert!(app
        .backups
        .delete_backup("acme", &manifest.backup_id, &app.cancel)
        .await
        .unwrap());

    let remaining = app.gateway.list("backups", "acme", &app.cancel).await.unwrap();
    assert_eq!(remaining, vec!["report.pdf"]);
}

#[tokio::test]
async fn test_delete_backup_sweeps_copies_without_manifest() {
    let app = setup_gateway().await;
    let orphan_id = "bk-20260101000000-0123456789ab";
    let png = create_tagged_png(3);
    app.put_raw("backups", &format!("acme/{}.images.a.png", orphan_id), png.as_slice(), "image/png")
        .await;

    let deleted = app
        .backups
        .delete_backup("acme", orphan_id, &app.cancel)
        .await
        .unwrap();
    assert!(deleted);
    assert!(app.gateway.list("backups", "acme", &app.cancel).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_backup_objects_cannot_be_written_or_deleted_directly() {
    let app = setup_gateway().await;
    seed(&app).await;
    let manifest = app
        .backups
        .create_backup("acme", &containers(&["images"]), &app.cancel)
        .await
        .unwrap();
    let manifest_file = format!("{}.manifest.json", manifest.backup_id);
    let copy = format!("{}.images.a.png", manifest.backup_id);

    let mut forged = manifest.clone();
    forged.created_at = "2099-01-01T00:00:00Z".parse().unwrap();
    let body = serde_json::to_vec(&forged).unwrap();
    let overwrite = app
        .gateway
        .upload("backups", "acme", &manifest_file, body.as_slice(), "application/json", &app.cancel)
        .await;
    assert!(matches!(overwrite, Err(GatewayError::InvalidPath(_))));

    let png = create_tagged_png(42);
    let replace = app
        .gateway
        .upload("backups", "acme", &copy, png.as_slice(), "image/png", &app.cancel)
        .await;
    assert!(matches!(replace, Err(GatewayError::InvalidPath(_))));

    let removed = app.gateway.delete("backups", "acme", &copy, &app.cancel).await;
    assert!(matches!(removed, Err(GatewayError::InvalidPath(_))));

    let listed = app.backups.list_backups("acme", &app.cancel).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].created_at, manifest.created_at);

    // Readable, and the rest of the container is open to callers.
    app.gateway
        .download("backups", "acme", &copy, &app.cancel)
        .await
        .unwrap();
    app.gateway
        .upload("backups", "acme", "a.png", png.as_slice(), "image/png", &app.cancel)
        .await
        .unwrap();

    let result = app
        .backups
        .restore_backup("acme", &manifest.backup_id, &app.cancel)
        .await
        .unwrap();
    assert!(result.success);
}

#[tokio::test]
async fn test_longest_file_name_is_backed_up() {
    let app = setup_gateway().await;
    let name = format!("{}.txt", "n".repeat(MAX_FILE_NAME_LEN - 4));
    app.gateway
        .upload("documents", "acme", &name, &b"long name"[..], "text/plain", &app.cancel)
        .await
        .unwrap();

    let manifest = app
        .backups
        .create_backup("acme", &containers(&["documents"]), &app.cancel)
        .await
        .unwrap();
    assert_eq!(manifest.file_count, 1);

    app.gateway.delete("documents", "acme", &name, &app.cancel).await.unwrap();
    let result = app
        .backups
        .restore_backup("acme", &manifest.backup_id, &app.cancel)
        .await
        .unwrap();
    assert!(result.success);
    let restored = app.gateway.download("documents", "acme", &name, &app.cancel).await.unwrap();
    assert_eq!(restored.data.as_ref(), b"long name");
}
