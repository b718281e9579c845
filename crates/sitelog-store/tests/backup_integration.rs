#![allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]

//! End-to-end export / restore against a file-backed store.

use std::fs;
use std::path::Path;

use data_encoding::BASE64;
use sitelog_crypto_core::backup_format::BackupPayload;
use sitelog_store::{
    export_backup, import_backup, import_image, preview_backup, LogDraft, LogStore,
    StorageLayout, StoreError, DEFAULT_DB_PASSPHRASE,
};

const APP_ID: &str = "com.example.constructionlog";

fn open(layout: &StorageLayout) -> LogStore {
    layout.ensure_dirs().unwrap();
    LogStore::open(&layout.db_path(), DEFAULT_DB_PASSPHRASE).unwrap()
}

/// One project, one log with one photo. Returns the log id and photo URI.
fn seed(store: &LogStore, layout: &StorageLayout, scratch: &Path) -> (i64, String) {
    let project = store.add_project("Site-1").unwrap();
    let photo = scratch.join("photo.jpg");
    fs::write(&photo, b"jpeg bytes").unwrap();
    let uri = import_image(&layout.media_dir(), &photo).unwrap();

    let id = store
        .save_log(
            None,
            &LogDraft {
                project_id: project,
                date: 1_717_200_000_000,
                weather: "晴".into(),
                location: "基坑".into(),
                content: "浇筑".into(),
                workers: Some(8),
                image_uris: vec![uri.clone()],
                ..LogDraft::default()
            },
        )
        .unwrap();
    (id, uri)
}

fn export(store: &LogStore, layout: &StorageLayout) -> Vec<u8> {
    let mut out = Vec::new();
    export_backup(store, layout, APP_ID, &mut out).unwrap();
    out
}

fn uri_path(uri: &str) -> &Path {
    Path::new(uri.strip_prefix("file://").unwrap())
}

#[test]
fn restore_brings_back_a_deleted_log_and_its_photo() {
    let dir = tempfile::tempdir().unwrap();
    let layout = StorageLayout::new(dir.path().join("data"));
    let store = open(&layout);
    let (id, uri) = seed(&store, &layout, dir.path());
    let before = store.get_log(id).unwrap().unwrap();

    let backup = export(&store, &layout);

    store.delete_forever(id).unwrap();
    store.cleanup_orphaned_images(&layout.media_dir()).unwrap();
    assert!(!uri_path(&uri).exists());
    store.close().unwrap();

    let outcome = import_backup(&layout, APP_ID, backup.as_slice()).unwrap();
    assert!(outcome.restart_required);
    assert_eq!(outcome.images_restored, 1);

    let store = open(&layout);
    let after = store.get_log(id).unwrap().unwrap();
    assert_eq!(after, before);
    assert_eq!(fs::read(uri_path(&uri)).unwrap(), b"jpeg bytes");
    assert_eq!(store.list_projects().unwrap()[0].name, "Site-1");
}

#[test]
fn restore_replaces_the_media_directory() {
    let dir = tempfile::tempdir().unwrap();
    let layout = StorageLayout::new(dir.path().join("data"));
    let store = open(&layout);
    seed(&store, &layout, dir.path());
    let backup = export(&store, &layout);
    store.close().unwrap();

    let stray = layout.media_dir().join("IMG_9_9.jpg");
    fs::write(&stray, b"added after export").unwrap();

    import_backup(&layout, APP_ID, backup.as_slice()).unwrap();
    assert!(!stray.exists());
    assert_eq!(fs::read_dir(layout.media_dir()).unwrap().count(), 1);
}

#[test]
fn export_leaves_the_store_usable() {
    let dir = tempfile::tempdir().unwrap();
    let layout = StorageLayout::new(dir.path().join("data"));
    let store = open(&layout);
    seed(&store, &layout, dir.path());

    export(&store, &layout);
    store.add_project("Site-2").unwrap();
    assert_eq!(store.list_projects().unwrap().len(), 2);
}

#[test]
fn preview_reads_without_touching_live_files() {
    let dir = tempfile::tempdir().unwrap();
    let layout = StorageLayout::new(dir.path().join("data"));
    let store = open(&layout);
    seed(&store, &layout, dir.path());
    let backup = export(&store, &layout);

    let preview = preview_backup(&backup, APP_ID).unwrap();
    assert_eq!(preview.image_count, 1);
    assert_eq!(preview.metadata.app, "construction-log");
    assert_eq!(preview.metadata.version, 1);
}

#[test]
fn envelope_has_the_documented_shape() {
    let dir = tempfile::tempdir().unwrap();
    let layout = StorageLayout::new(dir.path().join("data"));
    let store = open(&layout);
    seed(&store, &layout, dir.path());
    let backup = export(&store, &layout);

    let json: serde_json::Value = serde_json::from_slice(&backup).unwrap();
    assert_eq!(json["version"], 1);
    assert_eq!(json["algorithm"], "AES/GCM/NoPadding");
    let sha = json["sha256"].as_str().unwrap();
    assert_eq!(sha.len(), 64);
    assert!(sha.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    let iv = BASE64.decode(json["iv"].as_str().unwrap().as_bytes()).unwrap();
    assert_eq!(iv.len(), 12);
}

#[test]
fn tampered_backup_is_an_integrity_error_and_changes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let layout = StorageLayout::new(dir.path().join("data"));
    let store = open(&layout);
    let (id, _) = seed(&store, &layout, dir.path());
    let backup = export(&store, &layout);

    let mut payload = BackupPayload::from_json(&backup).unwrap();
    let mut data = BASE64.decode(payload.data.as_bytes()).unwrap();
    data[0] ^= 0x01;
    payload.data = BASE64.encode(&data);
    let tampered = payload.to_json().unwrap();

    store.delete_forever(id).unwrap();
    store.close().unwrap();
    let db_before = fs::read(layout.db_path()).unwrap();

    let err = import_backup(&layout, APP_ID, tampered.as_slice()).unwrap_err();
    assert!(matches!(err, StoreError::Integrity(_)));
    assert!(err.is_integrity());
    assert_eq!(fs::read(layout.db_path()).unwrap(), db_before);
}

#[test]
fn foreign_app_id_cannot_open_the_backup() {
    let dir = tempfile::tempdir().unwrap();
    let layout = StorageLayout::new(dir.path().join("data"));
    let store = open(&layout);
    seed(&store, &layout, dir.path());
    let backup = export(&store, &layout);

    assert!(matches!(
        preview_backup(&backup, "com.example.other"),
        Err(StoreError::Integrity(_))
    ));
}

#[test]
fn unsupported_version_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let layout = StorageLayout::new(dir.path().join("data"));
    let store = open(&layout);
    seed(&store, &layout, dir.path());
    let backup = export(&store, &layout);

    let mut json: serde_json::Value = serde_json::from_slice(&backup).unwrap();
    json["version"] = serde_json::json!(2);
    let bumped = serde_json::to_vec(&json).unwrap();

    assert!(matches!(
        import_backup(&layout, APP_ID, bumped.as_slice()),
        Err(StoreError::UnsupportedVersion(2))
    ));
}

#[test]
fn non_json_input_is_a_format_error() {
    let dir = tempfile::tempdir().unwrap();
    let layout = StorageLayout::new(dir.path().join("data"));
    assert!(matches!(
        import_backup(&layout, APP_ID, &b"PK\x03\x04 raw zip"[..]),
        Err(StoreError::Format(_))
    ));
}
