#![allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]

//! Archive packing and extraction against real files.

use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;

use sitelog_store::archive::{self, ArchiveSources};
use sitelog_store::StoreError;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

fn fixture(root: &Path) {
    fs::write(root.join("db"), b"main database bytes").unwrap();
    fs::write(root.join("db-wal"), b"").unwrap();
    let media = root.join("Pictures");
    fs::create_dir_all(&media).unwrap();
    fs::write(media.join("IMG_2_1.jpg"), b"second").unwrap();
    fs::write(media.join("IMG_1_1.jpg"), b"first").unwrap();
}

fn pack(root: &Path) -> Vec<u8> {
    archive::pack(
        &ArchiveSources {
            db_file: &root.join("db"),
            wal_file: Some(&root.join("db-wal")),
            shm_file: Some(&root.join("db-shm")),
            media_dir: &root.join("Pictures"),
        },
        1_717_200_000_000,
    )
    .unwrap()
    .bytes
}

fn zip_of(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in entries {
        zip.start_file(*name, SimpleFileOptions::default()).unwrap();
        zip.write_all(data).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

const METADATA: &[u8] = br#"{"version":1,"exportTime":5,"app":"construction-log"}"#;

#[test]
fn entries_are_written_in_a_fixed_order() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path());
    let bytes = pack(dir.path());

    let mut zip = ZipArchive::new(Cursor::new(bytes)).unwrap();
    let names: Vec<String> = (0..zip.len())
        .map(|i| zip.by_index(i).unwrap().name().to_string())
        .collect();
    assert_eq!(
        names,
        vec![
            "database.sqlite",
            "database.sqlite-wal",
            "images/IMG_1_1.jpg",
            "images/IMG_2_1.jpg",
            "metadata.json",
        ]
    );
}

#[test]
fn unpack_reproduces_the_files() {
    let dir = tempfile::tempdir().unwrap();
    fixture(dir.path());
    let bytes = pack(dir.path());

    let extracted = archive::unpack(&bytes, &dir.path().join("cache")).unwrap();
    assert_eq!(fs::read(extracted.db_file()).unwrap(), b"main database bytes");
    assert_eq!(fs::read(extracted.wal_file().unwrap()).unwrap(), b"");
    assert!(extracted.shm_file().is_none());
    assert_eq!(
        fs::read(extracted.images_dir().join("IMG_1_1.jpg")).unwrap(),
        b"first"
    );
    assert_eq!(extracted.listing.metadata.export_time, 1_717_200_000_000);
    assert_eq!(extracted.listing.metadata.app, "construction-log");

    let root = extracted.root().to_path_buf();
    extracted.cleanup().unwrap();
    assert!(!root.exists());
}

#[test]
fn missing_database_is_rejected() {
    let bytes = zip_of(&[("metadata.json", METADATA)]);
    assert!(matches!(archive::inspect(&bytes), Err(StoreError::Format(_))));
}

#[test]
fn missing_metadata_is_rejected() {
    let bytes = zip_of(&[("database.sqlite", b"db")]);
    assert!(matches!(archive::inspect(&bytes), Err(StoreError::Format(_))));
}

#[test]
fn escaping_entry_is_rejected_before_extraction() {
    let dir = tempfile::tempdir().unwrap();
    let bytes = zip_of(&[
        ("database.sqlite", b"db"),
        ("../outside.txt", b"x"),
        ("metadata.json", METADATA),
    ]);
    assert!(matches!(
        archive::unpack(&bytes, &dir.path().join("cache")),
        Err(StoreError::Format(_))
    ));
    assert!(!dir.path().join("outside.txt").exists());
}

#[test]
fn unknown_entries_are_ignored() {
    let bytes = zip_of(&[
        ("database.sqlite", b"db"),
        ("notes/readme.txt", b"hello"),
        ("metadata.json", METADATA),
    ]);
    let listing = archive::inspect(&bytes).unwrap();
    assert!(listing.images.is_empty());
    assert!(!listing.has_wal);
}

#[test]
fn garbage_is_a_format_error() {
    assert!(matches!(
        archive::inspect(b"definitely not a zip"),
        Err(StoreError::Format(_))
    ));
}
