#![allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]

//! Integration tests for log saving, image sets and queries.

use proptest::prelude::*;
use sitelog_store::{LogDb, LogDraft, LogStore, StoreError, DEFAULT_DB_PASSPHRASE};

const DAY: i64 = 86_400_000;
const JUNE_1: i64 = 1_717_200_000_000;

fn store_with_project() -> (LogStore, i64) {
    let store = LogStore::from_db(LogDb::open_in_memory(DEFAULT_DB_PASSPHRASE).unwrap());
    let project = store.add_project("Site-1").unwrap();
    (store, project)
}

fn draft(project_id: i64, date: i64, images: &[&str]) -> LogDraft {
    LogDraft {
        project_id,
        date,
        weather: "晴".into(),
        location: "基坑".into(),
        content: "浇筑".into(),
        workers: Some(12),
        worker_names: "张三, 李四".into(),
        safety: "OK".into(),
        remark: String::new(),
        image_uris: images.iter().map(|s| (*s).to_string()).collect(),
    }
}

#[test]
fn image_set_is_replaced_not_merged() {
    let (store, project) = store_with_project();
    let id = store
        .save_log(None, &draft(project, JUNE_1, &["file:///A.jpg", "file:///B.jpg"]))
        .unwrap();

    store
        .save_log(Some(id), &draft(project, JUNE_1, &["file:///B.jpg", "file:///C.jpg"]))
        .unwrap();

    let log = store.get_log(id).unwrap().unwrap();
    assert_eq!(log.image_uris(), vec!["file:///B.jpg", "file:///C.jpg"]);
}

#[test]
fn update_overwrites_fields_and_bumps_updated_at() {
    let (store, project) = store_with_project();
    let id = store.save_log(None, &draft(project, JUNE_1, &[])).unwrap();
    let before = store.get_log(id).unwrap().unwrap().log;

    std::thread::sleep(std::time::Duration::from_millis(5));
    let mut edited = draft(project, JUNE_1 + DAY, &[]);
    edited.content = "养护".into();
    edited.workers = None;
    store.save_log(Some(id), &edited).unwrap();

    let after = store.get_log(id).unwrap().unwrap().log;
    assert_eq!(after.content, "养护");
    assert_eq!(after.workers, None);
    assert_eq!(after.date, JUNE_1 + DAY);
    assert_eq!(after.created_at, before.created_at);
    assert!(after.updated_at > before.updated_at);
}

#[test]
fn updating_a_missing_log_is_not_found() {
    let (store, project) = store_with_project();
    assert!(matches!(
        store.save_log(Some(404), &draft(project, JUNE_1, &[])),
        Err(StoreError::NotFound(_))
    ));
}

#[test]
fn active_logs_are_newest_date_first() {
    let (store, project) = store_with_project();
    let d1 = store.save_log(None, &draft(project, JUNE_1, &[])).unwrap();
    let d3 = store.save_log(None, &draft(project, JUNE_1 + 2 * DAY, &[])).unwrap();
    let d2 = store.save_log(None, &draft(project, JUNE_1 + DAY, &[])).unwrap();

    let ids: Vec<i64> = store
        .list_active_logs(project)
        .unwrap()
        .iter()
        .map(|l| l.log.id)
        .collect();
    assert_eq!(ids, vec![d3, d2, d1]);
}

#[test]
fn date_range_is_half_open_and_ascending() {
    let (store, project) = store_with_project();
    let before = store.save_log(None, &draft(project, JUNE_1 - 1, &[])).unwrap();
    let start = store.save_log(None, &draft(project, JUNE_1, &[])).unwrap();
    let inside = store.save_log(None, &draft(project, JUNE_1 + DAY / 2, &[])).unwrap();
    let end = store.save_log(None, &draft(project, JUNE_1 + DAY, &[])).unwrap();
    let trashed = store.save_log(None, &draft(project, JUNE_1 + 10, &[])).unwrap();
    store.move_to_trash(trashed).unwrap();

    let ids: Vec<i64> = store
        .logs_in_date_range(project, JUNE_1, JUNE_1 + DAY)
        .unwrap()
        .iter()
        .map(|l| l.log.id)
        .collect();
    assert_eq!(ids, vec![start, inside]);
    assert!(!ids.contains(&before));
    assert!(!ids.contains(&end));
}

#[test]
fn logs_are_scoped_to_their_project() {
    let (store, site1) = store_with_project();
    let site2 = store.add_project("Site-2").unwrap();
    store.save_log(None, &draft(site1, JUNE_1, &[])).unwrap();

    assert_eq!(store.list_active_logs(site1).unwrap().len(), 1);
    assert!(store.list_active_logs(site2).unwrap().is_empty());
}

#[test]
fn moving_a_log_between_projects() {
    let (store, site1) = store_with_project();
    let site2 = store.add_project("Site-2").unwrap();
    let id = store.save_log(None, &draft(site1, JUNE_1, &[])).unwrap();

    store.save_log(Some(id), &draft(site2, JUNE_1, &[])).unwrap();
    assert!(store.list_active_logs(site1).unwrap().is_empty());
    assert_eq!(store.list_active_logs(site2).unwrap().len(), 1);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// After any sequence of saves, the log carries exactly the last list.
    #[test]
    fn last_save_wins(
        sets in proptest::collection::vec(
            proptest::collection::vec("[a-d]", 0..5),
            1..5,
        ),
    ) {
        let (store, project) = store_with_project();
        let mut id = None;
        for set in &sets {
            let uris: Vec<String> = set.iter().map(|s| format!("file:///{s}.jpg")).collect();
            let refs: Vec<&str> = uris.iter().map(String::as_str).collect();
            id = Some(store.save_log(id, &draft(project, JUNE_1, &refs)).unwrap());
        }

        let expected: Vec<String> = sets
            .last()
            .unwrap()
            .iter()
            .map(|s| format!("file:///{s}.jpg"))
            .collect();
        let log = store.get_log(id.unwrap()).unwrap().unwrap();
        let actual: Vec<String> = log.images.iter().map(|i| i.image_uri.clone()).collect();
        prop_assert_eq!(actual, expected);
    }
}
