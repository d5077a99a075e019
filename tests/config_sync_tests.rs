mod common;

use config_file::cache::CacheBackend;
use config_file::storage::models::{DependencyKind, FileStatus};
use config_file::sync::ObserverRegistry;
use config_file::upload::ParentRef;

use common::*;

#[test]
fn test_export_writes_snapshots_and_files() {
    let (_dir, state) = test_state();
    let record = state.uploader.upload("report.TXT", b"numbers", None).unwrap();
    state
        .uploader
        .attach(
            &record.id,
            &ParentRef {
                entity_type: "block_content".to_string(),
                entity_id: "9".to_string(),
                field: None,
            },
            &[(DependencyKind::Module, "block".to_string())],
        )
        .unwrap();

    let report = state.config_sync.export().unwrap();
    assert_eq!(report.snapshots_written, 1);
    assert_eq!(report.files_exported, 1);
    assert_eq!(report.files_failed, 0);
    assert!(!report.files_skipped);

    let snapshot: serde_json::Value =
        serde_json::from_slice(&std::fs::read(snapshot_file(&state, "report_txt")).unwrap())
            .unwrap();
    assert_eq!(snapshot["id"], "report_txt");
    assert_eq!(snapshot["uri"], "public://neo-file/report.TXT");
    assert_eq!(snapshot["dependencies"]["module"][0], "block");

    assert_eq!(
        std::fs::read(config_path(&state, "report.TXT")).unwrap(),
        b"numbers"
    );
}

#[test]
fn test_export_removes_stale_snapshots_only() {
    let (_dir, state) = test_state();
    state.uploader.upload("a.txt", b"a", None).unwrap();

    let sync_dir = state.config.storage.config_sync_directory.clone();
    std::fs::write(snapshot_file(&state, "gone_txt"), "{}").unwrap();
    std::fs::write(sync_dir.join("system.site.yml"), "{}").unwrap();

    let report = state.config_sync.export().unwrap();
    assert_eq!(report.snapshots_removed, 1);
    assert!(!snapshot_file(&state, "gone_txt").exists());
    assert!(sync_dir.join("system.site.yml").exists());
}

#[test]
fn test_import_into_fresh_site_creates_files() {
    let source_dir = tempfile::tempdir().unwrap();
    let source = state_with(config_in(source_dir.path()), ObserverRegistry::new());
    source.uploader.upload("report.TXT", b"numbers", None).unwrap();
    source.config_sync.export().unwrap();

    // Second site sharing the same sync directory.
    let target_dir = tempfile::tempdir().unwrap();
    let mut config = config_in(target_dir.path());
    config.storage.config_sync_directory = source.config.storage.config_sync_directory.clone();
    let target = state_with(config, ObserverRegistry::new());

    let report = target.config_sync.import().unwrap();
    assert_eq!(report.records_saved, 1);
    assert_eq!(report.records_deleted, 0);
    assert_eq!(report.files_validated, 0);

    let record = target
        .db
        .get_config_file("report_txt")
        .unwrap()
        .expect("record should be imported");
    let file = target.engine.file_for(&record).unwrap().expect("file should exist");
    assert_eq!(file.status, FileStatus::Permanent);
    assert_eq!(record.changed, Some(file.changed_at.timestamp()));
    assert_eq!(
        std::fs::read(public_path(&target, "report.TXT")).unwrap(),
        b"numbers"
    );
    // Importing never seeds the fallback cache.
    assert!(target.cache.get("report_txt").unwrap().is_none());
}

#[test]
fn test_import_deletes_records_missing_from_sync() {
    let (_dir, state) = test_state();
    let record = state.uploader.upload("a.txt", b"a", None).unwrap();
    state.config_sync.export().unwrap();
    let file = state.engine.file_for(&record).unwrap().unwrap();

    std::fs::remove_file(snapshot_file(&state, "a_txt")).unwrap();

    let report = state.config_sync.import().unwrap();
    assert_eq!(report.records_deleted, 1);
    assert!(state.db.get_config_file("a_txt").unwrap().is_none());
    assert!(state.db.get_managed_file(&file.id).unwrap().is_none());
    assert!(!config_path(&state, "a.txt").exists());
}

#[test]
fn test_import_restores_from_cache_before_purging() {
    let (_dir, state) = test_state();
    let record = state.uploader.upload("a.txt", b"alpha", None).unwrap();
    std::fs::write(
        snapshot_file(&state, "a_txt"),
        serde_json::to_vec(&record).unwrap(),
    )
    .unwrap();

    let report = state.config_sync.import().unwrap();
    assert_eq!(report.files_validated, 1);
    assert_eq!(report.cache_entries_purged, 1);
    assert_eq!(report.records_saved, 1);
    assert_eq!(std::fs::read(public_path(&state, "a.txt")).unwrap(), b"alpha");
}

#[test]
fn test_import_skips_malformed_snapshots() {
    let (_dir, state) = test_state();
    std::fs::write(snapshot_file(&state, "broken"), r#"{"id": 1}"#).unwrap();
    std::fs::write(snapshot_file(&state, "plain"), "id: plain\nuri: x\n").unwrap();

    let report = state.config_sync.import().unwrap();
    assert_eq!(report.records_skipped, 2);
    assert_eq!(report.records_saved, 0);
}

#[test]
fn test_unparsable_snapshot_does_not_block_other_records() {
    let (_dir, state) = test_state();
    state.uploader.upload("a.txt", b"alpha", None).unwrap();
    state.uploader.upload("b.txt", b"beta", None).unwrap();
    state.config_sync.export().unwrap();

    std::fs::write(
        snapshot_file(&state, "b_txt"),
        "id: b_txt\nuri: 'public://neo-file/b.txt'\n",
    )
    .unwrap();

    let report = state.config_sync.import().unwrap();
    assert_eq!(report.records_saved, 1);
    assert_eq!(report.records_skipped, 1);
    assert_eq!(report.records_deleted, 0);

    assert!(state.db.get_config_file("a_txt").unwrap().is_some());
    assert!(state.db.get_config_file("b_txt").unwrap().is_some());
    assert_eq!(std::fs::read(public_path(&state, "b.txt")).unwrap(), b"beta");
}

#[test]
fn test_import_skips_snapshot_outside_public_area() {
    let (_dir, state) = test_state();
    write_config_copy(&state, "x.txt", b"config bytes");

    let mut record = record_for("x_txt", "x.txt");
    record.uri = "config://files/x.txt".to_string();
    std::fs::write(
        snapshot_file(&state, "x_txt"),
        serde_json::to_vec(&record).unwrap(),
    )
    .unwrap();

    let report = state.config_sync.import().unwrap();
    assert_eq!(report.records_skipped, 1);
    assert_eq!(report.records_saved, 0);
    assert!(state.db.get_config_file("x_txt").unwrap().is_none());
    assert_eq!(
        std::fs::read(config_path(&state, "x.txt")).unwrap(),
        b"config bytes"
    );
}
