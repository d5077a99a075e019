mod common;

use std::sync::{Arc, Mutex};

use config_file::cache::CacheBackend;
use config_file::storage::models::{ConfigFileRecord, FileStatus};
use config_file::sync::{ObserverRegistry, SyncError, SyncMode, ToFile, TrackedFileObserver};
use config_file::upload::ParentRef;

use common::*;

#[test]
fn test_upload_derives_id_and_caches_bytes() {
    let (_dir, state) = test_state();

    let record = state
        .uploader
        .upload("report.TXT", b"quarterly numbers", None)
        .unwrap();
    assert_eq!(record.id, "report_txt");
    assert_eq!(record.uri, "public://neo-file/report.TXT");
    assert_eq!(record.config_uri(), "config://files/report.TXT");

    let file = state.engine.file_for(&record).unwrap().expect("file should exist");
    assert_eq!(file.status, FileStatus::Temporary);
    assert_eq!(record.changed, Some(file.changed_at.timestamp()));

    assert_eq!(
        std::fs::read(public_path(&state, "report.TXT")).unwrap(),
        b"quarterly numbers"
    );
    assert_eq!(
        state.engine.get_cache(&record),
        Some(b"quarterly numbers".to_vec())
    );
}

#[test]
fn test_first_save_creates_public_file_from_config() {
    let (_dir, state) = test_state();
    write_config_copy(&state, "report.TXT", b"from config");

    let mut record = record_for("report_txt", "report.TXT");
    state.engine.save(&mut record, SyncMode::Normal).unwrap();

    let file = state.engine.file_for(&record).unwrap().expect("file should exist");
    assert!(file.is_permanent());
    assert_eq!(file.byte_size, 11);
    assert_eq!(file.mime_type, "text/plain");
    assert_eq!(record.changed, Some(file.changed_at.timestamp()));
    assert_eq!(
        std::fs::read(public_path(&state, "report.TXT")).unwrap(),
        b"from config"
    );

    let stored = state.db.get_config_file("report_txt").unwrap().unwrap();
    assert_eq!(stored, record);
}

#[test]
fn test_to_file_keeps_existing_file() {
    let (_dir, state) = test_state();
    let record = state.uploader.upload("notes.txt", b"public", None).unwrap();
    write_config_copy(&state, "notes.txt", b"config");

    let outcome = state.engine.to_file(&record).unwrap();
    assert!(matches!(outcome, ToFile::AlreadyExisted));
    assert_eq!(
        std::fs::read(public_path(&state, "notes.txt")).unwrap(),
        b"public"
    );
}

#[test]
fn test_to_file_without_config_copy_fails() {
    let (_dir, state) = test_state();
    let record = record_for("ghost_txt", "ghost.txt");

    let result = state.engine.to_file(&record);
    assert!(matches!(result, Err(SyncError::SourceUnreadable { .. })));
    assert!(state.engine.file_for(&record).unwrap().is_none());
}

#[test]
fn test_failed_create_still_saves_record() {
    let (_dir, state) = test_state();
    let mut record = record_for("ghost_txt", "ghost.txt");

    state.engine.save(&mut record, SyncMode::Normal).unwrap();

    assert!(state.db.get_config_file("ghost_txt").unwrap().is_some());
    assert_eq!(record.changed, None);
}

#[test]
fn test_read_file_restores_missing_bytes_from_cache() {
    let (_dir, state) = test_state();
    let record = state.uploader.upload("notes.txt", b"keep me", None).unwrap();

    std::fs::remove_dir_all(state.config.storage.public_path.join("neo-file")).unwrap();

    let (file, data) = state.engine.read_file(&record).unwrap();
    assert_eq!(data, b"keep me");
    assert_eq!(file.uri, "public://neo-file/notes.txt");
    assert!(public_path(&state, "notes.txt").exists());
}

#[test]
fn test_validate_without_cache_reports_missing() {
    let (_dir, state) = test_state();
    let record = state.uploader.upload("notes.txt", b"gone", None).unwrap();
    state.engine.remove_cache(&record).unwrap();
    std::fs::remove_file(public_path(&state, "notes.txt")).unwrap();

    let file = state.engine.file_for(&record).unwrap().unwrap();
    assert!(!state.engine.validate_file(&record, &file));

    let result = state.engine.read_file(&record);
    assert!(matches!(result, Err(SyncError::SourceUnreadable { .. })));
}

#[test]
fn test_to_config_copies_and_drops_cache() {
    let (_dir, state) = test_state();
    let record = state.uploader.upload("notes.txt", b"export me", None).unwrap();

    let uri = state.engine.to_config(&record).unwrap();
    assert_eq!(uri, "config://files/notes.txt");
    assert_eq!(
        std::fs::read(config_path(&state, "notes.txt")).unwrap(),
        b"export me"
    );
    assert_eq!(state.engine.get_cache(&record), None);

    let file = state.engine.file_for(&record).unwrap().unwrap();
    assert!(file.is_permanent());
}

#[test]
fn test_failed_to_config_keeps_cache() {
    let (_dir, state) = test_state();
    let record = state.uploader.upload("notes.txt", b"cached", None).unwrap();

    // A directory in the way of the destination makes the copy fail.
    std::fs::create_dir_all(config_path(&state, "notes.txt")).unwrap();

    let result = state.engine.to_config(&record);
    assert!(matches!(result, Err(SyncError::CopyFailed { .. })));
    assert_eq!(state.engine.get_cache(&record), Some(b"cached".to_vec()));
}

#[test]
fn test_transfers_without_file_fail() {
    let (_dir, state) = test_state();
    let record = record_for("ghost_txt", "ghost.txt");

    assert!(matches!(
        state.engine.to_config(&record),
        Err(SyncError::NoAssociatedFile(_))
    ));
    assert!(matches!(
        state.engine.to_cache(&record),
        Err(SyncError::NoAssociatedFile(_))
    ));
    assert!(matches!(
        state.engine.remove_cache(&record),
        Err(SyncError::NoAssociatedFile(_))
    ));
    assert_eq!(state.engine.get_cache(&record), None);
}

#[test]
fn test_importing_save_skips_cache_refresh() {
    let (_dir, state) = test_state();
    let mut record = state.uploader.upload("notes.txt", b"v1", None).unwrap();
    std::fs::write(public_path(&state, "notes.txt"), b"v2").unwrap();

    state.engine.save(&mut record, SyncMode::Importing).unwrap();
    assert_eq!(state.engine.get_cache(&record), Some(b"v1".to_vec()));

    state.engine.save(&mut record, SyncMode::Normal).unwrap();
    assert_eq!(state.engine.get_cache(&record), Some(b"v2".to_vec()));
}

#[test]
fn test_delete_without_snapshot_removes_everything() {
    let (_dir, state) = test_state();
    let record = state.uploader.upload("notes.txt", b"bye", None).unwrap();
    write_config_copy(&state, "notes.txt", b"bye");
    let file = state.engine.file_for(&record).unwrap().unwrap();

    state
        .engine
        .delete(std::slice::from_ref(&record), SyncMode::Normal)
        .unwrap();

    assert!(state.db.get_config_file("notes_txt").unwrap().is_none());
    assert!(state.db.get_managed_file(&file.id).unwrap().is_none());
    assert!(!config_path(&state, "notes.txt").exists());
    assert!(!public_path(&state, "notes.txt").exists());
    assert!(state.cache.get("notes_txt").unwrap().is_none());
}

#[test]
fn test_report_lifecycle_keeps_config_copy_when_snapshot_exists() {
    let (_dir, state) = test_state();
    let record = state
        .uploader
        .upload("report.TXT", b"quarterly numbers", None)
        .unwrap();
    assert_eq!(record.id, "report_txt");

    let exported = state.config_sync.export().unwrap();
    assert_eq!(exported.files_exported, 1);
    assert!(snapshot_file(&state, "report_txt").exists());
    assert_eq!(
        std::fs::read(config_path(&state, "report.TXT")).unwrap(),
        b"quarterly numbers"
    );
    assert!(state.cache.get("report_txt").unwrap().is_none());
    assert!(state.engine.has_config(&record));

    let file = state.engine.file_for(&record).unwrap().unwrap();
    state.engine.delete(&[record], SyncMode::Normal).unwrap();

    assert!(config_path(&state, "report.TXT").exists());
    assert!(state.db.get_managed_file(&file.id).unwrap().is_none());
    assert!(state.db.get_config_file("report_txt").unwrap().is_none());
}

#[test]
fn test_delete_with_snapshot_keeps_cache_entry() {
    let (_dir, state) = test_state();
    let record = state.uploader.upload("notes.txt", b"cached", None).unwrap();
    std::fs::write(snapshot_file(&state, "notes_txt"), "{}").unwrap();

    state.engine.delete(&[record], SyncMode::Normal).unwrap();

    assert!(state.cache.get("notes_txt").unwrap().is_some());
}

#[test]
fn test_importing_delete_removes_config_copy_despite_snapshot() {
    let (_dir, state) = test_state();
    let record = state.uploader.upload("notes.txt", b"bye", None).unwrap();
    write_config_copy(&state, "notes.txt", b"bye");
    std::fs::write(snapshot_file(&state, "notes_txt"), "{}").unwrap();

    state.engine.delete(&[record], SyncMode::Importing).unwrap();

    assert!(!config_path(&state, "notes.txt").exists());
    assert!(state.cache.get("notes_txt").unwrap().is_none());
}

#[test]
fn test_delete_file_cascades_to_record() {
    let (_dir, state) = test_state();
    let record = state.uploader.upload("notes.txt", b"bye", None).unwrap();
    let file = state.engine.file_for(&record).unwrap().unwrap();

    assert!(state.engine.delete_file(&file.id, SyncMode::Normal).unwrap());

    assert!(state.db.get_config_file(&record.id).unwrap().is_none());
    assert!(state.db.get_managed_file(&file.id).unwrap().is_none());
    assert!(!public_path(&state, "notes.txt").exists());

    assert!(!state.engine.delete_file(&file.id, SyncMode::Normal).unwrap());
}

#[test]
fn test_delete_same_record_twice_in_batch() {
    let (_dir, state) = test_state();
    let record = state.uploader.upload("notes.txt", b"bye", None).unwrap();

    state
        .engine
        .delete(&[record.clone(), record], SyncMode::Normal)
        .unwrap();
    assert!(state.db.get_all_config_files().unwrap().is_empty());
}

#[derive(Default)]
struct RecordingObserver {
    events: Mutex<Vec<String>>,
}

impl TrackedFileObserver for RecordingObserver {
    fn on_tracked_file_updated(&self, record: &ConfigFileRecord) {
        self.events
            .lock()
            .unwrap()
            .push(format!("updated:{}", record.id));
    }

    fn on_tracked_file_deleted(&self, record: &ConfigFileRecord) {
        self.events
            .lock()
            .unwrap()
            .push(format!("deleted:{}", record.id));
    }
}

#[test]
fn test_observers_follow_parent_type() {
    let dir = tempfile::tempdir().unwrap();
    let observer = Arc::new(RecordingObserver::default());
    let mut observers = ObserverRegistry::new();
    observers.register("block_content", observer.clone());
    let state = state_with(config_in(dir.path()), observers);

    // No parent yet, nothing to notify.
    let record = state.uploader.upload("notes.txt", b"hello", None).unwrap();
    assert!(observer.events.lock().unwrap().is_empty());

    let parent = ParentRef {
        entity_type: "block_content".to_string(),
        entity_id: "42".to_string(),
        field: Some("field_attachment".to_string()),
    };
    let record = state.uploader.attach(&record.id, &parent, &[]).unwrap();

    let other = state.uploader.upload("other.txt", b"x", None).unwrap();
    let unknown = ParentRef {
        entity_type: "node".to_string(),
        entity_id: "7".to_string(),
        field: None,
    };
    let other = state.uploader.attach(&other.id, &unknown, &[]).unwrap();

    state.engine.delete(&[record, other], SyncMode::Normal).unwrap();

    assert_eq!(
        *observer.events.lock().unwrap(),
        vec!["updated:notes_txt", "deleted:notes_txt"]
    );
}
