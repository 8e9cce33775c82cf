use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime};

use editor_state::{DocumentSession, EditorStateError, Motion, Recovery};
use persistence::{AutosaveConfig, SnapshotSource};

fn fast_config() -> AutosaveConfig {
    AutosaveConfig::default().with_interval(Duration::from_millis(1))
}

fn set_mtime(path: &std::path::Path, when: SystemTime) {
    std::fs::OpenOptions::new()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(when)
        .unwrap();
}

#[test]
fn test_open_missing_path_gives_empty_document() {
    let dir = tempfile::tempdir().unwrap();
    let doc = DocumentSession::open(
        dir.path().join("new.txt"),
        AutosaveConfig::default(),
        tracing::Span::none(),
    )
    .unwrap();

    assert!(doc.is_empty());
    assert_eq!(doc.line_count(), 1);
    assert_eq!(doc.side_file().path(), dir.path().join(".new.txt.swp"));
}

#[test]
fn test_open_existing_document() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.txt");
    std::fs::write(&path, "first\nsecond\n").unwrap();

    let mut doc = DocumentSession::open(&path, AutosaveConfig::default(), tracing::Span::none()).unwrap();

    assert_eq!(doc.line_count(), 3);
    assert_eq!(doc.line(1).as_deref(), Some("second"));
    assert_eq!(doc.line(3), None);

    doc.move_cursor(Motion::Down);
    doc.move_cursor(Motion::LineEnd);
    doc.insert_text("!").unwrap();

    assert_eq!(doc.text(), "first\nsecond!\n");
    assert_eq!(doc.path(), Some(path.as_path()));
}

#[test]
fn test_vertical_moves_keep_preferred_column() {
    let dir = tempfile::tempdir().unwrap();
    let mut doc = DocumentSession::untitled_in(dir.path(), AutosaveConfig::default(), tracing::Span::none());

    doc.insert_text("0123456789\n012\n01234567890123456789").unwrap();
    doc.move_cursor(Motion::Up);
    doc.move_cursor(Motion::Up);
    doc.move_cursor(Motion::LineStart);
    for _ in 0..8 {
        doc.move_cursor(Motion::Right);
    }

    doc.move_cursor(Motion::Down);
    assert_eq!((doc.cursor_line(), doc.cursor_column()), (1, 3));

    doc.move_cursor(Motion::Down);
    assert_eq!((doc.cursor_line(), doc.cursor_column()), (2, 8));
}

#[test]
fn test_manual_save_then_recover_in_new_session() {
    let dir = tempfile::tempdir().unwrap();
    let mut doc = DocumentSession::untitled_in(dir.path(), AutosaveConfig::default(), tracing::Span::none());

    doc.insert_text("Hello\nWorld").unwrap();
    doc.move_cursor(Motion::Up);
    let written = doc.save_now().unwrap();

    assert_eq!(written, 11);
    assert!(doc.side_file().exists());
    drop(doc);

    let mut recovered = DocumentSession::untitled_in(dir.path(), AutosaveConfig::default(), tracing::Span::none());

    match recovered.load_from_side_file_if_newer() {
        Recovery::Recovered { cursor_position, bytes } => {
            assert_eq!(cursor_position, 5);
            assert_eq!(bytes, 11);
        }
        other => panic!("expected recovery, got {other:?}"),
    }

    assert_eq!(recovered.text(), "Hello\nWorld");
    assert_eq!(recovered.cursor_position(), 5);
    assert!(!recovered.is_dirty());

    // Preferred column came back with the cursor.
    recovered.move_cursor(Motion::Down);
    assert_eq!(recovered.cursor_position(), 11);
}

#[test]
fn test_recovery_is_byte_exact_after_splitting_a_character() {
    let dir = tempfile::tempdir().unwrap();
    let mut doc = DocumentSession::untitled_in(dir.path(), AutosaveConfig::default(), tracing::Span::none());

    // Byte-wise moves land between the two bytes of 'é' (C3 A9).
    doc.insert_text("aéb").unwrap();
    doc.move_cursor(Motion::Left);
    doc.move_cursor(Motion::Left);
    doc.insert_char('x').unwrap();

    let live = doc.bytes();
    assert_eq!(live, [b'a', 0xC3, b'x', 0xA9, b'b']);
    assert_eq!(doc.cursor_position(), 3);

    doc.save_now().unwrap();
    drop(doc);

    let mut recovered = DocumentSession::untitled_in(dir.path(), AutosaveConfig::default(), tracing::Span::none());

    match recovered.load_from_side_file_if_newer() {
        Recovery::Recovered { cursor_position, bytes } => {
            assert_eq!(cursor_position, 3);
            assert_eq!(bytes, 5);
        }
        other => panic!("expected recovery, got {other:?}"),
    }

    assert_eq!(recovered.bytes(), live);
    assert_eq!(recovered.cursor_position(), 3);
}

#[test]
fn test_open_keeps_invalid_utf8_verbatim() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("latin1.txt");
    std::fs::write(&path, [b'c', b'a', b'f', 0xE9, b'\n']).unwrap();

    let doc = DocumentSession::open(&path, AutosaveConfig::default(), tracing::Span::none()).unwrap();
    doc.save_document().unwrap();

    assert_eq!(doc.len(), 5);
    assert_eq!(std::fs::read(&path).unwrap(), [b'c', b'a', b'f', 0xE9, b'\n']);
}

#[test]
fn test_recovered_cursor_is_clamped() {
    let dir = tempfile::tempdir().unwrap();
    let side = io::SideFile::untitled_in(dir.path());
    let snapshot = persistence::DocumentSnapshot {
        content: b"abc".to_vec(),
        cursor_position: 99,
        cursor_line: 0,
        preferred_column: 0,
    };
    side.write(&persistence::codec::encode(&snapshot, 1), io::WriteMode::Atomic)
        .unwrap();

    let mut doc = DocumentSession::untitled_in(dir.path(), AutosaveConfig::default(), tracing::Span::none());

    assert!(matches!(doc.load_from_side_file_if_newer(), Recovery::Recovered { .. }));
    assert_eq!(doc.cursor_position(), 3);
}

#[test]
fn test_stale_side_file_is_removed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("doc.txt");
    std::fs::write(&path, "saved on disk").unwrap();

    let mut doc = DocumentSession::open(&path, AutosaveConfig::default(), tracing::Span::none()).unwrap();
    doc.insert_text("old edits ").unwrap();
    doc.save_now().unwrap();

    let now = SystemTime::now();
    set_mtime(doc.side_file().path(), now - Duration::from_secs(600));
    set_mtime(&path, now - Duration::from_secs(60));
    drop(doc);

    let mut reopened = DocumentSession::open(&path, AutosaveConfig::default(), tracing::Span::none()).unwrap();

    assert!(matches!(reopened.load_from_side_file_if_newer(), Recovery::Stale));
    assert_eq!(reopened.text(), "saved on disk");
    assert!(!reopened.side_file().exists());
}

#[test]
fn test_foreign_side_file_leaves_document_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("doc.txt");
    std::fs::write(&path, "original").unwrap();
    set_mtime(&path, SystemTime::now() - Duration::from_secs(60));

    let side = io::SideFile::for_document(&path);
    side.write(b"SOMEONE_ELSES_SWAP\nwhatever\n", io::WriteMode::Truncate)
        .unwrap();

    let mut doc = DocumentSession::open(&path, AutosaveConfig::default(), tracing::Span::none()).unwrap();

    match doc.load_from_side_file_if_newer() {
        Recovery::Rejected(persistence::DecodeError::BadHeader { found, .. }) => {
            assert_eq!(found, "SOMEONE_ELSES_SWAP");
        }
        other => panic!("expected a rejected side-file, got {other:?}"),
    }

    assert_eq!(doc.text(), "original");
    assert_eq!(doc.cursor_position(), 0);
    assert!(side.exists());
}

#[test]
fn test_close_removes_side_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut doc = DocumentSession::untitled_in(dir.path(), fast_config(), tracing::Span::none());

    doc.start_autosave().unwrap();
    doc.insert_text("draft").unwrap();
    doc.save_now().unwrap();
    assert!(doc.side_file().exists());

    doc.close().unwrap();

    assert!(!doc.is_autosave_running());
    assert!(!doc.side_file().exists());
}

#[test]
fn test_save_document_writes_original_and_drops_side_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("doc.txt");
    let mut doc = DocumentSession::open(&path, AutosaveConfig::default(), tracing::Span::none()).unwrap();

    doc.insert_text("kept").unwrap();
    doc.save_now().unwrap();
    doc.save_document().unwrap();

    assert_eq!(std::fs::read_to_string(&path).unwrap(), "kept");
    assert!(!doc.side_file().exists());
}

#[test]
fn test_saved_document_is_not_shadowed_by_autosave() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("doc.txt");
    let mut doc = DocumentSession::open(&path, fast_config(), tracing::Span::none()).unwrap();

    doc.start_autosave().unwrap();
    doc.insert_text("final words").unwrap();
    doc.save_document().unwrap();

    assert!(!doc.is_dirty());

    // Several ticks pass with nothing to write.
    std::thread::sleep(Duration::from_millis(50));
    doc.stop_autosave().unwrap();

    assert!(!doc.side_file().exists());
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "final words");
}

#[test]
fn test_untitled_save_document_fails() {
    let dir = tempfile::tempdir().unwrap();
    let doc = DocumentSession::untitled_in(dir.path(), AutosaveConfig::default(), tracing::Span::none());

    assert!(matches!(doc.save_document(), Err(EditorStateError::Untitled)));
}

#[test]
fn test_background_autosave_writes_after_edit() {
    let dir = tempfile::tempdir().unwrap();
    let mut doc = DocumentSession::untitled_in(dir.path(), fast_config(), tracing::Span::none());

    doc.start_autosave().unwrap();
    doc.insert_text("typed").unwrap();

    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while doc.is_dirty() && std::time::Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(2));
    }
    doc.stop_autosave().unwrap();

    let decoded = persistence::recovery::read_side_file(doc.side_file()).unwrap();
    assert_eq!(decoded.content, b"typed");
    assert_eq!(decoded.cursor_position, 5);
}

#[test]
fn test_snapshots_stay_consistent_under_concurrent_edits() {
    const EDITS: usize = 10_000;

    let dir = tempfile::tempdir().unwrap();
    let mut doc = DocumentSession::untitled_in(dir.path(), fast_config(), tracing::Span::none());
    let shared = doc.shared().clone();
    let done = Arc::new(AtomicBool::new(false));

    doc.start_autosave().unwrap();

    let reader = {
        let done = Arc::clone(&done);
        std::thread::spawn(move || {
            let mut checked = 0usize;
            loop {
                let finished = done.load(Ordering::Acquire);
                let snapshot = shared.capture();
                let decoded = persistence::codec::decode(&persistence::codec::encode(&snapshot, 0))
                    .expect("snapshot must decode");

                assert_eq!(decoded.content, snapshot.content);
                assert_eq!(decoded.cursor_position, decoded.content.len());
                checked += 1;

                if finished {
                    break checked;
                }
            }
        })
    };

    for i in 0..EDITS {
        let ch = if i % 50 == 49 { '\n' } else { 'x' };
        doc.insert_char(ch).unwrap();
    }

    done.store(true, Ordering::Release);
    let checked = reader.join().unwrap();
    doc.stop_autosave().unwrap();
    doc.save_now().unwrap();

    assert!(checked > 0);
    assert_eq!(doc.len(), EDITS);
    assert_eq!(doc.cursor_position(), EDITS);

    let on_disk = persistence::recovery::read_side_file(doc.side_file()).unwrap();
    assert_eq!(on_disk.content.len(), EDITS);
    assert_eq!(on_disk.cursor_position, EDITS);
}
