#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::fs;

use chrono::{TimeZone, Utc};
use common::{log, tar_bytes, TestEnv, MON, TUE, WED};
use markbook_core::logging_facility::test_capture::init_test_capture;
use markbook_core::{ExErrorKind, ImportError, StudentId, WarningKind};
use markbook_core_types::schema::{EVENT_END, EVENT_END_ERROR, EVENT_START};
use markbook_ingest::ImportFormat;
use markbook_store::{BookLayout, SqliteRepo};

fn sid(raw: &str) -> StudentId {
    StudentId::normalize(raw).unwrap()
}

/// sub1.tar holds a.pdf; submission.tar holds a.pdf and b.txt
fn scenario_a(env: &mut TestEnv) -> std::path::PathBuf {
    env.archive(&[
        ("cohort/1234567/log", log(&[(1, MON), (2, TUE)])),
        ("cohort/1234567/sub1.tar", tar_bytes(&[("a.pdf", b"pdf v1")])),
        (
            "cohort/1234567/submission.tar",
            tar_bytes(&[("a.pdf", b"pdf v2"), ("b.txt", b"text v2")]),
        ),
    ])
}

#[test]
fn test_scenario_a_creates_one_book_with_two_pages() {
    let mut env = TestEnv::new();
    let archive = scenario_a(&mut env);

    let summary = env
        .import("hw1", &archive, "a.pdf,b.txt", ImportFormat::LogVersioned)
        .unwrap();

    assert_eq!((summary.created, summary.updated, summary.skipped), (1, 0, 0));
    assert_eq!(summary.copied, 2);
    assert!(summary.is_complete());

    let task = SqliteRepo::get_task_by_name(&env.conn, "hw1").unwrap().unwrap();
    let book = SqliteRepo::find_book(&env.conn, task.id, &sid("1234567"))
        .unwrap()
        .unwrap();
    assert_eq!(
        book.submitted_at,
        Some(Utc.with_ymd_and_hms(2024, 3, 5, 10, 0, 0).unwrap())
    );

    let pages = SqliteRepo::list_pages(&env.conn, book.id).unwrap();
    assert_eq!(pages.len(), 2);
    assert_eq!(fs::read(env.layout.file_path(book.id, "a.pdf")).unwrap(), b"pdf v2");
    assert_eq!(fs::read(env.layout.file_path(book.id, "b.txt")).unwrap(), b"text v2");
    assert!(env.scratch_is_empty());
}

#[test]
fn test_scenario_b_reimport_is_idempotent() {
    let mut env = TestEnv::new();
    let archive = scenario_a(&mut env);
    env.import("hw1", &archive, "a.pdf,b.txt", ImportFormat::LogVersioned)
        .unwrap();

    let again = env
        .import("hw1", &archive, "a.pdf,b.txt", ImportFormat::LogVersioned)
        .unwrap();

    assert_eq!((again.created, again.updated, again.skipped), (0, 0, 1));
    assert_eq!(again.copied, 0);
}

#[test]
fn test_rerun_restores_files_whose_copy_failed() {
    let mut env = TestEnv::new();
    let archive = scenario_a(&mut env);
    let good_layout = env.layout.clone();
    let blocked = env.dir.path().join("blocked");
    fs::write(&blocked, b"not a directory").unwrap();
    env.layout = BookLayout::new(blocked.clone());

    let first = env
        .import("hw1", &archive, "a.pdf,b.txt", ImportFormat::LogVersioned)
        .unwrap();
    assert_eq!(first.created, 1);
    assert_eq!(first.copied, 0);
    assert_eq!(first.copy_failures.len(), 2);
    assert!(!first.is_complete());

    env.layout = good_layout;
    let rerun = env
        .import("hw1", &archive, "a.pdf,b.txt", ImportFormat::LogVersioned)
        .unwrap();

    assert_eq!((rerun.created, rerun.updated, rerun.skipped), (0, 0, 1));
    assert_eq!(rerun.copied, 2);
    assert!(rerun.is_complete());
    assert!(rerun
        .warnings
        .iter()
        .any(|w| w.kind == WarningKind::MissingStoredFile));

    let task = SqliteRepo::get_task_by_name(&env.conn, "hw1").unwrap().unwrap();
    let book = SqliteRepo::find_book(&env.conn, task.id, &sid("1234567"))
        .unwrap()
        .unwrap();
    assert_eq!(fs::read(env.layout.file_path(book.id, "a.pdf")).unwrap(), b"pdf v2");
    assert_eq!(fs::read(env.layout.file_path(book.id, "b.txt")).unwrap(), b"text v2");
    assert_eq!(SqliteRepo::list_pages(&env.conn, book.id).unwrap().len(), 2);
}

#[test]
fn test_nanosecond_folder_timestamp_reimport_is_skipped() {
    let mut env = TestEnv::new();
    let archive = env.archive(&[(
        "submissions/1234567/2024-03-04 10:15:30.123456789/a.pdf",
        b"pdf".to_vec(),
    )]);

    let first = env
        .import("hw1", &archive, "a.pdf", ImportFormat::FolderTimestamp)
        .unwrap();
    assert_eq!(first.created, 1);

    let again = env
        .import("hw1", &archive, "a.pdf", ImportFormat::FolderTimestamp)
        .unwrap();
    assert_eq!((again.created, again.updated, again.skipped), (0, 0, 1));
    assert!(again.failures.is_empty());
    assert!(again.is_complete());
}

#[test]
fn test_scenario_c_changed_file_replaces_its_page_and_clears_marks() {
    let mut env = TestEnv::new();
    let first = scenario_a(&mut env);
    env.import("hw1", &first, "a.pdf,b.txt", ImportFormat::LogVersioned)
        .unwrap();

    let task = SqliteRepo::get_task_by_name(&env.conn, "hw1").unwrap().unwrap();
    let book = SqliteRepo::find_book(&env.conn, task.id, &sid("1234567"))
        .unwrap()
        .unwrap();
    let before = SqliteRepo::list_pages(&env.conn, book.id).unwrap();
    let a_page = before.iter().find(|p| p.file_path == "a.pdf").unwrap().id;
    let b_page = before.iter().find(|p| p.file_path == "b.txt").unwrap().id;
    SqliteRepo::add_marking(&env.conn, book.id, "Q1", Some(3.0), Some("ok")).unwrap();
    SqliteRepo::add_annotation(&env.conn, a_page, "{\"x\":1}").unwrap();
    SqliteRepo::add_annotation(&env.conn, b_page, "{\"x\":2}").unwrap();

    let second = env.archive(&[
        ("cohort/1234567/log", log(&[(1, MON), (2, TUE), (3, WED)])),
        ("cohort/1234567/sub1.tar", tar_bytes(&[("a.pdf", b"pdf v1")])),
        (
            "cohort/1234567/sub2.tar",
            tar_bytes(&[("a.pdf", b"pdf v2"), ("b.txt", b"text v2")]),
        ),
        (
            "cohort/1234567/submission.tar",
            tar_bytes(&[("a.pdf", b"pdf v2"), ("b.txt", b"text v3")]),
        ),
    ]);
    let summary = env
        .import("hw1", &second, "a.pdf,b.txt", ImportFormat::LogVersioned)
        .unwrap();

    assert_eq!((summary.created, summary.updated, summary.skipped), (0, 1, 0));
    assert_eq!(summary.copied, 1);

    let after = SqliteRepo::list_pages(&env.conn, book.id).unwrap();
    assert_eq!(after.len(), 2);
    assert!(after.iter().any(|p| p.id == a_page));
    assert!(!after.iter().any(|p| p.id == b_page));
    assert_eq!(SqliteRepo::count_markings(&env.conn, book.id).unwrap(), 0);
    assert_eq!(SqliteRepo::count_annotations(&env.conn, book.id).unwrap(), 0);
    assert_eq!(fs::read(env.layout.file_path(book.id, "b.txt")).unwrap(), b"text v3");

    let book = SqliteRepo::find_book(&env.conn, task.id, &sid("1234567"))
        .unwrap()
        .unwrap();
    assert_eq!(
        book.submitted_at,
        Some(Utc.with_ymd_and_hms(2024, 3, 6, 10, 0, 0).unwrap())
    );
}

#[test]
fn test_older_archive_never_moves_submitted_at_back() {
    let mut env = TestEnv::new();
    let newer = env.archive(&[
        ("cohort/z1/log", log(&[(1, MON), (2, WED)])),
        ("cohort/z1/submission.tar", tar_bytes(&[("a.pdf", b"new")])),
    ]);
    let older = env.archive(&[
        ("cohort/z1/log", log(&[(1, MON)])),
        ("cohort/z1/submission.tar", tar_bytes(&[("a.pdf", b"old")])),
    ]);
    env.import("hw1", &newer, "a.pdf", ImportFormat::LogVersioned)
        .unwrap();

    let summary = env
        .import("hw1", &older, "a.pdf", ImportFormat::LogVersioned)
        .unwrap();

    assert_eq!(summary.skipped, 1);
    assert!(summary
        .warnings
        .iter()
        .any(|w| w.kind == WarningKind::OlderThanStored));
    let task = SqliteRepo::get_task_by_name(&env.conn, "hw1").unwrap().unwrap();
    let book = SqliteRepo::find_book(&env.conn, task.id, &sid("z1"))
        .unwrap()
        .unwrap();
    assert_eq!(
        book.submitted_at,
        Some(Utc.with_ymd_and_hms(2024, 3, 6, 10, 0, 0).unwrap())
    );
    assert_eq!(fs::read(env.layout.file_path(book.id, "a.pdf")).unwrap(), b"new");
}

#[test]
fn test_newer_identical_content_only_advances_timestamp() {
    let mut env = TestEnv::new();
    let first = env.archive(&[
        ("cohort/z1/log", log(&[(1, MON)])),
        ("cohort/z1/submission.tar", tar_bytes(&[("a.pdf", b"same")])),
    ]);
    let second = env.archive(&[
        ("cohort/z1/log", log(&[(1, MON), (2, TUE)])),
        ("cohort/z1/submission.tar", tar_bytes(&[("a.pdf", b"same")])),
    ]);
    env.import("hw1", &first, "a.pdf", ImportFormat::LogVersioned)
        .unwrap();
    let task = SqliteRepo::get_task_by_name(&env.conn, "hw1").unwrap().unwrap();
    let book = SqliteRepo::find_book(&env.conn, task.id, &sid("z1"))
        .unwrap()
        .unwrap();
    SqliteRepo::add_marking(&env.conn, book.id, "Q1", Some(1.0), None).unwrap();

    let summary = env
        .import("hw1", &second, "a.pdf", ImportFormat::LogVersioned)
        .unwrap();

    assert_eq!((summary.updated, summary.skipped, summary.copied), (0, 1, 0));
    assert_eq!(SqliteRepo::count_markings(&env.conn, book.id).unwrap(), 1);
    let book = SqliteRepo::find_book(&env.conn, task.id, &sid("z1"))
        .unwrap()
        .unwrap();
    assert_eq!(
        book.submitted_at,
        Some(Utc.with_ymd_and_hms(2024, 3, 5, 10, 0, 0).unwrap())
    );
}

#[test]
fn test_scenario_d_team_layout_touches_nothing() {
    let mut env = TestEnv::new();
    let archive = env.archive(&[
        ("teams.json", b"{}".to_vec()),
        ("submissions/z1/2024-03-04 10:00:00.000000/a.pdf", b"x".to_vec()),
    ]);

    let err = env
        .import("hw1", &archive, "a.pdf", ImportFormat::FolderTimestamp)
        .unwrap_err();

    assert_eq!(err.kind(), ExErrorKind::UnsupportedLayout);
    assert_eq!(err.code(), "ERR_UNSUPPORTED_LAYOUT");
    assert!(SqliteRepo::get_task_by_name(&env.conn, "hw1").unwrap().is_none());
    assert!(env.scratch_is_empty());
}

#[test]
fn test_scenario_e_ambiguous_student_does_not_stop_batch() {
    let mut env = TestEnv::new();
    let archive = env.archive(&[
        ("essays/1111111/essay.pdf", b"one".to_vec()),
        ("essays/2222222/a.pdf", b"a".to_vec()),
        ("essays/2222222/b.pdf", b"b".to_vec()),
        ("essays/3333333/mine.pdf", b"three".to_vec()),
    ]);

    let summary = env
        .import("essay", &archive, "essay.pdf", ImportFormat::SingleFile)
        .unwrap();

    assert_eq!(summary.created, 2);
    assert_eq!(summary.failures.len(), 1);
    assert!(!summary.is_complete());
    let failure = &summary.failures[0];
    assert_eq!(failure.student_id, sid("2222222"));
    assert!(matches!(failure.error, ImportError::AmbiguousSubmission { .. }));
    assert_eq!(failure.to_ex_error().code(), "ERR_AMBIGUOUS_SUBMISSION");
}

#[test]
fn test_locked_task_is_rejected_before_unpacking() {
    let mut env = TestEnv::new();
    let task = SqliteRepo::ensure_task(&env.conn, "hw1").unwrap();
    SqliteRepo::set_task_locked(&env.conn, task.id, true).unwrap();
    let archive = scenario_a(&mut env);

    let err = env
        .import("hw1", &archive, "a.pdf,b.txt", ImportFormat::LogVersioned)
        .unwrap_err();

    assert_eq!(err.kind(), ExErrorKind::TaskLocked);
    assert!(SqliteRepo::list_books(&env.conn, task.id).unwrap().is_empty());
}

#[test]
fn test_unreadable_archive_is_fatal() {
    let mut env = TestEnv::new();
    let archive = env.dir.path().join("junk.zip");
    fs::write(&archive, b"not an archive at all").unwrap();

    let err = env
        .import("hw1", &archive, "a.pdf", ImportFormat::LogVersioned)
        .unwrap_err();

    assert_eq!(err.kind(), ExErrorKind::Unpack);
    assert!(err.request_id().is_some());
}

#[test]
fn test_student_failures_are_isolated() {
    let mut env = TestEnv::new();
    let archive = env.archive(&[
        ("cohort/z1/log", log(&[(1, MON)])),
        ("cohort/z1/submission.tar", tar_bytes(&[("a.pdf", b"x")])),
        ("cohort/z2/submission.tar", tar_bytes(&[("a.pdf", b"y")])),
        ("cohort/z3/log", log(&[(1, MON)])),
        ("cohort/z3/submission.tar", tar_bytes(&[("a.pdf", b"z")])),
    ]);

    let summary = env
        .import("hw1", &archive, "a.pdf", ImportFormat::LogVersioned)
        .unwrap();

    assert_eq!(summary.created, 2);
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].student_id, sid("z2"));
    assert_eq!(summary.processed(), 3);
}

#[test]
fn test_import_emits_op_boundary_events() {
    let capture = init_test_capture();
    let mut env = TestEnv::new();
    let archive = scenario_a(&mut env);
    env.import("hw1", &archive, "a.pdf,b.txt", ImportFormat::LogVersioned)
        .unwrap();

    capture.assert_event_exists("import_archive", EVENT_START);
    capture.assert_event_exists("import_archive", EVENT_END);

    let junk = env.dir.path().join("junk.tar");
    fs::write(&junk, b"junk").unwrap();
    let _ = env.import("hw1", &junk, "a.pdf", ImportFormat::LogVersioned);
    capture.assert_event_exists("import_archive", EVENT_END_ERROR);
}
