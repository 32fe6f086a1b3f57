use chrono::{DateTime, Utc};
use pointnote_core::db::{open_db, open_db_in_memory};
use pointnote_core::{
    Annotation, AnnotationDraft, AnnotationRepository, AnnotationService,
    AnnotationValidationError, CreateAnnotationInput, Point3, RepoError, ServiceError,
    SqliteAnnotationRepository,
};
use rusqlite::Connection;
use serde_json::json;
use std::collections::HashSet;
use uuid::Uuid;

fn input(x: f64, y: f64, z: f64, text: &str) -> CreateAnnotationInput {
    serde_json::from_value(json!({"x": x, "y": y, "z": z, "text": text})).unwrap()
}

fn row_count(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM annotations;", [], |row| row.get(0))
        .unwrap()
}

#[test]
fn insert_and_scan_roundtrip() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteAnnotationRepository::new(&conn);

    let annotation = Annotation::new(AnnotationDraft::new(
        Point3::new(1.5, -2.25, 0.0),
        "corner crack",
    ));
    let id = repo.insert_annotation(&annotation).unwrap();
    assert_eq!(id, annotation.annotation_id);

    let scanned = repo.scan_annotations().unwrap();
    assert_eq!(scanned, vec![annotation]);
}

#[test]
fn insert_rejects_invalid_record_before_sql() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteAnnotationRepository::new(&conn);

    let mut annotation = Annotation::new(AnnotationDraft::new(Point3::new(0.0, 0.0, 0.0), "x"));
    annotation.text = "b".repeat(300);

    let err = repo.insert_annotation(&annotation).unwrap_err();
    assert!(matches!(
        err,
        RepoError::Validation(AnnotationValidationError::TextTooLong { bytes: 300 })
    ));
    assert_eq!(row_count(&conn), 0);
}

#[test]
fn duplicate_key_is_a_store_error() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteAnnotationRepository::new(&conn);

    let annotation = Annotation::new(AnnotationDraft::new(Point3::new(1.0, 1.0, 1.0), "dup"));
    repo.insert_annotation(&annotation).unwrap();
    let err = repo.insert_annotation(&annotation).unwrap_err();
    assert!(matches!(err, RepoError::Db(_)));
}

#[test]
fn delete_reports_whether_the_key_existed() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteAnnotationRepository::new(&conn);

    let annotation = Annotation::new(AnnotationDraft::new(Point3::new(1.0, 2.0, 3.0), "gone"));
    repo.insert_annotation(&annotation).unwrap();

    let key = annotation.annotation_id.to_string();
    assert!(repo.delete_annotation(&key).unwrap());
    assert!(!repo.delete_annotation(&key).unwrap());
    assert!(!repo.delete_annotation("nonexistent-id").unwrap());
}

#[test]
fn scan_rejects_corrupted_rows() {
    let conn = open_db_in_memory().unwrap();
    conn.execute(
        "INSERT INTO annotations (annotation_id, x, y, z, text, created_at)
         VALUES ('not-a-uuid', 0, 0, 0, 'text', '2026-01-01T00:00:00.000Z');",
        [],
    )
    .unwrap();

    let repo = SqliteAnnotationRepository::new(&conn);
    let err = repo.scan_annotations().unwrap_err();
    assert!(matches!(err, RepoError::InvalidData(message) if message.contains("not-a-uuid")));
}

#[test]
fn service_create_returns_canonical_record() {
    let conn = open_db_in_memory().unwrap();
    let service = AnnotationService::new(SqliteAnnotationRepository::new(&conn));

    let before = Utc::now();
    let created = service
        .create_annotation(&input(1.5, -2.25, 0.0, "corner crack"))
        .unwrap();

    assert_eq!(created.text, "corner crack");
    assert_eq!(created.position(), Point3::new(1.5, -2.25, 0.0));
    assert_eq!(created.annotation_id.get_version_num(), 4);
    // Millisecond truncation may put created_at up to 1ms before `before`.
    assert!(created.created_at >= before - chrono::Duration::milliseconds(1));
    assert_eq!(created.created_at.timestamp_subsec_nanos() % 1_000_000, 0);
}

#[test]
fn service_ids_are_unique_across_creates() {
    let conn = open_db_in_memory().unwrap();
    let service = AnnotationService::new(SqliteAnnotationRepository::new(&conn));

    let ids = (0..50)
        .map(|i| {
            service
                .create_annotation(&input(f64::from(i), 0.0, 0.0, "same text"))
                .unwrap()
                .annotation_id
        })
        .collect::<HashSet<Uuid>>();
    assert_eq!(ids.len(), 50);
}

#[test]
fn oversized_text_is_rejected_and_nothing_is_written() {
    let conn = open_db_in_memory().unwrap();
    let service = AnnotationService::new(SqliteAnnotationRepository::new(&conn));

    let err = service
        .create_annotation(&input(1.0, 2.0, 3.0, &"a".repeat(257)))
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Validation(AnnotationValidationError::TextTooLong { bytes: 257 })
    ));
    assert!(service.list_annotations().unwrap().is_empty());
}

#[test]
fn blank_text_is_rejected_and_nothing_is_written() {
    let conn = open_db_in_memory().unwrap();
    let service = AnnotationService::new(SqliteAnnotationRepository::new(&conn));

    let err = service
        .create_annotation(&input(1.0, 2.0, 3.0, " \t "))
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Validation(AnnotationValidationError::MissingText)
    ));
    assert_eq!(row_count(&conn), 0);
}

#[test]
fn create_then_list_includes_equal_record() {
    let conn = open_db_in_memory().unwrap();
    let service = AnnotationService::new(SqliteAnnotationRepository::new(&conn));

    let first = service.create_annotation(&input(1.0, 2.0, 3.0, "first")).unwrap();
    let second = service.create_annotation(&input(4.0, 5.0, 6.0, "second")).unwrap();

    let listed = service.list_annotations().unwrap();
    assert_eq!(listed.len(), 2);
    assert!(listed.contains(&first));
    assert!(listed.contains(&second));
}

#[test]
fn create_delete_list_excludes_record_and_delete_is_idempotent() {
    let conn = open_db_in_memory().unwrap();
    let service = AnnotationService::new(SqliteAnnotationRepository::new(&conn));

    let kept = service.create_annotation(&input(1.0, 1.0, 1.0, "kept")).unwrap();
    let removed = service.create_annotation(&input(2.0, 2.0, 2.0, "removed")).unwrap();
    let removed_id = removed.annotation_id.to_string();

    service.delete_annotation(&removed_id).unwrap();
    service.delete_annotation(&removed_id).unwrap();
    service.delete_annotation("nonexistent-id").unwrap();

    assert_eq!(service.list_annotations().unwrap(), vec![kept]);
}

#[test]
fn records_survive_reopening_the_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("annotations.db");

    let created = {
        let conn = open_db(&path).unwrap();
        let service = AnnotationService::new(SqliteAnnotationRepository::new(&conn));
        service.create_annotation(&input(9.0, 8.0, 7.0, "durable")).unwrap()
    };

    let conn = open_db(&path).unwrap();
    let service = AnnotationService::new(SqliteAnnotationRepository::new(&conn));
    assert_eq!(service.list_annotations().unwrap(), vec![created]);
}

#[test]
fn concurrent_connections_insert_without_coordination() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("concurrent.db");
    open_db(&path).unwrap();

    let handles = (0..4)
        .map(|worker| {
            let path = path.clone();
            std::thread::spawn(move || {
                let conn = open_db(&path).unwrap();
                let service = AnnotationService::new(SqliteAnnotationRepository::new(&conn));
                for i in 0..10 {
                    service
                        .create_annotation(&input(f64::from(worker), f64::from(i), 0.0, "load"))
                        .unwrap();
                }
            })
        })
        .collect::<Vec<_>>();
    for handle in handles {
        handle.join().unwrap();
    }

    let conn = open_db(&path).unwrap();
    assert_eq!(row_count(&conn), 40);
}

#[test]
fn timestamps_roundtrip_with_millisecond_precision() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteAnnotationRepository::new(&conn);

    let created_at = DateTime::parse_from_rfc3339("2026-10-19T08:30:15.123Z")
        .unwrap()
        .with_timezone(&Utc);
    let annotation = Annotation::with_id(
        Uuid::new_v4(),
        created_at,
        AnnotationDraft::new(Point3::new(0.5, 0.25, 0.125), "timed"),
    );
    repo.insert_annotation(&annotation).unwrap();

    let stored: String = conn
        .query_row("SELECT created_at FROM annotations;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(stored, "2026-10-19T08:30:15.123Z");
    assert_eq!(repo.scan_annotations().unwrap()[0].created_at, created_at);
}
