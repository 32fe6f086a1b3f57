//! Annotation store contract and SQLite implementation.
//!
//! # Responsibility
//! - Expose exactly the three key-value primitives the service needs:
//!   insert, full scan and delete-by-key.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - Insert calls `Annotation::validate()` before touching SQL.
//! - Scan rejects invalid persisted rows instead of masking them.
//! - Delete-by-key never fails because the key is absent.

use crate::db::DbError;
use crate::model::annotation::{
    format_timestamp, Annotation, AnnotationId, AnnotationValidationError,
};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const ANNOTATION_SELECT_SQL: &str = "SELECT
    annotation_id,
    x,
    y,
    z,
    text,
    created_at
FROM annotations";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for annotation persistence.
#[derive(Debug)]
pub enum RepoError {
    Validation(AnnotationValidationError),
    Db(DbError),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => {
                write!(f, "invalid persisted annotation data: {message}")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::InvalidData(_) => None,
        }
    }
}

impl From<AnnotationValidationError> for RepoError {
    fn from(value: AnnotationValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Key-value primitives over the annotation table.
pub trait AnnotationRepository {
    /// Inserts a new row keyed by `annotation.annotation_id`.
    fn insert_annotation(&self, annotation: &Annotation) -> RepoResult<AnnotationId>;
    /// Returns every stored row. No ordering is guaranteed.
    fn scan_annotations(&self) -> RepoResult<Vec<Annotation>>;
    /// Deletes the row with `key`, returning whether one existed.
    fn delete_annotation(&self, key: &str) -> RepoResult<bool>;
}

/// SQLite-backed annotation repository.
pub struct SqliteAnnotationRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteAnnotationRepository<'conn> {
    /// Wraps a connection returned by `open_db`/`open_db_in_memory`.
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl AnnotationRepository for SqliteAnnotationRepository<'_> {
    fn insert_annotation(&self, annotation: &Annotation) -> RepoResult<AnnotationId> {
        annotation.validate()?;

        self.conn.execute(
            "INSERT INTO annotations (
                annotation_id,
                x,
                y,
                z,
                text,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                annotation.annotation_id.to_string(),
                annotation.x,
                annotation.y,
                annotation.z,
                annotation.text.as_str(),
                format_timestamp(&annotation.created_at),
            ],
        )?;

        Ok(annotation.annotation_id)
    }

    fn scan_annotations(&self) -> RepoResult<Vec<Annotation>> {
        let mut stmt = self.conn.prepare(&format!("{ANNOTATION_SELECT_SQL};"))?;
        let mut rows = stmt.query([])?;
        let mut annotations = Vec::new();

        while let Some(row) = rows.next()? {
            annotations.push(parse_annotation_row(row)?);
        }

        Ok(annotations)
    }

    fn delete_annotation(&self, key: &str) -> RepoResult<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM annotations WHERE annotation_id = ?1;", [key])?;
        Ok(changed > 0)
    }
}

fn parse_annotation_row(row: &Row<'_>) -> RepoResult<Annotation> {
    let id_text: String = row.get("annotation_id")?;
    let annotation_id = Uuid::parse_str(&id_text).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid id value `{id_text}` in annotations.annotation_id"
        ))
    })?;

    let created_text: String = row.get("created_at")?;
    let created_at = DateTime::parse_from_rfc3339(&created_text)
        .map_err(|_| {
            RepoError::InvalidData(format!(
                "invalid timestamp `{created_text}` in annotations.created_at"
            ))
        })?
        .with_timezone(&Utc);

    let annotation = Annotation {
        annotation_id,
        x: row.get("x")?,
        y: row.get("y")?,
        z: row.get("z")?,
        text: row.get("text")?,
        created_at,
    };
    annotation.validate().map_err(|err| {
        RepoError::InvalidData(format!("row `{id_text}` violates invariants: {err}"))
    })?;
    Ok(annotation)
}
