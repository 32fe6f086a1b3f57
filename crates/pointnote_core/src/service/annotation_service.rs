//! Annotation use-case service.
//!
//! # Responsibility
//! - Implement the Create / List / Delete operations on top of a repository.
//! - Re-validate every input; callers (including our own client) are untrusted.
//!
//! # Invariants
//! - A validation failure never reaches the repository.
//! - Each operation issues at most one store call.
//! - Delete reports success whether or not the key existed.
//! - Annotation text never appears in logs; only its byte length does.

use crate::model::annotation::{
    validate_id, Annotation, AnnotationValidationError, CreateAnnotationInput,
};
use crate::repo::annotation_repo::{AnnotationRepository, RepoError};
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Service error split into client faults and infrastructure faults.
#[derive(Debug)]
pub enum ServiceError {
    /// Client-supplied data violates the contract. No store mutation happened.
    Validation(AnnotationValidationError),
    /// The store was unavailable or returned unusable data.
    Store(RepoError),
}

impl ServiceError {
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Store(err) => Some(err),
        }
    }
}

impl From<AnnotationValidationError> for ServiceError {
    fn from(value: AnnotationValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            // Write-path validation failures stay client faults.
            RepoError::Validation(err) => Self::Validation(err),
            other => Self::Store(other),
        }
    }
}

/// Stateless facade over one repository handle.
pub struct AnnotationService<R: AnnotationRepository> {
    repo: R,
}

impl<R: AnnotationRepository> AnnotationService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Validates `input`, then inserts a new annotation.
    ///
    /// # Contract
    /// - Generates a fresh id and `created_at`.
    /// - Stores trimmed text.
    /// - Returns the full record exactly as persisted.
    pub fn create_annotation(
        &self,
        input: &CreateAnnotationInput,
    ) -> Result<Annotation, ServiceError> {
        let started_at = Instant::now();
        let draft = input.validate().inspect_err(|err| {
            warn!(
                "event=annotation_create module=service status=rejected reason={:?}",
                err
            );
        })?;

        let annotation = Annotation::new(draft);
        match self.repo.insert_annotation(&annotation) {
            Ok(id) => {
                info!(
                    "event=annotation_create module=service status=ok annotation_id={} text_bytes={} duration_ms={}",
                    id,
                    annotation.text.len(),
                    started_at.elapsed().as_millis()
                );
                Ok(annotation)
            }
            Err(err) => {
                error!(
                    "event=annotation_create module=service status=error duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err.into())
            }
        }
    }

    /// Returns every stored annotation in unspecified order.
    pub fn list_annotations(&self) -> Result<Vec<Annotation>, ServiceError> {
        let started_at = Instant::now();
        match self.repo.scan_annotations() {
            Ok(annotations) => {
                info!(
                    "event=annotation_list module=service status=ok count={} duration_ms={}",
                    annotations.len(),
                    started_at.elapsed().as_millis()
                );
                Ok(annotations)
            }
            Err(err) => {
                error!(
                    "event=annotation_list module=service status=error duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(ServiceError::Store(err))
            }
        }
    }

    /// Deletes the annotation keyed by `id`.
    ///
    /// # Contract
    /// - Blank `id` -> `ValidationError::MissingId`.
    /// - An absent key is still a success; the store primitive is idempotent.
    pub fn delete_annotation(&self, id: &str) -> Result<(), ServiceError> {
        let started_at = Instant::now();
        let key = validate_id(id).inspect_err(|err| {
            warn!(
                "event=annotation_delete module=service status=rejected reason={:?}",
                err
            );
        })?;

        match self.repo.delete_annotation(key) {
            Ok(existed) => {
                info!(
                    "event=annotation_delete module=service status=ok annotation_id={} existed={} duration_ms={}",
                    key,
                    existed,
                    started_at.elapsed().as_millis()
                );
                Ok(())
            }
            Err(err) => {
                error!(
                    "event=annotation_delete module=service status=error annotation_id={} duration_ms={} error={}",
                    key,
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbError;
    use crate::model::annotation::AnnotationId;
    use crate::repo::annotation_repo::RepoResult;
    use serde_json::json;
    use std::cell::{Cell, RefCell};

    /// Repository double that records calls and can simulate an outage.
    #[derive(Default)]
    struct RecordingRepo {
        rows: RefCell<Vec<Annotation>>,
        calls: Cell<usize>,
        unavailable: bool,
    }

    impl RecordingRepo {
        fn outage() -> RepoError {
            RepoError::Db(DbError::Sqlite(rusqlite::Error::InvalidQuery))
        }
    }

    impl AnnotationRepository for &RecordingRepo {
        fn insert_annotation(&self, annotation: &Annotation) -> RepoResult<AnnotationId> {
            self.calls.set(self.calls.get() + 1);
            if self.unavailable {
                return Err(RecordingRepo::outage());
            }
            self.rows.borrow_mut().push(annotation.clone());
            Ok(annotation.annotation_id)
        }

        fn scan_annotations(&self) -> RepoResult<Vec<Annotation>> {
            self.calls.set(self.calls.get() + 1);
            if self.unavailable {
                return Err(RecordingRepo::outage());
            }
            Ok(self.rows.borrow().clone())
        }

        fn delete_annotation(&self, key: &str) -> RepoResult<bool> {
            self.calls.set(self.calls.get() + 1);
            if self.unavailable {
                return Err(RecordingRepo::outage());
            }
            let mut rows = self.rows.borrow_mut();
            let before = rows.len();
            rows.retain(|row| row.annotation_id.to_string() != key);
            Ok(rows.len() != before)
        }
    }

    fn input(value: serde_json::Value) -> CreateAnnotationInput {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn create_trims_text_and_assigns_identity() {
        let repo = RecordingRepo::default();
        let service = AnnotationService::new(&repo);

        let created = service
            .create_annotation(&input(json!({
                "x": 1.5,
                "y": -2.25,
                "z": 0,
                "text": "  corner crack ",
            })))
            .unwrap();

        assert_eq!(created.text, "corner crack");
        assert!(!created.annotation_id.is_nil());
        assert_eq!(repo.rows.borrow().as_slice(), std::slice::from_ref(&created));
    }

    #[test]
    fn rejected_create_never_reaches_the_store() {
        let repo = RecordingRepo::default();
        let service = AnnotationService::new(&repo);

        let err = service
            .create_annotation(&input(json!({
                "x": 1,
                "y": 2,
                "z": 3,
                "text": "a".repeat(257),
            })))
            .unwrap_err();

        assert!(err.is_validation());
        assert_eq!(repo.calls.get(), 0);
    }

    #[test]
    fn blank_delete_id_never_reaches_the_store() {
        let repo = RecordingRepo::default();
        let service = AnnotationService::new(&repo);

        let err = service.delete_annotation(" ").unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Validation(AnnotationValidationError::MissingId)
        ));
        assert_eq!(repo.calls.get(), 0);
    }

    #[test]
    fn store_outage_is_an_infrastructure_error() {
        let repo = RecordingRepo {
            unavailable: true,
            ..RecordingRepo::default()
        };
        let service = AnnotationService::new(&repo);

        assert!(matches!(
            service.list_annotations().unwrap_err(),
            ServiceError::Store(_)
        ));
        assert!(matches!(
            service.delete_annotation("abc").unwrap_err(),
            ServiceError::Store(_)
        ));
        let err = service
            .create_annotation(&input(json!({"x": 1, "y": 2, "z": 3, "text": "ok"})))
            .unwrap_err();
        assert!(!err.is_validation());
    }
}
