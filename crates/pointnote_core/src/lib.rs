//! Core domain logic for PointNote point-cloud annotations.
//! This crate is the single source of truth for annotation invariants.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use logging::{
    default_log_level, init_logging, init_stderr_logging, logging_status, LogTarget,
};
pub use model::annotation::{
    validate_id, validate_text, Annotation, AnnotationDraft, AnnotationId,
    AnnotationValidationError, CreateAnnotationInput, Point3, TextBudget, TextBudgetLevel,
    MAX_TEXT_BYTES,
};
pub use model::envelope::ApiEnvelope;
pub use repo::annotation_repo::{
    AnnotationRepository, RepoError, RepoResult, SqliteAnnotationRepository,
};
pub use service::annotation_service::{AnnotationService, ServiceError};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
