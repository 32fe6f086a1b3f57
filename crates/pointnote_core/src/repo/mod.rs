//! Repository layer over the annotation store.
//!
//! # Responsibility
//! - Define the key-value contract the service depends on.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Repository writes must enforce `Annotation::validate()` before persistence.
//! - Store transport errors surface as `RepoError::Db`, never as validation.

pub mod annotation_repo;
