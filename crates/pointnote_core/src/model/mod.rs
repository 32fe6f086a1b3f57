//! Domain model for point-cloud annotations.
//!
//! # Responsibility
//! - Define the canonical annotation record shared by store, service and client.
//! - Own text/coordinate validation so every layer applies the same rules.
//! - Define the JSON envelope exchanged over HTTP.
//!
//! # Invariants
//! - Every annotation is identified by a service-generated `AnnotationId`.
//! - Annotations are immutable once created; deletion is a hard delete.

pub mod annotation;
pub mod envelope;
