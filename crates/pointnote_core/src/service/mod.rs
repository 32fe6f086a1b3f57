//! Core use-case services.
//!
//! # Responsibility
//! - Turn untrusted create/delete input into validated repository calls.
//! - Keep HTTP and client layers decoupled from storage details.

pub mod annotation_service;
