//! Client side of PointNote: the HTTP data layer and the UI controller that
//! keeps the annotation list and 3D markers in sync with the service.

pub mod client;
pub mod controller;
pub mod viewer;

pub use client::{AnnotationApi, AnnotationClient, ClientConfig, RequestError, RequestErrorKind};
pub use controller::{
    AnnotationController, AnnotationListItem, AnnotationListView, ClearAllOutcome, Confirmation,
    FormState, PendingAnnotation, Toast, ToastKind,
};
pub use viewer::{marker_label, ViewerAdapter, MARKER_LABEL_CHARS};
