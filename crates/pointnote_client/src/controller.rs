//! Annotation UI controller.
//!
//! # Responsibility
//! - Own the local annotation list, the selection, the pending form and the
//!   annotation id -> marker handle mapping.
//! - Keep local state eventually consistent with the service after each
//!   confirmed mutation.
//! - Turn every `RequestError` into a dismissible notification.
//!
//! # Invariants
//! - Exactly one marker handle exists per listed annotation.
//! - Nothing is removed locally before the service confirms the delete.
//! - "Clear all" commits locally only when every delete succeeded.
//! - A control whose request is in flight is disabled; re-triggering it is a
//!   no-op.
//!
//! # Driving model
//! Network operations come in three parts: `begin_*` performs the state
//! transition and returns a future that does not borrow the controller,
//! the caller awaits it, and `finish_*` commits the result. The `async`
//! helpers (`load`, `save`, `confirm`) chain the three for callers that do
//! not need to interleave other events.

use crate::client::{AnnotationApi, RequestError};
use crate::viewer::{marker_label, ViewerAdapter};
use futures::future::join_all;
use log::{debug, info, warn};
use pointnote_core::{
    validate_text, Annotation, AnnotationDraft, AnnotationId, AnnotationValidationError, Point3,
    TextBudget, MAX_TEXT_BYTES,
};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::rc::Rc;

/// Creation-cycle state of the annotation form.
#[derive(Debug, Clone, PartialEq)]
pub enum FormState {
    /// No form visible.
    Idle,
    /// Form visible for a clicked coordinate; nothing sent yet.
    Pending(PendingAnnotation),
    /// Create request issued and not yet answered.
    Saving(PendingAnnotation),
}

/// Coordinates picked by the user plus the text typed so far.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingAnnotation {
    pub position: Point3,
    pub text: String,
}

/// Action waiting for explicit user confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Delete(AnnotationId),
    ClearAll,
}

impl Confirmation {
    pub fn prompt(&self) -> &'static str {
        match self {
            Self::Delete(_) => "Are you sure you want to delete this annotation?",
            Self::ClearAll => "Are you sure you want to delete all annotations?",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Success,
    Error,
    Info,
}

/// User-visible notification. Stays queued until dismissed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub id: u64,
    pub kind: ToastKind,
    pub title: String,
    pub message: String,
}

/// One row of the rendered annotation list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationListItem {
    pub id: AnnotationId,
    pub text: String,
    /// `x`, `y`, `z` formatted to two decimals.
    pub coordinates: [String; 3],
    pub selected: bool,
    pub delete_enabled: bool,
}

/// Rendered annotation list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnotationListView {
    Empty,
    Items(Vec<AnnotationListItem>),
}

/// Result of a clear-all fan-out, handed back to `finish_clear_all`.
#[derive(Debug)]
pub struct ClearAllOutcome {
    /// Annotations the fan-out targeted.
    pub ids: Vec<AnnotationId>,
    /// One entry per failed delete.
    pub failures: Vec<RequestError>,
}

/// Mutations confirmed while a load was in flight. The fetched list may
/// predate them, so `finish_load` re-applies them on top of it.
#[derive(Debug, Default)]
struct SettledDuringLoad {
    created: Vec<Annotation>,
    deleted: HashSet<AnnotationId>,
}

/// State owner for the annotation panel and its 3D markers.
pub struct AnnotationController<A, V: ViewerAdapter> {
    api: Rc<A>,
    viewer: V,
    annotations: Vec<Annotation>,
    markers: HashMap<AnnotationId, V::Marker>,
    selected: Option<AnnotationId>,
    form: FormState,
    confirmation: Option<Confirmation>,
    deleting: HashSet<AnnotationId>,
    clearing: bool,
    loading: bool,
    settled: SettledDuringLoad,
    toasts: Vec<Toast>,
    next_toast_id: u64,
}

impl<A: AnnotationApi, V: ViewerAdapter> AnnotationController<A, V> {
    /// Creates an empty controller. Call `load` to fetch stored annotations.
    pub fn new(api: A, viewer: V) -> Self {
        Self {
            api: Rc::new(api),
            viewer,
            annotations: Vec::new(),
            markers: HashMap::new(),
            selected: None,
            form: FormState::Idle,
            confirmation: None,
            deleting: HashSet::new(),
            clearing: false,
            loading: false,
            settled: SettledDuringLoad::default(),
            toasts: Vec::new(),
            next_toast_id: 1,
        }
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn viewer(&self) -> &V {
        &self.viewer
    }

    pub fn form(&self) -> &FormState {
        &self.form
    }

    pub fn selected(&self) -> Option<AnnotationId> {
        self.selected
    }

    pub fn confirmation(&self) -> Option<Confirmation> {
        self.confirmation
    }

    pub fn toasts(&self) -> &[Toast] {
        &self.toasts
    }

    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_saving(&self) -> bool {
        matches!(self.form, FormState::Saving(_))
    }

    pub fn is_clearing(&self) -> bool {
        self.clearing
    }

    pub fn is_deleting(&self, id: AnnotationId) -> bool {
        self.deleting.contains(&id)
    }

    /// Removes one notification. Returns `false` for unknown ids.
    pub fn dismiss_toast(&mut self, id: u64) -> bool {
        let before = self.toasts.len();
        self.toasts.retain(|toast| toast.id != id);
        self.toasts.len() != before
    }

    // ---- load -----------------------------------------------------------

    /// Starts a full refresh. Returns `None` while a load is in flight.
    pub fn begin_load(
        &mut self,
    ) -> Option<impl Future<Output = Result<Vec<Annotation>, RequestError>>> {
        if self.loading {
            return None;
        }
        self.loading = true;
        self.settled = SettledDuringLoad::default();
        let api = Rc::clone(&self.api);
        Some(async move { api.list().await })
    }

    /// Replaces the local list with the fetched one and re-renders markers.
    ///
    /// Creates and deletes confirmed after `begin_load` win over the fetched
    /// list.
    pub fn finish_load(&mut self, result: Result<Vec<Annotation>, RequestError>) {
        self.loading = false;
        let settled = std::mem::take(&mut self.settled);
        match result {
            Ok(fetched) => {
                info!(
                    "event=ui_load module=controller status=ok count={}",
                    fetched.len()
                );
                let mut seen = HashSet::new();
                self.annotations = fetched
                    .into_iter()
                    .chain(settled.created)
                    .filter(|annotation| {
                        !settled.deleted.contains(&annotation.annotation_id)
                            && seen.insert(annotation.annotation_id)
                    })
                    .collect();
                if let Some(selected) = self.selected {
                    if self.find(selected).is_none() {
                        self.selected = None;
                    }
                }
                self.render_markers();
            }
            Err(err) => {
                warn!("event=ui_load module=controller status=error error={err}");
                self.push_toast(
                    ToastKind::Error,
                    "Error",
                    format!(
                        "Failed to load annotations. Please check your API endpoint configuration. ({})",
                        err.message
                    ),
                );
            }
        }
    }

    pub async fn load(&mut self) {
        if let Some(request) = self.begin_load() {
            let result = request.await;
            self.finish_load(result);
        }
    }

    // ---- create ---------------------------------------------------------

    /// Handles a click on the rendered cloud.
    ///
    /// Opens (or re-targets) the form when the click hits a point. Ignored
    /// while a save is in flight. Returns whether the form now targets the
    /// clicked point.
    pub fn handle_click(&mut self, screen_x: f64, screen_y: f64) -> bool {
        if self.is_saving() {
            return false;
        }
        let Some(position) = self.viewer.translate_click_to_3d(screen_x, screen_y) else {
            return false;
        };
        debug!(
            "event=ui_pick module=controller status=ok x={:.3} y={:.3} z={:.3}",
            position.x, position.y, position.z
        );
        self.form = FormState::Pending(PendingAnnotation {
            position,
            text: String::new(),
        });
        true
    }

    /// Updates the draft text. Returns its byte budget, or `None` when no
    /// editable form is open.
    pub fn set_draft_text(&mut self, text: impl Into<String>) -> Option<TextBudget> {
        let FormState::Pending(pending) = &mut self.form else {
            return None;
        };
        pending.text = text.into();
        Some(TextBudget::of(&pending.text))
    }

    /// Closes an editable form without contacting the service.
    ///
    /// A form in `Saving` has already sent its request and cannot be
    /// cancelled.
    pub fn cancel_form(&mut self) -> bool {
        if matches!(self.form, FormState::Pending(_)) {
            self.form = FormState::Idle;
            return true;
        }
        false
    }

    pub fn handle_escape(&mut self) -> bool {
        self.cancel_form()
    }

    /// Validates the draft and issues the create request.
    ///
    /// Returns `None` (and stays `Pending`) when there is nothing to save or
    /// the text is invalid; the latter queues a validation notification.
    pub fn begin_save(
        &mut self,
    ) -> Option<impl Future<Output = Result<Annotation, RequestError>>> {
        let FormState::Pending(pending) = &self.form else {
            return None;
        };

        let text = match validate_text(&pending.text) {
            Ok(trimmed) => trimmed.to_string(),
            Err(err) => {
                let message = match err {
                    AnnotationValidationError::TextTooLong { .. } => {
                        format!("Annotation text exceeds {MAX_TEXT_BYTES} bytes limit")
                    }
                    _ => "Please enter annotation text".to_string(),
                };
                self.push_toast(ToastKind::Error, "Validation Error", message);
                return None;
            }
        };

        let draft = AnnotationDraft::new(pending.position, text);
        let pending = pending.clone();
        self.form = FormState::Saving(pending);

        let api = Rc::clone(&self.api);
        Some(async move { api.create(&draft).await })
    }

    /// Commits a create result.
    ///
    /// Success appends the server record and places its marker. Failure
    /// reopens the form with the typed text intact.
    pub fn finish_save(&mut self, result: Result<Annotation, RequestError>) {
        if !self.is_saving() {
            warn!("event=ui_save module=controller status=ignored reason=not_saving");
            return;
        }
        let FormState::Saving(pending) = std::mem::replace(&mut self.form, FormState::Idle) else {
            return;
        };

        match result {
            Ok(annotation) => {
                info!(
                    "event=ui_save module=controller status=ok annotation_id={}",
                    annotation.annotation_id
                );
                if self.loading {
                    self.settled.created.push(annotation.clone());
                }
                self.place_marker(&annotation);
                if self.find(annotation.annotation_id).is_none() {
                    self.annotations.push(annotation);
                }
                self.push_toast(
                    ToastKind::Success,
                    "Annotation Created",
                    "Your annotation has been saved successfully",
                );
            }
            Err(err) => {
                warn!("event=ui_save module=controller status=error error={err}");
                self.form = FormState::Pending(pending);
                self.push_toast(
                    ToastKind::Error,
                    "Save Failed",
                    format!("Failed to save annotation. Please try again. ({})", err.message),
                );
            }
        }
    }

    pub async fn save(&mut self) {
        if let Some(request) = self.begin_save() {
            let result = request.await;
            self.finish_save(result);
        }
    }

    // ---- selection ------------------------------------------------------

    /// Highlights a listed annotation. Unknown ids are ignored.
    pub fn select(&mut self, id: AnnotationId) -> bool {
        if self.find(id).is_none() {
            return false;
        }
        self.selected = Some(id);
        true
    }

    // ---- delete / clear all ---------------------------------------------

    /// Arms the delete confirmation for a listed annotation.
    ///
    /// Refused while that annotation's delete or a clear-all is in flight.
    pub fn request_delete(&mut self, id: AnnotationId) -> bool {
        if self.find(id).is_none() || self.deleting.contains(&id) || self.clearing {
            return false;
        }
        self.confirmation = Some(Confirmation::Delete(id));
        true
    }

    /// Arms the clear-all confirmation. Refused when the list is empty or a
    /// clear-all is already in flight.
    pub fn request_clear_all(&mut self) -> bool {
        if self.annotations.is_empty() || self.clearing {
            return false;
        }
        self.confirmation = Some(Confirmation::ClearAll);
        true
    }

    pub fn dismiss_confirmation(&mut self) {
        self.confirmation = None;
    }

    /// Issues the confirmed single delete.
    pub fn begin_delete(
        &mut self,
    ) -> Option<impl Future<Output = (AnnotationId, Result<(), RequestError>)>> {
        let Some(Confirmation::Delete(id)) = self.confirmation else {
            return None;
        };
        self.confirmation = None;
        if !self.deleting.insert(id) {
            return None;
        }

        let api = Rc::clone(&self.api);
        Some(async move {
            let result = api.delete(&id.to_string()).await;
            (id, result)
        })
    }

    /// Commits a single delete. Local state changes only on success.
    pub fn finish_delete(&mut self, id: AnnotationId, result: Result<(), RequestError>) {
        self.deleting.remove(&id);
        match result {
            Ok(()) => {
                info!("event=ui_delete module=controller status=ok annotation_id={id}");
                self.remove_local(id);
                self.push_toast(
                    ToastKind::Success,
                    "Annotation Deleted",
                    "The annotation has been removed successfully",
                );
            }
            Err(err) => {
                warn!("event=ui_delete module=controller status=error annotation_id={id} error={err}");
                self.push_toast(
                    ToastKind::Error,
                    "Delete Failed",
                    format!("Failed to delete annotation. Please try again. ({})", err.message),
                );
            }
        }
    }

    /// Issues one delete per listed annotation, concurrently.
    pub fn begin_clear_all(&mut self) -> Option<impl Future<Output = ClearAllOutcome>> {
        if self.confirmation != Some(Confirmation::ClearAll) {
            return None;
        }
        self.confirmation = None;
        if self.clearing {
            return None;
        }
        self.clearing = true;

        let ids = self
            .annotations
            .iter()
            .map(|annotation| annotation.annotation_id)
            .collect::<Vec<_>>();
        let api = Rc::clone(&self.api);
        Some(async move {
            let keys = ids.iter().map(ToString::to_string).collect::<Vec<_>>();
            let results = join_all(keys.iter().map(|key| api.delete(key))).await;
            let failures = results.into_iter().filter_map(Result::err).collect();
            ClearAllOutcome { ids, failures }
        })
    }

    /// Commits a clear-all: all targeted annotations go, or none do.
    pub fn finish_clear_all(&mut self, outcome: ClearAllOutcome) {
        self.clearing = false;
        if let Some(first) = outcome.failures.first() {
            warn!(
                "event=ui_clear_all module=controller status=error failed={} total={} error={}",
                outcome.failures.len(),
                outcome.ids.len(),
                first
            );
            self.push_toast(
                ToastKind::Error,
                "Clear Failed",
                format!(
                    "Failed to clear annotations ({} of {} deletes failed). Please try again. ({})",
                    outcome.failures.len(),
                    outcome.ids.len(),
                    first.message
                ),
            );
            return;
        }

        info!(
            "event=ui_clear_all module=controller status=ok count={}",
            outcome.ids.len()
        );
        let cleared = outcome.ids.into_iter().collect::<HashSet<_>>();
        if self.loading {
            self.settled.deleted.extend(cleared.iter().copied());
        }
        self.annotations
            .retain(|annotation| !cleared.contains(&annotation.annotation_id));
        if self.annotations.is_empty() {
            self.markers.clear();
            self.viewer.remove_all_markers();
        } else {
            for id in &cleared {
                if let Some(marker) = self.markers.remove(id) {
                    self.viewer.remove_marker(marker);
                }
            }
        }
        if self.selected.is_some_and(|id| cleared.contains(&id)) {
            self.selected = None;
        }
        self.push_toast(
            ToastKind::Success,
            "All Annotations Cleared",
            "All annotations have been removed successfully",
        );
    }

    /// Runs whichever action is awaiting confirmation.
    pub async fn confirm(&mut self) {
        match self.confirmation {
            Some(Confirmation::Delete(_)) => {
                if let Some(request) = self.begin_delete() {
                    let (id, result) = request.await;
                    self.finish_delete(id, result);
                }
            }
            Some(Confirmation::ClearAll) => {
                if let Some(request) = self.begin_clear_all() {
                    let outcome = request.await;
                    self.finish_clear_all(outcome);
                }
            }
            None => {}
        }
    }

    // ---- rendering ------------------------------------------------------

    /// Builds the list view model from current state.
    pub fn list_view(&self) -> AnnotationListView {
        if self.annotations.is_empty() {
            return AnnotationListView::Empty;
        }
        AnnotationListView::Items(
            self.annotations
                .iter()
                .map(|annotation| AnnotationListItem {
                    id: annotation.annotation_id,
                    text: annotation.text.clone(),
                    coordinates: [
                        format_coordinate(annotation.x),
                        format_coordinate(annotation.y),
                        format_coordinate(annotation.z),
                    ],
                    selected: self.selected == Some(annotation.annotation_id),
                    delete_enabled: !self.clearing
                        && !self.deleting.contains(&annotation.annotation_id),
                })
                .collect(),
        )
    }

    /// Drops every mapped marker and places one per listed annotation.
    fn render_markers(&mut self) {
        for (_, marker) in self.markers.drain() {
            self.viewer.remove_marker(marker);
        }
        for annotation in &self.annotations {
            let marker = self.viewer.place_marker(
                annotation.annotation_id,
                annotation.position(),
                &marker_label(&annotation.text),
            );
            self.markers.insert(annotation.annotation_id, marker);
        }
    }

    fn place_marker(&mut self, annotation: &Annotation) {
        let marker = self.viewer.place_marker(
            annotation.annotation_id,
            annotation.position(),
            &marker_label(&annotation.text),
        );
        if let Some(previous) = self.markers.insert(annotation.annotation_id, marker) {
            self.viewer.remove_marker(previous);
        }
    }

    fn remove_local(&mut self, id: AnnotationId) {
        if self.loading {
            self.settled.deleted.insert(id);
        }
        self.annotations
            .retain(|annotation| annotation.annotation_id != id);
        if let Some(marker) = self.markers.remove(&id) {
            self.viewer.remove_marker(marker);
        }
        if self.selected == Some(id) {
            self.selected = None;
        }
    }

    fn find(&self, id: AnnotationId) -> Option<&Annotation> {
        self.annotations
            .iter()
            .find(|annotation| annotation.annotation_id == id)
    }

    fn push_toast(&mut self, kind: ToastKind, title: &str, message: impl Into<String>) {
        let id = self.next_toast_id;
        self.next_toast_id += 1;
        self.toasts.push(Toast {
            id,
            kind,
            title: title.to_string(),
            message: message.into(),
        });
    }
}

/// Formats one coordinate for display.
pub fn format_coordinate(value: f64) -> String {
    format!("{value:.2}")
}
