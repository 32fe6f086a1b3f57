//! Seam to the external point-cloud viewer.
//!
//! The rendering engine supplies picking and marker primitives; the
//! controller only drives them through this trait.

use pointnote_core::{AnnotationId, Point3};

/// Maximum number of characters shown in a marker label.
pub const MARKER_LABEL_CHARS: usize = 50;

/// Picking and marker primitives provided by the embedded viewer.
pub trait ViewerAdapter {
    /// Opaque handle for one placed marker.
    type Marker;

    /// Translates a screen-space click to a world coordinate, if it hit a point.
    fn translate_click_to_3d(&self, screen_x: f64, screen_y: f64) -> Option<Point3>;

    /// Places a labelled marker and returns its handle.
    fn place_marker(&mut self, id: AnnotationId, position: Point3, label: &str) -> Self::Marker;

    fn remove_marker(&mut self, marker: Self::Marker);

    fn remove_all_markers(&mut self);
}

/// Short label for a marker: the first 50 characters, with `...` when cut.
pub fn marker_label(text: &str) -> String {
    let mut label = text.chars().take(MARKER_LABEL_CHARS).collect::<String>();
    if text.chars().nth(MARKER_LABEL_CHARS).is_some() {
        label.push_str("...");
    }
    label
}
