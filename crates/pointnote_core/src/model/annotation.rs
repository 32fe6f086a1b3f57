//! Annotation domain model.
//!
//! # Responsibility
//! - Define the canonical record persisted in the store and sent on the wire.
//! - Validate create input (coordinates + text) with a fixed check order.
//!
//! # Invariants
//! - `annotation_id` is stable and never reused for another annotation.
//! - `text` is trimmed, non-empty and at most `MAX_TEXT_BYTES` UTF-8 bytes.
//! - Coordinates are finite.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Maximum annotation text size, measured in UTF-8 bytes (not characters).
pub const MAX_TEXT_BYTES: usize = 256;

/// Byte count above which the text budget is reported as a warning.
pub const TEXT_WARNING_BYTES: usize = 200;

/// Stable identifier for a stored annotation.
pub type AnnotationId = Uuid;

/// A position in point-cloud world space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// Canonical annotation record.
///
/// The store row and the wire object share this exact shape:
/// `{annotationId, x, y, z, text, createdAt}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    pub annotation_id: AnnotationId,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub text: String,
    /// Creation time, truncated to millisecond precision.
    #[serde(with = "millis_timestamp")]
    pub created_at: DateTime<Utc>,
}

impl Annotation {
    /// Builds a new annotation from validated draft data.
    ///
    /// Generates a fresh id and stamps `created_at` with the current time.
    pub fn new(draft: AnnotationDraft) -> Self {
        Self::with_id(Uuid::new_v4(), Utc::now(), draft)
    }

    /// Builds an annotation with caller-provided identity and timestamp.
    ///
    /// Used by tests and import paths. Does not validate `draft`.
    pub fn with_id(id: AnnotationId, created_at: DateTime<Utc>, draft: AnnotationDraft) -> Self {
        Self {
            annotation_id: id,
            x: draft.x,
            y: draft.y,
            z: draft.z,
            text: draft.text,
            created_at: created_at.trunc_subsecs(3),
        }
    }

    pub fn position(&self) -> Point3 {
        Point3::new(self.x, self.y, self.z)
    }

    /// Checks the storage invariants of an already-built record.
    ///
    /// Write paths call this before persisting; read paths call it to reject
    /// corrupted rows instead of masking them.
    pub fn validate(&self) -> Result<(), AnnotationValidationError> {
        if !self.position().is_finite() {
            return Err(AnnotationValidationError::InvalidCoordinates);
        }
        if self.text.trim() != self.text {
            return Err(AnnotationValidationError::UntrimmedText);
        }
        validate_text(&self.text)?;
        Ok(())
    }
}

/// Client-side draft for a new annotation.
///
/// Serialized as the `POST /annotations` request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationDraft {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub text: String,
}

impl AnnotationDraft {
    pub fn new(position: Point3, text: impl Into<String>) -> Self {
        Self {
            x: position.x,
            y: position.y,
            z: position.z,
            text: text.into(),
        }
    }
}

/// Untrusted create payload as received by the service.
///
/// Fields are kept as raw JSON values so coordinate coercion and the
/// validation order stay under service control.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreateAnnotationInput {
    pub x: Option<Value>,
    pub y: Option<Value>,
    pub z: Option<Value>,
    pub text: Option<Value>,
}

impl CreateAnnotationInput {
    /// Validates this payload into a draft ready for persistence.
    ///
    /// Check order:
    /// 1. any coordinate missing or `null` -> `MissingCoordinates`
    /// 2. any coordinate not a finite number -> `InvalidCoordinates`
    /// 3. text missing, not a string or blank -> `MissingText`
    /// 4. raw text longer than `MAX_TEXT_BYTES` -> `TextTooLong`
    ///
    /// The returned draft carries trimmed text.
    pub fn validate(&self) -> Result<AnnotationDraft, AnnotationValidationError> {
        let (Some(x), Some(y), Some(z)) = (
            present(self.x.as_ref()),
            present(self.y.as_ref()),
            present(self.z.as_ref()),
        ) else {
            return Err(AnnotationValidationError::MissingCoordinates);
        };

        let (Some(x), Some(y), Some(z)) = (
            coerce_coordinate(x),
            coerce_coordinate(y),
            coerce_coordinate(z),
        ) else {
            return Err(AnnotationValidationError::InvalidCoordinates);
        };

        let Some(Value::String(text)) = self.text.as_ref() else {
            return Err(AnnotationValidationError::MissingText);
        };
        let trimmed = validate_text(text)?;

        Ok(AnnotationDraft {
            x,
            y,
            z,
            text: trimmed.to_string(),
        })
    }
}

impl From<&AnnotationDraft> for CreateAnnotationInput {
    fn from(draft: &AnnotationDraft) -> Self {
        Self {
            x: Some(Value::from(draft.x)),
            y: Some(Value::from(draft.y)),
            z: Some(Value::from(draft.z)),
            text: Some(Value::String(draft.text.clone())),
        }
    }
}

/// Formats a timestamp as RFC 3339 UTC with exactly three fractional digits.
///
/// Shared by the wire format and the store column.
pub fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// `createdAt` always carries milliseconds, even when they are `.000`.
mod millis_timestamp {
    use super::format_timestamp;
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format_timestamp(value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        DateTime::<Utc>::deserialize(deserializer)
    }
}

/// Validation failures for annotation input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnotationValidationError {
    MissingCoordinates,
    InvalidCoordinates,
    MissingText,
    TextTooLong { bytes: usize },
    UntrimmedText,
    MissingId,
}

impl Display for AnnotationValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingCoordinates => {
                write!(f, "missing coordinates: x, y and z are required")
            }
            Self::InvalidCoordinates => {
                write!(f, "invalid coordinates: x, y and z must be finite numbers")
            }
            Self::MissingText => {
                write!(f, "missing or invalid text: text is required and must be a non-empty string")
            }
            Self::TextTooLong { bytes } => write!(
                f,
                "text too long: annotation text is {bytes} bytes, exceeds {MAX_TEXT_BYTES} bytes limit"
            ),
            Self::UntrimmedText => write!(f, "annotation text must be trimmed before storage"),
            Self::MissingId => write!(f, "missing id: annotation id is required"),
        }
    }
}

impl Error for AnnotationValidationError {}

/// Severity of the current text size relative to `MAX_TEXT_BYTES`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextBudgetLevel {
    Ok,
    Warning,
    Error,
}

/// Byte usage report for a draft text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextBudget {
    pub bytes: usize,
    pub level: TextBudgetLevel,
}

impl TextBudget {
    pub fn of(text: &str) -> Self {
        let bytes = text.len();
        let level = if bytes > MAX_TEXT_BYTES {
            TextBudgetLevel::Error
        } else if bytes > TEXT_WARNING_BYTES {
            TextBudgetLevel::Warning
        } else {
            TextBudgetLevel::Ok
        };
        Self { bytes, level }
    }
}

/// Validates annotation text and returns its trimmed form.
///
/// Blank text is rejected first; the byte limit applies to the text as
/// given, before trimming.
pub fn validate_text(text: &str) -> Result<&str, AnnotationValidationError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(AnnotationValidationError::MissingText);
    }
    if text.len() > MAX_TEXT_BYTES {
        return Err(AnnotationValidationError::TextTooLong { bytes: text.len() });
    }
    Ok(trimmed)
}

/// Validates a delete key and returns it trimmed.
pub fn validate_id(id: &str) -> Result<&str, AnnotationValidationError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        return Err(AnnotationValidationError::MissingId);
    }
    Ok(trimmed)
}

fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|value| !value.is_null())
}

fn coerce_coordinate(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(number) => number.as_f64()?,
        Value::String(text) => text.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    number.is_finite().then_some(number)
}
