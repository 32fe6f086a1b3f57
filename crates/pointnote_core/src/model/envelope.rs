//! JSON response envelope shared by the HTTP surface and its clients.
//!
//! Every endpoint answers with `{success, ...}`; which optional members are
//! present depends on the operation and outcome.

use crate::model::annotation::Annotation;
use serde::{Deserialize, Serialize};

/// Uniform response body for annotation endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEnvelope {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation: Option<Annotation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Vec<Annotation>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ApiEnvelope {
    pub fn created(annotation: Annotation) -> Self {
        Self {
            success: true,
            annotation: Some(annotation),
            ..Self::default()
        }
    }

    pub fn listed(annotations: Vec<Annotation>) -> Self {
        Self {
            success: true,
            annotations: Some(annotations),
            ..Self::default()
        }
    }

    pub fn deleted() -> Self {
        Self {
            success: true,
            message: Some("Annotation deleted successfully".to_string()),
            ..Self::default()
        }
    }

    /// Client-fault envelope: only `error` is set.
    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Server-fault envelope: a stable `error` summary plus the cause.
    pub fn failed(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            message: Some(message.into()),
            ..Self::default()
        }
    }

    /// Best human-readable failure description carried by this envelope.
    pub fn failure_reason(&self) -> Option<String> {
        match (self.error.as_deref(), self.message.as_deref()) {
            (Some(error), Some(message)) => Some(format!("{error}: {message}")),
            (Some(error), None) => Some(error.to_string()),
            (None, Some(message)) => Some(message.to_string()),
            (None, None) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ApiEnvelope;

    #[test]
    fn absent_members_are_not_serialized() {
        let json = serde_json::to_value(ApiEnvelope::rejected("missing id")).unwrap();
        assert_eq!(json, serde_json::json!({"success": false, "error": "missing id"}));
    }

    #[test]
    fn failure_reason_combines_error_and_message() {
        let envelope = ApiEnvelope::failed("Failed to delete annotation", "disk I/O error");
        assert_eq!(
            envelope.failure_reason().as_deref(),
            Some("Failed to delete annotation: disk I/O error")
        );
        assert_eq!(
            ApiEnvelope::deleted().failure_reason().as_deref(),
            Some("Annotation deleted successfully")
        );
    }
}
