//! HTTP data layer for the annotation endpoints.
//!
//! # Responsibility
//! - Wrap `GET/POST/DELETE /annotations` as typed async calls.
//! - Fast-fail locally on drafts the service would reject anyway.
//! - Normalize every failure into one `RequestError` shape.
//!
//! # Invariants
//! - `create` returns the server-assigned record; ids are never minted here.
//! - A 2xx response carrying `success: false` is still a failure.
//! - Local validation never replaces service-side validation.

use log::{debug, warn};
use pointnote_core::{validate_id, validate_text, Annotation, AnnotationDraft, ApiEnvelope};
use reqwest::{Response, StatusCode, Url};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::future::Future;

/// Client construction options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Service root, e.g. `https://api.example.com/dev`.
    pub base_url: String,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

/// Classifies where a request failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestErrorKind {
    /// Rejected locally before any network call.
    Validation,
    /// The request never produced an HTTP response.
    Transport,
    /// Non-success HTTP status.
    Status,
    /// A success status with an unreadable or incomplete body.
    Decode,
    /// A success status whose envelope reports `success: false`.
    Rejected,
}

/// The single error type surfaced to UI code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestError {
    pub kind: RequestErrorKind,
    /// HTTP status when a response was received.
    pub status: Option<u16>,
    pub message: String,
}

impl RequestError {
    pub fn new(kind: RequestErrorKind, status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            kind,
            status,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(RequestErrorKind::Validation, None, message)
    }

    fn transport(err: reqwest::Error) -> Self {
        Self::new(
            RequestErrorKind::Transport,
            err.status().map(|status| status.as_u16()),
            err.to_string(),
        )
    }
}

impl Display for RequestError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(f, "request failed ({status}): {}", self.message),
            None => write!(f, "request failed: {}", self.message),
        }
    }
}

impl Error for RequestError {}

/// The three annotation operations, as seen by UI code.
///
/// Implemented by [`AnnotationClient`] over HTTP; UI tests substitute fakes.
pub trait AnnotationApi {
    fn list(&self) -> impl Future<Output = Result<Vec<Annotation>, RequestError>>;
    fn create(
        &self,
        draft: &AnnotationDraft,
    ) -> impl Future<Output = Result<Annotation, RequestError>>;
    fn delete(&self, id: &str) -> impl Future<Output = Result<(), RequestError>>;
}

/// `reqwest`-backed annotation client.
#[derive(Debug, Clone)]
pub struct AnnotationClient {
    http: reqwest::Client,
    base_url: Url,
}

impl AnnotationClient {
    /// Builds a client for `config.base_url`.
    ///
    /// # Errors
    /// - Returns `Validation` when the base URL is not an absolute http(s) URL.
    pub fn new(config: ClientConfig) -> Result<Self, RequestError> {
        let base_url = parse_base_url(&config.base_url)?;
        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Appends percent-encoded path segments to the base URL.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

impl AnnotationApi for AnnotationClient {
    async fn list(&self) -> Result<Vec<Annotation>, RequestError> {
        let url = self.endpoint(&["annotations"]);
        debug!("event=client_list module=client status=start");
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(RequestError::transport)?;
        let envelope = read_envelope(response).await?;
        envelope.annotations.ok_or_else(|| {
            RequestError::new(
                RequestErrorKind::Decode,
                Some(StatusCode::OK.as_u16()),
                "response is missing `annotations`",
            )
        })
    }

    async fn create(&self, draft: &AnnotationDraft) -> Result<Annotation, RequestError> {
        validate_text(&draft.text).map_err(|err| RequestError::validation(err.to_string()))?;
        if !(draft.x.is_finite() && draft.y.is_finite() && draft.z.is_finite()) {
            return Err(RequestError::validation(
                "invalid coordinates: x, y and z must be finite numbers",
            ));
        }

        let url = self.endpoint(&["annotations"]);
        debug!(
            "event=client_create module=client status=start text_bytes={}",
            draft.text.len()
        );
        let response = self
            .http
            .post(url)
            .json(draft)
            .send()
            .await
            .map_err(RequestError::transport)?;
        let envelope = read_envelope(response).await?;
        envelope.annotation.ok_or_else(|| {
            RequestError::new(
                RequestErrorKind::Decode,
                Some(StatusCode::CREATED.as_u16()),
                "response is missing `annotation`",
            )
        })
    }

    async fn delete(&self, id: &str) -> Result<(), RequestError> {
        let key = validate_id(id).map_err(|err| RequestError::validation(err.to_string()))?;

        let url = self.endpoint(&["annotations", key]);
        debug!("event=client_delete module=client status=start annotation_id={key}");
        let response = self
            .http
            .delete(url)
            .send()
            .await
            .map_err(RequestError::transport)?;
        read_envelope(response).await.map(|_| ())
    }
}

fn parse_base_url(raw: &str) -> Result<Url, RequestError> {
    let url = Url::parse(raw.trim())
        .map_err(|err| RequestError::validation(format!("invalid base URL `{raw}`: {err}")))?;
    if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
        return Err(RequestError::validation(format!(
            "base URL must be an http(s) URL, got `{raw}`"
        )));
    }
    Ok(url)
}

/// Reads the body and turns any failure signal into a `RequestError`.
async fn read_envelope(response: Response) -> Result<ApiEnvelope, RequestError> {
    let status = response.status();
    let body = response.bytes().await.map_err(RequestError::transport)?;
    let envelope = serde_json::from_slice::<ApiEnvelope>(&body);

    if !status.is_success() {
        let message = envelope
            .ok()
            .and_then(|envelope| envelope.failure_reason())
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("unexpected status")
                    .to_string()
            });
        warn!(
            "event=client_response module=client status=error http_status={}",
            status.as_u16()
        );
        return Err(RequestError::new(
            RequestErrorKind::Status,
            Some(status.as_u16()),
            message,
        ));
    }

    let envelope = envelope.map_err(|err| {
        RequestError::new(
            RequestErrorKind::Decode,
            Some(status.as_u16()),
            format!("invalid response body: {err}"),
        )
    })?;
    if !envelope.success {
        return Err(RequestError::new(
            RequestErrorKind::Rejected,
            Some(status.as_u16()),
            envelope
                .failure_reason()
                .unwrap_or_else(|| "request was not successful".to_string()),
        ));
    }
    Ok(envelope)
}
