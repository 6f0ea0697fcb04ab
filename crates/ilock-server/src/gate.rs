//! Session & XSRF gate
//!
//! ```text
//!                  cookie valid?   XSRF header matches?
//! Unauthenticated       no                 -
//! SessionOnlyValid      yes                no
//! FullyValid            yes                yes
//! ```
//!
//! The gate holds no state of its own: the state is recomputed from the
//! session store on every request, then combined with the path class to
//! decide admission.

use axum::{
    extract::Query,
    http::{HeaderMap, StatusCode, Uri},
};

use crate::session::{SessionStore, Validation};

pub const LOGIN_PATH: &str = "/api/auth/login";
pub const REFRESH_PATH: &str = "/api/auth/refresh";
pub const UPLOAD_PATH: &str = "/api/file/upload";
pub const DOWNLOAD_PATH: &str = "/api/file/download";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Unauthenticated,
    SessionOnlyValid,
    FullyValid,
}

impl From<&Validation> for GateState {
    fn from(v: &Validation) -> Self {
        match (v.session_valid, v.xsrf_valid) {
            (true, true) => GateState::FullyValid,
            (true, false) => GateState::SessionOnlyValid,
            (false, _) => GateState::Unauthenticated,
        }
    }
}

/// How a gated path reacts to incomplete credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathClass {
    /// Requires `FullyValid`; rejected with the `INVALID_SESSION` envelope
    Standard,
    /// No JSON envelope; rejected with a raw 401
    Upload,
    /// One-time download identifier: the identifier is the anti-forgery proof
    DownloadById(String),
}

impl PathClass {
    pub fn classify(uri: &Uri) -> Self {
        match uri.path() {
            UPLOAD_PATH => PathClass::Upload,
            DOWNLOAD_PATH => match download_id(uri) {
                Some(id) => PathClass::DownloadById(id),
                None => PathClass::Standard,
            },
            _ => PathClass::Standard,
        }
    }
}

/// First `id` query parameter, percent-decoded. An empty value carries no
/// identifier.
fn download_id(uri: &Uri) -> Option<String> {
    let Query(pairs) = Query::<Vec<(String, String)>>::try_from_uri(uri).ok()?;
    pairs
        .into_iter()
        .find(|(key, _)| key == "id")
        .map(|(_, id)| id)
        .filter(|id| !id.is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Admit,
    /// Structured `INVALID_SESSION` envelope (HTTP 200)
    InvalidSession,
    /// Raw HTTP status with a plain-text reason
    Raw(StatusCode, String),
}

/// Run the gate for a protected path.
pub async fn check(
    store: &dyn SessionStore,
    headers: &HeaderMap,
    class: &PathClass,
) -> (Admission, Validation) {
    let validation = store.validate(headers).await;
    let admission = admit(GateState::from(&validation), class, validation.error.as_deref());
    (admission, validation)
}

/// Admission policy for a given gate state and path class.
pub fn admit(state: GateState, class: &PathClass, error: Option<&str>) -> Admission {
    match (state, class) {
        (GateState::FullyValid, _) => Admission::Admit,
        (GateState::SessionOnlyValid, PathClass::DownloadById(_)) => Admission::Admit,
        (_, PathClass::Upload) => Admission::Raw(
            StatusCode::UNAUTHORIZED,
            error.unwrap_or("invalid session").to_string(),
        ),
        _ => Admission::InvalidSession,
    }
}
