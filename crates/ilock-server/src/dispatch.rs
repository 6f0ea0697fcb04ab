//! `/api` request dispatch
//!
//! Order of evaluation for every `/api/...` request:
//!
//! 1. login / refresh: handled directly, before the gate
//! 2. session/XSRF gate (see [`crate::gate`])
//! 3. one-time download identifier
//! 4. fixed command table (see [`crate::command`])
//! 5. dynamic `/api/{cipher}/{action}` route against the *available* set
//! 6. otherwise the `INVALID` "invalid method" envelope

use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    http::{
        header::{CONTENT_TYPE, SET_COOKIE},
        request::Parts,
        HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
};
use ilock_core::{Envelope, IlockError, IlockResult};
use ilock_crypto::CipherRequest;
use regex::Regex;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::LazyLock;
use tracing::{debug, info, warn};

use crate::app::AppState;
use crate::command::Command;
use crate::gate::{self, Admission, PathClass, LOGIN_PATH, REFRESH_PATH};
use crate::handlers;
use crate::ops::OpContext;

/// Largest JSON request body accepted by envelope endpoints
pub const MAX_JSON_BODY: usize = 1024 * 1024;

static CIPHER_ROUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/api/([A-Za-z0-9-]+)/([a-z0-9_]+)$").expect("cipher route pattern is valid")
});

/// Result of an `/api` handler before it is turned into HTTP.
pub enum Reply {
    Envelope(Envelope),
    /// Envelope plus a `Set-Cookie` value
    WithCookie(Envelope, String),
    /// Response that bypasses the envelope (upload, file streams)
    Raw(Response),
}

impl Reply {
    pub fn raw(status: StatusCode, reason: impl Into<String>) -> Self {
        Reply::Raw((status, reason.into()).into_response())
    }

    fn into_http(self, debug: bool) -> Response {
        match self {
            Reply::Envelope(envelope) => envelope_response(&envelope, None, debug),
            Reply::WithCookie(envelope, cookie) => {
                envelope_response(&envelope, Some(&cookie), debug)
            }
            Reply::Raw(response) => response,
        }
    }
}

impl From<Envelope> for Reply {
    fn from(envelope: Envelope) -> Self {
        Reply::Envelope(envelope)
    }
}

fn envelope_response(envelope: &Envelope, cookie: Option<&str>, debug: bool) -> Response {
    let body = envelope.to_json();
    if debug {
        info!(status = %envelope.status, response = %body, "api response");
    }

    let mut response = (
        StatusCode::OK,
        [(CONTENT_TYPE, HeaderValue::from_static("application/json"))],
        body,
    )
        .into_response();

    if let Some(cookie) = cookie {
        match HeaderValue::from_str(cookie) {
            Ok(value) => {
                response.headers_mut().append(SET_COOKIE, value);
            }
            Err(e) => warn!("dropping unencodable session cookie: {e}"),
        }
    }
    response
}

/// Split a dynamic cipher route into `(name, action)`.
pub fn match_cipher_route(path: &str) -> Option<(&str, &str)> {
    let caps = CIPHER_ROUTE.captures(path)?;
    Some((caps.get(1)?.as_str(), caps.get(2)?.as_str()))
}

/// Read a JSON request body; an empty body reads as `null`.
pub async fn read_json(body: Body) -> IlockResult<Value> {
    let bytes = axum::body::to_bytes(body, MAX_JSON_BODY)
        .await
        .map_err(|e| IlockError::Request(format!("reading request body: {e}")))?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_slice(&bytes)?)
}

/// Axum handler mounted on `/api/{*path}`.
pub async fn api_handler(State(state): State<AppState>, request: Request) -> Response {
    let (parts, body) = request.into_parts();

    if state.settings.debug {
        let remote = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.to_string())
            .unwrap_or_else(|| "-".into());
        info!(remote = %remote, method = %parts.method, uri = %parts.uri, "api request");
    }

    let reply = match parts.uri.path() {
        LOGIN_PATH => handlers::login(&state, body).await,
        REFRESH_PATH => handlers::refresh(&state, &parts.headers).await,
        _ => gated(&state, &parts, body).await,
    };
    reply.into_http(state.settings.debug)
}

async fn gated(state: &AppState, parts: &Parts, body: Body) -> Reply {
    let path = parts.uri.path();
    let class = PathClass::classify(&parts.uri);

    let (admission, validation) =
        gate::check(state.sessions.as_ref(), &parts.headers, &class).await;
    match admission {
        Admission::Admit => {}
        Admission::InvalidSession => {
            debug!(path = %path, error = ?validation.error, "rejected by gate");
            return Envelope::invalid_session().into();
        }
        Admission::Raw(status, reason) => {
            debug!(path = %path, %status, "rejected by gate");
            return Reply::raw(status, reason);
        }
    }

    let ctx = OpContext {
        registry: &state.registry,
        headers: &parts.headers,
    };

    if let PathClass::DownloadById(id) = &class {
        return state.ops.download_by_id(ctx, id).await;
    }

    if let Some(command) = Command::from_path(path) {
        return match command {
            Command::Logout => handlers::logout(state, &validation).await,
            Command::Poweroff => handlers::poweroff(state, &validation).await,
            Command::SetTime => handlers::set_time(state, body).await,
            Command::Ciphers => handlers::ciphers(state),
            Command::Version => handlers::version(),
            Command::Running => handlers::running(state).await,
            other => state.ops.execute(ctx, other, body).await,
        };
    }

    dispatch_cipher(state, path, body).await
}

/// Forward `/api/{cipher}/{action}` to a fresh instance of the provider.
async fn dispatch_cipher(state: &AppState, path: &str, body: Body) -> Reply {
    let Some((name, action)) = match_cipher_route(path) else {
        return Envelope::not_found().into();
    };
    let cipher = match state.registry.lookup_available(name) {
        Ok(cipher) => cipher,
        Err(_) => {
            debug!(cipher = %name, "no provider for dynamic route");
            return Envelope::not_found().into();
        }
    };

    let body = match read_json(body).await {
        Ok(body) => body,
        Err(e) => {
            warn!(cipher = %name, action = %action, "bad cipher request: {e}");
            return Envelope::error(e).into();
        }
    };

    cipher
        .handle_request(CipherRequest {
            action: action.to_string(),
            body,
        })
        .await
        .into()
}
