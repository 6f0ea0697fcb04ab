//! Browser sessions and XSRF tokens
//!
//! The session identifier travels only in the `ILOCK-Token` cookie (HttpOnly);
//! the XSRF token is returned in the login/refresh payload and must be resent
//! by the client in the `X-XSRFToken` header. It is never set as a cookie.
//!
//! [`MemorySessionStore`] keys sessions by the BLAKE3 hash of the identifier
//! and keeps only the hash of the XSRF token, so raw tokens never sit in the
//! map and comparisons are constant-time.

use async_trait::async_trait;
use axum::http::{header::COOKIE, HeaderMap};
use ilock_core::{IlockError, IlockResult};
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

use crate::nonce::encoded_random_string;

pub const SESSION_COOKIE_NAME: &str = "ILOCK-Token";
pub const XSRF_HEADER: &str = "x-xsrftoken";

/// Random bytes in session identifiers and XSRF tokens
const TOKEN_SIZE: usize = 32;

/// Opaque session identifier carried by the session cookie
#[derive(Clone, PartialEq, Eq)]
pub struct SessionId(String);

/// Anti-forgery token paired with a session
#[derive(Clone, PartialEq, Eq)]
pub struct XsrfToken(String);

macro_rules! opaque_token {
    ($ty:ident) => {
        impl $ty {
            pub fn generate() -> Self {
                Self(encoded_random_string(TOKEN_SIZE))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $ty {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_tuple(stringify!($ty)).field(&"[REDACTED]").finish()
            }
        }
    };
}

opaque_token!(SessionId);
opaque_token!(XsrfToken);

/// Outcome of validating one request against the session store
#[derive(Debug, Clone, Default)]
pub struct Validation {
    pub session_valid: bool,
    pub xsrf_valid: bool,
    /// Session the request belongs to, when `session_valid`
    pub session_id: Option<SessionId>,
    /// Why validation failed, if it did
    pub error: Option<String>,
}

impl Validation {
    fn rejected(reason: &str) -> Self {
        Self {
            error: Some(reason.to_string()),
            ..Default::default()
        }
    }
}

/// Session storage contract. Implementations must tolerate concurrent
/// validation and mutation from many request tasks.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn validate(&self, headers: &HeaderMap) -> Validation;

    async fn create(&self) -> IlockResult<(SessionId, XsrfToken)>;

    /// Issue a new XSRF token for an existing session.
    async fn refresh_xsrf(&self, id: &SessionId) -> IlockResult<XsrfToken>;

    async fn destroy(&self, id: &SessionId);

    /// Number of live sessions
    async fn count(&self) -> usize;
}

struct SessionEntry {
    xsrf: blake3::Hash,
    expires: Instant,
}

/// In-process session store with a fixed time-to-live
pub struct MemorySessionStore {
    ttl: Duration,
    sessions: RwLock<HashMap<blake3::Hash, SessionEntry>>,
}

impl MemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: RwLock::new(HashMap::new()),
        }
    }
}

fn digest(token: &str) -> blake3::Hash {
    blake3::hash(token.as_bytes())
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn validate(&self, headers: &HeaderMap) -> Validation {
        let Some(cookie) = extract_session_cookie(headers) else {
            return Validation::rejected("missing session cookie");
        };

        let sessions = self.sessions.read().await;
        let entry = match sessions.get(&digest(&cookie)) {
            Some(entry) if entry.expires > Instant::now() => entry,
            _ => return Validation::rejected("invalid session"),
        };

        let xsrf_valid = extract_xsrf_header(headers)
            .map(|token| digest(&token) == entry.xsrf)
            .unwrap_or(false);

        Validation {
            session_valid: true,
            xsrf_valid,
            session_id: Some(SessionId(cookie)),
            error: (!xsrf_valid).then(|| "invalid XSRF token".to_string()),
        }
    }

    async fn create(&self) -> IlockResult<(SessionId, XsrfToken)> {
        let id = SessionId::generate();
        let xsrf = XsrfToken::generate();
        let now = Instant::now();

        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, entry| entry.expires > now);
        sessions.insert(
            digest(id.as_str()),
            SessionEntry {
                xsrf: digest(xsrf.as_str()),
                expires: now + self.ttl,
            },
        );
        debug!(live = sessions.len(), "session created");

        Ok((id, xsrf))
    }

    async fn refresh_xsrf(&self, id: &SessionId) -> IlockResult<XsrfToken> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions
            .get_mut(&digest(id.as_str()))
            .filter(|entry| entry.expires > Instant::now())
            .ok_or_else(|| IlockError::Session("invalid session".into()))?;

        let xsrf = XsrfToken::generate();
        entry.xsrf = digest(xsrf.as_str());
        entry.expires = Instant::now() + self.ttl;
        Ok(xsrf)
    }

    async fn destroy(&self, id: &SessionId) {
        if self.sessions.write().await.remove(&digest(id.as_str())).is_some() {
            debug!("session destroyed");
        }
    }

    async fn count(&self) -> usize {
        let now = Instant::now();
        self.sessions
            .read()
            .await
            .values()
            .filter(|entry| entry.expires > now)
            .count()
    }
}

/// Extract the session identifier from the Cookie header.
pub fn extract_session_cookie(headers: &HeaderMap) -> Option<String> {
    extract_cookie_with_name(headers, SESSION_COOKIE_NAME)
}

pub fn extract_cookie_with_name(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|cookie| {
            let (name, value) = cookie.trim().split_once('=')?;
            (name == cookie_name && !value.is_empty()).then(|| value.to_string())
        })
}

pub fn extract_xsrf_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get(XSRF_HEADER)?
        .to_str()
        .ok()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// `Set-Cookie` value establishing a session
pub fn session_cookie(id: &SessionId, secure: bool) -> String {
    format!(
        "{SESSION_COOKIE_NAME}={}; Path=/; HttpOnly; SameSite=Strict{}",
        id.as_str(),
        if secure { "; Secure" } else { "" }
    )
}

/// `Set-Cookie` value expiring the session cookie
pub fn clear_session_cookie(secure: bool) -> String {
    format!(
        "{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Strict; Max-Age=0{}",
        if secure { "; Secure" } else { "" }
    )
}
