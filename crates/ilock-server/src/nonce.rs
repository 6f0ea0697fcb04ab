//! Per-response CSP nonce and security headers
//!
//! [`apply_headers`] is the outermost layer around both the static file
//! service and the API dispatcher. For every response it:
//!   - draws a fresh nonce and embeds it in `Content-Security-Policy`
//!   - disables caching (`Cache-Control`, `Pragma`, `Expires`)
//!   - rewrites the body stream, replacing every [`NONCE_TOKEN`] with the nonce
//!
//! Substitution is streaming: up to `NONCE_TOKEN.len() - 1` bytes are carried
//! between chunks so a placeholder split across writes is still replaced.

use axum::{
    body::Body,
    extract::Request,
    http::{header, HeaderValue},
    middleware::Next,
    response::Response,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use bytes::Bytes;
use futures::{stream, Stream, StreamExt};
use rand::RngCore;

/// Random bytes per nonce
pub const NONCE_SIZE: usize = 32;

/// Placeholder replaced by the response nonce in every body
pub const NONCE_TOKEN: &str = "{{ nonce }}";

const EXPIRES_IN_THE_PAST: &str = "Fri, 07 Jan 1981 00:00:00 GMT";
const CACHE_CONTROL: &str = "no-cache, no-store, max-age=0, must-revalidate";

/// `size` random bytes, base64url without padding.
pub fn encoded_random_string(size: usize) -> String {
    let mut bytes = vec![0u8; size];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

pub fn generate_nonce() -> String {
    encoded_random_string(NONCE_SIZE)
}

pub fn content_security_policy(nonce: &str) -> String {
    format!(
        "default-src 'none'; script-src 'strict-dynamic' 'nonce-{nonce}' 'unsafe-eval'; \
         style-src 'self' 'unsafe-inline'; img-src 'self'; connect-src 'self';"
    )
}

/// Middleware: security headers + body nonce substitution.
pub async fn apply_headers(request: Request, next: Next) -> Response {
    let nonce = generate_nonce();
    let response = next.run(request).await;
    let (mut parts, body) = response.into_parts();

    let headers = &mut parts.headers;
    // base64url output is always a valid header value
    if let Ok(csp) = HeaderValue::from_str(&content_security_policy(&nonce)) {
        headers.insert(header::CONTENT_SECURITY_POLICY, csp);
    }
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(CACHE_CONTROL));
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(header::EXPIRES, HeaderValue::from_static(EXPIRES_IN_THE_PAST));
    // Substitution changes the body length
    headers.remove(header::CONTENT_LENGTH);

    let body = Body::from_stream(substitute_stream(body.into_data_stream(), nonce));
    Response::from_parts(parts, body)
}

/// Incremental placeholder replacement over a sequence of writes.
#[derive(Debug)]
pub struct NonceSubstituter {
    nonce: Vec<u8>,
    carry: Vec<u8>,
}

impl NonceSubstituter {
    pub fn new(nonce: &str) -> Self {
        Self {
            nonce: nonce.as_bytes().to_vec(),
            carry: Vec::new(),
        }
    }

    /// Rewrite one chunk. A trailing partial placeholder is held back until
    /// the next call (or [`finish`](Self::finish)).
    pub fn feed(&mut self, chunk: &[u8]) -> Bytes {
        let token = NONCE_TOKEN.as_bytes();
        let mut buf = std::mem::take(&mut self.carry);
        buf.extend_from_slice(chunk);

        let mut out = Vec::with_capacity(buf.len());
        let mut pos = 0;
        while let Some(found) = find(&buf[pos..], token) {
            out.extend_from_slice(&buf[pos..pos + found]);
            out.extend_from_slice(&self.nonce);
            pos += found + token.len();
        }

        let rest = &buf[pos..];
        let keep = partial_token_suffix(rest, token);
        out.extend_from_slice(&rest[..rest.len() - keep]);
        self.carry = rest[rest.len() - keep..].to_vec();

        Bytes::from(out)
    }

    /// Flush bytes held back by the last [`feed`](Self::feed).
    pub fn finish(&mut self) -> Bytes {
        Bytes::from(std::mem::take(&mut self.carry))
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Length of the longest suffix of `data` that is a proper prefix of `token`.
fn partial_token_suffix(data: &[u8], token: &[u8]) -> usize {
    let max = (token.len() - 1).min(data.len());
    (1..=max)
        .rev()
        .find(|&k| data.ends_with(&token[..k]))
        .unwrap_or(0)
}

struct SubstituteState<S> {
    inner: S,
    substituter: NonceSubstituter,
    done: bool,
}

/// Wrap a body data stream with nonce substitution.
pub fn substitute_stream<S, E>(inner: S, nonce: String) -> impl Stream<Item = Result<Bytes, E>>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    let state = SubstituteState {
        inner,
        substituter: NonceSubstituter::new(&nonce),
        done: false,
    };

    stream::unfold(state, |mut st| async move {
        if st.done {
            return None;
        }
        match st.inner.next().await {
            Some(Ok(chunk)) => {
                let out = st.substituter.feed(&chunk);
                Some((Ok(out), st))
            }
            Some(Err(e)) => {
                st.done = true;
                Some((Err(e), st))
            }
            None => {
                st.done = true;
                let tail = st.substituter.finish();
                if tail.is_empty() {
                    None
                } else {
                    Some((Ok(tail), st))
                }
            }
        }
    })
}
