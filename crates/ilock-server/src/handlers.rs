//! Handlers the gateway serves itself: authentication, time and status

use axum::{body::Body, http::HeaderMap};
use ilock_core::{Envelope, IlockError, IlockResult};
use serde_json::{json, Value};
use tracing::{info, warn};
use zeroize::Zeroizing;

use crate::app::AppState;
use crate::dispatch::{read_json, Reply};
use crate::session::{clear_session_cookie, session_cookie, Validation};

const DATE_BIN: &str = "/bin/date";

fn required_str<'a>(request: &'a Value, key: &str) -> IlockResult<&'a str> {
    request
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| IlockError::Request(format!("missing attribute: {key}")))
}

/// Log a request-time failure and wrap it in a `KO` envelope.
fn failed(operation: &str, err: IlockError) -> Reply {
    warn!("{operation} failed: {err}");
    Envelope::error(err).into()
}

pub async fn login(state: &AppState, body: Body) -> Reply {
    match try_login(state, body).await {
        Ok(reply) => reply,
        Err(e) => failed("login", e),
    }
}

async fn try_login(state: &AppState, body: Body) -> IlockResult<Reply> {
    let request = read_json(body).await?;
    let volume = required_str(&request, "username")?;
    let password = Zeroizing::new(required_str(&request, "password")?.as_bytes().to_vec());

    let secret = match state.registry.auth_hsm() {
        Some(binding) => binding.hsm.derive_key(&password)?,
        None => password,
    };
    state.authenticator.authenticate(volume, &secret).await?;

    let (id, xsrf) = state.sessions.create().await?;
    for (cipher, err) in state.registry.activate_all(true) {
        warn!(cipher = %cipher, "activation after login failed: {err}");
    }
    info!(volume = %volume, "login");

    Ok(Reply::WithCookie(
        Envelope::ok(json!({ "XSRFToken": xsrf.as_str() })),
        session_cookie(&id, state.settings.cookie_secure),
    ))
}

/// Issue a new XSRF token for a known session. The XSRF header is not
/// required since reissuing it is the point.
pub async fn refresh(state: &AppState, headers: &HeaderMap) -> Reply {
    let validation = state.sessions.validate(headers).await;
    let Some(id) = validation.session_id.filter(|_| validation.session_valid) else {
        return Envelope::invalid_session().into();
    };

    match state.sessions.refresh_xsrf(&id).await {
        Ok(xsrf) => Envelope::ok(json!({ "XSRFToken": xsrf.as_str() })).into(),
        Err(_) => Envelope::invalid_session().into(),
    }
}

pub async fn logout(state: &AppState, validation: &Validation) -> Reply {
    if let Some(id) = &validation.session_id {
        state.sessions.destroy(id).await;
    }
    // Activation failures are already logged per cipher
    let _ = state.registry.activate_all(false);
    info!("logout");

    Reply::WithCookie(
        Envelope::ok_empty(),
        clear_session_cookie(state.settings.cookie_secure),
    )
}

pub async fn poweroff(state: &AppState, validation: &Validation) -> Reply {
    let reply = logout(state, validation).await;
    info!("powering off");
    match state.ops.poweroff().await {
        Ok(()) => reply,
        Err(e) => failed("poweroff", e),
    }
}

pub async fn set_time(state: &AppState, body: Body) -> Reply {
    match try_set_time(state, body).await {
        Ok(()) => Envelope::ok_empty().into(),
        Err(e) => failed("set time", e),
    }
}

async fn try_set_time(state: &AppState, body: Body) -> IlockResult<()> {
    let request = read_json(body).await?;
    let epoch = request
        .get("epoch")
        .ok_or_else(|| IlockError::Request("missing attribute: epoch".into()))?
        .as_i64()
        .ok_or_else(|| IlockError::Request("invalid epoch format".into()))?;

    if !state.settings.set_time {
        info!(epoch, "time adjustment disabled, ignoring");
        return Ok(());
    }

    let status = tokio::process::Command::new(DATE_BIN)
        .arg("-s")
        .arg(format!("@{epoch}"))
        .status()
        .await?;
    if !status.success() {
        return Err(IlockError::Other(anyhow::anyhow!(
            "{DATE_BIN} exited with {status}"
        )));
    }
    info!(epoch, "device time adjusted");
    Ok(())
}

pub fn ciphers(state: &AppState) -> Reply {
    Envelope::ok(state.registry.enabled_info()).into()
}

pub fn version() -> Reply {
    Envelope::ok(json!({ "version": env!("CARGO_PKG_VERSION") })).into()
}

pub async fn running(state: &AppState) -> Reply {
    let model = |binding: Option<&ilock_crypto::HsmBinding>| binding.map(|b| b.model.clone());
    Envelope::ok(json!({
        "uptime": state.settings.started.elapsed().as_secs(),
        "ciphers": state.registry.enabled_names(),
        "sessions": state.sessions.count().await,
        "hsm": {
            "auth": model(state.registry.auth_hsm()),
            "tls": model(state.registry.tls_hsm()),
        },
    }))
    .into()
}
