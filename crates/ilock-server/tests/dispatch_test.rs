//! Fixed command table, dynamic cipher routes and the built-in handlers.

mod common;

use axum::http::StatusCode;
use common::*;
use ilock_server::{AppState, UnsupportedOps};
use serde_json::json;
use std::sync::Arc;

/// A provider that is available but not enabled still serves its dynamic routes.
#[tokio::test]
async fn dynamic_route_reaches_available_provider() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());
    let creds = login(&app).await;

    let sent = send(&app, authed("/api/OpenPGP/gen_key", &creds, json!({ "bits": 4096 }))).await;
    assert_eq!(
        sent.json(),
        json!({
            "status": "OK",
            "response": { "cipher": "OpenPGP", "action": "gen_key", "body": { "bits": 4096 } },
        })
    );
}

/// Unknown providers and malformed paths get the INVALID envelope.
#[tokio::test]
async fn unknown_routes_are_invalid_method() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());
    let creds = login(&app).await;

    for uri in ["/api/Nonexistent/info", "/api/OpenPGP/GenKey", "/api/a/b/c", "/api/nope"] {
        let sent = send(&app, authed(uri, &creds, json!({}))).await;
        assert_eq!(sent.status, StatusCode::OK);
        assert_eq!(
            sent.json(),
            json!({ "status": "INVALID", "response": ["invalid method"] }),
            "{uri}"
        );
    }
}

/// Dynamic routes sit behind the gate like any other path.
#[tokio::test]
async fn dynamic_route_requires_session() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());

    let sent = send(&app, post("/api/OpenPGP/info", json!({}))).await;
    assert_eq!(sent.json()["status"], "INVALID_SESSION");
}

#[tokio::test]
async fn malformed_cipher_body_is_ko() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());
    let creds = login(&app).await;

    let request = axum::http::Request::post("/api/TOTP/verify")
        .header("cookie", &creds.cookie)
        .header("x-xsrftoken", &creds.xsrf)
        .body(axum::body::Body::from("{not json"))
        .unwrap();
    let sent = send(&app, request).await;
    assert_eq!(sent.json()["status"], "KO");
}

/// Cipher listing shows enabled providers only.
#[tokio::test]
async fn ciphers_lists_enabled() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());
    let creds = login(&app).await;

    let sent = send(&app, authed("/api/crypto/ciphers", &creds, json!({}))).await;
    let json = sent.json();
    assert_eq!(json["status"], "OK");
    let names: Vec<&str> = json["response"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["AES-256-OFB", "TOTP"]);
    assert_eq!(json["response"][0]["extension"], "aes-256-ofb");
}

#[tokio::test]
async fn status_endpoints() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());
    let creds = login(&app).await;

    let sent = send(&app, authed("/api/status/version", &creds, json!({}))).await;
    assert_eq!(sent.json()["response"]["version"], env!("CARGO_PKG_VERSION"));

    let sent = send(&app, authed("/api/status/running", &creds, json!({}))).await;
    let json = sent.json();
    assert_eq!(json["response"]["sessions"], 1);
    assert_eq!(json["response"]["ciphers"], json!(["AES-256-OFB", "TOTP"]));
    assert!(json["response"]["uptime"].is_u64());
}

/// Time setting validates the epoch; with `set_time` off nothing is executed.
#[tokio::test]
async fn set_time_validation() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());
    let creds = login(&app).await;

    let sent = send(&app, authed("/api/config/time", &creds, json!({ "epoch": "noon" }))).await;
    assert_eq!(
        sent.json(),
        json!({ "status": "KO", "response": ["invalid request: invalid epoch format"] })
    );

    let sent = send(&app, authed("/api/config/time", &creds, json!({}))).await;
    assert!(sent.body.contains("missing attribute: epoch"));

    let sent = send(&app, authed("/api/config/time", &creds, json!({ "epoch": 1_700_000_000 }))).await;
    assert_eq!(sent.json()["status"], "OK");
}

/// Poweroff logs the client out before handing over to the backend.
#[tokio::test]
async fn poweroff_logs_out() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());
    let creds = login(&app).await;

    let sent = send(&app, authed("/api/auth/poweroff", &creds, json!({}))).await;
    assert_eq!(sent.json()["status"], "OK");
    assert!(sent.set_cookie().unwrap().contains("Max-Age=0"));

    let sent = send(&app, authed("/api/status/version", &creds, json!({}))).await;
    assert_eq!(sent.json()["status"], "INVALID_SESSION");
}

/// Without an appliance backend, delegated commands report themselves unavailable.
#[tokio::test]
async fn unsupported_backend_reports_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let config = config("off");
    let state = AppState::new(&config, registry(&config))
        .with_authenticator(Arc::new(FixedAuthenticator::default()))
        .with_ops(Arc::new(UnsupportedOps));
    let app = app_with_state(state, dir.path());
    let creds = login(&app).await;

    let sent = send(&app, authed("/api/luks/change", &creds, json!({}))).await;
    assert_eq!(
        sent.json(),
        json!({ "status": "KO", "response": ["/api/luks/change not available on this appliance"] })
    );

    let sent = send(&app, authed("/api/file/upload", &creds, json!({}))).await;
    assert_eq!(sent.status, StatusCode::NOT_IMPLEMENTED);

    let sent = send(&app, cookie_only("/api/file/download?id=x", &creds)).await;
    assert_eq!(sent.status, StatusCode::NOT_FOUND);
}
