//! Shared fixtures for gateway integration tests: stub providers, a fixed
//! authenticator and a recording appliance backend.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, Request, StatusCode},
    Router,
};
use ilock_core::{config::IlockConfig, Envelope, IlockError, IlockResult};
use ilock_crypto::{Cipher, CipherError, CipherInfo, CipherRequest, Hsm, Registry, RegistryBuilder};
use ilock_server::{
    command::Command, router, ApplianceOps, AppState, Authenticator, OpContext, Reply,
};
use secrecy::SecretString;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;
use zeroize::Zeroizing;

pub const VOLUME: &str = "data";
pub const PASSWORD: &str = "hunter2";

/// Provider that echoes its action and body back in an `OK` envelope
pub struct EchoCipher(pub &'static str);

#[async_trait]
impl Cipher for EchoCipher {
    fn info(&self) -> CipherInfo {
        CipherInfo {
            name: self.0.into(),
            description: format!("{} echo provider", self.0),
            key_format: "password".into(),
            enc: true,
            dec: true,
            sig: false,
            otp: false,
            msg: false,
            extension: self.0.to_lowercase(),
        }
    }

    fn fresh(&self) -> Box<dyn Cipher> {
        Box::new(EchoCipher(self.0))
    }

    fn activate(&self, _on: bool) -> Result<(), CipherError> {
        Ok(())
    }

    fn set_password(&mut self, _password: SecretString) -> Result<(), CipherError> {
        Ok(())
    }

    fn encrypt(&mut self, plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
        Ok(plaintext.to_vec())
    }

    fn decrypt(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>, CipherError> {
        Ok(ciphertext.to_vec())
    }

    async fn handle_request(&self, request: CipherRequest) -> Envelope {
        Envelope::ok(json!({
            "cipher": self.0,
            "action": request.action,
            "body": request.body,
        }))
    }
}

/// Provider that records every `activate` call it receives
#[derive(Clone, Default)]
pub struct TrackingCipher {
    pub activations: Arc<Mutex<Vec<bool>>>,
}

impl TrackingCipher {
    pub const NAME: &'static str = "Tracker";

    pub fn activations(&self) -> Vec<bool> {
        self.activations.lock().unwrap().clone()
    }
}

#[async_trait]
impl Cipher for TrackingCipher {
    fn info(&self) -> CipherInfo {
        EchoCipher(Self::NAME).info()
    }

    fn fresh(&self) -> Box<dyn Cipher> {
        Box::new(self.clone())
    }

    fn activate(&self, on: bool) -> Result<(), CipherError> {
        self.activations.lock().unwrap().push(on);
        Ok(())
    }

    fn set_password(&mut self, _password: SecretString) -> Result<(), CipherError> {
        Ok(())
    }

    fn encrypt(&mut self, plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
        Ok(plaintext.to_vec())
    }

    fn decrypt(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>, CipherError> {
        Ok(ciphertext.to_vec())
    }

    async fn handle_request(&self, _request: CipherRequest) -> Envelope {
        Envelope::ok_empty()
    }
}

/// HSM whose derived key is the input reversed
pub struct ReversingHsm;

impl Hsm for ReversingHsm {
    fn fresh(&self) -> Arc<dyn Hsm> {
        Arc::new(ReversingHsm)
    }

    fn cipher(&self) -> Result<Box<dyn Cipher>, CipherError> {
        Err(CipherError::Unsupported("no hardware cipher"))
    }

    fn derive_key(&self, input: &[u8]) -> Result<Zeroizing<Vec<u8>>, CipherError> {
        Ok(Zeroizing::new(input.iter().rev().copied().collect()))
    }
}

/// Accepts exactly one volume/secret pair
pub struct FixedAuthenticator {
    pub secret: Vec<u8>,
}

impl Default for FixedAuthenticator {
    fn default() -> Self {
        Self {
            secret: PASSWORD.as_bytes().to_vec(),
        }
    }
}

#[async_trait]
impl Authenticator for FixedAuthenticator {
    async fn authenticate(&self, volume: &str, secret: &[u8]) -> IlockResult<()> {
        if volume == VOLUME && secret == self.secret.as_slice() {
            Ok(())
        } else {
            Err(IlockError::Session("invalid credentials".into()))
        }
    }
}

/// Backend that reports which command or download it was asked for
pub struct RecordingOps;

#[async_trait]
impl ApplianceOps for RecordingOps {
    async fn execute(&self, _ctx: OpContext<'_>, command: Command, _body: Body) -> Reply {
        Reply::Envelope(Envelope::ok(json!({ "executed": command.path() })))
    }

    async fn download_by_id(&self, _ctx: OpContext<'_>, id: &str) -> Reply {
        Reply::raw(StatusCode::OK, format!("contents of {id}"))
    }

    async fn poweroff(&self) -> IlockResult<()> {
        Ok(())
    }
}

pub fn registry_builder() -> RegistryBuilder {
    let mut builder = RegistryBuilder::new();
    builder
        .register_cipher(Arc::new(EchoCipher("OpenPGP")))
        .register_cipher(Arc::new(EchoCipher("AES-256-OFB")))
        .register_cipher(Arc::new(EchoCipher("TOTP")))
        .register_hsm("reverser", Arc::new(ReversingHsm));
    builder
}

pub fn config(hsm: &str) -> IlockConfig {
    let mut config = IlockConfig::default();
    config.crypto.ciphers = vec!["AES-256-OFB".into(), "TOTP".into()];
    config.crypto.hsm = hsm.into();
    config.auth.cookie_secure = false;
    config
}

pub fn registry(config: &IlockConfig) -> Registry {
    registry_builder().initialize(&config.crypto).unwrap()
}

/// Gateway with echo ciphers, the fixed authenticator and the recording backend.
pub fn app(static_dir: &Path) -> Router {
    let config = config("off");
    let state = AppState::new(&config, registry(&config))
        .with_authenticator(Arc::new(FixedAuthenticator::default()))
        .with_ops(Arc::new(RecordingOps));
    router(state, static_dir)
}

/// Gateway whose enabled set includes `tracker`.
pub fn tracked_app(tracker: &TrackingCipher, static_dir: &Path) -> Router {
    let mut config = config("off");
    config.crypto.ciphers.push(TrackingCipher::NAME.into());
    let mut builder = registry_builder();
    builder.register_cipher(Arc::new(tracker.clone()));
    let state = AppState::new(&config, builder.initialize(&config.crypto).unwrap())
        .with_authenticator(Arc::new(FixedAuthenticator::default()))
        .with_ops(Arc::new(RecordingOps));
    router(state, static_dir)
}

pub fn app_with_state(state: AppState, static_dir: &Path) -> Router {
    router(state, static_dir)
}

pub struct Sent {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl Sent {
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body)
            .unwrap_or_else(|e| panic!("not JSON ({e}): {}", self.body))
    }

    pub fn set_cookie(&self) -> Option<String> {
        self.headers
            .get(header::SET_COOKIE)
            .map(|v| v.to_str().unwrap().to_string())
    }
}

pub async fn send(app: &Router, request: Request<Body>) -> Sent {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    Sent {
        status,
        headers,
        body: String::from_utf8(bytes.to_vec()).unwrap(),
    }
}

/// Cookie + XSRF credentials of a logged-in client
#[derive(Clone)]
pub struct Credentials {
    pub cookie: String,
    pub xsrf: String,
}

pub fn post(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn authed(uri: &str, creds: &Credentials, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::COOKIE, &creds.cookie)
        .header("x-xsrftoken", &creds.xsrf)
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn cookie_only(uri: &str, creds: &Credentials) -> Request<Body> {
    Request::post(uri)
        .header(header::COOKIE, &creds.cookie)
        .body(Body::empty())
        .unwrap()
}

pub async fn login(app: &Router) -> Credentials {
    let sent = send(
        app,
        post(
            "/api/auth/login",
            json!({ "username": VOLUME, "password": PASSWORD }),
        ),
    )
    .await;
    let json = sent.json();
    assert_eq!(json["status"], "OK", "login failed: {}", sent.body);

    let set_cookie = sent.set_cookie().expect("login sets the session cookie");
    let cookie = set_cookie.split(';').next().unwrap().to_string();
    Credentials {
        cookie,
        xsrf: json["response"]["XSRFToken"].as_str().unwrap().to_string(),
    }
}
