//! Router assembly and HTTP serving
//!
//! Routes:
//!   ANY /api/{*path}  see [`crate::dispatch`]
//!   everything else   static front-end files
//!
//! Every response, static or API, passes through [`nonce::apply_headers`].

use anyhow::Result;
use axum::{middleware, routing::any, Router};
use ilock_core::config::IlockConfig;
use ilock_crypto::Registry;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::services::ServeDir;

use crate::auth::{Authenticator, PassphraseAuthenticator};
use crate::dispatch::api_handler;
use crate::nonce;
use crate::ops::{ApplianceOps, UnsupportedOps};
use crate::session::{MemorySessionStore, SessionStore};

/// Runtime switches taken from configuration
#[derive(Debug, Clone)]
pub struct Settings {
    pub debug: bool,
    pub set_time: bool,
    pub cookie_secure: bool,
    pub started: Instant,
}

impl Settings {
    pub fn from_config(config: &IlockConfig) -> Self {
        Self {
            debug: config.daemon.debug,
            set_time: config.system.set_time,
            cookie_secure: config.auth.cookie_secure,
            started: Instant::now(),
        }
    }
}

/// State shared by every request
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub sessions: Arc<dyn SessionStore>,
    pub authenticator: Arc<dyn Authenticator>,
    pub ops: Arc<dyn ApplianceOps>,
    pub settings: Arc<Settings>,
}

impl AppState {
    /// State with the in-memory session store, passphrase authenticator
    /// and no appliance backend.
    pub fn new(config: &IlockConfig, registry: Registry) -> Self {
        Self {
            registry: Arc::new(registry),
            sessions: Arc::new(MemorySessionStore::new(Duration::from_secs(
                config.auth.session_ttl_secs,
            ))),
            authenticator: Arc::new(PassphraseAuthenticator::new(config.auth.users.clone())),
            ops: Arc::new(UnsupportedOps),
            settings: Arc::new(Settings::from_config(config)),
        }
    }

    pub fn with_sessions(mut self, sessions: Arc<dyn SessionStore>) -> Self {
        self.sessions = sessions;
        self
    }

    pub fn with_authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = authenticator;
        self
    }

    pub fn with_ops(mut self, ops: Arc<dyn ApplianceOps>) -> Self {
        self.ops = ops;
        self
    }
}

pub fn router(state: AppState, static_path: impl AsRef<Path>) -> Router {
    Router::new()
        .route("/api/{*path}", any(api_handler))
        .fallback_service(ServeDir::new(static_path.as_ref()))
        .layer(middleware::from_fn(nonce::apply_headers))
        .with_state(state)
}

/// Serve `app` on `addr` (e.g. "127.0.0.1:4430") until ctrl-c.
pub async fn serve(addr: &str, app: Router) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("bind {addr}: {e}"))?;

    tracing::info!(addr = %addr, "listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .map_err(|e| anyhow::anyhow!("http server: {e}"))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to install ctrl-c handler: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
