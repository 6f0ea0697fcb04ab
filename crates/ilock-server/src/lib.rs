//! ilock-server: HTTP gateway for the ilock appliance
//!
//! ```text
//! request ─► nonce::apply_headers ─► /api/{*path} ─► dispatch ─► gate ─► command table
//!                  │                                                 └─► cipher registry
//!                  └──────────────► static files (ServeDir)
//! ```
//!
//! Responses always leave through [`nonce::apply_headers`], which sets the
//! CSP/no-cache headers and substitutes the per-response nonce into the body.

pub mod app;
pub mod auth;
pub mod command;
pub mod dispatch;
pub mod gate;
pub mod handlers;
pub mod nonce;
pub mod ops;
pub mod session;

pub use app::{router, serve, AppState, Settings};
pub use auth::{Authenticator, PassphraseAuthenticator};
pub use dispatch::Reply;
pub use ops::{ApplianceOps, OpContext, UnsupportedOps};
pub use session::{MemorySessionStore, SessionStore};
