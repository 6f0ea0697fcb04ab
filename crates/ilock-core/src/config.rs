use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Literal `crypto.hsm` value meaning "no HSM required"
pub const HSM_OFF: &str = "off";

/// Top-level appliance configuration (loaded from config.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IlockConfig {
    pub daemon: DaemonConfig,
    pub crypto: CryptoConfig,
    pub auth: AuthConfig,
    pub system: SystemConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// HTTP listen address (default: 127.0.0.1:4430)
    pub bind_address: String,
    /// Directory holding the static front-end (default: static)
    pub static_path: PathBuf,
    /// Echo API request lines and response envelopes to the log
    pub debug: bool,
    /// Log level (default: info)
    pub log_level: String,
    /// Log format: "json" or "text"
    pub log_format: String,
}

/// Cipher and HSM selection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// Ordered list of cipher names to enable; each must be available
    pub ciphers: Vec<String>,
    /// HSM directive, `model:opt[,opt...]` or "off"
    pub hsm: String,
}

impl CryptoConfig {
    pub fn hsm_enabled(&self) -> bool {
        self.hsm != HSM_OFF
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Session lifetime in seconds (default: 8 hours)
    pub session_ttl_secs: u64,
    /// Add `Secure` to the session cookie
    pub cookie_secure: bool,
    /// Volume/user name -> Argon2id PHC hash of its passphrase
    pub users: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// Allow /api/config/time to adjust the device clock
    pub set_time: bool,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:4430".into(),
            static_path: PathBuf::from("static"),
            debug: false,
            log_level: "info".into(),
            log_format: "text".into(),
        }
    }
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            ciphers: vec!["XChaCha20-Poly1305".into()],
            hsm: HSM_OFF.into(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl_secs: 8 * 60 * 60,
            cookie_secure: true,
            users: BTreeMap::new(),
        }
    }
}
