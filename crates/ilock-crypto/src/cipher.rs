//! Cipher provider contract

use async_trait::async_trait;
use ilock_core::Envelope;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::error::CipherError;

/// Self-description of a cipher provider, as listed by `/api/crypto/ciphers`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CipherInfo {
    /// Unique registry key
    pub name: String,
    pub description: String,
    /// Key format accepted by the provider ("password", "armor", ...)
    pub key_format: String,
    pub enc: bool,
    pub dec: bool,
    pub sig: bool,
    pub otp: bool,
    pub msg: bool,
    /// File extension used for extension-based lookup
    pub extension: String,
}

/// A provider-specific sub-route request (`/api/<name>/<action>`)
#[derive(Debug, Clone)]
pub struct CipherRequest {
    pub action: String,
    /// Parsed JSON body; `Null` when the request carried none
    pub body: serde_json::Value,
}

/// A pluggable cryptographic transform.
///
/// Instances carry per-operation state (password, key material), so the
/// registry only ever hands out values produced by [`Cipher::fresh`].
/// Implementations must not share mutable state between the prototype and
/// the instances it creates.
#[async_trait]
pub trait Cipher: Send + Sync {
    fn info(&self) -> CipherInfo;

    /// Construct a new, independent instance of this provider.
    fn fresh(&self) -> Box<dyn Cipher>;

    /// Reflect an unlocked (`true`) or locked (`false`) appliance state.
    fn activate(&self, on: bool) -> Result<(), CipherError>;

    fn set_password(&mut self, password: SecretString) -> Result<(), CipherError>;

    fn encrypt(&mut self, plaintext: &[u8]) -> Result<Vec<u8>, CipherError>;

    fn decrypt(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>, CipherError>;

    /// Serve a provider-specific sub-route; the provider interprets `action`.
    async fn handle_request(&self, request: CipherRequest) -> Envelope;
}
