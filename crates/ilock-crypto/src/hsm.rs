//! HSM provider contract and role bindings

use std::fmt;
use std::sync::Arc;
use zeroize::Zeroizing;

use crate::cipher::Cipher;
use crate::error::CipherError;

/// A hardware security module driver.
pub trait Hsm: Send + Sync {
    /// Construct a new instance for one configuration binding.
    fn fresh(&self) -> Arc<dyn Hsm>;

    /// Hardware-backed cipher, only meaningful for the `cipher` role.
    fn cipher(&self) -> Result<Box<dyn Cipher>, CipherError>;

    /// Derive a disk-unlock secret from user input (auth role).
    fn derive_key(&self, input: &[u8]) -> Result<Zeroizing<Vec<u8>>, CipherError>;
}

/// Roles an HSM binding may hold, parsed from directive options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HsmRole {
    /// `luks`: source of disk-unlock secrets
    Auth,
    /// `tls`: source of TLS certificate/key material
    Tls,
    /// `cipher`: supplies a cipher merged into the registry
    Cipher,
}

impl HsmRole {
    pub fn parse(option: &str) -> Option<Self> {
        match option {
            "luks" => Some(HsmRole::Auth),
            "tls" => Some(HsmRole::Tls),
            "cipher" => Some(HsmRole::Cipher),
            _ => None,
        }
    }
}

/// A configured HSM instance bound to a role
#[derive(Clone)]
pub struct HsmBinding {
    pub model: String,
    pub hsm: Arc<dyn Hsm>,
}

impl fmt::Debug for HsmBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HsmBinding")
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}
