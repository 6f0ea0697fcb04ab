//! Per-message key derivation for password ciphers

use argon2::{Algorithm, Argon2, Params, Version};
use secrecy::{ExposeSecret, SecretString};
use zeroize::Zeroizing;

use crate::error::CipherError;
use crate::{KEY_SIZE, SALT_SIZE};

/// Cipher key bytes, wiped on drop
pub type CipherKey = Zeroizing<[u8; KEY_SIZE]>;

/// Argon2id cost. Stored with the cipher, not in the message, so both
/// ends of a message must agree on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    pub mem_cost_kib: u32,
    pub time_cost: u32,
    pub parallelism: u32,
}

impl KdfParams {
    /// 64 MiB, 3 passes, 4 lanes
    pub const APPLIANCE: KdfParams = KdfParams {
        mem_cost_kib: 64 * 1024,
        time_cost: 3,
        parallelism: 4,
    };

    pub fn derive(
        &self,
        password: &SecretString,
        salt: &[u8; SALT_SIZE],
    ) -> Result<CipherKey, CipherError> {
        let cost = Params::new(
            self.mem_cost_kib,
            self.time_cost,
            self.parallelism,
            Some(KEY_SIZE),
        )
        .map_err(|e| CipherError::KeyDerivation(e.to_string()))?;

        let mut key = Zeroizing::new([0u8; KEY_SIZE]);
        Argon2::new(Algorithm::Argon2id, Version::V0x13, cost)
            .hash_password_into(password.expose_secret().as_bytes(), salt, &mut key[..])
            .map_err(|e| CipherError::KeyDerivation(e.to_string()))?;
        Ok(key)
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self::APPLIANCE
    }
}
