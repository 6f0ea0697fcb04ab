//! Login credential verification

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use async_trait::async_trait;
use ilock_core::{IlockError, IlockResult};
use std::collections::BTreeMap;
use zeroize::Zeroizing;

/// Verifies a volume name + unlock secret at login.
///
/// On appliances with an auth-role HSM the secret is the HSM-derived key,
/// not the password the user typed.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, volume: &str, secret: &[u8]) -> IlockResult<()>;
}

/// Checks secrets against Argon2id PHC strings from `[auth.users]`.
#[derive(Debug, Clone, Default)]
pub struct PassphraseAuthenticator {
    users: BTreeMap<String, String>,
}

impl PassphraseAuthenticator {
    pub fn new(users: BTreeMap<String, String>) -> Self {
        Self { users }
    }
}

#[async_trait]
impl Authenticator for PassphraseAuthenticator {
    async fn authenticate(&self, volume: &str, secret: &[u8]) -> IlockResult<()> {
        let Some(phc) = self.users.get(volume).cloned() else {
            return Err(IlockError::Session("invalid credentials".into()));
        };
        let secret = Zeroizing::new(secret.to_vec());

        // Argon2 verification is CPU-bound
        let verified = tokio::task::spawn_blocking(move || {
            let hash = PasswordHash::new(&phc)
                .map_err(|e| IlockError::Config(format!("invalid password hash: {e}")))?;
            Ok::<bool, IlockError>(Argon2::default().verify_password(&secret, &hash).is_ok())
        })
        .await
        .map_err(|e| IlockError::Other(anyhow::anyhow!("verification task failed: {e}")))??;

        if verified {
            Ok(())
        } else {
            Err(IlockError::Session("invalid credentials".into()))
        }
    }
}
