use thiserror::Error;

/// Fatal initialization errors. Any of these aborts startup.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("missing cipher specification (supported ciphers: {})", .available.join(", "))]
    MissingCipherSpec { available: Vec<String> },

    #[error("unsupported cipher name {name} (supported ciphers: {})", .available.join(", "))]
    UnknownCipher {
        name: String,
        available: Vec<String>,
    },

    #[error("invalid hsm configuration directive: {0:?}")]
    MalformedHsmDirective(String),

    #[error("invalid hsm model {model} (supported models: {})", .available.join(", "))]
    UnknownHsmModel {
        model: String,
        available: Vec<String>,
    },

    #[error("invalid hsm option {0:?}")]
    UnknownHsmOption(String),

    #[error("HSM {model} cannot supply a cipher: {source}")]
    HsmCipher {
        model: String,
        #[source]
        source: CipherError,
    },
}

/// Provider-level errors, recovered at request time
#[derive(Debug, Error)]
pub enum CipherError {
    #[error("invalid cipher {0}")]
    UnknownCipher(String),

    #[error("cipher password not set")]
    MissingPassword,

    #[error("encryption failed: {0}")]
    Encrypt(String),

    #[error("decryption failed: {0}")]
    Decrypt(String),

    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("activation failed: {0}")]
    Activation(String),

    #[error("{0} not supported by this provider")]
    Unsupported(&'static str),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<CipherError> for ilock_core::IlockError {
    fn from(e: CipherError) -> Self {
        ilock_core::IlockError::Cipher(e.to_string())
    }
}

impl From<RegistryError> for ilock_core::IlockError {
    fn from(e: RegistryError) -> Self {
        ilock_core::IlockError::Config(e.to_string())
    }
}
