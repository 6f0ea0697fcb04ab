//! ilock-crypto: pluggable cipher and HSM providers
//!
//! Providers are registered by name at startup into a [`RegistryBuilder`],
//! which is frozen into an immutable [`Registry`] before the listener
//! accepts traffic:
//!
//! ```text
//! register_cipher / register_hsm      (everything linked in: "available")
//!        │
//!        ├── enable_ciphers(["A", "B"])   operator-selected subset
//!        └── enable_hsm("model:luks,tls,cipher")
//!                 ├── luks   → auth role (disk-unlock secrets)
//!                 ├── tls    → TLS role
//!                 └── cipher → HSM cipher, available + enabled
//!        │
//!      build() → Registry  (read-only while serving)
//! ```
//!
//! Every lookup hands out a freshly constructed instance, never the
//! registered prototype.

pub mod cipher;
pub mod error;
pub mod hsm;
pub mod kdf;
pub mod registry;
pub mod xchacha;

pub use cipher::{Cipher, CipherInfo, CipherRequest};
pub use error::{CipherError, RegistryError};
pub use hsm::{Hsm, HsmBinding, HsmRole};
pub use registry::{Registry, RegistryBuilder};
pub use xchacha::XChaCha20Cipher;

/// Size of a derived cipher key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of an XChaCha20-Poly1305 nonce (192-bit)
pub const NONCE_SIZE: usize = 24;

/// Size of a Poly1305 authentication tag
pub const TAG_SIZE: usize = 16;

/// Size of the per-message Argon2id salt
pub const SALT_SIZE: usize = 16;
