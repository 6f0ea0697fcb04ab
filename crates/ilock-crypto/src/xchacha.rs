//! Built-in password cipher: Argon2id + XChaCha20-Poly1305
//!
//! Message format (binary):
//! ```text
//! [16 bytes: Argon2id salt][24 bytes: random nonce][N bytes: ciphertext][16 bytes: Poly1305 tag]
//! AAD = salt
//! ```

use async_trait::async_trait;
use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    XChaCha20Poly1305, XNonce,
};
use ilock_core::{Envelope, Status};
use rand::RngCore;
use secrecy::SecretString;

use crate::cipher::{Cipher, CipherInfo, CipherRequest};
use crate::error::CipherError;
use crate::kdf::KdfParams;
use crate::{NONCE_SIZE, SALT_SIZE, TAG_SIZE};

pub const NAME: &str = "XChaCha20-Poly1305";
pub const EXTENSION: &str = "xcp";

pub struct XChaCha20Cipher {
    params: KdfParams,
    password: Option<SecretString>,
}

impl XChaCha20Cipher {
    pub fn new() -> Self {
        Self::with_params(KdfParams::default())
    }

    pub fn with_params(params: KdfParams) -> Self {
        Self {
            params,
            password: None,
        }
    }

    fn password(&self) -> Result<&SecretString, CipherError> {
        self.password.as_ref().ok_or(CipherError::MissingPassword)
    }
}

impl Default for XChaCha20Cipher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Cipher for XChaCha20Cipher {
    fn info(&self) -> CipherInfo {
        CipherInfo {
            name: NAME.into(),
            description: "XChaCha20-Poly1305 with Argon2id password derivation".into(),
            key_format: "password".into(),
            enc: true,
            dec: true,
            sig: false,
            otp: false,
            msg: false,
            extension: EXTENSION.into(),
        }
    }

    fn fresh(&self) -> Box<dyn Cipher> {
        Box::new(Self::with_params(self.params))
    }

    fn activate(&self, _on: bool) -> Result<(), CipherError> {
        // Software cipher: no hardware state to follow
        Ok(())
    }

    fn set_password(&mut self, password: SecretString) -> Result<(), CipherError> {
        self.password = Some(password);
        Ok(())
    }

    fn encrypt(&mut self, plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
        let mut salt = [0u8; SALT_SIZE];
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut salt);
        rand::thread_rng().fill_bytes(&mut nonce_bytes);

        let key = self.params.derive(self.password()?, &salt)?;
        let cipher = XChaCha20Poly1305::new((&*key).into());

        let ciphertext = cipher
            .encrypt(
                XNonce::from_slice(&nonce_bytes),
                Payload {
                    msg: plaintext,
                    aad: &salt,
                },
            )
            .map_err(|e| CipherError::Encrypt(e.to_string()))?;

        let mut out = Vec::with_capacity(SALT_SIZE + NONCE_SIZE + ciphertext.len());
        out.extend_from_slice(&salt);
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    fn decrypt(&mut self, input: &[u8]) -> Result<Vec<u8>, CipherError> {
        if input.len() < SALT_SIZE + NONCE_SIZE + TAG_SIZE {
            return Err(CipherError::Decrypt(format!(
                "input too short: {} bytes (minimum {})",
                input.len(),
                SALT_SIZE + NONCE_SIZE + TAG_SIZE
            )));
        }

        let (salt, rest) = input.split_at(SALT_SIZE);
        let (nonce_bytes, ciphertext) = rest.split_at(NONCE_SIZE);
        let mut salt_arr = [0u8; SALT_SIZE];
        salt_arr.copy_from_slice(salt);

        let key = self.params.derive(self.password()?, &salt_arr)?;
        let cipher = XChaCha20Poly1305::new((&*key).into());

        cipher
            .decrypt(
                XNonce::from_slice(nonce_bytes),
                Payload {
                    msg: ciphertext,
                    aad: salt,
                },
            )
            .map_err(|_| CipherError::Decrypt("wrong password or corrupted data".into()))
    }

    async fn handle_request(&self, request: CipherRequest) -> Envelope {
        match request.action.as_str() {
            "info" => Envelope::ok(self.info()),
            _ => Envelope::error_with(Status::Invalid, "invalid method"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_cipher(password: &str) -> Box<dyn Cipher> {
        let proto = XChaCha20Cipher::with_params(KdfParams {
            mem_cost_kib: 1024,
            time_cost: 1,
            parallelism: 1,
        });
        let mut c = proto.fresh();
        c.set_password(SecretString::from(password)).unwrap();
        c
    }

    #[test]
    fn test_encrypt_decrypt() {
        let mut c = fast_cipher("hunter2");
        let encrypted = c.encrypt(b"attack at dawn").unwrap();
        assert_eq!(encrypted.len(), SALT_SIZE + NONCE_SIZE + 14 + TAG_SIZE);
        assert_eq!(c.decrypt(&encrypted).unwrap(), b"attack at dawn");
    }

    #[test]
    fn test_wrong_password_fails() {
        let encrypted = fast_cipher("hunter2").encrypt(b"secret").unwrap();
        let result = fast_cipher("hunter3").decrypt(&encrypted);
        assert!(matches!(result, Err(CipherError::Decrypt(_))));
    }

    #[test]
    fn test_tampered_salt_fails() {
        let mut c = fast_cipher("hunter2");
        let mut encrypted = c.encrypt(b"secret").unwrap();
        encrypted[0] ^= 0x01;
        assert!(c.decrypt(&encrypted).is_err(), "salt is authenticated");
    }

    #[test]
    fn test_truncated_input_fails() {
        let mut c = fast_cipher("hunter2");
        assert!(c.decrypt(&[0u8; SALT_SIZE + NONCE_SIZE]).is_err());
    }

    #[test]
    fn test_fresh_instance_has_no_password() {
        let proto = XChaCha20Cipher::new();
        let mut configured = proto.fresh();
        configured
            .set_password(SecretString::from("hunter2"))
            .unwrap();

        let mut other = proto.fresh();
        assert!(matches!(other.encrypt(b"x"), Err(CipherError::MissingPassword)));
    }

    #[tokio::test]
    async fn test_custom_request_info() {
        let c = XChaCha20Cipher::new();
        let env = c
            .handle_request(CipherRequest {
                action: "info".into(),
                body: serde_json::Value::Null,
            })
            .await;
        assert!(env.is_ok());
        assert_eq!(env.response["extension"], EXTENSION);

        let env = c
            .handle_request(CipherRequest {
                action: "explode".into(),
                body: serde_json::Value::Null,
            })
            .await;
        assert_eq!(env.status, Status::Invalid);
    }
}
