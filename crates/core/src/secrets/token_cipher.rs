use base64::{engine::general_purpose::STANDARD, Engine as _};
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use log::{error, warn};
use rand::RngCore;

use crate::errors::{Error, Result};

/// Marker prepended to every ciphertext this module produces.
pub const CIPHERTEXT_PREFIX: &str = "enc:v1:";
const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 24;

/// Symmetric protection for credentials stored in integration records.
///
/// `decrypt` never fails: values that are not recognisable ciphertext, or
/// that cannot be decrypted, are handed back unchanged so records written
/// before encryption was enabled keep working.
pub trait TokenCipher: Send + Sync {
    fn encrypt(&self, plaintext: &str) -> Result<String>;
    fn decrypt(&self, stored: &str) -> String;
}

/// XChaCha20-Poly1305 cipher keyed from a base64-encoded 32-byte key.
pub struct ChaChaTokenCipher {
    cipher: Option<XChaCha20Poly1305>,
}

impl ChaChaTokenCipher {
    /// Build from an optional base64 key. `None` yields a pass-through cipher.
    pub fn from_base64_key(key: Option<&str>) -> Result<Self> {
        let Some(encoded) = key.map(str::trim).filter(|k| !k.is_empty()) else {
            warn!("No credential encryption key configured; tokens will be stored as plaintext");
            return Ok(Self::disabled());
        };

        let bytes = STANDARD
            .decode(encoded)
            .map_err(|e| Error::Secret(format!("encryption key is not valid base64: {}", e)))?;
        if bytes.len() != KEY_LEN {
            return Err(Error::Secret(format!(
                "encryption key must be {} bytes, got {}",
                KEY_LEN,
                bytes.len()
            )));
        }
        let cipher = XChaCha20Poly1305::new_from_slice(&bytes)
            .map_err(|e| Error::Secret(format!("invalid encryption key: {}", e)))?;
        Ok(Self {
            cipher: Some(cipher),
        })
    }

    pub fn disabled() -> Self {
        Self { cipher: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.cipher.is_some()
    }

    /// Fresh random key, base64-encoded, suitable for `ADPULSE_ENCRYPTION_KEY`.
    pub fn generate_key() -> String {
        let mut key = [0_u8; KEY_LEN];
        rand::thread_rng().fill_bytes(&mut key);
        STANDARD.encode(key)
    }
}

impl TokenCipher for ChaChaTokenCipher {
    fn encrypt(&self, plaintext: &str) -> Result<String> {
        let Some(cipher) = &self.cipher else {
            error!("Storing credential without encryption: no key configured");
            return Ok(plaintext.to_string());
        };

        let mut nonce_bytes = [0_u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = XNonce::from_slice(&nonce_bytes);
        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| Error::Secret(format!("encryption failed: {}", e)))?;

        let mut payload = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        payload.extend_from_slice(&nonce_bytes);
        payload.extend_from_slice(&ciphertext);
        Ok(format!("{}{}", CIPHERTEXT_PREFIX, STANDARD.encode(payload)))
    }

    fn decrypt(&self, stored: &str) -> String {
        let Some(encoded) = stored.strip_prefix(CIPHERTEXT_PREFIX) else {
            return stored.to_string();
        };
        let Some(cipher) = &self.cipher else {
            error!("Found an encrypted credential but no encryption key is configured");
            return stored.to_string();
        };

        let payload = match STANDARD.decode(encoded) {
            Ok(payload) if payload.len() > NONCE_LEN => payload,
            Ok(_) => {
                warn!("Encrypted credential is truncated; using stored value");
                return stored.to_string();
            }
            Err(e) => {
                warn!("Encrypted credential is not valid base64: {}", e);
                return stored.to_string();
            }
        };

        let (nonce_bytes, ciphertext) = payload.split_at(NONCE_LEN);
        match cipher.decrypt(XNonce::from_slice(nonce_bytes), ciphertext) {
            Ok(plain) => String::from_utf8(plain).unwrap_or_else(|_| {
                warn!("Decrypted credential is not UTF-8; using stored value");
                stored.to_string()
            }),
            Err(_) => {
                warn!("Failed to decrypt credential; using stored value");
                stored.to_string()
            }
        }
    }
}
