//! Signing secret handling.
//!
//! - `SigningSecret`: HMAC key wrapper that prevents accidental logging
//! - `SigningSecret::generate_hex`: fresh random secret for provisioning

use std::path::Path;

use rand::RngCore;
use secrecy::{ExposeSecret, SecretBox};
use serde::{Deserialize, Deserializer};
use thiserror::Error;

/// Minimum accepted secret length in bytes.
pub const MIN_SECRET_LEN: usize = 32;

/// Errors from secret operations.
#[derive(Error, Debug)]
pub enum SecretError {
    /// IO error reading a secret file.
    #[error("Failed to read secret file {path}: {source}")]
    Io {
        /// File that could not be read.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Secret is shorter than [`MIN_SECRET_LEN`].
    #[error("Signing secret must be at least {MIN_SECRET_LEN} bytes, got {0}")]
    TooShort(usize),
}

/// Token signing secret.
///
/// The inner value is wrapped with `secrecy::SecretBox` so it is zeroized on
/// drop and never shows up in `Debug` or `Display` output.
#[derive(Clone)]
pub struct SigningSecret(SecretBox<str>);

impl SigningSecret {
    /// Create a signing secret.
    ///
    /// # Errors
    ///
    /// Returns [`SecretError::TooShort`] if the secret has fewer than
    /// [`MIN_SECRET_LEN`] bytes.
    pub fn new(secret: String) -> Result<Self, SecretError> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(SecretError::TooShort(secret.len()));
        }
        Ok(Self(SecretBox::new(secret.into_boxed_str())))
    }

    /// Read a signing secret from a file.
    ///
    /// Trailing line breaks are stripped so files written by `echo` work.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or the secret is too short.
    pub fn from_file(path: &Path) -> Result<Self, SecretError> {
        let mut content = std::fs::read_to_string(path).map_err(|source| SecretError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let trimmed_len = content.trim_end_matches(['\r', '\n']).len();
        content.truncate(trimmed_len);
        Self::new(content)
    }

    /// Expose the secret bytes for signing.
    ///
    /// Use sparingly - only when building signing keys.
    #[must_use]
    pub fn expose(&self) -> &[u8] {
        self.0.expose_secret().as_bytes()
    }

    /// Generate a random 256-bit secret, hex-encoded.
    #[must_use]
    pub fn generate_hex() -> String {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        hex::encode(bytes)
    }
}

impl std::fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SigningSecret([REDACTED])")
    }
}

impl std::fmt::Display for SigningSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl<'de> Deserialize<'de> for SigningSecret {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::new(raw).map_err(serde::de::Error::custom)
    }
}
