//! RSA-2048 key pairs and key identifiers.

use crate::crypto::digest::short_id;
use crate::crypto::verify::decode_public_key;
use crate::LicenseError;
use rand::rngs::OsRng;
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};
use std::fmt;
use tracing::info;

/// Modulus size of generated keys.
pub const RSA_KEY_BITS: usize = 2048;

/// An RSA signing key pair plus its short identifier.
///
/// Only the issuer holds one of these. Validating clients need nothing but
/// the public key.
#[derive(Clone)]
pub struct KeyPair {
    private_key: RsaPrivateKey,
    public_key: RsaPublicKey,
    public_pem: String,
    key_id: String,
}

impl KeyPair {
    /// Generate a fresh RSA-2048 key pair from the OS CSPRNG.
    pub fn generate() -> Result<Self, LicenseError> {
        let private_key = RsaPrivateKey::new(&mut OsRng, RSA_KEY_BITS)
            .map_err(|e| LicenseError::KeyGeneration(e.to_string()))?;
        let pair = Self::from_private_key(private_key)?;
        info!(key_id = %pair.key_id, bits = RSA_KEY_BITS, "Generated license signing key pair");
        Ok(pair)
    }

    /// Build a pair from a private key; the public half is derived.
    pub fn from_private_key(private_key: RsaPrivateKey) -> Result<Self, LicenseError> {
        let public_key = RsaPublicKey::from(&private_key);
        let public_pem = public_key_to_pem(&public_key)?;
        let key_id = short_id(public_pem.as_bytes());
        Ok(Self {
            private_key,
            public_key,
            public_pem,
            key_id,
        })
    }

    /// Parse a PKCS#8 PEM private key.
    pub fn from_private_pem(private_pem: &str) -> Result<Self, LicenseError> {
        let private_key = RsaPrivateKey::from_pkcs8_pem(private_pem.trim())
            .map_err(|e| LicenseError::KeyEncoding(format!("Invalid PKCS#8 private key: {}", e)))?;
        Self::from_private_key(private_key)
    }

    /// Parse both halves and check that they belong together.
    pub fn from_pems(public_pem: &str, private_pem: &str) -> Result<Self, LicenseError> {
        let pair = Self::from_private_pem(private_pem)?;
        let stored_public = decode_public_key(public_pem)?;
        if stored_public != pair.public_key {
            return Err(LicenseError::KeyEncoding(
                "Public key does not match private key".to_string(),
            ));
        }
        Ok(pair)
    }

    /// The private signing key.
    pub fn private_key(&self) -> &RsaPrivateKey {
        &self.private_key
    }

    /// The public verification key.
    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public_key
    }

    /// SPKI PEM of the public key (LF line endings).
    pub fn public_key_pem(&self) -> &str {
        &self.public_pem
    }

    /// PKCS#8 PEM of the private key (LF line endings).
    ///
    /// Encoded on demand so the pair does not keep a second copy of the
    /// secret in an ordinary `String`.
    pub fn private_key_pem(&self) -> Result<String, LicenseError> {
        let pem = self
            .private_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| {
                LicenseError::KeyEncoding(format!("Failed to encode private key: {}", e))
            })?;
        Ok(pem.as_str().to_owned())
    }

    /// 8 uppercase hex chars identifying the public key.
    pub fn key_id(&self) -> &str {
        &self.key_id
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("key_id", &self.key_id)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Generate a fresh RSA-2048 key pair.
pub fn generate_key_pair() -> Result<KeyPair, LicenseError> {
    KeyPair::generate()
}

/// Encode a public key as SPKI PEM with LF line endings.
pub fn public_key_to_pem(public_key: &RsaPublicKey) -> Result<String, LicenseError> {
    public_key
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| LicenseError::KeyEncoding(format!("Failed to encode public key: {}", e)))
}

/// Key identifier of a public key: first 8 hex chars of SHA-256 over its
/// canonical SPKI PEM, uppercased.
///
/// The PEM is re-encoded before hashing so that the same key read from a
/// CRLF file, or supplied as PKCS#1, yields the same id.
pub fn key_id(public_key: &RsaPublicKey) -> Result<String, LicenseError> {
    Ok(short_id(public_key_to_pem(public_key)?.as_bytes()))
}

/// Key identifier of a PEM-encoded public key.
pub fn key_id_from_pem(public_pem: &str) -> Result<String, LicenseError> {
    key_id(&decode_public_key(public_pem)?)
}
