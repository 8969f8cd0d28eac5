//! RSA-SHA256 (PKCS#1 v1.5) signature verification.

use crate::crypto::canonical::canonical_json;
use crate::crypto::signing::signing_message;
use crate::protocol::models::SignedLicenseFile;
use crate::LicenseError;
use base64::{engine::general_purpose::STANDARD, Engine};
use once_cell::sync::OnceCell;
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs1v15::{Signature, VerifyingKey};
use rsa::pkcs8::DecodePublicKey;
use rsa::signature::Verifier;
use rsa::RsaPublicKey;
use sha2::Sha256;
use std::collections::HashMap;
use std::sync::RwLock;

/// Cache for decoded public keys, keyed by PEM text.
static KEY_CACHE: OnceCell<RwLock<HashMap<String, RsaPublicKey>>> = OnceCell::new();

/// Decode a PEM-encoded RSA public key.
///
/// Accepts SPKI (`-----BEGIN PUBLIC KEY-----`) and PKCS#1
/// (`-----BEGIN RSA PUBLIC KEY-----`). The key is cached after first decode
/// since clients typically validate against one embedded key.
pub fn decode_public_key(pem: &str) -> Result<RsaPublicKey, LicenseError> {
    let cache = KEY_CACHE.get_or_init(|| RwLock::new(HashMap::new()));
    if let Ok(guard) = cache.read() {
        if let Some(key) = guard.get(pem) {
            return Ok(key.clone());
        }
    }

    let trimmed = pem.trim();
    let key = if trimmed.starts_with("-----BEGIN RSA PUBLIC KEY-----") {
        RsaPublicKey::from_pkcs1_pem(trimmed)
            .map_err(|e| LicenseError::KeyEncoding(format!("Invalid PKCS#1 public key: {}", e)))?
    } else {
        RsaPublicKey::from_public_key_pem(trimmed)
            .map_err(|e| LicenseError::KeyEncoding(format!("Invalid SPKI public key: {}", e)))?
    };

    // Best-effort insert into cache. If locking fails, still return the decoded key.
    if let Ok(mut guard) = cache.write() {
        guard.insert(pem.to_string(), key.clone());
    }

    Ok(key)
}

/// Verify a base64 RSA-SHA256 signature over `message`.
///
/// Every failure mode (bad base64, wrong length, wrong key, altered message)
/// collapses to [`LicenseError::SignatureInvalid`].
pub fn verify_rsa_sha256(
    signature_b64: &str,
    message: &[u8],
    public_key: &RsaPublicKey,
) -> Result<(), LicenseError> {
    let sig_bytes = STANDARD
        .decode(signature_b64.trim())
        .map_err(|_| LicenseError::SignatureInvalid)?;

    let signature =
        Signature::try_from(sig_bytes.as_slice()).map_err(|_| LicenseError::SignatureInvalid)?;

    VerifyingKey::<Sha256>::new(public_key.clone())
        .verify(message, &signature)
        .map_err(|_| LicenseError::SignatureInvalid)
}

/// Verify that `license.signature` covers the canonical form of `license.data`.
///
/// For a parsed artifact the message is built from the `data` object as it
/// was read, so array order and timestamp spelling are the issuer's.
pub fn verify_license_signature(
    license: &SignedLicenseFile,
    public_key: &RsaPublicKey,
) -> Result<(), LicenseError> {
    let message = match license.data_json() {
        Some(raw) => canonical_json(raw)?,
        None => signing_message(&license.data)?,
    };
    verify_rsa_sha256(&license.signature, &message, public_key)
}
