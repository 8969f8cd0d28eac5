//! License signing: canonical message construction and RSA-SHA256 signatures.
//!
//! The signed message is the canonical JSON of [`SignedLicenseData`]:
//! ```text
//! {"expiresAt":...,"features":[...],"gracePeriodDays":14,...,"type":"TIME_BASED"}
//! ```
//! Keys are sorted at every depth, so the on-disk layout of the license file
//! (pretty-printed, reordered) never matters.

use crate::crypto::canonical::canonical_json;
use crate::crypto::keys::key_id;
use crate::protocol::models::{SignedLicenseData, SignedLicenseFile};
use crate::LicenseError;
use base64::{engine::general_purpose::STANDARD, Engine};
use rsa::pkcs1v15::SigningKey;
use rsa::signature::{SignatureEncoding, Signer};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use tracing::debug;

/// Build the byte string that is signed for `data`.
pub fn signing_message(data: &SignedLicenseData) -> Result<Vec<u8>, LicenseError> {
    canonical_json(data)
}

/// Sign `message` with RSA PKCS#1 v1.5 over SHA-256; returns standard base64.
pub fn sign_rsa_sha256(
    message: &[u8],
    private_key: &RsaPrivateKey,
) -> Result<String, LicenseError> {
    let signing_key = SigningKey::<Sha256>::new(private_key.clone());
    let signature = signing_key
        .try_sign(message)
        .map_err(|e| LicenseError::Signing(e.to_string()))?;
    Ok(STANDARD.encode(signature.to_bytes()))
}

/// Sign license data into a distributable [`SignedLicenseFile`].
///
/// `publicKeyId` is derived from the public half of `private_key`, the same
/// derivation as [`KeyPair::key_id`](crate::crypto::keys::KeyPair::key_id).
pub fn sign_license(
    data: SignedLicenseData,
    private_key: &RsaPrivateKey,
) -> Result<SignedLicenseFile, LicenseError> {
    let message = signing_message(&data)?;
    let signature = sign_rsa_sha256(&message, private_key)?;
    let public_key_id = key_id(&RsaPublicKey::from(private_key))?;

    debug!(
        license_id = %data.license_id,
        key_id = %public_key_id,
        bytes = message.len(),
        "Signed license data"
    );

    Ok(SignedLicenseFile::new(data, signature, public_key_id))
}
