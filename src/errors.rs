//! License engine error types.
//!
//! Validation outcomes (expired, tampered, wrong machine, ...) are reported
//! through [`LicenseStatus`](crate::protocol::models::LicenseStatus), never
//! through this enum. `LicenseError` covers setup, I/O and parsing failures.

use thiserror::Error;

/// Errors that can occur while issuing, storing or loading licenses.
#[derive(Debug, Error)]
pub enum LicenseError {
    /// Configuration is invalid.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// License issuance options are inconsistent.
    #[error("Invalid license options: {0}")]
    InvalidOptions(String),

    /// Key directory or key file could not be read or written.
    #[error("Key I/O error: {0}")]
    KeyIo(String),

    /// Key material could not be encoded or decoded as PEM.
    #[error("Key encoding error: {0}")]
    KeyEncoding(String),

    /// RSA key pair generation failed.
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    /// License data could not be signed.
    #[error("Signing failed: {0}")]
    Signing(String),

    /// Signature does not verify against the given public key.
    #[error("License signature verification failed")]
    SignatureInvalid,

    /// License file could not be read or written.
    #[error("License I/O error: {0}")]
    LicenseIo(String),

    /// License artifact is not well-formed (bad JSON, bad base64, bad field).
    #[error("Malformed license: {0}")]
    Malformed(String),

    /// License artifact declares a format version this build does not read.
    #[error("Unsupported license version: {0}")]
    UnsupportedVersion(String),

    /// License is not usable (any status other than valid or grace period).
    #[error("Invalid or expired license")]
    InvalidLicense,

    /// A feature required by the caller is not licensed.
    #[error("Licensed features do not include: {feature}")]
    FeatureMissing {
        /// The feature ID that was required but missing.
        feature: String,
    },

    /// A product module required by the caller is not licensed.
    #[error("Licensed modules do not include: {module}")]
    ModuleMissing {
        /// The module ID that was required but missing.
        module: String,
    },
}

/// Result type for license operations.
pub type LicenseResult<T> = Result<T, LicenseError>;
