//! # factoryos-license
//!
//! **Signed license issuance and offline validation.**
//!
//! The vendor signs a license payload with an RSA-2048 private key; the
//! installed product checks it with the embedded public key and no network
//! access. Any change to the signed payload invalidates the license.
//!
//! ## Features
//!
//! - **RSA-SHA256 signatures** over a canonical (sorted-key, compact) JSON form
//! - **Offline validation** with a fixed check order: signature, hardware, expiry, capacity
//! - **Grace period** after expiry, reported as a degraded but usable status
//! - **Hardware binding** to a SHA-256 machine fingerprint
//! - **Portable artifacts**: pretty JSON `.lic` files or single-line base64 keys
//! - **Hybrid resolution**: offline license first, subscription fallback second, fail closed
//!
//! ## Quickstart
//!
//! ```no_run
//! use factoryos_license::{
//!     KeyStore, LicenseConfig, LicenseIssuer, LicenseManager, LicenseOptions, LicenseType,
//! };
//!
//! fn main() -> Result<(), factoryos_license::LicenseError> {
//!     let config = LicenseConfig::from_env()?;
//!
//!     // Vendor side
//!     let issuer = LicenseIssuer::new(KeyStore::from_config(&config).load_or_generate()?);
//!     let license = issuer.issue(
//!         &LicenseOptions::new("Acme Mfg", LicenseType::TimeBased)
//!             .expires_in_days(365)
//!             .max_machines(10),
//!     )?;
//!
//!     // Customer side
//!     let manager = LicenseManager::from_public_key_pem(config, issuer.public_key_pem())?;
//!     let result = manager.activate(&license)?;
//!     println!("{} ({:?} days left)", result.status(), result.days_remaining());
//!     Ok(())
//! }
//! ```
//!
//! ## Threat Model
//!
//! Signatures stop edits to the license file: extending the expiry, adding
//! features or raising limits all fail verification. They do **not** stop
//! binary patching, and an offline check cannot detect clock rollback.
//!
//! ## Configuration
//!
//! - `LICENSE_KEY_DIR` - issuer key directory (default `~/.factoryos/keys`)
//! - `LICENSE_FILE_PATH` - installed license (default `~/.factoryos/license.lic`)
//!
//! See [`LicenseConfig`] for full documentation.

#![warn(missing_docs)]

// Core modules
pub mod clock;
pub mod config;
pub mod errors;

// Crypto layer
pub mod crypto;

// Protocol layer
pub mod protocol;

// Machine identity
pub mod fingerprint;

// Issuance
pub mod issuer;

// Policy layer
pub mod policy;

// Storage layer
pub mod store;

// Manager (main client API)
pub mod manager;

#[cfg(test)]
mod test_support;

// Re-exports for public API
pub use clock::{Clock, SystemClock};
pub use config::LicenseConfig;
pub use crypto::keys::{generate_key_pair, key_id, KeyPair};
pub use crypto::signing::sign_license;
pub use crypto::verify::decode_public_key;
pub use errors::{LicenseError, LicenseResult};
pub use fingerprint::{hardware_fingerprint, HardwareProfile};
pub use issuer::{
    generate_signed_license, generate_signed_license_with_clock, LicenseIssuer, LicenseOptions,
};
pub use manager::{LicenseManager, SubscriptionFallback};
pub use policy::access::{check_entitlements, CapacityLimits};
pub use policy::validate::{
    validate_signed_license, validate_signed_license_with_clock, ValidationOptions,
};
pub use protocol::models::{
    LicenseMetadata, LicenseStatus, LicenseType, LicenseValidationResult, SignedLicenseData,
    SignedLicenseFile, SupportTier,
};
pub use protocol::transport::{export_license_base64, import_license_base64};
pub use store::file::LicenseFileStore;
pub use store::keys::KeyStore;

pub use rsa::{RsaPrivateKey, RsaPublicKey};

#[cfg(any(test, feature = "test-seams"))]
pub use clock::FixedClock;
