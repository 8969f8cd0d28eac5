//! License Manager - the client-side entry point.
//!
//! The `LicenseManager` ties the offline pieces together for an installed
//! product:
//! - Activation from a base64 license key or a `.lic` file
//! - Offline validation of the activated license
//! - Hybrid resolution: offline license first, subscription lookup second
//! - Feature and module gating
//!
//! It only ever holds the public key.

use crate::clock::{Clock, SystemClock};
use crate::config::LicenseConfig;
use crate::crypto::verify::decode_public_key;
use crate::policy::access::check_entitlements;
use crate::policy::validate::{validate_signed_license_with_clock, ValidationOptions};
use crate::protocol::models::{LicenseValidationResult, SignedLicenseFile};
use crate::protocol::transport::import_license_base64;
use crate::store::file::LicenseFileStore;
use crate::LicenseError;
use rsa::RsaPublicKey;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Source of a license decision when no offline license is installed,
/// typically an online subscription lookup.
///
/// `Ok(None)` means the source has no answer for this installation.
pub trait SubscriptionFallback: Send + Sync {
    /// Resolve the subscription state.
    fn resolve(&self) -> Result<Option<LicenseValidationResult>, LicenseError>;
}

/// Main license manager.
///
/// Create one instance per application and reuse it for all license checks.
pub struct LicenseManager {
    config: LicenseConfig,
    public_key: RsaPublicKey,
    store: LicenseFileStore,
    clock: Arc<dyn Clock>,
    options: ValidationOptions,
    fallback: Option<Arc<dyn SubscriptionFallback>>,
}

impl LicenseManager {
    /// Create a new license manager.
    ///
    /// Uses the system clock for time operations.
    ///
    /// # Errors
    /// Returns `ConfigError` if configuration validation fails.
    pub fn new(config: LicenseConfig, public_key: RsaPublicKey) -> Result<Self, LicenseError> {
        config.validate()?;
        Ok(Self::with_clock(config, public_key, Arc::new(SystemClock)))
    }

    /// Create a license manager from a PEM public key (SPKI or PKCS#1).
    pub fn from_public_key_pem(
        config: LicenseConfig,
        public_key_pem: &str,
    ) -> Result<Self, LicenseError> {
        Self::new(config, decode_public_key(public_key_pem)?)
    }

    /// Create a license manager with a custom clock (for testing).
    #[cfg(any(test, feature = "test-seams"))]
    pub fn new_with_clock(
        config: LicenseConfig,
        public_key: RsaPublicKey,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, LicenseError> {
        config.validate()?;
        Ok(Self::with_clock(config, public_key, clock))
    }

    fn with_clock(config: LicenseConfig, public_key: RsaPublicKey, clock: Arc<dyn Clock>) -> Self {
        let store = LicenseFileStore::new(config.license_path.clone());
        Self {
            config,
            public_key,
            store,
            clock,
            options: ValidationOptions::default(),
            fallback: None,
        }
    }

    /// Consult `fallback` when no offline license is installed.
    pub fn with_fallback(mut self, fallback: Arc<dyn SubscriptionFallback>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Validation context (hardware id override, machine/user counts).
    pub fn with_options(mut self, options: ValidationOptions) -> Self {
        self.options = options;
        self
    }

    /// The configuration this manager was built with.
    pub fn config(&self) -> &LicenseConfig {
        &self.config
    }

    /// The public key licenses are verified against.
    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public_key
    }

    /// Validate a license without installing it.
    pub fn validate(&self, license: &SignedLicenseFile) -> LicenseValidationResult {
        validate_signed_license_with_clock(
            license,
            &self.public_key,
            &self.options,
            self.clock.as_ref(),
        )
    }

    /// Validate a license and install it if usable.
    ///
    /// An unusable license is not written; its result is still returned so
    /// the caller can show why.
    ///
    /// # Errors
    /// - `LicenseIo` - The license file could not be written
    pub fn activate(
        &self,
        license: &SignedLicenseFile,
    ) -> Result<LicenseValidationResult, LicenseError> {
        let result = self.validate(license);
        if !result.is_valid() {
            warn!(status = %result.status(), "Refusing to activate license");
            return Ok(result);
        }

        self.store.save(license)?;
        info!(
            license_id = %license.data.license_id,
            status = %result.status(),
            "License activated"
        );
        Ok(result)
    }

    /// Decode a base64 license key, then [`activate`](Self::activate) it.
    ///
    /// # Errors
    /// - `Malformed` / `UnsupportedVersion` - The key does not decode
    /// - `LicenseIo` - The license file could not be written
    pub fn activate_base64(&self, encoded: &str) -> Result<LicenseValidationResult, LicenseError> {
        let license = import_license_base64(encoded)?;
        self.activate(&license)
    }

    /// Remove the installed license.
    pub fn deactivate(&self) -> Result<(), LicenseError> {
        self.store.remove()
    }

    /// Validate the installed license only.
    ///
    /// A missing license is `NOT_FOUND`; an unreadable one is `NOT_FOUND`
    /// with the load error recorded.
    pub fn validate_offline(&self) -> LicenseValidationResult {
        match self.store.load() {
            Ok(Some(license)) => self.validate(&license),
            Ok(None) => LicenseValidationResult::not_found(format!(
                "No license file at {}",
                self.store.path().display()
            )),
            Err(e) => {
                warn!(path = %self.store.path().display(), error = %e, "License file unusable");
                LicenseValidationResult::not_found(format!(
                    "License file could not be loaded: {}",
                    e
                ))
            }
        }
    }

    /// Offline license first, subscription fallback second.
    ///
    /// Fails closed: with no license file and no fallback answer the result
    /// is `NOT_FOUND`. A present-but-unreadable file does not fall through
    /// to the subscription.
    pub fn validate_hybrid(&self) -> LicenseValidationResult {
        match self.store.load() {
            Ok(Some(license)) => return self.validate(&license),
            Ok(None) => {}
            Err(e) => {
                warn!(path = %self.store.path().display(), error = %e, "License file unusable");
                return LicenseValidationResult::not_found(format!(
                    "License file could not be loaded: {}",
                    e
                ));
            }
        }

        let Some(fallback) = &self.fallback else {
            debug!("No offline license and no subscription fallback");
            return LicenseValidationResult::not_found(
                "No license file and no subscription configured",
            );
        };

        match fallback.resolve() {
            Ok(Some(result)) => {
                debug!(status = %result.status(), "License resolved by subscription");
                result
            }
            Ok(None) => {
                LicenseValidationResult::not_found("No license file and no active subscription")
            }
            Err(e) => {
                warn!(error = %e, "Subscription lookup failed");
                LicenseValidationResult::not_found(format!("Subscription lookup failed: {}", e))
            }
        }
    }

    /// Resolve the license and require the given features and modules.
    ///
    /// # Errors
    /// - `InvalidLicense` - No usable license
    /// - `FeatureMissing` / `ModuleMissing` - Entitlement not licensed
    pub fn require(
        &self,
        features: &[&str],
        modules: &[&str],
    ) -> Result<LicenseValidationResult, LicenseError> {
        let result = self.validate_hybrid();
        check_entitlements(&result, features, modules)?;
        Ok(result)
    }
}
