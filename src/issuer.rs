//! Issuer side: turning license options into a signed artifact.
//!
//! Runs on the vendor's machine, typically once per customer. The resulting
//! [`SignedLicenseFile`] is what gets mailed or copied to the customer site.

use crate::clock::{Clock, SystemClock};
use crate::crypto::digest::is_sha256_hex;
use crate::crypto::keys::KeyPair;
use crate::crypto::signing::sign_license;
use crate::protocol::models::{
    LicenseMetadata, LicenseType, SignedLicenseData, SignedLicenseFile, SupportTier, UNLIMITED,
};
use crate::LicenseError;
use chrono::{DateTime, Datelike, Duration, Utc};
use rsa::RsaPrivateKey;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Grace period applied when the options do not set one.
pub const DEFAULT_GRACE_PERIOD_DAYS: u32 = 14;

/// Features granted when the options do not list any.
pub const DEFAULT_FEATURES: &[&str] = &["core"];

/// Product modules granted when the options do not list any.
pub const DEFAULT_MODULES: &[&str] = &["dashboard", "production", "downtime", "payments"];

/// What to issue. Unset fields take the documented defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct LicenseOptions {
    /// Customer identifier.
    pub issued_to: String,
    /// License type.
    pub license_type: LicenseType,
    /// Days from issuance until expiry; `None` issues a perpetual license.
    pub expires_in_days: Option<u32>,
    /// Machine limit (`-1` = unlimited).
    pub max_machines: i64,
    /// User limit (`-1` = unlimited).
    pub max_users: i64,
    /// Licensed features; `None` grants [`DEFAULT_FEATURES`].
    pub features: Option<BTreeSet<String>>,
    /// Licensed modules; `None` grants [`DEFAULT_MODULES`].
    pub modules: Option<BTreeSet<String>>,
    /// Hardware fingerprint to bind to.
    pub hardware_id: Option<String>,
    /// Days of validity after expiry.
    pub grace_period_days: u32,
    /// Customer contact address.
    pub contact_email: String,
    /// Purchased support tier.
    pub support_tier: SupportTier,
    /// Free-form issuer fields.
    pub custom_fields: Option<BTreeMap<String, Value>>,
}

impl LicenseOptions {
    /// Options for `issued_to` with every other field at its default.
    pub fn new(issued_to: impl Into<String>, license_type: LicenseType) -> Self {
        Self {
            issued_to: issued_to.into(),
            license_type,
            expires_in_days: None,
            max_machines: UNLIMITED,
            max_users: UNLIMITED,
            features: None,
            modules: None,
            hardware_id: None,
            grace_period_days: DEFAULT_GRACE_PERIOD_DAYS,
            contact_email: String::new(),
            support_tier: SupportTier::default(),
            custom_fields: None,
        }
    }

    /// Expire `days` after issuance.
    pub fn expires_in_days(mut self, days: u32) -> Self {
        self.expires_in_days = Some(days);
        self
    }

    /// Set the machine limit.
    pub fn max_machines(mut self, max: i64) -> Self {
        self.max_machines = max;
        self
    }

    /// Set the user limit.
    pub fn max_users(mut self, max: i64) -> Self {
        self.max_users = max;
        self
    }

    /// Replace the feature list.
    pub fn features<I, S>(mut self, features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.features = Some(features.into_iter().map(Into::into).collect());
        self
    }

    /// Replace the module list.
    pub fn modules<I, S>(mut self, modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.modules = Some(modules.into_iter().map(Into::into).collect());
        self
    }

    /// Bind to a hardware fingerprint.
    pub fn hardware_id(mut self, fingerprint: impl Into<String>) -> Self {
        self.hardware_id = Some(fingerprint.into());
        self
    }

    /// Set the grace period.
    pub fn grace_period_days(mut self, days: u32) -> Self {
        self.grace_period_days = days;
        self
    }

    /// Set the contact address.
    pub fn contact_email(mut self, email: impl Into<String>) -> Self {
        self.contact_email = email.into();
        self
    }

    /// Set the support tier.
    pub fn support_tier(mut self, tier: SupportTier) -> Self {
        self.support_tier = tier;
        self
    }

    /// Add one custom metadata field.
    pub fn custom_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.custom_fields
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value);
        self
    }

    /// Reject option combinations that cannot produce a sensible license.
    pub fn validate(&self) -> Result<(), LicenseError> {
        if self.issued_to.trim().is_empty() {
            return Err(LicenseError::InvalidOptions(
                "issued_to cannot be empty".to_string(),
            ));
        }
        if self.max_machines < UNLIMITED || self.max_users < UNLIMITED {
            return Err(LicenseError::InvalidOptions(format!(
                "limits must be -1 (unlimited) or non-negative, got machines={} users={}",
                self.max_machines, self.max_users
            )));
        }
        if self.license_type == LicenseType::Perpetual && self.expires_in_days.is_some() {
            return Err(LicenseError::InvalidOptions(
                "a PERPETUAL license cannot have an expiry".to_string(),
            ));
        }
        if let Some(ref hw) = self.hardware_id {
            if !is_sha256_hex(hw) {
                return Err(LicenseError::InvalidOptions(format!(
                    "hardware_id must be a SHA-256 hex fingerprint, got {:?}",
                    hw
                )));
            }
        }
        Ok(())
    }
}

fn defaults(list: &[&str]) -> BTreeSet<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// `days` after `issued_at`, as long as the year still fits an RFC 3339 timestamp.
fn expiry_after(issued_at: DateTime<Utc>, days: u32) -> Result<DateTime<Utc>, LicenseError> {
    issued_at
        .checked_add_signed(Duration::days(i64::from(days)))
        .filter(|t| t.year() <= 9999)
        .ok_or_else(|| {
            LicenseError::InvalidOptions(format!(
                "expires_in_days {} puts the expiry past the year 9999",
                days
            ))
        })
}

/// Build the default-filled payload for `options` at the clock's current time.
pub fn build_license_data(
    options: &LicenseOptions,
    clock: &dyn Clock,
) -> Result<SignedLicenseData, LicenseError> {
    options.validate()?;

    let issued_at = clock.now_millis();
    let expires_at = options
        .expires_in_days
        .map(|days| expiry_after(issued_at, days))
        .transpose()?;

    Ok(SignedLicenseData {
        license_id: Uuid::new_v4(),
        issued_to: options.issued_to.clone(),
        issued_at,
        license_type: options.license_type,
        expires_at,
        max_machines: options.max_machines,
        max_users: options.max_users,
        features: options
            .features
            .clone()
            .unwrap_or_else(|| defaults(DEFAULT_FEATURES)),
        modules: options
            .modules
            .clone()
            .unwrap_or_else(|| defaults(DEFAULT_MODULES)),
        hardware_id: options.hardware_id.as_ref().map(|h| h.to_ascii_lowercase()),
        grace_period_days: options.grace_period_days,
        metadata: LicenseMetadata {
            contact_email: options.contact_email.clone(),
            support_tier: options.support_tier,
            custom_fields: options.custom_fields.clone(),
        },
    })
}

/// Build and sign a license with the system clock.
pub fn generate_signed_license(
    options: &LicenseOptions,
    private_key: &RsaPrivateKey,
) -> Result<SignedLicenseFile, LicenseError> {
    generate_signed_license_with_clock(options, private_key, &SystemClock)
}

/// Build and sign a license at the given clock's time.
pub fn generate_signed_license_with_clock(
    options: &LicenseOptions,
    private_key: &RsaPrivateKey,
    clock: &dyn Clock,
) -> Result<SignedLicenseFile, LicenseError> {
    let data = build_license_data(options, clock)?;
    let file = sign_license(data, private_key)?;

    info!(
        license_id = %file.data.license_id,
        issued_to = %file.data.issued_to,
        license_type = ?file.data.license_type,
        expires_at = ?file.data.expires_at,
        key_id = %file.public_key_id,
        "Issued signed license"
    );

    Ok(file)
}

/// Holds a signing key pair for issuing many licenses.
pub struct LicenseIssuer {
    keys: KeyPair,
    clock: Arc<dyn Clock>,
}

impl LicenseIssuer {
    /// Issuer using the system clock.
    pub fn new(keys: KeyPair) -> Self {
        Self {
            keys,
            clock: Arc::new(SystemClock),
        }
    }

    /// Issuer with a custom clock (for testing).
    #[cfg(any(test, feature = "test-seams"))]
    pub fn new_with_clock(keys: KeyPair, clock: Arc<dyn Clock>) -> Self {
        Self { keys, clock }
    }

    /// Issue a license from options.
    pub fn issue(&self, options: &LicenseOptions) -> Result<SignedLicenseFile, LicenseError> {
        generate_signed_license_with_clock(options, self.keys.private_key(), self.clock.as_ref())
    }

    /// Sign a payload built elsewhere (renewals, re-issues).
    pub fn sign(&self, data: SignedLicenseData) -> Result<SignedLicenseFile, LicenseError> {
        sign_license(data, self.keys.private_key())
    }

    /// Id of the key licenses are signed with.
    pub fn key_id(&self) -> &str {
        self.keys.key_id()
    }

    /// PEM of the public key to ship with clients.
    pub fn public_key_pem(&self) -> &str {
        self.keys.public_key_pem()
    }
}
