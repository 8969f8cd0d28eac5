//! Shared fixtures for unit tests.
//!
//! RSA-2048 generation is slow, so every test reuses the same two pairs.

use crate::crypto::keys::KeyPair;
use crate::protocol::models::{LicenseMetadata, LicenseType, SignedLicenseData, SupportTier};
use chrono::{TimeZone, Utc};
use once_cell::sync::Lazy;
use uuid::Uuid;

static TEST_KEYS: Lazy<KeyPair> = Lazy::new(|| KeyPair::generate().expect("generate test keys"));
static OTHER_KEYS: Lazy<KeyPair> = Lazy::new(|| KeyPair::generate().expect("generate other keys"));

/// The signing pair most tests use.
pub(crate) fn test_keys() -> &'static KeyPair {
    &TEST_KEYS
}

/// An unrelated pair, for wrong-key checks.
pub(crate) fn other_keys() -> &'static KeyPair {
    &OTHER_KEYS
}

/// A fixed one-year license for "Acme Mfg", issued 2026-01-01.
pub(crate) fn sample_data() -> SignedLicenseData {
    SignedLicenseData {
        license_id: Uuid::parse_str("3f0c1f5e-8a0b-4c52-9d0e-2b7b2f3c9a11").expect("uuid"),
        issued_to: "Acme Mfg".to_string(),
        issued_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        license_type: LicenseType::TimeBased,
        expires_at: Some(Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).unwrap()),
        max_machines: 10,
        max_users: 25,
        features: ["core", "analytics"].iter().map(|s| s.to_string()).collect(),
        modules: ["production", "downtime"].iter().map(|s| s.to_string()).collect(),
        hardware_id: None,
        grace_period_days: 14,
        metadata: LicenseMetadata {
            contact_email: "ops@acme.example".to_string(),
            support_tier: SupportTier::Standard,
            custom_fields: None,
        },
    }
}
