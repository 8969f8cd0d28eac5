//! Offline validation of a signed license.
//!
//! Checks run in a fixed order and the first failing one decides the status:
//!
//! 1. Signature: RSA-SHA256 over the canonical payload (`INVALID_SIGNATURE`)
//! 2. Hardware binding: fingerprint must match (`HARDWARE_MISMATCH`)
//! 3. Expiry: `VALID`, then `GRACE_PERIOD`, then `EXPIRED`
//! 4. Capacity: machine/user counts at or over limit add warnings only
//!
//! Validation never returns an error: every failure is a status on the
//! [`LicenseValidationResult`].

use crate::clock::{Clock, SystemClock};
use crate::crypto::keys::key_id;
use crate::crypto::verify::verify_license_signature;
use crate::fingerprint::hardware_fingerprint;
use crate::policy::access::CapacityLimits;
use crate::protocol::models::{LicenseValidationResult, SignedLicenseData, SignedLicenseFile};
use chrono::{DateTime, Duration, Utc};
use rsa::RsaPublicKey;
use tracing::{debug, info, warn};

/// Days before expiry at which a renewal warning is added.
pub const EXPIRY_WARNING_DAYS: i64 = 30;

/// Days before expiry at which an urgent renewal warning is added as well.
pub const EXPIRY_URGENT_DAYS: i64 = 7;

const MILLIS_PER_DAY: i64 = 86_400_000;

/// Caller-supplied context for a validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationOptions {
    /// Fingerprint to compare against a hardware-bound license. When `None`
    /// the current machine's fingerprint is computed.
    pub current_hardware_id: Option<String>,

    /// Machines currently registered, if the caller tracks them.
    pub machine_count: Option<u64>,

    /// Users currently registered, if the caller tracks them.
    pub user_count: Option<u64>,
}

impl ValidationOptions {
    /// Compare hardware binding against this fingerprint.
    pub fn hardware_id(mut self, fingerprint: impl Into<String>) -> Self {
        self.current_hardware_id = Some(fingerprint.into());
        self
    }

    /// Report the current machine count.
    pub fn machine_count(mut self, count: u64) -> Self {
        self.machine_count = Some(count);
        self
    }

    /// Report the current user count.
    pub fn user_count(mut self, count: u64) -> Self {
        self.user_count = Some(count);
        self
    }
}

/// Where a license stands relative to its expiry and grace window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryState {
    /// Not yet expired.
    Active {
        /// Whole days until expiry, rounded up.
        days_remaining: i64,
    },
    /// Expired, inside the grace window.
    Grace {
        /// Days since expiry, as a non-positive number.
        days_remaining: i64,
        /// Whole days left in the grace window, rounded up.
        grace_days_remaining: i64,
    },
    /// Expired and past the grace window.
    Lapsed {
        /// Days since expiry, as a non-positive number.
        days_remaining: i64,
    },
}

/// Classify `now` against an expiry instant and grace window.
///
/// A license is expired once `now` is strictly after `expires_at`. The grace
/// window ends `grace_period_days` after expiry; reaching that instant lapses
/// the license.
pub fn evaluate_expiry(
    expires_at: DateTime<Utc>,
    grace_period_days: u32,
    now: DateTime<Utc>,
) -> ExpiryState {
    let days_remaining = ceil_days(expires_at - now);
    if now <= expires_at {
        return ExpiryState::Active { days_remaining };
    }

    // A window reaching past the last representable instant stays open.
    let grace_end = expires_at
        .checked_add_signed(Duration::days(i64::from(grace_period_days)))
        .unwrap_or(DateTime::<Utc>::MAX_UTC);
    let grace_days_remaining = ceil_days(grace_end - now);
    if grace_days_remaining > 0 {
        ExpiryState::Grace {
            days_remaining,
            grace_days_remaining,
        }
    } else {
        ExpiryState::Lapsed { days_remaining }
    }
}

/// Whole days in `delta`, rounded toward positive infinity.
pub fn ceil_days(delta: Duration) -> i64 {
    let ms = delta.num_milliseconds();
    ms.div_euclid(MILLIS_PER_DAY) + i64::from(ms.rem_euclid(MILLIS_PER_DAY) != 0)
}

/// Validate a signed license against the system clock.
pub fn validate_signed_license(
    license: &SignedLicenseFile,
    public_key: &RsaPublicKey,
    options: &ValidationOptions,
) -> LicenseValidationResult {
    validate_signed_license_with_clock(license, public_key, options, &SystemClock)
}

/// Validate a signed license against the given clock.
pub fn validate_signed_license_with_clock(
    license: &SignedLicenseFile,
    public_key: &RsaPublicKey,
    options: &ValidationOptions,
    clock: &dyn Clock,
) -> LicenseValidationResult {
    // 1. Signature
    if let Err(e) = verify_license_signature(license, public_key) {
        warn!(
            public_key_id = %license.public_key_id,
            error = %e,
            "License signature rejected"
        );
        return LicenseValidationResult::invalid_signature(
            "License signature is invalid: the file was modified or signed with a different key",
        );
    }
    let data = &license.data;

    // 2. Hardware binding
    if let Some(expected) = &data.hardware_id {
        let current = options
            .current_hardware_id
            .clone()
            .unwrap_or_else(hardware_fingerprint);
        if !expected.eq_ignore_ascii_case(current.trim()) {
            warn!(license_id = %data.license_id, "License is bound to another machine");
            return LicenseValidationResult::hardware_mismatch(
                data.clone(),
                format!(
                    "License is bound to machine {} but this machine is {}",
                    fingerprint_prefix(expected),
                    fingerprint_prefix(&current)
                ),
            );
        }
    }

    // 3. Expiry
    let now = clock.now_utc();
    let mut result = match temporal_result(data, now) {
        Ok(result) => result,
        Err(expired) => {
            info!(license_id = %data.license_id, "License expired beyond grace period");
            return expired;
        }
    };

    // 4. Capacity (advisory)
    let limits = CapacityLimits::from_license(data);
    for warning in limits.warnings(options.machine_count, options.user_count) {
        result.push_warning(warning);
    }

    if let Ok(actual) = key_id(public_key) {
        if actual != license.public_key_id {
            result.push_warning(format!(
                "License names signing key {} but was verified with key {}",
                license.public_key_id, actual
            ));
        }
    }

    debug!(
        license_id = %data.license_id,
        status = %result.status(),
        days_remaining = ?result.days_remaining(),
        warnings = result.warnings().len(),
        "License validated"
    );
    result
}

/// `Ok` for a usable license (with expiry warnings), `Err` for a lapsed one.
fn temporal_result(
    data: &SignedLicenseData,
    now: DateTime<Utc>,
) -> Result<LicenseValidationResult, LicenseValidationResult> {
    let Some(expires_at) = data.expires_at else {
        return Ok(LicenseValidationResult::valid_license(data.clone(), None));
    };
    let expiry_date = expires_at.format("%Y-%m-%d");

    match evaluate_expiry(expires_at, data.grace_period_days, now) {
        ExpiryState::Active { days_remaining } => {
            let mut result =
                LicenseValidationResult::valid_license(data.clone(), Some(days_remaining));
            if days_remaining <= EXPIRY_WARNING_DAYS {
                result.push_warning(format!(
                    "License expires in {} day(s) on {}",
                    days_remaining, expiry_date
                ));
            }
            if days_remaining <= EXPIRY_URGENT_DAYS {
                result.push_warning(format!(
                    "Renew now: only {} day(s) left before the grace period starts",
                    days_remaining
                ));
            }
            Ok(result)
        }
        ExpiryState::Grace {
            days_remaining,
            grace_days_remaining,
        } => {
            let result = LicenseValidationResult::grace_period(
                data.clone(),
                days_remaining,
                grace_days_remaining,
            );
            Ok(result
                .with_warning(format!(
                    "License expired on {}; grace period ends in {} day(s)",
                    expiry_date, grace_days_remaining
                ))
                .with_warning("Running in read-only mode until the license is renewed"))
        }
        ExpiryState::Lapsed { days_remaining } => Err(LicenseValidationResult::expired(
            data.clone(),
            days_remaining,
            format!(
                "License expired on {} and its {}-day grace period has ended",
                expiry_date, data.grace_period_days
            ),
        )),
    }
}

fn fingerprint_prefix(fingerprint: &str) -> &str {
    fingerprint.get(..12).unwrap_or(fingerprint)
}
