//! Feature gating and advisory capacity limits.
//!
//! This module enforces access policies based on:
//! - License validity (status must be `VALID` or `GRACE_PERIOD`)
//! - Licensed features and product modules (all required ones must be present)
//! - Machine and user limits (advisory: they block *new* registrations,
//!   never an already-running deployment)

use crate::protocol::models::{LicenseValidationResult, SignedLicenseData};
use crate::LicenseError;

/// Check that a validation result grants every required feature.
///
/// # Returns
/// * `Ok(())` - Access granted
/// * `Err(InvalidLicense)` - License is not usable
/// * `Err(FeatureMissing)` - Required feature not licensed
pub fn check_access(
    result: &LicenseValidationResult,
    required_features: &[&str],
) -> Result<(), LicenseError> {
    check_entitlements(result, required_features, &[])
}

/// Check that a validation result grants every required feature and module.
pub fn check_entitlements(
    result: &LicenseValidationResult,
    required_features: &[&str],
    required_modules: &[&str],
) -> Result<(), LicenseError> {
    // 1. License must be usable
    if !result.is_valid() {
        return Err(LicenseError::InvalidLicense);
    }
    let license = result.license().ok_or(LicenseError::InvalidLicense)?;

    // 2. All required features present
    for required in required_features {
        if !license.has_feature(required) {
            return Err(LicenseError::FeatureMissing {
                feature: (*required).to_string(),
            });
        }
    }

    // 3. All required modules present
    for required in required_modules {
        if !license.has_module(required) {
            return Err(LicenseError::ModuleMissing {
                module: (*required).to_string(),
            });
        }
    }

    Ok(())
}

/// Machine and user limits of a license.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityLimits {
    /// Machine limit (None = unlimited)
    pub max_machines: Option<u64>,

    /// User limit (None = unlimited)
    pub max_users: Option<u64>,
}

impl CapacityLimits {
    /// Extract limits from license data.
    pub fn from_license(data: &SignedLicenseData) -> Self {
        Self {
            max_machines: data.machine_limit(),
            max_users: data.user_limit(),
        }
    }

    /// Whether one more machine may be registered on top of `current`.
    pub fn allows_new_machine(&self, current: u64) -> bool {
        self.max_machines.map_or(true, |max| current < max)
    }

    /// Whether one more user may be added on top of `current`.
    pub fn allows_new_user(&self, current: u64) -> bool {
        self.max_users.map_or(true, |max| current < max)
    }

    /// Check if any limit exists.
    pub fn has_limits(&self) -> bool {
        self.max_machines.is_some() || self.max_users.is_some()
    }

    /// Advisory messages for reported machine/user counts at or over limit.
    pub fn warnings(&self, machine_count: Option<u64>, user_count: Option<u64>) -> Vec<String> {
        let mut warnings = Vec::new();
        if let (Some(max), Some(count)) = (self.max_machines, machine_count) {
            if let Some(w) = limit_warning("Machine", "machines", count, max) {
                warnings.push(w);
            }
        }
        if let (Some(max), Some(count)) = (self.max_users, user_count) {
            if let Some(w) = limit_warning("User", "users", count, max) {
                warnings.push(w);
            }
        }
        warnings
    }
}

fn limit_warning(kind: &str, noun: &str, count: u64, max: u64) -> Option<String> {
    if count > max {
        Some(format!(
            "{} limit exceeded: {} {} in use, license allows {}",
            kind, count, noun, max
        ))
    } else if count == max {
        Some(format!(
            "{} limit reached: {} of {} {} in use; new registrations will be refused",
            kind, count, max, noun
        ))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::models::UNLIMITED;
    use crate::test_support::sample_data;

    fn valid_with_features(features: &[&str]) -> LicenseValidationResult {
        let mut data = sample_data();
        data.features = features.iter().map(|s| s.to_string()).collect();
        LicenseValidationResult::valid_license(data, Some(100))
    }

    #[test]
    fn test_check_access_granted() {
        let result = valid_with_features(&["core", "oee"]);
        assert!(check_access(&result, &["core"]).is_ok());
        assert!(check_access(&result, &["core", "oee"]).is_ok());
        assert!(check_access(&result, &[]).is_ok());
    }

    #[test]
    fn test_check_access_missing_feature() {
        let result = valid_with_features(&["core"]);
        assert!(matches!(
            check_access(&result, &["core", "oee"]),
            Err(LicenseError::FeatureMissing { feature }) if feature == "oee"
        ));
    }

    #[test]
    fn test_check_access_invalid_license() {
        let result = LicenseValidationResult::expired(sample_data(), -40, "expired");
        assert!(matches!(check_access(&result, &[]), Err(LicenseError::InvalidLicense)));

        let result = LicenseValidationResult::not_found("none");
        assert!(matches!(check_access(&result, &[]), Err(LicenseError::InvalidLicense)));
    }

    #[test]
    fn test_grace_period_still_grants_access() {
        let result = LicenseValidationResult::grace_period(sample_data(), -1, 13);
        assert!(check_access(&result, &["core"]).is_ok());
    }

    #[test]
    fn test_check_entitlements_missing_module() {
        let result = valid_with_features(&["core"]);
        assert!(matches!(
            check_entitlements(&result, &["core"], &["production", "payments"]),
            Err(LicenseError::ModuleMissing { module }) if module == "payments"
        ));
    }

    #[test]
    fn test_capacity_unlimited() {
        let mut data = sample_data();
        data.max_machines = UNLIMITED;
        data.max_users = UNLIMITED;
        let caps = CapacityLimits::from_license(&data);
        assert!(!caps.has_limits());
        assert!(caps.allows_new_machine(1_000_000));
        assert!(caps.warnings(Some(1_000_000), Some(1_000_000)).is_empty());
    }

    #[test]
    fn test_capacity_below_limit() {
        let caps = CapacityLimits { max_machines: Some(5), max_users: Some(10) };
        assert!(caps.allows_new_machine(4));
        assert!(caps.allows_new_user(9));
        assert!(caps.warnings(Some(4), Some(9)).is_empty());
    }

    #[test]
    fn test_capacity_at_limit() {
        let caps = CapacityLimits { max_machines: Some(5), max_users: None };
        assert!(!caps.allows_new_machine(5));
        let warnings = caps.warnings(Some(5), Some(500));
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].starts_with("Machine limit reached"));
    }

    #[test]
    fn test_capacity_over_limit() {
        let caps = CapacityLimits { max_machines: Some(5), max_users: Some(2) };
        let warnings = caps.warnings(Some(10), Some(3));
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].starts_with("Machine limit exceeded"));
        assert!(warnings[1].starts_with("User limit exceeded"));
    }

    #[test]
    fn test_capacity_counts_not_reported() {
        let caps = CapacityLimits { max_machines: Some(1), max_users: Some(1) };
        assert!(caps.warnings(None, None).is_empty());
    }

    #[test]
    fn test_zero_limit_treated_as_unenforced() {
        let mut data = sample_data();
        data.max_machines = 0;
        let caps = CapacityLimits::from_license(&data);
        assert_eq!(caps.max_machines, None);
        assert!(caps.allows_new_machine(3));
    }
}
