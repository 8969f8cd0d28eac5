//! License artifact structs and the validation result.
//!
//! Parsing is strict: unknown fields, unknown enum values, malformed
//! timestamps and unsupported format versions are rejected before any
//! business check sees the data.

use crate::LicenseError;
use chrono::{DateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use uuid::Uuid;

/// The only artifact format version this crate reads and writes.
pub const LICENSE_FORMAT_VERSION: &str = "1.0";

/// Sentinel for "no limit" in `maxMachines` / `maxUsers`.
pub const UNLIMITED: i64 = -1;

/// Commercial shape of a license.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LicenseType {
    /// Time-limited evaluation.
    Trial,
    /// Subscription with an expiry date.
    TimeBased,
    /// Priced per registered machine.
    PerMachine,
    /// Priced per named user.
    PerUser,
    /// Never expires.
    Perpetual,
    /// Issued for air-gapped sites.
    Offline,
}

/// Support level purchased with the license.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SupportTier {
    /// Community / email support.
    #[default]
    Basic,
    /// Business-hours support.
    Standard,
    /// 24/7 support.
    Premium,
}

/// Customer contact and support metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LicenseMetadata {
    /// Customer contact address.
    pub contact_email: String,

    /// Purchased support tier.
    pub support_tier: SupportTier,

    /// Free-form issuer fields, omitted from the artifact when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_fields: Option<BTreeMap<String, Value>>,
}

/// The signed payload. Immutable once signed: any change invalidates the
/// signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SignedLicenseData {
    /// Unique per issuance.
    pub license_id: Uuid,

    /// Customer identifier.
    pub issued_to: String,

    /// Issuance time.
    #[serde(with = "wire_time")]
    pub issued_at: DateTime<Utc>,

    /// License type.
    #[serde(rename = "type")]
    pub license_type: LicenseType,

    /// Expiry time; `None` means perpetual.
    #[serde(with = "wire_time::option")]
    pub expires_at: Option<DateTime<Utc>>,

    /// Machine limit; `-1` means unlimited.
    pub max_machines: i64,

    /// User limit; `-1` means unlimited.
    pub max_users: i64,

    /// Licensed feature IDs.
    pub features: BTreeSet<String>,

    /// Licensed product module IDs.
    pub modules: BTreeSet<String>,

    /// SHA-256 hardware fingerprint; `None` means not machine-bound.
    pub hardware_id: Option<String>,

    /// Days of continued validity after `expires_at`.
    pub grace_period_days: u32,

    /// Contact and support metadata.
    pub metadata: LicenseMetadata,
}

impl SignedLicenseData {
    /// Whether the license never expires.
    pub fn is_perpetual(&self) -> bool {
        self.expires_at.is_none()
    }

    /// Whether the license is bound to one machine.
    pub fn is_hardware_bound(&self) -> bool {
        self.hardware_id.is_some()
    }

    /// Whether `feature` is licensed.
    pub fn has_feature(&self, feature: &str) -> bool {
        self.features.contains(feature)
    }

    /// Whether product module `module` is licensed.
    pub fn has_module(&self, module: &str) -> bool {
        self.modules.contains(module)
    }

    /// Enforced machine limit, if any.
    pub fn machine_limit(&self) -> Option<u64> {
        positive_limit(self.max_machines)
    }

    /// Enforced user limit, if any.
    pub fn user_limit(&self) -> Option<u64> {
        positive_limit(self.max_users)
    }
}

fn positive_limit(raw: i64) -> Option<u64> {
    u64::try_from(raw).ok().filter(|n| *n > 0)
}

/// The distributable artifact: payload plus detached signature.
///
/// A parsed artifact remembers its `data` object exactly as read. The
/// signature is checked over that object, so an issuer's array order and
/// timestamp spelling survive even though `data` normalizes both.
#[derive(Debug, Clone)]
pub struct SignedLicenseFile {
    /// Artifact format version, always `"1.0"`.
    pub version: String,

    /// Signed payload.
    pub data: SignedLicenseData,

    /// Base64 RSA-SHA256 signature over the canonical JSON of `data`.
    pub signature: String,

    /// Id of the public key that verifies `signature` (label only).
    pub public_key_id: String,

    data_json: Option<Value>,
}

impl SignedLicenseFile {
    /// Wrap freshly signed data in a version `"1.0"` artifact.
    pub fn new(
        data: SignedLicenseData,
        signature: impl Into<String>,
        public_key_id: impl Into<String>,
    ) -> Self {
        Self {
            version: LICENSE_FORMAT_VERSION.to_string(),
            data,
            signature: signature.into(),
            public_key_id: public_key_id.into(),
            data_json: None,
        }
    }

    /// The `data` object as it was read, while it still decodes to `data`.
    ///
    /// `None` for artifacts built in memory, and once `data` has been edited
    /// after parsing.
    pub fn data_json(&self) -> Option<&Value> {
        let raw = self.data_json.as_ref()?;
        let decoded = SignedLicenseData::deserialize(raw).ok()?;
        (decoded == self.data).then_some(raw)
    }

    /// Serialize the artifact as pretty JSON (the `.lic` file content).
    pub fn to_json(&self) -> Result<String, LicenseError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| LicenseError::Malformed(format!("Failed to serialize license: {}", e)))
    }

    /// Parse and structurally validate an artifact.
    pub fn from_json(json: &str) -> Result<Self, LicenseError> {
        let file: Self = serde_json::from_str(json)
            .map_err(|e| LicenseError::Malformed(format!("Failed to parse license: {}", e)))?;
        if file.version != LICENSE_FORMAT_VERSION {
            return Err(LicenseError::UnsupportedVersion(file.version));
        }
        Ok(file)
    }
}

impl PartialEq for SignedLicenseFile {
    fn eq(&self, other: &Self) -> bool {
        self.version == other.version
            && self.data == other.data
            && self.signature == other.signature
            && self.public_key_id == other.public_key_id
    }
}

impl Serialize for SignedLicenseFile {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("SignedLicenseFile", 4)?;
        state.serialize_field("version", &self.version)?;
        match self.data_json() {
            Some(raw) => state.serialize_field("data", raw)?,
            None => state.serialize_field("data", &self.data)?,
        }
        state.serialize_field("signature", &self.signature)?;
        state.serialize_field("publicKeyId", &self.public_key_id)?;
        state.end()
    }
}

/// On-disk shape of [`SignedLicenseFile`] before `data` is decoded.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct WireLicenseFile {
    version: String,
    data: Value,
    signature: String,
    public_key_id: String,
}

impl<'de> Deserialize<'de> for SignedLicenseFile {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = WireLicenseFile::deserialize(deserializer)?;
        let data = SignedLicenseData::deserialize(&wire.data).map_err(de::Error::custom)?;
        Ok(Self {
            version: wire.version,
            data,
            signature: wire.signature,
            public_key_id: wire.public_key_id,
            data_json: Some(wire.data),
        })
    }
}

/// Outcome class of a validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LicenseStatus {
    /// Signature, hardware and expiry checks passed.
    Valid,
    /// Past expiry and past the grace period.
    Expired,
    /// Past expiry but inside the grace period (degraded, still usable).
    GracePeriod,
    /// Tampered artifact or wrong public key.
    InvalidSignature,
    /// Bound to a different machine.
    HardwareMismatch,
    /// No artifact available.
    NotFound,
}

impl LicenseStatus {
    /// Whether this status permits operation.
    pub fn is_usable(self) -> bool {
        matches!(self, Self::Valid | Self::GracePeriod)
    }

    /// Wire name of the status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Valid => "VALID",
            Self::Expired => "EXPIRED",
            Self::GracePeriod => "GRACE_PERIOD",
            Self::InvalidSignature => "INVALID_SIGNATURE",
            Self::HardwareMismatch => "HARDWARE_MISMATCH",
            Self::NotFound => "NOT_FOUND",
        }
    }
}

impl fmt::Display for LicenseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single output of a license check.
///
/// Only constructible through the status-specific constructors, which keep
/// two invariants: `valid` implies a usable status, and `license` is present
/// for every status except `NOT_FOUND` and `INVALID_SIGNATURE`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseValidationResult {
    valid: bool,
    status: LicenseStatus,
    license: Option<SignedLicenseData>,
    days_remaining: Option<i64>,
    grace_days_remaining: Option<i64>,
    warnings: Vec<String>,
    errors: Vec<String>,
}

impl LicenseValidationResult {
    fn build(status: LicenseStatus, license: Option<SignedLicenseData>) -> Self {
        Self {
            valid: status.is_usable(),
            status,
            license,
            days_remaining: None,
            grace_days_remaining: None,
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// `VALID`; `days_remaining` is `None` for perpetual licenses.
    pub fn valid_license(license: SignedLicenseData, days_remaining: Option<i64>) -> Self {
        let mut result = Self::build(LicenseStatus::Valid, Some(license));
        result.days_remaining = days_remaining;
        result
    }

    /// `GRACE_PERIOD`: expired but still usable in degraded mode.
    pub fn grace_period(
        license: SignedLicenseData,
        days_remaining: i64,
        grace_days_remaining: i64,
    ) -> Self {
        let mut result = Self::build(LicenseStatus::GracePeriod, Some(license));
        result.days_remaining = Some(days_remaining);
        result.grace_days_remaining = Some(grace_days_remaining);
        result
    }

    /// `EXPIRED`: past the grace period.
    pub fn expired(
        license: SignedLicenseData,
        days_remaining: i64,
        detail: impl Into<String>,
    ) -> Self {
        let mut result = Self::build(LicenseStatus::Expired, Some(license));
        result.days_remaining = Some(days_remaining);
        result.grace_days_remaining = Some(0);
        result.errors.push(detail.into());
        result
    }

    /// `INVALID_SIGNATURE`: the payload is untrusted and is not returned.
    pub fn invalid_signature(detail: impl Into<String>) -> Self {
        let mut result = Self::build(LicenseStatus::InvalidSignature, None);
        result.errors.push(detail.into());
        result
    }

    /// `HARDWARE_MISMATCH`: signed for another machine.
    pub fn hardware_mismatch(license: SignedLicenseData, detail: impl Into<String>) -> Self {
        let mut result = Self::build(LicenseStatus::HardwareMismatch, Some(license));
        result.errors.push(detail.into());
        result
    }

    /// `NOT_FOUND`: no usable artifact.
    pub fn not_found(detail: impl Into<String>) -> Self {
        let mut result = Self::build(LicenseStatus::NotFound, None);
        result.errors.push(detail.into());
        result
    }

    /// Attach a warning. Warnings never change `valid` or `status`.
    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    pub(crate) fn push_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// Whether the license permits operation.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Outcome class.
    pub fn status(&self) -> LicenseStatus {
        self.status
    }

    /// The verified payload, when the status carries one.
    pub fn license(&self) -> Option<&SignedLicenseData> {
        self.license.as_ref()
    }

    /// Whole days until expiry (rounded up); negative once expired.
    pub fn days_remaining(&self) -> Option<i64> {
        self.days_remaining
    }

    /// Whole days left in the grace period (rounded up).
    pub fn grace_days_remaining(&self) -> Option<i64> {
        self.grace_days_remaining
    }

    /// Advisory messages (approaching expiry, grace mode, capacity).
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Reasons the license is not usable.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }
}

/// RFC 3339 timestamps with millisecond precision and a `Z` suffix.
mod wire_time {
    use chrono::{DateTime, SecondsFormat, Timelike, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn format(dt: &DateTime<Utc>) -> String {
        dt.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    pub fn parse<E: de::Error>(s: &str) -> Result<DateTime<Utc>, E> {
        let dt = DateTime::parse_from_rfc3339(s)
            .map_err(|e| E::custom(format!("invalid timestamp {:?}: {}", s, e)))?
            .with_timezone(&Utc);
        // The wire carries milliseconds; finer digits would not survive signing.
        if dt.nanosecond() % 1_000_000 != 0 {
            return Err(E::custom(format!(
                "timestamp {:?} is more precise than milliseconds",
                s
            )));
        }
        Ok(dt)
    }

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(dt))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse(&s)
    }

    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            dt: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match dt {
                Some(dt) => serializer.serialize_str(&super::format(dt)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .map(|s| super::parse(&s))
                .transpose()
        }
    }
}
