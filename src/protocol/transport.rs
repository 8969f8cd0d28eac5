//! Base64 transport encoding for channels that cannot carry a file
//! (email bodies, support tickets, clipboard).

use crate::protocol::models::SignedLicenseFile;
use crate::LicenseError;
use base64::{engine::general_purpose::STANDARD, Engine};

/// Encode the full artifact JSON as standard base64.
pub fn export_license_base64(license: &SignedLicenseFile) -> Result<String, LicenseError> {
    let json = serde_json::to_string(license)
        .map_err(|e| LicenseError::Malformed(format!("Failed to serialize license: {}", e)))?;
    Ok(STANDARD.encode(json.as_bytes()))
}

/// Decode an artifact produced by [`export_license_base64`].
///
/// Whitespace anywhere in the input is ignored, so text that a mail client
/// wrapped or indented still imports.
pub fn import_license_base64(encoded: &str) -> Result<SignedLicenseFile, LicenseError> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return Err(LicenseError::Malformed("Empty license text".to_string()));
    }

    let bytes = STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| LicenseError::Malformed(format!("Invalid base64: {}", e)))?;
    let json = String::from_utf8(bytes)
        .map_err(|e| LicenseError::Malformed(format!("Invalid UTF-8 in license: {}", e)))?;

    SignedLicenseFile::from_json(&json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::signing::sign_license;
    use crate::test_support::{sample_data, test_keys};

    fn signed() -> SignedLicenseFile {
        sign_license(sample_data(), test_keys().private_key()).unwrap()
    }

    #[test]
    fn test_roundtrip_deep_equal() {
        let file = signed();
        let text = export_license_base64(&file).unwrap();
        assert_eq!(import_license_base64(&text).unwrap(), file);
    }

    #[test]
    fn test_export_is_plain_base64() {
        let text = export_license_base64(&signed()).unwrap();
        assert!(text
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'+' || b == b'/' || b == b'='));
    }

    #[test]
    fn test_import_tolerates_line_wrapping() {
        let file = signed();
        let text = export_license_base64(&file).unwrap();
        let wrapped: String = text
            .as_bytes()
            .chunks(76)
            .map(|c| format!("  {}\r\n", std::str::from_utf8(c).unwrap()))
            .collect();
        assert_eq!(import_license_base64(&wrapped).unwrap(), file);
    }

    #[test]
    fn test_import_empty() {
        assert!(matches!(import_license_base64("  \n "), Err(LicenseError::Malformed(_))));
    }

    #[test]
    fn test_import_not_base64() {
        assert!(matches!(import_license_base64("%%%"), Err(LicenseError::Malformed(_))));
    }

    #[test]
    fn test_import_base64_of_non_license() {
        let text = STANDARD.encode(br#"{"hello":"world"}"#);
        assert!(matches!(import_license_base64(&text), Err(LicenseError::Malformed(_))));
    }
}
