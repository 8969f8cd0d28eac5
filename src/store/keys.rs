//! On-disk storage of the issuer's signing keys.
//!
//! Layout under the key directory:
//!
//! ```text
//! license.private.pem   PKCS#8, mode 0600
//! license.public.pem    SPKI,   mode 0644
//! ```

use crate::config::{LicenseConfig, PRIVATE_KEY_FILE, PUBLIC_KEY_FILE};
use crate::crypto::keys::KeyPair;
use crate::crypto::verify::decode_public_key;
use crate::store::file::write_atomic;
use crate::LicenseError;
use rsa::RsaPublicKey;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Permission bits of the private key file on unix.
pub const PRIVATE_KEY_MODE: u32 = 0o600;

/// Permission bits of the public key file on unix.
pub const PUBLIC_KEY_MODE: u32 = 0o644;

/// Key directory holding the issuer's PEM files.
#[derive(Debug, Clone)]
pub struct KeyStore {
    key_dir: PathBuf,
}

impl KeyStore {
    /// Create a store rooted at `key_dir`. Nothing is touched until first use.
    pub fn new(key_dir: impl Into<PathBuf>) -> Self {
        Self {
            key_dir: key_dir.into(),
        }
    }

    /// Create a store for the configured key directory.
    pub fn from_config(config: &LicenseConfig) -> Self {
        Self::new(config.key_dir.clone())
    }

    /// The key directory.
    pub fn key_dir(&self) -> &Path {
        &self.key_dir
    }

    /// Path of the private key file.
    pub fn private_key_path(&self) -> PathBuf {
        self.key_dir.join(PRIVATE_KEY_FILE)
    }

    /// Path of the public key file.
    pub fn public_key_path(&self) -> PathBuf {
        self.key_dir.join(PUBLIC_KEY_FILE)
    }

    /// Persist both halves, creating the key directory if needed.
    pub fn save_key_pair(&self, pair: &KeyPair) -> Result<(), LicenseError> {
        fs::create_dir_all(&self.key_dir)
            .map_err(|e| LicenseError::KeyIo(format!("Failed to create key dir: {}", e)))?;

        let private_pem = pair.private_key_pem()?;
        write_atomic(&self.private_key_path(), private_pem.as_bytes(), PRIVATE_KEY_MODE)
            .map_err(|e| LicenseError::KeyIo(format!("Failed to write private key: {}", e)))?;
        write_atomic(&self.public_key_path(), pair.public_key_pem().as_bytes(), PUBLIC_KEY_MODE)
            .map_err(|e| LicenseError::KeyIo(format!("Failed to write public key: {}", e)))?;

        info!(
            key_id = %pair.key_id(),
            path = %self.key_dir.display(),
            "Saved license signing keys"
        );
        Ok(())
    }

    /// Load the stored pair.
    ///
    /// Returns `Ok(None)` unless both files exist.
    pub fn load_key_pair(&self) -> Result<Option<KeyPair>, LicenseError> {
        let private_path = self.private_key_path();
        let public_path = self.public_key_path();
        if !private_path.exists() || !public_path.exists() {
            return Ok(None);
        }

        let private_pem = read_pem(&private_path)?;
        let public_pem = read_pem(&public_path)?;
        KeyPair::from_pems(&public_pem, &private_pem).map(Some)
    }

    /// Load the stored pair, or generate and persist a new one.
    ///
    /// A pair that is missing, partial or unreadable is replaced.
    pub fn load_or_generate(&self) -> Result<KeyPair, LicenseError> {
        match self.load_key_pair() {
            Ok(Some(pair)) => return Ok(pair),
            Ok(None) => {}
            Err(e) => warn!(
                path = %self.key_dir.display(),
                error = %e,
                "Stored signing keys unusable, generating a new pair"
            ),
        }

        let pair = KeyPair::generate()?;
        self.save_key_pair(&pair)?;
        Ok(pair)
    }

    /// Load only the public key, as a validating client does.
    pub fn load_public_key(&self) -> Result<RsaPublicKey, LicenseError> {
        let pem = read_pem(&self.public_key_path())?;
        decode_public_key(&pem)
    }
}

fn read_pem(path: &Path) -> Result<String, LicenseError> {
    fs::read_to_string(path)
        .map_err(|e| LicenseError::KeyIo(format!("Failed to read {}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{other_keys, test_keys};
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load_pair() {
        let temp_dir = TempDir::new().unwrap();
        let store = KeyStore::new(temp_dir.path().join("keys"));

        store.save_key_pair(test_keys()).unwrap();
        let loaded = store.load_key_pair().unwrap().unwrap();

        assert_eq!(loaded.key_id(), test_keys().key_id());
        assert!(loaded.private_key() == test_keys().private_key());
    }

    #[test]
    fn test_load_missing_pair() {
        let temp_dir = TempDir::new().unwrap();
        let store = KeyStore::new(temp_dir.path());
        assert!(store.load_key_pair().unwrap().is_none());
    }

    #[test]
    fn test_partial_pair_is_missing() {
        let temp_dir = TempDir::new().unwrap();
        let store = KeyStore::new(temp_dir.path());
        store.save_key_pair(test_keys()).unwrap();
        fs::remove_file(store.private_key_path()).unwrap();

        assert!(store.load_key_pair().unwrap().is_none());
    }

    #[test]
    fn test_mismatched_halves_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let store = KeyStore::new(temp_dir.path());
        store.save_key_pair(test_keys()).unwrap();
        fs::write(store.public_key_path(), other_keys().public_key_pem()).unwrap();

        assert!(matches!(store.load_key_pair(), Err(LicenseError::KeyEncoding(_))));
    }

    #[test]
    fn test_load_or_generate_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let store = KeyStore::new(temp_dir.path().join("keys"));
        store.save_key_pair(test_keys()).unwrap();

        let first = store.load_or_generate().unwrap();
        let second = store.load_or_generate().unwrap();
        assert_eq!(first.key_id(), test_keys().key_id());
        assert_eq!(second.key_id(), first.key_id());
    }

    #[test]
    fn test_load_or_generate_creates_keys() {
        let temp_dir = TempDir::new().unwrap();
        let store = KeyStore::new(temp_dir.path().join("fresh"));

        let pair = store.load_or_generate().unwrap();
        assert!(store.private_key_path().exists());
        assert!(store.public_key_path().exists());
        assert_eq!(store.load_key_pair().unwrap().unwrap().key_id(), pair.key_id());
    }

    #[test]
    fn test_load_public_key() {
        let temp_dir = TempDir::new().unwrap();
        let store = KeyStore::new(temp_dir.path());
        store.save_key_pair(test_keys()).unwrap();

        assert_eq!(&store.load_public_key().unwrap(), test_keys().public_key());
    }

    #[test]
    fn test_load_public_key_missing() {
        let temp_dir = TempDir::new().unwrap();
        let store = KeyStore::new(temp_dir.path());
        assert!(matches!(store.load_public_key(), Err(LicenseError::KeyIo(_))));
    }

    #[test]
    fn test_save_into_file_path_fails() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("not-a-dir");
        fs::write(&blocker, "x").unwrap();

        let store = KeyStore::new(&blocker);
        assert!(matches!(store.save_key_pair(test_keys()), Err(LicenseError::KeyIo(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_key_file_modes() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let store = KeyStore::new(temp_dir.path());
        store.save_key_pair(test_keys()).unwrap();

        let private_mode = fs::metadata(store.private_key_path()).unwrap().permissions().mode();
        let public_mode = fs::metadata(store.public_key_path()).unwrap().permissions().mode();
        assert_eq!(private_mode & 0o777, 0o600);
        assert_eq!(public_mode & 0o777, 0o644);
    }

    #[cfg(unix)]
    #[test]
    fn test_stale_temp_file_does_not_loosen_private_key() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let store = KeyStore::new(temp_dir.path());
        let stale = temp_dir.path().join("license.private.pem.tmp");
        fs::write(&stale, "half-written key").unwrap();
        fs::set_permissions(&stale, fs::Permissions::from_mode(0o666)).unwrap();

        store.save_key_pair(test_keys()).unwrap();

        let private_mode = fs::metadata(store.private_key_path()).unwrap().permissions().mode();
        assert_eq!(private_mode & 0o777, PRIVATE_KEY_MODE);
        assert!(!stale.exists());
        assert!(store.load_key_pair().unwrap().is_some());
    }
}
