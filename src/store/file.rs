//! License file storage with atomic writes.
//!
//! The `.lic` file is the pretty JSON of a [`SignedLicenseFile`]. Writes go
//! through a temp file + rename so a crash never leaves a half-written
//! license behind.

use crate::protocol::models::SignedLicenseFile;
use crate::LicenseError;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Permission bits of the license file on unix.
pub const LICENSE_FILE_MODE: u32 = 0o644;

/// Reads and writes the activated license file.
#[derive(Debug, Clone)]
pub struct LicenseFileStore {
    /// Location of the license file.
    path: PathBuf,
}

impl LicenseFileStore {
    /// Create a store for the license file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the license file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Save a license atomically, creating the parent directory if needed.
    pub fn save(&self, license: &SignedLicenseFile) -> Result<(), LicenseError> {
        let json = license.to_json()?;
        write_atomic(&self.path, json.as_bytes(), LICENSE_FILE_MODE)
            .map_err(|e| LicenseError::LicenseIo(format!("Failed to write license file: {}", e)))?;

        info!(
            path = %self.path.display(),
            license_id = %license.data.license_id,
            "License file saved"
        );
        Ok(())
    }

    /// Load the license.
    ///
    /// # Returns
    /// * `Ok(None)` - No license file
    /// * `Ok(Some(_))` - Parsed license (signature not yet checked)
    /// * `Err(LicenseIo | Malformed | UnsupportedVersion)` - File present but unusable
    pub fn load(&self) -> Result<Option<SignedLicenseFile>, LicenseError> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "No license file");
            return Ok(None);
        }

        let json = fs::read_to_string(&self.path)
            .map_err(|e| LicenseError::LicenseIo(format!("Failed to read license file: {}", e)))?;

        SignedLicenseFile::from_json(&json).map(Some)
    }

    /// Delete the license file (deactivation). Missing file is not an error.
    pub fn remove(&self) -> Result<(), LicenseError> {
        if self.path.exists() {
            fs::remove_file(&self.path).map_err(|e| {
                LicenseError::LicenseIo(format!("Failed to delete license file: {}", e))
            })?;
            info!(path = %self.path.display(), "License file removed");
        }
        Ok(())
    }

    /// Whether a license file is present.
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }
}

/// Write `contents` to `path` via a sibling temp file and rename.
///
/// `mode` sets the unix permission bits of the result and is ignored
/// elsewhere.
pub(crate) fn write_atomic(path: &Path, contents: &[u8], mode: u32) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut temp_name = path.file_name().unwrap_or_default().to_os_string();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    // A leftover temp file from an interrupted write would keep its old mode.
    match fs::remove_file(&temp_path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(e),
        _ => {}
    }

    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(mode);
    }

    let mut file = options.open(&temp_path)?;
    // The create mode is masked by umask; fix the bits before any content lands.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(mode))?;
    }
    #[cfg(not(unix))]
    let _ = mode;

    file.write_all(contents)?;
    file.sync_all()?;
    drop(file);

    fs::rename(&temp_path, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::signing::sign_license;
    use crate::test_support::{sample_data, test_keys};
    use tempfile::TempDir;

    fn sample_license() -> SignedLicenseFile {
        sign_license(sample_data(), test_keys().private_key()).unwrap()
    }

    #[test]
    fn test_license_file_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let store = LicenseFileStore::new(temp_dir.path().join("license.lic"));
        let license = sample_license();

        store.save(&license).unwrap();
        assert!(store.exists());

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded, license);
    }

    #[test]
    fn test_saved_file_is_pretty_json() {
        let temp_dir = TempDir::new().unwrap();
        let store = LicenseFileStore::new(temp_dir.path().join("license.lic"));
        store.save(&sample_license()).unwrap();

        let text = fs::read_to_string(store.path()).unwrap();
        assert!(text.starts_with("{\n"));
        assert!(text.contains("\"publicKeyId\""));
    }

    #[test]
    fn test_load_nonexistent() {
        let temp_dir = TempDir::new().unwrap();
        let store = LicenseFileStore::new(temp_dir.path().join("missing.lic"));
        assert!(store.load().unwrap().is_none());
        assert!(!store.exists());
    }

    #[test]
    fn test_load_malformed() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("license.lic");
        fs::write(&path, "{ not json").unwrap();

        let store = LicenseFileStore::new(path);
        assert!(matches!(store.load(), Err(LicenseError::Malformed(_))));
    }

    #[test]
    fn test_load_directory_is_io_error() {
        let temp_dir = TempDir::new().unwrap();
        let store = LicenseFileStore::new(temp_dir.path());
        assert!(matches!(store.load(), Err(LicenseError::LicenseIo(_))));
    }

    #[test]
    fn test_save_creates_parent_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let store = LicenseFileStore::new(temp_dir.path().join("a/b/license.lic"));
        store.save(&sample_license()).unwrap();
        assert!(store.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_license_file_mode() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let store = LicenseFileStore::new(temp_dir.path().join("license.lic"));
        store.save(&sample_license()).unwrap();

        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, LICENSE_FILE_MODE);
    }

    #[test]
    fn test_atomic_overwrite() {
        let temp_dir = TempDir::new().unwrap();
        let store = LicenseFileStore::new(temp_dir.path().join("license.lic"));

        store.save(&sample_license()).unwrap();

        let mut data = sample_data();
        data.issued_to = "Beta Foods".to_string();
        let second = sign_license(data, test_keys().private_key()).unwrap();
        store.save(&second).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.data.issued_to, "Beta Foods");
        assert!(!temp_dir.path().join("license.lic.tmp").exists());
    }

    #[test]
    fn test_write_atomic_replaces_stale_temp_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("license.lic");
        let stale = temp_dir.path().join("license.lic.tmp");
        fs::write(&stale, "leftover from an interrupted write, longer than the new one").unwrap();

        write_atomic(&path, b"{}", LICENSE_FILE_MODE).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "{}");
        assert!(!stale.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_write_atomic_ignores_stale_temp_mode() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("secret.pem");
        let stale = temp_dir.path().join("secret.pem.tmp");
        fs::write(&stale, "old").unwrap();
        fs::set_permissions(&stale, fs::Permissions::from_mode(0o666)).unwrap();

        write_atomic(&path, b"secret", 0o600).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_remove() {
        let temp_dir = TempDir::new().unwrap();
        let store = LicenseFileStore::new(temp_dir.path().join("license.lic"));

        store.save(&sample_license()).unwrap();
        store.remove().unwrap();
        assert!(store.load().unwrap().is_none());

        // Second remove is a no-op.
        store.remove().unwrap();
    }
}
