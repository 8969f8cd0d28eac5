//! File-system locations for keys and the license artifact.
//!
//! Components take a [`LicenseConfig`] explicitly. The environment is read in
//! exactly one place, [`LicenseConfig::from_env`], so tests can point
//! everything at a temporary directory without touching process state.

use crate::LicenseError;
use std::path::{Path, PathBuf};

/// Environment variable overriding the key directory.
pub const KEY_DIR_ENV: &str = "LICENSE_KEY_DIR";

/// Environment variable overriding the license file path.
pub const LICENSE_FILE_ENV: &str = "LICENSE_FILE_PATH";

/// Per-user data directory under the home directory.
pub const DATA_DIR_NAME: &str = ".factoryos";

/// File name of the PKCS#8 private key inside the key directory.
pub const PRIVATE_KEY_FILE: &str = "license.private.pem";

/// File name of the SPKI public key inside the key directory.
pub const PUBLIC_KEY_FILE: &str = "license.public.pem";

/// Default license file name inside the data directory.
pub const LICENSE_FILE_NAME: &str = "license.lic";

/// Where keys and the license file live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicenseConfig {
    /// Directory holding `license.private.pem` and `license.public.pem`.
    pub key_dir: PathBuf,

    /// Path of the signed license artifact (`.lic`).
    pub license_path: PathBuf,
}

impl LicenseConfig {
    /// Build a configuration from explicit paths.
    pub fn new(key_dir: impl Into<PathBuf>, license_path: impl Into<PathBuf>) -> Self {
        Self {
            key_dir: key_dir.into(),
            license_path: license_path.into(),
        }
    }

    /// Configuration rooted at one base directory: `<base>/keys` and
    /// `<base>/license.lic`.
    pub fn rooted_at(base: impl AsRef<Path>) -> Self {
        let base = base.as_ref();
        Self::new(base.join("keys"), base.join(LICENSE_FILE_NAME))
    }

    /// Resolve the configuration from `LICENSE_KEY_DIR` / `LICENSE_FILE_PATH`,
    /// defaulting to `~/.factoryos/keys` and `~/.factoryos/license.lic`.
    pub fn from_env() -> Result<Self, LicenseError> {
        let key_dir = std::env::var_os(KEY_DIR_ENV).map(PathBuf::from);
        let license_path = std::env::var_os(LICENSE_FILE_ENV).map(PathBuf::from);

        let (key_dir, license_path) = match (key_dir, license_path) {
            (Some(k), Some(l)) => (k, l),
            (k, l) => {
                let base = default_data_dir()?;
                (
                    k.unwrap_or_else(|| base.join("keys")),
                    l.unwrap_or_else(|| base.join(LICENSE_FILE_NAME)),
                )
            }
        };

        let config = Self::new(key_dir, license_path);
        config.validate()?;
        Ok(config)
    }

    /// Path of the private key file.
    pub fn private_key_path(&self) -> PathBuf {
        self.key_dir.join(PRIVATE_KEY_FILE)
    }

    /// Path of the public key file.
    pub fn public_key_path(&self) -> PathBuf {
        self.key_dir.join(PUBLIC_KEY_FILE)
    }

    /// Validate configuration for obvious errors.
    pub fn validate(&self) -> Result<(), LicenseError> {
        if self.key_dir.as_os_str().is_empty() {
            return Err(LicenseError::ConfigError(
                "key_dir cannot be empty".to_string(),
            ));
        }
        if self.license_path.as_os_str().is_empty() {
            return Err(LicenseError::ConfigError(
                "license_path cannot be empty".to_string(),
            ));
        }
        if self.license_path.file_name().is_none() {
            return Err(LicenseError::ConfigError(format!(
                "license_path must name a file, got {}",
                self.license_path.display()
            )));
        }
        Ok(())
    }
}

/// `~/.factoryos`.
pub fn default_data_dir() -> Result<PathBuf, LicenseError> {
    dirs::home_dir()
        .map(|home| home.join(DATA_DIR_NAME))
        .ok_or_else(|| LicenseError::ConfigError("Could not find home directory".to_string()))
}
