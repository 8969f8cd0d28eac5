//! Issue a license on the vendor side and validate it on the customer side.
//!
//! # Running
//!
//! ```bash
//! RUST_LOG=factoryos_license=debug cargo run --example issue_and_validate
//! ```
//!
//! Keys and the license file go under `$TMPDIR/factoryos-license-demo` unless
//! `LICENSE_KEY_DIR` / `LICENSE_FILE_PATH` are set.
//!
//! # Note
//!
//! A real product embeds the public key at build time (`include_str!`) rather
//! than reading it from the key directory next to the private key.

use factoryos_license::{
    export_license_base64, hardware_fingerprint, KeyStore, LicenseConfig, LicenseError,
    LicenseIssuer, LicenseManager, LicenseOptions, LicenseType, SupportTier,
};
use tracing_subscriber::EnvFilter;

fn config() -> Result<LicenseConfig, LicenseError> {
    if std::env::var_os("LICENSE_KEY_DIR").is_some()
        || std::env::var_os("LICENSE_FILE_PATH").is_some()
    {
        return LicenseConfig::from_env();
    }
    let config = LicenseConfig::rooted_at(std::env::temp_dir().join("factoryos-license-demo"));
    config.validate()?;
    Ok(config)
}

fn main() -> Result<(), LicenseError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = config()?;

    // Vendor: get-or-create the signing keys and issue a machine-bound license.
    let key_store = KeyStore::from_config(&config);
    let issuer = LicenseIssuer::new(key_store.load_or_generate()?);

    let license = issuer.issue(
        &LicenseOptions::new("Acme Mfg", LicenseType::TimeBased)
            .expires_in_days(30)
            .max_machines(10)
            .grace_period_days(14)
            .modules(["dashboard", "production", "downtime"])
            .hardware_id(hardware_fingerprint())
            .contact_email("ops@acme.example")
            .support_tier(SupportTier::Premium),
    )?;

    // The license key a customer would paste into the activation screen.
    let license_key = export_license_base64(&license)?;
    println!("License key ({} chars):\n{}\n", license_key.len(), license_key);

    // Customer: only the public key is present.
    let manager = LicenseManager::new(config, key_store.load_public_key()?)?;
    let activation = manager.activate_base64(&license_key)?;
    println!("Activation: {}", activation.status());

    let result = manager.validate_hybrid();
    let report = serde_json::to_string_pretty(&result)
        .map_err(|e| LicenseError::Malformed(format!("Failed to render result: {}", e)))?;
    println!("{}", report);

    match manager.require(&["core"], &["production"]) {
        Ok(_) => println!("Production module unlocked"),
        Err(e) => println!("Production module locked: {}", e),
    }
    match manager.require(&["core"], &["payments"]) {
        Ok(_) => println!("Payments module unlocked"),
        Err(e) => println!("Payments module locked: {}", e),
    }

    Ok(())
}
