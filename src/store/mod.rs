//! Persistence of license files and signing keys.

pub mod file;
pub mod keys;
