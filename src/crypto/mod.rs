//! Cryptographic primitives for license signing and verification.

pub mod canonical;
pub mod digest;
pub mod keys;
pub mod signing;
pub mod verify;
