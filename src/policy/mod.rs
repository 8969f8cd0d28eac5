//! License policy: the validation state machine and entitlement checks.

pub mod access;
pub mod validate;
