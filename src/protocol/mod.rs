//! License artifact format and transport encodings.

pub mod models;
pub mod transport;
