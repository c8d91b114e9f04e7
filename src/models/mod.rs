//! Models Module - Data Structures & Configuration
//!
//! Addresses, transfers, paths, the error type and the analyzer
//! configuration. Thresholds themselves live in `utils::constants`.

pub mod config;
pub mod errors;
pub mod types;

pub use config::*;
pub use errors::*;
pub use types::*;
