//! Utils Module - Shared Helpers
//!
//! Constants and the TTL lookup cache used by the API layer.

pub mod cache;
pub mod constants;

pub use cache::*;
pub use constants::*;
