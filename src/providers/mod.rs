//! Providers Module - Ledger Data Sources
//!
//! Everything the engine knows about the chain comes through
//! `LedgerClient`: the TronGrid/TronScan HTTP client in production, the
//! in-memory ledger for fixtures and tests.

pub mod ledger;
pub mod memory;
pub mod trongrid;

pub use ledger::*;
pub use memory::*;
pub use trongrid::*;
