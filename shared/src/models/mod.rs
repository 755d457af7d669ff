//! Data models
//!
//! Shared between loyalty-server and API clients.
//! Timestamps are Unix milliseconds (`i64`), point amounts are whole `i64`.

pub mod membership;
pub mod tier;

// Re-exports
pub use membership::*;
pub use tier::*;
