//! Shared types for the loyalty ledger
//!
//! Domain models (memberships, tiers, activity records), the unified error
//! system used at the HTTP boundary, and small utility helpers.

pub mod error;
pub mod models;
pub mod util;

// Re-exports
pub use axum::Json;
pub use http;
pub use serde::{Deserialize, Serialize};
