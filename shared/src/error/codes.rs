//! Unified error codes for the loyalty ledger
//!
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 4xxx: Loyalty ledger errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values for efficient serialization
/// and cross-language compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Unknown error
    Unknown = 1,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Resource already exists
    AlreadyExists = 4,
    /// Invalid request
    InvalidRequest = 5,

    // ==================== 4xxx: Loyalty ====================
    /// Point amount must be positive
    InvalidPointsAmount = 4001,
    /// Redemption exceeds the available balance
    InsufficientPoints = 4002,
    /// Membership not found
    MembershipNotFound = 4003,
    /// Membership already exists for this key
    DuplicateMembership = 4004,
    /// Membership has been retired
    MembershipInactive = 4005,
    /// Operation requires a group-scoped membership
    MembershipNotGrouped = 4006,
    /// Tier threshold table is malformed
    InvalidTierConfig = 4007,
    /// Concurrent modification, retries exhausted
    ConcurrencyConflict = 4008,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
    /// Database error
    DatabaseError = 9002,
    /// Configuration error
    ConfigError = 9005,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Check if this is a success code
    #[inline]
    pub const fn is_success(&self) -> bool {
        matches!(self, ErrorCode::Success)
    }

    /// Get the developer-facing English message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::Success => "Success",
            ErrorCode::Unknown => "Unknown error",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::AlreadyExists => "Resource already exists",
            ErrorCode::InvalidRequest => "Invalid request",

            // Loyalty
            ErrorCode::InvalidPointsAmount => "Point amount must be positive",
            ErrorCode::InsufficientPoints => "Insufficient points",
            ErrorCode::MembershipNotFound => "Membership not found",
            ErrorCode::DuplicateMembership => "Membership already exists",
            ErrorCode::MembershipInactive => "Membership is inactive",
            ErrorCode::MembershipNotGrouped => "Membership is not group-scoped",
            ErrorCode::InvalidTierConfig => "Invalid tier configuration",
            ErrorCode::ConcurrencyConflict => "Concurrent modification, please retry",

            // System
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Database error",
            ErrorCode::ConfigError => "Configuration error",
        }
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error returned when converting an unknown u16 into an [`ErrorCode`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            // General
            0 => Ok(ErrorCode::Success),
            1 => Ok(ErrorCode::Unknown),
            2 => Ok(ErrorCode::ValidationFailed),
            3 => Ok(ErrorCode::NotFound),
            4 => Ok(ErrorCode::AlreadyExists),
            5 => Ok(ErrorCode::InvalidRequest),

            // Loyalty
            4001 => Ok(ErrorCode::InvalidPointsAmount),
            4002 => Ok(ErrorCode::InsufficientPoints),
            4003 => Ok(ErrorCode::MembershipNotFound),
            4004 => Ok(ErrorCode::DuplicateMembership),
            4005 => Ok(ErrorCode::MembershipInactive),
            4006 => Ok(ErrorCode::MembershipNotGrouped),
            4007 => Ok(ErrorCode::InvalidTierConfig),
            4008 => Ok(ErrorCode::ConcurrencyConflict),

            // System
            9001 => Ok(ErrorCode::InternalError),
            9002 => Ok(ErrorCode::DatabaseError),
            9005 => Ok(ErrorCode::ConfigError),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
