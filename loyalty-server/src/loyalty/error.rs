//! Ledger error taxonomy
//!
//! Every failure of a ledger operation is a [`LedgerError`]. None of them is
//! fatal to the process; the HTTP layer maps them onto [`AppError`] codes in
//! the 4xxx range.

use shared::error::{AppError, ErrorCode};
use thiserror::Error;

use crate::db::repository::RepoError;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Invalid points amount: {0}")]
    InvalidAmount(i64),

    #[error("Insufficient points: requested {requested}, available {available}")]
    InsufficientPoints { requested: i64, available: i64 },

    #[error("Membership already exists: {0}")]
    DuplicateMembership(String),

    #[error("Concurrent modification of {key} after {attempts} attempts")]
    ConcurrencyConflict { key: String, attempts: u32 },

    #[error("Invalid tier configuration: {0}")]
    InvalidTierConfig(String),

    #[error("Membership not found: {0}")]
    MembershipNotFound(String),

    #[error("Membership is inactive: {0}")]
    MembershipInactive(String),

    #[error("Membership is not group-scoped: {0}")]
    NotGroupScoped(String),

    #[error(transparent)]
    Repository(#[from] RepoError),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        let message = err.to_string();
        match err {
            LedgerError::InvalidAmount(points) => {
                AppError::with_message(ErrorCode::InvalidPointsAmount, message)
                    .with_detail("points", points)
            }
            LedgerError::InsufficientPoints {
                requested,
                available,
            } => AppError::with_message(ErrorCode::InsufficientPoints, message)
                .with_detail("requested", requested)
                .with_detail("available", available),
            LedgerError::DuplicateMembership(key) => {
                AppError::with_message(ErrorCode::DuplicateMembership, message)
                    .with_detail("key", key)
            }
            LedgerError::ConcurrencyConflict { key, attempts } => {
                AppError::with_message(ErrorCode::ConcurrencyConflict, message)
                    .with_detail("key", key)
                    .with_detail("attempts", attempts)
            }
            LedgerError::InvalidTierConfig(_) => {
                AppError::with_message(ErrorCode::InvalidTierConfig, message)
            }
            LedgerError::MembershipNotFound(key) => {
                AppError::with_message(ErrorCode::MembershipNotFound, message)
                    .with_detail("key", key)
            }
            LedgerError::MembershipInactive(key) => {
                AppError::with_message(ErrorCode::MembershipInactive, message)
                    .with_detail("key", key)
            }
            LedgerError::NotGroupScoped(key) => {
                AppError::with_message(ErrorCode::MembershipNotGrouped, message)
                    .with_detail("key", key)
            }
            LedgerError::Repository(e) => e.into(),
        }
    }
}
