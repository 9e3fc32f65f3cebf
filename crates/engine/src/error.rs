//! The module contains the error the engine can throw.
//!
//! Every public engine operation returns [`EngineError`] on failure and
//! leaves the database untouched: writes happen inside a single DB
//! transaction that is rolled back when the error is returned.
//!
//! - [`Unauthorized`] no resolvable tenant context, or the caller's role is
//!   not allowed to perform the operation.
//! - [`KeyNotFound`] the entity does not exist *or* belongs to another tenant.
//! - [`InvalidAmount`] / [`InvalidInput`] malformed input.
//! - [`InvalidTransition`] the loan/alert state machine rejects the change.
//! - [`Database`] the underlying write failed.
//!
//!  [`Unauthorized`]: EngineError::Unauthorized
//!  [`KeyNotFound`]: EngineError::KeyNotFound
//!  [`InvalidAmount`]: EngineError::InvalidAmount
//!  [`InvalidInput`]: EngineError::InvalidInput
//!  [`InvalidTransition`]: EngineError::InvalidTransition
//!  [`Database`]: EngineError::Database
use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("\"{0}\" already present!")]
    ExistingKey(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
    #[error("Invalid id: {0}")]
    InvalidId(String),
    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Unauthorized(a), Self::Unauthorized(b)) => a == b,
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::ExistingKey(a), Self::ExistingKey(b)) => a == b,
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::InvalidInput(a), Self::InvalidInput(b)) => a == b,
            (Self::InvalidTransition(a), Self::InvalidTransition(b)) => a == b,
            (Self::InvalidId(a), Self::InvalidId(b)) => a == b,
            (Self::InvalidCursor(a), Self::InvalidCursor(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
