use thiserror::Error;

use crate::auth::validation::ValidationError;

pub type AuthResult<T> = Result<T, AuthError>;

/// Outcomes of account operations that callers are expected to handle.
///
/// `NotFound` and `InvalidCredential` are kept apart here so the lockout
/// logic and logs can tell them apart; the HTTP layer folds both into one
/// generic response.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("account already exists")]
    Conflict,

    #[error("account not found")]
    NotFound,

    #[error("account locked")]
    Locked,

    #[error("invalid credentials ({attempts_remaining} attempts remaining)")]
    InvalidCredential { attempts_remaining: u32 },

    #[error(transparent)]
    Infrastructure(#[from] anyhow::Error),
}
