//! Service errors
//!
//! Every failure of a book, note, sync or session operation. The HTTP layer
//! maps each variant to one status code.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    /// Missing, unknown or expired session key
    #[error("unauthorized")]
    Unauthorized,

    /// Login with a wrong email or password
    #[error("invalid email or password")]
    InvalidCredentials,

    /// Target is absent or belongs to another user
    #[error("{0} not found")]
    NotFound(String),

    /// A live book with this name already exists
    #[error("{0}")]
    Conflict(String),

    /// Malformed payload or rule violation
    #[error("{0}")]
    Validation(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(
            ServiceError::NotFound("book".into()).to_string(),
            "book not found"
        );
        assert_eq!(ServiceError::Unauthorized.to_string(), "unauthorized");
    }
}
