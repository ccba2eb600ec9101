use thiserror::Error;

/// Distribution core errors.
///
/// Every variant maps to exactly one HTTP status so callers can short-circuit
/// with the code the failing check chose.
#[derive(Debug, Error)]
pub enum DistributionError {
    /// Missing or malformed input, or a referenced row that does not exist.
    #[error("{0}")]
    Validation(String),

    /// Ownership, approval, eligibility or session-state rejection.
    #[error("{0}")]
    Forbidden(String),

    /// The entity addressed by the request does not exist.
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type DistributionResult<T> = Result<T, DistributionError>;

impl DistributionError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::Forbidden(_) => 403,
            Self::NotFound(_) => 404,
            Self::Conflict(_) => 409,
            Self::Storage(_) | Self::Serialization(_) => 500,
        }
    }

    /// Internal failures are operational concerns; everything else is an
    /// expected, user-facing outcome.
    pub fn is_internal(&self) -> bool {
        self.status_code() >= 500
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(DistributionError::validation("x").status_code(), 400);
        assert_eq!(DistributionError::forbidden("x").status_code(), 403);
        assert_eq!(DistributionError::not_found("x").status_code(), 404);
        assert_eq!(DistributionError::conflict("x").status_code(), 409);
        assert_eq!(DistributionError::storage("x").status_code(), 500);
    }

    #[test]
    fn only_storage_failures_are_internal() {
        assert!(DistributionError::storage("db down").is_internal());
        assert!(DistributionError::Serialization("bad".into()).is_internal());
        assert!(!DistributionError::forbidden("Session is closed").is_internal());
    }
}
