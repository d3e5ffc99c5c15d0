// for error definitions
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    /// Returned when a rate limit policy rejected the request
    #[error("Too Many Requests")]
    RateLimitExceeded { retry_after: u64 },

    /// The addressed record does not exist for the caller
    #[error("{0}")]
    NotFound(String),

    /// Request arguments are outside the accepted range
    #[error("{0}")]
    Validation(String),

    /// Errors related to the storage collaborator
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unexpected or internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Storage-specific errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Two rows of one owner would share an order value
    #[error("duplicate order {order} for owner {owner}")]
    UniqueViolation { owner: String, order: i64 },

    /// Update addressed a row that is not part of the owner's set
    #[error("row {id} not found for owner {owner}")]
    RowNotFound { id: i64, owner: String },

    /// The owner's lock could not be acquired in time
    #[error("timed out waiting for lock on owner {0}")]
    LockTimeout(String),

    /// A transaction was used for an owner it was not opened for
    #[error("transaction opened for owner {expected}, used for {actual}")]
    OwnerMismatch { expected: String, actual: String },

    /// Owner already holds the maximum number of rows
    #[error("owner {0} reached the maximum number of rows")]
    CapacityExceeded(String),

    /// Failure reported by an external backend
    #[error("backend failure: {0}")]
    Backend(String),
}

impl CoreError {
    /// HTTP status the boundary should answer with
    pub fn status_code(&self) -> u16 {
        match self {
            CoreError::RateLimitExceeded { .. } => 429,
            CoreError::NotFound(_) => 404,
            CoreError::Validation(_) => 422,
            CoreError::Storage(_) | CoreError::Config(_) | CoreError::Internal(_) => 500,
        }
    }

    /// Machine readable error code used in the JSON envelope
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::RateLimitExceeded { .. } => "rate_limited",
            CoreError::NotFound(_) => "not_found",
            CoreError::Validation(_) => "validation_error",
            CoreError::Storage(_) | CoreError::Config(_) | CoreError::Internal(_) => {
                "internal_error"
            }
        }
    }

    /// Renders `{"error": {"code": ..., "message": ...}}`.
    ///
    /// Server-side failures never leak their details to the client.
    pub fn to_body(&self) -> Value {
        let message = match self {
            CoreError::Storage(_) | CoreError::Config(_) | CoreError::Internal(_) => {
                "Internal Server Error".to_string()
            }
            other => other.to_string(),
        };

        json!({ "error": { "code": self.code(), "message": message } })
    }
}

// JSON only shows up when loading policy files
impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Config(err.to_string())
    }
}

// define a Result type alias for convenience
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_and_code_mapping() {
        let cases = [
            (CoreError::RateLimitExceeded { retry_after: 3 }, 429, "rate_limited"),
            (CoreError::NotFound("x".into()), 404, "not_found"),
            (CoreError::Validation("x".into()), 422, "validation_error"),
            (
                CoreError::Storage(StorageError::LockTimeout("alice".into())),
                500,
                "internal_error",
            ),
            (CoreError::Internal("boom".into()), 500, "internal_error"),
        ];

        for (err, status, code) in cases {
            assert_eq!(err.status_code(), status, "status for {:?}", err);
            assert_eq!(err.code(), code, "code for {:?}", err);
        }
    }

    #[test]
    fn test_body_hides_storage_details() {
        let err = CoreError::Storage(StorageError::Backend("connection reset".into()));
        let body = err.to_body();

        assert_eq!(body["error"]["code"], "internal_error");
        assert_eq!(body["error"]["message"], "Internal Server Error");
    }

    #[test]
    fn test_body_for_rate_limit() {
        let body = CoreError::RateLimitExceeded { retry_after: 1 }.to_body();
        assert_eq!(
            body,
            json!({"error": {"code": "rate_limited", "message": "Too Many Requests"}})
        );
    }

    #[test]
    fn test_json_error_becomes_config_error() {
        let err: CoreError = serde_json::from_str::<u64>("not json").unwrap_err().into();
        assert!(matches!(err, CoreError::Config(_)));
    }
}
