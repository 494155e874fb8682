//! Engine error types.
//!
//! Only input-contract violations, pool exhaustion and collaborator failures
//! reach the caller. Numerical trouble inside the estimator is recovered by the
//! fallback heuristic and never shows up here.

use thiserror::Error;

/// Errors surfaced by the adaptive testing engine.
#[derive(Debug, Error)]
pub enum CatError {
    /// Malformed request: missing identifiers, mismatched lengths, bad alpha.
    #[error("validation error: {0}")]
    Validation(String),

    /// No eligible, unanswered item is left for this assignment.
    #[error("no eligible items left for assignment {assignment_id} (theta {theta:.3})")]
    ExhaustedPool { assignment_id: String, theta: f64 },

    /// A collaborator (item pool, ability store, logs) failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CatError {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        CatError::Validation(msg.into())
    }

    /// Returns `true` if the caller can fix the request and try again.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            CatError::Validation(_) | CatError::ExhaustedPool { .. }
        )
    }
}

/// Errors raised by collaborator implementations.
///
/// Defined in `adaptest-core` so the engine can tell optimistic-lock conflicts
/// apart from hard storage failures without string matching.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store cannot be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The stored ability kept changing under concurrent submissions.
    #[error("ability for {examinee_id}/{course_id} changed concurrently after {attempts} attempts")]
    Conflict {
        examinee_id: String,
        course_id: String,
        attempts: u32,
    },

    /// Filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A persisted record could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_are_classified() {
        assert!(CatError::validation("bad").is_client_error());
        assert!(CatError::ExhaustedPool {
            assignment_id: "a1".into(),
            theta: 0.5,
        }
        .is_client_error());
        assert!(!CatError::from(StoreError::Unavailable("db down".into())).is_client_error());
    }

    #[test]
    fn exhausted_pool_message_rounds_theta() {
        let err = CatError::ExhaustedPool {
            assignment_id: "java".into(),
            theta: 1.23456,
        };
        assert_eq!(
            err.to_string(),
            "no eligible items left for assignment java (theta 1.235)"
        );
    }
}
