//! Application-wide error taxonomy.
//!
//! Every domain error in the workspace reports one of these kinds so callers
//! can react to the category of a failure without matching on each variant.

use serde::Serialize;

/// Category of a failed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed input: negative quantity, two-sided amount, mismatched ledger.
    Validation,
    /// Operation illegal for the current status of the target.
    State,
    /// Would violate a durable invariant (unbalanced entry, closed period, ...).
    Constraint,
    /// Not enough stock, or not enough once reservations are subtracted.
    Resource,
    /// Referenced entity does not exist.
    NotFound,
    /// Internal consistency check failed after validation passed.
    ///
    /// Always fatal: the surrounding transaction must be rolled back.
    InvariantViolation,
    /// The storage layer failed.
    Storage,
}

impl ErrorKind {
    /// Returns the stable code for this kind.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Validation => "VALIDATION_ERROR",
            Self::State => "STATE_ERROR",
            Self::Constraint => "CONSTRAINT_ERROR",
            Self::Resource => "RESOURCE_ERROR",
            Self::NotFound => "NOT_FOUND",
            Self::InvariantViolation => "INVARIANT_VIOLATION",
            Self::Storage => "STORAGE_ERROR",
        }
    }

    /// Returns true if the failure must be surfaced loudly.
    #[must_use]
    pub const fn is_fatal(self) -> bool {
        matches!(self, Self::InvariantViolation)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// SQLSTATE raised when a serializable transaction loses a conflict.
pub const SERIALIZATION_FAILURE: &str = "40001";
/// SQLSTATE raised when the server breaks a deadlock.
pub const DEADLOCK_DETECTED: &str = "40P01";

/// A failed storage call, with the SQLSTATE when the server reported one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageFailure {
    /// Rendered driver error.
    pub message: String,
    /// Five-character SQLSTATE code.
    pub sqlstate: Option<String>,
}

impl StorageFailure {
    /// Creates a failure from a message and an optional SQLSTATE.
    pub fn new(message: impl Into<String>, sqlstate: Option<String>) -> Self {
        Self {
            message: message.into(),
            sqlstate,
        }
    }

    /// Returns true for serialization failures and deadlocks, where running
    /// the whole transaction again may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.sqlstate.as_deref(),
            Some(SERIALIZATION_FAILURE | DEADLOCK_DETECTED)
        )
    }
}

impl std::fmt::Display for StorageFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.sqlstate {
            Some(code) => write!(f, "{} (SQLSTATE {code})", self.message),
            None => f.write_str(&self.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_codes() {
        assert_eq!(ErrorKind::Validation.code(), "VALIDATION_ERROR");
        assert_eq!(ErrorKind::State.code(), "STATE_ERROR");
        assert_eq!(ErrorKind::Constraint.code(), "CONSTRAINT_ERROR");
        assert_eq!(ErrorKind::Resource.code(), "RESOURCE_ERROR");
        assert_eq!(ErrorKind::NotFound.code(), "NOT_FOUND");
        assert_eq!(
            ErrorKind::InvariantViolation.code(),
            "INVARIANT_VIOLATION"
        );
        assert_eq!(ErrorKind::Storage.code(), "STORAGE_ERROR");
    }

    #[test]
    fn test_only_invariant_violation_is_fatal() {
        assert!(ErrorKind::InvariantViolation.is_fatal());
        assert!(!ErrorKind::Resource.is_fatal());
        assert!(!ErrorKind::Storage.is_fatal());
    }

    #[test]
    fn test_error_kind_display() {
        assert_eq!(ErrorKind::Constraint.to_string(), "CONSTRAINT_ERROR");
    }

    #[test]
    fn test_retryable_by_sqlstate() {
        let serialization = StorageFailure::new(
            "could not serialize access",
            Some(SERIALIZATION_FAILURE.to_string()),
        );
        let deadlock = StorageFailure::new("deadlock", Some(DEADLOCK_DETECTED.to_string()));
        let unique = StorageFailure::new("duplicate key", Some("23505".to_string()));
        // The message alone never makes a failure retryable.
        let bare = StorageFailure::new("deadlock detected", None);

        assert!(serialization.is_retryable());
        assert!(deadlock.is_retryable());
        assert!(!unique.is_retryable());
        assert!(!bare.is_retryable());
    }

    #[test]
    fn test_storage_failure_display() {
        let failure = StorageFailure::new("deadlock", Some(DEADLOCK_DETECTED.to_string()));
        assert_eq!(failure.to_string(), "deadlock (SQLSTATE 40P01)");
        assert_eq!(StorageFailure::new("closed", None).to_string(), "closed");
    }
}
