use thiserror::Error;

/// Canonical error type for load generation and workload execution.
#[derive(Debug, Error)]
pub enum SurgeError {
    /// Opening a fresh database connection failed.
    #[error("connect: {0}")]
    Connect(#[source] sqlx::Error),

    /// A query against a live connection failed.
    #[error("query: {0}")]
    Query(#[from] sqlx::Error),

    /// Table introspection could not complete.
    #[error("introspection failed: {message}")]
    Introspection {
        /// Human-readable explanation of what discovery step failed.
        message: String,
    },

    /// A scenario was used in a state it cannot serve from.
    #[error("scenario error: {message}")]
    Scenario {
        /// Human-readable explanation of the invalid scenario state.
        message: String,
    },

    /// Configuration is out of range or inconsistent.
    #[error("invalid config: {message}")]
    Config {
        /// Human-readable validation message.
        message: String,
    },

    /// Unexpected internal error.
    #[error("internal error: {message}")]
    Internal {
        /// Human-readable details for debugging purposes.
        message: String,
    },
}

impl SurgeError {
    /// Creates an `Introspection` variant.
    #[must_use]
    pub fn introspection(message: impl Into<String>) -> Self {
        Self::Introspection {
            message: message.into(),
        }
    }

    /// Creates a `Scenario` variant.
    #[must_use]
    pub fn scenario(message: impl Into<String>) -> Self {
        Self::Scenario {
            message: message.into(),
        }
    }

    /// Creates a `Config` variant.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an `Internal` variant.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// Convenient result alias for load-generator operations.
pub type SurgeResult<T> = Result<T, SurgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_message() {
        let err = SurgeError::introspection("table public.missing has no columns");
        assert_eq!(
            err.to_string(),
            "introspection failed: table public.missing has no columns"
        );

        let err = SurgeError::scenario("no insertable columns");
        assert!(err.to_string().contains("no insertable columns"));
    }
}
