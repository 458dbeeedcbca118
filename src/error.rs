use thiserror::Error;

/// Result alias for `cohort`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by the segmentation pipeline.
///
/// Degenerate inputs (all users identical) and per-occurrence numeric
/// instability are not errors: they are neutralized to 0 and flagged on
/// [`crate::metrics::QualityMetrics`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Input was empty.
    #[error("empty input provided")]
    EmptyInput,

    /// Not enough users to form a segmentation.
    #[error("insufficient data: {n_users} users, at least {required} required")]
    InsufficientData {
        /// Users supplied.
        n_users: usize,
        /// Minimum needed.
        required: usize,
    },

    /// Row or vector length mismatch.
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch {
        /// Expected dimension.
        expected: usize,
        /// Found dimension.
        found: usize,
    },

    /// A feature matrix cell was NaN or infinite.
    #[error("non-finite feature value at row {row}, column {col}")]
    NonFiniteValue {
        /// Row (user) index.
        row: usize,
        /// Column (feature) index.
        col: usize,
    },

    /// A pairwise distance was NaN or infinite.
    #[error("non-finite distance between points {i} and {j}")]
    NonFiniteDistance {
        /// First point.
        i: usize,
        /// Second point.
        j: usize,
    },

    /// Population exceeds the configured sizing ceiling.
    #[error("{n_users} users exceeds the configured ceiling of {max_users}")]
    TooManyUsers {
        /// Users supplied.
        n_users: usize,
        /// Configured ceiling.
        max_users: usize,
    },

    /// A name could not be parsed into a known objective, linkage or metric.
    #[error("unknown {kind} '{name}'")]
    UnknownName {
        /// What was being parsed.
        kind: &'static str,
        /// The offending name.
        name: String,
    },

    /// Invalid parameter value.
    #[error("invalid parameter '{name}': {message}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Error message.
        message: String,
    },

    /// Every configuration, including the baseline, failed.
    #[error("no usable configuration among {attempted} attempted")]
    ConfigurationExhausted {
        /// Configurations attempted.
        attempted: usize,
    },

    /// Configuration could not be decoded.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn invalid_parameter(name: &'static str, message: impl Into<String>) -> Self {
        Error::InvalidParameter {
            name,
            message: message.into(),
        }
    }

    pub(crate) fn unknown(kind: &'static str, name: impl Into<String>) -> Self {
        Error::UnknownName {
            kind,
            name: name.into(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_context() {
        let e = Error::InsufficientData {
            n_users: 1,
            required: 2,
        };
        assert_eq!(
            e.to_string(),
            "insufficient data: 1 users, at least 2 required"
        );

        let e = Error::unknown("linkage", "median");
        assert!(e.to_string().contains("median"));
    }
}
