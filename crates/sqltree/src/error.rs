//! Error types for sqltree

use crate::statement::StatementKind;
use thiserror::Error;

/// Result type alias for sqltree operations
pub type OrmResult<T> = Result<T, OrmError>;

/// Error types for query building and execution
#[derive(Debug, Error)]
pub enum OrmError {
    /// Two statements of different kinds were joined
    #[error("Statement kind mismatch: cannot join {left:?} with {right:?}")]
    KindMismatch {
        left: StatementKind,
        right: StatementKind,
    },

    /// Node tree misuse (wrong child kind, missing table, placeholder drift)
    #[error("Structural error: {0}")]
    Structural(String),

    /// Filter key with an operator suffix that is not in the grammar
    #[error("Unknown filter operator '{0}'")]
    UnknownFilterOperator(String),

    /// Malformed filter operand (e.g. `between` without exactly two values)
    #[error("Filter grammar error: {0}")]
    Grammar(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// The backend rejected the statement
    #[error("Backend error: {0}")]
    Backend(String),

    /// SQLite backend error
    #[cfg(feature = "sqlite")]
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A lazy relation could not be resolved for a row
    #[error("Relation '{relation}' cannot be resolved: {message}")]
    RelationResolution { relation: String, message: String },

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Cache store error
    #[error("Cache error: {0}")]
    Cache(String),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl OrmError {
    /// Create a structural error
    pub fn structural(message: impl Into<String>) -> Self {
        Self::Structural(message.into())
    }

    /// Create a grammar error
    pub fn grammar(message: impl Into<String>) -> Self {
        Self::Grammar(message.into())
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a backend error
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }

    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a relation resolution error
    pub fn relation(relation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RelationResolution {
            relation: relation.into(),
            message: message.into(),
        }
    }

    /// Check if this is a structural error (kind mismatch included)
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::Structural(_) | Self::KindMismatch { .. })
    }

    /// Check if this is a filter grammar error
    pub fn is_grammar(&self) -> bool {
        matches!(self, Self::Grammar(_) | Self::UnknownFilterOperator(_))
    }

    /// Check if this is a validation error
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Check if the backend rejected the statement
    pub fn is_backend(&self) -> bool {
        #[cfg(feature = "sqlite")]
        if matches!(self, Self::Sqlite(_)) {
            return true;
        }
        matches!(self, Self::Backend(_))
    }

    /// Check if this is a relation resolution error
    pub fn is_relation_resolution(&self) -> bool {
        matches!(self, Self::RelationResolution { .. })
    }
}

impl From<serde_json::Error> for OrmError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for OrmError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predicates_classify_variants() {
        let err = OrmError::KindMismatch {
            left: StatementKind::Select,
            right: StatementKind::Insert,
        };
        assert!(err.is_structural());
        assert!(!err.is_grammar());

        assert!(OrmError::UnknownFilterOperator("gte".into()).is_grammar());
        assert!(OrmError::grammar("between needs 2 values").is_grammar());
        assert!(OrmError::backend("syntax error").is_backend());
        assert!(OrmError::relation("posts", "missing key").is_relation_resolution());
    }

    #[test]
    fn messages_name_the_offending_token() {
        let err = OrmError::UnknownFilterOperator("gte".into());
        assert_eq!(err.to_string(), "Unknown filter operator 'gte'");

        let err = OrmError::decode("age", "expected integer");
        assert_eq!(err.to_string(), "Decode error on column 'age': expected integer");
    }
}
