//! Error types for request descriptor construction.

use thiserror::Error;

/// Errors raised while folding constraints into a request descriptor.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueryError {
    /// A constraint has none of the shapes a descriptor can express.
    #[error(
        "unsupported constraint kind '{type_name}': it is not a time interval, range or value\n  Suggestion: remove it from the query or use a client that understands it"
    )]
    UnsupportedConstraintKind {
        /// Declared type name of the rejected constraint.
        type_name: String,
    },
}

impl QueryError {
    /// Creates an `UnsupportedConstraintKind` error.
    #[must_use]
    pub fn unsupported(type_name: &str) -> Self {
        Self::UnsupportedConstraintKind {
            type_name: type_name.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_message_names_type() {
        let msg = QueryError::unsupported("Extent").to_string();
        assert!(msg.contains("Extent"), "should contain type name: {msg}");
        assert!(msg.contains("Suggestion"), "should have suggestion: {msg}");
    }
}
