//! Error types for nyx.

use thiserror::Error;

use crate::lexer::LexError;

/// The main error type for nyx operations.
#[derive(Debug, Error)]
pub enum NyxError {
    /// One or more unrecognized characters. Every problem of the pass is listed.
    #[error("Lexical error: {}", join_lex(.0))]
    Lex(Vec<LexError>),

    /// The token stream does not match the grammar.
    #[error("Syntax error at line {line}, column {column}: {message} (found {found})")]
    Syntax {
        message: String,
        line: usize,
        column: usize,
        found: String,
    },

    /// Semantic analysis rejected the statement.
    #[error("Semantic error: {}", .0.join("; "))]
    Semantic(Vec<String>),

    /// A statement reached code generation in an invalid state.
    #[error("Generation error: {0}")]
    Generation(String),

    /// Failure reported by the backend executor.
    #[error("Backend error: {0}")]
    Backend(String),

    /// Connection error.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn join_lex(errors: &[LexError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl NyxError {
    /// Create a syntax error at the given source location.
    pub fn syntax(
        message: impl Into<String>,
        line: usize,
        column: usize,
        found: impl Into<String>,
    ) -> Self {
        Self::Syntax {
            message: message.into(),
            line,
            column,
            found: found.into(),
        }
    }

    /// Create a generation error.
    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation(message.into())
    }
}

impl From<sqlx::Error> for NyxError {
    fn from(e: sqlx::Error) -> Self {
        NyxError::Backend(e.to_string())
    }
}

/// Result type alias for nyx operations.
pub type NyxResult<T> = Result<T, NyxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = NyxError::syntax("expected '('", 1, 7, "string literal 'users'");
        assert_eq!(
            err.to_string(),
            "Syntax error at line 1, column 7: expected '(' (found string literal 'users')"
        );
    }

    #[test]
    fn test_semantic_display_joins_messages() {
        let err = NyxError::Semantic(vec!["first".into(), "second".into()]);
        assert_eq!(err.to_string(), "Semantic error: first; second");
    }
}
