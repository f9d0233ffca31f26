//! Error types for catalog loading, token resolution and rendering
//!
//! The three families are kept apart so callers can tell "token not found"
//! from "render failed for other reasons".

use thiserror::Error;

/// Errors raised while building a catalog from text or from a snapshot.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("syntax error on line {0}: {1}")]
    Syntax(usize, String),

    #[error("duplicate token '{0}'")]
    DuplicateToken(String),

    #[error("unresolved reference '{0}'")]
    UnresolvedReference(String),

    #[error("reference cycle: {0}")]
    CyclicReference(String),

    #[error("catalog contains no valid entries")]
    Empty,
}

/// Errors raised while mapping a token string to a definition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("invalid token '{token}': {reason}")]
    InvalidToken { token: String, reason: String },

    #[error("unknown token '{0}'")]
    UnknownToken(String),

    #[error("token '{base}' has no variant '{variant}'")]
    UnknownVariant { base: String, variant: String },
}

/// Errors raised while substituting arguments into a resolved definition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("token '{token}' expects {expected} argument(s), got {got}")]
    ArityMismatch {
        token: String,
        expected: usize,
        got: usize,
    },

    #[error("reference depth limit {limit} exceeded while rendering '{token}'")]
    DepthExceeded { token: String, limit: usize },

    #[error("dangling reference '{reference}' in '{token}'")]
    DanglingReference { token: String, reference: String },

    #[error("formatting failed: {0}")]
    Format(String),
}

impl From<std::fmt::Error> for RenderError {
    fn from(e: std::fmt::Error) -> Self {
        RenderError::Format(e.to_string())
    }
}
