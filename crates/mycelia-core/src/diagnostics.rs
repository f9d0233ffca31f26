//! Catalog diagnostics
//!
//! Single diagnostic type used by the lenient loader (skipped entries) and by
//! `check` (catalog lint). Spans are line based: the catalog grammar is one
//! entry per physical line.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CatalogError;

/// Diagnostic severity level
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

/// Diagnostic codes for categorizing issues
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticCode {
    // =========================================================================
    // Load errors
    // =========================================================================
    SyntaxError,
    DuplicateToken,
    UnresolvedReference,
    CyclicReference,

    // =========================================================================
    // Lint
    // =========================================================================
    /// `%0` and `%2` used but `%1` never is.
    PlaceholderGap,
    /// Definition with nothing to emit.
    EmptyBody,
}

impl DiagnosticCode {
    pub fn as_str(self) -> &'static str {
        match self {
            DiagnosticCode::SyntaxError => "syntax",
            DiagnosticCode::DuplicateToken => "duplicate-token",
            DiagnosticCode::UnresolvedReference => "unresolved-reference",
            DiagnosticCode::CyclicReference => "cyclic-reference",
            DiagnosticCode::PlaceholderGap => "placeholder-gap",
            DiagnosticCode::EmptyBody => "empty-body",
        }
    }
}

/// Source location: a 1-based line and an optional column range on it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpan {
    pub line: u32,
    pub start_col: u32,
    pub end_col: u32,
}

impl SourceSpan {
    pub fn new(line: u32, start_col: u32, end_col: u32) -> Self {
        Self {
            line,
            start_col,
            end_col,
        }
    }

    /// Whole-line span.
    pub fn line(line: usize) -> Self {
        Self::new(to_u32(line), 1, 1)
    }
}

fn to_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

/// A diagnostic message with severity, code, optional token and location
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: DiagnosticCode,
    pub message: String,
    pub token: Option<String>,
    pub span: Option<SourceSpan>,
}

impl Diagnostic {
    /// Create an error diagnostic
    pub fn error(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::with_severity(Severity::Error, code, message)
    }

    /// Create a warning diagnostic
    pub fn warning(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::with_severity(Severity::Warning, code, message)
    }

    pub fn info(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::with_severity(Severity::Info, code, message)
    }

    fn with_severity(severity: Severity, code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            token: None,
            span: None,
        }
    }

    /// Add source span
    pub fn with_span(mut self, span: SourceSpan) -> Self {
        self.span = Some(span);
        self
    }

    /// Attach the token the diagnostic is about
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn is_error(&self) -> bool {
        matches!(self.severity, Severity::Error)
    }

    pub fn is_warning(&self) -> bool {
        matches!(self.severity, Severity::Warning)
    }

    pub fn line(&self) -> Option<u32> {
        self.span.as_ref().map(|s| s.line)
    }

    /// Diagnostic for a load error that was skipped (lenient) or aborted the load (strict).
    pub fn from_catalog_error(err: &CatalogError, line: Option<usize>) -> Self {
        let (code, token) = match err {
            CatalogError::Syntax(..) => (DiagnosticCode::SyntaxError, None),
            CatalogError::DuplicateToken(t) => (DiagnosticCode::DuplicateToken, Some(t)),
            CatalogError::UnresolvedReference(t) => {
                (DiagnosticCode::UnresolvedReference, Some(t))
            }
            CatalogError::CyclicReference(t) => (DiagnosticCode::CyclicReference, Some(t)),
            CatalogError::Empty => (DiagnosticCode::SyntaxError, None),
        };
        let mut diag = Diagnostic::error(code, err.to_string());
        if let Some(t) = token {
            diag = diag.with_token(t.clone());
        }
        if let Some(l) = line {
            diag = diag.with_span(SourceSpan::line(l));
        }
        diag
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(span) = &self.span {
            write!(f, "line {}: ", span.line)?;
        }
        write!(
            f,
            "{}[{}]: {}",
            self.severity.as_str(),
            self.code.as_str(),
            self.message
        )
    }
}

// =============================================================================
// Convenience Builders
// =============================================================================

/// Warning for a placeholder index that is skipped over
pub fn placeholder_gap_warning(token: &str, missing: usize) -> Diagnostic {
    Diagnostic::warning(
        DiagnosticCode::PlaceholderGap,
        format!("'{}' never uses placeholder %{}", token, missing),
    )
    .with_token(token)
}

/// Info for a definition with nothing to emit
pub fn empty_body_info(token: &str) -> Diagnostic {
    Diagnostic::info(
        DiagnosticCode::EmptyBody,
        format!("'{}' renders to an empty string", token),
    )
    .with_token(token)
}

// =============================================================================
// Tests
// =============================================================================
