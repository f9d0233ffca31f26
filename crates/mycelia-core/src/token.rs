//! Token model
//!
//! A token addresses a style rule, a template or a plain text fragment. An
//! optional variant suffix (`style_card{hover}`) selects an alternate rendering
//! declared next to its base token.

use std::fmt;

use nom::{
    bytes::complete::{take_while1, take_while_m_n},
    character::complete::char,
    combinator::{all_consuming, opt, recognize, verify},
    error::{ContextError, ParseError as NomParseError},
    sequence::{delimited, pair},
    IResult,
};
use serde::{Deserialize, Serialize};

use crate::error::ResolveError;

/// Prefix of style rule tokens.
pub const STYLE_PREFIX: &str = "style_";

/// Prefix of template tokens.
pub const TEMPLATE_PREFIX: &str = "tpl_";

/// Maximum byte length of a base token.
pub const MAX_TOKEN_LEN: usize = 64;

/// Maximum byte length of a variant name.
pub const MAX_VARIANT_LEN: usize = 16;

/// Classification derived from the token prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenKind {
    /// `style_*` - body is a declaration list.
    Style,
    /// `tpl_*` - body is markup with optional `<style>` blocks.
    Template,
    /// Any other token - body is a plain markup/text fragment.
    Text,
}

impl TokenKind {
    pub fn of(base: &str) -> Self {
        if base.len() > STYLE_PREFIX.len() && base.starts_with(STYLE_PREFIX) {
            TokenKind::Style
        } else if base.len() > TEMPLATE_PREFIX.len() && base.starts_with(TEMPLATE_PREFIX) {
            TokenKind::Template
        } else {
            TokenKind::Text
        }
    }

    /// Only style and template tokens may be referenced inline with `@token`.
    pub fn is_referable(self) -> bool {
        matches!(self, TokenKind::Style | TokenKind::Template)
    }
}

/// A token with its optional variant suffix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TokenRef {
    pub base: String,
    pub variant: Option<String>,
}

impl TokenRef {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            variant: None,
        }
    }

    pub fn with_variant(base: impl Into<String>, variant: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            variant: Some(variant.into()),
        }
    }

    /// Parse `base` or `base{variant}`. Exact and case-sensitive.
    pub fn parse(input: &str) -> Result<Self, ResolveError> {
        match all_consuming(token_ref::<nom::error::VerboseError<&str>>)(input) {
            Ok((_, token)) => Ok(token),
            Err(_) => Err(ResolveError::InvalidToken {
                token: input.to_string(),
                reason: invalid_reason(input).to_string(),
            }),
        }
    }

    /// Catalog key: `base` or `base{variant}`.
    pub fn key(&self) -> String {
        match &self.variant {
            Some(v) => format!("{}{{{}}}", self.base, v),
            None => self.base.clone(),
        }
    }

    pub fn kind(&self) -> TokenKind {
        TokenKind::of(&self.base)
    }

    pub fn is_variant(&self) -> bool {
        self.variant.is_some()
    }

    /// The base token without its variant.
    pub fn base_ref(&self) -> TokenRef {
        TokenRef::new(self.base.clone())
    }
}

impl fmt::Display for TokenRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.variant {
            Some(v) => write!(f, "{}{{{}}}", self.base, v),
            None => f.write_str(&self.base),
        }
    }
}

fn invalid_reason(input: &str) -> &'static str {
    if input.is_empty() {
        "empty token"
    } else if input.contains('{') {
        "malformed variant suffix"
    } else if input.len() > MAX_TOKEN_LEN {
        "token too long"
    } else {
        "unexpected character"
    }
}

// ============================================================================
// Nom parsers (shared with the catalog and template parsers)
// ============================================================================

pub(crate) fn is_token_start(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

pub(crate) fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

fn is_variant_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-'
}

pub(crate) fn base_token<'a, E: NomParseError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, &'a str, E> {
    verify(
        recognize(pair(
            take_while_m_n(1, 1, is_token_start),
            nom::bytes::complete::take_while(is_token_char),
        )),
        |s: &str| s.len() <= MAX_TOKEN_LEN,
    )(input)
}

pub(crate) fn variant_suffix<'a, E: NomParseError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, &'a str, E> {
    delimited(
        char('{'),
        verify(take_while1(is_variant_char), |s: &str| {
            s.len() <= MAX_VARIANT_LEN
        }),
        char('}'),
    )(input)
}

pub(crate) fn token_ref<'a, E: NomParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, TokenRef, E> {
    let (input, base) = base_token(input)?;
    let (input, variant) = opt(variant_suffix)(input)?;
    Ok((
        input,
        TokenRef {
            base: base.to_string(),
            variant: variant.map(str::to_string),
        },
    ))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_base_token() {
        let t = TokenRef::parse("style_card").unwrap();
        assert_eq!(t.base, "style_card");
        assert!(t.variant.is_none());
        assert_eq!(t.kind(), TokenKind::Style);
        assert_eq!(t.key(), "style_card");
    }

    #[test]
    fn test_parse_variant_token() {
        let t = TokenRef::parse("style_card{hover}").unwrap();
        assert_eq!(t.base, "style_card");
        assert_eq!(t.variant.as_deref(), Some("hover"));
        assert_eq!(t.key(), "style_card{hover}");
        assert_eq!(t.to_string(), "style_card{hover}");
    }

    #[test]
    fn test_kind_by_prefix() {
        assert_eq!(TokenKind::of("tpl_full-page"), TokenKind::Template);
        assert_eq!(TokenKind::of("deadbeef"), TokenKind::Text);
        // Bare prefixes are not style/template tokens
        assert_eq!(TokenKind::of("style_"), TokenKind::Text);
        assert!(!TokenKind::Text.is_referable());
    }

    #[test]
    fn test_tokens_are_case_sensitive() {
        let upper = TokenRef::parse("Style_Card").unwrap();
        assert_eq!(upper.kind(), TokenKind::Text);
        assert_ne!(upper.key(), "style_card");
    }

    #[test]
    fn test_rejects_malformed_tokens() {
        assert!(TokenRef::parse("").is_err());
        assert!(TokenRef::parse("style_card{}").is_err());
        assert!(TokenRef::parse("style_card{Hover}").is_err());
        assert!(TokenRef::parse("style_card{hover").is_err());
        assert!(TokenRef::parse("style card").is_err());
        assert!(TokenRef::parse("style_card{averyveryverylongvariant}").is_err());
        assert!(TokenRef::parse(&"x".repeat(MAX_TOKEN_LEN + 1)).is_err());
    }
}
