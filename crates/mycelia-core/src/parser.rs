//! Catalog source parser
//!
//! Line grammar, one entry per physical line:
//!
//! ```text
//! # comment
//! @meta locale = de-DE
//! style_card(Card): border: 1px solid %0; background-color: %1; @style_shadow
//! style_card{hover}: transform: translateY(-4px)
//! tpl_page(Page): <style>body{margin:0}</style><main>@tpl_grid %0</main>
//! ```
//!
//! The parser never builds a catalog; it reports every malformed line so the
//! store can decide (strict: abort, lenient: skip) what to do with them.

use nom::{
    branch::alt,
    bytes::complete::{is_not, tag, take_while},
    character::complete::{anychar, char, digit1, space0, space1},
    combinator::{all_consuming, cut, map, opt, rest, verify},
    error::{
        context, ContextError, ErrorKind, ParseError as NomParseError, VerboseError,
        VerboseErrorKind,
    },
    multi::many0,
    sequence::{delimited, preceded},
    IResult,
};

use crate::catalog::CatalogMeta;
use crate::definition::{Body, Declaration, Segment};
use crate::error::CatalogError;
use crate::token::{token_ref, TokenKind, TokenRef};

const STYLE_OPEN: &str = "<style";
const STYLE_CLOSE: &str = "</style>";

/// Highest accepted placeholder index (`%65535`).
pub const MAX_PLACEHOLDER_INDEX: usize = u16::MAX as usize;

// ============================================================================
// Public API
// ============================================================================

/// One well-formed entry line.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedEntry {
    /// 1-based source line
    pub line: usize,
    pub token: TokenRef,
    pub label: Option<String>,
    pub body: Body,
}

/// Result of parsing a catalog source: everything that parsed, plus one
/// `CatalogError::Syntax` per rejected line, in source order.
#[derive(Debug, Clone, Default)]
pub struct ParsedCatalog {
    pub meta: CatalogMeta,
    pub entries: Vec<ParsedEntry>,
    pub errors: Vec<CatalogError>,
}

/// Parse a complete catalog source.
pub fn parse_catalog(source: &str) -> ParsedCatalog {
    let source = source.strip_prefix('\u{feff}').unwrap_or(source);
    let mut parsed = ParsedCatalog::default();
    let mut in_header = true;

    for (idx, raw) in source.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if line.starts_with("@meta") {
            if !in_header {
                parsed.errors.push(CatalogError::Syntax(
                    line_no,
                    "@meta is only allowed before the first entry".to_string(),
                ));
                continue;
            }
            match parse_meta_line(line) {
                Ok((key, value)) => {
                    if let Err(reason) = parsed.meta.set(key, value) {
                        parsed.errors.push(CatalogError::Syntax(line_no, reason));
                    }
                }
                Err(reason) => parsed.errors.push(CatalogError::Syntax(line_no, reason)),
            }
            continue;
        }

        in_header = false;
        match parse_entry_line(line) {
            Ok((token, label, body)) => parsed.entries.push(ParsedEntry {
                line: line_no,
                token,
                label,
                body,
            }),
            Err(reason) => parsed.errors.push(CatalogError::Syntax(line_no, reason)),
        }
    }

    parsed
}

/// Parse a segment sequence (`text %0 %1[default] @style_x @@`).
///
/// Fails only on a placeholder index above [`MAX_PLACEHOLDER_INDEX`].
pub fn parse_segments(input: &str) -> Result<Vec<Segment>, String> {
    match all_consuming(many0(segment::<VerboseError<&str>>))(input) {
        Ok((_, segments)) => Ok(merge_text(segments)),
        Err(nom::Err::Failure(_)) => Err(format!(
            "placeholder index exceeds {}",
            MAX_PLACEHOLDER_INDEX
        )),
        // Every alternative of `segment` consumes input, so this only
        // happens on an internal grammar bug; keep the text verbatim.
        Err(_) => Ok(vec![Segment::Text(input.to_string())]),
    }
}

/// Resolve the minimal escape set (`\n \t \r \\ \:`). Any other escaped
/// character stands for itself.
pub fn unescape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

// ============================================================================
// Line Parsers
// ============================================================================

fn parse_meta_line(line: &str) -> Result<(&str, String), String> {
    match all_consuming(meta_line::<VerboseError<&str>>)(line) {
        Ok((_, (key, value))) => Ok((key, value.trim().to_string())),
        Err(e) => Err(describe_error(line, e)),
    }
}

fn parse_entry_line(line: &str) -> Result<(TokenRef, Option<String>, Body), String> {
    let (body_src, (token, label)) = match entry_header::<VerboseError<&str>>(line) {
        Ok(ok) => ok,
        Err(e) => return Err(describe_error(line, e)),
    };
    let body_src = unescape(body_src.trim());
    let body = match token.kind() {
        TokenKind::Style => Body::Style(parse_declarations(&body_src)?),
        TokenKind::Template | TokenKind::Text => parse_template_body(&body_src)?,
    };
    Ok((token, label, body))
}

fn meta_line<'a, E: NomParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, (&'a str, &'a str), E> {
    let (input, _) = tag("@meta")(input)?;
    let (input, _) = space1(input)?;
    let (input, key) = cut(context(
        "meta key (locale, fallback, note, plural)",
        alt((tag("locale"), tag("fallback"), tag("note"), tag("plural"))),
    ))(input)?;
    let (input, _) = space0(input)?;
    let (input, _) = cut(context("'='", char('=')))(input)?;
    let (input, value) = cut(context(
        "meta value",
        verify(rest, |v: &str| !v.trim().is_empty()),
    ))(input)?;
    Ok((input, (key, value)))
}

/// `token{variant}? (label)? :` - returns the unparsed body as remaining input.
fn entry_header<'a, E: NomParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, (TokenRef, Option<String>), E> {
    let (input, token) = context("token", token_ref)(input)?;
    let (input, _) = space0(input)?;
    let (input, label) = opt(delimited(
        char('('),
        take_while(|c| c != ')'),
        cut(context("closing ')' of label", char(')'))),
    ))(input)?;
    let (input, _) = space0(input)?;
    let (input, _) = cut(context("':' after token", char(':')))(input)?;
    let label = label
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string);
    Ok((input, (token, label)))
}

/// Reduce a nom error to a one-line reason for `CatalogError::Syntax`.
fn describe_error(line: &str, e: nom::Err<VerboseError<&str>>) -> String {
    let err = match e {
        nom::Err::Error(e) | nom::Err::Failure(e) => e,
        nom::Err::Incomplete(_) => return "incomplete input".to_string(),
    };
    let context = err.errors.iter().find_map(|(rest, kind)| match kind {
        VerboseErrorKind::Context(ctx) => Some((*rest, *ctx)),
        _ => None,
    });
    match context {
        Some((rest, ctx)) => {
            let col = line.len() - rest.len() + 1;
            format!("expected {} at column {}", ctx, col)
        }
        None => nom::error::convert_error(line, err)
            .lines()
            .next()
            .unwrap_or("malformed line")
            .trim()
            .to_string(),
    }
}

// ============================================================================
// Style Bodies
// ============================================================================

fn parse_declarations(body: &str) -> Result<Vec<Declaration>, String> {
    let mut decls = Vec::new();
    for item in split_items(body) {
        let item = item.trim();
        if item.is_empty() {
            continue;
        }
        if let Some(target) = item.strip_prefix('@').filter(|_| !item.starts_with("@@")) {
            let token = all_consuming(token_ref::<VerboseError<&str>>)(target)
                .map(|(_, t)| t)
                .map_err(|_| format!("invalid include '{}'", item))?;
            if token.kind() != TokenKind::Style {
                return Err(format!("include '{}' is not a style token", item));
            }
            decls.push(Declaration::Include(token));
            continue;
        }
        let (name, value) = item
            .split_once(':')
            .ok_or_else(|| format!("expected 'name: value' or '@token', found '{}'", item))?;
        let name = name.trim();
        if name.is_empty() || !name.chars().all(is_property_char) {
            return Err(format!("invalid property name '{}'", name));
        }
        decls.push(Declaration::Property {
            name: name.to_ascii_lowercase(),
            value: parse_segments(value.trim())?,
        });
    }
    Ok(decls)
}

fn is_property_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

/// Split on `;` outside quotes and parentheses.
fn split_items(body: &str) -> Vec<&str> {
    let mut items = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in body.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"') | (None, '\'') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ';') if depth == 0 => {
                items.push(&body[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    items.push(&body[start..]);
    items
}

// ============================================================================
// Template Bodies
// ============================================================================

/// Lift `<style>...</style>` blocks out of a template body.
fn parse_template_body(body: &str) -> Result<Body, String> {
    let mut style_blocks = Vec::new();
    let mut markup = String::new();
    let mut rest = body;

    while let Some(open) = find_style_open(rest) {
        let close = rest[open..]
            .find(STYLE_CLOSE)
            .map(|i| open + i + STYLE_CLOSE.len())
            .ok_or_else(|| "unterminated <style> block".to_string())?;
        markup.push_str(&rest[..open]);
        style_blocks.push(parse_segments(&rest[open..close])?);
        rest = &rest[close..];
    }
    markup.push_str(rest);

    Ok(Body::Template {
        style_blocks,
        markup: parse_segments(markup.trim())?,
    })
}

/// Byte offset of the next `<style>` / `<style attr...>` opening tag.
fn find_style_open(input: &str) -> Option<usize> {
    let mut from = 0;
    while let Some(i) = input[from..].find(STYLE_OPEN) {
        let at = from + i;
        match input[at + STYLE_OPEN.len()..].chars().next() {
            Some('>') | Some(' ') | Some('\t') => return Some(at),
            _ => from = at + STYLE_OPEN.len(),
        }
    }
    None
}

// ============================================================================
// Segments
// ============================================================================

fn segment<'a, E: NomParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, Segment, E> {
    alt((
        map(tag("@@"), |_| Segment::Text("@".to_string())),
        map(preceded(char('@'), referable_token), Segment::Reference),
        placeholder,
        map(is_not("@%"), |s: &str| Segment::Text(s.to_string())),
        // A lone '@' or '%' that starts nothing above is literal (`@media`, `100%`)
        map(anychar, |c| Segment::Text(c.to_string())),
    ))(input)
}

fn referable_token<'a, E: NomParseError<&'a str> + ContextError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, TokenRef, E> {
    verify(token_ref, |t: &TokenRef| t.kind().is_referable())(input)
}

fn placeholder<'a, E: NomParseError<&'a str>>(input: &'a str) -> IResult<&'a str, Segment, E> {
    let (after, digits) = preceded(char('%'), digit1)(input)?;
    // Past this point the input is a placeholder, so an oversized index is fatal
    let index = digits
        .parse::<usize>()
        .ok()
        .filter(|i| *i <= MAX_PLACEHOLDER_INDEX)
        .ok_or_else(|| nom::Err::Failure(E::from_error_kind(input, ErrorKind::TooLarge)))?;
    let input = after;
    let (input, default) = opt(delimited(
        char('['),
        take_while(|c| c != ']'),
        char(']'),
    ))(input)?;
    Ok((
        input,
        Segment::Placeholder {
            index,
            default: default.map(str::to_string),
        },
    ))
}

fn merge_text(segments: Vec<Segment>) -> Vec<Segment> {
    let mut out: Vec<Segment> = Vec::with_capacity(segments.len());
    for seg in segments {
        match (out.last_mut(), seg) {
            (Some(Segment::Text(prev)), Segment::Text(t)) => prev.push_str(&t),
            (_, seg) => out.push(seg),
        }
    }
    out
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plural::PluralRule;
    use pretty_assertions::assert_eq;

    fn text(s: &str) -> Segment {
        Segment::Text(s.to_string())
    }

    fn ph(index: usize) -> Segment {
        Segment::Placeholder {
            index,
            default: None,
        }
    }

    #[test]
    fn test_parse_style_entry() {
        let parsed =
            parse_catalog("style_card(Card): border: 1px solid %0; background-color: %1");
        assert!(parsed.errors.is_empty());
        let entry = &parsed.entries[0];
        assert_eq!(entry.token.key(), "style_card");
        assert_eq!(entry.label.as_deref(), Some("Card"));
        assert_eq!(
            entry.body,
            Body::Style(vec![
                Declaration::Property {
                    name: "border".into(),
                    value: vec![text("1px solid "), ph(0)],
                },
                Declaration::Property {
                    name: "background-color".into(),
                    value: vec![ph(1)],
                },
            ])
        );
    }

    #[test]
    fn test_parse_variant_and_include() {
        let parsed = parse_catalog("style_card{hover}: @style_lift; transform: translateY(-4px)");
        let entry = &parsed.entries[0];
        assert_eq!(entry.token.variant.as_deref(), Some("hover"));
        match &entry.body {
            Body::Style(decls) => {
                assert_eq!(decls[0], Declaration::Include(TokenRef::new("style_lift")));
            }
            other => panic!("expected style body, got {:?}", other),
        }
    }

    #[test]
    fn test_semicolons_inside_parens_and_quotes_do_not_split() {
        let items = split_items("background: url('a;b'); box-shadow: 0 1px rgba(0,0,0;0.5)");
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn test_property_names_are_lowercased() {
        let parsed = parse_catalog("style_x: Background-Color: red");
        match &parsed.entries[0].body {
            Body::Style(decls) => match &decls[0] {
                Declaration::Property { name, .. } => assert_eq!(name, "background-color"),
                other => panic!("unexpected {:?}", other),
            },
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_template_style_blocks_are_lifted() {
        let parsed =
            parse_catalog("tpl_page: <main>%0</main><style>.a{color:red}</style><footer/>");
        match &parsed.entries[0].body {
            Body::Template {
                style_blocks,
                markup,
            } => {
                assert_eq!(style_blocks, &vec![vec![text("<style>.a{color:red}</style>")]]);
                assert_eq!(markup, &vec![text("<main>"), ph(0), text("</main><footer/>")]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unterminated_style_block_is_syntax_error() {
        let parsed = parse_catalog("tpl_bad: <style>.a{}");
        assert!(parsed.entries.is_empty());
        assert!(matches!(parsed.errors[0], CatalogError::Syntax(1, _)));
    }

    #[test]
    fn test_segments_literals_and_references() {
        let segs =
            parse_segments("@media (x) { width: 100%; } @@ @style_card{hover} %2[1.5]").unwrap();
        assert_eq!(
            segs,
            vec![
                text("@media (x) { width: 100%; } @ "),
                Segment::Reference(TokenRef::with_variant("style_card", "hover")),
                text(" "),
                Segment::Placeholder {
                    index: 2,
                    default: Some("1.5".into()),
                },
            ]
        );
    }

    #[test]
    fn test_placeholder_index_limit() {
        assert_eq!(parse_segments("%65535").unwrap(), vec![ph(MAX_PLACEHOLDER_INDEX)]);
        assert!(parse_segments("%65536").is_err());
        assert!(parse_segments("<b>%18446744073709551615</b>").is_err());
        assert!(parse_segments("%99999999999999999999999").is_err());

        let parsed = parse_catalog(
            "tpl_ok: <b>%1</b>\ntpl_x: <b>%18446744073709551615</b>\nstyle_y: width: %70000px",
        );
        assert_eq!(parsed.entries.len(), 1);
        assert!(matches!(parsed.errors[0], CatalogError::Syntax(2, _)));
        assert!(matches!(parsed.errors[1], CatalogError::Syntax(3, _)));
    }

    #[test]
    fn test_meta_lines() {
        let parsed =
            parse_catalog("\u{feff}@meta locale = de-DE\r\n@meta note = demo\r\ntpl_x: hi");
        assert!(parsed.errors.is_empty());
        assert_eq!(parsed.meta.locale.as_deref(), Some("de-DE"));
        assert_eq!(parsed.meta.note.as_deref(), Some("demo"));
        assert_eq!(parsed.entries.len(), 1);
    }

    #[test]
    fn test_meta_plural_rule() {
        let parsed = parse_catalog("@meta plural = Slavic\ntpl_x: hi");
        assert!(parsed.errors.is_empty());
        assert_eq!(parsed.meta.plural, PluralRule::Slavic);
    }

    #[test]
    fn test_bad_meta_lines_are_rejected() {
        let parsed = parse_catalog(
            "@meta plural = one\n@meta mood = calm\ntpl_x: hi\n@meta locale = en",
        );
        assert_eq!(parsed.errors.len(), 3);
        assert!(matches!(parsed.errors[0], CatalogError::Syntax(1, _)));
        assert!(matches!(parsed.errors[1], CatalogError::Syntax(2, _)));
        assert!(matches!(parsed.errors[2], CatalogError::Syntax(4, _)));
        assert_eq!(parsed.meta.plural, PluralRule::Default);
    }

    #[test]
    fn test_malformed_lines_are_reported_with_line_numbers() {
        let parsed =
            parse_catalog("# header\n\nstyle_ok: color: red\nno colon here\nstyle_x: nonsense");
        assert_eq!(parsed.entries.len(), 1);
        let lines: Vec<usize> = parsed
            .errors
            .iter()
            .map(|e| match e {
                CatalogError::Syntax(line, _) => *line,
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert_eq!(lines, vec![4, 5]);
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape(r"a\nb\:c\\d\q"), "a\nb:c\\dq");
    }
}
