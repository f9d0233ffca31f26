//! Parsed definitions bound to tokens
//!
//! A definition is the compiled form of one catalog entry. Both the text parser
//! and the snapshot decoder produce definitions through [`Definition::new`], so
//! derived data (arity, references, physics) is computed identically on both
//! load paths.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::physics::PhysicsSpec;
use crate::token::TokenRef;

/// One piece of a template body or declaration value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Segment {
    /// Literal text, emitted as-is.
    Text(String),
    /// Positional argument `%N`, or `%N[default]` when a default is declared.
    Placeholder { index: usize, default: Option<String> },
    /// Inline reference `@token` / `@token{variant}`.
    Reference(TokenRef),
}

impl Segment {
    pub fn is_required_placeholder(&self) -> bool {
        matches!(self, Segment::Placeholder { default: None, .. })
    }
}

/// One item of a style body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Declaration {
    /// `name: value`
    Property { name: String, value: Vec<Segment> },
    /// `@style_other` - pulls in another definition's declarations.
    Include(TokenRef),
}

/// Definition content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Body {
    /// Declaration list of a `style_*` token.
    Style(Vec<Declaration>),
    /// Markup with its `<style>` blocks lifted out (each block keeps its tags).
    Template {
        style_blocks: Vec<Vec<Segment>>,
        markup: Vec<Segment>,
    },
}

/// What a definition emits when rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Emission {
    Style,
    Markup,
    StyleAndMarkup,
}

impl Emission {
    pub fn as_str(self) -> &'static str {
        match self {
            Emission::Style => "style",
            Emission::Markup => "markup",
            Emission::StyleAndMarkup => "style+markup",
        }
    }
}

/// A token bound to its parsed content.
#[derive(Debug, Clone, PartialEq)]
pub struct Definition {
    pub token: TokenRef,
    pub label: Option<String>,
    pub body: Body,
    physics: Option<PhysicsSpec>,
    arity: usize,
}

impl Definition {
    pub fn new(token: TokenRef, label: Option<String>, body: Body) -> Self {
        let physics = PhysicsSpec::from_body(&body);
        let arity = body_arity(&body);
        Self {
            token,
            label,
            body,
            physics,
            arity,
        }
    }

    /// Catalog key (`base` or `base{variant}`).
    pub fn key(&self) -> String {
        self.token.key()
    }

    /// Number of arguments the definition itself requires.
    ///
    /// Placeholders with a declared default do not count.
    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn physics_spec(&self) -> Option<&PhysicsSpec> {
        self.physics.as_ref()
    }

    pub fn has_physics(&self) -> bool {
        self.physics.is_some()
    }

    pub fn emission(&self) -> Emission {
        match &self.body {
            Body::Style(_) => Emission::Style,
            Body::Template {
                style_blocks,
                markup,
            } => {
                let has_markup = !markup.is_empty();
                match (style_blocks.is_empty(), has_markup) {
                    (false, true) => Emission::StyleAndMarkup,
                    (false, false) => Emission::Style,
                    (true, _) => Emission::Markup,
                }
            }
        }
    }

    /// Every token this definition references (includes and inline refs), sorted.
    pub fn references(&self) -> BTreeSet<TokenRef> {
        let mut refs = BTreeSet::new();
        for segments in self.segment_lists() {
            for seg in segments {
                if let Segment::Reference(t) = seg {
                    refs.insert(t.clone());
                }
            }
        }
        if let Body::Style(decls) = &self.body {
            for decl in decls {
                if let Declaration::Include(t) = decl {
                    refs.insert(t.clone());
                }
            }
        }
        refs
    }

    /// Indices of all placeholders, sorted and deduplicated.
    pub fn placeholder_indices(&self) -> Vec<usize> {
        let mut idxs: BTreeSet<usize> = BTreeSet::new();
        for segments in self.segment_lists() {
            for seg in segments {
                if let Segment::Placeholder { index, .. } = seg {
                    idxs.insert(*index);
                }
            }
        }
        idxs.into_iter().collect()
    }

    /// Concatenated literal text of the body (used by `find`).
    pub fn source_text(&self) -> String {
        let mut out = String::new();
        match &self.body {
            Body::Style(decls) => {
                for decl in decls {
                    match decl {
                        Declaration::Property { name, value } => {
                            out.push_str(name);
                            out.push_str(": ");
                            push_segments_source(&mut out, value);
                            out.push_str("; ");
                        }
                        Declaration::Include(t) => {
                            out.push('@');
                            out.push_str(&t.key());
                            out.push_str("; ");
                        }
                    }
                }
            }
            Body::Template {
                style_blocks,
                markup,
            } => {
                for block in style_blocks {
                    push_segments_source(&mut out, block);
                }
                push_segments_source(&mut out, markup);
            }
        }
        out.trim_end().to_string()
    }

    fn segment_lists(&self) -> Vec<&[Segment]> {
        match &self.body {
            Body::Style(decls) => decls
                .iter()
                .filter_map(|d| match d {
                    Declaration::Property { value, .. } => Some(value.as_slice()),
                    Declaration::Include(_) => None,
                })
                .collect(),
            Body::Template {
                style_blocks,
                markup,
            } => style_blocks
                .iter()
                .map(|b| b.as_slice())
                .chain(std::iter::once(markup.as_slice()))
                .collect(),
        }
    }
}

fn push_segments_source(out: &mut String, segments: &[Segment]) {
    for seg in segments {
        match seg {
            Segment::Text(t) => out.push_str(t),
            Segment::Placeholder { index, default } => {
                out.push('%');
                out.push_str(&index.to_string());
                if let Some(d) = default {
                    out.push('[');
                    out.push_str(d);
                    out.push(']');
                }
            }
            Segment::Reference(t) => {
                out.push('@');
                out.push_str(&t.key());
            }
        }
    }
}

fn body_arity(body: &Body) -> usize {
    let required = |segs: &[Segment]| -> Option<usize> {
        segs.iter()
            .filter_map(|s| match s {
                Segment::Placeholder {
                    index,
                    default: None,
                } => Some(index.saturating_add(1)),
                _ => None,
            })
            .max()
    };

    match body {
        Body::Style(decls) => decls
            .iter()
            .filter_map(|d| match d {
                Declaration::Property { value, .. } => required(value),
                Declaration::Include(_) => None,
            })
            .max()
            .unwrap_or(0),
        Body::Template {
            style_blocks,
            markup,
        } => style_blocks
            .iter()
            .filter_map(|b| required(b))
            .chain(required(markup))
            .max()
            .unwrap_or(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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
    fn test_arity_counts_required_placeholders_only() {
        let def = Definition::new(
            TokenRef::new("style_card"),
            None,
            Body::Style(vec![
                Declaration::Property {
                    name: "border".into(),
                    value: vec![text("1px solid "), ph(0)],
                },
                Declaration::Property {
                    name: "spacing".into(),
                    value: vec![Segment::Placeholder {
                        index: 3,
                        default: Some("1.5".into()),
                    }],
                },
                Declaration::Property {
                    name: "background-color".into(),
                    value: vec![ph(1)],
                },
            ]),
        );
        assert_eq!(def.arity(), 2);
        assert_eq!(def.placeholder_indices(), vec![0, 1, 3]);
    }

    #[test]
    fn test_emission_classification() {
        let markup_only = Definition::new(
            TokenRef::new("tpl_x"),
            None,
            Body::Template {
                style_blocks: vec![],
                markup: vec![text("<div></div>")],
            },
        );
        assert_eq!(markup_only.emission(), Emission::Markup);

        let both = Definition::new(
            TokenRef::new("tpl_y"),
            None,
            Body::Template {
                style_blocks: vec![vec![text("<style>.a{}</style>")]],
                markup: vec![text("<div></div>")],
            },
        );
        assert_eq!(both.emission(), Emission::StyleAndMarkup);
    }

    #[test]
    fn test_references_collects_includes_and_inline_refs() {
        let def = Definition::new(
            TokenRef::new("style_cube-bounce"),
            None,
            Body::Style(vec![
                Declaration::Include(TokenRef::new("style_cube")),
                Declaration::Property {
                    name: "outline".into(),
                    value: vec![Segment::Reference(TokenRef::new("style_ring"))],
                },
            ]),
        );
        let refs: Vec<String> = def.references().iter().map(|t| t.key()).collect();
        assert_eq!(refs, vec!["style_cube", "style_ring"]);
    }
}
