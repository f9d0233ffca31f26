//! Template renderer
//!
//! Substitutes positional arguments into a resolved definition. Inline
//! references render the referenced definition with the same argument list;
//! a referenced template's `<style>` blocks are hoisted into the style
//! section, so the returned text always carries style before markup.

use tracing::debug;

use crate::catalog::Catalog;
use crate::definition::{Body, Declaration, Definition, Segment};
use crate::error::RenderError;

/// Default bound on nested references.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Rendered output split into its two sections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rendered {
    pub style: String,
    pub markup: String,
}

impl Rendered {
    /// Style text immediately followed by markup, no separator.
    pub fn into_string(self) -> String {
        let mut out = self.style;
        out.push_str(&self.markup);
        out
    }
}

/// Renders definitions of one catalog.
#[derive(Debug, Clone, Copy)]
pub struct Renderer<'a> {
    catalog: &'a Catalog,
    max_depth: usize,
}

impl<'a> Renderer<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self {
            catalog,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn render(&self, def: &Definition, args: &[&str]) -> Result<String, RenderError> {
        self.render_parts(def, args).map(Rendered::into_string)
    }

    pub fn render_parts(&self, def: &Definition, args: &[&str]) -> Result<Rendered, RenderError> {
        debug!(token = %def.token, args = args.len(), "rendering");
        let mut out = Rendered::default();
        match &def.body {
            Body::Style(_) => {
                // Style blocks of referenced templates come first
                let mut hoisted = String::new();
                let text = self.style_text(def, args, 0, &mut hoisted)?;
                hoisted.push_str(&text);
                out.style = hoisted;
            }
            Body::Template { .. } => {
                out.markup = self.template(def, args, 0, &mut out.style)?;
            }
        }
        Ok(out)
    }

    /// `name: value;` items joined by single spaces, includes expanded in place.
    fn style_text(
        &self,
        def: &Definition,
        args: &[&str],
        depth: usize,
        hoisted: &mut String,
    ) -> Result<String, RenderError> {
        check_arity(def, args)?;
        let Body::Style(decls) = &def.body else {
            return self.template(def, args, depth, hoisted);
        };
        let mut items: Vec<String> = Vec::with_capacity(decls.len());
        for decl in decls {
            match decl {
                Declaration::Property { name, value } => {
                    let value = self.segments(def, value, args, depth, hoisted)?;
                    items.push(format!("{}: {};", name, value));
                }
                Declaration::Include(token) => {
                    let child = self.child(def, token, depth)?;
                    let text = self.style_text(child, args, depth + 1, hoisted)?;
                    if !text.is_empty() {
                        items.push(text);
                    }
                }
            }
        }
        Ok(items.join(" "))
    }

    /// Appends the template's style blocks to `hoisted`, returns its markup.
    fn template(
        &self,
        def: &Definition,
        args: &[&str],
        depth: usize,
        hoisted: &mut String,
    ) -> Result<String, RenderError> {
        check_arity(def, args)?;
        let Body::Template {
            style_blocks,
            markup,
        } = &def.body
        else {
            return self.style_text(def, args, depth, hoisted);
        };
        for block in style_blocks {
            let text = self.segments(def, block, args, depth, hoisted)?;
            hoisted.push_str(&text);
        }
        self.segments(def, markup, args, depth, hoisted)
    }

    fn segments(
        &self,
        owner: &Definition,
        segments: &[Segment],
        args: &[&str],
        depth: usize,
        hoisted: &mut String,
    ) -> Result<String, RenderError> {
        let mut out = String::new();
        for seg in segments {
            match seg {
                Segment::Text(t) => out.push_str(t),
                Segment::Placeholder { index, default } => {
                    match (args.get(*index), default) {
                        (Some(arg), _) => out.push_str(arg),
                        (None, Some(d)) => out.push_str(d),
                        (None, None) => {
                            return Err(RenderError::ArityMismatch {
                                token: owner.key(),
                                expected: index.saturating_add(1),
                                got: args.len(),
                            })
                        }
                    }
                }
                Segment::Reference(token) => {
                    let child = self.child(owner, token, depth)?;
                    let text = match &child.body {
                        Body::Style(_) => self.style_text(child, args, depth + 1, hoisted)?,
                        Body::Template { .. } => self.template(child, args, depth + 1, hoisted)?,
                    };
                    out.push_str(&text);
                }
            }
        }
        Ok(out)
    }

    fn child(
        &self,
        owner: &Definition,
        token: &crate::token::TokenRef,
        depth: usize,
    ) -> Result<&'a Definition, RenderError> {
        if depth + 1 > self.max_depth {
            return Err(RenderError::DepthExceeded {
                token: token.key(),
                limit: self.max_depth,
            });
        }
        self.catalog
            .get(token)
            .ok_or_else(|| RenderError::DanglingReference {
                token: owner.key(),
                reference: token.key(),
            })
    }
}

fn check_arity(def: &Definition, args: &[&str]) -> Result<(), RenderError> {
    let expected = def.arity();
    if args.len() < expected {
        return Err(RenderError::ArityMismatch {
            token: def.key(),
            expected,
            got: args.len(),
        });
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const CATALOG: &str = "\
style_shadow: box-shadow: 0 10px 30px rgba(59,130,246,0.6)
style_card(Card): border: 1px solid %0; background-color: %1; @style_shadow
style_card{hover}: transform: translateY(-4px); @style_shadow
tpl_grid: <style>.grid{display:grid}</style><div class=\"grid\">%1</div>
tpl_page: <style>body{margin:0}</style><h1>%0</h1>@tpl_grid
tpl_badge: <span class=\"badge\">%0[new]</span>
";

    fn catalog() -> Catalog {
        Catalog::load_text(CATALOG, true).unwrap().0
    }

    fn render(catalog: &Catalog, token: &str, args: &[&str]) -> Result<String, RenderError> {
        Renderer::new(catalog).render(catalog.resolve(token).unwrap(), args)
    }

    #[test]
    fn test_style_card_scenario() {
        let c = catalog();
        let out = render(&c, "style_card", &["#3b82f6", "#ffffff"]).unwrap();
        assert_eq!(
            out,
            "border: 1px solid #3b82f6; background-color: #ffffff; \
             box-shadow: 0 10px 30px rgba(59,130,246,0.6);"
        );
    }

    #[test]
    fn test_arity_strictness() {
        let c = catalog();
        assert_eq!(
            render(&c, "style_card", &["#3b82f6"]).unwrap_err(),
            RenderError::ArityMismatch {
                token: "style_card".into(),
                expected: 2,
                got: 1
            }
        );
        // Surplus arguments are ignored
        let exact = render(&c, "style_card", &["a", "b"]).unwrap();
        let surplus = render(&c, "style_card", &["a", "b", "c", "d"]).unwrap();
        assert_eq!(exact, surplus);
    }

    #[test]
    fn test_variant_renders_its_own_body() {
        let c = catalog();
        let out = render(&c, "style_card{hover}", &[]).unwrap();
        assert!(out.contains("transform: translateY(-4px)"));
        assert!(!out.contains("border"));
    }

    #[test]
    fn test_child_styles_are_hoisted_before_markup() {
        let c = catalog();
        let parts = Renderer::new(&c)
            .render_parts(c.resolve("tpl_page").unwrap(), &["Title", "cells"])
            .unwrap();
        assert_eq!(
            parts.style,
            "<style>body{margin:0}</style><style>.grid{display:grid}</style>"
        );
        assert_eq!(parts.markup, "<h1>Title</h1><div class=\"grid\">cells</div>");

        let whole = render(&c, "tpl_page", &["Title", "cells"]).unwrap();
        let end = whole.rfind("</style>").unwrap();
        assert!(!whole[end..].contains("<style>"));
        assert!(whole[end..].contains("<h1>Title</h1>"));
    }

    #[test]
    fn test_style_root_keeps_hoisted_blocks() {
        let src = "tpl_t: <style>.a{color:red}</style><b>x</b>\nstyle_s: content: @tpl_t";
        let c = Catalog::load_text(src, true).unwrap().0;
        let parts = Renderer::new(&c)
            .render_parts(c.resolve("style_s").unwrap(), &[])
            .unwrap();
        assert_eq!(parts.style, "<style>.a{color:red}</style>content: <b>x</b>;");
        assert_eq!(parts.markup, "");
    }

    #[test]
    fn test_referenced_arity_is_enforced() {
        let c = catalog();
        assert_eq!(
            render(&c, "tpl_page", &["Title"]).unwrap_err(),
            RenderError::ArityMismatch {
                token: "tpl_grid".into(),
                expected: 2,
                got: 1
            }
        );
    }

    #[test]
    fn test_placeholder_default() {
        let c = catalog();
        assert_eq!(
            render(&c, "tpl_badge", &[]).unwrap(),
            "<span class=\"badge\">new</span>"
        );
        assert_eq!(
            render(&c, "tpl_badge", &["hot"]).unwrap(),
            "<span class=\"badge\">hot</span>"
        );
    }

    #[test]
    fn test_arguments_are_not_rescanned() {
        let c = catalog();
        let out = render(&c, "tpl_badge", &["@style_shadow %0"]).unwrap();
        assert_eq!(out, "<span class=\"badge\">@style_shadow %0</span>");
    }

    #[test]
    fn test_depth_limit() {
        let c = catalog();
        let err = Renderer::new(&c)
            .with_max_depth(0)
            .render(c.resolve("tpl_page").unwrap(), &["a", "b"])
            .unwrap_err();
        assert_eq!(
            err,
            RenderError::DepthExceeded {
                token: "tpl_grid".into(),
                limit: 0
            }
        );
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let c = catalog();
        let a = render(&c, "tpl_page", &["x", "y"]).unwrap();
        let b = render(&c, "tpl_page", &["x", "y"]).unwrap();
        assert_eq!(a, b);
    }
}
