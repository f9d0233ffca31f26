//! Catalog inspection: lint report, table dump and text search.

use std::fmt::Write as _;

use serde::Serialize;

use crate::catalog::{Catalog, LoadReport};
use crate::definition::Definition;
use crate::diagnostics::{empty_body_info, placeholder_gap_warning, Diagnostic};

/// Exit code when the check found errors.
pub const EXIT_CHECK_FAILED: u8 = 3;

/// Exit code when no catalog is loaded.
pub const EXIT_NO_CATALOG: u8 = 2;

/// Result of [`check`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct CheckReport {
    pub tokens: usize,
    pub diagnostics: Vec<Diagnostic>,
}

impl CheckReport {
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_warning())
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    /// 0 when clean or only warnings, [`EXIT_CHECK_FAILED`] otherwise.
    pub fn exit_code(&self) -> u8 {
        if self.has_errors() {
            EXIT_CHECK_FAILED
        } else {
            0
        }
    }

    pub fn to_text(&self) -> String {
        let mut out = String::from("CHECK: REPORT\n");
        out.push_str(&"-".repeat(30));
        out.push('\n');
        for diag in &self.diagnostics {
            let _ = writeln!(out, "{}", diag);
        }
        out.push_str(&"-".repeat(30));
        out.push('\n');
        let warnings = self.warnings().count();
        let _ = writeln!(out, "Tokens: {}", self.tokens);
        let _ = writeln!(out, "Warnings: {}", warnings);
        let _ = writeln!(out, "Errors: {}", self.errors().count());
        out.push_str(match (self.has_errors(), warnings > 0) {
            (true, _) => "CHECK: FAIL\n",
            (false, true) => "CHECK: OK (with warnings)\n",
            (false, false) => "CHECK: OK\n",
        });
        out
    }
}

/// Lint an installed catalog. Entries the load skipped are reported first.
pub fn check(catalog: &Catalog, load: &LoadReport) -> CheckReport {
    let mut diagnostics = load.skipped.clone();
    for def in catalog.definitions() {
        let key = def.key();
        let used = def.placeholder_indices();
        if let Some(max) = used.last() {
            for idx in 0..*max {
                if used.binary_search(&idx).is_err() {
                    diagnostics.push(placeholder_gap_warning(&key, idx));
                }
            }
        }
        if def.source_text().is_empty() {
            diagnostics.push(empty_body_info(&key));
        }
    }
    CheckReport {
        tokens: catalog.len(),
        diagnostics,
    }
}

/// One row of [`dump`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DumpRow {
    pub token: String,
    pub label: String,
    pub emission: &'static str,
    pub arity: usize,
    pub physics: bool,
}

impl DumpRow {
    fn of(def: &Definition) -> Self {
        Self {
            token: def.key(),
            label: def.label.clone().unwrap_or_default(),
            emission: def.emission().as_str(),
            arity: def.arity(),
            physics: def.has_physics(),
        }
    }
}

/// Every definition, sorted by token.
pub fn dump(catalog: &Catalog) -> Vec<DumpRow> {
    catalog.definitions().map(DumpRow::of).collect()
}

pub fn dump_table(catalog: &Catalog) -> String {
    let rows = dump(catalog);
    let width = rows
        .iter()
        .map(|r| r.token.len())
        .max()
        .unwrap_or(0)
        .max("Token".len());
    let label_width = rows
        .iter()
        .map(|r| r.label.chars().count())
        .max()
        .unwrap_or(0)
        .max("Label".len());

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<width$} | {:<label_width$} | {:<12} | Args | Physics",
        "Token", "Label", "Emits"
    );
    let _ = writeln!(out, "{}", "-".repeat(width + label_width + 33));
    for row in rows {
        let _ = writeln!(
            out,
            "{:<width$} | {:<label_width$} | {:<12} | {:>4} | {}",
            row.token,
            row.label,
            row.emission,
            row.arity,
            if row.physics { "yes" } else { "-" }
        );
    }
    out
}

/// Case-insensitive search over token, label and body text. Sorted by token.
pub fn find<'a>(catalog: &'a Catalog, query: &str) -> Vec<&'a Definition> {
    let q = query.to_lowercase();
    catalog
        .definitions()
        .filter(|def| {
            def.key().to_lowercase().contains(&q)
                || def
                    .label
                    .as_deref()
                    .is_some_and(|l| l.to_lowercase().contains(&q))
                || def.source_text().to_lowercase().contains(&q)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagnosticCode;

    fn load(src: &str, strict: bool) -> (Catalog, LoadReport) {
        Catalog::load_text(src, strict).unwrap()
    }

    #[test]
    fn test_check_reports_placeholder_gaps() {
        let (catalog, report) = load("tpl_x: <b>%0 %2</b>\nstyle_y: color: %0", true);
        let check = check(&catalog, &report);
        let gaps: Vec<&Diagnostic> = check
            .diagnostics
            .iter()
            .filter(|d| d.code == DiagnosticCode::PlaceholderGap)
            .collect();
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].token.as_deref(), Some("tpl_x"));
        assert_eq!(check.exit_code(), 0);
        assert!(check.to_text().contains("CHECK: OK (with warnings)"));
    }

    #[test]
    fn test_check_includes_skipped_entries() {
        let (catalog, report) = load("style_a: color: red\nbroken line", false);
        let check = check(&catalog, &report);
        assert!(check.has_errors());
        assert_eq!(check.exit_code(), EXIT_CHECK_FAILED);
        assert!(check.to_text().ends_with("CHECK: FAIL\n"));
    }

    #[test]
    fn test_dump_is_sorted() {
        let (catalog, _) = load(
            "tpl_b(Second): <i>%0</i>\nstyle_a(First): --mass: 1",
            true,
        );
        let rows = dump(&catalog);
        assert_eq!(rows[0].token, "style_a");
        assert!(rows[0].physics);
        assert_eq!(rows[1].arity, 1);
        let table = dump_table(&catalog);
        assert!(table.lines().nth(2).unwrap().starts_with("style_a"));
    }

    #[test]
    fn test_find_matches_label_and_body() {
        let (catalog, _) = load(
            "style_card(Card Frame): border: 1px solid %0\ntpl_hero(Hero): <h1>Welcome</h1>",
            true,
        );
        let hits: Vec<String> = find(&catalog, "frame").iter().map(|d| d.key()).collect();
        assert_eq!(hits, vec!["style_card"]);
        let hits: Vec<String> = find(&catalog, "WELCOME").iter().map(|d| d.key()).collect();
        assert_eq!(hits, vec!["tpl_hero"]);
        assert!(find(&catalog, "nothing-here").is_empty());
    }
}
