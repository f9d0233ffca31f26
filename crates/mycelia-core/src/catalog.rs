//! Catalog store
//!
//! An immutable token → definition map, built in one pass by
//! [`CatalogBuilder`]. Both the text loader and the snapshot decoder feed the
//! same builder, so linking rules (duplicates, unresolved references, cycles)
//! are enforced identically on both load paths.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::definition::Definition;
use crate::diagnostics::Diagnostic;
use crate::error::{CatalogError, ResolveError};
use crate::parser::{parse_catalog, ParsedCatalog};
use crate::physics::PhysicsRecord;
use crate::plural::PluralRule;
use crate::token::TokenRef;

/// Catalog-wide metadata from `@meta` lines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogMeta {
    pub locale: Option<String>,
    pub fallback: Option<String>,
    pub note: Option<String>,
    #[serde(default)]
    pub plural: PluralRule,
}

impl CatalogMeta {
    /// Set a key accepted by the `@meta` grammar. Unknown keys are ignored;
    /// an unknown plural rule name is an error.
    pub fn set(&mut self, key: &str, value: String) -> Result<(), String> {
        match key {
            "locale" => self.locale = Some(value),
            "fallback" => self.fallback = Some(value),
            "note" => self.note = Some(value),
            "plural" => {
                self.plural = PluralRule::parse(&value)
                    .ok_or_else(|| format!("unknown plural rule '{}'", value))?;
            }
            _ => {}
        }
        Ok(())
    }
}

/// Outcome of a successful load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    /// Number of definitions in the installed catalog
    pub loaded: usize,
    /// Entries dropped by a lenient load, one diagnostic each
    pub skipped: Vec<Diagnostic>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// An immutable, fully linked catalog.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    meta: CatalogMeta,
    definitions: BTreeMap<String, Definition>,
    variants: BTreeMap<String, BTreeSet<String>>,
}

impl Catalog {
    /// Parse and link a textual catalog.
    pub fn load_text(source: &str, strict: bool) -> Result<(Catalog, LoadReport), CatalogError> {
        Self::from_parsed(parse_catalog(source), strict)
    }

    pub fn from_parsed(
        parsed: ParsedCatalog,
        strict: bool,
    ) -> Result<(Catalog, LoadReport), CatalogError> {
        let mut builder = CatalogBuilder::new(strict).meta(parsed.meta);
        for err in parsed.errors {
            let line = match &err {
                CatalogError::Syntax(line, _) => Some(*line),
                _ => None,
            };
            builder.reject(line, err);
        }
        for entry in parsed.entries {
            builder.add(
                Some(entry.line),
                Definition::new(entry.token, entry.label, entry.body),
            );
        }
        builder.build()
    }

    pub fn meta(&self) -> &CatalogMeta {
        &self.meta
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// All definitions, sorted by key.
    pub fn definitions(&self) -> impl Iterator<Item = &Definition> {
        self.definitions.values()
    }

    /// Declared variant names of a base token, sorted.
    pub fn variants_of(&self, base: &str) -> Vec<&str> {
        self.variants
            .get(base)
            .map(|set| set.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Resolve `base` or `base{variant}` to its definition. Exact and
    /// case-sensitive; an undeclared variant never falls back to the base.
    pub fn resolve(&self, token: &str) -> Result<&Definition, ResolveError> {
        let token = TokenRef::parse(token)?;
        self.resolve_ref(&token)
    }

    pub fn resolve_ref(&self, token: &TokenRef) -> Result<&Definition, ResolveError> {
        if let Some(def) = self.definitions.get(&token.key()) {
            debug!(token = %token, "resolved");
            return Ok(def);
        }
        match &token.variant {
            Some(variant) if self.definitions.contains_key(&token.base) => {
                Err(ResolveError::UnknownVariant {
                    base: token.base.clone(),
                    variant: variant.clone(),
                })
            }
            _ => Err(ResolveError::UnknownToken(token.key())),
        }
    }

    /// Resolve a counted token. An explicit `{variant}` is resolved as is.
    /// Otherwise the variant named by the catalog's plural rule is tried,
    /// then `{other}`, then the first declared variant, then the base.
    pub fn resolve_count(&self, token: &str, count: i64) -> Result<&Definition, ResolveError> {
        let token = TokenRef::parse(token)?;
        if token.is_variant() {
            return self.resolve_ref(&token);
        }
        let category = self.meta.plural.category(count);
        let candidates = [Some(category), Some("other")]
            .into_iter()
            .chain(std::iter::once(self.variants_of(&token.base).first().copied()))
            .flatten();
        for variant in candidates {
            if let Some(def) = self
                .definitions
                .get(&format!("{}{{{}}}", token.base, variant))
            {
                debug!(token = %token, count, variant, "plural variant selected");
                return Ok(def);
            }
        }
        self.resolve_ref(&token)
    }

    /// Non-failing lookup by key.
    pub fn lookup(&self, token: &str) -> Option<&Definition> {
        self.definitions.get(token)
    }

    pub fn get(&self, token: &TokenRef) -> Option<&Definition> {
        self.definitions.get(&token.key())
    }

    /// Physics record of a definition. A variant without physics declarations
    /// of its own shares its base token's record.
    pub fn physics_of(&self, def: &Definition, args: &[&str]) -> Option<PhysicsRecord> {
        if let Some(spec) = def.physics_spec() {
            return Some(spec.evaluate(args));
        }
        if def.token.is_variant() {
            return self
                .get(&def.token.base_ref())
                .and_then(|base| base.physics_spec())
                .map(|spec| spec.evaluate(args));
        }
        None
    }

    /// The definition plus everything reachable from it through includes and
    /// inline references, sorted by key.
    pub fn reachable<'a>(&'a self, root: &'a Definition) -> Vec<&'a Definition> {
        let mut seen: BTreeMap<String, &Definition> = BTreeMap::new();
        let mut stack = vec![root];
        while let Some(def) = stack.pop() {
            if seen.insert(def.key(), def).is_some() {
                continue;
            }
            for r in def.references() {
                if let Some(child) = self.get(&r) {
                    if !seen.contains_key(&child.key()) {
                        stack.push(child);
                    }
                }
            }
        }
        seen.into_values().collect()
    }

    /// Physics records of every reachable definition that has one, by key.
    pub fn physics_map(&self, root: &Definition, args: &[&str]) -> BTreeMap<String, PhysicsRecord> {
        self.reachable(root)
            .into_iter()
            .filter_map(|def| self.physics_of(def, args).map(|rec| (def.key(), rec)))
            .collect()
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Links definitions into a [`Catalog`].
///
/// Strict: the first problem aborts the build. Lenient: malformed lines are
/// skipped, duplicates keep the first entry, and entries with unresolved
/// references or on a reference cycle are dropped until no dangling
/// reference remains.
#[derive(Debug)]
pub struct CatalogBuilder {
    strict: bool,
    meta: CatalogMeta,
    entries: Vec<(Option<usize>, Definition)>,
    rejected: Vec<(Option<usize>, CatalogError)>,
}

impl CatalogBuilder {
    pub fn new(strict: bool) -> Self {
        Self {
            strict,
            meta: CatalogMeta::default(),
            entries: Vec::new(),
            rejected: Vec::new(),
        }
    }

    pub fn meta(mut self, meta: CatalogMeta) -> Self {
        self.meta = meta;
        self
    }

    /// Add a definition, with its source line when it came from text.
    pub fn add(&mut self, line: Option<usize>, def: Definition) {
        self.entries.push((line, def));
    }

    /// Record an entry that failed before reaching the builder.
    pub fn reject(&mut self, line: Option<usize>, err: CatalogError) {
        self.rejected.push((line, err));
    }

    pub fn build(self) -> Result<(Catalog, LoadReport), CatalogError> {
        let CatalogBuilder {
            strict,
            meta,
            entries,
            rejected,
        } = self;
        let mut skipped = Vec::new();

        for (line, err) in rejected {
            skip(strict, &mut skipped, line, err)?;
        }

        // Duplicates: first entry wins
        let mut live: Vec<(Option<usize>, Definition)> = Vec::with_capacity(entries.len());
        let mut keys: HashSet<String> = HashSet::new();
        for (line, def) in entries {
            let key = def.key();
            if keys.contains(&key) {
                skip(strict, &mut skipped, line, CatalogError::DuplicateToken(key))?;
                continue;
            }
            keys.insert(key);
            live.push((line, def));
        }

        loop {
            drop_unresolved(strict, &mut live, &mut keys, &mut skipped)?;
            let Some(cycle) = find_cycle(&live) else {
                break;
            };
            let chain = cycle.join(" -> ");
            let members: HashSet<&String> = cycle.iter().collect();
            let mut kept = Vec::with_capacity(live.len());
            for (line, def) in live {
                let key = def.key();
                if members.contains(&key) {
                    skip(
                        strict,
                        &mut skipped,
                        line,
                        CatalogError::CyclicReference(chain.clone()),
                    )?;
                    keys.remove(&key);
                } else {
                    kept.push((line, def));
                }
            }
            live = kept;
        }

        if live.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut catalog = Catalog {
            meta,
            ..Catalog::default()
        };
        for (_, def) in live {
            if let Some(variant) = &def.token.variant {
                catalog
                    .variants
                    .entry(def.token.base.clone())
                    .or_default()
                    .insert(variant.clone());
            }
            catalog.definitions.insert(def.key(), def);
        }

        let report = LoadReport {
            loaded: catalog.len(),
            skipped,
        };
        info!(
            loaded = report.loaded,
            skipped = report.skipped.len(),
            strict,
            "catalog built"
        );
        Ok((catalog, report))
    }
}

fn skip(
    strict: bool,
    skipped: &mut Vec<Diagnostic>,
    line: Option<usize>,
    err: CatalogError,
) -> Result<(), CatalogError> {
    if strict {
        return Err(err);
    }
    let diag = Diagnostic::from_catalog_error(&err, line);
    warn!(line = ?line, "skipping catalog entry: {}", err);
    skipped.push(diag);
    Ok(())
}

/// The first reference of `def` that does not resolve, if any. A variant
/// also needs its base entry.
fn first_unresolved(def: &Definition, keys: &HashSet<String>) -> Option<String> {
    if def.token.is_variant() && !keys.contains(&def.token.base) {
        return Some(def.token.base.clone());
    }
    def.references()
        .into_iter()
        .map(|r| r.key())
        .find(|k| !keys.contains(k))
}

/// Drop entries with an unresolved reference, then everything that depended
/// on a dropped entry, until no dangling reference remains. Entries are
/// checked in source order, so strict mode reports the first bad line.
fn drop_unresolved(
    strict: bool,
    live: &mut Vec<(Option<usize>, Definition)>,
    keys: &mut HashSet<String>,
    skipped: &mut Vec<Diagnostic>,
) -> Result<(), CatalogError> {
    // key -> positions in `live` of the entries that reference it
    let mut dependents: HashMap<String, Vec<usize>> = HashMap::new();
    for (pos, (_, def)) in live.iter().enumerate() {
        if def.token.is_variant() {
            dependents.entry(def.token.base.clone()).or_default().push(pos);
        }
        for r in def.references() {
            dependents.entry(r.key()).or_default().push(pos);
        }
    }

    let mut dropped = vec![false; live.len()];
    let mut queue: VecDeque<usize> = (0..live.len()).collect();
    while let Some(pos) = queue.pop_front() {
        if dropped[pos] {
            continue;
        }
        let (line, def) = &live[pos];
        let Some(missing) = first_unresolved(def, keys) else {
            continue;
        };
        skip(strict, skipped, *line, CatalogError::UnresolvedReference(missing))?;
        let key = def.key();
        keys.remove(&key);
        dropped[pos] = true;
        if let Some(users) = dependents.get(&key) {
            queue.extend(users.iter().copied().filter(|p| !dropped[*p]));
        }
    }

    let mut flags = dropped.into_iter();
    live.retain(|_| !flags.next().unwrap_or(false));
    Ok(())
}

/// Depth-first search over references in key order, with an explicit
/// stack so long reference chains cannot exhaust the thread stack. Returns
/// the keys on the first cycle found, closed (`[a, b, a]`).
fn find_cycle(live: &[(Option<usize>, Definition)]) -> Option<Vec<String>> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Visiting,
        Done,
    }

    let edges: HashMap<String, Vec<String>> = live
        .iter()
        .map(|(_, def)| {
            (
                def.key(),
                def.references().into_iter().map(|r| r.key()).collect(),
            )
        })
        .collect();

    let mut marks: HashMap<&str, Mark> = HashMap::new();
    for root in edges.keys().map(String::as_str).collect::<BTreeSet<_>>() {
        if marks.contains_key(root) {
            continue;
        }
        // (node, index of the next edge to follow)
        let mut stack: Vec<(&str, usize)> = vec![(root, 0)];
        marks.insert(root, Mark::Visiting);
        while let Some((node, next)) = stack.last_mut() {
            let targets = edges.get(*node).map(Vec::as_slice).unwrap_or_default();
            let Some(target) = targets.get(*next) else {
                marks.insert(*node, Mark::Done);
                stack.pop();
                continue;
            };
            *next += 1;
            let target = target.as_str();
            match marks.get(target) {
                Some(Mark::Done) => {}
                Some(Mark::Visiting) => {
                    let start = stack.iter().position(|(k, _)| *k == target).unwrap_or(0);
                    let mut cycle: Vec<String> =
                        stack[start..].iter().map(|(k, _)| k.to_string()).collect();
                    cycle.push(target.to_string());
                    return Some(cycle);
                }
                None => {
                    marks.insert(target, Mark::Visiting);
                    stack.push((target, 0));
                }
            }
        }
    }
    None
}

// ============================================================================
// Tests
// ============================================================================
