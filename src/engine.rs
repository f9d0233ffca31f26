//! Catalog engine
//!
//! One engine instance owns one active catalog. Loads build the new catalog
//! without holding any lock and swap it in under the write lock; readers
//! clone the `Arc` under a short read lock and work on that snapshot, so an
//! in-flight render always sees one complete catalog, old or new.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use mycelia_core::{
    check, dump_table, find, records_to_json, Catalog, CatalogMeta, CheckReport, LoadReport,
    PhysicsRecord, Renderer,
};
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::error::EngineError;

/// An installed catalog together with the report of the load that built it.
#[derive(Debug)]
pub struct Snapshot {
    pub catalog: Catalog,
    pub report: LoadReport,
}

#[derive(Debug, Clone)]
struct LoadOrigin {
    path: PathBuf,
    strict: bool,
}

#[derive(Debug)]
pub struct CatalogEngine {
    max_depth: usize,
    active: RwLock<Option<Arc<Snapshot>>>,
    last_path: Mutex<Option<LoadOrigin>>,
}

impl Default for CatalogEngine {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl CatalogEngine {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            max_depth: config.max_depth,
            active: RwLock::new(None),
            last_path: Mutex::new(None),
        }
    }

    // =========================================================================
    // Load / reload / export
    // =========================================================================

    /// Replace the active catalog. Binary snapshots are recognised by their
    /// magic bytes; anything else is parsed as UTF-8 catalog text. On error
    /// the previous catalog stays active.
    pub fn load(&self, source: &[u8], strict: bool) -> Result<LoadReport, EngineError> {
        let (catalog, report) = if mycelia_snapshot::looks_like_snapshot(source) {
            mycelia_snapshot::decode(source, strict)?
        } else {
            let text = std::str::from_utf8(source)?;
            Catalog::load_text(text, strict)?
        };
        info!(
            tokens = catalog.len(),
            skipped = report.skipped.len(),
            strict,
            "catalog loaded"
        );
        self.install(Snapshot {
            catalog,
            report: report.clone(),
        });
        Ok(report)
    }

    /// Read `path` and [`load`](Self::load) it. Remembered for [`reload`](Self::reload)
    /// once the load succeeds.
    pub fn load_path(&self, path: &Path, strict: bool) -> Result<LoadReport, EngineError> {
        let bytes = std::fs::read(path).map_err(|source| EngineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let report = self.load(&bytes, strict)?;
        *self.last_path.lock().unwrap_or_else(PoisonError::into_inner) = Some(LoadOrigin {
            path: path.to_path_buf(),
            strict,
        });
        Ok(report)
    }

    /// Load the last successfully loaded path again, with the same strictness.
    pub fn reload(&self) -> Result<LoadReport, EngineError> {
        let origin = self
            .last_path
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(EngineError::NothingToReload)?;
        info!(path = %origin.path.display(), "reloading catalog");
        self.load_path(&origin.path, origin.strict)
    }

    /// Write the active catalog as a binary snapshot. Returns bytes written.
    pub fn export_binary(&self, path: &Path) -> Result<usize, EngineError> {
        let snapshot = self.snapshot()?;
        Ok(mycelia_snapshot::write_to_path(&snapshot.catalog, path)?)
    }

    /// Encode the active catalog without writing it anywhere.
    pub fn export_bytes(&self) -> Result<Vec<u8>, EngineError> {
        let snapshot = self.snapshot()?;
        Ok(mycelia_snapshot::encode(&snapshot.catalog)?)
    }

    fn install(&self, snapshot: Snapshot) {
        let snapshot = Arc::new(snapshot);
        *self.active.write().unwrap_or_else(PoisonError::into_inner) = Some(snapshot);
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// The active snapshot. Holding it keeps that catalog alive across reloads.
    pub fn snapshot(&self) -> Result<Arc<Snapshot>, EngineError> {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(EngineError::NoCatalog)
    }

    pub fn is_loaded(&self) -> bool {
        self.snapshot().is_ok()
    }

    pub fn meta(&self) -> Result<CatalogMeta, EngineError> {
        Ok(self.snapshot()?.catalog.meta().clone())
    }

    pub fn render(&self, token: &str, args: &[&str]) -> Result<String, EngineError> {
        let snapshot = self.snapshot()?;
        let catalog = &snapshot.catalog;
        let def = catalog.resolve(token)?;
        let text = Renderer::new(catalog)
            .with_max_depth(self.max_depth)
            .render(def, args)?;
        debug!(token, bytes = text.len(), "rendered");
        Ok(text)
    }

    /// Render the variant of `token` selected by `count` under the catalog's
    /// plural rule. An explicit `{variant}` is rendered as given.
    pub fn render_count(
        &self,
        token: &str,
        count: i64,
        args: &[&str],
    ) -> Result<String, EngineError> {
        let snapshot = self.snapshot()?;
        let catalog = &snapshot.catalog;
        let def = catalog.resolve_count(token, count)?;
        let text = Renderer::new(catalog)
            .with_max_depth(self.max_depth)
            .render(def, args)?;
        debug!(token, count, selected = %def.token, "rendered counted token");
        Ok(text)
    }

    /// Physics record of one token; `None` when it declares no physics.
    pub fn physics(
        &self,
        token: &str,
        args: &[&str],
    ) -> Result<Option<PhysicsRecord>, EngineError> {
        let snapshot = self.snapshot()?;
        let def = snapshot.catalog.resolve(token)?;
        Ok(snapshot.catalog.physics_of(def, args))
    }

    /// JSON object of every physics record reachable from `token`, keyed by
    /// token, six decimals per field.
    pub fn physics_json(&self, token: &str, args: &[&str]) -> Result<String, EngineError> {
        let snapshot = self.snapshot()?;
        let catalog = &snapshot.catalog;
        let def = catalog.resolve(token)?;
        Ok(records_to_json(&catalog.physics_map(def, args))?)
    }

    pub fn check(&self) -> Result<CheckReport, EngineError> {
        let snapshot = self.snapshot()?;
        Ok(check(&snapshot.catalog, &snapshot.report))
    }

    pub fn dump_table(&self) -> Result<String, EngineError> {
        Ok(dump_table(&self.snapshot()?.catalog))
    }

    /// `token(label): body` lines of every definition matching `query`.
    pub fn find(&self, query: &str) -> Result<Vec<String>, EngineError> {
        let snapshot = self.snapshot()?;
        Ok(find(&snapshot.catalog, query)
            .into_iter()
            .map(|def| {
                format!(
                    "{}({}): {}",
                    def.key(),
                    def.label.as_deref().unwrap_or(""),
                    def.source_text()
                )
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SOURCE: &str = "\
@meta locale = en
style_card: border: 1px solid %0; background-color: %1
style_cube-ice: --mass: 1.05; --friction: 0.08; spacing: 0.8
tpl_scene: <div style=\"@style_cube-ice\">%0</div>
";

    fn engine() -> CatalogEngine {
        let engine = CatalogEngine::default();
        engine.load(SOURCE.as_bytes(), true).unwrap();
        engine
    }

    #[test]
    fn test_reads_before_load_fail() {
        let engine = CatalogEngine::default();
        assert!(!engine.is_loaded());
        assert!(matches!(engine.render("style_card", &[]), Err(EngineError::NoCatalog)));
        assert!(matches!(engine.reload(), Err(EngineError::NothingToReload)));
    }

    #[test]
    fn test_render_and_meta() {
        let engine = engine();
        assert_eq!(
            engine.render("style_card", &["red", "blue"]).unwrap(),
            "border: 1px solid red; background-color: blue;"
        );
        assert_eq!(engine.meta().unwrap().locale.as_deref(), Some("en"));
    }

    #[test]
    fn test_resolve_errors_are_distinct() {
        let engine = engine();
        let err = engine.render("style_missing", &[]).unwrap_err();
        assert!(err.is_resolve());
        let err = engine.render("style_card", &["red"]).unwrap_err();
        assert!(matches!(err, EngineError::Render(_)));
    }

    #[test]
    fn test_physics_json() {
        let engine = engine();
        assert_eq!(
            engine.physics_json("tpl_scene", &[]).unwrap(),
            "{\"style_cube-ice\": {\"mass\": 1.050000, \"friction\": 0.080000, \
             \"restitution\": 0.000000, \"drag\": 0.000000, \"gravity_scale\": 1.000000, \
             \"spacing\": 0.800000}}"
        );
        assert_eq!(engine.physics("style_card", &[]).unwrap(), None);
    }

    #[test]
    fn test_held_snapshot_survives_reload() {
        let engine = engine();
        let held = engine.snapshot().unwrap();
        engine
            .load(b"style_other: color: green", true)
            .unwrap();
        assert!(held.catalog.lookup("style_card").is_some());
        assert!(engine.render("style_card", &["a", "b"]).unwrap_err().is_resolve());
    }

    #[test]
    fn test_invalid_utf8_is_load_error() {
        let engine = engine();
        let err = engine.load(&[0xff, 0xfe, 0x00], true).unwrap_err();
        assert!(err.is_load());
        assert!(engine.render("style_card", &["a", "b"]).is_ok());
    }

    #[test]
    fn test_reload_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("styles.catalog");
        std::fs::write(&path, "style_a: color: red").unwrap();

        let engine = CatalogEngine::default();
        engine.load_path(&path, true).unwrap();
        assert_eq!(engine.render("style_a", &[]).unwrap(), "color: red;");

        std::fs::write(&path, "style_a: color: blue").unwrap();
        engine.reload().unwrap();
        assert_eq!(engine.render("style_a", &[]).unwrap(), "color: blue;");
    }

    #[test]
    fn test_find_lines() {
        let engine = engine();
        let hits = engine.find("FRICTION").unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].starts_with("style_cube-ice(): --mass: 1.05;"));
    }
}
