//! mycelia-core: catalog grammar, token resolution, rendering and physics
//!
//! This crate contains the pure catalog logic with NO file or network I/O:
//! - Token model (`style_card`, `style_card{hover}`, `tpl_full-page`)
//! - Nom-based line grammar parser for textual catalogs
//! - Catalog store with strict and lenient linking
//! - Positional template renderer (style blocks always precede markup)
//! - Physics attribute model (mass, friction, restitution, drag, gravity, spacing)
//! - Count-based variant selection by plural rule
//! - Diagnostic types for load reports and catalog checks
//!
//! Loading from disk, the binary snapshot format and the engine instance live in
//! `mycelia_snapshot` and the `mycelia` crate.

pub mod catalog;
pub mod definition;
pub mod diagnostics;
pub mod error;
pub mod inspect;
pub mod parser;
pub mod physics;
pub mod plural;
pub mod render;
pub mod token;

// Re-export commonly used types
pub use catalog::{Catalog, CatalogBuilder, CatalogMeta, LoadReport};
pub use definition::{Body, Declaration, Definition, Emission, Segment};
pub use diagnostics::{Diagnostic, DiagnosticCode, Severity, SourceSpan};
pub use error::{CatalogError, RenderError, ResolveError};
pub use inspect::{check, dump, dump_table, find, CheckReport, DumpRow};
pub use parser::{parse_catalog, ParsedCatalog, ParsedEntry};
pub use physics::{records_to_json, PhysicsField, PhysicsRecord, PhysicsSpec};
pub use plural::PluralRule;
pub use render::{Rendered, Renderer, DEFAULT_MAX_DEPTH};
pub use token::{TokenKind, TokenRef};
