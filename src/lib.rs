//! Mycelia - style/template catalog engine
//!
//! Loads a catalog of style and template tokens (text or binary snapshot),
//! resolves tokens and their `{variant}` forms, renders them with positional
//! arguments and evaluates their physics attributes.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mycelia::CatalogEngine;
//!
//! let engine = CatalogEngine::default();
//! engine
//!     .load(b"style_card: border: 1px solid %0; background-color: %1", true)
//!     .unwrap();
//! let css = engine.render("style_card", &["#3b82f6", "#ffffff"]).unwrap();
//! assert_eq!(css, "border: 1px solid #3b82f6; background-color: #ffffff;");
//! ```
//!
//! Grammar, linking and rendering live in [`mycelia_core`]; the binary
//! format lives in [`mycelia_snapshot`].

// Core error handling
pub mod error;

// Environment / YAML configuration
pub mod config;

// Engine instance: active catalog, load/reload/export, reads
pub mod engine;

// Status-code call surface with the two-pass buffer protocol
pub mod boundary;

pub use boundary::{CatalogHandle, NativePhysics, STATUS_ERROR, STATUS_OK};
pub use config::EngineConfig;
pub use engine::{CatalogEngine, Snapshot};
pub use error::EngineError;

pub use mycelia_core;
pub use mycelia_snapshot;
