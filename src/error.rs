//! Engine error type
//!
//! Wraps the per-layer errors of `mycelia-core` and `mycelia_snapshot` so a
//! caller can still tell a resolution failure ("token not found") from a
//! render failure or a load failure.

use std::path::PathBuf;

use mycelia_core::{CatalogError, RenderError, ResolveError};
use mycelia_snapshot::SnapshotError;
use thiserror::Error;

/// Main error type for engine operations
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("no catalog loaded")]
    NoCatalog,

    #[error("nothing to reload: no catalog has been loaded from a path")]
    NothingToReload,

    #[error("catalog source is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    #[error("load error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("resolve error: {0}")]
    Resolve(#[from] ResolveError),

    #[error("render error: {0}")]
    Render(#[from] RenderError),

    #[error("snapshot error: {0}")]
    Snapshot(SnapshotError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<SnapshotError> for EngineError {
    fn from(e: SnapshotError) -> Self {
        // Linking failures read the same whichever format they came from
        match e {
            SnapshotError::Catalog(c) => EngineError::Catalog(c),
            SnapshotError::Io { path, source } => EngineError::Io { path, source },
            other => EngineError::Snapshot(other),
        }
    }
}

impl EngineError {
    /// True for unknown token / unknown variant / malformed token.
    pub fn is_resolve(&self) -> bool {
        matches!(self, EngineError::Resolve(_))
    }

    pub fn is_load(&self) -> bool {
        matches!(
            self,
            EngineError::Catalog(_) | EngineError::Encoding(_) | EngineError::Snapshot(_)
        )
    }
}
