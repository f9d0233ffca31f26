use std::path::PathBuf;

use mycelia_core::CatalogError;
use thiserror::Error;

/// Errors from encoding, decoding or validating a catalog snapshot.
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("not a catalog snapshot (bad magic)")]
    BadMagic,

    #[error("unsupported schema version: expected {expected}, got {actual}")]
    SchemaVersionMismatch { expected: u8, actual: u8 },

    #[error("snapshot truncated: header declares {expected} payload bytes, found {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("payload digest mismatch")]
    DigestMismatch,

    #[error("payload too large: {size} bytes")]
    PayloadTooLarge { size: usize },

    #[error("invalid string id {index} (table size {size})")]
    InvalidStringId { index: u32, size: usize },

    #[error("{field} {value} does not fit the snapshot format")]
    ValueOutOfRange { field: &'static str, value: u64 },

    #[error("unknown plural rule tag {0}")]
    InvalidPluralRule(u8),

    #[error("invalid token in snapshot: '{0}'")]
    InvalidToken(String),

    #[error("serialization failed: {0}")]
    SerializationFailed(String),

    #[error("deserialization failed: {0}")]
    DeserializationFailed(String),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
