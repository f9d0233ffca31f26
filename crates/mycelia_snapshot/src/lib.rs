//! Mycelia Catalog Snapshot Format
//!
//! Binary form of a compiled catalog, for reloading without re-parsing the
//! text source.
//!
//! # Layout
//!
//! ```text
//! offset  size  field
//! 0       4     magic "MYCL"
//! 4       1     schema version
//! 5       3     reserved (zero)
//! 8       4     payload length, u32 little-endian
//! 12      32    BLAKE3 digest of the payload
//! 44      n     payload: bincode-encoded CatalogSnapshot
//! ```
//!
//! Encoding is deterministic: definitions are sorted by token key and the
//! string table is filled in that order, so the same catalog always produces
//! the same bytes.

mod error;
mod types;
mod validate;

use std::path::Path;

use mycelia_core::{Catalog, LoadReport};
use tracing::{info, warn};

pub use error::SnapshotError;
pub use types::{
    CatalogSnapshot, SnapshotEnvelope, WireBody, WireDeclaration, WireDefinition, WireSegment,
    WireToken,
};
pub use validate::Validate;

// =============================================================================
// FORMAT CONSTANTS
// =============================================================================

/// File magic.
pub const MAGIC: [u8; 4] = *b"MYCL";

/// Current schema version.
pub const SCHEMA_VERSION: u8 = 1;

/// Bytes before the payload.
pub const HEADER_LEN: usize = 8 + 4 + DIGEST_LEN;

const DIGEST_LEN: usize = 32;

/// Upper bound on the payload length (u32 length field).
pub const MAX_PAYLOAD_LEN: usize = u32::MAX as usize;

// =============================================================================
// SERIALIZATION
// =============================================================================

impl CatalogSnapshot {
    /// Serialize to bytes using bincode.
    pub fn serialize(&self) -> Result<Vec<u8>, SnapshotError> {
        bincode::serialize(self).map_err(|e| SnapshotError::SerializationFailed(e.to_string()))
    }

    /// Deserialize from bytes.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, SnapshotError> {
        bincode::deserialize(bytes).map_err(|e| SnapshotError::DeserializationFailed(e.to_string()))
    }
}

/// True when `bytes` start with the snapshot magic.
pub fn looks_like_snapshot(bytes: &[u8]) -> bool {
    bytes.starts_with(&MAGIC)
}

/// Encode a catalog into a complete snapshot file image.
pub fn encode(catalog: &Catalog) -> Result<Vec<u8>, SnapshotError> {
    let payload = CatalogSnapshot::from_catalog(catalog)?.serialize()?;
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(SnapshotError::PayloadTooLarge {
            size: payload.len(),
        });
    }

    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(&MAGIC);
    out.push(SCHEMA_VERSION);
    out.extend_from_slice(&[0u8; 3]);
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(blake3::hash(&payload).as_bytes());
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Decode a snapshot file image and link it into a catalog.
///
/// A digest mismatch is an error in strict mode and a logged warning in
/// lenient mode; every other header or payload problem is always an error.
pub fn decode(bytes: &[u8], strict: bool) -> Result<(Catalog, LoadReport), SnapshotError> {
    if !looks_like_snapshot(bytes) {
        return Err(SnapshotError::BadMagic);
    }
    if bytes.len() < HEADER_LEN {
        return Err(SnapshotError::LengthMismatch {
            expected: HEADER_LEN,
            actual: bytes.len(),
        });
    }

    let version = bytes[4];
    if version != SCHEMA_VERSION {
        return Err(SnapshotError::SchemaVersionMismatch {
            expected: SCHEMA_VERSION,
            actual: version,
        });
    }

    let mut len_bytes = [0u8; 4];
    len_bytes.copy_from_slice(&bytes[8..12]);
    let declared = u32::from_le_bytes(len_bytes) as usize;
    let payload = &bytes[HEADER_LEN..];
    if payload.len() != declared {
        return Err(SnapshotError::LengthMismatch {
            expected: declared,
            actual: payload.len(),
        });
    }

    if blake3::hash(payload).as_bytes()[..] != bytes[12..HEADER_LEN] {
        if strict {
            return Err(SnapshotError::DigestMismatch);
        }
        warn!("snapshot payload digest mismatch, loading anyway (lenient)");
    }

    let snapshot = CatalogSnapshot::deserialize(payload)?;
    snapshot.validate()?;
    snapshot.into_catalog(strict)
}

/// Encode `catalog` and write it to `path`. Returns the number of bytes written.
pub fn write_to_path(catalog: &Catalog, path: &Path) -> Result<usize, SnapshotError> {
    let bytes = encode(catalog)?;
    std::fs::write(path, &bytes).map_err(|source| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), bytes = bytes.len(), "catalog snapshot written");
    Ok(bytes.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SOURCE: &str = "\
@meta locale = en
@meta note = demo catalog
@meta plural = arabic
style_card(Card): border: 1px solid %0; background-color: %1
style_card{hover}: transform: translateY(-4px)
tpl_box: <style>.b{}</style><div style=\"@style_card\">%2[x]</div>
";

    fn catalog() -> Catalog {
        Catalog::load_text(SOURCE, true).expect("load").0
    }

    #[test]
    fn header_layout() {
        let bytes = encode(&catalog()).expect("encode");
        assert_eq!(&bytes[0..4], b"MYCL");
        assert_eq!(bytes[4], SCHEMA_VERSION);
        assert_eq!(&bytes[5..8], &[0, 0, 0]);
        let len = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;
        assert_eq!(len, bytes.len() - HEADER_LEN);
    }

    #[test]
    fn encoding_is_deterministic() {
        assert_eq!(encode(&catalog()).unwrap(), encode(&catalog()).unwrap());
    }

    #[test]
    fn round_trip_keeps_definitions_and_meta() {
        let original = catalog();
        let (restored, report) = decode(&encode(&original).unwrap(), true).expect("decode");
        assert!(report.is_clean());
        assert_eq!(restored.meta(), original.meta());
        let a: Vec<_> = original.definitions().collect();
        let b: Vec<_> = restored.definitions().collect();
        assert_eq!(a, b);
    }

    #[test]
    fn bad_magic_and_version() {
        assert!(matches!(decode(b"NOPE", true), Err(SnapshotError::BadMagic)));
        let mut bytes = encode(&catalog()).unwrap();
        bytes[4] = 99;
        assert!(matches!(
            decode(&bytes, false),
            Err(SnapshotError::SchemaVersionMismatch { actual: 99, .. })
        ));
    }

    #[test]
    fn truncated_payload() {
        let bytes = encode(&catalog()).unwrap();
        let cut = &bytes[..bytes.len() - 1];
        assert!(matches!(
            decode(cut, false),
            Err(SnapshotError::LengthMismatch { .. })
        ));
        assert!(matches!(
            decode(&bytes[..10], false),
            Err(SnapshotError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn digest_mismatch_is_strict_only() {
        let mut bytes = encode(&catalog()).unwrap();
        bytes[20] ^= 0xff;
        assert!(matches!(decode(&bytes, true), Err(SnapshotError::DigestMismatch)));
        let (restored, _) = decode(&bytes, false).expect("lenient decode");
        assert_eq!(restored.len(), 3);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn oversized_index_fails_encode() {
        use mycelia_core::{Body, CatalogBuilder, Definition, Segment, TokenRef};

        let body = Body::Template {
            style_blocks: Vec::new(),
            markup: vec![Segment::Placeholder {
                index: u32::MAX as usize + 1,
                default: Some("x".into()),
            }],
        };
        let mut builder = CatalogBuilder::new(true);
        builder.add(None, Definition::new(TokenRef::parse("tpl_wide").unwrap(), None, body));
        let (catalog, _) = builder.build().unwrap();
        assert!(matches!(
            encode(&catalog),
            Err(SnapshotError::ValueOutOfRange {
                field: "placeholder index",
                ..
            })
        ));
    }

    #[test]
    fn plural_rule_survives_round_trip() {
        let (restored, _) = decode(&encode(&catalog()).unwrap(), true).unwrap();
        assert_eq!(restored.meta().plural, mycelia_core::PluralRule::Arabic);
    }
}
