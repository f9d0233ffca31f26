//! Snapshot validation.
//!
//! Snapshots MUST be validated before they are turned back into a catalog.
//! Linking rules (duplicates, dangling references, cycles) are checked later
//! by the catalog builder; this pass checks the wire invariants only.

use mycelia_core::PluralRule;

use crate::types::{WireBody, WireDeclaration, WireSegment, WireToken};
use crate::{CatalogSnapshot, SnapshotError, SCHEMA_VERSION};

/// Trait for validatable types.
pub trait Validate {
    /// Validate the object, returning an error if invalid.
    fn validate(&self) -> Result<(), SnapshotError>;
}

impl Validate for CatalogSnapshot {
    fn validate(&self) -> Result<(), SnapshotError> {
        if self.envelope.schema_version != SCHEMA_VERSION {
            return Err(SnapshotError::SchemaVersionMismatch {
                expected: SCHEMA_VERSION,
                actual: self.envelope.schema_version,
            });
        }

        if self.envelope.definition_count as usize != self.definitions.len() {
            return Err(SnapshotError::DeserializationFailed(format!(
                "envelope declares {} definitions, payload has {}",
                self.envelope.definition_count,
                self.definitions.len()
            )));
        }

        if PluralRule::from_u8(self.envelope.plural).is_none() {
            return Err(SnapshotError::InvalidPluralRule(self.envelope.plural));
        }

        let check = StringIds(self.string_table.len());
        for id in [
            self.envelope.locale,
            self.envelope.fallback,
            self.envelope.note,
        ]
        .into_iter()
        .flatten()
        {
            check.id(id)?;
        }

        for def in &self.definitions {
            // Token syntax is checked here too so a bad token fails fast
            self.token(&def.token)?;
            if let Some(label) = def.label {
                check.id(label)?;
            }
            match &def.body {
                WireBody::Style(decls) => {
                    for decl in decls {
                        match decl {
                            WireDeclaration::Property { name, value } => {
                                check.id(*name)?;
                                check.segments(value)?;
                            }
                            WireDeclaration::Include(t) => check.token(t)?,
                        }
                    }
                }
                WireBody::Template {
                    style_blocks,
                    markup,
                } => {
                    for block in style_blocks {
                        check.segments(block)?;
                    }
                    check.segments(markup)?;
                }
            }
        }

        Ok(())
    }
}

struct StringIds(usize);

impl StringIds {
    fn id(&self, index: u32) -> Result<(), SnapshotError> {
        if index as usize >= self.0 {
            return Err(SnapshotError::InvalidStringId {
                index,
                size: self.0,
            });
        }
        Ok(())
    }

    fn token(&self, t: &WireToken) -> Result<(), SnapshotError> {
        self.id(t.base)?;
        if let Some(v) = t.variant {
            self.id(v)?;
        }
        Ok(())
    }

    fn segments(&self, segs: &[WireSegment]) -> Result<(), SnapshotError> {
        for seg in segs {
            match seg {
                WireSegment::Text(id) => self.id(*id)?,
                WireSegment::Placeholder { default, .. } => {
                    if let Some(id) = default {
                        self.id(*id)?;
                    }
                }
                WireSegment::Reference(t) => self.token(t)?,
            }
        }
        Ok(())
    }
}
