//! Wire types
//!
//! Every string (tokens, variants, labels, property names, literal text) is
//! stored once in `string_table` and referenced by index. Definitions are kept
//! in parsed form, so loading a snapshot never re-runs the text grammar.

use std::collections::HashMap;

use mycelia_core::{
    Body, Catalog, CatalogBuilder, CatalogMeta, Declaration, Definition, LoadReport, PluralRule,
    Segment, TokenRef,
};
use serde::{Deserialize, Serialize};

use crate::{SnapshotError, SCHEMA_VERSION};

/// Snapshot metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEnvelope {
    pub schema_version: u8,
    pub locale: Option<u32>,
    pub fallback: Option<u32>,
    pub note: Option<u32>,
    /// Plural rule tag, see [`PluralRule::as_u8`]
    pub plural: u8,
    pub definition_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireToken {
    pub base: u32,
    pub variant: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WireSegment {
    Text(u32),
    Placeholder { index: u32, default: Option<u32> },
    Reference(WireToken),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WireDeclaration {
    Property { name: u32, value: Vec<WireSegment> },
    Include(WireToken),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WireBody {
    Style(Vec<WireDeclaration>),
    Template {
        style_blocks: Vec<Vec<WireSegment>>,
        markup: Vec<WireSegment>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireDefinition {
    pub token: WireToken,
    pub label: Option<u32>,
    pub body: WireBody,
}

/// The bincode payload of a snapshot file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    pub envelope: SnapshotEnvelope,
    pub string_table: Vec<String>,
    /// Sorted by token key
    pub definitions: Vec<WireDefinition>,
}

// =============================================================================
// ENCODE SIDE
// =============================================================================

/// Narrow a count or index to its u32 wire field.
fn wire_u32(field: &'static str, value: usize) -> Result<u32, SnapshotError> {
    u32::try_from(value).map_err(|_| SnapshotError::ValueOutOfRange {
        field,
        value: value as u64,
    })
}

#[derive(Default)]
struct StringTable {
    ids: HashMap<String, u32>,
    strings: Vec<String>,
}

impl StringTable {
    fn intern(&mut self, s: &str) -> Result<u32, SnapshotError> {
        if let Some(id) = self.ids.get(s) {
            return Ok(*id);
        }
        let id = wire_u32("string id", self.strings.len())?;
        self.strings.push(s.to_string());
        self.ids.insert(s.to_string(), id);
        Ok(id)
    }

    fn intern_opt(&mut self, s: Option<&str>) -> Result<Option<u32>, SnapshotError> {
        s.map(|s| self.intern(s)).transpose()
    }

    fn token(&mut self, t: &TokenRef) -> Result<WireToken, SnapshotError> {
        Ok(WireToken {
            base: self.intern(&t.base)?,
            variant: self.intern_opt(t.variant.as_deref())?,
        })
    }

    fn segments(&mut self, segs: &[Segment]) -> Result<Vec<WireSegment>, SnapshotError> {
        segs.iter()
            .map(|seg| {
                Ok::<_, SnapshotError>(match seg {
                    Segment::Text(t) => WireSegment::Text(self.intern(t)?),
                    Segment::Placeholder { index, default } => WireSegment::Placeholder {
                        index: wire_u32("placeholder index", *index)?,
                        default: self.intern_opt(default.as_deref())?,
                    },
                    Segment::Reference(t) => WireSegment::Reference(self.token(t)?),
                })
            })
            .collect()
    }

    fn body(&mut self, body: &Body) -> Result<WireBody, SnapshotError> {
        Ok(match body {
            Body::Style(decls) => WireBody::Style(
                decls
                    .iter()
                    .map(|d| {
                        Ok::<_, SnapshotError>(match d {
                            Declaration::Property { name, value } => WireDeclaration::Property {
                                name: self.intern(name)?,
                                value: self.segments(value)?,
                            },
                            Declaration::Include(t) => WireDeclaration::Include(self.token(t)?),
                        })
                    })
                    .collect::<Result<_, SnapshotError>>()?,
            ),
            Body::Template {
                style_blocks,
                markup,
            } => WireBody::Template {
                style_blocks: style_blocks
                    .iter()
                    .map(|b| self.segments(b))
                    .collect::<Result<_, _>>()?,
                markup: self.segments(markup)?,
            },
        })
    }
}

impl CatalogSnapshot {
    /// Compile an in-memory catalog. Pure: the same catalog always yields the
    /// same snapshot. Fails when a count or index does not fit its wire field.
    pub fn from_catalog(catalog: &Catalog) -> Result<Self, SnapshotError> {
        let mut table = StringTable::default();
        let meta = catalog.meta();
        let envelope = SnapshotEnvelope {
            schema_version: SCHEMA_VERSION,
            locale: table.intern_opt(meta.locale.as_deref())?,
            fallback: table.intern_opt(meta.fallback.as_deref())?,
            note: table.intern_opt(meta.note.as_deref())?,
            plural: meta.plural.as_u8(),
            definition_count: wire_u32("definition count", catalog.len())?,
        };
        let definitions = catalog
            .definitions()
            .map(|def| {
                Ok::<_, SnapshotError>(WireDefinition {
                    token: table.token(&def.token)?,
                    label: table.intern_opt(def.label.as_deref())?,
                    body: table.body(&def.body)?,
                })
            })
            .collect::<Result<_, SnapshotError>>()?;
        Ok(Self {
            envelope,
            string_table: table.strings,
            definitions,
        })
    }
}

// =============================================================================
// DECODE SIDE
// =============================================================================

impl CatalogSnapshot {
    /// Rebuild the catalog through the same linking pass as a text load.
    /// Call [`crate::Validate::validate`] first; string ids are assumed valid.
    pub fn into_catalog(self, strict: bool) -> Result<(Catalog, LoadReport), SnapshotError> {
        let meta = CatalogMeta {
            locale: self.opt_string(self.envelope.locale)?,
            fallback: self.opt_string(self.envelope.fallback)?,
            note: self.opt_string(self.envelope.note)?,
            plural: PluralRule::from_u8(self.envelope.plural)
                .ok_or(SnapshotError::InvalidPluralRule(self.envelope.plural))?,
        };

        let mut builder = CatalogBuilder::new(strict).meta(meta);
        for def in &self.definitions {
            let token = self.token(&def.token)?;
            let label = self.opt_string(def.label)?;
            let body = self.body(&def.body)?;
            builder.add(None, Definition::new(token, label, body));
        }
        Ok(builder.build()?)
    }

    pub(crate) fn string(&self, id: u32) -> Result<&str, SnapshotError> {
        self.string_table
            .get(id as usize)
            .map(String::as_str)
            .ok_or(SnapshotError::InvalidStringId {
                index: id,
                size: self.string_table.len(),
            })
    }

    fn opt_string(&self, id: Option<u32>) -> Result<Option<String>, SnapshotError> {
        id.map(|id| self.string(id).map(str::to_string)).transpose()
    }

    pub(crate) fn token(&self, t: &WireToken) -> Result<TokenRef, SnapshotError> {
        let key = match t.variant {
            Some(v) => format!("{}{{{}}}", self.string(t.base)?, self.string(v)?),
            None => self.string(t.base)?.to_string(),
        };
        TokenRef::parse(&key).map_err(|_| SnapshotError::InvalidToken(key))
    }

    fn segments(&self, segs: &[WireSegment]) -> Result<Vec<Segment>, SnapshotError> {
        segs.iter()
            .map(|seg| {
                Ok::<_, SnapshotError>(match seg {
                    WireSegment::Text(id) => Segment::Text(self.string(*id)?.to_string()),
                    WireSegment::Placeholder { index, default } => Segment::Placeholder {
                        index: *index as usize,
                        default: self.opt_string(*default)?,
                    },
                    WireSegment::Reference(t) => Segment::Reference(self.token(t)?),
                })
            })
            .collect()
    }

    fn body(&self, body: &WireBody) -> Result<Body, SnapshotError> {
        Ok(match body {
            WireBody::Style(decls) => Body::Style(
                decls
                    .iter()
                    .map(|d| {
                        Ok::<_, SnapshotError>(match d {
                            WireDeclaration::Property { name, value } => Declaration::Property {
                                name: self.string(*name)?.to_string(),
                                value: self.segments(value)?,
                            },
                            WireDeclaration::Include(t) => Declaration::Include(self.token(t)?),
                        })
                    })
                    .collect::<Result<_, SnapshotError>>()?,
            ),
            WireBody::Template {
                style_blocks,
                markup,
            } => Body::Template {
                style_blocks: style_blocks
                    .iter()
                    .map(|b| self.segments(b))
                    .collect::<Result<_, _>>()?,
                markup: self.segments(markup)?,
            },
        })
    }
}
