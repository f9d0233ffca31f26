//! Physics attribute model
//!
//! Style declarations named after a physical attribute (`--mass: 4.2`,
//! `friction: %1[0.3]`, `gap: 1.5rem`) double as CSS output and as a six-field
//! physics record. A token that declares none of them has no record at all.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use nom::{
    branch::alt,
    character::complete::{char, digit0, digit1},
    combinator::{opt, recognize},
    error::ParseError as NomParseError,
    sequence::{pair, tuple},
    IResult,
};
use serde::{Deserialize, Serialize};

use crate::definition::{Body, Declaration, Segment};

/// One of the six physical attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PhysicsField {
    Mass,
    Friction,
    Restitution,
    Drag,
    GravityScale,
    Spacing,
}

impl PhysicsField {
    pub const ALL: [PhysicsField; 6] = [
        PhysicsField::Mass,
        PhysicsField::Friction,
        PhysicsField::Restitution,
        PhysicsField::Drag,
        PhysicsField::GravityScale,
        PhysicsField::Spacing,
    ];

    /// Map a declaration name to a field. Accepts an optional `--` prefix.
    pub fn from_property(name: &str) -> Option<Self> {
        let name = name.strip_prefix("--").unwrap_or(name);
        match name {
            "mass" => Some(PhysicsField::Mass),
            "friction" => Some(PhysicsField::Friction),
            "restitution" => Some(PhysicsField::Restitution),
            "drag" => Some(PhysicsField::Drag),
            "gravity-scale" | "gravity_scale" => Some(PhysicsField::GravityScale),
            "spacing" | "gap" => Some(PhysicsField::Spacing),
            _ => None,
        }
    }

    /// JSON / record field name.
    pub fn as_str(self) -> &'static str {
        match self {
            PhysicsField::Mass => "mass",
            PhysicsField::Friction => "friction",
            PhysicsField::Restitution => "restitution",
            PhysicsField::Drag => "drag",
            PhysicsField::GravityScale => "gravity_scale",
            PhysicsField::Spacing => "spacing",
        }
    }
}

/// Six-field physics record. Only exists for tokens that declare physics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicsRecord {
    pub mass: f32,
    pub friction: f32,
    pub restitution: f32,
    pub drag: f32,
    pub gravity_scale: f32,
    pub spacing: f32,
}

impl Default for PhysicsRecord {
    /// Field defaults used when a declared field cannot be evaluated.
    fn default() -> Self {
        Self {
            mass: 0.0,
            friction: 0.0,
            restitution: 0.0,
            drag: 0.0,
            gravity_scale: 1.0,
            spacing: 0.0,
        }
    }
}

impl PhysicsRecord {
    pub fn get(&self, field: PhysicsField) -> f32 {
        match field {
            PhysicsField::Mass => self.mass,
            PhysicsField::Friction => self.friction,
            PhysicsField::Restitution => self.restitution,
            PhysicsField::Drag => self.drag,
            PhysicsField::GravityScale => self.gravity_scale,
            PhysicsField::Spacing => self.spacing,
        }
    }

    pub fn set(&mut self, field: PhysicsField, value: f32) {
        match field {
            PhysicsField::Mass => self.mass = value,
            PhysicsField::Friction => self.friction = value,
            PhysicsField::Restitution => self.restitution = value,
            PhysicsField::Drag => self.drag = value,
            PhysicsField::GravityScale => self.gravity_scale = value,
            PhysicsField::Spacing => self.spacing = value,
        }
    }

    /// JSON object with the six fields in fixed-point, six decimals.
    pub fn to_json(&self) -> String {
        let mut out = String::from("{");
        for (i, field) in PhysicsField::ALL.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            // Writing into a String cannot fail
            let _ = write!(out, "\"{}\": {:.6}", field.as_str(), self.get(*field));
        }
        out.push('}');
        out
    }
}

/// Serialize a token → record map as one JSON object, keys in sorted order.
pub fn records_to_json(
    records: &BTreeMap<String, PhysicsRecord>,
) -> Result<String, serde_json::Error> {
    let mut out = String::from("{");
    for (i, (token, record)) in records.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(&serde_json::to_string(token)?);
        out.push_str(": ");
        out.push_str(&record.to_json());
    }
    out.push('}');
    Ok(out)
}

/// The physics declarations of one definition, in source order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhysicsSpec {
    declarations: Vec<(PhysicsField, Vec<Segment>)>,
}

impl PhysicsSpec {
    /// Collect physics declarations from a style body. `None` when there are none.
    pub fn from_body(body: &Body) -> Option<Self> {
        let Body::Style(decls) = body else {
            return None;
        };
        let declarations: Vec<_> = decls
            .iter()
            .filter_map(|d| match d {
                Declaration::Property { name, value } => {
                    PhysicsField::from_property(name).map(|f| (f, value.clone()))
                }
                Declaration::Include(_) => None,
            })
            .collect();
        if declarations.is_empty() {
            None
        } else {
            Some(Self { declarations })
        }
    }

    pub fn fields(&self) -> impl Iterator<Item = PhysicsField> + '_ {
        self.declarations.iter().map(|(f, _)| *f)
    }

    /// Evaluate against an argument list. Never fails: a field whose value
    /// cannot be resolved keeps the record default. Later declarations win.
    pub fn evaluate(&self, args: &[&str]) -> PhysicsRecord {
        let mut record = PhysicsRecord::default();
        for (field, value) in &self.declarations {
            let Some(text) = resolve_value(value, args) else {
                continue;
            };
            if let Some(v) = parse_physical_value(&text) {
                record.set(*field, v);
            }
        }
        record
    }
}

/// Substitute placeholders; `None` when a required argument is missing or the
/// value contains an inline reference.
fn resolve_value(value: &[Segment], args: &[&str]) -> Option<String> {
    let mut out = String::new();
    for seg in value {
        match seg {
            Segment::Text(t) => out.push_str(t),
            Segment::Placeholder { index, default } => match args.get(*index) {
                Some(arg) => out.push_str(arg),
                None => out.push_str(default.as_deref()?),
            },
            Segment::Reference(_) => return None,
        }
    }
    Some(out)
}

/// Parse the leading decimal number of a value; units are ignored (`1.5rem`).
pub fn parse_physical_value(text: &str) -> Option<f32> {
    let text = text.trim();
    let (_, number) = decimal::<nom::error::Error<&str>>(text).ok()?;
    number.parse::<f32>().ok().filter(|v| v.is_finite())
}

fn decimal<'a, E: NomParseError<&'a str>>(input: &'a str) -> IResult<&'a str, &'a str, E> {
    recognize(tuple((
        opt(alt((char('-'), char('+')))),
        alt((
            recognize(pair(digit1, opt(pair(char('.'), digit0)))),
            recognize(pair(char('.'), digit1)),
        )),
    )))(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn prop(name: &str, value: Vec<Segment>) -> Declaration {
        Declaration::Property {
            name: name.to_string(),
            value,
        }
    }

    fn text(s: &str) -> Segment {
        Segment::Text(s.to_string())
    }

    #[test]
    fn test_field_names() {
        assert_eq!(PhysicsField::from_property("--mass"), Some(PhysicsField::Mass));
        assert_eq!(
            PhysicsField::from_property("gravity-scale"),
            Some(PhysicsField::GravityScale)
        );
        assert_eq!(PhysicsField::from_property("gap"), Some(PhysicsField::Spacing));
        assert_eq!(PhysicsField::from_property("border"), None);
    }

    #[test]
    fn test_parse_physical_value() {
        assert_eq!(parse_physical_value("4.2"), Some(4.2));
        assert_eq!(parse_physical_value(" 1.5rem"), Some(1.5));
        assert_eq!(parse_physical_value("-0.5"), Some(-0.5));
        assert_eq!(parse_physical_value(".95"), Some(0.95));
        assert_eq!(parse_physical_value("2em"), Some(2.0));
        assert_eq!(parse_physical_value("auto"), None);
        assert_eq!(parse_physical_value(""), None);
    }

    #[test]
    fn test_no_physics_declarations_means_no_spec() {
        let body = Body::Style(vec![prop("color", vec![text("red")])]);
        assert!(PhysicsSpec::from_body(&body).is_none());
    }

    #[test]
    fn test_evaluate_uses_declared_default_when_argument_missing() {
        let body = Body::Style(vec![
            prop("--mass", vec![text("4.2")]),
            prop(
                "spacing",
                vec![Segment::Placeholder {
                    index: 0,
                    default: Some("1.5".into()),
                }],
            ),
            prop(
                "friction",
                vec![Segment::Placeholder {
                    index: 1,
                    default: None,
                }],
            ),
        ]);
        let spec = PhysicsSpec::from_body(&body).unwrap();

        let record = spec.evaluate(&[]);
        assert_eq!(record.mass, 4.2);
        assert_eq!(record.spacing, 1.5);
        // No argument and no declared default: the field default stays
        assert_eq!(record.friction, 0.0);
        assert_eq!(record.gravity_scale, 1.0);

        let record = spec.evaluate(&["3", "0.9"]);
        assert_eq!(record.spacing, 3.0);
        assert_eq!(record.friction, 0.9);
    }

    #[test]
    fn test_record_json_is_six_decimal_fixed_point() {
        let record = PhysicsRecord {
            mass: 1.05,
            friction: 0.08,
            spacing: 0.8,
            ..Default::default()
        };
        assert_eq!(
            record.to_json(),
            "{\"mass\": 1.050000, \"friction\": 0.080000, \"restitution\": 0.000000, \
             \"drag\": 0.000000, \"gravity_scale\": 1.000000, \"spacing\": 0.800000}"
        );
    }

    #[test]
    fn test_records_to_json_sorted_by_token() {
        let mut records = BTreeMap::new();
        records.insert("style_b".to_string(), PhysicsRecord::default());
        records.insert("style_a".to_string(), PhysicsRecord::default());
        let json = records_to_json(&records).unwrap();
        assert!(json.find("style_a").unwrap() < json.find("style_b").unwrap());
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["style_a"]["gravity_scale"], serde_json::json!(1.0));
    }
}
