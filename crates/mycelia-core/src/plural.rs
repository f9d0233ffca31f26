//! Count-based variant selection
//!
//! A catalog declares its plural rule with `@meta plural = default|slavic|arabic`.
//! Counted tokens keep one variant per plural category (`{zero}`, `{one}`,
//! `{two}`, `{few}`, `{many}`, `{other}`).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluralRule {
    /// zero / one / other
    #[default]
    Default,
    /// one / few / many / other, by last one and two digits
    Slavic,
    /// zero / one / two / few / many / other
    Arabic,
}

impl PluralRule {
    pub const ALL: [PluralRule; 3] = [PluralRule::Default, PluralRule::Slavic, PluralRule::Arabic];

    /// Case-insensitive rule name.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "default" => Some(PluralRule::Default),
            "slavic" => Some(PluralRule::Slavic),
            "arabic" => Some(PluralRule::Arabic),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PluralRule::Default => "default",
            PluralRule::Slavic => "slavic",
            PluralRule::Arabic => "arabic",
        }
    }

    /// Wire tag used by the snapshot envelope.
    pub fn as_u8(self) -> u8 {
        match self {
            PluralRule::Default => 0,
            PluralRule::Slavic => 1,
            PluralRule::Arabic => 2,
        }
    }

    pub fn from_u8(tag: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.as_u8() == tag)
    }

    /// Plural category of `count`. Negative counts are always `other`.
    pub fn category(self, count: i64) -> &'static str {
        if count < 0 {
            return "other";
        }
        let mod10 = count % 10;
        let mod100 = count % 100;
        match self {
            PluralRule::Default => match count {
                0 => "zero",
                1 => "one",
                _ => "other",
            },
            PluralRule::Slavic => {
                if mod10 == 1 && mod100 != 11 {
                    "one"
                } else if (2..=4).contains(&mod10) && !(12..=14).contains(&mod100) {
                    "few"
                } else if mod10 == 0 || (5..=9).contains(&mod10) || (11..=14).contains(&mod100) {
                    "many"
                } else {
                    "other"
                }
            }
            PluralRule::Arabic => match count {
                0 => "zero",
                1 => "one",
                2 => "two",
                _ if (3..=10).contains(&mod100) => "few",
                _ if (11..=99).contains(&mod100) => "many",
                _ => "other",
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rule() {
        let r = PluralRule::Default;
        assert_eq!(r.category(0), "zero");
        assert_eq!(r.category(1), "one");
        assert_eq!(r.category(2), "other");
        assert_eq!(r.category(-1), "other");
    }

    #[test]
    fn test_slavic_rule() {
        let r = PluralRule::Slavic;
        assert_eq!(r.category(1), "one");
        assert_eq!(r.category(21), "one");
        assert_eq!(r.category(11), "many");
        assert_eq!(r.category(3), "few");
        assert_eq!(r.category(24), "few");
        assert_eq!(r.category(13), "many");
        assert_eq!(r.category(5), "many");
        assert_eq!(r.category(0), "many");
    }

    #[test]
    fn test_arabic_rule() {
        let r = PluralRule::Arabic;
        assert_eq!(r.category(0), "zero");
        assert_eq!(r.category(2), "two");
        assert_eq!(r.category(103), "few");
        assert_eq!(r.category(11), "many");
        assert_eq!(r.category(100), "other");
    }

    #[test]
    fn test_names_and_tags() {
        for rule in PluralRule::ALL {
            assert_eq!(PluralRule::parse(rule.as_str()), Some(rule));
            assert_eq!(PluralRule::from_u8(rule.as_u8()), Some(rule));
        }
        assert_eq!(PluralRule::parse(" Slavic "), Some(PluralRule::Slavic));
        assert_eq!(PluralRule::parse("one"), None);
        assert_eq!(PluralRule::from_u8(3), None);
    }
}
