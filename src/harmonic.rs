//! Harmonic compatibility scoring on the Camelot wheel.
//!
//! The wheel has 24 positions: numbers 1-12 around the circle, with `A` for
//! minor keys on the inner ring and `B` for major keys on the outer ring.
//! Transitions are classified by how far apart two keys sit on the wheel:
//!
//! | Class       | Relation                               | Score |
//! |-------------|----------------------------------------|-------|
//! | `Identical` | same number, same letter               | 1.0   |
//! | `Relative`  | same number, other letter (8A/8B)      | 0.9   |
//! | `Adjacent`  | same letter, number ±1 (mod 12)        | 0.75  |
//! | `Diagonal`  | other letter, number ±1 (mod 12)       | 0.5   |
//! | `Clash`     | anything else                          | 0.1   |
//! | `Unknown`   | either key missing                     | 0.5   |
//!
//! Only the canonical notation is accepted. Normalising other key spellings
//! (`Am`, `A minor`, Open Key) happens before data reaches the engine.

use crate::error::KeyParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Minimum score for a transition to count as key compatible.
pub const COMPATIBLE_THRESHOLD: f64 = 0.75;

/// Score used when either side has no key data.
pub const NEUTRAL_SCORE: f64 = 0.5;

/// Inner (minor) or outer (major) ring of the wheel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyMode {
    A,
    B,
}

impl KeyMode {
    const fn index(self) -> usize {
        match self {
            Self::A => 0,
            Self::B => 1,
        }
    }
}

/// A parsed Camelot key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CamelotKey {
    number: u8,
    mode: KeyMode,
}

impl CamelotKey {
    /// Build a key from its parts, returning `None` outside 1..=12.
    #[must_use]
    pub fn new(number: u8, mode: KeyMode) -> Option<Self> {
        (1..=12).contains(&number).then_some(Self { number, mode })
    }

    #[must_use]
    pub const fn number(self) -> u8 {
        self.number
    }

    #[must_use]
    pub const fn mode(self) -> KeyMode {
        self.mode
    }

    /// Position in the 24-entry compatibility table.
    const fn slot(self) -> usize {
        (self.number as usize - 1) * 2 + self.mode.index()
    }

    /// Every key on the wheel, `1A, 1B, 2A, ...`.
    pub fn all() -> impl Iterator<Item = Self> {
        (1..=12u8).flat_map(|number| {
            [KeyMode::A, KeyMode::B]
                .into_iter()
                .map(move |mode| Self { number, mode })
        })
    }
}

impl FromStr for CamelotKey {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || KeyParseError { input: s.to_string() };

        if !s.is_ascii() || s.len() < 2 || s.len() > 3 {
            return Err(err());
        }
        let (digits, letter) = s.split_at(s.len() - 1);
        let mode = match letter {
            "A" => KeyMode::A,
            "B" => KeyMode::B,
            _ => return Err(err()),
        };
        if digits.starts_with('0') || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(err());
        }
        let number: u8 = digits.parse().map_err(|_| err())?;
        Self::new(number, mode).ok_or_else(err)
    }
}

impl fmt::Display for CamelotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self.mode {
            KeyMode::A => 'A',
            KeyMode::B => 'B',
        };
        write!(f, "{}{letter}", self.number)
    }
}

/// How two keys relate on the wheel, most desirable first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompatibilityClass {
    Identical,
    Relative,
    Adjacent,
    Diagonal,
    Clash,
    Unknown,
}

impl CompatibilityClass {
    #[must_use]
    pub const fn score(self) -> f64 {
        match self {
            Self::Identical => 1.0,
            Self::Relative => 0.9,
            Self::Adjacent => 0.75,
            Self::Diagonal => 0.5,
            Self::Clash => 0.1,
            Self::Unknown => NEUTRAL_SCORE,
        }
    }

    /// Identical, relative and adjacent transitions mix cleanly.
    #[must_use]
    pub fn is_compatible(self) -> bool {
        self.score() >= COMPATIBLE_THRESHOLD && self != Self::Unknown
    }
}

impl fmt::Display for CompatibilityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Identical => "identical",
            Self::Relative => "relative",
            Self::Adjacent => "adjacent",
            Self::Diagonal => "diagonal",
            Self::Clash => "clash",
            Self::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

/// Result of scoring a key pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Compatibility {
    pub class: CompatibilityClass,
    pub score: f64,
}

impl From<CompatibilityClass> for Compatibility {
    fn from(class: CompatibilityClass) -> Self {
        Self { class, score: class.score() }
    }
}

fn classify(a: CamelotKey, b: CamelotKey) -> CompatibilityClass {
    let distance = (i16::from(a.number) - i16::from(b.number)).rem_euclid(12);
    let neighbours = distance == 1 || distance == 11;
    match (distance == 0, neighbours, a.mode == b.mode) {
        (true, _, true) => CompatibilityClass::Identical,
        (true, _, false) => CompatibilityClass::Relative,
        (false, true, true) => CompatibilityClass::Adjacent,
        (false, true, false) => CompatibilityClass::Diagonal,
        _ => CompatibilityClass::Clash,
    }
}

lazy_static::lazy_static! {
    /// All 24x24 pairs, computed once.
    static ref COMPATIBILITY_TABLE: [[CompatibilityClass; 24]; 24] = {
        let mut table = [[CompatibilityClass::Clash; 24]; 24];
        for a in CamelotKey::all() {
            for b in CamelotKey::all() {
                table[a.slot()][b.slot()] = classify(a, b);
            }
        }
        table
    };
}

/// Score the transition between two (possibly missing) keys.
///
/// Total and symmetric: `compatibility(a, b) == compatibility(b, a)` for every
/// pair, and a missing key on either side yields the neutral
/// [`CompatibilityClass::Unknown`] rather than an error.
///
/// ```
/// use mixpath::harmonic::{compatibility, CamelotKey, CompatibilityClass};
///
/// let a: CamelotKey = "8A".parse().unwrap();
/// let b: CamelotKey = "8B".parse().unwrap();
/// assert_eq!(compatibility(Some(a), Some(b)).class, CompatibilityClass::Relative);
/// assert_eq!(compatibility(Some(a), None).score, 0.5);
/// ```
#[must_use]
pub fn compatibility(a: Option<CamelotKey>, b: Option<CamelotKey>) -> Compatibility {
    match (a, b) {
        (Some(a), Some(b)) => COMPATIBILITY_TABLE[a.slot()][b.slot()].into(),
        _ => CompatibilityClass::Unknown.into(),
    }
}

/// Parse-and-score convenience for callers holding raw strings.
///
/// # Errors
///
/// Returns [`KeyParseError`] if either key is not canonical Camelot notation.
pub fn compatibility_str(a: &str, b: &str) -> Result<Compatibility, KeyParseError> {
    Ok(compatibility(Some(a.parse()?), Some(b.parse()?)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> CamelotKey {
        s.parse().expect("valid key")
    }

    #[test]
    fn test_parse_canonical_keys() {
        assert_eq!(key("1A").number(), 1);
        assert_eq!(key("12B").mode(), KeyMode::B);
        assert_eq!(key("8A").to_string(), "8A");
        assert_eq!(CamelotKey::all().count(), 24);
    }

    #[test]
    fn test_parse_rejects_non_canonical() {
        for bad in ["", "A", "0A", "13A", "08A", "8a", " 8A", "8C", "Am", "8AB", "１A"] {
            assert!(bad.parse::<CamelotKey>().is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn test_classes_from_wheel_geometry() {
        let cases = [
            ("8A", "8A", CompatibilityClass::Identical),
            ("8A", "8B", CompatibilityClass::Relative),
            ("8A", "9A", CompatibilityClass::Adjacent),
            ("12B", "1B", CompatibilityClass::Adjacent),
            ("1A", "12A", CompatibilityClass::Adjacent),
            ("8A", "9B", CompatibilityClass::Diagonal),
            ("1B", "12A", CompatibilityClass::Diagonal),
            ("8A", "10A", CompatibilityClass::Clash),
            ("3A", "9B", CompatibilityClass::Clash),
        ];
        for (a, b, expected) in cases {
            assert_eq!(compatibility_str(a, b).unwrap().class, expected, "{a} -> {b}");
        }
    }

    #[test]
    fn test_scores_match_classes() {
        assert_eq!(compatibility_str("5B", "5B").unwrap().score, 1.0);
        assert_eq!(compatibility_str("5B", "5A").unwrap().score, 0.9);
        assert_eq!(compatibility_str("5B", "6B").unwrap().score, 0.75);
        assert_eq!(compatibility_str("5B", "6A").unwrap().score, 0.5);
        assert_eq!(compatibility_str("5B", "11B").unwrap().score, 0.1);
    }

    #[test]
    fn test_symmetric_and_reflexive_over_whole_wheel() {
        for a in CamelotKey::all() {
            assert_eq!(compatibility(Some(a), Some(a)).class, CompatibilityClass::Identical);
            for b in CamelotKey::all() {
                assert_eq!(compatibility(Some(a), Some(b)), compatibility(Some(b), Some(a)));
            }
        }
    }

    #[test]
    fn test_missing_key_is_neutral() {
        let k = Some(key("4A"));
        assert_eq!(compatibility(k, None).class, CompatibilityClass::Unknown);
        assert_eq!(compatibility(None, k).score, NEUTRAL_SCORE);
        assert_eq!(compatibility(None, None).score, NEUTRAL_SCORE);
        assert!(!CompatibilityClass::Unknown.is_compatible());
    }

    #[test]
    fn test_compatible_threshold() {
        assert!(CompatibilityClass::Identical.is_compatible());
        assert!(CompatibilityClass::Relative.is_compatible());
        assert!(CompatibilityClass::Adjacent.is_compatible());
        assert!(!CompatibilityClass::Diagonal.is_compatible());
        assert!(!CompatibilityClass::Clash.is_compatible());
    }
}
