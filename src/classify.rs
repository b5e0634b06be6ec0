//! # Event Classifier
//! Maps a raw GOES flare class string (e.g. `"M2.5"`, `"x1.0"`) to a canonical
//! `(letter, magnitude)` pair and decides whether it crosses the notification
//! threshold.
//!
//! Pure logic, no I/O. Unknown shapes yield `None` so downstream code simply
//! skips them.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Leading letter followed by a decimal magnitude; trailing text is ignored.
static RE_CLASS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([BCMX])(\d+(?:\.\d+)?)").expect("static flare class regex"));

/// Severity letter, ordered B < C < M < X.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ClassLetter {
    B,
    C,
    M,
    X,
}

impl ClassLetter {
    pub fn as_char(self) -> char {
        match self {
            ClassLetter::B => 'B',
            ClassLetter::C => 'C',
            ClassLetter::M => 'M',
            ClassLetter::X => 'X',
        }
    }

    fn from_char(c: char) -> Option<Self> {
        match c {
            'B' => Some(ClassLetter::B),
            'C' => Some(ClassLetter::C),
            'M' => Some(ClassLetter::M),
            'X' => Some(ClassLetter::X),
            _ => None,
        }
    }
}

impl fmt::Display for ClassLetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Canonical flare class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlareClass {
    pub letter: ClassLetter,
    pub magnitude: f64,
}

impl fmt::Display for FlareClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:.1}", self.letter, self.magnitude)
    }
}

/// Parse a flare class string. Case-insensitive, surrounding whitespace ignored.
pub fn classify(raw: &str) -> Option<FlareClass> {
    let upper = raw.trim().to_ascii_uppercase();
    let caps = RE_CLASS.captures(&upper)?;
    let letter = caps
        .get(1)
        .and_then(|m| m.as_str().chars().next())
        .and_then(ClassLetter::from_char)?;
    let magnitude: f64 = caps.get(2)?.as_str().parse().ok()?;
    if !magnitude.is_finite() {
        return None;
    }
    Some(FlareClass { letter, magnitude })
}

/// Fixed notification threshold: only M and X flares are operationally significant.
pub fn qualifies(letter: Option<ClassLetter>) -> bool {
    matches!(letter, Some(ClassLetter::M | ClassLetter::X))
}

/// Colour hint used by chat adapters when rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Red,
    Orange,
    Yellow,
    Blue,
    Neutral,
}

impl Severity {
    pub fn for_letter(letter: Option<ClassLetter>) -> Self {
        match letter {
            Some(ClassLetter::X) => Severity::Red,
            Some(ClassLetter::M) => Severity::Orange,
            Some(ClassLetter::C) => Severity::Yellow,
            _ => Severity::Blue,
        }
    }

    /// RGB value in the 0xRRGGBB form Discord expects.
    pub fn rgb(self) -> u32 {
        match self {
            Severity::Red => 0xE7_4C_3C,
            Severity::Orange => 0xE6_7E_22,
            Severity::Yellow => 0xF1_C4_0F,
            Severity::Blue => 0x34_98_DB,
            Severity::Neutral => 0x58_65_F2,
        }
    }

    pub fn hex(self) -> String {
        format!("#{:06X}", self.rgb())
    }
}
