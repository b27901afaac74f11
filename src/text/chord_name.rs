//! # Chord Name Parser
//!
//! Decomposes a chord symbol such as `F#m7`, `A(9)` or `BMaj7/D#` into
//! root, kind, bass and degrees.
//!
//! ## Grammar
//! ```text
//! root    = step alter?
//! kind    = mode? "(maj7)"? degs? sus?
//! mode    = maj | min | aug | dim | hdim
//! degs    = DEG (alter DEG)?
//! extra   = "(" alter? DEG (alter DEG)* ")" | alter? DEG (alter DEG)*
//! bass    = "/" step alter?
//! chord   = root kind? extra? bass?
//! ```
//! with `DEG` one of 5, 6, 7, 9, 11, 13 and `alter` one of `b ♭ # ♯`.
//!
//! The first degree of `degs` is the dominant: it selects the kind
//! (`m` + `7` is a minor seventh) and is then dropped from the degree list,
//! except for suspended kinds where it remains an added degree.
//!
//! ## Degree classification
//! A degree not above 5, or lower than the dominant, alters an existing
//! chord tone; any other degree is an addition.
//!
//! ## Example
//! ```rust
//! use omr_inter::text::{parse_chord_name, ChordType, DegreeType};
//!
//! let chord = parse_chord_name("A(9)").unwrap();
//! assert_eq!(chord.kind.kind_type, ChordType::Major);
//! assert_eq!(chord.degrees[0].value, 9);
//! assert_eq!(chord.degrees[0].degree_type, DegreeType::Add);
//! assert!(parse_chord_name("Allegro").is_none());
//! ```

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::sig::Step;

const DELTA: &str = "\u{25B3}";
const FLAT: char = '\u{266D}';
const SHARP: char = '\u{266F}';

/// Group names and the semantic field each one feeds
pub mod groups {
    pub const ROOT_STEP: &str = "rootStep";
    pub const ROOT_ALTER: &str = "rootAlter";
    pub const BASS_STEP: &str = "bassStep";
    pub const BASS_ALTER: &str = "bassAlter";
    pub const KIND: &str = "kind";
    pub const MAJ: &str = "maj";
    pub const MIN: &str = "min";
    pub const AUG: &str = "aug";
    pub const DIM: &str = "dim";
    pub const HDIM: &str = "hdim";
    pub const PMAJ7: &str = "pmaj7";
    pub const DEGS: &str = "degs";
    pub const SUS: &str = "sus";
    pub const PARS: &str = "pars";
    pub const NOPARS: &str = "nopars";
    pub const DEG_ALTER: &str = "degAlter";
    pub const DEG_VALUE: &str = "degValue";
}

const ALTER_CLASS: &str = "[\u{266D}b\u{266F}#]";
const DEG_CLASS: &str = "(?:5|6|7|9|11|13)";

static CHORD_PATTERN: Lazy<Regex> = Lazy::new(|| {
    let root = format!("(?P<rootStep>[A-G])(?P<rootAlter>{ALTER_CLASS})?");
    let maj = format!("(?P<maj>M|[Mm][Aa][Jj]|{DELTA})");
    let min = "(?P<min>m|[Mm][Ii][Nn]|-)";
    let aug = r"(?P<aug>[Aa][Uu][Gg]|\+)";
    let dim = "(?P<dim>[Dd][Ii][Mm]|\u{00B0})";
    let hdim = "(?P<hdim>\u{00F8})";
    let mode = format!("(?:{maj}|{min}|{aug}|{dim}|{hdim})");
    let pmaj7 = format!(r"(?:\((?P<pmaj7>(?:M|[Mm][Aa][Jj]|{DELTA})7)\))");
    let degs = format!("(?P<degs>{DEG_CLASS}(?:{ALTER_CLASS}{DEG_CLASS})?)");
    let sus = "(?P<sus>[Ss][Uu][Ss][24])";
    let kind = format!("(?P<kind>{mode}?{pmaj7}?{degs}?{sus}?)");
    let deg_list = format!("{ALTER_CLASS}?{DEG_CLASS}(?:{ALTER_CLASS}{DEG_CLASS})*");
    let extra = format!(r"(?:\((?P<pars>{deg_list})\)|(?P<nopars>{deg_list}))");
    let bass = format!("(?:/(?P<bassStep>[A-G])(?P<bassAlter>{ALTER_CLASS})?)");
    let raw = format!("^{root}{kind}?{extra}?{bass}?$");
    Regex::new(&raw).expect("chord name pattern is valid")
});

static DEGREE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    let raw = format!("(?P<degAlter>{ALTER_CLASS})?(?P<degValue>5|6|7|9|11|13)");
    Regex::new(&raw).expect("degree pattern is valid")
});

/// Semitone alteration of an alter token
fn alter_of(token: &str) -> i32 {
    match token {
        "#" | "\u{266F}" => 1,
        "b" | "\u{266D}" => -1,
        _ => 0,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamePitch {
    pub step: Step,
    /// Semitones, -1 flat, +1 sharp
    pub alter: i32,
}

impl NamePitch {
    fn create(step: &str, alter: &str) -> Option<NamePitch> {
        let step = Step::from_char(step.chars().next()?)?;
        Some(NamePitch {
            step,
            alter: alter_of(alter),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChordType {
    Major,
    Minor,
    Augmented,
    Diminished,
    Dominant,
    MajorSeventh,
    MinorSeventh,
    DiminishedSeventh,
    AugmentedSeventh,
    HalfDiminished,
    MajorMinor,
    MajorSixth,
    MinorSixth,
    DominantNinth,
    MajorNinth,
    MinorNinth,
    Dominant11th,
    Major11th,
    Minor11th,
    Dominant13th,
    Major13th,
    Minor13th,
    SuspendedSecond,
    SuspendedFourth,
    Power,
    Other,
    None,
}

impl ChordType {
    /// Type for the concatenation of standardized mode tokens and dominant
    fn of(key: &str) -> Option<ChordType> {
        let t = match key {
            "" | "maj" => ChordType::Major,
            "min" => ChordType::Minor,
            "aug" => ChordType::Augmented,
            "dim" => ChordType::Diminished,
            "5" => ChordType::Power,
            "7" => ChordType::Dominant,
            "maj7" => ChordType::MajorSeventh,
            "min7" => ChordType::MinorSeventh,
            "dim7" => ChordType::DiminishedSeventh,
            "aug7" => ChordType::AugmentedSeventh,
            "hdim" | "hdim7" => ChordType::HalfDiminished,
            "minpmaj7" => ChordType::MajorMinor,
            "maj6" | "6" => ChordType::MajorSixth,
            "min6" => ChordType::MinorSixth,
            "9" => ChordType::DominantNinth,
            "maj9" => ChordType::MajorNinth,
            "min9" => ChordType::MinorNinth,
            "11" => ChordType::Dominant11th,
            "maj11" => ChordType::Major11th,
            "min11" => ChordType::Minor11th,
            "13" => ChordType::Dominant13th,
            "maj13" => ChordType::Major13th,
            "min13" => ChordType::Minor13th,
            _ => return None,
        };
        Some(t)
    }

    fn is_suspended(self) -> bool {
        matches!(self, ChordType::SuspendedSecond | ChordType::SuspendedFourth)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChordKind {
    pub kind_type: ChordType,
    /// Kind text as written
    pub text: String,
    /// Written with a symbol (triangle, minus or plus sign)
    pub symbol: bool,
    /// Degrees given within parentheses
    pub parentheses: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DegreeType {
    Add,
    Alter,
    Subtract,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Degree {
    pub value: u8,
    pub alter: i32,
    pub degree_type: DegreeType,
}

impl Degree {
    /// Degrees found in a degree sequence such as `7b13`
    pub fn create_list(text: &str, dominant: Option<&Degree>) -> Vec<Degree> {
        DEGREE_PATTERN
            .captures_iter(text)
            .filter_map(|caps| {
                let value: u8 = caps.name(groups::DEG_VALUE)?.as_str().parse().ok()?;
                let alter = caps.name(groups::DEG_ALTER).map(|m| alter_of(m.as_str())).unwrap_or(0);
                let degree_type = match dominant {
                    Some(d) if d.value > value => DegreeType::Alter,
                    _ if value <= 5 => DegreeType::Alter,
                    _ => DegreeType::Add,
                };
                Some(Degree {
                    value,
                    alter,
                    degree_type,
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChordName {
    /// Normalized text, with musical flat and sharp signs
    pub value: String,
    pub root: NamePitch,
    pub kind: ChordKind,
    pub bass: Option<NamePitch>,
    pub degrees: Vec<Degree>,
}

fn group<'t>(caps: &Captures<'t>, name: &str) -> &'t str {
    caps.name(name).map(|m| m.as_str()).unwrap_or("")
}

/// Standardized token of a mode group: its name when present
fn standard(caps: &Captures<'_>, name: &'static str) -> &'static str {
    if caps.name(name).is_some() {
        name
    } else {
        ""
    }
}

/// Replace ASCII alteration letters with musical signs
pub fn normalize(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            'b' => FLAT,
            '#' => SHARP,
            other => other,
        })
        .collect()
}

fn parse_kind(caps: &Captures<'_>, dominant: &str) -> ChordKind {
    let text = group(caps, groups::KIND).to_string();
    let parentheses = caps.name(groups::PARS).is_some();

    let suspended = match group(caps, groups::SUS).to_lowercase().as_str() {
        "sus2" => Some(ChordType::SuspendedSecond),
        "sus4" => Some(ChordType::SuspendedFourth),
        _ => None,
    };
    if let Some(kind_type) = suspended {
        return ChordKind {
            kind_type,
            text,
            symbol: false,
            parentheses,
        };
    }

    let pmaj7 = standard(caps, groups::PMAJ7);
    let key = format!(
        "{}{}{}{}{}{}{}",
        standard(caps, groups::MIN),
        standard(caps, groups::MAJ),
        standard(caps, groups::AUG),
        standard(caps, groups::DIM),
        standard(caps, groups::HDIM),
        dominant,
        pmaj7
    );
    let mut kind_type = match ChordType::of(&key) {
        Some(t) => t,
        None => {
            warn!("No chord kind for {:?}", key);
            ChordType::Other
        }
    };

    let delta = group(caps, groups::MAJ) == DELTA;
    if kind_type == ChordType::Major && delta {
        kind_type = ChordType::MajorSeventh;
    }
    let symbol = delta || group(caps, groups::MIN) == "-" || group(caps, groups::AUG) == "+";

    ChordKind {
        kind_type,
        text,
        symbol,
        parentheses,
    }
}

/// Parse a chord symbol, None when the text is not a chord name
pub fn parse_chord_name(text: &str) -> Option<ChordName> {
    let text = text.trim();
    let Some(caps) = CHORD_PATTERN.captures(text) else {
        debug!("No pattern match for chord text {:?}", text);
        return None;
    };

    let root = NamePitch::create(group(&caps, groups::ROOT_STEP), group(&caps, groups::ROOT_ALTER))?;

    // No dominant yet: a degree following it in `degs` (the 9 of `C13b9`)
    // is an addition, unlike the same degree in the extra clause
    let mut degrees = Degree::create_list(group(&caps, groups::DEGS), None);
    let first = degrees.first().copied();
    let dominant = first.map(|d| d.value.to_string()).unwrap_or_default();

    let mut kind = parse_kind(&caps, &dominant);

    let bass = match caps.name(groups::BASS_STEP) {
        Some(step) => NamePitch::create(step.as_str(), group(&caps, groups::BASS_ALTER)),
        None => None,
    };

    if first.is_some() && !kind.kind_type.is_suspended() {
        degrees.remove(0);
    }

    let extra = match caps.name(groups::PARS) {
        Some(m) => m.as_str(),
        None => group(&caps, groups::NOPARS),
    };
    degrees.extend(Degree::create_list(extra, first.as_ref()));

    // m7 with a flat fifth is the half-diminished seventh
    if kind.kind_type == ChordType::MinorSeventh {
        if let Some(pos) = degrees
            .iter()
            .position(|d| d.value == 5 && d.alter == -1 && d.degree_type == DegreeType::Alter)
        {
            degrees.remove(pos);
            kind.kind_type = ChordType::HalfDiminished;
        }
    }

    Some(ChordName {
        value: normalize(text),
        root,
        kind,
        bass,
        degrees,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minor_seventh() {
        let chord = parse_chord_name("Am7").unwrap();
        assert_eq!(chord.root, NamePitch { step: Step::A, alter: 0 });
        assert_eq!(chord.kind.kind_type, ChordType::MinorSeventh);
        assert!(chord.bass.is_none());
        assert!(chord.degrees.is_empty());
    }

    #[test]
    fn test_half_diminished_from_flat_fifth() {
        let chord = parse_chord_name("F#m7b5").unwrap();
        assert_eq!(chord.root, NamePitch { step: Step::F, alter: 1 });
        assert_eq!(chord.kind.kind_type, ChordType::HalfDiminished);
        assert!(chord.degrees.is_empty());
        assert_eq!(chord.value, "F\u{266F}m7\u{266D}5");
    }

    #[test]
    fn test_half_diminished_symbol() {
        let chord = parse_chord_name("B\u{00F8}").unwrap();
        assert_eq!(chord.kind.kind_type, ChordType::HalfDiminished);
        let chord = parse_chord_name("B\u{00F8}7").unwrap();
        assert_eq!(chord.kind.kind_type, ChordType::HalfDiminished);
    }

    #[test]
    fn test_parenthesized_addition() {
        let chord = parse_chord_name("A(9)").unwrap();
        assert_eq!(chord.kind.kind_type, ChordType::Major);
        assert!(chord.kind.parentheses);
        assert_eq!(
            chord.degrees,
            vec![Degree { value: 9, alter: 0, degree_type: DegreeType::Add }]
        );
    }

    #[test]
    fn test_major_seventh_with_bass() {
        let chord = parse_chord_name("BMaj7/D#").unwrap();
        assert_eq!(chord.kind.kind_type, ChordType::MajorSeventh);
        assert_eq!(chord.bass, Some(NamePitch { step: Step::D, alter: 1 }));
    }

    #[test]
    fn test_triangle_is_major_seventh() {
        let chord = parse_chord_name("C\u{25B3}").unwrap();
        assert_eq!(chord.kind.kind_type, ChordType::MajorSeventh);
        assert!(chord.kind.symbol);
    }

    #[test]
    fn test_minor_major_seventh() {
        let chord = parse_chord_name("Cm(maj7)").unwrap();
        assert_eq!(chord.kind.kind_type, ChordType::MajorMinor);
    }

    #[test]
    fn test_symbols() {
        assert!(parse_chord_name("C-7").unwrap().kind.symbol);
        assert_eq!(parse_chord_name("C+").unwrap().kind.kind_type, ChordType::Augmented);
        assert_eq!(parse_chord_name("Cdim7").unwrap().kind.kind_type, ChordType::DiminishedSeventh);
        assert_eq!(parse_chord_name("C\u{00B0}").unwrap().kind.kind_type, ChordType::Diminished);
    }

    #[test]
    fn test_suspended_keeps_dominant() {
        let chord = parse_chord_name("G7sus4").unwrap();
        assert_eq!(chord.kind.kind_type, ChordType::SuspendedFourth);
        assert_eq!(chord.degrees.len(), 1);
        assert_eq!(chord.degrees[0].value, 7);
        assert_eq!(chord.degrees[0].degree_type, DegreeType::Add);
    }

    #[test]
    fn test_alterations_after_dominant() {
        let chord = parse_chord_name("C13(b9#11)").unwrap();
        assert_eq!(chord.kind.kind_type, ChordType::Dominant13th);
        assert_eq!(
            chord.degrees,
            vec![
                Degree { value: 9, alter: -1, degree_type: DegreeType::Alter },
                Degree { value: 11, alter: 1, degree_type: DegreeType::Alter },
            ]
        );
    }

    #[test]
    fn test_degree_inside_dominant_group_is_added() {
        let chord = parse_chord_name("C13b9").unwrap();
        assert_eq!(
            chord.degrees,
            vec![Degree { value: 9, alter: -1, degree_type: DegreeType::Add }]
        );
    }

    #[test]
    fn test_bare_extra_degrees() {
        let chord = parse_chord_name("C7b9#11").unwrap();
        assert_eq!(chord.kind.kind_type, ChordType::Dominant);
        assert_eq!(chord.degrees.len(), 2);
        assert!(!chord.kind.parentheses);
    }

    #[test]
    fn test_no_match() {
        assert!(parse_chord_name("").is_none());
        assert!(parse_chord_name("H7").is_none());
        assert!(parse_chord_name("Cmaj7 foo").is_none());
    }
}
