//! # Metronome Mark Parser
//!
//! Decomposes a metronome line such as `Allegretto (♩ = ca. 120-132)`.
//!
//! ## Grammar
//! ```text
//! line  = tempo? "("? note ("=" | ":") bpm-text ")"? garbage
//! bpm-text = non-digits bpm1 ("-" bpm2)? non-parenthesis
//! ```
//! The tempo is any text up to the opening parenthesis or the first music
//! glyph. The note is the beat unit, a music glyph that OCR usually misreads;
//! [`recognize`] can resubmit its pixels to a [`ShapeClassifier`].
//!
//! ## Example
//! ```rust
//! use omr_inter::shape::Shape;
//! use omr_inter::text::parse_metronome;
//!
//! let model = parse_metronome("Andante q = 76").unwrap();
//! assert_eq!(model.tempo, "Andante");
//! assert_eq!(model.unit, Some(Shape::MetroQuarter));
//! assert_eq!(model.bpm(), Some(76));
//! ```

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::classifier::{Glyph, ShapeClassifier};
use crate::config::MetronomeConstants;
use crate::shape::Shape;

/// Music glyph codes that may stand for a beat unit
const BEAT_CODES: &str = r"\x{1D15D}-\x{1D164}\x{1D16D}\x{2669}\x{266A}";

static METRONOME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    let space = r"\s*";
    let tempo = format!(r"(?P<tempo>[^\({BEAT_CODES}]*\s)?");
    let par_start = r"(?P<parStart>\()?";
    let note = "(?P<note>[^=:]+)";
    let equal = "(?P<equal>[=:])";
    let bpm = format!(r"(?P<bpm1>[0-9]+){space}(?P<bpmext>-{space}(?P<bpm2>[0-9]+))?");
    let bpm_text = format!(r"(?P<bpmtext>[^0-9]*{space}{bpm}{space}[^\)]*)");
    let par_stop = r"(?P<parStop>\))?";
    let garbage = "(?P<garbage>.*)";
    let raw = format!(
        "^{tempo}{par_start}{space}{note}{space}{equal}{space}{bpm_text}{par_stop}{space}{garbage}$"
    );
    Regex::new(&raw).expect("metronome pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetronomeModel {
    /// Tempo indication, such as "Allegretto", perhaps empty
    pub tempo: String,
    /// Beat unit, one of the METRO_* shapes
    pub unit: Option<Shape>,
    /// Text following the equal sign, such as "ca. 120-132"
    pub bpm_text: String,
    pub bpm1: Option<u32>,
    /// Upper bound of a bpm range
    pub bpm2: Option<u32>,
    pub parentheses: bool,
}

impl MetronomeModel {
    /// Single bpm value, the rounded-down mean for a range
    pub fn bpm(&self) -> Option<u32> {
        let bpm1 = self.bpm1?;
        match self.bpm2 {
            Some(bpm2) => Some((bpm1 + bpm2) / 2),
            None => Some(bpm1),
        }
    }

    /// Tempo expressed in quarters per minute
    pub fn quarters_per_minute(&self) -> Option<f64> {
        let unit = self.unit?.quarter_value()?;
        Some(unit * f64::from(self.bpm()?))
    }

    /// Texts of the member words: tempo, beat unit, bpm specification
    ///
    /// A colon separator is always rendered as an equal sign.
    pub fn words(&self) -> Vec<String> {
        let mut words = Vec::new();
        if !self.tempo.is_empty() {
            words.push(self.tempo.clone());
        }
        let open = if self.parentheses { "(" } else { "" };
        let unit = self.unit.and_then(beat_unit_char).map(String::from).unwrap_or_default();
        if !open.is_empty() || !unit.is_empty() {
            words.push(format!("{}{}", open, unit));
        }
        let close = if self.parentheses { ")" } else { "" };
        words.push(format!("= {}{}", self.bpm_text, close));
        words
    }
}

fn group<'t>(caps: &Captures<'t>, name: &str) -> &'t str {
    caps.name(name).map(|m| m.as_str()).unwrap_or("")
}

fn beat_unit_char(unit: Shape) -> Option<&'static str> {
    match unit {
        Shape::MetroWhole => Some("\u{1D15D}"),
        Shape::MetroHalf => Some("\u{1D15E}"),
        Shape::MetroHalfDot => Some("\u{1D15E}\u{1D16D}"),
        Shape::MetroQuarter => Some("\u{1D15F}"),
        Shape::MetroQuarterDot => Some("\u{1D15F}\u{1D16D}"),
        Shape::MetroEighth => Some("\u{1D160}"),
        Shape::MetroEighthDot => Some("\u{1D160}\u{1D16D}"),
        Shape::MetroSixteenth => Some("\u{1D161}"),
        _ => None,
    }
}

/// Decode a beat unit written as a music glyph or a letter (w, h, q, e, s)
///
/// A trailing `.` or augmentation dot glyph marks a dotted unit.
pub fn decode_beat_unit(text: &str) -> Option<Shape> {
    let text = text.trim();
    let (base, dotted) = match text.strip_suffix('.').or_else(|| text.strip_suffix('\u{1D16D}')) {
        Some(base) => (base.trim_end(), true),
        None => (text, false),
    };
    let plain = match base {
        "\u{1D15D}" | "w" | "W" => Shape::MetroWhole,
        "\u{1D15E}" | "h" | "H" => Shape::MetroHalf,
        "\u{1D15F}" | "\u{2669}" | "q" | "Q" => Shape::MetroQuarter,
        "\u{1D160}" | "\u{266A}" | "e" | "E" => Shape::MetroEighth,
        "\u{1D161}" | "s" | "S" => Shape::MetroSixteenth,
        _ => return None,
    };
    if !dotted {
        return Some(plain);
    }
    match plain {
        Shape::MetroHalf => Some(Shape::MetroHalfDot),
        Shape::MetroQuarter => Some(Shape::MetroQuarterDot),
        Shape::MetroEighth => Some(Shape::MetroEighthDot),
        _ => None,
    }
}

fn model_of(caps: &Captures<'_>, unit: Option<Shape>) -> MetronomeModel {
    MetronomeModel {
        tempo: group(caps, "tempo").trim().to_string(),
        unit,
        bpm_text: group(caps, "bpmtext").trim().to_string(),
        bpm1: group(caps, "bpm1").parse().ok(),
        bpm2: group(caps, "bpm2").parse().ok(),
        parentheses: caps.name("parStart").is_some() || caps.name("parStop").is_some(),
    }
}

/// Parse a metronome line, the beat unit decoded from its text
///
/// Returns None when the line does not look like a metronome mark.
pub fn parse_metronome(text: &str) -> Option<MetronomeModel> {
    let Some(caps) = METRONOME_PATTERN.captures(text.trim()) else {
        debug!("No metronome match for {:?}", text);
        return None;
    };
    let unit = decode_beat_unit(group(&caps, "note"));
    Some(model_of(&caps, unit))
}

/// Collector of recognition problems, which never stop the recognition
#[derive(Debug, Default)]
pub struct Reporter {
    quiet: bool,
    alerts: Vec<String>,
}

impl Reporter {
    pub fn new(quiet: bool) -> Self {
        Self {
            quiet,
            alerts: Vec::new(),
        }
    }

    /// Note a remark that does not invalidate the result
    pub fn info(&self, message: &str) {
        if !self.quiet {
            info!("{}", message);
        }
    }

    /// Note a problem that invalidates the result
    pub fn alert(&mut self, message: String) {
        if !self.quiet {
            info!("{}", message);
        }
        self.alerts.push(message);
    }

    pub fn alerts(&self) -> &[String] {
        &self.alerts
    }

    pub fn into_alerts(self) -> Vec<String> {
        self.alerts
    }
}

/// Outcome of a tolerant recognition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recognition {
    pub model: MetronomeModel,
    pub alerts: Vec<String>,
    /// Member word texts, built even for an invalid line
    pub words: Vec<String>,
    /// Both the beat unit and the bpm were recognized
    pub valid: bool,
}

/// Recognize a metronome line, tolerating partial failures
///
/// The beat unit is taken from the classifier evaluation of the note glyph
/// when available, else decoded from the note text.
pub fn recognize(
    text: &str,
    note_glyph: Option<&Glyph>,
    classifier: Option<&dyn ShapeClassifier>,
    constants: &MetronomeConstants,
    quiet: bool,
) -> Recognition {
    let mut reporter = Reporter::new(quiet);
    let line = text.trim();

    let caps = METRONOME_PATTERN.captures(line);
    if caps.is_none() {
        reporter.info(&format!("Invalid line: {}", line));
    }
    if !line.contains(|c| c == '=' || c == ':') {
        reporter.alert("No '=' character found".to_string());
    }

    let note_text = caps.as_ref().map(|c| group(c, "note").trim()).unwrap_or("");
    if note_text.is_empty() {
        reporter.alert(format!("Note characters not found in line: {}", line));
    }

    let mut unit = None;
    if let (Some(glyph), Some(classifier)) = (note_glyph, classifier) {
        unit = classifier
            .evaluate(glyph, constants.max_evaluation_rank, constants.min_grade)
            .into_iter()
            .find_map(|eval| eval.shape.beat_unit());
        if unit.is_none() {
            debug!("No beat unit evaluated for glyph#{}", glyph.id);
        }
    }
    if unit.is_none() {
        unit = decode_beat_unit(note_text);
    }
    if unit.is_none() && !note_text.is_empty() {
        reporter.alert(format!("Non recognized note {:?}", note_text));
    }

    let model = match &caps {
        Some(c) => model_of(c, unit),
        None => MetronomeModel {
            unit,
            ..MetronomeModel::default()
        },
    };

    let bpm1_text = caps.as_ref().map(|c| group(c, "bpm1")).unwrap_or("");
    if model.bpm1.is_none() {
        reporter.alert(format!("Non recognized bpm in {:?}", bpm1_text));
    }
    let bpm2_text = caps.as_ref().map(|c| group(c, "bpm2")).unwrap_or("");
    if !bpm2_text.is_empty() && model.bpm2.is_none() {
        reporter.alert(format!("Non recognized bpm2 in {:?}", bpm2_text));
    }

    let valid = model.unit.is_some() && model.bpm1.is_some();
    Recognition {
        words: model.words(),
        model,
        alerts: reporter.into_alerts(),
        valid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::TableClassifier;
    use crate::geom::Rect;

    #[test]
    fn test_range_with_tempo_and_parentheses() {
        let model = parse_metronome("Allegretto (\u{1D15F} = ca. 120-132)").unwrap();
        assert_eq!(model.tempo, "Allegretto");
        assert_eq!(model.unit, Some(Shape::MetroQuarter));
        assert_eq!(model.bpm1, Some(120));
        assert_eq!(model.bpm2, Some(132));
        assert_eq!(model.bpm_text, "ca. 120-132");
        assert!(model.parentheses);
        assert_eq!(model.bpm(), Some(126));
    }

    #[test]
    fn test_bare_mark() {
        let model = parse_metronome("\u{2669} = 60").unwrap();
        assert_eq!(model.tempo, "");
        assert_eq!(model.unit, Some(Shape::MetroQuarter));
        assert_eq!(model.bpm(), Some(60));
        assert!(!model.parentheses);
    }

    #[test]
    fn test_colon_and_dotted_unit() {
        let model = parse_metronome("h. : 40").unwrap();
        assert_eq!(model.unit, Some(Shape::MetroHalfDot));
        assert_eq!(model.quarters_per_minute(), Some(120.0));
        assert_eq!(model.words(), vec!["\u{1D15E}\u{1D16D}".to_string(), "= 40".to_string()]);
    }

    #[test]
    fn test_decode_beat_unit() {
        assert_eq!(decode_beat_unit("e"), Some(Shape::MetroEighth));
        assert_eq!(decode_beat_unit("\u{1D160}\u{1D16D}"), Some(Shape::MetroEighthDot));
        assert_eq!(decode_beat_unit("s."), None);
        assert_eq!(decode_beat_unit("x"), None);
    }

    #[test]
    fn test_not_a_metronome() {
        assert!(parse_metronome("Allegro").is_none());
        assert!(parse_metronome("q = fast").is_none());
    }

    #[test]
    fn test_recognize_with_classifier() {
        let classifier = TableClassifier::new().with(3, Shape::NoteheadVoid, 0.8);
        let glyph = Glyph {
            id: 3,
            bounds: Rect::new(0.0, 0.0, 12.0, 30.0),
        };
        let result = recognize("Adagio J = 50", Some(&glyph), Some(&classifier), &MetronomeConstants::default(), true);
        assert!(result.valid);
        assert_eq!(result.model.unit, Some(Shape::MetroHalf));
        assert!(result.alerts.is_empty());
    }

    #[test]
    fn test_recognize_reports_alerts() {
        let result = recognize("Adagio J = 50", None, None, &MetronomeConstants::default(), true);
        assert!(!result.valid);
        assert_eq!(result.model.bpm1, Some(50));
        assert_eq!(result.alerts.len(), 1);
        assert_eq!(result.words[0], "Adagio");

        let result = recognize("Adagio", None, None, &MetronomeConstants::default(), true);
        assert!(!result.valid);
        assert_eq!(result.alerts.len(), 3);
    }
}
