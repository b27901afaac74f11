//! # Shape Module
//!
//! Closed catalogue of the symbol kinds an inter can take, plus the
//! shape-keyed tables used by the linkers (flag counts, tremolo values,
//! key fifths, octave shifts, beat-unit durations).
//!
//! ## Related Modules
//! - `sig::inter` - every inter record carries one `Shape`
//! - `inters::key` - uses the key-shape tables

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::error::InterError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Shape {
    // Beams
    Beam,
    BeamSmall,
    BeamHook,
    BeamHookSmall,

    Stem,

    // Heads
    NoteheadBlack,
    NoteheadBlackSmall,
    NoteheadVoid,
    NoteheadVoidSmall,
    WholeNote,
    WholeNoteSmall,

    // Flags (down flags hang below a stem up, up flags sit above a stem down)
    Flag1,
    Flag2,
    Flag3,
    Flag4,
    Flag5,
    Flag1Up,
    Flag2Up,
    Flag3Up,
    Flag4Up,
    Flag5Up,
    SmallFlag,
    SmallFlagSlash,

    // Alterations
    Flat,
    Natural,
    Sharp,
    DoubleSharp,
    DoubleFlat,

    // Key signatures
    KeyFlat7,
    KeyFlat6,
    KeyFlat5,
    KeyFlat4,
    KeyFlat3,
    KeyFlat2,
    KeyFlat1,
    KeyCancel,
    KeySharp1,
    KeySharp2,
    KeySharp3,
    KeySharp4,
    KeySharp5,
    KeySharp6,
    KeySharp7,

    // Clefs
    GClef,
    GClefSmall,
    GClef8va,
    GClef8vb,
    CClef,
    FClef,
    FClefSmall,
    FClef8va,
    FClef8vb,
    PercussionClef,

    // Bars
    ThinBarline,
    ThickBarline,

    Slur,

    Tremolo1,
    Tremolo2,
    Tremolo3,

    OttavaAlta,
    OttavaBassa,
    QuindicesimaAlta,
    QuindicesimaBassa,
    VentiduesimaAlta,
    VentiduesimaBassa,

    Crescendo,
    Diminuendo,

    Ending,

    // Rests
    QuarterRest,
    EighthRest,

    // Text
    Text,
    ChordName,
    Metronome,

    // Beat units as drawn in metronome marks
    MetroWhole,
    MetroHalf,
    MetroHalfDot,
    MetroQuarter,
    MetroQuarterDot,
    MetroEighth,
    MetroEighthDot,
    MetroSixteenth,

    // Ensembles
    HeadChord,
    RestChord,
    BeamGroup,
}

impl Shape {
    pub fn is_beam(self) -> bool {
        matches!(
            self,
            Shape::Beam | Shape::BeamSmall | Shape::BeamHook | Shape::BeamHookSmall
        )
    }

    pub fn is_beam_hook(self) -> bool {
        matches!(self, Shape::BeamHook | Shape::BeamHookSmall)
    }

    pub fn is_small_beam(self) -> bool {
        matches!(self, Shape::BeamSmall | Shape::BeamHookSmall)
    }

    pub fn is_head(self) -> bool {
        matches!(
            self,
            Shape::NoteheadBlack
                | Shape::NoteheadBlackSmall
                | Shape::NoteheadVoid
                | Shape::NoteheadVoidSmall
                | Shape::WholeNote
                | Shape::WholeNoteSmall
        )
    }

    pub fn is_small_head(self) -> bool {
        matches!(
            self,
            Shape::NoteheadBlackSmall | Shape::NoteheadVoidSmall | Shape::WholeNoteSmall
        )
    }

    /// Heads that never carry a stem
    pub fn is_stemless_head(self) -> bool {
        matches!(self, Shape::WholeNote | Shape::WholeNoteSmall)
    }

    pub fn is_flag(self) -> bool {
        self.flag_count().is_some()
    }

    pub fn is_small_flag(self) -> bool {
        matches!(self, Shape::SmallFlag | Shape::SmallFlagSlash)
    }

    /// Up flags hang from the top end of a stem going up
    pub fn is_flag_up(self) -> bool {
        matches!(
            self,
            Shape::Flag1Up | Shape::Flag2Up | Shape::Flag3Up | Shape::Flag4Up | Shape::Flag5Up
        )
    }

    /// Number of hooks drawn by a flag shape
    pub fn flag_count(self) -> Option<u8> {
        match self {
            Shape::Flag1 | Shape::Flag1Up | Shape::SmallFlag | Shape::SmallFlagSlash => Some(1),
            Shape::Flag2 | Shape::Flag2Up => Some(2),
            Shape::Flag3 | Shape::Flag3Up => Some(3),
            Shape::Flag4 | Shape::Flag4Up => Some(4),
            Shape::Flag5 | Shape::Flag5Up => Some(5),
            _ => None,
        }
    }

    pub fn is_alter(self) -> bool {
        matches!(
            self,
            Shape::Flat | Shape::Natural | Shape::Sharp | Shape::DoubleSharp | Shape::DoubleFlat
        )
    }

    pub fn is_key(self) -> bool {
        matches!(
            self,
            Shape::KeyFlat7
                | Shape::KeyFlat6
                | Shape::KeyFlat5
                | Shape::KeyFlat4
                | Shape::KeyFlat3
                | Shape::KeyFlat2
                | Shape::KeyFlat1
                | Shape::KeyCancel
                | Shape::KeySharp1
                | Shape::KeySharp2
                | Shape::KeySharp3
                | Shape::KeySharp4
                | Shape::KeySharp5
                | Shape::KeySharp6
                | Shape::KeySharp7
        )
    }

    pub fn is_clef(self) -> bool {
        matches!(
            self,
            Shape::GClef
                | Shape::GClefSmall
                | Shape::GClef8va
                | Shape::GClef8vb
                | Shape::CClef
                | Shape::FClef
                | Shape::FClefSmall
                | Shape::FClef8va
                | Shape::FClef8vb
                | Shape::PercussionClef
        )
    }

    pub fn is_barline(self) -> bool {
        matches!(self, Shape::ThinBarline | Shape::ThickBarline)
    }

    pub fn is_tremolo(self) -> bool {
        matches!(self, Shape::Tremolo1 | Shape::Tremolo2 | Shape::Tremolo3)
    }

    pub fn is_octave_shift(self) -> bool {
        matches!(
            self,
            Shape::OttavaAlta
                | Shape::OttavaBassa
                | Shape::QuindicesimaAlta
                | Shape::QuindicesimaBassa
                | Shape::VentiduesimaAlta
                | Shape::VentiduesimaBassa
        )
    }

    pub fn is_wedge(self) -> bool {
        matches!(self, Shape::Crescendo | Shape::Diminuendo)
    }

    pub fn is_rest(self) -> bool {
        matches!(self, Shape::QuarterRest | Shape::EighthRest)
    }

    /// Number of strokes of a tremolo shape
    pub fn tremolo_value(self) -> Option<u8> {
        match self {
            Shape::Tremolo1 => Some(1),
            Shape::Tremolo2 => Some(2),
            Shape::Tremolo3 => Some(3),
            _ => None,
        }
    }

    /// Tremolo shape for a stroke count
    ///
    /// # Errors
    /// Counts outside 1..=3 have no tremolo shape.
    pub fn tremolo_shape(count: u8) -> Result<Shape, InterError> {
        match count {
            1 => Ok(Shape::Tremolo1),
            2 => Ok(Shape::Tremolo2),
            3 => Ok(Shape::Tremolo3),
            _ => Err(InterError::Config(format!("No tremolo shape for {} strokes", count))),
        }
    }

    /// Signed count of sharps (positive) or flats (negative) for a key shape
    ///
    /// KEY_CANCEL reports 0.
    pub fn key_fifths(self) -> Result<i32, InterError> {
        match self {
            Shape::KeyFlat7 => Ok(-7),
            Shape::KeyFlat6 => Ok(-6),
            Shape::KeyFlat5 => Ok(-5),
            Shape::KeyFlat4 => Ok(-4),
            Shape::KeyFlat3 => Ok(-3),
            Shape::KeyFlat2 => Ok(-2),
            Shape::KeyFlat1 => Ok(-1),
            Shape::KeyCancel => Ok(0),
            Shape::KeySharp1 => Ok(1),
            Shape::KeySharp2 => Ok(2),
            Shape::KeySharp3 => Ok(3),
            Shape::KeySharp4 => Ok(4),
            Shape::KeySharp5 => Ok(5),
            Shape::KeySharp6 => Ok(6),
            Shape::KeySharp7 => Ok(7),
            other => Err(InterError::UnsupportedShape {
                shape: other,
                context: "key fifths",
            }),
        }
    }

    /// Key shape for a signed fifths count, KEY_CANCEL for 0
    pub fn key_shape(fifths: i32) -> Result<Shape, InterError> {
        match fifths {
            -7 => Ok(Shape::KeyFlat7),
            -6 => Ok(Shape::KeyFlat6),
            -5 => Ok(Shape::KeyFlat5),
            -4 => Ok(Shape::KeyFlat4),
            -3 => Ok(Shape::KeyFlat3),
            -2 => Ok(Shape::KeyFlat2),
            -1 => Ok(Shape::KeyFlat1),
            0 => Ok(Shape::KeyCancel),
            1 => Ok(Shape::KeySharp1),
            2 => Ok(Shape::KeySharp2),
            3 => Ok(Shape::KeySharp3),
            4 => Ok(Shape::KeySharp4),
            5 => Ok(Shape::KeySharp5),
            6 => Ok(Shape::KeySharp6),
            7 => Ok(Shape::KeySharp7),
            _ => Err(InterError::Config(format!("No key shape for {} fifths", fifths))),
        }
    }

    /// Octave shift value written on the sign (8, 15 or 22)
    pub fn octave_shift_value(self) -> Option<u8> {
        match self {
            Shape::OttavaAlta | Shape::OttavaBassa => Some(8),
            Shape::QuindicesimaAlta | Shape::QuindicesimaBassa => Some(15),
            Shape::VentiduesimaAlta | Shape::VentiduesimaBassa => Some(22),
            _ => None,
        }
    }

    /// Number of octaves moved, positive upward
    pub fn octave_shift(self) -> Option<i32> {
        match self {
            Shape::OttavaAlta => Some(1),
            Shape::OttavaBassa => Some(-1),
            Shape::QuindicesimaAlta => Some(2),
            Shape::QuindicesimaBassa => Some(-2),
            Shape::VentiduesimaAlta => Some(3),
            Shape::VentiduesimaBassa => Some(-3),
            _ => None,
        }
    }

    /// Duration of a beat-unit glyph, in quarters
    pub fn quarter_value(self) -> Option<f64> {
        match self {
            Shape::MetroWhole => Some(4.0),
            Shape::MetroHalf => Some(2.0),
            Shape::MetroHalfDot => Some(3.0),
            Shape::MetroQuarter => Some(1.0),
            Shape::MetroQuarterDot => Some(1.5),
            Shape::MetroEighth => Some(0.5),
            Shape::MetroEighthDot => Some(0.75),
            Shape::MetroSixteenth => Some(0.25),
            _ => None,
        }
    }

    /// Beat-unit shape for a note glyph evaluated by the classifier
    ///
    /// Classifiers report plain heads and flags; the beat unit is the note
    /// they stand for.
    pub fn beat_unit(self) -> Option<Shape> {
        match self {
            Shape::MetroWhole
            | Shape::MetroHalf
            | Shape::MetroHalfDot
            | Shape::MetroQuarter
            | Shape::MetroQuarterDot
            | Shape::MetroEighth
            | Shape::MetroEighthDot
            | Shape::MetroSixteenth => Some(self),
            Shape::WholeNote => Some(Shape::MetroWhole),
            Shape::NoteheadVoid => Some(Shape::MetroHalf),
            Shape::NoteheadBlack => Some(Shape::MetroQuarter),
            Shape::Flag1 | Shape::Flag1Up => Some(Shape::MetroEighth),
            Shape::Flag2 | Shape::Flag2Up => Some(Shape::MetroSixteenth),
            _ => None,
        }
    }
}

/// Value lookup that logs and substitutes a default for unsupported shapes
pub fn or_default<T: Default>(result: Result<T, InterError>) -> T {
    match result {
        Ok(v) => v,
        Err(e) => {
            error!("{}", e);
            T::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_shape_roundtrip_all_fifths() {
        for fifths in -7..=7 {
            let shape = Shape::key_shape(fifths).unwrap();
            assert!(shape.is_key());
            assert_eq!(shape.key_fifths().unwrap(), fifths);
        }
        assert!(Shape::key_shape(8).is_err());
    }

    #[test]
    fn test_key_fifths_unsupported_shape() {
        let result = Shape::Sharp.key_fifths();
        assert!(matches!(result, Err(InterError::UnsupportedShape { .. })));
        assert_eq!(or_default(Shape::Sharp.key_fifths()), 0);
    }

    #[test]
    fn test_tremolo_tables() {
        assert_eq!(Shape::Tremolo2.tremolo_value(), Some(2));
        assert_eq!(Shape::tremolo_shape(3).unwrap(), Shape::Tremolo3);
        assert!(Shape::tremolo_shape(4).is_err());
    }

    #[test]
    fn test_flags() {
        assert_eq!(Shape::Flag3Up.flag_count(), Some(3));
        assert!(Shape::Flag3Up.is_flag_up());
        assert!(!Shape::Flag3.is_flag_up());
        assert!(Shape::SmallFlag.is_flag());
        assert!(!Shape::Stem.is_flag());
    }

    #[test]
    fn test_octave_shift_tables() {
        assert_eq!(Shape::QuindicesimaBassa.octave_shift_value(), Some(15));
        assert_eq!(Shape::QuindicesimaBassa.octave_shift(), Some(-2));
        assert_eq!(Shape::Crescendo.octave_shift(), None);
    }

    #[test]
    fn test_beat_units() {
        assert_eq!(Shape::NoteheadBlack.beat_unit(), Some(Shape::MetroQuarter));
        assert_eq!(Shape::MetroQuarterDot.quarter_value(), Some(1.5));
        assert_eq!(Shape::Sharp.beat_unit(), None);
    }
}
