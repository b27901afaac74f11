//! Interpretation records stored in the graph arena.

use serde::{Deserialize, Serialize};

use crate::geom::{CubicCurve, HorizontalSide, Line, Point, Rect, VerticalSide};
use crate::layout::{PartId, StaffId};
use crate::shape::Shape;
use crate::sig::InterId;
use crate::text::{ChordName, MetronomeModel};

/// Note step, natural letter of a pitch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Step {
    C,
    D,
    E,
    F,
    G,
    A,
    B,
}

impl Step {
    pub fn from_char(c: char) -> Option<Step> {
        match c {
            'C' => Some(Step::C),
            'D' => Some(Step::D),
            'E' => Some(Step::E),
            'F' => Some(Step::F),
            'G' => Some(Step::G),
            'A' => Some(Step::A),
            'B' => Some(Step::B),
            _ => None,
        }
    }

    fn index(self) -> i32 {
        match self {
            Step::C => 0,
            Step::D => 1,
            Step::E => 2,
            Step::F => 3,
            Step::G => 4,
            Step::A => 5,
            Step::B => 6,
        }
    }

    fn from_index(i: i32) -> Step {
        match i.rem_euclid(7) {
            0 => Step::C,
            1 => Step::D,
            2 => Step::E,
            3 => Step::F,
            4 => Step::G,
            5 => Step::A,
            _ => Step::B,
        }
    }
}

/// Kind of clef, which drives the note at each pitch position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClefKind {
    Treble,
    Alto,
    Bass,
    Tenor,
    Percussion,
}

impl ClefKind {
    /// Kind for a clef shape at a pitch position (C clefs depend on it)
    pub fn of(shape: Shape, pitch: f64) -> Option<ClefKind> {
        match shape {
            Shape::GClef | Shape::GClefSmall | Shape::GClef8va | Shape::GClef8vb => {
                Some(ClefKind::Treble)
            }
            Shape::FClef | Shape::FClefSmall | Shape::FClef8va | Shape::FClef8vb => {
                Some(ClefKind::Bass)
            }
            Shape::CClef if pitch.round() <= -2.0 => Some(ClefKind::Tenor),
            Shape::CClef => Some(ClefKind::Alto),
            Shape::PercussionClef => Some(ClefKind::Percussion),
            _ => None,
        }
    }

    /// Step and octave of a pitch position (0 = staff middle line, positive downward)
    pub fn note(self, pitch: i32) -> (Step, i32) {
        // Index of the middle line note, counted in diatonic steps from C0
        let middle = match self {
            ClefKind::Treble | ClefKind::Percussion => 4 * 7 + Step::B.index(),
            ClefKind::Alto => 4 * 7 + Step::C.index(),
            ClefKind::Bass => 3 * 7 + Step::D.index(),
            ClefKind::Tenor => 3 * 7 + Step::A.index(),
        };
        let index = middle - pitch;
        (Step::from_index(index), index.div_euclid(7))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BeamData {
    pub median: Line,
    pub height: f64,
}

impl BeamData {
    /// Top or bottom border of the beam
    pub fn border(&self, side: VerticalSide) -> Line {
        self.median.translated(0.0, side.direction() * self.height / 2.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StemData {
    pub top: Point,
    pub bottom: Point,
    pub width: f64,
}

impl StemData {
    /// Median line, from top to bottom
    pub fn median(&self) -> Line {
        Line::new(self.top, self.bottom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeadData {
    /// Pitch position, 0 on staff middle line, positive downward
    pub pitch: f64,
    pub step: Step,
    pub octave: i32,
    /// Accidental shape attached to the head, if any
    pub alter: Option<Shape>,
}

impl HeadData {
    pub fn integer_pitch(&self) -> i32 {
        self.pitch.round() as i32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ChordData {
    pub stem: Option<InterId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlterData {
    /// Pitch position of the sign
    pub pitch: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KeyData {
    pub fifths: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClefData {
    pub kind: ClefKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlurData {
    pub curve: CubicCurve,
    pub above: bool,
    pub tie: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OctaveKind {
    Alta,
    Bassa,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OctaveShiftData {
    pub line: Line,
    pub kind: OctaveKind,
    /// Direction of the closing hook, toward the staff
    pub hook: VerticalSide,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WedgeData {
    /// Upper line, from left to right
    pub l1: Line,
    /// Lower line, from left to right
    pub l2: Line,
}

impl WedgeData {
    /// Vertical opening at a side
    pub fn spread(&self, side: HorizontalSide) -> f64 {
        (self.l2.end(side).y - self.l1.end(side).y).abs()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EndingData {
    pub line: Line,
    pub left_leg: Option<Line>,
    pub right_leg: Option<Line>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextRole {
    EndingNumber,
    EndingText,
    ChordName,
    Metronome,
    Direction,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentenceData {
    pub role: TextRole,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChordNameData {
    pub text: String,
    pub name: Option<ChordName>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetronomeData {
    pub text: String,
    pub model: Option<MetronomeModel>,
    /// Whether beat unit and bpm were both recognized
    pub valid: bool,
}

/// Family-specific content of an inter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InterData {
    Beam(BeamData),
    Stem(StemData),
    Head(HeadData),
    Chord(ChordData),
    Rest,
    Flag,
    Barline(Line),
    Alter(AlterData),
    KeyAlter(AlterData),
    Key(KeyData),
    Clef(ClefData),
    Slur(SlurData),
    Tremolo,
    OctaveShift(OctaveShiftData),
    Wedge(WedgeData),
    Ending(EndingData),
    Sentence(SentenceData),
    ChordName(ChordNameData),
    Metronome(MetronomeData),
    BeamGroup,
}

/// Index-based links to the previous and next pieces of a split symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Extension {
    pub left: Option<InterId>,
    pub right: Option<InterId>,
}

impl Extension {
    pub fn get(&self, side: HorizontalSide) -> Option<InterId> {
        match side {
            HorizontalSide::Left => self.left,
            HorizontalSide::Right => self.right,
        }
    }

    pub fn set(&mut self, side: HorizontalSide, id: Option<InterId>) {
        match side {
            HorizontalSide::Left => self.left = id,
            HorizontalSide::Right => self.right = id,
        }
    }
}

/// A hypothesized symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inter {
    pub shape: Shape,
    pub grade: f64,
    pub bounds: Rect,
    pub data: InterData,
    pub staff: Option<StaffId>,
    pub part: Option<PartId>,
    pub abnormal: bool,
    pub manual: bool,
    pub removed: bool,
    pub vip: bool,
    pub extension: Extension,
}

impl Inter {
    /// New inter, grade clamped to [0, 1]
    pub fn new(shape: Shape, grade: f64, bounds: Rect, data: InterData) -> Self {
        Self {
            shape,
            grade: grade.clamp(0.0, 1.0),
            bounds,
            data,
            staff: None,
            part: None,
            abnormal: false,
            manual: false,
            removed: false,
            vip: false,
            extension: Extension::default(),
        }
    }

    pub fn beam(shape: Shape, grade: f64, median: Line, height: f64) -> Self {
        let data = BeamData { median, height };
        let bounds = data
            .border(VerticalSide::Top)
            .bounds()
            .union(&data.border(VerticalSide::Bottom).bounds());
        Self::new(shape, grade, bounds, InterData::Beam(data))
    }

    pub fn stem(grade: f64, top: Point, bottom: Point, width: f64) -> Self {
        let data = StemData { top, bottom, width };
        let bounds = data.median().bounds().grown(width / 2.0, 0.0);
        Self::new(Shape::Stem, grade, bounds, InterData::Stem(data))
    }

    pub fn head(shape: Shape, grade: f64, bounds: Rect, head: HeadData) -> Self {
        Self::new(shape, grade, bounds, InterData::Head(head))
    }

    pub fn chord(shape: Shape, grade: f64) -> Self {
        Self::new(shape, grade, Rect::default(), InterData::Chord(ChordData::default()))
    }

    pub fn barline(shape: Shape, grade: f64, line: Line, width: f64) -> Self {
        let bounds = line.bounds().grown(width / 2.0, 0.0);
        Self::new(shape, grade, bounds, InterData::Barline(line))
    }

    pub fn alter(shape: Shape, grade: f64, bounds: Rect, pitch: f64) -> Self {
        Self::new(shape, grade, bounds, InterData::Alter(AlterData { pitch }))
    }

    pub fn clef(shape: Shape, grade: f64, bounds: Rect, kind: ClefKind) -> Self {
        Self::new(shape, grade, bounds, InterData::Clef(ClefData { kind }))
    }

    pub fn slur(grade: f64, curve: CubicCurve) -> Self {
        let data = SlurData {
            curve,
            above: curve.is_above(),
            tie: false,
        };
        Self::new(Shape::Slur, grade, curve.bounds(), InterData::Slur(data))
    }

    pub fn wedge(shape: Shape, grade: f64, l1: Line, l2: Line) -> Self {
        let bounds = l1.bounds().union(&l2.bounds());
        Self::new(shape, grade, bounds, InterData::Wedge(WedgeData { l1, l2 }))
    }

    pub fn sentence(grade: f64, bounds: Rect, role: TextRole, text: &str) -> Self {
        let data = SentenceData {
            role,
            text: text.to_string(),
        };
        Self::new(Shape::Text, grade, bounds, InterData::Sentence(data))
    }

    pub fn center(&self) -> Point {
        self.bounds.center()
    }

    pub fn with_staff(mut self, staff: StaffId, part: PartId) -> Self {
        self.staff = Some(staff);
        self.part = Some(part);
        self
    }

    pub fn with_manual(mut self, manual: bool) -> Self {
        self.manual = manual;
        self
    }

    pub fn with_vip(mut self, vip: bool) -> Self {
        self.vip = vip;
        self
    }

    pub fn as_beam(&self) -> Option<&BeamData> {
        match &self.data {
            InterData::Beam(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_stem(&self) -> Option<&StemData> {
        match &self.data {
            InterData::Stem(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_head(&self) -> Option<&HeadData> {
        match &self.data {
            InterData::Head(h) => Some(h),
            _ => None,
        }
    }

    pub fn as_chord(&self) -> Option<&ChordData> {
        match &self.data {
            InterData::Chord(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_slur(&self) -> Option<&SlurData> {
        match &self.data {
            InterData::Slur(s) => Some(s),
            _ => None,
        }
    }

    /// Pitch position of an alteration sign or key member
    pub fn alter_pitch(&self) -> Option<f64> {
        match &self.data {
            InterData::Alter(a) | InterData::KeyAlter(a) => Some(a.pitch),
            _ => None,
        }
    }

    /// Standard (non-small) head chord
    pub fn is_standard_chord(&self) -> bool {
        self.shape == Shape::HeadChord
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clef_notes() {
        assert_eq!(ClefKind::Treble.note(0), (Step::B, 4));
        assert_eq!(ClefKind::Treble.note(6), (Step::C, 4));
        assert_eq!(ClefKind::Bass.note(0), (Step::D, 3));
        assert_eq!(ClefKind::Alto.note(-1), (Step::D, 4));
        assert_eq!(ClefKind::Tenor.note(0), (Step::A, 3));
    }

    #[test]
    fn test_c_clef_kind_from_pitch() {
        assert_eq!(ClefKind::of(Shape::CClef, 0.0), Some(ClefKind::Alto));
        assert_eq!(ClefKind::of(Shape::CClef, -2.0), Some(ClefKind::Tenor));
        assert_eq!(ClefKind::of(Shape::Sharp, 0.0), None);
    }

    #[test]
    fn test_beam_bounds_cover_both_borders() {
        let beam = Inter::beam(Shape::Beam, 0.8, Line::from_coords(10.0, 50.0, 60.0, 40.0), 8.0);
        assert_eq!(beam.bounds.x, 10.0);
        assert_eq!(beam.bounds.y, 36.0);
        assert_eq!(beam.bounds.bottom(), 54.0);
    }

    #[test]
    fn test_grade_clamped() {
        let stem = Inter::stem(1.4, Point::new(0.0, 0.0), Point::new(0.0, 40.0), 2.0);
        assert_eq!(stem.grade, 1.0);
    }

    #[test]
    fn test_wedge_spread() {
        let w = WedgeData {
            l1: Line::from_coords(0.0, 10.0, 50.0, 0.0),
            l2: Line::from_coords(0.0, 10.0, 50.0, 20.0),
        };
        assert_eq!(w.spread(HorizontalSide::Left), 0.0);
        assert_eq!(w.spread(HorizontalSide::Right), 20.0);
    }
}
