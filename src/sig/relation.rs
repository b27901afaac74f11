//! Typed relations carried by graph edges.

use serde::{Deserialize, Serialize};

use crate::config::Constants;
use crate::geom::{HorizontalSide, Point};

/// Portion of a beam where a stem connects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BeamPortion {
    Left,
    Center,
    Right,
}

impl BeamPortion {
    pub fn side(self) -> Option<HorizontalSide> {
        match self {
            BeamPortion::Left => Some(HorizontalSide::Left),
            BeamPortion::Right => Some(HorizontalSide::Right),
            BeamPortion::Center => None,
        }
    }
}

/// Gaps of a connection, in interline fractions
///
/// `x` is signed: negative for an overlap between partners.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Gaps {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeamStem {
    pub portion: BeamPortion,
    pub gaps: Gaps,
    pub grade: f64,
    /// Point where the stem would end if extended to the beam far border
    pub extension_point: Point,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeadStem {
    /// Side of the head where the stem lies
    pub head_side: HorizontalSide,
    pub gaps: Gaps,
    pub grade: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlagStem {
    pub gaps: Gaps,
    pub grade: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EndingBar {
    pub side: HorizontalSide,
    /// Abscissa gap between leg and barline, in interline fractions
    pub gap: f64,
    pub grade: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlurHead {
    pub side: HorizontalSide,
    /// Distance between slur end target and head, in interline fractions
    pub distance: f64,
    pub grade: f64,
}

/// Tremolo with a stem or a stemless head
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TremoloLink {
    pub dx: f64,
    pub dy: f64,
    pub grade: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Relation {
    BeamStem(BeamStem),
    HeadStem(HeadStem),
    FlagStem(FlagStem),
    /// Rest interleaved in a beam, on a portion of it
    BeamRest(BeamPortion),
    EndingBar(EndingBar),
    EndingSentence,
    SlurHead(SlurHead),
    TremoloStem(TremoloLink),
    TremoloWhole(TremoloLink),
    ChordOrnament,
    ChordOctaveShift(HorizontalSide),
    ChordWedge(HorizontalSide),
    KeyAlters,
    ChordName,
    ChordSentence,
    AlterHead,
    Containment,
}

/// Relation discriminant, used for graph queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationKind {
    BeamStem,
    HeadStem,
    FlagStem,
    BeamRest,
    EndingBar,
    EndingSentence,
    SlurHead,
    TremoloStem,
    TremoloWhole,
    ChordOrnament,
    ChordOctaveShift,
    ChordWedge,
    KeyAlters,
    ChordName,
    ChordSentence,
    AlterHead,
    Containment,
}

impl Relation {
    pub fn kind(&self) -> RelationKind {
        match self {
            Relation::BeamStem(_) => RelationKind::BeamStem,
            Relation::HeadStem(_) => RelationKind::HeadStem,
            Relation::FlagStem(_) => RelationKind::FlagStem,
            Relation::BeamRest(_) => RelationKind::BeamRest,
            Relation::EndingBar(_) => RelationKind::EndingBar,
            Relation::EndingSentence => RelationKind::EndingSentence,
            Relation::SlurHead(_) => RelationKind::SlurHead,
            Relation::TremoloStem(_) => RelationKind::TremoloStem,
            Relation::TremoloWhole(_) => RelationKind::TremoloWhole,
            Relation::ChordOrnament => RelationKind::ChordOrnament,
            Relation::ChordOctaveShift(_) => RelationKind::ChordOctaveShift,
            Relation::ChordWedge(_) => RelationKind::ChordWedge,
            Relation::KeyAlters => RelationKind::KeyAlters,
            Relation::ChordName => RelationKind::ChordName,
            Relation::ChordSentence => RelationKind::ChordSentence,
            Relation::AlterHead => RelationKind::AlterHead,
            Relation::Containment => RelationKind::Containment,
        }
    }

    /// Quality of the relation, structural relations report 1
    pub fn grade(&self) -> f64 {
        match self {
            Relation::BeamStem(r) => r.grade,
            Relation::HeadStem(r) => r.grade,
            Relation::FlagStem(r) => r.grade,
            Relation::EndingBar(r) => r.grade,
            Relation::SlurHead(r) => r.grade,
            Relation::TremoloStem(r) | Relation::TremoloWhole(r) => r.grade,
            _ => 1.0,
        }
    }

    /// Side carried by the relation, if any
    pub fn side(&self) -> Option<HorizontalSide> {
        match self {
            Relation::BeamStem(r) => r.portion.side(),
            Relation::BeamRest(portion) => portion.side(),
            Relation::EndingBar(r) => Some(r.side),
            Relation::SlurHead(r) => Some(r.side),
            Relation::ChordOctaveShift(side) | Relation::ChordWedge(side) => Some(*side),
            _ => None,
        }
    }

    /// Support coefficients (source, target), None for non-supporting relations
    pub fn support_coeffs(&self, constants: &Constants) -> Option<(f64, f64)> {
        match self {
            Relation::BeamStem(_) => Some((
                constants.beam_stem.source_coeff,
                constants.beam_stem.target_coeff,
            )),
            Relation::HeadStem(_) => Some((
                constants.head_stem.source_coeff,
                constants.head_stem.target_coeff,
            )),
            Relation::FlagStem(_) => Some((
                constants.flag_stem.source_coeff,
                constants.flag_stem.target_coeff,
            )),
            Relation::KeyAlters => Some((0.5, 0.5)),
            Relation::TremoloStem(_) | Relation::TremoloWhole(_) => Some((1.0, 0.0)),
            _ => None,
        }
    }
}
