//! Text-pattern parsers for chord names and metronome marks.
//!
//! Both parsers are pure functions of the OCR'd text: a line that does not
//! match yields `None`, never an error.

pub mod chord_name;
pub mod metronome;

pub use chord_name::{
    parse_chord_name, ChordKind, ChordName, ChordType, Degree, DegreeType, NamePitch,
};
pub use metronome::{decode_beat_unit, parse_metronome, recognize, MetronomeModel, Recognition, Reporter};
