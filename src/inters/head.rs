//! Note heads: creation from a staff location, and head-side queries.

use crate::geom::{Point, Rect};
use crate::layout::StaffId;
use crate::shape::Shape;
use crate::sig::{ClefKind, HeadData, Inter, InterId, RelationKind, Sig};
use crate::system::System;

/// Head width, in interline fractions
const HEAD_WIDTH: f64 = 1.2;

/// Reduction ratio of small (cue or grace) heads
const SMALL_RATIO: f64 = 0.67;

/// New head centered on a point of a staff
///
/// The pitch position is snapped to the nearest line or space, step and
/// octave follow the clef in effect (treble when none). None if the staff is
/// unknown.
pub fn create(system: &System, shape: Shape, staff: StaffId, center: Point, grade: f64) -> Option<Inter> {
    let st = system.layout.staff(staff)?;
    let pitch = st.pitch_position_of(&center).round();
    let clef = system.effective_clef(staff, center.x).unwrap_or(ClefKind::Treble);
    let (step, octave) = clef.note(pitch as i32);

    let ratio = if shape.is_small_head() { SMALL_RATIO } else { 1.0 };
    let interline = system.scale.interline();
    let bounds = Rect::around(
        Point::new(center.x, st.y_at_pitch(pitch)),
        ratio * HEAD_WIDTH * interline / 2.0,
        ratio * interline / 2.0,
    );
    let data = HeadData {
        pitch,
        step,
        octave,
        alter: None,
    };
    Some(Inter::head(shape, grade, bounds, data).with_staff(staff, st.part))
}

/// Stems linked to the head
pub fn stems(sig: &Sig, head: InterId) -> Vec<InterId> {
    sig.partners(head, RelationKind::HeadStem)
}

/// Chord containing the head
pub fn chord(sig: &Sig, head: InterId) -> Option<InterId> {
    sig.ensemble_of(head, &[Shape::HeadChord])
}

/// Whether two heads denote the same pitch: step, octave and accidental
pub fn same_pitch(a: &HeadData, b: &HeadData) -> bool {
    a.step == b.step && a.octave == b.octave && a.alter == b.alter
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sig::Step;
    use crate::system::SystemBuilder;

    #[test]
    fn test_create_on_treble_staff() {
        let system = SystemBuilder::new(20.0).part(&[100.0]).build();
        // Third space from the top in treble clef is C5
        let head = create(&system, Shape::NoteheadBlack, StaffId(0), Point::new(200.0, 131.0), 0.8).unwrap();
        let data = head.as_head().unwrap();
        assert_eq!(data.pitch, -1.0);
        assert_eq!((data.step, data.octave), (Step::C, 5));
        assert_eq!(head.center(), Point::new(200.0, 130.0));
        assert_eq!(head.bounds.width, 24.0);
        assert!(create(&system, Shape::NoteheadBlack, StaffId(4), Point::new(0.0, 0.0), 0.8).is_none());
    }
}
