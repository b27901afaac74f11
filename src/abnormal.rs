//! Abnormality checks.
//!
//! An inter is abnormal when it lacks the relations its family needs to
//! make sense musically: a stem without head, a beam not resting on stems
//! at both ends. Abnormal inters stay in the graph, flagged for later
//! resolution or manual correction.

use tracing::debug;

use crate::inters::{beam, chord_name, ending, flag, key, metronome, octave_shift, slur, stem, tremolo, wedge};
use crate::shape::Shape;
use crate::sig::{InterId, RelationKind, Sig};

/// Whether an inter misses a required relation; false for families
/// without requirement
pub fn is_abnormal(sig: &Sig, id: InterId) -> bool {
    let Some(inter) = sig.inter(id) else {
        return false;
    };
    match inter.shape {
        Shape::Stem => stem::heads(sig, id).is_empty(),
        s if s.is_stemless_head() => false,
        s if s.is_head() => !sig.has_relation(id, RelationKind::HeadStem),
        s if s.is_flag() => flag::check_abnormal(sig, id),
        s if s.is_beam() => beam::check_abnormal(sig, id),
        Shape::Ending => ending::check_abnormal(sig, id),
        Shape::Slur => slur::check_abnormal(sig, id),
        s if s.is_octave_shift() => octave_shift::check_abnormal(sig, id),
        s if s.is_wedge() => wedge::check_abnormal(sig, id),
        s if s.is_tremolo() => tremolo::check_abnormal(sig, id),
        s if s.is_key() => key::check_abnormal(sig, id),
        Shape::Metronome => metronome::check_abnormal(sig, id),
        Shape::ChordName => chord_name::check_abnormal(sig, id),
        _ => false,
    }
}

/// Check an inter and record the outcome in its abnormal flag
pub fn check(sig: &mut Sig, id: InterId) -> bool {
    let abnormal = is_abnormal(sig, id);
    if let Some(inter) = sig.inter_mut(id) {
        if inter.abnormal != abnormal {
            debug!("{} abnormal: {}", id, abnormal);
        }
        inter.abnormal = abnormal;
    }
    abnormal
}

/// Check every live inter, returning the abnormal ones
pub fn check_all(sig: &mut Sig) -> Vec<InterId> {
    let ids = sig.inters(|_| true);
    ids.into_iter().filter(|id| check(sig, *id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Point;
    use crate::inters::{chord, head};
    use crate::layout::StaffId;
    use crate::sig::Inter;
    use crate::system::SystemBuilder;

    #[test]
    fn test_flags_follow_relations() {
        let mut system = SystemBuilder::new(20.0).part(&[100.0]).barlines(&[0.0, 400.0]).build();
        let black = head::create(&system, Shape::NoteheadBlack, StaffId(0), Point::new(100.0, 150.0), 0.8).unwrap();
        let black = system.add(black);
        let whole = head::create(&system, Shape::WholeNote, StaffId(0), Point::new(200.0, 150.0), 0.8).unwrap();
        let whole = system.add(whole);
        let lone = system.add(Inter::stem(0.8, Point::new(300.0, 80.0), Point::new(300.0, 140.0), 2.0));
        chord::build(&mut system, &[whole], None);

        let abnormal = check_all(&mut system.sig);
        assert!(abnormal.contains(&black));
        assert!(abnormal.contains(&lone));
        assert!(!abnormal.contains(&whole));
        assert!(system.sig.inter(lone).unwrap().abnormal);
        assert!(!system.sig.inter(whole).unwrap().abnormal);
    }
}
