//! Metronome marks: recognition from a text line, and the link to the first
//! chord of the system.

use tracing::{debug, info};

use crate::classifier::{Glyph, ShapeClassifier};
use crate::geom::{Point, Rect};
use crate::link::Link;
use crate::shape::Shape;
use crate::sig::{Inter, InterData, InterId, MetronomeData, Relation, RelationKind, Sig};
use crate::system::System;
use crate::text::{self, MetronomeModel};

use super::chord;

/// New metronome inter from a text line, with the recognition alerts
///
/// The note glyph, when given, is resubmitted to the classifier to get the
/// beat unit. An inter is produced even for a partially recognized line.
pub fn create(
    system: &System,
    line: &str,
    bounds: Rect,
    grade: f64,
    note_glyph: Option<&Glyph>,
    classifier: Option<&dyn ShapeClassifier>,
) -> (Inter, Vec<String>) {
    let recognition = text::recognize(line, note_glyph, classifier, &system.constants.metronome, false);
    if !recognition.valid {
        debug!("invalid metronome {:?}: {:?}", line, recognition.alerts);
    }
    let data = MetronomeData {
        text: recognition.words.join(" "),
        model: Some(recognition.model),
        valid: recognition.valid,
    };
    let mut inter = Inter::new(Shape::Metronome, grade, bounds, InterData::Metronome(data));
    inter.staff = system.layout.staff_at_or_below(&bounds.center());
    inter.part = inter.staff.and_then(|s| system.layout.staff(s)).map(|s| s.part);
    (inter, recognition.alerts)
}

pub fn model(sig: &Sig, id: InterId) -> Option<&MetronomeModel> {
    match &sig.inter(id)?.data {
        InterData::Metronome(data) => data.model.as_ref(),
        _ => None,
    }
}

pub fn is_valid(sig: &Sig, id: InterId) -> bool {
    matches!(&sig.inter(id).map(|i| &i.data), Some(InterData::Metronome(data)) if data.valid)
}

pub fn quarters_per_minute(sig: &Sig, id: InterId) -> Option<f64> {
    model(sig, id)?.quarters_per_minute()
}

/// Link to the first standard chord of the system, below the mark
///
/// The reference point sits at the left of the staff, so the precise
/// abscissa of the mark does not matter: stacks are tried from the left.
pub fn search_links(system: &System, id: InterId) -> Vec<Link> {
    let Some(inter) = system.sig.inter(id) else {
        return Vec::new();
    };
    let center = inter.center();
    let Some(staff) = inter
        .staff
        .or_else(|| system.layout.staff_at_or_below(&center))
        .and_then(|s| system.layout.staff(s))
    else {
        return Vec::new();
    };
    let reference = Point::new(staff.left, center.y);

    for stack in &system.layout.stacks {
        if let Some(c) = chord::standard_chord_below(system, stack, &reference) {
            return vec![Link::new(c, Relation::ChordSentence, false)];
        }
    }
    if inter.vip {
        info!("VIP metronome {} found no chord", id);
    }
    Vec::new()
}

pub fn chord(sig: &Sig, id: InterId) -> Option<InterId> {
    sig.partners(id, RelationKind::ChordSentence).into_iter().next()
}

/// Recognize an edited line again; returns the new alerts
pub fn set_value(system: &mut System, id: InterId, line: &str) -> Vec<String> {
    let recognition = text::recognize(line, None, None, &system.constants.metronome, false);
    if let Some(inter) = system.sig.inter_mut(id) {
        if let InterData::Metronome(data) = &mut inter.data {
            data.text = recognition.words.join(" ");
            data.model = Some(recognition.model);
            data.valid = recognition.valid;
        }
    }
    recognition.alerts
}

pub fn check_abnormal(sig: &Sig, id: InterId) -> bool {
    !is_valid(sig, id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::TableClassifier;
    use crate::inters::head;
    use crate::layout::StaffId;
    use crate::system::SystemBuilder;

    #[test]
    fn test_first_chord_of_system() {
        let mut system = SystemBuilder::new(20.0).part(&[100.0]).barlines(&[0.0, 400.0, 800.0]).build();
        let h = head::create(&system, Shape::WholeNote, StaffId(0), Point::new(500.0, 140.0), 0.8).unwrap();
        let h = system.add(h);
        let first = chord::build(&mut system, &[h], None);

        let (mark, alerts) = create(&system, "Andante q = 76", Rect::new(600.0, 40.0, 150.0, 30.0), 0.9, None, None);
        assert!(alerts.is_empty());
        let mark = system.add(mark);
        assert!(is_valid(&system.sig, mark));
        assert_eq!(quarters_per_minute(&system.sig, mark), Some(76.0));

        let links = search_links(&system, mark);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].partner, first);
        system.apply(mark, &links);
        assert_eq!(chord(&system.sig, mark), Some(first));
        assert!(!check_abnormal(&system.sig, mark));
    }

    #[test]
    fn test_classified_glyph_and_invalid_line() {
        let system = SystemBuilder::new(20.0).part(&[100.0]).barlines(&[0.0, 400.0]).build();
        let glyph = Glyph {
            id: 3,
            bounds: Rect::new(80.0, 40.0, 10.0, 25.0),
        };
        let classifier = TableClassifier::new().with(3, Shape::MetroHalf, 0.8);
        let (mark, _) = create(
            &system,
            "Lento (J = 50)",
            Rect::new(20.0, 40.0, 120.0, 30.0),
            0.9,
            Some(&glyph),
            Some(&classifier),
        );
        let mut system = system;
        let mark = system.add(mark);
        assert_eq!(model(&system.sig, mark).unwrap().unit, Some(Shape::MetroHalf));
        assert_eq!(quarters_per_minute(&system.sig, mark), Some(100.0));

        let alerts = set_value(&mut system, mark, "Lento = ");
        assert!(!alerts.is_empty());
        assert!(check_abnormal(&system.sig, mark));
    }
}
