//! Chord name words and their chord link.

use tracing::{debug, info};

use crate::geom::Rect;
use crate::layout::StaffId;
use crate::link::Link;
use crate::shape::Shape;
use crate::sig::{ChordNameData, Inter, InterData, InterId, Relation, RelationKind, Sig, TextRole};
use crate::system::System;
use crate::text::{self, ChordName};

use super::chord;

/// New chord name word from its OCR'd text
///
/// Unparsable text is kept as is, with no structured name.
pub fn create(system: &System, text: &str, bounds: Rect, grade: f64, staff: Option<StaffId>) -> Inter {
    let name = text::parse_chord_name(text);
    if name.is_none() {
        debug!("{:?} kept as unparsed chord name", text);
    }
    let value = name.as_ref().map(|n| n.value.clone()).unwrap_or_else(|| text.trim().to_string());
    let mut inter = Inter::new(
        Shape::ChordName,
        grade,
        bounds,
        InterData::ChordName(ChordNameData { text: value, name }),
    );
    inter.staff = staff.or_else(|| system.layout.staff_at_or_below(&bounds.center()));
    inter.part = inter.staff.and_then(|s| system.layout.staff(s)).map(|s| s.part);
    inter
}

pub fn name(sig: &Sig, id: InterId) -> Option<&ChordName> {
    match &sig.inter(id)?.data {
        InterData::ChordName(data) => data.name.as_ref(),
        _ => None,
    }
}

pub fn value(sig: &Sig, id: InterId) -> Option<&str> {
    match &sig.inter(id)?.data {
        InterData::ChordName(data) => Some(data.text.as_str()),
        _ => None,
    }
}

/// Re-parse a chord name after its text was edited
pub fn set_value(sig: &mut Sig, id: InterId, text: &str) {
    let name = text::parse_chord_name(text);
    if let Some(inter) = sig.inter_mut(id) {
        if let InterData::ChordName(data) = &mut inter.data {
            data.text = name.as_ref().map(|n| n.value.clone()).unwrap_or_else(|| text.trim().to_string());
            data.name = name;
        }
    }
}

/// Link to the closest standard chord below the word center, in its stack
pub fn search_links(system: &System, id: InterId) -> Vec<Link> {
    let Some(inter) = system.sig.inter(id) else {
        return Vec::new();
    };
    let center = inter.center();
    let Some(stack) = system.layout.stack_at(&center) else {
        return Vec::new();
    };
    match chord::standard_chord_below(system, stack, &center) {
        Some(c) => vec![Link::new(c, Relation::ChordName, false)],
        None => {
            if inter.vip {
                info!("VIP chord name {} found no chord", id);
            }
            Vec::new()
        }
    }
}

pub fn chord(sig: &Sig, id: InterId) -> Option<InterId> {
    sig.partners(id, RelationKind::ChordName).into_iter().next()
}

/// Wrap the word in a sentence with the chord name role
pub fn wrap_in_sentence(system: &mut System, id: InterId) -> Option<InterId> {
    let inter = system.sig.inter(id)?;
    let text = value(&system.sig, id)?.to_string();
    let mut sentence = Inter::sentence(inter.grade, inter.bounds, TextRole::ChordName, &text);
    sentence.staff = inter.staff;
    sentence.part = inter.part;
    sentence.manual = true;
    let sentence = system.sig.add_vertex(sentence);
    system.sig.add_member(sentence, id);
    Some(sentence)
}

pub fn check_abnormal(sig: &Sig, id: InterId) -> bool {
    name(sig, id).is_none() || !sig.has_relation(id, RelationKind::ChordName)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Point;
    use crate::inters::head;
    use crate::system::SystemBuilder;
    use crate::text::ChordType;

    #[test]
    fn test_links_chord_below() {
        let mut system = SystemBuilder::new(20.0).part(&[100.0]).barlines(&[0.0, 400.0, 800.0]).build();
        let near = head::create(&system, Shape::WholeNote, StaffId(0), Point::new(150.0, 140.0), 0.8).unwrap();
        let near = system.add(near);
        let near = chord::build(&mut system, &[near], None);
        let far = head::create(&system, Shape::WholeNote, StaffId(0), Point::new(500.0, 140.0), 0.8).unwrap();
        let far = system.add(far);
        chord::build(&mut system, &[far], None);

        let word = create(&system, "Am7", Rect::new(135.0, 50.0, 40.0, 20.0), 0.9, None);
        assert_eq!(word.staff, Some(StaffId(0)));
        let word = system.add(word);
        assert_eq!(name(&system.sig, word).unwrap().kind.kind_type, ChordType::MinorSeventh);

        let links = search_links(&system, word);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].partner, near);
        assert!(!links[0].outgoing);
        system.apply(word, &links);
        assert_eq!(chord(&system.sig, word), Some(near));
        assert!(!check_abnormal(&system.sig, word));

        let sentence = wrap_in_sentence(&mut system, word).unwrap();
        assert_eq!(system.sig.members(sentence), &[word]);
    }

    #[test]
    fn test_unparsed_text_is_abnormal() {
        let mut system = SystemBuilder::new(20.0).part(&[100.0]).barlines(&[0.0, 400.0]).build();
        let word = create(&system, "Allegro", Rect::new(135.0, 50.0, 40.0, 20.0), 0.9, None);
        let word = system.add(word);
        assert_eq!(value(&system.sig, word), Some("Allegro"));
        assert!(check_abnormal(&system.sig, word));

        set_value(&mut system.sig, word, "Bb7");
        assert_eq!(value(&system.sig, word), Some("B\u{266D}7"));
        assert!(name(&system.sig, word).is_some());
    }
}
