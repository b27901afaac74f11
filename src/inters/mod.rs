//! # Inter Families
//!
//! One module per family of symbols. Each module knows how to find the
//! partners of an inter of its family and how to query the relations it
//! ended up with.
//!
//! ## Link search
//! Searches never mutate the graph: they return [`Link`] proposals that the
//! caller applies. [`search_links`] dispatches on the inter shape and
//! [`link`] replaces the family relations of an inter with fresh ones.
//!
//! ## Related Modules
//! - `abnormal` - per-family abnormality checks
//! - `edit` - drafts that relink on commit

pub mod beam;
pub mod chord;
pub mod chord_name;
pub mod ending;
pub mod flag;
pub mod head;
pub mod key;
pub mod metronome;
pub mod octave_shift;
pub mod slur;
pub mod stem;
pub mod tremolo;
pub mod wedge;

use tracing::debug;

use crate::link::Link;
use crate::shape::Shape;
use crate::sig::{InterId, RelationId, RelationKind};
use crate::system::System;

/// Relation kinds produced by the link search of a shape
pub fn relation_kinds(shape: Shape) -> &'static [RelationKind] {
    match shape {
        s if s.is_beam() => &[RelationKind::BeamStem],
        Shape::Stem => &[RelationKind::HeadStem],
        s if s.is_flag() => &[RelationKind::FlagStem],
        Shape::Ending => &[RelationKind::EndingBar, RelationKind::EndingSentence],
        Shape::Slur => &[RelationKind::SlurHead],
        s if s.is_tremolo() => &[RelationKind::TremoloStem, RelationKind::TremoloWhole],
        s if s.is_octave_shift() => &[RelationKind::ChordOctaveShift],
        s if s.is_wedge() => &[RelationKind::ChordWedge],
        Shape::ChordName => &[RelationKind::ChordName],
        Shape::Metronome => &[RelationKind::ChordSentence],
        _ => &[],
    }
}

/// Link proposals for any inter, empty for shapes that do not search
pub fn search_links(system: &System, id: InterId, profile: usize) -> Vec<Link> {
    let Some(inter) = system.sig.inter(id) else {
        return Vec::new();
    };
    let profile = system.profile_for(id, profile);
    match inter.shape {
        s if s.is_beam() => beam::search_links(system, id, profile),
        Shape::Stem => stem::search_links(system, id, profile),
        s if s.is_flag() => flag::search_links(system, id, profile),
        Shape::Ending => {
            let mut links = ending::search_links(system, id, profile);
            links.extend(ending::sentence_links(system, id));
            links
        }
        Shape::Slur => slur::search_links(system, id),
        s if s.is_tremolo() => tremolo::search_links(system, id, profile),
        s if s.is_octave_shift() => octave_shift::search_links(system, id),
        s if s.is_wedge() => wedge::search_links(system, id),
        Shape::ChordName => chord_name::search_links(system, id),
        Shape::Metronome => metronome::search_links(system, id),
        other => {
            debug!("no link search for {:?} {}", other, id);
            Vec::new()
        }
    }
}

/// Replace the searched relations of an inter by a fresh search
pub fn link(system: &mut System, id: InterId, profile: usize) -> Vec<RelationId> {
    let Some(shape) = system.sig.inter(id).map(|i| i.shape) else {
        return Vec::new();
    };
    let links = search_links(system, id, profile);
    system.relink(id, relation_kinds(shape), &links)
}
