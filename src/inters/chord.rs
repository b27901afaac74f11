//! # Head Chords
//!
//! A head chord is an ensemble of heads sharing one stem (or a lone
//! stemless head). Its bounds cover its heads and its stem.
//!
//! ## Purpose
//! Slurs, wedges, octave shifts, chord names and metronome marks attach to
//! chords rather than to heads. This module builds chords and answers the
//! queries those linkers need: heads from top to bottom, stem direction,
//! the head at the far end from the stem, and the closest standard chord
//! above or below a point of a measure stack.

use tracing::debug;

use crate::geom::Point;
use crate::index;
use crate::layout::MeasureStack;
use crate::shape::Shape;
use crate::sig::{Inter, InterData, InterId, Sig};
use crate::system::System;

/// Create a head chord from its heads and optional stem
///
/// The chord takes the staff and part of its first head.
pub fn build(system: &mut System, heads: &[InterId], stem: Option<InterId>) -> InterId {
    let mut chord = Inter::chord(Shape::HeadChord, 1.0);
    if let Some(first) = heads.first().and_then(|h| system.sig.inter(*h)) {
        chord.staff = first.staff;
        chord.part = first.part;
        chord.grade = first.grade;
        chord.bounds = first.bounds;
    }
    if let InterData::Chord(data) = &mut chord.data {
        data.stem = stem;
    }
    let id = system.add(chord);
    for head in heads {
        system.sig.add_member(id, *head);
    }
    system.sig.update_ensemble_bounds(id);
    debug!("chord {} built with {} heads", id, heads.len());
    id
}

/// Heads of a chord, from top to bottom
pub fn heads(sig: &Sig, chord: InterId) -> Vec<InterId> {
    let mut ids: Vec<InterId> = sig
        .members(chord)
        .iter()
        .copied()
        .filter(|m| sig.inter(*m).map(|i| i.shape.is_head()).unwrap_or(false))
        .collect();
    index::sort_by_ordinate(sig, &mut ids);
    ids
}

pub fn stem(sig: &Sig, chord: InterId) -> Option<InterId> {
    sig.inter(chord)?.as_chord()?.stem
}

/// Direction from heads to stem tail: -1 up, +1 down, 0 without stem
pub fn stem_direction(sig: &Sig, chord: InterId) -> i32 {
    let Some(data) = stem(sig, chord).and_then(|s| sig.inter(s)).and_then(|i| i.as_stem()) else {
        return 0;
    };
    let head_ids = heads(sig, chord);
    let (Some(top), Some(bottom)) = (head_ids.first(), head_ids.last()) else {
        return 0;
    };
    let top_y = sig.inter(*top).map(|i| i.center().y).unwrap_or(0.0);
    let bottom_y = sig.inter(*bottom).map(|i| i.center().y).unwrap_or(0.0);
    let middle = data.median().middle().y;
    if middle < (top_y + bottom_y) / 2.0 {
        -1
    } else {
        1
    }
}

/// Head farthest from the stem tail, the top head when stemless
pub fn leading_head(sig: &Sig, chord: InterId) -> Option<InterId> {
    let head_ids = heads(sig, chord);
    if stem_direction(sig, chord) < 0 {
        head_ids.last().copied()
    } else {
        head_ids.first().copied()
    }
}

/// Location of the leading head
pub fn head_location(sig: &Sig, chord: InterId) -> Option<Point> {
    let head = leading_head(sig, chord)?;
    Some(sig.inter(head)?.center())
}

/// Standard chords of the stack, in the staff at or above the point, whose
/// leading head is above the point
fn chords_above(system: &System, stack: &MeasureStack, point: &Point) -> Vec<InterId> {
    let Some(staff) = system.layout.staff_at_or_above(point) else {
        return Vec::new();
    };
    stack_chords(system, stack)
        .into_iter()
        .filter(|c| system.sig.inter(*c).map(|i| i.staff == Some(staff)).unwrap_or(false))
        .filter(|c| head_location(&system.sig, *c).map(|h| h.y < point.y).unwrap_or(false))
        .collect()
}

fn chords_below(system: &System, stack: &MeasureStack, point: &Point) -> Vec<InterId> {
    let Some(staff) = system.layout.staff_at_or_below(point) else {
        return Vec::new();
    };
    stack_chords(system, stack)
        .into_iter()
        .filter(|c| system.sig.inter(*c).map(|i| i.staff == Some(staff)).unwrap_or(false))
        .filter(|c| head_location(&system.sig, *c).map(|h| h.y > point.y).unwrap_or(false))
        .collect()
}

/// Standard head chords whose center lies in the stack
pub fn stack_chords(system: &System, stack: &MeasureStack) -> Vec<InterId> {
    system
        .chords()
        .into_iter()
        .filter(|c| {
            system
                .sig
                .inter(*c)
                .map(|i| i.is_standard_chord() && stack.contains_x(i.center().x))
                .unwrap_or(false)
        })
        .collect()
}

/// Chord whose bounds are the closest to the point, first wins on ties
pub fn closest(sig: &Sig, chords: &[InterId], point: &Point) -> Option<InterId> {
    let mut best: Option<(InterId, f64)> = None;
    for chord in chords {
        let Some(inter) = sig.inter(*chord) else {
            continue;
        };
        let dsq = inter.bounds.distance_sq(point);
        if best.map(|(_, d)| dsq < d).unwrap_or(true) {
            best = Some((*chord, dsq));
        }
    }
    best.map(|(c, _)| c)
}

/// Closest standard chord in the staff above the point
pub fn standard_chord_above(system: &System, stack: &MeasureStack, point: &Point) -> Option<InterId> {
    closest(&system.sig, &chords_above(system, stack, point), point)
}

/// Closest standard chord in the staff below the point
pub fn standard_chord_below(system: &System, stack: &MeasureStack, point: &Point) -> Option<InterId> {
    closest(&system.sig, &chords_below(system, stack, point), point)
}
