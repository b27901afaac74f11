//! # Octave Shifts
//!
//! An "8va" / "15mb" style sign followed by a horizontal line, closed by a
//! short hook pointing to its staff. A logical shift may continue over
//! several staves, one piece per staff, chained by extensions.
//!
//! ## Purpose
//! - Derive kind (alta or bassa) and hook direction from the side of the
//!   staff the line sits on.
//! - Link the first and the last chord of the staff under the line extent.
//!   This is not gap-scored.
//! - Keep the line at a minimal distance from the staves while dragged.
//! - Shrink or remove the whole sequence of pieces.

use tracing::{debug, info};

use crate::extension;
use crate::geom::{HorizontalSide, Line, Point, Rect, VerticalSide};
use crate::layout::{Staff, StaffId};
use crate::link::Link;
use crate::shape::Shape;
use crate::sig::{Inter, InterData, InterId, OctaveKind, OctaveShiftData, Relation, RelationKind, Sig};
use crate::system::System;

/// Kind and hook direction from the line position relative to the staff midline
fn kind_and_hook(staff: &Staff, line: &Line) -> (OctaveKind, VerticalSide) {
    if staff.mid_y() - line.p1.y > 0.0 {
        (OctaveKind::Alta, VerticalSide::Bottom)
    } else {
        (OctaveKind::Bassa, VerticalSide::Top)
    }
}

fn hook_end(system: &System, data: &OctaveShiftData) -> Point {
    let length = system.scale.to_pixels(system.constants.octave_shift.hook_length) as f64;
    data.line.p2.translated(0.0, data.hook.direction() * length)
}

fn bounds_of(system: &System, data: &OctaveShiftData) -> Rect {
    let hook = Line::new(data.line.p2, hook_end(system, data));
    data.line.bounds().union(&hook.bounds()).grown(1.0, 1.0)
}

pub fn create(system: &System, shape: Shape, grade: f64, line: Line, staff: StaffId) -> Option<Inter> {
    let st = system.layout.staff(staff)?;
    let (kind, hook) = kind_and_hook(st, &line);
    let data = OctaveShiftData { line, kind, hook };
    let bounds = bounds_of(system, &data);
    Some(Inter::new(shape, grade, bounds, InterData::OctaveShift(data)).with_staff(staff, st.part))
}

fn data(sig: &Sig, id: InterId) -> Option<&OctaveShiftData> {
    match &sig.inter(id)?.data {
        InterData::OctaveShift(data) => Some(data),
        _ => None,
    }
}

pub fn line(sig: &Sig, id: InterId) -> Option<Line> {
    data(sig, id).map(|d| d.line)
}

/// Number written on the sign: 8, 15 or 22
pub fn value(sig: &Sig, id: InterId) -> Option<u8> {
    sig.inter(id)?.shape.octave_shift_value()
}

/// Algebraic number of octaves, positive for alta
pub fn shift(sig: &Sig, id: InterId) -> Option<i32> {
    let octaves = sig.inter(id)?.shape.octave_shift()?.abs();
    match data(sig, id)?.kind {
        OctaveKind::Alta => Some(octaves),
        OctaveKind::Bassa => Some(-octaves),
    }
}

/// Links to the first and last chords of the staff within the line extent
pub fn search_links(system: &System, id: InterId) -> Vec<Link> {
    let (Some(inter), Some(data)) = (system.sig.inter(id), data(&system.sig, id)) else {
        return Vec::new();
    };
    let Some(staff) = inter.staff else {
        return Vec::new();
    };
    let (x1, x2) = (data.line.p1.x, data.line.p2.x);
    let chords: Vec<InterId> = system
        .staff_chords(staff)
        .into_iter()
        .filter(|c| {
            system
                .sig
                .inter(*c)
                .map(|i| (x1..=x2).contains(&i.center().x))
                .unwrap_or(false)
        })
        .collect();
    if inter.vip {
        info!("VIP octave shift {} covers {} chords", id, chords.len());
    }

    let (Some(first), Some(last)) = (chords.first(), chords.last()) else {
        return Vec::new();
    };
    vec![
        Link::new(*first, Relation::ChordOctaveShift(HorizontalSide::Left), true),
        Link::new(*last, Relation::ChordOctaveShift(HorizontalSide::Right), true),
    ]
}

/// Chord linked on one side
pub fn chord(sig: &Sig, id: InterId, side: HorizontalSide) -> Option<InterId> {
    sig.relations(id, &[RelationKind::ChordOctaveShift])
        .into_iter()
        .find(|rel| sig.edge(*rel).and_then(|e| e.relation.side()) == Some(side))
        .and_then(|rel| sig.opposite(id, rel))
}

pub fn check_abnormal(sig: &Sig, id: InterId) -> bool {
    chord(sig, id, HorizontalSide::Left).is_none()
}

/// Pieces of the logical shift, from left to right
pub fn sequence(sig: &Sig, id: InterId) -> Vec<InterId> {
    extension::sequence(sig, id)
}

fn neighbor_staff(system: &System, staff: &Staff, side: VerticalSide) -> Option<Staff> {
    let candidates = system.layout.staves.iter().filter(|s| s.id != staff.id);
    match side {
        VerticalSide::Top => candidates
            .filter(|s| s.last_line_y() < staff.first_line_y())
            .max_by(|a, b| a.last_line_y().total_cmp(&b.last_line_y()))
            .cloned(),
        VerticalSide::Bottom => candidates
            .filter(|s| s.first_line_y() > staff.last_line_y())
            .min_by(|a, b| a.first_line_y().total_cmp(&b.first_line_y()))
            .cloned(),
    }
}

/// Vertical translation corrected to keep the line on its side of the staff
///
/// An alta line stays above its staff and below the staff above it, a bassa
/// line the other way round, both by at least the minimal gap.
pub fn adjust_dy(system: &System, id: InterId, dy: f64) -> f64 {
    let Some(data) = data(&system.sig, id) else {
        return dy;
    };
    let Some(staff) = system.sig.inter(id).and_then(|i| i.staff).and_then(|s| system.layout.staff(s)) else {
        return dy;
    };
    let min_gap = system.scale.to_pixels(system.constants.octave_shift.min_gap_from_staff) as f64;
    let target = data.line.middle().y.round() + dy;
    let mut dy = dy;

    match data.kind {
        OctaveKind::Alta => {
            let gap = staff.first_line_y() - min_gap - target;
            if gap < 0.0 {
                dy += gap;
            } else if let Some(upper) = neighbor_staff(system, staff, VerticalSide::Top) {
                let gap = target - (upper.last_line_y() + min_gap);
                if gap < 0.0 {
                    dy -= gap;
                }
            } else if target < 0.0 {
                dy -= target;
            }
        }
        OctaveKind::Bassa => {
            let gap = target - (staff.last_line_y() + min_gap);
            if gap < 0.0 {
                dy -= gap;
            } else if let Some(lower) = neighbor_staff(system, staff, VerticalSide::Bottom) {
                let gap = lower.first_line_y() - min_gap - target;
                if gap < 0.0 {
                    dy += gap;
                }
            }
        }
    }
    dy
}

/// Replace the line of a piece, recomputing its bounds
pub fn set_line(system: &mut System, id: InterId, line: Line) {
    let Some(mut data) = data(&system.sig, id).copied() else {
        return;
    };
    data.line = line;
    let bounds = bounds_of(system, &data);
    if let Some(inter) = system.sig.inter_mut(id) {
        inter.data = InterData::OctaveShift(data);
        inter.bounds = bounds;
    }
}

/// Cut a piece at an abscissa, removing the pieces that followed it
pub fn shrink_at(system: &mut System, id: InterId, x: f64) -> Vec<InterId> {
    let Some(line) = data(&system.sig, id).map(|d| d.line) else {
        return Vec::new();
    };
    set_line(system, id, Line::new(line.p1, Point::new(x, line.p2.y)));
    let removed = extension::shrink(&mut system.sig, id, HorizontalSide::Right);
    for piece in &removed {
        system.sig.remove_vertex(*piece);
    }
    debug!("octave shift {} shrunk at {}, {} pieces removed", id, x, removed.len());
    removed
}

/// Removing one piece removes the whole logical shift
pub fn remove(system: &mut System, id: InterId) -> Vec<InterId> {
    extension::remove_sequence(&mut system.sig, id)
}
