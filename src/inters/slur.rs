//! # Slurs and Ties
//!
//! A slur is linked to one head at each end, looked up through a pair of
//! areas built around its ends. Its tie status is derived from the two
//! heads it connects.
//!
//! ## Purpose
//! - Build the left and right lookup areas. "Horizontal" slurs (gentle slope
//!   or wide) get areas parallel to the slur; the others get areas slanted
//!   along the slur bisector.
//! - Pick the best head of the chords intersected on each side, resolve a
//!   chord found on both sides and mirrored chords, and accept a missing side
//!   only for orphans near the part start or end.
//! - Decide whether a linked slur is a tie, within a staff or across two
//!   connected pieces, and whether two pieces may extend one another.
//!
//! ## Geometry
//! `v_dir` is +1 for a slur above its heads (the heads lie below it), -1
//! otherwise. The bisector unit goes from the curve middle to the middle of
//! its ends, toward the embraced heads.

use tracing::{debug, info};

use crate::error::InterError;
use crate::extension;
use crate::geom::{Area, CubicCurve, HorizontalSide, Line, Point, Polygon, Rect};
use crate::grade;
use crate::index::{self, GeoOrder};
use crate::link::Link;
use crate::sig::{HeadData, InterData, InterId, Relation, RelationKind, Sig, SlurData, SlurHead};
use crate::system::System;

use super::{beam, chord, stem};

fn unit(from: &Point, to: &Point) -> (f64, f64) {
    let (dx, dy) = (to.x - from.x, to.y - from.y);
    let len = (dx * dx + dy * dy).sqrt();
    if len == 0.0 {
        (0.0, 0.0)
    } else {
        (dx / len, dy / len)
    }
}

/// Point beyond `to` on the line from `from`, at distance `length` of `to`
fn extension_point(from: &Point, to: &Point, length: f64) -> Point {
    let (ux, uy) = unit(from, to);
    to.translated(ux * length, uy * length)
}

fn slope(first: &Point, last: &Point) -> f64 {
    (last.y - first.y) / (last.x - first.x)
}

fn data(sig: &Sig, slur: InterId) -> Option<&SlurData> {
    sig.inter(slur)?.as_slur()
}

/// Whether the slur is handled with horizontal lookup areas
pub fn is_horizontal(system: &System, curve: &CubicCurve) -> bool {
    let c = &system.constants.slur;
    let width = (curve.p2.x - curve.p1.x).abs();
    slope(&curve.p1, &curve.p2).abs() <= c.max_horizontal_slope
        || width >= system.scale.to_pixels(c.min_horizontal_width) as f64
}

fn bisector_unit(curve: &CubicCurve) -> (f64, f64) {
    unit(&curve.middle(), &curve.chord().middle())
}

/// Left and right lookup areas of a slur
pub fn area_pair(system: &System, data: &SlurData) -> (Polygon, Polygon) {
    let c = &system.constants.slur;
    let px = |frac: f64| system.scale.to_pixels(frac) as f64;
    let curve = &data.curve;
    let (first, last) = (curve.p1, curve.p2);
    let mid = curve.chord().middle();
    let width = (last.x - first.x).abs();
    let v_dir = if data.above { 1.0 } else { -1.0 };

    if is_horizontal(system, curve) {
        let first_ext = extension_point(&mid, &first, px(c.coverage_h_ext));
        let last_ext = extension_point(&mid, &last, px(c.coverage_h_ext));
        let first_base = first_ext.translated(0.0, v_dir * px(c.coverage_h_depth));
        let last_base = last_ext.translated(0.0, v_dir * px(c.coverage_h_depth));
        let base_line = Line::new(first_base, last_base);
        let base_at = |x: f64| Point::new(x, base_line.y_at_x(x));

        if width > 2.0 * px(c.coverage_h_in) {
            let first_in = extension_point(&mid, &first, -px(c.coverage_h_in));
            let last_in = extension_point(&mid, &last, -px(c.coverage_h_in));
            (
                Polygon::new(vec![first_in, first_ext, first_base, base_at(first_in.x)]),
                Polygon::new(vec![last_in, last_ext, last_base, base_at(last_in.x)]),
            )
        } else {
            let mid_base = base_at(mid.x);
            (
                Polygon::new(vec![mid, first_ext, first_base, mid_base]),
                Polygon::new(vec![mid, last_ext, last_base, mid_base]),
            )
        }
    } else {
        let first_ext = extension_point(&mid, &first, px(c.coverage_v_ext));
        let last_ext = extension_point(&mid, &last, px(c.coverage_v_ext));
        let (bx, by) = bisector_unit(curve);
        let depth = if width <= px(c.max_small_slur_width) {
            px(c.coverage_v_depth_small)
        } else {
            px(c.coverage_v_depth)
        };
        let (dx, dy) = (depth * bx, depth * by);
        let first_base = first_ext.translated(dx, dy);
        let last_base = last_ext.translated(dx, dy);

        if first.distance(&last) > 2.0 * px(c.coverage_v_in) {
            let first_in = extension_point(&first_ext, &first, px(c.coverage_v_in));
            let last_in = extension_point(&last_ext, &last, px(c.coverage_v_in));
            (
                Polygon::new(vec![first_in, first_ext, first_base, first_in.translated(dx, dy)]),
                Polygon::new(vec![last_in, last_ext, last_base, last_in.translated(dx, dy)]),
            )
        } else {
            let base_line = Line::new(first_base, last_base);
            let bisector = Line::new(mid, mid.translated(bx, by));
            let base_mid = base_line.intersection(&bisector).unwrap_or_else(|| mid.translated(dx, dy));
            (
                Polygon::new(vec![mid, first_ext, first_base, base_mid]),
                Polygon::new(vec![mid, last_ext, last_base, base_mid]),
            )
        }
    }
}

/// Point slightly beyond a slur end, along the end tangent
pub fn target_point(system: &System, curve: &CubicCurve, side: HorizontalSide) -> Point {
    let ext = system.scale.to_pixels(system.constants.slur.target_extension) as f64;
    extension_point(&curve.control(side), &curve.end(side), ext).rounded()
}

/// Another head chord sharing a head with this one
pub fn mirror(sig: &Sig, chord_id: InterId) -> Option<InterId> {
    sig.members(chord_id).iter().find_map(|h| {
        sig.ensembles_of(*h)
            .iter()
            .copied()
            .find(|e| *e != chord_id && sig.inter(*e).map(|i| i.is_standard_chord()).unwrap_or(false))
    })
}

#[derive(Debug, Clone, Copy)]
struct HeadLink {
    chord: InterId,
    head: InterId,
    relation: SlurHead,
}

/// Closest head of the chord on the concave side of the slur end
fn best_head(sig: &Sig, data: &SlurData, chord_id: InterId, side: HorizontalSide, target: &Point, area: &Area, horizontal: bool) -> Option<InterId> {
    let end = data.curve.end(side);
    let (bx, by) = bisector_unit(&data.curve);
    let mut best: Option<(InterId, f64)> = None;
    for head in chord::heads(sig, chord_id) {
        let Some(bounds) = sig.inter(head).map(|i| i.bounds) else {
            continue;
        };
        let center = bounds.center();
        if !horizontal && !area.contains(&center) {
            continue;
        }
        let ref_y = bounds.y + if data.above { bounds.height - 1.0 } else { 0.0 };
        let dot = (center.x - end.x) * bx + (ref_y - end.y) * by;
        if dot <= 0.0 {
            continue;
        }
        let dist = (center.x - target.x).powi(2) + (center.y - target.y).powi(2);
        if best.map(|(_, d)| dist < d).unwrap_or(true) {
            best = Some((head, dist));
        }
    }
    best.map(|(h, _)| h)
}

fn lookup_side(system: &System, slur: InterId, data: &SlurData, side: HorizontalSide, area: &Area) -> Vec<HeadLink> {
    let c = &system.constants.slur;
    let horizontal = is_horizontal(system, &data.curve);
    let target = target_point(system, &data.curve, side);
    let reach = if horizontal {
        c.coverage_h_ext + c.coverage_h_depth
    } else {
        c.coverage_v_ext + c.coverage_v_depth
    };

    let chords = system.chords();
    let candidates = index::intersected_inters(&system.sig, &chords, GeoOrder::None, &area.bounds().into());
    let mut found = Vec::new();
    for chord_id in candidates {
        let Some(bounds) = system.sig.inter(chord_id).map(|i| i.bounds) else {
            continue;
        };
        if !area.intersects(&bounds) {
            continue;
        }
        let Some(head) = best_head(&system.sig, data, chord_id, side, &target, area, horizontal) else {
            continue;
        };
        let center = system.sig.inter(head).map(|i| i.center()).unwrap_or(target);
        let distance = system.scale.pixels_to_frac(center.distance(&target));
        let relation = SlurHead {
            side,
            distance,
            grade: grade::gap_impact(distance, reach),
        };
        debug!("slur {} {:?} candidate head {} at {:.2}", slur, side, head, distance);
        found.push(HeadLink { chord: chord_id, head, relation });
    }
    found
}

/// Whether a slur lacking a head on one side is still acceptable
///
/// The slur must be rather horizontal, and its free end must lie in the
/// first (or last) measure, close to the staff limit.
pub fn can_be_orphan(system: &System, data: &SlurData, side: HorizontalSide) -> bool {
    let c = &system.constants.slur;
    let curve = &data.curve;
    if slope(&curve.p1, &curve.p2).abs() > c.max_orphan_slope {
        return false;
    }
    let end = curve.end(side);
    let Some(staff) = system.layout.closest_staff(&end).and_then(|s| system.layout.staff(s)) else {
        return false;
    };
    let side_stack = match side {
        HorizontalSide::Left => system.layout.first_stack(),
        HorizontalSide::Right => system.layout.last_stack(),
    };
    let end_stack = system.layout.stack_at(&end);
    let same_stack = match (side_stack, end_stack) {
        (Some(a), Some(b)) => a.id == b.id,
        (Some(_), None) => side == HorizontalSide::Right && end.x >= staff.right,
        _ => false,
    };
    if !same_stack {
        return false;
    }
    let staff_end = match side {
        HorizontalSide::Left => staff.left,
        HorizontalSide::Right => staff.right,
    };
    (end.x - staff_end).abs() <= system.scale.to_pixels(c.max_orphan_dx) as f64
}

fn beam_count(sig: &Sig, chord_id: InterId) -> usize {
    chord::stem(sig, chord_id)
        .map(|s| sig.relations(s, &[RelationKind::BeamStem]).len())
        .unwrap_or(0)
}

/// Choose between a chord and its mirror on one side
fn resolve_mirror(system: &System, link: HeadLink, mirror_link: HeadLink, other: Option<HeadLink>) -> HeadLink {
    let sig = &system.sig;
    let link_ok = match other {
        Some(other) => {
            let staff = sig.inter(link.chord).and_then(|i| i.staff);
            let other_staff = sig.inter(other.chord).and_then(|i| i.staff);
            let dir = chord::stem_direction(sig, link.chord);
            if staff != other_staff {
                // The stem must point toward the other staff
                let toward = match (other_staff, staff) {
                    (Some(o), Some(s)) if o > s => 1,
                    (Some(o), Some(s)) if o < s => -1,
                    _ => 0,
                };
                dir * toward > 0
            } else {
                dir == chord::stem_direction(sig, other.chord)
            }
        }
        None => beam_count(sig, link.chord) <= beam_count(sig, mirror_link.chord),
    };
    if link_ok {
        link
    } else {
        mirror_link
    }
}

/// Head links of a slur, one per side at most
///
/// Empty when no acceptable pair exists: nothing found, a chord and its
/// mirror on both ends, or a missing side that cannot be an orphan.
pub fn search_links(system: &System, slur: InterId) -> Vec<Link> {
    let (Some(inter), Some(data)) = (system.sig.inter(slur), data(&system.sig, slur)) else {
        return Vec::new();
    };
    if inter.vip {
        info!("VIP head search for slur {}", slur);
    }
    let (left_area, right_area) = area_pair(system, data);
    let areas = [Area::from(left_area), Area::from(right_area)];

    let mut sides = [
        lookup_side(system, slur, data, HorizontalSide::Left, &areas[0]),
        lookup_side(system, slur, data, HorizontalSide::Right, &areas[1]),
    ];

    // A chord on both sides stays where it is closer to the slur target
    let left_target = target_point(system, &data.curve, HorizontalSide::Left);
    let right_target = target_point(system, &data.curve, HorizontalSide::Right);
    let commons: Vec<InterId> = sides[0]
        .iter()
        .filter(|l| sides[1].iter().any(|r| r.chord == l.chord))
        .map(|l| l.chord)
        .collect();
    for common in commons {
        let center = system.sig.inter(common).map(|i| i.bounds.center()).unwrap_or(left_target);
        let drop = if center.distance(&left_target) > center.distance(&right_target) { 0 } else { 1 };
        sides[drop].retain(|l| l.chord != common);
    }

    let mut pair: [Option<HeadLink>; 2] = [None, None];
    let mut conflicts: [Option<(HeadLink, HeadLink)>; 2] = [None, None];
    for (i, found) in sides.iter_mut().enumerate() {
        found.sort_by(|a, b| a.relation.distance.total_cmp(&b.relation.distance));
        let Some(best) = found.first().copied() else {
            continue;
        };
        let mirror_link = mirror(&system.sig, best.chord).and_then(|m| found.iter().find(|l| l.chord == m).copied());
        match mirror_link {
            Some(m) => conflicts[i] = Some((best, m)),
            None => pair[i] = Some(best),
        }
    }
    for i in 0..2 {
        if let Some((best, m)) = conflicts[i] {
            pair[i] = Some(resolve_mirror(system, best, m, pair[1 - i]));
        }
    }

    if let (Some(left), Some(right)) = (pair[0], pair[1]) {
        if mirror(&system.sig, left.chord) == Some(right.chord) {
            debug!("slur {} joins a chord and its mirror", slur);
            return Vec::new();
        }
    }
    if pair.iter().all(Option::is_none) {
        return Vec::new();
    }
    for (i, side) in HorizontalSide::ALL.iter().enumerate() {
        if pair[i].is_none() && !can_be_orphan(system, data, *side) {
            debug!("slur {} cannot be a {:?} orphan", slur, side);
            return Vec::new();
        }
    }

    pair.iter()
        .flatten()
        .map(|l| Link::new(l.head, Relation::SlurHead(l.relation), true))
        .collect()
}

/// Head linked on one side
pub fn head(sig: &Sig, slur: InterId, side: HorizontalSide) -> Option<InterId> {
    sig.relations(slur, &[RelationKind::SlurHead])
        .into_iter()
        .find(|rel| sig.edge(*rel).and_then(|e| e.relation.side()) == Some(side))
        .and_then(|rel| sig.opposite(slur, rel))
}

pub fn is_tie(sig: &Sig, slur: InterId) -> bool {
    data(sig, slur).map(|d| d.tie).unwrap_or(false)
}

fn set_tie(sig: &mut Sig, slur: InterId, tie: bool) {
    if let Some(InterData::Slur(data)) = sig.inter_mut(slur).map(|i| &mut i.data) {
        data.tie = tie;
    }
}

/// A slur not connected to a head on some side
pub fn is_orphan(sig: &Sig, slur: InterId) -> bool {
    HorizontalSide::ALL.iter().any(|side| head(sig, slur, *side).is_none())
}

fn head_data(sig: &Sig, head: InterId) -> Option<&HeadData> {
    sig.inter(head)?.as_head()
}

/// Same step, octave and accidental
pub fn are_tie_compatible(sig: &Sig, h1: InterId, h2: InterId) -> bool {
    match (head_data(sig, h1), head_data(sig, h2)) {
        (Some(a), Some(b)) => a.step == b.step && a.octave == b.octave && a.alter == b.alter,
        _ => false,
    }
}

fn beam_group_of(sig: &Sig, chord_id: InterId) -> Option<InterId> {
    let stem_id = chord::stem(sig, chord_id)?;
    stem::beams(sig, stem_id).into_iter().find_map(|b| beam::group(sig, b))
}

/// End of the stem away from the heads, or the leading head when stemless
fn tail_location(sig: &Sig, chord_id: InterId) -> Option<Point> {
    let stem_data = chord::stem(sig, chord_id).and_then(|s| sig.inter(s)).and_then(|i| i.as_stem());
    match (stem_data, chord::stem_direction(sig, chord_id)) {
        (Some(data), dir) if dir < 0 => Some(data.top),
        (Some(data), dir) if dir > 0 => Some(data.bottom),
        _ => chord::head_location(sig, chord_id),
    }
}

/// No foreign chord stands between two heads
///
/// The heads must lie in consecutive measure stacks at most. A chord of the
/// same beam group as either end forbids the tie, any other chord must not
/// invade the box between heads and stem tails beyond the allowed ratio.
pub fn is_space_clear(system: &System, h1: InterId, h2: InterId) -> bool {
    let sig = &system.sig;
    let (Some(b1), Some(b2)) = (sig.inter(h1).map(|i| i.bounds), sig.inter(h2).map(|i| i.bounds)) else {
        return false;
    };
    let stack_index = |r: &Rect| {
        system
            .layout
            .stack_at(&r.center())
            .and_then(|s| system.layout.stack_index(s.id))
    };
    if let (Some(i1), Some(i2)) = (stack_index(&b1), stack_index(&b2)) {
        if i2 > i1 + 1 {
            return false;
        }
    }

    let (Some(c1), Some(c2)) = (chord_of(sig, h1), chord_of(sig, h2)) else {
        return false;
    };
    let mut tie_box = b1.union(&b2);
    for tail in [tail_location(sig, c1), tail_location(sig, c2)].into_iter().flatten() {
        tie_box = tie_box.union(&Rect::new(tail.x, tail.y, 0.0, 0.0));
    }

    let excluded = [Some(c1), Some(c2), mirror(sig, c1), mirror(sig, c2)];
    let groups = [beam_group_of(sig, c1), beam_group_of(sig, c2)];
    let chords = system.chords();
    for other in index::intersected_inters(sig, &chords, GeoOrder::None, &tie_box.into()) {
        if excluded.contains(&Some(other)) {
            continue;
        }
        let group = beam_group_of(sig, other);
        if group.is_some() && groups.contains(&group) {
            debug!("tie forbidden across beamed chord {}", other);
            return false;
        }
        let Some(overlap) = sig.inter(other).and_then(|i| i.bounds.intersection(&tie_box)) else {
            continue;
        };
        if tie_box.height > 0.0 && overlap.height / tie_box.height > system.constants.slur.max_tie_invasion {
            debug!("tie forbidden across invading chord {}", other);
            return false;
        }
    }
    true
}

fn chord_of(sig: &Sig, head: InterId) -> Option<InterId> {
    super::head::chord(sig, head)
}

/// Set the tie flag of a slur from its two heads in one staff
pub fn check_staff_tie(system: &mut System, slur: InterId) -> bool {
    let sig = &system.sig;
    let tie = match (head(sig, slur, HorizontalSide::Left), head(sig, slur, HorizontalSide::Right)) {
        (Some(h1), Some(h2)) => {
            let same_staff = sig.inter(h1).map(|i| i.staff) == sig.inter(h2).map(|i| i.staff);
            same_staff && are_tie_compatible(sig, h1, h2) && is_space_clear(system, h1, h2)
        }
        _ => false,
    };
    if sig.inter(slur).map(|i| i.vip).unwrap_or(false) {
        info!("VIP slur {} is {}", slur, if tie { "a tie" } else { "a slur" });
    }
    set_tie(&mut system.sig, slur, tie);
    tie
}

/// Whether `next` can continue `prev` on the following staff
///
/// Both anchored heads must be in staves of the same index within their
/// parts, and the free ends at roughly the same pitch.
pub fn can_extend(system: &System, prev: InterId, next: InterId) -> bool {
    let sig = &system.sig;
    let staff_of = |h: InterId| sig.inter(h).and_then(|i| i.staff);
    let (Some(prev_staff), Some(next_staff)) = (
        head(sig, prev, HorizontalSide::Left).and_then(staff_of),
        head(sig, next, HorizontalSide::Right).and_then(staff_of),
    ) else {
        return false;
    };
    if system.layout.index_in_part(prev_staff) != system.layout.index_in_part(next_staff) {
        debug!("slurs {} and {} in staves of different indices", prev, next);
        return false;
    }
    let (Some(p), Some(n)) = (data(sig, prev), data(sig, next)) else {
        return false;
    };
    let (Some(ps), Some(ns)) = (system.layout.staff(prev_staff), system.layout.staff(next_staff)) else {
        return false;
    };
    let delta = ns.pitch_position_of(&n.curve.p1.rounded()) - ps.pitch_position_of(&p.curve.p2.rounded());
    delta.abs() <= 2.0 * system.constants.slur.max_delta_y
}

/// Tie status of two connected pieces, set on both
pub fn check_cross_tie(system: &mut System, prev: InterId, next: InterId) -> bool {
    let sig = &system.sig;
    let tie = match (head(sig, prev, HorizontalSide::Left), head(sig, next, HorizontalSide::Right)) {
        (Some(h1), Some(h2)) if are_tie_compatible(sig, h1, h2) => {
            let index = |h: InterId| sig.inter(h).and_then(|i| i.staff).and_then(|s| system.layout.index_in_part(s));
            index(h1) == index(h2)
        }
        _ => false,
    };
    set_tie(&mut system.sig, prev, tie);
    set_tie(&mut system.sig, next, tie);
    tie
}

/// Chain `next` after `prev` when compatible, then settle their tie status
pub fn connect(system: &mut System, prev: InterId, next: InterId) -> Result<bool, InterError> {
    if !can_extend(system, prev, next) {
        return Ok(false);
    }
    extension::link(&mut system.sig, prev, next)?;
    check_cross_tie(system, prev, next);
    Ok(true)
}

/// Abnormal unless a tie, or linked to a head or extended on both sides
pub fn check_abnormal(sig: &Sig, slur: InterId) -> bool {
    if is_tie(sig, slur) {
        return false;
    }
    HorizontalSide::ALL
        .iter()
        .any(|side| head(sig, slur, *side).is_none() && extension::extension(sig, slur, *side).is_none())
}
