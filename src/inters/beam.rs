//! # Beam Linking
//!
//! Beams and beam hooks connect to stems on three portions: the LEFT and
//! RIGHT ends, which carry at most one stem each, and the CENTER, which may
//! rest on any number of stems. Beam hooks have no CENTER portion.
//!
//! ## Purpose
//! - Grade a beam-stem connection from the point where the stem median
//!   crosses the beam border nearest to the heads.
//! - Search the stems around a beam, through a quadrilateral that follows
//!   the beam slope, and through one box per end.
//! - Snap the ends of a beam being dropped onto the stems nearby.
//! - Group beams sharing stems into beam groups.
//!
//! ## Related Modules
//! - `inters::stem` - the stem side of the same relations
//! - `abnormal` - a beam needs support on both ends

use tracing::{debug, info};

use crate::geom::{HorizontalSide, Point, Polygon, Rect, VerticalSide};
use crate::grade;
use crate::index::{self, GeoOrder};
use crate::link::{BestLink, Link};
use crate::shape::Shape;
use crate::sig::{BeamData, BeamPortion, BeamStem, Gaps, Inter, InterData, InterId, Relation, RelationKind, Sig};
use crate::system::System;

/// Grade a connection between a beam and a stem
///
/// `head_to_beam` is the vertical direction going from the stem heads to
/// the beam. The stem is expected to reach the beam border facing the heads.
pub fn check_link(
    system: &System,
    beam: &BeamData,
    hook: bool,
    stem: InterId,
    head_to_beam: VerticalSide,
    profile: usize,
) -> Option<BeamStem> {
    let stem_data = system.sig.inter(stem)?.as_stem()?;
    let scale = &system.scale;
    let constants = &system.constants.beam_stem;

    let y_dir = head_to_beam.direction();
    let limit = beam.border(head_to_beam.opposite());
    let cross = stem_data.median().intersection(&limit)?;
    let extension_point = Point::new(cross.x, cross.y + y_dir * (beam.height - 1.0));

    // Positive when the cross point lies within the beam abscissa range
    let to_left = cross.x - limit.p1.x;
    let to_right = limit.p2.x - cross.x;
    let max_in_dx = scale.to_pixels(constants.x_in_gap_max.at(profile)) as f64;

    let (portion, x_gap) = if !hook && to_left.min(to_right) > max_in_dx {
        (BeamPortion::Center, 0.0)
    } else if to_left < to_right {
        (BeamPortion::Left, (-to_left).max(0.0))
    } else {
        (BeamPortion::Right, (-to_right).max(0.0))
    };

    let y_gap = if y_dir > 0.0 {
        (cross.y - stem_data.bottom.y).max(0.0)
    } else {
        (stem_data.top.y - cross.y).max(0.0)
    };

    let gaps = Gaps {
        x: scale.pixels_to_frac(x_gap),
        y: scale.pixels_to_frac(y_gap),
    };
    let grade = grade::connection_grade(constants, profile, gaps.x, gaps.y);
    if grade < constants.min_grade {
        return None;
    }
    Some(BeamStem {
        portion,
        gaps,
        grade,
        extension_point,
    })
}

/// Direction from heads to beam, for a stem relative to the beam median
fn head_to_beam(beam: &BeamData, stem_middle: &Point) -> VerticalSide {
    // A stem standing above the beam has its heads above
    if beam.median.relative_ccw(stem_middle) > 0 {
        VerticalSide::Bottom
    } else {
        VerticalSide::Top
    }
}

/// Quadrilateral around the whole beam, widened at both ends
pub fn lookup_area(system: &System, beam: &BeamData, profile: usize) -> Polygon {
    let constants = &system.constants.beam_stem;
    let scale = &system.scale;
    let x_out = scale.to_pixels(constants.x_out_gap_max.at(profile)) as f64;
    let y_gap = scale.to_pixels(constants.y_gap_max.at(profile)) as f64;

    let top = beam.border(VerticalSide::Top);
    let bottom = beam.border(VerticalSide::Bottom);
    let x_min = top.p1.x - x_out;
    let x_max = top.p2.x + x_out;

    Polygon::new(vec![
        Point::new(x_min, top.y_at_x(x_min) - y_gap),
        Point::new(x_max, top.y_at_x(x_max) - y_gap),
        Point::new(x_max, bottom.y_at_x(x_max) + y_gap),
        Point::new(x_min, bottom.y_at_x(x_min) + y_gap),
    ])
}

/// Box around one beam end, biased outward by the "out" gap
pub fn side_box(system: &System, beam: &BeamData, side: HorizontalSide, profile: usize) -> Rect {
    let constants = &system.constants.beam_stem;
    let scale = &system.scale;
    let x_out = scale.to_pixels(constants.x_out_gap_max.at(profile)) as f64;
    let x_in = scale.to_pixels(constants.x_in_gap_max.at(profile)) as f64;
    let y_gap = scale.to_pixels(constants.y_gap_max.at(profile)) as f64;

    let top = beam.border(VerticalSide::Top).end(side).rounded();
    let bottom = beam.border(VerticalSide::Bottom).end(side).rounded();
    let (dx_left, dx_right) = match side {
        HorizontalSide::Left => (x_out, x_in),
        HorizontalSide::Right => (x_in, x_out),
    };
    Rect::bounding(&[
        Point::new(top.x - dx_left, top.y - y_gap),
        Point::new(top.x + dx_right, top.y - y_gap),
        Point::new(bottom.x - dx_left, bottom.y + y_gap),
        Point::new(bottom.x + dx_right, bottom.y + y_gap),
    ])
}

fn stem_link(system: &System, beam: &BeamData, hook: bool, stem: InterId, profile: usize) -> Option<Link> {
    let middle = system.sig.inter(stem)?.as_stem()?.median().middle();
    let profile = system.profile_for(stem, profile);
    check_link(system, beam, hook, stem, head_to_beam(beam, &middle), profile)
        .map(|rel| Link::new(stem, Relation::BeamStem(rel), true))
}

/// Best stem link around one end of a beam, whatever the portion found
pub fn lookup_side_link(
    system: &System,
    beam: &BeamData,
    hook: bool,
    stems: &[InterId],
    side: HorizontalSide,
    profile: usize,
) -> Option<Link> {
    let lu_box = side_box(system, beam, side, profile);
    let mut best = BestLink::new();
    for stem in index::intersected_inters(&system.sig, stems, GeoOrder::ByAbscissa, &lu_box.into()) {
        best.offer_opt(stem_link(system, beam, hook, stem, profile));
    }
    best.into_inner()
}

/// Stem links of a beam: every CENTER link, and the best link of each end
pub fn search_links(system: &System, beam: InterId, profile: usize) -> Vec<Link> {
    let Some(inter) = system.sig.inter(beam) else {
        return Vec::new();
    };
    let Some(data) = inter.as_beam() else {
        return Vec::new();
    };
    let hook = inter.shape.is_beam_hook();
    let profile = system.profile_for(beam, profile);
    let stems = system.stems();
    if stems.is_empty() {
        return Vec::new();
    }
    if inter.vip {
        info!("VIP stem search for beam {}", beam);
    }

    let area = lookup_area(system, data, profile);
    let mut links = Vec::new();
    let mut left = BestLink::new();
    let mut right = BestLink::new();
    for stem in index::intersected_inters(&system.sig, &stems, GeoOrder::ByAbscissa, &area.into()) {
        let Some(link) = stem_link(system, data, hook, stem, profile) else {
            continue;
        };
        match link.relation.side() {
            None => links.push(link),
            Some(HorizontalSide::Left) => left.offer(link),
            Some(HorizontalSide::Right) => right.offer(link),
        }
    }
    links.extend(left.into_inner());
    links.extend(right.into_inner());
    debug!("beam {} found {} stem links", beam, links.len());
    links
}

/// Abscissa of a beam end once aligned on the best stem of that side
pub fn snap_abscissa(system: &System, beam: &BeamData, hook: bool, side: HorizontalSide, profile: usize) -> Option<f64> {
    let stems = system.stems();
    let link = lookup_side_link(system, beam, hook, &stems, side, profile)?;
    let stem = system.sig.inter(link.partner)?.as_stem()?;
    Some(stem.median().x_at_y(beam.median.end(side).y))
}

/// Snap both ends of a beam being dropped around `drop_x`
///
/// When both ends snap closer than the minimum beam width, the end away
/// from the drop location is pushed back to keep that width. Returns true
/// when the beam moved.
pub fn snap_ends(system: &System, beam: &mut BeamData, hook: bool, drop_x: f64, profile: usize) -> bool {
    let mut left = snap_abscissa(system, beam, hook, HorizontalSide::Left, profile);
    let mut right = snap_abscissa(system, beam, hook, HorizontalSide::Right, profile);

    if let (Some(l), Some(r)) = (left, right) {
        let min_width = system.scale.to_pixels(system.constants.beam.min_beam_width) as f64;
        if r - l < min_width {
            if drop_x > 0.5 * (l + r) {
                right = Some(l + min_width);
            } else {
                left = Some(r - min_width);
            }
        }
    }

    if let Some(x) = left {
        beam.median.p1.x = x;
    }
    if let Some(x) = right {
        beam.median.p2.x = x;
    }
    left.is_some() || right.is_some()
}

/// Stems linked to the beam, in relation order
pub fn stems(sig: &Sig, beam: InterId) -> Vec<InterId> {
    let mut ids = sig.partners(beam, RelationKind::BeamStem);
    let mut seen = Vec::with_capacity(ids.len());
    ids.retain(|id| {
        if seen.contains(id) {
            false
        } else {
            seen.push(*id);
            true
        }
    });
    ids
}

/// Stem connected on a portion, the first one for CENTER
pub fn stem_on(sig: &Sig, beam: InterId, portion: BeamPortion) -> Option<InterId> {
    sig.relations(beam, &[RelationKind::BeamStem])
        .into_iter()
        .find(|rel| matches!(sig.edge(*rel).map(|e| e.relation), Some(Relation::BeamStem(bs)) if bs.portion == portion))
        .and_then(|rel| sig.opposite(beam, rel))
}

/// Heads reached through the beam stems
pub fn heads(sig: &Sig, beam: InterId) -> Vec<InterId> {
    let mut ids = Vec::new();
    for stem in stems(sig, beam) {
        for head in super::stem::heads(sig, stem) {
            if !ids.contains(&head) {
                ids.push(head);
            }
        }
    }
    ids
}

/// Head chords and interleaved rest chords, by center abscissa
pub fn chords(sig: &Sig, beam: InterId) -> Vec<InterId> {
    let mut ids = Vec::new();
    for stem in stems(sig, beam) {
        ids.extend(super::stem::chords(sig, stem));
    }
    for rest in sig.partners(beam, RelationKind::BeamRest) {
        ids.extend(sig.ensemble_of(rest, &[Shape::RestChord]));
    }
    index::sort_by_center_abscissa(sig, &mut ids);
    ids.dedup();
    ids
}

/// Vertical gap between the stem end and the nearest beam border, 0 when they touch
pub fn stem_vertical_gap(sig: &Sig, beam: InterId, stem: InterId) -> Option<f64> {
    let data = sig.inter(beam)?.as_beam()?;
    let stem_line = sig.inter(stem)?.as_stem()?.median();
    let beam_middle = stem_line.intersection(&data.median)?.y;
    if stem_line.p1.y <= beam_middle {
        let beam_top = stem_line.intersection(&data.border(VerticalSide::Top))?.y;
        Some((beam_top - stem_line.p2.y).max(0.0))
    } else {
        let beam_bottom = stem_line.intersection(&data.border(VerticalSide::Bottom))?.y;
        Some((stem_line.p1.y - beam_bottom).max(0.0))
    }
}

pub fn has_common_stem_with(sig: &Sig, beam: InterId, other: InterId) -> bool {
    let mine = stems(sig, beam);
    stems(sig, other).iter().any(|s| mine.contains(s))
}

/// Beam group containing the beam
pub fn group(sig: &Sig, beam: InterId) -> Option<InterId> {
    sig.ensemble_of(beam, &[Shape::BeamGroup])
}

/// First live group owning a beam that shares a stem with this one
pub fn find_group(sig: &Sig, beam: InterId, excluded: Option<InterId>) -> Option<InterId> {
    sig.inters_of(&[Shape::BeamGroup])
        .into_iter()
        .filter(|g| Some(*g) != excluded)
        .find(|g| {
            sig.members(*g)
                .iter()
                .any(|m| *m != beam && has_common_stem_with(sig, beam, *m))
        })
}

/// Move a beam to another group; an emptied former group disappears
pub fn switch_to_group(sig: &mut Sig, beam: InterId, new_group: Option<InterId>) {
    let old_group = group(sig, beam);
    debug!("switching beam {} from {:?} to {:?}", beam, old_group, new_group);
    if old_group == new_group {
        return;
    }
    if let Some(old) = old_group {
        sig.remove_member(old, beam);
    }
    if let Some(new) = new_group {
        sig.add_member(new, beam);
    }
}

fn new_group(system: &mut System, beam: InterId) -> InterId {
    let (bounds, staff, part) = match system.sig.inter(beam) {
        Some(i) => (i.bounds, i.staff, i.part),
        None => (Rect::default(), None, None),
    };
    let mut group = Inter::new(Shape::BeamGroup, 1.0, bounds, InterData::BeamGroup);
    group.staff = staff;
    group.part = part;
    system.add(group)
}

/// Gather every beam of the system into groups of beams sharing stems
pub fn populate(system: &mut System) {
    let beams = system.sorted_inters(Shape::is_beam);
    for beam in beams {
        if group(&system.sig, beam).is_some() {
            continue;
        }
        let target = match find_group(&system.sig, beam, None) {
            Some(g) => g,
            None => new_group(system, beam),
        };
        switch_to_group(&mut system.sig, beam, Some(target));
    }
}

/// A beam is abnormal unless both ends rest on a stem or a rest
pub fn check_abnormal(sig: &Sig, beam: InterId) -> bool {
    let mut left = false;
    let mut right = false;
    for rel in sig.relations(beam, &[RelationKind::BeamStem, RelationKind::BeamRest]) {
        match sig.edge(rel).and_then(|e| e.relation.side()) {
            Some(HorizontalSide::Left) => left = true,
            Some(HorizontalSide::Right) => right = true,
            None => {}
        }
    }
    !(left && right)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Line;
    use crate::layout::StaffId;
    use crate::system::SystemBuilder;

    fn system() -> System {
        SystemBuilder::new(20.0).part(&[100.0]).barlines(&[0.0, 1000.0]).build()
    }

    fn add_stem(system: &mut System, x: f64, top: f64, bottom: f64) -> InterId {
        system.add_in_staff(
            Inter::stem(0.8, Point::new(x, top), Point::new(x, bottom), 2.0),
            StaffId(0),
        )
    }

    fn add_beam(system: &mut System, x1: f64, x2: f64, y: f64) -> InterId {
        let beam = Inter::beam(Shape::Beam, 0.8, Line::from_coords(x1, y, x2, y), 8.0);
        system.add_in_staff(beam, StaffId(0))
    }

    fn portion_of(link: &Link) -> BeamPortion {
        match link.relation {
            Relation::BeamStem(bs) => bs.portion,
            _ => panic!("not a beam-stem link"),
        }
    }

    #[test]
    fn test_check_link_portions() {
        let mut system = system();
        let beam = add_beam(&mut system, 100.0, 300.0, 60.0);
        let left = add_stem(&mut system, 100.0, 56.0, 150.0);
        let center = add_stem(&mut system, 200.0, 56.0, 150.0);
        let right = add_stem(&mut system, 300.0, 56.0, 150.0);
        let data = *system.sig.inter(beam).unwrap().as_beam().unwrap();

        let l = check_link(&system, &data, false, left, VerticalSide::Top, 0).unwrap();
        let c = check_link(&system, &data, false, center, VerticalSide::Top, 0).unwrap();
        let r = check_link(&system, &data, false, right, VerticalSide::Top, 0).unwrap();
        assert_eq!(l.portion, BeamPortion::Left);
        assert_eq!(c.portion, BeamPortion::Center);
        assert_eq!(r.portion, BeamPortion::Right);
        assert_eq!(c.gaps, Gaps::default());
        assert_eq!(c.grade, 1.0);
        assert_eq!(c.extension_point, Point::new(200.0, 57.0));
    }

    #[test]
    fn test_hook_has_no_center() {
        let mut system = system();
        let stem = add_stem(&mut system, 200.0, 56.0, 150.0);
        let data = BeamData {
            median: Line::from_coords(150.0, 60.0, 250.0, 60.0),
            height: 8.0,
        };
        let rel = check_link(&system, &data, true, stem, VerticalSide::Top, 0).unwrap();
        assert_ne!(rel.portion, BeamPortion::Center);
    }

    #[test]
    fn test_search_links_and_abnormal() {
        let mut system = system();
        let beam = add_beam(&mut system, 100.0, 300.0, 60.0);
        let left = add_stem(&mut system, 101.0, 56.0, 150.0);
        let _center = add_stem(&mut system, 200.0, 56.0, 150.0);
        let right = add_stem(&mut system, 299.0, 56.0, 150.0);
        let links = search_links(&system, beam, 0);
        assert_eq!(links.len(), 3);
        assert_eq!(portion_of(&links[0]), BeamPortion::Center);

        system.apply(beam, &links);
        assert!(!check_abnormal(&system.sig, beam));
        assert_eq!(stem_on(&system.sig, beam, BeamPortion::Left), Some(left));
        assert_eq!(stem_on(&system.sig, beam, BeamPortion::Right), Some(right));

        let rel = system.sig.relation_between(beam, right, RelationKind::BeamStem).unwrap();
        system.sig.remove_edge(rel);
        assert!(check_abnormal(&system.sig, beam));
    }

    #[test]
    fn test_side_keeps_first_of_equal_stems() {
        let mut system = system();
        let beam = add_beam(&mut system, 100.0, 300.0, 60.0);
        let first = add_stem(&mut system, 299.0, 56.0, 150.0);
        let _twin = add_stem(&mut system, 299.0, 56.0, 150.0);
        let data = *system.sig.inter(beam).unwrap().as_beam().unwrap();
        let stems = system.stems();
        let link = lookup_side_link(&system, &data, false, &stems, HorizontalSide::Right, 0).unwrap();
        assert_eq!(link.partner, first);
    }

    #[test]
    fn test_snap_keeps_min_width() {
        let mut system = system();
        add_stem(&mut system, 200.0, 56.0, 150.0);
        let mut data = BeamData {
            median: Line::from_coords(195.0, 60.0, 205.0, 60.0),
            height: 8.0,
        };
        assert!(snap_ends(&system, &mut data, true, 190.0, 0));
        assert_eq!(data.median.p2.x, 200.0);
        assert_eq!(data.median.p1.x, 190.0);
    }

    #[test]
    fn test_stem_vertical_gap() {
        let mut system = system();
        let beam = add_beam(&mut system, 100.0, 300.0, 60.0);
        let below = add_stem(&mut system, 200.0, 70.0, 150.0);
        let above = add_stem(&mut system, 250.0, 0.0, 50.0);
        assert_eq!(stem_vertical_gap(&system.sig, beam, below), Some(6.0));
        assert_eq!(stem_vertical_gap(&system.sig, beam, above), Some(6.0));
    }

    #[test]
    fn test_groups_follow_common_stems() {
        let mut system = system();
        let b1 = add_beam(&mut system, 100.0, 300.0, 60.0);
        let b2 = add_beam(&mut system, 100.0, 300.0, 74.0);
        let b3 = add_beam(&mut system, 500.0, 700.0, 60.0);
        for (x, beams) in [(100.0, [b1, b2]), (300.0, [b1, b2])] {
            let stem = add_stem(&mut system, x, 56.0, 150.0);
            for b in beams {
                let links = search_links(&system, b, 0);
                let links: Vec<Link> = links.into_iter().filter(|l| l.partner == stem).collect();
                system.apply(b, &links);
            }
        }
        assert!(has_common_stem_with(&system.sig, b1, b2));
        assert!(!has_common_stem_with(&system.sig, b1, b3));

        populate(&mut system);
        let g1 = group(&system.sig, b1).unwrap();
        assert_eq!(group(&system.sig, b2), Some(g1));
        let g3 = group(&system.sig, b3).unwrap();
        assert_ne!(g1, g3);

        switch_to_group(&mut system.sig, b3, Some(g1));
        assert_eq!(system.sig.members(g1).len(), 3);
        assert!(!system.sig.is_live(g3));
    }
}
