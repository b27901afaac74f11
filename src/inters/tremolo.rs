//! # Tremolos
//!
//! Tremolo strokes drawn across a stem, or above/below a whole note.
//!
//! ## Purpose
//! - Find the stem crossing the tremolo, or failing that the stemless head
//!   aligned with it, and grade the alignment.
//! - Attach the tremolo to the chord of its partner as an ornament.
//! - Merge tremolo fragments found on the same partner into one compound
//!   tremolo whose stroke count is the sum of the fragments.

use tracing::{debug, info, warn};

use crate::geom::{Point, Rect};
use crate::grade;
use crate::index::{self, GeoOrder};
use crate::link::{BestLink, Link};
use crate::shape::Shape;
use crate::sig::{Inter, InterData, InterId, Relation, RelationKind, Sig, TremoloLink};
use crate::system::System;

use super::{head, stem};

pub fn create(shape: Shape, grade: f64, bounds: Rect) -> Inter {
    Inter::new(shape, grade, bounds, InterData::Tremolo)
}

/// Whether a glyph width is compatible with a tremolo
pub fn is_tremolo_width(system: &System, width: f64) -> bool {
    let c = &system.constants.tremolo;
    let typical = system.scale.to_pixels_f(c.width);
    let margin = system.scale.to_pixels_f(c.width_margin);
    width >= typical - margin && width <= typical + margin
}

fn link_grade(system: &System, dx: f64, dy: f64, profile: usize) -> TremoloLink {
    let c = &system.constants.tremolo;
    let dx = system.scale.pixels_to_frac(dx);
    let dy = system.scale.pixels_to_frac(dy);
    let grade = grade::weighted_mean(&[
        (grade::gap_impact(dx, c.center_dx_max.at(profile)), 1.0),
        (grade::gap_impact(dy, c.y_gap_max.at(profile)), 1.0),
    ]);
    TremoloLink { dx, dy, grade }
}

/// Vertical extent of the strokes, without the slope overhang
fn stroke_range(bounds: &Rect, y_shift: f64) -> (f64, f64) {
    (bounds.y + y_shift, bounds.bottom() - 1.0 - y_shift)
}

fn lookup_box(system: &System, bounds: &Rect, y_shift: f64, profile: usize) -> Rect {
    let c = &system.constants.tremolo;
    let x_out = system.scale.to_pixels(c.center_dx_max.at(profile)) as f64;
    let y_gap = system.scale.to_pixels(c.y_gap_max.at(profile)) as f64;
    let dy = (bounds.height * 0.5 - y_shift + y_gap).round();
    Rect::around(bounds.center(), x_out, dy.max(0.0))
}

fn lookup_stem(system: &System, bounds: &Rect, profile: usize) -> Option<Link> {
    let c = &system.constants.tremolo;
    let y_shift = (bounds.width * 0.5 * c.slope).abs();
    let lu_box = lookup_box(system, bounds, y_shift, profile);
    let center = bounds.center();
    let (t1, t2) = stroke_range(bounds, y_shift);

    let stems = system.stems();
    let mut best = BestLink::new();
    for s in index::intersected_inters(&system.sig, &stems, GeoOrder::ByAbscissa, &lu_box.into()) {
        let Some(median) = system.sig.inter(s).and_then(|i| i.as_stem()).map(|d| d.median()) else {
            continue;
        };
        let dx = (center.x - median.x_at_y(center.y)).abs();
        let y_min = median.p1.y.max(t1);
        let y_max = median.p2.y.min(t2);
        let dy = if y_max >= y_min { 0.0 } else { y_min - y_max };
        let rel = link_grade(system, dx, dy, profile);
        if rel.grade >= c.min_grade {
            best.offer(Link::new(s, Relation::TremoloStem(rel), true));
        }
    }
    best.into_inner()
}

fn lookup_whole(system: &System, bounds: &Rect, profile: usize) -> Option<Link> {
    let c = &system.constants.tremolo;
    let y_shift = (bounds.width * 0.5 * c.slope).abs();
    let lu_box = lookup_box(system, bounds, y_shift, profile);
    let center = bounds.center();
    let (t1, t2) = stroke_range(bounds, y_shift);

    let heads: Vec<InterId> = system
        .heads()
        .into_iter()
        .filter(|h| system.sig.inter(*h).map(|i| i.shape.is_stemless_head()).unwrap_or(false))
        .collect();
    let mut best = BestLink::new();
    for h in index::intersected_inters(&system.sig, &heads, GeoOrder::ByAbscissa, &lu_box.into()) {
        let Some(hb) = system.sig.inter(h).map(|i| i.bounds) else {
            continue;
        };
        let dx = (center.x - hb.center().x).abs();
        let dy = if t2 < hb.y {
            hb.y - t2
        } else if t1 > hb.bottom() {
            t1 - hb.bottom()
        } else {
            0.0
        };
        let rel = link_grade(system, dx, dy, profile);
        if rel.grade >= c.min_grade {
            best.offer(Link::new(h, Relation::TremoloWhole(rel), true));
        }
    }
    best.into_inner()
}

/// At most one link: a crossing stem first, else an aligned whole head
pub fn search_links(system: &System, tremolo: InterId, profile: usize) -> Vec<Link> {
    let Some(inter) = system.sig.inter(tremolo) else {
        return Vec::new();
    };
    let profile = system.profile_for(tremolo, profile);
    if inter.vip {
        info!("VIP partner search for tremolo {}", tremolo);
    }
    lookup_stem(system, &inter.bounds, profile)
        .or_else(|| lookup_whole(system, &inter.bounds, profile))
        .into_iter()
        .collect()
}

/// Abscissa aligning the tremolo center on the best stem
pub fn snap_abscissa(system: &System, bounds: &Rect, profile: usize) -> Option<f64> {
    let link = lookup_stem(system, bounds, profile)?;
    let median = system.sig.inter(link.partner)?.as_stem()?.median();
    Some(median.x_at_y(bounds.center().y))
}

/// Stem or whole head the tremolo belongs to
pub fn partner(sig: &Sig, tremolo: InterId) -> Option<InterId> {
    sig.partners(tremolo, RelationKind::TremoloStem)
        .into_iter()
        .chain(sig.partners(tremolo, RelationKind::TremoloWhole))
        .next()
}

/// Chord of a stem (first by abscissa) or of a whole head
fn partner_chord(sig: &Sig, partner: InterId) -> Option<InterId> {
    match sig.inter(partner)?.shape {
        Shape::Stem => stem::chords(sig, partner).into_iter().next(),
        _ => head::chord(sig, partner),
    }
}

/// Record the tremolo as an ornament of its partner chord
pub fn link_as_ornament(sig: &mut Sig, tremolo: InterId) {
    let Some(chord) = partner(sig, tremolo).and_then(|p| partner_chord(sig, p)) else {
        return;
    };
    if sig.relation_between(chord, tremolo, RelationKind::ChordOrnament).is_none() {
        sig.add_edge(chord, tremolo, Relation::ChordOrnament);
    }
}

/// Merge several tremolos linked to one stem or whole head
///
/// Fragments graded below the tremolo minimum grade are left out of the
/// compound and stay as they are. Returns the compound tremolos created.
pub fn aggregate(system: &mut System) -> Vec<InterId> {
    let min_grade = system.constants.tremolo.min_grade;
    let mut partners = system.stems();
    partners.extend(system.sorted_inters(Shape::is_stemless_head));

    let mut compounds = Vec::new();
    for p in partners {
        for kind in [RelationKind::TremoloStem, RelationKind::TremoloWhole] {
            let trems: Vec<InterId> = system
                .sig
                .partners(p, kind)
                .into_iter()
                .filter(|t| system.sig.inter(*t).map(|i| i.grade >= min_grade).unwrap_or(false))
                .collect();
            if trems.len() < 2 {
                continue;
            }
            match merge(system, p, kind, &trems) {
                Some(compound) => compounds.push(compound),
                None => warn!("could not aggregate {} tremolos around {}", trems.len(), p),
            }
        }
    }
    compounds
}

fn merge(system: &mut System, partner: InterId, kind: RelationKind, trems: &[InterId]) -> Option<InterId> {
    let mut count = 0u8;
    let mut total_grade = 0.0;
    let mut bounds: Option<Rect> = None;
    for t in trems {
        let inter = system.sig.inter(*t)?;
        count = count.saturating_add(inter.shape.tremolo_value()?);
        total_grade += inter.grade;
        bounds = Some(match bounds {
            Some(b) => b.union(&inter.bounds),
            None => inter.bounds,
        });
    }
    let shape = Shape::tremolo_shape(count).ok()?;
    let grade = total_grade / trems.len() as f64;
    let mut compound = create(shape, grade, bounds?);
    compound.staff = system.sig.inter(partner)?.staff;
    let id = system.add(compound);

    let rel = TremoloLink {
        dx: 0.0,
        dy: 0.0,
        grade: 1.0,
    };
    let relation = match kind {
        RelationKind::TremoloWhole => Relation::TremoloWhole(rel),
        _ => Relation::TremoloStem(rel),
    };
    system.sig.add_edge(id, partner, relation);
    link_as_ornament(&mut system.sig, id);
    for t in trems {
        system.sig.remove_vertex(*t);
    }
    debug!("compound tremolo {} of {} strokes on {}", id, count, partner);
    Some(id)
}

pub fn check_abnormal(sig: &Sig, tremolo: InterId) -> bool {
    partner(sig, tremolo).is_none()
}

/// Tremolo box of the typical width centered on a point
pub fn typical_bounds(system: &System, center: Point, height: f64) -> Rect {
    let width = system.scale.to_pixels_f(system.constants.tremolo.width);
    Rect::around(center, width / 2.0, height / 2.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inters::chord;
    use crate::layout::StaffId;
    use crate::system::SystemBuilder;

    fn note(system: &mut System) -> (InterId, InterId) {
        let h = head::create(system, Shape::NoteheadBlack, StaffId(0), Point::new(200.0, 150.0), 0.8).unwrap();
        let right = h.bounds.right();
        let head = system.add(h);
        let s = system.add_in_staff(
            Inter::stem(0.8, Point::new(right, 80.0), Point::new(right, 150.0), 2.0),
            StaffId(0),
        );
        let links = stem::search_links(system, s, 0);
        system.apply(s, &links);
        let c = chord::build(system, &[head], Some(s));
        (s, c)
    }

    fn add_tremolo(system: &mut System, shape: Shape, x: f64, y: f64) -> InterId {
        let bounds = typical_bounds(system, Point::new(x, y), 10.0);
        system.add_in_staff(create(shape, 0.6, bounds), StaffId(0))
    }

    #[test]
    fn test_tremolo_on_stem() {
        let mut system = SystemBuilder::new(20.0).part(&[100.0]).build();
        let (s, c) = note(&mut system);
        let trem = add_tremolo(&mut system, Shape::Tremolo1, 212.0, 110.0);
        let links = search_links(&system, trem, 0);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].partner, s);
        assert_eq!(links[0].grade(), 1.0);
        system.apply(trem, &links);
        link_as_ornament(&mut system.sig, trem);
        assert!(system.sig.relation_between(c, trem, RelationKind::ChordOrnament).is_some());
        assert!(!check_abnormal(&system.sig, trem));
    }

    #[test]
    fn test_tremolo_on_whole_note() {
        let mut system = SystemBuilder::new(20.0).part(&[100.0]).build();
        let h = head::create(&system, Shape::WholeNote, StaffId(0), Point::new(300.0, 150.0), 0.8).unwrap();
        let whole = system.add(h);
        let trem = add_tremolo(&mut system, Shape::Tremolo2, 300.0, 133.0);
        let links = search_links(&system, trem, 0);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].partner, whole);
        assert_eq!(links[0].relation.kind(), RelationKind::TremoloWhole);
    }

    #[test]
    fn test_aggregate_fragments() {
        let mut system = SystemBuilder::new(20.0).part(&[100.0]).build();
        let (s, c) = note(&mut system);
        let t1 = add_tremolo(&mut system, Shape::Tremolo1, 212.0, 100.0);
        let t2 = add_tremolo(&mut system, Shape::Tremolo2, 212.0, 115.0);
        for t in [t1, t2] {
            let links = search_links(&system, t, 0);
            system.apply(t, &links);
        }
        let compounds = aggregate(&mut system);
        assert_eq!(compounds.len(), 1);
        let compound = system.sig.inter(compounds[0]).unwrap();
        assert_eq!(compound.shape, Shape::Tremolo3);
        assert!((compound.grade - 0.6).abs() < 1e-9);
        assert!(!system.sig.is_live(t1) && !system.sig.is_live(t2));
        assert_eq!(partner(&system.sig, compounds[0]), Some(s));
        assert!(system.sig.relation_between(c, compounds[0], RelationKind::ChordOrnament).is_some());
    }

    #[test]
    fn test_aggregate_skips_weak_fragment() {
        let mut system = SystemBuilder::new(20.0).part(&[100.0]).build();
        let (s, _) = note(&mut system);
        let t1 = add_tremolo(&mut system, Shape::Tremolo1, 212.0, 100.0);
        let t2 = add_tremolo(&mut system, Shape::Tremolo2, 212.0, 115.0);
        let bounds = typical_bounds(&system, Point::new(212.0, 130.0), 10.0);
        let weak = system.add_in_staff(create(Shape::Tremolo1, 0.05, bounds), StaffId(0));
        for t in [t1, t2, weak] {
            let links = search_links(&system, t, 0);
            system.apply(t, &links);
        }
        assert_eq!(partner(&system.sig, weak), Some(s));

        let compounds = aggregate(&mut system);
        assert_eq!(compounds.len(), 1);
        assert_eq!(system.sig.inter(compounds[0]).unwrap().shape, Shape::Tremolo3);
        assert!(!system.sig.is_live(t1) && !system.sig.is_live(t2));
        assert!(system.sig.is_live(weak));
    }

    #[test]
    fn test_tremolo_width() {
        let system = SystemBuilder::new(20.0).part(&[100.0]).build();
        assert!(is_tremolo_width(&system, 27.0));
        assert!(!is_tremolo_width(&system, 40.0));
    }
}
