//! # Stem Queries
//!
//! Stems are the hub of most links: heads, beams and flags all connect to a
//! stem. This module answers the stem-side questions (which heads, which
//! chords, which direction) and proposes head-stem links.
//!
//! Every getter derives its answer from the graph alone, so calling it twice
//! without mutating the graph yields the same list.

use tracing::{debug, info};

use crate::geom::{HorizontalSide, Rect};
use crate::grade;
use crate::index::{self, GeoOrder};
use crate::link::Link;
use crate::shape::Shape;
use crate::sig::{Gaps, HeadStem, InterId, Relation, RelationKind, Sig};
use crate::system::System;

fn dedup_sorted_by_y(sig: &Sig, mut ids: Vec<InterId>) -> Vec<InterId> {
    ids.sort_by(|a, b| {
        let ya = sig.inter(*a).map(|i| i.center().y).unwrap_or(0.0);
        let yb = sig.inter(*b).map(|i| i.center().y).unwrap_or(0.0);
        ya.total_cmp(&yb).then(a.cmp(b))
    });
    ids.dedup();
    ids
}

/// Heads linked to the stem, from top to bottom
pub fn heads(sig: &Sig, stem: InterId) -> Vec<InterId> {
    dedup_sorted_by_y(sig, sig.partners(stem, RelationKind::HeadStem))
}

/// Head chords of the linked heads, by center abscissa
pub fn chords(sig: &Sig, stem: InterId) -> Vec<InterId> {
    let mut chords: Vec<InterId> = heads(sig, stem)
        .into_iter()
        .filter_map(|h| sig.ensemble_of(h, &[Shape::HeadChord, Shape::RestChord]))
        .collect();
    index::sort_by_center_abscissa(sig, &mut chords);
    chords.dedup();
    chords
}

/// Beams linked to the stem, from top to bottom
pub fn beams(sig: &Sig, stem: InterId) -> Vec<InterId> {
    dedup_sorted_by_y(sig, sig.partners(stem, RelationKind::BeamStem))
}

/// Flags linked to the stem
pub fn flags(sig: &Sig, stem: InterId) -> Vec<InterId> {
    sig.partners(stem, RelationKind::FlagStem)
}

/// Direction from heads to stem tail: -1 up, +1 down, 0 unknown
pub fn direction(sig: &Sig, stem: InterId) -> i32 {
    let Some(data) = sig.inter(stem).and_then(|i| i.as_stem()) else {
        return 0;
    };
    let head_ids = heads(sig, stem);
    if head_ids.is_empty() {
        return 0;
    }
    let mean_y = head_ids
        .iter()
        .filter_map(|h| sig.inter(*h).map(|i| i.center().y))
        .sum::<f64>()
        / head_ids.len() as f64;
    let middle = data.median().middle().y;
    if mean_y > middle {
        -1
    } else if mean_y < middle {
        1
    } else {
        0
    }
}

/// Whether the stem only carries small heads
pub fn is_grace_stem(sig: &Sig, stem: InterId) -> bool {
    let head_ids = heads(sig, stem);
    !head_ids.is_empty()
        && head_ids
            .iter()
            .all(|h| sig.inter(*h).map(|i| i.shape.is_small_head()).unwrap_or(false))
}

/// Grade a head-stem connection
///
/// The stem lies on the right side of the head when it is right of the head
/// center. The abscissa gap is signed (negative when the stem overlaps the
/// head), the ordinate gap is 0 when the stem reaches the head.
pub fn check_head_link(system: &System, head: InterId, stem: InterId, profile: usize) -> Option<HeadStem> {
    let head_inter = system.sig.inter(head)?;
    let data = system.sig.inter(stem)?.as_stem()?;
    let b = head_inter.bounds;
    let center = b.center();
    let median = data.median();
    let stem_x = median.x_at_y(center.y);

    let (head_side, x_gap) = if stem_x >= center.x {
        (HorizontalSide::Right, stem_x - b.right())
    } else {
        (HorizontalSide::Left, b.x - stem_x)
    };
    let y_gap = if data.bottom.y < b.y {
        b.y - data.bottom.y
    } else if data.top.y > b.bottom() {
        data.top.y - b.bottom()
    } else {
        0.0
    };

    let constants = &system.constants.head_stem;
    let scale = &system.scale;
    let gaps = Gaps {
        x: scale.pixels_to_frac(x_gap),
        y: scale.pixels_to_frac(y_gap),
    };
    let grade = grade::connection_grade(constants, profile, gaps.x, gaps.y);
    if grade < constants.min_grade {
        return None;
    }
    debug!("head {} stem {} {:?} grade {:.3}", head, stem, head_side, grade);
    Some(HeadStem {
        head_side,
        gaps,
        grade,
    })
}

/// Head-stem links around a stem, one per acceptable head
pub fn search_links(system: &System, stem: InterId, profile: usize) -> Vec<Link> {
    let Some(inter) = system.sig.inter(stem) else {
        return Vec::new();
    };
    let profile = system.profile_for(stem, profile);
    let constants = &system.constants.head_stem;
    let scale = &system.scale;
    let x_margin = scale.to_pixels_f(constants.x_out_gap_max.at(profile)) + scale.interline();
    let y_margin = scale.to_pixels_f(constants.y_gap_max.at(profile));
    let lu_box: Rect = inter.bounds.grown(x_margin, y_margin);
    if inter.vip {
        info!("VIP head search for stem {} in {:?}", stem, lu_box);
    }

    let heads = system.heads();
    index::intersected_inters(&system.sig, &heads, GeoOrder::ByAbscissa, &lu_box.into())
        .into_iter()
        .filter(|h| {
            system
                .sig
                .inter(*h)
                .map(|i| !i.shape.is_stemless_head())
                .unwrap_or(false)
        })
        .filter_map(|h| {
            check_head_link(system, h, stem, profile)
                .map(|rel| Link::new(h, Relation::HeadStem(rel), false))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Point;
    use crate::inters::head;
    use crate::layout::StaffId;
    use crate::sig::Inter;
    use crate::system::SystemBuilder;

    fn note(system: &mut System, x: f64, y: f64, shape: Shape) -> (InterId, InterId) {
        let h = head::create(system, shape, StaffId(0), Point::new(x, y), 0.8).unwrap();
        let right = h.bounds.right();
        let head = system.add(h);
        let stem = system.add_in_staff(
            Inter::stem(0.8, Point::new(right, y - 70.0), Point::new(right, y), 2.0),
            StaffId(0),
        );
        let links = search_links(system, stem, 0);
        system.apply(stem, &links);
        (head, stem)
    }

    #[test]
    fn test_head_link_on_right_side() {
        let mut system = SystemBuilder::new(20.0).part(&[100.0]).build();
        let (head, stem) = note(&mut system, 200.0, 150.0, Shape::NoteheadBlack);
        let rel = system.sig.relation_between(stem, head, RelationKind::HeadStem).unwrap();
        match system.sig.edge(rel).unwrap().relation {
            Relation::HeadStem(hs) => {
                assert_eq!(hs.head_side, HorizontalSide::Right);
                assert_eq!(hs.grade, 1.0);
            }
            _ => panic!("unexpected relation"),
        }
        assert_eq!(system.sig.edge(rel).unwrap().source, head);
        assert_eq!(direction(&system.sig, stem), -1);
        assert!(!is_grace_stem(&system.sig, stem));
    }

    #[test]
    fn test_getters_are_idempotent() {
        let mut system = SystemBuilder::new(20.0).part(&[100.0]).build();
        let (_, stem) = note(&mut system, 200.0, 150.0, Shape::NoteheadBlackSmall);
        assert_eq!(heads(&system.sig, stem), heads(&system.sig, stem));
        assert_eq!(chords(&system.sig, stem), chords(&system.sig, stem));
        assert!(is_grace_stem(&system.sig, stem));
    }
}
