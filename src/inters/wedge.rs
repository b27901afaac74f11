//! Wedges (hairpins) and their chord links.
//!
//! Each end of the upper line looks for a standard chord in the measure
//! stack of that end: the closest chord above, else the closest below.

use tracing::{debug, info};

use crate::geom::{HorizontalSide, Point};
use crate::link::Link;
use crate::shape::Shape;
use crate::sig::{InterData, InterId, Relation, RelationKind, Sig, WedgeData};
use crate::system::System;

use super::chord;

fn data(sig: &Sig, wedge: InterId) -> Option<&WedgeData> {
    match &sig.inter(wedge)?.data {
        InterData::Wedge(data) => Some(data),
        _ => None,
    }
}

pub fn is_crescendo(sig: &Sig, wedge: InterId) -> bool {
    sig.inter(wedge).map(|i| i.shape == Shape::Crescendo).unwrap_or(false)
}

/// Vertical opening of the wedge at one side
pub fn spread(sig: &Sig, wedge: InterId, side: HorizontalSide) -> Option<f64> {
    Some(data(sig, wedge)?.spread(side))
}

pub fn search_links(system: &System, wedge: InterId) -> Vec<Link> {
    let (Some(inter), Some(data)) = (system.sig.inter(wedge), data(&system.sig, wedge)) else {
        return Vec::new();
    };
    let margin = system.scale.to_pixels(system.constants.wedge.stack_abscissa_margin) as f64;

    let mut links = Vec::new();
    for side in HorizontalSide::ALL {
        let end = data.l1.end(side);
        // An end slightly beyond the staff limit still belongs to the edge stack
        let stack = system
            .layout
            .stack_at(&end)
            .or_else(|| system.layout.stack_at(&Point::new(end.x - side.direction() * margin, end.y)));
        let Some(stack) = stack else {
            continue;
        };
        let found = chord::standard_chord_above(system, stack, &end).or_else(|| chord::standard_chord_below(system, stack, &end));
        match found {
            Some(c) => links.push(Link::new(c, Relation::ChordWedge(side), false)),
            None => debug!("no chord for wedge {} {:?}", wedge, side),
        }
    }
    if inter.vip {
        info!("VIP wedge {} found {} chord links", wedge, links.len());
    }
    links
}

pub fn chord(sig: &Sig, wedge: InterId, side: HorizontalSide) -> Option<InterId> {
    sig.relations(wedge, &[RelationKind::ChordWedge])
        .into_iter()
        .find(|rel| sig.edge(*rel).and_then(|e| e.relation.side()) == Some(side))
        .and_then(|rel| sig.opposite(wedge, rel))
}

pub fn check_abnormal(sig: &Sig, wedge: InterId) -> bool {
    !sig.has_relation(wedge, RelationKind::ChordWedge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Line;
    use crate::inters::head;
    use crate::layout::StaffId;
    use crate::sig::Inter;
    use crate::system::SystemBuilder;

    fn whole(system: &mut System, staff: StaffId, x: f64, y: f64) -> InterId {
        let h = head::create(system, Shape::WholeNote, staff, Point::new(x, y), 0.8).unwrap();
        let h = system.add(h);
        chord::build(system, &[h], None)
    }

    fn add_wedge(system: &mut System, x1: f64, x2: f64, y: f64) -> InterId {
        let l1 = Line::from_coords(x1, y, x2, y - 10.0);
        let l2 = Line::from_coords(x1, y, x2, y + 10.0);
        system.add(Inter::wedge(Shape::Crescendo, 0.8, l1, l2))
    }

    #[test]
    fn test_chord_above_preferred() {
        let mut system = SystemBuilder::new(20.0)
            .part(&[100.0, 300.0])
            .barlines(&[0.0, 500.0, 1000.0])
            .build();
        let above = whole(&mut system, StaffId(0), 120.0, 140.0);
        let below = whole(&mut system, StaffId(1), 110.0, 340.0);
        let right = whole(&mut system, StaffId(1), 620.0, 340.0);
        let wedge = add_wedge(&mut system, 100.0, 600.0, 240.0);

        let links = search_links(&system, wedge);
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].partner, above);
        assert_ne!(links[0].partner, below);
        assert_eq!(links[1].partner, right);
        assert!(!links[0].outgoing);

        system.apply(wedge, &links);
        assert!(!check_abnormal(&system.sig, wedge));
        assert_eq!(chord(&system.sig, wedge, HorizontalSide::Right), Some(right));
        assert!(is_crescendo(&system.sig, wedge));
        assert_eq!(spread(&system.sig, wedge, HorizontalSide::Right), Some(20.0));
    }

    #[test]
    fn test_end_beyond_stacks_uses_margin() {
        let mut system = SystemBuilder::new(20.0).part(&[100.0]).barlines(&[0.0, 500.0]).build();
        let c = whole(&mut system, StaffId(0), 480.0, 140.0);
        let wedge = add_wedge(&mut system, 400.0, 510.0, 240.0);
        let links = search_links(&system, wedge);
        assert_eq!(links.len(), 2);
        assert!(links.iter().all(|l| l.partner == c));
    }

    #[test]
    fn test_no_chord_is_abnormal() {
        let mut system = SystemBuilder::new(20.0).part(&[100.0]).barlines(&[0.0, 500.0]).build();
        let wedge = add_wedge(&mut system, 100.0, 300.0, 240.0);
        assert!(search_links(&system, wedge).is_empty());
        assert!(check_abnormal(&system.sig, wedge));
    }
}
