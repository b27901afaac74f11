//! # Spatial Index
//!
//! Selects, among a candidate population, the inters whose bounds meet a
//! lookup region.
//!
//! Populations are snapshots taken before a search. When they are sorted
//! along an axis, the scan stops as soon as candidates start beyond the
//! region on that axis; the relative order of the survivors is preserved,
//! which is what makes "first found wins" tie-breaks deterministic.

use std::cmp::Ordering;

use crate::geom::{Area, Rect};
use crate::sig::{InterId, Sig};

/// Order of a candidate population
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeoOrder {
    None,
    ByAbscissa,
    ByOrdinate,
}

fn by_abscissa(sig: &Sig, a: InterId, b: InterId) -> Ordering {
    let ra = sig.inter(a).map(|i| i.bounds.x).unwrap_or(f64::MAX);
    let rb = sig.inter(b).map(|i| i.bounds.x).unwrap_or(f64::MAX);
    ra.total_cmp(&rb).then(a.cmp(&b))
}

fn by_ordinate(sig: &Sig, a: InterId, b: InterId) -> Ordering {
    let ra = sig.inter(a).map(|i| i.bounds.y).unwrap_or(f64::MAX);
    let rb = sig.inter(b).map(|i| i.bounds.y).unwrap_or(f64::MAX);
    ra.total_cmp(&rb).then(a.cmp(&b))
}

/// Sort ids by left abscissa of their bounds, ties by id
pub fn sort_by_abscissa(sig: &Sig, ids: &mut [InterId]) {
    ids.sort_by(|a, b| by_abscissa(sig, *a, *b));
}

/// Sort ids by top ordinate of their bounds, ties by id
pub fn sort_by_ordinate(sig: &Sig, ids: &mut [InterId]) {
    ids.sort_by(|a, b| by_ordinate(sig, *a, *b));
}

/// Sort ids by abscissa of their bounds center, ties by id
pub fn sort_by_center_abscissa(sig: &Sig, ids: &mut [InterId]) {
    ids.sort_by(|a, b| {
        let xa = sig.inter(*a).map(|i| i.center().x).unwrap_or(f64::MAX);
        let xb = sig.inter(*b).map(|i| i.center().x).unwrap_or(f64::MAX);
        xa.total_cmp(&xb).then(a.cmp(b))
    });
}

/// Candidates whose bounds intersect the area, in population order
pub fn intersected_inters(sig: &Sig, sorted: &[InterId], order: GeoOrder, area: &Area) -> Vec<InterId> {
    let area_box = area.bounds();
    let mut found = Vec::new();

    for id in sorted {
        let Some(inter) = sig.inter(*id) else {
            continue;
        };
        if inter.removed {
            continue;
        }
        match order {
            GeoOrder::ByAbscissa if inter.bounds.x > area_box.right() => break,
            GeoOrder::ByOrdinate if inter.bounds.y > area_box.bottom() => break,
            _ => {}
        }
        if area.intersects(&inter.bounds) {
            found.push(*id);
        }
    }
    found
}

/// Candidates whose bounds lie entirely within the box
pub fn contained_inters(sig: &Sig, candidates: &[InterId], rect: &Rect) -> Vec<InterId> {
    candidates
        .iter()
        .copied()
        .filter(|id| sig.inter(*id).map(|i| !i.removed && rect.contains(&i.bounds)).unwrap_or(false))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::{Point, Polygon};
    use crate::sig::Inter;

    fn population() -> (Sig, Vec<InterId>) {
        let mut sig = Sig::new();
        let mut ids = Vec::new();
        for x in [50.0, 10.0, 30.0, 90.0] {
            ids.push(sig.add_vertex(Inter::stem(0.8, Point::new(x, 0.0), Point::new(x, 40.0), 2.0)));
        }
        sort_by_abscissa(&sig, &mut ids);
        (sig, ids)
    }

    #[test]
    fn test_sorted_population() {
        let (sig, ids) = population();
        let xs: Vec<f64> = ids.iter().map(|id| sig.inter(*id).unwrap().bounds.x).collect();
        assert_eq!(xs, vec![9.0, 29.0, 49.0, 89.0]);
    }

    #[test]
    fn test_intersected_by_rect() {
        let (sig, ids) = population();
        let area = Area::Rect(Rect::new(20.0, 10.0, 40.0, 5.0));
        let found = intersected_inters(&sig, &ids, GeoOrder::ByAbscissa, &area);
        assert_eq!(found, vec![ids[1], ids[2]]);
    }

    #[test]
    fn test_intersected_by_polygon() {
        let (sig, ids) = population();
        let poly = Polygon::new(vec![
            Point::new(0.0, 0.0),
            Point::new(20.0, 0.0),
            Point::new(20.0, 10.0),
            Point::new(0.0, 10.0),
        ]);
        let found = intersected_inters(&sig, &ids, GeoOrder::None, &Area::Polygon(poly));
        assert_eq!(found, vec![ids[0]]);
    }

    #[test]
    fn test_empty_area_and_population() {
        let (sig, ids) = population();
        let area = Area::Rect(Rect::new(200.0, 200.0, 0.0, 0.0));
        assert!(intersected_inters(&sig, &ids, GeoOrder::ByAbscissa, &area).is_empty());
        assert!(intersected_inters(&sig, &[], GeoOrder::None, &area).is_empty());
    }

    #[test]
    fn test_contained() {
        let (sig, ids) = population();
        let found = contained_inters(&sig, &ids, &Rect::new(0.0, -5.0, 40.0, 50.0));
        assert_eq!(found.len(), 2);
    }
}
