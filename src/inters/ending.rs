//! # Endings
//!
//! A volta bracket: a horizontal line above a staff, with an optional leg
//! hanging at each end, and optional number or text sentences inside.
//!
//! ## Purpose
//! - Link each ending side to the barline aligned with it. A missing left
//!   barline falls back to the part boundary barline when the ending starts
//!   within the first measure.
//! - Link the sentences fully contained in the ending bounds.
//! - Extract the ending number, and its exported form made of digits
//!   separated by commas.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

use crate::geom::{HorizontalSide, Line, Rect};
use crate::grade;
use crate::index::{self, GeoOrder};
use crate::layout::StaffId;
use crate::link::Link;
use crate::shape::Shape;
use crate::sig::{EndingBar, EndingData, Inter, InterData, InterId, Relation, RelationKind, Sig, TextRole};
use crate::system::System;

static NUMBER_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[1-9].*").expect("valid ending number pattern"));

/// New ending inter; bounds cover line and legs, grown by half the line thickness
pub fn create(system: &System, grade: f64, line: Line, left_leg: Option<Line>, right_leg: Option<Line>) -> Inter {
    let mut bounds = line.bounds();
    for leg in [left_leg, right_leg].into_iter().flatten() {
        bounds = bounds.union(&leg.bounds());
    }
    let margin = (system.constants.ending.default_thickness / 2.0).ceil();
    let data = EndingData {
        line,
        left_leg,
        right_leg,
    };
    Inter::new(Shape::Ending, grade, bounds.grown(margin, margin), InterData::Ending(data))
}

fn ending_data(sig: &Sig, ending: InterId) -> Option<&EndingData> {
    match &sig.inter(ending)?.data {
        InterData::Ending(data) => Some(data),
        _ => None,
    }
}

/// Barline of the staff vertically aligned with one end of the ending line
///
/// For the left end the right-most candidate is chosen, for the right end
/// the left-most.
fn lookup_bar(system: &System, line: &Line, side: HorizontalSide, staff: StaffId, profile: usize) -> Option<InterId> {
    let st = system.layout.staff(staff)?;
    let end = line.end(side).rounded();
    let shift = system.scale.to_pixels(system.constants.ending.max_bar_shift.at(profile)) as f64;
    let lu_box = Rect::new(end.x - shift, end.y, 2.0 * shift, st.last_line_y() - end.y);

    let bars: Vec<InterId> = system
        .barlines()
        .into_iter()
        .filter(|b| system.sig.inter(*b).map(|i| i.staff == Some(staff)).unwrap_or(false))
        .collect();
    let found = index::intersected_inters(&system.sig, &bars, GeoOrder::ByAbscissa, &lu_box.into());
    match side {
        HorizontalSide::Left => found.last().copied(),
        HorizontalSide::Right => found.first().copied(),
    }
}

fn bar_link(system: &System, bar: InterId, side: HorizontalSide, gap_px: f64, profile: usize) -> Link {
    // Leg on either side of the bar
    let gap = system.scale.pixels_to_frac(gap_px.abs());
    let max = system.constants.ending.max_bar_shift.at(profile);
    let rel = EndingBar {
        side,
        gap,
        grade: grade::gap_impact(gap, max),
    };
    Link::new(bar, Relation::EndingBar(rel), true)
}

/// Barline links of an ending, for the staff at or below its line
pub fn search_links(system: &System, ending: InterId, profile: usize) -> Vec<Link> {
    let Some(inter) = system.sig.inter(ending) else {
        return Vec::new();
    };
    let Some(data) = ending_data(&system.sig, ending) else {
        return Vec::new();
    };
    let profile = system.profile_for(ending, profile);
    let line = data.line;
    let Some(staff) = system.layout.staff_at_or_below(&line.p1) else {
        return Vec::new();
    };
    if inter.vip {
        info!("VIP bar search for ending {} above staff {:?}", ending, staff);
    }

    let mut links = Vec::new();
    match lookup_bar(system, &line, HorizontalSide::Left, staff, profile) {
        Some(bar) => {
            let bar_x = system.sig.inter(bar).map(|i| i.center().x).unwrap_or(line.p1.x);
            links.push(bar_link(system, bar, HorizontalSide::Left, line.p1.x - bar_x, profile));
        }
        None => {
            // Staff start, perhaps after a header and without any barline
            let Some(first) = system.layout.first_stack() else {
                return links;
            };
            if line.p1.x >= first.right {
                return links;
            }
            if let Some(bar) = system.layout.part_of(staff).and_then(|p| p.left_bar) {
                links.push(bar_link(system, bar, HorizontalSide::Left, 0.0, profile));
            }
        }
    }

    if let Some(bar) = lookup_bar(system, &line, HorizontalSide::Right, staff, profile) {
        let bar_x = system.sig.inter(bar).map(|i| i.center().x).unwrap_or(line.p2.x);
        links.push(bar_link(system, bar, HorizontalSide::Right, bar_x - line.p2.x, profile));
    }
    debug!("ending {} found {} bar links", ending, links.len());
    links
}

/// Links to the sentences lying entirely within the ending bounds
pub fn sentence_links(system: &System, ending: InterId) -> Vec<Link> {
    let Some(inter) = system.sig.inter(ending) else {
        return Vec::new();
    };
    let sentences = system.sorted_inters(|s| s == Shape::Text);
    index::contained_inters(&system.sig, &sentences, &inter.bounds)
        .into_iter()
        .map(|s| Link::new(s, Relation::EndingSentence, true))
        .collect()
}

/// Linked sentences from left to right, with their trimmed text and role
fn sentences(sig: &Sig, ending: InterId) -> Vec<(TextRole, String)> {
    let mut ids = sig.partners(ending, RelationKind::EndingSentence);
    index::sort_by_abscissa(sig, &mut ids);
    ids.into_iter()
        .filter_map(|id| match &sig.inter(id)?.data {
            InterData::Sentence(s) => Some((s.role, s.text.trim().to_string())),
            _ => None,
        })
        .collect()
}

/// Ending number clause, such as "1." or "1, 2"
pub fn number(sig: &Sig, ending: InterId) -> Option<String> {
    sentences(sig, ending)
        .into_iter()
        .find(|(role, text)| *role == TextRole::EndingNumber || NUMBER_PATTERN.is_match(text))
        .map(|(_, text)| text)
}

/// Number reduced to digit groups joined by commas: "1., 2." gives "1,2"
pub fn exported_number(sig: &Sig, ending: InterId) -> Option<String> {
    let raw = number(sig, ending)?;
    let digits: Vec<&str> = raw
        .split(|c: char| !c.is_ascii_digit())
        .filter(|s| !s.is_empty())
        .collect();
    Some(digits.join(","))
}

/// Raw ending text when it differs from the number
pub fn value(sig: &Sig, ending: InterId) -> Option<String> {
    let number = number(sig, ending);
    sentences(sig, ending)
        .into_iter()
        .map(|(_, text)| text)
        .find(|text| Some(text) != number.as_ref())
}

/// Abnormal without a barline on its left side
pub fn check_abnormal(sig: &Sig, ending: InterId) -> bool {
    !sig.relations(ending, &[RelationKind::EndingBar])
        .into_iter()
        .any(|rel| sig.edge(rel).and_then(|e| e.relation.side()) == Some(HorizontalSide::Left))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::SystemBuilder;

    fn add_ending(system: &mut System, x1: f64, x2: f64) -> InterId {
        let line = Line::from_coords(x1, 50.0, x2, 50.0);
        let left_leg = Some(Line::from_coords(x1, 50.0, x1, 80.0));
        let ending = create(system, 0.8, line, left_leg, None);
        system.add_in_staff(ending, StaffId(0))
    }

    #[test]
    fn test_bounds_include_legs() {
        let mut system = SystemBuilder::new(20.0).part(&[100.0]).build();
        let ending = add_ending(&mut system, 400.0, 700.0);
        let bounds = system.sig.inter(ending).unwrap().bounds;
        assert_eq!(bounds, Rect::new(399.0, 49.0, 302.0, 32.0));
    }

    #[test]
    fn test_links_to_aligned_bars() {
        let mut system = SystemBuilder::new(20.0)
            .part(&[100.0])
            .barlines(&[0.0, 400.0, 700.0, 1000.0])
            .build();
        let ending = add_ending(&mut system, 402.0, 699.0);
        let links = search_links(&system, ending, 0);
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].relation.side(), Some(HorizontalSide::Left));
        assert_eq!(system.sig.inter(links[0].partner).unwrap().center().x, 400.0);
        system.apply(ending, &links);
        assert!(!check_abnormal(&system.sig, ending));
    }

    #[test]
    fn test_gap_of_leg_left_of_bar() {
        let mut system = SystemBuilder::new(20.0)
            .part(&[100.0])
            .barlines(&[0.0, 400.0, 700.0, 1000.0])
            .build();
        let ending = add_ending(&mut system, 395.0, 699.0);
        let links = search_links(&system, ending, 0);
        let Relation::EndingBar(left) = links[0].relation else {
            panic!("expected an ending bar relation");
        };
        assert_eq!(left.side, HorizontalSide::Left);
        assert_eq!(left.gap, 0.25);
        for link in &links {
            if let Relation::EndingBar(rel) = link.relation {
                assert!(rel.gap >= 0.0);
            }
        }
    }

    #[test]
    fn test_left_part_bar_fallback() {
        let mut system = SystemBuilder::new(20.0)
            .part(&[100.0])
            .barlines(&[300.0, 600.0, 1000.0])
            .part_left_bar()
            .build();
        let ending = add_ending(&mut system, 100.0, 299.0);
        let links = search_links(&system, ending, 0);
        let left_bar = system.layout.parts[0].left_bar.unwrap();
        assert_eq!(links[0].partner, left_bar);
        assert_eq!(links[0].relation.grade(), 1.0);

        let late = add_ending(&mut system, 650.0, 900.0);
        assert!(search_links(&system, late, 0).is_empty());
        assert!(check_abnormal(&system.sig, late));
    }

    #[test]
    fn test_number_from_sentences() {
        let mut system = SystemBuilder::new(20.0).part(&[100.0]).build();
        let ending = add_ending(&mut system, 400.0, 700.0);
        let text = Inter::sentence(0.8, Rect::new(410.0, 55.0, 30.0, 15.0), TextRole::Unknown, "1., 2.");
        system.add(text);
        let outside = Inter::sentence(0.8, Rect::new(800.0, 55.0, 30.0, 15.0), TextRole::EndingNumber, "3.");
        system.add(outside);

        let links = sentence_links(&system, ending);
        assert_eq!(links.len(), 1);
        system.apply(ending, &links);
        assert_eq!(number(&system.sig, ending).as_deref(), Some("1., 2."));
        assert_eq!(exported_number(&system.sig, ending).as_deref(), Some("1,2"));
        assert_eq!(value(&system.sig, ending), None);
    }
}
