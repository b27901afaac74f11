//! # System Module
//!
//! One system of a sheet: its graph, its layout, its scale and the
//! constants in force. Every link search runs against a `System`.
//!
//! ## Example
//! ```rust
//! use omr_inter::system::SystemBuilder;
//!
//! let system = SystemBuilder::new(20.0)
//!     .part(&[100.0])
//!     .barlines(&[0.0, 400.0, 800.0])
//!     .build();
//! assert_eq!(system.layout.stacks.len(), 2);
//! assert_eq!(system.barlines().len(), 3);
//! ```

use crate::config::{self, Constants};
use crate::error::InterError;
use crate::geom::{Line, Point};
use crate::index;
use crate::layout::{Layout, MeasureStack, Part, PartId, StackId, Staff, StaffId};
use crate::link::{self, Link};
use crate::scale::Scale;
use crate::shape::Shape;
use crate::sig::{ClefKind, Inter, InterData, InterId, RelationId, RelationKind, Sig};

#[derive(Debug, Clone)]
pub struct System {
    pub sig: Sig,
    pub layout: Layout,
    pub scale: Scale,
    pub constants: Constants,
}

impl System {
    pub fn new(layout: Layout, scale: Scale) -> Self {
        Self::with_constants(layout, scale, config::defaults().clone())
    }

    pub fn with_constants(layout: Layout, scale: Scale, constants: Constants) -> Self {
        Self {
            sig: Sig::new(),
            layout,
            scale,
            constants,
        }
    }

    /// Add an inter; its part is derived from its staff when missing
    pub fn add(&mut self, mut inter: Inter) -> InterId {
        if inter.part.is_none() {
            if let Some(staff) = inter.staff {
                inter.part = self.layout.staff(staff).map(|s| s.part);
            }
        }
        self.sig.add_vertex(inter)
    }

    /// Add an inter in a staff
    pub fn add_in_staff(&mut self, inter: Inter, staff: StaffId) -> InterId {
        let mut inter = inter;
        inter.staff = Some(staff);
        self.add(inter)
    }

    pub fn inter(&self, id: InterId) -> Result<&Inter, InterError> {
        self.sig.get(id)
    }

    /// Apply links found for an inter, superseding relations of the same kinds
    pub fn relink(&mut self, id: InterId, kinds: &[RelationKind], links: &[Link]) -> Vec<RelationId> {
        link::relink(&mut self.sig, id, kinds, links)
    }

    /// Apply links without touching existing relations
    pub fn apply(&mut self, id: InterId, links: &[Link]) -> Vec<RelationId> {
        links.iter().map(|l| l.apply(&mut self.sig, id)).collect()
    }

    /// Live inters matching the shape predicate, sorted by abscissa
    pub fn sorted_inters<F>(&self, filter: F) -> Vec<InterId>
    where
        F: Fn(Shape) -> bool,
    {
        let mut ids = self.sig.inters(|i| filter(i.shape));
        index::sort_by_abscissa(&self.sig, &mut ids);
        ids
    }

    pub fn stems(&self) -> Vec<InterId> {
        self.sorted_inters(|s| s == Shape::Stem)
    }

    pub fn heads(&self) -> Vec<InterId> {
        self.sorted_inters(Shape::is_head)
    }

    pub fn barlines(&self) -> Vec<InterId> {
        self.sorted_inters(Shape::is_barline)
    }

    /// Head chords (standard and small), sorted by abscissa
    pub fn chords(&self) -> Vec<InterId> {
        self.sorted_inters(|s| s == Shape::HeadChord)
    }

    /// Chords of a staff, sorted by abscissa of their center
    pub fn staff_chords(&self, staff: StaffId) -> Vec<InterId> {
        let mut ids = self
            .sig
            .inters(|i| i.shape == Shape::HeadChord && i.staff == Some(staff));
        index::sort_by_center_abscissa(&self.sig, &mut ids);
        ids
    }

    /// Clef in effect at an abscissa of a staff (last clef at or before it)
    pub fn effective_clef(&self, staff: StaffId, x: f64) -> Option<ClefKind> {
        self.last_in_staff(staff, x, Shape::is_clef)
            .and_then(|id| match &self.sig.inter(id)?.data {
                InterData::Clef(c) => Some(c.kind),
                _ => None,
            })
    }

    /// Key in effect at an abscissa of a staff (last key at or before it)
    pub fn effective_key(&self, staff: StaffId, x: f64) -> Option<InterId> {
        self.last_in_staff(staff, x, Shape::is_key)
    }

    fn last_in_staff<F>(&self, staff: StaffId, x: f64, filter: F) -> Option<InterId>
    where
        F: Fn(Shape) -> bool,
    {
        self.sig
            .inters(|i| filter(i.shape) && i.staff == Some(staff) && i.bounds.x <= x)
            .into_iter()
            .max_by(|a, b| {
                let xa = self.sig.inter(*a).map(|i| i.bounds.x).unwrap_or(0.0);
                let xb = self.sig.inter(*b).map(|i| i.bounds.x).unwrap_or(0.0);
                xa.total_cmp(&xb).then(a.cmp(b))
            })
    }

    pub fn stack_of(&self, id: InterId) -> Option<&MeasureStack> {
        let center = self.sig.inter(id)?.center();
        self.layout.stack_at(&center)
    }

    pub fn stack_id_of(&self, id: InterId) -> Option<StackId> {
        self.stack_of(id).map(|s| s.id)
    }

    pub fn profile_for(&self, id: InterId, profile: usize) -> usize {
        match self.sig.inter(id) {
            Some(inter) if inter.manual => profile.max(1),
            _ => profile,
        }
    }
}

/// Builder of simple systems: parts of evenly spaced staves sharing barlines
#[derive(Debug, Clone)]
pub struct SystemBuilder {
    interline: f64,
    left: f64,
    right: f64,
    parts: Vec<Vec<f64>>,
    barlines: Vec<f64>,
    part_left_bar: bool,
    constants: Option<Constants>,
}

impl SystemBuilder {
    pub fn new(interline: f64) -> Self {
        Self {
            interline,
            left: 0.0,
            right: 1000.0,
            parts: Vec::new(),
            barlines: Vec::new(),
            part_left_bar: false,
            constants: None,
        }
    }

    pub fn width(mut self, left: f64, right: f64) -> Self {
        self.left = left;
        self.right = right;
        self
    }

    /// Add a part whose staves have their top line at the given ordinates
    pub fn part(mut self, staff_tops: &[f64]) -> Self {
        self.parts.push(staff_tops.to_vec());
        self
    }

    /// Barline abscissas; consecutive barlines delimit measure stacks
    pub fn barlines(mut self, xs: &[f64]) -> Self {
        self.barlines = xs.to_vec();
        self
    }

    /// Give every part a boundary barline at the staff left abscissa
    pub fn part_left_bar(mut self) -> Self {
        self.part_left_bar = true;
        self
    }

    pub fn constants(mut self, constants: Constants) -> Self {
        self.constants = Some(constants);
        self
    }

    pub fn build(self) -> System {
        let mut layout = Layout::default();
        let mut staff_index = 0;
        for (p, tops) in self.parts.iter().enumerate() {
            let mut part = Part {
                id: PartId(p),
                staves: Vec::new(),
                left_bar: None,
            };
            for top in tops {
                layout.staves.push(Staff {
                    id: StaffId(staff_index),
                    part: PartId(p),
                    left: self.left,
                    right: self.right,
                    top: *top,
                    interline: self.interline,
                });
                part.staves.push(StaffId(staff_index));
                staff_index += 1;
            }
            layout.parts.push(part);
        }

        let mut xs = self.barlines.clone();
        xs.sort_by(|a, b| a.total_cmp(b));
        for (i, pair) in xs.windows(2).enumerate() {
            layout.stacks.push(MeasureStack {
                id: StackId(i),
                left: pair[0],
                right: pair[1],
            });
        }

        let constants = self.constants.unwrap_or_else(|| config::defaults().clone());
        let mut system = System::with_constants(layout, Scale::new(self.interline), constants);

        let staves = system.layout.staves.clone();
        for staff in &staves {
            for x in &xs {
                let line = Line::new(
                    Point::new(*x, staff.first_line_y()),
                    Point::new(*x, staff.last_line_y()),
                );
                let bar = Inter::barline(Shape::ThinBarline, 0.9, line, 2.0).with_staff(staff.id, staff.part);
                system.add(bar);
            }
        }

        if self.part_left_bar {
            for p in 0..system.layout.parts.len() {
                let Some(first) = system.layout.parts[p].staves.first().copied() else {
                    continue;
                };
                let Some(staff) = system.layout.staff(first).cloned() else {
                    continue;
                };
                let line = Line::new(
                    Point::new(staff.left, staff.first_line_y()),
                    Point::new(staff.left, staff.last_line_y()),
                );
                let bar = Inter::barline(Shape::ThinBarline, 0.9, line, 2.0).with_staff(staff.id, staff.part);
                let id = system.add(bar);
                system.layout.parts[p].left_bar = Some(id);
            }
        }
        system
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Rect;

    #[test]
    fn test_builder_layout() {
        let system = SystemBuilder::new(20.0)
            .part(&[100.0, 250.0])
            .part(&[400.0])
            .barlines(&[500.0, 0.0, 1000.0])
            .build();
        assert_eq!(system.layout.staves.len(), 3);
        assert_eq!(system.layout.parts[1].staves, vec![StaffId(2)]);
        assert_eq!(system.layout.stacks[0].right, 500.0);
        assert_eq!(system.barlines().len(), 9);
    }

    #[test]
    fn test_effective_clef() {
        let mut system = SystemBuilder::new(20.0).part(&[100.0]).build();
        let treble = Inter::clef(Shape::GClef, 0.9, Rect::new(10.0, 90.0, 20.0, 100.0), ClefKind::Treble);
        let bass = Inter::clef(Shape::FClef, 0.9, Rect::new(300.0, 100.0, 20.0, 50.0), ClefKind::Bass);
        system.add_in_staff(treble, StaffId(0));
        system.add_in_staff(bass, StaffId(0));
        assert_eq!(system.effective_clef(StaffId(0), 200.0), Some(ClefKind::Treble));
        assert_eq!(system.effective_clef(StaffId(0), 400.0), Some(ClefKind::Bass));
        assert_eq!(system.effective_clef(StaffId(0), 5.0), None);
    }

    #[test]
    fn test_part_left_bar() {
        let system = SystemBuilder::new(20.0).part(&[100.0]).part_left_bar().build();
        let bar = system.layout.parts[0].left_bar.unwrap();
        assert_eq!(system.inter(bar).unwrap().bounds.center().x, 0.0);
    }
}
