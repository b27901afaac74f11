//! # Layout Module
//!
//! Minimal geometry of the staves, parts and measure stacks of one system.
//!
//! ## Purpose
//! Linkers need a few answers about the page structure: which staff lies at
//! or above a point, the pitch position of a point within a staff, which
//! measure stack contains an abscissa. This module keeps just enough data to
//! answer them; staff detection itself happens elsewhere.
//!
//! ## Pitch positions
//! Pitch position 0 is the staff middle line; each line or space step adds
//! 1 going down. The top line is -4 and the bottom line +4.

use serde::{Deserialize, Serialize};

use crate::geom::{Point, Rect};
use crate::sig::InterId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StaffId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PartId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StackId(pub usize);

/// Five-line staff, lines assumed horizontal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Staff {
    pub id: StaffId,
    pub part: PartId,
    pub left: f64,
    pub right: f64,
    /// Ordinate of the top line
    pub top: f64,
    pub interline: f64,
}

impl Staff {
    pub fn first_line_y(&self) -> f64 {
        self.top
    }

    pub fn last_line_y(&self) -> f64 {
        self.top + 4.0 * self.interline
    }

    pub fn mid_y(&self) -> f64 {
        self.top + 2.0 * self.interline
    }

    pub fn pitch_position_of(&self, pt: &Point) -> f64 {
        (pt.y - self.mid_y()) / (self.interline / 2.0)
    }

    pub fn y_at_pitch(&self, pitch: f64) -> f64 {
        self.mid_y() + pitch * self.interline / 2.0
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(self.left, self.top, self.right - self.left, 4.0 * self.interline)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    pub id: PartId,
    /// Staves from top to bottom
    pub staves: Vec<StaffId>,
    /// Barline at the left boundary of the part, if any
    pub left_bar: Option<InterId>,
}

/// Vertical slice of the system between two barline abscissas
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeasureStack {
    pub id: StackId,
    pub left: f64,
    pub right: f64,
}

impl MeasureStack {
    pub fn contains_x(&self, x: f64) -> bool {
        x >= self.left && x <= self.right
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    pub staves: Vec<Staff>,
    pub parts: Vec<Part>,
    /// Stacks from left to right
    pub stacks: Vec<MeasureStack>,
}

impl Layout {
    pub fn staff(&self, id: StaffId) -> Option<&Staff> {
        self.staves.iter().find(|s| s.id == id)
    }

    pub fn part(&self, id: PartId) -> Option<&Part> {
        self.parts.iter().find(|p| p.id == id)
    }

    pub fn part_of(&self, staff: StaffId) -> Option<&Part> {
        let part = self.staff(staff)?.part;
        self.part(part)
    }

    /// Index of the staff within its part
    pub fn index_in_part(&self, staff: StaffId) -> Option<usize> {
        self.part_of(staff)?.staves.iter().position(|s| *s == staff)
    }

    /// Closest staff whose top line is at or above the point
    pub fn staff_at_or_above(&self, pt: &Point) -> Option<StaffId> {
        self.staves
            .iter()
            .filter(|s| s.first_line_y() <= pt.y)
            .max_by(|a, b| a.first_line_y().total_cmp(&b.first_line_y()))
            .map(|s| s.id)
    }

    /// Closest staff whose bottom line is at or below the point
    pub fn staff_at_or_below(&self, pt: &Point) -> Option<StaffId> {
        self.staves
            .iter()
            .filter(|s| s.last_line_y() >= pt.y)
            .min_by(|a, b| a.last_line_y().total_cmp(&b.last_line_y()))
            .map(|s| s.id)
    }

    /// Staff containing the point ordinate, or nearest by distance to its lines
    pub fn closest_staff(&self, pt: &Point) -> Option<StaffId> {
        self.staves
            .iter()
            .min_by(|a, b| staff_distance(a, pt).total_cmp(&staff_distance(b, pt)))
            .map(|s| s.id)
    }

    pub fn stack_at(&self, pt: &Point) -> Option<&MeasureStack> {
        self.stacks.iter().find(|s| s.contains_x(pt.x))
    }

    pub fn stack(&self, id: StackId) -> Option<&MeasureStack> {
        self.stacks.iter().find(|s| s.id == id)
    }

    pub fn first_stack(&self) -> Option<&MeasureStack> {
        self.stacks.first()
    }

    pub fn last_stack(&self) -> Option<&MeasureStack> {
        self.stacks.last()
    }

    /// Position of a stack from the left, used to compare stack distances
    pub fn stack_index(&self, id: StackId) -> Option<usize> {
        self.stacks.iter().position(|s| s.id == id)
    }
}

fn staff_distance(staff: &Staff, pt: &Point) -> f64 {
    if pt.y < staff.first_line_y() {
        staff.first_line_y() - pt.y
    } else if pt.y > staff.last_line_y() {
        pt.y - staff.last_line_y()
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> Layout {
        let staff = |id: usize, top: f64| Staff {
            id: StaffId(id),
            part: PartId(0),
            left: 0.0,
            right: 1000.0,
            top,
            interline: 20.0,
        };
        Layout {
            staves: vec![staff(0, 100.0), staff(1, 300.0)],
            parts: vec![Part {
                id: PartId(0),
                staves: vec![StaffId(0), StaffId(1)],
                left_bar: None,
            }],
            stacks: vec![
                MeasureStack { id: StackId(0), left: 0.0, right: 400.0 },
                MeasureStack { id: StackId(1), left: 400.0, right: 1000.0 },
            ],
        }
    }

    #[test]
    fn test_pitch_positions() {
        let l = layout();
        let staff = l.staff(StaffId(0)).unwrap();
        assert_eq!(staff.pitch_position_of(&Point::new(0.0, 100.0)), -4.0);
        assert_eq!(staff.pitch_position_of(&Point::new(0.0, 140.0)), 0.0);
        assert_eq!(staff.y_at_pitch(4.0), 180.0);
    }

    #[test]
    fn test_staff_above_and_below() {
        let l = layout();
        let pt = Point::new(10.0, 250.0);
        assert_eq!(l.staff_at_or_above(&pt), Some(StaffId(0)));
        assert_eq!(l.staff_at_or_below(&pt), Some(StaffId(1)));
        assert_eq!(l.closest_staff(&pt), Some(StaffId(1)));
        assert_eq!(l.staff_at_or_above(&Point::new(0.0, 50.0)), None);
    }

    #[test]
    fn test_stacks() {
        let l = layout();
        assert_eq!(l.stack_at(&Point::new(500.0, 0.0)).unwrap().id, StackId(1));
        assert!(l.stack_at(&Point::new(1500.0, 0.0)).is_none());
        assert_eq!(l.index_in_part(StaffId(1)), Some(1));
    }
}
