//! # Geometry Module
//!
//! Plane geometry shared by every lookup-area builder and scorer.
//!
//! ## Conventions
//! - Coordinates are image pixels as `f64`, abscissa grows to the right and
//!   ordinate grows downward (image orientation).
//! - Rectangles are closed: touching rectangles intersect, and degenerate
//!   rectangles (zero width or height) are still well-formed.
//! - Lines are infinite when used for intersections and segments when used
//!   for containment tests.
//!
//! ## Related Modules
//! - `index` - intersects candidate bounds with an `Area`
//! - `inters` - builds lookup areas from symbol geometry

use serde::{Deserialize, Serialize};

/// Horizontal side of a symbol or relation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HorizontalSide {
    Left,
    Right,
}

impl HorizontalSide {
    pub const ALL: [HorizontalSide; 2] = [HorizontalSide::Left, HorizontalSide::Right];

    pub fn opposite(self) -> HorizontalSide {
        match self {
            HorizontalSide::Left => HorizontalSide::Right,
            HorizontalSide::Right => HorizontalSide::Left,
        }
    }

    /// -1 for left, +1 for right
    pub fn direction(self) -> f64 {
        match self {
            HorizontalSide::Left => -1.0,
            HorizontalSide::Right => 1.0,
        }
    }
}

/// Vertical side of a symbol or relation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VerticalSide {
    Top,
    Bottom,
}

impl VerticalSide {
    pub const ALL: [VerticalSide; 2] = [VerticalSide::Top, VerticalSide::Bottom];

    pub fn opposite(self) -> VerticalSide {
        match self {
            VerticalSide::Top => VerticalSide::Bottom,
            VerticalSide::Bottom => VerticalSide::Top,
        }
    }

    /// -1 for top (upward), +1 for bottom (downward)
    pub fn direction(self) -> f64 {
        match self {
            VerticalSide::Top => -1.0,
            VerticalSide::Bottom => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn translated(&self, dx: f64, dy: f64) -> Point {
        Point::new(self.x + dx, self.y + dy)
    }

    pub fn rounded(&self) -> Point {
        Point::new(self.x.round(), self.y.round())
    }
}

/// Straight line defined by two points, P1 being the left one for symbols
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub p1: Point,
    pub p2: Point,
}

impl Line {
    pub fn new(p1: Point, p2: Point) -> Self {
        Self { p1, p2 }
    }

    pub fn from_coords(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self::new(Point::new(x1, y1), Point::new(x2, y2))
    }

    pub fn length(&self) -> f64 {
        self.p1.distance(&self.p2)
    }

    pub fn middle(&self) -> Point {
        Point::new((self.p1.x + self.p2.x) / 2.0, (self.p1.y + self.p2.y) / 2.0)
    }

    /// Slope dy/dx, 0 for a vertical or degenerate line
    pub fn slope(&self) -> f64 {
        let dx = self.p2.x - self.p1.x;
        if dx.abs() < f64::EPSILON {
            0.0
        } else {
            (self.p2.y - self.p1.y) / dx
        }
    }

    /// Abscissa of the (infinite) line at the given ordinate
    ///
    /// A horizontal line has no single abscissa, P1 abscissa is returned.
    pub fn x_at_y(&self, y: f64) -> f64 {
        let dy = self.p2.y - self.p1.y;
        if dy.abs() < f64::EPSILON {
            self.p1.x
        } else {
            self.p1.x + (y - self.p1.y) * (self.p2.x - self.p1.x) / dy
        }
    }

    /// Ordinate of the (infinite) line at the given abscissa
    pub fn y_at_x(&self, x: f64) -> f64 {
        let dx = self.p2.x - self.p1.x;
        if dx.abs() < f64::EPSILON {
            self.p1.y
        } else {
            self.p1.y + (x - self.p1.x) * (self.p2.y - self.p1.y) / dx
        }
    }

    /// Turn needed from P1->P2 to point at `pt`.
    ///
    /// With image orientation, a point above a left-to-right line gives +1,
    /// a point below gives -1, a colinear point gives 0.
    pub fn relative_ccw(&self, pt: &Point) -> i32 {
        let (x2, y2) = (self.p2.x - self.p1.x, self.p2.y - self.p1.y);
        let (px, py) = (pt.x - self.p1.x, pt.y - self.p1.y);
        let ccw = px * y2 - py * x2;
        if ccw > 0.0 {
            1
        } else if ccw < 0.0 {
            -1
        } else {
            0
        }
    }

    /// Intersection point of the two infinite lines, None when parallel
    pub fn intersection(&self, other: &Line) -> Option<Point> {
        let (x1, y1, x2, y2) = (self.p1.x, self.p1.y, self.p2.x, self.p2.y);
        let (x3, y3, x4, y4) = (other.p1.x, other.p1.y, other.p2.x, other.p2.y);
        let den = (x1 - x2) * (y3 - y4) - (y1 - y2) * (x3 - x4);
        if den.abs() < f64::EPSILON {
            return None;
        }
        let a = x1 * y2 - y1 * x2;
        let b = x3 * y4 - y3 * x4;
        Some(Point::new(
            (a * (x3 - x4) - (x1 - x2) * b) / den,
            (a * (y3 - y4) - (y1 - y2) * b) / den,
        ))
    }

    /// Whether the two segments cross or touch
    pub fn segments_intersect(&self, other: &Line) -> bool {
        fn orient(a: &Point, b: &Point, c: &Point) -> f64 {
            (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
        }
        fn on_segment(a: &Point, b: &Point, c: &Point) -> bool {
            c.x >= a.x.min(b.x) && c.x <= a.x.max(b.x) && c.y >= a.y.min(b.y) && c.y <= a.y.max(b.y)
        }
        let d1 = orient(&other.p1, &other.p2, &self.p1);
        let d2 = orient(&other.p1, &other.p2, &self.p2);
        let d3 = orient(&self.p1, &self.p2, &other.p1);
        let d4 = orient(&self.p1, &self.p2, &other.p2);

        if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
            && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
        {
            return true;
        }
        (d1 == 0.0 && on_segment(&other.p1, &other.p2, &self.p1))
            || (d2 == 0.0 && on_segment(&other.p1, &other.p2, &self.p2))
            || (d3 == 0.0 && on_segment(&self.p1, &self.p2, &other.p1))
            || (d4 == 0.0 && on_segment(&self.p1, &self.p2, &other.p2))
    }

    pub fn translated(&self, dx: f64, dy: f64) -> Line {
        Line::new(self.p1.translated(dx, dy), self.p2.translated(dx, dy))
    }

    pub fn bounds(&self) -> Rect {
        Rect::bounding(&[self.p1, self.p2])
    }

    /// End point on the given side (P1 for left)
    pub fn end(&self, side: HorizontalSide) -> Point {
        match side {
            HorizontalSide::Left => self.p1,
            HorizontalSide::Right => self.p2,
        }
    }
}

/// Axis-aligned rectangle
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width: width.max(0.0),
            height: height.max(0.0),
        }
    }

    /// Smallest rectangle containing all points (a point rectangle at origin if empty)
    pub fn bounding(points: &[Point]) -> Rect {
        let Some(first) = points.first() else {
            return Rect::default();
        };
        let (mut x1, mut y1, mut x2, mut y2) = (first.x, first.y, first.x, first.y);
        for p in &points[1..] {
            x1 = x1.min(p.x);
            y1 = y1.min(p.y);
            x2 = x2.max(p.x);
            y2 = y2.max(p.y);
        }
        Rect::new(x1, y1, x2 - x1, y2 - y1)
    }

    pub fn around(center: Point, half_width: f64, half_height: f64) -> Rect {
        Rect::new(
            center.x - half_width,
            center.y - half_height,
            2.0 * half_width,
            2.0 * half_height,
        )
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// Grow by dx on left and right, by dy on top and bottom.
    ///
    /// Negative values shrink, never below an empty rectangle at the center.
    pub fn grown(&self, dx: f64, dy: f64) -> Rect {
        let c = self.center();
        let w = (self.width + 2.0 * dx).max(0.0);
        let h = (self.height + 2.0 * dy).max(0.0);
        Rect::new(c.x - w / 2.0, c.y - h / 2.0, w, h)
    }

    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Rect::new(
            x,
            y,
            self.right().max(other.right()) - x,
            self.bottom().max(other.bottom()) - y,
        )
    }

    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let r = self.right().min(other.right());
        let b = self.bottom().min(other.bottom());
        if r < x || b < y {
            None
        } else {
            Some(Rect::new(x, y, r - x, b - y))
        }
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.x <= other.right()
            && other.x <= self.right()
            && self.y <= other.bottom()
            && other.y <= self.bottom()
    }

    pub fn contains_point(&self, p: &Point) -> bool {
        p.x >= self.x && p.x <= self.right() && p.y >= self.y && p.y <= self.bottom()
    }

    pub fn contains(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.right() <= self.right()
            && other.y >= self.y
            && other.bottom() <= self.bottom()
    }

    /// Intersection over union, 0 when disjoint or both empty
    pub fn iou(&self, other: &Rect) -> f64 {
        let inter = match self.intersection(other) {
            Some(r) => r.area(),
            None => return 0.0,
        };
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }

    /// Squared distance from a point to the rectangle, 0 inside
    pub fn distance_sq(&self, p: &Point) -> f64 {
        let dx = (self.x - p.x).max(0.0).max(p.x - self.right());
        let dy = (self.y - p.y).max(0.0).max(p.y - self.bottom());
        dx * dx + dy * dy
    }

    pub fn corners(&self) -> [Point; 4] {
        [
            Point::new(self.x, self.y),
            Point::new(self.right(), self.y),
            Point::new(self.right(), self.bottom()),
            Point::new(self.x, self.bottom()),
        ]
    }

    fn edges(&self) -> [Line; 4] {
        let c = self.corners();
        [
            Line::new(c[0], c[1]),
            Line::new(c[1], c[2]),
            Line::new(c[2], c[3]),
            Line::new(c[3], c[0]),
        ]
    }
}

/// Closed polygon, vertices listed in order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    pub points: Vec<Point>,
}

impl Polygon {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn bounds(&self) -> Rect {
        Rect::bounding(&self.points)
    }

    fn edges(&self) -> impl Iterator<Item = Line> + '_ {
        let n = self.points.len();
        (0..n).map(move |i| Line::new(self.points[i], self.points[(i + 1) % n]))
    }

    /// Even-odd containment, boundary points count as inside
    pub fn contains(&self, p: &Point) -> bool {
        if self.points.len() < 3 {
            return self.points.iter().any(|q| q == p)
                || self.edges().any(|e| e.segments_intersect(&Line::new(*p, *p)));
        }
        if self.edges().any(|e| e.segments_intersect(&Line::new(*p, *p))) {
            return true;
        }
        let mut inside = false;
        let n = self.points.len();
        let mut j = n - 1;
        for i in 0..n {
            let (pi, pj) = (self.points[i], self.points[j]);
            if (pi.y > p.y) != (pj.y > p.y) && p.x < (pj.x - pi.x) * (p.y - pi.y) / (pj.y - pi.y) + pi.x {
                inside = !inside;
            }
            j = i;
        }
        inside
    }

    pub fn intersects_rect(&self, rect: &Rect) -> bool {
        if !self.bounds().intersects(rect) {
            return false;
        }
        if self.points.iter().any(|p| rect.contains_point(p)) {
            return true;
        }
        if rect.corners().iter().any(|c| self.contains(c)) {
            return true;
        }
        let rect_edges = rect.edges();
        self.edges()
            .any(|e| rect_edges.iter().any(|r| r.segments_intersect(&e)))
    }
}

/// Lookup region: either a plain box or an arbitrary polygon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Area {
    Rect(Rect),
    Polygon(Polygon),
}

impl Area {
    pub fn bounds(&self) -> Rect {
        match self {
            Area::Rect(r) => *r,
            Area::Polygon(p) => p.bounds(),
        }
    }

    pub fn intersects(&self, rect: &Rect) -> bool {
        match self {
            Area::Rect(r) => r.intersects(rect),
            Area::Polygon(p) => p.intersects_rect(rect),
        }
    }

    pub fn contains(&self, p: &Point) -> bool {
        match self {
            Area::Rect(r) => r.contains_point(p),
            Area::Polygon(poly) => poly.contains(p),
        }
    }
}

impl From<Rect> for Area {
    fn from(r: Rect) -> Self {
        Area::Rect(r)
    }
}

impl From<Polygon> for Area {
    fn from(p: Polygon) -> Self {
        Area::Polygon(p)
    }
}

/// Cubic Bezier curve, used for slurs
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CubicCurve {
    pub p1: Point,
    pub c1: Point,
    pub c2: Point,
    pub p2: Point,
}

impl CubicCurve {
    pub fn new(p1: Point, c1: Point, c2: Point, p2: Point) -> Self {
        Self { p1, c1, c2, p2 }
    }

    pub fn point_at(&self, t: f64) -> Point {
        let u = 1.0 - t;
        let (a, b, c, d) = (u * u * u, 3.0 * u * u * t, 3.0 * u * t * t, t * t * t);
        Point::new(
            a * self.p1.x + b * self.c1.x + c * self.c2.x + d * self.p2.x,
            a * self.p1.y + b * self.c1.y + c * self.c2.y + d * self.p2.y,
        )
    }

    pub fn end(&self, side: HorizontalSide) -> Point {
        match side {
            HorizontalSide::Left => self.p1,
            HorizontalSide::Right => self.p2,
        }
    }

    /// Control point next to the given end
    pub fn control(&self, side: HorizontalSide) -> Point {
        match side {
            HorizontalSide::Left => self.c1,
            HorizontalSide::Right => self.c2,
        }
    }

    pub fn middle(&self) -> Point {
        self.point_at(0.5)
    }

    /// Chord joining both ends
    pub fn chord(&self) -> Line {
        Line::new(self.p1, self.p2)
    }

    /// Curve above its chord (an arc opening downward)
    pub fn is_above(&self) -> bool {
        self.chord().relative_ccw(&self.middle()) > 0
    }

    pub fn bounds(&self) -> Rect {
        let samples: Vec<Point> = (0..=16).map(|i| self.point_at(i as f64 / 16.0)).collect();
        Rect::bounding(&samples)
    }

    pub fn translated(&self, dx: f64, dy: f64) -> CubicCurve {
        CubicCurve::new(
            self.p1.translated(dx, dy),
            self.c1.translated(dx, dy),
            self.c2.translated(dx, dy),
            self.p2.translated(dx, dy),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_abscissa_and_ordinate() {
        let line = Line::from_coords(0.0, 0.0, 10.0, 20.0);
        assert_eq!(line.x_at_y(10.0), 5.0);
        assert_eq!(line.y_at_x(5.0), 10.0);
        assert_eq!(line.slope(), 2.0);
    }

    #[test]
    fn test_relative_ccw_image_orientation() {
        let line = Line::from_coords(0.0, 0.0, 10.0, 0.0);
        assert_eq!(line.relative_ccw(&Point::new(5.0, -5.0)), 1);
        assert_eq!(line.relative_ccw(&Point::new(5.0, 5.0)), -1);
        assert_eq!(line.relative_ccw(&Point::new(5.0, 0.0)), 0);
    }

    #[test]
    fn test_line_intersection() {
        let a = Line::from_coords(0.0, 0.0, 10.0, 10.0);
        let b = Line::from_coords(0.0, 10.0, 10.0, 0.0);
        let p = a.intersection(&b).unwrap();
        assert!((p.x - 5.0).abs() < 1e-9);
        assert!((p.y - 5.0).abs() < 1e-9);
        assert!(a.intersection(&a.translated(0.0, 3.0)).is_none());
    }

    #[test]
    fn test_rect_grow_never_negative() {
        let r = Rect::new(10.0, 10.0, 4.0, 2.0).grown(-5.0, -5.0);
        assert_eq!(r.width, 0.0);
        assert_eq!(r.height, 0.0);
        assert_eq!(r.center(), Point::new(12.0, 11.0));
    }

    #[test]
    fn test_rect_iou() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(5.0, 0.0, 10.0, 10.0);
        assert!((a.iou(&b) - 50.0 / 150.0).abs() < 1e-9);
        assert_eq!(a.iou(&Rect::new(20.0, 20.0, 1.0, 1.0)), 0.0);
    }

    #[test]
    fn test_degenerate_rect_still_intersects() {
        let bar = Rect::new(50.0, 0.0, 0.0, 40.0);
        assert!(bar.intersects(&Rect::new(45.0, 10.0, 10.0, 10.0)));
    }

    #[test]
    fn test_polygon_contains_and_intersects() {
        let poly = Polygon::new(vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
        ]);
        assert!(poly.contains(&Point::new(5.0, 5.0)));
        assert!(poly.contains(&Point::new(0.0, 5.0)));
        assert!(!poly.contains(&Point::new(15.0, 5.0)));
        assert!(poly.intersects_rect(&Rect::new(8.0, 8.0, 5.0, 5.0)));
        assert!(!poly.intersects_rect(&Rect::new(20.0, 20.0, 5.0, 5.0)));
    }

    #[test]
    fn test_curve_above() {
        let above = CubicCurve::new(
            Point::new(0.0, 10.0),
            Point::new(3.0, 0.0),
            Point::new(7.0, 0.0),
            Point::new(10.0, 10.0),
        );
        assert!(above.is_above());
        let below = above.translated(0.0, 0.0);
        let below = CubicCurve::new(below.p1, Point::new(3.0, 20.0), Point::new(7.0, 20.0), below.p2);
        assert!(!below.is_above());
    }
}
