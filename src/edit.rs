//! # Interactive Editing
//!
//! An edit works on a [`Draft`]: a copy of the geometry model of one inter,
//! freely moved around, and written back only on [`Draft::commit`]. Until
//! then the graph is untouched, so cancelling is just dropping the draft.
//! After a commit, [`Draft::undo`] writes the original model back.
//!
//! Committing relinks the inter: its family relations are replaced by a
//! fresh link search on the new geometry.
//!
//! ## Example
//! ```rust
//! use omr_inter::edit::{Draft, LineModel};
//! use omr_inter::geom::Line;
//! use omr_inter::inters::octave_shift;
//! use omr_inter::layout::StaffId;
//! use omr_inter::shape::Shape;
//! use omr_inter::system::SystemBuilder;
//!
//! let mut system = SystemBuilder::new(20.0).part(&[100.0]).build();
//! let line = Line::from_coords(100.0, 50.0, 300.0, 50.0);
//! let inter = octave_shift::create(&system, Shape::OttavaAlta, 0.8, line, StaffId(0)).unwrap();
//! let id = system.add(inter);
//!
//! let mut draft: Draft<LineModel> = Draft::open(&system.sig, id).unwrap();
//! draft.translate(0.0, -10.0);
//! draft.commit(&mut system, 0).unwrap();
//! assert_eq!(octave_shift::line(&system.sig, id).unwrap().p1.y, 40.0);
//! ```

use std::fmt;

use tracing::debug;

use crate::error::InterError;
use crate::geom::{CubicCurve, Line, Point, VerticalSide};
use crate::inters::{self, ending, octave_shift};
use crate::sig::{BeamData, Inter, InterData, InterId, RelationId, Sig, SlurData, WedgeData};
use crate::system::System;

/// Editable geometry of one family of inters
pub trait Model: Clone + PartialEq + fmt::Debug {
    /// Family name, for error messages
    const FAMILY: &'static str;

    /// Model of an inter, None if the inter is not of this family
    fn read(inter: &Inter) -> Option<Self>;

    fn translate(&mut self, dx: f64, dy: f64);

    /// Refuse geometries the inter could not live with
    fn validate(&self, _system: &System) -> Result<(), String> {
        Ok(())
    }

    /// Write the model into the inter, with its bounds
    fn write(&self, system: &mut System, id: InterId) -> Result<(), InterError>;
}

fn degenerate(p1: &Point, p2: &Point) -> Result<(), String> {
    if p1.distance(p2) == 0.0 {
        Err("degenerate line".to_string())
    } else {
        Ok(())
    }
}

/// Beam median end points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeamModel {
    pub p1: Point,
    pub p2: Point,
}

impl Model for BeamModel {
    const FAMILY: &'static str = "beam";

    fn read(inter: &Inter) -> Option<Self> {
        let beam = inter.as_beam()?;
        Some(Self {
            p1: beam.median.p1,
            p2: beam.median.p2,
        })
    }

    fn translate(&mut self, dx: f64, dy: f64) {
        self.p1 = self.p1.translated(dx, dy);
        self.p2 = self.p2.translated(dx, dy);
    }

    fn validate(&self, system: &System) -> Result<(), String> {
        let min_width = system.scale.to_pixels(system.constants.beam.min_beam_width) as f64;
        if self.p2.x - self.p1.x < min_width {
            return Err(format!("beam narrower than {} px", min_width));
        }
        Ok(())
    }

    fn write(&self, system: &mut System, id: InterId) -> Result<(), InterError> {
        let inter = system.sig.get_mut(id)?;
        let height = inter.as_beam().map(|b| b.height).unwrap_or_default();
        let data = BeamData {
            median: Line::new(self.p1, self.p2),
            height,
        };
        inter.bounds = data
            .border(VerticalSide::Top)
            .bounds()
            .union(&data.border(VerticalSide::Bottom).bounds());
        inter.data = InterData::Beam(data);
        Ok(())
    }
}

/// Straight line of an ending or an octave shift
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineModel {
    pub line: Line,
}

impl Model for LineModel {
    const FAMILY: &'static str = "line";

    fn read(inter: &Inter) -> Option<Self> {
        match &inter.data {
            InterData::Ending(data) => Some(Self { line: data.line }),
            InterData::OctaveShift(data) => Some(Self { line: data.line }),
            _ => None,
        }
    }

    fn translate(&mut self, dx: f64, dy: f64) {
        self.line = self.line.translated(dx, dy);
    }

    fn validate(&self, _system: &System) -> Result<(), String> {
        degenerate(&self.line.p1, &self.line.p2)
    }

    fn write(&self, system: &mut System, id: InterId) -> Result<(), InterError> {
        let inter = system.sig.get(id)?;
        match &inter.data {
            InterData::Ending(data) => {
                // Legs follow the line ends
                let dx1 = self.line.p1.x - data.line.p1.x;
                let dy1 = self.line.p1.y - data.line.p1.y;
                let dx2 = self.line.p2.x - data.line.p2.x;
                let dy2 = self.line.p2.y - data.line.p2.y;
                let left = data.left_leg.map(|l| l.translated(dx1, dy1));
                let right = data.right_leg.map(|l| l.translated(dx2, dy2));
                let fresh = ending::create(system, inter.grade, self.line, left, right);
                let target = system.sig.get_mut(id)?;
                target.bounds = fresh.bounds;
                target.data = fresh.data;
                Ok(())
            }
            InterData::OctaveShift(_) => {
                octave_shift::set_line(system, id, self.line);
                Ok(())
            }
            _ => Err(InterError::Edit {
                inter: id,
                message: "not a line inter".to_string(),
            }),
        }
    }
}

/// The two lines of a wedge
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WedgeModel {
    pub l1: Line,
    pub l2: Line,
}

impl Model for WedgeModel {
    const FAMILY: &'static str = "wedge";

    fn read(inter: &Inter) -> Option<Self> {
        match &inter.data {
            InterData::Wedge(data) => Some(Self {
                l1: data.l1,
                l2: data.l2,
            }),
            _ => None,
        }
    }

    fn translate(&mut self, dx: f64, dy: f64) {
        self.l1 = self.l1.translated(dx, dy);
        self.l2 = self.l2.translated(dx, dy);
    }

    fn validate(&self, _system: &System) -> Result<(), String> {
        degenerate(&self.l1.p1, &self.l1.p2)?;
        degenerate(&self.l2.p1, &self.l2.p2)
    }

    fn write(&self, system: &mut System, id: InterId) -> Result<(), InterError> {
        let inter = system.sig.get_mut(id)?;
        inter.bounds = self.l1.bounds().union(&self.l2.bounds());
        inter.data = InterData::Wedge(WedgeData { l1: self.l1, l2: self.l2 });
        Ok(())
    }
}

/// Slur curve
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlurModel {
    pub curve: CubicCurve,
}

impl Model for SlurModel {
    const FAMILY: &'static str = "slur";

    fn read(inter: &Inter) -> Option<Self> {
        inter.as_slur().map(|s| Self { curve: s.curve })
    }

    fn translate(&mut self, dx: f64, dy: f64) {
        self.curve = self.curve.translated(dx, dy);
    }

    fn validate(&self, _system: &System) -> Result<(), String> {
        degenerate(&self.curve.p1, &self.curve.p2)
    }

    fn write(&self, system: &mut System, id: InterId) -> Result<(), InterError> {
        let inter = system.sig.get_mut(id)?;
        let tie = inter.as_slur().map(|s| s.tie).unwrap_or(false);
        inter.bounds = self.curve.bounds();
        inter.data = InterData::Slur(SlurData {
            curve: self.curve,
            above: self.curve.is_above(),
            tie,
        });
        Ok(())
    }
}

/// Transient copy of an inter geometry
#[derive(Debug, Clone)]
pub struct Draft<M: Model> {
    inter: InterId,
    original: M,
    pub model: M,
    committed: bool,
}

impl<M: Model> Draft<M> {
    /// Snapshot the committed model of an inter
    pub fn open(sig: &Sig, id: InterId) -> Result<Self, InterError> {
        let inter = sig.get(id)?;
        let model = M::read(inter).ok_or_else(|| InterError::Edit {
            inter: id,
            message: format!("{:?} has no {} model", inter.shape, M::FAMILY),
        })?;
        Ok(Self {
            inter: id,
            original: model.clone(),
            model,
            committed: false,
        })
    }

    pub fn inter(&self) -> InterId {
        self.inter
    }

    pub fn original(&self) -> &M {
        &self.original
    }

    pub fn is_modified(&self) -> bool {
        self.model != self.original
    }

    pub fn translate(&mut self, dx: f64, dy: f64) {
        self.model.translate(dx, dy);
    }

    /// Forget uncommitted changes
    pub fn reset(&mut self) {
        self.model = self.original.clone();
    }

    /// Write the draft into the inter and relink it
    pub fn commit(&mut self, system: &mut System, profile: usize) -> Result<Vec<RelationId>, InterError> {
        self.model.validate(system).map_err(|message| InterError::Edit {
            inter: self.inter,
            message,
        })?;
        self.model.write(system, self.inter)?;
        self.committed = true;
        debug!("{} draft committed on {}", M::FAMILY, self.inter);
        Ok(inters::link(system, self.inter, profile))
    }

    /// Restore the model the draft was opened with, and relink
    pub fn undo(&mut self, system: &mut System, profile: usize) -> Result<Vec<RelationId>, InterError> {
        self.reset();
        if !self.committed {
            return Ok(Vec::new());
        }
        self.original.write(system, self.inter)?;
        self.committed = false;
        debug!("{} draft undone on {}", M::FAMILY, self.inter);
        Ok(inters::link(system, self.inter, profile))
    }
}
