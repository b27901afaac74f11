//! # Symbolic Interpretation Graph
//!
//! Arena of inters addressed by stable ids, with typed directed edges.
//!
//! ## Purpose
//! Vertices are [`Inter`] records, edges carry a [`Relation`]. Containment
//! edges mark ensemble membership; ensembles additionally keep an ordered
//! member list, and members a back-index to their ensembles, both updated
//! together by [`Sig::add_member`] and [`Sig::remove_member`].
//!
//! Removed inters keep their arena slot with `removed` set, so ids stay
//! valid for the lifetime of the graph.
//!
//! ## Example
//! ```rust
//! use omr_inter::geom::Point;
//! use omr_inter::sig::{BeamPortion, Inter, Relation, RelationKind, Sig};
//!
//! let mut sig = Sig::new();
//! let stem = sig.add_vertex(Inter::stem(0.9, Point::new(10.0, 0.0), Point::new(10.0, 60.0), 2.0));
//! let other = sig.add_vertex(Inter::stem(0.9, Point::new(30.0, 0.0), Point::new(30.0, 60.0), 2.0));
//! let rel = sig.add_edge(stem, other, Relation::BeamRest(BeamPortion::Left));
//! assert_eq!(sig.opposite(stem, rel), Some(other));
//! assert!(sig.has_relation(other, RelationKind::BeamRest));
//! ```
//!
//! ## Related Modules
//! - `index` - spatial queries over inter bounds
//! - `link` - proposals applied to the graph

mod inter;
mod relation;

pub use inter::*;
pub use relation::*;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Constants;
use crate::error::InterError;
use crate::geom::Rect;
use crate::grade;
use crate::shape::Shape;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InterId(pub u32);

impl fmt::Display for InterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelationId(pub u32);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub source: InterId,
    pub target: InterId,
    pub relation: Relation,
}

#[derive(Debug, Clone, Default)]
pub struct Sig {
    inters: Vec<Inter>,
    edges: Vec<Option<Edge>>,
    /// Incident edges per inter, in insertion order
    incident: Vec<Vec<RelationId>>,
    members: BTreeMap<InterId, Vec<InterId>>,
    ensembles: BTreeMap<InterId, Vec<InterId>>,
}

impl Sig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_vertex(&mut self, inter: Inter) -> InterId {
        let id = InterId(self.inters.len() as u32);
        self.inters.push(inter);
        self.incident.push(Vec::new());
        id
    }

    /// Inter record, including removed ones
    pub fn inter(&self, id: InterId) -> Option<&Inter> {
        self.inters.get(id.0 as usize)
    }

    pub fn inter_mut(&mut self, id: InterId) -> Option<&mut Inter> {
        self.inters.get_mut(id.0 as usize)
    }

    /// Live inter record
    ///
    /// # Errors
    /// `InterError::UnknownInter` when the id is dangling or removed.
    pub fn get(&self, id: InterId) -> Result<&Inter, InterError> {
        match self.inter(id) {
            Some(inter) if !inter.removed => Ok(inter),
            _ => Err(InterError::UnknownInter(id)),
        }
    }

    pub fn get_mut(&mut self, id: InterId) -> Result<&mut Inter, InterError> {
        match self.inter_mut(id) {
            Some(inter) if !inter.removed => Ok(inter),
            _ => Err(InterError::UnknownInter(id)),
        }
    }

    pub fn is_live(&self, id: InterId) -> bool {
        self.inter(id).map(|i| !i.removed).unwrap_or(false)
    }

    /// Live inters matching a predicate, in id order
    pub fn inters<F>(&self, mut filter: F) -> Vec<InterId>
    where
        F: FnMut(&Inter) -> bool,
    {
        self.inters
            .iter()
            .enumerate()
            .filter(|(_, inter)| !inter.removed && filter(inter))
            .map(|(i, _)| InterId(i as u32))
            .collect()
    }

    /// Live inters of the given shapes, in id order
    pub fn inters_of(&self, shapes: &[Shape]) -> Vec<InterId> {
        self.inters(|inter| shapes.contains(&inter.shape))
    }

    pub fn add_edge(&mut self, source: InterId, target: InterId, relation: Relation) -> RelationId {
        let id = RelationId(self.edges.len() as u32);
        debug!("edge {:?} {} -> {}", relation.kind(), source, target);
        self.edges.push(Some(Edge {
            source,
            target,
            relation,
        }));
        for end in [source, target] {
            if let Some(list) = self.incident.get_mut(end.0 as usize) {
                list.push(id);
            }
        }
        id
    }

    pub fn edge(&self, rel: RelationId) -> Option<&Edge> {
        self.edges.get(rel.0 as usize).and_then(|e| e.as_ref())
    }

    pub fn edge_mut(&mut self, rel: RelationId) -> Option<&mut Edge> {
        self.edges.get_mut(rel.0 as usize).and_then(|e| e.as_mut())
    }

    pub fn remove_edge(&mut self, rel: RelationId) -> Option<Edge> {
        let edge = self.edges.get_mut(rel.0 as usize)?.take()?;
        for end in [edge.source, edge.target] {
            if let Some(list) = self.incident.get_mut(end.0 as usize) {
                list.retain(|r| *r != rel);
            }
        }
        if edge.relation.kind() == RelationKind::Containment {
            self.forget_membership(edge.source, edge.target);
        }
        Some(edge)
    }

    /// Relations of the given kinds incident to an inter, in creation order
    ///
    /// An empty kind list selects every relation.
    pub fn relations(&self, id: InterId, kinds: &[RelationKind]) -> Vec<RelationId> {
        let Some(list) = self.incident.get(id.0 as usize) else {
            return Vec::new();
        };
        list.iter()
            .copied()
            .filter(|rel| match self.edge(*rel) {
                Some(edge) => kinds.is_empty() || kinds.contains(&edge.relation.kind()),
                None => false,
            })
            .collect()
    }

    pub fn has_relation(&self, id: InterId, kind: RelationKind) -> bool {
        !self.relations(id, &[kind]).is_empty()
    }

    /// Other end of a relation
    pub fn opposite(&self, id: InterId, rel: RelationId) -> Option<InterId> {
        let edge = self.edge(rel)?;
        if edge.source == id {
            Some(edge.target)
        } else if edge.target == id {
            Some(edge.source)
        } else {
            None
        }
    }

    /// Partners linked through relations of one kind, in relation order
    pub fn partners(&self, id: InterId, kind: RelationKind) -> Vec<InterId> {
        self.relations(id, &[kind])
            .into_iter()
            .filter_map(|rel| self.opposite(id, rel))
            .collect()
    }

    /// Relation of a kind between two inters, in either direction
    pub fn relation_between(&self, a: InterId, b: InterId, kind: RelationKind) -> Option<RelationId> {
        self.relations(a, &[kind])
            .into_iter()
            .find(|rel| self.opposite(a, *rel) == Some(b))
    }

    /// Soft-delete an inter with its edges, memberships and extension links
    ///
    /// An ensemble left without members is removed as well.
    pub fn remove_vertex(&mut self, id: InterId) {
        if !self.is_live(id) {
            return;
        }
        let mut neighbors = (None, None);
        if let Some(inter) = self.inter_mut(id) {
            inter.removed = true;
            neighbors = (inter.extension.left.take(), inter.extension.right.take());
        }
        // Neighbors of a removed piece become chain ends
        if let Some(left) = neighbors.0.and_then(|l| self.inter_mut(l)) {
            if left.extension.right == Some(id) {
                left.extension.right = None;
            }
        }
        if let Some(right) = neighbors.1.and_then(|r| self.inter_mut(r)) {
            if right.extension.left == Some(id) {
                right.extension.left = None;
            }
        }
        for rel in self.relations(id, &[]) {
            self.remove_edge(rel);
        }
        if let Some(members) = self.members.remove(&id) {
            for member in members {
                if let Some(list) = self.ensembles.get_mut(&member) {
                    list.retain(|e| *e != id);
                }
            }
        }
        debug!("removed {}", id);
    }

    /// Add a member to an ensemble, with its containment edge
    pub fn add_member(&mut self, ensemble: InterId, member: InterId) {
        if self.members(ensemble).contains(&member) {
            return;
        }
        self.add_edge(ensemble, member, Relation::Containment);
        self.members.entry(ensemble).or_default().push(member);
        self.ensembles.entry(member).or_default().push(ensemble);
        self.update_ensemble_bounds(ensemble);
    }

    /// Remove a member from an ensemble, an emptied ensemble is removed
    pub fn remove_member(&mut self, ensemble: InterId, member: InterId) {
        if let Some(rel) = self.relation_between(ensemble, member, RelationKind::Containment) {
            self.remove_edge(rel);
        }
    }

    fn forget_membership(&mut self, ensemble: InterId, member: InterId) {
        if let Some(list) = self.ensembles.get_mut(&member) {
            list.retain(|e| *e != ensemble);
        }
        let emptied = match self.members.get_mut(&ensemble) {
            Some(list) => {
                list.retain(|m| *m != member);
                list.is_empty()
            }
            None => false,
        };
        if emptied {
            self.members.remove(&ensemble);
            self.remove_vertex(ensemble);
        } else {
            self.update_ensemble_bounds(ensemble);
        }
    }

    pub fn members(&self, ensemble: InterId) -> &[InterId] {
        self.members.get(&ensemble).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn ensembles_of(&self, member: InterId) -> &[InterId] {
        self.ensembles.get(&member).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// First ensemble of the given shapes containing the member
    pub fn ensemble_of(&self, member: InterId, shapes: &[Shape]) -> Option<InterId> {
        self.ensembles_of(member)
            .iter()
            .copied()
            .find(|e| self.inter(*e).map(|i| shapes.contains(&i.shape)).unwrap_or(false))
    }

    /// Recompute ensemble bounds as the union of its members (and chord stem)
    pub fn update_ensemble_bounds(&mut self, ensemble: InterId) {
        let mut boxes: Vec<Rect> = self
            .members(ensemble)
            .iter()
            .filter_map(|m| self.inter(*m).map(|i| i.bounds))
            .collect();
        if let Some(stem) = self.inter(ensemble).and_then(|i| i.as_chord()).and_then(|c| c.stem) {
            if let Some(s) = self.inter(stem) {
                boxes.push(s.bounds);
            }
        }
        let Some(first) = boxes.first().copied() else {
            return;
        };
        let union = boxes.iter().skip(1).fold(first, |acc, r| acc.union(r));
        if let Some(inter) = self.inter_mut(ensemble) {
            inter.bounds = union;
        }
    }

    /// Grade of an inter reinforced by its supporting relations
    pub fn contextual_grade(&self, id: InterId, constants: &Constants) -> f64 {
        let Some(inter) = self.inter(id) else {
            return 0.0;
        };
        let supports: Vec<(f64, f64)> = self
            .relations(id, &[])
            .into_iter()
            .filter_map(|rel| {
                let edge = self.edge(rel)?;
                let (source_coeff, target_coeff) = edge.relation.support_coeffs(constants)?;
                let coeff = if edge.source == id { source_coeff } else { target_coeff };
                Some((coeff, edge.relation.grade()))
            })
            .collect();
        grade::contextual(inter.grade, &supports)
    }

    pub fn len(&self) -> usize {
        self.inters.iter().filter(|i| !i.removed).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Point;

    fn stem(sig: &mut Sig, x: f64) -> InterId {
        sig.add_vertex(Inter::stem(0.8, Point::new(x, 0.0), Point::new(x, 50.0), 2.0))
    }

    #[test]
    fn test_add_and_query_edges() {
        let mut sig = Sig::new();
        let a = stem(&mut sig, 0.0);
        let b = stem(&mut sig, 10.0);
        let rel = sig.add_edge(a, b, Relation::KeyAlters);
        assert_eq!(sig.relations(a, &[RelationKind::KeyAlters]), vec![rel]);
        assert!(sig.relations(a, &[RelationKind::HeadStem]).is_empty());
        assert_eq!(sig.relation_between(b, a, RelationKind::KeyAlters), Some(rel));
        sig.remove_edge(rel);
        assert!(!sig.has_relation(a, RelationKind::KeyAlters));
    }

    #[test]
    fn test_membership_back_index() {
        let mut sig = Sig::new();
        let chord = sig.add_vertex(Inter::chord(Shape::HeadChord, 0.5));
        let a = stem(&mut sig, 0.0);
        let b = stem(&mut sig, 10.0);
        sig.add_member(chord, a);
        sig.add_member(chord, b);
        sig.add_member(chord, b);
        assert_eq!(sig.members(chord), &[a, b]);
        assert_eq!(sig.ensembles_of(a), &[chord]);
        assert_eq!(sig.inter(chord).unwrap().bounds.right(), 11.0);

        sig.remove_member(chord, a);
        assert_eq!(sig.members(chord), &[b]);
        assert!(sig.ensembles_of(a).is_empty());
    }

    #[test]
    fn test_emptied_ensemble_is_removed() {
        let mut sig = Sig::new();
        let chord = sig.add_vertex(Inter::chord(Shape::HeadChord, 0.5));
        let a = stem(&mut sig, 0.0);
        sig.add_member(chord, a);
        sig.remove_vertex(a);
        assert!(!sig.is_live(chord));
        assert!(sig.get(chord).is_err());
    }

    #[test]
    fn test_removed_vertex_loses_edges() {
        let mut sig = Sig::new();
        let a = stem(&mut sig, 0.0);
        let b = stem(&mut sig, 10.0);
        sig.add_edge(a, b, Relation::BeamRest(BeamPortion::Center));
        sig.remove_vertex(a);
        assert!(sig.relations(b, &[]).is_empty());
        assert_eq!(sig.len(), 1);
        assert_eq!(sig.inters_of(&[Shape::Stem]), vec![b]);
    }
}
