//! # Extension Chains
//!
//! Symbols split across staves (octave shifts, slurs) are stored as one
//! inter per physical piece. Each piece holds the id of its left and right
//! neighbors in [`Extension`], forming an index-based doubly linked list.
//!
//! ## Invariants
//! - Pointers are mutual: `a.right == Some(b)` iff `b.left == Some(a)`.
//! - A chain has no cycle and never links a piece to itself.
//!
//! [`check_chain`] verifies both; every mutation here keeps them.
//!
//! [`Extension`]: crate::sig::Extension

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::InterError;
use crate::geom::HorizontalSide;
use crate::sig::{InterId, Sig};

/// Extension state of one piece
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtensionState {
    Detached,
    LeftExtended,
    RightExtended,
    BothExtended,
}

pub fn extension(sig: &Sig, id: InterId, side: HorizontalSide) -> Option<InterId> {
    sig.inter(id)?.extension.get(side)
}

pub fn state(sig: &Sig, id: InterId) -> ExtensionState {
    let left = extension(sig, id, HorizontalSide::Left).is_some();
    let right = extension(sig, id, HorizontalSide::Right).is_some();
    match (left, right) {
        (false, false) => ExtensionState::Detached,
        (true, false) => ExtensionState::LeftExtended,
        (false, true) => ExtensionState::RightExtended,
        (true, true) => ExtensionState::BothExtended,
    }
}

fn set(sig: &mut Sig, id: InterId, side: HorizontalSide, other: Option<InterId>) {
    if let Some(inter) = sig.inter_mut(id) {
        inter.extension.set(side, other);
    }
}

/// Detach a piece from its neighbor on one side, on both ends of the link
pub fn unlink(sig: &mut Sig, id: InterId, side: HorizontalSide) {
    if let Some(other) = extension(sig, id, side) {
        set(sig, other, side.opposite(), None);
        set(sig, id, side, None);
    }
}

/// Make `right` the right extension of `left`
///
/// Previous neighbors on the joined sides are detached first. Joining two
/// pieces of the same chain would close a cycle and is refused.
pub fn link(sig: &mut Sig, left: InterId, right: InterId) -> Result<(), InterError> {
    sig.get(left)?;
    sig.get(right)?;
    if left == right || sequence(sig, left).contains(&right) {
        return Err(InterError::State {
            inter: left,
            message: format!("linking {} would close an extension cycle", right),
        });
    }
    unlink(sig, left, HorizontalSide::Right);
    unlink(sig, right, HorizontalSide::Left);
    set(sig, left, HorizontalSide::Right, Some(right));
    set(sig, right, HorizontalSide::Left, Some(left));
    debug!("extension {} -> {}", left, right);
    Ok(())
}

/// Whole chain through a piece, from left to right
pub fn sequence(sig: &Sig, id: InterId) -> Vec<InterId> {
    let mut seen = BTreeSet::from([id]);
    let mut lefts = Vec::new();
    let mut current = extension(sig, id, HorizontalSide::Left);
    while let Some(other) = current {
        if !seen.insert(other) {
            break;
        }
        lefts.push(other);
        current = extension(sig, other, HorizontalSide::Left);
    }

    let mut seq: Vec<InterId> = lefts.into_iter().rev().collect();
    seq.push(id);
    let mut current = extension(sig, id, HorizontalSide::Right);
    while let Some(other) = current {
        if !seen.insert(other) {
            break;
        }
        seq.push(other);
        current = extension(sig, other, HorizontalSide::Right);
    }
    seq
}

/// Relink an ordered sequence: consecutive pieces become neighbors, the ends
/// lose their outer pointers
pub fn rebuild(sig: &mut Sig, seq: &[InterId]) {
    for (i, id) in seq.iter().enumerate() {
        let left = if i > 0 { seq.get(i - 1).copied() } else { None };
        let right = seq.get(i + 1).copied();
        set(sig, *id, HorizontalSide::Left, left);
        set(sig, *id, HorizontalSide::Right, right);
    }
}

/// Cut the chain after a piece, on the given side
///
/// Returns the pieces beyond it, now detached from the remaining chain.
pub fn shrink(sig: &mut Sig, id: InterId, side: HorizontalSide) -> Vec<InterId> {
    let seq = sequence(sig, id);
    let Some(pos) = seq.iter().position(|i| *i == id) else {
        return Vec::new();
    };
    let beyond: Vec<InterId> = match side {
        HorizontalSide::Left => seq[..pos].to_vec(),
        HorizontalSide::Right => seq[pos + 1..].to_vec(),
    };
    unlink(sig, id, side);
    beyond
}

/// Remove every piece of the chain through a piece
pub fn remove_sequence(sig: &mut Sig, id: InterId) -> Vec<InterId> {
    let seq = sequence(sig, id);
    for piece in &seq {
        sig.remove_vertex(*piece);
    }
    seq
}

/// Check mutual pointers and absence of cycle along the chain through a piece
pub fn check_chain(sig: &Sig, id: InterId) -> Result<(), InterError> {
    let mut seen = BTreeSet::new();
    let mut current = Some(id);
    // Walk to the left end first
    while let Some(piece) = current {
        if !seen.insert(piece) {
            return Err(cycle(piece));
        }
        current = extension(sig, piece, HorizontalSide::Left);
    }

    let Some(mut piece) = seen.iter().copied().find(|p| extension(sig, *p, HorizontalSide::Left).is_none()) else {
        return Err(cycle(id));
    };
    let mut walked = BTreeSet::from([piece]);
    while let Some(next) = extension(sig, piece, HorizontalSide::Right) {
        if next == piece || !walked.insert(next) {
            return Err(cycle(next));
        }
        if extension(sig, next, HorizontalSide::Left) != Some(piece) {
            return Err(InterError::State {
                inter: piece,
                message: format!("right extension {} does not point back", next),
            });
        }
        piece = next;
    }
    Ok(())
}

/// Check every chain of the graph
pub fn check_all(sig: &Sig) -> Result<(), InterError> {
    for id in sig.inters(|i| i.extension.left.is_some() || i.extension.right.is_some()) {
        check_chain(sig, id)?;
        if let Some(left) = extension(sig, id, HorizontalSide::Left) {
            if extension(sig, left, HorizontalSide::Right) != Some(id) {
                return Err(InterError::State {
                    inter: id,
                    message: format!("left extension {} does not point back", left),
                });
            }
        }
    }
    Ok(())
}

fn cycle(id: InterId) -> InterError {
    InterError::State {
        inter: id,
        message: "extension chain has a cycle".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::{Line, Point};
    use crate::shape::Shape;
    use crate::sig::Inter;

    fn pieces(n: usize) -> (Sig, Vec<InterId>) {
        let mut sig = Sig::new();
        let ids = (0..n)
            .map(|i| {
                let y = 100.0 * i as f64;
                let l1 = Line::new(Point::new(0.0, y), Point::new(50.0, y - 5.0));
                let l2 = Line::new(Point::new(0.0, y), Point::new(50.0, y + 5.0));
                sig.add_vertex(Inter::wedge(Shape::Crescendo, 0.8, l1, l2))
            })
            .collect();
        (sig, ids)
    }

    #[test]
    fn test_link_and_state() {
        let (mut sig, ids) = pieces(3);
        link(&mut sig, ids[0], ids[1]).unwrap();
        link(&mut sig, ids[1], ids[2]).unwrap();
        assert_eq!(state(&sig, ids[0]), ExtensionState::RightExtended);
        assert_eq!(state(&sig, ids[1]), ExtensionState::BothExtended);
        assert_eq!(state(&sig, ids[2]), ExtensionState::LeftExtended);
        assert_eq!(sequence(&sig, ids[2]), ids);
        assert!(check_all(&sig).is_ok());
    }

    #[test]
    fn test_cycle_refused() {
        let (mut sig, ids) = pieces(3);
        link(&mut sig, ids[0], ids[1]).unwrap();
        link(&mut sig, ids[1], ids[2]).unwrap();
        assert!(link(&mut sig, ids[2], ids[0]).is_err());
        assert!(link(&mut sig, ids[1], ids[1]).is_err());
        assert!(check_all(&sig).is_ok());
    }

    #[test]
    fn test_relink_detaches_previous_neighbor() {
        let (mut sig, ids) = pieces(3);
        link(&mut sig, ids[0], ids[1]).unwrap();
        link(&mut sig, ids[2], ids[1]).unwrap();
        assert_eq!(extension(&sig, ids[0], HorizontalSide::Right), None);
        assert_eq!(extension(&sig, ids[1], HorizontalSide::Left), Some(ids[2]));
        assert!(check_all(&sig).is_ok());
    }

    #[test]
    fn test_shrink_and_remove() {
        let (mut sig, ids) = pieces(3);
        rebuild(&mut sig, &ids);
        let cut = shrink(&mut sig, ids[0], HorizontalSide::Right);
        assert_eq!(cut, vec![ids[1], ids[2]]);
        assert_eq!(state(&sig, ids[0]), ExtensionState::Detached);
        assert_eq!(sequence(&sig, ids[2]), vec![ids[1], ids[2]]);
        assert!(check_all(&sig).is_ok());

        assert_eq!(remove_sequence(&mut sig, ids[1]).len(), 2);
        assert!(!sig.is_live(ids[2]));
    }

    #[test]
    fn test_removing_middle_piece_splits_chain() {
        let (mut sig, ids) = pieces(3);
        rebuild(&mut sig, &ids);
        sig.remove_vertex(ids[1]);
        assert_eq!(extension(&sig, ids[0], HorizontalSide::Right), None);
        assert_eq!(extension(&sig, ids[2], HorizontalSide::Left), None);
        assert_eq!(state(&sig, ids[1]), ExtensionState::Detached);
        assert_eq!(sequence(&sig, ids[0]), vec![ids[0]]);
        assert!(check_all(&sig).is_ok());
    }

    #[test]
    fn test_broken_pointer_detected() {
        let (mut sig, ids) = pieces(2);
        sig.inter_mut(ids[0]).unwrap().extension.right = Some(ids[1]);
        assert!(check_all(&sig).is_err());
    }
}
