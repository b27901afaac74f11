//! # Link Module
//!
//! Proposals produced by link searches, and the best-candidate rule.
//!
//! ## Purpose
//! A [`Link`] is a relation not yet in the graph: a partner, the relation to
//! create and its direction. Searches return links; callers decide when to
//! apply them (on addition, or on edit commit).
//!
//! ## Tie-break
//! [`BestLink`] keeps the first candidate with the highest grade. A later
//! candidate must be strictly better to replace it, so with populations
//! sorted by abscissa the leftmost wins among equals.

use crate::sig::{InterId, Relation, RelationId, RelationKind, Sig};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Link {
    pub partner: InterId,
    pub relation: Relation,
    /// True when the edge goes from the searching inter to the partner
    pub outgoing: bool,
}

impl Link {
    pub fn new(partner: InterId, relation: Relation, outgoing: bool) -> Self {
        Self {
            partner,
            relation,
            outgoing,
        }
    }

    pub fn grade(&self) -> f64 {
        self.relation.grade()
    }

    /// Insert the relation between `inter` and the partner
    pub fn apply(&self, sig: &mut Sig, inter: InterId) -> RelationId {
        if self.outgoing {
            sig.add_edge(inter, self.partner, self.relation)
        } else {
            sig.add_edge(self.partner, inter, self.relation)
        }
    }
}

/// Running selection of the best link, first found wins ties
#[derive(Debug, Default)]
pub struct BestLink {
    best: Option<Link>,
}

impl BestLink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn offer(&mut self, link: Link) {
        let better = match &self.best {
            None => true,
            Some(best) => link.grade() > best.grade(),
        };
        if better {
            self.best = Some(link);
        }
    }

    pub fn offer_opt(&mut self, link: Option<Link>) {
        if let Some(link) = link {
            self.offer(link);
        }
    }

    pub fn get(&self) -> Option<&Link> {
        self.best.as_ref()
    }

    pub fn into_inner(self) -> Option<Link> {
        self.best
    }
}

/// Apply links, removing first the relations of the same kinds that the
/// new links supersede. Returns the relations matching the links.
pub fn relink(sig: &mut Sig, inter: InterId, kinds: &[RelationKind], links: &[Link]) -> Vec<RelationId> {
    for rel in sig.relations(inter, kinds) {
        if matching_link(sig, inter, rel, links).is_none() {
            sig.remove_edge(rel);
        }
    }

    let mut result = Vec::new();
    for link in links {
        let existing = sig
            .relations(inter, &[link.relation.kind()])
            .into_iter()
            .find(|rel| !result.contains(rel) && same_slot(sig, inter, *rel, link));
        match existing {
            Some(rel) => {
                if let Some(edge) = sig.edge_mut(rel) {
                    edge.relation = link.relation;
                }
                result.push(rel);
            }
            None => result.push(link.apply(sig, inter)),
        }
    }
    result
}

fn matching_link<'a>(sig: &Sig, inter: InterId, rel: RelationId, links: &'a [Link]) -> Option<&'a Link> {
    links.iter().find(|link| same_slot(sig, inter, rel, link))
}

/// Whether an existing relation connects the same partner, kind and side as a link
fn same_slot(sig: &Sig, inter: InterId, rel: RelationId, link: &Link) -> bool {
    match sig.edge(rel) {
        Some(edge) => {
            sig.opposite(inter, rel) == Some(link.partner)
                && edge.relation.kind() == link.relation.kind()
                && edge.relation.side() == link.relation.side()
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Point;
    use crate::sig::{FlagStem, Gaps, Inter};

    fn flag_link(partner: u32, grade: f64) -> Link {
        Link::new(
            InterId(partner),
            Relation::FlagStem(FlagStem {
                gaps: Gaps::default(),
                grade,
            }),
            true,
        )
    }

    #[test]
    fn test_best_link_first_wins_ties() {
        let mut best = BestLink::new();
        best.offer(flag_link(1, 0.7));
        best.offer(flag_link(2, 0.7));
        best.offer(flag_link(3, 0.5));
        assert_eq!(best.get().unwrap().partner, InterId(1));
        best.offer(flag_link(4, 0.71));
        assert_eq!(best.into_inner().unwrap().partner, InterId(4));
    }

    #[test]
    fn test_relink_replaces_obsolete() {
        let mut sig = Sig::new();
        let flag = sig.add_vertex(Inter::stem(0.5, Point::new(0.0, 0.0), Point::new(0.0, 1.0), 1.0));
        let a = sig.add_vertex(Inter::stem(0.5, Point::new(5.0, 0.0), Point::new(5.0, 1.0), 1.0));
        let b = sig.add_vertex(Inter::stem(0.5, Point::new(9.0, 0.0), Point::new(9.0, 1.0), 1.0));

        relink(&mut sig, flag, &[RelationKind::FlagStem], &[flag_link(a.0, 0.6)]);
        assert_eq!(sig.partners(flag, RelationKind::FlagStem), vec![a]);

        relink(&mut sig, flag, &[RelationKind::FlagStem], &[flag_link(b.0, 0.8)]);
        assert_eq!(sig.partners(flag, RelationKind::FlagStem), vec![b]);

        relink(&mut sig, flag, &[RelationKind::FlagStem], &[flag_link(b.0, 0.9)]);
        let rels = sig.relations(flag, &[RelationKind::FlagStem]);
        assert_eq!(rels.len(), 1);
        assert_eq!(sig.edge(rels[0]).unwrap().relation.grade(), 0.9);
    }
}
