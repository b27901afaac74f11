pub mod abnormal;
pub mod classifier;
pub mod config;
pub mod edit;
pub mod error;
pub mod extension;
pub mod geom;
pub mod grade;
pub mod index;
pub mod inters;
pub mod layout;
pub mod link;
pub mod scale;
pub mod shape;
pub mod sig;
pub mod system;
pub mod text;

pub use config::Constants;
pub use error::InterError;
pub use link::Link;
pub use shape::Shape;
pub use sig::{Inter, InterId, Relation, RelationKind, Sig};
pub use system::{System, SystemBuilder};

use tracing::info;

/// Link every inter of a system, then build keys, tremolo compounds and
/// beam groups, and flag abnormal inters.
/// This is the main entry point for the library.
///
/// Returns the abnormal inters.
pub fn process(system: &mut System, profile: usize) -> Vec<InterId> {
    // Stems first: flags, beams and tremolos check stem directions
    let stems = system.stems();
    for stem in stems {
        inters::link(system, stem, profile);
    }

    let others = system.sorted_inters(|s| s != Shape::Stem && !inters::relation_kinds(s).is_empty());
    for id in others {
        inters::link(system, id, profile);
    }

    for slur in system.sorted_inters(|s| s == Shape::Slur) {
        inters::slur::check_staff_tie(system, slur);
    }

    let keys = inters::key::populate(system);
    let tremolos = inters::tremolo::aggregate(system);
    for tremolo in system.sorted_inters(Shape::is_tremolo) {
        inters::tremolo::link_as_ornament(&mut system.sig, tremolo);
    }
    inters::beam::populate(system);

    let abnormal = abnormal::check_all(&mut system.sig);
    info!(
        "system processed: {} keys, {} compound tremolos, {} abnormal inters",
        keys.len(),
        tremolos.len(),
        abnormal.len()
    );
    abnormal
}
