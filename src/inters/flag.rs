//! Flag to stem linking.
//!
//! A flag is attached to at most one stem. The reference point of a flag is
//! its top-left corner for up flags and its bottom-left corner otherwise;
//! it must sit on the stem end the flag belongs to.

use tracing::{debug, info};

use crate::geom::{Point, Rect};
use crate::grade;
use crate::index::{self, GeoOrder};
use crate::link::{BestLink, Link};
use crate::sig::{FlagStem, Gaps, InterId, Relation, RelationKind, Sig};
use crate::system::System;

use super::stem;

fn reference_point(bounds: &Rect, up: bool) -> Point {
    Point::new(bounds.x, if up { bounds.y } else { bounds.bottom() })
}

/// Grade a flag-stem connection, None when gaps or consistency fail
pub fn check_link(system: &System, flag: InterId, stem_id: InterId, profile: usize) -> Option<FlagStem> {
    let inter = system.sig.inter(flag)?;
    let data = system.sig.inter(stem_id)?.as_stem()?;
    let up = inter.shape.is_flag_up();

    if inter.shape.is_small_flag() != stem::is_grace_stem(&system.sig, stem_id) {
        debug!("flag {} and stem {} differ in size", flag, stem_id);
        return None;
    }

    let ref_pt = reference_point(&inter.bounds, up);
    let middle_y = data.median().middle().y;
    let direction = stem::direction(&system.sig, stem_id);
    let consistent = if up {
        ref_pt.y < middle_y && direction <= 0
    } else {
        ref_pt.y > middle_y && direction >= 0
    };
    if !consistent {
        return None;
    }

    let x_gap = ref_pt.x - data.median().x_at_y(ref_pt.y);
    let y_gap = if ref_pt.y < data.top.y {
        data.top.y - ref_pt.y
    } else if ref_pt.y > data.bottom.y {
        ref_pt.y - data.bottom.y
    } else {
        0.0
    };

    let scale = &system.scale;
    let constants = &system.constants.flag_stem;
    let gaps = Gaps {
        x: scale.pixels_to_frac(x_gap),
        y: scale.pixels_to_frac(y_gap),
    };
    let grade = grade::connection_grade(constants, profile, gaps.x, gaps.y);
    if grade < constants.min_grade {
        return None;
    }
    Some(FlagStem { gaps, grade })
}

/// Best stem for a flag, looked up around its reference point
pub fn search_links(system: &System, flag: InterId, profile: usize) -> Vec<Link> {
    let Some(inter) = system.sig.inter(flag) else {
        return Vec::new();
    };
    let profile = system.profile_for(flag, profile);
    let constants = &system.constants.flag_stem;
    let scale = &system.scale;
    let x_out = scale.to_pixels_f(constants.x_out_gap_max.at(profile));
    let x_in = scale.to_pixels_f(constants.x_in_gap_max.at(profile));
    let y_gap = scale.to_pixels_f(constants.y_gap_max.at(profile));

    let ref_pt = reference_point(&inter.bounds, inter.shape.is_flag_up());
    let lu_box = Rect::bounding(&[
        Point::new(ref_pt.x - x_out, ref_pt.y - y_gap),
        Point::new(ref_pt.x + x_in, ref_pt.y + y_gap),
    ]);
    if inter.vip {
        info!("VIP stem search for flag {} in {:?}", flag, lu_box);
    }

    let stems = system.stems();
    let mut best = BestLink::new();
    for s in index::intersected_inters(&system.sig, &stems, GeoOrder::ByAbscissa, &lu_box.into()) {
        let prof = system.profile_for(s, profile);
        best.offer_opt(check_link(system, flag, s, prof).map(|rel| Link::new(s, Relation::FlagStem(rel), true)));
    }
    best.into_inner().into_iter().collect()
}

/// Stem carrying the flag
pub fn stem_of(sig: &Sig, flag: InterId) -> Option<InterId> {
    sig.partners(flag, RelationKind::FlagStem).into_iter().next()
}

pub fn check_abnormal(sig: &Sig, flag: InterId) -> bool {
    stem_of(sig, flag).is_none()
}
