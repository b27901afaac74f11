//! Key signatures built from sequences of alteration signs.
//!
//! Signs of a staff are scanned left to right. At each position, up to
//! seven following signs are checked against the pitch sequence that the
//! effective clef imposes for their shape. An accepted run is converted
//! into key members, which support each other and are contained by a new
//! key inter.

use tracing::{debug, info, warn};

use crate::error::InterError;
use crate::geom::Rect;
use crate::layout::StaffId;
use crate::shape::Shape;
use crate::sig::{AlterData, ClefKind, Inter, InterData, InterId, KeyData, Relation, RelationKind, Sig, Step};
use crate::system::System;

use super::chord;

const SHARP_TREBLE: [i32; 7] = [-4, -1, -5, -2, 1, -3, 0];
const SHARP_ALTO: [i32; 7] = [-3, 0, -4, -1, 2, -2, 1];
const SHARP_BASS: [i32; 7] = [-2, 1, -3, 0, 3, -1, 2];
const SHARP_TENOR: [i32; 7] = [2, -2, 1, -3, 0, -4, -1];

const FLAT_TREBLE: [i32; 7] = [0, -3, 1, -2, 2, -1, 3];
const FLAT_ALTO: [i32; 7] = [1, -2, 2, -1, 3, 0, 4];
const FLAT_BASS: [i32; 7] = [2, -1, 3, 0, 4, 1, 5];
const FLAT_TENOR: [i32; 7] = [-1, -4, 0, -3, 1, -2, 2];

/// Steps altered by sharps, in key order
const SHARP_STEPS: [Step; 7] = [Step::F, Step::C, Step::G, Step::D, Step::A, Step::E, Step::B];

/// Steps altered by flats, in key order
const FLAT_STEPS: [Step; 7] = [Step::B, Step::E, Step::A, Step::D, Step::G, Step::C, Step::F];

const KEY_MEMBER_SHAPES: [Shape; 3] = [Shape::Sharp, Shape::Flat, Shape::Natural];

/// Pitch positions of successive key items, for a clef kind and item shape
pub fn pitches(kind: ClefKind, shape: Shape) -> Option<&'static [i32; 7]> {
    match (shape, kind) {
        (Shape::Sharp, ClefKind::Treble) => Some(&SHARP_TREBLE),
        (Shape::Sharp, ClefKind::Alto) => Some(&SHARP_ALTO),
        (Shape::Sharp, ClefKind::Bass) => Some(&SHARP_BASS),
        (Shape::Sharp, ClefKind::Tenor) => Some(&SHARP_TENOR),
        (Shape::Flat, ClefKind::Treble) => Some(&FLAT_TREBLE),
        (Shape::Flat, ClefKind::Alto) => Some(&FLAT_ALTO),
        (Shape::Flat, ClefKind::Bass) => Some(&FLAT_BASS),
        (Shape::Flat, ClefKind::Tenor) => Some(&FLAT_TENOR),
        _ => None,
    }
}

/// Pitch position of the item at `index` in a key of `fifths`
pub fn pitch_position(fifths: i32, kind: ClefKind, index: usize) -> Option<i32> {
    let shape = if fifths < 0 { Shape::Flat } else { Shape::Sharp };
    pitches(kind, shape)?.get(index).copied()
}

/// Alteration (+1, -1 or 0) that a key of `fifths` applies to a step
pub fn alter_for(fifths: i32, step: Step) -> i32 {
    let count = fifths.unsigned_abs().min(7) as usize;
    if fifths > 0 && SHARP_STEPS[..count].contains(&step) {
        1
    } else if fifths < 0 && FLAT_STEPS[..count].contains(&step) {
        -1
    } else {
        0
    }
}

/// Outcome of a successful configuration check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyConfig {
    /// Item shape: sharp, flat or natural
    pub shape: Shape,
    /// Signed item count; for a cancel key, the fifths being cancelled
    pub fifths: i32,
}

impl KeyConfig {
    pub fn member_count(&self) -> usize {
        self.fifths.unsigned_abs() as usize
    }

    pub fn key_shape(&self) -> Result<Shape, InterError> {
        match self.shape {
            Shape::Natural => Ok(Shape::KeyCancel),
            _ => Shape::key_shape(self.fifths),
        }
    }
}

fn is_candidate(inter: &Inter) -> bool {
    KEY_MEMBER_SHAPES.contains(&inter.shape) && matches!(inter.data, InterData::Alter(_))
}

fn pitch_of(sig: &Sig, id: InterId) -> f64 {
    sig.inter(id).and_then(|i| i.alter_pitch()).unwrap_or(f64::MAX)
}

fn x_gap(left: &Rect, right: &Rect) -> f64 {
    right.x - left.right()
}

/// Alteration signs of a staff that could start or continue a key
///
/// Signs already in a key and signs too far from the staff middle are left
/// out. The result is sorted by abscissa and free of overlapping pairs.
pub fn lookup_candidates(system: &System, staff: StaffId) -> Vec<InterId> {
    let sig = &system.sig;
    let constants = &system.constants.key;
    let max_abs = constants.max_abs_pitch + constants.max_pitch_diff;

    let mut ids = sig.inters(|i| {
        i.staff == Some(staff) && is_candidate(i) && i.alter_pitch().map(|p| p.abs() <= max_abs).unwrap_or(false)
    });
    ids.retain(|id| sig.ensemble_of(*id, &key_shapes()).is_none());
    crate::index::sort_by_abscissa(sig, &mut ids);
    filter_overlapping(sig, &mut ids, constants.min_overlap_iou);
    ids
}

/// Resolve overlaps in a sequence sorted by abscissa
///
/// Of two boxes overlapping by at least `min_iou`, the lower graded one is
/// dropped (the left one on equal grades).
pub fn filter_overlapping(sig: &Sig, ids: &mut Vec<InterId>, min_iou: f64) {
    let mut i = 0;
    while i < ids.len() {
        let Some(left) = sig.inter(ids[i]) else {
            ids.remove(i);
            continue;
        };
        let mut left_removed = false;
        let mut j = i + 1;
        while j < ids.len() {
            let Some(right) = sig.inter(ids[j]) else {
                ids.remove(j);
                continue;
            };
            if left.bounds.right() <= right.bounds.x {
                break;
            }
            if left.bounds.iou(&right.bounds) >= min_iou {
                if left.grade >= right.grade {
                    debug!("overlap {} drops {}", ids[i], ids[j]);
                    ids.remove(j);
                    continue;
                }
                debug!("overlap {} drops {}", ids[j], ids[i]);
                ids.remove(i);
                left_removed = true;
                break;
            }
            j += 1;
        }
        if !left_removed {
            i += 1;
        }
    }
}

fn key_shapes() -> Vec<Shape> {
    (-7..=7).filter_map(|f| Shape::key_shape(f).ok()).collect()
}

fn effective_fifths(system: &System, staff: StaffId, x: f64) -> Option<i32> {
    let key = system.effective_key(staff, x)?;
    fifths(&system.sig, key).ok()
}

/// Check for a key configuration at the very beginning of a sequence
///
/// Items must follow the clef pitch table of the first item shape, with
/// identical shapes and small abscissa gaps. A run of naturals cancels the
/// key in effect and must count at least as many items. A single item too
/// close to the head it alters is a plain accidental.
pub fn check_configuration(system: &System, alters: &[InterId]) -> Option<KeyConfig> {
    let sig = &system.sig;
    let first = sig.inter(*alters.first()?)?;
    let staff = first.staff?;
    let constants = &system.constants.key;
    let max_internal_gap = system.scale.to_pixels(constants.max_internal_x_gap) as f64;
    let min_gap_to_head = system.scale.to_pixels(constants.min_x_gap_to_head) as f64;

    let center = first.center();
    let clef = system.effective_clef(staff, center.x).unwrap_or(ClefKind::Treble);

    let mut cancel = None;
    let table = if first.shape == Shape::Natural {
        let Some(cancelled) = effective_fifths(system, staff, center.x) else {
            info!("no effective key before natural {}", alters[0]);
            return None;
        };
        if cancelled == 0 {
            debug!("nothing to cancel for {}", alters[0]);
            return None;
        }
        cancel = Some(cancelled);
        pitches(clef, if cancelled < 0 { Shape::Flat } else { Shape::Sharp })?
    } else {
        pitches(clef, first.shape)?
    };

    let mut count = 0;
    let mut last_box: Option<Rect> = None;
    for (j, id) in alters.iter().take(7).enumerate() {
        let Some(alter) = sig.inter(*id) else {
            break;
        };
        if (pitch_of(sig, *id) - table[j] as f64).abs() > constants.max_pitch_diff {
            debug!("incompatible pitch for {}", id);
            break;
        }
        if let Some(previous) = last_box {
            if x_gap(&previous, &alter.bounds) > max_internal_gap {
                debug!("too large gap before {}", id);
                break;
            }
            if alter.shape != first.shape {
                break;
            }
        }
        count += 1;
        last_box = Some(alter.bounds);
    }

    if count == 0 {
        return None;
    }

    if let Some(cancelled) = cancel {
        let expected = cancelled.unsigned_abs() as usize;
        if count < expected {
            debug!("{} natural(s) found vs {} expected", count, expected);
            return None;
        }
    }

    if count == 1 {
        for head in sig.partners(alters[0], RelationKind::AlterHead) {
            let Some(head_chord) = super::head::chord(sig, head) else {
                continue;
            };
            let heads_box = chord::heads(sig, head_chord)
                .into_iter()
                .filter_map(|h| sig.inter(h).map(|i| i.bounds))
                .reduce(|a, b| a.union(&b));
            if let Some(heads_box) = heads_box {
                if x_gap(&first.bounds, &heads_box) < min_gap_to_head {
                    debug!("{} too close to head {}", alters[0], head);
                    return None;
                }
            }
        }
    }

    let count = count as i32;
    let fifths = match first.shape {
        Shape::Sharp => count,
        Shape::Flat => -count,
        _ => cancel.unwrap_or(0),
    };
    Some(KeyConfig {
        shape: first.shape,
        fifths,
    })
}

/// Convert alteration signs into the members of a new key
///
/// Assumes the configuration was accepted by [`check_configuration`].
pub fn build(system: &mut System, config: KeyConfig, alters: &[InterId]) -> Result<InterId, InterError> {
    let key_shape = config.key_shape()?;
    let first = system.sig.get(*alters.first().ok_or_else(|| InterError::Config("empty key".to_string()))?)?;
    let staff = first.staff;
    let part = first.part;

    let mut members = Vec::with_capacity(alters.len());
    for id in alters {
        let alter = system.sig.get(*id)?;
        let pitch = alter.alter_pitch().unwrap_or_default();
        let mut member = Inter::new(alter.shape, alter.grade, alter.bounds, InterData::KeyAlter(AlterData { pitch }));
        member.staff = alter.staff;
        member.part = alter.part;
        member.manual = alter.manual;
        system.sig.remove_vertex(*id);
        members.push(system.sig.add_vertex(member));
    }

    for (i, member) in members.iter().enumerate() {
        for sibling in &members[i + 1..] {
            system.sig.add_edge(*member, *sibling, Relation::KeyAlters);
        }
    }

    let grade = members
        .iter()
        .map(|m| system.sig.contextual_grade(*m, &system.constants))
        .sum::<f64>()
        / members.len() as f64;
    let bounds = members
        .iter()
        .filter_map(|m| system.sig.inter(*m).map(|i| i.bounds))
        .reduce(|a, b| a.union(&b))
        .unwrap_or_default();

    let mut key = Inter::new(key_shape, grade, bounds, InterData::Key(KeyData { fifths: config.fifths }));
    key.staff = staff;
    key.part = part;
    let key = system.sig.add_vertex(key);
    for member in &members {
        system.sig.add_member(key, *member);
    }
    info!("key {:?} built {} on {} members", key_shape, key, members.len());
    Ok(key)
}

/// Detect and build every key signature of the system
pub fn populate(system: &mut System) -> Vec<InterId> {
    let staves: Vec<StaffId> = system.layout.staves.iter().map(|s| s.id).collect();
    let mut keys = Vec::new();

    for staff in staves {
        let candidates = lookup_candidates(system, staff);
        debug!("staff {:?} key candidates {:?}", staff, candidates);
        let mut i = 0;
        while i < candidates.len() {
            let Some(config) = check_configuration(system, &candidates[i..]) else {
                i += 1;
                continue;
            };
            let count = config.member_count().min(candidates.len() - i);
            match build(system, config, &candidates[i..i + count]) {
                Ok(key) => keys.push(key),
                Err(e) => warn!("could not build key: {}", e),
            }
            i += count.max(1);
        }
    }
    keys
}

/// Signed count of sharps or flats in a key, 0 for a cancel key
///
/// Fails on a member that is neither sharp, flat nor natural, or on sharps
/// and flats mixed in the same key.
pub fn fifths(sig: &Sig, key: InterId) -> Result<i32, InterError> {
    let inter = sig.get(key)?;
    if inter.shape == Shape::KeyCancel {
        return Ok(0);
    }
    let members = sig.members(key);
    if members.is_empty() {
        return match inter.data {
            InterData::Key(data) => Ok(data.fifths),
            _ => inter.shape.key_fifths(),
        };
    }

    let mut count = 0i32;
    for member in members {
        match sig.get(*member)?.shape {
            Shape::Sharp if count < 0 => return Err(mixed(key)),
            Shape::Flat if count > 0 => return Err(mixed(key)),
            Shape::Sharp => count += 1,
            Shape::Flat => count -= 1,
            Shape::Natural => {}
            other => {
                return Err(InterError::State {
                    inter: key,
                    message: format!("illegal shape {:?} in key", other),
                })
            }
        }
    }
    Ok(count)
}

fn mixed(key: InterId) -> InterError {
    InterError::State {
        inter: key,
        message: "sharp and flat in same key".to_string(),
    }
}

/// Fifths cancelled by a cancel key
pub fn cancelled_fifths(sig: &Sig, key: InterId) -> Option<i32> {
    let inter = sig.inter(key)?;
    match inter.data {
        InterData::Key(data) if inter.shape == Shape::KeyCancel => Some(data.fifths),
        _ => None,
    }
}

/// Clef kind whose pitch table best fits the key members (least RMS error)
pub fn guess_clef_kind(sig: &Sig, key: InterId) -> Option<ClefKind> {
    let members = sig.members(key);
    let shape = sig.inter(*members.first()?)?.shape;
    let mut best: Option<(ClefKind, f64)> = None;

    for kind in [ClefKind::Treble, ClefKind::Alto, ClefKind::Bass, ClefKind::Tenor] {
        let Some(table) = pitches(kind, shape) else {
            continue;
        };
        let sum: f64 = members
            .iter()
            .take(7)
            .enumerate()
            .map(|(i, m)| (pitch_of(sig, *m) - table[i] as f64).powi(2))
            .sum();
        let rms = (sum / members.len().min(7) as f64).sqrt();
        if best.map(|(_, b)| rms < b).unwrap_or(true) {
            best = Some((kind, rms));
        }
    }
    best.map(|(kind, _)| kind)
}

/// Whether an alteration sign could join an existing key
pub fn can_propose(sig: &Sig, key: InterId, alter: InterId) -> bool {
    let (Some(key_inter), Some(alter_inter)) = (sig.inter(key), sig.inter(alter)) else {
        return false;
    };
    if !KEY_MEMBER_SHAPES.contains(&alter_inter.shape) || alter_inter.staff != key_inter.staff {
        return false;
    }
    if sig.ensemble_of(alter, &key_shapes()).is_some() {
        return false;
    }
    match sig.members(key).first().and_then(|m| sig.inter(*m)) {
        Some(member) => member.shape == alter_inter.shape,
        None => true,
    }
}

/// A key is abnormal without members or with members of different shapes
pub fn check_abnormal(sig: &Sig, key: InterId) -> bool {
    let shapes: Vec<Shape> = sig
        .members(key)
        .iter()
        .filter_map(|m| sig.inter(*m).map(|i| i.shape))
        .collect();
    match shapes.first() {
        None => true,
        Some(first) => shapes.iter().any(|s| s != first),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Point;
    use crate::inters::head;
    use crate::system::SystemBuilder;

    fn system() -> System {
        SystemBuilder::new(20.0).part(&[100.0]).barlines(&[0.0, 600.0]).build()
    }

    fn alter(system: &mut System, shape: Shape, x: f64, pitch: f64, grade: f64) -> InterId {
        let y = system.layout.staves[0].y_at_pitch(pitch);
        let bounds = Rect::around(Point::new(x + 5.0, y), 5.0, 15.0);
        system.add_in_staff(Inter::alter(shape, grade, bounds, pitch), StaffId(0))
    }

    #[test]
    fn test_tables_and_alter_for() {
        assert_eq!(pitch_position(3, ClefKind::Treble, 2), Some(-5));
        assert_eq!(pitch_position(-1, ClefKind::Bass, 0), Some(2));
        assert_eq!(pitches(ClefKind::Percussion, Shape::Sharp), None);
        assert_eq!(alter_for(2, Step::C), 1);
        assert_eq!(alter_for(2, Step::G), 0);
        assert_eq!(alter_for(-3, Step::A), -1);
        assert_eq!(alter_for(0, Step::F), 0);
    }

    #[test]
    fn test_three_sharps() {
        let mut system = system();
        let ids: Vec<InterId> = [(-4.0, 120.0), (-1.0, 135.0), (-5.0, 150.0)]
            .iter()
            .map(|(p, x)| alter(&mut system, Shape::Sharp, *x, *p, 0.8))
            .collect();
        let config = check_configuration(&system, &ids).unwrap();
        assert_eq!(config, KeyConfig { shape: Shape::Sharp, fifths: 3 });

        let keys = populate(&mut system);
        assert_eq!(keys.len(), 1);
        let key = keys[0];
        assert_eq!(system.sig.inter(key).unwrap().shape, Shape::KeySharp3);
        assert_eq!(fifths(&system.sig, key).unwrap(), 3);
        assert_eq!(system.sig.members(key).len(), 3);
        assert!(ids.iter().all(|id| !system.sig.is_live(*id)));
        assert!(!check_abnormal(&system.sig, key));
        assert_eq!(guess_clef_kind(&system.sig, key), Some(ClefKind::Treble));
        let grade = system.sig.inter(key).unwrap().grade;
        assert!(grade > 0.8 && grade <= 1.0);
    }

    #[test]
    fn test_mixed_shapes_truncate() {
        let mut system = system();
        let ids = vec![
            alter(&mut system, Shape::Flat, 120.0, 0.0, 0.8),
            alter(&mut system, Shape::Flat, 135.0, -3.0, 0.8),
            alter(&mut system, Shape::Sharp, 150.0, 1.0, 0.8),
        ];
        let config = check_configuration(&system, &ids).unwrap();
        assert_eq!(config.fifths, -2);
        assert_eq!(config.key_shape().unwrap(), Shape::KeyFlat2);
    }

    #[test]
    fn test_wrong_pitch_and_gap_break() {
        let mut system = system();
        let ids = vec![
            alter(&mut system, Shape::Sharp, 120.0, -4.0, 0.8),
            alter(&mut system, Shape::Sharp, 135.0, 2.0, 0.8),
        ];
        assert_eq!(check_configuration(&system, &ids).unwrap().fifths, 1);

        let far = vec![ids[0], alter(&mut system, Shape::Sharp, 200.0, -1.0, 0.8)];
        assert_eq!(check_configuration(&system, &far).unwrap().fifths, 1);
    }

    #[test]
    fn test_single_item_near_head_rejected() {
        let mut system = system();
        let sharp = alter(&mut system, Shape::Sharp, 120.0, -4.0, 0.8);
        let h = head::create(&system, Shape::NoteheadBlack, StaffId(0), Point::new(145.0, 100.0), 0.8).unwrap();
        let h = system.add(h);
        chord::build(&mut system, &[h], None);
        assert!(check_configuration(&system, &[sharp]).is_some());

        system.sig.add_edge(sharp, h, Relation::AlterHead);
        assert!(check_configuration(&system, &[sharp]).is_none());
    }

    #[test]
    fn test_overlap_keeps_best_in_any_order() {
        for grades in [(0.5, 0.8), (0.8, 0.5)] {
            let mut system = system();
            let a = alter(&mut system, Shape::Sharp, 120.0, -4.0, grades.0);
            let b = alter(&mut system, Shape::Sharp, 121.0, -4.0, grades.1);
            let best = if grades.0 > grades.1 { a } else { b };
            assert_eq!(lookup_candidates(&system, StaffId(0)), vec![best]);
        }
    }

    #[test]
    fn test_far_pitch_excluded() {
        let mut system = system();
        alter(&mut system, Shape::Sharp, 120.0, 8.0, 0.8);
        assert!(lookup_candidates(&system, StaffId(0)).is_empty());
    }

    #[test]
    fn test_cancel_key() {
        let mut system = system();
        alter(&mut system, Shape::Sharp, 60.0, -4.0, 0.8);
        alter(&mut system, Shape::Sharp, 75.0, -1.0, 0.8);
        alter(&mut system, Shape::Natural, 300.0, -4.0, 0.8);
        alter(&mut system, Shape::Natural, 315.0, -1.0, 0.8);
        alter(&mut system, Shape::Natural, 330.0, -5.0, 0.8);

        let keys = populate(&mut system);
        assert_eq!(keys.len(), 2);
        let cancel = keys[1];
        assert_eq!(system.sig.inter(cancel).unwrap().shape, Shape::KeyCancel);
        assert_eq!(fifths(&system.sig, cancel).unwrap(), 0);
        assert_eq!(cancelled_fifths(&system.sig, cancel), Some(2));
        assert_eq!(system.sig.members(cancel).len(), 2);
    }

    #[test]
    fn test_mixed_key_is_state_error() {
        let mut system = system();
        let ids = vec![
            alter(&mut system, Shape::Sharp, 120.0, -4.0, 0.8),
            alter(&mut system, Shape::Sharp, 135.0, -1.0, 0.8),
        ];
        let key = build(&mut system, KeyConfig { shape: Shape::Sharp, fifths: 2 }, &ids).unwrap();
        let flat = alter(&mut system, Shape::Flat, 150.0, 0.0, 0.8);
        assert!(!can_propose(&system.sig, key, flat));
        system.sig.add_member(key, flat);
        assert!(matches!(fifths(&system.sig, key), Err(InterError::State { .. })));
        assert!(check_abnormal(&system.sig, key));
    }
}
