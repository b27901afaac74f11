//! # Constants Module
//!
//! Tunable thresholds used by lookup areas, scorers and aggregators.
//!
//! ## Purpose
//! Distances are interline fractions (see `scale`). Thresholds that depend
//! on the detection profile are [`Profiled`] lists: entry `i` applies to
//! profile `i`, and profiles beyond the list use the last entry.
//!
//! ## Loading
//! Defaults are compiled in and exposed through [`defaults`]. A YAML
//! document may override any subset of them:
//!
//! ```rust
//! use omr_inter::config::Constants;
//!
//! let yaml = "beam_stem:\n  x_out_gap_max: [0.2, 0.3]\n";
//! let constants = Constants::from_yaml(yaml).unwrap();
//! assert_eq!(constants.beam_stem.x_out_gap_max.at(0), 0.2);
//! assert_eq!(constants.key.max_pitch_diff, 0.5); // untouched default
//! ```

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::InterError;

static DEFAULTS: Lazy<Constants> = Lazy::new(Constants::default);

/// Process-wide default constants
pub fn defaults() -> &'static Constants {
    &DEFAULTS
}

/// Profile-keyed value, one entry per profile level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Profiled(pub Vec<f64>);

impl Profiled {
    pub fn new(values: &[f64]) -> Self {
        Profiled(values.to_vec())
    }

    /// Value for the given profile, falling back to the highest defined level
    pub fn at(&self, profile: usize) -> f64 {
        match self.0.get(profile) {
            Some(v) => *v,
            None => self.0.last().copied().unwrap_or(0.0),
        }
    }
}

/// Gap maxima and weights for a connection with a stem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConstants {
    /// Maximum horizontal overlap (inside) between partners
    pub x_in_gap_max: Profiled,
    /// Maximum horizontal gap (outside) between partners
    pub x_out_gap_max: Profiled,
    /// Maximum vertical gap between partners
    pub y_gap_max: Profiled,
    pub x_weight: f64,
    pub y_weight: f64,
    /// Support coefficient applied to the source
    pub source_coeff: f64,
    /// Support coefficient applied to the target
    pub target_coeff: f64,
    pub min_grade: f64,
}

impl Default for ConnectionConstants {
    fn default() -> Self {
        Self {
            x_in_gap_max: Profiled::new(&[0.2]),
            x_out_gap_max: Profiled::new(&[0.15]),
            y_gap_max: Profiled::new(&[0.8]),
            x_weight: 1.0,
            y_weight: 1.0,
            source_coeff: 4.0,
            target_coeff: 4.0,
            min_grade: 0.1,
        }
    }
}

impl ConnectionConstants {
    fn beam_stem() -> Self {
        Self {
            x_in_gap_max: Profiled::new(&[0.5, 0.6]),
            x_out_gap_max: Profiled::new(&[0.15, 0.25, 0.35]),
            y_gap_max: Profiled::new(&[0.8, 1.2]),
            x_weight: 1.0,
            y_weight: 1.0,
            source_coeff: 3.0,
            target_coeff: 4.0,
            min_grade: 0.1,
        }
    }

    fn head_stem() -> Self {
        Self {
            x_in_gap_max: Profiled::new(&[0.2, 0.4]),
            x_out_gap_max: Profiled::new(&[0.15, 0.25, 0.35]),
            y_gap_max: Profiled::new(&[0.8, 1.2]),
            x_weight: 1.0,
            y_weight: 1.0,
            source_coeff: 4.0,
            target_coeff: 10.0,
            min_grade: 0.1,
        }
    }

    fn flag_stem() -> Self {
        Self {
            x_in_gap_max: Profiled::new(&[0.3, 0.4]),
            x_out_gap_max: Profiled::new(&[0.3, 0.45]),
            y_gap_max: Profiled::new(&[0.5, 0.75]),
            x_weight: 1.0,
            y_weight: 1.0,
            source_coeff: 3.0,
            target_coeff: 3.0,
            min_grade: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BeamConstants {
    /// Minimum width of a beam after snapping on a stem
    pub min_beam_width: f64,
    /// Portion of head height ignored when anchoring a stem
    pub anchor_height_ratio: f64,
}

impl Default for BeamConstants {
    fn default() -> Self {
        Self {
            min_beam_width: 0.5,
            anchor_height_ratio: 0.275,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyConstants {
    /// Maximum pitch difference between an item and its theoretical position
    pub max_pitch_diff: f64,
    /// Minimum abscissa gap between a one-item key and the next head
    pub min_x_gap_to_head: f64,
    /// Maximum abscissa gap between two consecutive items
    pub max_internal_x_gap: f64,
    /// Overlap ratio (IoU) above which two candidates compete
    pub min_overlap_iou: f64,
    /// Highest absolute pitch for a key item
    pub max_abs_pitch: f64,
}

impl Default for KeyConstants {
    fn default() -> Self {
        Self {
            max_pitch_diff: 0.5,
            min_x_gap_to_head: 1.5,
            max_internal_x_gap: 0.5,
            min_overlap_iou: 0.4,
            max_abs_pitch: 5.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlurConstants {
    pub coverage_h_ext: f64,
    pub coverage_h_in: f64,
    pub coverage_h_depth: f64,
    pub coverage_v_ext: f64,
    pub coverage_v_in: f64,
    pub coverage_v_depth: f64,
    pub coverage_v_depth_small: f64,
    pub max_small_slur_width: f64,
    /// Slurs flatter than this use horizontal coverage
    pub max_horizontal_slope: f64,
    /// Slurs wider than this use horizontal coverage
    pub min_horizontal_width: f64,
    /// Extension of the slur end beyond its last point, looking for heads
    pub target_extension: f64,
    pub max_orphan_slope: f64,
    /// Maximum distance from an orphan end to its staff end
    pub max_orphan_dx: f64,
    /// Maximum invasion of a tie box by a foreign chord
    pub max_tie_invasion: f64,
    /// Maximum pitch delta between two extensions
    pub max_delta_y: f64,
}

impl Default for SlurConstants {
    fn default() -> Self {
        Self {
            coverage_h_ext: 1.25,
            coverage_h_in: 0.5,
            coverage_h_depth: 3.0,
            coverage_v_ext: 2.0,
            coverage_v_in: 1.5,
            coverage_v_depth: 2.5,
            coverage_v_depth_small: 1.5,
            max_small_slur_width: 1.5,
            max_horizontal_slope: 0.5,
            min_horizontal_width: 6.0,
            target_extension: 0.5,
            max_orphan_slope: 0.5,
            max_orphan_dx: 6.0,
            max_tie_invasion: 0.25,
            max_delta_y: 4.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TremoloConstants {
    pub width: f64,
    pub width_margin: f64,
    pub slope: f64,
    /// Maximum abscissa distance between tremolo center and stem
    pub center_dx_max: Profiled,
    pub y_gap_max: Profiled,
    pub min_grade: f64,
}

impl Default for TremoloConstants {
    fn default() -> Self {
        Self {
            width: 1.35,
            width_margin: 0.25,
            slope: -0.31,
            center_dx_max: Profiled::new(&[0.3, 0.5]),
            y_gap_max: Profiled::new(&[0.5, 0.8]),
            min_grade: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndingConstants {
    /// Maximum abscissa shift between a leg and its barline
    pub max_bar_shift: Profiled,
    /// Line thickness in pixels when none was measured
    pub default_thickness: f64,
    pub min_grade: f64,
}

impl Default for EndingConstants {
    fn default() -> Self {
        Self {
            max_bar_shift: Profiled::new(&[2.0, 2.5]),
            default_thickness: 2.0,
            min_grade: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OctaveShiftConstants {
    /// Minimum vertical gap between shift line and staff
    pub min_gap_from_staff: f64,
    /// Length of the closing hook
    pub hook_length: f64,
}

impl Default for OctaveShiftConstants {
    fn default() -> Self {
        Self {
            min_gap_from_staff: 2.0,
            hook_length: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WedgeConstants {
    /// Abscissa margin used when a wedge end falls outside any measure stack
    pub stack_abscissa_margin: f64,
}

impl Default for WedgeConstants {
    fn default() -> Self {
        Self {
            stack_abscissa_margin: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetronomeConstants {
    /// Number of classifier evaluations inspected for the beat unit
    pub max_evaluation_rank: usize,
    /// Minimum classifier grade for a beat-unit evaluation
    pub min_grade: f64,
}

impl Default for MetronomeConstants {
    fn default() -> Self {
        Self {
            max_evaluation_rank: 3,
            min_grade: 0.1,
        }
    }
}

/// All tunable constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Constants {
    pub beam_stem: ConnectionConstants,
    pub head_stem: ConnectionConstants,
    pub flag_stem: ConnectionConstants,
    pub beam: BeamConstants,
    pub key: KeyConstants,
    pub slur: SlurConstants,
    pub tremolo: TremoloConstants,
    pub ending: EndingConstants,
    pub octave_shift: OctaveShiftConstants,
    pub wedge: WedgeConstants,
    pub metronome: MetronomeConstants,
}

impl Default for Constants {
    fn default() -> Self {
        Self {
            beam_stem: ConnectionConstants::beam_stem(),
            head_stem: ConnectionConstants::head_stem(),
            flag_stem: ConnectionConstants::flag_stem(),
            beam: BeamConstants::default(),
            key: KeyConstants::default(),
            slur: SlurConstants::default(),
            tremolo: TremoloConstants::default(),
            ending: EndingConstants::default(),
            octave_shift: OctaveShiftConstants::default(),
            wedge: WedgeConstants::default(),
            metronome: MetronomeConstants::default(),
        }
    }
}

impl Constants {
    /// Load constants from YAML, absent keys keep their default value
    ///
    /// # Errors
    /// Returns `InterError::Config` when the document is not valid YAML for
    /// this structure, or when a profiled list is empty.
    pub fn from_yaml(content: &str) -> Result<Constants, InterError> {
        if content.trim().is_empty() {
            return Ok(Constants::default());
        }
        let constants: Constants = serde_yaml::from_str(content)?;
        constants.check()?;
        Ok(constants)
    }

    pub fn to_yaml(&self) -> Result<String, InterError> {
        Ok(serde_yaml::to_string(self)?)
    }

    fn check(&self) -> Result<(), InterError> {
        let profiled = [
            ("beam_stem.x_in_gap_max", &self.beam_stem.x_in_gap_max),
            ("beam_stem.x_out_gap_max", &self.beam_stem.x_out_gap_max),
            ("beam_stem.y_gap_max", &self.beam_stem.y_gap_max),
            ("head_stem.x_in_gap_max", &self.head_stem.x_in_gap_max),
            ("head_stem.x_out_gap_max", &self.head_stem.x_out_gap_max),
            ("head_stem.y_gap_max", &self.head_stem.y_gap_max),
            ("flag_stem.x_in_gap_max", &self.flag_stem.x_in_gap_max),
            ("flag_stem.x_out_gap_max", &self.flag_stem.x_out_gap_max),
            ("flag_stem.y_gap_max", &self.flag_stem.y_gap_max),
            ("tremolo.center_dx_max", &self.tremolo.center_dx_max),
            ("tremolo.y_gap_max", &self.tremolo.y_gap_max),
            ("ending.max_bar_shift", &self.ending.max_bar_shift),
        ];
        for (name, values) in profiled {
            if values.0.is_empty() {
                return Err(InterError::Config(format!("{} needs at least one value", name)));
            }
            if values.0.iter().any(|v| *v < 0.0) {
                return Err(InterError::Config(format!("{} cannot be negative", name)));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profiled_fallback_to_highest_level() {
        let p = Profiled::new(&[0.15, 0.25, 0.35]);
        assert_eq!(p.at(0), 0.15);
        assert_eq!(p.at(2), 0.35);
        assert_eq!(p.at(7), 0.35);
    }

    #[test]
    fn test_head_stem_profiles() {
        let c = Constants::default();
        assert_eq!(c.head_stem.x_in_gap_max.at(1), 0.4);
        assert_eq!(c.head_stem.y_gap_max.at(2), 1.2);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let c = Constants::from_yaml("key:\n  max_pitch_diff: 0.75\n").unwrap();
        assert_eq!(c.key.max_pitch_diff, 0.75);
        assert_eq!(c.key.min_overlap_iou, 0.4);
        assert_eq!(c.slur, SlurConstants::default());
    }

    #[test]
    fn test_empty_profiled_rejected() {
        let result = Constants::from_yaml("ending:\n  max_bar_shift: []\n");
        assert!(result.is_err());
        if let Err(InterError::Config(msg)) = result {
            assert!(msg.contains("ending.max_bar_shift"));
        }
    }

    #[test]
    fn test_yaml_dump_reloads() {
        let yaml = defaults().to_yaml().unwrap();
        assert_eq!(&Constants::from_yaml(&yaml).unwrap(), defaults());
    }

    #[test]
    fn test_invalid_yaml() {
        assert!(Constants::from_yaml("key: [").is_err());
    }
}
