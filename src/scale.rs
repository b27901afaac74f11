//! # Scale Module
//!
//! Converts between pixel distances and interline fractions.
//!
//! ## Purpose
//! Every threshold used by the scorers is expressed in staff-relative units
//! (a fraction of the distance between two staff lines) so that the same
//! constants work for any scan resolution. The scale of a sheet is its
//! interline, measured once during staff detection.
//!
//! ## Example
//! ```rust
//! use omr_inter::scale::Scale;
//!
//! let scale = Scale::new(20.0);
//! assert_eq!(scale.to_pixels(0.5), 10);
//! assert_eq!(scale.pixels_to_frac(5.0), 0.25);
//! ```

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scale {
    interline: f64,
}

impl Scale {
    /// Create a scale, a non-positive interline is clamped to 1 pixel
    pub fn new(interline: f64) -> Self {
        Self {
            interline: if interline > 0.0 { interline } else { 1.0 },
        }
    }

    pub fn interline(&self) -> f64 {
        self.interline
    }

    /// Fraction to pixels, rounded half to even
    pub fn to_pixels(&self, frac: f64) -> i32 {
        (frac * self.interline).round_ties_even() as i32
    }

    /// Fraction to pixels without rounding
    pub fn to_pixels_f(&self, frac: f64) -> f64 {
        frac * self.interline
    }

    pub fn pixels_to_frac(&self, pixels: f64) -> f64 {
        pixels / self.interline
    }
}

impl Default for Scale {
    fn default() -> Self {
        Self::new(20.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_pixels_rounding() {
        let scale = Scale::new(10.0);
        assert_eq!(scale.to_pixels(0.25), 2);
        assert_eq!(scale.to_pixels(0.75), 8);
        assert_eq!(scale.to_pixels(1.2), 12);
    }

    #[test]
    fn test_roundtrip_fraction() {
        let scale = Scale::new(16.0);
        assert_eq!(scale.pixels_to_frac(scale.to_pixels_f(0.75)), 0.75);
    }

    #[test]
    fn test_invalid_interline_clamped() {
        assert_eq!(Scale::new(0.0).interline(), 1.0);
    }
}
