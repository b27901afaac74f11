//! Narrow interface to the shape classifier.
//!
//! Only the metronome beat-unit recognizer uses it: OCR reads music glyphs
//! as ordinary letters, so the pixels under the note characters are
//! submitted to the classifier instead.

use serde::{Deserialize, Serialize};

use crate::geom::Rect;
use crate::shape::Shape;

/// Pixel region handed to the classifier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Glyph {
    pub id: u32,
    pub bounds: Rect,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub shape: Shape,
    pub grade: f64,
}

pub trait ShapeClassifier {
    /// Best evaluations for a glyph, sorted by decreasing grade
    fn evaluate(&self, glyph: &Glyph, top_n: usize, min_grade: f64) -> Vec<Evaluation>;
}

/// Classifier answering from a fixed table, keyed by glyph id
///
/// Useful when evaluations were computed upstream and only need replaying.
#[derive(Debug, Clone, Default)]
pub struct TableClassifier {
    entries: Vec<(u32, Evaluation)>,
}

impl TableClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, glyph: u32, shape: Shape, grade: f64) -> Self {
        self.entries.push((glyph, Evaluation { shape, grade }));
        self
    }
}

impl ShapeClassifier for TableClassifier {
    fn evaluate(&self, glyph: &Glyph, top_n: usize, min_grade: f64) -> Vec<Evaluation> {
        let mut evals: Vec<Evaluation> = self
            .entries
            .iter()
            .filter(|(id, e)| *id == glyph.id && e.grade >= min_grade)
            .map(|(_, e)| *e)
            .collect();
        evals.sort_by(|a, b| b.grade.total_cmp(&a.grade));
        evals.truncate(top_n);
        evals
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_classifier_ranks_and_filters() {
        let classifier = TableClassifier::new()
            .with(7, Shape::NoteheadBlack, 0.6)
            .with(7, Shape::MetroQuarter, 0.9)
            .with(7, Shape::Sharp, 0.05)
            .with(8, Shape::MetroHalf, 0.9);
        let glyph = Glyph {
            id: 7,
            bounds: Rect::new(0.0, 0.0, 10.0, 20.0),
        };
        let evals = classifier.evaluate(&glyph, 3, 0.1);
        assert_eq!(evals.len(), 2);
        assert_eq!(evals[0].shape, Shape::MetroQuarter);
        assert_eq!(classifier.evaluate(&glyph, 1, 0.1).len(), 1);
    }
}
