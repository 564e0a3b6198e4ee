//! Binary classification metrics for the image-level "contains solar" label.
//!
//! All ratios add [`EPSILON`] to their denominator, so a class that is absent
//! from the evaluation set yields 0.0 instead of a division by zero.

use serde::{Deserialize, Serialize};

/// Additive denominator term shared by every ratio in this module.
pub const EPSILON: f64 = 1e-9;

/// 2x2 confusion matrix of ground truth label against predicted label.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub tp: usize,
    pub fp: usize,
    #[serde(rename = "fn")]
    pub fn_: usize,
    pub tn: usize,
}

impl ConfusionMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one image.
    pub fn record(&mut self, actual: bool, predicted: bool) {
        match (actual, predicted) {
            (true, true) => self.tp += 1,
            (false, true) => self.fp += 1,
            (true, false) => self.fn_ += 1,
            (false, false) => self.tn += 1,
        }
    }

    /// Build a matrix from (actual, predicted) pairs.
    ///
    /// # Examples
    ///
    /// ```
    /// # use pv_eval::metrics::ConfusionMatrix;
    /// let cm = ConfusionMatrix::from_labels([(true, true), (false, false), (true, false)]);
    /// assert_eq!((cm.tp, cm.tn, cm.fn_, cm.fp), (1, 1, 1, 0));
    /// ```
    pub fn from_labels<I>(labels: I) -> Self
    where
        I: IntoIterator<Item = (bool, bool)>,
    {
        let mut cm = Self::new();
        for (actual, predicted) in labels {
            cm.record(actual, predicted);
        }
        cm
    }

    pub fn total(&self) -> usize {
        self.tp + self.fp + self.fn_ + self.tn
    }

    pub fn precision(&self) -> f64 {
        calculate_precision(self.tp, self.fp)
    }

    pub fn recall(&self) -> f64 {
        calculate_recall(self.tp, self.fn_)
    }

    pub fn f1(&self) -> f64 {
        calculate_f1(self.precision(), self.recall())
    }

    pub fn accuracy(&self) -> f64 {
        calculate_accuracy(self.tp, self.tn, self.total())
    }
}

/// Precision = TP / (TP + FP + ε)
///
/// # Examples
///
/// ```
/// # use pv_eval::metrics::calculate_precision;
/// let precision = calculate_precision(80, 20);
/// assert!((precision - 0.8).abs() < 1e-9);
/// assert_eq!(calculate_precision(0, 0), 0.0);
/// ```
#[must_use]
pub fn calculate_precision(tp: usize, fp: usize) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let precision = tp as f64 / ((tp + fp) as f64 + EPSILON);

    debug_assert!(
        (0.0..=1.0).contains(&precision),
        "Precision must be between 0 and 1, got {precision}"
    );

    precision
}

/// Recall = TP / (TP + FN + ε)
///
/// # Examples
///
/// ```
/// # use pv_eval::metrics::calculate_recall;
/// let recall = calculate_recall(80, 20);
/// assert!((recall - 0.8).abs() < 1e-9);
/// ```
#[must_use]
pub fn calculate_recall(tp: usize, fn_: usize) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let recall = tp as f64 / ((tp + fn_) as f64 + EPSILON);

    debug_assert!(
        (0.0..=1.0).contains(&recall),
        "Recall must be between 0 and 1, got {recall}"
    );

    recall
}

/// F1 = 2PR / (P + R + ε)
///
/// # Examples
///
/// ```
/// # use pv_eval::metrics::calculate_f1;
/// let f1 = calculate_f1(0.8, 0.9);
/// assert!((f1 - 0.847).abs() < 0.001);
/// assert_eq!(calculate_f1(0.0, 0.0), 0.0);
/// ```
#[must_use]
pub fn calculate_f1(precision: f64, recall: f64) -> f64 {
    2.0 * precision * recall / (precision + recall + EPSILON)
}

/// Accuracy = (TP + TN) / (total + ε)
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn calculate_accuracy(tp: usize, tn: usize, total: usize) -> f64 {
    (tp + tn) as f64 / (total as f64 + EPSILON)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_all_cells() {
        let cm = ConfusionMatrix::from_labels([
            (true, true),
            (true, true),
            (false, true),
            (true, false),
            (false, false),
        ]);
        assert_eq!(cm, ConfusionMatrix { tp: 2, fp: 1, fn_: 1, tn: 1 });
        assert_eq!(cm.total(), 5);
    }

    #[test]
    fn test_ratios() {
        let cm = ConfusionMatrix { tp: 8, fp: 2, fn_: 3, tn: 7 };
        assert!((cm.precision() - 0.8).abs() < 1e-6);
        assert!((cm.recall() - 8.0 / 11.0).abs() < 1e-6);
        assert!((cm.accuracy() - 0.75).abs() < 1e-6);
        assert!((cm.f1() - 0.7619).abs() < 1e-3);
    }

    #[test]
    fn test_all_negative_set() {
        let cm = ConfusionMatrix::from_labels([(false, false); 4]);
        assert_eq!(cm.precision(), 0.0);
        assert_eq!(cm.recall(), 0.0);
        assert_eq!(cm.f1(), 0.0);
        assert!((cm.accuracy() - 1.0).abs() < 1e-6);
        assert!(cm.accuracy() <= 1.0);
    }

    #[test]
    fn test_all_positive_set() {
        let cm = ConfusionMatrix::from_labels([(true, true); 4]);
        assert!(cm.precision() <= 1.0 && cm.precision() > 0.999);
        assert!(cm.recall() <= 1.0 && cm.recall() > 0.999);
        assert!(cm.f1() <= 1.0 && cm.f1() > 0.999);
    }

    #[test]
    fn test_empty_matrix() {
        let cm = ConfusionMatrix::new();
        assert_eq!(cm.accuracy(), 0.0);
        assert_eq!(cm.f1(), 0.0);
    }
}
