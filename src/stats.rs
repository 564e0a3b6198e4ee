//! Statistics tracking for prediction collection
//!
//! Counts what happened to every image sent to the inference service so the
//! operator can see how many images were silently excluded from scoring.

use serde::{Deserialize, Serialize};

/// Statistics collected during a prediction collection run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionStats {
    /// Images sent to the inference service
    pub images_attempted: usize,

    /// Images whose inference call failed and were skipped
    pub images_failed: usize,

    /// Images with at least one kept prediction
    pub images_with_predictions: usize,

    /// Predictions kept after confidence filtering
    pub total_predictions: usize,

    /// Predictions dropped by the confidence threshold
    pub below_threshold: usize,
}

impl CollectionStats {
    /// Create a new `CollectionStats` with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Count an image sent for inference
    pub fn add_image(&mut self) {
        self.images_attempted += 1;
    }

    /// Record a failed inference call
    pub fn record_failure(&mut self) {
        self.images_failed += 1;
    }

    /// Record the outcome of a successful call
    pub fn record_predictions(&mut self, kept: usize, dropped: usize) {
        self.total_predictions += kept;
        self.below_threshold += dropped;
        if kept > 0 {
            self.images_with_predictions += 1;
        }
    }

    /// Images that produced a prediction row
    pub fn images_succeeded(&self) -> usize {
        self.images_attempted.saturating_sub(self.images_failed)
    }

    /// Print a summary of the statistics to stdout
    pub fn print_summary(&self) {
        println!("\n=== Inference Statistics ===");
        println!("Images attempted: {}", self.images_attempted);
        println!("Images succeeded: {}", self.images_succeeded());
        println!("Images failed: {}", self.images_failed);
        println!("Images with predictions: {}", self.images_with_predictions);
        println!("Predictions kept: {}", self.total_predictions);
        println!("Predictions below threshold: {}", self.below_threshold);
        println!("============================\n");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_stats_are_zero() {
        let stats = CollectionStats::new();
        assert_eq!(stats.images_attempted, 0);
        assert_eq!(stats.images_succeeded(), 0);
    }

    #[test]
    fn test_counters() {
        let mut stats = CollectionStats::new();
        stats.add_image();
        stats.add_image();
        stats.add_image();
        stats.record_failure();
        stats.record_predictions(2, 1);
        stats.record_predictions(0, 0);

        assert_eq!(stats.images_succeeded(), 2);
        assert_eq!(stats.images_with_predictions, 1);
        assert_eq!(stats.total_predictions, 2);
        assert_eq!(stats.below_threshold, 1);
    }
}
