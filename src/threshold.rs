//! Confidence score thresholding utilities.

use crate::error::{PvEvalError, Result};
use crate::inference::Prediction;

/// Filter predictions by confidence score threshold.
///
/// # Arguments
///
/// * `predictions` - Predictions returned for one image
/// * `threshold` - Minimum confidence score (0.0 to 1.0)
///
/// # Returns
///
/// Returns a new vector containing only predictions with confidence >= threshold.
///
/// # Errors
///
/// Returns an error if the threshold is not in the valid range [0.0, 1.0].
///
/// # Example
///
/// ```
/// use pv_eval::inference::Prediction;
/// use pv_eval::threshold::filter_by_confidence;
///
/// let predictions = vec![
///     Prediction::new(0.9, 10.0, 10.0),
///     Prediction::new(0.3, 4.0, 4.0),
/// ];
///
/// let filtered = filter_by_confidence(&predictions, 0.5).unwrap();
/// assert_eq!(filtered.len(), 1);
/// ```
pub fn filter_by_confidence(predictions: &[Prediction], threshold: f64) -> Result<Vec<Prediction>> {
    validate_threshold(threshold)?;

    Ok(predictions
        .iter()
        .filter(|p| p.confidence >= threshold)
        .cloned()
        .collect())
}

/// Validate that a threshold is in the valid range [0.0, 1.0].
pub fn validate_threshold(threshold: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(PvEvalError::InvalidThreshold(format!(
            "Threshold must be between 0.0 and 1.0, got {}",
            threshold
        )));
    }
    Ok(())
}
