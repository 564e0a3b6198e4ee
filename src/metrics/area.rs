//! Error statistics for the per-image area estimate (px²).

use serde::{Deserialize, Serialize};

/// MAE, RMSE and MAPE over the area-scored images.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AreaErrors {
    pub mae: f64,
    pub rmse: f64,
    /// Mean absolute percentage error over images with a non-zero ground truth area.
    pub mape: f64,
    /// Images that entered MAE/RMSE.
    pub count: usize,
}

/// Whether an image takes part in area scoring.
///
/// Images where both areas are exactly zero are true negatives with a trivial
/// zero error and are left out.
pub fn needs_area_scoring(area_gt: f64, area_pred: f64) -> bool {
    area_gt > 0.0 || area_pred > 0.0
}

/// Compute area errors over `(ground_truth, predicted)` pairs.
///
/// Pairs failing [`needs_area_scoring`] are skipped. MAPE averages only the
/// pairs with a ground truth area above zero. A mean over no values is NaN.
///
/// # Examples
///
/// ```
/// # use pv_eval::metrics::calculate_area_errors;
/// let errors = calculate_area_errors([(100.0, 90.0), (0.0, 0.0), (200.0, 0.0)]);
/// assert_eq!(errors.count, 2);
/// assert!((errors.mae - 105.0).abs() < 1e-9);
/// assert!((errors.mape - 55.0).abs() < 1e-9);
/// ```
pub fn calculate_area_errors<I>(pairs: I) -> AreaErrors
where
    I: IntoIterator<Item = (f64, f64)>,
{
    let mut count = 0usize;
    let mut abs_sum = 0.0;
    let mut sq_sum = 0.0;
    let mut pct_count = 0usize;
    let mut pct_sum = 0.0;

    for (gt, pred) in pairs {
        if !needs_area_scoring(gt, pred) {
            continue;
        }
        let abs_err = (pred - gt).abs();
        count += 1;
        abs_sum += abs_err;
        sq_sum += abs_err * abs_err;

        if gt != 0.0 {
            pct_count += 1;
            pct_sum += abs_err / gt * 100.0;
        }
    }

    AreaErrors {
        mae: mean(abs_sum, count),
        rmse: mean(sq_sum, count).sqrt(),
        mape: mean(pct_sum, pct_count),
        count,
    }
}

#[allow(clippy::cast_precision_loss)]
fn mean(sum: f64, count: usize) -> f64 {
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}
