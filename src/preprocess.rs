//! Column standardization.
//!
//! Distance-based clustering is sensitive to feature scale, so columns are
//! z-scored before distances are computed:
//!
//! ```text
//! x' = (x - μ) / σ        (σ = population standard deviation)
//! ```
//!
//! Constant columns (σ = 0) map to 0.

use ndarray::{Array2, ArrayView2, Axis};

/// Z-score every column of `matrix`.
///
/// Returns an empty matrix of the same shape for empty input.
pub fn standardize(matrix: ArrayView2<'_, f64>) -> Array2<f64> {
    let mut out = matrix.to_owned();
    if matrix.nrows() == 0 {
        return out;
    }

    let n = matrix.nrows() as f64;
    for mut col in out.axis_iter_mut(Axis(1)) {
        let mean = col.sum() / n;
        let var = col.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
        let std = var.sqrt();
        if std > f64::EPSILON && std.is_finite() {
            col.mapv_inplace(|x| (x - mean) / std);
        } else {
            col.fill(0.0);
        }
    }
    out
}
