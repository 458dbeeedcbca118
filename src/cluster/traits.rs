//! Clustering traits.

use ndarray::ArrayView2;

use crate::distance::DistanceMatrix;
use crate::error::Result;

/// Trait for hard clustering over a precomputed distance matrix.
pub trait Clustering {
    /// Fit the model and return cluster assignments.
    ///
    /// Returns one label per row of `data`; `distances` must have been
    /// built from the same rows.
    fn fit_predict(&self, data: ArrayView2<'_, f64>, distances: &DistanceMatrix) -> Result<Vec<usize>>;

    /// Get the requested number of clusters.
    fn n_clusters(&self) -> usize;
}
