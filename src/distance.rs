//! Pairwise distances.
//!
//! | Metric | Formula |
//! |--------|---------|
//! | Euclidean | √Σ(aᵢ - bᵢ)² |
//! | Manhattan | Σ\|aᵢ - bᵢ\| |
//! | Cosine | 1 - a·b / (‖a‖‖b‖) |
//!
//! Cosine with a zero-norm vector: two zero vectors are at distance 0, a
//! zero vector and a non-zero vector are at distance 1.
//!
//! The full matrix is built once per run (O(n²·d)) and shared by the
//! clusterer and the evaluator.

use core::fmt;
use core::str::FromStr;
use std::collections::HashMap;

use ndarray::{Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Distance metric between feature vectors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// L2 distance.
    #[default]
    Euclidean,
    /// L1 distance.
    Manhattan,
    /// One minus cosine similarity.
    Cosine,
}

impl DistanceMetric {
    /// All supported metrics.
    pub const ALL: &'static [DistanceMetric] = &[
        DistanceMetric::Euclidean,
        DistanceMetric::Manhattan,
        DistanceMetric::Cosine,
    ];

    /// Snake-case name.
    pub fn name(self) -> &'static str {
        match self {
            DistanceMetric::Euclidean => "euclidean",
            DistanceMetric::Manhattan => "manhattan",
            DistanceMetric::Cosine => "cosine",
        }
    }

    /// Distance between two equal-length vectors.
    ///
    /// May return NaN if an input holds NaN; [`DistanceMatrix::build`]
    /// rejects that.
    #[inline]
    pub fn distance(self, a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
        match self {
            DistanceMetric::Euclidean => a
                .iter()
                .zip(b.iter())
                .map(|(x, y)| (x - y) * (x - y))
                .sum::<f64>()
                .sqrt(),
            DistanceMetric::Manhattan => a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).sum(),
            DistanceMetric::Cosine => {
                let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
                let na = a.dot(&a).sqrt();
                let nb = b.dot(&b).sqrt();
                if !(dot.is_finite() && na.is_finite() && nb.is_finite()) {
                    return f64::NAN;
                }
                match (na > 0.0, nb > 0.0) {
                    (false, false) => 0.0,
                    (true, false) | (false, true) => 1.0,
                    // Rounding can push similarity past ±1.
                    (true, true) => (1.0 - dot / (na * nb)).clamp(0.0, 2.0),
                }
            }
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DistanceMetric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        DistanceMetric::ALL
            .iter()
            .copied()
            .find(|m| m.name() == s)
            .ok_or_else(|| Error::unknown("distance metric", s))
    }
}

/// Symmetric n×n distance matrix with zero diagonal.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceMatrix {
    metric: DistanceMetric,
    data: Array2<f64>,
}

impl DistanceMatrix {
    /// Compute all pairwise distances between the rows of `points`.
    ///
    /// Fails with [`Error::NonFiniteDistance`] if any distance is NaN or
    /// infinite.
    pub fn build(points: ArrayView2<'_, f64>, metric: DistanceMetric) -> Result<Self> {
        let n = points.nrows();

        let row_distances = |i: usize| -> Vec<f64> {
            ((i + 1)..n)
                .map(|j| metric.distance(points.row(i), points.row(j)))
                .collect()
        };

        #[cfg(feature = "parallel")]
        let upper: Vec<Vec<f64>> = (0..n).into_par_iter().map(row_distances).collect();
        #[cfg(not(feature = "parallel"))]
        let upper: Vec<Vec<f64>> = (0..n).map(row_distances).collect();

        let mut data = Array2::zeros((n, n));
        for (i, row) in upper.into_iter().enumerate() {
            for (offset, d) in row.into_iter().enumerate() {
                let j = i + 1 + offset;
                if !d.is_finite() {
                    return Err(Error::NonFiniteDistance { i, j });
                }
                data[[i, j]] = d;
                data[[j, i]] = d;
            }
        }

        Ok(Self { metric, data })
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.data.nrows()
    }

    /// True when built from zero points.
    pub fn is_empty(&self) -> bool {
        self.data.nrows() == 0
    }

    /// Metric the matrix was built with.
    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Distance between points `i` and `j`.
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[[i, j]]
    }

    /// Borrow the underlying matrix.
    pub fn view(&self) -> ArrayView2<'_, f64> {
        self.data.view()
    }

    /// Largest pairwise distance.
    pub fn max(&self) -> f64 {
        self.data.iter().copied().fold(0.0, f64::max)
    }

    /// Mean distance over all unordered pairs drawn from `members`.
    ///
    /// 0 for fewer than two members.
    pub fn mean_pairwise(&self, members: &[usize]) -> f64 {
        let m = members.len();
        if m < 2 {
            return 0.0;
        }
        let mut total = 0.0;
        for (a, &i) in members.iter().enumerate() {
            for &j in &members[(a + 1)..] {
                total += self.data[[i, j]];
            }
        }
        total / (m * (m - 1) / 2) as f64
    }
}

/// Distance matrices over one point set, built once per metric.
#[derive(Debug, Clone)]
pub(crate) struct DistanceCache<'a> {
    points: ArrayView2<'a, f64>,
    built: HashMap<DistanceMetric, Result<DistanceMatrix>>,
}

impl<'a> DistanceCache<'a> {
    pub(crate) fn new(points: ArrayView2<'a, f64>) -> Self {
        Self {
            points,
            built: HashMap::new(),
        }
    }

    /// Matrix for `metric`, built on first request. A failed build is
    /// remembered and returned again.
    pub(crate) fn get(&mut self, metric: DistanceMetric) -> Result<&DistanceMatrix> {
        let points = self.points;
        self.built
            .entry(metric)
            .or_insert_with(|| DistanceMatrix::build(points, metric))
            .as_ref()
            .map_err(Clone::clone)
    }

    /// Matrix for `metric` if [`get`](Self::get) already built it.
    pub(crate) fn built(&self, metric: DistanceMetric) -> Result<&DistanceMatrix> {
        match self.built.get(&metric) {
            Some(r) => r.as_ref().map_err(Clone::clone),
            None => Err(Error::invalid_parameter(
                "metric",
                format!("no {metric} distance matrix was built"),
            )),
        }
    }
}
