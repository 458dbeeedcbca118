//! Internal cluster-validity metrics.
//!
//! Measures for assessing a partition without ground-truth labels.
//!
//! | Metric | Range | Best |
//! |--------|-------|------|
//! | [`silhouette_score`] | [-1, 1] | 1 |
//! | [`davies_bouldin_index`] | [0, ∞) | 0 |
//! | [`calinski_harabasz_index`] | [0, ∞) | higher |
//!
//! Every division by zero is replaced by a neutral 0 so no NaN escapes into
//! a result. When all points coincide the partition is flagged
//! `degenerate` and rated [`QualityTier::Poor`].
//!
//! # References
//!
//! - Rousseeuw (1987). "Silhouettes: a graphical aid to the interpretation
//!   and validation of cluster analysis"
//! - Davies & Bouldin (1979). "A cluster separation measure"
//! - Caliński & Harabasz (1974). "A dendrite method for cluster analysis"

use core::fmt;

use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::distance::{DistanceMatrix, DistanceMetric};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Coarse quality rating derived from the silhouette score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityTier {
    /// silhouette < 0.25, or degenerate data.
    Poor,
    /// silhouette ≥ 0.25.
    Fair,
    /// silhouette ≥ 0.5.
    Good,
    /// silhouette ≥ 0.7.
    Excellent,
}

impl QualityTier {
    /// Tier for a silhouette score.
    pub fn from_silhouette(score: f64) -> Self {
        if score >= 0.7 {
            QualityTier::Excellent
        } else if score >= 0.5 {
            QualityTier::Good
        } else if score >= 0.25 {
            QualityTier::Fair
        } else {
            QualityTier::Poor
        }
    }

    /// Snake-case name.
    pub fn name(self) -> &'static str {
        match self {
            QualityTier::Poor => "poor",
            QualityTier::Fair => "fair",
            QualityTier::Good => "good",
            QualityTier::Excellent => "excellent",
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// All quality signals for one partition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    /// Mean silhouette in [-1, 1].
    pub silhouette: f64,
    /// Davies–Bouldin index, ≥ 0, lower is better. 0 with one cluster.
    pub davies_bouldin: f64,
    /// Calinski–Harabasz index, ≥ 0. 0 when k ≤ 1 or k ≥ n.
    pub calinski_harabasz: f64,
    /// Rating from the silhouette, forced to `Poor` when degenerate.
    pub tier: QualityTier,
    /// Every pairwise distance was zero.
    pub degenerate: bool,
}

/// Group point indices by label. `labels` must be in `0..k`.
pub fn cluster_members(labels: &[usize]) -> Vec<Vec<usize>> {
    let k = labels.iter().max().map_or(0, |&m| m + 1);
    let mut members = vec![Vec::new(); k];
    for (i, &l) in labels.iter().enumerate() {
        members[l].push(i);
    }
    members
}

/// Mean row of each member group.
pub fn centroids(data: ArrayView2<'_, f64>, members: &[Vec<usize>]) -> Array2<f64> {
    let mut out = Array2::zeros((members.len(), data.ncols()));
    for (c, idx) in members.iter().enumerate() {
        if idx.is_empty() {
            continue;
        }
        let mut row = out.row_mut(c);
        for &i in idx {
            row += &data.row(i);
        }
        row /= idx.len() as f64;
    }
    out
}

/// Mean silhouette over all points.
///
/// For point i with cluster C:
///
/// ```text
/// a(i) = mean d(i, j), j ∈ C, j ≠ i
/// b(i) = min over C' ≠ C of mean d(i, j), j ∈ C'
/// s(i) = (b - a) / max(a, b)          (0 if max(a, b) = 0)
/// ```
///
/// A point alone in its cluster contributes `s(i) = 0`. Fewer than two
/// clusters or two points give 0.
pub fn silhouette_score(distances: &DistanceMatrix, labels: &[usize]) -> f64 {
    let n = labels.len();
    let members = cluster_members(labels);
    let k = members.iter().filter(|m| !m.is_empty()).count();
    if n < 2 || k < 2 {
        return 0.0;
    }

    let point_score = |i: usize| -> f64 {
        let own = labels[i];
        if members[own].len() < 2 {
            return 0.0;
        }
        let mean_to = |group: &[usize]| -> f64 {
            let (sum, count) = group
                .iter()
                .filter(|&&j| j != i)
                .fold((0.0, 0usize), |(s, c), &j| (s + distances.get(i, j), c + 1));
            if count == 0 {
                0.0
            } else {
                sum / count as f64
            }
        };
        let a = mean_to(&members[own]);
        let b = members
            .iter()
            .enumerate()
            .filter(|(c, group)| *c != own && !group.is_empty())
            .map(|(_, group)| mean_to(group))
            .fold(f64::INFINITY, f64::min);
        let denom = a.max(b);
        if denom > 0.0 && denom.is_finite() {
            (b - a) / denom
        } else {
            0.0
        }
    };

    // Summed in point order so results do not depend on thread scheduling.
    #[cfg(feature = "parallel")]
    let scores: Vec<f64> = (0..n).into_par_iter().map(point_score).collect();
    #[cfg(not(feature = "parallel"))]
    let scores: Vec<f64> = (0..n).map(point_score).collect();
    let total: f64 = scores.iter().sum();

    (total / n as f64).clamp(-1.0, 1.0)
}

/// Davies–Bouldin index.
///
/// ```text
/// R(i) = max over j ≠ i of (s_i + s_j) / d(c_i, c_j)
/// DB   = mean R(i)
/// ```
///
/// `spread[i]` is cluster i's mean intra-cluster pairwise distance and
/// `d` is `metric` between centroids. Coincident centroids contribute 0.
pub fn davies_bouldin_index(
    centroids: ArrayView2<'_, f64>,
    spread: &[f64],
    metric: DistanceMetric,
) -> f64 {
    let k = centroids.nrows();
    if k < 2 {
        return 0.0;
    }
    let total: f64 = (0..k)
        .map(|i| {
            (0..k)
                .filter(|&j| j != i)
                .map(|j| {
                    let sep = metric.distance(centroids.row(i), centroids.row(j));
                    if sep > 0.0 {
                        (spread[i] + spread[j]) / sep
                    } else {
                        0.0
                    }
                })
                .fold(0.0, f64::max)
        })
        .sum();
    let db = total / k as f64;
    if db.is_finite() {
        db
    } else {
        0.0
    }
}

/// Calinski–Harabasz index.
///
/// ```text
/// CH = (BCSS / (k - 1)) / (WCSS / (n - k))
/// ```
///
/// with squared Euclidean dispersions. Returns the sentinel 0 when
/// `k ≤ 1`, `k ≥ n` or WCSS = 0.
pub fn calinski_harabasz_index(
    data: ArrayView2<'_, f64>,
    labels: &[usize],
    centroids: ArrayView2<'_, f64>,
) -> f64 {
    let n = data.nrows();
    let members = cluster_members(labels);
    let k = members.iter().filter(|m| !m.is_empty()).count();
    if k <= 1 || k >= n {
        return 0.0;
    }

    let overall = data.mean_axis(ndarray::Axis(0));
    let Some(overall) = overall else {
        return 0.0;
    };

    let sq = |a: ndarray::ArrayView1<'_, f64>, b: ndarray::ArrayView1<'_, f64>| -> f64 {
        a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
    };

    let bcss: f64 = members
        .iter()
        .enumerate()
        .map(|(c, idx)| idx.len() as f64 * sq(centroids.row(c), overall.view()))
        .sum();
    let wcss: f64 = labels
        .iter()
        .enumerate()
        .map(|(i, &c)| sq(data.row(i), centroids.row(c)))
        .sum();

    if wcss <= 0.0 {
        return 0.0;
    }
    let ch = (bcss / (k - 1) as f64) / (wcss / (n - k) as f64);
    if ch.is_finite() {
        ch
    } else {
        0.0
    }
}

/// Computes every quality signal for a partition.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClusterEvaluator;

impl ClusterEvaluator {
    /// Create an evaluator.
    pub fn new() -> Self {
        Self
    }

    /// Evaluate `labels` over `data`, reusing the run's distance matrix.
    ///
    /// `spread[c]` is cluster c's mean intra-cluster pairwise distance.
    pub fn evaluate(
        &self,
        data: ArrayView2<'_, f64>,
        distances: &DistanceMatrix,
        labels: &[usize],
        centroids: ArrayView2<'_, f64>,
        spread: &[f64],
    ) -> QualityMetrics {
        let degenerate = distances.len() > 1 && distances.max() <= 0.0;
        if degenerate {
            tracing::warn!(
                n_users = labels.len(),
                "all feature vectors are identical; segmentation is not meaningful"
            );
            return QualityMetrics {
                silhouette: 0.0,
                davies_bouldin: 0.0,
                calinski_harabasz: 0.0,
                tier: QualityTier::Poor,
                degenerate,
            };
        }

        let silhouette = silhouette_score(distances, labels);
        QualityMetrics {
            silhouette,
            davies_bouldin: davies_bouldin_index(centroids, spread, distances.metric()),
            calinski_harabasz: calinski_harabasz_index(data, labels, centroids),
            tier: QualityTier::from_silhouette(silhouette),
            degenerate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};
    use proptest::prelude::*;

    fn two_blobs() -> (Array2<f64>, Vec<usize>) {
        let data = array![
            [0.0, 0.0],
            [0.1, 0.0],
            [0.0, 0.1],
            [5.0, 5.0],
            [5.1, 5.0],
            [5.0, 5.1],
        ];
        (data, vec![0, 0, 0, 1, 1, 1])
    }

    fn evaluate(data: &Array2<f64>, labels: &[usize]) -> QualityMetrics {
        let dm = DistanceMatrix::build(data.view(), DistanceMetric::Euclidean).unwrap();
        let members = cluster_members(labels);
        let c = centroids(data.view(), &members);
        let spread: Vec<f64> = members.iter().map(|m| dm.mean_pairwise(m)).collect();
        ClusterEvaluator::new().evaluate(data.view(), &dm, labels, c.view(), &spread)
    }

    #[test]
    fn tiers() {
        assert_eq!(QualityTier::from_silhouette(0.71), QualityTier::Excellent);
        assert_eq!(QualityTier::from_silhouette(0.7), QualityTier::Excellent);
        assert_eq!(QualityTier::from_silhouette(0.5), QualityTier::Good);
        assert_eq!(QualityTier::from_silhouette(0.3), QualityTier::Fair);
        assert_eq!(QualityTier::from_silhouette(0.1), QualityTier::Poor);
        assert_eq!(QualityTier::from_silhouette(-0.5), QualityTier::Poor);
        assert!(QualityTier::Excellent > QualityTier::Good);
    }

    #[test]
    fn separated_blobs_score_well() {
        let (data, labels) = two_blobs();
        let q = evaluate(&data, &labels);
        assert!(q.silhouette > 0.9, "{q:?}");
        assert_eq!(q.tier, QualityTier::Excellent);
        assert!(q.davies_bouldin > 0.0 && q.davies_bouldin < 0.1);
        assert!(q.calinski_harabasz > 100.0);
        assert!(!q.degenerate);
    }

    #[test]
    fn bad_partition_scores_poorly() {
        let (data, _) = two_blobs();
        let mixed = vec![0, 1, 0, 1, 0, 1];
        let q = evaluate(&data, &mixed);
        assert!(q.silhouette < 0.25, "{q:?}");
        assert_eq!(q.tier, QualityTier::Poor);
    }

    #[test]
    fn single_cluster_is_neutral() {
        let (data, _) = two_blobs();
        let q = evaluate(&data, &[0; 6]);
        assert_eq!(q.silhouette, 0.0);
        assert_eq!(q.davies_bouldin, 0.0);
        assert_eq!(q.calinski_harabasz, 0.0);
    }

    #[test]
    fn singleton_cluster_contributes_zero() {
        let data = array![[0.0], [0.1], [9.0]];
        let dm = DistanceMatrix::build(data.view(), DistanceMetric::Euclidean).unwrap();
        let s = silhouette_score(&dm, &[0, 0, 1]);
        // Points 0 and 1 are ~0.99; point 2 contributes 0.
        let s0 = (9.0 - 0.1) / 9.0;
        let s1 = (8.9 - 0.1) / 8.9;
        assert!((s - (s0 + s1) / 3.0).abs() < 1e-9);
    }

    #[test]
    fn identical_points_are_degenerate() {
        let data = Array2::from_elem((10, 3), 0.4);
        let labels = vec![0, 0, 0, 0, 0, 0, 0, 0, 1, 2];
        let q = evaluate(&data, &labels);
        assert!(q.degenerate);
        assert_eq!(q.silhouette, 0.0);
        assert_eq!(q.davies_bouldin, 0.0);
        assert_eq!(q.tier, QualityTier::Poor);
    }

    #[test]
    fn davies_bouldin_coincident_centroids() {
        let c = array![[1.0, 1.0], [1.0, 1.0]];
        assert_eq!(davies_bouldin_index(c.view(), &[0.5, 0.5], DistanceMetric::Euclidean), 0.0);
    }

    #[test]
    fn calinski_harabasz_known_value() {
        // Clusters {0, 2} and {10, 12}: centroids 1 and 11, mean 6.
        let data = array![[0.0], [2.0], [10.0], [12.0]];
        let labels = [0, 0, 1, 1];
        let c = centroids(data.view(), &cluster_members(&labels));
        let ch = calinski_harabasz_index(data.view(), &labels, c.view());
        // BCSS = 2·25 + 2·25 = 100, WCSS = 4 → (100/1) / (4/2) = 50.
        assert!((ch - 50.0).abs() < 1e-12);
        assert_eq!(calinski_harabasz_index(data.view(), &[0, 1, 2, 3], data.view()), 0.0);
    }

    proptest! {
        #[test]
        fn silhouette_bounded_and_db_non_negative(
            vals in proptest::collection::vec(0.0f64..1.0, 8..80),
            raw_labels in proptest::collection::vec(0usize..4, 40),
        ) {
            let n = vals.len() / 2;
            let data = Array2::from_shape_fn((n, 2), |(i, j)| vals[i * 2 + j]);
            // Compact labels to 0..k.
            let mut map = std::collections::HashMap::new();
            let labels: Vec<usize> = (0..n)
                .map(|i| {
                    let next = map.len();
                    *map.entry(raw_labels[i % raw_labels.len()]).or_insert(next)
                })
                .collect();
            let q = evaluate(&data, &labels);
            prop_assert!((-1.0..=1.0).contains(&q.silhouette));
            prop_assert!(q.davies_bouldin >= 0.0);
            prop_assert!(q.calinski_harabasz >= 0.0);
            prop_assert!(q.silhouette.is_finite() && q.davies_bouldin.is_finite());
        }
    }
}
