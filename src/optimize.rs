//! Cluster-count search and configuration search.
//!
//! [`find_optimal_k`] builds one full dendrogram and scores every cut in
//! `2..=max_k` by silhouette. [`ConfigOptimizer`] re-runs the pipeline
//! under a fixed list of alternative parameter sets and keeps the best one
//! if it beats the first pass.
//!
//! | Candidate | k | Linkage | Metric |
//! |-----------|---|---------|--------|
//! | sqrt rule | round(√(n/2)) | base | base |
//! | tenth rule | n / 10 | base | base |
//! | linkage sweep | base | ward, average, complete | base |
//! | metric sweep | base | base | cosine, manhattan |
//! | finer ward | base + 1 | ward | euclidean |
//! | cosine average | round(√(n/2)) | average | cosine |
//!
//! Every candidate k is clamped to `[min(2, n), n]`; duplicates and the
//! base configuration itself are skipped.

use serde::{Deserialize, Serialize};

use crate::cluster::{AgglomerativeClustering, Linkage};
use crate::distance::{DistanceCache, DistanceMatrix, DistanceMetric};
use crate::engine::{cluster_once, ClusteringData, ClusteringResult};
use crate::error::{Error, Result};
use crate::metrics::silhouette_score;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Parameters of one clustering pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunParams {
    /// Requested cluster count.
    pub n_clusters: usize,
    /// Linkage criterion.
    pub linkage: Linkage,
    /// Distance metric.
    pub metric: DistanceMetric,
}

/// What the optimizer tried and what it picked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationInfo {
    /// True when a candidate replaced the first pass; false when the first
    /// pass was kept.
    pub optimized: bool,
    /// First-pass silhouette; `None` if the first pass failed.
    pub original_silhouette: Option<f64>,
    /// First-pass parameters.
    pub original: RunParams,
    /// Parameters of the returned result.
    pub chosen: RunParams,
    /// Candidates run.
    pub candidates_tried: usize,
    /// Candidates that returned an error.
    pub candidates_failed: usize,
}

/// Alternative parameter sets for a population of `n_users`.
pub fn candidate_configs(n_users: usize, base: RunParams) -> Vec<RunParams> {
    let lo = 2.min(n_users);
    let clamp_k = |k: usize| k.clamp(lo, n_users.max(lo));
    let k_sqrt = clamp_k(((n_users as f64) / 2.0).sqrt().round() as usize);
    let k_tenth = clamp_k(n_users / 10);

    let with = |n_clusters: usize, linkage: Linkage, metric: DistanceMetric| RunParams {
        n_clusters,
        linkage,
        metric,
    };

    let raw = [
        with(k_sqrt, base.linkage, base.metric),
        with(k_tenth, base.linkage, base.metric),
        with(base.n_clusters, Linkage::Ward, base.metric),
        with(base.n_clusters, Linkage::Average, base.metric),
        with(base.n_clusters, Linkage::Complete, base.metric),
        with(base.n_clusters, base.linkage, DistanceMetric::Cosine),
        with(base.n_clusters, base.linkage, DistanceMetric::Manhattan),
        with(clamp_k(base.n_clusters + 1), Linkage::Ward, DistanceMetric::Euclidean),
        with(k_sqrt, Linkage::Average, DistanceMetric::Cosine),
    ];

    let mut out: Vec<RunParams> = Vec::with_capacity(raw.len());
    for p in raw {
        if p != base && !out.contains(&p) {
            out.push(p);
        }
    }
    out
}

/// Re-runs the pipeline under [`candidate_configs`] and keeps the best.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigOptimizer {
    include_dendrogram: bool,
}

impl ConfigOptimizer {
    /// Create an optimizer. Candidate results carry a dendrogram when
    /// `include_dendrogram` is set.
    pub fn new(include_dendrogram: bool) -> Self {
        Self { include_dendrogram }
    }

    /// Search alternatives to `base`.
    ///
    /// A candidate replaces `baseline` only with a strictly higher
    /// silhouette; among equal candidates the earliest wins. Failing
    /// candidates are logged and skipped. The returned result always carries
    /// [`OptimizationInfo`]. Errors with [`Error::ConfigurationExhausted`]
    /// when there is no baseline and every candidate fails.
    pub fn optimize(
        &self,
        data: &ClusteringData,
        base: RunParams,
        baseline: Option<ClusteringResult>,
    ) -> Result<ClusteringResult> {
        let mut distances = DistanceCache::new(data.matrix.view());
        self.optimize_cached(data, base, baseline, &mut distances)
    }

    /// [`optimize`](Self::optimize) reusing matrices already in `distances`.
    pub(crate) fn optimize_cached(
        &self,
        data: &ClusteringData,
        base: RunParams,
        baseline: Option<ClusteringResult>,
        distances: &mut DistanceCache<'_>,
    ) -> Result<ClusteringResult> {
        let candidates = candidate_configs(data.n_users(), base);
        for p in &candidates {
            // Failures are kept in the cache and surface per candidate.
            let _ = distances.get(p.metric);
        }
        let distances = &*distances;
        run_candidates(&candidates, base, baseline, |p| {
            cluster_once(data, *p, distances.built(p.metric)?, self.include_dendrogram)
        })
    }
}

/// Run every candidate through `run` and pick the winner against
/// `baseline`.
pub(crate) fn run_candidates<F>(
    candidates: &[RunParams],
    base: RunParams,
    baseline: Option<ClusteringResult>,
    run: F,
) -> Result<ClusteringResult>
where
    F: Fn(&RunParams) -> Result<ClusteringResult> + Send + Sync,
{
    #[cfg(feature = "parallel")]
    let outcomes: Vec<Result<ClusteringResult>> = candidates.par_iter().map(&run).collect();
    #[cfg(not(feature = "parallel"))]
    let outcomes: Vec<Result<ClusteringResult>> = candidates.iter().map(&run).collect();

    let mut failed = 0;
    let mut best: Option<ClusteringResult> = None;
    for (params, outcome) in candidates.iter().zip(outcomes) {
        match outcome {
            Ok(result) => {
                tracing::debug!(?params, silhouette = result.silhouette(), "candidate scored");
                if best
                    .as_ref()
                    .map_or(true, |b| result.silhouette() > b.silhouette())
                {
                    best = Some(result);
                }
            }
            Err(e) => {
                failed += 1;
                tracing::warn!(?params, error = %e, "candidate configuration failed");
            }
        }
    }

    let original_silhouette = baseline.as_ref().map(ClusteringResult::silhouette);
    let (mut chosen, optimized) = match (baseline, best) {
        (Some(b), Some(c)) if c.silhouette() > b.silhouette() => (c, true),
        (Some(b), _) => (b, false),
        (None, Some(c)) => (c, true),
        (None, None) => {
            return Err(Error::ConfigurationExhausted {
                attempted: candidates.len() + 1,
            })
        }
    };

    tracing::info!(
        optimized,
        tried = candidates.len(),
        failed,
        silhouette = chosen.silhouette(),
        "configuration search finished"
    );
    chosen.metadata.optimization = Some(OptimizationInfo {
        optimized,
        original_silhouette,
        original: base,
        chosen: RunParams {
            n_clusters: chosen.metadata.n_clusters,
            linkage: chosen.metadata.linkage,
            metric: chosen.metadata.metric,
        },
        candidates_tried: candidates.len(),
        candidates_failed: failed,
    });
    Ok(chosen)
}

/// Silhouette per candidate k and the winner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KSearch {
    /// Highest-scoring k; the smallest on ties.
    pub best_k: usize,
    /// `(k, silhouette)` in increasing k.
    pub scores: Vec<(usize, f64)>,
}

/// Pick k in `2..=min(max_k, n - 1)` by silhouette.
///
/// One full dendrogram is built over `distances` (which must come from
/// `data.matrix`) and cut at every k. With fewer than three users there is
/// nothing to compare and `best_k` is `min(2, n)`.
pub fn find_optimal_k(
    data: &ClusteringData,
    linkage: Linkage,
    distances: &DistanceMatrix,
    max_k: usize,
) -> Result<KSearch> {
    let n = data.n_users();
    let upper = max_k.min(n.saturating_sub(1));
    if upper < 2 {
        return Ok(KSearch {
            best_k: 2.min(n),
            scores: Vec::new(),
        });
    }

    let tree = AgglomerativeClustering::new(1)
        .with_linkage(linkage)
        .with_full_tree(true)
        .fit(data.matrix.view(), distances)?
        .dendrogram;

    let mut scores = Vec::with_capacity(upper - 1);
    let mut best: Option<(usize, f64)> = None;
    for k in 2..=upper {
        let labels = tree.cut_to_k(k)?;
        let s = silhouette_score(distances, &labels);
        scores.push((k, s));
        if best.map_or(true, |(_, b)| s > b) {
            best = Some((k, s));
        }
    }
    let best_k = best.map_or(2, |(k, _)| k);
    tracing::debug!(best_k, candidates = scores.len(), "cluster count search");
    Ok(KSearch { best_k, scores })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::Feature;
    use ndarray::{array, Array2};

    fn base(k: usize) -> RunParams {
        RunParams {
            n_clusters: k,
            linkage: Linkage::Average,
            metric: DistanceMetric::Euclidean,
        }
    }

    fn data(m: Array2<f64>) -> ClusteringData {
        let ids = (0..m.nrows()).map(|i| format!("u{i}")).collect();
        ClusteringData::from_matrix(
            ids,
            m,
            vec![Feature::CompletionRate, Feature::DiscoveryDrive],
            false,
        )
        .unwrap()
    }

    fn three_blobs() -> ClusteringData {
        data(array![
            [0.0, 0.0],
            [0.02, 0.0],
            [0.0, 0.02],
            [0.5, 0.5],
            [0.52, 0.5],
            [0.5, 0.52],
            [1.0, 0.0],
            [0.98, 0.0],
            [1.0, 0.02],
        ])
    }

    fn euclidean(d: &ClusteringData) -> DistanceMatrix {
        DistanceMatrix::build(d.matrix.view(), DistanceMetric::Euclidean).unwrap()
    }

    fn run_once(d: &ClusteringData, p: RunParams) -> ClusteringResult {
        let dm = DistanceMatrix::build(d.matrix.view(), p.metric).unwrap();
        cluster_once(d, p, &dm, false).unwrap()
    }

    #[test]
    fn candidates_are_unique_and_exclude_base() {
        let b = base(3);
        let c = candidate_configs(50, b);
        assert!(!c.contains(&b));
        for (i, p) in c.iter().enumerate() {
            assert!(!c[i + 1..].contains(p));
            assert!(p.n_clusters >= 2 && p.n_clusters <= 50);
        }
        assert_eq!(c[0].n_clusters, 5);
        assert!(c.contains(&RunParams {
            n_clusters: 4,
            linkage: Linkage::Ward,
            metric: DistanceMetric::Euclidean
        }));
    }

    #[test]
    fn candidate_k_is_clamped_for_small_populations() {
        for p in candidate_configs(3, base(3)) {
            assert!((2..=3).contains(&p.n_clusters), "{p:?}");
        }
    }

    #[test]
    fn finds_three_blobs() {
        let d = three_blobs();
        let search = find_optimal_k(&d, Linkage::Average, &euclidean(&d), 8).unwrap();
        assert_eq!(search.best_k, 3);
        assert_eq!(search.scores.len(), 7);
        assert_eq!(search.scores[0].0, 2);
    }

    #[test]
    fn k_search_on_tiny_input() {
        let d = data(array![[0.0, 0.0], [1.0, 1.0]]);
        let search = find_optimal_k(&d, Linkage::Single, &euclidean(&d), 8).unwrap();
        assert_eq!(search.best_k, 2);
        assert!(search.scores.is_empty());
    }

    #[test]
    fn identical_points_keep_smallest_k() {
        let d = data(Array2::from_elem((6, 2), 0.4));
        let search = find_optimal_k(&d, Linkage::Ward, &euclidean(&d), 4).unwrap();
        assert_eq!(search.best_k, 2);
    }

    #[test]
    fn optimizer_keeps_good_baseline() {
        let d = three_blobs();
        let b = base(3);
        let first = run_once(&d, b);
        let s = first.silhouette();
        let out = ConfigOptimizer::new(false).optimize(&d, b, Some(first)).unwrap();
        let info = out.metadata.optimization.clone().unwrap();
        assert!(out.silhouette() >= s);
        if !info.optimized {
            assert_eq!(out.silhouette(), s);
            assert_eq!(info.chosen, b);
        }
        assert_eq!(info.original_silhouette, Some(s));
    }

    #[test]
    fn optimizer_improves_poor_baseline() {
        let d = three_blobs();
        let b = RunParams {
            n_clusters: 8,
            linkage: Linkage::Single,
            metric: DistanceMetric::Euclidean,
        };
        let first = run_once(&d, b);
        let s = first.silhouette();
        let out = ConfigOptimizer::new(false).optimize(&d, b, Some(first)).unwrap();
        assert!(out.silhouette() > s);
        let info = out.metadata.optimization.clone().unwrap();
        assert!(info.optimized);
        assert_eq!(info.original, b);
        assert_eq!(info.original_silhouette, Some(s));
        assert_eq!(info.chosen.n_clusters, out.metadata.n_clusters);
        assert_eq!(info.candidates_failed, 0);
    }

    #[test]
    fn optimizer_without_baseline_returns_best_candidate() {
        let d = three_blobs();
        let out = ConfigOptimizer::new(true).optimize(&d, base(3), None).unwrap();
        let info = out.metadata.optimization.clone().unwrap();
        assert!(info.optimized);
        assert_eq!(info.original_silhouette, None);
        assert!(out.dendrogram.is_some());
    }

    fn euclidean_candidates() -> Vec<RunParams> {
        vec![
            RunParams {
                n_clusters: 2,
                linkage: Linkage::Average,
                metric: DistanceMetric::Euclidean,
            },
            RunParams {
                n_clusters: 3,
                linkage: Linkage::Complete,
                metric: DistanceMetric::Euclidean,
            },
            RunParams {
                n_clusters: 4,
                linkage: Linkage::Single,
                metric: DistanceMetric::Euclidean,
            },
        ]
    }

    #[test]
    fn failing_candidate_is_skipped() {
        let d = three_blobs();
        let dm = euclidean(&d);
        let candidates = euclidean_candidates();
        let broken = candidates[0];
        let b = RunParams {
            n_clusters: 8,
            linkage: Linkage::Single,
            metric: DistanceMetric::Euclidean,
        };
        let first = run_once(&d, b);

        let out = run_candidates(&candidates, b, Some(first), |p| {
            if *p == broken {
                Err(Error::EmptyInput)
            } else {
                cluster_once(&d, *p, &dm, false)
            }
        })
        .unwrap();

        let info = out.metadata.optimization.clone().unwrap();
        assert!(info.optimized);
        assert_eq!(info.candidates_tried, 3);
        assert_eq!(info.candidates_failed, 1);
        assert_eq!(info.chosen, candidates[1]);
    }

    #[test]
    fn all_failing_candidates_keep_baseline() {
        let d = three_blobs();
        let b = base(3);
        let first = run_once(&d, b);
        let s = first.silhouette();

        let out = run_candidates(&euclidean_candidates(), b, Some(first), |_| {
            Err(Error::EmptyInput)
        })
        .unwrap();
        assert_eq!(out.silhouette(), s);
        let info = out.metadata.optimization.clone().unwrap();
        assert!(!info.optimized);
        assert_eq!(info.chosen, b);
        assert_eq!(info.candidates_failed, 3);
    }

    #[test]
    fn no_baseline_and_all_failing_is_exhausted() {
        let err = run_candidates(&euclidean_candidates(), base(3), None, |_| {
            Err(Error::EmptyInput)
        })
        .unwrap_err();
        assert_eq!(err, Error::ConfigurationExhausted { attempted: 4 });
    }
}
