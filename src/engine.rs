//! Segmentation pipeline, results and the segment-profile cache.
//!
//! ```text
//! RawUserBehavior ─► FeatureEngineer ─► select(objective) ─► standardize
//!                ─► DistanceMatrix ─► AgglomerativeClustering
//!                ─► UserCluster (+ characteristics) ─► ClusterEvaluator
//!                ─► ClusteringResult
//! ```
//!
//! When k is not pinned the engine picks it with [`find_optimal_k`], and
//! if the first pass still scores below the configured silhouette threshold
//! the [`ConfigOptimizer`] searches alternative configurations.

use std::collections::{HashMap, HashSet};

use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::characterize::{
    Archetype, ClusterCharacteristics, ClusterCharacterizer, RecommendationStrategy,
    RecommendationWeights,
};
use crate::cluster::{AgglomerativeClustering, Linkage};
use crate::config::SegmentationConfig;
use crate::distance::{DistanceCache, DistanceMatrix, DistanceMetric};
use crate::error::{Error, Result};
use crate::features::{
    select_unweighted, to_matrix, Feature, FeatureEngineer, FeatureVector, Objective,
    RawUserBehavior,
};
use crate::hierarchy::DendrogramNode;
use crate::metrics::{self, ClusterEvaluator, QualityMetrics};
use crate::optimize::{find_optimal_k, ConfigOptimizer, OptimizationInfo, RunParams};
use crate::preprocess::standardize;

/// Feature matrix prepared for one clustering run.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusteringData {
    /// Matrix distances are computed on: selected columns, optionally
    /// standardized, then multiplied by objective weights.
    pub matrix: Array2<f64>,
    /// Selected columns as engineered (`[0, 1]`, unweighted, unscaled).
    pub raw: Array2<f64>,
    /// Column features of both matrices.
    pub features: Vec<Feature>,
    /// Row owners.
    pub user_ids: Vec<String>,
    /// Whether columns were standardized.
    pub scaled: bool,
    /// Objective the columns came from; `None` for caller-built matrices.
    pub objective: Option<Objective>,
}

impl ClusteringData {
    /// Select, scale and weight engineered vectors for `objective`.
    ///
    /// Weights are applied after standardization; z-scoring first would
    /// cancel them.
    pub fn from_vectors(vectors: &[FeatureVector], objective: Objective, scale: bool) -> Result<Self> {
        let user_ids: Vec<String> = vectors.iter().map(|v| v.user_id.clone()).collect();
        check_unique(&user_ids)?;

        let raw = select_unweighted(to_matrix(vectors)?.view(), objective)?;
        let weighted = objective.weighted_features();
        let mut matrix = if scale {
            standardize(raw.view())
        } else {
            raw.clone()
        };
        for (mut col, (_, w)) in matrix.axis_iter_mut(Axis(1)).zip(&weighted) {
            col *= *w;
        }

        Ok(Self {
            matrix,
            raw,
            features: weighted.into_iter().map(|(f, _)| f).collect(),
            user_ids,
            scaled: scale,
            objective: Some(objective),
        })
    }

    /// Wrap a caller-built `[0, 1]` matrix whose columns are `features`.
    pub fn from_matrix(
        user_ids: Vec<String>,
        matrix: Array2<f64>,
        features: Vec<Feature>,
        scale: bool,
    ) -> Result<Self> {
        if user_ids.len() != matrix.nrows() {
            return Err(Error::DimensionMismatch {
                expected: matrix.nrows(),
                found: user_ids.len(),
            });
        }
        if features.len() != matrix.ncols() {
            return Err(Error::DimensionMismatch {
                expected: matrix.ncols(),
                found: features.len(),
            });
        }
        if let Some(((row, col), _)) = matrix.indexed_iter().find(|(_, v)| !v.is_finite()) {
            return Err(Error::NonFiniteValue { row, col });
        }
        check_unique(&user_ids)?;

        let clustered = if scale {
            standardize(matrix.view())
        } else {
            matrix.clone()
        };
        Ok(Self {
            matrix: clustered,
            raw: matrix,
            features,
            user_ids,
            scaled: scale,
            objective: None,
        })
    }

    /// Number of users (rows).
    pub fn n_users(&self) -> usize {
        self.matrix.nrows()
    }

    /// Number of features (columns).
    pub fn n_features(&self) -> usize {
        self.matrix.ncols()
    }
}

fn check_unique(ids: &[String]) -> Result<()> {
    let mut seen = HashSet::with_capacity(ids.len());
    match ids.iter().find(|id| !seen.insert(id.as_str())) {
        Some(dup) => Err(Error::invalid_parameter(
            "user_ids",
            format!("duplicate user id '{dup}'"),
        )),
        None => Ok(()),
    }
}

/// One behavioral segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserCluster {
    /// Cluster id, `0..n_clusters`, numbered by first member in input order.
    pub id: usize,
    /// Member user ids in input order.
    pub user_ids: Vec<String>,
    /// Mean of members' rows in the clustered feature space.
    pub centroid: Vec<f64>,
    /// Number of members.
    pub size: usize,
    /// Mean pairwise distance among members (0 for a singleton).
    pub intra_distance: f64,
    /// Semantic description.
    pub characteristics: ClusterCharacteristics,
}

/// Run-level facts about a [`ClusteringResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultMetadata {
    /// Users clustered.
    pub n_users: usize,
    /// Clusters produced.
    pub n_clusters: usize,
    /// Validity metrics and tier.
    pub quality: QualityMetrics,
    /// Linkage used.
    pub linkage: Linkage,
    /// Metric used.
    pub metric: DistanceMetric,
    /// Objective used, if any.
    pub objective: Option<Objective>,
    /// Whether features were standardized.
    pub scaled: bool,
    /// Present when the optimizer replaced the first-pass result.
    pub optimization: Option<OptimizationInfo>,
}

/// Output of a segmentation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusteringResult {
    /// Exact partition of the input users.
    pub clusters: Vec<UserCluster>,
    /// Run facts.
    pub metadata: ResultMetadata,
    /// Full merge tree, when requested.
    pub dendrogram: Option<DendrogramNode>,
}

/// What the recommendation consumer needs to serve one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentProfile {
    /// The user.
    pub user_id: String,
    /// Cluster id, `None` for users outside every cluster.
    pub cluster_id: Option<usize>,
    /// Cluster archetype, if clustered.
    pub archetype: Option<Archetype>,
    /// Strategy to use.
    pub strategy: RecommendationStrategy,
    /// Signal weights for the strategy.
    pub weights: RecommendationWeights,
    /// Other members of the user's cluster.
    pub peers: Vec<String>,
}

impl SegmentProfile {
    /// Profile for a user with no segment.
    pub fn unclustered(user_id: impl Into<String>) -> Self {
        let strategy = RecommendationStrategy::DEFAULT;
        Self {
            user_id: user_id.into(),
            cluster_id: None,
            archetype: None,
            strategy,
            weights: strategy.weights(),
            peers: Vec::new(),
        }
    }
}

impl ClusteringResult {
    /// Mean silhouette of the partition.
    pub fn silhouette(&self) -> f64 {
        self.metadata.quality.silhouette
    }

    /// Cluster containing `user_id`.
    pub fn cluster_of(&self, user_id: &str) -> Option<&UserCluster> {
        self.clusters
            .iter()
            .find(|c| c.user_ids.iter().any(|u| u == user_id))
    }

    /// Other members of `user_id`'s cluster; empty for unknown users.
    pub fn peers_of(&self, user_id: &str) -> Vec<&str> {
        self.cluster_of(user_id)
            .map(|c| {
                c.user_ids
                    .iter()
                    .map(String::as_str)
                    .filter(|&u| u != user_id)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// User id → cluster id.
    pub fn assignments(&self) -> HashMap<&str, usize> {
        self.clusters
            .iter()
            .flat_map(|c| c.user_ids.iter().map(move |u| (u.as_str(), c.id)))
            .collect()
    }

    /// Serving profile for `user_id`, falling back to
    /// [`RecommendationStrategy::DEFAULT`] for unknown users.
    pub fn profile_for(&self, user_id: &str) -> SegmentProfile {
        match self.cluster_of(user_id) {
            Some(cluster) => {
                let strategy = cluster.characteristics.recommendation_strategy;
                SegmentProfile {
                    user_id: user_id.to_string(),
                    cluster_id: Some(cluster.id),
                    archetype: Some(cluster.characteristics.archetype),
                    strategy,
                    weights: strategy.weights(),
                    peers: self.peers_of(user_id).into_iter().map(str::to_string).collect(),
                }
            }
            None => SegmentProfile::unclustered(user_id),
        }
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Run the pipeline once under fixed parameters.
///
/// `distances` must be built from `data.matrix` under `params.metric`.
pub(crate) fn cluster_once(
    data: &ClusteringData,
    params: RunParams,
    distances: &DistanceMatrix,
    include_dendrogram: bool,
) -> Result<ClusteringResult> {
    debug_assert_eq!(distances.metric(), params.metric);
    let run = AgglomerativeClustering::new(params.n_clusters)
        .with_linkage(params.linkage)
        .with_full_tree(include_dendrogram)
        .fit(data.matrix.view(), distances)?;

    let members = metrics::cluster_members(&run.labels);
    let centroids = metrics::centroids(data.matrix.view(), &members);
    let characterizer = ClusterCharacterizer::new();

    let clusters: Vec<UserCluster> = members
        .iter()
        .enumerate()
        .map(|(id, idx)| {
            let rows = data.raw.select(Axis(0), idx);
            UserCluster {
                id,
                user_ids: idx.iter().map(|&i| data.user_ids[i].clone()).collect(),
                centroid: centroids.row(id).to_vec(),
                size: idx.len(),
                intra_distance: distances.mean_pairwise(idx),
                characteristics: characterizer.characterize(rows.view(), &data.features),
            }
        })
        .collect();

    let spread: Vec<f64> = clusters.iter().map(|c| c.intra_distance).collect();
    let quality = ClusterEvaluator::new().evaluate(
        data.matrix.view(),
        &distances,
        &run.labels,
        centroids.view(),
        &spread,
    );

    Ok(ClusteringResult {
        metadata: ResultMetadata {
            n_users: data.n_users(),
            n_clusters: clusters.len(),
            quality,
            linkage: params.linkage,
            metric: params.metric,
            objective: data.objective,
            scaled: data.scaled,
            optimization: None,
        },
        dendrogram: if include_dendrogram {
            run.dendrogram.root()
        } else {
            None
        },
        clusters,
    })
}

/// Segments users and serves per-user profiles from the latest result.
///
/// Holds the latest [`ClusteringResult`] and a memo of looked-up
/// [`SegmentProfile`]s. A new segmentation or [`clear_cache`] drops the
/// memo.
///
/// [`clear_cache`]: SegmentationEngine::clear_cache
#[derive(Debug, Clone, Default)]
pub struct SegmentationEngine {
    config: SegmentationConfig,
    engineer: FeatureEngineer,
    latest: Option<ClusteringResult>,
    profiles: HashMap<String, SegmentProfile>,
}

impl SegmentationEngine {
    /// Create an engine with `config`.
    pub fn new(config: SegmentationConfig) -> Self {
        Self {
            config,
            engineer: FeatureEngineer::new(),
            latest: None,
            profiles: HashMap::new(),
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &SegmentationConfig {
        &self.config
    }

    /// Most recent result.
    pub fn latest(&self) -> Option<&ClusteringResult> {
        self.latest.as_ref()
    }

    /// Segment a population from raw behavior.
    pub fn segment(&mut self, users: &[RawUserBehavior]) -> Result<ClusteringResult> {
        self.config.validate()?;
        self.check_size(users.len())?;
        let vectors = self.engineer.engineer(users);
        let data = ClusteringData::from_vectors(&vectors, self.config.objective, self.config.scale)?;
        self.segment_data(data)
    }

    /// Segment a prepared feature matrix.
    pub fn segment_data(&mut self, data: ClusteringData) -> Result<ClusteringResult> {
        self.config.validate()?;
        let n = data.n_users();
        self.check_size(n)?;

        let config = &self.config;
        let mut distances = DistanceCache::new(data.matrix.view());
        let (k, pinned) = match config.n_clusters {
            Some(k) if k > n => {
                tracing::warn!(
                    requested = k,
                    n_users = n,
                    "more clusters requested than users; using one cluster per user"
                );
                (n, true)
            }
            Some(k) => (k, true),
            None => {
                let search = find_optimal_k(
                    &data,
                    config.linkage,
                    distances.get(config.metric)?,
                    config.max_k,
                )?;
                (search.best_k, false)
            }
        };

        let params = RunParams {
            n_clusters: k,
            linkage: config.linkage,
            metric: config.metric,
        };
        let may_optimize = config.optimize && !pinned;
        let optimizer = ConfigOptimizer::new(config.include_dendrogram);

        let first = distances
            .get(params.metric)
            .and_then(|dm| cluster_once(&data, params, dm, config.include_dendrogram));
        let result = match first {
            Ok(first) if may_optimize && first.silhouette() < config.optimization_threshold => {
                tracing::info!(
                    silhouette = first.silhouette(),
                    threshold = config.optimization_threshold,
                    "first pass below threshold; searching alternative configurations"
                );
                optimizer.optimize_cached(&data, params, Some(first), &mut distances)?
            }
            Ok(first) => first,
            Err(e) if may_optimize => {
                tracing::warn!(error = %e, ?params, "first pass failed; searching alternatives");
                optimizer.optimize_cached(&data, params, None, &mut distances)?
            }
            Err(e) => return Err(e),
        };

        tracing::info!(
            n_users = n,
            n_clusters = result.metadata.n_clusters,
            silhouette = result.silhouette(),
            tier = %result.metadata.quality.tier,
            linkage = %result.metadata.linkage,
            metric = %result.metadata.metric,
            "segmentation complete"
        );

        self.latest = Some(result.clone());
        self.clear_cache();
        Ok(result)
    }

    /// Serving profile for `user_id` against the latest result.
    ///
    /// Users absent from every cluster (or any user before the first run)
    /// get [`SegmentProfile::unclustered`].
    pub fn profile(&mut self, user_id: &str) -> SegmentProfile {
        if let Some(hit) = self.profiles.get(user_id) {
            return hit.clone();
        }
        let profile = match &self.latest {
            Some(result) => result.profile_for(user_id),
            None => SegmentProfile::unclustered(user_id),
        };
        self.profiles.insert(user_id.to_string(), profile.clone());
        profile
    }

    /// Number of memoized profiles.
    pub fn cached_profiles(&self) -> usize {
        self.profiles.len()
    }

    /// Drop memoized profiles.
    pub fn clear_cache(&mut self) {
        if !self.profiles.is_empty() {
            tracing::debug!(entries = self.profiles.len(), "clearing segment profile cache");
        }
        self.profiles.clear();
    }

    fn check_size(&self, n: usize) -> Result<()> {
        if n < 2 {
            return Err(Error::InsufficientData {
                n_users: n,
                required: 2,
            });
        }
        if n > self.config.max_users {
            return Err(Error::TooManyUsers {
                n_users: n,
                max_users: self.config.max_users,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn run_once(data: &ClusteringData, params: RunParams, dendrogram: bool) -> ClusteringResult {
        let dm = DistanceMatrix::build(data.matrix.view(), params.metric).unwrap();
        cluster_once(data, params, &dm, dendrogram).unwrap()
    }

    fn ids(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("u{i}")).collect()
    }

    fn blobs() -> ClusteringData {
        let m = array![
            [0.1, 0.1],
            [0.12, 0.1],
            [0.1, 0.12],
            [0.9, 0.9],
            [0.88, 0.9],
            [0.9, 0.88],
        ];
        ClusteringData::from_matrix(
            ids(6),
            m,
            vec![Feature::BingeTendency, Feature::SearchFrequency],
            false,
        )
        .unwrap()
    }

    #[test]
    fn from_matrix_validates() {
        let m = array![[0.1, 0.2], [0.3, 0.4]];
        assert!(matches!(
            ClusteringData::from_matrix(ids(3), m.clone(), vec![Feature::BingeTendency, Feature::QualityFocus], false),
            Err(Error::DimensionMismatch { .. })
        ));
        assert!(matches!(
            ClusteringData::from_matrix(ids(2), m.clone(), vec![Feature::BingeTendency], false),
            Err(Error::DimensionMismatch { .. })
        ));
        let bad = array![[0.1, f64::NAN], [0.3, 0.4]];
        assert_eq!(
            ClusteringData::from_matrix(ids(2), bad, vec![Feature::BingeTendency, Feature::QualityFocus], false)
                .unwrap_err(),
            Error::NonFiniteValue { row: 0, col: 1 }
        );
        let dup = vec!["a".to_string(), "a".to_string()];
        assert!(matches!(
            ClusteringData::from_matrix(dup, m, vec![Feature::BingeTendency, Feature::QualityFocus], false),
            Err(Error::InvalidParameter { name: "user_ids", .. })
        ));
    }

    #[test]
    fn from_vectors_rejects_wrong_width() {
        let wide: Vec<FeatureVector> = (0..2)
            .map(|i| FeatureVector {
                user_id: format!("u{i}"),
                values: vec![0.5; Feature::COUNT + 1],
            })
            .collect();
        assert_eq!(
            ClusteringData::from_vectors(&wide, Objective::Comprehensive, true).unwrap_err(),
            Error::DimensionMismatch {
                expected: Feature::COUNT,
                found: Feature::COUNT + 1,
            }
        );
    }

    #[test]
    fn weights_survive_scaling() {
        let users: Vec<FeatureVector> = (0..4)
            .map(|i| FeatureVector {
                user_id: format!("u{i}"),
                values: vec![i as f64 / 4.0; Feature::COUNT],
            })
            .collect();
        let data = ClusteringData::from_vectors(&users, Objective::EngagementLevels, true).unwrap();
        assert_eq!(data.n_features(), 5);
        assert_eq!(data.features[0], Feature::EngagementIntensity);
        // Column 4 (hover_engagement, weight 0.6) vs column 0 (weight 1.0).
        for row in 0..4 {
            let a = data.matrix[[row, 0]];
            let b = data.matrix[[row, 4]];
            assert!((b - 0.6 * a).abs() < 1e-12);
        }
        assert_eq!(data.raw[[3, 0]], 0.75);
    }

    #[test]
    fn cluster_once_builds_partition() {
        let data = blobs();
        let params = RunParams {
            n_clusters: 2,
            linkage: Linkage::Complete,
            metric: DistanceMetric::Euclidean,
        };
        let result = run_once(&data, params, true);
        assert_eq!(result.clusters.len(), 2);
        assert_eq!(result.clusters[0].user_ids, vec!["u0", "u1", "u2"]);
        assert_eq!(result.clusters[1].size, 3);
        assert!(result.silhouette() > 0.9);
        assert_eq!(result.dendrogram.as_ref().map(|d| d.count), Some(6));
        assert!(result.clusters[0].intra_distance > 0.0);
        assert_eq!(result.clusters[1].centroid.len(), 2);
    }

    #[test]
    fn lookups_and_default_profile() {
        let data = blobs();
        let params = RunParams {
            n_clusters: 2,
            linkage: Linkage::Average,
            metric: DistanceMetric::Euclidean,
        };
        let result = run_once(&data, params, false);
        assert!(result.dendrogram.is_none());
        assert_eq!(result.cluster_of("u4").map(|c| c.id), Some(1));
        assert_eq!(result.peers_of("u4"), vec!["u3", "u5"]);
        assert!(result.peers_of("nobody").is_empty());
        assert_eq!(result.assignments().len(), 6);

        let p = result.profile_for("u0");
        assert_eq!(p.cluster_id, Some(0));
        assert_eq!(p.peers.len(), 2);

        let p = result.profile_for("new-user");
        assert_eq!(p.cluster_id, None);
        assert_eq!(p.strategy, RecommendationStrategy::PopularAndTrendingFocused);
        assert_eq!(p.weights, RecommendationStrategy::DEFAULT.weights());
    }

    #[test]
    fn engine_cache_lifecycle() {
        let mut engine = SegmentationEngine::new(SegmentationConfig::default().with_n_clusters(2));
        assert_eq!(engine.profile("u0").cluster_id, None);
        engine.clear_cache();

        engine.segment_data(blobs()).unwrap();
        assert_eq!(engine.cached_profiles(), 0);
        assert_eq!(engine.profile("u0").cluster_id, Some(0));
        assert_eq!(engine.profile("u5").cluster_id, Some(1));
        assert_eq!(engine.profile("u0").cluster_id, Some(0));
        assert_eq!(engine.cached_profiles(), 2);

        engine.clear_cache();
        assert_eq!(engine.cached_profiles(), 0);

        engine.profile("u1");
        engine.segment_data(blobs()).unwrap();
        assert_eq!(engine.cached_profiles(), 0);
    }

    #[test]
    fn engine_size_checks() {
        let mut engine = SegmentationEngine::new(SegmentationConfig::default().with_max_users(3));
        assert_eq!(
            engine.segment(&[RawUserBehavior::new("a")]).unwrap_err(),
            Error::InsufficientData {
                n_users: 1,
                required: 2
            }
        );
        assert_eq!(
            engine.segment_data(blobs()).unwrap_err(),
            Error::TooManyUsers {
                n_users: 6,
                max_users: 3
            }
        );
    }

    #[test]
    fn result_json_round_trip() {
        let data = blobs();
        let params = RunParams {
            n_clusters: 2,
            linkage: Linkage::Single,
            metric: DistanceMetric::Manhattan,
        };
        let result = run_once(&data, params, true);
        let json = result.to_json().unwrap();
        assert!(json.contains("\"linkage\": \"single\""));
        let back: ClusteringResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back.clusters.len(), 2);
        assert_eq!(back.metadata.metric, DistanceMetric::Manhattan);
    }
}
