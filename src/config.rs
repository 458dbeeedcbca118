//! Segmentation configuration.

use serde::{Deserialize, Serialize};

use crate::cluster::Linkage;
use crate::distance::DistanceMetric;
use crate::error::{Error, Result};
use crate::features::Objective;

/// Configuration for a [`crate::SegmentationEngine`].
///
/// Every field has a default, so a JSON document only needs the fields it
/// overrides:
///
/// ```rust
/// use cohort::{Linkage, SegmentationConfig};
///
/// let config = SegmentationConfig::from_json(r#"{ "n_clusters": 4, "linkage": "complete" }"#).unwrap();
/// assert_eq!(config.n_clusters, Some(4));
/// assert_eq!(config.linkage, Linkage::Complete);
/// assert!(config.scale);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Pinned cluster count. `None` searches `2..=max_k` for the best
    /// silhouette and allows the optimizer to run.
    pub n_clusters: Option<usize>,
    /// Linkage for the first pass.
    pub linkage: Linkage,
    /// Distance metric for the first pass.
    pub metric: DistanceMetric,
    /// Feature subset and weights.
    pub objective: Objective,
    /// Z-score columns before computing distances.
    pub scale: bool,
    /// Keep merging to a single root and return the dendrogram.
    pub include_dendrogram: bool,
    /// Search alternative configurations when the first pass is poor.
    pub optimize: bool,
    /// Silhouette below which the optimizer runs.
    pub optimization_threshold: f64,
    /// Upper bound for the automatic k search.
    pub max_k: usize,
    /// Largest population accepted before failing fast.
    pub max_users: usize,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            n_clusters: None,
            linkage: Linkage::Average,
            metric: DistanceMetric::Euclidean,
            objective: Objective::Comprehensive,
            scale: true,
            include_dendrogram: true,
            optimize: true,
            optimization_threshold: 0.3,
            max_k: 8,
            max_users: 5_000,
        }
    }
}

impl SegmentationConfig {
    /// Pin the number of clusters.
    pub fn with_n_clusters(mut self, k: usize) -> Self {
        self.n_clusters = Some(k);
        self
    }

    /// Set linkage method.
    pub fn with_linkage(mut self, linkage: Linkage) -> Self {
        self.linkage = linkage;
        self
    }

    /// Set distance metric.
    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    /// Set clustering objective.
    pub fn with_objective(mut self, objective: Objective) -> Self {
        self.objective = objective;
        self
    }

    /// Enable or disable column standardization.
    pub fn with_scaling(mut self, scale: bool) -> Self {
        self.scale = scale;
        self
    }

    /// Enable or disable dendrogram output.
    pub fn with_dendrogram(mut self, include: bool) -> Self {
        self.include_dendrogram = include;
        self
    }

    /// Enable or disable the configuration search.
    pub fn with_optimization(mut self, optimize: bool) -> Self {
        self.optimize = optimize;
        self
    }

    /// Silhouette below which the configuration search runs.
    pub fn with_optimization_threshold(mut self, threshold: f64) -> Self {
        self.optimization_threshold = threshold;
        self
    }

    /// Set the automatic k search bound.
    pub fn with_max_k(mut self, max_k: usize) -> Self {
        self.max_k = max_k;
        self
    }

    /// Set the population ceiling.
    pub fn with_max_users(mut self, max_users: usize) -> Self {
        self.max_users = max_users;
        self
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check parameter ranges.
    pub fn validate(&self) -> Result<()> {
        if self.n_clusters == Some(0) {
            return Err(Error::invalid_parameter("n_clusters", "must be at least 1"));
        }
        if self.max_k < 2 {
            return Err(Error::invalid_parameter("max_k", "must be at least 2"));
        }
        if self.max_users < 2 {
            return Err(Error::invalid_parameter("max_users", "must be at least 2"));
        }
        if !(-1.0..=1.0).contains(&self.optimization_threshold) {
            return Err(Error::invalid_parameter(
                "optimization_threshold",
                "must be a silhouette value in [-1, 1]",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let c = SegmentationConfig::default();
        assert!(c.validate().is_ok());
        assert_eq!(c.optimization_threshold, 0.3);
        assert_eq!(c.n_clusters, None);
    }

    #[test]
    fn json_overrides() {
        let c = SegmentationConfig::from_json(
            r#"{ "metric": "cosine", "objective": "engagement_levels", "scale": false }"#,
        )
        .unwrap();
        assert_eq!(c.metric, DistanceMetric::Cosine);
        assert_eq!(c.objective, Objective::EngagementLevels);
        assert!(!c.scale);
        assert_eq!(c.linkage, Linkage::Average);
    }

    #[test]
    fn json_rejects_bad_values() {
        assert!(matches!(
            SegmentationConfig::from_json(r#"{ "linkage": "median" }"#),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            SegmentationConfig::from_json(r#"{ "max_k": 1 }"#),
            Err(Error::InvalidParameter { name: "max_k", .. })
        ));
        assert!(SegmentationConfig::from_json(r#"{ "n_clusters": 0 }"#).is_err());
    }

    #[test]
    fn builder() {
        let c = SegmentationConfig::default()
            .with_n_clusters(3)
            .with_linkage(Linkage::Ward)
            .with_metric(DistanceMetric::Manhattan)
            .with_scaling(false)
            .with_dendrogram(false)
            .with_optimization(false)
            .with_max_k(5)
            .with_max_users(100);
        assert_eq!(c.n_clusters, Some(3));
        assert_eq!(c.linkage, Linkage::Ward);
        assert!(!c.include_dendrogram && !c.optimize);
        assert_eq!((c.max_k, c.max_users), (5, 100));
    }
}
