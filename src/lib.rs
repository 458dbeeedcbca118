//! # cohort
//!
//! Behavioral user segmentation: raw viewing/search/rating aggregates are
//! engineered into a fixed feature schema, clustered hierarchically, scored
//! for validity and described in recommendation terms.
//!
//! The pipeline is driven by [`SegmentationEngine`].
//!
//! Parallel distance and silhouette computation is on by default via the
//! `parallel` feature (rayon).
//!
//! ```rust
//! use cohort::{RawUserBehavior, SegmentationConfig, SegmentationEngine};
//!
//! let users: Vec<RawUserBehavior> = (0..8)
//!     .map(|i| RawUserBehavior {
//!         binge_tendency: if i < 4 { 0.9 } else { 0.1 },
//!         search_frequency: if i < 4 { 0.1 } else { 0.9 },
//!         ..RawUserBehavior::new(format!("user-{i}"))
//!     })
//!     .collect();
//!
//! let mut engine = SegmentationEngine::new(SegmentationConfig::default().with_n_clusters(2));
//! let result = engine.segment(&users).unwrap();
//! assert_eq!(result.clusters.len(), 2);
//! assert_eq!(engine.profile("user-0").cluster_id, Some(0));
//! ```

pub mod characterize;
pub mod cluster;
pub mod config;
pub mod distance;
pub mod engine;
/// Error types used across `cohort`.
pub mod error;
pub mod features;
pub mod hierarchy;
pub mod metrics;
pub mod optimize;
pub mod preprocess;

pub use characterize::{
    Archetype, ClusterCharacteristics, ClusterCharacterizer, EngagementLevel,
    RecommendationStrategy, RecommendationWeights,
};
pub use cluster::{AgglomerativeClustering, Clustering, Linkage};
pub use config::SegmentationConfig;
pub use distance::{DistanceMatrix, DistanceMetric};
pub use engine::{
    ClusteringData, ClusteringResult, ResultMetadata, SegmentProfile, SegmentationEngine,
    UserCluster,
};
pub use error::{Error, Result};
pub use features::{Feature, FeatureEngineer, FeatureVector, Objective, RawUserBehavior};
pub use hierarchy::{Dendrogram, DendrogramNode};
pub use metrics::{ClusterEvaluator, QualityMetrics, QualityTier};
pub use optimize::{find_optimal_k, ConfigOptimizer, OptimizationInfo, RunParams};
