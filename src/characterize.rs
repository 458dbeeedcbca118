//! Cluster semantics from centroids.
//!
//! A cluster's centroid (in unscaled `[0, 1]` feature space) is reduced to
//! a handful of dominant features, which drive three small ordered tables:
//!
//! 1. archetype rules: dominant feature name keywords → [`Archetype`]
//! 2. tag tables: features above [`TAG_THRESHOLD`] → preference / pattern tags
//! 3. strategy table: ([`Archetype`], [`EngagementLevel`]) → [`RecommendationStrategy`]
//!
//! The tables are plain data so they can be extended and tested without
//! running any clustering.

use core::fmt;

use ndarray::{Array1, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::features::Feature;

/// Number of dominant features kept per cluster.
pub const DOMINANT_FEATURES: usize = 5;

/// Centroid value above which a tag is emitted.
pub const TAG_THRESHOLD: f64 = 0.6;

/// Semantic user archetype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Archetype {
    /// Long sessions, many episodes in a row.
    BingeWatcher,
    /// Searches and digs through the catalog.
    ActiveExplorer,
    /// Finishes what they start, favors quality.
    FocusedLearner,
    /// Spreads viewing across genres and categories.
    ContentExplorer,
    /// No pronounced behavior.
    CasualViewer,
}

impl Archetype {
    /// Snake-case label.
    pub fn name(self) -> &'static str {
        match self {
            Archetype::BingeWatcher => "binge_watcher",
            Archetype::ActiveExplorer => "active_explorer",
            Archetype::FocusedLearner => "focused_learner",
            Archetype::ContentExplorer => "content_explorer",
            Archetype::CasualViewer => "casual_viewer",
        }
    }
}

impl fmt::Display for Archetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Coarse engagement level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementLevel {
    /// ≤ 0.4
    Low,
    /// > 0.4
    Medium,
    /// > 0.7
    High,
}

impl EngagementLevel {
    /// Level for a mean engagement value.
    pub fn from_score(score: f64) -> Self {
        if score > 0.7 {
            EngagementLevel::High
        } else if score > 0.4 {
            EngagementLevel::Medium
        } else {
            EngagementLevel::Low
        }
    }

    /// Snake-case name.
    pub fn name(self) -> &'static str {
        match self {
            EngagementLevel::Low => "low",
            EngagementLevel::Medium => "medium",
            EngagementLevel::High => "high",
        }
    }
}

impl fmt::Display for EngagementLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How the recommendation consumer should serve a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationStrategy {
    /// Series continuations and playlists.
    PlaylistAndSeriesFocused,
    /// Breadth and novelty.
    DiversityAndDiscoveryFocused,
    /// Highly rated, likely-to-finish content.
    QualityAndCompletionFocused,
    /// Heavy personalization from deep history.
    PersonalizedDeepRecommendations,
    /// Popular and trending content.
    PopularAndTrendingFocused,
}

/// Blend of recommendation signals for a strategy. Sums to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecommendationWeights {
    /// Similar-user signal.
    pub collaborative: f64,
    /// Item-similarity signal.
    pub content: f64,
    /// Global popularity signal.
    pub popularity: f64,
    /// Random / novelty exploration.
    pub exploration: f64,
}

impl RecommendationStrategy {
    /// Strategy for users outside every cluster.
    pub const DEFAULT: RecommendationStrategy = RecommendationStrategy::PopularAndTrendingFocused;

    /// Snake-case label.
    pub fn name(self) -> &'static str {
        match self {
            RecommendationStrategy::PlaylistAndSeriesFocused => "playlist_and_series_focused",
            RecommendationStrategy::DiversityAndDiscoveryFocused => {
                "diversity_and_discovery_focused"
            }
            RecommendationStrategy::QualityAndCompletionFocused => {
                "quality_and_completion_focused"
            }
            RecommendationStrategy::PersonalizedDeepRecommendations => {
                "personalized_deep_recommendations"
            }
            RecommendationStrategy::PopularAndTrendingFocused => "popular_and_trending_focused",
        }
    }

    /// Signal weighting hint for the consumer.
    pub fn weights(self) -> RecommendationWeights {
        let (collaborative, content, popularity, exploration) = match self {
            RecommendationStrategy::PlaylistAndSeriesFocused => (0.35, 0.40, 0.15, 0.10),
            RecommendationStrategy::DiversityAndDiscoveryFocused => (0.25, 0.25, 0.10, 0.40),
            RecommendationStrategy::QualityAndCompletionFocused => (0.30, 0.45, 0.15, 0.10),
            RecommendationStrategy::PersonalizedDeepRecommendations => (0.45, 0.35, 0.05, 0.15),
            RecommendationStrategy::PopularAndTrendingFocused => (0.20, 0.15, 0.50, 0.15),
        };
        RecommendationWeights {
            collaborative,
            content,
            popularity,
            exploration,
        }
    }
}

impl Default for RecommendationStrategy {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for RecommendationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Ordered archetype rules: a dominant feature whose name contains any
/// keyword maps to the archetype. Earlier rules win for names matching
/// several.
pub const ARCHETYPE_RULES: &[(&[&str], Archetype)] = &[
    (&["binge", "session_depth"], Archetype::BingeWatcher),
    (&["search", "exploration"], Archetype::ActiveExplorer),
    (&["completion", "quality"], Archetype::FocusedLearner),
    (&["diversity", "category"], Archetype::ContentExplorer),
];

/// Ordered strategy table; `None` matches any engagement level.
pub const STRATEGY_RULES: &[(Archetype, Option<EngagementLevel>, RecommendationStrategy)] = &[
    (Archetype::BingeWatcher, None, RecommendationStrategy::PlaylistAndSeriesFocused),
    (Archetype::ActiveExplorer, None, RecommendationStrategy::DiversityAndDiscoveryFocused),
    (Archetype::ContentExplorer, None, RecommendationStrategy::DiversityAndDiscoveryFocused),
    (
        Archetype::FocusedLearner,
        Some(EngagementLevel::High),
        RecommendationStrategy::PersonalizedDeepRecommendations,
    ),
    (Archetype::FocusedLearner, None, RecommendationStrategy::QualityAndCompletionFocused),
    (
        Archetype::CasualViewer,
        Some(EngagementLevel::High),
        RecommendationStrategy::PersonalizedDeepRecommendations,
    ),
    (Archetype::CasualViewer, None, RecommendationStrategy::PopularAndTrendingFocused),
];

/// Features that emit a content-preference tag.
pub const CONTENT_PREFERENCE_TAGS: &[(Feature, &str)] = &[
    (Feature::BingeTendency, "series_and_binge_content"),
    (Feature::ContentDiversity, "diverse_genres"),
    (Feature::CategoryExploration, "niche_categories"),
    (Feature::QualityFocus, "high_quality_content"),
    (Feature::WatchlistCommitment, "curated_watchlist"),
];

/// Features that emit a behavior-pattern tag.
pub const BEHAVIOR_PATTERN_TAGS: &[(Feature, &str)] = &[
    (Feature::SearchFrequency, "frequent_searcher"),
    (Feature::ExplorationDepth, "deep_explorer"),
    (Feature::ViewingConsistency, "consistent_viewer"),
    (Feature::WeekendPreference, "weekend_viewer"),
    (Feature::RatingActivity, "active_rater"),
    (Feature::ReviewDepth, "detailed_reviewer"),
    (Feature::RecentActivity, "recently_active"),
];

/// Map dominant feature names to an archetype.
///
/// The highest-ranked feature matching any rule decides.
pub fn archetype_for(dominant: &[Feature]) -> Archetype {
    dominant
        .iter()
        .find_map(|f| {
            let name = f.name();
            ARCHETYPE_RULES
                .iter()
                .find(|(keywords, _)| keywords.iter().any(|k| name.contains(k)))
                .map(|(_, archetype)| *archetype)
        })
        .unwrap_or(Archetype::CasualViewer)
}

/// Look up the strategy for an archetype at an engagement level.
pub fn strategy_for(archetype: Archetype, level: EngagementLevel) -> RecommendationStrategy {
    STRATEGY_RULES
        .iter()
        .find(|(a, l, _)| *a == archetype && l.map_or(true, |l| l == level))
        .map(|(_, _, s)| *s)
        .unwrap_or(RecommendationStrategy::DEFAULT)
}

/// A feature that stands out in a cluster's centroid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DominantFeature {
    /// Which feature.
    pub feature: Feature,
    /// Centroid value.
    pub value: f64,
    /// Share of the dominant features' total value.
    pub importance: f64,
}

/// Human-interpretable description of a cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterCharacteristics {
    /// Top features by centroid value, descending.
    pub dominant_features: Vec<DominantFeature>,
    /// Inferred archetype.
    pub archetype: Archetype,
    /// Engagement level.
    pub engagement_level: EngagementLevel,
    /// Content preference tags.
    pub content_preferences: Vec<String>,
    /// Behavior pattern tags.
    pub behavior_patterns: Vec<String>,
    /// Strategy for the recommendation consumer.
    pub recommendation_strategy: RecommendationStrategy,
}

/// Derives [`ClusterCharacteristics`] from cluster rows.
#[derive(Debug, Clone, Default)]
pub struct ClusterCharacterizer;

impl ClusterCharacterizer {
    /// Create a characterizer.
    pub fn new() -> Self {
        Self
    }

    /// Characterize a cluster from its members' rows.
    ///
    /// `rows` are unscaled `[0, 1]` values whose columns are `features`.
    pub fn characterize(
        &self,
        rows: ArrayView2<'_, f64>,
        features: &[Feature],
    ) -> ClusterCharacteristics {
        let centroid = rows
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(features.len()));
        self.characterize_centroid(centroid.view(), features)
    }

    /// Characterize a cluster from its centroid.
    pub fn characterize_centroid(
        &self,
        centroid: ArrayView1<'_, f64>,
        features: &[Feature],
    ) -> ClusterCharacteristics {
        let value_of = |f: Feature| -> Option<f64> {
            features.iter().position(|&g| g == f).map(|i| centroid[i])
        };

        let mut ranked: Vec<(Feature, f64)> = features
            .iter()
            .zip(centroid.iter())
            .filter(|(_, v)| **v > 0.0)
            .map(|(&f, &v)| (f, v))
            .collect();
        // Stable: ties keep column order.
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked.truncate(DOMINANT_FEATURES);

        let total: f64 = ranked.iter().map(|(_, v)| v).sum();
        let dominant_features: Vec<DominantFeature> = ranked
            .iter()
            .map(|&(feature, value)| DominantFeature {
                feature,
                value,
                importance: if total > 0.0 { value / total } else { 0.0 },
            })
            .collect();

        let names: Vec<Feature> = ranked.iter().map(|(f, _)| *f).collect();
        let archetype = archetype_for(&names);

        let engagement_level = EngagementLevel::from_score(engagement_score(&ranked));

        let tags = |table: &[(Feature, &str)]| -> Vec<String> {
            table
                .iter()
                .filter(|(f, _)| value_of(*f).is_some_and(|v| v > TAG_THRESHOLD))
                .map(|(_, tag)| (*tag).to_string())
                .collect()
        };

        ClusterCharacteristics {
            dominant_features,
            archetype,
            engagement_level,
            content_preferences: tags(CONTENT_PREFERENCE_TAGS),
            behavior_patterns: tags(BEHAVIOR_PATTERN_TAGS),
            recommendation_strategy: strategy_for(archetype, engagement_level),
        }
    }
}

/// Mean of engagement/activity-named dominant features, 0 when none is
/// dominant.
fn engagement_score(ranked: &[(Feature, f64)]) -> f64 {
    let named: Vec<f64> = ranked
        .iter()
        .filter(|(f, _)| f.name().contains("engagement") || f.name().contains("activity"))
        .map(|(_, v)| *v)
        .collect();
    if named.is_empty() {
        0.0
    } else {
        named.iter().sum::<f64>() / named.len() as f64
    }
}
