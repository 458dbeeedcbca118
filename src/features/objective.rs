//! Clustering objectives: named, weighted feature subsets.
//!
//! An objective focuses a run on one behavioral dimension. Selecting an
//! objective keeps only its features and multiplies each column by the
//! feature's weight, so heavier features dominate distances.

use core::fmt;
use core::str::FromStr;

use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use super::schema::Feature;
use crate::error::{Error, Result};

/// A named clustering objective.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Objective {
    /// Every feature at weight 1.
    #[default]
    Comprehensive,
    /// How intensely users engage.
    EngagementLevels,
    /// What and how users watch.
    ContentConsumption,
    /// How users find content.
    DiscoveryBehavior,
    /// How users rate and review.
    FeedbackPersonality,
    /// When users are active.
    TemporalUsage,
}

const ENGAGEMENT_LEVELS: &[(Feature, f64)] = &[
    (Feature::EngagementIntensity, 1.0),
    (Feature::CompletionRate, 0.8),
    (Feature::SessionDepth, 0.8),
    (Feature::ActivityLevel, 0.9),
    (Feature::HoverEngagement, 0.6),
];

const CONTENT_CONSUMPTION: &[(Feature, f64)] = &[
    (Feature::BingeTendency, 1.0),
    (Feature::ContentDiversity, 0.9),
    (Feature::CategoryExploration, 0.8),
    (Feature::QualityFocus, 0.7),
    (Feature::WatchlistCommitment, 0.6),
    (Feature::CompletionRate, 0.5),
];

const DISCOVERY_BEHAVIOR: &[(Feature, f64)] = &[
    (Feature::SearchFrequency, 1.0),
    (Feature::SearchSophistication, 0.8),
    (Feature::SearchSuccess, 0.7),
    (Feature::ExplorationDepth, 0.9),
    (Feature::DiscoveryDrive, 1.0),
];

const FEEDBACK_PERSONALITY: &[(Feature, f64)] = &[
    (Feature::RatingActivity, 1.0),
    (Feature::RatingGenerosity, 0.8),
    (Feature::RatingVariability, 0.7),
    (Feature::ReviewDepth, 0.9),
    (Feature::FeedbackEngagement, 0.8),
];

const TEMPORAL_USAGE: &[(Feature, f64)] = &[
    (Feature::ViewingConsistency, 1.0),
    (Feature::WeekendPreference, 0.8),
    (Feature::RecentActivity, 0.9),
    (Feature::TemporalRegularity, 0.7),
];

impl Objective {
    /// All objectives.
    pub const ALL: &'static [Objective] = &[
        Objective::Comprehensive,
        Objective::EngagementLevels,
        Objective::ContentConsumption,
        Objective::DiscoveryBehavior,
        Objective::FeedbackPersonality,
        Objective::TemporalUsage,
    ];

    /// Snake-case name.
    pub fn name(self) -> &'static str {
        match self {
            Objective::Comprehensive => "comprehensive",
            Objective::EngagementLevels => "engagement_levels",
            Objective::ContentConsumption => "content_consumption",
            Objective::DiscoveryBehavior => "discovery_behavior",
            Objective::FeedbackPersonality => "feedback_personality",
            Objective::TemporalUsage => "temporal_usage",
        }
    }

    /// Selected features and their weights, in column order of the
    /// resulting sub-matrix.
    pub fn weighted_features(self) -> Vec<(Feature, f64)> {
        match self {
            Objective::Comprehensive => Feature::ALL.iter().map(|&f| (f, 1.0)).collect(),
            Objective::EngagementLevels => ENGAGEMENT_LEVELS.to_vec(),
            Objective::ContentConsumption => CONTENT_CONSUMPTION.to_vec(),
            Objective::DiscoveryBehavior => DISCOVERY_BEHAVIOR.to_vec(),
            Objective::FeedbackPersonality => FEEDBACK_PERSONALITY.to_vec(),
            Objective::TemporalUsage => TEMPORAL_USAGE.to_vec(),
        }
    }

    /// Selected features without weights.
    pub fn features(self) -> Vec<Feature> {
        self.weighted_features().into_iter().map(|(f, _)| f).collect()
    }
}

/// Keep the objective's columns of a full engineered matrix, scaled by
/// weight.
///
/// `matrix` must have [`Feature::COUNT`] columns in schema order.
pub fn select(matrix: ArrayView2<'_, f64>, objective: Objective) -> Result<Array2<f64>> {
    if matrix.ncols() != Feature::COUNT {
        return Err(Error::DimensionMismatch {
            expected: Feature::COUNT,
            found: matrix.ncols(),
        });
    }
    let selected = objective.weighted_features();
    let mut out = Array2::zeros((matrix.nrows(), selected.len()));
    for (col, (feature, weight)) in selected.iter().enumerate() {
        let src = matrix.column(feature.index());
        out.column_mut(col).assign(&src.mapv(|x| x * weight));
    }
    Ok(out)
}

/// Keep the objective's columns without weighting.
pub fn select_unweighted(matrix: ArrayView2<'_, f64>, objective: Objective) -> Result<Array2<f64>> {
    if matrix.ncols() != Feature::COUNT {
        return Err(Error::DimensionMismatch {
            expected: Feature::COUNT,
            found: matrix.ncols(),
        });
    }
    let features = objective.features();
    let idx: Vec<usize> = features.iter().map(|f| f.index()).collect();
    Ok(matrix.select(ndarray::Axis(1), &idx))
}

impl fmt::Display for Objective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Objective {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Objective::ALL
            .iter()
            .copied()
            .find(|o| o.name() == s)
            .ok_or_else(|| Error::unknown("objective", s))
    }
}
