//! Fixed feature schema.
//!
//! Every user is described by the same ordered set of [`Feature`]s. Column
//! `i` of an engineered matrix is always `Feature::ALL[i]`, so selection and
//! weighting index by enum rather than by string key.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Behavioral dimension a feature belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureGroup {
    /// How intensely the user engages.
    Engagement,
    /// What and how the user watches.
    Consumption,
    /// How the user finds content.
    Discovery,
    /// How the user rates and reviews.
    Feedback,
    /// When the user is active.
    Temporal,
    /// Breadth of interaction with the platform.
    Interaction,
}

macro_rules! features {
    ($($variant:ident => $name:literal, $group:ident;)+) => {
        /// A named scalar feature in `[0, 1]`.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum Feature {
            $(
                #[allow(missing_docs)]
                $variant,
            )+
        }

        impl Feature {
            /// All features in column order.
            pub const ALL: &'static [Feature] = &[$(Feature::$variant),+];

            /// Snake-case name, stable across releases.
            pub fn name(self) -> &'static str {
                match self {
                    $(Feature::$variant => $name,)+
                }
            }

            /// Behavioral group.
            pub fn group(self) -> FeatureGroup {
                match self {
                    $(Feature::$variant => FeatureGroup::$group,)+
                }
            }
        }
    };
}

features! {
    EngagementIntensity => "engagement_intensity", Engagement;
    CompletionRate => "completion_rate", Engagement;
    SessionDepth => "session_depth", Engagement;
    ActivityLevel => "activity_level", Engagement;
    HoverEngagement => "hover_engagement", Engagement;
    BingeTendency => "binge_tendency", Consumption;
    ContentDiversity => "content_diversity", Consumption;
    CategoryExploration => "category_exploration", Consumption;
    QualityFocus => "quality_focus", Consumption;
    WatchlistCommitment => "watchlist_commitment", Consumption;
    SearchFrequency => "search_frequency", Discovery;
    SearchSophistication => "search_sophistication", Discovery;
    SearchSuccess => "search_success", Discovery;
    ExplorationDepth => "exploration_depth", Discovery;
    DiscoveryDrive => "discovery_drive", Discovery;
    RatingActivity => "rating_activity", Feedback;
    RatingGenerosity => "rating_generosity", Feedback;
    RatingVariability => "rating_variability", Feedback;
    ReviewDepth => "review_depth", Feedback;
    FeedbackEngagement => "feedback_engagement", Feedback;
    ViewingConsistency => "viewing_consistency", Temporal;
    WeekendPreference => "weekend_preference", Temporal;
    RecentActivity => "recent_activity", Temporal;
    TemporalRegularity => "temporal_regularity", Temporal;
    InteractionBreadth => "interaction_breadth", Interaction;
}

impl Feature {
    /// Number of features in the schema.
    pub const COUNT: usize = Feature::ALL.len();

    /// Column index in an engineered matrix.
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Feature {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Feature::ALL
            .iter()
            .copied()
            .find(|f| f.name() == s)
            .ok_or_else(|| Error::unknown("feature", s))
    }
}
