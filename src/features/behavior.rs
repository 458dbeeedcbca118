//! Raw per-user behavior aggregates.

use serde::{Deserialize, Serialize};

/// Aggregated behavior statistics for one user.
///
/// Produced upstream by the behavior aggregation service; this crate treats
/// it as immutable input. Rates are expected in `[0, 1]`, counts and lengths
/// are unbounded and get normalized against dataset means.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawUserBehavior {
    /// Canonical user id.
    pub user_id: String,
    /// Fraction of started videos that were finished.
    pub completion_rate: f64,
    /// Tendency to watch several episodes back to back.
    pub binge_tendency: f64,
    /// Spread of watched content across genres.
    pub content_diversity: f64,
    /// Searches per week.
    pub search_frequency: f64,
    /// Average query complexity (filters, terms).
    pub search_complexity: f64,
    /// Fraction of searches that led to a play.
    pub search_success_rate: f64,
    /// Number of ratings given.
    pub rating_count: f64,
    /// Variance of the user's ratings on a 1-5 scale.
    pub rating_variance: f64,
    /// Mean rating on a 1-5 scale, 0 when the user never rated.
    pub average_rating: f64,
    /// Mean review length in characters.
    pub average_review_length: f64,
    /// Items on the watchlist.
    pub watchlist_size: f64,
    /// Fraction of watchlist items that were watched.
    pub watchlist_completion: f64,
    /// Regularity of viewing across days.
    pub viewing_consistency: f64,
    /// Fraction of viewing that happens on weekends.
    pub weekend_ratio: f64,
    /// Actions in the recent window.
    pub recent_activity_level: f64,
    /// Hover-to-impression ratio on catalog tiles.
    pub hover_rate: f64,
    /// How deep into the catalog the user browses.
    pub exploration_depth: f64,
}

impl RawUserBehavior {
    /// A record with every statistic zeroed.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Default::default()
        }
    }
}
