//! Raw behavior → fixed-length feature vectors.
//!
//! Each feature blends one to five raw signals with fixed weights and is
//! clamped to `[0, 1]`. Unbounded signals (counts, lengths, frequencies) are
//! normalized against dataset-wide means:
//!
//! ```text
//! relative(x) = min(x / (2 · mean), 1)      (0 when mean = 0)
//! ```
//!
//! so a user at the population mean lands at 0.5.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use super::behavior::RawUserBehavior;
use super::schema::Feature;
use crate::error::{Error, Result};

/// Watchlist size treated as "full commitment".
const WATCHLIST_SATURATION: f64 = 50.0;
/// Upper bound of rating variance on a 1-5 scale.
const MAX_RATING_VARIANCE: f64 = 4.0;

/// Dataset-wide means used as normalization denominators.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetStats {
    /// Mean searches per week.
    pub mean_search_frequency: f64,
    /// Mean of users' average ratings (users who rated only).
    pub mean_rating: f64,
    /// Mean review length.
    pub mean_review_length: f64,
    /// Mean recent activity level.
    pub mean_recent_activity: f64,
    /// Mean number of ratings.
    pub mean_rating_count: f64,
}

impl DatasetStats {
    /// Compute the means over a population.
    pub fn from_users(users: &[RawUserBehavior]) -> Self {
        if users.is_empty() {
            return Self::default();
        }

        let mean = |f: fn(&RawUserBehavior) -> f64| -> f64 {
            users.iter().map(|u| sanitize(f(u))).sum::<f64>() / users.len() as f64
        };

        let rated: Vec<f64> = users
            .iter()
            .map(|u| sanitize(u.average_rating))
            .filter(|&r| r > 0.0)
            .collect();
        let mean_rating = if rated.is_empty() {
            0.0
        } else {
            rated.iter().sum::<f64>() / rated.len() as f64
        };

        Self {
            mean_search_frequency: mean(|u| u.search_frequency),
            mean_rating,
            mean_review_length: mean(|u| u.average_review_length),
            mean_recent_activity: mean(|u| u.recent_activity_level),
            mean_rating_count: mean(|u| u.rating_count),
        }
    }
}

/// One user's engineered features, in [`Feature::ALL`] order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Owning user.
    pub user_id: String,
    /// Values in `[0, 1]`, indexed by [`Feature::index`].
    pub values: Vec<f64>,
}

impl FeatureVector {
    /// Value of a single feature; `None` if the vector is too short.
    pub fn get(&self, feature: Feature) -> Option<f64> {
        self.values.get(feature.index()).copied()
    }
}

/// Derives [`FeatureVector`]s from raw behavior.
///
/// Pure and deterministic: the same population always yields the same
/// vectors.
#[derive(Debug, Clone, Default)]
pub struct FeatureEngineer;

impl FeatureEngineer {
    /// Create a feature engineer.
    pub fn new() -> Self {
        Self
    }

    /// Engineer features for every user, normalizing against the
    /// population's own statistics.
    pub fn engineer(&self, users: &[RawUserBehavior]) -> Vec<FeatureVector> {
        let stats = DatasetStats::from_users(users);
        tracing::debug!(
            n_users = users.len(),
            mean_search_frequency = stats.mean_search_frequency,
            mean_rating = stats.mean_rating,
            mean_review_length = stats.mean_review_length,
            mean_recent_activity = stats.mean_recent_activity,
            mean_rating_count = stats.mean_rating_count,
            "dataset statistics"
        );
        users
            .iter()
            .map(|u| self.engineer_one(u, &stats))
            .collect()
    }

    /// Engineer a single user's vector against precomputed statistics.
    pub fn engineer_one(&self, user: &RawUserBehavior, stats: &DatasetStats) -> FeatureVector {
        let completion = unit(user.completion_rate);
        let binge = unit(user.binge_tendency);
        let diversity = unit(user.content_diversity);
        let complexity = unit(user.search_complexity);
        let search_success = unit(user.search_success_rate);
        let watch_completion = unit(user.watchlist_completion);
        let consistency = unit(user.viewing_consistency);
        let weekend = unit(user.weekend_ratio);
        let hover = unit(user.hover_rate);
        let exploration = unit(user.exploration_depth);

        let search_freq = relative(user.search_frequency, stats.mean_search_frequency);
        let rating_activity = relative(user.rating_count, stats.mean_rating_count);
        let review_depth = relative(user.average_review_length, stats.mean_review_length);
        let recent = relative(user.recent_activity_level, stats.mean_recent_activity);
        let generosity = relative(user.average_rating, stats.mean_rating);
        let variability = unit(sanitize(user.rating_variance) / MAX_RATING_VARIANCE);
        let watchlist_fill = unit(sanitize(user.watchlist_size) / WATCHLIST_SATURATION);

        let mut values = vec![0.0; Feature::COUNT];
        let mut set = |f: Feature, v: f64| values[f.index()] = unit(v);

        set(
            Feature::EngagementIntensity,
            0.30 * completion
                + 0.20 * hover
                + 0.15 * search_freq
                + 0.15 * rating_activity
                + 0.20 * exploration,
        );
        set(Feature::CompletionRate, completion);
        set(Feature::SessionDepth, 0.6 * binge + 0.4 * completion);
        set(Feature::ActivityLevel, 0.6 * recent + 0.4 * consistency);
        set(Feature::HoverEngagement, hover);

        set(Feature::BingeTendency, binge);
        set(Feature::ContentDiversity, diversity);
        set(Feature::CategoryExploration, 0.6 * diversity + 0.4 * exploration);
        set(
            Feature::QualityFocus,
            0.5 * completion + 0.3 * generosity + 0.2 * watch_completion,
        );
        set(
            Feature::WatchlistCommitment,
            0.5 * watchlist_fill + 0.5 * watch_completion,
        );

        set(Feature::SearchFrequency, search_freq);
        set(Feature::SearchSophistication, complexity);
        set(Feature::SearchSuccess, search_success);
        set(Feature::ExplorationDepth, exploration);
        set(
            Feature::DiscoveryDrive,
            0.4 * exploration + 0.3 * diversity + 0.3 * search_freq,
        );

        set(Feature::RatingActivity, rating_activity);
        set(Feature::RatingGenerosity, generosity);
        set(Feature::RatingVariability, variability);
        set(Feature::ReviewDepth, review_depth);
        set(
            Feature::FeedbackEngagement,
            0.4 * rating_activity + 0.3 * review_depth + 0.3 * variability,
        );

        set(Feature::ViewingConsistency, consistency);
        set(Feature::WeekendPreference, weekend);
        set(Feature::RecentActivity, recent);
        set(
            Feature::TemporalRegularity,
            0.7 * consistency + 0.3 * (1.0 - weekend),
        );

        set(
            Feature::InteractionBreadth,
            0.25 * hover + 0.25 * rating_activity + 0.25 * watchlist_fill + 0.25 * search_freq,
        );

        FeatureVector {
            user_id: user.user_id.clone(),
            values,
        }
    }
}

/// Stack feature vectors into a `(users × features)` matrix.
///
/// Every vector must hold exactly [`Feature::COUNT`] values.
pub fn to_matrix(vectors: &[FeatureVector]) -> Result<Array2<f64>> {
    let mut m = Array2::zeros((vectors.len(), Feature::COUNT));
    for (mut row, v) in m.rows_mut().into_iter().zip(vectors) {
        if v.values.len() != Feature::COUNT {
            return Err(Error::DimensionMismatch {
                expected: Feature::COUNT,
                found: v.values.len(),
            });
        }
        row.iter_mut().zip(&v.values).for_each(|(dst, &x)| *dst = x);
    }
    Ok(m)
}

/// Non-finite and negative raw values count as 0.
#[inline]
fn sanitize(x: f64) -> f64 {
    if x.is_finite() && x > 0.0 {
        x
    } else {
        0.0
    }
}

#[inline]
fn unit(x: f64) -> f64 {
    sanitize(x).min(1.0)
}

#[inline]
fn relative(x: f64, mean: f64) -> f64 {
    if mean > 0.0 {
        unit(sanitize(x) / (2.0 * mean))
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str, scale: f64) -> RawUserBehavior {
        RawUserBehavior {
            user_id: id.to_string(),
            completion_rate: 0.8 * scale,
            binge_tendency: 0.5 * scale,
            content_diversity: 0.4,
            search_frequency: 10.0 * scale,
            search_complexity: 0.3,
            search_success_rate: 0.7,
            rating_count: 20.0 * scale,
            rating_variance: 1.0,
            average_rating: 4.0,
            average_review_length: 120.0 * scale,
            watchlist_size: 25.0,
            watchlist_completion: 0.5,
            viewing_consistency: 0.6,
            weekend_ratio: 0.3,
            recent_activity_level: 15.0 * scale,
            hover_rate: 0.4,
            exploration_depth: 0.5,
        }
    }

    #[test]
    fn features_are_bounded() {
        let users = vec![user("a", 1.0), user("b", 3.0), user("c", 0.1)];
        let vectors = FeatureEngineer::new().engineer(&users);
        assert_eq!(vectors.len(), 3);
        for v in &vectors {
            assert_eq!(v.values.len(), Feature::COUNT);
            for (j, &x) in v.values.iter().enumerate() {
                assert!((0.0..=1.0).contains(&x), "{} = {x}", Feature::ALL[j]);
            }
        }
    }

    #[test]
    fn mean_user_normalizes_to_half() {
        let users = vec![user("a", 1.0), user("b", 1.0)];
        let vectors = FeatureEngineer::new().engineer(&users);
        assert!((vectors[0].get(Feature::SearchFrequency).unwrap() - 0.5).abs() < 1e-12);
        assert!((vectors[0].get(Feature::RatingGenerosity).unwrap() - 0.5).abs() < 1e-12);
        assert!((vectors[0].get(Feature::RecentActivity).unwrap() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn engagement_intensity_uses_fixed_weights() {
        let users = vec![user("a", 1.0)];
        let v = &FeatureEngineer::new().engineer(&users)[0];
        // search_freq and rating_activity are both at the mean (0.5).
        let expected = 0.30 * 0.8 + 0.20 * 0.4 + 0.15 * 0.5 + 0.15 * 0.5 + 0.20 * 0.5;
        assert!((v.get(Feature::EngagementIntensity).unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn non_finite_inputs_become_zero() {
        let mut bad = user("x", 1.0);
        bad.completion_rate = f64::NAN;
        bad.search_frequency = f64::INFINITY;
        bad.rating_count = -3.0;
        let vectors = FeatureEngineer::new().engineer(&[bad, user("y", 1.0)]);
        for x in &vectors[0].values {
            assert!(x.is_finite());
        }
        assert_eq!(vectors[0].get(Feature::CompletionRate).unwrap(), 0.0);
        assert_eq!(vectors[0].get(Feature::RatingActivity).unwrap(), 0.0);
    }

    #[test]
    fn zero_means_do_not_divide() {
        let users = vec![RawUserBehavior::new("a"), RawUserBehavior::new("b")];
        let vectors = FeatureEngineer::new().engineer(&users);
        assert!(vectors.iter().all(|v| v.values.iter().all(|x| x.is_finite())));
    }

    #[test]
    fn deterministic() {
        let users = vec![user("a", 1.0), user("b", 2.0)];
        let fe = FeatureEngineer::new();
        assert_eq!(fe.engineer(&users), fe.engineer(&users));
    }

    #[test]
    fn matrix_layout() {
        let users = vec![user("a", 1.0), user("b", 2.0)];
        let vectors = FeatureEngineer::new().engineer(&users);
        let m = to_matrix(&vectors).unwrap();
        assert_eq!(m.dim(), (2, Feature::COUNT));
        assert_eq!(m[[1, Feature::BingeTendency.index()]], vectors[1].get(Feature::BingeTendency).unwrap());
    }

    #[test]
    fn wrong_width_vectors_are_rejected() {
        let wide = |id: &str| FeatureVector {
            user_id: id.to_string(),
            values: vec![0.5; Feature::COUNT + 1],
        };
        assert_eq!(
            to_matrix(&[wide("a"), wide("b")]).unwrap_err(),
            Error::DimensionMismatch {
                expected: Feature::COUNT,
                found: Feature::COUNT + 1,
            }
        );

        let short = FeatureVector {
            user_id: "c".to_string(),
            values: vec![0.5; 3],
        };
        assert_eq!(short.get(Feature::CompletionRate), Some(0.5));
        assert_eq!(short.get(Feature::InteractionBreadth), None);
    }
}
