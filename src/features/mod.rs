//! Feature engineering.
//!
//! Raw behavior aggregates ([`RawUserBehavior`]) become fixed-length vectors
//! over the [`Feature`] schema via [`FeatureEngineer`]. An [`Objective`]
//! then narrows and weights the columns for focused clustering.

mod behavior;
mod engineer;
mod objective;
mod schema;

pub use behavior::RawUserBehavior;
pub use engineer::{to_matrix, DatasetStats, FeatureEngineer, FeatureVector};
pub use objective::{select, select_unweighted, Objective};
pub use schema::{Feature, FeatureGroup};
