//! Agglomerative clustering.
//!
//! Bottom-up: start with each user as its own cluster, repeatedly merge
//! the two closest clusters. The merge history forms a **dendrogram**; the
//! state after `n - k` merges is the k-cluster partition.
//!
//! See [`Linkage`] for the inter-cluster distance rules.
//!
//! ## Usage
//!
//! ```rust
//! use cohort::cluster::{AgglomerativeClustering, Clustering, Linkage};
//! use cohort::distance::{DistanceMatrix, DistanceMetric};
//! use ndarray::array;
//!
//! let data = array![[0.0, 0.0], [0.1, 0.1], [10.0, 10.0], [10.1, 10.1]];
//! let distances = DistanceMatrix::build(data.view(), DistanceMetric::Euclidean).unwrap();
//!
//! let labels = AgglomerativeClustering::new(2)
//!     .with_linkage(Linkage::Complete)
//!     .fit_predict(data.view(), &distances)
//!     .unwrap();
//! assert_eq!(labels, vec![0, 0, 1, 1]);
//! ```

mod hierarchical;
mod traits;

pub use hierarchical::{Agglomeration, AgglomerativeClustering, Linkage};
pub use traits::Clustering;
