//! Merge hierarchies produced by agglomerative clustering.

mod dendrogram;

pub use dendrogram::{Dendrogram, DendrogramNode, Merge};
