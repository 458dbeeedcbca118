//! Hierarchical (agglomerative) clustering.
//!
//! Starts from n singleton clusters and repeatedly merges the closest
//! pair under the chosen [`Linkage`] until the target count remains. Each
//! merge is recorded in a [`Dendrogram`].
//!
//! # Cluster distances
//!
//! Inter-cluster distances are derived from the precomputed point distance
//! matrix and updated in place after every merge (Lance–Williams form):
//!
//! ```text
//! single:   d(A∪B, C) = min(d(A,C), d(B,C))
//! complete: d(A∪B, C) = max(d(A,C), d(B,C))
//! average:  d(A∪B, C) = (|A|·d(A,C) + |B|·d(B,C)) / (|A| + |B|)
//! ```
//!
//! These equal the min / max / mean over all cross-cluster point pairs.
//!
//! # Tie-breaking
//!
//! Among pairs at the minimum distance the lexicographically smallest slot
//! pair `(a, b)` merges, and the merged cluster keeps slot `a`. Identical
//! input therefore always yields identical labels and dendrograms.
//!
//! Each slot caches its nearest higher-indexed neighbour, so a merge only
//! rescans the rows whose cached neighbour was invalidated.

use core::fmt;
use core::str::FromStr;

use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use super::traits::Clustering;
use crate::distance::{DistanceMatrix, DistanceMetric};
use crate::error::{Error, Result};
use crate::hierarchy::Dendrogram;

/// Linkage method for hierarchical clustering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Linkage {
    /// Single linkage: minimum distance between clusters.
    Single,
    /// Complete linkage: maximum distance between clusters.
    Complete,
    /// Average linkage: mean distance between clusters.
    #[default]
    Average,
    /// Distance between cluster centroids under the run's metric.
    ///
    /// This approximates Ward's method. True Ward merges the pair that
    /// minimizes the increase in within-cluster variance,
    /// `(nₐnᵦ / (nₐ + nᵦ)) · ‖μₐ - μᵦ‖²`; here cluster sizes are ignored.
    /// Centroid distances can shrink after a merge, so heights are not
    /// guaranteed monotone.
    Ward,
}

impl Linkage {
    /// All linkage methods.
    pub const ALL: &'static [Linkage] = &[
        Linkage::Single,
        Linkage::Complete,
        Linkage::Average,
        Linkage::Ward,
    ];

    /// Snake-case name.
    pub fn name(self) -> &'static str {
        match self {
            Linkage::Single => "single",
            Linkage::Complete => "complete",
            Linkage::Average => "average",
            Linkage::Ward => "ward",
        }
    }

    /// Whether merge heights never decrease along the merge sequence.
    pub fn is_monotone(self) -> bool {
        !matches!(self, Linkage::Ward)
    }
}

impl fmt::Display for Linkage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Linkage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Linkage::ALL
            .iter()
            .copied()
            .find(|l| l.name() == s)
            .ok_or_else(|| Error::unknown("linkage", s))
    }
}

/// Output of an agglomerative run.
#[derive(Debug, Clone)]
pub struct Agglomeration {
    /// Cluster label per point, numbered by first appearance.
    pub labels: Vec<usize>,
    /// Number of clusters in `labels` (the request, capped at n).
    pub n_clusters: usize,
    /// Merge history. Complete unless the clusterer stopped at k.
    pub dendrogram: Dendrogram,
}

/// Hierarchical (agglomerative) clustering.
#[derive(Debug, Clone)]
pub struct AgglomerativeClustering {
    /// Number of clusters to produce.
    n_clusters: usize,
    /// Linkage method.
    linkage: Linkage,
    /// Keep merging past k to build the full dendrogram.
    full_tree: bool,
}

impl AgglomerativeClustering {
    /// Create a new hierarchical clusterer.
    pub fn new(n_clusters: usize) -> Self {
        Self {
            n_clusters,
            linkage: Linkage::Average,
            full_tree: true,
        }
    }

    /// Set linkage method.
    pub fn with_linkage(mut self, linkage: Linkage) -> Self {
        self.linkage = linkage;
        self
    }

    /// Merge all the way to a single root (default) or stop at k.
    pub fn with_full_tree(mut self, full_tree: bool) -> Self {
        self.full_tree = full_tree;
        self
    }

    /// Configured linkage.
    pub fn linkage(&self) -> Linkage {
        self.linkage
    }

    /// Run the merge loop.
    ///
    /// If `n_clusters >= n` every point stays its own cluster. Any
    /// non-finite distance fails the run.
    pub fn fit(&self, data: ArrayView2<'_, f64>, distances: &DistanceMatrix) -> Result<Agglomeration> {
        let n = data.nrows();
        if n == 0 {
            return Err(Error::EmptyInput);
        }
        if distances.len() != n {
            return Err(Error::DimensionMismatch {
                expected: n,
                found: distances.len(),
            });
        }
        if self.n_clusters == 0 {
            return Err(Error::invalid_parameter("n_clusters", "must be at least 1"));
        }
        for i in 0..n {
            for j in (i + 1)..n {
                if !distances.get(i, j).is_finite() {
                    return Err(Error::NonFiniteDistance { i, j });
                }
            }
        }

        let k = self.n_clusters.min(n);
        let target = if self.full_tree { 1 } else { k };

        let mut state = MergeState::new(data, distances, self.linkage);
        let mut dendrogram = Dendrogram::new(n);
        while state.n_active > target {
            let (a, b, height) = state.closest_pair();
            let new_id = n + dendrogram.n_merges();
            let (id_a, id_b, size) = state.merge(a, b, new_id);
            dendrogram.add_merge(id_a, id_b, height, size);
        }

        let labels = dendrogram.cut_to_k(k)?;
        Ok(Agglomeration {
            labels,
            n_clusters: k,
            dendrogram,
        })
    }
}

impl Clustering for AgglomerativeClustering {
    fn fit_predict(&self, data: ArrayView2<'_, f64>, distances: &DistanceMatrix) -> Result<Vec<usize>> {
        // Labels only: no need for merges past k.
        let run = self.clone().with_full_tree(false).fit(data, distances)?;
        Ok(run.labels)
    }

    fn n_clusters(&self) -> usize {
        self.n_clusters
    }
}

/// Mutable cluster state over slots `0..n`.
struct MergeState {
    linkage: Linkage,
    metric: DistanceMetric,
    /// Inter-cluster distances between active slots.
    dist: Array2<f64>,
    active: Vec<bool>,
    /// Dendrogram id currently held by each slot.
    ids: Vec<usize>,
    sizes: Vec<usize>,
    /// Per-slot centroids, only for [`Linkage::Ward`].
    centroids: Option<Array2<f64>>,
    /// Nearest active slot `j > i` and its distance.
    nn: Vec<usize>,
    nn_dist: Vec<f64>,
    n_active: usize,
}

impl MergeState {
    fn new(data: ArrayView2<'_, f64>, distances: &DistanceMatrix, linkage: Linkage) -> Self {
        let n = data.nrows();
        let mut state = Self {
            linkage,
            metric: distances.metric(),
            dist: distances.view().to_owned(),
            active: vec![true; n],
            ids: (0..n).collect(),
            sizes: vec![1; n],
            centroids: matches!(linkage, Linkage::Ward).then(|| data.to_owned()),
            nn: vec![usize::MAX; n],
            nn_dist: vec![f64::INFINITY; n],
            n_active: n,
        };
        for i in 0..n {
            state.refresh_neighbour(i);
        }
        state
    }

    fn refresh_neighbour(&mut self, i: usize) {
        let mut best = usize::MAX;
        let mut best_dist = f64::INFINITY;
        for j in (i + 1)..self.active.len() {
            if self.active[j] && self.dist[[i, j]] < best_dist {
                best = j;
                best_dist = self.dist[[i, j]];
            }
        }
        self.nn[i] = best;
        self.nn_dist[i] = best_dist;
    }

    /// Lexicographically smallest closest pair `(a, b)`, `a < b`.
    fn closest_pair(&self) -> (usize, usize, f64) {
        let mut best = (usize::MAX, usize::MAX, f64::INFINITY);
        for i in 0..self.active.len() {
            if self.active[i] && self.nn[i] != usize::MAX && self.nn_dist[i] < best.2 {
                best = (i, self.nn[i], self.nn_dist[i]);
            }
        }
        best
    }

    /// Merge slot `b` into slot `a`; returns the two merged ids and the new size.
    fn merge(&mut self, a: usize, b: usize, new_id: usize) -> (usize, usize, usize) {
        let (na, nb) = (self.sizes[a], self.sizes[b]);
        let merged = (self.ids[a], self.ids[b], na + nb);

        if let Some(centroids) = self.centroids.as_mut() {
            let combined = (&centroids.row(a) * na as f64 + &centroids.row(b) * nb as f64)
                / (na + nb) as f64;
            centroids.row_mut(a).assign(&combined);
        }

        self.active[b] = false;
        self.n_active -= 1;
        self.sizes[a] = na + nb;
        self.ids[a] = new_id;

        for c in 0..self.active.len() {
            if !self.active[c] || c == a {
                continue;
            }
            let (dac, dbc) = (self.dist[[a, c]], self.dist[[b, c]]);
            let updated = match self.linkage {
                Linkage::Single => dac.min(dbc),
                Linkage::Complete => dac.max(dbc),
                Linkage::Average => (na as f64 * dac + nb as f64 * dbc) / (na + nb) as f64,
                Linkage::Ward => match self.centroids.as_ref() {
                    Some(centroids) => self.metric.distance(centroids.row(a), centroids.row(c)),
                    None => dac.min(dbc),
                },
            };
            self.dist[[a, c]] = updated;
            self.dist[[c, a]] = updated;
        }

        self.refresh_neighbour(a);
        for c in 0..b {
            if !self.active[c] || c == a {
                continue;
            }
            if self.nn[c] == a || self.nn[c] == b {
                self.refresh_neighbour(c);
            } else if c < a {
                let d = self.dist[[c, a]];
                if d < self.nn_dist[c] || (d == self.nn_dist[c] && a < self.nn[c]) {
                    self.nn[c] = a;
                    self.nn_dist[c] = d;
                }
            }
        }

        merged
    }
}
