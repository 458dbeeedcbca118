//! Dendrogram for agglomerative clustering.
//!
//! A dendrogram records the order and height of every merge. Ids follow the
//! SciPy convention: leaves are `0..n`, and merge `i` creates cluster
//! `n + i`.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Merge log of an agglomerative run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dendrogram {
    /// Merge history in the order merges happened.
    merges: Vec<Merge>,
    /// Number of original items.
    n_items: usize,
}

/// A single merge operation in the dendrogram.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Merge {
    /// First cluster being merged (id).
    pub cluster_a: usize,
    /// Second cluster being merged (id).
    pub cluster_b: usize,
    /// Linkage distance at which the merge occurred.
    pub distance: f64,
    /// Size of resulting cluster.
    pub size: usize,
}

/// Binary tree view of a dendrogram.
///
/// Leaves are single users (`count == 1`, `distance == 0`); the root is the
/// last merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DendrogramNode {
    /// Cluster id (leaf index or `n + merge index`).
    pub id: usize,
    /// Left child.
    pub left: Option<Box<DendrogramNode>>,
    /// Right child.
    pub right: Option<Box<DendrogramNode>>,
    /// Merge distance (0 for leaves).
    pub distance: f64,
    /// Number of leaves below this node.
    pub count: usize,
}

impl DendrogramNode {
    /// A leaf for item `id`.
    pub fn leaf(id: usize) -> Self {
        Self {
            id,
            left: None,
            right: None,
            distance: 0.0,
            count: 1,
        }
    }

    /// True if this node has no children.
    pub fn is_leaf(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }

    /// Leaf ids below this node, left to right.
    pub fn leaves(&self) -> Vec<usize> {
        let mut out = Vec::with_capacity(self.count);
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            if node.is_leaf() {
                out.push(node.id);
            }
            if let Some(r) = &node.right {
                stack.push(r);
            }
            if let Some(l) = &node.left {
                stack.push(l);
            }
        }
        out
    }
}

impl Dendrogram {
    /// Create a new dendrogram for n items.
    pub fn new(n_items: usize) -> Self {
        Self {
            merges: Vec::with_capacity(n_items.saturating_sub(1)),
            n_items,
        }
    }

    /// Record a merge operation.
    pub fn add_merge(&mut self, cluster_a: usize, cluster_b: usize, distance: f64, size: usize) {
        self.merges.push(Merge {
            cluster_a,
            cluster_b,
            distance,
            size,
        });
    }

    /// Assignments after replaying the first `n - k` merges.
    ///
    /// Replaying merge order (rather than cutting at a height) stays correct
    /// when merge heights are tied or non-monotone. Labels are numbered by
    /// first appearance in item order.
    pub fn cut_to_k(&self, k: usize) -> Result<Vec<usize>> {
        if k == 0 {
            return Err(Error::invalid_parameter("k", "must be at least 1"));
        }
        if k >= self.n_items {
            return Ok((0..self.n_items).collect());
        }

        let n_merges = self.n_items - k;
        if n_merges > self.merges.len() {
            return Err(Error::invalid_parameter(
                "k",
                format!(
                    "{} clusters need {} merges, dendrogram has {}",
                    k,
                    n_merges,
                    self.merges.len()
                ),
            ));
        }

        // Union-find over leaf and merge ids.
        let mut parent: Vec<usize> = (0..(self.n_items + n_merges)).collect();
        fn find(parent: &mut [usize], mut x: usize) -> usize {
            while parent[x] != x {
                parent[x] = parent[parent[x]];
                x = parent[x];
            }
            x
        }

        for (i, merge) in self.merges.iter().take(n_merges).enumerate() {
            let new_id = self.n_items + i;
            let ra = find(&mut parent, merge.cluster_a);
            let rb = find(&mut parent, merge.cluster_b);
            parent[ra] = new_id;
            parent[rb] = new_id;
        }

        let mut next = 0;
        let mut renumber: Vec<Option<usize>> = vec![None; parent.len()];
        let mut labels = Vec::with_capacity(self.n_items);
        for item in 0..self.n_items {
            let root = find(&mut parent, item);
            let label = *renumber[root].get_or_insert_with(|| {
                next += 1;
                next - 1
            });
            labels.push(label);
        }
        Ok(labels)
    }

    /// Build the binary tree of all recorded merges.
    ///
    /// Returns one node per remaining top-level cluster: a single root when
    /// the dendrogram is complete, several when merging stopped early.
    pub fn forest(&self) -> Vec<DendrogramNode> {
        let mut slots: Vec<Option<DendrogramNode>> =
            (0..self.n_items).map(|i| Some(DendrogramNode::leaf(i))).collect();

        for (i, merge) in self.merges.iter().enumerate() {
            let left = slots.get_mut(merge.cluster_a).and_then(Option::take);
            let right = slots.get_mut(merge.cluster_b).and_then(Option::take);
            let count = left.as_ref().map_or(0, |n| n.count) + right.as_ref().map_or(0, |n| n.count);
            slots.push(Some(DendrogramNode {
                id: self.n_items + i,
                left: left.map(Box::new),
                right: right.map(Box::new),
                distance: merge.distance,
                count,
            }));
        }

        slots.into_iter().flatten().collect()
    }

    /// Root of a complete dendrogram, `None` if merging stopped early or
    /// there are no items.
    pub fn root(&self) -> Option<DendrogramNode> {
        let mut forest = self.forest();
        if forest.len() == 1 {
            forest.pop()
        } else {
            None
        }
    }

    /// True once every item has been merged into one cluster.
    pub fn is_complete(&self) -> bool {
        self.n_items > 0 && self.merges.len() + 1 == self.n_items
    }

    /// Number of original items.
    pub fn n_items(&self) -> usize {
        self.n_items
    }

    /// Number of merges recorded.
    pub fn n_merges(&self) -> usize {
        self.merges.len()
    }

    /// Iterate over merges.
    pub fn merges(&self) -> impl Iterator<Item = &Merge> {
        self.merges.iter()
    }

    /// Get the merge distances (for visualization).
    pub fn distances(&self) -> Vec<f64> {
        self.merges.iter().map(|m| m.distance).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn four_items() -> Dendrogram {
        let mut dendro = Dendrogram::new(4);
        dendro.add_merge(0, 1, 0.5, 2);
        dendro.add_merge(2, 3, 0.7, 2);
        dendro.add_merge(4, 5, 1.0, 4);
        dendro
    }

    #[test]
    fn test_dendrogram_creation() {
        let dendro = Dendrogram::new(5);
        assert_eq!(dendro.n_items(), 5);
        assert_eq!(dendro.n_merges(), 0);
        assert!(!dendro.is_complete());
    }

    #[test]
    fn test_cut_to_k() {
        let dendro = four_items();
        assert_eq!(dendro.cut_to_k(4).unwrap(), vec![0, 1, 2, 3]);
        assert_eq!(dendro.cut_to_k(3).unwrap(), vec![0, 0, 1, 2]);
        assert_eq!(dendro.cut_to_k(2).unwrap(), vec![0, 0, 1, 1]);
        assert_eq!(dendro.cut_to_k(1).unwrap(), vec![0, 0, 0, 0]);
        assert!(dendro.cut_to_k(0).is_err());
    }

    #[test]
    fn test_cut_beyond_recorded_merges_fails() {
        let mut dendro = Dendrogram::new(4);
        dendro.add_merge(0, 1, 0.5, 2);
        assert!(dendro.cut_to_k(3).is_ok());
        assert!(dendro.cut_to_k(2).is_err());
    }

    #[test]
    fn test_root_tree() {
        let dendro = four_items();
        assert!(dendro.is_complete());
        let root = dendro.root().unwrap();
        assert_eq!(root.id, 6);
        assert_eq!(root.count, 4);
        assert_eq!(root.distance, 1.0);
        assert_eq!(root.leaves(), vec![0, 1, 2, 3]);
        let left = root.left.as_ref().unwrap();
        assert_eq!(left.id, 4);
        assert_eq!(left.leaves(), vec![0, 1]);
    }

    #[test]
    fn test_partial_forest() {
        let mut dendro = Dendrogram::new(3);
        dendro.add_merge(0, 2, 0.1, 2);
        assert!(dendro.root().is_none());
        let forest = dendro.forest();
        assert_eq!(forest.len(), 2);
        assert_eq!(forest[0].id, 1);
        assert_eq!(forest[1].leaves(), vec![0, 2]);
    }

    #[test]
    fn test_single_item_root_is_leaf() {
        let dendro = Dendrogram::new(1);
        let root = dendro.root().unwrap();
        assert!(root.is_leaf());
        assert_eq!(root.count, 1);
    }
}
