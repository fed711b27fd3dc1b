use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::Shape;

/// A split feature: the difference between two entries of a stage's
/// feature pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitFeature {
    /// Index of the first pool location.
    pub idx1: u32,
    /// Index of the second pool location.
    pub idx2: u32,
}

impl SplitFeature {
    /// Pixel intensity difference of this feature.
    #[inline]
    pub fn value(&self, feature_values: &[f32]) -> f32 {
        feature_values[self.idx1 as usize] - feature_values[self.idx2 as usize]
    }
}

/// A node in the regression tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    /// Internal split node.
    Split {
        feature: SplitFeature,
        threshold: f32,
        left: u32,
        right: u32,
    },
    /// Leaf node containing shape delta.
    Leaf { delta: Shape },
}

/// A single regression tree.
///
/// The tree predicts a shape delta by:
/// 1. Starting at the root node
/// 2. At each split, computing a pixel intensity difference feature
/// 3. Going left if feature > threshold, right otherwise
/// 4. Returning the shape delta at the reached leaf
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    pub nodes: Vec<TreeNode>,
}

impl RegressionTree {
    /// Create a new regression tree with the given nodes.
    /// Node 0 is the root.
    pub fn new(nodes: Vec<TreeNode>) -> Self {
        Self { nodes }
    }

    /// Build a complete binary tree from its split nodes in breadth-first
    /// order followed by its leaves. Split `i` has children `2i + 1` and
    /// `2i + 2`.
    pub fn from_splits_and_leaves(splits: Vec<(SplitFeature, f32)>, leaves: Vec<Shape>) -> Self {
        debug_assert_eq!(leaves.len(), splits.len() + 1);
        let mut nodes = Vec::with_capacity(splits.len() + leaves.len());
        for (i, (feature, threshold)) in splits.into_iter().enumerate() {
            nodes.push(TreeNode::Split {
                feature,
                threshold,
                left: (2 * i + 1) as u32,
                right: (2 * i + 2) as u32,
            });
        }
        nodes.extend(leaves.into_iter().map(|delta| TreeNode::Leaf { delta }));
        Self { nodes }
    }

    /// Inverse of [`RegressionTree::from_splits_and_leaves`]. Returns `None`
    /// when the tree is not laid out as a complete binary tree.
    pub fn splits_and_leaves(&self) -> Option<(Vec<(SplitFeature, f32)>, Vec<&Shape>)> {
        let mut splits = Vec::new();
        let mut leaves = Vec::new();
        for (i, node) in self.nodes.iter().enumerate() {
            match node {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if !leaves.is_empty() || *left as usize != 2 * i + 1 || *right as usize != 2 * i + 2 {
                        return None;
                    }
                    splits.push((*feature, *threshold));
                }
                TreeNode::Leaf { delta } => leaves.push(delta),
            }
        }
        if leaves.len() != splits.len() + 1 {
            return None;
        }
        Some((splits, leaves))
    }

    /// Traverse the tree and return a reference to the leaf delta.
    ///
    /// `feature_values` holds the pixel intensities of the stage's feature
    /// pool for the current shape estimate.
    pub fn predict(&self, feature_values: &[f32]) -> &Shape {
        let mut node_idx = 0usize;

        loop {
            match &self.nodes[node_idx] {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node_idx = if feature.value(feature_values) > *threshold {
                        *left as usize
                    } else {
                        *right as usize
                    };
                }
                TreeNode::Leaf { delta } => {
                    return delta;
                }
            }
        }
    }

    /// Get the number of nodes in the tree.
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, TreeNode::Leaf { .. }))
            .count()
    }

    /// Number of split levels on the longest root to leaf path.
    pub fn depth(&self) -> usize {
        self.depth_from(0)
    }

    fn depth_from(&self, node_idx: usize) -> usize {
        match &self.nodes[node_idx] {
            TreeNode::Split { left, right, .. } => {
                1 + self
                    .depth_from(*left as usize)
                    .max(self.depth_from(*right as usize))
            }
            TreeNode::Leaf { .. } => 0,
        }
    }

    /// Check that every child index points forward inside the tree, every
    /// feature index is inside a pool of `pool_size` entries and every leaf
    /// has `num_landmarks` points.
    pub fn validate(&self, pool_size: usize, num_landmarks: usize) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(Error::InvalidModel("Tree has no nodes".into()));
        }
        for (i, node) in self.nodes.iter().enumerate() {
            match node {
                TreeNode::Split {
                    feature,
                    left,
                    right,
                    ..
                } => {
                    for child in [*left as usize, *right as usize] {
                        if child <= i || child >= self.nodes.len() {
                            return Err(Error::InvalidModel(format!(
                                "Node {} has invalid child index {}",
                                i, child
                            )));
                        }
                    }
                    if feature.idx1 as usize >= pool_size || feature.idx2 as usize >= pool_size {
                        return Err(Error::InvalidModel(format!(
                            "Feature index ({}, {}) out of bounds for pool of {}",
                            feature.idx1, feature.idx2, pool_size
                        )));
                    }
                }
                TreeNode::Leaf { delta } => {
                    if delta.num_landmarks() != num_landmarks {
                        return Err(Error::InvalidModel(format!(
                            "Leaf delta has {} points, expected {}",
                            delta.num_landmarks(),
                            num_landmarks
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}
