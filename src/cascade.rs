use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::features::{extract_feature_values, FeaturePool};
use crate::pixels::ImageAccess;
use crate::tree::RegressionTree;
use crate::types::{Rectangle, Shape};

/// One refinement level of the predictor: the feature pool sampled for this
/// level and the forest of trees fitted on it.
///
/// Each tree votes on adjustments, and the results are summed. Leaf deltas
/// already include the shrinkage factor used during training.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CascadeStage {
    pub pool: FeaturePool,
    pub forest: Vec<RegressionTree>,
}

impl CascadeStage {
    pub fn new(pool: FeaturePool, forest: Vec<RegressionTree>) -> Self {
        Self { pool, forest }
    }

    pub fn num_trees(&self) -> usize {
        self.forest.len()
    }

    /// Sum of the leaf deltas reached for the given feature values.
    pub fn predict_delta(&self, feature_values: &[f32], num_landmarks: usize) -> Shape {
        let mut delta = Shape::zeros(num_landmarks);
        for tree in &self.forest {
            delta.add_delta(tree.predict(feature_values));
        }
        delta
    }

    /// Refine `current` in place for an object inside `rect`.
    pub fn apply<I: ImageAccess + ?Sized>(
        &self,
        image: &I,
        rect: &Rectangle,
        current: &mut Shape,
        mean_shape: &Shape,
    ) {
        let values = extract_feature_values(&self.pool, image, rect, current, mean_shape);
        for tree in &self.forest {
            current.add_delta(tree.predict(&values));
        }
    }

    pub fn validate(&self, num_landmarks: usize) -> Result<()> {
        if self.pool.anchors.len() != self.pool.offsets.len() {
            return Err(Error::InvalidModel(format!(
                "Feature pool has {} anchors but {} offsets",
                self.pool.anchors.len(),
                self.pool.offsets.len()
            )));
        }
        if let Some(&anchor) = self
            .pool
            .anchors
            .iter()
            .find(|&&a| a as usize >= num_landmarks)
        {
            return Err(Error::InvalidModel(format!(
                "Anchor {} out of bounds for {} landmarks",
                anchor, num_landmarks
            )));
        }
        for tree in &self.forest {
            tree.validate(self.pool.len(), num_landmarks)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixels::GrayImage;
    use crate::tree::{SplitFeature, TreeNode};
    use crate::types::Point;

    fn constant_tree(dx: f32, dy: f32) -> RegressionTree {
        RegressionTree::new(vec![TreeNode::Leaf {
            delta: Shape::new(vec![Point::new(dx, dy)]),
        }])
    }

    #[test]
    fn forest_sums_predictions() {
        let stage = CascadeStage::new(
            FeaturePool::new(vec![], vec![]),
            vec![constant_tree(0.1, 0.2), constant_tree(0.3, 0.4)],
        );
        let delta = stage.predict_delta(&[], 1);

        assert!((delta[0].x - 0.4).abs() < 1e-6);
        assert!((delta[0].y - 0.6).abs() < 1e-6);
    }

    #[test]
    fn apply_uses_pool_values() {
        // bright right half: the split fires when the landmark sits left of
        // the sampled pixel 0.3 units to its right
        let img = GrayImage::from_fn(10, 10, |x, _| if x >= 5 { 200 } else { 0 });
        let rect = Rectangle::new(0.0, 0.0, 10.0, 10.0);
        let pool = FeaturePool::new(vec![0, 0], vec![Point::new(0.3, 0.0), Point::zero()]);
        let tree = RegressionTree::from_splits_and_leaves(
            vec![(SplitFeature { idx1: 0, idx2: 1 }, 100.0)],
            vec![
                Shape::new(vec![Point::new(0.05, 0.0)]),
                Shape::new(vec![Point::new(-0.05, 0.0)]),
            ],
        );
        let stage = CascadeStage::new(pool, vec![tree]);
        let mean = Shape::new(vec![Point::new(0.3, 0.5)]);

        let mut current = mean.clone();
        stage.apply(&img, &rect, &mut current, &mean);
        assert!((current[0].x - 0.35).abs() < 1e-6);

        let mut current = Shape::new(vec![Point::new(0.6, 0.5)]);
        stage.apply(&img, &rect, &mut current, &mean);
        assert!((current[0].x - 0.55).abs() < 1e-6);
    }

    #[test]
    fn validate_rejects_bad_anchor() {
        let stage = CascadeStage::new(
            FeaturePool::new(vec![3], vec![Point::zero()]),
            vec![constant_tree(0.0, 0.0)],
        );
        assert!(stage.validate(4).is_ok());
        assert!(stage.validate(3).is_err());
    }
}
