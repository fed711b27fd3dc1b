//! Training configuration.
//!
//! [`TrainingOptions`] can only be obtained from [`TrainingOptionsBuilder::build`],
//! which checks every constraint and reports all violations together.
//!
//! ```
//! use ert_shape::TrainingOptions;
//!
//! let options = TrainingOptions::builder()
//!     .cascade_depth(12)
//!     .tree_depth(5)
//!     .nu(0.05)
//!     .random_seed(7)
//!     .build()
//!     .unwrap();
//! assert_eq!(options.cascade_depth(), 12);
//!
//! let err = TrainingOptions::builder().nu(0.0).lambda(-1.0).build().unwrap_err();
//! assert!(err.to_string().contains("nu"));
//! assert!(err.to_string().contains("lambda"));
//! ```

use crate::error::{Error, Result};

/// Validated parameters for [`crate::ShapePredictorTrainer`].
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingOptions {
    cascade_depth: usize,
    tree_depth: usize,
    num_trees_per_cascade_level: usize,
    nu: f32,
    oversampling_amount: usize,
    feature_pool_size: usize,
    lambda: f32,
    num_test_splits: usize,
    feature_pool_region_padding: f32,
    random_seed: u64,
    verbose: bool,
    num_threads: usize,
}

impl TrainingOptions {
    pub fn builder() -> TrainingOptionsBuilder {
        TrainingOptionsBuilder::new()
    }

    /// The number of cascades created to train the model with.
    pub fn cascade_depth(&self) -> usize {
        self.cascade_depth
    }

    /// The depth of the trees used in each cascade. There are
    /// `2^tree_depth` leaves in each tree.
    pub fn tree_depth(&self) -> usize {
        self.tree_depth
    }

    /// The number of trees created for each cascade.
    pub fn num_trees_per_cascade_level(&self) -> usize {
        self.num_trees_per_cascade_level
    }

    /// Shrinkage applied to every leaf. Smaller values fit the training data
    /// more slowly and overfit less.
    pub fn nu(&self) -> f32 {
        self.nu
    }

    /// The number of randomly selected initial starting points sampled for
    /// each training example.
    pub fn oversampling_amount(&self) -> usize {
        self.oversampling_amount
    }

    /// Number of pixels used to generate features for the random trees.
    pub fn feature_pool_size(&self) -> usize {
        self.feature_pool_size
    }

    /// Controls how tight the feature sampling should be. Lower values
    /// enforce closer features.
    pub fn lambda(&self) -> f32 {
        self.lambda
    }

    /// Number of split features at each node to sample. The one that gives
    /// the best split is chosen.
    pub fn num_test_splits(&self) -> usize {
        self.num_test_splits
    }

    /// Padding around the mean shape's bounding box, in normalized units,
    /// within which the feature pool is sampled.
    pub fn feature_pool_region_padding(&self) -> f32 {
        self.feature_pool_region_padding
    }

    pub fn random_seed(&self) -> u64 {
        self.random_seed
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// Worker threads for training. `0` uses rayon's global pool.
    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    /// Number of split nodes in every tree.
    pub fn num_split_nodes(&self) -> usize {
        (1usize << self.tree_depth) - 1
    }
}

impl Default for TrainingOptions {
    fn default() -> Self {
        TrainingOptionsBuilder::new().unchecked()
    }
}

/// Builder for [`TrainingOptions`].
#[derive(Debug, Clone)]
pub struct TrainingOptionsBuilder {
    cascade_depth: usize,
    tree_depth: usize,
    num_trees_per_cascade_level: usize,
    nu: f32,
    oversampling_amount: usize,
    feature_pool_size: usize,
    lambda: f32,
    num_test_splits: usize,
    feature_pool_region_padding: f32,
    random_seed: u64,
    verbose: bool,
    num_threads: usize,
}

impl TrainingOptionsBuilder {
    pub fn new() -> Self {
        Self {
            cascade_depth: 10,
            tree_depth: 4,
            num_trees_per_cascade_level: 500,
            nu: 0.1,
            oversampling_amount: 20,
            feature_pool_size: 400,
            lambda: 0.1,
            num_test_splits: 20,
            feature_pool_region_padding: 0.0,
            random_seed: 0,
            verbose: false,
            num_threads: 0,
        }
    }

    pub fn cascade_depth(mut self, value: usize) -> Self {
        self.cascade_depth = value;
        self
    }

    pub fn tree_depth(mut self, value: usize) -> Self {
        self.tree_depth = value;
        self
    }

    pub fn num_trees_per_cascade_level(mut self, value: usize) -> Self {
        self.num_trees_per_cascade_level = value;
        self
    }

    pub fn nu(mut self, value: f32) -> Self {
        self.nu = value;
        self
    }

    pub fn oversampling_amount(mut self, value: usize) -> Self {
        self.oversampling_amount = value;
        self
    }

    pub fn feature_pool_size(mut self, value: usize) -> Self {
        self.feature_pool_size = value;
        self
    }

    pub fn lambda(mut self, value: f32) -> Self {
        self.lambda = value;
        self
    }

    pub fn num_test_splits(mut self, value: usize) -> Self {
        self.num_test_splits = value;
        self
    }

    pub fn feature_pool_region_padding(mut self, value: f32) -> Self {
        self.feature_pool_region_padding = value;
        self
    }

    pub fn random_seed(mut self, value: u64) -> Self {
        self.random_seed = value;
        self
    }

    pub fn verbose(mut self, value: bool) -> Self {
        self.verbose = value;
        self
    }

    pub fn num_threads(mut self, value: usize) -> Self {
        self.num_threads = value;
        self
    }

    /// Validate every field and build the options.
    pub fn build(self) -> Result<TrainingOptions> {
        let mut violations = Vec::new();

        if self.cascade_depth == 0 {
            violations.push("cascade_depth must be > 0".to_string());
        }
        if self.tree_depth == 0 {
            violations.push("tree_depth must be > 0".to_string());
        } else if self.tree_depth >= 32 {
            violations.push(format!("tree_depth must be < 32, got {}", self.tree_depth));
        }
        if self.num_trees_per_cascade_level == 0 {
            violations.push("num_trees_per_cascade_level must be > 0".to_string());
        }
        if !(self.nu > 0.0 && self.nu.is_finite()) {
            violations.push(format!("nu must be > 0, got {}", self.nu));
        }
        if self.oversampling_amount == 0 {
            violations.push("oversampling_amount must be > 0".to_string());
        }
        if self.feature_pool_size < 2 {
            violations.push(format!(
                "feature_pool_size must be > 1, got {}",
                self.feature_pool_size
            ));
        } else if self.feature_pool_size > u32::MAX as usize {
            violations.push("feature_pool_size does not fit in 32 bits".to_string());
        }
        if !(self.lambda > 0.0 && self.lambda.is_finite()) {
            violations.push(format!("lambda must be > 0, got {}", self.lambda));
        }
        if self.num_test_splits == 0 {
            violations.push("num_test_splits must be > 0".to_string());
        }
        if !(self.feature_pool_region_padding >= 0.0 && self.feature_pool_region_padding.is_finite()) {
            violations.push(format!(
                "feature_pool_region_padding must be >= 0, got {}",
                self.feature_pool_region_padding
            ));
        }

        if violations.is_empty() {
            Ok(self.unchecked())
        } else {
            Err(Error::InvalidOptions(violations))
        }
    }

    fn unchecked(self) -> TrainingOptions {
        TrainingOptions {
            cascade_depth: self.cascade_depth,
            tree_depth: self.tree_depth,
            num_trees_per_cascade_level: self.num_trees_per_cascade_level,
            nu: self.nu,
            oversampling_amount: self.oversampling_amount,
            feature_pool_size: self.feature_pool_size,
            lambda: self.lambda,
            num_test_splits: self.num_test_splits,
            feature_pool_region_padding: self.feature_pool_region_padding,
            random_seed: self.random_seed,
            verbose: self.verbose,
            num_threads: self.num_threads,
        }
    }
}

impl Default for TrainingOptionsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let built = TrainingOptions::builder().build().unwrap();
        assert_eq!(built, TrainingOptions::default());
        assert_eq!(built.cascade_depth(), 10);
        assert_eq!(built.tree_depth(), 4);
        assert_eq!(built.num_split_nodes(), 15);
        assert_eq!(built.num_trees_per_cascade_level(), 500);
        assert_eq!(built.oversampling_amount(), 20);
        assert_eq!(built.feature_pool_size(), 400);
        assert_eq!(built.num_test_splits(), 20);
        assert!(!built.verbose());
    }

    #[test]
    fn zero_nu_is_rejected() {
        let err = TrainingOptions::builder().nu(0.0).build().unwrap_err();
        match err {
            Error::InvalidOptions(v) => {
                assert_eq!(v.len(), 1);
                assert!(v[0].starts_with("nu"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn all_violations_are_reported() {
        let err = TrainingOptions::builder()
            .cascade_depth(0)
            .tree_depth(0)
            .num_trees_per_cascade_level(0)
            .nu(-1.0)
            .oversampling_amount(0)
            .feature_pool_size(1)
            .lambda(0.0)
            .num_test_splits(0)
            .feature_pool_region_padding(-0.5)
            .build()
            .unwrap_err();

        match err {
            Error::InvalidOptions(v) => assert_eq!(v.len(), 9),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn nan_parameters_are_rejected() {
        assert!(TrainingOptions::builder().lambda(f32::NAN).build().is_err());
        assert!(TrainingOptions::builder().nu(f32::INFINITY).build().is_err());
        assert!(TrainingOptions::builder()
            .feature_pool_region_padding(f32::NAN)
            .build()
            .is_err());
    }
}
