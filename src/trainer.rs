//! Cascade training.
//!
//! Fits a [`ShapePredictor`] from labeled objects by gradient boosting over
//! shapes: every stage samples a feature pool, reads its pixels for each
//! training sample, then fits a forest of regression trees one after the
//! other on the residual left by the previous trees.
//!
//! # Example
//!
//! ```ignore
//! use ert_shape::{ShapePredictorTrainer, TrainingOptions};
//!
//! let options = TrainingOptions::builder()
//!     .cascade_depth(10)
//!     .num_trees_per_cascade_level(500)
//!     .build()?;
//! let predictor = ShapePredictorTrainer::new(options).train(&images, &objects)?;
//! ```
//!
//! # Reproducibility
//!
//! Every random decision draws from a generator seeded from
//! `random_seed` and the identity of the work unit (stage, tree, node or
//! sample). Parallel work is collected in input order and reduced
//! sequentially, so the trained model only depends on the options and the
//! data, not on the number of threads.

use log::{debug, info, trace};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;

use crate::cascade::CascadeStage;
use crate::error::{Error, Result};
use crate::features::{extract_feature_values, sample_pixel_coordinates, FeaturePool};
use crate::metrics::test_shape_predictor;
use crate::model::ShapePredictor;
use crate::options::TrainingOptions;
use crate::pixels::ImageAccess;
use crate::tree::{RegressionTree, SplitFeature};
use crate::types::{FullObjectDetection, Point, Rectangle, Shape};

const STREAM_INITIAL_SHAPE: u64 = 1;
const STREAM_FEATURE_POOL: u64 = 2;
const STREAM_SPLIT: u64 = 3;

/// Reported after every fitted tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrainingProgress {
    /// Zero-based index of the stage being fitted.
    pub stage: usize,
    pub num_stages: usize,
    /// Number of trees fitted so far in this stage.
    pub trees_done: usize,
    pub trees_per_stage: usize,
}

/// Trains [`ShapePredictor`]s from images and labeled objects.
#[derive(Debug, Clone)]
pub struct ShapePredictorTrainer {
    options: TrainingOptions,
}

/// A labeled object with its current shape estimate, all in normalized
/// rectangle coordinates.
struct TrainingSample {
    image_idx: usize,
    rect: Rectangle,
    target: Shape,
    present: Vec<bool>,
    current: Shape,
    feature_values: Vec<f32>,
}

impl TrainingSample {
    /// Remaining error of the current estimate. Absent parts contribute zero.
    fn residual(&self) -> Shape {
        let points = self
            .target
            .points
            .iter()
            .zip(self.current.points.iter())
            .zip(self.present.iter())
            .map(|((t, c), &present)| if present { *t - *c } else { Point::zero() })
            .collect();
        Shape::new(points)
    }
}

/// A split node candidate with the residual sum of the samples sent left.
struct SplitCandidate {
    feature: SplitFeature,
    threshold: f32,
    left_sum: Shape,
    left_count: usize,
}

impl ShapePredictorTrainer {
    pub fn new(options: TrainingOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &TrainingOptions {
        &self.options
    }

    /// Train a predictor on `objects[i]`, the labeled objects of `images[i]`.
    pub fn train<I>(&self, images: &[I], objects: &[Vec<FullObjectDetection>]) -> Result<ShapePredictor>
    where
        I: ImageAccess + Sync,
    {
        self.train_with_progress(images, objects, |_| {})
    }

    /// Like [`ShapePredictorTrainer::train`], calling `progress` after every
    /// fitted tree.
    pub fn train_with_progress<I, F>(
        &self,
        images: &[I],
        objects: &[Vec<FullObjectDetection>],
        mut progress: F,
    ) -> Result<ShapePredictor>
    where
        I: ImageAccess + Sync,
        F: FnMut(&TrainingProgress) + Send,
    {
        let num_parts = validate_dataset(images, objects)?;

        if self.options.num_threads() > 0 {
            let pool = ThreadPoolBuilder::new()
                .num_threads(self.options.num_threads())
                .build()
                .map_err(|e| Error::ThreadPool(e.to_string()))?;
            pool.install(|| self.fit(images, objects, num_parts, &mut progress))
        } else {
            self.fit(images, objects, num_parts, &mut progress)
        }
    }

    fn fit<I, F>(
        &self,
        images: &[I],
        objects: &[Vec<FullObjectDetection>],
        num_parts: usize,
        progress: &mut F,
    ) -> Result<ShapePredictor>
    where
        I: ImageAccess + Sync,
        F: FnMut(&TrainingProgress),
    {
        let opts = &self.options;
        if opts.verbose() {
            info!(
                "Training with cascade depth {}, tree depth {}, {} trees per cascade level, nu {}",
                opts.cascade_depth(),
                opts.tree_depth(),
                opts.num_trees_per_cascade_level(),
                opts.nu()
            );
            info!(
                "Oversampling amount {}, feature pool size {}, lambda {}, {} test splits, padding {}",
                opts.oversampling_amount(),
                opts.feature_pool_size(),
                opts.lambda(),
                opts.num_test_splits(),
                opts.feature_pool_region_padding()
            );
        }

        let (mean_shape, mut samples) = self.populate_training_samples(objects, num_parts);
        if opts.verbose() {
            info!(
                "Fitting {} samples ({} objects, {} parts)",
                samples.len(),
                samples.len() / opts.oversampling_amount(),
                num_parts
            );
        }

        let mut cascade = Vec::with_capacity(opts.cascade_depth());
        for stage in 0..opts.cascade_depth() {
            let mut rng = seeded_rng(opts.random_seed(), &[STREAM_FEATURE_POOL, stage as u64]);
            let coordinates = sample_pixel_coordinates(
                &mut rng,
                &mean_shape,
                opts.feature_pool_size(),
                opts.feature_pool_region_padding(),
            );
            let pool = FeaturePool::from_coordinates(&mean_shape, &coordinates);

            samples.par_iter_mut().for_each(|sample| {
                sample.feature_values = extract_feature_values(
                    &pool,
                    &images[sample.image_idx],
                    &sample.rect,
                    &sample.current,
                    &mean_shape,
                );
            });

            let mut forest = Vec::with_capacity(opts.num_trees_per_cascade_level());
            for tree_idx in 0..opts.num_trees_per_cascade_level() {
                forest.push(self.make_regression_tree(&mut samples, &coordinates, stage, tree_idx));
                trace!("Fitted tree {} of cascade {}", tree_idx, stage);
                progress(&TrainingProgress {
                    stage,
                    num_stages: opts.cascade_depth(),
                    trees_done: tree_idx + 1,
                    trees_per_stage: opts.num_trees_per_cascade_level(),
                });
            }

            let residual = mean_residual_norm(&samples);
            if opts.verbose() {
                info!(
                    "Fitted cascade {}/{}, mean residual {:.6}",
                    stage + 1,
                    opts.cascade_depth(),
                    residual
                );
            } else {
                debug!("Fitted cascade {}, mean residual {:.6}", stage, residual);
            }

            cascade.push(CascadeStage::new(pool, forest));
        }

        let predictor = ShapePredictor::from_parts(mean_shape, cascade)?;

        if opts.verbose() {
            info!("Training complete");
            match test_shape_predictor(&predictor, images, objects, None) {
                Ok(error) => info!("Training error: {}", error),
                Err(e) => info!("Training error unavailable: {}", e),
            }
        }

        Ok(predictor)
    }

    /// Build the mean shape and the oversampled training samples.
    ///
    /// The first replica of every object starts from the mean shape, the
    /// others from a random weighted average of ground truth shapes. Absent
    /// target parts are set to the starting estimate and masked out.
    fn populate_training_samples(
        &self,
        objects: &[Vec<FullObjectDetection>],
        num_parts: usize,
    ) -> (Shape, Vec<TrainingSample>) {
        let opts = &self.options;
        let mut base = Vec::new();
        for (image_idx, image_objects) in objects.iter().enumerate() {
            for det in image_objects {
                let rect = det.rect();
                let mut target = Shape::zeros(num_parts);
                let mut present = vec![false; num_parts];
                for (k, part) in det.parts().iter().enumerate() {
                    if let Some(p) = part {
                        target[k] = rect.normalize_point(*p);
                        present[k] = true;
                    }
                }
                base.push((image_idx, rect, target, present));
            }
        }

        let mut mean_shape = Shape::zeros(num_parts);
        let mut counts = vec![0f32; num_parts];
        for (_, _, target, present) in &base {
            for k in 0..num_parts {
                if present[k] {
                    mean_shape[k] += target[k];
                    counts[k] += 1.0;
                }
            }
        }
        for (p, &c) in mean_shape.points.iter_mut().zip(counts.iter()) {
            *p = *p * (1.0 / c);
        }

        let oversampling = opts.oversampling_amount();
        let seed = opts.random_seed();
        let samples = (0..base.len() * oversampling)
            .into_par_iter()
            .map(|i| {
                let (image_idx, rect, target, present) = &base[i / oversampling];
                let current = if i % oversampling == 0 {
                    mean_shape.clone()
                } else {
                    let mut rng = seeded_rng(seed, &[STREAM_INITIAL_SHAPE, i as u64]);
                    random_initial_shape(&mut rng, &base, num_parts)
                };

                let mut target = target.clone();
                for k in 0..num_parts {
                    if !present[k] {
                        target[k] = current[k];
                    }
                }

                TrainingSample {
                    image_idx: *image_idx,
                    rect: *rect,
                    target,
                    present: present.clone(),
                    current,
                    feature_values: Vec::new(),
                }
            })
            .collect();

        (mean_shape, samples)
    }

    /// Fit one tree on the current residuals and move every sample's
    /// estimate by the leaf it lands in.
    fn make_regression_tree(
        &self,
        samples: &mut [TrainingSample],
        coordinates: &[Point],
        stage: usize,
        tree_idx: usize,
    ) -> RegressionTree {
        let opts = &self.options;
        let num_parts = samples[0].target.num_landmarks();
        let num_split_nodes = opts.num_split_nodes();

        let residuals: Vec<Shape> = samples.par_iter().map(TrainingSample::residual).collect();

        let mut order: Vec<usize> = (0..samples.len()).collect();
        let mut ranges = Vec::with_capacity(2 * num_split_nodes + 1);
        ranges.push((0, samples.len()));
        let mut sums = Vec::with_capacity(2 * num_split_nodes + 1);
        let mut root_sum = Shape::zeros(num_parts);
        for r in &residuals {
            root_sum.add_delta(r);
        }
        sums.push(root_sum);

        let mut splits = Vec::with_capacity(num_split_nodes);
        for node in 0..num_split_nodes {
            let (begin, end) = ranges[node];
            let mut rng = seeded_rng(
                opts.random_seed(),
                &[STREAM_SPLIT, stage as u64, tree_idx as u64, node as u64],
            );
            let best = self.generate_split(
                &mut rng,
                samples,
                &residuals,
                &order[begin..end],
                &sums[node],
                coordinates,
            );

            let mut right_sum = sums[node].clone();
            right_sum.sub_delta(&best.left_sum);
            sums.push(best.left_sum);
            sums.push(right_sum);

            let (left, right): (Vec<usize>, Vec<usize>) = order[begin..end]
                .iter()
                .partition(|&&i| best.feature.value(&samples[i].feature_values) > best.threshold);
            let mid = begin + left.len();
            order[begin..mid].copy_from_slice(&left);
            order[mid..end].copy_from_slice(&right);
            ranges.push((begin, mid));
            ranges.push((mid, end));

            splits.push((best.feature, best.threshold));
        }

        let mut leaves = Vec::with_capacity(num_split_nodes + 1);
        for leaf in 0..=num_split_nodes {
            let node = num_split_nodes + leaf;
            let (begin, end) = ranges[node];
            let count = end - begin;
            let mut delta = sums[node].clone();
            if count > 0 {
                delta.scale(opts.nu() / count as f32);
            } else {
                delta = Shape::zeros(num_parts);
            }
            for &i in &order[begin..end] {
                samples[i].current.add_delta(&delta);
            }
            leaves.push(delta);
        }

        RegressionTree::from_splits_and_leaves(splits, leaves)
    }

    /// Generate `num_test_splits` random candidates for the samples in
    /// `node` and return the one that best separates their residuals.
    ///
    /// The score `|sum_left|^2 / n_left + |sum_right|^2 / n_right` is
    /// maximal when the summed variance of the two children is minimal.
    /// Candidates leaving one side empty are skipped, ties keep the earlier
    /// candidate and if nothing qualifies the first candidate is used.
    fn generate_split<R: Rng>(
        &self,
        rng: &mut R,
        samples: &[TrainingSample],
        residuals: &[Shape],
        node: &[usize],
        node_sum: &Shape,
        coordinates: &[Point],
    ) -> SplitCandidate {
        let draws: Vec<(SplitFeature, f32)> = (0..self.options.num_test_splits())
            .map(|_| {
                let feature = self.random_split_feature(rng, coordinates);
                (feature, rng.gen::<f32>())
            })
            .collect();

        let num_parts = node_sum.num_landmarks();
        let mut candidates: Vec<SplitCandidate> = draws
            .par_iter()
            .map(|&(feature, u)| {
                let threshold = sample_threshold(feature, u, samples, node);
                let mut left_sum = Shape::zeros(num_parts);
                let mut left_count = 0;
                for &i in node {
                    if feature.value(&samples[i].feature_values) > threshold {
                        left_sum.add_delta(&residuals[i]);
                        left_count += 1;
                    }
                }
                SplitCandidate {
                    feature,
                    threshold,
                    left_sum,
                    left_count,
                }
            })
            .collect();

        let mut best_score = -1f64;
        let mut best = 0;
        for (i, c) in candidates.iter().enumerate() {
            let right_count = node.len() - c.left_count;
            if c.left_count == 0 || right_count == 0 {
                continue;
            }
            let mut right_sum = node_sum.clone();
            right_sum.sub_delta(&c.left_sum);
            let score = c.left_sum.norm_squared() as f64 / c.left_count as f64
                + right_sum.norm_squared() as f64 / right_count as f64;
            if score > best_score {
                best_score = score;
                best = i;
            }
        }

        candidates.swap_remove(best)
    }

    /// Pick two distinct pool locations, preferring close pairs: a pair at
    /// distance `d` is accepted with probability `exp(-d / lambda)`.
    fn random_split_feature<R: Rng>(&self, rng: &mut R, coordinates: &[Point]) -> SplitFeature {
        let pool_size = coordinates.len();
        let lambda = self.options.lambda();
        let max_iters = pool_size * pool_size;

        let mut idx1 = 0;
        let mut idx2 = 1;
        for _ in 0..max_iters {
            idx1 = rng.gen_range(0..pool_size);
            idx2 = rng.gen_range(0..pool_size);
            while idx1 == idx2 {
                idx2 = rng.gen_range(0..pool_size);
            }
            let dist = coordinates[idx1].distance(&coordinates[idx2]);
            let accept_prob = (-dist / lambda).exp();
            if accept_prob > rng.gen::<f32>() {
                break;
            }
        }

        SplitFeature {
            idx1: idx1 as u32,
            idx2: idx2 as u32,
        }
    }
}

/// Threshold at fraction `u` of the range of the feature over the node.
///
/// The largest observed value always goes left and the smallest right, so
/// a node with two distinct values is always split. Empty nodes fall back
/// to a draw over the range of pixel differences.
fn sample_threshold(feature: SplitFeature, u: f32, samples: &[TrainingSample], node: &[usize]) -> f32 {
    if node.is_empty() {
        return (u * 256.0 - 128.0) / 2.0;
    }
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    for &i in node {
        let v = feature.value(&samples[i].feature_values);
        min = min.min(v);
        max = max.max(v);
    }
    min + u * (max - min)
}

/// A random weighted average of ground truth shapes with every part
/// observed at least once, from at least two draws.
fn random_initial_shape<R: Rng>(
    rng: &mut R,
    base: &[(usize, Rectangle, Shape, Vec<bool>)],
    num_parts: usize,
) -> Shape {
    let mut shape = Shape::zeros(num_parts);
    let mut hits = vec![0f32; num_parts];
    let mut draws = 0;
    while draws < 2 || hits.iter().any(|&h| h == 0.0) {
        draws += 1;
        let (_, _, target, present) = &base[rng.gen_range(0..base.len())];
        let alpha = rng.gen::<f32>() + 0.1;
        for k in 0..num_parts {
            if present[k] {
                shape[k] += target[k] * alpha;
                hits[k] += alpha;
            }
        }
    }
    for (p, &h) in shape.points.iter_mut().zip(hits.iter()) {
        *p = *p * (1.0 / h);
    }
    shape
}

fn mean_residual_norm(samples: &[TrainingSample]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let total: f64 = samples
        .iter()
        .map(|s| s.residual().norm_squared().sqrt() as f64)
        .sum();
    total / samples.len() as f64
}

/// Check the dataset before any work starts and return its part count.
fn validate_dataset<I: ImageAccess>(images: &[I], objects: &[Vec<FullObjectDetection>]) -> Result<usize> {
    if images.len() != objects.len() {
        return Err(Error::LengthMismatch {
            what: "objects",
            expected: images.len(),
            actual: objects.len(),
        });
    }

    let mut all = objects.iter().flatten();
    let first = all.next().ok_or(Error::EmptyTrainingSet)?;
    let num_parts = first.num_parts();
    if num_parts == 0 {
        return Err(Error::EmptyTrainingSet);
    }

    let mut seen = vec![false; num_parts];
    for (image, image_objects) in objects.iter().enumerate() {
        for (object, det) in image_objects.iter().enumerate() {
            if det.num_parts() != num_parts {
                return Err(Error::InconsistentPartCount {
                    expected: num_parts,
                    actual: det.num_parts(),
                });
            }
            det.rect().ensure_non_degenerate()?;
            for (part, p) in det.parts().iter().enumerate() {
                if let Some(p) = p {
                    if !(p.x.is_finite() && p.y.is_finite()) {
                        return Err(Error::NonFinitePart {
                            image,
                            object,
                            part,
                        });
                    }
                    seen[part] = true;
                }
            }
        }
    }

    if let Some(missing) = seen.iter().position(|&s| !s) {
        return Err(Error::MissingLandmark(missing));
    }
    Ok(num_parts)
}

fn seeded_rng(seed: u64, stream: &[u64]) -> Xoshiro256PlusPlus {
    Xoshiro256PlusPlus::seed_from_u64(derive_seed(seed, stream))
}

/// Mix a work unit's coordinates into the global seed.
fn derive_seed(seed: u64, stream: &[u64]) -> u64 {
    stream
        .iter()
        .fold(splitmix64(seed), |acc, &v| splitmix64(acc ^ splitmix64(v)))
}

fn splitmix64(x: u64) -> u64 {
    let mut z = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixels::GrayImage;

    fn options() -> TrainingOptions {
        TrainingOptions::builder()
            .cascade_depth(2)
            .tree_depth(2)
            .num_trees_per_cascade_level(3)
            .oversampling_amount(3)
            .feature_pool_size(20)
            .num_test_splits(5)
            .random_seed(11)
            .build()
            .unwrap()
    }

    fn square(x: f32, y: f32, size: f32) -> FullObjectDetection {
        FullObjectDetection::new(
            Rectangle::new(x, y, x + size, y + size),
            vec![
                Point::new(x + 0.3 * size, y + 0.3 * size),
                Point::new(x + 0.7 * size, y + 0.4 * size),
            ],
        )
    }

    #[test]
    fn derived_seeds_differ_per_unit() {
        let a = derive_seed(1, &[STREAM_SPLIT, 0, 0, 0]);
        let b = derive_seed(1, &[STREAM_SPLIT, 0, 0, 1]);
        let c = derive_seed(2, &[STREAM_SPLIT, 0, 0, 0]);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, derive_seed(1, &[STREAM_SPLIT, 0, 0, 0]));
    }

    #[test]
    fn mean_shape_ignores_absent_parts() {
        let trainer = ShapePredictorTrainer::new(options());
        let rect = Rectangle::new(0.0, 0.0, 10.0, 10.0);
        let objects = vec![vec![
            FullObjectDetection::with_parts(rect, vec![Some(Point::new(2.0, 2.0)), None]),
            FullObjectDetection::with_parts(
                rect,
                vec![Some(Point::new(4.0, 4.0)), Some(Point::new(8.0, 6.0))],
            ),
        ]];

        let (mean, samples) = trainer.populate_training_samples(&objects, 2);
        assert!((mean[0].x - 0.3).abs() < 1e-6);
        assert!((mean[1].x - 0.8).abs() < 1e-6);
        assert!((mean[1].y - 0.6).abs() < 1e-6);

        assert_eq!(samples.len(), 6);
        assert_eq!(samples[0].current, mean);
        assert_eq!(samples[3].current, mean);
        for s in &samples {
            // absent targets never produce a residual
            if !s.present[1] {
                assert_eq!(s.residual()[1], Point::zero());
                assert_eq!(s.target[1], s.current[1]);
            }
        }
    }

    #[test]
    fn random_initial_shapes_are_convex_averages() {
        let base = vec![
            (0, Rectangle::new(0.0, 0.0, 1.0, 1.0), Shape::new(vec![Point::new(0.0, 0.0)]), vec![true]),
            (0, Rectangle::new(0.0, 0.0, 1.0, 1.0), Shape::new(vec![Point::new(1.0, 1.0)]), vec![true]),
        ];
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(5);
        for _ in 0..20 {
            let s = random_initial_shape(&mut rng, &base, 1);
            assert!(s[0].x >= 0.0 && s[0].x <= 1.0);
            assert!((s[0].x - s[0].y).abs() < 1e-6);
        }
    }

    #[test]
    fn thresholds_split_distinct_values() {
        let sample = |v: Vec<f32>| TrainingSample {
            image_idx: 0,
            rect: Rectangle::new(0.0, 0.0, 1.0, 1.0),
            target: Shape::zeros(1),
            present: vec![true],
            current: Shape::zeros(1),
            feature_values: v,
        };
        let samples = vec![sample(vec![10.0, 0.0]), sample(vec![0.0, 30.0])];
        let feature = SplitFeature { idx1: 0, idx2: 1 };

        for u in [0.0, 0.25, 0.999] {
            let t = sample_threshold(feature, u, &samples, &[0, 1]);
            assert!(10.0 > t);
            assert!(-30.0 <= t);
        }
        assert_eq!(sample_threshold(feature, 0.5, &samples, &[]), 0.0);
    }

    #[test]
    fn trained_model_has_requested_dimensions() {
        let image = GrayImage::from_fn(64, 64, |x, y| ((x * 7 + y * 3) % 256) as u8);
        let objects = vec![vec![square(4.0, 4.0, 24.0), square(32.0, 30.0, 28.0)]];

        let mut reports = 0;
        let model = ShapePredictorTrainer::new(options())
            .train_with_progress(&[image], &objects, |p| {
                reports += 1;
                assert!(p.trees_done <= p.trees_per_stage);
            })
            .unwrap();

        assert_eq!(reports, 2 * 3);
        assert_eq!(model.num_cascade_stages(), 2);
        assert_eq!(model.num_landmarks(), 2);
        for stage in model.stages() {
            assert_eq!(stage.num_trees(), 3);
            assert_eq!(stage.pool.len(), 20);
            for tree in &stage.forest {
                assert_eq!(tree.depth(), 2);
                assert_eq!(tree.num_leaves(), 4);
            }
        }
    }

    #[test]
    fn dataset_validation() {
        let image = GrayImage::from_fn(8, 8, |_, _| 0);
        let trainer = ShapePredictorTrainer::new(options());

        let err = trainer.train(&[image.clone()], &[]).unwrap_err();
        assert!(matches!(err, Error::LengthMismatch { .. }));

        let err = trainer.train(&[image.clone()], &[vec![]]).unwrap_err();
        assert!(matches!(err, Error::EmptyTrainingSet));

        let rect = Rectangle::new(0.0, 0.0, 4.0, 4.0);
        let objects = vec![vec![
            FullObjectDetection::new(rect, vec![Point::new(1.0, 1.0)]),
            FullObjectDetection::new(rect, vec![Point::new(1.0, 1.0), Point::new(2.0, 2.0)]),
        ]];
        let err = trainer.train(&[image.clone()], &objects).unwrap_err();
        assert!(matches!(
            err,
            Error::InconsistentPartCount {
                expected: 1,
                actual: 2
            }
        ));

        let objects = vec![vec![FullObjectDetection::with_parts(
            rect,
            vec![Some(Point::new(1.0, 1.0)), None],
        )]];
        let err = trainer.train(&[image.clone()], &objects).unwrap_err();
        assert!(matches!(err, Error::MissingLandmark(1)));

        let objects = vec![vec![
            FullObjectDetection::new(rect, vec![Point::new(1.0, 1.0)]),
            FullObjectDetection::new(rect, vec![Point::new(f32::NAN, 1.0)]),
        ]];
        let err = trainer.train(&[image.clone()], &objects).unwrap_err();
        assert!(matches!(
            err,
            Error::NonFinitePart {
                image: 0,
                object: 1,
                part: 0
            }
        ));

        let flat = Rectangle::new(2.0, 0.0, 2.0, 4.0);
        let objects = vec![vec![FullObjectDetection::new(flat, vec![Point::new(2.0, 1.0)])]];
        let err = trainer.train(&[image], &objects).unwrap_err();
        assert!(matches!(err, Error::DegenerateRectangle { .. }));
    }
}
