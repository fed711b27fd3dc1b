//! # ert-shape
//!
//! Pure Rust training and inference of shape predictors: models that place
//! a fixed set of landmarks on an object given an image and the object's
//! bounding rectangle.
//!
//! Implements the algorithm from "One Millisecond Face Alignment with an
//! Ensemble of Regression Trees" (Kazemi & Sullivan, 2014), and reads and
//! writes dlib's `shape_predictor` model files.
//!
//! ## Algorithm Overview
//!
//! 1. Start with the mean shape of the training set as initial estimate
//! 2. For each cascade level:
//!    - Read the pixels of a sparse feature pool, placed relative to the
//!      current estimate
//!    - Each regression tree in the level's forest picks a leaf from pixel
//!      intensity differences and adds its shape delta
//! 3. Map the final estimate from rectangle coordinates to image coordinates
//!
//! Training fits the forests by gradient boosting on the remaining shape
//! error, see [`ShapePredictorTrainer`].
//!
//! ## Quick Start
//!
//! ```rust
//! use ert_shape::{
//!     FullObjectDetection, GrayImage, Point, Rectangle, ShapePredictorTrainer,
//!     TrainingOptions,
//! };
//!
//! let image = GrayImage::from_fn(64, 64, |x, y| ((x * 5 + y * 3) % 256) as u8);
//! let rect = Rectangle::new(8.0, 8.0, 56.0, 56.0);
//! let objects = vec![vec![FullObjectDetection::new(
//!     rect,
//!     vec![Point::new(20.0, 24.0), Point::new(44.0, 24.0), Point::new(32.0, 44.0)],
//! )]];
//!
//! let options = TrainingOptions::builder()
//!     .cascade_depth(2)
//!     .num_trees_per_cascade_level(10)
//!     .oversampling_amount(4)
//!     .feature_pool_size(40)
//!     .build()
//!     .unwrap();
//! let model = ShapePredictorTrainer::new(options)
//!     .train(&[image.clone()], &objects)
//!     .unwrap();
//!
//! let detection = model.predict(&image, &rect);
//! assert_eq!(detection.num_parts(), 3);
//! ```
//!
//! ## Custom Image Types
//!
//! Implement the [`ImageAccess`] trait for your own image types:
//!
//! ```rust
//! use ert_shape::ImageAccess;
//!
//! struct MyImage { /* ... */ }
//!
//! impl ImageAccess for MyImage {
//!     fn get_pixel(&self, x: u32, y: u32) -> u8 {
//!         // Return grayscale intensity at (x, y), always in bounds
//!         0
//!     }
//!     fn width(&self) -> u32 { 640 }
//!     fn height(&self) -> u32 { 480 }
//! }
//! ```

mod cascade;
pub mod dlib;
mod error;
mod features;
mod geometry;
mod metrics;
mod model;
mod options;
mod pixels;
mod trainer;
mod tree;
mod types;

pub use cascade::CascadeStage;
pub use error::{Error, Result};
pub use features::FeaturePool;
pub use geometry::{find_similarity_transform, SimilarityTransform2D};
pub use metrics::test_shape_predictor;
pub use model::ShapePredictor;
pub use options::{TrainingOptions, TrainingOptionsBuilder};
pub use pixels::{GrayImage, ImageAccess, PixelFormat};
pub use trainer::{ShapePredictorTrainer, TrainingProgress};
pub use tree::{RegressionTree, SplitFeature, TreeNode};
pub use types::{FullObjectDetection, Point, Rectangle, Shape};
