use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

use crate::cascade::CascadeStage;
use crate::error::{Error, Result};
use crate::pixels::ImageAccess;
use crate::types::{FullObjectDetection, Point, Rectangle, Shape};

/// The trained shape predictor.
///
/// Takes an image region containing some object and outputs a set of point
/// locations that define the pose of the object. The model consists of:
/// - A mean shape (initial estimate) in normalized rectangle coordinates
/// - A cascade of stages that iteratively refine the shape estimate
///
/// A `ShapePredictor` is only ever built from parts that passed validation,
/// and it is never mutated afterwards, so it can be shared between threads
/// for concurrent prediction.
///
/// # Usage
///
/// ```ignore
/// let model = ShapePredictor::load("model.bin")?;
/// let rect = Rectangle::new(100.0, 100.0, 300.0, 300.0);
/// let detection = model.predict(&image, &rect);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ShapePredictorParts")]
pub struct ShapePredictor {
    mean_shape: Shape,
    cascade: Vec<CascadeStage>,
}

#[derive(Deserialize)]
struct ShapePredictorParts {
    mean_shape: Shape,
    cascade: Vec<CascadeStage>,
}

impl TryFrom<ShapePredictorParts> for ShapePredictor {
    type Error = Error;

    fn try_from(parts: ShapePredictorParts) -> Result<Self> {
        ShapePredictor::from_parts(parts.mean_shape, parts.cascade)
    }
}

impl ShapePredictor {
    /// Assemble a predictor, checking that every stage is consistent with
    /// the mean shape.
    pub fn from_parts(mean_shape: Shape, cascade: Vec<CascadeStage>) -> Result<Self> {
        if mean_shape.num_landmarks() == 0 {
            return Err(Error::InvalidModel("Mean shape has no landmarks".into()));
        }
        if mean_shape
            .points
            .iter()
            .any(|p| !p.x.is_finite() || !p.y.is_finite())
        {
            return Err(Error::InvalidModel("Mean shape is not finite".into()));
        }
        for (i, stage) in cascade.iter().enumerate() {
            stage.validate(mean_shape.num_landmarks()).map_err(|e| match e {
                Error::InvalidModel(msg) => Error::InvalidModel(format!("Stage {}: {}", i, msg)),
                other => other,
            })?;
        }
        Ok(Self {
            mean_shape,
            cascade,
        })
    }

    /// Load a model from a binary file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        let model: Self = bincode::deserialize(&bytes)?;
        Ok(model)
    }

    /// Save the model to a binary file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        let bytes = bincode::serialize(self)?;
        writer.write_all(&bytes)?;
        writer.flush()?;
        Ok(())
    }

    /// Get the number of landmarks this model predicts.
    pub fn num_landmarks(&self) -> usize {
        self.mean_shape.num_landmarks()
    }

    /// Get the number of cascade stages.
    pub fn num_cascade_stages(&self) -> usize {
        self.cascade.len()
    }

    /// The initial estimate, in normalized rectangle coordinates.
    pub fn mean_shape(&self) -> &Shape {
        &self.mean_shape
    }

    pub fn stages(&self) -> &[CascadeStage] {
        &self.cascade
    }

    /// Predict the parts of the object inside `rect`.
    ///
    /// The returned detection is bound to `rect` and has every part present.
    pub fn predict<I: ImageAccess + ?Sized>(&self, image: &I, rect: &Rectangle) -> FullObjectDetection {
        let shape = self.refine(image, rect, self.mean_shape.clone());
        FullObjectDetection::new(*rect, self.to_image_coordinates(&shape, rect))
    }

    /// Predict the parts of the object inside `rect`, averaging the cascade's
    /// output over several starting estimates.
    ///
    /// The first start is the mean shape; every further one is the mean
    /// shape shifted by a random offset in `[-max_offset, max_offset]` on
    /// each axis, in normalized rectangle units. The offsets only depend on
    /// `seed`. A non-finite `max_offset` is rejected.
    pub fn predict_averaged<I: ImageAccess + ?Sized>(
        &self,
        image: &I,
        rect: &Rectangle,
        num_initializations: usize,
        max_offset: f32,
        seed: u64,
    ) -> Result<FullObjectDetection> {
        if !max_offset.is_finite() {
            return Err(Error::InvalidOffset(max_offset));
        }
        let runs = num_initializations.max(1);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        let max_offset = max_offset.abs();

        let mut sum = Shape::zeros(self.num_landmarks());
        for run in 0..runs {
            let mut start = self.mean_shape.clone();
            if run > 0 && max_offset > 0.0 {
                let shift = Point::new(
                    rng.gen_range(-max_offset..=max_offset),
                    rng.gen_range(-max_offset..=max_offset),
                );
                for p in start.points.iter_mut() {
                    *p += shift;
                }
            }
            sum.add_delta(&self.refine(image, rect, start));
        }
        sum.scale(1.0 / runs as f32);

        Ok(FullObjectDetection::new(*rect, self.to_image_coordinates(&sum, rect)))
    }

    /// Run every stage of the cascade from `start`.
    fn refine<I: ImageAccess + ?Sized>(&self, image: &I, rect: &Rectangle, start: Shape) -> Shape {
        let mut current = start;
        for stage in &self.cascade {
            stage.apply(image, rect, &mut current, &self.mean_shape);
        }
        current
    }

    fn to_image_coordinates(&self, shape: &Shape, rect: &Rectangle) -> Vec<Point> {
        shape
            .points
            .iter()
            .map(|p| rect.denormalize_point(*p))
            .collect()
    }
}
