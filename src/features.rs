use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::geometry::find_similarity_transform;
use crate::pixels::ImageAccess;
use crate::types::{Point, Rectangle, Shape};

/// The pixel sample locations used by one cascade stage.
///
/// Every sample location is stored relative to its anchor, the landmark of
/// the mean shape closest to it. At prediction time the offset is rotated and
/// scaled along with the current shape estimate, which keeps the features
/// approximately pose invariant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeaturePool {
    /// Landmark index each sample location is attached to.
    pub anchors: Vec<u32>,
    /// Offset from the anchor, in normalized coordinates of the mean shape.
    pub offsets: Vec<Point>,
}

impl FeaturePool {
    pub fn new(anchors: Vec<u32>, offsets: Vec<Point>) -> Self {
        debug_assert_eq!(anchors.len(), offsets.len());
        Self { anchors, offsets }
    }

    /// Encode absolute sample coordinates relative to the nearest landmark of
    /// `shape`.
    pub fn from_coordinates(shape: &Shape, coordinates: &[Point]) -> Self {
        let mut anchors = Vec::with_capacity(coordinates.len());
        let mut offsets = Vec::with_capacity(coordinates.len());
        for &p in coordinates {
            let anchor = nearest_shape_point(shape, p);
            anchors.push(anchor as u32);
            offsets.push(p - shape[anchor]);
        }
        Self { anchors, offsets }
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    /// Absolute location of every sample point relative to `shape`.
    pub fn coordinates(&self, shape: &Shape) -> Vec<Point> {
        self.anchors
            .iter()
            .zip(self.offsets.iter())
            .map(|(&a, &d)| shape[a as usize] + d)
            .collect()
    }
}

/// Index of the landmark closest to `p`. Ties go to the lowest index.
pub fn nearest_shape_point(shape: &Shape, p: Point) -> usize {
    let mut best = 0;
    let mut best_dist = f32::INFINITY;
    for (i, q) in shape.points.iter().enumerate() {
        let dist = (*q - p).length_squared();
        if dist < best_dist {
            best_dist = dist;
            best = i;
        }
    }
    best
}

/// Draw `count` points uniformly from the bounding box of `shape`, grown by
/// `padding` on every side.
pub fn sample_pixel_coordinates<R: Rng>(
    rng: &mut R,
    shape: &Shape,
    count: usize,
    padding: f32,
) -> Vec<Point> {
    let mut min_x = f32::INFINITY;
    let mut min_y = f32::INFINITY;
    let mut max_x = f32::NEG_INFINITY;
    let mut max_y = f32::NEG_INFINITY;
    for p in &shape.points {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    min_x -= padding;
    min_y -= padding;
    max_x += padding;
    max_y += padding;

    (0..count)
        .map(|_| {
            let x = rng.gen::<f32>() * (max_x - min_x) + min_x;
            let y = rng.gen::<f32>() * (max_y - min_y) + min_y;
            Point::new(x, y)
        })
        .collect()
}

/// Read the intensities of every pool location for the current shape
/// estimate of one object.
///
/// `reference` is the shape the pool was encoded against (the mean shape);
/// the rotation and scale between it and `current` is applied to every
/// offset before mapping into the image through `rect`. Locations that fall
/// outside the image read the nearest border pixel.
pub fn extract_feature_values<I: ImageAccess + ?Sized>(
    pool: &FeaturePool,
    image: &I,
    rect: &Rectangle,
    current: &Shape,
    reference: &Shape,
) -> Vec<f32> {
    let tform = find_similarity_transform(reference, current);

    pool.anchors
        .iter()
        .zip(pool.offsets.iter())
        .map(|(&anchor, &offset)| {
            let p = tform.apply_linear(offset) + current[anchor as usize];
            let p = rect.denormalize_point(p);
            let x = (p.x + 0.5).floor() as i64;
            let y = (p.y + 0.5).floor() as i64;
            image.clamped_pixel(x, y) as f32
        })
        .collect()
}
