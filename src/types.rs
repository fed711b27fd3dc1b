use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A 2D point with floating-point coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub const fn zero() -> Self {
        Self { x: 0.0, y: 0.0 }
    }

    pub fn distance(&self, other: &Point) -> f32 {
        (*self - *other).length()
    }

    pub fn length(&self) -> f32 {
        self.length_squared().sqrt()
    }

    pub fn length_squared(&self) -> f32 {
        self.x * self.x + self.y * self.y
    }
}

impl std::ops::Add for Point {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl std::ops::AddAssign for Point {
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl std::ops::Sub for Point {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

impl std::ops::SubAssign for Point {
    fn sub_assign(&mut self, rhs: Self) {
        self.x -= rhs.x;
        self.y -= rhs.y;
    }
}

impl std::ops::Mul<f32> for Point {
    type Output = Self;

    fn mul(self, rhs: f32) -> Self::Output {
        Self {
            x: self.x * rhs,
            y: self.y * rhs,
        }
    }
}

/// An axis-aligned rectangle given by its left, top, right and bottom edges.
///
/// The canonical unit square maps onto a rectangle by sending `(0, 0)`,
/// `(1, 0)` and `(1, 1)` to the top-left, top-right and bottom-right corners.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rectangle {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Rectangle {
    pub const fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Build a rectangle from its top-left corner and its size.
    pub fn from_xywh(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self::new(x, y, x + width, y + height)
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.left + self.right) / 2.0,
            (self.top + self.bottom) / 2.0,
        )
    }

    /// Convert a point from normalized coordinates to image coordinates
    /// within this rectangle.
    pub fn denormalize_point(&self, p: Point) -> Point {
        Point::new(
            self.left + p.x * self.width(),
            self.top + p.y * self.height(),
        )
    }

    /// Convert a point from image coordinates to normalized coordinates
    /// relative to this rectangle.
    pub fn normalize_point(&self, p: Point) -> Point {
        Point::new(
            (p.x - self.left) / self.width(),
            (p.y - self.top) / self.height(),
        )
    }

    /// Fails unless the rectangle has a positive, finite width and height.
    pub fn ensure_non_degenerate(&self) -> Result<()> {
        let ok = self.width() > 0.0
            && self.height() > 0.0
            && self.width().is_finite()
            && self.height().is_finite();
        if ok {
            Ok(())
        } else {
            Err(Error::DegenerateRectangle {
                left: self.left,
                top: self.top,
                right: self.right,
                bottom: self.bottom,
            })
        }
    }
}

/// An ordered collection of landmark points.
///
/// Shapes inside the predictor live in normalized rectangle coordinates;
/// the same type is used for leaf deltas and residuals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    pub points: Vec<Point>,
}

impl Shape {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn with_capacity(n: usize) -> Self {
        Self {
            points: Vec::with_capacity(n),
        }
    }

    pub fn num_landmarks(&self) -> usize {
        self.points.len()
    }

    /// Create a zeroed shape with n landmarks.
    pub fn zeros(n: usize) -> Self {
        Self {
            points: vec![Point::zero(); n],
        }
    }

    /// Add another shape's deltas to this shape.
    pub fn add_delta(&mut self, delta: &Shape) {
        debug_assert_eq!(self.points.len(), delta.points.len());
        for (p, d) in self.points.iter_mut().zip(delta.points.iter()) {
            *p += *d;
        }
    }

    /// Subtract another shape point by point.
    pub fn sub_delta(&mut self, delta: &Shape) {
        debug_assert_eq!(self.points.len(), delta.points.len());
        for (p, d) in self.points.iter_mut().zip(delta.points.iter()) {
            *p -= *d;
        }
    }

    /// Add `factor * other` to this shape.
    pub fn add_scaled(&mut self, other: &Shape, factor: f32) {
        debug_assert_eq!(self.points.len(), other.points.len());
        for (p, o) in self.points.iter_mut().zip(other.points.iter()) {
            *p += *o * factor;
        }
    }

    pub fn scale(&mut self, factor: f32) {
        for p in self.points.iter_mut() {
            *p = *p * factor;
        }
    }

    /// Squared euclidean norm of the shape seen as a `2 * n` vector.
    pub fn norm_squared(&self) -> f32 {
        self.points.iter().map(Point::length_squared).sum()
    }

    /// Flatten shape to a vector of [x0, y0, x1, y1, ...] coordinates.
    pub fn to_flat_vec(&self) -> Vec<f32> {
        let mut v = Vec::with_capacity(self.points.len() * 2);
        for p in &self.points {
            v.push(p.x);
            v.push(p.y);
        }
        v
    }

    /// Create shape from a flat vector of [x0, y0, x1, y1, ...] coordinates.
    pub fn from_flat_vec(v: &[f32]) -> Self {
        debug_assert!(v.len() % 2 == 0);
        let points: Vec<Point> = v
            .chunks_exact(2)
            .map(|chunk| Point::new(chunk[0], chunk[1]))
            .collect();
        Self { points }
    }
}

impl std::ops::Index<usize> for Shape {
    type Output = Point;

    fn index(&self, idx: usize) -> &Self::Output {
        &self.points[idx]
    }
}

impl std::ops::IndexMut<usize> for Shape {
    fn index_mut(&mut self, idx: usize) -> &mut Self::Output {
        &mut self.points[idx]
    }
}

/// The location of an object in an image along with the positions of each
/// of its parts.
///
/// A part that was not annotated is `None`; it keeps its index slot so every
/// detection of a dataset has the same number of parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FullObjectDetection {
    rect: Rectangle,
    parts: Vec<Option<Point>>,
}

impl FullObjectDetection {
    /// Create a detection whose parts are all present.
    pub fn new(rect: Rectangle, parts: Vec<Point>) -> Self {
        Self {
            rect,
            parts: parts.into_iter().map(Some).collect(),
        }
    }

    /// Create a detection where some parts may be absent.
    pub fn with_parts(rect: Rectangle, parts: Vec<Option<Point>>) -> Self {
        Self { rect, parts }
    }

    /// The bounding box of the parts.
    pub fn rect(&self) -> Rectangle {
        self.rect
    }

    pub fn num_parts(&self) -> usize {
        self.parts.len()
    }

    /// A single part of the object, `None` when it is not present.
    pub fn part(&self, idx: usize) -> Result<Option<Point>> {
        self.parts
            .get(idx)
            .copied()
            .ok_or(Error::PartIndexOutOfRange {
                index: idx,
                num_parts: self.parts.len(),
            })
    }

    pub fn parts(&self) -> &[Option<Point>] {
        &self.parts
    }

    pub fn is_present(&self, idx: usize) -> bool {
        matches!(self.parts.get(idx), Some(Some(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_arithmetic() {
        let a = Point::new(1.0, 2.0);
        let b = Point::new(3.0, 4.0);

        let sum = a + b;
        assert_eq!(sum.x, 4.0);
        assert_eq!(sum.y, 6.0);

        let diff = b - a;
        assert_eq!(diff.x, 2.0);
        assert_eq!(diff.y, 2.0);

        let scaled = a * 2.0;
        assert_eq!(scaled.x, 2.0);
        assert_eq!(scaled.y, 4.0);

        assert!((Point::new(3.0, 4.0).length() - 5.0).abs() < 1e-6);
    }

    #[test]
    fn rectangle_normalization() {
        let rect = Rectangle::new(100.0, 100.0, 300.0, 300.0);

        let center_img = rect.denormalize_point(Point::new(0.5, 0.5));
        assert_eq!(center_img, rect.center());

        let back = rect.normalize_point(center_img);
        assert!((back.x - 0.5).abs() < 1e-6);
        assert!((back.y - 0.5).abs() < 1e-6);
    }

    #[test]
    fn degenerate_rectangle_is_rejected() {
        assert!(Rectangle::new(0.0, 0.0, 10.0, 10.0)
            .ensure_non_degenerate()
            .is_ok());
        assert!(matches!(
            Rectangle::new(5.0, 0.0, 5.0, 10.0).ensure_non_degenerate(),
            Err(Error::DegenerateRectangle { .. })
        ));
    }

    #[test]
    fn shape_delta() {
        let mut shape = Shape::new(vec![Point::new(0.0, 0.0), Point::new(1.0, 1.0)]);
        let delta = Shape::new(vec![Point::new(0.1, 0.2), Point::new(0.3, 0.4)]);
        shape.add_delta(&delta);

        assert!((shape[0].x - 0.1).abs() < 1e-6);
        assert!((shape[0].y - 0.2).abs() < 1e-6);
        assert!((shape[1].x - 1.3).abs() < 1e-6);
        assert!((shape[1].y - 1.4).abs() < 1e-6);

        shape.sub_delta(&delta);
        assert!((shape[1].x - 1.0).abs() < 1e-6);
        assert!((delta.norm_squared() - 0.3).abs() < 1e-6);
    }

    #[test]
    fn part_access_out_of_range_fails() {
        let det = FullObjectDetection::with_parts(
            Rectangle::new(0.0, 0.0, 10.0, 10.0),
            vec![Some(Point::new(1.0, 2.0)), None],
        );

        assert_eq!(det.num_parts(), 2);
        assert_eq!(det.part(0).unwrap(), Some(Point::new(1.0, 2.0)));
        assert_eq!(det.part(1).unwrap(), None);
        assert!(!det.is_present(1));
        assert!(matches!(
            det.part(2),
            Err(Error::PartIndexOutOfRange {
                index: 2,
                num_parts: 2
            })
        ));
    }
}
