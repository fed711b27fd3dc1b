//! Similarity transforms between landmark shapes.

use crate::types::{Point, Shape};

/// A 2D similarity transform: uniform scale and rotation followed by a
/// translation.
///
/// The linear part is the matrix `[[a, -b], [b, a]]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityTransform2D {
    pub a: f32,
    pub b: f32,
    pub tx: f32,
    pub ty: f32,
}

impl SimilarityTransform2D {
    pub const fn identity() -> Self {
        Self {
            a: 1.0,
            b: 0.0,
            tx: 0.0,
            ty: 0.0,
        }
    }

    /// Apply only the rotation and scale part.
    #[inline]
    pub fn apply_linear(&self, p: Point) -> Point {
        Point::new(self.a * p.x - self.b * p.y, self.b * p.x + self.a * p.y)
    }

    #[inline]
    pub fn apply(&self, p: Point) -> Point {
        self.apply_linear(p) + Point::new(self.tx, self.ty)
    }

    /// The uniform scale factor of the transform.
    pub fn scale(&self) -> f32 {
        (self.a * self.a + self.b * self.b).sqrt()
    }
}

impl Default for SimilarityTransform2D {
    fn default() -> Self {
        Self::identity()
    }
}

/// Least-squares similarity transform mapping `from` onto `to`.
///
/// Minimises `sum |T(from[i]) - to[i]|^2`. Shapes with fewer than two
/// distinct points have no defined rotation or scale; the result is then a
/// pure translation between the centroids.
pub fn find_similarity_transform(from: &Shape, to: &Shape) -> SimilarityTransform2D {
    debug_assert_eq!(from.num_landmarks(), to.num_landmarks());
    let n = from.num_landmarks();
    if n == 0 {
        return SimilarityTransform2D::identity();
    }

    let (mut fx, mut fy, mut tx, mut ty) = (0f64, 0f64, 0f64, 0f64);
    for (f, t) in from.points.iter().zip(to.points.iter()) {
        fx += f.x as f64;
        fy += f.y as f64;
        tx += t.x as f64;
        ty += t.y as f64;
    }
    let inv_n = 1.0 / n as f64;
    let (fx, fy, tx, ty) = (fx * inv_n, fy * inv_n, tx * inv_n, ty * inv_n);

    let mut dot = 0f64;
    let mut cross = 0f64;
    let mut norm = 0f64;
    for (f, t) in from.points.iter().zip(to.points.iter()) {
        let (ax, ay) = (f.x as f64 - fx, f.y as f64 - fy);
        let (bx, by) = (t.x as f64 - tx, t.y as f64 - ty);
        dot += ax * bx + ay * by;
        cross += ax * by - ay * bx;
        norm += ax * ax + ay * ay;
    }

    let (a, b) = if norm > f64::EPSILON {
        (dot / norm, cross / norm)
    } else {
        (1.0, 0.0)
    };

    SimilarityTransform2D {
        a: a as f32,
        b: b as f32,
        tx: (tx - (a * fx - b * fy)) as f32,
        ty: (ty - (b * fx + a * fy)) as f32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Shape {
        Shape::new(vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(0.0, 1.0),
        ])
    }

    #[test]
    fn identical_shapes_give_identity() {
        let t = find_similarity_transform(&square(), &square());
        assert!((t.a - 1.0).abs() < 1e-6);
        assert!(t.b.abs() < 1e-6);
        assert!(t.tx.abs() < 1e-6);
        assert!(t.ty.abs() < 1e-6);
    }

    #[test]
    fn recovers_rotation_scale_and_translation() {
        // 90 degree rotation, scale 2, shift (3, -1)
        let expected = SimilarityTransform2D {
            a: 0.0,
            b: 2.0,
            tx: 3.0,
            ty: -1.0,
        };
        let from = square();
        let to = Shape::new(from.points.iter().map(|p| expected.apply(*p)).collect());

        let t = find_similarity_transform(&from, &to);
        assert!((t.a - expected.a).abs() < 1e-5);
        assert!((t.b - expected.b).abs() < 1e-5);
        assert!((t.tx - expected.tx).abs() < 1e-5);
        assert!((t.ty - expected.ty).abs() < 1e-5);
        assert!((t.scale() - 2.0).abs() < 1e-5);
    }

    #[test]
    fn single_point_is_a_translation() {
        let from = Shape::new(vec![Point::new(1.0, 1.0)]);
        let to = Shape::new(vec![Point::new(4.0, 6.0)]);

        let t = find_similarity_transform(&from, &to);
        assert_eq!(t.apply_linear(Point::new(2.0, 3.0)), Point::new(2.0, 3.0));
        assert_eq!(t.apply(Point::new(1.0, 1.0)), Point::new(4.0, 6.0));
    }
}
