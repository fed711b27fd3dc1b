//! Landmark accuracy measurement.
//!
//! The error of a predictor on a labeled set is the mean distance between
//! predicted and labeled parts, optionally divided by a per-object scale
//! such as the inter-ocular distance.

use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::model::ShapePredictor;
use crate::pixels::ImageAccess;
use crate::types::FullObjectDetection;

/// Mean normalized landmark error of `predictor` on a labeled set.
///
/// Every object of `objects[i]` is predicted from its rectangle on
/// `images[i]`. Each present part contributes `|predicted - truth| / scale`,
/// where `scale` is `scales[i][j]` for object `j` of image `i`, or 1 when no
/// scales are given. Scales must be finite and positive. Absent parts are
/// skipped.
pub fn test_shape_predictor<I>(
    predictor: &ShapePredictor,
    images: &[I],
    objects: &[Vec<FullObjectDetection>],
    scales: Option<&[Vec<f64>]>,
) -> Result<f64>
where
    I: ImageAccess + Sync,
{
    if images.len() != objects.len() {
        return Err(Error::LengthMismatch {
            what: "objects",
            expected: images.len(),
            actual: objects.len(),
        });
    }
    if let Some(scales) = scales {
        if scales.len() != objects.len() {
            return Err(Error::LengthMismatch {
                what: "scales",
                expected: objects.len(),
                actual: scales.len(),
            });
        }
        for (image, (image_scales, image_objects)) in scales.iter().zip(objects).enumerate() {
            if image_scales.len() != image_objects.len() {
                return Err(Error::LengthMismatch {
                    what: "object scales",
                    expected: image_objects.len(),
                    actual: image_scales.len(),
                });
            }
            if let Some((object, &value)) = image_scales
                .iter()
                .enumerate()
                .find(|(_, &v)| !(v.is_finite() && v > 0.0))
            {
                return Err(Error::InvalidScale {
                    image,
                    object,
                    value,
                });
            }
        }
    }
    let num_parts = predictor.num_landmarks();
    if let Some(det) = objects.iter().flatten().find(|d| d.num_parts() != num_parts) {
        return Err(Error::InconsistentPartCount {
            expected: num_parts,
            actual: det.num_parts(),
        });
    }

    let per_image: Vec<(f64, usize)> = images
        .par_iter()
        .zip(objects.par_iter())
        .enumerate()
        .map(|(i, (image, image_objects))| {
            let mut sum = 0.0;
            let mut count = 0;
            for (j, truth) in image_objects.iter().enumerate() {
                let scale = scales.map_or(1.0, |s| s[i][j]);
                let predicted = predictor.predict(image, &truth.rect());
                for (p, t) in predicted.parts().iter().zip(truth.parts()) {
                    if let (Some(p), Some(t)) = (p, t) {
                        sum += p.distance(t) as f64 / scale;
                        count += 1;
                    }
                }
            }
            (sum, count)
        })
        .collect();

    let (sum, count) = per_image
        .iter()
        .fold((0.0, 0usize), |(s, c), &(ps, pc)| (s + ps, c + pc));
    if count == 0 {
        return Err(Error::NoEvaluablePoints);
    }
    Ok(sum / count as f64)
}
