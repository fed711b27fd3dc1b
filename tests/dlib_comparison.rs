//! Integration tests comparing inference with dlib's pretrained models
//! against dlib's own output.

use ert_shape::{dlib::load_dlib_model, GrayImage, Rectangle};
use std::path::PathBuf;

fn dlib_models_dir() -> Option<PathBuf> {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("dlib-models");
    if path.exists() {
        Some(path)
    } else {
        None
    }
}

/// Create the gradient test image: pixel[x,y] = (x + y) % 256
fn create_gradient_image(width: u32, height: u32) -> GrayImage {
    GrayImage::from_fn(width, height, |x, y| ((x + y) % 256) as u8)
}

/// Reference landmarks from dlib for the 5-point model on gradient image.
/// Image: 100x100, formula: (x + y) % 256
/// Rect: left=25, top=25, right=75, bottom=75
const DLIB_REFERENCE_5POINT: [(f32, f32); 5] = [
    (68.0, 46.0),
    (60.0, 45.0),
    (40.0, 40.0),
    (48.0, 42.0),
    (51.0, 60.0),
];

#[test]
fn compare_5point_inference() {
    let Some(models_dir) = dlib_models_dir() else {
        eprintln!("Skipping test: dlib-models directory not found");
        return;
    };

    let model_path = models_dir.join("shape_predictor_5_face_landmarks.dat.bz2");
    if !model_path.exists() {
        eprintln!("Skipping test: model file not found");
        return;
    }

    let model = load_dlib_model(&model_path).expect("Failed to load model");
    assert_eq!(model.num_landmarks(), 5);

    let image = create_gradient_image(100, 100);
    let rect = Rectangle::new(25.0, 25.0, 75.0, 75.0);

    let detection = model.predict(&image, &rect);

    println!("\nComparing against dlib reference:");
    println!("{:<12} {:>12} {:>12} {:>12}", "Landmark", "ert-shape", "dlib", "diff");
    println!("{:-<52}", "");

    let mut max_error = 0.0f32;
    let mut total_error = 0.0f32;

    for (i, (expected_x, expected_y)) in DLIB_REFERENCE_5POINT.iter().enumerate() {
        let actual = detection.part(i).unwrap().expect("predicted parts are present");
        let error_x = (actual.x - expected_x).abs();
        let error_y = (actual.y - expected_y).abs();
        let error = (error_x * error_x + error_y * error_y).sqrt();

        max_error = max_error.max(error);
        total_error += error;

        println!(
            "Point {:<5} ({:>5.1}, {:>5.1}) ({:>5.1}, {:>5.1}) {:>6.2}px",
            i, actual.x, actual.y, expected_x, expected_y, error
        );
    }

    let avg_error = total_error / 5.0;
    println!("{:-<52}", "");
    println!("Max error: {:.2}px, Avg error: {:.2}px", max_error, avg_error);

    // dlib reads 0 outside the image where we clamp, which only matters
    // near the border
    assert!(
        max_error < 1.5,
        "Max error {:.2}px exceeds threshold of 1.5px",
        max_error
    );
    assert!(
        avg_error < 1.0,
        "Avg error {:.2}px exceeds threshold of 1.0px",
        avg_error
    );
}

#[test]
fn inference_produces_valid_landmarks() {
    let Some(models_dir) = dlib_models_dir() else {
        eprintln!("Skipping test: dlib-models directory not found");
        return;
    };

    let model_path = models_dir.join("shape_predictor_5_face_landmarks.dat.bz2");
    if !model_path.exists() {
        return;
    }

    let model = load_dlib_model(&model_path).expect("Failed to load model");

    let image = create_gradient_image(200, 200);
    let rect = Rectangle::new(50.0, 50.0, 150.0, 150.0);

    let detection = model.predict(&image, &rect);
    assert_eq!(detection.rect(), rect);

    // Landmarks can be slightly outside the object box
    let margin = 50.0;
    for (i, part) in detection.parts().iter().enumerate() {
        let point = part.expect("predicted parts are present");
        assert!(
            point.x >= rect.left - margin && point.x <= rect.right + margin,
            "Landmark {} x={} outside expected range",
            i,
            point.x
        );
        assert!(
            point.y >= rect.top - margin && point.y <= rect.bottom + margin,
            "Landmark {} y={} outside expected range",
            i,
            point.y
        );
    }
}
