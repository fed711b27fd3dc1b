//! Saving and loading trained models in both supported formats.

use std::io::Cursor;

use ert_shape::dlib::{load_dlib_model, load_dlib_model_from_reader, save_dlib_model, write_dlib_model};
use ert_shape::{
    FullObjectDetection, GrayImage, Point, Rectangle, ShapePredictor, ShapePredictorTrainer,
    TrainingOptions,
};

fn image() -> GrayImage {
    GrayImage::from_fn(80, 80, |x, y| ((x * 13 + y * 7) % 251) as u8)
}

fn trained_model() -> ShapePredictor {
    let r1 = Rectangle::new(5.0, 5.0, 45.0, 45.0);
    let r2 = Rectangle::new(30.0, 28.0, 76.0, 78.0);
    let objects = vec![vec![
        FullObjectDetection::new(
            r1,
            vec![Point::new(15.0, 18.0), Point::new(35.0, 17.0), Point::new(25.0, 36.0)],
        ),
        FullObjectDetection::with_parts(
            r2,
            vec![Some(Point::new(41.0, 44.0)), None, Some(Point::new(55.0, 70.0))],
        ),
    ]];
    let options = TrainingOptions::builder()
        .cascade_depth(2)
        .tree_depth(3)
        .num_trees_per_cascade_level(6)
        .oversampling_amount(4)
        .feature_pool_size(25)
        .random_seed(3)
        .build()
        .unwrap();
    ShapePredictorTrainer::new(options)
        .train(&[image()], &objects)
        .unwrap()
}

#[test]
fn native_format_round_trip() {
    let model = trained_model();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.bin");

    model.save(&path).unwrap();
    let loaded = ShapePredictor::load(&path).unwrap();
    assert_eq!(loaded, model);

    let rect = Rectangle::new(10.0, 10.0, 60.0, 60.0);
    assert_eq!(loaded.predict(&image(), &rect), model.predict(&image(), &rect));
}

#[test]
fn dlib_format_round_trip() {
    let model = trained_model();
    let dir = tempfile::tempdir().unwrap();

    for name in ["model.dat", "model.dat.bz2"] {
        let path = dir.path().join(name);
        save_dlib_model(&model, &path).unwrap();
        let loaded = load_dlib_model(&path).unwrap();
        assert_eq!(loaded, model, "{} did not round trip", name);
    }
}

#[test]
fn dlib_stream_round_trip() {
    let model = trained_model();
    let bytes = write_dlib_model(&model, Vec::new()).unwrap();
    // version 1 is encoded as a one byte integer
    assert_eq!(&bytes[..2], &[0x01, 0x01]);

    let loaded = load_dlib_model_from_reader(Cursor::new(bytes)).unwrap();
    assert_eq!(loaded.num_landmarks(), 3);
    assert_eq!(loaded.num_cascade_stages(), 2);
    assert_eq!(loaded, model);
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = ShapePredictor::load(dir.path().join("absent.bin")).unwrap_err();
    assert!(matches!(err, ert_shape::Error::Io(_)));
}

#[test]
fn truncated_dlib_stream_is_rejected() {
    let bytes = write_dlib_model(&trained_model(), Vec::new()).unwrap();
    let truncated = &bytes[..bytes.len() - 3];
    assert!(load_dlib_model_from_reader(Cursor::new(truncated)).is_err());
}
