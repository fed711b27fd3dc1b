//! Command line front end for training, evaluating and running shape
//! predictors.
//!
//! Usage:
//!   ert-shape train data.json -o model.dat          # Train and export for dlib
//!   ert-shape test model.dat data.json              # Mean landmark error
//!   ert-shape predict model.dat img.png --rect 10,10,90,90 --json
//!
//! Datasets are JSON manifests:
//!
//! ```json
//! [
//!   {
//!     "image": "faces/0001.png",
//!     "objects": [
//!       {
//!         "rect": { "left": 10.0, "top": 12.0, "right": 90.0, "bottom": 95.0 },
//!         "parts": [{ "x": 30.0, "y": 40.0 }, null]
//!       }
//!     ],
//!     "scales": [48.5]
//!   }
//! ]
//! ```
//!
//! Image paths are relative to the manifest. `scales` is optional and only
//! used by `test`. Models ending in `.bin` use the native format, anything
//! else dlib's format.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use log::info;
use serde::{Deserialize, Serialize};

use ert_shape::dlib::{load_dlib_model, save_dlib_model};
use ert_shape::{
    test_shape_predictor, FullObjectDetection, GrayImage, Rectangle, ShapePredictor,
    ShapePredictorTrainer, TrainingOptions,
};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser, Debug)]
#[command(name = "ert-shape")]
#[command(author, version, about = "Shape prediction with ensembles of regression trees", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train a predictor from a labeled manifest
    Train(TrainArgs),
    /// Report the mean landmark error of a predictor on a labeled manifest
    Test(TestArgs),
    /// Predict the parts of one object
    Predict(PredictArgs),
}

#[derive(Args, Debug)]
struct TrainArgs {
    /// Training manifest
    manifest: PathBuf,

    /// Output model (`.bin` native, otherwise dlib `.dat`, `.bz2` compressed)
    #[arg(short, long)]
    output: PathBuf,

    #[arg(long, default_value_t = 10)]
    cascade_depth: usize,

    #[arg(long, default_value_t = 4)]
    tree_depth: usize,

    #[arg(long, default_value_t = 500)]
    num_trees_per_cascade_level: usize,

    /// Shrinkage applied to every leaf
    #[arg(long, default_value_t = 0.1)]
    nu: f32,

    #[arg(long, default_value_t = 20)]
    oversampling_amount: usize,

    #[arg(long, default_value_t = 400)]
    feature_pool_size: usize,

    /// Preference for close feature pairs, lower is tighter
    #[arg(long, default_value_t = 0.1)]
    lambda: f32,

    #[arg(long, default_value_t = 20)]
    num_test_splits: usize,

    #[arg(long, default_value_t = 0.0)]
    feature_pool_region_padding: f32,

    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Worker threads, 0 for all cores
    #[arg(short = 'j', long, default_value_t = 0)]
    threads: usize,

    /// Log training progress
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Args, Debug)]
struct TestArgs {
    model: PathBuf,
    manifest: PathBuf,
}

#[derive(Args, Debug)]
struct PredictArgs {
    model: PathBuf,
    image: PathBuf,

    /// Object rectangle as left,top,right,bottom
    #[arg(long, value_parser = parse_rect)]
    rect: Rectangle,

    /// Average over this many shifted starting shapes
    #[arg(long, default_value_t = 1)]
    initializations: usize,

    /// Maximum start shift in units of the rectangle size
    #[arg(long, default_value_t = 0.1)]
    max_offset: f32,

    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Output as JSON
    #[arg(short, long)]
    json: bool,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Deserialize, Debug)]
struct ManifestEntry {
    image: PathBuf,
    #[serde(default)]
    objects: Vec<FullObjectDetection>,
    #[serde(default)]
    scales: Option<Vec<f64>>,
}

#[derive(Serialize)]
struct PredictOutput<'a> {
    image: String,
    detection: &'a FullObjectDetection,
}

struct Dataset {
    images: Vec<GrayImage>,
    objects: Vec<Vec<FullObjectDetection>>,
    scales: Option<Vec<Vec<f64>>>,
}

fn main() {
    let cli = Cli::parse();
    let default_level = match &cli.command {
        Command::Train(args) if args.verbose => "info",
        _ => "warn",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    let result = match &cli.command {
        Command::Train(args) => train(args),
        Command::Test(args) => test(args),
        Command::Predict(args) => predict(args),
    };
    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn train(args: &TrainArgs) -> CliResult<()> {
    let options = TrainingOptions::builder()
        .cascade_depth(args.cascade_depth)
        .tree_depth(args.tree_depth)
        .num_trees_per_cascade_level(args.num_trees_per_cascade_level)
        .nu(args.nu)
        .oversampling_amount(args.oversampling_amount)
        .feature_pool_size(args.feature_pool_size)
        .lambda(args.lambda)
        .num_test_splits(args.num_test_splits)
        .feature_pool_region_padding(args.feature_pool_region_padding)
        .random_seed(args.seed)
        .num_threads(args.threads)
        .verbose(args.verbose)
        .build()?;

    let dataset = load_dataset(&args.manifest)?;
    let model = ShapePredictorTrainer::new(options).train(&dataset.images, &dataset.objects)?;
    save_model(&model, &args.output)?;
    info!("Model written to {:?}", args.output);
    Ok(())
}

fn test(args: &TestArgs) -> CliResult<()> {
    let model = load_model(&args.model)?;
    let dataset = load_dataset(&args.manifest)?;
    let error = test_shape_predictor(
        &model,
        &dataset.images,
        &dataset.objects,
        dataset.scales.as_deref(),
    )?;
    println!("{}", error);
    Ok(())
}

fn predict(args: &PredictArgs) -> CliResult<()> {
    let model = load_model(&args.model)?;
    let image = load_image(&args.image)?;

    let detection = if args.initializations > 1 {
        model.predict_averaged(&image, &args.rect, args.initializations, args.max_offset, args.seed)?
    } else {
        model.predict(&image, &args.rect)
    };

    let output = if args.json {
        serde_json::to_string_pretty(&PredictOutput {
            image: args.image.display().to_string(),
            detection: &detection,
        })?
    } else {
        let mut s = String::new();
        for (i, part) in detection.parts().iter().enumerate() {
            if let Some(p) = part {
                s.push_str(&format!("{} {:.2} {:.2}\n", i, p.x, p.y));
            }
        }
        s
    };

    if let Some(ref path) = args.output {
        std::fs::write(path, &output)?;
        info!("Output written to {:?}", path);
    } else {
        print!("{}", output);
    }
    Ok(())
}

fn is_native(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "bin")
}

fn load_model(path: &Path) -> CliResult<ShapePredictor> {
    info!("Loading model from {:?}", path);
    let model = if is_native(path) {
        ShapePredictor::load(path)?
    } else {
        load_dlib_model(path)?
    };
    info!(
        "Model has {} landmarks and {} cascade stages",
        model.num_landmarks(),
        model.num_cascade_stages()
    );
    Ok(model)
}

fn save_model(model: &ShapePredictor, path: &Path) -> CliResult<()> {
    if is_native(path) {
        model.save(path)?;
    } else {
        save_dlib_model(model, path)?;
    }
    Ok(())
}

fn load_image(path: &Path) -> CliResult<GrayImage> {
    let img = image::open(path)?;
    Ok(GrayImage::try_from(&img)?)
}

fn load_dataset(manifest: &Path) -> CliResult<Dataset> {
    let reader = BufReader::new(File::open(manifest)?);
    let entries: Vec<ManifestEntry> = serde_json::from_reader(reader)?;
    let base = manifest.parent().unwrap_or_else(|| Path::new(""));

    let mut images = Vec::with_capacity(entries.len());
    let mut objects = Vec::with_capacity(entries.len());
    let mut scales = Vec::with_capacity(entries.len());
    let mut has_scales = false;
    for entry in entries {
        images.push(load_image(&base.join(&entry.image))?);
        has_scales |= entry.scales.is_some();
        scales.push(entry.scales.unwrap_or_else(|| vec![1.0; entry.objects.len()]));
        objects.push(entry.objects);
    }
    info!(
        "Loaded {} images with {} objects from {:?}",
        images.len(),
        objects.iter().map(Vec::len).sum::<usize>(),
        manifest
    );

    Ok(Dataset {
        images,
        objects,
        scales: has_scales.then_some(scales),
    })
}

fn parse_rect(s: &str) -> Result<Rectangle, String> {
    let values: Vec<f32> = s
        .split(',')
        .map(|v| v.trim().parse::<f32>().map_err(|e| format!("{}: {}", v, e)))
        .collect::<Result<_, _>>()?;
    match values[..] {
        [left, top, right, bottom] => Ok(Rectangle::new(left, top, right, bottom)),
        _ => Err(format!("expected left,top,right,bottom, got {}", s)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ert_shape::{Error, ImageAccess};

    #[test]
    fn rgba_images_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rgba.png");
        image::RgbaImage::from_pixel(2, 2, image::Rgba([10, 20, 30, 255]))
            .save(&path)
            .unwrap();

        let err = load_image(&path).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::UnsupportedPixelFormat(_))
        ));
    }

    #[test]
    fn rgb_images_use_the_channel_average() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rgb.png");
        image::RgbImage::from_pixel(2, 2, image::Rgb([10, 20, 90]))
            .save(&path)
            .unwrap();

        let gray = load_image(&path).unwrap();
        assert_eq!(gray.get_pixel(1, 1), 40);
    }

    #[test]
    fn rect_parsing() {
        assert_eq!(parse_rect("1,2, 3,4").unwrap(), Rectangle::new(1.0, 2.0, 3.0, 4.0));
        assert!(parse_rect("1,2,3").is_err());
        assert!(parse_rect("a,2,3,4").is_err());
    }
}
