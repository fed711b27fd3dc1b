//! Reader and writer for dlib's shape_predictor .dat format.
//!
//! Models trained here can be exported for dlib, and dlib's pretrained
//! models can be used for prediction. Both raw `.dat` files and
//! bzip2-compressed `.dat.bz2` files are supported.
//!
//! # Example
//!
//! ```ignore
//! use ert_shape::dlib::{load_dlib_model, save_dlib_model};
//!
//! let model = load_dlib_model("shape_predictor_68_face_landmarks.dat.bz2")?;
//! save_dlib_model(&model, "copy.dat")?;
//! ```
//!
//! # Obtaining Models
//!
//! Pre-trained models are available from the dlib-models repository:
//!
//! ```bash
//! git clone --depth 1 git@github.com:davisking/dlib-models.git
//! ```
//!
//! # Layout
//!
//! A serialized predictor is the version number (1), the mean shape as a
//! `2n x 1` matrix, the forests (`vector<vector<tree>>`, each tree being
//! its splits followed by its leaf matrices), the anchor landmark of every
//! pool entry and finally every pool entry's offset from its anchor.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use bzip2::read::BzDecoder;
use bzip2::write::BzEncoder;
use bzip2::Compression;

use crate::cascade::CascadeStage;
use crate::error::{Error, Result};
use crate::features::FeaturePool;
use crate::model::ShapePredictor;
use crate::tree::{RegressionTree, SplitFeature};
use crate::types::{Point, Shape};

const FORMAT_VERSION: i64 = 1;

/// Reader wrapper for parsing dlib's binary format.
///
/// dlib uses a variable-length integer encoding:
/// - Control byte: high bit = sign (1 = negative), low 4 bits = number of bytes following
/// - Value bytes: little-endian integer value
///
/// Floats are stored as (mantissa, exponent) pairs, reconstructed via ldexp.
struct DlibReader<R: Read> {
    reader: R,
}

impl<R: Read> DlibReader<R> {
    fn new(reader: R) -> Self {
        Self { reader }
    }

    fn read_byte(&mut self) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.reader.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    /// Decode a variable-length integer.
    fn read_int(&mut self) -> Result<i64> {
        let control = self.read_byte()?;
        let is_negative = (control & 0x80) != 0;
        let num_bytes = (control & 0x0F) as usize;

        if num_bytes > 8 {
            return Err(Error::InvalidModel(format!(
                "Integer of {} bytes does not fit in 64 bits",
                num_bytes
            )));
        }

        let mut val: u64 = 0;
        for i in 0..num_bytes {
            let byte = self.read_byte()? as u64;
            val |= byte << (8 * i);
        }

        let signed_val = val as i64;
        Ok(if is_negative { signed_val.wrapping_neg() } else { signed_val })
    }

    fn read_ulong(&mut self) -> Result<u64> {
        let val = self.read_int()?;
        if val < 0 {
            return Err(Error::InvalidModel(format!(
                "Expected unsigned value, got {}",
                val
            )));
        }
        Ok(val as u64)
    }

    /// Read a length prefix, refusing counts no real model could reach.
    fn read_len(&mut self, what: &str) -> Result<usize> {
        let len = self.read_ulong()?;
        if len > u32::MAX as u64 {
            return Err(Error::InvalidModel(format!("Implausible {} count: {}", what, len)));
        }
        Ok(len as usize)
    }

    /// Decode a float stored as (mantissa, exponent) pair.
    fn read_float(&mut self) -> Result<f32> {
        let mantissa = self.read_int()?;
        let exponent = self.read_int()?;

        if mantissa == 0 {
            return Ok(0.0);
        }

        let exponent = exponent.clamp(i32::MIN as i64, i32::MAX as i64) as i32;
        let result = (mantissa as f64) * (2.0_f64).powi(exponent);
        Ok(result as f32)
    }

    /// Read a column vector stored as (-rows, -cols, data...) and return
    /// it as a shape.
    fn read_shape(&mut self, expected_landmarks: Option<usize>) -> Result<Shape> {
        let rows = self.read_int()?.wrapping_neg();
        let cols = self.read_int()?.wrapping_neg();

        if cols != 1 || rows < 0 || rows % 2 != 0 || rows > u32::MAX as i64 {
            return Err(Error::InvalidModel(format!(
                "Invalid shape matrix dimensions: {}x{}",
                rows, cols
            )));
        }
        let num_landmarks = rows as usize / 2;
        if let Some(expected) = expected_landmarks {
            if num_landmarks != expected {
                return Err(Error::InvalidModel(format!(
                    "Invalid leaf delta: {}x{}, expected {}x1",
                    rows,
                    cols,
                    expected * 2
                )));
            }
        }

        let mut points = Vec::with_capacity(num_landmarks);
        for _ in 0..num_landmarks {
            let x = self.read_float()?;
            let y = self.read_float()?;
            points.push(Point::new(x, y));
        }
        Ok(Shape::new(points))
    }
}

/// Writer counterpart of [`DlibReader`].
struct DlibWriter<W: Write> {
    writer: W,
}

impl<W: Write> DlibWriter<W> {
    fn new(writer: W) -> Self {
        Self { writer }
    }

    fn write_int(&mut self, val: i64) -> Result<()> {
        let mut buf = [0u8; 9];
        let abs_val = val.unsigned_abs();
        let mut num_bytes = 0;
        let mut rest = abs_val;
        while rest != 0 {
            num_bytes += 1;
            buf[num_bytes] = (rest & 0xFF) as u8;
            rest >>= 8;
        }
        buf[0] = num_bytes as u8;
        if val < 0 {
            buf[0] |= 0x80;
        }
        self.writer.write_all(&buf[..=num_bytes])?;
        Ok(())
    }

    fn write_ulong(&mut self, val: usize) -> Result<()> {
        self.write_int(val as i64)
    }

    /// Encode a float as an exact (mantissa, exponent) pair.
    fn write_float(&mut self, val: f32) -> Result<()> {
        if !val.is_finite() {
            return Err(Error::InvalidModel(format!("Cannot serialize {}", val)));
        }
        let (mantissa, exponent) = decompose_f32(val);
        self.write_int(mantissa)?;
        self.write_int(exponent)
    }

    fn write_shape(&mut self, shape: &Shape) -> Result<()> {
        self.write_int(-(shape.num_landmarks() as i64 * 2))?;
        self.write_int(-1)?;
        for p in &shape.points {
            self.write_float(p.x)?;
            self.write_float(p.y)?;
        }
        Ok(())
    }

    fn finish(mut self) -> Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

/// Split a finite float into `mantissa * 2^exponent` with an integer
/// mantissa, without rounding.
fn decompose_f32(val: f32) -> (i64, i64) {
    if val == 0.0 {
        return (0, 0);
    }
    let bits = val.to_bits();
    let exp_bits = ((bits >> 23) & 0xFF) as i64;
    let frac = (bits & 0x7F_FFFF) as i64;
    let (mantissa, exponent) = if exp_bits == 0 {
        (frac, -149)
    } else {
        (frac | (1 << 23), exp_bits - 150)
    };
    if val.is_sign_negative() {
        (-mantissa, exponent)
    } else {
        (mantissa, exponent)
    }
}

/// Load a dlib shape_predictor from a .dat or .dat.bz2 file.
pub fn load_dlib_model<P: AsRef<Path>>(path: P) -> Result<ShapePredictor> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    if is_bz2(path) {
        load_dlib_model_from_reader(BzDecoder::new(reader))
    } else {
        load_dlib_model_from_reader(reader)
    }
}

/// Load a dlib model from an already-opened reader.
pub fn load_dlib_model_from_reader<R: Read>(reader: R) -> Result<ShapePredictor> {
    let mut r = DlibReader::new(reader);
    parse_shape_predictor(&mut r)
}

/// Save a predictor in dlib's format. Paths ending in `.bz2` are compressed.
pub fn save_dlib_model<P: AsRef<Path>>(model: &ShapePredictor, path: P) -> Result<()> {
    let path = path.as_ref();
    let writer = BufWriter::new(File::create(path)?);

    if is_bz2(path) {
        let encoder = write_dlib_model(model, BzEncoder::new(writer, Compression::best()))?;
        encoder.finish()?.flush()?;
    } else {
        write_dlib_model(model, writer)?;
    }
    Ok(())
}

/// Serialize a predictor in dlib's format and return the flushed writer.
pub fn write_dlib_model<W: Write>(model: &ShapePredictor, writer: W) -> Result<W> {
    let mut w = DlibWriter::new(writer);

    w.write_int(FORMAT_VERSION)?;
    w.write_shape(model.mean_shape())?;

    w.write_ulong(model.num_cascade_stages())?;
    for (stage_idx, stage) in model.stages().iter().enumerate() {
        w.write_ulong(stage.num_trees())?;
        for tree in &stage.forest {
            let (splits, leaves) = tree.splits_and_leaves().ok_or_else(|| {
                Error::InvalidModel(format!(
                    "Stage {}: tree is not a complete binary tree",
                    stage_idx
                ))
            })?;
            w.write_ulong(splits.len())?;
            for (feature, threshold) in &splits {
                w.write_ulong(feature.idx1 as usize)?;
                w.write_ulong(feature.idx2 as usize)?;
                w.write_float(*threshold)?;
            }
            w.write_ulong(leaves.len())?;
            for leaf in leaves {
                w.write_shape(leaf)?;
            }
        }
    }

    w.write_ulong(model.num_cascade_stages())?;
    for stage in model.stages() {
        w.write_ulong(stage.pool.anchors.len())?;
        for &anchor in &stage.pool.anchors {
            w.write_ulong(anchor as usize)?;
        }
    }

    w.write_ulong(model.num_cascade_stages())?;
    for stage in model.stages() {
        w.write_ulong(stage.pool.offsets.len())?;
        for offset in &stage.pool.offsets {
            w.write_float(offset.x)?;
            w.write_float(offset.y)?;
        }
    }

    w.finish()
}

fn is_bz2(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "bz2")
}

fn parse_shape_predictor<R: Read>(r: &mut DlibReader<R>) -> Result<ShapePredictor> {
    let version = r.read_int()?;
    if version != FORMAT_VERSION {
        return Err(Error::InvalidModel(format!(
            "Unsupported shape_predictor version: {}",
            version
        )));
    }

    let initial_shape = r.read_shape(None)?;
    let num_landmarks = initial_shape.num_landmarks();

    let num_cascades = r.read_len("cascade")?;
    let mut forests: Vec<Vec<RegressionTree>> = Vec::with_capacity(num_cascades.min(1024));
    for _ in 0..num_cascades {
        let num_trees = r.read_len("tree")?;
        let mut trees = Vec::with_capacity(num_trees.min(4096));
        for _ in 0..num_trees {
            trees.push(parse_tree(r, num_landmarks)?);
        }
        forests.push(trees);
    }

    // anchor_idx[cascade][feature_idx] = landmark index
    let num_anchor_cascades = r.read_len("anchor cascade")?;
    let mut anchor_idx: Vec<Vec<u32>> = Vec::with_capacity(num_anchor_cascades.min(1024));
    for _ in 0..num_anchor_cascades {
        let num_anchors = r.read_len("anchor")?;
        let mut anchors = Vec::with_capacity(num_anchors.min(4096));
        for _ in 0..num_anchors {
            let anchor = r.read_ulong()?;
            let anchor = u32::try_from(anchor)
                .map_err(|_| Error::InvalidModel(format!("Anchor {} out of range", anchor)))?;
            anchors.push(anchor);
        }
        anchor_idx.push(anchors);
    }

    // deltas[cascade][feature_idx] = offset from the anchor
    let num_delta_cascades = r.read_len("delta cascade")?;
    let mut deltas: Vec<Vec<Point>> = Vec::with_capacity(num_delta_cascades.min(1024));
    for _ in 0..num_delta_cascades {
        let num_deltas = r.read_len("delta")?;
        let mut cascade_deltas = Vec::with_capacity(num_deltas.min(4096));
        for _ in 0..num_deltas {
            let dx = r.read_float()?;
            let dy = r.read_float()?;
            cascade_deltas.push(Point::new(dx, dy));
        }
        deltas.push(cascade_deltas);
    }

    if anchor_idx.len() != num_cascades || deltas.len() != num_cascades {
        return Err(Error::InvalidModel(format!(
            "{} forests but {} anchor sets and {} delta sets",
            num_cascades,
            anchor_idx.len(),
            deltas.len()
        )));
    }

    let cascade = forests
        .into_iter()
        .zip(anchor_idx)
        .zip(deltas)
        .map(|((forest, anchors), offsets)| CascadeStage::new(FeaturePool::new(anchors, offsets), forest))
        .collect();

    ShapePredictor::from_parts(initial_shape, cascade)
}

fn parse_tree<R: Read>(r: &mut DlibReader<R>, num_landmarks: usize) -> Result<RegressionTree> {
    let num_splits = r.read_len("split")?;
    let mut splits = Vec::with_capacity(num_splits.min(4096));

    for _ in 0..num_splits {
        let idx1 = r.read_ulong()?;
        let idx2 = r.read_ulong()?;
        let threshold = r.read_float()?;
        let (idx1, idx2) = match (u32::try_from(idx1), u32::try_from(idx2)) {
            (Ok(a), Ok(b)) => (a, b),
            _ => {
                return Err(Error::InvalidModel(format!(
                    "Feature index ({}, {}) out of range",
                    idx1, idx2
                )))
            }
        };
        splits.push((SplitFeature { idx1, idx2 }, threshold));
    }

    let num_leaves = r.read_len("leaf")?;
    if num_leaves != num_splits + 1 {
        return Err(Error::InvalidModel(format!(
            "Invalid tree: {} splits should have {} leaves, got {}",
            num_splits,
            num_splits + 1,
            num_leaves
        )));
    }

    let mut leaves = Vec::with_capacity(num_leaves);
    for _ in 0..num_leaves {
        leaves.push(r.read_shape(Some(num_landmarks))?);
    }

    Ok(RegressionTree::from_splits_and_leaves(splits, leaves))
}
