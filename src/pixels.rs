//! Grayscale pixel access used by the feature sampler.

use image::DynamicImage;

use crate::error::{Error, Result};

/// Trait for accessing pixel intensities from an image.
pub trait ImageAccess {
    /// Get the grayscale intensity at (x, y). Callers guarantee
    /// `x < width()` and `y < height()`.
    fn get_pixel(&self, x: u32, y: u32) -> u8;

    /// Image dimensions.
    fn width(&self) -> u32;
    fn height(&self) -> u32;

    /// Intensity at the valid pixel nearest to (x, y).
    ///
    /// An image without pixels reads as 0 everywhere.
    #[inline]
    fn clamped_pixel(&self, x: i64, y: i64) -> u8 {
        let (w, h) = (self.width(), self.height());
        if w == 0 || h == 0 {
            return 0;
        }
        let cx = x.clamp(0, w as i64 - 1) as u32;
        let cy = y.clamp(0, h as i64 - 1) as u32;
        self.get_pixel(cx, cy)
    }
}

/// Pixel layouts accepted for raw image buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// One byte per pixel.
    Gray8,
    /// Three bytes per pixel, converted to gray as the channel average.
    Rgb8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Gray8 => 1,
            PixelFormat::Rgb8 => 3,
        }
    }
}

/// A simple row-major grayscale image buffer implementing ImageAccess.
#[derive(Debug, Clone, PartialEq)]
pub struct GrayImage {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl GrayImage {
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        Self::from_raw(PixelFormat::Gray8, width, height, data)
    }

    /// Build an image from a raw buffer in one of the supported formats.
    pub fn from_raw(format: PixelFormat, width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let num_pixels = width as usize * height as usize;
        let expected = num_pixels * format.bytes_per_pixel();
        if data.len() != expected {
            return Err(Error::LengthMismatch {
                what: "image buffer",
                expected,
                actual: data.len(),
            });
        }

        let data = match format {
            PixelFormat::Gray8 => data,
            PixelFormat::Rgb8 => data
                .chunks_exact(3)
                .map(|px| rgb_to_gray(px[0], px[1], px[2]))
                .collect(),
        };

        Ok(Self {
            data,
            width,
            height,
        })
    }

    pub fn from_fn<F>(width: u32, height: u32, f: F) -> Self
    where
        F: Fn(u32, u32) -> u8,
    {
        let mut data = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self {
            data,
            width,
            height,
        }
    }

    pub fn as_raw(&self) -> &[u8] {
        &self.data
    }
}

#[inline]
fn rgb_to_gray(r: u8, g: u8, b: u8) -> u8 {
    ((r as u16 + g as u16 + b as u16) / 3) as u8
}

impl ImageAccess for GrayImage {
    #[inline]
    fn get_pixel(&self, x: u32, y: u32) -> u8 {
        self.data[y as usize * self.width as usize + x as usize]
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }
}

impl TryFrom<&DynamicImage> for GrayImage {
    type Error = Error;

    fn try_from(img: &DynamicImage) -> Result<Self> {
        match img {
            DynamicImage::ImageLuma8(buf) => Self::from_raw(
                PixelFormat::Gray8,
                buf.width(),
                buf.height(),
                buf.as_raw().clone(),
            ),
            DynamicImage::ImageRgb8(buf) => Self::from_raw(
                PixelFormat::Rgb8,
                buf.width(),
                buf.height(),
                buf.as_raw().clone(),
            ),
            other => Err(Error::UnsupportedPixelFormat(format!("{:?}", other.color()))),
        }
    }
}

impl ImageAccess for image::GrayImage {
    #[inline]
    fn get_pixel(&self, x: u32, y: u32) -> u8 {
        image::GrayImage::get_pixel(self, x, y).0[0]
    }

    fn width(&self) -> u32 {
        self.dimensions().0
    }

    fn height(&self) -> u32 {
        self.dimensions().1
    }
}
