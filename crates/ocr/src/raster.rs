//! Captured raster images

use image::{DynamicImage, ImageError, RgbaImage};

/// Bytes per RGBA8 pixel
pub const CHANNELS: usize = 4;

/// An acquired document photo: owned RGBA8 pixels plus dimensions.
///
/// Immutable once built. The pipeline reads it and drops it; nothing is
/// persisted.
#[derive(Debug, Clone)]
pub struct RasterImage {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl RasterImage {
    /// Wrap a raw RGBA8 buffer.
    ///
    /// The length is not checked here; a buffer that does not match the
    /// dimensions is reported as undecodable by the quality analyzer.
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Single-colour image, mostly useful for tests and placeholders.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let count = width as usize * height as usize;
        let mut pixels = Vec::with_capacity(count * CHANNELS);
        for _ in 0..count {
            pixels.extend_from_slice(&rgba);
        }
        Self::from_rgba(width, height, pixels)
    }

    /// Decode an encoded buffer (JPEG, PNG, ...).
    pub fn decode(bytes: &[u8]) -> Result<Self, ImageError> {
        let img = image::load_from_memory(bytes)?;
        Ok(Self::from_dynamic(&img))
    }

    pub fn from_dynamic(img: &DynamicImage) -> Self {
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        Self::from_rgba(width, height, rgba.into_raw())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Whether the buffer holds exactly `width * height` RGBA pixels.
    pub fn is_well_formed(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.pixels.len() == self.width as usize * self.height as usize * CHANNELS
    }

    /// Copy into an `image` buffer for encoders. `None` when malformed.
    pub fn to_rgba_image(&self) -> Option<RgbaImage> {
        if !self.is_well_formed() {
            return None;
        }
        RgbaImage::from_raw(self.width, self.height, self.pixels.clone())
    }
}
