/// Canonical image buffer handed to and returned from every cipher
///
/// Pixels are stored row-major with channels interleaved (`y * width + x`
/// selects a pixel, the channel index selects a byte inside it). The colour
/// discriminator is a static field set at construction; nothing probes pixel
/// values to guess it.

use crate::error::{CipherError, Result};
use image::{DynamicImage, GrayAlphaImage, GrayImage, RgbImage, RgbaImage};
use rand::RngCore;

/// Channel layout of an [`Image`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Gray,
    GrayAlpha,
    Rgb,
    Rgba,
}

impl PixelFormat {
    pub fn from_channels(channels: u8) -> Result<Self> {
        match channels {
            1 => Ok(Self::Gray),
            2 => Ok(Self::GrayAlpha),
            3 => Ok(Self::Rgb),
            4 => Ok(Self::Rgba),
            other => Err(CipherError::UnsupportedFormat { channels: other }),
        }
    }

    pub fn channels(self) -> u8 {
        match self {
            Self::Gray => 1,
            Self::GrayAlpha => 2,
            Self::Rgb => 3,
            Self::Rgba => 4,
        }
    }

    pub fn is_color(self) -> bool {
        matches!(self, Self::Rgb | Self::Rgba)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    width: u32,
    height: u32,
    format: PixelFormat,
    pixels: Vec<u8>,
}

/// Result of [`Image::pad_to_square`]: the square image plus the geometry
/// needed to crop back after an inverse transform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Padded {
    pub image: Image,
    pub original_width: u32,
    pub original_height: u32,
}

impl Padded {
    pub fn was_padded(&self) -> bool {
        self.image.width != self.original_width || self.image.height != self.original_height
    }
}

/// Byte length of a `width x height x channels` buffer, or `None` on overflow
pub(crate) fn byte_len(width: u32, height: u32, channels: u8) -> Option<usize> {
    (width as usize)
        .checked_mul(height as usize)?
        .checked_mul(channels as usize)
}

impl Image {
    /// Wrap an existing row-major pixel buffer.
    ///
    /// Fails when a dimension is zero, the channel count is outside 1..=4, or
    /// `pixels.len() != width * height * channels`.
    pub fn new(width: u32, height: u32, channels: u8, pixels: Vec<u8>) -> Result<Self> {
        let format = PixelFormat::from_channels(channels)?;
        let expected = byte_len(width, height, channels);
        if width == 0 || height == 0 || expected != Some(pixels.len()) {
            return Err(CipherError::InvalidDimensions {
                width,
                height,
                channels,
                len: pixels.len(),
            });
        }
        Ok(Self { width, height, format, pixels })
    }

    pub fn gray(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        Self::new(width, height, 1, pixels)
    }

    pub fn rgb(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        Self::new(width, height, 3, pixels)
    }

    /// All-zero image of the given geometry
    pub fn zeroed(width: u32, height: u32, channels: u8) -> Result<Self> {
        let len = byte_len(width, height, channels).unwrap_or(0);
        Self::new(width, height, channels, vec![0u8; len])
    }

    /// Uniformly random image of the given geometry
    pub fn noise(width: u32, height: u32, channels: u8) -> Result<Self> {
        let len = byte_len(width, height, channels).unwrap_or(0);
        let mut pixels = vec![0u8; len];
        rand::thread_rng().fill_bytes(&mut pixels);
        Self::new(width, height, channels, pixels)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.format.channels()
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn is_color(&self) -> bool {
        self.format.is_color()
    }

    pub fn is_square(&self) -> bool {
        self.width == self.height
    }

    /// Number of pixel positions (`width * height`)
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    /// Same geometry, new pixel bytes. Length is checked.
    pub(crate) fn with_pixels(&self, pixels: Vec<u8>) -> Result<Self> {
        Self::new(self.width, self.height, self.channels(), pixels)
    }

    /// Reject anything the pixel ciphers do not handle (only gray and RGB)
    pub fn ensure_cipherable(&self) -> Result<()> {
        match self.format {
            PixelFormat::Gray | PixelFormat::Rgb => Ok(()),
            other => Err(CipherError::UnsupportedFormat { channels: other.channels() }),
        }
    }

    /// Embed the image in the top-left corner of a zero-filled square of side
    /// `max(width, height)`. Square inputs are returned untouched.
    pub fn pad_to_square(self) -> Padded {
        let (original_width, original_height) = (self.width, self.height);
        if self.is_square() {
            return Padded { image: self, original_width, original_height };
        }

        let side = self.width.max(self.height);
        let ch = self.channels() as usize;
        let src_row = self.width as usize * ch;
        let dst_row = side as usize * ch;
        let mut pixels = vec![0u8; dst_row * side as usize];
        for (y, row) in self.pixels.chunks_exact(src_row).enumerate() {
            pixels[y * dst_row..y * dst_row + src_row].copy_from_slice(row);
        }

        let image = Image { width: side, height: side, format: self.format, pixels };
        Padded { image, original_width, original_height }
    }

    /// Top-left `width x height` region
    pub fn crop(&self, width: u32, height: u32) -> Result<Self> {
        if width > self.width || height > self.height {
            return Err(CipherError::InvalidDimensions {
                width,
                height,
                channels: self.channels(),
                len: self.pixels.len(),
            });
        }
        let ch = self.channels() as usize;
        let src_row = self.width as usize * ch;
        let dst_row = width as usize * ch;
        let mut pixels = Vec::with_capacity(dst_row * height as usize);
        for row in self.pixels.chunks_exact(src_row).take(height as usize) {
            pixels.extend_from_slice(&row[..dst_row]);
        }
        Self::new(width, height, self.channels(), pixels)
    }

    /// Convert into an `image` crate buffer of the matching colour type
    pub fn into_dynamic(self) -> Result<DynamicImage> {
        let Image { width, height, format, pixels } = self;
        let len = pixels.len();
        let mismatch = || CipherError::InvalidDimensions {
            width,
            height,
            channels: format.channels(),
            len,
        };
        let dynamic = match format {
            PixelFormat::Gray => {
                DynamicImage::ImageLuma8(GrayImage::from_raw(width, height, pixels).ok_or_else(mismatch)?)
            }
            PixelFormat::GrayAlpha => DynamicImage::ImageLumaA8(
                GrayAlphaImage::from_raw(width, height, pixels).ok_or_else(mismatch)?,
            ),
            PixelFormat::Rgb => {
                DynamicImage::ImageRgb8(RgbImage::from_raw(width, height, pixels).ok_or_else(mismatch)?)
            }
            PixelFormat::Rgba => {
                DynamicImage::ImageRgba8(RgbaImage::from_raw(width, height, pixels).ok_or_else(mismatch)?)
            }
        };
        Ok(dynamic)
    }
}

impl TryFrom<&DynamicImage> for Image {
    type Error = CipherError;

    /// Gray sources become 1-channel images, colour sources 3-channel (alpha is
    /// kept as a fourth channel, which the pixel ciphers then refuse)
    fn try_from(source: &DynamicImage) -> Result<Self> {
        let color = source.color();
        let (width, height) = (source.width(), source.height());
        match (color.has_color(), color.has_alpha()) {
            (false, false) => Self::new(width, height, 1, source.to_luma8().into_raw()),
            (false, true) => Self::new(width, height, 2, source.to_luma_alpha8().into_raw()),
            (true, false) => Self::new(width, height, 3, source.to_rgb8().into_raw()),
            (true, true) => Self::new(width, height, 4, source.to_rgba8().into_raw()),
        }
    }
}
