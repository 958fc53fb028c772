/// Arnold cat map cipher
///
/// Pure position scrambling: no pixel value changes. Non-square images are
/// padded to a square first, and decryption returns the full square; cropping
/// back to the original size is left to the caller (see [`Image::crop`]).

use crate::buffer::Image;
use crate::error::{CipherError, Result};
use crate::permute::{cat_map, Direction};
use crate::ImageCipher;
use std::time::Instant;
use tracing::debug;

/// `(a, b, iterations)`, all at least 1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArnoldKey {
    a: i64,
    b: i64,
    iterations: u32,
}

impl ArnoldKey {
    pub fn new(a: i64, b: i64, iterations: u32) -> Result<Self> {
        if a < 1 || b < 1 || iterations < 1 {
            return Err(CipherError::InvalidKey(format!(
                "cat map key needs a, b, iterations >= 1, got ({a}, {b}, {iterations})"
            )));
        }
        Ok(Self { a, b, iterations })
    }

    pub fn a(&self) -> i64 {
        self.a
    }

    pub fn b(&self) -> i64 {
        self.b
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ArnoldCat;

impl ArnoldCat {
    pub fn new() -> Self {
        Self
    }

    fn transform(&self, image: Image, key: &ArnoldKey, direction: Direction) -> Result<Image> {
        image.ensure_cipherable()?;
        let started = Instant::now();

        let padded = image.pad_to_square();
        if padded.was_padded() {
            debug!(
                from_width = padded.original_width,
                from_height = padded.original_height,
                side = padded.image.width(),
                "padded image to square"
            );
        }
        let square = padded.image;
        let side = square.width();
        let channels = square.channels();

        let pixels = cat_map(
            square.into_pixels(),
            side as usize,
            channels as usize,
            key.a,
            key.b,
            key.iterations,
            direction,
        );

        debug!(
            ?direction,
            side,
            iterations = key.iterations,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "cat map transform done"
        );
        Image::new(side, side, channels, pixels)
    }
}

impl ImageCipher for ArnoldCat {
    type EncryptKey = ArnoldKey;
    type DecryptKey = ArnoldKey;

    fn encrypt(&self, image: Image, key: &ArnoldKey) -> Result<Image> {
        self.transform(image, key, Direction::Forward)
    }

    fn decrypt(&self, image: Image, key: &ArnoldKey) -> Result<Image> {
        self.transform(image, key, Direction::Inverse)
    }
}
