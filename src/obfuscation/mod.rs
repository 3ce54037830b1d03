//! Image obfuscation: hide selected pixels and lock their values under the
//! per-asset secret

pub mod mask;

use std::io::Cursor;

use image::{ImageOutputFormat, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::crypto::{lock_values, unlock_values, LockedValues, Secret};
use crate::error::{EnftError, Result};

pub use mask::{select_pixels, MaskStrategy, PixelCoord};

/// Colour written over every hidden pixel
pub const REDACTED: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Original colour of one hidden pixel
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaskedPixel {
    pub x: u32,
    pub y: u32,
    pub rgba: [u8; 4],
}

/// The hidden pixels of one image, in mask order
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaskedValues {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<MaskedPixel>,
}

impl MaskedValues {
    /// Record the colours at `coords`. Coordinates outside the image are skipped.
    pub fn extract(image: &RgbaImage, coords: &[PixelCoord]) -> Self {
        let (width, height) = image.dimensions();
        let pixels = coords
            .iter()
            .filter(|c| c.x < width && c.y < height)
            .map(|c| MaskedPixel {
                x: c.x,
                y: c.y,
                rgba: image.get_pixel(c.x, c.y).0,
            })
            .collect();

        Self {
            width,
            height,
            pixels,
        }
    }

    /// Write the recorded colours back into `image`
    pub fn restore_into(&self, image: &mut RgbaImage) -> Result<()> {
        if image.dimensions() != (self.width, self.height) {
            return Err(EnftError::ImageMismatch(format!(
                "image is {}x{}, values were taken from {}x{}",
                image.width(),
                image.height(),
                self.width,
                self.height
            )));
        }

        for pixel in &self.pixels {
            if pixel.x >= self.width || pixel.y >= self.height {
                return Err(EnftError::ImageMismatch(format!(
                    "pixel ({}, {}) is outside the image",
                    pixel.x, pixel.y
                )));
            }
            image.put_pixel(pixel.x, pixel.y, Rgba(pixel.rgba));
        }
        Ok(())
    }
}

/// Output of [`obfuscate`]: the redacted image and the locked pixel values
#[derive(Clone, Debug)]
pub struct ObfuscatedAsset {
    pub image: RgbaImage,
    pub locked: LockedValues,
    pub masked: usize,
}

/// Hide the pixels chosen by `strategy` and lock their values under `secret`
pub fn obfuscate(
    image: &RgbaImage,
    strategy: &MaskStrategy,
    secret: &Secret,
) -> Result<ObfuscatedAsset> {
    let coords = select_pixels(image, strategy);
    let values = MaskedValues::extract(image, &coords);

    let mut redacted = image.clone();
    for c in &coords {
        redacted.put_pixel(c.x, c.y, REDACTED);
    }

    let locked = lock_values(&values, secret)?;

    tracing::debug!(
        width = image.width(),
        height = image.height(),
        masked = coords.len(),
        "Obfuscated image"
    );

    Ok(ObfuscatedAsset {
        image: redacted,
        locked,
        masked: coords.len(),
    })
}

/// Unlock the hidden values and paint them back
pub fn deobfuscate(
    obfuscated: &RgbaImage,
    locked: &LockedValues,
    secret: &Secret,
) -> Result<RgbaImage> {
    let values = unlock_values(locked, secret)?;
    let mut restored = obfuscated.clone();
    values.restore_into(&mut restored)?;
    Ok(restored)
}

/// Decode any supported image format into RGBA
pub fn decode_image(bytes: &[u8]) -> Result<RgbaImage> {
    image::load_from_memory(bytes)
        .map(|img| img.to_rgba8())
        .map_err(|e| EnftError::Image(e.to_string()))
}

/// Encode as PNG, the lossless format obfuscated images are stored in
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, ImageOutputFormat::Png)
        .map_err(|e| EnftError::Image(e.to_string()))?;
    Ok(out.into_inner())
}
