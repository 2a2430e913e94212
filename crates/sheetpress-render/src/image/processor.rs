// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image processor: decode, exact resize, rotation, and the per-pixel
// adjustment passes behind card effect overrides. Operates on in-memory images
// using the `image` and `imageproc` crates.

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use imageproc::geometric_transformations::{self, Interpolation};
use sheetpress_core::error::SheetpressError;
use tracing::{debug, instrument};

/// Image processing pipeline operating on a single in-memory image.
///
/// Each method consumes `self` and returns a new `ImageProcessor` wrapping the
/// transformed image, enabling method chaining.
///
/// ```ignore
/// let tile = ImageProcessor::from_bytes(&bytes)?
///     .resize_exact(792, 1087)
///     .adjust_contrast(1.2)
///     .into_rgba();
/// ```
pub struct ImageProcessor {
    /// The current working image.
    image: DynamicImage,
}

impl ImageProcessor {
    // -- Construction ---------------------------------------------------------

    /// Create a processor from raw encoded bytes (JPEG, PNG, etc.).
    #[instrument(skip(data), fields(data_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self, SheetpressError> {
        let img = image::load_from_memory(data).map_err(|err| {
            SheetpressError::ImageError(format!("failed to decode image: {}", err))
        })?;
        debug!(
            width = img.width(),
            height = img.height(),
            "Image decoded from bytes"
        );
        Ok(Self { image: img })
    }

    /// Wrap an already-decoded `DynamicImage`.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self { image }
    }

    // -- Accessors ------------------------------------------------------------

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Consume the processor and return RGBA8 pixels.
    pub fn into_rgba(self) -> RgbaImage {
        self.image.into_rgba8()
    }

    // -- Geometry -------------------------------------------------------------

    /// Resize the image to exactly `width` x `height`, ignoring aspect ratio.
    /// A no-op when the size already matches.
    pub fn resize_exact(self, width: u32, height: u32) -> Self {
        if self.image.width() == width && self.image.height() == height {
            return self;
        }
        let resized =
            self.image
                .resize_exact(width, height, image::imageops::FilterType::Lanczos3);
        Self { image: resized }
    }

    /// Rotate the image clockwise about its centre, keeping its dimensions.
    ///
    /// Multiples of 180 degrees are lossless. Other angles use bilinear
    /// interpolation; uncovered corners become transparent.
    pub fn rotate(self, degrees: f32) -> Self {
        let normalised = degrees.rem_euclid(360.0);
        if normalised.abs() < 0.01 || (normalised - 360.0).abs() < 0.01 {
            return self;
        }
        if (normalised - 180.0).abs() < 0.01 {
            return Self {
                image: self.image.rotate180(),
            };
        }

        let rgba = self.image.to_rgba8();
        let rotated: RgbaImage = geometric_transformations::rotate_about_center(
            &rgba,
            normalised.to_radians(),
            Interpolation::Bilinear,
            Rgba([255u8, 255, 255, 0]),
        );
        Self {
            image: DynamicImage::ImageRgba8(rotated),
        }
    }

    // -- Adjustments ----------------------------------------------------------

    /// Convert to grayscale, keeping the alpha channel.
    pub fn grayscale(self) -> Self {
        let gray = self.image.grayscale();
        Self {
            image: DynamicImage::ImageRgba8(gray.to_rgba8()),
        }
    }

    /// Adjust brightness by `value` (-255..=255). Positive values brighten.
    pub fn adjust_brightness(self, value: f32) -> Self {
        let offset = value.clamp(-255.0, 255.0);
        self.map_channels(|c| c + offset)
    }

    /// Adjust contrast by a factor around mid-grey. 1.0 is a no-op.
    pub fn adjust_contrast(self, factor: f32) -> Self {
        self.map_channels(|c| factor * (c - 128.0) + 128.0)
    }

    /// Scale saturation: 0.0 is grayscale, 1.0 is a no-op.
    pub fn adjust_saturation(self, factor: f32) -> Self {
        let mut rgba = self.image.into_rgba8();
        for pixel in rgba.pixels_mut() {
            let [r, g, b, a] = pixel.0;
            let luma = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
            let scale = |c: u8| to_channel(luma + (c as f32 - luma) * factor);
            *pixel = Rgba([scale(r), scale(g), scale(b), a]);
        }
        Self {
            image: DynamicImage::ImageRgba8(rgba),
        }
    }

    /// Gamma correction; values above 1.0 lift the midtones.
    pub fn adjust_gamma(self, gamma: f32) -> Self {
        if gamma <= 0.0 {
            return self;
        }
        let exponent = 1.0 / gamma;
        let lut: Vec<u8> = (0..=255u32)
            .map(|c| to_channel(255.0 * (c as f32 / 255.0).powf(exponent)))
            .collect();
        let mut rgba = self.image.into_rgba8();
        for pixel in rgba.pixels_mut() {
            let [r, g, b, a] = pixel.0;
            *pixel = Rgba([lut[r as usize], lut[g as usize], lut[b as usize], a]);
        }
        Self {
            image: DynamicImage::ImageRgba8(rgba),
        }
    }

    /// Unsharp mask with the given blur sigma.
    pub fn sharpen(self, sigma: f32) -> Self {
        if sigma <= 0.0 {
            return self;
        }
        Self {
            image: self.image.unsharpen(sigma, 1),
        }
    }

    /// Overlay a diagonal rainbow sheen imitating foil printing.
    ///
    /// The pattern depends only on pixel position, so repeated runs produce
    /// identical output.
    pub fn holographic(self, strength: f32) -> Self {
        let strength = strength.clamp(0.0, 1.0) * 0.35;
        if strength == 0.0 {
            return self;
        }
        let mut rgba = self.image.into_rgba8();
        let (w, h) = rgba.dimensions();
        let span = (w + h).max(1) as f32;
        for (x, y, pixel) in rgba.enumerate_pixels_mut() {
            let hue = ((x + y) as f32 / span * 3.0).fract();
            let tint = hue_to_rgb(hue);
            let [r, g, b, a] = pixel.0;
            // Screen blend keeps highlights bright and lifts shadows slightly.
            let screen = |base: u8, t: f32| {
                let base = base as f32 / 255.0;
                let blended = 1.0 - (1.0 - base) * (1.0 - t);
                to_channel(255.0 * (base + (blended - base) * strength))
            };
            *pixel = Rgba([screen(r, tint[0]), screen(g, tint[1]), screen(b, tint[2]), a]);
        }
        Self {
            image: DynamicImage::ImageRgba8(rgba),
        }
    }

    fn map_channels(self, f: impl Fn(f32) -> f32) -> Self {
        let mut rgba = self.image.into_rgba8();
        for pixel in rgba.pixels_mut() {
            let [r, g, b, a] = pixel.0;
            *pixel = Rgba([
                to_channel(f(r as f32)),
                to_channel(f(g as f32)),
                to_channel(f(b as f32)),
                a,
            ]);
        }
        Self {
            image: DynamicImage::ImageRgba8(rgba),
        }
    }

    // -- Output ---------------------------------------------------------------

    /// Encode the current image as PNG bytes.
    pub fn to_png_bytes(&self) -> Result<Vec<u8>, SheetpressError> {
        encode_to_format(&self.image, ImageFormat::Png)
    }
}

/// Round and clamp a float channel value into `u8`.
pub(crate) fn to_channel(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

/// Fully saturated colour for `hue` in 0..1, as 0..1 floats.
fn hue_to_rgb(hue: f32) -> [f32; 3] {
    let h = hue * 6.0;
    let x = 1.0 - (h % 2.0 - 1.0).abs();
    match h as u32 {
        0 => [1.0, x, 0.0],
        1 => [x, 1.0, 0.0],
        2 => [0.0, 1.0, x],
        3 => [0.0, x, 1.0],
        4 => [x, 0.0, 1.0],
        _ => [1.0, 0.0, x],
    }
}

/// Encode a `DynamicImage` into the specified format, returning the raw bytes.
pub(crate) fn encode_to_format(
    image: &DynamicImage,
    format: ImageFormat,
) -> Result<Vec<u8>, SheetpressError> {
    let mut buffer = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buffer);
    image.write_to(&mut cursor, format).map_err(|err| {
        SheetpressError::ImageError(format!("image encoding failed: {}", err))
    })?;
    Ok(buffer)
}
