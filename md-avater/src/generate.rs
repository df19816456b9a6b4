//! Avatar image generation
//!
//! [`AvaterGenerator`] is the seam between the tree rewrite and the pixel
//! work. [`ImageGenerator`] is the bundled implementation on top of the
//! `image` crate: it cuts the subject into a filled shape, optionally places
//! that on a base image, and returns the result as a base64 data URL.

use crate::options::{FillShape, ImageType, Position, ResolvedOptions};
use crate::util::url_path;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, Rgb, RgbImage, Rgba, RgbaImage};
use percent_encoding::percent_decode_str;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while generating an avatar
#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("Failed to load image {}: {source}", .path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Invalid data URL: {0}")]
    InvalidDataUrl(String),

    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Unsupported image source: '{0}'")]
    UnsupportedSource(String),

    #[error("Invalid fill style: '{0}'")]
    InvalidFillStyle(String),

    #[error("Image path escapes the root directory: '{0}'")]
    OutsideRoot(String),
}

/// Produces an encoded image for one avatar unit
pub trait AvaterGenerator {
    /// Generate an avatar
    ///
    /// # Parameters
    /// * `subject` - Reference to the subject image
    /// * `base` - Reference to the base image, empty for none
    /// * `options` - Resolved options for this unit
    ///
    /// # Returns
    /// * `Ok(String)` - An encoded image usable as a URL
    /// * `Err(GenerateError)` - The image could not be produced
    fn generate(
        &self,
        subject: &str,
        base: &str,
        options: &ResolvedOptions,
    ) -> Result<String, GenerateError>;
}

impl<F> AvaterGenerator for F
where
    F: Fn(&str, &str, &ResolvedOptions) -> Result<String, GenerateError>,
{
    fn generate(
        &self,
        subject: &str,
        base: &str,
        options: &ResolvedOptions,
    ) -> Result<String, GenerateError> {
        self(subject, base, options)
    }
}

/// Generator backed by the `image` crate
#[derive(Debug, Clone)]
pub struct ImageGenerator {
    /// Directory relative image paths are resolved against
    root: PathBuf,
}

impl ImageGenerator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Load an image from a data URL or a path below the root
    ///
    /// Absolute paths and `..` segments are rejected, so a document can only
    /// read images inside the root directory.
    fn load(&self, source: &str) -> Result<DynamicImage, GenerateError> {
        if let Some(data) = source.strip_prefix("data:") {
            return decode_data_url(data);
        }
        if source.is_empty() || source.contains("://") {
            return Err(GenerateError::UnsupportedSource(source.to_string()));
        }

        let relative = percent_decode_str(url_path(source)).decode_utf8_lossy();
        let relative = Path::new(relative.as_ref());
        if !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(GenerateError::OutsideRoot(source.to_string()));
        }
        let path = self.root.join(relative);
        image::open(&path).map_err(|source| GenerateError::Load { path, source })
    }
}

impl Default for ImageGenerator {
    fn default() -> Self {
        Self::new(".")
    }
}

impl AvaterGenerator for ImageGenerator {
    fn generate(
        &self,
        subject: &str,
        base: &str,
        options: &ResolvedOptions,
    ) -> Result<String, GenerateError> {
        let subject_image = self.load(subject)?;
        let base_image = if base.is_empty() {
            None
        } else {
            Some(self.load(base)?)
        };

        let canvas = compose(&subject_image, base_image.as_ref(), options)?;
        log::debug!(
            "Generated {}x{} avatar for '{}'",
            canvas.width(),
            canvas.height(),
            subject
        );
        encode(canvas, options)
    }
}

/// Decode the part of a data URL after `data:`
fn decode_data_url(data: &str) -> Result<DynamicImage, GenerateError> {
    let (meta, payload) = data
        .split_once(',')
        .ok_or_else(|| GenerateError::InvalidDataUrl("missing ','".to_string()))?;
    if !meta.ends_with(";base64") {
        return Err(GenerateError::InvalidDataUrl(format!(
            "'{}' is not base64 encoded",
            meta
        )));
    }

    let bytes = STANDARD.decode(payload.trim())?;
    Ok(image::load_from_memory(&bytes)?)
}

/// Parse `#RGB`, `#RGBA`, `#RRGGBB` or `#RRGGBBAA`
pub fn parse_fillstyle(fillstyle: &str) -> Result<Rgba<u8>, GenerateError> {
    let invalid = || GenerateError::InvalidFillStyle(fillstyle.to_string());
    let hex = fillstyle.strip_prefix('#').ok_or_else(invalid)?;
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }

    let channels: Vec<u8> = match hex.len() {
        3 | 4 => hex
            .chars()
            .filter_map(|c| c.to_digit(16))
            .map(|d| (d * 17) as u8)
            .collect(),
        6 | 8 => (0..hex.len())
            .step_by(2)
            .filter_map(|i| u8::from_str_radix(&hex[i..i + 2], 16).ok())
            .collect(),
        _ => return Err(invalid()),
    };

    let alpha = channels.get(3).copied().unwrap_or(u8::MAX);
    Ok(Rgba([channels[0], channels[1], channels[2], alpha]))
}

/// Build the avatar canvas
fn compose(
    subject: &DynamicImage,
    base: Option<&DynamicImage>,
    options: &ResolvedOptions,
) -> Result<RgbaImage, GenerateError> {
    let fill = parse_fillstyle(&options.fillstyle)?;

    let Some(base) = base else {
        let (width, height) = subject.dimensions();
        let mut canvas = RgbaImage::new(width, height);
        let tile = avatar_tile(subject, width, height, fill, options);
        imageops::overlay(&mut canvas, &tile, 0, 0);
        return Ok(canvas);
    };

    let mut canvas = base.to_rgba8();
    let (width, height) = canvas.dimensions();
    let size = ((f64::from(width.min(height)) * options.fit / 100.0).round() as u32).max(1);
    let (x, y) = match options.position {
        Position::Center => (
            width.saturating_sub(size) / 2,
            height.saturating_sub(size) / 2,
        ),
        Position::RightBottom => (
            width.saturating_sub(size.saturating_add(options.margin)),
            height.saturating_sub(size.saturating_add(options.margin)),
        ),
    };

    let tile = avatar_tile(subject, size, size, fill, options);
    imageops::overlay(&mut canvas, &tile, i64::from(x), i64::from(y));
    Ok(canvas)
}

/// Subject scaled into a filled shape of the given size
fn avatar_tile(
    subject: &DynamicImage,
    width: u32,
    height: u32,
    fill: Rgba<u8>,
    options: &ResolvedOptions,
) -> RgbaImage {
    let mut tile = RgbaImage::from_pixel(width, height, fill);

    let padding = options.padding.min(width / 2).min(height / 2);
    let inner_width = width.saturating_sub(padding * 2).max(1);
    let inner_height = height.saturating_sub(padding * 2).max(1);
    let scaled = subject
        .resize_to_fill(inner_width, inner_height, FilterType::Lanczos3)
        .to_rgba8();
    imageops::overlay(&mut tile, &scaled, i64::from(padding), i64::from(padding));

    if options.fillshape == FillShape::Circle {
        apply_circle_mask(&mut tile);
    }
    tile
}

/// Make every pixel outside the inscribed ellipse transparent
fn apply_circle_mask(tile: &mut RgbaImage) {
    let rx = f64::from(tile.width()) / 2.0;
    let ry = f64::from(tile.height()) / 2.0;

    for (x, y, pixel) in tile.enumerate_pixels_mut() {
        let dx = (f64::from(x) + 0.5 - rx) / rx;
        let dy = (f64::from(y) + 0.5 - ry) / ry;
        if dx * dx + dy * dy > 1.0 {
            pixel.0[3] = 0;
        }
    }
}

/// Blend onto white for formats without alpha
fn flatten(canvas: &RgbaImage) -> RgbImage {
    RgbImage::from_fn(canvas.width(), canvas.height(), |x, y| {
        let Rgba([r, g, b, a]) = *canvas.get_pixel(x, y);
        let blend = |c: u8| {
            let c = u32::from(c) * u32::from(a) + 255 * (255 - u32::from(a));
            (c / 255) as u8
        };
        Rgb([blend(r), blend(g), blend(b)])
    })
}

/// Encode the canvas and wrap it in a data URL
fn encode(canvas: RgbaImage, options: &ResolvedOptions) -> Result<String, GenerateError> {
    let mut bytes = Vec::new();

    match options.format {
        ImageType::Png => {
            DynamicImage::ImageRgba8(canvas).write_with_encoder(PngEncoder::new(&mut bytes))?;
        }
        ImageType::Jpeg => {
            let quality = (options.quality * 100.0).round().clamp(1.0, 100.0) as u8;
            DynamicImage::ImageRgb8(flatten(&canvas))
                .write_with_encoder(JpegEncoder::new_with_quality(&mut bytes, quality))?;
        }
    }

    Ok(format!(
        "data:{};base64,{}",
        options.format.mime_type(),
        STANDARD.encode(&bytes)
    ))
}
