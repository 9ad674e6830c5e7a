//! Typed edit vocabulary
//!
//! Every request shape is normalized into [`Edits`], an ordered list of
//! [`Edit`] operations with validated parameters. Downstream stages never
//! look at untyped key/value pairs again.
//!
//! Three normalizers feed it:
//! - [`default`]: keys of the base64-JSON `edits` object
//! - [`thumbor`]: Thumbor path tokens (`fit-in/300x200/filters:grayscale()`)
//! - [`custom`]: function-call DSL segments (`resize(300,200)/rotate(45)`)

pub mod call;
pub mod custom;
pub mod default;
pub mod thumbor;

use serde::Serialize;
use std::str::FromStr;

use crate::config::Config;
use crate::error::ImageRequestError;
use crate::request::{RawEdits, RawRequest};

/// Output image format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Jpeg,
    Png,
    WebP,
    Avif,
    Tiff,
    Gif,
    Heif,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::WebP => "webp",
            Self::Avif => "avif",
            Self::Tiff => "tiff",
            Self::Gif => "gif",
            Self::Heif => "heif",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::WebP => "image/webp",
            Self::Avif => "image/avif",
            Self::Tiff => "image/tiff",
            Self::Gif => "image/gif",
            Self::Heif => "image/heif",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = ImageRequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(OutputFormat::Jpeg),
            "png" => Ok(OutputFormat::Png),
            "webp" => Ok(OutputFormat::WebP),
            "avif" => Ok(OutputFormat::Avif),
            "tiff" | "tif" => Ok(OutputFormat::Tiff),
            "gif" => Ok(OutputFormat::Gif),
            "heif" | "heic" => Ok(OutputFormat::Heif),
            _ => Err(ImageRequestError::invalid_param(
                "format",
                "format",
                format!("unknown format: {}", s),
            )),
        }
    }
}

/// How to fit the image within target dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FitMode {
    /// Crop to fill target dimensions (default)
    #[default]
    Cover,
    /// Scale to fit within dimensions, letterboxing the rest
    Contain,
    /// Stretch to fill exactly (may distort)
    Fill,
    /// Scale down to fit within dimensions, preserving aspect ratio
    Inside,
    /// Scale so both dimensions cover the target, may exceed it
    Outside,
}

impl FromStr for FitMode {
    type Err = ImageRequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cover" => Ok(FitMode::Cover),
            "contain" => Ok(FitMode::Contain),
            "fill" => Ok(FitMode::Fill),
            "inside" => Ok(FitMode::Inside),
            "outside" => Ok(FitMode::Outside),
            _ => Err(ImageRequestError::invalid_param(
                "resize",
                "fit",
                format!("unknown fit mode: {}", s),
            )),
        }
    }
}

/// RGB triple used by tint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// RGBA color used for backgrounds and fills
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    /// Opacity in 0.0..=1.0
    pub alpha: f32,
}

impl Color {
    /// Parse `#rgb`, `#rrggbb`, `#rrggbbaa` (the `#` is optional), a CSS
    /// color name or `transparent`
    pub fn parse(operation: &str, value: &str) -> Result<Self, ImageRequestError> {
        if let Some(color) = Self::named(value.trim()) {
            return Ok(color);
        }

        let hex = value.trim().trim_start_matches('#');
        let invalid = || {
            ImageRequestError::invalid_param(
                operation,
                "color",
                format!("'{}' is neither a hex color nor a color name", value),
            )
        };
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        let channel = |s: &str| u8::from_str_radix(s, 16).map_err(|_| invalid());
        match hex.len() {
            3 => {
                let expand = |i: usize| channel(&hex[i..i + 1].repeat(2));
                Ok(Color {
                    r: expand(0)?,
                    g: expand(1)?,
                    b: expand(2)?,
                    alpha: 1.0,
                })
            }
            6 | 8 => {
                let alpha = if hex.len() == 8 {
                    f32::from(channel(&hex[6..8])?) / 255.0
                } else {
                    1.0
                };
                Ok(Color {
                    r: channel(&hex[0..2])?,
                    g: channel(&hex[2..4])?,
                    b: channel(&hex[4..6])?,
                    alpha,
                })
            }
            _ => Err(invalid()),
        }
    }

    fn named(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("transparent") {
            return Some(Color {
                r: 0,
                g: 0,
                b: 0,
                alpha: 0.0,
            });
        }
        NAMED_COLORS
            .iter()
            .find(|(known, _)| known.eq_ignore_ascii_case(name))
            .map(|&(_, [r, g, b])| Color { r, g, b, alpha: 1.0 })
    }
}

/// CSS basic and common extended color keywords
const NAMED_COLORS: &[(&str, [u8; 3])] = &[
    ("black", [0, 0, 0]),
    ("silver", [192, 192, 192]),
    ("gray", [128, 128, 128]),
    ("grey", [128, 128, 128]),
    ("white", [255, 255, 255]),
    ("maroon", [128, 0, 0]),
    ("red", [255, 0, 0]),
    ("purple", [128, 0, 128]),
    ("fuchsia", [255, 0, 255]),
    ("magenta", [255, 0, 255]),
    ("green", [0, 128, 0]),
    ("lime", [0, 255, 0]),
    ("olive", [128, 128, 0]),
    ("yellow", [255, 255, 0]),
    ("navy", [0, 0, 128]),
    ("blue", [0, 0, 255]),
    ("teal", [0, 128, 128]),
    ("aqua", [0, 255, 255]),
    ("cyan", [0, 255, 255]),
    ("orange", [255, 165, 0]),
    ("pink", [255, 192, 203]),
    ("brown", [165, 42, 42]),
    ("gold", [255, 215, 0]),
    ("beige", [245, 245, 220]),
    ("ivory", [255, 255, 240]),
    ("khaki", [240, 230, 140]),
    ("lightgray", [211, 211, 211]),
    ("lightgrey", [211, 211, 211]),
    ("darkgray", [169, 169, 169]),
    ("darkgrey", [169, 169, 169]),
    ("violet", [238, 130, 238]),
    ("indigo", [75, 0, 130]),
    ("coral", [255, 127, 80]),
    ("salmon", [250, 128, 114]),
    ("crimson", [220, 20, 60]),
    ("tomato", [255, 99, 71]),
    ("turquoise", [64, 224, 208]),
    ("skyblue", [135, 206, 235]),
    ("whitesmoke", [245, 245, 245]),
];

/// Watermark/overlay image placement
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overlay {
    pub bucket: String,
    pub key: String,
    /// Transparency in percent (0 = opaque, 100 = invisible)
    pub alpha: u8,
    /// Overlay width relative to the base image, in percent
    pub width_ratio: Option<u8>,
    /// Overlay height relative to the base image, in percent
    pub height_ratio: Option<u8>,
    /// Horizontal offset; negative values count from the right edge
    pub x: Option<i32>,
    /// Vertical offset; negative values count from the bottom edge
    pub y: Option<i32>,
}

/// One image operation with typed parameters
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Edit {
    Resize {
        width: Option<u32>,
        height: Option<u32>,
        fit: FitMode,
    },
    Crop {
        left: u32,
        top: u32,
        width: u32,
        height: u32,
    },
    SmartCrop {
        face_index: u32,
        padding: u32,
    },
    /// `None` rotates according to EXIF orientation
    Rotate {
        degrees: Option<f32>,
    },
    Flip,
    Flop,
    Grayscale,
    Blur {
        sigma: Option<f32>,
    },
    Sharpen {
        sigma: Option<f32>,
    },
    Normalize,
    Negate,
    Tint(Rgb),
    Background(Color),
    Fill(Color),
    Quality(u8),
    Format(OutputFormat),
    Overlay(Overlay),
    StripExif,
    StripIcc,
    Upscale,
    NoUpscale,
    Animated(bool),
    RoundCrop {
        rx: Option<u32>,
        ry: Option<u32>,
        left: Option<u32>,
        top: Option<u32>,
    },
}

impl Edit {
    /// Operation name, as used in logs and metrics
    pub fn name(&self) -> &'static str {
        match self {
            Edit::Resize { .. } => "resize",
            Edit::Crop { .. } => "crop",
            Edit::SmartCrop { .. } => "smartCrop",
            Edit::Rotate { .. } => "rotate",
            Edit::Flip => "flip",
            Edit::Flop => "flop",
            Edit::Grayscale => "grayscale",
            Edit::Blur { .. } => "blur",
            Edit::Sharpen { .. } => "sharpen",
            Edit::Normalize => "normalize",
            Edit::Negate => "negate",
            Edit::Tint(_) => "tint",
            Edit::Background(_) => "background",
            Edit::Fill(_) => "fill",
            Edit::Quality(_) => "quality",
            Edit::Format(_) => "format",
            Edit::Overlay(_) => "overlay",
            Edit::StripExif => "stripExif",
            Edit::StripIcc => "stripIcc",
            Edit::Upscale => "upscale",
            Edit::NoUpscale => "noUpscale",
            Edit::Animated(_) => "animated",
            Edit::RoundCrop { .. } => "roundCrop",
        }
    }
}

/// Ordered list of edits; order matches the source request
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Edits(Vec<Edit>);

impl Edits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, edit: Edit) {
        self.0.push(edit);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Edit> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Edit] {
        &self.0
    }

    /// Operation names in order
    pub fn names(&self) -> Vec<&'static str> {
        self.0.iter().map(Edit::name).collect()
    }

    /// Last explicit format edit, if any
    pub fn explicit_format(&self) -> Option<OutputFormat> {
        self.0.iter().rev().find_map(|edit| match edit {
            Edit::Format(format) => Some(*format),
            _ => None,
        })
    }
}

impl From<Vec<Edit>> for Edits {
    fn from(edits: Vec<Edit>) -> Self {
        Self(edits)
    }
}

impl<'a> IntoIterator for &'a Edits {
    type Item = &'a Edit;
    type IntoIter = std::slice::Iter<'a, Edit>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Normalize the raw edits of a decoded request
///
/// The edits list is only returned once every token was consumed without a
/// fatal error.
pub fn normalize(raw: &RawRequest, config: &Config) -> Result<Edits, ImageRequestError> {
    match &raw.raw_edits {
        RawEdits::Default(map) => default::normalize(map, config),
        RawEdits::Thumbor(tokens) => thumbor::normalize(tokens, config),
        RawEdits::Custom(tokens) => custom::normalize(tokens, config),
    }
}

// === Parameter validation shared by the normalizers ===

pub(crate) fn dimension(operation: &str, param: &str, value: f64) -> Result<u32, ImageRequestError> {
    if value.fract() != 0.0 || value < 0.0 || value > f64::from(u32::MAX) {
        return Err(ImageRequestError::invalid_param(
            operation,
            param,
            format!("{} is not a non-negative integer", value),
        ));
    }
    Ok(value as u32)
}

pub(crate) fn quality(operation: &str, value: f64) -> Result<u8, ImageRequestError> {
    if value.fract() != 0.0 || !(1.0..=100.0).contains(&value) {
        return Err(ImageRequestError::invalid_param(
            operation,
            "quality",
            format!("{} must be an integer in 1-100", value),
        ));
    }
    Ok(value as u8)
}

pub(crate) fn percentage(operation: &str, param: &str, value: f64) -> Result<u8, ImageRequestError> {
    if value.fract() != 0.0 || !(0.0..=100.0).contains(&value) {
        return Err(ImageRequestError::invalid_param(
            operation,
            param,
            format!("{} must be an integer in 0-100", value),
        ));
    }
    Ok(value as u8)
}

pub(crate) fn offset(operation: &str, param: &str, value: f64) -> Result<i32, ImageRequestError> {
    if value.fract() != 0.0 || value < f64::from(i32::MIN) || value > f64::from(i32::MAX) {
        return Err(ImageRequestError::invalid_param(
            operation,
            param,
            format!("{} is not an integer", value),
        ));
    }
    Ok(value as i32)
}

pub(crate) fn blur_sigma(operation: &str, value: f64) -> Result<f32, ImageRequestError> {
    if !(0.3..=1000.0).contains(&value) {
        return Err(ImageRequestError::invalid_param(
            operation,
            "sigma",
            format!("{} must be between 0.3 and 1000", value),
        ));
    }
    Ok(value as f32)
}

/// Reduce any finite angle into 0..360 degrees
pub(crate) fn degrees(value: f64) -> f32 {
    value.rem_euclid(360.0) as f32
}

pub(crate) fn channel(operation: &str, param: &str, value: f64) -> Result<u8, ImageRequestError> {
    if value.fract() != 0.0 || !(0.0..=255.0).contains(&value) {
        return Err(ImageRequestError::invalid_param(
            operation,
            param,
            format!("{} must be an integer in 0-255", value),
        ));
    }
    Ok(value as u8)
}

/// Reject overlays that would read from a bucket outside the allow-list
pub(crate) fn check_overlay_bucket(
    overlay: &Overlay,
    config: &Config,
) -> Result<(), ImageRequestError> {
    if config.is_bucket_allowed(&overlay.bucket) {
        Ok(())
    } else {
        Err(ImageRequestError::cannot_access_bucket(&overlay.bucket))
    }
}
