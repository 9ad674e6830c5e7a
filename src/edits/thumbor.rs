//! Thumbor path token mapping
//!
//! Tokens are consumed left to right in path order:
//!
//! ```text
//! /fit-in/300x200/10x10:290x190/smart/filters:grayscale():quality(80)/image.jpg
//! ```
//!
//! Tokens this mapper does not understand (unknown filters, `trim`, `meta`,
//! alignment words) are dropped with a warning instead of failing the
//! request. This leniency keeps partially-understood Thumbor URLs working; it
//! is a compatibility trade-off, not a correctness guarantee.

use regex::Regex;
use std::sync::OnceLock;

use super::call::{self, FunctionCall};
use super::{
    blur_sigma, check_overlay_bucket, dimension, offset, percentage, quality, Color, Edit, Edits,
    FitMode, Overlay, OutputFormat, Rgb,
};
use crate::config::Config;
use crate::error::ImageRequestError;

/// Alignment keywords Thumbor accepts but this mapper ignores
const ALIGNMENTS: &[&str] = &["left", "right", "center", "top", "middle", "bottom"];

/// Structural keywords that produce no operation
const IGNORED_KEYWORDS: &[&str] = &["trim", "meta", "debug"];

fn size_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(-)?(\d*|orig)x(-)?(\d*|orig)$").expect("size regex is valid")
    })
}

fn crop_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+)x(\d+):(\d+)x(\d+)$").expect("crop regex is valid"))
}

/// Whether a segment is a Thumbor structural token (not a filter chain)
pub fn is_structural_token(segment: &str) -> bool {
    fit_mode_for(segment).is_some()
        || segment == "smart"
        || IGNORED_KEYWORDS.contains(&segment)
        || ALIGNMENTS.contains(&segment)
        || crop_regex().is_match(segment)
        || is_size_token(segment)
}

fn is_size_token(segment: &str) -> bool {
    segment != "x" && size_regex().is_match(segment)
}

fn fit_mode_for(segment: &str) -> Option<FitMode> {
    match segment {
        "fit-in" | "adaptive-fit-in" => Some(FitMode::Inside),
        "full-fit-in" => Some(FitMode::Outside),
        _ => None,
    }
}

/// Map Thumbor tokens into edits
pub fn normalize(tokens: &[String], config: &Config) -> Result<Edits, ImageRequestError> {
    let mut edits = Edits::new();
    let mut fit = None;

    for token in tokens {
        if let Some(mode) = fit_mode_for(token) {
            fit = Some(mode);
        } else if token == "smart" {
            edits.push(Edit::SmartCrop {
                face_index: 0,
                padding: 0,
            });
        } else if let Some(caps) = crop_regex().captures(token) {
            edits.push(map_crop(token, &caps)?);
        } else if is_size_token(token) {
            if let Some(caps) = size_regex().captures(token) {
                map_size(&caps, fit.unwrap_or_default(), &mut edits)?;
            }
        } else if call::is_filters_segment(token) {
            for filter in call::parse_segment(token).unwrap_or_default() {
                match map_filter(&filter, config)? {
                    Some(edit) => edits.push(edit),
                    None => {
                        tracing::warn!(filter = %filter.name, "Dropping unsupported Thumbor filter")
                    }
                }
            }
        } else {
            tracing::warn!(token = %token, "Dropping unsupported Thumbor token");
        }
    }

    Ok(edits)
}

fn map_crop(token: &str, caps: &regex::Captures<'_>) -> Result<Edit, ImageRequestError> {
    let n = |i: usize| -> Result<u32, ImageRequestError> {
        caps[i]
            .parse()
            .map_err(|_| ImageRequestError::invalid_param("crop", "coordinates", "out of range"))
    };
    let (left, top, right, bottom) = (n(1)?, n(2)?, n(3)?, n(4)?);
    if right <= left || bottom <= top {
        return Err(ImageRequestError::invalid_param(
            "crop",
            "coordinates",
            format!("'{}' does not describe a non-empty area", token),
        ));
    }
    Ok(Edit::Crop {
        left,
        top,
        width: right - left,
        height: bottom - top,
    })
}

fn map_size(
    caps: &regex::Captures<'_>,
    fit: FitMode,
    edits: &mut Edits,
) -> Result<(), ImageRequestError> {
    let side = |i: usize, param: &str| -> Result<Option<u32>, ImageRequestError> {
        match &caps[i] {
            "" | "orig" => Ok(None),
            digits => {
                let value: u32 = digits.parse().map_err(|_| {
                    ImageRequestError::invalid_param("resize", param, "out of range")
                })?;
                Ok(Some(value).filter(|v| *v > 0))
            }
        }
    };
    let width = side(2, "width")?;
    let height = side(4, "height")?;

    if width.is_some() || height.is_some() {
        edits.push(Edit::Resize { width, height, fit });
    }
    // Negative sizes mirror the image
    if caps.get(1).is_some() {
        edits.push(Edit::Flop);
    }
    if caps.get(3).is_some() {
        edits.push(Edit::Flip);
    }
    Ok(())
}

/// Map one filter; `Ok(None)` means the filter is unknown and is dropped
fn map_filter(filter: &FunctionCall, config: &Config) -> Result<Option<Edit>, ImageRequestError> {
    let name = filter.name.as_str();
    let edit = match name {
        "autojpg" => Edit::Format(OutputFormat::Jpeg),
        "background_color" => {
            Edit::Background(Color::parse(name, filter.required_string(0, "color")?)?)
        }
        "blur" => {
            let radius = filter.required_number(0, "radius")?;
            let sigma = filter.number(1, "sigma")?.unwrap_or(radius / 2.0);
            Edit::Blur {
                sigma: Some(blur_sigma(name, sigma)?),
            }
        }
        "equalize" => Edit::Normalize,
        "fill" => match filter.required_string(0, "color")? {
            // Colors derived from the image itself are not supported
            "auto" | "blur" => return Ok(None),
            color => Edit::Fill(Color::parse(name, color)?),
        },
        "format" => Edit::Format(filter.required_string(0, "format")?.parse()?),
        "grayscale" => Edit::Grayscale,
        "no_upscale" => Edit::NoUpscale,
        "quality" => Edit::Quality(quality(name, filter.required_number(0, "quality")?)?),
        "rgb" => Edit::Tint(Rgb {
            r: rgb_channel(filter, 0, "r")?,
            g: rgb_channel(filter, 1, "g")?,
            b: rgb_channel(filter, 2, "b")?,
        }),
        "rotate" => {
            let angle = filter.required_number(0, "angle")?;
            if angle.fract() != 0.0 || angle as i64 % 90 != 0 {
                return Err(ImageRequestError::invalid_param(
                    name,
                    "angle",
                    format!("{} must be a multiple of 90", angle),
                ));
            }
            Edit::Rotate {
                degrees: Some((angle as i64).rem_euclid(360) as f32),
            }
        }
        "sharpen" => {
            // Sharpen is sigma-only; the amount is range-checked and has no
            // other effect
            let amount = filter.required_number(0, "amount")?;
            if !(0.0..=10.0).contains(&amount) {
                return Err(ImageRequestError::invalid_param(
                    name,
                    "amount",
                    format!("{} must be between 0 and 10", amount),
                ));
            }
            let radius = filter.required_number(1, "radius")?;
            if radius < 0.0 {
                return Err(ImageRequestError::invalid_param(
                    name,
                    "radius",
                    format!("{} must not be negative", radius),
                ));
            }
            Edit::Sharpen {
                sigma: Some((1.0 + radius / 2.0) as f32),
            }
        }
        "strip_exif" => Edit::StripExif,
        "strip_icc" => Edit::StripIcc,
        "upscale" => Edit::Upscale,
        "watermark" => {
            let overlay = Overlay {
                bucket: filter.required_string(0, "bucket")?.to_string(),
                key: filter.required_string(1, "key")?.to_string(),
                x: position(filter, 2, "x")?,
                y: position(filter, 3, "y")?,
                alpha: match filter.number(4, "alpha")? {
                    Some(alpha) => percentage(name, "alpha", alpha)?,
                    None => 0,
                },
                width_ratio: ratio(filter, 5, "w_ratio")?,
                height_ratio: ratio(filter, 6, "h_ratio")?,
            };
            check_overlay_bucket(&overlay, config)?;
            Edit::Overlay(overlay)
        }
        "round_crop" => Edit::RoundCrop {
            rx: opt_dimension(filter, 0, "rx")?,
            ry: opt_dimension(filter, 1, "ry")?,
            left: None,
            top: None,
        },
        "animated" => Edit::Animated(filter.boolean(0, "enabled")?.unwrap_or(true)),
        _ => return Ok(None),
    };
    Ok(Some(edit))
}

/// Thumbor `rgb()` takes percentage adjustments in -100..=100
fn rgb_channel(filter: &FunctionCall, index: usize, param: &str) -> Result<u8, ImageRequestError> {
    let pct = filter.required_number(index, param)?;
    if !(-100.0..=100.0).contains(&pct) {
        return Err(ImageRequestError::invalid_param(
            &filter.name,
            param,
            format!("{} must be between -100 and 100", pct),
        ));
    }
    Ok((255.0 * (1.0 + pct / 100.0)).round().clamp(0.0, 255.0) as u8)
}

/// Watermark position: an integer offset, or `center` for no offset
fn position(
    filter: &FunctionCall,
    index: usize,
    param: &str,
) -> Result<Option<i32>, ImageRequestError> {
    if filter.string(index) == Some("center") {
        return Ok(None);
    }
    filter
        .number(index, param)?
        .map(|v| offset(&filter.name, param, v))
        .transpose()
}

/// Watermark ratio: a percentage, or `none`
fn ratio(filter: &FunctionCall, index: usize, param: &str) -> Result<Option<u8>, ImageRequestError> {
    if filter.string(index) == Some("none") {
        return Ok(None);
    }
    filter
        .number(index, param)?
        .map(|v| percentage(&filter.name, param, v))
        .transpose()
}

fn opt_dimension(
    filter: &FunctionCall,
    index: usize,
    param: &str,
) -> Result<Option<u32>, ImageRequestError> {
    filter
        .number(index, param)?
        .map(|v| dimension(&filter.name, param, v))
        .transpose()
}
