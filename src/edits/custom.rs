//! Custom filter DSL
//!
//! Each path segment holds one or more function calls; each call becomes one
//! operation, in path order:
//!
//! ```text
//! /resize(300,200,inside)/rotate(45)/filters:grayscale():quality(80)/bucket/key.jpg
//! ```
//!
//! Unlike Thumbor, the DSL is strict: an unknown call name or an argument
//! that cannot be coerced to the expected type fails the request.

use super::call::{self, FunctionCall};
use super::{
    blur_sigma, channel, check_overlay_bucket, degrees, dimension, offset, percentage, quality,
    Color, Edit, Edits, FitMode, Overlay, Rgb,
};
use crate::config::Config;
use crate::error::ImageRequestError;

pub fn normalize(tokens: &[String], config: &Config) -> Result<Edits, ImageRequestError> {
    let mut edits = Edits::new();
    for token in tokens {
        let calls = call::parse_segment(token).ok_or_else(|| {
            ImageRequestError::unknown_operation(token)
        })?;
        for call in &calls {
            edits.push(map_call(call, config)?);
        }
    }
    Ok(edits)
}

fn map_call(call: &FunctionCall, config: &Config) -> Result<Edit, ImageRequestError> {
    let name = call.name.as_str();
    let edit = match name {
        "resize" => {
            call.expect_at_most(3)?;
            let width = opt_dimension(call, 0, "width")?;
            let height = opt_dimension(call, 1, "height")?;
            if width.is_none() && height.is_none() {
                return Err(ImageRequestError::invalid_param(
                    name,
                    "width",
                    "width or height is required",
                ));
            }
            Edit::Resize {
                width,
                height,
                fit: call.string(2).map(str::parse::<FitMode>).transpose()?.unwrap_or_default(),
            }
        }
        "crop" => {
            call.expect_at_most(4)?;
            Edit::Crop {
                left: req_dimension(call, 0, "left")?,
                top: req_dimension(call, 1, "top")?,
                width: positive(call, 2, "width")?,
                height: positive(call, 3, "height")?,
            }
        }
        "smartcrop" => {
            call.expect_at_most(2)?;
            Edit::SmartCrop {
                face_index: opt_dimension(call, 0, "faceIndex")?.unwrap_or(0),
                padding: opt_dimension(call, 1, "padding")?.unwrap_or(0),
            }
        }
        "rotate" => {
            call.expect_at_most(1)?;
            Edit::Rotate {
                degrees: call.number(0, "angle")?.map(degrees),
            }
        }
        "flip" => unit(call, Edit::Flip)?,
        "flop" => unit(call, Edit::Flop)?,
        "grayscale" | "greyscale" => unit(call, Edit::Grayscale)?,
        "normalize" | "normalise" => unit(call, Edit::Normalize)?,
        "negate" => unit(call, Edit::Negate)?,
        "strip_exif" => unit(call, Edit::StripExif)?,
        "strip_icc" => unit(call, Edit::StripIcc)?,
        "upscale" => unit(call, Edit::Upscale)?,
        "no_upscale" => unit(call, Edit::NoUpscale)?,
        "blur" => {
            call.expect_at_most(1)?;
            Edit::Blur {
                sigma: call.number(0, "sigma")?.map(|s| blur_sigma(name, s)).transpose()?,
            }
        }
        "sharpen" => {
            call.expect_at_most(1)?;
            Edit::Sharpen {
                sigma: call.number(0, "sigma")?.map(|s| s as f32),
            }
        }
        "tint" => {
            call.expect_at_most(3)?;
            Edit::Tint(Rgb {
                r: channel(name, "r", call.required_number(0, "r")?)?,
                g: channel(name, "g", call.required_number(1, "g")?)?,
                b: channel(name, "b", call.required_number(2, "b")?)?,
            })
        }
        "background" => {
            call.expect_at_most(1)?;
            Edit::Background(Color::parse(name, call.required_string(0, "color")?)?)
        }
        "fill" => {
            call.expect_at_most(1)?;
            Edit::Fill(Color::parse(name, call.required_string(0, "color")?)?)
        }
        "quality" => {
            call.expect_at_most(1)?;
            Edit::Quality(quality(name, call.required_number(0, "quality")?)?)
        }
        "format" => {
            call.expect_at_most(1)?;
            Edit::Format(call.required_string(0, "format")?.parse()?)
        }
        "watermark" => {
            call.expect_at_most(7)?;
            let overlay = Overlay {
                bucket: call.required_string(0, "bucket")?.to_string(),
                key: call.required_string(1, "key")?.to_string(),
                alpha: call
                    .number(2, "alpha")?
                    .map(|v| percentage(name, "alpha", v))
                    .transpose()?
                    .unwrap_or(0),
                width_ratio: call
                    .number(3, "wRatio")?
                    .map(|v| percentage(name, "wRatio", v))
                    .transpose()?,
                height_ratio: call
                    .number(4, "hRatio")?
                    .map(|v| percentage(name, "hRatio", v))
                    .transpose()?,
                x: call.number(5, "x")?.map(|v| offset(name, "x", v)).transpose()?,
                y: call.number(6, "y")?.map(|v| offset(name, "y", v)).transpose()?,
            };
            check_overlay_bucket(&overlay, config)?;
            Edit::Overlay(overlay)
        }
        "animated" => {
            call.expect_at_most(1)?;
            Edit::Animated(call.boolean(0, "enabled")?.unwrap_or(true))
        }
        "roundcrop" => {
            call.expect_at_most(4)?;
            Edit::RoundCrop {
                rx: opt_dimension(call, 0, "rx")?,
                ry: opt_dimension(call, 1, "ry")?,
                left: opt_dimension(call, 2, "left")?,
                top: opt_dimension(call, 3, "top")?,
            }
        }
        _ => return Err(ImageRequestError::unknown_operation(name)),
    };
    Ok(edit)
}

fn unit(call: &FunctionCall, edit: Edit) -> Result<Edit, ImageRequestError> {
    call.expect_at_most(0)?;
    Ok(edit)
}

fn opt_dimension(
    call: &FunctionCall,
    index: usize,
    param: &str,
) -> Result<Option<u32>, ImageRequestError> {
    call.number(index, param)?
        .map(|v| dimension(&call.name, param, v))
        .transpose()
}

fn req_dimension(call: &FunctionCall, index: usize, param: &str) -> Result<u32, ImageRequestError> {
    dimension(&call.name, param, call.required_number(index, param)?)
}

fn positive(call: &FunctionCall, index: usize, param: &str) -> Result<u32, ImageRequestError> {
    let value = req_dimension(call, index, param)?;
    if value == 0 {
        return Err(ImageRequestError::invalid_param(
            &call.name,
            param,
            "must be greater than 0",
        ));
    }
    Ok(value)
}
