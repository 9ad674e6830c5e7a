//! Default (base64 JSON) edits mapping
//!
//! Keys of the decoded `edits` object are operation names. The object is
//! read in insertion order, so the resulting edits follow the order the
//! client wrote them:
//!
//! ```json
//! {"resize": {"width": 300, "fit": "inside"}, "grayscale": true, "webp": {"quality": 80}}
//! ```

use serde_json::{Map, Value};

use super::{
    blur_sigma, channel, check_overlay_bucket, degrees, dimension, offset, percentage, quality,
    Color, Edit, Edits, FitMode, OutputFormat, Overlay, Rgb,
};
use crate::config::Config;
use crate::error::ImageRequestError;

pub fn normalize(map: &Map<String, Value>, config: &Config) -> Result<Edits, ImageRequestError> {
    let mut edits = Edits::new();
    for (key, value) in map {
        map_entry(key, value, config, &mut edits)?;
    }
    Ok(edits)
}

fn map_entry(
    key: &str,
    value: &Value,
    config: &Config,
    edits: &mut Edits,
) -> Result<(), ImageRequestError> {
    // rotate: null means auto-orient, so it is handled before the null check
    if key == "rotate" {
        let degrees = match value {
            Value::Null => None,
            v => Some(degrees(number(key, "angle", v)?)),
        };
        edits.push(Edit::Rotate { degrees });
        return Ok(());
    }
    if value.is_null() {
        return Ok(());
    }

    match key {
        "resize" => {
            let obj = object(key, "resize", value)?;
            let width = opt_field(obj, "width")
                .map(|v| dimension(key, "width", number(key, "width", v)?))
                .transpose()?;
            let height = opt_field(obj, "height")
                .map(|v| dimension(key, "height", number(key, "height", v)?))
                .transpose()?;
            if width.is_none() && height.is_none() {
                return Err(ImageRequestError::invalid_param(
                    key,
                    "width",
                    "width or height is required",
                ));
            }
            let fit = opt_field(obj, "fit")
                .map(|v| string(key, "fit", v)?.parse::<FitMode>())
                .transpose()?
                .unwrap_or_default();
            edits.push(Edit::Resize { width, height, fit });
            if let Some(bg) = opt_field(obj, "background") {
                edits.push(Edit::Background(color(key, bg)?));
            }
        }
        "extract" | "crop" => {
            let obj = object(key, "region", value)?;
            let width = required_dimension(key, obj, "width")?;
            let height = required_dimension(key, obj, "height")?;
            if width == 0 || height == 0 {
                return Err(ImageRequestError::invalid_param(
                    key,
                    if width == 0 { "width" } else { "height" },
                    "must be greater than 0",
                ));
            }
            edits.push(Edit::Crop {
                left: required_dimension(key, obj, "left")?,
                top: required_dimension(key, obj, "top")?,
                width,
                height,
            });
        }
        "smartCrop" => match value {
            Value::Bool(false) => {}
            Value::Bool(true) => edits.push(Edit::SmartCrop {
                face_index: 0,
                padding: 0,
            }),
            v => {
                let obj = object(key, "smartCrop", v)?;
                edits.push(Edit::SmartCrop {
                    face_index: optional_dimension(key, obj, "faceIndex")?.unwrap_or(0),
                    padding: optional_dimension(key, obj, "padding")?.unwrap_or(0),
                });
            }
        },
        "flip" => flag(key, value, Edit::Flip, edits)?,
        "flop" => flag(key, value, Edit::Flop, edits)?,
        "grayscale" | "greyscale" => flag(key, value, Edit::Grayscale, edits)?,
        "normalize" | "normalise" => flag(key, value, Edit::Normalize, edits)?,
        "negate" => flag(key, value, Edit::Negate, edits)?,
        "stripExif" => flag(key, value, Edit::StripExif, edits)?,
        "stripIcc" => flag(key, value, Edit::StripIcc, edits)?,
        "blur" => match value {
            Value::Bool(false) => {}
            Value::Bool(true) => edits.push(Edit::Blur { sigma: None }),
            v => edits.push(Edit::Blur {
                sigma: Some(blur_sigma(key, number(key, "sigma", v)?)?),
            }),
        },
        "sharpen" => match value {
            Value::Bool(false) => {}
            Value::Bool(true) => edits.push(Edit::Sharpen { sigma: None }),
            v => edits.push(Edit::Sharpen {
                sigma: Some(number(key, "sigma", v)? as f32),
            }),
        },
        "tint" => {
            let rgb = match value {
                Value::Object(obj) => Rgb {
                    r: required_channel(key, obj, "r")?,
                    g: required_channel(key, obj, "g")?,
                    b: required_channel(key, obj, "b")?,
                },
                v => {
                    let c = color(key, v)?;
                    Rgb {
                        r: c.r,
                        g: c.g,
                        b: c.b,
                    }
                }
            };
            edits.push(Edit::Tint(rgb));
        }
        "flatten" => {
            let obj = object(key, "flatten", value)?;
            if let Some(bg) = opt_field(obj, "background") {
                edits.push(Edit::Background(color(key, bg)?));
            }
        }
        "background" => edits.push(Edit::Background(color(key, value)?)),
        "toFormat" => edits.push(Edit::Format(string(key, "format", value)?.parse()?)),
        "quality" => edits.push(Edit::Quality(quality(key, number(key, "quality", value)?)?)),
        "jpeg" | "png" | "webp" | "avif" | "tiff" | "heif" => {
            let format: OutputFormat = key.parse()?;
            match value {
                Value::Bool(false) => {}
                Value::Bool(true) => edits.push(Edit::Format(format)),
                v => {
                    let obj = object(key, "options", v)?;
                    if let Some(q) = opt_field(obj, "quality") {
                        edits.push(Edit::Quality(quality(key, number(key, "quality", q)?)?));
                    }
                    edits.push(Edit::Format(format));
                }
            }
        }
        "overlayWith" => {
            let obj = object(key, "overlayWith", value)?;
            let options = opt_field(obj, "options")
                .map(|v| object(key, "options", v))
                .transpose()?;
            let position = |name: &str| -> Result<Option<i32>, ImageRequestError> {
                options
                    .and_then(|o| opt_field(o, name))
                    .map(|v| offset(key, name, position_number(key, name, v)?))
                    .transpose()
            };
            let overlay = Overlay {
                bucket: string(key, "bucket", required_field(key, obj, "bucket")?)?.to_string(),
                key: string(key, "key", required_field(key, obj, "key")?)?.to_string(),
                alpha: optional_percentage(key, obj, "alpha")?.unwrap_or(0),
                width_ratio: optional_percentage(key, obj, "wRatio")?,
                height_ratio: optional_percentage(key, obj, "hRatio")?,
                x: position("left")?,
                y: position("top")?,
            };
            check_overlay_bucket(&overlay, config)?;
            edits.push(Edit::Overlay(overlay));
        }
        "roundCrop" => match value {
            Value::Bool(false) => {}
            Value::Bool(true) => edits.push(Edit::RoundCrop {
                rx: None,
                ry: None,
                left: None,
                top: None,
            }),
            v => {
                let obj = object(key, "roundCrop", v)?;
                edits.push(Edit::RoundCrop {
                    rx: optional_dimension(key, obj, "rx")?,
                    ry: optional_dimension(key, obj, "ry")?,
                    left: optional_dimension(key, obj, "left")?,
                    top: optional_dimension(key, obj, "top")?,
                });
            }
        },
        "animated" => match value {
            Value::Bool(b) => edits.push(Edit::Animated(*b)),
            v => return Err(type_error(key, "animated", "a boolean", v)),
        },
        _ => return Err(ImageRequestError::unknown_operation(key)),
    }
    Ok(())
}

// === JSON value coercion ===

fn flag(op: &str, value: &Value, edit: Edit, edits: &mut Edits) -> Result<(), ImageRequestError> {
    match value {
        Value::Bool(true) => edits.push(edit),
        Value::Bool(false) => {}
        v => return Err(type_error(op, op, "a boolean", v)),
    }
    Ok(())
}

fn type_error(op: &str, param: &str, expected: &str, value: &Value) -> ImageRequestError {
    ImageRequestError::invalid_param(op, param, format!("expected {}, got {}", expected, value))
}

fn number(op: &str, param: &str, value: &Value) -> Result<f64, ImageRequestError> {
    value
        .as_f64()
        .ok_or_else(|| type_error(op, param, "a number", value))
}

/// Overlay offsets also arrive as numeric strings (`"-10"`)
fn position_number(op: &str, param: &str, value: &Value) -> Result<f64, ImageRequestError> {
    match value {
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| type_error(op, param, "a number", value)),
        v => number(op, param, v),
    }
}

fn string<'a>(op: &str, param: &str, value: &'a Value) -> Result<&'a str, ImageRequestError> {
    value
        .as_str()
        .ok_or_else(|| type_error(op, param, "a string", value))
}

fn object<'a>(
    op: &str,
    param: &str,
    value: &'a Value,
) -> Result<&'a Map<String, Value>, ImageRequestError> {
    value
        .as_object()
        .ok_or_else(|| type_error(op, param, "an object", value))
}

fn color(op: &str, value: &Value) -> Result<Color, ImageRequestError> {
    match value {
        Value::String(s) => Color::parse(op, s),
        Value::Object(obj) => Ok(Color {
            r: required_channel(op, obj, "r")?,
            g: required_channel(op, obj, "g")?,
            b: required_channel(op, obj, "b")?,
            alpha: match opt_field(obj, "alpha") {
                Some(a) => {
                    let a = number(op, "alpha", a)?;
                    if !(0.0..=1.0).contains(&a) {
                        return Err(ImageRequestError::invalid_param(
                            op,
                            "alpha",
                            format!("{} must be between 0 and 1", a),
                        ));
                    }
                    a as f32
                }
                None => 1.0,
            },
        }),
        v => Err(type_error(op, "color", "a color", v)),
    }
}

fn opt_field<'a>(obj: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    obj.get(name).filter(|v| !v.is_null())
}

fn required_field<'a>(
    op: &str,
    obj: &'a Map<String, Value>,
    name: &str,
) -> Result<&'a Value, ImageRequestError> {
    opt_field(obj, name).ok_or_else(|| ImageRequestError::invalid_param(op, name, "is required"))
}

fn optional_dimension(
    op: &str,
    obj: &Map<String, Value>,
    name: &str,
) -> Result<Option<u32>, ImageRequestError> {
    opt_field(obj, name)
        .map(|v| dimension(op, name, number(op, name, v)?))
        .transpose()
}

fn required_dimension(
    op: &str,
    obj: &Map<String, Value>,
    name: &str,
) -> Result<u32, ImageRequestError> {
    dimension(op, name, number(op, name, required_field(op, obj, name)?)?)
}

fn optional_percentage(
    op: &str,
    obj: &Map<String, Value>,
    name: &str,
) -> Result<Option<u8>, ImageRequestError> {
    opt_field(obj, name)
        .map(|v| percentage(op, name, number(op, name, v)?))
        .transpose()
}

fn required_channel(
    op: &str,
    obj: &Map<String, Value>,
    name: &str,
) -> Result<u8, ImageRequestError> {
    channel(op, name, number(op, name, required_field(op, obj, name)?)?)
}
