//! Function-call syntax shared by Thumbor filters and the custom DSL
//!
//! ```text
//! segment  := ["filters:"] call (":" call)*
//! call     := name "(" [arg ("," arg)*] ")"
//! arg      := bare-literal | 'quoted' | "quoted"
//! ```

use crate::error::ImageRequestError;

/// Prefix that introduces a filter chain segment
pub const FILTERS_PREFIX: &str = "filters:";

/// A literal argument, kept as written so each operation can coerce it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Literal {
    raw: String,
    quoted: bool,
}

impl Literal {
    pub fn raw(&self) -> &str {
        &self.raw
    }

    fn is_empty(&self) -> bool {
        !self.quoted && self.raw.is_empty()
    }
}

/// One parsed `name(args)` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionCall {
    pub name: String,
    pub args: Vec<Literal>,
}

impl FunctionCall {
    fn arg(&self, index: usize) -> Option<&Literal> {
        self.args.get(index).filter(|a| !a.is_empty())
    }

    /// Fail when more than `max` arguments were supplied
    pub fn expect_at_most(&self, max: usize) -> Result<(), ImageRequestError> {
        if self.args.len() > max {
            return Err(ImageRequestError::invalid_param(
                &self.name,
                "arguments",
                format!("expected at most {} argument(s), got {}", max, self.args.len()),
            ));
        }
        Ok(())
    }

    pub fn number(&self, index: usize, param: &str) -> Result<Option<f64>, ImageRequestError> {
        let Some(arg) = self.arg(index) else {
            return Ok(None);
        };
        let parsed = if arg.quoted {
            None
        } else {
            arg.raw.parse::<f64>().ok().filter(|v| v.is_finite())
        };
        parsed.map(Some).ok_or_else(|| {
            ImageRequestError::invalid_param(
                &self.name,
                param,
                format!("'{}' is not a number", arg.raw),
            )
        })
    }

    pub fn required_number(&self, index: usize, param: &str) -> Result<f64, ImageRequestError> {
        self.number(index, param)?
            .ok_or_else(|| self.missing(param))
    }

    pub fn boolean(&self, index: usize, param: &str) -> Result<Option<bool>, ImageRequestError> {
        let Some(arg) = self.arg(index) else {
            return Ok(None);
        };
        match (arg.quoted, arg.raw.to_ascii_lowercase().as_str()) {
            (false, "true") | (false, "1") => Ok(Some(true)),
            (false, "false") | (false, "0") => Ok(Some(false)),
            _ => Err(ImageRequestError::invalid_param(
                &self.name,
                param,
                format!("'{}' is not a boolean", arg.raw),
            )),
        }
    }

    pub fn string(&self, index: usize) -> Option<&str> {
        self.arg(index).map(Literal::raw)
    }

    pub fn required_string(&self, index: usize, param: &str) -> Result<&str, ImageRequestError> {
        self.string(index).ok_or_else(|| self.missing(param))
    }

    fn missing(&self, param: &str) -> ImageRequestError {
        ImageRequestError::invalid_param(&self.name, param, "is required")
    }
}

/// True when the segment is entirely made of function calls
pub fn is_call_segment(segment: &str) -> bool {
    parse_segment(segment).is_some()
}

/// True when the segment is a `filters:` chain
pub fn is_filters_segment(segment: &str) -> bool {
    segment.starts_with(FILTERS_PREFIX) && is_call_segment(segment)
}

/// Parse a path segment into its calls, or `None` if it is not call syntax
pub fn parse_segment(segment: &str) -> Option<Vec<FunctionCall>> {
    let body = segment.strip_prefix(FILTERS_PREFIX).unwrap_or(segment);
    if body.is_empty() {
        return None;
    }
    split_top_level(body, ':')
        .into_iter()
        .map(parse_call)
        .collect()
}

fn parse_call(text: &str) -> Option<FunctionCall> {
    let open = text.find('(')?;
    let inner = text.strip_suffix(')')?.get(open + 1..)?;
    let name = &text[..open];
    if !is_valid_name(name) {
        return None;
    }

    let mut args = Vec::new();
    if !inner.trim().is_empty() {
        for part in split_top_level(inner, ',') {
            args.push(parse_literal(part)?);
        }
    }
    Some(FunctionCall {
        name: name.to_string(),
        args,
    })
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn parse_literal(part: &str) -> Option<Literal> {
    let trimmed = part.trim();
    for quote in ['\'', '"'] {
        if let Some(rest) = trimmed.strip_prefix(quote) {
            let inner = rest.strip_suffix(quote)?;
            return Some(Literal {
                raw: inner.to_string(),
                quoted: true,
            });
        }
    }
    if trimmed.contains(['(', ')', '\'', '"']) {
        return None;
    }
    Some(Literal {
        raw: trimmed.to_string(),
        quoted: false,
    })
}

/// Split on `sep` outside of parentheses and quotes
fn split_top_level(text: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, c) in text.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => depth -= 1,
            (None, c) if c == sep && depth == 0 => {
                parts.push(&text[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}
