//! Avatar options and their decoding
//!
//! [`MdAvaterOptions`] is the declarative form read from configuration.
//! [`decode_options`] merges it over the defaults and then applies inline
//! query strings (`key=value&key=value`) taken from the markdown itself.

use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Declarative options, every field optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MdAvaterOptions {
    /// Compositing geometry and style
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avater: Option<AvaterOptions>,

    /// Output encoding
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<FormatOptions>,
}

/// Compositing options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AvaterOptions {
    /// Where the avatar is placed on the base image
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,

    /// Fill color of the shape behind the subject (e.g. `#FFFFFFFF`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fillstyle: Option<String>,

    /// Shape the subject is cut into
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fillshape: Option<FillShape>,

    /// Distance from the base image edges in pixels (right-bottom only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub margin: Option<f64>,

    /// Space between the shape edge and the subject in pixels
    #[serde(skip_serializing_if = "Option::is_none")]
    pub padding: Option<f64>,

    /// Avatar size as a percentage of the base image
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fit: Option<f64>,

    /// Overrides in query string form, applied after the fields above
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
}

/// Encoding options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FormatOptions {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<ImageType>,

    /// Encoder quality between 0 and 1 (JPEG only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<f64>,
}

/// Avatar placement
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Position {
    #[default]
    Center,
    RightBottom,
}

/// Shape of the avatar
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FillShape {
    Rect,
    #[default]
    Circle,
}

/// Output image type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageType {
    #[default]
    Png,
    #[serde(alias = "jpg")]
    Jpeg,
}

impl ImageType {
    /// MIME type used in data URLs
    pub fn mime_type(self) -> &'static str {
        match self {
            ImageType::Png => "image/png",
            ImageType::Jpeg => "image/jpeg",
        }
    }
}

/// Errors from parsing a single inline option
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OptionError {
    #[error("unknown option '{0}'")]
    UnknownKey(String),

    #[error("invalid value '{value}' for option '{key}'")]
    InvalidValue { key: String, value: String },
}

impl FromStr for Position {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "center" => Ok(Position::Center),
            "right-bottom" => Ok(Position::RightBottom),
            _ => Err(()),
        }
    }
}

impl FromStr for FillShape {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rect" => Ok(FillShape::Rect),
            "circle" => Ok(FillShape::Circle),
            _ => Err(()),
        }
    }
}

impl FromStr for ImageType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "png" => Ok(ImageType::Png),
            "jpeg" | "jpg" => Ok(ImageType::Jpeg),
            _ => Err(()),
        }
    }
}

/// Fully resolved options for one generation call
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedOptions {
    pub position: Position,
    pub fillstyle: String,
    pub fillshape: FillShape,
    pub margin: u32,
    pub padding: u32,
    /// Percentage, 0 to 100
    pub fit: f64,
    pub format: ImageType,
    /// 0 to 1
    pub quality: f64,
}

impl Default for ResolvedOptions {
    fn default() -> Self {
        Self {
            position: Position::Center,
            fillstyle: "#FFFFFFFF".to_string(),
            fillshape: FillShape::Circle,
            margin: 12,
            padding: 4,
            fit: 25.0,
            format: ImageType::Png,
            quality: 0.92,
        }
    }
}

impl ResolvedOptions {
    fn apply_avater(&mut self, avater: &AvaterOptions) {
        if let Some(position) = avater.position {
            self.position = position;
        }
        if let Some(ref fillstyle) = avater.fillstyle {
            self.fillstyle = fillstyle.clone();
        }
        if let Some(fillshape) = avater.fillshape {
            self.fillshape = fillshape;
        }
        if let Some(margin) = avater.margin {
            self.margin = to_pixels(margin);
        }
        if let Some(padding) = avater.padding {
            self.padding = to_pixels(padding);
        }
        if let Some(fit) = avater.fit {
            self.fit = fit.clamp(0.0, 100.0);
        }
    }

    fn apply_format(&mut self, format: &FormatOptions) {
        if let Some(kind) = format.kind {
            self.format = kind;
        }
        if let Some(quality) = format.quality {
            self.quality = quality.clamp(0.0, 1.0);
        }
    }

    /// Apply `key=value` pairs separated by `&`
    ///
    /// Tokens without `=` are not options (a plain caption or file name) and
    /// are skipped. Unknown keys and bad values are logged and skipped.
    pub fn apply_query(&mut self, query: &str) {
        for token in query.split('&') {
            let Some((key, value)) = token.split_once('=') else {
                continue;
            };
            let value = percent_decode_str(value.trim()).decode_utf8_lossy();
            if let Err(e) = self.set(key.trim(), &value) {
                log::warn!("Ignoring avatar option in '{}': {}", query, e);
            }
        }
    }

    /// Set a single option by name
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), OptionError> {
        let invalid = || OptionError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };

        match key {
            "position" => self.position = value.parse().map_err(|()| invalid())?,
            "fillstyle" => {
                if value.is_empty() {
                    return Err(invalid());
                }
                self.fillstyle = value.to_string();
            }
            "fillshape" => self.fillshape = value.parse().map_err(|()| invalid())?,
            "margin" => self.margin = to_pixels(parse_number(value).ok_or_else(invalid)?),
            "padding" => self.padding = to_pixels(parse_number(value).ok_or_else(invalid)?),
            "fit" => self.fit = parse_number(value).ok_or_else(invalid)?.clamp(0.0, 100.0),
            "format" | "type" => self.format = value.parse().map_err(|()| invalid())?,
            "quality" => self.quality = parse_number(value).ok_or_else(invalid)?.clamp(0.0, 1.0),
            _ => return Err(OptionError::UnknownKey(key.to_string())),
        }
        Ok(())
    }
}

fn parse_number(value: &str) -> Option<f64> {
    value.parse::<f64>().ok().filter(|n| n.is_finite())
}

fn to_pixels(value: f64) -> u32 {
    if value.is_finite() && value > 0.0 {
        value.round().min(f64::from(u32::MAX)) as u32
    } else {
        0
    }
}

/// Resolve the options for one generation call
///
/// # Parameters
/// * `options` - Declarative options (may be all `None`)
/// * `overrides` - Inline query strings, applied in order after `options`
///
/// # Returns
/// * `ResolvedOptions` - Defaults, then declared fields, then the declared
///   `query`, then each override
pub fn decode_options(options: &MdAvaterOptions, overrides: &[&str]) -> ResolvedOptions {
    let mut resolved = ResolvedOptions::default();

    if let Some(ref avater) = options.avater {
        resolved.apply_avater(avater);
    }
    if let Some(ref format) = options.format {
        resolved.apply_format(format);
    }
    if let Some(query) = options.avater.as_ref().and_then(|a| a.query.as_deref()) {
        resolved.apply_query(query);
    }
    for query in overrides {
        resolved.apply_query(query);
    }

    resolved
}
