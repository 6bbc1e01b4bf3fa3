use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::EditorError;

/// One adjustable filter channel.
///
/// Declaration order is the compositing order of the filter chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Channel {
    Brightness,
    Contrast,
    Saturation,
    Grayscale,
    Sepia,
    Blur,
    HueRotate,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelRange {
    pub min: f64,
    pub max: f64,
}

impl ChannelRange {
    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

impl Channel {
    pub const ALL: [Channel; 7] = [
        Channel::Brightness,
        Channel::Contrast,
        Channel::Saturation,
        Channel::Grayscale,
        Channel::Sepia,
        Channel::Blur,
        Channel::HueRotate,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Self::Brightness => "brightness",
            Self::Contrast => "contrast",
            Self::Saturation => "saturation",
            Self::Grayscale => "grayscale",
            Self::Sepia => "sepia",
            Self::Blur => "blur",
            Self::HueRotate => "hueRotate",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Brightness => "Brightness",
            Self::Contrast => "Contrast",
            Self::Saturation => "Saturation",
            Self::Grayscale => "Grayscale",
            Self::Sepia => "Sepia",
            Self::Blur => "Blur",
            Self::HueRotate => "Hue Rotate",
        }
    }

    pub fn range(self) -> ChannelRange {
        let max = match self {
            Self::Brightness | Self::Contrast | Self::Saturation => 200.0,
            Self::Grayscale | Self::Sepia => 100.0,
            Self::Blur => 20.0,
            Self::HueRotate => 360.0,
        };
        ChannelRange { min: 0.0, max }
    }

    /// The value at which the channel leaves pixels untouched.
    pub fn identity(self) -> f64 {
        match self {
            Self::Brightness | Self::Contrast | Self::Saturation => 100.0,
            Self::Grayscale | Self::Sepia | Self::Blur | Self::HueRotate => 0.0,
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Self::Blur => "px",
            Self::HueRotate => "deg",
            _ => "%",
        }
    }

    /// Name of the compositor filter function that realises this channel.
    pub fn css_function(self) -> &'static str {
        match self {
            Self::Brightness => "brightness",
            Self::Contrast => "contrast",
            Self::Saturation => "saturate",
            Self::Grayscale => "grayscale",
            Self::Sepia => "sepia",
            Self::Blur => "blur",
            Self::HueRotate => "hue-rotate",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Channel {
    type Err = EditorError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized: String = raw
            .trim()
            .chars()
            .filter(|ch| *ch != '_' && *ch != '-' && *ch != ' ')
            .collect::<String>()
            .to_ascii_lowercase();
        let channel = match normalized.as_str() {
            "brightness" => Self::Brightness,
            "contrast" => Self::Contrast,
            "saturation" | "saturate" => Self::Saturation,
            "grayscale" | "greyscale" => Self::Grayscale,
            "sepia" => Self::Sepia,
            "blur" => Self::Blur,
            "huerotate" | "hue" => Self::HueRotate,
            _ => return Err(EditorError::UnknownChannel(raw.trim().to_string())),
        };
        Ok(channel)
    }
}
