use serde::Serialize;

use super::chain::{FilterChain, FilterOp};
use super::channel::Channel;
use super::presets::Preset;
use crate::errors::{EditorError, EditorResult};

/// The seven adjustment channels applied on top of a base image.
///
/// Fields are private so every value stays inside its channel range; the only
/// ways to change a vector return a new one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterVector {
    brightness: f64,
    contrast: f64,
    saturation: f64,
    grayscale: f64,
    sepia: f64,
    blur: f64,
    hue_rotate: f64,
}

impl Default for FilterVector {
    fn default() -> Self {
        Self::identity()
    }
}

impl FilterVector {
    pub const fn identity() -> Self {
        Self {
            brightness: 100.0,
            contrast: 100.0,
            saturation: 100.0,
            grayscale: 0.0,
            sepia: 0.0,
            blur: 0.0,
            hue_rotate: 0.0,
        }
    }

    pub fn get(&self, channel: Channel) -> f64 {
        match channel {
            Channel::Brightness => self.brightness,
            Channel::Contrast => self.contrast,
            Channel::Saturation => self.saturation,
            Channel::Grayscale => self.grayscale,
            Channel::Sepia => self.sepia,
            Channel::Blur => self.blur,
            Channel::HueRotate => self.hue_rotate,
        }
    }

    fn slot_mut(&mut self, channel: Channel) -> &mut f64 {
        match channel {
            Channel::Brightness => &mut self.brightness,
            Channel::Contrast => &mut self.contrast,
            Channel::Saturation => &mut self.saturation,
            Channel::Grayscale => &mut self.grayscale,
            Channel::Sepia => &mut self.sepia,
            Channel::Blur => &mut self.blur,
            Channel::HueRotate => &mut self.hue_rotate,
        }
    }

    /// Returns a copy with `channel` set to `value` clamped into its range.
    ///
    /// Non-finite input is rejected instead of clamped.
    pub fn with_channel(&self, channel: Channel, value: f64) -> EditorResult<Self> {
        if !value.is_finite() {
            return Err(EditorError::InvalidChannelValue { channel, value });
        }
        let mut next = *self;
        *next.slot_mut(channel) = channel.range().clamp(value);
        Ok(next)
    }

    /// Overwrites the channels the preset names; the rest are kept.
    pub fn with_preset(&self, preset: &Preset) -> Self {
        let mut next = *self;
        for &(channel, value) in preset.overrides() {
            *next.slot_mut(channel) = channel.range().clamp(value);
        }
        next
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::identity()
    }

    /// Channels whose value differs from `other`, in chain order.
    pub fn changed_channels(&self, other: &FilterVector) -> Vec<Channel> {
        Channel::ALL
            .into_iter()
            .filter(|channel| self.get(*channel) != other.get(*channel))
            .collect()
    }

    /// The ordered effect list shared by live preview and offline bake.
    pub fn chain(&self) -> FilterChain {
        FilterChain::new(
            Channel::ALL
                .into_iter()
                .map(|channel| FilterOp {
                    channel,
                    magnitude: self.get(channel),
                })
                .collect(),
        )
    }
}
