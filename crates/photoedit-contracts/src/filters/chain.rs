use serde::Serialize;

use super::channel::Channel;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FilterOp {
    pub channel: Channel,
    pub magnitude: f64,
}

impl FilterOp {
    pub fn is_identity(&self) -> bool {
        self.magnitude == self.channel.identity()
    }

    /// Magnitude as a unit fraction (`%` channels) or raw px/deg.
    pub fn amount(&self) -> f64 {
        match self.channel.unit() {
            "%" => self.magnitude / 100.0,
            _ => self.magnitude,
        }
    }

    pub fn to_css(&self) -> String {
        format!(
            "{}({}{})",
            self.channel.css_function(),
            self.magnitude,
            self.channel.unit()
        )
    }
}

/// Fixed-order filter description: brightness, contrast, saturate,
/// grayscale, sepia, blur, hue-rotate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterChain {
    ops: Vec<FilterOp>,
}

impl FilterChain {
    pub(crate) fn new(ops: Vec<FilterOp>) -> Self {
        Self { ops }
    }

    pub fn ops(&self) -> &[FilterOp] {
        &self.ops
    }

    pub fn iter(&self) -> impl Iterator<Item = &FilterOp> {
        self.ops.iter()
    }

    pub fn is_identity(&self) -> bool {
        self.ops.iter().all(FilterOp::is_identity)
    }

    /// Declarative effect list for a live compositor, e.g. a CSS `filter`
    /// property value.
    pub fn to_css(&self) -> String {
        self.ops
            .iter()
            .map(FilterOp::to_css)
            .collect::<Vec<String>>()
            .join(" ")
    }
}
