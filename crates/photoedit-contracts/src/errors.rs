//! Error taxonomy shared by the filter model, the render engine and the AI
//! edit adapter.
//!
//! Every variant is terminal for the operation that raised it. Nothing in the
//! workspace retries automatically; a retry is always an explicit new call.

use thiserror::Error;

use crate::filters::Channel;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EditorError {
    /// A channel value that is not a finite number.
    #[error("invalid value {value} for channel {channel}")]
    InvalidChannelValue { channel: Channel, value: f64 },

    #[error("unknown filter channel '{0}'")]
    UnknownChannel(String),

    #[error("unknown preset '{0}'")]
    UnknownPreset(String),

    #[error("image decode failed: {0}")]
    DecodeFailure(String),

    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// The pixel surface could not be allocated (zero-sized or too large).
    #[error("rendering surface unavailable: {0}")]
    SurfaceUnavailable(String),

    #[error("no image loaded")]
    NoImage,

    #[error("edit instruction is empty")]
    EmptyInstruction,

    /// An exclusive operation (bake, export, AI edit) is already in flight.
    #[error("{0} already in progress")]
    Busy(String),

    #[error("unknown AI provider '{0}'")]
    UnknownProvider(String),

    #[error("API key is missing: {0}")]
    MissingCredential(String),

    #[error("no image generated: {0}")]
    EmptyResponse(String),

    #[error("AI request failed: {0}")]
    TransportFailure(String),

    #[error("I/O error: {0}")]
    Io(String),
}

pub type EditorResult<T> = Result<T, EditorError>;

impl EditorError {
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::DecodeFailure(msg.into())
    }

    pub fn surface(msg: impl Into<String>) -> Self {
        Self::SurfaceUnavailable(msg.into())
    }

    pub fn busy(operation: impl Into<String>) -> Self {
        Self::Busy(operation.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::TransportFailure(msg.into())
    }

    pub fn empty_response(msg: impl Into<String>) -> Self {
        Self::EmptyResponse(msg.into())
    }

    /// Stable snake_case tag used in journal payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidChannelValue { .. } => "invalid_channel_value",
            Self::UnknownChannel(_) => "unknown_channel",
            Self::UnknownPreset(_) => "unknown_preset",
            Self::DecodeFailure(_) => "decode_failure",
            Self::UnsupportedFormat(_) => "unsupported_format",
            Self::SurfaceUnavailable(_) => "surface_unavailable",
            Self::NoImage => "no_image",
            Self::EmptyInstruction => "empty_instruction",
            Self::Busy(_) => "busy",
            Self::UnknownProvider(_) => "unknown_provider",
            Self::MissingCredential(_) => "missing_credential",
            Self::EmptyResponse(_) => "empty_response",
            Self::TransportFailure(_) => "transport_failure",
            Self::Io(_) => "io",
        }
    }

    pub fn is_retryable(&self) -> bool {
        false
    }
}

impl From<std::io::Error> for EditorError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
