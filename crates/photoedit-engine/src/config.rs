use std::env;
use std::fmt;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-image";
pub const DEFAULT_PROVIDER: &str = "gemini";
pub const DEFAULT_EXPORT_PREFIX: &str = "ai-photo-edit";
pub const DEFAULT_MAX_SURFACE_PIXELS: u64 = 16_384 * 16_384;

const API_KEY_VARS: &[&str] = &["GEMINI_API_KEY", "GOOGLE_API_KEY", "API_KEY"];

/// Process-level settings for a session.
#[derive(Clone, PartialEq)]
pub struct EditorConfig {
    pub api_key: Option<String>,
    pub api_base: String,
    pub model: String,
    pub provider: String,
    pub export_prefix: String,
    pub max_surface_pixels: u64,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            provider: DEFAULT_PROVIDER.to_string(),
            export_prefix: DEFAULT_EXPORT_PREFIX.to_string(),
            max_surface_pixels: DEFAULT_MAX_SURFACE_PIXELS,
        }
    }
}

impl fmt::Debug for EditorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditorConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("provider", &self.provider)
            .field("export_prefix", &self.export_prefix)
            .field("max_surface_pixels", &self.max_surface_pixels)
            .finish()
    }
}

impl EditorConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Resolves settings through `lookup`; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let defaults = Self::default();
        Self {
            api_key: API_KEY_VARS.iter().find_map(|key| get(key)),
            api_base: get("GEMINI_API_BASE")
                .map(|value| value.trim_end_matches('/').to_string())
                .filter(|value| !value.is_empty())
                .unwrap_or(defaults.api_base),
            model: get("PHOTOEDIT_AI_MODEL").unwrap_or(defaults.model),
            provider: get("PHOTOEDIT_AI_PROVIDER")
                .map(|value| value.to_ascii_lowercase())
                .unwrap_or(defaults.provider),
            export_prefix: get("PHOTOEDIT_EXPORT_PREFIX").unwrap_or(defaults.export_prefix),
            max_surface_pixels: get("PHOTOEDIT_MAX_SURFACE_PIXELS")
                .and_then(|value| value.parse::<u64>().ok())
                .filter(|value| *value > 0)
                .unwrap_or(defaults.max_surface_pixels),
        }
    }
}
