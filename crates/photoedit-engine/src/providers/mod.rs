mod dryrun;
mod gemini;

use std::collections::BTreeMap;
use std::sync::Arc;

use photoedit_contracts::EditorResult;
use serde_json::{Map, Value};

pub use dryrun::DryrunProvider;
pub use gemini::GeminiProvider;

use crate::config::EditorConfig;
use crate::raster::RasterBuffer;

#[derive(Debug, Clone)]
pub struct EditRequest {
    /// The baked current view, PNG encoded.
    pub image: RasterBuffer,
    pub instruction: String,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct EditResponse {
    pub image: RasterBuffer,
    /// Request summary safe to journal: no credentials, no image payloads.
    pub provider_request: Map<String, Value>,
    pub warnings: Vec<String>,
}

/// A remote (or simulated) image editing model.
///
/// `edit` blocks until the single result arrives or the call fails. Providers
/// never retry on their own.
pub trait ImageEditProvider: Send + Sync {
    fn name(&self) -> &str;
    fn edit(&self, request: &EditRequest) -> EditorResult<EditResponse>;
}

#[derive(Default, Clone)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, Arc<dyn ImageEditProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<P: ImageEditProvider + 'static>(&mut self, provider: P) {
        self.providers
            .insert(provider.name().to_string(), Arc::new(provider));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ImageEditProvider>> {
        self.providers.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }
}

pub fn default_provider_registry(config: &EditorConfig) -> ProviderRegistry {
    let mut providers = ProviderRegistry::new();
    providers.register(DryrunProvider);
    providers.register(GeminiProvider::new(config));
    providers
}

fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}
