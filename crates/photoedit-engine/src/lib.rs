//! Photo editing engine: decodes a base image, renders the shared filter
//! chain into pixels, and round-trips the baked view through an AI image
//! editing provider.

pub mod config;
pub mod providers;
pub mod raster;
pub mod render;
pub mod session;
pub mod worker;

pub use config::EditorConfig;
pub use providers::{
    default_provider_registry, DryrunProvider, EditRequest, EditResponse, GeminiProvider,
    ImageEditProvider, ProviderRegistry,
};
pub use raster::{BaseImage, RasterBuffer, SurfaceLimits};
pub use render::{apply_chain, bake, RenderJob, SampleDepth, Surface};
pub use session::{
    export_file_name, EditOutcome, EditState, EditTicket, EditorSession, PreviewFrame,
    SessionStats,
};
pub use worker::SharedSession;
