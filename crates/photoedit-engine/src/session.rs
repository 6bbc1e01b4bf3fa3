//! The editing session: one base image, one filter vector, and the
//! `Idle -> Submitting -> Idle | Failed` machine that guards AI edits.
//!
//! Every operation is transactional. A failure leaves the base image and the
//! filter vector exactly as they were and pushes an error notice; successful
//! exports and AI edits push a success notice.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use photoedit_contracts::events::{now_utc_iso, SessionEvent, SessionJournal};
use photoedit_contracts::filters::{find_preset, Channel, FilterChain, FilterVector};
use photoedit_contracts::notices::{Notice, NoticeBoard};
use photoedit_contracts::summary::{write_summary, SessionSummary};
use photoedit_contracts::{EditorError, EditorResult};
use serde_json::{Map, Value};

use crate::config::EditorConfig;
use crate::providers::{
    default_provider_registry, EditRequest, EditResponse, ImageEditProvider, ProviderRegistry,
};
use crate::raster::{BaseImage, RasterBuffer, SurfaceLimits};
use crate::render::RenderJob;

pub const EXPORT_SAVED_MESSAGE: &str = "Image saved to gallery";
pub const EXPORT_FAILED_MESSAGE: &str = "Failed to save image.";
pub const LOAD_FAILED_MESSAGE: &str = "Failed to load image.";
pub const AI_EDIT_APPLIED_MESSAGE: &str = "AI Edit applied successfully!";

#[derive(Debug, Clone, PartialEq)]
pub enum EditState {
    Idle,
    Submitting { ticket: u64, started_ms: i64 },
    /// The last edit failed. Admits a new submission like `Idle`.
    Failed { message: String, kind: &'static str },
}

impl EditState {
    pub fn is_submitting(&self) -> bool {
        matches!(self, Self::Submitting { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    Applied { width: u32, height: u32 },
    /// The session dropped the image the edit was made against.
    Discarded,
}

/// An admitted AI edit. Carries everything the provider call needs so it can
/// run without holding the session.
pub struct EditTicket {
    id: u64,
    generation: u64,
    filters_at_submit: FilterVector,
    provider: Arc<dyn ImageEditProvider>,
    request: EditRequest,
}

impl EditTicket {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn request(&self) -> &EditRequest {
        &self.request
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Blocks until the provider answers. Never retries.
    pub fn run(&self) -> EditorResult<EditResponse> {
        self.provider.edit(&self.request)
    }
}

impl fmt::Debug for EditTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditTicket")
            .field("id", &self.id)
            .field("generation", &self.generation)
            .field("provider", &self.provider.name())
            .field("request", &self.request)
            .finish()
    }
}

/// What the live compositor needs for one frame. No pixels involved.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewFrame {
    pub css_filter: String,
    pub chain: FilterChain,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub images_loaded: u64,
    pub exports: u64,
    pub ai_edits_applied: u64,
    pub ai_edits_failed: u64,
}

pub struct EditorSession {
    config: EditorConfig,
    limits: SurfaceLimits,
    session_id: String,
    started_at: String,
    events: Option<SessionJournal>,
    providers: ProviderRegistry,
    provider_name: String,
    image: Option<BaseImage>,
    filters: FilterVector,
    edit_state: EditState,
    /// Ticket whose provider call has not returned yet. Outlives
    /// `Submitting` when the image is closed mid-edit.
    outstanding_ticket: Option<u64>,
    generation: u64,
    next_ticket: u64,
    notices: NoticeBoard,
    stats: SessionStats,
}

impl EditorSession {
    /// Starts a session. With `events_path` set, the session journals to it.
    pub fn new(config: EditorConfig, events_path: Option<PathBuf>) -> Self {
        let session_id = uuid::Uuid::new_v4().to_string();
        let events = events_path.map(|path| SessionJournal::new(path, session_id.clone()));
        let session = Self {
            limits: SurfaceLimits {
                max_pixels: config.max_surface_pixels,
            },
            providers: default_provider_registry(&config),
            provider_name: config.provider.clone(),
            config,
            session_id,
            started_at: now_utc_iso(),
            events,
            image: None,
            filters: FilterVector::identity(),
            edit_state: EditState::Idle,
            outstanding_ticket: None,
            generation: 0,
            next_ticket: 1,
            notices: NoticeBoard::new(),
            stats: SessionStats::default(),
        };
        session.journal(SessionEvent::SessionStarted {
            provider: session.provider_name.clone(),
            model: session.config.model.clone(),
            credential_configured: session.config.api_key.is_some(),
        });
        session
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn image(&self) -> Option<&BaseImage> {
        self.image.as_ref()
    }

    pub fn filters(&self) -> FilterVector {
        self.filters
    }

    pub fn edit_state(&self) -> &EditState {
        &self.edit_state
    }

    /// True while a provider call is running, including one orphaned by
    /// `close_image`.
    pub fn edit_in_flight(&self) -> bool {
        self.outstanding_ticket.is_some()
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn register_provider<P: ImageEditProvider + 'static>(&mut self, provider: P) {
        self.providers.register(provider);
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.providers.names()
    }

    pub fn provider_name(&self) -> &str {
        &self.provider_name
    }

    pub fn set_provider(&mut self, name: &str) -> EditorResult<()> {
        let name = name.trim().to_ascii_lowercase();
        if self.providers.get(&name).is_none() {
            return Err(self.report(EditorError::UnknownProvider(name)));
        }
        self.provider_name = name;
        Ok(())
    }

    pub fn active_provider(&self) -> EditorResult<Arc<dyn ImageEditProvider>> {
        self.providers
            .get(&self.provider_name)
            .ok_or_else(|| EditorError::UnknownProvider(self.provider_name.clone()))
    }

    /// Decodes `bytes` into the new base image and resets the filters.
    pub fn load_image(&mut self, bytes: Vec<u8>) -> EditorResult<(u32, u32)> {
        self.load_raster(RasterBuffer::from_bytes(bytes))
    }

    /// Accepts `data:image/<png|jpeg|jpg|webp>;base64,...` text.
    pub fn load_data_url(&mut self, text: &str) -> EditorResult<(u32, u32)> {
        self.ensure_not_submitting("AI edit")?;
        match RasterBuffer::from_data_url(text) {
            Ok(raster) => self.load_raster(raster),
            Err(err) => Err(self.report_with(err, LOAD_FAILED_MESSAGE)),
        }
    }

    pub fn load_path(&mut self, path: &Path) -> EditorResult<(u32, u32)> {
        self.ensure_not_submitting("AI edit")?;
        match std::fs::read(path) {
            Ok(bytes) => self.load_image(bytes),
            Err(err) => Err(self.report_with(
                EditorError::Io(format!("{}: {err}", path.display())),
                LOAD_FAILED_MESSAGE,
            )),
        }
    }

    fn load_raster(&mut self, raster: RasterBuffer) -> EditorResult<(u32, u32)> {
        self.ensure_not_submitting("AI edit")?;
        let mime_type = raster.mime_type().to_string();
        let byte_len = raster.len();
        let image = match BaseImage::decode(raster, self.limits) {
            Ok(image) => image,
            Err(err) => return Err(self.report_with(err, LOAD_FAILED_MESSAGE)),
        };
        let (width, height) = image.dimensions();
        self.replace_base(image);
        self.edit_state = EditState::Idle;
        self.stats.images_loaded += 1;
        self.journal(SessionEvent::ImageLoaded {
            mime_type,
            bytes: byte_len as u64,
            width,
            height,
        });
        Ok((width, height))
    }

    /// Returns the session to "no image". Allowed while an AI edit is in
    /// flight; its late result is then dropped, and no new edit is admitted
    /// until that call has returned.
    pub fn close_image(&mut self) -> bool {
        let had_image = self.image.take().is_some();
        let pending_edit = self.edit_state.is_submitting();
        self.filters = FilterVector::identity();
        self.generation += 1;
        self.edit_state = EditState::Idle;
        if had_image {
            self.journal(SessionEvent::ImageClosed {
                pending_edit_discarded: pending_edit,
            });
        }
        had_image
    }

    pub fn set_channel(&mut self, channel: Channel, value: f64) -> EditorResult<FilterVector> {
        let next = match self.filters.with_channel(channel, value) {
            Ok(next) => next,
            Err(err) => return Err(self.report(err)),
        };
        self.filters = next;
        self.journal(SessionEvent::FiltersChanged {
            channel,
            value: next.get(channel),
            css_filter: next.chain().to_css(),
        });
        Ok(next)
    }

    /// Like `set_channel`, with the channel given by name or alias.
    pub fn set_channel_named(&mut self, channel: &str, value: f64) -> EditorResult<FilterVector> {
        match channel.parse::<Channel>() {
            Ok(channel) => self.set_channel(channel, value),
            Err(err) => Err(self.report(err)),
        }
    }

    pub fn apply_preset(&mut self, name: &str) -> EditorResult<FilterVector> {
        let preset = match find_preset(name) {
            Ok(preset) => preset,
            Err(err) => return Err(self.report(err)),
        };
        let next = self.filters.with_preset(preset);
        let changed_channels = self.filters.changed_channels(&next);
        self.filters = next;
        self.journal(SessionEvent::PresetApplied {
            preset: preset.name().to_string(),
            changed_channels,
            css_filter: next.chain().to_css(),
        });
        Ok(next)
    }

    pub fn reset_filters(&mut self) -> FilterVector {
        self.filters = FilterVector::identity();
        self.journal(SessionEvent::FiltersReset);
        self.filters
    }

    pub fn preview(&self) -> EditorResult<PreviewFrame> {
        let image = self.image.as_ref().ok_or(EditorError::NoImage)?;
        let chain = self.filters.chain();
        Ok(PreviewFrame {
            css_filter: chain.to_css(),
            chain,
            width: image.width(),
            height: image.height(),
        })
    }

    /// Snapshot of the base image and vector, detached from later changes.
    pub fn render_job(&self) -> EditorResult<RenderJob> {
        let image = self.image.as_ref().ok_or(EditorError::NoImage)?;
        Ok(RenderJob {
            image: image.clone(),
            filters: self.filters,
            limits: self.limits,
        })
    }

    /// Bakes the current view at natural size into a PNG.
    pub fn bake(&mut self) -> EditorResult<RasterBuffer> {
        self.ensure_not_submitting("AI edit")?;
        let job = match self.render_job() {
            Ok(job) => job,
            Err(err) => return Err(self.report(err)),
        };
        self.run_bake(&job)
    }

    fn run_bake(&mut self, job: &RenderJob) -> EditorResult<RasterBuffer> {
        let started = Utc::now();
        let baked = match job.run() {
            Ok(baked) => baked,
            Err(err) => return Err(self.report(err)),
        };
        self.journal(SessionEvent::BakeFinished {
            bytes: baked.len() as u64,
            width: job.image.width(),
            height: job.image.height(),
            identity: job.filters.is_identity(),
            elapsed_ms: (Utc::now() - started).num_milliseconds(),
        });
        Ok(baked)
    }

    /// Writes the baked view to `<dir>/<prefix>-<epoch-millis>.png`.
    pub fn export(&mut self, dir: &Path) -> EditorResult<PathBuf> {
        self.ensure_not_submitting("AI edit")?;
        let job = match self.render_job() {
            Ok(job) => job,
            Err(err) => return Err(self.report_with(err, EXPORT_FAILED_MESSAGE)),
        };
        let baked = match self.run_bake(&job) {
            Ok(baked) => baked,
            Err(err) => return Err(self.report_with(err, EXPORT_FAILED_MESSAGE)),
        };
        let path = dir.join(export_file_name(&self.config.export_prefix, now_ms()));
        let written = std::fs::create_dir_all(dir).and_then(|_| std::fs::write(&path, baked.bytes()));
        if let Err(err) = written {
            return Err(self.report_with(
                EditorError::Io(format!("{}: {err}", path.display())),
                EXPORT_FAILED_MESSAGE,
            ));
        }
        self.stats.exports += 1;
        self.notices
            .push(Notice::success(EXPORT_SAVED_MESSAGE, now_ms()));
        self.journal(SessionEvent::ExportWritten {
            path: path.to_string_lossy().into_owned(),
            bytes: baked.len() as u64,
            width: job.image.width(),
            height: job.image.height(),
        });
        Ok(path)
    }

    /// Admits an AI edit: checks the instruction, the image and exclusivity,
    /// bakes the current view and moves to `Submitting`.
    pub fn begin_edit(&mut self, instruction: &str) -> EditorResult<EditTicket> {
        let instruction = instruction.trim();
        if instruction.is_empty() {
            return Err(self.report(EditorError::EmptyInstruction));
        }
        if self.image.is_none() {
            return Err(self.report(EditorError::NoImage));
        }
        self.ensure_not_submitting("AI edit")?;
        if self.outstanding_ticket.is_some() {
            return Err(self.report(EditorError::busy("AI edit")));
        }
        let provider = match self.active_provider() {
            Ok(provider) => provider,
            Err(err) => return Err(self.report(err)),
        };
        let job = self.render_job()?;
        let baked = self.run_bake(&job)?;

        let ticket = EditTicket {
            id: self.next_ticket,
            generation: self.generation,
            filters_at_submit: self.filters,
            provider,
            request: EditRequest {
                image: baked,
                instruction: instruction.to_string(),
                model: self.config.model.clone(),
            },
        };
        self.next_ticket += 1;
        self.outstanding_ticket = Some(ticket.id);
        self.edit_state = EditState::Submitting {
            ticket: ticket.id,
            started_ms: now_ms(),
        };
        self.journal(SessionEvent::AiEditStarted {
            ticket: ticket.id,
            provider: ticket.provider_name().to_string(),
            model: ticket.request.model.clone(),
            instruction: ticket.request.instruction.clone(),
            image_bytes: ticket.request.image.len() as u64,
        });
        Ok(ticket)
    }

    /// Applies or records the provider's answer for `ticket`.
    pub fn complete_edit(
        &mut self,
        ticket: EditTicket,
        result: EditorResult<EditResponse>,
    ) -> EditorResult<EditOutcome> {
        if self.outstanding_ticket == Some(ticket.id) {
            self.outstanding_ticket = None;
        }
        let current = matches!(
            self.edit_state,
            EditState::Submitting { ticket: id, .. } if id == ticket.id
        ) && self.generation == ticket.generation;
        if !current {
            self.journal(SessionEvent::AiEditDiscarded {
                ticket: ticket.id,
                succeeded: result.is_ok(),
            });
            return Ok(EditOutcome::Discarded);
        }

        let response = match result {
            Ok(response) => response,
            Err(err) => return Err(self.fail_edit(ticket.id, err)),
        };
        let image = match BaseImage::decode(response.image, self.limits) {
            Ok(image) => image,
            Err(err) => return Err(self.fail_edit(ticket.id, err)),
        };

        let (width, height) = image.dimensions();
        let discarded_adjustments = self.filters != ticket.filters_at_submit;
        self.replace_base(image);
        self.edit_state = EditState::Idle;
        self.stats.ai_edits_applied += 1;
        self.notices
            .push(Notice::success(AI_EDIT_APPLIED_MESSAGE, now_ms()));
        self.journal(SessionEvent::AiEditApplied {
            ticket: ticket.id,
            provider: ticket.provider_name().to_string(),
            width,
            height,
            discarded_adjustments,
            warnings: response.warnings,
            provider_request: response.provider_request,
        });
        Ok(EditOutcome::Applied { width, height })
    }

    /// Runs a whole AI edit on the calling thread.
    pub fn request_edit(&mut self, instruction: &str) -> EditorResult<EditOutcome> {
        let ticket = self.begin_edit(instruction)?;
        let result = ticket.run();
        self.complete_edit(ticket, result)
    }

    /// Moves a submitted edit to `Failed`, if it is still the current one.
    pub(crate) fn fail_edit(&mut self, ticket: u64, err: EditorError) -> EditorError {
        if self.outstanding_ticket == Some(ticket) {
            self.outstanding_ticket = None;
        }
        if !matches!(self.edit_state, EditState::Submitting { ticket: id, .. } if id == ticket) {
            return err;
        }
        self.edit_state = EditState::Failed {
            message: err.to_string(),
            kind: err.kind(),
        };
        self.stats.ai_edits_failed += 1;
        self.journal(SessionEvent::AiEditFailed {
            ticket,
            kind: err.kind().to_string(),
            message: err.to_string(),
        });
        self.report(err)
    }

    pub fn notices(&self) -> Vec<&Notice> {
        self.notices_at(now_ms())
    }

    pub fn notices_at(&self, now_ms: i64) -> Vec<&Notice> {
        self.notices.active(now_ms)
    }

    pub fn prune_notices(&mut self) {
        self.notices.prune(now_ms());
    }

    pub fn dismiss_notices(&mut self) {
        self.notices.clear();
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            session_id: self.session_id.clone(),
            started_at: self.started_at.clone(),
            finished_at: now_utc_iso(),
            images_loaded: self.stats.images_loaded,
            exports: self.stats.exports,
            ai_edits_applied: self.stats.ai_edits_applied,
            ai_edits_failed: self.stats.ai_edits_failed,
        }
    }

    /// Journals the end of the session and writes `summary_path`.
    pub fn finish(&mut self, summary_path: &Path) -> anyhow::Result<SessionSummary> {
        let summary = self.summary();
        self.journal(SessionEvent::SessionFinished {
            images_loaded: summary.images_loaded,
            exports: summary.exports,
            ai_edits_applied: summary.ai_edits_applied,
            ai_edits_failed: summary.ai_edits_failed,
        });
        let mut extra = Map::new();
        extra.insert("filters".to_string(), serde_json::to_value(self.filters)?);
        extra.insert(
            "provider".to_string(),
            Value::String(self.provider_name.clone()),
        );
        write_summary(summary_path, &summary, Some(&extra))?;
        Ok(summary)
    }

    fn replace_base(&mut self, image: BaseImage) {
        self.image = Some(image);
        self.filters = FilterVector::identity();
        self.generation += 1;
    }

    fn ensure_not_submitting(&mut self, operation: &str) -> EditorResult<()> {
        if self.edit_state.is_submitting() {
            return Err(self.report(EditorError::busy(operation)));
        }
        Ok(())
    }

    fn report(&mut self, err: EditorError) -> EditorError {
        let message = err.to_string();
        self.report_with(err, &message)
    }

    fn report_with(&mut self, err: EditorError, message: &str) -> EditorError {
        self.notices.push(Notice::error(message, now_ms()));
        err
    }

    fn journal(&self, event: SessionEvent) {
        let Some(events) = self.events.as_ref() else {
            return;
        };
        let kind = event.kind();
        if let Err(err) = events.record(event) {
            eprintln!("photoedit: journal write failed for {kind}: {err:#}");
        }
    }
}

pub fn export_file_name(prefix: &str, epoch_millis: i64) -> String {
    format!("{prefix}-{epoch_millis}.png")
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io::Cursor;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use image::{ImageFormat, Rgba, RgbaImage};
    use photoedit_contracts::filters::{Channel, FilterVector};
    use photoedit_contracts::notices::{NoticeLevel, SUCCESS_NOTICE_TTL_MS};
    use photoedit_contracts::events::read_journal;
    use photoedit_contracts::EditorError;
    use serde_json::Value;

    use super::*;
    use crate::providers::DryrunProvider;

    fn png_bytes(width: u32, height: u32) -> anyhow::Result<Vec<u8>> {
        let image = RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x * 40) as u8, (y * 40) as u8, 120, 255])
        });
        let mut out = Cursor::new(Vec::new());
        image.write_to(&mut out, ImageFormat::Png)?;
        Ok(out.into_inner())
    }

    fn dryrun_config() -> EditorConfig {
        EditorConfig {
            provider: "dryrun".to_string(),
            ..EditorConfig::default()
        }
    }

    fn session_with_image(events: Option<&Path>) -> anyhow::Result<EditorSession> {
        let mut session = EditorSession::new(dryrun_config(), events.map(Path::to_path_buf));
        session.load_image(png_bytes(4, 3)?)?;
        Ok(session)
    }

    fn event_types(path: &Path) -> anyhow::Result<Vec<&'static str>> {
        Ok(read_journal(path)?
            .iter()
            .map(|entry| entry.event.kind())
            .collect())
    }

    struct CountingProvider {
        calls: Arc<AtomicUsize>,
    }

    impl ImageEditProvider for CountingProvider {
        fn name(&self) -> &str {
            "counting"
        }

        fn edit(&self, request: &EditRequest) -> EditorResult<EditResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            DryrunProvider.edit(request)
        }
    }

    struct FailingProvider;

    impl ImageEditProvider for FailingProvider {
        fn name(&self) -> &str {
            "failing"
        }

        fn edit(&self, _request: &EditRequest) -> EditorResult<EditResponse> {
            Err(EditorError::transport("Gemini request failed (503): overloaded"))
        }
    }

    #[test]
    fn load_resets_filters_and_reports_natural_size() -> anyhow::Result<()> {
        let mut session = session_with_image(None)?;
        session.set_channel(Channel::Blur, 3.0)?;
        assert_eq!(session.load_image(png_bytes(7, 5)?)?, (7, 5));
        assert!(session.filters().is_identity());

        let frame = session.preview()?;
        assert_eq!((frame.width, frame.height), (7, 5));
        assert_eq!(
            frame.css_filter,
            "brightness(100%) contrast(100%) saturate(100%) grayscale(0%) sepia(0%) blur(0px) hue-rotate(0deg)"
        );
        Ok(())
    }

    #[test]
    fn failed_load_keeps_previous_image() -> anyhow::Result<()> {
        let mut session = session_with_image(None)?;
        session.set_channel(Channel::Sepia, 40.0)?;
        let err = session.load_image(b"definitely not an image".to_vec()).unwrap_err();
        assert!(matches!(
            err,
            EditorError::DecodeFailure(_) | EditorError::UnsupportedFormat(_)
        ));
        assert_eq!(session.image().map(BaseImage::dimensions), Some((4, 3)));
        assert_eq!(session.filters().get(Channel::Sepia), 40.0);
        let notices = session.notices();
        assert_eq!(notices[0].message, LOAD_FAILED_MESSAGE);
        assert_eq!(notices[0].level, NoticeLevel::Error);
        Ok(())
    }

    #[test]
    fn data_url_loads() -> anyhow::Result<()> {
        let mut session = EditorSession::new(dryrun_config(), None);
        let url = RasterBuffer::png(png_bytes(2, 2)?).to_data_url();
        assert_eq!(session.load_data_url(&url)?, (2, 2));
        Ok(())
    }

    #[test]
    fn channel_updates_clamp_and_reject_non_finite() -> anyhow::Result<()> {
        let mut session = session_with_image(None)?;
        assert_eq!(session.set_channel(Channel::Brightness, 500.0)?.get(Channel::Brightness), 200.0);
        assert_eq!(session.set_channel_named("hue-rotate", -20.0)?.get(Channel::HueRotate), 0.0);

        let before = session.filters();
        let err = session.set_channel(Channel::Contrast, f64::NAN).unwrap_err();
        assert!(matches!(err, EditorError::InvalidChannelValue { .. }));
        assert_eq!(session.filters(), before);

        let err = session.set_channel_named("vibrance", 10.0).unwrap_err();
        assert!(matches!(err, EditorError::UnknownChannel(_)));
        Ok(())
    }

    #[test]
    fn presets_override_named_channels_only() -> anyhow::Result<()> {
        let mut session = session_with_image(None)?;
        session.set_channel(Channel::Blur, 2.0)?;
        let after = session.apply_preset("noir")?;
        assert_eq!(after.get(Channel::Grayscale), 100.0);
        assert_eq!(after.get(Channel::Contrast), 120.0);
        assert_eq!(after.get(Channel::Brightness), 90.0);
        assert_eq!(after.get(Channel::Blur), 2.0);

        assert!(matches!(
            session.apply_preset("Sunset"),
            Err(EditorError::UnknownPreset(_))
        ));
        assert!(session.reset_filters().is_identity());
        Ok(())
    }

    #[test]
    fn export_writes_prefixed_png_at_natural_size() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let mut session = session_with_image(None)?;
        session.apply_preset("Cyber")?;

        let path = session.export(&temp.path().join("gallery"))?;
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
            .to_string();
        let millis = name
            .strip_prefix("ai-photo-edit-")
            .and_then(|rest| rest.strip_suffix(".png"))
            .unwrap_or_default();
        assert!(!millis.is_empty() && millis.chars().all(|c| c.is_ascii_digit()), "{name}");

        let written = image::open(&path)?;
        assert_eq!((written.width(), written.height()), (4, 3));
        assert_eq!(session.notices()[0].message, EXPORT_SAVED_MESSAGE);
        assert_eq!(session.stats().exports, 1);
        Ok(())
    }

    #[test]
    fn export_without_image_fails() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let mut session = EditorSession::new(dryrun_config(), None);
        assert_eq!(session.export(temp.path()).unwrap_err(), EditorError::NoImage);
        assert_eq!(session.notices()[0].message, EXPORT_FAILED_MESSAGE);
        Ok(())
    }

    #[test]
    fn ai_edit_replaces_base_and_resets_filters() -> anyhow::Result<()> {
        let mut session = session_with_image(None)?;
        let original = session.image().map(|image| image.raster().clone());
        session.set_channel(Channel::Brightness, 150.0)?;
        session.apply_preset("Warmth")?;

        let outcome = session.request_edit("  add dramatic clouds  ")?;
        assert_eq!(outcome, EditOutcome::Applied { width: 4, height: 3 });
        assert!(session.filters().is_identity());
        assert_ne!(
            session.image().map(|image| image.raster().bytes().to_vec()),
            original.map(|raster| raster.bytes().to_vec())
        );
        assert_eq!(session.edit_state(), &EditState::Idle);
        assert_eq!(session.notices()[0].message, AI_EDIT_APPLIED_MESSAGE);
        Ok(())
    }

    #[test]
    fn edit_request_carries_baked_view() -> anyhow::Result<()> {
        let mut session = session_with_image(None)?;
        session.apply_preset("Noir")?;
        let expected = session.render_job()?.run()?;
        let ticket = session.begin_edit("sharpen")?;
        assert_eq!(ticket.request().image.bytes(), expected.bytes());
        assert_eq!(ticket.request().instruction, "sharpen");
        assert_eq!(ticket.request().image.mime_type(), "image/png");
        Ok(())
    }

    #[test]
    fn blank_instruction_never_reaches_provider() -> anyhow::Result<()> {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut session = session_with_image(None)?;
        session.register_provider(CountingProvider {
            calls: Arc::clone(&calls),
        });
        session.set_provider("counting")?;

        assert_eq!(session.request_edit(" \t\n").unwrap_err(), EditorError::EmptyInstruction);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(session.edit_state(), &EditState::Idle);

        session.request_edit("brighter")?;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[test]
    fn edit_without_image_is_rejected() {
        let mut session = EditorSession::new(dryrun_config(), None);
        assert_eq!(session.request_edit("anything").unwrap_err(), EditorError::NoImage);
    }

    #[test]
    fn second_submission_is_busy_while_first_is_pending() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let mut session = session_with_image(None)?;
        let ticket = session.begin_edit("first")?;

        assert!(matches!(session.begin_edit("second"), Err(EditorError::Busy(_))));
        assert!(matches!(session.load_image(png_bytes(2, 2)?), Err(EditorError::Busy(_))));
        assert!(matches!(session.export(temp.path()), Err(EditorError::Busy(_))));
        assert!(matches!(session.bake(), Err(EditorError::Busy(_))));
        session.set_channel(Channel::Saturation, 50.0)?;
        assert!(session.preview().is_ok());

        let result = ticket.run();
        assert!(matches!(
            session.complete_edit(ticket, result)?,
            EditOutcome::Applied { .. }
        ));
        assert!(session.begin_edit("third").is_ok());
        Ok(())
    }

    #[test]
    fn failed_edit_leaves_image_and_filters_untouched() -> anyhow::Result<()> {
        let mut session = session_with_image(None)?;
        session.register_provider(FailingProvider);
        session.set_provider("failing")?;
        session.set_channel(Channel::Grayscale, 60.0)?;
        let before_bytes = session.image().map(|image| image.raster().bytes().to_vec());
        let before_filters = session.filters();

        let err = session.request_edit("make it pop").unwrap_err();
        assert!(matches!(err, EditorError::TransportFailure(_)));
        assert!(!err.is_retryable());
        assert_eq!(session.filters(), before_filters);
        assert_eq!(
            session.image().map(|image| image.raster().bytes().to_vec()),
            before_bytes
        );
        assert!(matches!(
            session.edit_state(),
            EditState::Failed { kind: "transport_failure", .. }
        ));
        assert_eq!(session.notices()[0].message, err.to_string());
        assert_eq!(session.stats().ai_edits_failed, 1);

        // Failed admits an explicit retry.
        session.set_provider("dryrun")?;
        assert!(session.request_edit("make it pop").is_ok());
        Ok(())
    }

    #[test]
    fn gemini_without_credential_is_missing_credential() -> anyhow::Result<()> {
        let config = EditorConfig {
            api_key: None,
            api_base: "http://127.0.0.1:9/v1beta".to_string(),
            ..EditorConfig::default()
        };
        let mut session = EditorSession::new(config, None);
        session.load_image(png_bytes(2, 2)?)?;
        assert_eq!(session.provider_name(), "gemini");
        assert!(matches!(
            session.request_edit("add a hat"),
            Err(EditorError::MissingCredential(_))
        ));
        Ok(())
    }

    #[test]
    fn undecodable_edit_result_fails_the_edit() -> anyhow::Result<()> {
        let mut session = session_with_image(None)?;
        let ticket = session.begin_edit("glitch")?;
        let response = EditResponse {
            image: RasterBuffer::png(b"garbage".to_vec()),
            provider_request: Map::new(),
            warnings: Vec::new(),
        };
        assert!(session.complete_edit(ticket, Ok(response)).is_err());
        assert_eq!(session.image().map(BaseImage::dimensions), Some((4, 3)));
        assert!(matches!(session.edit_state(), EditState::Failed { .. }));
        Ok(())
    }

    #[test]
    fn closing_image_discards_late_result() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let events = temp.path().join("events.jsonl");
        let mut session = session_with_image(Some(&events))?;
        let ticket = session.begin_edit("add snow")?;

        assert!(session.close_image());
        assert_eq!(session.edit_state(), &EditState::Idle);
        let result = ticket.run();
        assert_eq!(session.complete_edit(ticket, result)?, EditOutcome::Discarded);
        assert!(session.image().is_none());
        assert_eq!(session.stats().ai_edits_applied, 0);
        assert!(event_types(&events)?.contains(&"ai_edit_discarded"));
        Ok(())
    }

    #[test]
    fn adjustments_made_in_flight_are_dropped_on_success() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let events = temp.path().join("events.jsonl");
        let mut session = session_with_image(Some(&events))?;
        let ticket = session.begin_edit("add fog")?;
        session.set_channel(Channel::Contrast, 170.0)?;
        let result = ticket.run();
        session.complete_edit(ticket, result)?;
        assert!(session.filters().is_identity());

        let applied = read_journal(&events)?
            .into_iter()
            .find_map(|entry| match entry.event {
                SessionEvent::AiEditApplied {
                    provider,
                    discarded_adjustments,
                    ..
                } => Some((provider, discarded_adjustments)),
                _ => None,
            })
            .ok_or_else(|| anyhow::anyhow!("missing ai_edit_applied"))?;
        assert_eq!(applied, ("dryrun".to_string(), true));
        Ok(())
    }

    #[test]
    fn orphaned_edit_blocks_new_submissions_until_it_returns() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let events = temp.path().join("events.jsonl");
        let mut session = session_with_image(Some(&events))?;
        let orphan = session.begin_edit("add a moon")?;
        assert!(session.close_image());
        assert_eq!(session.edit_state(), &EditState::Idle);
        assert!(session.edit_in_flight());

        session.load_image(png_bytes(6, 2)?)?;
        let err = session.begin_edit("add a sun").unwrap_err();
        assert_eq!(err, EditorError::busy("AI edit"));

        let result = orphan.run();
        assert_eq!(session.complete_edit(orphan, result)?, EditOutcome::Discarded);
        assert!(!session.edit_in_flight());
        assert_eq!(session.image().map(BaseImage::dimensions), Some((6, 2)));
        assert_eq!(session.request_edit("add a sun")?, EditOutcome::Applied { width: 6, height: 2 });

        let closed = read_journal(&events)?
            .into_iter()
            .find(|entry| entry.event.kind() == "image_closed")
            .ok_or_else(|| anyhow::anyhow!("missing image_closed"))?;
        assert_eq!(
            closed.event,
            SessionEvent::ImageClosed {
                pending_edit_discarded: true
            }
        );
        Ok(())
    }

    #[test]
    fn success_notices_expire_and_errors_persist() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let mut session = session_with_image(None)?;
        session.export(temp.path())?;
        let _ = session.apply_preset("missing");

        let created = session.notices()[1].created_at_ms;
        let later = session.notices_at(created + SUCCESS_NOTICE_TTL_MS);
        assert_eq!(later.len(), 1);
        assert_eq!(later[0].level, NoticeLevel::Error);

        session.dismiss_notices();
        assert!(session.notices().is_empty());
        Ok(())
    }

    #[test]
    fn journal_and_summary_cover_the_session() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let events = temp.path().join("events.jsonl");
        let summary_path = temp.path().join("summary.json");
        let mut session = session_with_image(Some(&events))?;
        session.set_channel(Channel::Sepia, 20.0)?;
        session.apply_preset("Vintage")?;
        session.export(&temp.path().join("out"))?;
        session.request_edit("remove the lamp post")?;
        session.set_channel(Channel::Blur, 1.0)?;
        let summary = session.finish(&summary_path)?;

        assert_eq!(summary.images_loaded, 1);
        assert_eq!(summary.exports, 1);
        assert_eq!(summary.ai_edits_applied, 1);
        assert_eq!(
            event_types(&events)?,
            vec![
                "session_started",
                "image_loaded",
                "filters_changed",
                "preset_applied",
                "bake_finished",
                "export_written",
                "bake_finished",
                "ai_edit_started",
                "ai_edit_applied",
                "filters_changed",
                "session_finished",
            ]
        );

        let raw = fs::read_to_string(&events)?;
        assert!(!raw.contains("base64"));
        let written: Value = serde_json::from_str(&fs::read_to_string(&summary_path)?)?;
        assert_eq!(written["session_id"], session.session_id());
        assert_eq!(written["filters"]["blur"], 1.0);
        Ok(())
    }

    #[test]
    fn export_names_are_prefixed_millis() {
        assert_eq!(export_file_name("ai-photo-edit", 1_700_000_000_123), "ai-photo-edit-1700000000123.png");
        assert_eq!(FilterVector::identity(), FilterVector::default());
    }
}
