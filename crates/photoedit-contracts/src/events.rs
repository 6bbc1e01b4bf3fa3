use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::filters::Channel;

/// Everything an editing session records in its journal.
///
/// Serialized with the variant name as `type`, so each journal line reads
/// `{"type":"image_loaded","width":..}` alongside the session id and time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    SessionStarted {
        provider: String,
        model: String,
        credential_configured: bool,
    },
    ImageLoaded {
        mime_type: String,
        bytes: u64,
        width: u32,
        height: u32,
    },
    ImageClosed {
        pending_edit_discarded: bool,
    },
    FiltersChanged {
        channel: Channel,
        value: f64,
        css_filter: String,
    },
    PresetApplied {
        preset: String,
        changed_channels: Vec<Channel>,
        css_filter: String,
    },
    FiltersReset,
    BakeFinished {
        bytes: u64,
        width: u32,
        height: u32,
        identity: bool,
        elapsed_ms: i64,
    },
    ExportWritten {
        path: String,
        bytes: u64,
        width: u32,
        height: u32,
    },
    AiEditStarted {
        ticket: u64,
        provider: String,
        model: String,
        instruction: String,
        image_bytes: u64,
    },
    AiEditApplied {
        ticket: u64,
        provider: String,
        width: u32,
        height: u32,
        discarded_adjustments: bool,
        warnings: Vec<String>,
        provider_request: Map<String, Value>,
    },
    AiEditFailed {
        ticket: u64,
        kind: String,
        message: String,
    },
    /// A provider answer that arrived after the image was replaced or closed.
    AiEditDiscarded {
        ticket: u64,
        succeeded: bool,
    },
    SessionFinished {
        images_loaded: u64,
        exports: u64,
        ai_edits_applied: u64,
        ai_edits_failed: u64,
    },
}

impl SessionEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SessionStarted { .. } => "session_started",
            Self::ImageLoaded { .. } => "image_loaded",
            Self::ImageClosed { .. } => "image_closed",
            Self::FiltersChanged { .. } => "filters_changed",
            Self::PresetApplied { .. } => "preset_applied",
            Self::FiltersReset => "filters_reset",
            Self::BakeFinished { .. } => "bake_finished",
            Self::ExportWritten { .. } => "export_written",
            Self::AiEditStarted { .. } => "ai_edit_started",
            Self::AiEditApplied { .. } => "ai_edit_applied",
            Self::AiEditFailed { .. } => "ai_edit_failed",
            Self::AiEditDiscarded { .. } => "ai_edit_discarded",
            Self::SessionFinished { .. } => "session_finished",
        }
    }
}

/// One line of `events.jsonl`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub session_id: String,
    pub ts: String,
    #[serde(flatten)]
    pub event: SessionEvent,
}

/// Append-only session journal, one compact JSON object per line.
///
/// The file is opened on the first record and kept open; parent
/// directories are created as needed.
#[derive(Debug)]
pub struct SessionJournal {
    path: PathBuf,
    session_id: String,
    file: Mutex<Option<File>>,
}

impl SessionJournal {
    pub fn new(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            session_id: session_id.into(),
            file: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn record(&self, event: SessionEvent) -> anyhow::Result<JournalEntry> {
        let entry = JournalEntry {
            session_id: self.session_id.clone(),
            ts: now_utc_iso(),
            event,
        };
        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');

        let mut file = self
            .file
            .lock()
            .map_err(|_| anyhow::anyhow!("session journal lock poisoned"))?;
        if file.is_none() {
            if let Some(parent) = self.path.parent() {
                fs::create_dir_all(parent)?;
            }
            *file = Some(
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&self.path)?,
            );
        }
        if let Some(handle) = file.as_mut() {
            handle.write_all(line.as_bytes())?;
            handle.flush()?;
        }
        Ok(entry)
    }
}

/// Reads a journal back, skipping blank lines.
pub fn read_journal(path: &Path) -> anyhow::Result<Vec<JournalEntry>> {
    let reader = BufReader::new(File::open(path)?);
    let mut entries = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let entry = serde_json::from_str(&line).map_err(|err| {
            anyhow::anyhow!("{} line {}: {err}", path.display(), idx + 1)
        })?;
        entries.push(entry);
    }
    Ok(entries)
}

pub fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}
