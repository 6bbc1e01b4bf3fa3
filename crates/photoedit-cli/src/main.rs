use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use photoedit_contracts::chat::{parse_intent, Intent, CHAT_HELP_COMMANDS};
use photoedit_contracts::filters::{find_preset, Channel, FilterVector, PRESETS};
use photoedit_contracts::notices::NoticeLevel;
use photoedit_contracts::EditorResult;
use photoedit_engine::{EditOutcome, EditState, EditorConfig, EditorSession, SharedSession};
use serde_json::Value;

#[derive(Debug, Parser)]
#[command(name = "photoedit", version, about = "Photo filters and AI edits")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the filter presets.
    Presets,
    /// Print the CSS filter string for a vector.
    Css(CssArgs),
    /// Load an image, adjust it and export a PNG.
    Render(RenderArgs),
    /// Load, adjust, send the baked view to the AI provider and export.
    Edit(EditArgs),
    /// Interactive editing session.
    Chat(ChatArgs),
}

#[derive(Debug, Clone, Default, Args)]
struct FilterArgs {
    #[arg(long)]
    preset: Option<String>,
    #[arg(long)]
    brightness: Option<f64>,
    #[arg(long)]
    contrast: Option<f64>,
    #[arg(long)]
    saturation: Option<f64>,
    #[arg(long)]
    grayscale: Option<f64>,
    #[arg(long)]
    sepia: Option<f64>,
    #[arg(long)]
    blur: Option<f64>,
    #[arg(long = "hue-rotate")]
    hue_rotate: Option<f64>,
}

#[derive(Debug, Clone, Default, Args)]
struct SessionArgs {
    #[arg(long)]
    events: Option<PathBuf>,
    /// AI provider (`gemini` or `dryrun`).
    #[arg(long)]
    provider: Option<String>,
    #[arg(long)]
    model: Option<String>,
}

#[derive(Debug, Parser)]
struct CssArgs {
    #[command(flatten)]
    filters: FilterArgs,
}

#[derive(Debug, Parser)]
struct RenderArgs {
    #[arg(long)]
    input: PathBuf,
    #[arg(long)]
    out: PathBuf,
    #[command(flatten)]
    filters: FilterArgs,
    #[command(flatten)]
    session: SessionArgs,
}

#[derive(Debug, Parser)]
struct EditArgs {
    #[arg(long)]
    input: PathBuf,
    #[arg(long)]
    instruction: String,
    #[arg(long)]
    out: PathBuf,
    #[command(flatten)]
    filters: FilterArgs,
    #[command(flatten)]
    session: SessionArgs,
}

#[derive(Debug, Parser)]
struct ChatArgs {
    #[arg(long)]
    out: PathBuf,
    #[command(flatten)]
    session: SessionArgs,
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("photoedit error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Presets => {
            for line in preset_lines() {
                println!("{line}");
            }
            Ok(0)
        }
        Command::Css(args) => {
            println!("{}", args.filters.vector()?.chain().to_css());
            Ok(0)
        }
        Command::Render(args) => {
            let path = run_render(&args)?;
            println!("{}", path.display());
            Ok(0)
        }
        Command::Edit(args) => {
            let path = run_edit(&args)?;
            println!("{}", path.display());
            Ok(0)
        }
        Command::Chat(args) => {
            run_chat(&args)?;
            Ok(0)
        }
    }
}

impl FilterArgs {
    fn overrides(&self) -> Vec<(Channel, f64)> {
        [
            (Channel::Brightness, self.brightness),
            (Channel::Contrast, self.contrast),
            (Channel::Saturation, self.saturation),
            (Channel::Grayscale, self.grayscale),
            (Channel::Sepia, self.sepia),
            (Channel::Blur, self.blur),
            (Channel::HueRotate, self.hue_rotate),
        ]
        .into_iter()
        .filter_map(|(channel, value)| value.map(|value| (channel, value)))
        .collect()
    }

    /// The preset (if any) first, then the explicit channel values.
    fn vector(&self) -> Result<FilterVector> {
        let mut vector = FilterVector::identity();
        if let Some(name) = self.preset.as_deref() {
            vector = vector.with_preset(find_preset(name)?);
        }
        for (channel, value) in self.overrides() {
            vector = vector.with_channel(channel, value)?;
        }
        Ok(vector)
    }

    fn apply(&self, session: &mut EditorSession) -> Result<()> {
        if let Some(name) = self.preset.as_deref() {
            session.apply_preset(name)?;
        }
        for (channel, value) in self.overrides() {
            session.set_channel(channel, value)?;
        }
        Ok(())
    }
}

impl SessionArgs {
    fn config(&self) -> EditorConfig {
        let mut config = EditorConfig::from_env();
        if let Some(provider) = self.provider.as_deref() {
            config.provider = provider.trim().to_ascii_lowercase();
        }
        if let Some(model) = self.model.as_deref() {
            config.model = model.trim().to_string();
        }
        config
    }

    fn open(&self, default_events: Option<PathBuf>) -> Result<EditorSession> {
        let config = self.config();
        let events = self.events.clone().or(default_events);
        let mut session = EditorSession::new(config.clone(), events);
        session
            .set_provider(&config.provider)
            .with_context(|| format!("provider '{}' is not available", config.provider))?;
        Ok(session)
    }

    fn summary_path(&self, events: Option<&Path>) -> Option<PathBuf> {
        self.events
            .as_deref()
            .or(events)
            .map(|path| path.with_file_name("summary.json"))
    }
}

fn preset_lines() -> Vec<String> {
    PRESETS
        .iter()
        .map(|preset| {
            let overrides = preset
                .overrides()
                .iter()
                .map(|(channel, value)| format!("{channel}={value}{}", channel.unit()))
                .collect::<Vec<String>>()
                .join(" ");
            format!("{:<8} {overrides}", preset.name())
        })
        .collect()
}

fn run_render(args: &RenderArgs) -> Result<PathBuf> {
    let mut session = args.session.open(None)?;
    session
        .load_path(&args.input)
        .with_context(|| format!("failed to load {}", args.input.display()))?;
    args.filters.apply(&mut session)?;
    let path = session.export(&args.out).context("export failed")?;
    if let Some(summary_path) = args.session.summary_path(None) {
        session.finish(&summary_path)?;
    }
    Ok(path)
}

fn run_edit(args: &EditArgs) -> Result<PathBuf> {
    let mut session = args.session.open(None)?;
    session
        .load_path(&args.input)
        .with_context(|| format!("failed to load {}", args.input.display()))?;
    args.filters.apply(&mut session)?;
    match session.request_edit(&args.instruction)? {
        EditOutcome::Applied { width, height } => {
            eprintln!("AI edit applied ({width}x{height})");
        }
        EditOutcome::Discarded => bail!("AI edit result was discarded"),
    }
    let path = session.export(&args.out).context("export failed")?;
    if let Some(summary_path) = args.session.summary_path(None) {
        session.finish(&summary_path)?;
    }
    Ok(path)
}

fn run_chat(args: &ChatArgs) -> Result<()> {
    let events_path = args.out.join("events.jsonl");
    let session = args.session.open(Some(events_path.clone()))?;
    let shared = SharedSession::new(session);

    let stdin = io::stdin();
    let mut line = String::new();

    println!("photoedit chat started. Type /help for commands.");

    loop {
        print!("> ");
        io::stdout().flush()?;

        line.clear();
        let read = match stdin.read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }

        let intent = parse_intent(line.trim_end_matches(['\n', '\r']));
        if intent.action == "noop" {
            continue;
        }
        if intent.action == "quit" {
            break;
        }
        if intent.action == "ai_edit" {
            let instruction = intent.prompt.clone().unwrap_or_default();
            run_chat_edit(&shared, &instruction);
            continue;
        }

        let output = shared.with(|session| chat_command(session, &intent, &args.out));
        for message in output {
            println!("{message}");
        }
    }

    let summary_path = args
        .session
        .summary_path(Some(&events_path))
        .unwrap_or_else(|| args.out.join("summary.json"));
    shared.with(|session| session.finish(&summary_path))?;
    Ok(())
}

fn run_chat_edit(shared: &SharedSession, instruction: &str) {
    let outcome = match shared.spawn_edit(instruction) {
        Ok(handle) => {
            println!("AI edit in progress...");
            match handle.join() {
                Ok(result) => result,
                Err(_) => {
                    println!("[error] AI edit thread panicked");
                    return;
                }
            }
        }
        Err(err) => Err(err),
    };
    let messages = shared.with(|session| outcome_lines(session, outcome));
    for message in messages {
        println!("{message}");
    }
}

/// Runs one slash command and returns what to print.
fn chat_command(session: &mut EditorSession, intent: &Intent, out_dir: &Path) -> Vec<String> {
    let mut lines = Vec::new();
    let result: EditorResult<()> = match intent.action.as_str() {
        "help" => {
            lines.push(format!("Commands: {}", CHAT_HELP_COMMANDS.join(" ")));
            Ok(())
        }
        "list_presets" => {
            lines.extend(preset_lines());
            Ok(())
        }
        "load_image" => match intent.arg_str("path") {
            Some(path) => session.load_path(Path::new(path)).map(|(width, height)| {
                lines.push(format!("Loaded {path} ({width}x{height})"));
            }),
            None => {
                lines.push("/load requires a path".to_string());
                Ok(())
            }
        },
        "set_channel" => {
            let channel = intent.arg_str("channel").unwrap_or_default();
            match intent.arg_str("value").map(str::parse::<f64>) {
                Some(Ok(value)) => session
                    .set_channel_named(channel, value)
                    .map(|vector| lines.push(vector.chain().to_css())),
                _ => {
                    lines.push("/set requires a channel and a numeric value".to_string());
                    Ok(())
                }
            }
        }
        "apply_preset" => match intent.arg_str("name") {
            Some(name) => session
                .apply_preset(name)
                .map(|vector| lines.push(vector.chain().to_css())),
            None => {
                lines.push("/preset requires a name".to_string());
                Ok(())
            }
        },
        "reset_filters" => {
            lines.push(session.reset_filters().chain().to_css());
            Ok(())
        }
        "show_css" => session.preview().map(|frame| lines.push(frame.css_filter)),
        "show_state" => {
            lines.extend(state_lines(session));
            Ok(())
        }
        "export" => {
            let dir = intent
                .arg_str("path")
                .map(PathBuf::from)
                .unwrap_or_else(|| out_dir.to_path_buf());
            session
                .export(&dir)
                .map(|path| lines.push(format!("Exported {}", path.display())))
        }
        "set_provider" => match intent.arg_str("name") {
            Some(name) => session
                .set_provider(name)
                .map(|_| lines.push(format!("Provider set to {}", session.provider_name()))),
            None => {
                lines.push(format!("Providers: {}", session.provider_names().join(", ")));
                Ok(())
            }
        },
        "close_image" => {
            if session.close_image() {
                lines.push("Image closed".to_string());
            } else {
                lines.push("No image loaded".to_string());
            }
            Ok(())
        }
        "dismiss_notices" => {
            session.dismiss_notices();
            Ok(())
        }
        "unknown" => {
            let command = intent
                .command_args
                .get("command")
                .and_then(Value::as_str)
                .unwrap_or_default();
            lines.push(format!("Unknown command: /{command}"));
            Ok(())
        }
        other => {
            lines.push(format!("Unsupported action: {other}"));
            Ok(())
        }
    };
    lines.extend(outcome_lines(session, result));
    lines
}

/// Flushes pending notices; an error that produced none is printed as-is.
fn outcome_lines<T>(session: &mut EditorSession, result: EditorResult<T>) -> Vec<String> {
    let mut lines: Vec<String> = session
        .notices()
        .into_iter()
        .map(|notice| match notice.level {
            NoticeLevel::Success => format!("[ok] {}", notice.message),
            NoticeLevel::Error => format!("[error] {}", notice.message),
        })
        .collect();
    if let Err(err) = result {
        if lines.is_empty() {
            lines.push(format!("[error] {err}"));
        }
    }
    session.dismiss_notices();
    lines
}

fn state_lines(session: &EditorSession) -> Vec<String> {
    let mut lines = Vec::new();
    match session.image() {
        Some(image) => lines.push(format!(
            "Image: {}x{} {:?}",
            image.width(),
            image.height(),
            image.format()
        )),
        None => lines.push("Image: none".to_string()),
    }
    let filters = session.filters();
    for channel in Channel::ALL {
        lines.push(format!(
            "  {:<11} {}{}",
            channel.label(),
            filters.get(channel),
            channel.unit()
        ));
    }
    lines.push(format!("Provider: {}", session.provider_name()));
    let state = match session.edit_state() {
        EditState::Idle => "idle".to_string(),
        EditState::Submitting { ticket, .. } => format!("submitting (#{ticket})"),
        EditState::Failed { message, .. } => format!("failed: {message}"),
    };
    lines.push(format!("AI edit: {state}"));
    lines
}
