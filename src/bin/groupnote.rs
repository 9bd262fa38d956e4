//! CLI binary for groupnote-upload.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `UploadConfig`, feeds files through an `EditingContext` and prints
//! results.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use groupnote_upload::pipeline::chunk::total_chunks;
use groupnote_upload::{
    classify, generate_thumbnail, load_pending_files, submit_note, EditingContext, NoteDraft,
    NoteResponse, Notice, NoticeLevel, PendingFile, ProgressCallback, UploadConfig, UploadLimits,
    UploadProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar per chunked file, notices printed
/// above it. With the bar hidden, notices go straight to stderr.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new(show_bar: bool) -> Arc<Self> {
        let bar = if show_bar {
            let bar = ProgressBar::new(0);
            bar.set_style(
                ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner())
                    .tick_strings(TICKS),
            );
            bar.set_prefix("Preparing");
            bar.enable_steady_tick(Duration::from_millis(80));
            bar
        } else {
            ProgressBar::hidden()
        };
        Arc::new(Self { bar })
    }

    fn line(&self, text: String) {
        if self.bar.is_hidden() {
            eprintln!("{text}");
        } else {
            self.bar.println(text);
        }
    }
}

impl UploadProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, chunked_files: usize, bundled_files: usize) {
        self.bar.set_message(format!(
            "{chunked_files} chunked, {bundled_files} bundled"
        ));
    }

    fn on_file_start(&self, file_name: &str, total_chunks: u32, file_size: u64) {
        self.bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  \
                 [{bar:42.green/238}] {pos:>3}/{len} chunks  ⏱ {elapsed_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(TICKS),
        );
        self.bar.set_length(u64::from(total_chunks));
        self.bar.set_position(0);
        self.bar.set_prefix(file_name.to_string());
        self.bar.set_message(format!("{file_size} bytes"));
    }

    fn on_chunk_uploaded(&self, _file_name: &str, _index: u32, _total: u32) {
        self.bar.inc(1);
    }

    fn on_file_merged(&self, file_name: &str) {
        self.line(format!("  {} {}  {}", green("✓"), file_name, dim("merged")));
    }

    fn on_batch_complete(&self, _uploaded_chunks: usize, _bundled_files: usize) {
        self.bar.set_prefix("Saving");
        self.bar.set_message("note…");
    }

    fn on_notice(&self, notice: &Notice) {
        match notice.level {
            NoticeLevel::Info => self.line(format!("{} {}", cyan("◆"), notice.message)),
            NoticeLevel::Success => {
                self.bar.finish_and_clear();
                eprintln!("{} {}", green("✔"), bold(&notice.message));
            }
            NoticeLevel::Error => {
                self.bar.finish_and_clear();
                eprintln!("{} {}", red("✘"), notice.message);
            }
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # New note with two photos in group 3
  groupnote create --group 3 --date 2026-10-19 -m "Trip photos" a.jpg b.jpg

  # Edit note 42: keep existing images 7 and 9, add one more
  groupnote update 42 --group 3 --date 2026-10-19 --keep-image 7 --keep-image 9 c.png

  # Show how files would be sent, without contacting the server
  groupnote plan *.jpg

  # Write the preview the form would show
  groupnote thumbnail photo.jpg -o photo.thumb.jpg

UPLOAD ROUTING:
  A file is uploaded in 4 MiB chunks when it is larger than 5 MiB, or when
  adding it to the note request would push the request past 10 MiB.
  Everything else is attached to the note request directly.

ENVIRONMENT VARIABLES:
  GROUPNOTE_SERVER   Base URL of the notes server
  GROUPNOTE_COOKIE   Session cookie sent with every request
  RUST_LOG           Override the log filter
"#;

/// Upload notes and their attachments to a group-notes server.
#[derive(Parser, Debug)]
#[command(
    name = "groupnote",
    version,
    about = "Upload notes and attachments to a group-notes server",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Base URL of the notes server.
    #[arg(
        long,
        global = true,
        env = "GROUPNOTE_SERVER",
        default_value = groupnote_upload::config::DEFAULT_BASE_URL
    )]
    server: String,

    /// Session cookie (e.g. "session=…").
    #[arg(long, global = true, env = "GROUPNOTE_COOKIE", hide_env_values = true)]
    cookie: Option<String>,

    /// Per-request timeout in seconds. Default: none.
    #[arg(long, global = true, env = "GROUPNOTE_TIMEOUT")]
    timeout: Option<u64>,

    /// Chunk size in bytes.
    #[arg(long, global = true, env = "GROUPNOTE_CHUNK_SIZE",
          default_value_t = groupnote_upload::config::DEFAULT_CHUNK_SIZE)]
    chunk_size: u64,

    /// Files larger than this many bytes are always chunked.
    #[arg(long, global = true, env = "GROUPNOTE_CHUNK_THRESHOLD",
          default_value_t = groupnote_upload::config::DEFAULT_CHUNK_THRESHOLD)]
    chunk_threshold: u64,

    /// Maximum bytes attached directly to the note request.
    #[arg(long, global = true, env = "GROUPNOTE_BATCH_CEILING",
          default_value_t = groupnote_upload::config::DEFAULT_BATCH_CEILING)]
    batch_ceiling: u64,

    /// Output structured JSON instead of text.
    #[arg(long, global = true, env = "GROUPNOTE_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, global = true, env = "GROUPNOTE_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "GROUPNOTE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "GROUPNOTE_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a new note.
    Create {
        #[command(flatten)]
        note: NoteArgs,
    },

    /// Update an existing note.
    Update {
        /// Id of the note to update.
        note_id: i64,

        /// Existing image id to keep (repeatable). Images not listed are removed.
        #[arg(long = "keep-image", value_name = "ID")]
        keep_images: Vec<i64>,

        #[command(flatten)]
        note: NoteArgs,
    },

    /// Show how files would be uploaded. Sends nothing.
    Plan {
        /// Files to classify.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Write the preview thumbnail for an image.
    Thumbnail {
        /// Image to preview.
        input: PathBuf,

        /// Where to write the thumbnail.
        #[arg(short, long)]
        output: PathBuf,

        /// Longest edge in pixels.
        #[arg(long, default_value_t = groupnote_upload::config::DEFAULT_THUMBNAIL_MAX_EDGE,
              value_parser = clap::value_parser!(u32).range(1..))]
        max_edge: u32,

        /// JPEG quality (1–100).
        #[arg(long, default_value_t = groupnote_upload::config::DEFAULT_THUMBNAIL_QUALITY,
              value_parser = clap::value_parser!(u8).range(1..=100))]
        quality: u8,
    },
}

#[derive(Args, Debug)]
struct NoteArgs {
    /// Note text.
    #[arg(short = 'm', long, default_value = "")]
    content: String,

    /// Note date (YYYY-MM-DD).
    #[arg(long)]
    date: String,

    /// Group to file the note under.
    #[arg(short, long)]
    group: Option<i64>,

    /// Files to attach.
    files: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar gives all the feedback that matters; keep library
    // INFO logs out of its way unless asked for.
    let show_progress = show_bar(&cli);
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Create { ref note } => {
            let ctx = EditingContext::create();
            let response = run_note(&cli, ctx, note).await?;
            report(&cli, "Created", &response)?;
        }
        Command::Update {
            note_id,
            ref keep_images,
            ref note,
        } => {
            let ctx = EditingContext::edit(note_id, keep_images.iter().copied());
            let response = run_note(&cli, ctx, note).await?;
            report(&cli, "Updated", &response)?;
        }
        Command::Plan { ref files } => {
            let files = load_pending_files(files).await.context("Failed to read input")?;
            print_plan(&cli, &files)?;
        }
        Command::Thumbnail {
            ref input,
            ref output,
            max_edge,
            quality,
        } => {
            let file = groupnote_upload::load_pending_file(input)
                .await
                .context("Failed to read input")?;
            if !file.is_image() {
                anyhow::bail!("'{}' is not an image ({})", file.name(), file.mime_type());
            }
            let thumb = generate_thumbnail(&file, max_edge, quality)
                .await
                .context("Thumbnail generation failed")?;
            tokio::fs::write(output, &thumb.bytes)
                .await
                .with_context(|| format!("Failed to write {:?}", output))?;

            if cli.json {
                println!(
                    "{}",
                    serde_json::json!({
                        "output": output,
                        "width": thumb.width,
                        "height": thumb.height,
                        "mime_type": thumb.mime_type,
                        "bytes": thumb.bytes.len(),
                    })
                );
            } else if !cli.quiet {
                eprintln!(
                    "{} {}x{}  {}  →  {}",
                    green("✔"),
                    thumb.width,
                    thumb.height,
                    dim(&format!("{} bytes", thumb.bytes.len())),
                    bold(&output.display().to_string()),
                );
            }
        }
    }

    Ok(())
}

/// Map CLI args to `UploadConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<UploadConfig> {
    let mut builder = UploadConfig::builder()
        .base_url(&cli.server)
        .chunk_size(cli.chunk_size)
        .chunk_threshold(cli.chunk_threshold)
        .batch_ceiling(cli.batch_ceiling);

    if let Some(ref cookie) = cli.cookie {
        builder = builder.cookie(cookie);
    }
    if let Some(secs) = cli.timeout {
        builder = builder.request_timeout_secs(secs);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Load files into `ctx` and submit the note.
async fn run_note(cli: &Cli, mut ctx: EditingContext, note: &NoteArgs) -> Result<NoteResponse> {
    let progress: Option<ProgressCallback> = if cli.quiet || cli.json {
        None
    } else {
        Some(CliProgressCallback::new(show_bar(cli)) as Arc<dyn UploadProgressCallback>)
    };
    let config = build_config(cli, progress)?;

    let files = load_pending_files(&note.files)
        .await
        .context("Failed to read input")?;
    let change = ctx.add_files(files, &config).await;
    if !change.duplicates.is_empty() && !cli.quiet {
        eprintln!(
            "{} skipped duplicate file(s): {}",
            cyan("⚠"),
            change.duplicates.join(", ")
        );
    }

    let draft = NoteDraft {
        content: note.content.clone(),
        date: note.date.clone(),
        group_id: note.group,
    };
    submit_note(&mut ctx, &draft, &config)
        .await
        .context("Note upload failed")
}

fn show_bar(cli: &Cli) -> bool {
    !cli.quiet && !cli.no_progress && !cli.json
}

fn report(cli: &Cli, verb: &str, response: &NoteResponse) -> Result<()> {
    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(response).context("Failed to serialise response")?
        );
    } else if !cli.quiet {
        let id = response
            .id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "?".into());
        eprintln!("{} note {}", verb, bold(&id));
    }
    Ok(())
}

fn print_plan(cli: &Cli, files: &[PendingFile]) -> Result<()> {
    let config = build_config(cli, None)?;
    let plan = classify(files, &UploadLimits::from(&config));
    let chunks = |f: &PendingFile| total_chunks(f.size(), config.chunk_size);

    if cli.json {
        let chunked: Vec<_> = plan
            .chunked
            .iter()
            .map(|f| serde_json::json!({ "name": f.name(), "size": f.size(), "chunks": chunks(f) }))
            .collect();
        let bundled: Vec<_> = plan
            .bundled
            .iter()
            .map(|f| serde_json::json!({ "name": f.name(), "size": f.size() }))
            .collect();
        let value = serde_json::json!({
            "chunked": chunked,
            "bundled": bundled,
            "bundled_bytes": plan.bundled_bytes,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&value).context("Failed to serialise plan")?
        );
        return Ok(());
    }

    for f in &plan.chunked {
        println!(
            "chunked  {:<40} {:>12}  {}",
            f.name(),
            f.size(),
            dim(&format!("{} chunks", chunks(f)))
        );
    }
    for f in &plan.bundled {
        println!("bundled  {:<40} {:>12}", f.name(), f.size());
    }
    if !cli.quiet {
        eprintln!(
            "{} chunked, {} bundled ({} bytes in the note request)",
            plan.chunked.len(),
            plan.bundled.len(),
            plan.bundled_bytes
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn thumbnail_args(max_edge: &str) -> [&str; 7] {
        ["groupnote", "thumbnail", "in.jpg", "-o", "out.jpg", "--max-edge", max_edge]
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn thumbnail_rejects_zero_max_edge() {
        assert!(Cli::try_parse_from(thumbnail_args("0")).is_err());
    }

    #[test]
    fn thumbnail_accepts_positive_max_edge() {
        let cli = Cli::try_parse_from(thumbnail_args("1")).unwrap();
        match cli.command {
            Command::Thumbnail { max_edge, .. } => assert_eq!(max_edge, 1),
            other => panic!("unexpected command {other:?}"),
        }
    }
}
