//! CLI binary for edgequake-quiz.
//!
//! A thin shim over the library crate that maps CLI flags to `QuizConfig`,
//! shows progress and prints or writes results.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use edgequake_quiz::{
    write_questions, AnswerRecord, ExamResult, ProgressCallback, QuizConfig, QuizProgressCallback,
    QuizSession, Source, SourceKind, StatusLevel, LIGHT_CHUNK_TOKENS,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
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
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress: a spinner while extracting, a bar while a stage
/// reports counts, and one log line per status notice above it.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        bar.set_prefix("Preparing");
        bar.set_message("Loading sources…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize, label: &str) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len}  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);
        self.bar.set_style(style);
        self.bar.set_length(total as u64);
        self.bar.set_position(0);
        self.bar.set_prefix(label.to_string());
        self.bar.reset_eta();
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl QuizProgressCallback for CliProgressCallback {
    fn on_status(&self, level: StatusLevel, message: String) {
        let line = match level {
            StatusLevel::Info => format!("  {} {}", green("✓"), message),
            StatusLevel::Warning => format!("  {} {}", yellow("⚠"), message),
            StatusLevel::Error => {
                self.errors.fetch_add(1, Ordering::SeqCst);
                format!("  {} {}", red("✗"), red(&message))
            }
        };
        self.bar.println(line);
    }

    fn on_progress(&self, completed: usize, total: usize, label: String) {
        if self.bar.length() != Some(total as u64) || self.bar.position() > completed as u64 {
            self.activate_bar(total, &label);
        }
        self.bar.set_position(completed as u64);
    }
}

const AFTER_HELP: &str = r#"SOURCES:
  Each source is KIND:REFERENCE, or a bare path/URL whose kind is inferred.
  Kinds: pdf docx pptx epub enex txt text url wiki youtube spotify
         image (png jpg jpeg) audio (mp3 wav) video (mp4)

EXAMPLES:
  # Quiz from a PDF, printed as JSON
  quizgen generate lecture.pdf

  # Several sources, French questions, written to a file
  quizgen generate notes.docx "wiki:Alan Turing" https://youtu.be/dQw4w9WgXcQ \
      --language French -o quiz.json

  # Quicker, denser variant with 2000-token chunks
  quizgen generate --light chapter.epub

  # Only extract text (no questions)
  quizgen extract podcast.mp3

  # Performance report from recorded answers
  quizgen report answers.json -o report.md

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY              Google Gemini API key (default provider)
  OPENAI_API_KEY              OpenAI API key
  ANTHROPIC_API_KEY           Anthropic API key
  EDGEQUAKE_LLM_PROVIDER      Override provider (gemini, openai, anthropic, ollama)
  EDGEQUAKE_MODEL             Override primary model ID
  EDGEQUAKE_ESCALATION_MODEL  Override escalation model ID
  SPOTIFY_CLIENT_ID           Spotify client id (spotify sources)
  SPOTIFY_CLIENT_SECRET       Spotify client secret (spotify sources)
  PDFIUM_LIB_PATH             Path to an existing libpdfium, skips auto-download

EXTERNAL TOOLS:
  ffmpeg / ffprobe            audio and video sources
  yt-dlp                      YouTube audio fallback, podcast matching
"#;

/// Generate verified multiple-choice quizzes from documents and media.
#[derive(Parser, Debug)]
#[command(
    name = "quizgen",
    version,
    about = "Generate verified multiple-choice quizzes from documents and media using LLMs",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract sources and generate a quiz.
    Generate {
        /// Sources as KIND:REFERENCE or a bare path/URL.
        #[arg(required = true)]
        sources: Vec<String>,

        /// Write questions JSON to this file instead of stdout.
        #[arg(short, long, env = "QUIZGEN_OUTPUT")]
        output: Option<PathBuf>,

        /// Use 2000-token chunks instead of 5000.
        #[arg(long, env = "QUIZGEN_LIGHT")]
        light: bool,

        /// Max tokens per chunk (overrides --light).
        #[arg(long, env = "QUIZGEN_CHUNK_TOKENS")]
        chunk_tokens: Option<usize>,

        /// Max chunks processed at once. Default: all.
        #[arg(short, long, env = "QUIZGEN_CONCURRENCY")]
        concurrency: Option<usize>,

        /// Keep the model's choice order.
        #[arg(long, env = "QUIZGEN_NO_SHUFFLE")]
        no_shuffle: bool,

        /// Print the full output (questions, sources, stats) instead of only
        /// the questions.
        #[arg(long, env = "QUIZGEN_JSON")]
        json: bool,
    },

    /// Extract one source and print its text.
    Extract {
        source: String,

        /// Print the extraction as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Build a performance report from recorded answers.
    Report {
        /// JSON file: an ExamResult, {"answers": [...]}, or an array of answers.
        answers: PathBuf,

        /// Write Markdown to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// Output language for questions and reports.
    #[arg(short, long, global = true, env = "QUIZGEN_LANGUAGE", default_value = "English")]
    language: String,

    /// Primary (small) model ID.
    #[arg(long, global = true, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// Escalation (large) model ID.
    #[arg(long, global = true, env = "EDGEQUAKE_ESCALATION_MODEL")]
    escalation_model: Option<String>,

    /// LLM provider: gemini, openai, anthropic, ollama.
    #[arg(long, global = true, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Per-call timeout for text prompts, in seconds.
    #[arg(long, global = true, env = "QUIZGEN_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// Per-call timeout for audio and image prompts, in seconds.
    #[arg(long, global = true, env = "QUIZGEN_MEDIA_TIMEOUT", default_value_t = 600)]
    media_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, global = true, env = "QUIZGEN_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Disable progress bar.
    #[arg(long, global = true, env = "QUIZGEN_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "QUIZGEN_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "QUIZGEN_QUIET")]
    quiet: bool,
}

/// Answer files come in three shapes.
#[derive(Deserialize)]
#[serde(untagged)]
enum AnswersFile {
    Exam(ExamResult),
    Wrapped { answers: Vec<AnswerRecord> },
    Bare(Vec<AnswerRecord>),
}

impl AnswersFile {
    fn into_result(self) -> ExamResult {
        match self {
            AnswersFile::Exam(result) => result,
            AnswersFile::Wrapped { answers } | AnswersFile::Bare(answers) => {
                ExamResult::from_answers(answers)
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let common = &cli.common;

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar already shows every status notice; keep library logs
    // to errors while it is active.
    let show_progress = !common.quiet && !common.no_progress;
    let filter = if common.verbose {
        "debug"
    } else if common.quiet || show_progress {
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

    let progress = if show_progress {
        Some(CliProgressCallback::new())
    } else {
        None
    };
    let callback = progress
        .clone()
        .map(|cb| cb as Arc<dyn QuizProgressCallback>);

    let result = run(&cli, callback).await;
    if let Some(ref cb) = progress {
        cb.finish();
        let errors = cb.errors.load(Ordering::SeqCst);
        if errors > 0 && !common.quiet {
            eprintln!("{} {} source error(s) reported", yellow("⚠"), errors);
        }
    }
    result
}

async fn run(cli: &Cli, progress: Option<ProgressCallback>) -> Result<()> {
    let common = &cli.common;
    match &cli.command {
        Command::Generate {
            sources,
            output,
            light,
            chunk_tokens,
            concurrency,
            no_shuffle,
            json,
        } => {
            let sources = parse_sources(sources)?;
            if sources.iter().any(|s| s.kind == SourceKind::Pdf) {
                ensure_pdfium(common.quiet)?;
            }
            let chunk_tokens = chunk_tokens.unwrap_or(if *light {
                LIGHT_CHUNK_TOKENS
            } else {
                edgequake_quiz::EXAM_CHUNK_TOKENS
            });
            let mut builder = base_config(common, progress)
                .chunk_tokens(chunk_tokens)
                .shuffle_choices(!no_shuffle);
            if let Some(n) = concurrency {
                builder = builder.generation_concurrency(*n);
            }
            let config = builder.build().context("Invalid configuration")?;
            let session = QuizSession::new(config).context("Failed to set up quiz session")?;
            let out = session
                .generate(&sources)
                .await
                .context("Quiz generation failed")?;

            if let Some(path) = output {
                write_questions(&out.questions, path)
                    .await
                    .context("Failed to write questions")?;
            } else if *json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&out).context("Failed to serialise output")?
                );
            } else {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({ "questions": out.questions }))
                        .context("Failed to serialise questions")?
                );
            }

            if !common.quiet {
                let s = &out.stats;
                eprintln!(
                    "{}  {} questions  {}/{} sources  {} chunks  {}ms{}",
                    green("✔"),
                    bold(&s.questions.to_string()),
                    s.sources_succeeded,
                    s.sources,
                    s.chunks,
                    s.total_duration_ms,
                    output
                        .as_ref()
                        .map(|p| format!("  →  {}", bold(&p.display().to_string())))
                        .unwrap_or_default(),
                );
                if s.rejected_questions > 0 || s.empty_chunks > 0 {
                    eprintln!(
                        "   {}",
                        dim(&format!(
                            "{} malformed question(s) dropped, {} chunk(s) without questions",
                            s.rejected_questions, s.empty_chunks
                        ))
                    );
                }
            }
        }

        Command::Extract { source, json } => {
            let source = parse_source(source)?;
            if source.kind == SourceKind::Pdf {
                ensure_pdfium(common.quiet)?;
            }
            let config = base_config(common, progress)
                .build()
                .context("Invalid configuration")?;
            let session = QuizSession::new(config).context("Failed to set up quiz session")?;
            let extraction = session.registry().extract(&source).await;
            if *json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&extraction)
                        .context("Failed to serialise extraction")?
                );
            } else {
                let stdout = io::stdout();
                let mut handle = stdout.lock();
                handle
                    .write_all(extraction.text.as_bytes())
                    .context("Failed to write to stdout")?;
                handle.write_all(b"\n").ok();
            }
            if !extraction.succeeded {
                let reason = extraction
                    .error
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "unknown error".into());
                anyhow::bail!("Extraction failed: {reason}");
            }
        }

        Command::Report { answers, output } => {
            let raw = tokio::fs::read_to_string(answers)
                .await
                .with_context(|| format!("Failed to read answers from {:?}", answers))?;
            let file: AnswersFile =
                serde_json::from_str(&raw).context("Answers file is not valid JSON")?;
            let result = file.into_result();

            let config = base_config(common, progress)
                .build()
                .context("Invalid configuration")?;
            let session = QuizSession::new(config).context("Failed to set up quiz session")?;
            let report = session.report(&result).await.context("Report failed")?;

            match output {
                Some(path) => tokio::fs::write(path, &report.markdown)
                    .await
                    .with_context(|| format!("Failed to write report to {:?}", path))?,
                None => println!("{}", report.markdown),
            }
        }
    }
    Ok(())
}

/// Map shared CLI args onto the config builder.
fn base_config(
    common: &CommonArgs,
    progress: Option<ProgressCallback>,
) -> edgequake_quiz::QuizConfigBuilder {
    let mut builder = QuizConfig::builder()
        .language(common.language.clone())
        .api_timeout_secs(common.api_timeout)
        .media_timeout_secs(common.media_timeout)
        .download_timeout_secs(common.download_timeout);
    if let Some(ref p) = common.provider {
        builder = builder.provider_name(p.clone());
    }
    if let Some(ref m) = common.model {
        builder = builder.model(m.clone());
    }
    if let Some(ref m) = common.escalation_model {
        builder = builder.escalation_model(m.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }
    builder
}

fn parse_source(s: &str) -> Result<Source> {
    s.parse::<Source>()
        .with_context(|| format!("Invalid source '{s}'"))
}

fn parse_sources(raw: &[String]) -> Result<Vec<Source>> {
    raw.iter().map(|s| parse_source(s)).collect()
}

/// Make sure the pdfium shared library is present, downloading it with a
/// progress bar on first use.
fn ensure_pdfium(quiet: bool) -> Result<()> {
    if pdfium_auto::is_pdfium_cached() {
        return Ok(());
    }
    if quiet {
        tokio::task::block_in_place(|| pdfium_auto::ensure_pdfium_library(None))
            .context("Failed to download PDFium engine")?;
        return Ok(());
    }

    let dl_bar = ProgressBar::new(0);
    dl_bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {bytes}/{total_bytes}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS),
    );
    dl_bar.set_prefix("PDF engine");
    dl_bar.set_message("Connecting…");
    dl_bar.enable_steady_tick(Duration::from_millis(80));

    let bar = dl_bar.clone();
    tokio::task::block_in_place(|| {
        pdfium_auto::ensure_pdfium_library(Some(&|downloaded, total| {
            if let Some(t) = total {
                if bar.length().unwrap_or(0) != t {
                    bar.set_length(t);
                }
            }
            bar.set_position(downloaded);
        }))
    })
    .context("Failed to download PDFium engine")?;

    dl_bar.finish_with_message("ready ✓");
    Ok(())
}
