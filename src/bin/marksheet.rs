//! CLI binary for marksheet-extract.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ExtractionConfig` and prints JSON results.

use anyhow::{Context, Result};
use clap::Parser;
use marksheet_extract::{
    collect_tables, extract, extract_from_analysis_file, load_analysis, reconstruct_tables,
    ErrorKind, ErrorResponse, ExtractError, ExtractionConfig, PipelineProgressCallback,
    ProgressCallback, ReconstructedTable, Stage,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a spinner naming the running stage plus one
/// log line per finished stage. Identity and classification overlap, so the
/// spinner shows whichever started last.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<Stage, Instant>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(style);
        bar.set_prefix("Extracting");
        bar.set_message("starting…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
        })
    }
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: Stage) {
        if let Ok(mut times) = self.start_times.lock() {
            times.insert(stage, Instant::now());
        }
        self.bar.set_message(stage.to_string());
    }

    fn on_stage_complete(&self, stage: Stage) {
        let elapsed_ms = self
            .start_times
            .lock()
            .ok()
            .and_then(|mut times| times.remove(&stage))
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0);

        self.bar.println(format!(
            "  {} {:<32} {}",
            green("✓"),
            stage.to_string(),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
    }

    fn on_rejected(&self, kind: ErrorKind) {
        self.bar.finish_and_clear();
        eprintln!("{} {}", red("✘"), bold(&format!("{kind:?}")));
    }

    fn on_pipeline_complete(&self, marks: usize) {
        self.bar.finish_and_clear();
        eprintln!("{} {} marks extracted", green("✔"), bold(&marks.to_string()));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract from a local transcript
  marksheet transcript.pdf

  # Extract from a URL (the layout service fetches it directly)
  marksheet https://example.com/transcripts/jane-doe.pdf

  # Re-run the LLM stages on a saved layout analysis
  marksheet --analysis analysis.json

  # Show the reconstructed HTML tables only (no LLM key needed)
  marksheet --tables-only --analysis analysis.json

  # Use another provider for every task
  marksheet --provider anthropic --model claude-sonnet-4-20250514 transcript.pdf

OUTPUT:
  Success:  {"studentInformation": {...}, "marks": [{"subjectName": "...", "subjectGrade": "..."}]}
  Failure:  {"error": {"kind": "AmbiguousDocument", "message": "...", "retryable": false}}

EXIT CODES:
  0  marks extracted
  1  collaborator, input or configuration failure
  2  document rejected (AmbiguousDocument, UnsupportedLayout, ExtractionFailure)

ENVIRONMENT VARIABLES:
  AZURE_ENDPOINT          Layout service endpoint
  AZURE_KEY               Layout service subscription key
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID for every task
"#;

/// Extract student identity and subject grades from academic transcripts.
#[derive(Parser, Debug)]
#[command(
    name = "marksheet",
    version,
    about = "Extract student identity and subject grades from academic transcripts",
    long_about = "Extract the student's identity and per-subject grades from a transcript \
(PDF or image, local file or URL). Tables are rebuilt from a layout analysis and read by an LLM; \
documents with several marks tables or mixed grading scales are rejected rather than guessed.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local transcript file or HTTP/HTTPS URL.
    #[arg(required_unless_present = "analysis", conflicts_with = "analysis")]
    input: Option<String>,

    /// Use a saved layout analysis (JSON) instead of calling the layout service.
    #[arg(long, env = "MARKSHEET_ANALYSIS")]
    analysis: Option<PathBuf>,

    /// LLM model for table classification and marks extraction.
    #[arg(long, env = "MARKSHEET_MODEL", default_value = "gpt-4o")]
    model: String,

    /// LLM model for identity extraction.
    #[arg(long, env = "MARKSHEET_IDENTITY_MODEL", default_value = "gpt-4o-mini")]
    identity_model: String,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(
        long,
        env = "EDGEQUAKE_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set.\n\
          Supported: openai, anthropic, gemini, azure, ollama, or any OpenAI-compatible URL."
    )]
    provider: Option<String>,

    /// Layout service endpoint.
    #[arg(long, env = "AZURE_ENDPOINT")]
    azure_endpoint: Option<String>,

    /// Layout service subscription key.
    #[arg(long, env = "AZURE_KEY", hide_env_values = true)]
    azure_key: Option<String>,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "MARKSHEET_TEMPERATURE", default_value_t = 0.0)]
    temperature: f32,

    /// Retries per oracle call on transport failure or unparseable reply.
    #[arg(long, env = "MARKSHEET_MAX_RETRIES", default_value_t = 2)]
    max_retries: u32,

    /// Delay between layout-analysis polls in milliseconds.
    #[arg(long, env = "MARKSHEET_POLL_INTERVAL_MS", default_value_t = 1000)]
    poll_interval_ms: u64,

    /// Maximum layout-analysis polls before giving up.
    #[arg(long, env = "MARKSHEET_MAX_POLLS", default_value_t = 120)]
    max_polls: u32,

    /// Print the reconstructed tables and stop (no LLM calls).
    #[arg(long)]
    tables_only: bool,

    /// Single-line JSON instead of pretty-printed.
    #[arg(long)]
    compact: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "MARKSHEET_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "MARKSHEET_VERBOSE")]
    verbose: bool,

    /// Suppress all output except the JSON result.
    #[arg(short, long, env = "MARKSHEET_QUIET")]
    quiet: bool,
}

/// One table as printed by `--tables-only`.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TableSummary {
    index: usize,
    row_count: usize,
    col_count: usize,
    headers: Vec<String>,
    html: String,
}

impl TableSummary {
    fn from_table(index: usize, table: &ReconstructedTable) -> Self {
        Self {
            index,
            row_count: table.row_count(),
            col_count: table.col_count(),
            headers: table.header_texts(),
            html: table.html().to_string(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the spinner is active; the
    // spinner provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.tables_only;
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

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn PipelineProgressCallback>)
    } else {
        None
    };

    // ── Run ──────────────────────────────────────────────────────────────
    let outcome = match build_config(&cli, progress_cb) {
        Ok(config) if cli.tables_only => run_tables_only(&cli, &config).await,
        Ok(config) => run_extraction(&cli, &config).await,
        Err(e) => Err(e),
    };

    match outcome {
        Ok(value) => {
            print_json(&value, cli.compact)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            print_json(&serde_json::to_value(ErrorResponse::from(&e))?, cli.compact)?;
            if !cli.quiet {
                eprintln!("{} {}", red("Error:"), e);
            }
            Ok(if e.is_rejection() {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            })
        }
    }
}

async fn run_extraction(
    cli: &Cli,
    config: &ExtractionConfig,
) -> Result<serde_json::Value, ExtractError> {
    let result = match (&cli.analysis, &cli.input) {
        (Some(path), _) => extract_from_analysis_file(path, config).await?,
        (None, Some(input)) => extract(input, config).await?,
        (None, None) => {
            return Err(ExtractError::InvalidInput {
                input: String::new(),
            })
        }
    };
    serde_json::to_value(&result).map_err(|e| ExtractError::Internal(e.to_string()))
}

async fn run_tables_only(
    cli: &Cli,
    config: &ExtractionConfig,
) -> Result<serde_json::Value, ExtractError> {
    let tables = match (&cli.analysis, &cli.input) {
        (Some(path), _) => collect_tables(&load_analysis(path).await?),
        (None, Some(input)) => reconstruct_tables(input, config).await?,
        (None, None) => {
            return Err(ExtractError::InvalidInput {
                input: String::new(),
            })
        }
    };

    let summaries: Vec<TableSummary> = tables
        .iter()
        .enumerate()
        .map(|(i, t)| TableSummary::from_table(i, t))
        .collect();
    serde_json::to_value(&summaries).map_err(|e| ExtractError::Internal(e.to_string()))
}

fn print_json(value: &serde_json::Value, compact: bool) -> Result<()> {
    let json = if compact {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    }
    .context("Failed to serialise output")?;
    println!("{json}");
    Ok(())
}

/// Map CLI args to `ExtractionConfig`.
fn build_config(
    cli: &Cli,
    progress: Option<ProgressCallback>,
) -> Result<ExtractionConfig, ExtractError> {
    let mut builder = ExtractionConfig::builder()
        .model(&cli.model)
        .identity_model(&cli.identity_model)
        .temperature(cli.temperature)
        .max_retries(cli.max_retries)
        .poll_interval_ms(cli.poll_interval_ms)
        .max_polls(cli.max_polls);

    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref endpoint) = cli.azure_endpoint {
        builder = builder.analysis_endpoint(endpoint);
    }
    if let Some(ref key) = cli.azure_key {
        builder = builder.analysis_key(key);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build()
}
