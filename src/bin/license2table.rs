//! CLI binary for edgequake-license2table.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ExtractionConfig` and prints the table.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_license2table::{
    extract_directory, write_table, ExtractionConfig, ExtractionProgressCallback,
    ExtractionStats, ImageDetail, OutputFormat, ProgressCallback, TableRow, UnknownLabelPolicy,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;
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
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

/// Shorten `s` to at most `max` characters, on a char boundary.
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('\u{2026}');
    out
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live bar plus one log line per file.
/// Files finish out of order when concurrency > 1.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Per-file start times, keyed by enumeration index.
    start_times: Mutex<HashMap<usize, Instant>>,
}

impl CliProgressCallback {
    /// The bar starts as a spinner; `on_batch_start` sets its length.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Listing images…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} files  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Extracting");
        self.bar.reset_eta();
    }

    fn elapsed_secs(&self, index: usize) -> f64 {
        self.start_times
            .lock()
            .unwrap()
            .remove(&index)
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_files: usize) {
        self.activate_bar(total_files);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Extracting {total_files} licence images…"))
        ));
    }

    fn on_file_start(&self, index: usize, file_name: &str, _total: usize) {
        self.start_times
            .lock()
            .unwrap()
            .insert(index, Instant::now());
        self.bar.set_message(file_name.to_string());
    }

    fn on_file_complete(&self, index: usize, file_name: &str, total: usize) {
        let secs = self.elapsed_secs(index);
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}",
            green("✓"),
            index + 1,
            total,
            file_name,
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_file_error(&self, index: usize, file_name: &str, total: usize, error: &str) {
        let secs = self.elapsed_secs(index);
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}  {}",
            red("✗"),
            index + 1,
            total,
            file_name,
            red(&truncate(error, 80)),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total_files: usize, success_count: usize) {
        let failed = total_files.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} files extracted successfully",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} files extracted  ({} failed)",
                if failed == total_files {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&success_count.to_string()),
                total_files,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # CSV to stdout
  license2table scans/

  # Write a CSV file
  license2table scans/ -o licences.csv

  # JSON, with an error column on failed rows
  license2table scans/ --format json -o licences.json

  # Bound the whole run to five minutes
  license2table scans/ --deadline 300 -o licences.csv

  # A local OpenAI-compatible server
  license2table scans/ --base-url http://localhost:8000/v1 --model qwen2-vl --api-key none

  # Another edgequake-llm provider (reads its own key from the environment)
  license2table scans/ --provider anthropic --model claude-sonnet-4-20250514

OUTPUT:
  One row per PNG/JPEG file, in file-name order, with the columns
    名前, 住所, 電話番号, 免許証番号, ファイル名
  Fields the model could not read are written as 記載なし. Files that
  failed are written as all-記載なし rows and listed on stderr.

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          API key for the OpenAI-compatible client
  LICENSE2TABLE_MODEL     Override model ID
  LICENSE2TABLE_PROVIDER  Provider (openai, anthropic, gemini, ollama, …)
  RUST_LOG                Log filter, overrides --verbose / --quiet
"#;

/// Extract driving-licence fields from scanned images into a table.
#[derive(Parser, Debug)]
#[command(
    name = "license2table",
    version,
    about = "Extract driving-licence fields from scanned images into a table using Vision LLMs",
    long_about = "Send every PNG/JPEG image in a directory to a Vision Language Model, read \
the name, address, phone number and licence number off each licence, and write one table \
row per image as CSV or JSON.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Directory containing the licence images.
    input: PathBuf,

    /// Write the table to this file instead of stdout.
    #[arg(short, long, env = "LICENSE2TABLE_OUTPUT")]
    output: Option<PathBuf>,

    /// Output format.
    #[arg(long, env = "LICENSE2TABLE_FORMAT", value_enum, default_value = "csv")]
    format: FormatArg,

    /// Vision model ID. Default: gpt-4o.
    #[arg(long, env = "LICENSE2TABLE_MODEL")]
    model: Option<String>,

    /// Provider: openai (built-in client) or any edgequake-llm provider.
    #[arg(long, env = "LICENSE2TABLE_PROVIDER")]
    provider: Option<String>,

    /// API key for the OpenAI-compatible client.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Base URL of an OpenAI-compatible API.
    #[arg(long, env = "LICENSE2TABLE_BASE_URL")]
    base_url: Option<String>,

    /// Number of images processed at the same time.
    #[arg(short, long, env = "LICENSE2TABLE_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Retries per image on transient model failures.
    #[arg(long, env = "LICENSE2TABLE_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Per-call model timeout in seconds.
    #[arg(long, env = "LICENSE2TABLE_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Wall-clock budget for the whole run, in seconds.
    #[arg(long, env = "LICENSE2TABLE_DEADLINE")]
    deadline: Option<u64>,

    /// Max model output tokens per image.
    #[arg(long, env = "LICENSE2TABLE_MAX_TOKENS", default_value_t = 1024)]
    max_tokens: usize,

    /// Model temperature (0.0–2.0).
    #[arg(long, env = "LICENSE2TABLE_TEMPERATURE", default_value_t = 0.0)]
    temperature: f32,

    /// Path to a text file replacing the default extraction instruction.
    #[arg(long, env = "LICENSE2TABLE_INSTRUCTION")]
    instruction: Option<PathBuf>,

    /// What to do with labels outside the four known fields.
    #[arg(long, value_enum, default_value = "drop")]
    unknown_labels: UnknownLabelsArg,

    /// Fold full-width letters and digits in values to half-width.
    #[arg(long)]
    normalize_width: bool,

    /// Image detail hint for OpenAI-style APIs.
    #[arg(long, value_enum, default_value = "high")]
    image_detail: DetailArg,

    /// Exit with an error if any image failed.
    #[arg(long)]
    strict: bool,

    /// Disable progress bar.
    #[arg(long, env = "LICENSE2TABLE_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "LICENSE2TABLE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "LICENSE2TABLE_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Csv,
    Json,
}

impl From<FormatArg> for OutputFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Csv => OutputFormat::Csv,
            FormatArg::Json => OutputFormat::Json,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum UnknownLabelsArg {
    Drop,
    Keep,
    Reject,
}

impl From<UnknownLabelsArg> for UnknownLabelPolicy {
    fn from(v: UnknownLabelsArg) -> Self {
        match v {
            UnknownLabelsArg::Drop => UnknownLabelPolicy::Drop,
            UnknownLabelsArg::Keep => UnknownLabelPolicy::Keep,
            UnknownLabelsArg::Reject => UnknownLabelPolicy::Reject,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum DetailArg {
    Low,
    High,
    Auto,
}

impl From<DetailArg> for ImageDetail {
    fn from(v: DetailArg) -> Self {
        match v {
            DetailArg::Low => ImageDetail::Low,
            DetailArg::High => ImageDetail::High,
            DetailArg::Auto => ImageDetail::Auto,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs; --verbose brings them all back.
    let show_progress = !cli.quiet && !cli.no_progress;
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

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn ExtractionProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb).await?;
    let format = OutputFormat::from(cli.format);

    // ── Run extraction ───────────────────────────────────────────────────
    let output = extract_directory(&cli.input, &config)
        .await
        .context("Extraction failed")?;

    if let Some(ref output_path) = cli.output {
        write_table(&output.table, output_path, format)
            .await
            .context("Failed to write table")?;
        if !cli.quiet {
            eprintln!(
                "{}  {}/{} files  {}ms  →  {}",
                if output.stats.failed_files == 0 {
                    green("✔")
                } else {
                    cyan("⚠")
                },
                output.stats.succeeded_files,
                output.stats.total_files,
                output.stats.total_duration_ms,
                bold(&output_path.display().to_string()),
            );
        }
    } else {
        let rendered = output
            .table
            .render(format)
            .context("Failed to render table")?;
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(rendered.as_bytes())
            .context("Failed to write to stdout")?;
        if !rendered.ends_with('\n') {
            handle.write_all(b"\n").ok();
        }
    }

    if !cli.quiet {
        let failed_rows: Vec<&TableRow> = output.table.failed_rows().collect();
        print_summary(&output.stats, &failed_rows, show_progress);
    }

    if cli.strict {
        output.into_result()?;
    }

    Ok(())
}

fn print_summary(stats: &ExtractionStats, failed_rows: &[&TableRow], show_progress: bool) {
    if !show_progress {
        eprintln!(
            "Extracted {}/{} files in {}ms",
            stats.succeeded_files, stats.total_files, stats.total_duration_ms
        );
    }
    if stats.timed_out_files > 0 {
        eprintln!(
            "  {} files not finished before the deadline",
            red(&stats.timed_out_files.to_string())
        );
    }
    if !failed_rows.is_empty() {
        eprintln!("{}", bold("Failed files (rows written as 記載なし):"));
        for row in failed_rows {
            let reason = row.error.as_ref().map(|e| e.to_string()).unwrap_or_default();
            eprintln!("  {} {}  {}", red("✗"), row.file_name(), dim(&truncate(&reason, 100)));
        }
    }
    eprintln!(
        "   {} tokens in  /  {} tokens out",
        dim(&stats.total_input_tokens.to_string()),
        dim(&stats.total_output_tokens.to_string()),
    );
}

/// Map CLI args to `ExtractionConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .concurrency(cli.concurrency)
        .max_retries(cli.max_retries)
        .api_timeout_secs(cli.api_timeout)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .unknown_labels(cli.unknown_labels.into())
        .normalize_width(cli.normalize_width)
        .image_detail(cli.image_detail.into());

    if let Some(ref path) = cli.instruction {
        let instruction = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read instruction from {:?}", path))?;
        builder = builder.instruction(instruction);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key);
    }
    if let Some(ref url) = cli.base_url {
        builder = builder.base_url(url);
    }
    if let Some(secs) = cli.deadline {
        builder = builder.deadline(Duration::from_secs(secs));
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
