//! # edgequake-license2table
//!
//! Extract driving-licence fields from scanned images into a table using
//! Vision Language Models (VLMs).
//!
//! Every PNG or JPEG in a directory is sent to a VLM with a fixed
//! instruction. The model answers with four `label: value` lines, which are
//! parsed into one row of a table with the columns
//! `名前, 住所, 電話番号, 免許証番号, ファイル名`. A field the model cannot read
//! becomes the sentinel [`NO_DATA`] (`記載なし`). One bad image never stops the
//! batch: it turns into an all-sentinel row and the error is reported next to it.
//!
//! ## Pipeline Overview
//!
//! ```text
//! directory
//!  │
//!  ├─ 1. Input    list *.png / *.jpg / *.jpeg, sorted by file name
//!  ├─ 2. Encode   sniff PNG/JPEG, bytes → base64
//!  ├─ 3. Prompt   system role + instruction + image
//!  ├─ 4. VLM      concurrent calls with retry/backoff and an optional deadline
//!  ├─ 5. Parse    clean the answer, map labels onto fields
//!  └─ 6. Output   rows in enumeration order → CSV / JSON
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_license2table::{extract_directory, ExtractionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ExtractionConfig::builder()
//!         .api_key(std::env::var("OPENAI_API_KEY")?)
//!         .build()?;
//!     let output = extract_directory("scans/", &config).await?;
//!     print!("{}", output.table.to_csv_string()?);
//!     eprintln!("{}/{} files extracted",
//!         output.stats.succeeded_files,
//!         output.stats.total_files);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `license2table` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-license2table = { version = "0.1", default-features = false }
//! ```
//!
//! ## Backends
//!
//! The default backend is [`ProviderClient::openai`]: edgequake-llm's OpenAI
//! provider, given its API key explicitly and pointed at OpenAI or any
//! OpenAI-compatible endpoint. Set `provider_name` to another edgequake-llm
//! provider (`anthropic`, `gemini`, …) to build it through
//! [`ProviderClient::from_factory`] instead, or hand in your own [`ModelClient`].

// ── Modules ──────────────────────────────────────────────────────────────

pub mod client;
pub mod config;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod record;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use client::{CompletionSettings, ExtractionResponse, ModelClient, ProviderClient};
pub use config::{ExtractionConfig, ExtractionConfigBuilder, ImageDetail};
pub use error::{ExtractError, FileError, ModelError, ParseError};
pub use extract::{extract_directory, extract_sync, extract_to_file, run_batch, write_table};
pub use output::{
    aggregate, ExtractionOutput, ExtractionStats, FileOutcome, OutputFormat, ResultTable,
    TableRow, COLUMNS,
};
pub use pipeline::parse::{ParseOptions, UnknownLabelPolicy};
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use record::{Field, FieldRecord, NO_DATA};
pub use stream::{extract_stream, FileStream};
