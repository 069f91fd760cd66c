//! End-to-end tests for edgequake-license2table.
//!
//! These tests send real licence scans to a live vision model. They are
//! gated behind the `E2E_ENABLED` environment variable so they do not run in
//! CI unless explicitly requested, and need:
//!
//! * `OPENAI_API_KEY`: key for the OpenAI-compatible client
//! * `E2E_IMAGE_DIR`: directory of licence scans (default `./test_cases`)
//! * `E2E_MODEL`: optional model override
//!
//! Run with:
//!   E2E_ENABLED=1 cargo test --test e2e -- --nocapture

use edgequake_license2table::{
    extract_directory, extract_to_file, ExtractionConfig, Field, OutputFormat, COLUMNS, NO_DATA,
};
use std::path::PathBuf;
use std::time::Duration;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn image_dir() -> PathBuf {
    std::env::var("E2E_IMAGE_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases"))
}

fn output_dir() -> PathBuf {
    let d = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases/output");
    std::fs::create_dir_all(&d).ok();
    d
}

/// Skip this test unless E2E_ENABLED and a key are set and images exist.
macro_rules! e2e_skip_unless_ready {
    () => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        let Ok(key) = std::env::var("OPENAI_API_KEY") else {
            println!("SKIP — OPENAI_API_KEY not set");
            return;
        };
        let dir = image_dir();
        if !dir.is_dir() {
            println!("SKIP — image directory not found: {}", dir.display());
            return;
        }
        (dir, key)
    }};
}

/// Route library logs to the test output; `RUST_LOG=debug` shows each call.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn live_config(key: String) -> ExtractionConfig {
    init_tracing();
    let mut builder = ExtractionConfig::builder()
        .api_key(key)
        .concurrency(2)
        .deadline(Duration::from_secs(600));
    if let Ok(model) = std::env::var("E2E_MODEL") {
        builder = builder.model(model);
    }
    builder.build().unwrap()
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_extract_directory() {
    let (dir, key) = e2e_skip_unless_ready!();
    let config = live_config(key);

    let output = extract_directory(&dir, &config).await.unwrap();
    println!(
        "{}/{} files, {} in / {} out tokens, {}ms",
        output.stats.succeeded_files,
        output.stats.total_files,
        output.stats.total_input_tokens,
        output.stats.total_output_tokens,
        output.stats.total_duration_ms
    );
    print!("{}", output.table.to_csv_string().unwrap());

    assert_eq!(output.table.len(), output.stats.total_files);
    for row in &output.table {
        assert!(!row.file_name().is_empty());
        if let Some(ref e) = row.error {
            println!("failed: {} ({e})", row.file_name());
            continue;
        }
        // A readable licence always has a name and a number.
        assert_ne!(row.value(Field::Name), NO_DATA, "{}", row.file_name());
        assert_ne!(row.value(Field::LicenseNumber), NO_DATA, "{}", row.file_name());
    }
}

#[tokio::test]
async fn e2e_extract_to_csv_file() {
    let (dir, key) = e2e_skip_unless_ready!();
    let config = live_config(key);
    let path = output_dir().join("licences.csv");

    let stats = extract_to_file(&dir, &path, OutputFormat::Csv, &config)
        .await
        .unwrap();

    let csv = std::fs::read_to_string(&path).unwrap();
    let mut lines = csv.lines();
    assert_eq!(lines.next(), Some(COLUMNS.join(",").as_str()));
    assert_eq!(lines.count(), stats.total_files);
}
