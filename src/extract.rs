//! Eager (whole-batch) extraction entry points.
//!
//! These functions wait for every file, then return the complete
//! [`crate::output::ResultTable`]. Use [`crate::stream::extract_stream`] instead to receive
//! outcomes as they finish.

use crate::client::{resolve_client, ModelClient};
use crate::config::ExtractionConfig;
use crate::error::{ExtractError, FileError};
use crate::output::{
    aggregate, ExtractionOutput, ExtractionStats, FileOutcome, OutputFormat, ResultTable,
};
use crate::pipeline::{encode, input, llm};
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Extract licence fields from every image in a directory.
///
/// This is the primary entry point for the library.
///
/// # Returns
/// `Ok(ExtractionOutput)` whenever the directory could be listed, even if
/// some or all files failed; failed files appear as all-sentinel rows and are
/// counted in `output.stats.failed_files`. An empty directory gives an empty
/// table.
///
/// # Errors
/// Returns `Err(ExtractError)` only for fatal errors, before any model call:
/// - no usable client (missing API key, unknown provider)
/// - directory not found, not a directory, or unreadable
pub async fn extract_directory(
    dir: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    let dir = dir.as_ref();
    info!("Starting extraction: {}", dir.display());

    let client = resolve_client(config)?;
    let files = input::enumerate_images(dir).await?;
    info!("{} images to process with {}", files.len(), client.name());

    Ok(run_batch(&client, &files, config).await)
}

/// Run an explicit list of files through `client`.
///
/// Rows come back in the order of `files`, regardless of the order in which
/// the model calls complete.
pub async fn run_batch(
    client: &Arc<dyn ModelClient>,
    files: &[PathBuf],
    config: &ExtractionConfig,
) -> ExtractionOutput {
    let total_start = Instant::now();
    let total = files.len();

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(total);
    }

    let outcomes = process_concurrent(client, files, config).await;
    let stats = ExtractionStats::from_outcomes(&outcomes, total_start.elapsed().as_millis() as u64);

    info!(
        "Extraction complete: {}/{} files, {}ms total",
        stats.succeeded_files, stats.total_files, stats.total_duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_complete(total, stats.succeeded_files);
    }

    ExtractionOutput {
        table: aggregate(outcomes),
        stats,
    }
}

/// Extract a directory and write the table to a file.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn extract_to_file(
    dir: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    format: OutputFormat,
    config: &ExtractionConfig,
) -> Result<ExtractionStats, ExtractError> {
    let output = extract_directory(dir, config).await?;
    write_table(&output.table, output_path, format).await?;
    Ok(output.stats)
}

/// Render `table` and write it to `output_path` atomically.
///
/// Missing parent directories are created.
pub async fn write_table(
    table: &ResultTable,
    output_path: impl AsRef<Path>,
    format: OutputFormat,
) -> Result<(), ExtractError> {
    let path = output_path.as_ref();
    let rendered = table.render(format)?;

    let write_err = |source: std::io::Error| ExtractError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }
    }

    let tmp_path = path.with_extension(format!("{}.tmp", format.extension()));
    tokio::fs::write(&tmp_path, rendered)
        .await
        .map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(write_err)?;

    debug!("Wrote {} rows to {}", table.len(), path.display());
    Ok(())
}

/// Synchronous wrapper around [`extract_directory`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_sync(
    dir: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ExtractError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(extract_directory(dir, config))
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Process files concurrently into index-addressed slots.
///
/// Each in-flight future carries its enumeration index and its outcome is
/// written to `slots[index]`, so completion order never affects row order.
/// When the deadline passes, the remaining futures are dropped (cancelling
/// their model calls) and every empty slot becomes a timeout row.
async fn process_concurrent(
    client: &Arc<dyn ModelClient>,
    files: &[PathBuf],
    config: &ExtractionConfig,
) -> Vec<FileOutcome> {
    let total = files.len();
    let mut slots: Vec<Option<FileOutcome>> = (0..total).map(|_| None).collect();
    let deadline = config
        .deadline
        .map(|d| tokio::time::Instant::now() + d);

    {
        let mut pending = stream::iter(files.iter().enumerate().map(|(index, path)| {
            let client = Arc::clone(client);
            async move { process_one(&client, index, path, total, config).await }
        }))
        .buffer_unordered(config.concurrency);

        loop {
            let next = match deadline {
                Some(at) => match tokio::time::timeout_at(at, pending.next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        warn!("Batch deadline reached; cancelling unfinished files");
                        break;
                    }
                },
                None => pending.next().await,
            };

            match next {
                Some(outcome) => {
                    let index = outcome.index;
                    slots[index] = Some(outcome);
                }
                None => break,
            }
        }
    }

    let deadline_ms = config
        .deadline
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default();

    slots
        .into_iter()
        .zip(files)
        .enumerate()
        .map(|(index, (slot, path))| {
            slot.unwrap_or_else(|| {
                let file = encode::file_name_of(path);
                let error = FileError::Timeout {
                    file: file.clone(),
                    deadline_ms,
                };
                if let Some(ref cb) = config.progress_callback {
                    cb.on_file_error(index, &file, total, &error.to_string());
                }
                FileOutcome::failed(index, file, error)
            })
        })
        .collect()
}

/// Drive one file and fire its progress events.
pub(crate) async fn process_one(
    client: &Arc<dyn ModelClient>,
    index: usize,
    path: &Path,
    total: usize,
    config: &ExtractionConfig,
) -> FileOutcome {
    let file_name = encode::file_name_of(path);
    if let Some(ref cb) = config.progress_callback {
        cb.on_file_start(index, &file_name, total);
    }

    let outcome = llm::process_file(client, index, path, config).await;

    if let Some(ref cb) = config.progress_callback {
        match &outcome.result {
            Ok(_) => cb.on_file_complete(index, &outcome.file_name, total),
            Err(e) => cb.on_file_error(index, &outcome.file_name, total, &e.to_string()),
        }
    }
    outcome
}
