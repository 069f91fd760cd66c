//! Streaming extraction API: emit file outcomes as they complete.
//!
//! Unlike the eager [`crate::extract::extract_directory`], which returns
//! only after every file finishes, [`extract_stream`] yields each
//! [`FileOutcome`] as soon as its model call is done. Outcomes arrive in
//! completion order; sort by [`FileOutcome::index`] (or pass them to
//! [`crate::output::aggregate`] after sorting) when enumeration order matters.
//!
//! The stream applies no batch deadline; wrap it in
//! `tokio_stream::StreamExt::timeout` or stop polling to bound it.
//! `on_batch_complete` fires once the stream has yielded its last outcome;
//! a stream dropped early never reports completion.

use crate::client::resolve_client;
use crate::config::ExtractionConfig;
use crate::error::ExtractError;
use crate::extract::process_one;
use crate::output::FileOutcome;
use crate::pipeline::input;
use futures::stream::{self, StreamExt};
use std::path::Path;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of per-file outcomes.
pub type FileStream = Pin<Box<dyn Stream<Item = FileOutcome> + Send>>;

/// Extract licence fields, streaming outcomes as they are ready.
///
/// # Returns
/// - `Ok(FileStream)`: one item per image file
/// - `Err(ExtractError)`: fatal error (no client, directory unreadable)
pub async fn extract_stream(
    dir: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<FileStream, ExtractError> {
    let dir = dir.as_ref();
    info!("Starting streaming extraction: {}", dir.display());

    let client = resolve_client(config)?;
    let files = input::enumerate_images(dir).await?;
    let total = files.len();

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(total);
    }

    let concurrency = config.concurrency;
    let callback = config.progress_callback.clone();
    let config = config.clone();
    let succeeded = Arc::new(AtomicUsize::new(0));

    let outcomes = stream::iter(files.into_iter().enumerate().map(move |(index, path)| {
        let client = Arc::clone(&client);
        let cfg = config.clone();
        async move { process_one(&client, index, &path, total, &cfg).await }
    }))
    .buffer_unordered(concurrency)
    .inspect({
        let succeeded = Arc::clone(&succeeded);
        move |outcome| {
            if outcome.is_success() {
                succeeded.fetch_add(1, Ordering::Relaxed);
            }
        }
    });

    // Runs after the last outcome and yields nothing itself.
    let finish = stream::once(async move {
        let success_count = succeeded.load(Ordering::Relaxed);
        info!("Streaming extraction finished: {success_count}/{total} succeeded");
        if let Some(cb) = callback {
            cb.on_batch_complete(total, success_count);
        }
    })
    .filter_map(|()| async { None::<FileOutcome> });

    Ok(Box::pin(outcomes.chain(finish)))
}
