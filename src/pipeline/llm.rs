//! Per-file driver: load → assemble → call the model → parse.
//!
//! This is where the per-file isolation contract lives. [`process_file`]
//! never returns an error: whatever goes wrong for one image is captured in
//! its [`FileOutcome`] and the batch carries on.
//!
//! ## Retry Strategy
//!
//! Rate limits and 5xx answers are frequent under concurrent load and
//! usually transient. Retryable failures back off exponentially
//! (`retry_backoff_ms * 2^attempt`, honouring a `Retry-After` hint when it is
//! longer); bad credentials and malformed payloads fail immediately.

use crate::client::{CompletionSettings, ExtractionResponse, ModelClient};
use crate::config::ExtractionConfig;
use crate::error::{FileError, ModelError};
use crate::output::FileOutcome;
use crate::pipeline::{encode, parse, prompt};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// Run one image through the whole pipeline.
pub async fn process_file(
    client: &Arc<dyn ModelClient>,
    index: usize,
    path: &Path,
    config: &ExtractionConfig,
) -> FileOutcome {
    let start = Instant::now();
    let file_name = encode::file_name_of(path);

    let document = match encode::load_document(path).await {
        Ok(doc) => doc,
        Err(e) => {
            warn!("{}: {}", file_name, e);
            return finish(FileOutcome::failed(index, file_name, e), start);
        }
    };

    let request = prompt::assemble_with(
        &document,
        config.system_prompt.as_deref(),
        config.instruction.as_deref(),
    );
    // The raw bytes are no longer needed once the request owns the payload.
    drop(document);

    let (response, retries) = match call_with_retry(client, &file_name, &request, config).await {
        Ok(ok) => ok,
        Err((cause, retries)) => {
            let error = FileError::Model {
                file: file_name.clone(),
                retries,
                cause,
            };
            warn!("{}", error);
            let mut outcome = FileOutcome::failed(index, file_name, error);
            outcome.retries = retries;
            return finish(outcome, start);
        }
    };

    let result = parse::parse_response(&response.text, &config.parse_options()).map_err(|e| {
        FileError::Parse {
            file: file_name.clone(),
            detail: e.to_string(),
        }
    });
    if let Err(ref e) = result {
        warn!("{}", e);
    }

    debug!(
        "{}: {} input tokens, {} output tokens, {:?}",
        file_name,
        response.input_tokens,
        response.output_tokens,
        start.elapsed()
    );

    finish(
        FileOutcome {
            index,
            file_name,
            result,
            input_tokens: response.input_tokens,
            output_tokens: response.output_tokens,
            duration_ms: 0,
            retries,
        },
        start,
    )
}

fn finish(mut outcome: FileOutcome, start: Instant) -> FileOutcome {
    outcome.duration_ms = start.elapsed().as_millis() as u64;
    outcome
}

/// Call the model, retrying retryable failures.
///
/// Returns the response and the number of retries it took, or the last
/// error and the number of retries spent.
async fn call_with_retry(
    client: &Arc<dyn ModelClient>,
    file_name: &str,
    request: &prompt::ExtractionRequest,
    config: &ExtractionConfig,
) -> Result<(ExtractionResponse, u32), (ModelError, u32)> {
    let settings = CompletionSettings::from_config(config);
    let call_timeout = Duration::from_secs(config.api_timeout_secs);
    let mut attempt: u32 = 0;

    loop {
        let result = match timeout(call_timeout, client.complete(request, &settings)).await {
            Ok(result) => result,
            Err(_) => Err(ModelError::Timeout {
                secs: config.api_timeout_secs,
            }),
        };

        let error = match result {
            Ok(response) => return Ok((response, attempt)),
            Err(e) => e,
        };

        if !error.is_retryable() || attempt >= config.max_retries {
            return Err((error, attempt));
        }

        let backoff = backoff_delay(config.retry_backoff_ms, attempt, &error);
        attempt += 1;
        warn!(
            "{}: attempt {} failed ({}), retry {}/{} after {}ms",
            file_name,
            attempt,
            error,
            attempt,
            config.max_retries,
            backoff.as_millis()
        );
        sleep(backoff).await;
    }
}

/// Delay before retry number `attempt + 1`.
fn backoff_delay(base_ms: u64, attempt: u32, error: &ModelError) -> Duration {
    let exponential = base_ms.saturating_mul(2u64.saturating_pow(attempt));
    let hinted = match error {
        ModelError::RateLimited {
            retry_after_secs: Some(secs),
        } => secs.saturating_mul(1000),
        _ => 0,
    };
    Duration::from_millis(exponential.max(hinted))
}
