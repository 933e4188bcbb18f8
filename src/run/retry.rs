//! Per-edition update with retries.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use log::{debug, warn};
use tokio_retry::RetryIf;
use tokio_util::sync::CancellationToken;

use crate::client::{DownloadResult, UpdateClient};
use crate::database::Writer;
use crate::error_handling::{get_retry_strategy, UpdateError};
use crate::models::Outcome;

/// Brings `edition` up to date, retrying transient failures for up to `retry_for`.
///
/// The local fingerprint is computed once; each attempt then probes the
/// metadata and, when it differs, downloads and installs the new release.
/// `checked_at` of the returned outcome is left for the caller to stamp.
pub async fn fetch_with_retry<C, W>(
    client: &C,
    writer: &Arc<W>,
    edition: &str,
    retry_for: Duration,
    cancel: &CancellationToken,
) -> Result<Outcome, UpdateError>
where
    C: UpdateClient,
    W: Writer,
{
    let current = blocking({
        let writer = Arc::clone(writer);
        let edition = edition.to_string();
        move || writer.hash(&edition)
    })
    .await
    .map_err(|e| e.for_edition(edition))?;

    // Written by the retry condition, read when the next delay is scheduled.
    let last_error = Mutex::new(String::new());
    let strategy = get_retry_strategy(retry_for).inspect(|delay| {
        warn!(
            "{}: retrying in {:?} after error: {}",
            edition,
            delay,
            last_error.lock().unwrap_or_else(PoisonError::into_inner)
        );
    });

    let mut attempt = 0u32;
    let result = cancel
        .run_until_cancelled(RetryIf::start(
            strategy,
            || {
                attempt += 1;
                if attempt > 1 {
                    debug!("Attempt {} for {}", attempt, edition);
                }
                update_once(client, writer, edition, &current, cancel)
            },
            |err: &UpdateError| {
                if err.is_permanent() {
                    return false;
                }
                *last_error.lock().unwrap_or_else(PoisonError::into_inner) =
                    format!("{} ({})", err, err.category());
                true
            },
        ))
        .await
        .ok_or(UpdateError::Cancelled)
        .and_then(|r| r);

    result.map_err(|e| e.for_edition(edition))
}

/// One probe-download-write attempt.
async fn update_once<C, W>(
    client: &C,
    writer: &Arc<W>,
    edition: &str,
    current: &str,
    cancel: &CancellationToken,
) -> Result<Outcome, UpdateError>
where
    C: UpdateClient,
    W: Writer,
{
    match client.download(edition, current, cancel).await? {
        DownloadResult::UpToDate { metadata } => Ok(Outcome {
            edition_id: edition.to_string(),
            old_hash: current.to_string(),
            new_hash: current.to_string(),
            modified_at: metadata.released_at()?,
            checked_at: Utc::now(),
        }),
        DownloadResult::Available {
            metadata,
            last_modified,
            stream,
        } => {
            let new_hash = metadata.md5.to_ascii_lowercase();
            blocking({
                let writer = Arc::clone(writer);
                let edition = edition.to_string();
                let expected = new_hash.clone();
                let cancel = cancel.clone();
                move || writer.write(&edition, stream, &expected, last_modified, &cancel)
            })
            .await?;

            Ok(Outcome {
                edition_id: edition.to_string(),
                old_hash: current.to_string(),
                new_hash,
                modified_at: last_modified,
                checked_at: Utc::now(),
            })
        }
    }
}

/// Runs blocking filesystem work off the async workers.
async fn blocking<T, F>(f: F) -> Result<T, UpdateError>
where
    F: FnOnce() -> Result<T, UpdateError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| UpdateError::JobPanicked(e.to_string()))?
}
