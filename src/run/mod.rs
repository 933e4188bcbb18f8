//! Update orchestration.
//!
//! [`Updater::run`] takes the directory lock, runs one job per configured
//! edition through a [`JobProcessor`] and collects their outcomes.

mod jobs;
mod retry;

use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use log::{info, warn};
use tokio_util::sync::CancellationToken;

use crate::client::{Client, UpdateClient};
use crate::config::Config;
use crate::database::{LocalFileWriter, Writer};
use crate::error_handling::UpdateError;
use crate::initialization::init_client;
use crate::lock::FileLock;
use crate::models::{Outcome, UpdateReport};

// Re-export public API
pub use jobs::JobProcessor;
pub use retry::fetch_with_retry;

/// Runs a complete update with the HTTP client and local writer built from
/// `config`.
///
/// This is the library entry point used by the binary. When `config.output`
/// is set the JSON report is also printed on stdout.
///
/// # Example
///
/// ```no_run
/// use geoipupdate::{run_update, Config};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Config {
///     account_id: 42,
///     license_key: "000000000001".into(),
///     edition_ids: vec!["GeoLite2-Country".into()],
///     ..Default::default()
/// };
/// let report = run_update(config).await?;
/// println!("{} editions updated", report.updated());
/// # Ok(())
/// # }
/// ```
pub async fn run_update(config: Config) -> Result<UpdateReport, UpdateError> {
    Updater::new(config)?.run(&CancellationToken::new()).await
}

/// Updates every configured edition while holding the directory lock.
pub struct Updater<C = Client, W = LocalFileWriter> {
    config: Config,
    client: Arc<C>,
    writer: Arc<W>,
}

impl Updater<Client, LocalFileWriter> {
    /// Builds the HTTP client, service client and file writer for `config`.
    pub fn new(config: Config) -> Result<Self, UpdateError> {
        let http = init_client(&config)?;
        let client = Client::from_config(&config, http)?;
        let writer =
            LocalFileWriter::new(&config.database_directory, config.preserve_file_times)?;
        Ok(Self::with_parts(config, client, writer))
    }
}

impl<C: UpdateClient, W: Writer> Updater<C, W> {
    /// Assembles an updater from explicit parts.
    pub fn with_parts(config: Config, client: C, writer: W) -> Self {
        Self {
            config,
            client: Arc::new(client),
            writer: Arc::new(writer),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Takes the lock, updates all editions and releases the lock.
    ///
    /// The first edition error cancels the remaining editions and becomes
    /// the result. Outcomes are ordered as `edition_ids` is.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<UpdateReport, UpdateError> {
        let mut lock = FileLock::new(self.config.lock_file())?;
        lock.acquire()?;

        let result = self.update_all(cancel).await;

        if let Err(e) = lock.release() {
            warn!("Failed to release lock: {}", e);
        }

        let report = result?;
        info!(
            "Checked {} editions, {} updated",
            report.outcomes.len(),
            report.updated()
        );

        if self.config.output {
            print_report(&report)?;
        }
        Ok(report)
    }

    async fn update_all(&self, cancel: &CancellationToken) -> Result<UpdateReport, UpdateError> {
        let outcomes = Arc::new(Mutex::new(Vec::with_capacity(self.config.edition_ids.len())));
        let processor = JobProcessor::new(self.config.parallelism);

        for edition in &self.config.edition_ids {
            let client = Arc::clone(&self.client);
            let writer = Arc::clone(&self.writer);
            let outcomes = Arc::clone(&outcomes);
            let edition = edition.clone();
            let retry_for = self.config.retry_for;

            processor.add(move |token| async move {
                let mut outcome =
                    fetch_with_retry(client.as_ref(), &writer, &edition, retry_for, &token).await?;
                outcome.checked_at = Utc::now();
                outcomes
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(outcome);
                Ok(())
            });
        }

        processor.run(cancel).await?;

        let mut outcomes: Vec<Outcome> =
            std::mem::take(&mut *outcomes.lock().unwrap_or_else(PoisonError::into_inner));
        let position = |id: &str| self.config.edition_ids.iter().position(|e| e == id);
        outcomes.sort_by_key(|o| position(&o.edition_id));

        Ok(UpdateReport { outcomes })
    }
}

fn print_report(report: &UpdateReport) -> Result<(), UpdateError> {
    let json = report
        .to_json()
        .map_err(|e| UpdateError::local_io("encoding JSON output", io::Error::other(e)))?;
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{}", json)
        .and_then(|()| stdout.flush())
        .map_err(|e| UpdateError::local_io("writing JSON output", e))
}
