//! Bounded-parallel job execution with cancel-on-first-error.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::BoxFuture;
use futures::FutureExt;
use log::debug;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::error_handling::UpdateError;

type Job = Box<dyn FnOnce(CancellationToken) -> BoxFuture<'static, Result<(), UpdateError>> + Send>;

/// Runs queued jobs with at most `parallelism` in flight.
///
/// The first failing job cancels the token shared by every job. Jobs still
/// waiting for a slot then return [`UpdateError::Cancelled`] without running.
pub struct JobProcessor {
    parallelism: usize,
    jobs: Mutex<Vec<Job>>,
    cancel: CancellationToken,
}

impl JobProcessor {
    /// Creates a processor. A parallelism of 0 is treated as 1.
    pub fn new(parallelism: usize) -> Self {
        Self {
            parallelism: parallelism.max(1),
            jobs: Mutex::new(Vec::new()),
            cancel: CancellationToken::new(),
        }
    }

    /// Queues a job. It receives the shared token and should stop promptly
    /// once the token is cancelled.
    pub fn add<F, Fut>(&self, job: F)
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), UpdateError>> + Send + 'static,
    {
        self.jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(move |token| job(token).boxed()));
    }

    /// Cancels a running [`run`](JobProcessor::run).
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Runs every queued job and waits for all of them to finish.
    ///
    /// Returns the first error reported by a job. A cancellation error is
    /// returned only when no job failed for another reason. Cancelling `ctx`
    /// cancels the jobs too.
    pub async fn run(&self, ctx: &CancellationToken) -> Result<(), UpdateError> {
        let jobs = std::mem::take(&mut *self.jobs.lock().unwrap_or_else(PoisonError::into_inner));
        let token = self.cancel.child_token();
        if ctx.is_cancelled() {
            token.cancel();
        }
        let semaphore = Arc::new(Semaphore::new(self.parallelism));

        debug!(
            "Running {} jobs with parallelism {}",
            jobs.len(),
            self.parallelism
        );

        let mut set = JoinSet::new();
        for job in jobs {
            let token = token.clone();
            let semaphore = Arc::clone(&semaphore);
            set.spawn(async move {
                let _permit = tokio::select! {
                    biased;
                    _ = token.cancelled() => return Err(UpdateError::Cancelled),
                    permit = semaphore.acquire_owned() => {
                        permit.map_err(|_| UpdateError::Cancelled)?
                    }
                };
                if token.is_cancelled() {
                    return Err(UpdateError::Cancelled);
                }

                let result = job(token.clone()).await;
                if result.is_err() {
                    token.cancel();
                }
                result
            });
        }

        let mut first_error: Option<UpdateError> = None;
        loop {
            let joined = tokio::select! {
                joined = set.join_next() => joined,
                _ = ctx.cancelled(), if !token.is_cancelled() => {
                    token.cancel();
                    continue;
                }
            };
            let Some(joined) = joined else {
                break;
            };

            let result = joined.unwrap_or_else(|e| Err(UpdateError::JobPanicked(e.to_string())));
            if let Err(err) = result {
                token.cancel();
                let replace = match &first_error {
                    None => true,
                    Some(existing) => existing.is_cancelled() && !err.is_cancelled(),
                };
                if replace {
                    first_error = Some(err);
                }
            }
        }

        first_error.map_or(Ok(()), Err)
    }
}
