//! Deduplicating work queue with retry.
//!
//! Keys flow in from the sources and the intent watcher over an unbounded
//! channel; a small fixed pool of workers drains them. At most one attempt
//! per key is queued, running, or waiting out a backoff at a time. Failed
//! attempts are re-enqueued after a capped exponential delay; the worker
//! permit is released before the wait, so a key stuck in backoff never
//! blocks other keys from syncing. Permanent errors (unparseable keys,
//! unregistered sources) are logged and dropped.

use crate::backoff::ExponentialBackoff;
use crate::error::ControllerError;
use crate::source::WorkKey;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const BACKOFF_MIN_SECS: u64 = 1;
const BACKOFF_MAX_SECS: u64 = 300;

/// One reconcile attempt for an encoded work key.
#[async_trait::async_trait]
pub trait SyncHandler: Send + Sync {
    async fn sync(&self, key: &str) -> Result<(), ControllerError>;
}

pub struct QueueRunner {
    handler: Arc<dyn SyncHandler>,
    tx: UnboundedSender<WorkKey>,
    in_flight: Arc<Mutex<HashSet<WorkKey>>>,
    backoffs: Arc<Mutex<HashMap<WorkKey, ExponentialBackoff>>>,
    workers: Arc<Semaphore>,
}

impl QueueRunner {
    pub fn new(handler: Arc<dyn SyncHandler>, workers: usize, tx: UnboundedSender<WorkKey>) -> Self {
        Self {
            handler,
            tx,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            backoffs: Arc::new(Mutex::new(HashMap::new())),
            workers: Arc::new(Semaphore::new(workers)),
        }
    }

    /// Drain the queue until `shutdown` fires or every sender is gone.
    pub async fn run(&self, mut rx: UnboundedReceiver<WorkKey>, shutdown: CancellationToken) {
        loop {
            let key = tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Work queue stopping");
                    return;
                }
                received = rx.recv() => match received {
                    Some(key) => key,
                    None => return,
                },
            };

            // At most one attempt per key queued, running, or in backoff
            if !self
                .in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(key.clone())
            {
                debug!("Key {} is already in flight, dropping duplicate", key);
                continue;
            }

            let Ok(permit) = self.workers.clone().acquire_owned().await else {
                return;
            };
            let handler = self.handler.clone();
            let tx = self.tx.clone();
            let in_flight = self.in_flight.clone();
            let backoffs = self.backoffs.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                let retry_after = attempt(handler.as_ref(), &backoffs, &key).await;
                // The permit covers the sync only; backoff waits must not
                // occupy a worker slot
                drop(permit);

                let Some(delay) = retry_after else {
                    in_flight
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .remove(&key);
                    return;
                };
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        in_flight
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .remove(&key);
                    }
                    _ = tokio::time::sleep(delay) => {
                        in_flight
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .remove(&key);
                        let _ = tx.send(key);
                    }
                }
            });
        }
    }
}

/// Run one attempt; `Some(delay)` means re-enqueue after the delay.
async fn attempt(
    handler: &dyn SyncHandler,
    backoffs: &Mutex<HashMap<WorkKey, ExponentialBackoff>>,
    key: &WorkKey,
) -> Option<std::time::Duration> {
    let encoded = key.to_string();
    match handler.sync(&encoded).await {
        Ok(()) => {
            if let Some(backoff) = backoffs
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .get_mut(key)
            {
                backoff.reset();
            }
            None
        }
        Err(e) if e.is_permanent() => {
            error!("Dropping key {}: {}", encoded, e);
            backoffs
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(key);
            None
        }
        Err(e) => {
            let delay = backoffs
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .entry(key.clone())
                .or_insert_with(|| ExponentialBackoff::new(BACKOFF_MIN_SECS, BACKOFF_MAX_SECS))
                .next_backoff();
            warn!(
                "Sync of {} failed, retrying in {}s: {}",
                encoded,
                delay.as_secs(),
                e
            );
            Some(delay)
        }
    }
}
