//! Ingestion worker pool: a bounded channel of batches drained by a few
//! tokio tasks, each running its commit on the blocking pool.
//!
//! Workers prepare outside the writer lock and commit under it, so planning
//! of one batch overlaps the commit of another. Batches from different
//! workers may commit in any order; use a single worker for strict
//! submission order.

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use crate::core::errors::{NewsvecError, Result};
use crate::storage::IngestLock;
use super::batch::{BatchSummary, IngestBatch};
use super::coordinator::IngestCoordinator;

/// Optimistic prepare/commit rounds before falling back to a locked ingest.
const MAX_OPTIMISTIC_ATTEMPTS: usize = 3;

struct Job {
    batch: IngestBatch,
    reply: oneshot::Sender<Result<BatchSummary>>,
}

/// Pending result of a submitted batch.
pub type SummaryReceiver = oneshot::Receiver<Result<BatchSummary>>;

pub struct IngestPool {
    sender: mpsc::Sender<Job>,
    workers: Vec<JoinHandle<()>>,
    _lock: IngestLock,
}

impl IngestPool {
    /// Spawn `workers` tasks on the current runtime. Holds the corpus ingest
    /// lock until [`IngestPool::shutdown`].
    pub fn start(coordinator: Arc<IngestCoordinator>, workers: usize, capacity: usize) -> Result<Self> {
        if workers == 0 || capacity == 0 {
            return Err(NewsvecError::config("ingest pool needs workers > 0 and capacity > 0"));
        }
        let lock = coordinator.corpus().ingest_lock()?;
        let (sender, receiver) = mpsc::channel::<Job>(capacity);
        let receiver = Arc::new(Mutex::new(receiver));

        let workers: Vec<JoinHandle<()>> = (0..workers)
            .map(|worker_id| {
                let receiver = Arc::clone(&receiver);
                let coordinator = Arc::clone(&coordinator);
                tokio::spawn(async move {
                    loop {
                        let job = { receiver.lock().await.recv().await };
                        let Some(Job { batch, reply }) = job else {
                            break;
                        };
                        let batch_id = batch.batch_id.clone();
                        let coordinator = Arc::clone(&coordinator);
                        let result = tokio::task::spawn_blocking(move || run_batch(&coordinator, batch))
                            .await
                            .unwrap_or_else(|e| {
                                error!(worker_id, batch_id = %batch_id, error = %e, "Ingest worker task failed");
                                Err(NewsvecError::BatchAborted {
                                    batch_id: batch_id.clone(),
                                    reason: format!("worker task failed: {}", e),
                                })
                            });
                        if reply.send(result).is_err() {
                            debug!(worker_id, batch_id = %batch_id, "Submitter dropped before summary");
                        }
                    }
                    debug!(worker_id, "Ingest worker stopped");
                })
            })
            .collect();

        info!(workers = workers.len(), capacity, "Ingest pool started");
        Ok(IngestPool {
            sender,
            workers,
            _lock: lock,
        })
    }

    /// Queue a batch, waiting while the channel is full.
    pub async fn submit(&self, batch: IngestBatch) -> Result<SummaryReceiver> {
        let (reply, receiver) = oneshot::channel();
        self.sender
            .send(Job { batch, reply })
            .await
            .map_err(|e| NewsvecError::BatchAborted {
                batch_id: e.0.batch.batch_id,
                reason: "ingest pool is shut down".to_string(),
            })?;
        Ok(receiver)
    }

    /// Stop accepting batches, drain the queue and release the ingest lock.
    pub async fn shutdown(self) {
        let IngestPool { sender, workers, _lock } = self;
        drop(sender);
        for worker in workers {
            if let Err(e) = worker.await {
                error!(error = %e, "Ingest worker panicked");
            }
        }
        info!("Ingest pool stopped");
    }
}

fn run_batch(coordinator: &IngestCoordinator, batch: IngestBatch) -> Result<BatchSummary> {
    for attempt in 1..=MAX_OPTIMISTIC_ATTEMPTS {
        let prepared = coordinator.prepare(batch.clone())?;
        match coordinator.commit(prepared) {
            Err(NewsvecError::BatchAborted { reason, .. }) => {
                debug!(batch_id = %batch.batch_id, attempt, reason = %reason, "Re-planning batch");
            }
            other => return other,
        }
    }
    coordinator.ingest(batch)
}
