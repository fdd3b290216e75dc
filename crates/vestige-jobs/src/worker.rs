//! Index worker: consumes artifact ids from an in-process queue.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};
use uuid::Uuid;

use vestige_core::{defaults, Error, Result};

use crate::indexer::{IndexArtifactHandler, IndexOutcome};

/// Capacity of the worker event bus.
const EVENT_BUS_CAPACITY: usize = 256;

/// Configuration for the index worker.
#[derive(Debug, Clone)]
pub struct IndexWorkerConfig {
    /// Capacity of the artifact id queue.
    pub queue_capacity: usize,
    /// Whether to enable index processing.
    pub enabled: bool,
}

impl Default for IndexWorkerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: defaults::INDEX_QUEUE_CAPACITY,
            enabled: true,
        }
    }
}

impl IndexWorkerConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `INDEX_WORKER_ENABLED` | `true` | Enable/disable index processing |
    /// | `INDEX_QUEUE_CAPACITY` | `64` | Queue depth before enqueue blocks |
    pub fn from_env() -> Self {
        let enabled = std::env::var("INDEX_WORKER_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let queue_capacity = std::env::var("INDEX_QUEUE_CAPACITY")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults::INDEX_QUEUE_CAPACITY)
            .max(1);

        Self {
            queue_capacity,
            enabled,
        }
    }
}

/// Event emitted by the index worker.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    /// Indexing of an artifact began.
    IndexStarted { artifact_id: Uuid },
    /// An artifact was reindexed.
    IndexCompleted { artifact_id: Uuid, chunk_count: usize },
    /// An artifact's media type was not indexable.
    IndexSkipped { artifact_id: Uuid },
    /// Indexing of an artifact failed; the worker continues.
    IndexFailed { artifact_id: Uuid, error: String },
    /// Worker started.
    WorkerStarted,
    /// Worker stopped.
    WorkerStopped,
}

/// Enqueue side of the worker, cheap to clone into request handlers.
#[derive(Clone)]
pub struct IndexQueue {
    tx: mpsc::Sender<Uuid>,
}

impl IndexQueue {
    /// Queue an artifact for reindexing. Waits when the queue is full so
    /// upload bursts back-pressure instead of dropping work.
    pub async fn enqueue(&self, artifact_id: Uuid) -> Result<()> {
        self.tx
            .send(artifact_id)
            .await
            .map_err(|_| Error::Internal("index worker is not running".to_string()))
    }
}

/// Handle for controlling a running worker.
pub struct WorkerHandle {
    shutdown_tx: mpsc::Sender<()>,
    event_rx: broadcast::Receiver<WorkerEvent>,
}

impl WorkerHandle {
    /// Signal the worker to shut down gracefully.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| Error::Internal("Failed to send shutdown signal".to_string()))?;
        Ok(())
    }

    /// Get a receiver for worker events.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_rx.resubscribe()
    }
}

/// Index worker processing artifacts one at a time, in enqueue order.
pub struct IndexWorker {
    handler: Arc<IndexArtifactHandler>,
    config: IndexWorkerConfig,
    event_tx: broadcast::Sender<WorkerEvent>,
}

impl IndexWorker {
    pub fn new(handler: Arc<IndexArtifactHandler>, config: IndexWorkerConfig) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_BUS_CAPACITY);
        Self {
            handler,
            config,
            event_tx,
        }
    }

    /// Start the worker, returning the queue and a control handle.
    pub fn start(self) -> (IndexQueue, WorkerHandle) {
        let (work_tx, mut work_rx) = mpsc::channel::<Uuid>(self.config.queue_capacity);
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let event_rx = self.event_tx.subscribe();

        let enabled = self.config.enabled;
        let worker = Arc::new(self);
        let worker_clone = worker.clone();

        tokio::spawn(async move {
            if !enabled {
                info!(subsystem = "indexer", "Index worker is disabled, not starting");
                return;
            }

            info!(
                subsystem = "indexer",
                queue_capacity = worker_clone.config.queue_capacity,
                "Index worker started"
            );
            let _ = worker_clone.event_tx.send(WorkerEvent::WorkerStarted);

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!(subsystem = "indexer", "Index worker received shutdown signal");
                        break;
                    }
                    maybe_id = work_rx.recv() => {
                        match maybe_id {
                            Some(artifact_id) => worker_clone.process(artifact_id).await,
                            None => break, // all queue handles dropped
                        }
                    }
                }
            }

            let _ = worker_clone.event_tx.send(WorkerEvent::WorkerStopped);
            info!(subsystem = "indexer", "Index worker stopped");
        });

        (
            IndexQueue { tx: work_tx },
            WorkerHandle {
                shutdown_tx,
                event_rx,
            },
        )
    }

    async fn process(&self, artifact_id: Uuid) {
        let _ = self
            .event_tx
            .send(WorkerEvent::IndexStarted { artifact_id });

        match self.handler.reindex(artifact_id).await {
            Ok(IndexOutcome::Indexed(chunk_count)) => {
                let _ = self.event_tx.send(WorkerEvent::IndexCompleted {
                    artifact_id,
                    chunk_count,
                });
            }
            Ok(IndexOutcome::Cleared) => {
                let _ = self.event_tx.send(WorkerEvent::IndexCompleted {
                    artifact_id,
                    chunk_count: 0,
                });
            }
            Ok(IndexOutcome::Skipped) => {
                warn!(
                    subsystem = "indexer",
                    artifact_id = %artifact_id,
                    "Artifact media type not indexable"
                );
                let _ = self
                    .event_tx
                    .send(WorkerEvent::IndexSkipped { artifact_id });
            }
            Err(e) => {
                // Contained: log, emit, move on to the next artifact.
                error!(
                    subsystem = "indexer",
                    artifact_id = %artifact_id,
                    error_msg = %e,
                    "Artifact indexing failed"
                );
                let _ = self.event_tx.send(WorkerEvent::IndexFailed {
                    artifact_id,
                    error: e.to_string(),
                });
            }
        }
    }
}
