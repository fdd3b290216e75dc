//! # vestige-jobs
//!
//! Background indexing pipeline for vestige.
//!
//! Uploads return as soon as the sealed blob is stored; indexing (decrypt,
//! chunk, embed, replace) happens here, off the request path. The worker
//! consumes artifact ids from an in-process queue and contains failures per
//! artifact: one bad document never stops the queue.

pub mod indexer;
pub mod worker;

pub use indexer::{is_text_family, IndexArtifactHandler, IndexOutcome};
pub use worker::{IndexQueue, IndexWorker, IndexWorkerConfig, WorkerEvent, WorkerHandle};
