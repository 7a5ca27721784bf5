//! Background jobs
//!
//! - hot_score_worker: hot score recomputation, one-shot or on an interval
//! - worker_lock: mutual exclusion between worker runs

pub mod hot_score_worker;
pub mod worker_lock;

pub use hot_score_worker::{
    start_hot_score_worker, HotScoreWorker, SkippedItem, WorkerOutcome, WorkerReport,
    DEFAULT_THROTTLE,
};
pub use worker_lock::{InMemoryWorkerLock, LockToken, RedisWorkerLock, WorkerLock};
