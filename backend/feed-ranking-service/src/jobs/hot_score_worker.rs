//! Hot Score Worker
//!
//! Drains the recomputation queue, recomputes each post's hot score from its
//! current counters and writes it back. Runs are mutually exclusive through a
//! [`WorkerLock`]; a run that finds the lock held exits straight away.
//!
//! Per-post failures never abort a run:
//! - missing posts are skipped
//! - storage failures are skipped and the id is re-enqueued for the next run

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{error, info, warn};

use super::worker_lock::WorkerLock;
use crate::db::PostStore;
use crate::metrics;
use crate::models::PostId;
use crate::queue::HotScoreQueue;
use crate::services::hot_score::{age_hours_since, compute_hot_score, counter};

pub const DEFAULT_THROTTLE: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, PartialEq)]
pub enum SkippedItem {
    InvalidId(PostId),
    PostMissing(PostId),
    Storage { post_id: PostId, error: String },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkerReport {
    /// Unique ids taken from the queue
    pub drained: usize,
    pub processed: usize,
    pub skipped: Vec<SkippedItem>,
    /// Ids put back on the queue after a storage failure
    pub requeued: Vec<PostId>,
    pub elapsed: Duration,
}

impl WorkerReport {
    pub fn missing(&self) -> usize {
        self.skipped
            .iter()
            .filter(|item| matches!(item, SkippedItem::PostMissing(_) | SkippedItem::InvalidId(_)))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.skipped
            .iter()
            .filter(|item| matches!(item, SkippedItem::Storage { .. }))
            .count()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorkerOutcome {
    /// Another run holds a live lock
    LockContention,
    /// Lock or queue backend could not be reached; nothing was processed
    Unavailable { stage: &'static str, error: String },
    Completed(WorkerReport),
}

impl WorkerOutcome {
    fn label(&self) -> &'static str {
        match self {
            WorkerOutcome::LockContention => "lock_contention",
            WorkerOutcome::Unavailable { .. } => "unavailable",
            WorkerOutcome::Completed(_) => "completed",
        }
    }
}

pub struct HotScoreWorker {
    posts: Arc<dyn PostStore>,
    queue: Arc<dyn HotScoreQueue>,
    lock: Arc<dyn WorkerLock>,
    throttle: Duration,
}

impl HotScoreWorker {
    pub fn new(
        posts: Arc<dyn PostStore>,
        queue: Arc<dyn HotScoreQueue>,
        lock: Arc<dyn WorkerLock>,
        throttle: Duration,
    ) -> Self {
        Self {
            posts,
            queue,
            lock,
            throttle,
        }
    }

    pub async fn run_once(&self) -> WorkerOutcome {
        self.run_once_at(Utc::now()).await
    }

    /// Single run with ages measured against `now`.
    pub async fn run_once_at(&self, now: DateTime<Utc>) -> WorkerOutcome {
        let start = Instant::now();

        let token = match self.lock.try_acquire().await {
            Ok(Some(token)) => token,
            Ok(None) => {
                info!("Hot score worker lock is held by another run, exiting");
                return self.finish(WorkerOutcome::LockContention, start);
            }
            Err(e) => {
                warn!(error = %e, "Hot score worker lock unavailable, exiting");
                let outcome = WorkerOutcome::Unavailable {
                    stage: "lock",
                    error: e.to_string(),
                };
                return self.finish(outcome, start);
            }
        };

        let outcome = match self.queue.drain_all().await {
            Ok(ids) => {
                let mut ids: Vec<PostId> = ids.into_iter().collect();
                ids.sort_unstable();
                WorkerOutcome::Completed(self.process(ids, now, start).await)
            }
            Err(e) => {
                warn!(
                    backend = self.queue.backend(),
                    error = %e,
                    "Hot score queue unavailable, scores stay stale until next run"
                );
                WorkerOutcome::Unavailable {
                    stage: "queue",
                    error: e.to_string(),
                }
            }
        };

        match self.lock.release(&token).await {
            Ok(true) => {}
            Ok(false) => warn!("Hot score worker lock expired before release"),
            Err(e) => warn!(error = %e, "Failed to release hot score worker lock"),
        }

        self.finish(outcome, start)
    }

    async fn process(&self, ids: Vec<PostId>, now: DateTime<Utc>, start: Instant) -> WorkerReport {
        let mut report = WorkerReport {
            drained: ids.len(),
            ..WorkerReport::default()
        };

        let last = ids.len().saturating_sub(1);
        for (index, post_id) in ids.into_iter().enumerate() {
            if post_id <= 0 {
                report.skipped.push(SkippedItem::InvalidId(post_id));
                continue;
            }

            match self.update_post(post_id, now).await {
                Ok(true) => {
                    report.processed += 1;
                    // Throttle only spaces out writes
                    if index < last && !self.throttle.is_zero() {
                        sleep(self.throttle).await;
                    }
                }
                Ok(false) => {
                    warn!(post_id, "Post no longer exists, skipping hot score update");
                    report.skipped.push(SkippedItem::PostMissing(post_id));
                }
                Err(e) => {
                    warn!(post_id, error = %e, "Hot score update failed, re-enqueueing");
                    report.skipped.push(SkippedItem::Storage {
                        post_id,
                        error: e.to_string(),
                    });
                    report.requeued.push(post_id);
                }
            }
        }

        if !report.requeued.is_empty() {
            if let Err(e) = self.queue.enqueue_many(&report.requeued).await {
                error!(
                    count = report.requeued.len(),
                    error = %e,
                    "Failed to re-enqueue posts; they wait for their next view"
                );
            }
        }

        report.elapsed = start.elapsed();
        report
    }

    /// Ok(false) when the post is gone.
    async fn update_post(&self, post_id: PostId, now: DateTime<Utc>) -> crate::Result<bool> {
        let Some(post) = self.posts.get_post(post_id).await? else {
            return Ok(false);
        };

        let score = compute_hot_score(
            counter(post.like_count),
            counter(post.comment_count),
            counter(post.share_count),
            age_hours_since(post.created_at, now),
        );

        self.posts.update_hot_score(post_id, score).await
    }

    fn finish(&self, outcome: WorkerOutcome, start: Instant) -> WorkerOutcome {
        let elapsed = start.elapsed();
        metrics::record_worker_run(outcome.label(), elapsed);

        if let WorkerOutcome::Completed(report) = &outcome {
            metrics::record_worker_items("updated", report.processed);
            metrics::record_worker_items("skipped", report.missing());
            metrics::record_worker_items("failed", report.failed());
            info!(
                drained = report.drained,
                processed = report.processed,
                skipped = report.missing(),
                failed = report.failed(),
                elapsed_ms = elapsed.as_millis() as u64,
                "Hot score worker run completed"
            );
        }

        outcome
    }
}

/// Run the worker every `every` until `shutdown` fires. A run in progress is
/// finished before the loop stops.
pub async fn start_hot_score_worker(
    worker: Arc<HotScoreWorker>,
    every: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    if every.is_zero() {
        warn!("Hot score worker interval is zero, loop not started");
        return;
    }

    info!(
        interval_secs = every.as_secs(),
        throttle_ms = worker.throttle.as_millis() as u64,
        "Starting hot score worker loop"
    );

    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                worker.run_once().await;
            }
            _ = shutdown.recv() => {
                info!("Received shutdown signal, stopping hot score worker loop");
                break;
            }
        }
    }

    info!("Hot score worker loop stopped");
}
