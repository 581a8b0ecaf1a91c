//! Background chapter re-indexing.
//!
//! Chapter writes enqueue the chapter id and return immediately; a single
//! worker task drains the queue and runs [`ContextAssembler::reindex`] for
//! each id. Failures are logged and never reach the writer.
//!
//! An id that is already queued is not queued again. The id leaves the
//! in-flight set when the worker picks it up, so a save that lands while
//! its chapter is being indexed schedules one more pass over the newest
//! content. The channel is unbounded: the in-flight set caps it at one
//! entry per chapter, and a save never waits on a slow worker.

use anyhow::{anyhow, Result};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use novel_muse_core::context::ContextAssembler;
use novel_muse_core::store::{ChapterStore, ContextStore};

/// Totals reported by [`ReindexQueue::shutdown`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReindexStats {
    pub processed: usize,
    pub failed: usize,
}

pub struct ReindexQueue {
    sender: mpsc::UnboundedSender<i64>,
    inflight: Arc<Mutex<HashSet<i64>>>,
    worker: JoinHandle<ReindexStats>,
}

impl ReindexQueue {
    /// Start the worker on the current tokio runtime.
    pub fn spawn<S>(assembler: ContextAssembler<S>) -> Self
    where
        S: ChapterStore + ContextStore + 'static,
    {
        let (sender, receiver) = mpsc::unbounded_channel();
        let inflight = Arc::new(Mutex::new(HashSet::new()));
        let worker = tokio::spawn(run_worker(receiver, inflight.clone(), assembler));

        Self {
            sender,
            inflight,
            worker,
        }
    }

    /// Schedule `chapter_id` for re-indexing.
    ///
    /// Returns `false` when the id was already waiting in the queue.
    pub async fn enqueue(&self, chapter_id: i64) -> Result<bool> {
        {
            let mut inflight = self.inflight.lock().await;
            if !inflight.insert(chapter_id) {
                tracing::debug!(chapter_id, "reindex already queued");
                return Ok(false);
            }
        }

        if self.sender.send(chapter_id).is_err() {
            self.inflight.lock().await.remove(&chapter_id);
            return Err(anyhow!("reindex worker stopped"));
        }

        tracing::debug!(chapter_id, "reindex enqueued");
        Ok(true)
    }

    /// Close the queue and wait for every pending job to finish.
    pub async fn shutdown(self) -> Result<ReindexStats> {
        drop(self.sender);
        self.worker
            .await
            .map_err(|e| anyhow!("reindex worker panicked: {}", e))
    }
}

async fn run_worker<S>(
    mut receiver: mpsc::UnboundedReceiver<i64>,
    inflight: Arc<Mutex<HashSet<i64>>>,
    assembler: ContextAssembler<S>,
) -> ReindexStats
where
    S: ChapterStore + ContextStore,
{
    let mut stats = ReindexStats::default();

    while let Some(chapter_id) = receiver.recv().await {
        inflight.lock().await.remove(&chapter_id);

        match assembler.reindex(chapter_id).await {
            Ok(report) => {
                stats.processed += 1;
                tracing::debug!(chapter_id, chunks = report.chunks, "reindex job done");
            }
            Err(err) => {
                stats.failed += 1;
                tracing::error!(chapter_id, error = %err, "reindex job failed");
            }
        }
    }

    stats
}
