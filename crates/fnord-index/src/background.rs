use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::capability::IndexerCapability;
use crate::pipeline::{index_entry, next_stale_entry};
use crate::store::ProjectIndex;

/// A supervised, non-restarting, one-file-at-a-time re-indexer (C7).
///
/// State is exactly `{project, in_flight_task, pending_queue}` from §4.7: the
/// "pending queue" is not materialised as a list — the next stale entry is
/// fetched dynamically on each completion so newly-staled files are picked
/// up without pre-queuing a snapshot.
pub struct BackgroundIndexer {
    cancellation: CancellationToken,
    stopped: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    capability: Arc<dyn IndexerCapability>,
}

impl BackgroundIndexer {
    pub fn start(project: Arc<ProjectIndex>, capability: Arc<dyn IndexerCapability>) -> Self {
        capability.use_background_pool();
        let cancellation = CancellationToken::new();
        let stopped = Arc::new(AtomicBool::new(false));
        let token = cancellation.clone();
        let worker_capability = capability.clone();

        let handle = tokio::spawn(async move {
            loop {
                let next = tokio::select! {
                    _ = token.cancelled() => break,
                    result = async { next_stale_entry(&project) } => result,
                };
                let relative_path = match next {
                    Ok(Some(path)) => path,
                    Ok(None) => break,
                    Err(e) => {
                        warn!(error = %e, "background indexer failed to find next stale entry");
                        break;
                    }
                };

                let task = index_entry(&project, worker_capability.as_ref(), &relative_path);
                tokio::select! {
                    _ = token.cancelled() => break,
                    result = task => {
                        if let Err(e) = result {
                            warn!(path = %relative_path, error = %e, "background index entry failed");
                        }
                    }
                }
            }
            worker_capability.clear_background_pool();
        });

        BackgroundIndexer {
            cancellation,
            stopped,
            handle: Some(handle),
            capability,
        }
    }

    /// Idempotent: calling `stop` more than once, or after the worker has
    /// already finished on its own, is a no-op beyond the first call.
    pub async fn stop(&mut self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        self.cancellation.cancel();
        if let Some(handle) = self.handle.take() {
            handle.abort();
            let _ = handle.await;
        }
        self.capability.clear_background_pool();
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}
