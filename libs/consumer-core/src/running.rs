use std::time::Instant;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::task::Task;

/// Bookkeeping for one live handler.
///
/// Owned exclusively by the consumer's main loop (never shared behind a lock — see the
/// crate's single-owner concurrency design). Dropping a `RunningTask` does not stop its
/// handler; the main loop always cancels `stop` before removing one from its map.
pub(crate) struct RunningTask {
    pub task: Task,
    pub stop: CancellationToken,
    pub started_at: Instant,
    /// The wrapper task that awaits the handler and reports its completion. Kept only
    /// so it isn't silently detached; the main loop never awaits this directly — it
    /// learns of completion via the completion channel instead.
    #[allow(dead_code)]
    pub wrapper: JoinHandle<()>,
}
