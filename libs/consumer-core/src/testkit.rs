//! Coordinator shim for exercising the consumer's testable properties.
//!
//! Not part of the production surface — gated behind the `test-util` feature. The
//! consumer interoperates with it exactly as it would with any other [`Coordinator`],
//! with no special cases: that is the point of the shim.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::coordinator::{Command, ConsumerContext, Coordinator};
use crate::error::WatchError;
use crate::task::Task;

/// A [`Coordinator`] whose [`Coordinator::watch`] is driven by an external push
/// channel, and whose [`Coordinator::done`]/[`Coordinator::release`] calls are
/// observable on separate channels.
///
/// ```ignore
/// let (coordinator, handle) = TestCoordinator::new();
/// handle.announce(Task::new("test1"));
/// // ... run the consumer ...
/// let done = handle.recv_done().await;
/// ```
pub struct TestCoordinator {
    watch_rx: Mutex<tokio::sync::mpsc::UnboundedReceiver<Task>>,
    command_rx: Mutex<tokio::sync::mpsc::UnboundedReceiver<Command>>,
    done_tx: tokio::sync::mpsc::UnboundedSender<Task>,
    release_tx: tokio::sync::mpsc::UnboundedSender<Task>,
    claim_tx: tokio::sync::mpsc::UnboundedSender<Task>,
    closed_tx: tokio::sync::mpsc::UnboundedSender<()>,
    node_id: String,
    /// Outcome the next [`Coordinator::claim`] call reports. Flipped from the handle
    /// via [`TestCoordinatorHandle::set_claim_outcome`] to simulate another node
    /// winning the race.
    claim_accepts: Arc<AtomicBool>,
}

/// The test-side handle paired with a [`TestCoordinator`]: feeds announcements and
/// commands in, observes claim/done/release/close calls out.
pub struct TestCoordinatorHandle {
    watch_tx: tokio::sync::mpsc::UnboundedSender<Task>,
    command_tx: tokio::sync::mpsc::UnboundedSender<Command>,
    done_rx: tokio::sync::mpsc::UnboundedReceiver<Task>,
    release_rx: tokio::sync::mpsc::UnboundedReceiver<Task>,
    claim_rx: tokio::sync::mpsc::UnboundedReceiver<Task>,
    closed_rx: tokio::sync::mpsc::UnboundedReceiver<()>,
    claim_accepts: Arc<AtomicBool>,
}

impl TestCoordinator {
    /// Builds a coordinator/handle pair. `node_id` is what [`Coordinator::node_id`]
    /// will report.
    pub fn new(node_id: impl Into<String>) -> (Self, TestCoordinatorHandle) {
        let (watch_tx, watch_rx) = tokio::sync::mpsc::unbounded_channel();
        let (command_tx, command_rx) = tokio::sync::mpsc::unbounded_channel();
        let (done_tx, done_rx) = tokio::sync::mpsc::unbounded_channel();
        let (release_tx, release_rx) = tokio::sync::mpsc::unbounded_channel();
        let (claim_tx, claim_rx) = tokio::sync::mpsc::unbounded_channel();
        let (closed_tx, closed_rx) = tokio::sync::mpsc::unbounded_channel();
        let claim_accepts = Arc::new(AtomicBool::new(true));

        let coordinator = Self {
            watch_rx: Mutex::new(watch_rx),
            command_rx: Mutex::new(command_rx),
            done_tx,
            release_tx,
            claim_tx,
            closed_tx,
            node_id: node_id.into(),
            claim_accepts: claim_accepts.clone(),
        };
        let handle = TestCoordinatorHandle {
            watch_tx,
            command_tx,
            done_rx,
            release_rx,
            claim_rx,
            closed_rx,
            claim_accepts,
        };
        (coordinator, handle)
    }
}

#[async_trait]
impl Coordinator for TestCoordinator {
    async fn init(&self, _ctx: &ConsumerContext) -> anyhow::Result<()> {
        Ok(())
    }

    fn node_id(&self) -> String {
        self.node_id.clone()
    }

    async fn watch(&self) -> Result<Task, WatchError> {
        let mut rx = self.watch_rx.lock().await;
        match rx.recv().await {
            Some(task) => Ok(task),
            None => Err(WatchError::Closed),
        }
    }

    async fn claim(&self, task: &Task) -> anyhow::Result<bool> {
        let _ = self.claim_tx.send(task.clone());
        Ok(self.claim_accepts.load(Ordering::SeqCst))
    }

    async fn release(&self, task: &Task) -> anyhow::Result<()> {
        let _ = self.release_tx.send(task.clone());
        Ok(())
    }

    async fn done(&self, task: &Task) -> anyhow::Result<()> {
        let _ = self.done_tx.send(task.clone());
        Ok(())
    }

    async fn next_command(&self) -> anyhow::Result<Option<Command>> {
        let mut rx = self.command_rx.lock().await;
        Ok(rx.recv().await)
    }

    async fn close(&self) -> anyhow::Result<()> {
        let _ = self.closed_tx.send(());
        Ok(())
    }
}

impl TestCoordinatorHandle {
    pub fn announce(&self, task: Task) {
        let _ = self.watch_tx.send(task);
    }

    pub fn send_command(&self, command: Command) {
        let _ = self.command_tx.send(command);
    }

    /// Sets the outcome the coordinator's `claim` reports for every subsequent call,
    /// simulating another node winning (`false`) or losing (`true`, the default) the
    /// claim race. Applies to all claims made after this call, not just the next one.
    pub fn set_claim_outcome(&self, accepts: bool) {
        self.claim_accepts.store(accepts, Ordering::SeqCst);
    }

    /// Closes the watch stream: the next `watch()` call (and any already-blocked one)
    /// returns [`WatchError::Closed`].
    pub fn close_watch(&mut self) {
        // Dropping the sender causes `recv()` to observe end-of-stream.
        let (empty_tx, _) = tokio::sync::mpsc::unbounded_channel();
        let _ = std::mem::replace(&mut self.watch_tx, empty_tx);
    }

    pub async fn recv_claim(&mut self) -> Option<Task> {
        self.claim_rx.recv().await
    }

    pub async fn recv_done(&mut self) -> Option<Task> {
        self.done_rx.recv().await
    }

    pub async fn recv_release(&mut self) -> Option<Task> {
        self.release_rx.recv().await
    }

    pub async fn recv_closed(&mut self) -> Option<()> {
        self.closed_rx.recv().await
    }

    pub fn try_recv_done(&mut self) -> Option<Task> {
        self.done_rx.try_recv().ok()
    }

    pub fn try_recv_release(&mut self) -> Option<Task> {
        self.release_rx.try_recv().ok()
    }
}
