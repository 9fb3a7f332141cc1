use async_trait::async_trait;

use crate::error::WatchError;
use crate::task::Task;

/// Context handed to [`Coordinator::init`]. Deliberately empty today — it exists as an
/// extension point (the original design hangs a logger off it, which this crate leaves
/// to the embedding application's `tracing` subscriber; see crate docs) rather than to
/// carry node identity, which flows the other way: see [`Coordinator::node_id`].
#[derive(Clone, Copy, Debug, Default)]
pub struct ConsumerContext {
    _private: (),
}

impl ConsumerContext {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Advisory command delivered out-of-band, e.g. by an operator tool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Release the named task as though the balancer had returned its id from `balance`.
    Release(String),
}

/// The external coordination service the consumer depends on: streams announced tasks,
/// grants/releases claims, and reports completion.
///
/// Implementations are commonly backed by a distributed KV store or consensus service;
/// that backend is explicitly out of scope for this crate (see crate docs) — only the
/// contract is specified here.
///
/// # Calling discipline
/// [`Coordinator::watch`] is called only from a single dedicated task (because it is
/// expected to block). [`Coordinator::next_command`] likewise has its own dedicated
/// caller task. Every other method is called only from the consumer's main loop, never
/// concurrently with itself.
#[async_trait]
pub trait Coordinator: Send + Sync + 'static {
    /// One-time setup hook, called once before the main loop starts.
    async fn init(&self, ctx: &ConsumerContext) -> anyhow::Result<()>;

    /// This node's identity, as known to the coordinator (e.g. its cluster membership
    /// id). Used in log fields and passed to the balancer context. Queried once, right
    /// after `init` returns; the default is an empty string for coordinators that have
    /// no concept of node identity.
    fn node_id(&self) -> String {
        String::new()
    }

    /// Produces the next announced task, blocking until one is available, the
    /// coordinator is closed, or an error occurs. Multiple calls return distinct
    /// announcements, in the order the coordinator intends them to be processed.
    async fn watch(&self) -> Result<Task, WatchError>;

    /// Attempts to acquire exclusive ownership of `task`.
    ///
    /// `Ok(true)` means this consumer won the race; `Ok(false)` means another node won —
    /// a normal outcome, not an error.
    async fn claim(&self, task: &Task) -> anyhow::Result<bool>;

    /// Relinquishes a previously-claimed task without completion; it becomes eligible
    /// for re-announcement.
    async fn release(&self, task: &Task) -> anyhow::Result<()>;

    /// Marks a previously-claimed task terminally complete; it must not be
    /// re-announced.
    async fn done(&self, task: &Task) -> anyhow::Result<()>;

    /// Polls the optional administrative command channel.
    ///
    /// The default implementation never resolves, which is the correct behavior for a
    /// coordinator with no command channel — the consumer simply never receives a
    /// command from it.
    async fn next_command(&self) -> anyhow::Result<Option<Command>> {
        std::future::pending().await
    }

    /// Releases coordinator-side resources. Called exactly once, during consumer
    /// shutdown, after every handler has terminated.
    async fn close(&self) -> anyhow::Result<()>;
}
