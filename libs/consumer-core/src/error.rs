/// Error returned by [`crate::Coordinator::watch`].
///
/// Distinguished from the crate's blanket `anyhow::Result` use elsewhere because the
/// consumer's main loop must treat these two cases very differently: `Transient` is
/// logged and retried after a short backoff, while `Closed` triggers the same drain
/// path as an explicit `Consumer::shutdown`.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// The coordinator has been closed (or will never produce another announcement);
    /// the consumer should stop watching and begin draining.
    #[error("coordinator watch closed")]
    Closed,

    /// A recoverable failure (e.g. a network blip against the backing store). The
    /// consumer logs this and retries after a brief backoff.
    #[error("transient coordinator watch error")]
    Transient(#[source] anyhow::Error),
}
