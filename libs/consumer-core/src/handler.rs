use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::task::Task;

/// Executes one claimed task.
///
/// `run` is spawned on its own `tokio` task by the consumer; it may block (cooperatively,
/// by awaiting) arbitrarily long, including until `stop` is observed to be cancelled.
///
/// Returning `true` means the task is complete and should be marked Done. Returning
/// `false` means the task should be released back to the pool for another node to pick
/// up — this is the expected response to `stop` being cancelled.
///
/// A panic escaping `run` is caught by the consumer (tokio isolates panics per task) and
/// treated identically to returning `true`: see the module-level docs on `Consumer` for
/// why a crashing handler is terminal rather than retried.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    async fn run(self: Arc<Self>, stop: CancellationToken) -> bool;
}

type SimpleHandlerFn =
    dyn Fn(Task, CancellationToken) -> Pin<Box<dyn Future<Output = bool> + Send>> + Send + Sync;

/// Adapts a plain async function into a [`Handler`].
///
/// ```ignore
/// let handler = SimpleHandler::new(task.clone(), |task, stop| async move {
///     stop.cancelled().await;
///     true
/// });
/// ```
pub struct SimpleHandler {
    task: Task,
    f: Arc<SimpleHandlerFn>,
}

impl SimpleHandler {
    pub fn new<F, Fut>(task: Task, f: F) -> Self
    where
        F: Fn(Task, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        Self {
            task,
            f: Arc::new(move |task, stop| Box::pin(f(task, stop))),
        }
    }
}

#[async_trait]
impl Handler for SimpleHandler {
    async fn run(self: Arc<Self>, stop: CancellationToken) -> bool {
        (self.f)(self.task.clone(), stop).await
    }
}

/// Maps an announced [`Task`] to the [`Handler`] that should execute it.
///
/// Returning `None` signals that no handler could be constructed for this task (an
/// application-level misconfiguration, not a coordination error); the consumer releases
/// the claim and logs a warning rather than crashing.
pub trait HandlerFactory: Send + Sync + 'static {
    fn create(&self, task: &Task) -> Option<Arc<dyn Handler>>;
}

impl<F> HandlerFactory for F
where
    F: Fn(&Task) -> Option<Arc<dyn Handler>> + Send + Sync + 'static,
{
    fn create(&self, task: &Task) -> Option<Arc<dyn Handler>> {
        self(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn simple_handler_observes_stop() {
        let stop = CancellationToken::new();
        let handler = Arc::new(SimpleHandler::new(Task::new("t1"), |_task, stop| async move {
            stop.cancelled().await;
            false
        }));

        let stop_clone = stop.clone();
        let join = tokio::spawn(async move { handler.run(stop_clone).await });

        stop.cancel();
        assert!(!join.await.unwrap());
    }

    #[tokio::test]
    async fn handler_factory_closure_blanket_impl() {
        let factory: Arc<dyn HandlerFactory> = Arc::new(|task: &Task| {
            Some(Arc::new(SimpleHandler::new(task.clone(), |_t, _s| async { true })) as Arc<dyn Handler>)
        });
        assert!(factory.create(&Task::new("x")).is_some());
    }
}
