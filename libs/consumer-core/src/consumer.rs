use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use rand::Rng;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::balancer::{Balancer, BalancerContext, BalancerInitContext, RunningTaskView};
use crate::coordinator::{Command, ConsumerContext, Coordinator};
use crate::error::WatchError;
use crate::handler::{Handler, HandlerFactory};
use crate::running::RunningTask;
use crate::task::Task;

/// Configuration recognized by the consumer core.
///
/// No parsing lives here — turning a config file or environment variables into this
/// struct is the embedding application's job (see crate docs).
#[derive(Clone, Debug)]
pub struct ConsumerConfig {
    /// Base period between balance ticks. May be [`Duration::ZERO`] for test
    /// harnesses, meaning "balance on the next scheduler opportunity".
    pub balance_period: Duration,
    /// Additive random jitter applied to `balance_period` on every tick, to decorrelate
    /// nodes that started around the same time.
    pub balance_jitter_max: Duration,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            balance_period: Duration::from_secs(10 * 60),
            balance_jitter_max: Duration::from_secs(30),
        }
    }
}

enum Outcome {
    Done,
    Release,
}

struct Completion {
    task: Task,
    outcome: Outcome,
}

/// The per-node consumer loop.
///
/// Owns no mutable state behind a lock: the running-task map lives as a local variable
/// inside [`Consumer::run`], mutated only by that one task (see the crate's
/// single-owner concurrency design). [`Consumer::tasks`] reads a snapshot the loop
/// publishes through an [`arc_swap::ArcSwap`] after every mutation.
pub struct Consumer {
    coordinator: Arc<dyn Coordinator>,
    handler_factory: Arc<dyn HandlerFactory>,
    balancer: Arc<dyn Balancer>,
    config: ConsumerConfig,

    shutdown: CancellationToken,
    started: AtomicBool,
    finished: AtomicBool,
    finished_notify: Notify,

    tasks_view: ArcSwap<Vec<RunningTaskView>>,
    node_id: ArcSwap<String>,
}

impl Consumer {
    /// Wires collaborators. Does not start any work.
    ///
    /// Rust's ownership model means a caller can never hand this constructor a "nil"
    /// `Arc<dyn Trait>` — the construction-failure class this design originally guarded
    /// against (nil collaborators) has no counterpart here, so this is infallible. See
    /// DESIGN.md for this Open Question's resolution.
    pub fn new(
        coordinator: Arc<dyn Coordinator>,
        handler_factory: Arc<dyn HandlerFactory>,
        balancer: Arc<dyn Balancer>,
        config: ConsumerConfig,
    ) -> Self {
        Self {
            coordinator,
            handler_factory,
            balancer,
            config,
            shutdown: CancellationToken::new(),
            started: AtomicBool::new(false),
            finished: AtomicBool::new(false),
            finished_notify: Notify::new(),
            tasks_view: ArcSwap::from_pointee(Vec::new()),
            node_id: ArcSwap::from_pointee(String::new()),
        }
    }

    /// Point-in-time snapshot of currently-running tasks. Thread-safe, stable under
    /// concurrent mutation by the main loop.
    pub fn tasks(&self) -> Vec<RunningTaskView> {
        (**self.tasks_view.load()).clone()
    }

    /// Initiates graceful termination. Idempotent; blocks until [`Consumer::run`] has
    /// fully returned. Safe to call concurrently with `run` from another task.
    pub async fn shutdown(&self) {
        // Registering interest before checking `finished` (rather than after) is the
        // pattern `Notify` requires for correctness: `notify_waiters` only wakes
        // `Notified` futures that already exist, so constructing ours second could race
        // `run_loop`'s own store-then-notify and miss the wakeup forever.
        let notified = self.finished_notify.notified();
        self.shutdown.cancel();
        if self.finished.load(Ordering::Acquire) {
            return;
        }
        notified.await;
    }

    /// Runs the main loop until shutdown is observed or the watcher terminates.
    /// Returns only once every handler has stopped and `Coordinator::close` has been
    /// called. Never surfaces an error through its return value — see §7 of the crate's
    /// design notes for why.
    ///
    /// # Panics
    /// Panics if called while a previous call to `run` on the same `Consumer` is still
    /// active; calling it a second time after the first has returned is not supported
    /// either, since the main-loop channels are not reconstructed.
    pub async fn run(&self) {
        if self.started.swap(true, Ordering::AcqRel) {
            panic!("Consumer::run called while a previous run is already active");
        }

        let ctx = ConsumerContext::new();
        if let Err(err) = self.coordinator.init(&ctx).await {
            error!(error = %err, "coordinator init failed");
        }
        let node_id = self.coordinator.node_id();
        self.node_id.store(Arc::new(node_id.clone()));
        self.balancer.init(&BalancerInitContext::new(node_id)).await;

        self.run_loop().await;

        self.finished.store(true, Ordering::Release);
        self.finished_notify.notify_waiters();
    }

    fn views(&self, running: &HashMap<String, RunningTask>) -> Vec<RunningTaskView> {
        running
            .values()
            .map(|rt| RunningTaskView {
                task: rt.task.clone(),
                started_at: rt.started_at,
            })
            .collect()
    }

    fn balancer_context(&self, running: &HashMap<String, RunningTask>) -> BalancerContext {
        BalancerContext::new((**self.node_id.load()).clone(), self.views(running))
    }

    fn publish_snapshot(&self, running: &HashMap<String, RunningTask>) {
        self.tasks_view.store(Arc::new(self.views(running)));
    }

    fn next_balance_delay(&self) -> Duration {
        let jitter = self.config.balance_jitter_max;
        if jitter.is_zero() {
            return self.config.balance_period;
        }
        let jitter_ms = u64::try_from(jitter.as_millis()).unwrap_or(u64::MAX);
        let extra = rand::thread_rng().gen_range(0..=jitter_ms);
        self.config.balance_period + Duration::from_millis(extra)
    }

    fn spawn_handler(
        &self,
        task: Task,
        handler: Arc<dyn Handler>,
        completion_tx: mpsc::UnboundedSender<Completion>,
    ) -> RunningTask {
        let stop = CancellationToken::new();
        let stop_for_handler = stop.clone();
        let task_for_log = task.clone();
        let task_for_completion = task.clone();

        let wrapper = tokio::spawn(async move {
            let inner = tokio::spawn(async move { handler.run(stop_for_handler).await });
            let outcome = match inner.await {
                Ok(true) => Outcome::Done,
                Ok(false) => Outcome::Release,
                Err(join_err) => {
                    if join_err.is_panic() {
                        error!(task = %task_for_log, "handler panicked; treating as Done");
                    } else {
                        warn!(task = %task_for_log, "handler task did not finish normally; treating as Done");
                    }
                    Outcome::Done
                }
            };
            let _ = completion_tx.send(Completion {
                task: task_for_completion,
                outcome,
            });
        });

        RunningTask {
            task,
            stop,
            started_at: Instant::now(),
            wrapper,
        }
    }

    async fn handle_completion(
        &self,
        running: &mut HashMap<String, RunningTask>,
        completion: Completion,
    ) {
        if running.remove(completion.task.id()).is_none() {
            // Already removed (shouldn't happen — each handler reports exactly once —
            // but guards against a misbehaving test double sending a duplicate).
            return;
        }
        match completion.outcome {
            Outcome::Done => {
                if let Err(err) = self.coordinator.done(&completion.task).await {
                    warn!(task = %completion.task, error = %err, "Coordinator::done failed");
                }
            }
            Outcome::Release => {
                if let Err(err) = self.coordinator.release(&completion.task).await {
                    warn!(task = %completion.task, error = %err, "Coordinator::release failed");
                }
            }
        }
    }

    async fn handle_announcement(
        &self,
        running: &mut HashMap<String, RunningTask>,
        completion_tx: &mpsc::UnboundedSender<Completion>,
        task: Task,
    ) {
        if running.contains_key(task.id()) {
            debug!(task = %task, "duplicate announcement for already-running task; dropping");
            return;
        }

        let decision = self
            .balancer
            .can_claim(&task, &self.balancer_context(running))
            .await;
        if !decision.accept {
            debug!(task = %task, "balancer declined claim");
            return;
        }

        match self.coordinator.claim(&task).await {
            Ok(true) => match self.handler_factory.create(&task) {
                Some(handler) => {
                    let rt = self.spawn_handler(task.clone(), handler, completion_tx.clone());
                    if self.shutdown.is_cancelled() {
                        // Shutdown raced the claim and won; spawn-then-stop keeps the
                        // lifecycle invariants simple (see crate docs, S7).
                        rt.stop.cancel();
                    }
                    running.insert(task.into_id(), rt);
                }
                None => {
                    warn!(task = %task, "handler factory returned no handler; releasing claim");
                    if let Err(err) = self.coordinator.release(&task).await {
                        warn!(task = %task, error = %err, "Coordinator::release failed");
                    }
                }
            },
            Ok(false) => {
                debug!(task = %task, "claim lost to another node");
            }
            Err(err) => {
                warn!(task = %task, error = %err, "Coordinator::claim failed");
            }
        }
    }

    fn release_by_id(&self, running: &HashMap<String, RunningTask>, id: &str) {
        match running.get(id) {
            Some(rt) => rt.stop.cancel(),
            None => {
                debug!(task = %id, "release requested for a task that is not running; ignoring")
            }
        }
    }

    async fn run_loop(&self) {
        let mut running: HashMap<String, RunningTask> = HashMap::new();
        let (task_tx, mut task_rx) = mpsc::channel::<Task>(64);
        let (command_tx, mut command_rx) = mpsc::channel::<Command>(16);
        let (completion_tx, mut completion_rx) = mpsc::unbounded_channel::<Completion>();

        let watch_handle: JoinHandle<()> = tokio::spawn(Self::watch_feeder(
            self.coordinator.clone(),
            task_tx,
            self.shutdown.clone(),
        ));
        let command_handle: JoinHandle<()> = tokio::spawn(Self::command_feeder(
            self.coordinator.clone(),
            command_tx,
            self.shutdown.clone(),
        ));

        let mut balance_sleep = Box::pin(tokio::time::sleep(self.next_balance_delay()));
        let mut command_closed = false;

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    break;
                }
                maybe_task = task_rx.recv() => {
                    match maybe_task {
                        Some(task) => {
                            self.handle_announcement(&mut running, &completion_tx, task).await;
                            self.publish_snapshot(&running);
                        }
                        None => {
                            // Watch feeder exited (coordinator closed); stop accepting new
                            // announcements and proceed straight to draining.
                            break;
                        }
                    }
                }
                maybe_cmd = command_rx.recv(), if !command_closed => {
                    match maybe_cmd {
                        Some(Command::Release(id)) => self.release_by_id(&running, &id),
                        None => {
                            // Command feeder exited; the channel will never yield again, so
                            // stop polling it rather than spin this arm every loop iteration.
                            command_closed = true;
                        }
                    }
                }
                () = &mut balance_sleep => {
                    balance_sleep
                        .as_mut()
                        .reset(tokio::time::Instant::now() + self.next_balance_delay());
                    let ids = self.balancer.balance(&self.balancer_context(&running)).await;
                    for id in ids {
                        self.release_by_id(&running, &id);
                    }
                }
                maybe_completion = completion_rx.recv() => {
                    if let Some(completion) = maybe_completion {
                        self.handle_completion(&mut running, completion).await;
                        self.publish_snapshot(&running);
                    }
                }
            }
        }

        // Drain: broadcast stop to every live handler, then wait for each one's
        // completion path to run exactly once.
        for rt in running.values() {
            rt.stop.cancel();
        }
        while !running.is_empty() {
            match completion_rx.recv().await {
                Some(completion) => {
                    self.handle_completion(&mut running, completion).await;
                    self.publish_snapshot(&running);
                }
                None => break,
            }
        }

        watch_handle.abort();
        command_handle.abort();

        if let Err(err) = self.coordinator.close().await {
            warn!(error = %err, "Coordinator::close failed");
        }
        info!("consumer shut down");
    }

    async fn watch_feeder(
        coordinator: Arc<dyn Coordinator>,
        task_tx: mpsc::Sender<Task>,
        shutdown: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return,
                watched = coordinator.watch() => {
                    match watched {
                        Ok(task) => {
                            if task_tx.send(task).await.is_err() {
                                return;
                            }
                        }
                        Err(WatchError::Closed) => {
                            info!("coordinator watch closed; stopping feeder");
                            return;
                        }
                        Err(WatchError::Transient(err)) => {
                            warn!(error = %err, "transient watch error; backing off");
                            tokio::select! {
                                _ = tokio::time::sleep(Duration::from_millis(200)) => {}
                                _ = shutdown.cancelled() => return,
                            }
                        }
                    }
                }
            }
        }
    }

    async fn command_feeder(
        coordinator: Arc<dyn Coordinator>,
        command_tx: mpsc::Sender<Command>,
        shutdown: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return,
                next = coordinator.next_command() => {
                    match next {
                        Ok(Some(cmd)) => {
                            if command_tx.send(cmd).await.is_err() {
                                return;
                            }
                        }
                        Ok(None) => return,
                        Err(err) => {
                            warn!(error = %err, "command channel error; backing off");
                            tokio::select! {
                                _ = tokio::time::sleep(Duration::from_millis(200)) => {}
                                _ = shutdown.cancelled() => return,
                            }
                        }
                    }
                }
            }
        }
    }
}
