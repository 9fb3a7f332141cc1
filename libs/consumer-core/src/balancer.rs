use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::task::Task;

/// Read-only view of one currently-running task, handed out to balancer implementations.
///
/// Always a clone taken at the moment of the call — never a live pointer into the
/// consumer's internal map, per the crate's no-cyclic-ownership design note.
#[derive(Clone, Debug)]
pub struct RunningTaskView {
    pub task: Task,
    pub started_at: Instant,
}

impl RunningTaskView {
    /// How long ago this task's claim was granted.
    pub fn claim_age(&self) -> Duration {
        self.started_at.elapsed()
    }
}

/// Snapshot of consumer state exposed to a [`Balancer`], rebuilt fresh on every call.
#[derive(Clone, Debug)]
pub struct BalancerContext {
    node_id: String,
    tasks: Vec<RunningTaskView>,
}

impl BalancerContext {
    pub(crate) fn new(node_id: String, tasks: Vec<RunningTaskView>) -> Self {
        Self { node_id, tasks }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn tasks(&self) -> &[RunningTaskView] {
        &self.tasks
    }
}

/// Context handed to [`Balancer::init`].
#[derive(Clone, Debug)]
pub struct BalancerInitContext {
    node_id: String,
}

impl BalancerInitContext {
    pub fn new(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }
}

/// Outcome of [`Balancer::can_claim`].
#[derive(Clone, Copy, Debug)]
pub struct ClaimDecision {
    pub accept: bool,
    /// Advisory hint for when the balancer would like to be asked again; the consumer
    /// never waits on this, it only logs it.
    pub defer_until: Instant,
}

impl ClaimDecision {
    /// `accept = true`, with no deferral hint.
    pub fn accept_now() -> Self {
        Self {
            accept: true,
            defer_until: Instant::now(),
        }
    }

    /// `accept = false`, re-evaluate no sooner than `defer_until`.
    pub fn defer_until(until: Instant) -> Self {
        Self {
            accept: false,
            defer_until: until,
        }
    }
}

/// Pluggable fleet-load policy: decides whether to accept a newly-announced claim, and
/// which currently-running tasks to release on a periodic rebalance tick.
///
/// # Contract
/// `can_claim` is invoked synchronously on the consumer's main loop before it decides
/// whether to call [`crate::Coordinator::claim`] — the consumer never blocks waiting on
/// `defer_until`; it is advisory only. A minimal implementation is [`DumbBalancer`].
#[async_trait]
pub trait Balancer: Send + Sync + 'static {
    /// Binds the node identity. Default is a no-op.
    async fn init(&self, _ctx: &BalancerInitContext) {}

    /// Whether to proceed with claiming `task`.
    async fn can_claim(&self, task: &Task, ctx: &BalancerContext) -> ClaimDecision;

    /// Ids of currently-running tasks to release, invoked periodically.
    async fn balance(&self, ctx: &BalancerContext) -> Vec<String>;
}

/// A [`Balancer`] with no policy: accepts every task, never releases anything.
#[derive(Clone, Copy, Debug, Default)]
pub struct DumbBalancer;

#[async_trait]
impl Balancer for DumbBalancer {
    async fn can_claim(&self, _task: &Task, _ctx: &BalancerContext) -> ClaimDecision {
        ClaimDecision::accept_now()
    }

    async fn balance(&self, _ctx: &BalancerContext) -> Vec<String> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dumb_balancer_accepts_and_never_releases() {
        let b = DumbBalancer;
        let ctx = BalancerContext::new("node-1".into(), vec![]);
        let decision = b.can_claim(&Task::new("t"), &ctx).await;
        assert!(decision.accept);
        assert!(b.balance(&ctx).await.is_empty());
    }
}
