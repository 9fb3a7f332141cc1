//! A single-node runtime for claim-and-run task distribution.
//!
//! This crate is the node-local half of a distributed task consumer: given a
//! [`Coordinator`] that announces work and arbitrates ownership, a [`HandlerFactory`]
//! that turns an announced [`Task`] into runnable work, and a [`Balancer`] that decides
//! how much of that work this node should take on, [`Consumer`] runs the claim/dispatch/
//! release loop and contains handler panics so one bad task can't take the node down.
//!
//! # What this crate is not
//! It does not implement a coordination backend (no KV store, no consensus protocol —
//! bring your own [`Coordinator`]), does not parse configuration (build a
//! [`ConsumerConfig`] however your application already does configuration), and does not
//! install a logging subscriber (it only emits [`tracing`] events; wire up
//! `tracing-subscriber` or equivalent in your binary).
//!
//! # Concurrency model
//! The set of currently-running tasks is owned exclusively by the task running
//! [`Consumer::run`] — it is a plain `HashMap` local to that function, never a struct
//! field behind a lock. Everything else (announcements, administrative commands,
//! balance ticks, handler completions) is funneled into that one loop through channels
//! and handled via [`tokio::select!`]. [`Consumer::tasks`] reads a point-in-time
//! snapshot published through an [`arc_swap::ArcSwap`] after every mutation, so callers
//! never contend with the main loop for a lock.
//!
//! Handler panics are contained the way `tokio` tasks always contain panics: each
//! handler invocation runs inside its own spawned task, and the wrapper that awaits it
//! inspects [`tokio::task::JoinError::is_panic`] rather than using
//! `std::panic::catch_unwind`.

mod balancer;
mod consumer;
mod coordinator;
mod error;
mod handler;
mod running;
mod task;

#[cfg(any(test, feature = "test-util"))]
pub mod testkit;

pub use balancer::{Balancer, BalancerContext, BalancerInitContext, ClaimDecision, DumbBalancer, RunningTaskView};
pub use consumer::{Consumer, ConsumerConfig};
pub use coordinator::{Command, ConsumerContext, Coordinator};
pub use error::WatchError;
pub use handler::{Handler, HandlerFactory, SimpleHandler};
pub use task::Task;
