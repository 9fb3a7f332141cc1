//! Minimal end-to-end wiring: a coordinator fed by hand, a handler that just sleeps
//! until told to stop, and a graceful shutdown after a short delay.
//!
//! Run with: `cargo run --example minimal --features test-util`

use std::sync::Arc;
use std::time::Duration;

use consumer_core::{Consumer, ConsumerConfig, DumbBalancer, Handler, HandlerFactory, SimpleHandler, Task};

#[cfg(feature = "test-util")]
use consumer_core::testkit::TestCoordinator;

#[cfg(not(feature = "test-util"))]
fn main() {
    eprintln!("run with --features test-util");
}

#[cfg(feature = "test-util")]
#[tokio::main]
async fn main() {
    tracing_subscriber_init();

    let (coordinator, mut handle) = TestCoordinator::new("node-local-demo");

    let handler_factory: Arc<dyn HandlerFactory> = Arc::new(|task: &Task| {
        let task = task.clone();
        Some(Arc::new(SimpleHandler::new(task.clone(), move |task, stop| {
            let task = task.clone();
            async move {
                println!("starting {task}");
                stop.cancelled().await;
                println!("{task} observed stop; releasing");
                false
            }
        })) as Arc<dyn Handler>)
    });

    let consumer = Arc::new(Consumer::new(
        Arc::new(coordinator),
        handler_factory,
        Arc::new(DumbBalancer),
        ConsumerConfig::default(),
    ));

    handle.announce(Task::new("demo-task-1"));
    handle.announce(Task::new("demo-task-2"));

    let run_consumer = consumer.clone();
    let run_handle = tokio::spawn(async move { run_consumer.run().await });

    tokio::time::sleep(Duration::from_millis(50)).await;
    println!("running: {:?}", consumer.tasks().iter().map(|t| t.task.to_string()).collect::<Vec<_>>());

    consumer.shutdown().await;
    run_handle.await.unwrap();

    while let Some(task) = handle.try_recv_release() {
        println!("released: {task}");
    }
}

#[cfg(feature = "test-util")]
fn tracing_subscriber_init() {
    // Left to the embedding application in the library itself; the example installs a
    // bare-bones one just so `tracing` events are visible when run directly.
    let _ = tracing::subscriber::set_global_default(tracing_subscriber::FmtSubscriber::default());
}
