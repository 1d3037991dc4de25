//! End-to-end demo: a connection with close handlers, an in-flight request,
//! and a shutdown that resolves the request with an indeterminate outcome.
//!
//! Run with: `cargo run --example lifecycle`

use std::sync::Arc;

use bytes::Bytes;
use remoting_core::close::{Closeable, Lifecycle, LifecycleOptions};
use remoting_core::executor::{spawn_notifier_default, TaskExecutor};
use remoting_core::ident::{IdOrigin, NumericId};
use remoting_core::reply::{outcome_channel, OutstandingRequest, ReplyOutcome};
use remoting_core::Result;

struct Connection {
    lifecycle: Lifecycle,
}

impl Connection {
    fn open(executor: Arc<dyn TaskExecutor>) -> Self {
        let options = LifecycleOptions {
            name: "demo connection".into(),
            ..LifecycleOptions::default()
        };
        Self {
            lifecycle: Lifecycle::with_options(executor, options),
        }
    }
}

impl Closeable for Connection {
    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn close_action(&self) -> Result<()> {
        println!("connection teardown ran");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let (notifier, notifier_task) = spawn_notifier_default();
    let executor: Arc<dyn TaskExecutor> = Arc::new(notifier);

    let connection = Connection::open(executor.clone());
    connection.add_close_handler(|| println!("close handler: connection closed"));

    // A request that completes normally.
    let (slot, outcome) = outcome_channel();
    let id = NumericId::new(IdOrigin::Client, 1)?;
    println!("dispatching request {} (wire form {})", id, id.to_wire());
    let request = OutstandingRequest::with_slot(id, slot, executor.clone());
    request.handle_reply(Bytes::from_static(b"pong"))?;
    if let Ok(ReplyOutcome::Reply(payload)) = outcome.await {
        println!("request {} resolved: {:?}", id, payload);
    }

    // A request abandoned by connection shutdown.
    let (slot, outcome) = outcome_channel();
    let id = NumericId::new(IdOrigin::Client, 2)?;
    let inflight = Arc::new(OutstandingRequest::with_slot(id, slot, executor.clone()));
    let wired = inflight.clone();
    connection.add_close_handler(move || {
        let _ = wired.close();
    });

    connection.close()?;
    connection.close()?; // second close: no effect

    match outcome.await {
        Ok(ReplyOutcome::Failure(err)) if err.is_indeterminate() => {
            println!("request {} outcome unknown after shutdown: {}", id, err);
        }
        other => println!("request {} outcome: {:?}", id, other),
    }

    drop(connection);
    drop(inflight);
    drop(executor);
    notifier_task.await.ok();
    Ok(())
}
