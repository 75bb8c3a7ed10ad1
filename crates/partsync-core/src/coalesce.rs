//! Trailing-edge call coalescing
//!
//! A `Coalescer` collapses a burst of triggers into a single invocation of
//! its handler, fired once no trigger arrived for a whole window, with the
//! arguments of the last trigger. Each coalescer owns a background task;
//! the handler is awaited inside it, so at most one invocation is running
//! at any time.

use std::future::Future;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::debug;

enum Signal<A> {
    Trigger(A),
    Flush(oneshot::Sender<()>),
    Close,
}

/// Debounced handler invocation
pub struct Coalescer<A> {
    name: &'static str,
    tx: mpsc::UnboundedSender<Signal<A>>,
}

impl<A: Send + 'static> Coalescer<A> {
    /// Spawn a coalescer task on the current Tokio runtime
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn new<F, Fut>(name: &'static str, window: Duration, handler: F) -> Self
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run(name, window, rx, handler));
        Self { name, tx }
    }

    /// Schedule the handler, replacing any pending arguments
    pub fn trigger(&self, args: A) {
        if self.tx.send(Signal::Trigger(args)).is_err() {
            debug!("{} coalescer is closed, trigger dropped", self.name);
        }
    }

    /// Fire a pending invocation now and wait for it to finish
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(Signal::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }

    /// Drop any pending invocation and stop the task
    pub fn close(&self) {
        let _ = self.tx.send(Signal::Close);
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

async fn run<A, F, Fut>(
    name: &'static str,
    window: Duration,
    mut rx: mpsc::UnboundedReceiver<Signal<A>>,
    handler: F,
) where
    F: Fn(A) -> Fut,
    Fut: Future<Output = ()>,
{
    // Idle: wait for the first trigger of a burst
    while let Some(signal) = rx.recv().await {
        let mut pending = match signal {
            Signal::Trigger(args) => Some(args),
            Signal::Flush(done) => {
                let _ = done.send(());
                continue;
            }
            Signal::Close => break,
        };
        let mut flushed = None;

        // Pending: every trigger restarts the window
        loop {
            tokio::select! {
                signal = rx.recv() => match signal {
                    Some(Signal::Trigger(args)) => {
                        pending = Some(args);
                    }
                    Some(Signal::Flush(done)) => {
                        flushed = Some(done);
                        break;
                    }
                    Some(Signal::Close) | None => {
                        debug!("{} coalescer closed with a pending call", name);
                        return;
                    }
                },
                _ = tokio::time::sleep(window) => break,
            }
        }

        if let Some(args) = pending.take() {
            debug!("{} coalescer firing", name);
            handler(args).await;
        }
        if let Some(done) = flushed {
            let _ = done.send(());
        }
    }
    debug!("{} coalescer stopped", name);
}
