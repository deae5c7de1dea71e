//! Serial request queue: one job in flight, FIFO, fixed pause after each job.

use std::{
    fmt::Display,
    future::Future,
    pin::Pin,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, warn};

type Job = Pin<Box<dyn Future<Output = ()> + Send>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RequestQueueError {
    #[error("request queue closed")]
    Closed,
}

/// Throttles outbound calls so that at most one runs at a time, with
/// `interval` between the end of one job and the start of the next.
///
/// Cloning shares the same worker. The worker stops once every clone is dropped.
#[derive(Clone)]
pub struct RequestQueue {
    sender: mpsc::UnboundedSender<Job>,
    pending: Arc<AtomicUsize>,
}

impl RequestQueue {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(1000);

    /// Must be called from within a Tokio runtime.
    pub fn new(interval: Duration) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let pending = Arc::new(AtomicUsize::new(0));
        tokio::spawn(drain(receiver, pending.clone(), interval));
        Self { sender, pending }
    }

    /// Jobs submitted but not yet finished, including the one running.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Enqueue `request`. Submission happens when `add` is called, not when
    /// the returned future is first polled, so call order is execution order.
    ///
    /// A failing job is logged and the queue moves on; the error is delivered
    /// to this caller only.
    pub fn add<F, Fut, T, E>(
        &self,
        request: F,
    ) -> impl Future<Output = Result<T, E>> + Send + 'static
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: From<RequestQueueError> + Display + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job: Job = Box::pin(async move {
            let result = request().await;
            if let Err(e) = &result {
                warn!(error = %e, "Queued request failed");
            }
            if tx.send(result).is_err() {
                debug!("Queued request finished after its caller went away");
            }
        });

        self.pending.fetch_add(1, Ordering::SeqCst);
        let enqueued = self.sender.send(job).map_err(|_| {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            RequestQueueError::Closed
        });

        async move {
            enqueued?;
            rx.await.map_err(|_| RequestQueueError::Closed)?
        }
    }
}

async fn drain(
    mut receiver: mpsc::UnboundedReceiver<Job>,
    pending: Arc<AtomicUsize>,
    interval: Duration,
) {
    while let Some(job) = receiver.recv().await {
        // Run on its own task so a panicking job cannot take the worker down.
        if let Err(e) = tokio::spawn(job).await {
            error!(error = %e, "Queued request panicked");
        }
        pending.fetch_sub(1, Ordering::SeqCst);
        tokio::time::sleep(interval).await;
    }
    debug!("Request queue closed");
}
