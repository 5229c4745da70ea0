//! Detached work that may outlive the request that started it.

pub mod cancel;

pub use cancel::*;

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::Notify;
use tracing::{Instrument, debug, info, info_span, warn};

/// Executor for follow-up work.
///
/// Tasks are not awaited by the request. Each one is tracked so shutdown can
/// wait for in-flight work, and each runs under a cancellation token: a
/// cancelled task is dropped at its next suspension point.
#[derive(Debug, Clone)]
pub struct BackgroundTasks {
    shutdown: CancelToken,
    in_flight: Arc<AtomicUsize>,
    idle: Arc<Notify>,
}

impl Default for BackgroundTasks {
    fn default() -> Self {
        Self::new()
    }
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self {
            shutdown: CancelToken::new(),
            in_flight: Arc::new(AtomicUsize::new(0)),
            idle: Arc::new(Notify::new()),
        }
    }

    /// Server-wide token; per-request tokens are children of it.
    pub fn shutdown_token(&self) -> &CancelToken {
        &self.shutdown
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn spawn<F>(&self, name: &'static str, cancel: CancelToken, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let guard = InFlight {
            count: self.in_flight.clone(),
            idle: self.idle.clone(),
        };

        let span = info_span!("background_task", task = name);
        tokio::spawn(
            async move {
                let _guard = guard;
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("Background task cancelled before completion");
                    }
                    _ = task => {
                        debug!("Background task finished");
                    }
                }
            }
            .instrument(span),
        );
    }

    /// Cancel outstanding work and wait up to `timeout` for it to wind down.
    ///
    /// Returns `true` when every task finished in time.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        self.shutdown.cancel();

        let drained = self.wait_idle(timeout).await;
        if drained {
            info!("Background tasks drained");
        } else {
            warn!(
                remaining = self.in_flight(),
                "Background tasks still running at shutdown timeout"
            );
        }
        drained
    }

    /// Wait up to `timeout` for every task to finish, without cancelling.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, async {
            loop {
                let notified = self.idle.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();
                if self.in_flight() == 0 {
                    return;
                }
                notified.await;
            }
        })
        .await
        .is_ok()
    }
}

struct InFlight {
    count: Arc<AtomicUsize>,
    idle: Arc<Notify>,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if self.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }
}
