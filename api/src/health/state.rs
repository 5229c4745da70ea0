use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Process is alive
    Ok,
    /// Listener bound, accepting traffic
    Ready,
    /// Still starting up
    Starting,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
}

impl HealthResponse {
    pub fn new(status: HealthStatus) -> Self {
        Self { status }
    }
}

/// Readiness flag flipped once the server is bound.
#[derive(Debug, Clone)]
pub struct Readiness {
    ready: Arc<AtomicBool>,
    created_at: Instant,
}

impl Default for Readiness {
    fn default() -> Self {
        Self::new()
    }
}

impl Readiness {
    pub fn new() -> Self {
        Self {
            ready: Arc::new(AtomicBool::new(false)),
            created_at: Instant::now(),
        }
    }

    pub fn mark_ready(&self) {
        if !self.ready.swap(true, Ordering::SeqCst) {
            info!(
                startup_ms = %self.created_at.elapsed().as_millis(),
                "Service marked as ready"
            );
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> HealthStatus {
        if self.is_ready() {
            HealthStatus::Ready
        } else {
            HealthStatus::Starting
        }
    }
}
