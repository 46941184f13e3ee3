use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Receiver of healthy/unhealthy events at each stage boundary.
pub trait HealthSignal: Send + Sync {
    fn healthy(&self);
    fn unhealthy(&self);
}

/// Tracks the latest health state and logs transitions.
#[derive(Debug)]
pub struct HealthTracker {
    healthy: AtomicBool,
    consecutive_failures: AtomicU32,
}

impl HealthTracker {
    pub fn new() -> Self {
        Self {
            healthy: AtomicBool::new(true),
            consecutive_failures: AtomicU32::new(0),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Relaxed)
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }
}

impl Default for HealthTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthSignal for HealthTracker {
    fn healthy(&self) {
        self.consecutive_failures.store(0, Ordering::Relaxed);
        if !self.healthy.swap(true, Ordering::Relaxed) {
            tracing::info!("Health restored");
        }
    }

    fn unhealthy(&self) {
        let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        if self.healthy.swap(false, Ordering::Relaxed) {
            tracing::warn!("Health degraded");
        }
        tracing::debug!("Consecutive unhealthy events: {failures}");
    }
}
