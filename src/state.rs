//! Process-wide state handed to every component that needs it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Snapshot of the order counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OrderCounts {
    pub total: u64,
    pub processed: u64,
}

/// Cooperative stop request. Once raised it stays raised.
#[derive(Clone, Debug, Default)]
pub struct ShutdownFlag {
    raised: Arc<AtomicBool>,
}

impl ShutdownFlag {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn raise(&self) {
        self.raised.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }

    /// Raw flag for the signal handler bridge.
    pub(crate) fn as_atomic(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.raised)
    }
}

/// Counters plus shutdown flag; each behind its own guard.
pub struct PipelineState {
    counts: Mutex<OrderCounts>,
    shutdown: ShutdownFlag,
}

impl PipelineState {
    pub fn new(shutdown: ShutdownFlag) -> Self {
        Self {
            counts: Mutex::new(OrderCounts::default()),
            shutdown,
        }
    }

    pub fn shutdown(&self) -> &ShutdownFlag {
        &self.shutdown
    }

    pub fn record_submitted(&self) {
        let mut guard = self.counts.lock().expect("order counters mutex poisoned");
        guard.total += 1;
    }

    pub fn record_processed(&self) {
        let mut guard = self.counts.lock().expect("order counters mutex poisoned");
        guard.processed += 1;
    }

    pub fn counts(&self) -> OrderCounts {
        *self.counts.lock().expect("order counters mutex poisoned")
    }
}
