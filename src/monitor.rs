//! Background consumer of completed orders.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use log::{info, warn};

use crate::channel::ChannelReader;
use crate::error::{PipelineError, Result};
use crate::state::ShutdownFlag;
use crate::types::{OrderId, OrderRecord};

/// What the monitor saw over its lifetime.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MonitorReport {
    /// Completed order ids in arrival order.
    pub completed: Vec<OrderId>,
    pub total_prep_millis: i64,
}

impl MonitorReport {
    fn observe(&mut self, order: &OrderRecord) -> f64 {
        let millis = order.prep_millis().unwrap_or(0);
        self.completed.push(order.id);
        self.total_prep_millis += millis;
        millis as f64 / 1000.0
    }

    /// Mean preparation time in seconds, if anything completed.
    pub fn avg_prep_secs(&self) -> Option<f64> {
        if self.completed.is_empty() {
            None
        } else {
            Some(self.total_prep_millis as f64 / 1000.0 / self.completed.len() as f64)
        }
    }
}

/// Handle to the running monitor thread.
pub struct CompletionMonitor {
    cancel: Arc<AtomicBool>,
    handle: thread::JoinHandle<MonitorReport>,
}

impl CompletionMonitor {
    /// Start draining `reader`, which stays shared with the caller.
    pub fn spawn(
        reader: Arc<Mutex<ChannelReader>>,
        shutdown: ShutdownFlag,
        poll: Duration,
    ) -> Result<Self> {
        let cancel = Arc::new(AtomicBool::new(false));
        let thread_cancel = Arc::clone(&cancel);
        let handle = thread::Builder::new()
            .name("completion-monitor".to_string())
            .spawn(move || watch(&reader, &thread_cancel, &shutdown, poll))
            .map_err(|source| PipelineError::Spawn {
                name: "completion-monitor",
                source,
            })?;
        Ok(Self { cancel, handle })
    }

    /// Ask the monitor to stop once the channel is idle, then wait for it.
    pub fn stop(self) -> MonitorReport {
        self.cancel.store(true, Ordering::SeqCst);
        self.handle.join().unwrap_or_else(|_| {
            warn!("[MONITOR] thread panicked; report lost");
            MonitorReport::default()
        })
    }
}

fn watch(
    reader: &Mutex<ChannelReader>,
    cancel: &AtomicBool,
    shutdown: &ShutdownFlag,
    poll: Duration,
) -> MonitorReport {
    let mut report = MonitorReport::default();
    loop {
        // One lock per read so records never interleave with another reader.
        let mut guard = reader.lock().expect("completion channel mutex poisoned");
        let ready = match guard.wait_readable(poll) {
            Ok(ready) => ready,
            Err(err) => {
                warn!("[MONITOR] wait failed: {err}");
                break;
            }
        };
        if !ready {
            drop(guard);
            // Pending completions are drained before a stop request is honoured.
            if cancel.load(Ordering::SeqCst) || shutdown.is_raised() {
                info!("[MONITOR] stop requested");
                break;
            }
            continue;
        }
        match guard.read_record() {
            Ok(Some(order)) => {
                drop(guard);
                let secs = report.observe(&order);
                println!(
                    "[monitor] order #{} ready: {} (prep time {secs:.2} s)",
                    order.id, order.description
                );
            }
            Ok(None) => {
                info!("[MONITOR] completion channel closed");
                break;
            }
            Err(err) => {
                warn!("[MONITOR] read failed: {err}");
                break;
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelWriter;
    use crate::shutdown::Endpoints;
    use std::sync::mpsc;
    use tempfile::tempdir;

    fn completed(id: OrderId, prep_millis: i64) -> OrderRecord {
        let mut order = OrderRecord::submit(id, &format!("order-{id}"));
        order.ready_at = order.submitted_at + prep_millis;
        order
    }

    #[test]
    fn average_prep_time() {
        let mut report = MonitorReport::default();
        assert_eq!(report.avg_prep_secs(), None);
        assert_eq!(report.observe(&completed(1, 1000)), 1.0);
        report.observe(&completed(2, 3000));
        assert_eq!(report.avg_prep_secs(), Some(2.0));
        assert_eq!(report.completed, vec![1, 2]);
    }

    #[test]
    fn drains_until_end_of_stream() {
        let dir = tempdir().expect("tempdir");
        let endpoints =
            Endpoints::provision(dir.path().join("in.fifo"), dir.path().join("out.fifo"))
                .expect("provision");
        let path = endpoints.outbound().to_path_buf();

        let (go_tx, go_rx) = mpsc::channel::<()>();
        let writer = thread::spawn(move || {
            let mut writer = ChannelWriter::open(&path).expect("open writer");
            go_rx.recv_timeout(Duration::from_secs(2)).expect("go");
            for id in 1..=3 {
                writer.write_record(&completed(id, 50)).expect("write");
            }
        });

        let reader = Arc::new(Mutex::new(
            ChannelReader::open(endpoints.outbound()).expect("open reader"),
        ));
        let monitor = CompletionMonitor::spawn(
            Arc::clone(&reader),
            ShutdownFlag::new(),
            Duration::from_millis(10),
        )
        .expect("spawn monitor");
        go_tx.send(()).expect("go");
        writer.join().expect("writer panicked");

        // Writer is gone, so the monitor ends on end-of-stream without cancellation.
        let report = monitor.handle.join().expect("monitor panicked");
        assert_eq!(report.completed, vec![1, 2, 3]);
        assert_eq!(report.total_prep_millis, 150);
    }

    #[test]
    fn stop_returns_promptly_when_idle() {
        let dir = tempdir().expect("tempdir");
        let endpoints =
            Endpoints::provision(dir.path().join("in.fifo"), dir.path().join("out.fifo"))
                .expect("provision");
        let path = endpoints.outbound().to_path_buf();

        let (done_tx, done_rx) = mpsc::channel::<()>();
        let writer = thread::spawn(move || {
            // Keep the write end open so the monitor never sees end-of-stream.
            let _writer = ChannelWriter::open(&path).expect("open writer");
            done_rx.recv_timeout(Duration::from_secs(5)).expect("done");
        });

        let reader = Arc::new(Mutex::new(
            ChannelReader::open(endpoints.outbound()).expect("open reader"),
        ));
        let monitor =
            CompletionMonitor::spawn(reader, ShutdownFlag::new(), Duration::from_millis(10))
                .expect("spawn monitor");
        let report = monitor.stop();
        assert!(report.completed.is_empty());

        done_tx.send(()).expect("release writer");
        writer.join().expect("writer panicked");
    }
}
