//! Preparation worker: turns submitted orders into completed ones.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{info, warn};

use crate::channel::{ChannelReader, ChannelWriter};
use crate::error::{PipelineError, Result};
use crate::state::PipelineState;

/// Why the kitchen stopped serving.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// The front desk sent the sentinel record.
    Sentinel,
    /// A channel peer closed its end.
    PeerClosed,
    /// The shutdown flag was observed between orders.
    Shutdown,
}

/// Worker context. Owns its channel handles; shares only the counters and flag.
pub struct Kitchen {
    inbound: PathBuf,
    outbound: PathBuf,
    prep_duration: Duration,
    state: Arc<PipelineState>,
}

impl Kitchen {
    pub fn new(
        inbound: PathBuf,
        outbound: PathBuf,
        prep_duration: Duration,
        state: Arc<PipelineState>,
    ) -> Self {
        Self {
            inbound,
            outbound,
            prep_duration,
            state,
        }
    }

    /// Run the kitchen on its own named thread.
    pub fn spawn(self) -> Result<thread::JoinHandle<Result<StopReason>>> {
        thread::Builder::new()
            .name("kitchen".to_string())
            .spawn(move || self.run())
            .map_err(|source| PipelineError::Spawn {
                name: "kitchen",
                source,
            })
    }

    /// Connect, serve until told to stop, then close both handles.
    pub fn run(self) -> Result<StopReason> {
        info!("[KITCHEN] waiting for channel connection");
        // Completions first: the front desk counts the kitchen as attached once
        // the order channel connects, so both ends must be open by then.
        let mut completions = ChannelWriter::open(&self.outbound)?;
        let mut orders = ChannelReader::open(&self.inbound)?;
        info!("[KITCHEN] ready for orders");

        let outcome = self.serve(&mut orders, &mut completions);
        // Draining: closing our ends lets the monitor see end-of-stream.
        drop(completions);
        drop(orders);
        match &outcome {
            Ok(reason) => info!("[KITCHEN] closed ({reason:?})"),
            Err(err) => warn!("[KITCHEN] stopped on error: {err}"),
        }
        outcome
    }

    fn serve(
        &self,
        orders: &mut ChannelReader,
        completions: &mut ChannelWriter,
    ) -> Result<StopReason> {
        while !self.state.shutdown().is_raised() {
            let Some(mut order) = orders.read_record()? else {
                info!("[KITCHEN] order channel closed by front desk");
                return Ok(StopReason::PeerClosed);
            };
            if order.is_sentinel() {
                info!("[KITCHEN] stop requested");
                return Ok(StopReason::Sentinel);
            }

            info!("[KITCHEN] received order #{}: {}", order.id, order.description);
            thread::sleep(self.prep_duration);
            order.mark_ready();
            info!("[KITCHEN] order #{} ready", order.id);

            match completions.write_record(&order) {
                Ok(()) => {}
                Err(PipelineError::ChannelClosed) => {
                    warn!("[KITCHEN] completion channel closed; order #{} undelivered", order.id);
                    return Ok(StopReason::PeerClosed);
                }
                Err(err) => return Err(err),
            }
            // Not atomic with the write above; a crash here undercounts.
            self.state.record_processed();
        }
        Ok(StopReason::Shutdown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shutdown::Endpoints;
    use crate::state::ShutdownFlag;
    use crate::types::OrderRecord;
    use tempfile::tempdir;

    fn setup(dir: &std::path::Path, shutdown: ShutdownFlag) -> (Endpoints, Arc<PipelineState>) {
        let endpoints = Endpoints::provision(dir.join("in.fifo"), dir.join("out.fifo"))
            .expect("provision");
        (endpoints, Arc::new(PipelineState::new(shutdown)))
    }

    fn start(endpoints: &Endpoints, state: &Arc<PipelineState>) -> thread::JoinHandle<Result<StopReason>> {
        Kitchen::new(
            endpoints.inbound().to_path_buf(),
            endpoints.outbound().to_path_buf(),
            Duration::from_millis(20),
            Arc::clone(state),
        )
        .spawn()
        .expect("spawn kitchen")
    }

    #[test]
    fn prepares_orders_in_fifo_order_until_sentinel() {
        let dir = tempdir().expect("tempdir");
        let (endpoints, state) = setup(dir.path(), ShutdownFlag::new());
        let kitchen = start(&endpoints, &state);

        let mut completions = ChannelReader::open(endpoints.outbound()).expect("open completions");
        let mut orders = ChannelWriter::open(endpoints.inbound()).expect("open orders");

        orders.write_record(&OrderRecord::submit(1, "pizza")).expect("send 1");
        orders.write_record(&OrderRecord::submit(2, "salad")).expect("send 2");
        orders.write_record(&OrderRecord::sentinel()).expect("send sentinel");

        for (id, text) in [(1, "pizza"), (2, "salad")] {
            let done = completions.read_record().expect("read").expect("completion");
            assert_eq!(done.id, id);
            assert_eq!(done.description, text);
            assert!(done.is_ready());
            assert!(done.ready_at >= done.submitted_at);
        }
        assert!(completions.read_record().expect("read eof").is_none());

        let reason = kitchen.join().expect("kitchen panicked").expect("kitchen result");
        assert_eq!(reason, StopReason::Sentinel);
        assert_eq!(state.counts().processed, 2);
    }

    #[test]
    fn stops_when_front_desk_closes_without_sentinel() {
        let dir = tempdir().expect("tempdir");
        let (endpoints, state) = setup(dir.path(), ShutdownFlag::new());
        let kitchen = start(&endpoints, &state);

        let mut completions = ChannelReader::open(endpoints.outbound()).expect("open completions");
        let orders = ChannelWriter::open(endpoints.inbound()).expect("open orders");
        drop(orders);

        assert!(completions.read_record().expect("read eof").is_none());
        let reason = kitchen.join().expect("kitchen panicked").expect("kitchen result");
        assert_eq!(reason, StopReason::PeerClosed);
        assert_eq!(state.counts().processed, 0);
    }

    #[test]
    fn observes_shutdown_flag_before_reading() {
        let dir = tempdir().expect("tempdir");
        let shutdown = ShutdownFlag::new();
        shutdown.raise();
        let (endpoints, state) = setup(dir.path(), shutdown);
        let kitchen = start(&endpoints, &state);

        let mut completions = ChannelReader::open(endpoints.outbound()).expect("open completions");
        let _orders = ChannelWriter::open(endpoints.inbound()).expect("open orders");

        assert!(completions.read_record().expect("read eof").is_none());
        let reason = kitchen.join().expect("kitchen panicked").expect("kitchen result");
        assert_eq!(reason, StopReason::Shutdown);
    }

    #[test]
    fn missing_channel_is_fatal() {
        let dir = tempdir().expect("tempdir");
        let state = Arc::new(PipelineState::new(ShutdownFlag::new()));
        let kitchen = Kitchen::new(
            dir.path().join("absent-in"),
            dir.path().join("absent-out"),
            Duration::from_millis(1),
            state,
        );
        assert!(matches!(
            kitchen.run(),
            Err(PipelineError::ChannelOpenFailed { .. })
        ));
    }
}
