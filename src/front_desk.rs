//! Front desk coordinator: owns the session from channel setup to teardown.

use std::io::{Read, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use log::{info, warn};

use crate::channel::{ChannelReader, ChannelWriter};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::input::{Line, LinePrompt};
use crate::kitchen::{Kitchen, StopReason};
use crate::monitor::{CompletionMonitor, MonitorReport};
use crate::shutdown::Endpoints;
use crate::state::{OrderCounts, PipelineState, ShutdownFlag};
use crate::types::{OrderId, OrderRecord, SENTINEL, bound_description};

/// Outcome of one session, reported after every context has stopped.
#[derive(Debug)]
pub struct SessionSummary {
    pub counts: OrderCounts,
    pub monitor: MonitorReport,
    /// `None` if the kitchen failed or panicked.
    pub kitchen: Option<StopReason>,
    /// The submission loop ended because of a shutdown request.
    pub interrupted: bool,
}

struct FrontDesk {
    /// Submission channel; `None` once closed.
    orders: Mutex<Option<ChannelWriter>>,
    state: Arc<PipelineState>,
    next_id: OrderId,
    sentinel_sent: bool,
}

impl FrontDesk {
    fn new(orders: ChannelWriter, state: Arc<PipelineState>) -> Self {
        Self {
            orders: Mutex::new(Some(orders)),
            state,
            next_id: 1,
            sentinel_sent: false,
        }
    }

    fn transmit(&self, record: &OrderRecord) -> Result<()> {
        let mut guard = self.orders.lock().expect("order channel mutex poisoned");
        match guard.as_mut() {
            Some(writer) => writer.write_record(record),
            None => Err(PipelineError::ChannelClosed),
        }
    }

    /// Run the submission loop. Returns true if a shutdown request ended it.
    fn take_orders<R: Read>(&mut self, prompt: &mut LinePrompt<R>) -> bool {
        loop {
            print!("Order #{}: ", self.next_id);
            let _ = std::io::stdout().flush();

            let text = match prompt.next_line(self.state.shutdown()) {
                Ok(Line::Text(text)) => text,
                Ok(Line::EndOfInput) => {
                    println!();
                    info!("[FRONT DESK] end of input");
                    return false;
                }
                Ok(Line::Interrupted) => {
                    println!();
                    println!("Interrupt received, shutting down safely...");
                    return true;
                }
                Err(err) => {
                    warn!("[FRONT DESK] input failed: {err}");
                    return self.state.shutdown().is_raised();
                }
            };

            // Compare what would go on the wire, so "sair\0..." still means exit.
            let description = bound_description(&text);
            if description == SENTINEL {
                self.send_sentinel();
                return false;
            }
            if description.len() < text.len() {
                warn!("[FRONT DESK] description clipped to {} bytes", description.len());
            }

            let order = OrderRecord::submit(self.next_id, description);
            match self.transmit(&order) {
                Ok(()) => {
                    self.next_id += 1;
                    self.state.record_submitted();
                    info!("[FRONT DESK] sent order #{}: {}", order.id, order.description);
                }
                Err(err) => {
                    warn!("[FRONT DESK] kitchen unreachable, stopping intake: {err}");
                    return self.state.shutdown().is_raised();
                }
            }
        }
    }

    /// Tell the kitchen to stop; at most one sentinel per session.
    fn send_sentinel(&mut self) {
        if self.sentinel_sent {
            return;
        }
        self.sentinel_sent = true;
        match self.transmit(&OrderRecord::sentinel()) {
            Ok(()) => info!("[FRONT DESK] stop sent to kitchen"),
            // Kitchen already stopped reading; nothing left to tell it.
            Err(err) => info!("[FRONT DESK] stop not delivered: {err}"),
        }
    }

    fn close_orders(&self) {
        let mut guard = self.orders.lock().expect("order channel mutex poisoned");
        guard.take();
    }
}

fn join_kitchen(handle: KitchenHandle) -> Result<StopReason> {
    match handle.join() {
        Ok(outcome) => outcome,
        Err(_) => Err(PipelineError::Io(std::io::Error::other("kitchen thread panicked"))),
    }
}

type KitchenHandle = thread::JoinHandle<Result<StopReason>>;

/// Open both front desk ends without ever blocking on a kitchen that gave up.
///
/// The completion reader is opened first and without waiting, so the kitchen's
/// writer open returns at once. The kitchen opens that writer before its order
/// reader, so once the order writer connects the kitchen holds both ends.
fn connect(
    inbound: &Path,
    outbound: &Path,
    retry: Duration,
    kitchen: KitchenHandle,
) -> Result<(ChannelWriter, ChannelReader, KitchenHandle)> {
    let completions = match ChannelReader::open_before_writer(outbound) {
        Ok(reader) => reader,
        Err(err) => return Err(prefer_kitchen_error(kitchen, err)),
    };
    match ChannelWriter::open_when_reader_ready(inbound, retry, || kitchen.is_finished()) {
        Ok(orders) => Ok((orders, completions, kitchen)),
        Err(err) => Err(prefer_kitchen_error(kitchen, err)),
    }
}

/// The kitchen's own diagnostic wins when it died first.
fn prefer_kitchen_error(kitchen: KitchenHandle, err: PipelineError) -> PipelineError {
    if !kitchen.is_finished() {
        return err;
    }
    match join_kitchen(kitchen) {
        Err(kitchen_err) => kitchen_err,
        Ok(_) => err,
    }
}

/// Run one full session against `prompt`.
pub fn run<R: Read>(
    config: &PipelineConfig,
    shutdown: ShutdownFlag,
    prompt: &mut LinePrompt<R>,
) -> Result<SessionSummary> {
    config.validate()?;
    let endpoints = Endpoints::provision(config.inbound_path(), config.outbound_path())?;
    info!(
        "[FRONT DESK] channels created: {} / {}",
        endpoints.inbound().display(),
        endpoints.outbound().display()
    );

    let state = Arc::new(PipelineState::new(shutdown));
    let kitchen = Kitchen::new(
        endpoints.inbound().to_path_buf(),
        endpoints.outbound().to_path_buf(),
        config.prep_duration,
        Arc::clone(&state),
    )
    .spawn()?;

    info!("[FRONT DESK] opening channels");
    let (orders, completions, kitchen) = connect(
        endpoints.inbound(),
        endpoints.outbound(),
        config.poll_interval,
        kitchen,
    )?;
    let completions = Arc::new(Mutex::new(completions));

    let monitor = match CompletionMonitor::spawn(
        Arc::clone(&completions),
        state.shutdown().clone(),
        config.poll_interval,
    ) {
        Ok(monitor) => monitor,
        Err(err) => {
            drop(orders);
            let _ = join_kitchen(kitchen);
            return Err(err);
        }
    };

    println!("Order pipeline ready.");
    println!("- type an order and press Enter");
    println!("- type '{SENTINEL}' to quit");

    let mut desk = FrontDesk::new(orders, Arc::clone(&state));
    let interrupted = desk.take_orders(prompt);

    info!("[FRONT DESK] shutting down");
    desk.send_sentinel();
    desk.close_orders();
    let kitchen = match join_kitchen(kitchen) {
        Ok(reason) => Some(reason),
        Err(err) => {
            warn!("[FRONT DESK] kitchen ended with error: {err}");
            None
        }
    };
    let monitor = monitor.stop();
    let counts = state.counts();

    drop(completions);
    endpoints.release();
    info!("[FRONT DESK] closed");

    Ok(SessionSummary {
        counts,
        monitor,
        kitchen,
        interrupted,
    })
}

pub fn print_summary(summary: &SessionSummary) {
    info!(
        "[FRONT DESK] kitchen stop={:?} interrupted={}",
        summary.kitchen, summary.interrupted
    );
    println!();
    println!("FINAL STATISTICS");
    println!("total_orders={}", summary.counts.total);
    println!("processed_orders={}", summary.counts.processed);
    match summary.monitor.avg_prep_secs() {
        Some(avg) => println!("avg_prep_secs={avg:.2}"),
        None => println!("avg_prep_secs=n/a"),
    }
}
