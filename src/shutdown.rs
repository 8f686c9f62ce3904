//! Signal-driven shutdown flag and exactly-once endpoint teardown.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use log::{debug, warn};

use crate::channel;
use crate::error::{PipelineError, Result};
use crate::state::ShutdownFlag;

// A POSIX handler cannot capture state, so it reaches the flag through this slot.
static SIGNAL_TARGET: OnceLock<Arc<AtomicBool>> = OnceLock::new();

extern "C" fn on_signal(_signum: libc::c_int) {
    if let Some(flag) = SIGNAL_TARGET.get() {
        flag.store(true, Ordering::SeqCst);
    }
}

/// Route SIGINT and SIGTERM to `flag`. The handler only stores to the flag.
///
/// Handlers are installed without `SA_RESTART`, so blocking waits return
/// `EINTR` and loops get a chance to look at the flag. Only the first flag
/// passed in a process is bound.
pub fn install_signal_handlers(flag: &ShutdownFlag) -> Result<()> {
    if SIGNAL_TARGET.set(flag.as_atomic()).is_err() {
        warn!("signal handlers already bound to an earlier shutdown flag");
        return Ok(());
    }
    for signal in [libc::SIGINT, libc::SIGTERM] {
        let mut action: libc::sigaction = unsafe { std::mem::zeroed() };
        action.sa_sigaction = on_signal as libc::sighandler_t;
        action.sa_flags = 0;
        unsafe {
            libc::sigemptyset(&mut action.sa_mask);
        }
        let rc = unsafe { libc::sigaction(signal, &action, std::ptr::null_mut()) };
        if rc != 0 {
            return Err(PipelineError::Signal {
                signal,
                source: io::Error::last_os_error(),
            });
        }
    }
    Ok(())
}

/// The two channel endpoints on disk. Removed exactly once, at the latest on drop.
pub struct Endpoints {
    inbound: PathBuf,
    outbound: PathBuf,
    released: AtomicBool,
}

impl Endpoints {
    /// Clear stale endpoints from an earlier run, then create both.
    pub fn provision(inbound: PathBuf, outbound: PathBuf) -> Result<Self> {
        for stale in [&inbound, &outbound] {
            match channel::remove(stale) {
                Ok(true) => debug!("removed stale endpoint {}", stale.display()),
                Ok(false) => {}
                Err(err) => debug!("ignoring stale endpoint cleanup failure: {err}"),
            }
        }
        channel::create(&inbound)?;
        if let Err(err) = channel::create(&outbound) {
            let _ = channel::remove(&inbound);
            return Err(err);
        }
        Ok(Self {
            inbound,
            outbound,
            released: AtomicBool::new(false),
        })
    }

    pub fn inbound(&self) -> &Path {
        &self.inbound
    }

    pub fn outbound(&self) -> &Path {
        &self.outbound
    }

    /// Remove both endpoints. Returns false if they were already released.
    pub fn release(&self) -> bool {
        if self.released.swap(true, Ordering::SeqCst) {
            return false;
        }
        for path in [&self.inbound, &self.outbound] {
            if let Err(err) = channel::remove(path) {
                warn!("failed to remove endpoint {}: {err}", path.display());
            }
        }
        true
    }
}

impl Drop for Endpoints {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn provision_replaces_stale_endpoints() {
        let dir = tempdir().expect("tempdir");
        let inbound = dir.path().join("in.fifo");
        let outbound = dir.path().join("out.fifo");
        // Leftovers from a crashed run, one of them not even a FIFO.
        channel::create(&inbound).expect("stale fifo");
        std::fs::write(&outbound, b"junk").expect("stale file");

        let endpoints = Endpoints::provision(inbound.clone(), outbound.clone()).expect("provision");
        assert!(endpoints.inbound().exists());
        assert!(endpoints.outbound().exists());
    }

    #[test]
    fn release_runs_exactly_once() {
        let dir = tempdir().expect("tempdir");
        let inbound = dir.path().join("in.fifo");
        let outbound = dir.path().join("out.fifo");
        let endpoints = Endpoints::provision(inbound.clone(), outbound.clone()).expect("provision");

        assert!(endpoints.release());
        assert!(!inbound.exists());
        assert!(!outbound.exists());

        // A second request (e.g. a repeated signal) is a no-op.
        assert!(!endpoints.release());
        drop(endpoints);
        assert!(!inbound.exists());
    }

    #[test]
    fn failed_second_create_cleans_up_the_first() {
        let dir = tempdir().expect("tempdir");
        let inbound = dir.path().join("in.fifo");
        let outbound = dir.path().join("no-such-dir").join("out.fifo");

        let result = Endpoints::provision(inbound.clone(), outbound);
        assert!(matches!(
            result,
            Err(PipelineError::ChannelCreationFailed { .. })
        ));
        assert!(!inbound.exists());
    }

    #[test]
    fn drop_releases_endpoints() {
        let dir = tempdir().expect("tempdir");
        let inbound = dir.path().join("in.fifo");
        let outbound = dir.path().join("out.fifo");
        {
            let _endpoints =
                Endpoints::provision(inbound.clone(), outbound.clone()).expect("provision");
        }
        assert!(!inbound.exists());
        assert!(!outbound.exists());
    }
}
