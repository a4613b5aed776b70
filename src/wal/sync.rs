//! Background Sync Task
//!
//! Periodically fsyncs the active segment until told to stop.
//!
//! # Thread Lifecycle
//!
//! - Dropping (or sending on) the shutdown channel wakes the thread at once
//! - `stop()` joins the thread, so no sync runs after it returns

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, RecvTimeoutError, Sender};

use crate::error::{Result, WalError};

use super::manager::WalInner;

/// Handle on the running sync thread
pub(crate) struct SyncTask {
    shutdown: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl SyncTask {
    /// Spawn the sync thread ticking every `interval`
    pub(crate) fn spawn(inner: Arc<WalInner>, interval: Duration) -> Result<Self> {
        let (shutdown, signal) = channel::bounded::<()>(1);

        let handle = thread::Builder::new()
            .name("blockwal-sync".to_string())
            .spawn(move || loop {
                match signal.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => match inner.sync_active() {
                        Ok(()) => tracing::trace!("background sync completed"),
                        Err(WalError::Closed) => break,
                        Err(e) => tracing::warn!(error = %e, "background sync failed"),
                    },
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })?;

        tracing::debug!(interval_ms = interval.as_millis() as u64, "started background sync");

        Ok(Self {
            shutdown: Some(shutdown),
            handle: Some(handle),
        })
    }

    /// Signal the thread and wait for it to exit
    pub(crate) fn stop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            // A full channel means a stop is already pending.
            let _ = shutdown.try_send(());
        }

        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("background sync thread panicked");
            }
        }
    }
}

impl Drop for SyncTask {
    fn drop(&mut self) {
        self.stop();
    }
}
