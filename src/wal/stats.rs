//! I/O Statistics
//!
//! Lock-free cumulative and windowed counters. The window covers the writes
//! since the last successful sync.

use std::sync::atomic::{AtomicU64, Ordering};

/// Shared I/O counters
#[derive(Debug, Default)]
pub(crate) struct IoStats {
    total_bytes_written: AtomicU64,
    total_write_ops: AtomicU64,
    window_bytes_written: AtomicU64,
    window_write_ops: AtomicU64,
    sync_ops: AtomicU64,
}

/// Point-in-time copy of the I/O counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IoStatsSnapshot {
    /// Payload bytes accepted since open
    pub total_bytes_written: u64,
    /// Writes accepted since open
    pub total_write_ops: u64,
    /// Payload bytes since the last sync
    pub window_bytes_written: u64,
    /// Writes since the last sync
    pub window_write_ops: u64,
    /// Successful syncs since open
    pub sync_ops: u64,
}

impl IoStats {
    pub(crate) fn record_write(&self, nbytes: usize) {
        let nbytes = nbytes as u64;
        self.total_bytes_written.fetch_add(nbytes, Ordering::Relaxed);
        self.total_write_ops.fetch_add(1, Ordering::Relaxed);
        self.window_bytes_written.fetch_add(nbytes, Ordering::Relaxed);
        self.window_write_ops.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_sync(&self) {
        self.sync_ops.fetch_add(1, Ordering::Relaxed);
        self.window_bytes_written.store(0, Ordering::Relaxed);
        self.window_write_ops.store(0, Ordering::Relaxed);
    }

    pub(crate) fn window_write_ops(&self) -> u64 {
        self.window_write_ops.load(Ordering::Relaxed)
    }

    pub(crate) fn snapshot(&self) -> IoStatsSnapshot {
        IoStatsSnapshot {
            total_bytes_written: self.total_bytes_written.load(Ordering::Relaxed),
            total_write_ops: self.total_write_ops.load(Ordering::Relaxed),
            window_bytes_written: self.window_bytes_written.load(Ordering::Relaxed),
            window_write_ops: self.window_write_ops.load(Ordering::Relaxed),
            sync_ops: self.sync_ops.load(Ordering::Relaxed),
        }
    }
}
