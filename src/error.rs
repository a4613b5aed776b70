//! Error types for BlockWAL
//!
//! Provides a unified error type for all WAL operations.

use thiserror::Error;

use crate::wal::SegmentId;

/// Result type alias using WalError
pub type Result<T> = std::result::Result<T, WalError>;

/// Unified error type for BlockWAL operations
#[derive(Debug, Error)]
pub enum WalError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Admission Errors
    // -------------------------------------------------------------------------
    #[error("Payload of {size} bytes exceeds the maximum of {max} bytes")]
    PayloadTooLarge { size: usize, max: u64 },

    // -------------------------------------------------------------------------
    // Frame Errors
    // -------------------------------------------------------------------------
    #[error("Corrupt frame at offset {offset}: {reason}")]
    CorruptFrame { offset: u64, reason: String },

    #[error("Truncated frame at offset {offset}: expected {expected} bytes, found {available}")]
    Truncated {
        offset: u64,
        expected: u64,
        available: u64,
    },

    // -------------------------------------------------------------------------
    // Segment Errors
    // -------------------------------------------------------------------------
    #[error("Segment is closed")]
    Closed,

    #[error("Segment is invalid: {0}")]
    Invalid(String),

    #[error("Segment not found: {0}")]
    SegmentNotFound(SegmentId),

    #[error("Sync failed for segment {0}")]
    SyncFailed(SegmentId),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl WalError {
    /// Whether this error describes damaged or incomplete on-disk data
    /// (as opposed to misuse or an I/O failure).
    pub fn is_data_error(&self) -> bool {
        matches!(self, WalError::CorruptFrame { .. } | WalError::Truncated { .. })
    }

    pub(crate) fn corrupt(offset: u64, reason: impl Into<String>) -> Self {
        WalError::CorruptFrame {
            offset,
            reason: reason.into(),
        }
    }
}
