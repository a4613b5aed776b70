//! # BlockWAL
//!
//! The write-ahead log storage core of a key-value engine:
//! - Records framed into CRC32-checked chunks inside fixed-size blocks
//! - Append-only segment files with size-capped rotation
//! - Random-offset reads that survive process restarts
//! - Configurable sync policy with an optional background sync thread
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Wal (manager)                        │
//! │        write / read_at / sync / close, rotation, stats      │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │  Segment N  │   ...    │  Segment 1  │
//!   │  (active)   │          │  (sealed)   │
//!   └──────┬──────┘          └─────────────┘
//!          │
//!          ▼
//!   ┌─────────────┐     ┌─────────────┐
//!   │Block Framer │ ──▶ │ Chunk Codec │
//!   └─────────────┘     └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod wal;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{WalError, Result};
pub use config::Config;
pub use wal::{RecordPosition, SegmentId, Wal};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of BlockWAL
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
