//! Write-Ahead Log (WAL) Module
//!
//! Durable, ordered, integrity-checked byte storage with offset-addressable
//! retrieval.
//!
//! ## Responsibilities
//! - Frame records into checksummed chunks packed into fixed-size blocks
//! - Append records to segment files and read them back by offset
//! - Rotate segments at a size cap and apply the sync policy
//! - Repair torn tails after a crash
//!
//! ## File Format
//! ```text
//! segment := block*
//! ┌─────────────────────────────────────────────────────┐
//! │ Block (block_size bytes)                            │
//! │ ┌─────────┬─────────┬──────────┬────────┐           │
//! │ │ CRC (4) │ Len (2) │ Type (1) │ Data   │  ...  pad │
//! │ └─────────┴─────────┴──────────┴────────┘           │
//! ├─────────────────────────────────────────────────────┤
//! │ Block                                               │
//! │   ...                                               │
//! └─────────────────────────────────────────────────────┘
//! Type: 0=Full 1=First 2=Middle 3=Last
//! pad:  zero bytes when <= 7 bytes remain in a block
//! ```

mod block;
mod chunk;
mod manager;
mod reader;
mod recovery;
mod segment;
mod stats;
mod sync;

pub use block::{BlockLayout, FramedRecord};
pub use chunk::{
    decode, encode, Chunk, ChunkHeader, ChunkType, DEFAULT_BLOCK_SIZE, HEADER_SIZE,
    MAX_BLOCK_SIZE, MIN_BLOCK_SIZE,
};
pub use manager::{RecordPosition, SegmentInfo, Wal};
pub use reader::{Record, SegmentReader};
pub use recovery::{RecoveryResult, SegmentRecovery};
pub use segment::{Segment, SegmentId, SyncHandle};
pub use stats::IoStatsSnapshot;
