//! Block Framer
//!
//! Packs chunks into fixed-size blocks. Blocks carry no on-disk marker;
//! their boundaries are `offset % block_size` arithmetic.
//!
//! ```text
//! block 0                          block 1
//! ┌──────────┬──────────┬───────┐  ┌──────────────────────────┐
//! │ Full     │ First    │ pad   │  │ Last     │ Full   │ ...  │
//! └──────────┴──────────┴───────┘  └──────────────────────────┘
//!                         ^ <= HEADER_SIZE bytes left: zero-filled
//! ```

use bytes::{BufMut, BytesMut};

use crate::error::{Result, WalError};

use super::chunk::{self, ChunkType, HEADER_SIZE, MAX_BLOCK_SIZE, MIN_BLOCK_SIZE};

/// Result of framing one record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramedRecord {
    /// Offset of the first chunk header (the record's read anchor)
    pub start: u64,
    /// Write offset after the record and any trailing padding
    pub end: u64,
    /// Number of chunks emitted
    pub chunks: usize,
    /// Zero bytes emitted as block padding
    pub padding: usize,
}

/// Block geometry shared by the writer and the reader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockLayout {
    block_size: usize,
}

impl BlockLayout {
    /// Create a layout, rejecting block sizes a u16 chunk length cannot describe
    pub fn new(block_size: usize) -> Result<Self> {
        if !(MIN_BLOCK_SIZE..=MAX_BLOCK_SIZE).contains(&block_size) {
            return Err(WalError::Config(format!(
                "block_size must be within [{}, {}], got {}",
                MIN_BLOCK_SIZE, MAX_BLOCK_SIZE, block_size
            )));
        }
        Ok(Self { block_size })
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Largest payload a single chunk can carry
    pub fn max_chunk_payload(&self) -> usize {
        self.block_size - HEADER_SIZE
    }

    /// Bytes between `offset` and the next block boundary, in `1..=block_size`
    pub fn remaining_in_block(&self, offset: u64) -> usize {
        self.block_size - (offset % self.block_size as u64) as usize
    }

    /// Whether `offset` sits in a block tail too small for a chunk header
    pub fn in_padding(&self, offset: u64) -> bool {
        self.remaining_in_block(offset) <= HEADER_SIZE
    }

    /// Move `offset` past a padding region, mirroring the writer's decision
    pub fn aligned_read_offset(&self, offset: u64) -> u64 {
        let remaining = self.remaining_in_block(offset);
        if remaining <= HEADER_SIZE {
            offset.saturating_add(remaining as u64)
        } else {
            offset
        }
    }

    /// Lower bound on the bytes `len` payload bytes occupy on disk.
    ///
    /// Counts one header per chunk but ignores padding and the starting
    /// offset, so the real cost may be slightly higher.
    pub fn required_space(&self, len: usize) -> u64 {
        let max_payload = self.max_chunk_payload();
        let full_blocks = (len / max_payload) as u64;
        let rem = len % max_payload;

        let tail = if rem > 0 || len == 0 {
            (rem + HEADER_SIZE) as u64
        } else {
            0
        };

        full_blocks * self.block_size as u64 + tail
    }

    /// Frame `payload` as it would be written at `offset`, appending the
    /// encoded chunks and padding to `out`.
    pub fn frame(&self, offset: u64, payload: &[u8], out: &mut BytesMut) -> Result<FramedRecord> {
        let mut cursor = offset;
        let mut chunks = 0;

        // Only a torn tail leaves the cursor inside a padding region.
        let mut padding = self.pad(&mut cursor, out);
        let start = cursor;

        let avail = self.remaining_in_block(cursor) - HEADER_SIZE;
        if payload.len() <= avail {
            self.emit(payload, ChunkType::Full, &mut cursor, out)?;
            chunks += 1;
            padding += self.pad(&mut cursor, out);
        } else {
            let (first, mut rest) = payload.split_at(avail);
            self.emit(first, ChunkType::First, &mut cursor, out)?;
            chunks += 1;
            padding += self.pad(&mut cursor, out);

            loop {
                let avail = self.remaining_in_block(cursor) - HEADER_SIZE;
                if rest.len() <= avail {
                    self.emit(rest, ChunkType::Last, &mut cursor, out)?;
                    chunks += 1;
                    padding += self.pad(&mut cursor, out);
                    break;
                }

                let (middle, tail) = rest.split_at(avail);
                self.emit(middle, ChunkType::Middle, &mut cursor, out)?;
                chunks += 1;
                padding += self.pad(&mut cursor, out);
                rest = tail;
            }
        }

        Ok(FramedRecord {
            start,
            end: cursor,
            chunks,
            padding,
        })
    }

    fn emit(
        &self,
        data: &[u8],
        chunk_type: ChunkType,
        cursor: &mut u64,
        out: &mut BytesMut,
    ) -> Result<()> {
        debug_assert!(data.len() + HEADER_SIZE <= self.remaining_in_block(*cursor));
        let written = chunk::encode(data, chunk_type, out)?;
        *cursor += written as u64;
        Ok(())
    }

    fn pad(&self, cursor: &mut u64, out: &mut BytesMut) -> usize {
        let remaining = self.remaining_in_block(*cursor);
        if remaining > HEADER_SIZE {
            return 0;
        }
        out.put_bytes(0, remaining);
        *cursor += remaining as u64;
        remaining
    }
}

impl Default for BlockLayout {
    fn default() -> Self {
        Self {
            block_size: chunk::DEFAULT_BLOCK_SIZE,
        }
    }
}
