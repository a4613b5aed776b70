//! WAL Segment
//!
//! A single append-only segment file built on the block framer.
//!
//! ## Responsibilities
//! - Append payloads as one or more chunks, returning the read anchor
//! - Read a record back from its anchor, validating every chunk
//! - Sync and close the underlying file handle

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::BytesMut;

use crate::error::{Result, WalError};

use super::block::BlockLayout;
use super::chunk::{self, ChunkType, HEADER_SIZE};

// =============================================================================
// Segment ID
// =============================================================================

/// Sequence number of a segment file
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SegmentId(pub u64);

impl SegmentId {
    /// First segment ID
    pub const FIRST: SegmentId = SegmentId(1);

    /// Returns the next segment ID
    pub fn next(&self) -> Self {
        SegmentId(self.0 + 1)
    }

    /// File name for this segment: "<id><extension>"
    pub fn file_name(&self, extension: &str) -> String {
        format!("{}{}", self.0, extension)
    }

    /// Parse a segment file name
    /// "42.seg" with extension ".seg" → Some(SegmentId(42))
    pub fn parse(file_name: &str, extension: &str) -> Option<Self> {
        let stem = file_name.strip_suffix(extension)?;
        if stem.is_empty() || !stem.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        stem.parse().ok().map(SegmentId)
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Sync Handle
// =============================================================================

/// Duplicate handle on a segment file that can be fsynced without holding
/// the segment itself.
#[derive(Debug, Clone)]
pub struct SyncHandle {
    segment_id: SegmentId,
    file: Arc<File>,
}

impl SyncHandle {
    pub fn segment_id(&self) -> SegmentId {
        self.segment_id
    }

    /// Flush file data to stable storage. Returns false on failure.
    pub fn sync(&self) -> bool {
        match self.file.sync_data() {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(segment = %self.segment_id, error = %e, "segment sync failed");
                false
            }
        }
    }
}

// =============================================================================
// Segment
// =============================================================================

/// One append-only segment file
pub struct Segment {
    /// Sequence number
    id: SegmentId,
    /// File path
    path: PathBuf,
    /// File handle (None once closed)
    file: Option<File>,
    /// Duplicate handle for lock-free syncing
    sync_file: Option<Arc<File>>,
    /// Block geometry
    layout: BlockLayout,
    /// Next write position == logical size
    offset: u64,
    /// Scratch buffer holding one chunk (at most one block)
    read_buf: Vec<u8>,
    /// Reusable encode buffer
    write_buf: BytesMut,
    /// Set by close()
    closed: bool,
    /// Cleared when a write fails part-way and the offset can no longer be trusted
    valid: bool,
}

impl Segment {
    /// Create a new, empty segment file. Fails if the file already exists.
    pub fn create(path: &Path, id: SegmentId, layout: BlockLayout) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;

        Self::from_file(file, path, id, layout, 0)
    }

    /// Open an existing segment file; its length becomes the write offset
    pub fn open(path: &Path, id: SegmentId, layout: BlockLayout) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let size = file.metadata()?.len();

        Self::from_file(file, path, id, layout, size)
    }

    fn from_file(
        file: File,
        path: &Path,
        id: SegmentId,
        layout: BlockLayout,
        size: u64,
    ) -> Result<Self> {
        let sync_file = Arc::new(file.try_clone()?);

        Ok(Self {
            id,
            path: path.to_path_buf(),
            file: Some(file),
            sync_file: Some(sync_file),
            layout,
            offset: size,
            read_buf: vec![0u8; layout.block_size()],
            write_buf: BytesMut::with_capacity(layout.block_size()),
            closed: false,
            valid: true,
        })
    }

    /// Append `payload` as one or more chunks.
    ///
    /// Returns the offset of the first chunk, the only valid read anchor for
    /// this record.
    pub fn append(&mut self, payload: &[u8]) -> Result<u64> {
        self.ensure_usable()?;

        self.write_buf.clear();
        let framed = self.layout.frame(self.offset, payload, &mut self.write_buf)?;

        let file = self
            .file
            .as_mut()
            .ok_or_else(|| WalError::Invalid(format!("segment {} has no file handle", self.id)))?;

        let written = file
            .seek(SeekFrom::Start(self.offset))
            .and_then(|_| file.write_all(&self.write_buf));

        if let Err(e) = written {
            self.valid = false;
            return Err(e.into());
        }

        if framed.padding > 0 {
            tracing::trace!(
                segment = %self.id,
                padding = framed.padding,
                end = framed.end,
                "padded block tail"
            );
        }

        self.offset = framed.end;
        Ok(framed.start)
    }

    /// Read the record anchored at `offset`
    pub fn read_at(&mut self, offset: u64) -> Result<Vec<u8>> {
        self.read_record(offset).map(|(payload, _)| payload)
    }

    /// Read the record anchored at `offset`, also returning the offset just
    /// past its last chunk.
    pub(crate) fn read_record(&mut self, offset: u64) -> Result<(Vec<u8>, u64)> {
        self.ensure_readable()?;

        if offset >= self.offset {
            return Err(WalError::Truncated {
                offset,
                expected: HEADER_SIZE as u64,
                available: 0,
            });
        }

        let mut payload = Vec::new();
        let mut cursor = offset;
        let mut first = true;

        loop {
            cursor = self.layout.aligned_read_offset(cursor);
            let (chunk_type, len) = self.read_chunk(cursor, &mut payload)?;

            if first && !chunk_type.starts_record() {
                return Err(WalError::corrupt(
                    cursor,
                    format!("record cannot start with a {:?} chunk", chunk_type),
                ));
            }
            if !first && chunk_type.starts_record() {
                return Err(WalError::corrupt(
                    cursor,
                    format!("expected a continuation chunk, found {:?}", chunk_type),
                ));
            }

            cursor += (HEADER_SIZE + len) as u64;
            if chunk_type.is_terminal() {
                break;
            }
            first = false;
        }

        Ok((payload, cursor))
    }

    /// Type and data length of the single chunk at `offset`
    pub(crate) fn chunk_at(&mut self, offset: u64) -> Result<(ChunkType, usize)> {
        self.ensure_readable()?;

        let mut scratch = Vec::new();
        self.read_chunk(offset, &mut scratch)
    }

    /// Decode the chunk at `offset`, appending its data to `out`.
    ///
    /// A frame that fits its block but runs past the end of the file is
    /// reported as `Truncated`, even when its length field was damaged: the
    /// two cases leave identical bytes behind, and a torn write is the one a
    /// crash produces. A frame that would cross its block is `CorruptFrame`.
    fn read_chunk(&mut self, offset: u64, out: &mut Vec<u8>) -> Result<(ChunkType, usize)> {
        let size = self.offset;
        if offset.saturating_add(HEADER_SIZE as u64) > size {
            return Err(WalError::Truncated {
                offset,
                expected: HEADER_SIZE as u64,
                available: size.saturating_sub(offset),
            });
        }

        let file = self
            .file
            .as_mut()
            .ok_or_else(|| WalError::Invalid(format!("segment {} has no file handle", self.id)))?;

        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(&mut self.read_buf[..HEADER_SIZE])?;

        let len = chunk::peek_len(&self.read_buf[..HEADER_SIZE]) as usize;
        let frame_len = HEADER_SIZE + len;

        if frame_len > self.layout.remaining_in_block(offset) {
            return Err(WalError::corrupt(
                offset,
                format!("chunk of {} bytes crosses a block boundary", frame_len),
            ));
        }

        if offset.saturating_add(frame_len as u64) > size {
            return Err(WalError::Truncated {
                offset,
                expected: frame_len as u64,
                available: size - offset,
            });
        }

        file.read_exact(&mut self.read_buf[HEADER_SIZE..frame_len])?;

        let chunk = chunk::decode(&self.read_buf[..frame_len], offset)?;
        out.extend_from_slice(chunk.data);

        Ok((chunk.chunk_type(), len))
    }

    /// Flush the file to stable storage. Returns false on failure.
    pub fn sync(&self) -> bool {
        match &self.sync_file {
            Some(file) => match file.sync_data() {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(segment = %self.id, error = %e, "segment sync failed");
                    false
                }
            },
            None => false,
        }
    }

    /// Handle for syncing this segment without holding it
    pub fn sync_handle(&self) -> Option<SyncHandle> {
        self.sync_file.as_ref().map(|file| SyncHandle {
            segment_id: self.id,
            file: Arc::clone(file),
        })
    }

    /// Sync, then release the file handle. Idempotent.
    ///
    /// Returns whether the final sync succeeded (true if already closed).
    pub fn close(&mut self) -> bool {
        if self.closed {
            return true;
        }

        let synced = self.sync();
        self.file = None;
        self.sync_file = None;
        self.closed = true;
        synced
    }

    /// Cut the file back to `len` bytes (used to drop a torn tail)
    pub(crate) fn truncate(&mut self, len: u64) -> Result<()> {
        self.ensure_usable()?;

        let file = self
            .file
            .as_mut()
            .ok_or_else(|| WalError::Invalid(format!("segment {} has no file handle", self.id)))?;

        file.set_len(len)?;
        file.sync_all()?;
        self.offset = len;

        Ok(())
    }

    /// Predicted on-disk cost of `payload`, excluding padding
    pub fn compute_required_space(&self, payload: &[u8]) -> u64 {
        self.layout.required_space(payload.len())
    }

    /// Records written before a failed append stay readable
    fn ensure_readable(&self) -> Result<()> {
        if self.closed {
            return Err(WalError::Closed);
        }
        Ok(())
    }

    fn ensure_usable(&self) -> Result<()> {
        self.ensure_readable()?;
        if !self.valid {
            return Err(WalError::Invalid(format!(
                "segment {} was poisoned by a failed write",
                self.id
            )));
        }
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn id(&self) -> SegmentId {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn layout(&self) -> BlockLayout {
        self.layout
    }

    /// Current logical end of file (next write position)
    pub fn size(&self) -> u64 {
        self.offset
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Whether the file handle can still be used
    pub fn is_valid(&self) -> bool {
        self.valid && self.file.is_some()
    }

    #[cfg(test)]
    pub(crate) fn poison(&mut self) {
        self.valid = false;
    }
}

impl Drop for Segment {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

impl fmt::Debug for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Segment")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("size", &self.offset)
            .field("closed", &self.closed)
            .field("valid", &self.valid)
            .finish()
    }
}
