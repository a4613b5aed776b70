//! WAL Recovery
//!
//! Detects and repairs a torn tail left by a crash mid-write.
//!
//! Damage in the middle of a segment is skipped and left on disk, so later
//! records stay readable and reads of the damaged record keep failing with
//! `CorruptFrame`. Only damage with no readable record after it is a torn
//! tail and gets cut off.

use crate::error::Result;

use super::chunk::HEADER_SIZE;
use super::reader::SegmentReader;
use super::segment::Segment;

/// Handles segment recovery after a crash
pub struct SegmentRecovery;

/// Result of a recovery or verification pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Number of records that decoded cleanly
    pub records_recovered: u64,

    /// Number of damaged regions found, skipped ones and the torn tail alike
    pub records_corrupted: u64,

    /// Offset just past the last valid record
    pub valid_len: u64,

    /// Whether bytes past `valid_len` were (or, for verify, would be) cut off
    pub was_truncated: bool,
}

impl SegmentRecovery {
    /// Scan `segment` and cut off a torn tail.
    ///
    /// This will:
    /// 1. Read records in order
    /// 2. Skip damaged regions that have readable records after them
    /// 3. Truncate everything after the last valid record
    pub fn recover(segment: &mut Segment) -> Result<RecoveryResult> {
        let result = Self::scan(segment)?;

        if result.was_truncated {
            tracing::warn!(
                segment = %segment.id(),
                from = segment.size(),
                to = result.valid_len,
                "truncating torn segment tail"
            );
            segment.truncate(result.valid_len)?;
        }

        Ok(result)
    }

    /// Check the integrity of `segment` without modifying it
    pub fn verify(segment: &mut Segment) -> Result<RecoveryResult> {
        Self::scan(segment)
    }

    fn scan(segment: &mut Segment) -> Result<RecoveryResult> {
        let size = segment.size();
        let mut records_recovered = 0;
        let mut records_corrupted = 0;
        let mut position = 0;

        loop {
            let mut reader = SegmentReader::from_offset(segment, position);
            let damage = loop {
                match reader.next_record() {
                    Ok(Some(_)) => records_recovered += 1,
                    Ok(None) => break None,
                    Err(e) if e.is_data_error() => break Some(e),
                    Err(e) => return Err(e),
                }
            };
            position = reader.position();

            let Some(error) = damage else { break };
            records_corrupted += 1;

            match Self::resync(segment, position)? {
                Some(next) => {
                    tracing::warn!(
                        segment = %segment.id(),
                        from = position,
                        to = next,
                        error = %error,
                        "skipping damaged region"
                    );
                    position = next;
                }
                None => {
                    tracing::debug!(error = %error, "no readable record after damaged frame");
                    break;
                }
            }
        }

        Ok(RecoveryResult {
            records_recovered,
            records_corrupted,
            valid_len: position,
            was_truncated: position < size,
        })
    }

    /// Find the first readable record after the damaged frame at `damaged`.
    ///
    /// The damaged frame's length cannot be trusted, so the rest of its block
    /// is tried at every byte. Later blocks are walked chunk by chunk from
    /// their start, since chunks never cross a block boundary.
    fn resync(segment: &mut Segment, damaged: u64) -> Result<Option<u64>> {
        let layout = segment.layout();
        let size = segment.size();
        let block_size = layout.block_size() as u64;
        let next_block = (damaged / block_size + 1) * block_size;

        let mut candidate = damaged + 1;
        while candidate < next_block.min(size) && !layout.in_padding(candidate) {
            if Self::record_starts_at(segment, candidate)? {
                return Ok(Some(candidate));
            }
            candidate += 1;
        }

        let mut block = next_block;
        while block < size {
            let block_end = block + block_size;
            let mut cursor = block;

            while cursor < block_end.min(size) && !layout.in_padding(cursor) {
                match segment.chunk_at(cursor) {
                    Ok((chunk_type, len)) => {
                        if chunk_type.starts_record() && Self::record_starts_at(segment, cursor)? {
                            return Ok(Some(cursor));
                        }
                        cursor += (HEADER_SIZE + len) as u64;
                    }
                    Err(e) if e.is_data_error() => break,
                    Err(e) => return Err(e),
                }
            }

            block = block_end;
        }

        Ok(None)
    }

    /// Whether a complete, valid record is anchored at `offset`
    fn record_starts_at(segment: &mut Segment, offset: u64) -> Result<bool> {
        match segment.read_record(offset) {
            Ok(_) => Ok(true),
            Err(e) if e.is_data_error() => Ok(false),
            Err(e) => Err(e),
        }
    }
}
