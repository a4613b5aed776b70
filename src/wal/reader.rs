//! Segment Reader
//!
//! Sequential scan over the records of a segment.

use crate::error::Result;

use super::segment::Segment;

/// A record read back from a segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Read anchor of the record (offset of its first chunk)
    pub offset: u64,
    /// Reassembled payload
    pub payload: Vec<u8>,
}

/// Reads records from a segment in write order
pub struct SegmentReader<'a> {
    segment: &'a mut Segment,
    position: u64,
    failed: bool,
}

impl<'a> SegmentReader<'a> {
    /// Start reading at the beginning of the segment
    pub fn new(segment: &'a mut Segment) -> Self {
        Self::from_offset(segment, 0)
    }

    /// Start reading at `offset`, which must be a record anchor or the end
    /// of a previous record
    pub fn from_offset(segment: &'a mut Segment, offset: u64) -> Self {
        Self {
            segment,
            position: offset,
            failed: false,
        }
    }

    /// Read the next record. Returns `Ok(None)` at the end of the segment.
    pub fn next_record(&mut self) -> Result<Option<Record>> {
        let offset = self.segment.layout().aligned_read_offset(self.position);
        if offset >= self.segment.size() {
            return Ok(None);
        }

        let (payload, next) = self.segment.read_record(offset)?;
        self.position = self.segment.layout().aligned_read_offset(next);

        Ok(Some(Record { offset, payload }))
    }

    /// Offset just past the last record returned, including its block padding
    pub fn position(&self) -> u64 {
        self.position
    }
}

impl Iterator for SegmentReader<'_> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        match self.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => None,
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
