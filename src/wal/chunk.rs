//! Chunk Codec
//!
//! Encodes payloads into self-describing, checksummed frames and decodes
//! them back.
//!
//! ## Frame Layout
//! ```text
//! ┌───────────┬───────────┬──────────┬────────────────┐
//! │ CRC32 (4) │ Len (2)   │ Type (1) │ Data (Len)     │
//! └───────────┴───────────┴──────────┴────────────────┘
//!   CRC32 covers Len, Type and Data (little-endian)
//! ```

use bytes::{BufMut, BytesMut};

use crate::error::{Result, WalError};

// =============================================================================
// Constants
// =============================================================================

/// Chunk header size: CRC (4) + Len (2) + Type (1) = 7 bytes
pub const HEADER_SIZE: usize = 7;

/// Canonical block size (32 KiB)
pub const DEFAULT_BLOCK_SIZE: usize = 32 * 1024;

/// Largest block whose chunks can still be described by a u16 length
pub const MAX_BLOCK_SIZE: usize = u16::MAX as usize + HEADER_SIZE;

/// Smallest supported block size
pub const MIN_BLOCK_SIZE: usize = 2 * HEADER_SIZE + 2;

const CRC_OFFSET: usize = 0;
const LEN_OFFSET: usize = 4;
const TYPE_OFFSET: usize = 6;

// =============================================================================
// Chunk Type
// =============================================================================

/// Position of a chunk within its logical record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ChunkType {
    /// The whole record fits in this chunk
    Full = 0,
    /// First piece of a record spanning several blocks
    First = 1,
    /// Interior piece of a spanning record
    Middle = 2,
    /// Final piece of a spanning record
    Last = 3,
}

impl ChunkType {
    /// Create from byte value
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(ChunkType::Full),
            1 => Some(ChunkType::First),
            2 => Some(ChunkType::Middle),
            3 => Some(ChunkType::Last),
            _ => None,
        }
    }

    /// Convert to byte
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// Whether this chunk completes a record
    pub fn is_terminal(self) -> bool {
        matches!(self, ChunkType::Full | ChunkType::Last)
    }

    /// Whether a record may start with this chunk
    pub fn starts_record(self) -> bool {
        matches!(self, ChunkType::Full | ChunkType::First)
    }
}

// =============================================================================
// Chunk
// =============================================================================

/// Decoded chunk header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    pub crc32: u32,
    pub len: u16,
    pub chunk_type: ChunkType,
}

/// A decoded chunk borrowing its payload from the source buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk<'a> {
    pub header: ChunkHeader,
    pub data: &'a [u8],
}

impl Chunk<'_> {
    pub fn chunk_type(&self) -> ChunkType {
        self.header.chunk_type
    }

    /// Bytes this chunk occupies on disk (header + data)
    pub fn encoded_len(&self) -> usize {
        HEADER_SIZE + self.data.len()
    }
}

/// Read the declared payload length from a raw header
pub(crate) fn peek_len(header: &[u8]) -> u16 {
    u16::from_le_bytes([header[LEN_OFFSET], header[LEN_OFFSET + 1]])
}

fn checksum(len: u16, type_byte: u8, data: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&len.to_le_bytes());
    hasher.update(&[type_byte]);
    hasher.update(data);
    hasher.finalize()
}

/// Encode `payload` as a single chunk of `chunk_type` into `out`.
///
/// Returns the number of bytes appended.
pub fn encode(payload: &[u8], chunk_type: ChunkType, out: &mut BytesMut) -> Result<usize> {
    let len = u16::try_from(payload.len()).map_err(|_| WalError::PayloadTooLarge {
        size: payload.len(),
        max: u16::MAX as u64,
    })?;

    let crc = checksum(len, chunk_type.as_byte(), payload);

    out.reserve(HEADER_SIZE + payload.len());
    out.put_u32_le(crc);
    out.put_u16_le(len);
    out.put_u8(chunk_type.as_byte());
    out.put_slice(payload);

    Ok(HEADER_SIZE + payload.len())
}

/// Decode the chunk at the start of `bytes`.
///
/// `offset` is the file position of `bytes[0]` and is only used in errors.
pub fn decode(bytes: &[u8], offset: u64) -> Result<Chunk<'_>> {
    if bytes.len() < HEADER_SIZE {
        return Err(WalError::corrupt(
            offset,
            format!("frame of {} bytes is shorter than a chunk header", bytes.len()),
        ));
    }

    let stored_crc = u32::from_le_bytes([
        bytes[CRC_OFFSET],
        bytes[CRC_OFFSET + 1],
        bytes[CRC_OFFSET + 2],
        bytes[CRC_OFFSET + 3],
    ]);
    let len = peek_len(bytes);
    let type_byte = bytes[TYPE_OFFSET];

    let end = HEADER_SIZE + len as usize;
    if bytes.len() < end {
        return Err(WalError::corrupt(
            offset,
            format!(
                "declared length {} exceeds the {} bytes available",
                len,
                bytes.len() - HEADER_SIZE
            ),
        ));
    }

    let data = &bytes[HEADER_SIZE..end];
    let computed_crc = checksum(len, type_byte, data);
    if stored_crc != computed_crc {
        return Err(WalError::corrupt(
            offset,
            format!(
                "checksum mismatch: stored {:#010x}, computed {:#010x}",
                stored_crc, computed_crc
            ),
        ));
    }

    let chunk_type = ChunkType::from_byte(type_byte)
        .ok_or_else(|| WalError::corrupt(offset, format!("unknown chunk type {}", type_byte)))?;

    Ok(Chunk {
        header: ChunkHeader {
            crc32: stored_crc,
            len,
            chunk_type,
        },
        data,
    })
}
