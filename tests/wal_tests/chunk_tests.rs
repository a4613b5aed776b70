//! Tests for the Chunk Codec
//!
//! These tests verify:
//! - Header layout (CRC, little-endian length, type byte)
//! - Decoding of well-formed frames
//! - Detection of checksum mismatches, short frames and unknown types
//! - Rejection of payloads a u16 length cannot describe

use blockwal::wal::{decode, encode, ChunkType, HEADER_SIZE};
use blockwal::WalError;
use bytes::BytesMut;

// =============================================================================
// Helper Functions
// =============================================================================

fn encode_to_vec(payload: &[u8], chunk_type: ChunkType) -> Vec<u8> {
    let mut out = BytesMut::new();
    encode(payload, chunk_type, &mut out).unwrap();
    out.to_vec()
}

fn assert_corrupt(result: Result<impl std::fmt::Debug, WalError>) {
    match result {
        Err(WalError::CorruptFrame { .. }) => {}
        other => panic!("expected CorruptFrame, got {:?}", other),
    }
}

// =============================================================================
// Chunk Type Tests
// =============================================================================

#[test]
fn test_chunk_type_byte_values() {
    assert_eq!(ChunkType::Full.as_byte(), 0);
    assert_eq!(ChunkType::First.as_byte(), 1);
    assert_eq!(ChunkType::Middle.as_byte(), 2);
    assert_eq!(ChunkType::Last.as_byte(), 3);

    for b in 0..4u8 {
        assert_eq!(ChunkType::from_byte(b).unwrap().as_byte(), b);
    }
    assert_eq!(ChunkType::from_byte(4), None);
    assert_eq!(ChunkType::from_byte(0xFF), None);
}

#[test]
fn test_chunk_type_sequence_roles() {
    assert!(ChunkType::Full.starts_record());
    assert!(ChunkType::First.starts_record());
    assert!(!ChunkType::Middle.starts_record());
    assert!(!ChunkType::Last.starts_record());

    assert!(ChunkType::Full.is_terminal());
    assert!(ChunkType::Last.is_terminal());
    assert!(!ChunkType::First.is_terminal());
    assert!(!ChunkType::Middle.is_terminal());
}

// =============================================================================
// Encode Tests
// =============================================================================

#[test]
fn test_encode_header_layout() {
    let bytes = encode_to_vec(b"hello", ChunkType::First);

    assert_eq!(bytes.len(), HEADER_SIZE + 5);
    assert_eq!(&bytes[4..6], &5u16.to_le_bytes());
    assert_eq!(bytes[6], ChunkType::First.as_byte());
    assert_eq!(&bytes[HEADER_SIZE..], b"hello");
}

#[test]
fn test_encode_checksum_covers_len_type_and_data() {
    let bytes = encode_to_vec(b"hello", ChunkType::Full);

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&bytes[4..]);
    let expected = hasher.finalize();

    assert_eq!(&bytes[0..4], &expected.to_le_bytes());
}

#[test]
fn test_encode_returns_bytes_appended() {
    let mut out = BytesMut::new();
    out.extend_from_slice(b"prefix");

    let written = encode(b"abc", ChunkType::Full, &mut out).unwrap();

    assert_eq!(written, HEADER_SIZE + 3);
    assert_eq!(out.len(), 6 + HEADER_SIZE + 3);
    assert_eq!(&out[..6], b"prefix");
}

#[test]
fn test_encode_empty_payload() {
    let bytes = encode_to_vec(b"", ChunkType::Full);
    assert_eq!(bytes.len(), HEADER_SIZE);

    let chunk = decode(&bytes, 0).unwrap();
    assert!(chunk.data.is_empty());
    assert_eq!(chunk.header.len, 0);
}

#[test]
fn test_encode_max_chunk_payload() {
    let payload = vec![0xAB; u16::MAX as usize];
    let bytes = encode_to_vec(&payload, ChunkType::Middle);

    let chunk = decode(&bytes, 0).unwrap();
    assert_eq!(chunk.data.len(), u16::MAX as usize);
    assert_eq!(chunk.chunk_type(), ChunkType::Middle);
}

#[test]
fn test_encode_rejects_oversized_payload() {
    let payload = vec![0u8; u16::MAX as usize + 1];
    let mut out = BytesMut::new();

    let result = encode(&payload, ChunkType::Full, &mut out);

    assert!(matches!(result, Err(WalError::PayloadTooLarge { .. })));
    assert!(out.is_empty());
}

// =============================================================================
// Decode Tests
// =============================================================================

#[test]
fn test_decode_well_formed_chunk() {
    let bytes = encode_to_vec(b"hello", ChunkType::Full);

    let chunk = decode(&bytes, 0).unwrap();

    assert_eq!(chunk.chunk_type(), ChunkType::Full);
    assert_eq!(chunk.data, b"hello");
    assert_eq!(chunk.header.len, 5);
    assert_eq!(chunk.encoded_len(), bytes.len());
}

#[test]
fn test_decode_ignores_trailing_bytes() {
    let mut bytes = encode_to_vec(b"hello", ChunkType::Last);
    bytes.extend_from_slice(&[0xEE; 20]);

    let chunk = decode(&bytes, 0).unwrap();

    assert_eq!(chunk.data, b"hello");
    assert_eq!(chunk.encoded_len(), HEADER_SIZE + 5);
}

#[test]
fn test_decode_short_header() {
    assert_corrupt(decode(&[0u8; 3], 0));
    assert_corrupt(decode(&[], 0));
}

#[test]
fn test_decode_declared_length_exceeds_buffer() {
    let bytes = encode_to_vec(b"hello world", ChunkType::Full);
    assert_corrupt(decode(&bytes[..bytes.len() - 1], 0));
}

#[test]
fn test_decode_detects_data_corruption() {
    let mut bytes = encode_to_vec(b"hello", ChunkType::Full);
    bytes[HEADER_SIZE + 2] ^= 0x01;

    assert_corrupt(decode(&bytes, 0));
}

#[test]
fn test_decode_detects_crc_corruption() {
    let mut bytes = encode_to_vec(b"hello", ChunkType::Full);
    bytes[0] ^= 0x80;

    assert_corrupt(decode(&bytes, 0));
}

#[test]
fn test_decode_detects_type_corruption() {
    let mut bytes = encode_to_vec(b"hello", ChunkType::Full);
    bytes[6] = ChunkType::Last.as_byte();

    assert_corrupt(decode(&bytes, 0));
}

#[test]
fn test_decode_unknown_type_with_valid_checksum() {
    let payload = b"xyz";
    let len = (payload.len() as u16).to_le_bytes();
    let type_byte = 9u8;

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&len);
    hasher.update(&[type_byte]);
    hasher.update(payload);
    let crc = hasher.finalize();

    let mut bytes = Vec::new();
    bytes.extend_from_slice(&crc.to_le_bytes());
    bytes.extend_from_slice(&len);
    bytes.push(type_byte);
    bytes.extend_from_slice(payload);

    assert_corrupt(decode(&bytes, 0));
}

#[test]
fn test_decode_zeroed_frame_is_corrupt() {
    // An all-zero header claims a CRC of 0, which an empty Full chunk never has
    assert_corrupt(decode(&[0u8; 16], 0));
}

#[test]
fn test_decode_error_reports_offset() {
    let mut bytes = encode_to_vec(b"hello", ChunkType::Full);
    bytes[HEADER_SIZE] ^= 0xFF;

    match decode(&bytes, 4096) {
        Err(WalError::CorruptFrame { offset, .. }) => assert_eq!(offset, 4096),
        other => panic!("expected CorruptFrame, got {:?}", other),
    }
}
