//! Tests for the Block Framer
//!
//! These tests verify:
//! - Block geometry helpers (remaining space, padding, read alignment)
//! - Chunk type sequences for records that fit, span, or start mid-block
//! - Zero padding of block tails too small for a header
//! - The required-space estimate

use blockwal::wal::{
    decode, BlockLayout, ChunkType, DEFAULT_BLOCK_SIZE, HEADER_SIZE, MAX_BLOCK_SIZE,
    MIN_BLOCK_SIZE,
};
use blockwal::WalError;
use bytes::BytesMut;

// =============================================================================
// Helper Functions
// =============================================================================

const BLOCK: usize = 32;

fn small_layout() -> BlockLayout {
    BlockLayout::new(BLOCK).unwrap()
}

/// Decode the chunk types and data found in a framed buffer written at `base`
fn chunk_types(layout: &BlockLayout, base: u64, bytes: &[u8]) -> Vec<(ChunkType, Vec<u8>)> {
    let mut chunks = Vec::new();
    let mut pos = 0usize;

    loop {
        let aligned = layout.aligned_read_offset(base + pos as u64);
        pos = (aligned - base) as usize;
        if pos >= bytes.len() {
            break;
        }
        let chunk = decode(&bytes[pos..], aligned).unwrap();
        chunks.push((chunk.chunk_type(), chunk.data.to_vec()));
        pos += chunk.encoded_len();
    }

    chunks
}

// =============================================================================
// Geometry Tests
// =============================================================================

#[test]
fn test_layout_rejects_out_of_range_block_sizes() {
    assert!(matches!(
        BlockLayout::new(MIN_BLOCK_SIZE - 1),
        Err(WalError::Config(_))
    ));
    assert!(matches!(
        BlockLayout::new(MAX_BLOCK_SIZE + 1),
        Err(WalError::Config(_))
    ));

    assert!(BlockLayout::new(MIN_BLOCK_SIZE).is_ok());
    assert!(BlockLayout::new(MAX_BLOCK_SIZE).is_ok());
}

#[test]
fn test_default_layout() {
    let layout = BlockLayout::default();
    assert_eq!(layout.block_size(), DEFAULT_BLOCK_SIZE);
    assert_eq!(layout.max_chunk_payload(), DEFAULT_BLOCK_SIZE - HEADER_SIZE);
}

#[test]
fn test_remaining_in_block() {
    let layout = small_layout();

    assert_eq!(layout.remaining_in_block(0), 32);
    assert_eq!(layout.remaining_in_block(1), 31);
    assert_eq!(layout.remaining_in_block(31), 1);
    assert_eq!(layout.remaining_in_block(32), 32);
    assert_eq!(layout.remaining_in_block(70), 26);
}

#[test]
fn test_padding_region_and_read_alignment() {
    let layout = small_layout();

    // 8 bytes left: a header and one data byte still fit
    assert!(!layout.in_padding(24));
    assert_eq!(layout.aligned_read_offset(24), 24);

    // 7 bytes left or fewer: padding
    assert!(layout.in_padding(25));
    assert!(layout.in_padding(31));
    assert_eq!(layout.aligned_read_offset(25), 32);
    assert_eq!(layout.aligned_read_offset(31), 32);

    assert_eq!(layout.aligned_read_offset(32), 32);
    assert_eq!(layout.aligned_read_offset(0), 0);
}

// =============================================================================
// Required Space Tests
// =============================================================================

#[test]
fn test_required_space() {
    let layout = small_layout();

    // Empty payload still costs a header
    assert_eq!(layout.required_space(0), HEADER_SIZE as u64);
    assert_eq!(layout.required_space(5), 12);
    // Exactly one full chunk
    assert_eq!(layout.required_space(25), 32);
    assert_eq!(layout.required_space(26), 32 + 1 + 7);
    assert_eq!(layout.required_space(75), 96);
}

#[test]
fn test_required_space_is_a_lower_bound() {
    let layout = small_layout();

    for offset in [0u64, 5, 20, 24, 26, 31] {
        for len in [0usize, 1, 10, 25, 26, 60, 100] {
            let payload = vec![7u8; len];
            let mut out = BytesMut::new();
            let framed = layout.frame(offset, &payload, &mut out).unwrap();

            let used = framed.end - offset;
            assert!(
                used >= layout.required_space(len),
                "offset {} len {}: used {} < estimate {}",
                offset,
                len,
                used,
                layout.required_space(len)
            );
        }
    }
}

// =============================================================================
// Framing Tests
// =============================================================================

#[test]
fn test_frame_small_record_is_single_full_chunk() {
    let layout = small_layout();
    let mut out = BytesMut::new();

    let framed = layout.frame(0, b"hello", &mut out).unwrap();

    assert_eq!(framed.start, 0);
    assert_eq!(framed.end, 12);
    assert_eq!(framed.chunks, 1);
    assert_eq!(framed.padding, 0);
    assert_eq!(out.len(), 12);

    let chunks = chunk_types(&layout, 0, &out);
    assert_eq!(chunks, vec![(ChunkType::Full, b"hello".to_vec())]);
}

#[test]
fn test_frame_empty_record() {
    let layout = small_layout();
    let mut out = BytesMut::new();

    let framed = layout.frame(0, b"", &mut out).unwrap();

    assert_eq!(framed.chunks, 1);
    assert_eq!(framed.end, HEADER_SIZE as u64);
    assert_eq!(chunk_types(&layout, 0, &out), vec![(ChunkType::Full, Vec::new())]);
}

#[test]
fn test_frame_spanning_record_chunk_sequence() {
    let layout = small_layout();
    let payload: Vec<u8> = (0..75u8).collect();
    let mut out = BytesMut::new();

    let framed = layout.frame(0, &payload, &mut out).unwrap();

    assert_eq!(framed.chunks, 3);
    assert_eq!(framed.end, 96);
    assert_eq!(framed.padding, 0);

    let chunks = chunk_types(&layout, 0, &out);
    let types: Vec<ChunkType> = chunks.iter().map(|(t, _)| *t).collect();
    assert_eq!(types, vec![ChunkType::First, ChunkType::Middle, ChunkType::Last]);

    let reassembled: Vec<u8> = chunks.into_iter().flat_map(|(_, d)| d).collect();
    assert_eq!(reassembled, payload);
}

#[test]
fn test_frame_three_block_payload() {
    let layout = small_layout();
    let payload = vec![0x33u8; 3 * BLOCK];
    let mut out = BytesMut::new();

    let framed = layout.frame(0, &payload, &mut out).unwrap();

    let chunks = chunk_types(&layout, 0, &out);
    let types: Vec<ChunkType> = chunks.iter().map(|(t, _)| *t).collect();
    assert_eq!(
        types,
        vec![
            ChunkType::First,
            ChunkType::Middle,
            ChunkType::Middle,
            ChunkType::Last
        ]
    );
    assert_eq!(framed.chunks, 4);

    let reassembled: Vec<u8> = chunks.into_iter().flat_map(|(_, d)| d).collect();
    assert_eq!(reassembled, payload);
}

#[test]
fn test_frame_record_starting_mid_block() {
    let layout = small_layout();
    let payload = vec![0x42u8; 10];
    let mut out = BytesMut::new();

    // 12 bytes left in the block: room for 5 data bytes
    let framed = layout.frame(20, &payload, &mut out).unwrap();

    assert_eq!(framed.start, 20);
    assert_eq!(framed.chunks, 2);
    assert_eq!(framed.end, 32 + 7 + 5);

    let chunks = chunk_types(&layout, 20, &out);
    assert_eq!(chunks[0], (ChunkType::First, vec![0x42; 5]));
    assert_eq!(chunks[1], (ChunkType::Last, vec![0x42; 5]));
}

#[test]
fn test_frame_pads_small_block_tail() {
    let layout = small_layout();
    let mut out = BytesMut::new();

    // 7 + 18 = 25 bytes, leaving exactly a header's worth of space
    let framed = layout.frame(0, &[1u8; 18], &mut out).unwrap();

    assert_eq!(framed.padding, 7);
    assert_eq!(framed.end, 32);
    assert_eq!(out.len(), 32);
    assert!(out[25..].iter().all(|&b| b == 0));
}

#[test]
fn test_frame_skips_padding_before_first_chunk() {
    let layout = small_layout();
    let mut out = BytesMut::new();

    let framed = layout.frame(26, b"hi", &mut out).unwrap();

    assert_eq!(framed.start, 32);
    assert_eq!(framed.padding, 6);
    assert_eq!(framed.end, 32 + 7 + 2);
    assert!(out[..6].iter().all(|&b| b == 0));
}

#[test]
fn test_frame_exactly_fills_block() {
    let layout = small_layout();
    let mut out = BytesMut::new();

    let framed = layout.frame(0, &[9u8; 25], &mut out).unwrap();

    assert_eq!(framed.chunks, 1);
    assert_eq!(framed.padding, 0);
    assert_eq!(framed.end, 32);
}

#[test]
fn test_frame_never_crosses_block_boundaries() {
    let layout = small_layout();

    for offset in 0..64u64 {
        let mut out = BytesMut::new();
        let framed = layout.frame(offset, &[3u8; 90], &mut out).unwrap();

        let mut pos = framed.start;
        loop {
            let rel = (pos - offset) as usize;
            let chunk = decode(&out[rel..], pos).unwrap();
            let chunk_end = pos + chunk.encoded_len() as u64;
            assert_eq!(
                pos / BLOCK as u64,
                (chunk_end - 1) / BLOCK as u64,
                "chunk at {} crosses a block boundary",
                pos
            );
            if chunk.chunk_type().is_terminal() {
                break;
            }
            pos = layout.aligned_read_offset(chunk_end);
        }
    }
}
