//! Helpers shared by the unit tests of this crate.

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use xxhash_rust::xxh3::xxh3_64;

use crate::codec::Codec;
use crate::format::{BlockDescriptor, Footer, BLOCK_DESCRIPTOR_SIZE, CODEC_PASSTHROUGH, FOOTER_SIZE};
use crate::writer::{Writer, WriterOptions};

/// Stores blocks verbatim.
pub struct IdentityCodec;

impl Codec for IdentityCodec {
    fn id(&self) -> u16 {
        CODEC_PASSTHROUGH
    }

    fn name(&self) -> &'static str {
        "identity"
    }

    fn compress_block(&self, raw: &[u8]) -> anyhow::Result<Vec<u8>> {
        Ok(raw.to_vec())
    }

    fn decompress_block(&self, compressed: &[u8], _expected_len: usize) -> anyhow::Result<Vec<u8>> {
        Ok(compressed.to_vec())
    }
}

/// Identity codec that counts `decompress_block` calls.
#[derive(Default, Clone)]
pub struct CountingCodec {
    pub calls: Arc<AtomicUsize>,
}

impl CountingCodec {
    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Codec for CountingCodec {
    fn id(&self) -> u16 {
        CODEC_PASSTHROUGH
    }

    fn name(&self) -> &'static str {
        "counting"
    }

    fn compress_block(&self, raw: &[u8]) -> anyhow::Result<Vec<u8>> {
        Ok(raw.to_vec())
    }

    fn decompress_block(&self, compressed: &[u8], _expected_len: usize) -> anyhow::Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(compressed.to_vec())
    }
}

/// Build an in-memory container of big-endian i32 values.
pub fn container_bytes(values: &[i32], block_size: u32) -> Vec<u8> {
    let mut sink = Cursor::new(Vec::new());
    let options = WriterOptions {
        block_size,
        ..WriterOptions::default()
    };
    let mut writer = Writer::new(&mut sink, Box::new(IdentityCodec), options).unwrap();
    writer.write_ints(values).unwrap();
    writer.finish().unwrap();
    sink.into_inner()
}

/// Edit the block index of a container and re-seal it with a valid index checksum.
pub fn rewrite_index(mut bytes: Vec<u8>, edit: impl FnOnce(&mut Vec<BlockDescriptor>)) -> Vec<u8> {
    let footer_at = bytes.len() - FOOTER_SIZE as usize;
    let mut footer_buf = [0u8; FOOTER_SIZE as usize];
    footer_buf.copy_from_slice(&bytes[footer_at..]);
    let mut footer = Footer::from_bytes(&footer_buf).unwrap();

    let start = footer.index_offset as usize;
    let mut entry = [0u8; BLOCK_DESCRIPTOR_SIZE as usize];
    let mut blocks: Vec<BlockDescriptor> = bytes[start..footer_at]
        .chunks_exact(BLOCK_DESCRIPTOR_SIZE as usize)
        .enumerate()
        .map(|(seq, chunk)| {
            entry.copy_from_slice(chunk);
            BlockDescriptor::from_bytes(seq as u64, &entry)
        })
        .collect();
    edit(&mut blocks);

    let index: Vec<u8> = blocks.iter().flat_map(|b| b.to_bytes()).collect();
    footer.index_checksum = xxh3_64(&index);
    bytes[start..footer_at].copy_from_slice(&index);
    bytes[footer_at..].copy_from_slice(&footer.to_bytes());
    bytes
}
