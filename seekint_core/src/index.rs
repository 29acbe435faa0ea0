use std::io::{Read, Seek, SeekFrom};

use log::debug;
use xxhash_rust::xxh3::xxh3_64;

use crate::error::{Result, SeekIntError};
use crate::format::{
    BlockDescriptor, ContainerHeader, Footer, BLOCK_DESCRIPTOR_SIZE, FOOTER_SIZE, HEADER_SIZE,
};

/// Largest block index accepted by default: 2 Mi descriptors (64 MiB of
/// index, i.e. 128 GiB of data at the default 64 KB block size).
pub const DEFAULT_MAX_BLOCKS: u64 = 2 * 1024 * 1024;

/// Tunables applied while opening a container.
#[derive(Debug, Clone)]
pub struct ReaderOptions {
    /// Refuse containers whose index holds more descriptors than this.
    pub max_blocks: u64,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            max_blocks: DEFAULT_MAX_BLOCKS,
        }
    }
}

/// Parsed and validated block index of a SEEKINT1 container.
///
/// # Open sequence
/// 1. Read the 24-byte header (magic, version, codec, integer layout).
/// 2. Read the 40-byte footer at `file_end - 40` to find the index.
/// 3. Load the index, verify its checksum, and check that the blocks tile
///    `[0, total_bytes)` with no gaps or overlaps.
///
/// Immutable once built; `total_bytes` is computed here exactly once.
#[derive(Debug, Clone)]
pub struct ContainerIndex {
    header: ContainerHeader,
    footer: Footer,
    blocks: Vec<BlockDescriptor>,
}

impl ContainerIndex {
    /// Read and validate the index from any seekable byte source.
    pub fn read<R: Read + Seek>(src: &mut R, options: &ReaderOptions) -> Result<Self> {
        let file_len = src.seek(SeekFrom::End(0))?;
        if file_len < HEADER_SIZE + FOOTER_SIZE {
            return Err(SeekIntError::corrupt(format!(
                "file is {file_len} bytes, too small for header and footer"
            )));
        }

        // ── Header ──────────────────────────────────────────────────────────
        src.seek(SeekFrom::Start(0))?;
        let mut header_buf = [0u8; HEADER_SIZE as usize];
        src.read_exact(&mut header_buf)?;
        let header = ContainerHeader::from_bytes(&header_buf)?;

        // ── Footer ──────────────────────────────────────────────────────────
        src.seek(SeekFrom::Start(file_len - FOOTER_SIZE))?;
        let mut footer_buf = [0u8; FOOTER_SIZE as usize];
        src.read_exact(&mut footer_buf)?;
        let footer = Footer::from_bytes(&footer_buf)?;

        if footer.block_count > options.max_blocks {
            return Err(SeekIntError::corrupt(format!(
                "index holds {} blocks, limit is {}",
                footer.block_count, options.max_blocks
            )));
        }

        let index_len = footer
            .block_count
            .checked_mul(BLOCK_DESCRIPTOR_SIZE)
            .ok_or_else(|| SeekIntError::corrupt("block count overflows index size"))?;
        let expected_len = footer
            .index_offset
            .checked_add(index_len)
            .and_then(|n| n.checked_add(FOOTER_SIZE));
        if footer.index_offset < HEADER_SIZE || expected_len != Some(file_len) {
            return Err(SeekIntError::corrupt(format!(
                "index at offset {} with {} blocks does not end at the footer (file is {} bytes)",
                footer.index_offset, footer.block_count, file_len
            )));
        }

        // ── Index ───────────────────────────────────────────────────────────
        src.seek(SeekFrom::Start(footer.index_offset))?;
        let mut index_buf = vec![0u8; index_len as usize];
        src.read_exact(&mut index_buf)?;

        let computed = xxh3_64(&index_buf);
        if computed != footer.index_checksum {
            return Err(SeekIntError::corrupt(format!(
                "index checksum mismatch: expected {:016x}, got {:016x}",
                footer.index_checksum, computed
            )));
        }

        let mut entry = [0u8; BLOCK_DESCRIPTOR_SIZE as usize];
        let blocks = index_buf
            .chunks_exact(BLOCK_DESCRIPTOR_SIZE as usize)
            .enumerate()
            .map(|(seq, chunk)| {
                entry.copy_from_slice(chunk);
                BlockDescriptor::from_bytes(seq as u64, &entry)
            })
            .collect();

        let index = Self {
            header,
            footer,
            blocks,
        };
        index.validate()?;

        debug!(
            "loaded index: {} blocks, {} raw bytes, codec {}, {}-bit {:?}-endian",
            index.blocks.len(),
            index.footer.total_bytes,
            index.header.codec_id,
            index.header.int_width.bits(),
            index.header.byte_order
        );
        Ok(index)
    }

    /// Check that blocks tile the uncompressed stream and stay inside the data region.
    fn validate(&self) -> Result<()> {
        let width = self.header.int_width.bytes() as u64;
        let block_size = self.header.block_size as u64;
        if block_size == 0 || block_size % width != 0 {
            return Err(SeekIntError::corrupt(format!(
                "header block size {} is not a positive multiple of {} bytes",
                block_size, width
            )));
        }
        let mut expected_raw = 0u64;

        for block in &self.blocks {
            if block.raw_offset != expected_raw {
                let kind = if block.raw_offset < expected_raw {
                    "overlaps"
                } else {
                    "leaves a gap before"
                };
                return Err(SeekIntError::corrupt(format!(
                    "block {} {} uncompressed offset {} (starts at {})",
                    block.seq, kind, expected_raw, block.raw_offset
                )));
            }
            if block.raw_len == 0 {
                return Err(SeekIntError::corrupt(format!("block {} is empty", block.seq)));
            }
            if block.raw_len as u64 > block_size {
                return Err(SeekIntError::corrupt(format!(
                    "block {} holds {} bytes, more than the declared block size {}",
                    block.seq, block.raw_len, block_size
                )));
            }
            if block.raw_len as u64 % width != 0 {
                return Err(SeekIntError::corrupt(format!(
                    "block {} holds {} bytes, not a whole number of {}-bit integers",
                    block.seq,
                    block.raw_len,
                    self.header.int_width.bits()
                )));
            }
            let data_end = self.footer.index_offset;
            if block.compressed_offset < HEADER_SIZE || block.compressed_end() > data_end {
                return Err(SeekIntError::corrupt(format!(
                    "block {} compressed range {}..{} lies outside the data region {}..{}",
                    block.seq,
                    block.compressed_offset,
                    block.compressed_end(),
                    HEADER_SIZE,
                    data_end
                )));
            }
            expected_raw = block.raw_end();
        }

        if expected_raw != self.footer.total_bytes {
            return Err(SeekIntError::corrupt(format!(
                "blocks cover {} bytes but footer declares {}",
                expected_raw, self.footer.total_bytes
            )));
        }
        Ok(())
    }

    pub fn header(&self) -> &ContainerHeader {
        &self.header
    }

    pub fn footer(&self) -> &Footer {
        &self.footer
    }

    pub fn blocks(&self) -> &[BlockDescriptor] {
        &self.blocks
    }

    /// Total uncompressed bytes.
    pub fn total_bytes(&self) -> u64 {
        self.footer.total_bytes
    }

    /// Total number of integers in the stream.
    pub fn total_len(&self) -> u64 {
        self.footer.total_bytes / self.header.int_width.bytes() as u64
    }

    /// Find the block whose uncompressed range contains `byte_offset`.
    pub fn locate(&self, byte_offset: u64) -> Option<&BlockDescriptor> {
        let idx = self.blocks.partition_point(|b| b.raw_end() <= byte_offset);
        self.blocks.get(idx).filter(|b| b.raw_offset <= byte_offset)
    }
}
