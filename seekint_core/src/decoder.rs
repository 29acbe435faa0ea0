use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::sync::Arc;

use log::{trace, warn};
use xxhash_rust::xxh3::xxh3_64;

use crate::codec::Codec;
use crate::element::IntBlock;
use crate::error::{Result, SeekIntError};
use crate::format::{BlockDescriptor, ContainerHeader, FLAG_HAS_CHECKSUM};

/// Turns one block of a container into its integers.
///
/// Failures are final for that block: the compressed bytes do not change
/// between attempts, so nothing is retried.
pub struct BlockDecoder {
    codec: Arc<dyn Codec>,
    header: ContainerHeader,
}

impl BlockDecoder {
    pub fn new(codec: Arc<dyn Codec>, header: ContainerHeader) -> Self {
        Self { codec, header }
    }

    pub fn codec(&self) -> &Arc<dyn Codec> {
        &self.codec
    }

    /// Read, verify, decompress and reinterpret `block`.
    pub fn decode<R: Read + Seek>(&self, src: &mut R, block: &BlockDescriptor) -> Result<IntBlock> {
        src.seek(SeekFrom::Start(block.compressed_offset))?;

        let mut compressed = vec![0u8; block.compressed_len as usize];
        src.read_exact(&mut compressed).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => SeekIntError::decode(
                block.seq,
                format!("truncated: expected {} compressed bytes", block.compressed_len),
            ),
            _ => SeekIntError::Io(e),
        })?;

        if self.header.has_flag(FLAG_HAS_CHECKSUM) {
            let computed = xxh3_64(&compressed);
            if computed != block.checksum {
                warn!("block {} failed checksum verification", block.seq);
                return Err(SeekIntError::decode(
                    block.seq,
                    format!(
                        "checksum mismatch: expected {:016x}, got {:016x}",
                        block.checksum, computed
                    ),
                ));
            }
        }

        let raw = self
            .codec
            .decompress_block(&compressed, block.raw_len as usize)
            .map_err(|e| {
                SeekIntError::decode(block.seq, format!("{} codec: {e:#}", self.codec.name()))
            })?;

        if raw.len() != block.raw_len as usize {
            return Err(SeekIntError::decode(
                block.seq,
                format!("decompressed to {} bytes but index says {}", raw.len(), block.raw_len),
            ));
        }

        trace!(
            "decoded block {} ({} -> {} bytes)",
            block.seq,
            block.compressed_len,
            block.raw_len
        );

        IntBlock::from_bytes(&raw, self.header.int_width, self.header.byte_order).ok_or_else(|| {
            SeekIntError::decode(block.seq, "decoded size is not a whole number of integers")
        })
    }
}
