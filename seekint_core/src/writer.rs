use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use log::{debug, trace};
use xxhash_rust::xxh3::xxh3_64;

use crate::codec::Codec;
use crate::element::PackedInt;
use crate::error::{Result, SeekIntError};
use crate::format::{
    BlockDescriptor, ByteOrder, ContainerHeader, Footer, IntWidth, DEFAULT_BLOCK_SIZE,
    FLAG_HAS_CHECKSUM, FORMAT_VERSION, HEADER_SIZE,
};

/// Layout of a container being written.
#[derive(Debug, Clone)]
pub struct WriterOptions {
    /// Raw bytes per block; must be a positive multiple of the integer width.
    pub block_size: u32,
    pub int_width: IntWidth,
    pub byte_order: ByteOrder,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            int_width: IntWidth::W32,
            byte_order: ByteOrder::Big,
        }
    }
}

impl WriterOptions {
    pub fn validate(&self) -> Result<()> {
        let width = self.int_width.bytes() as u32;
        if self.block_size == 0 || self.block_size % width != 0 {
            return Err(SeekIntError::InvalidInput(format!(
                "block size {} is not a positive multiple of {} bytes",
                self.block_size, width
            )));
        }
        Ok(())
    }
}

/// Streaming writer for SEEKINT1 containers.
///
/// # Write contract
/// Call [`write_ints`](Writer::write_ints) or [`write_bytes`](Writer::write_bytes)
/// any number of times. The writer accumulates data and flushes independent
/// compressed blocks whenever `block_size` raw bytes have been gathered.
/// Call [`finish`](Writer::finish) to flush the partial last block, append
/// the index and footer, and write back the final header.
///
/// # Format layout written
/// ```text
/// [HEADER: 24 bytes placeholder]
/// [BLOCK 0] [BLOCK 1] ... [BLOCK N-1]      <- independent compressed blocks
/// [INDEX: 32 bytes x N]
/// [FOOTER: 40 bytes, locates the index]
/// <- seek back to 0, overwrite header with real values
/// ```
pub struct Writer<W: Write + Seek = BufWriter<File>> {
    sink: W,
    codec: Box<dyn Codec>,
    options: WriterOptions,
    /// Pending raw bytes not yet flushed into a block.
    pending: Vec<u8>,
    /// In-memory block index, appended on `finish()`.
    entries: Vec<BlockDescriptor>,
    /// Current write position in the sink (mirrors the cursor).
    current_offset: u64,
    raw_offset: u64,
}

impl Writer<BufWriter<File>> {
    /// Create a new container file at `path`, overwriting any existing file.
    pub fn create(
        path: impl AsRef<Path>,
        codec: Box<dyn Codec>,
        options: WriterOptions,
    ) -> Result<Self> {
        options.validate()?;
        let file = File::create(path)?;
        Self::new(BufWriter::new(file), codec, options)
    }
}

impl<W: Write + Seek> Writer<W> {
    /// Start a container at the current (zero) position of `sink`.
    pub fn new(mut sink: W, codec: Box<dyn Codec>, options: WriterOptions) -> Result<Self> {
        options.validate()?;
        // Placeholder header, overwritten in finish()
        sink.write_all(&[0u8; HEADER_SIZE as usize])?;
        Ok(Self {
            sink,
            codec,
            pending: Vec::with_capacity(options.block_size as usize * 2),
            options,
            entries: Vec::new(),
            current_offset: HEADER_SIZE,
            raw_offset: 0,
        })
    }

    /// Encode `values` in the declared byte order and buffer them.
    pub fn write_ints<T: PackedInt>(&mut self, values: &[T]) -> Result<()> {
        if T::WIDTH != self.options.int_width {
            return Err(SeekIntError::WidthMismatch {
                declared: self.options.int_width.bits(),
                requested: T::WIDTH.bits(),
            });
        }
        let mut encoded = Vec::with_capacity(values.len() * self.options.int_width.bytes());
        for &v in values {
            v.encode_into(self.options.byte_order, &mut encoded);
        }
        self.write_bytes(&encoded)
    }

    /// Buffer already-encoded integer bytes and flush complete blocks.
    pub fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.pending.extend_from_slice(data);
        let block_size = self.options.block_size as usize;
        while self.pending.len() >= block_size {
            let raw: Vec<u8> = self.pending.drain(..block_size).collect();
            self.flush_block(&raw)?;
        }
        Ok(())
    }

    /// Compress `raw` as a single block and write it to the sink.
    fn flush_block(&mut self, raw: &[u8]) -> Result<()> {
        let seq = self.entries.len() as u64;
        let compressed = self.codec.compress_block(raw).map_err(|e| SeekIntError::Encode {
            block: seq,
            reason: format!("{} codec: {e:#}", self.codec.name()),
        })?;
        let compressed_len = u32::try_from(compressed.len()).map_err(|_| SeekIntError::Encode {
            block: seq,
            reason: format!("compressed block of {} bytes exceeds u32", compressed.len()),
        })?;

        self.sink.write_all(&compressed)?;
        trace!("wrote block {} ({} -> {} bytes)", seq, raw.len(), compressed_len);

        self.entries.push(BlockDescriptor {
            seq,
            compressed_offset: self.current_offset,
            compressed_len,
            raw_offset: self.raw_offset,
            raw_len: raw.len() as u32,
            checksum: xxh3_64(&compressed),
        });
        self.current_offset += compressed_len as u64;
        self.raw_offset += raw.len() as u64;
        Ok(())
    }

    /// Flush remaining buffered data, write the index + footer, and seal the
    /// container by writing the final header.
    ///
    /// Returns the number of blocks written.
    pub fn finish(self) -> Result<u64> {
        self.finish_into_inner().map(|(_, blocks)| blocks)
    }

    /// Like [`finish`](Writer::finish), but hands the sink back.
    pub fn finish_into_inner(mut self) -> Result<(W, u64)> {
        let partial = self.pending.len() % self.options.int_width.bytes();
        if partial != 0 {
            return Err(SeekIntError::InvalidInput(format!(
                "{} trailing bytes do not form a whole {}-bit integer",
                partial,
                self.options.int_width.bits()
            )));
        }
        if !self.pending.is_empty() {
            let remaining = std::mem::take(&mut self.pending);
            self.flush_block(&remaining)?;
        }

        // ── Index ──────────────────────────────────────────────────────────
        let index_offset = self.current_offset;
        let index: Vec<u8> = self.entries.iter().flat_map(|e| e.to_bytes()).collect();
        self.sink.write_all(&index)?;

        // ── Footer ─────────────────────────────────────────────────────────
        let block_count = self.entries.len() as u64;
        let footer = Footer {
            index_offset,
            block_count,
            total_bytes: self.raw_offset,
            index_checksum: xxh3_64(&index),
        };
        self.sink.write_all(&footer.to_bytes())?;

        // ── Seek back to 0 and write the real header ────────────────────────
        let header = ContainerHeader {
            version: FORMAT_VERSION,
            codec_id: self.codec.id(),
            int_width: self.options.int_width,
            byte_order: self.options.byte_order,
            block_size: self.options.block_size,
            flags: FLAG_HAS_CHECKSUM,
        };
        self.sink.seek(SeekFrom::Start(0))?;
        self.sink.write_all(&header.to_bytes())?;
        self.sink.flush()?;

        debug!(
            "sealed container: {} blocks, {} raw bytes, codec {}",
            block_count,
            self.raw_offset,
            self.codec.name()
        );
        Ok((self.sink, block_count))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::format::{FOOTER_SIZE, MAGIC};
    use crate::test_support::IdentityCodec;

    fn in_memory(options: WriterOptions) -> Result<Writer<Cursor<Vec<u8>>>> {
        Writer::new(Cursor::new(Vec::new()), Box::new(IdentityCodec), options)
    }

    #[test]
    fn rejects_unaligned_block_size() {
        let options = WriterOptions {
            block_size: 10,
            ..WriterOptions::default()
        };
        let err = in_memory(options).err().unwrap();
        assert!(matches!(err, SeekIntError::InvalidInput(_)));

        let options = WriterOptions {
            block_size: 0,
            ..WriterOptions::default()
        };
        assert!(options.validate().is_err());
    }

    #[test]
    fn rejects_wrong_element_type() {
        let mut writer = in_memory(WriterOptions::default()).unwrap();
        let err = writer.write_ints(&[1i64]).unwrap_err();
        assert!(matches!(err, SeekIntError::WidthMismatch { declared: 32, requested: 64 }));
    }

    #[test]
    fn rejects_trailing_partial_integer() {
        let mut writer = in_memory(WriterOptions::default()).unwrap();
        writer.write_bytes(&[0, 0, 0, 1, 0, 0]).unwrap();
        let err = writer.finish().unwrap_err();
        assert!(err.to_string().contains("2 trailing bytes"), "got: {err}");
    }

    #[test]
    fn layout_is_header_blocks_index_footer() {
        let options = WriterOptions {
            block_size: 8,
            ..WriterOptions::default()
        };
        let mut writer = in_memory(options).unwrap();
        writer.write_ints(&[1i32, 2, 3]).unwrap();
        writer.write_ints(&[4i32, 5]).unwrap();
        let (sink, blocks) = writer.finish_into_inner().unwrap();
        assert_eq!(blocks, 3);

        let bytes = sink.into_inner();
        assert_eq!(&bytes[..8], MAGIC);
        // identity payload: 20 raw bytes, big-endian
        assert_eq!(&bytes[24..28], &[0, 0, 0, 1]);
        assert_eq!(&bytes[40..44], &[0, 0, 0, 5]);
        assert_eq!(bytes.len() as u64, HEADER_SIZE + 20 + 3 * 32 + FOOTER_SIZE);
    }
}
