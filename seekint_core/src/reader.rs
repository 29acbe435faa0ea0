use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;
use std::sync::Arc;

use log::{debug, trace};
use serde::Serialize;

use crate::cache::BlockCache;
use crate::codec::Codec;
use crate::decoder::BlockDecoder;
use crate::element::{IntBlock, PackedInt};
use crate::error::{Result, SeekIntError};
use crate::format::{BlockDescriptor, ContainerHeader, HEADER_SIZE};
use crate::index::{ContainerIndex, ReaderOptions};

/// Decode and cache counters, for benchmarks and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReaderStats {
    /// Blocks decompressed.
    pub decodes: u64,
    /// Block lookups served from the single-slot cache.
    pub cache_hits: u64,
}

/// Resources released by `close`.
struct OpenState<R> {
    source: R,
    decoder: BlockDecoder,
    cache: BlockCache,
}

impl<R: Read + Seek> OpenState<R> {
    /// Return the decoded block, decoding it only on a cache miss.
    fn load(&mut self, block: &BlockDescriptor, stats: &mut ReaderStats) -> Result<&IntBlock> {
        if self.cache.resident() == Some(block.seq) {
            stats.cache_hits += 1;
            trace!("cache hit for block {}", block.seq);
        } else {
            trace!("cache miss for block {} (resident: {:?})", block.seq, self.cache.resident());
            let decoded = self.decoder.decode(&mut self.source, block)?;
            stats.decodes += 1;
            self.cache.insert(block.seq, decoded);
        }
        self.cache
            .get(block.seq)
            .ok_or_else(|| SeekIntError::decode(block.seq, "block missing from cache after load"))
    }
}

/// Random-access reader for fixed-width integers in a SEEKINT1 container.
///
/// Offsets and lengths are counted in integers, not bytes. A read resolves
/// its range to the covering blocks by binary search over the index, decodes
/// only those, and keeps the most recent block decoded for the next call.
///
/// Reads take `&mut self` because they move the source position and replace
/// the cached block; share a reader between threads only behind a lock.
/// `close` releases the source and is idempotent; dropping the reader
/// releases it as well.
pub struct IntReader<R = File> {
    index: ContainerIndex,
    state: Option<OpenState<R>>,
    stats: ReaderStats,
}

impl IntReader<File> {
    /// Open a container file.
    ///
    /// `codec` must match the `codec_id` stored in the file header. Use
    /// `seekint_codecs::open_reader` to pick it automatically.
    pub fn open(path: impl AsRef<Path>, codec: Arc<dyn Codec>) -> Result<Self> {
        Self::open_with_options(path, codec, ReaderOptions::default())
    }

    pub fn open_with_options(
        path: impl AsRef<Path>,
        codec: Arc<dyn Codec>,
        options: ReaderOptions,
    ) -> Result<Self> {
        let path = path.as_ref();
        debug!("opening {}", path.display());
        let file = File::open(path)?;
        Self::from_source_with_options(file, codec, options)
    }
}

impl<R: Read + Seek> IntReader<R> {
    /// Build a reader over any seekable byte source.
    ///
    /// The source is owned by the reader; if the index cannot be parsed it
    /// is dropped before the error is returned.
    pub fn from_source(source: R, codec: Arc<dyn Codec>) -> Result<Self> {
        Self::from_source_with_options(source, codec, ReaderOptions::default())
    }

    pub fn from_source_with_options(
        mut source: R,
        codec: Arc<dyn Codec>,
        options: ReaderOptions,
    ) -> Result<Self> {
        let index = ContainerIndex::read(&mut source, &options)?;

        let found = index.header().codec_id;
        if found != codec.id() {
            return Err(SeekIntError::CodecMismatch {
                expected: codec.id(),
                found,
            });
        }

        let decoder = BlockDecoder::new(codec, index.header().clone());
        Ok(Self {
            index,
            state: Some(OpenState {
                source,
                decoder,
                cache: BlockCache::new(),
            }),
            stats: ReaderStats::default(),
        })
    }

    /// Total number of integers in the stream. Fixed at open.
    ///
    /// This counts elements, not uncompressed bytes; use
    /// [`byte_len`](IntReader::byte_len) for the byte length.
    pub fn len(&self) -> u64 {
        self.index.total_len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total uncompressed size in bytes.
    pub fn byte_len(&self) -> u64 {
        self.index.total_bytes()
    }

    pub fn header(&self) -> &ContainerHeader {
        self.index.header()
    }

    pub fn index(&self) -> &ContainerIndex {
        &self.index
    }

    #[inline]
    pub fn block_count(&self) -> u64 {
        self.index.blocks().len() as u64
    }

    /// Access the block descriptors (for inspection / benchmarks).
    pub fn entries(&self) -> &[BlockDescriptor] {
        self.index.blocks()
    }

    /// Total compressed size of all blocks in bytes (excluding header and index).
    pub fn compressed_size(&self) -> u64 {
        self.entries().iter().map(|e| e.compressed_len as u64).sum()
    }

    /// Compression ratio (raw / compressed).
    pub fn ratio(&self) -> f64 {
        let compressed = self.compressed_size();
        if compressed == 0 {
            return 1.0;
        }
        self.byte_len() as f64 / compressed as f64
    }

    pub fn stats(&self) -> ReaderStats {
        self.stats
    }

    /// Name of the codec this reader decodes with.
    pub fn codec_name(&self) -> Result<&'static str> {
        Ok(self.open_state()?.decoder.codec().name())
    }

    pub fn is_closed(&self) -> bool {
        self.state.is_none()
    }

    /// Read `length` 32-bit integers starting at element `offset` into
    /// `buffer[start..start + length]`.
    ///
    /// `offset` is an element index, not a byte position: byte `offset * 4`
    /// of the uncompressed stream. The container must declare 32-bit integers.
    pub fn read_int(
        &mut self,
        offset: u64,
        buffer: &mut [i32],
        start: usize,
        length: usize,
    ) -> Result<()> {
        self.read_into(offset, buffer, start, length)
    }

    /// Read `length` integers starting at element `offset` into
    /// `buffer[start..start + length]`.
    ///
    /// `T` must match the width declared in the header. The range must lie
    /// inside both the stream and the buffer; otherwise nothing is decoded.
    /// On error the destination range holds unspecified values.
    pub fn read_into<T: PackedInt>(
        &mut self,
        offset: u64,
        buffer: &mut [T],
        start: usize,
        length: usize,
    ) -> Result<()> {
        let state = self.state.as_mut().ok_or(SeekIntError::UseAfterClose)?;

        let width = self.index.header().int_width;
        if T::WIDTH != width {
            return Err(SeekIntError::WidthMismatch {
                declared: width.bits(),
                requested: T::WIDTH.bits(),
            });
        }

        let total = self.index.total_len();
        let end = offset.checked_add(length as u64).filter(|&end| end <= total);
        let dest_end = start.checked_add(length).filter(|&end| end <= buffer.len());
        let (Some(end), Some(dest_end)) = (end, dest_end) else {
            return Err(SeekIntError::Bounds {
                offset,
                start,
                length,
                total,
                buffer_len: buffer.len(),
            });
        };

        let dest = &mut buffer[start..dest_end];
        let width = width.bytes() as u64;
        let mut elem = offset;
        let mut copied = 0usize;

        while elem < end {
            let block = self.index.locate(elem * width).ok_or_else(|| {
                SeekIntError::corrupt(format!("no block covers element {elem}"))
            })?;
            let first = block.raw_offset / width;

            let values = T::view(state.load(block, &mut self.stats)?).ok_or_else(|| {
                SeekIntError::decode(block.seq, "decoded block has the wrong width")
            })?;

            let from = (elem - first) as usize;
            let take = (values.len() - from).min((end - elem) as usize);
            dest[copied..copied + take].copy_from_slice(&values[from..from + take]);

            copied += take;
            elem += take as u64;
        }

        Ok(())
    }

    /// Read `length` integers starting at element `offset` into a new vector.
    pub fn read_vec<T: PackedInt>(&mut self, offset: u64, length: usize) -> Result<Vec<T>> {
        let mut out = vec![T::default(); length];
        self.read_into(offset, &mut out, 0, length)?;
        Ok(out)
    }

    /// Decoded contents of block `seq`, through the cache.
    pub fn block(&mut self, seq: u64) -> Result<&IntBlock> {
        let state = self.state.as_mut().ok_or(SeekIntError::UseAfterClose)?;
        let block = self.index.blocks().get(seq as usize).ok_or_else(|| {
            SeekIntError::corrupt(format!(
                "block index {} out of range (total {})",
                seq,
                self.index.blocks().len()
            ))
        })?;
        state.load(block, &mut self.stats)
    }

    /// Release the byte source and the cached block.
    ///
    /// Calling `close` again is a no-op; any read afterwards fails with
    /// [`SeekIntError::UseAfterClose`].
    pub fn close(&mut self) -> Result<()> {
        if let Some(state) = self.state.take() {
            debug!(
                "closing reader after {} decodes and {} cache hits",
                self.stats.decodes, self.stats.cache_hits
            );
            drop(state);
        }
        Ok(())
    }

    fn open_state(&self) -> Result<&OpenState<R>> {
        self.state.as_ref().ok_or(SeekIntError::UseAfterClose)
    }
}

/// Read only the header of a container file, e.g. to pick its codec.
pub fn read_header(path: impl AsRef<Path>) -> Result<ContainerHeader> {
    let mut file = File::open(path)?;
    let mut buf = [0u8; HEADER_SIZE as usize];
    file.read_exact(&mut buf).map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => SeekIntError::corrupt("file too small for header"),
        _ => SeekIntError::Io(e),
    })?;
    ContainerHeader::from_bytes(&buf)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::format::IntWidth;
    use crate::test_support::{container_bytes, CountingCodec, IdentityCodec};
    use crate::writer::{Writer, WriterOptions};

    /// In-memory source that records when it is dropped.
    struct TrackedSource {
        inner: Cursor<Vec<u8>>,
        released: Arc<AtomicBool>,
    }

    impl Read for TrackedSource {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.inner.read(buf)
        }
    }

    impl Seek for TrackedSource {
        fn seek(&mut self, pos: std::io::SeekFrom) -> std::io::Result<u64> {
            self.inner.seek(pos)
        }
    }

    impl Drop for TrackedSource {
        fn drop(&mut self) {
            self.released.store(true, Ordering::SeqCst);
        }
    }

    fn tracked(bytes: Vec<u8>) -> (TrackedSource, Arc<AtomicBool>) {
        let released = Arc::new(AtomicBool::new(false));
        let source = TrackedSource {
            inner: Cursor::new(bytes),
            released: released.clone(),
        };
        (source, released)
    }

    fn values(n: i32) -> Vec<i32> {
        (0..n).map(|i| i.wrapping_mul(2_654_435_761_u32 as i32)).collect()
    }

    fn reader_over(values: &[i32], block_size: u32) -> (IntReader<Cursor<Vec<u8>>>, CountingCodec) {
        let codec = CountingCodec::default();
        let bytes = container_bytes(values, block_size);
        let reader = IntReader::from_source(Cursor::new(bytes), Arc::new(codec.clone())).unwrap();
        (reader, codec)
    }

    #[test]
    fn every_range_matches_full_decode() {
        let data = values(50);
        // 12-byte blocks hold 3 integers each; ranges cross many boundaries
        let (mut reader, _) = reader_over(&data, 12);
        assert_eq!(reader.len(), 50);

        for offset in 0..=50u64 {
            for length in 0..=(50 - offset as usize) {
                let got: Vec<i32> = reader.read_vec(offset, length).unwrap();
                assert_eq!(got, &data[offset as usize..offset as usize + length]);
            }
        }
    }

    #[test]
    fn writes_at_buffer_start() {
        let data = values(20);
        let (mut reader, _) = reader_over(&data, 16);
        let mut buffer = [-1i32; 10];
        reader.read_int(5, &mut buffer, 3, 6).unwrap();
        assert_eq!(&buffer[..3], &[-1, -1, -1]);
        assert_eq!(&buffer[3..9], &data[5..11]);
        assert_eq!(buffer[9], -1);
    }

    #[test]
    fn repeated_read_hits_cache() {
        let data = values(64);
        let (mut reader, codec) = reader_over(&data, 64);

        let first: Vec<i32> = reader.read_vec(2, 5).unwrap();
        assert_eq!(codec.count(), 1);
        let second: Vec<i32> = reader.read_vec(2, 5).unwrap();
        assert_eq!(first, second);
        assert_eq!(codec.count(), 1, "second read must be served from the cache");
        assert_eq!(reader.stats(), ReaderStats { decodes: 1, cache_hits: 1 });
    }

    #[test]
    fn spanning_read_evicts_previous_block() {
        let data = values(64);
        // 16 integers per block
        let (mut reader, codec) = reader_over(&data, 64);

        reader.read_vec::<i32>(14, 4).unwrap(); // blocks 0 and 1
        assert_eq!(codec.count(), 2);
        reader.read_vec::<i32>(16, 2).unwrap(); // block 1 still resident
        assert_eq!(codec.count(), 2);
        reader.read_vec::<i32>(0, 1).unwrap(); // block 0 was evicted
        assert_eq!(codec.count(), 3);
    }

    #[test]
    fn out_of_bounds_read_decodes_nothing() {
        let data = values(10);
        let (mut reader, codec) = reader_over(&data, 16);
        let mut buffer = [0i32; 8];

        let err = reader.read_int(8, &mut buffer, 0, 3).unwrap_err();
        assert!(matches!(err, SeekIntError::Bounds { total: 10, .. }), "got: {err}");

        let err = reader.read_int(0, &mut buffer, 6, 3).unwrap_err();
        assert!(matches!(err, SeekIntError::Bounds { buffer_len: 8, .. }), "got: {err}");

        let err = reader.read_int(u64::MAX, &mut buffer, 0, 1).unwrap_err();
        assert!(matches!(err, SeekIntError::Bounds { .. }));

        assert_eq!(codec.count(), 0);
    }

    #[test]
    fn zero_length_read_at_end_succeeds() {
        let (mut reader, codec) = reader_over(&values(10), 16);
        let mut buffer: [i32; 0] = [];
        reader.read_int(10, &mut buffer, 0, 0).unwrap();
        assert_eq!(codec.count(), 0);
    }

    #[test]
    fn width_mismatch_is_reported() {
        let (mut reader, _) = reader_over(&values(10), 16);
        let err = reader.read_vec::<i64>(0, 1).unwrap_err();
        assert!(matches!(
            err,
            SeekIntError::WidthMismatch { declared: 32, requested: 64 }
        ));
    }

    #[test]
    fn close_is_idempotent_and_blocks_reads() {
        let (source, released) = tracked(container_bytes(&values(10), 16));
        let mut reader = IntReader::from_source(source, Arc::new(IdentityCodec)).unwrap();
        assert!(!released.load(Ordering::SeqCst));

        reader.close().unwrap();
        assert!(released.load(Ordering::SeqCst));
        reader.close().unwrap();

        let mut buffer = [0i32; 1];
        assert!(matches!(
            reader.read_int(0, &mut buffer, 0, 1),
            Err(SeekIntError::UseAfterClose)
        ));
        assert!(matches!(reader.block(0), Err(SeekIntError::UseAfterClose)));
        assert_eq!(reader.len(), 10);
    }

    #[test]
    fn failed_open_releases_source() {
        let mut bytes = container_bytes(&values(10), 16);
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff; // footer magic
        let (source, released) = tracked(bytes);

        let result = IntReader::from_source(source, Arc::new(IdentityCodec));
        assert!(matches!(result, Err(SeekIntError::CorruptContainer(_))));
        assert!(released.load(Ordering::SeqCst));
    }

    #[test]
    fn corrupt_block_fails_alone() {
        let data = values(32);
        let mut bytes = container_bytes(&data, 32); // 8 integers per block
        // first payload byte of block 1
        bytes[HEADER_SIZE as usize + 32] ^= 0x01;

        let mut reader =
            IntReader::from_source(Cursor::new(bytes), Arc::new(IdentityCodec)).unwrap();
        let err = reader.read_vec::<i32>(8, 2).unwrap_err();
        assert!(matches!(err, SeekIntError::Decode { block: 1, .. }), "got: {err}");
        assert!(err.to_string().contains("checksum"));

        assert_eq!(reader.read_vec::<i32>(0, 8).unwrap(), &data[..8]);
        assert_eq!(reader.read_vec::<i32>(16, 16).unwrap(), &data[16..]);
    }

    #[test]
    fn codec_mismatch_is_rejected() {
        struct OtherCodec;
        impl Codec for OtherCodec {
            fn id(&self) -> u16 {
                99
            }
            fn name(&self) -> &'static str {
                "other"
            }
            fn compress_block(&self, raw: &[u8]) -> anyhow::Result<Vec<u8>> {
                Ok(raw.to_vec())
            }
            fn decompress_block(&self, compressed: &[u8], _: usize) -> anyhow::Result<Vec<u8>> {
                Ok(compressed.to_vec())
            }
        }

        let bytes = container_bytes(&values(4), 16);
        let err = IntReader::from_source(Cursor::new(bytes), Arc::new(OtherCodec)).err().unwrap();
        assert!(matches!(err, SeekIntError::CodecMismatch { expected: 99, found: 0 }));
    }

    #[test]
    fn sixteen_bit_little_endian_stream() {
        let mut sink = Cursor::new(Vec::new());
        let options = WriterOptions {
            block_size: 6,
            int_width: IntWidth::W16,
            byte_order: crate::format::ByteOrder::Little,
        };
        let data: Vec<i16> = (-10..10).collect();
        let mut writer = Writer::new(&mut sink, Box::new(IdentityCodec), options).unwrap();
        writer.write_ints(&data).unwrap();
        writer.finish().unwrap();

        let bytes = sink.into_inner();
        let mut reader =
            IntReader::from_source(Cursor::new(bytes), Arc::new(IdentityCodec)).unwrap();
        assert_eq!(reader.len(), 20);
        assert_eq!(reader.read_vec::<i16>(4, 9).unwrap(), &data[4..13]);
        assert!(reader.read_int(0, &mut [0i32; 1], 0, 1).is_err());
    }

    #[test]
    fn offsets_count_integers_not_bytes() {
        let data = values(100);
        let (mut reader, _) = reader_over(&data, 64);
        assert_eq!(reader.len(), 100);
        assert_eq!(reader.byte_len(), 400);

        let mut buffer = [0i32; 1];
        reader.read_int(90, &mut buffer, 0, 1).unwrap();
        assert_eq!(buffer[0], data[90]);
        // a byte position past the element count is out of bounds
        assert!(matches!(
            reader.read_int(360, &mut buffer, 0, 1),
            Err(SeekIntError::Bounds { total: 100, .. })
        ));
    }

    #[test]
    fn block_accessor_goes_through_cache() {
        let data = values(8);
        let (mut reader, codec) = reader_over(&data, 16);
        assert_eq!(reader.block(1).unwrap(), &IntBlock::I32(data[4..8].to_vec()));
        reader.read_vec::<i32>(5, 2).unwrap();
        assert_eq!(codec.count(), 1);
        assert!(reader.block(9).is_err());
        assert_eq!(reader.byte_len(), 32);
        assert_eq!(reader.index().footer().index_offset, HEADER_SIZE + 32);
    }
}
