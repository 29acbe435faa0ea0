use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use seekint_core::codec::Codec;
use seekint_core::format::CODEC_DEFLATE;

/// Zlib/deflate block codec.
///
/// Every block is a complete zlib stream, so blocks decode independently.
/// Default level 7 keeps archives compact without the cost of level 9.
///
/// Best for: portability, since any zlib implementation can unpack a block.
pub struct DeflateCodec {
    pub level: u32,
}

impl Default for DeflateCodec {
    fn default() -> Self {
        Self { level: 7 }
    }
}

impl DeflateCodec {
    pub fn new(level: u32) -> Self {
        Self { level: level.min(9) }
    }
}

impl Codec for DeflateCodec {
    fn id(&self) -> u16 {
        CODEC_DEFLATE
    }

    fn name(&self) -> &'static str {
        "deflate"
    }

    fn compress_block(&self, raw: &[u8]) -> anyhow::Result<Vec<u8>> {
        let level = Compression::new(self.level);
        let mut encoder = ZlibEncoder::new(Vec::with_capacity(raw.len() / 2), level);
        encoder.write_all(raw)?;
        Ok(encoder.finish()?)
    }

    fn decompress_block(&self, compressed: &[u8], expected_len: usize) -> anyhow::Result<Vec<u8>> {
        // Read one byte past the expected size so an oversized stream is
        // detected without inflating all of it.
        let mut raw = Vec::with_capacity(expected_len);
        ZlibDecoder::new(compressed)
            .take(expected_len as u64 + 1)
            .read_to_end(&mut raw)
            .map_err(|e| anyhow::anyhow!("zlib decompress error: {}", e))?;
        Ok(raw)
    }
}
