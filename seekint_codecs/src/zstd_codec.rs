use anyhow::Context;
use seekint_core::codec::Codec;
use seekint_core::format::CODEC_ZSTD;

/// Zstandard block codec, one frame per block.
///
/// Best for: large, slowly varying integer series where ratio matters.
pub struct ZstdCodec {
    /// Compression level, clamped to what the linked libzstd accepts.
    pub level: i32,
}

impl Default for ZstdCodec {
    fn default() -> Self {
        Self { level: 3 }
    }
}

impl ZstdCodec {
    pub fn new(level: i32) -> Self {
        let range = zstd::compression_level_range();
        Self {
            level: level.clamp(*range.start(), *range.end()),
        }
    }
}

impl Codec for ZstdCodec {
    fn id(&self) -> u16 {
        CODEC_ZSTD
    }

    fn name(&self) -> &'static str {
        "zstd"
    }

    fn compress_block(&self, raw: &[u8]) -> anyhow::Result<Vec<u8>> {
        zstd::bulk::compress(raw, self.level).with_context(|| format!("zstd level {}", self.level))
    }

    fn decompress_block(&self, compressed: &[u8], expected_len: usize) -> anyhow::Result<Vec<u8>> {
        // capacity is the indexed raw size; a larger frame fails instead of growing
        zstd::bulk::decompress(compressed, expected_len).context("zstd frame")
    }
}
