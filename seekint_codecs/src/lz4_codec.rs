use seekint_core::codec::Codec;
use seekint_core::format::CODEC_LZ4;

/// LZ4 block codec.
///
/// Fastest decompression of all bundled codecs. The uncompressed size is
/// already in the block index, so blocks are stored without lz4_flex's
/// size prefix.
///
/// Best for: hot data, low-latency random access workloads.
pub struct Lz4Codec;

impl Codec for Lz4Codec {
    fn id(&self) -> u16 {
        CODEC_LZ4
    }

    fn name(&self) -> &'static str {
        "lz4"
    }

    fn compress_block(&self, raw: &[u8]) -> anyhow::Result<Vec<u8>> {
        Ok(lz4_flex::compress(raw))
    }

    fn decompress_block(&self, compressed: &[u8], expected_len: usize) -> anyhow::Result<Vec<u8>> {
        let raw = lz4_flex::decompress(compressed, expected_len)
            .map_err(|e| anyhow::anyhow!("lz4 decompress error: {}", e))?;
        Ok(raw)
    }
}
