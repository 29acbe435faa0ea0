use seekint_core::codec::Codec;
use seekint_core::format::CODEC_PASSTHROUGH;

/// No-op codec: stores blocks verbatim, with no compression.
///
/// Useful for:
/// - Verifying the container layout independently of any codec.
/// - Integer streams with no redundancy, where compression would expand them.
pub struct PassThroughCodec;

impl Codec for PassThroughCodec {
    fn id(&self) -> u16 {
        CODEC_PASSTHROUGH
    }

    fn name(&self) -> &'static str {
        "passthrough"
    }

    fn compress_block(&self, raw: &[u8]) -> anyhow::Result<Vec<u8>> {
        Ok(raw.to_vec())
    }

    fn decompress_block(&self, compressed: &[u8], _expected_len: usize) -> anyhow::Result<Vec<u8>> {
        Ok(compressed.to_vec())
    }
}
