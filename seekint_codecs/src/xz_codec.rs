use std::io::{Read, Write};

use anyhow::Context;
use seekint_core::codec::Codec;
use seekint_core::format::CODEC_XZ;
use xz2::read::XzDecoder;
use xz2::write::XzEncoder;

/// xz (LZMA2) block codec, one `.xz` stream per block.
///
/// Slowest to decode of the bundled codecs but usually the smallest, which
/// suits large routing tables read a few blocks at a time.
pub struct XzCodec {
    /// liblzma preset, 0..=9.
    pub preset: u32,
}

impl Default for XzCodec {
    fn default() -> Self {
        Self { preset: 6 }
    }
}

impl XzCodec {
    pub fn new(preset: u32) -> Self {
        Self {
            preset: preset.min(9),
        }
    }
}

impl Codec for XzCodec {
    fn id(&self) -> u16 {
        CODEC_XZ
    }

    fn name(&self) -> &'static str {
        "xz"
    }

    fn compress_block(&self, raw: &[u8]) -> anyhow::Result<Vec<u8>> {
        let mut encoder = XzEncoder::new(Vec::with_capacity(raw.len() / 2), self.preset);
        encoder.write_all(raw)?;
        encoder.finish().with_context(|| format!("xz preset {}", self.preset))
    }

    fn decompress_block(&self, compressed: &[u8], expected_len: usize) -> anyhow::Result<Vec<u8>> {
        // at most one byte past the indexed size, enough to detect an oversized stream
        let mut raw = Vec::with_capacity(expected_len);
        XzDecoder::new(compressed)
            .take(expected_len as u64 + 1)
            .read_to_end(&mut raw)
            .context("xz stream")?;
        Ok(raw)
    }
}
