mod deflate_codec;
mod lz4_codec;
mod passthrough;
mod xz_codec;
mod zstd_codec;

pub use deflate_codec::DeflateCodec;
pub use lz4_codec::Lz4Codec;
pub use passthrough::PassThroughCodec;
pub use xz_codec::XzCodec;
pub use zstd_codec::ZstdCodec;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use log::debug;
use seekint_core::format::{CODEC_DEFLATE, CODEC_LZ4, CODEC_PASSTHROUGH, CODEC_XZ, CODEC_ZSTD};
use seekint_core::{read_header, Codec, IntReader};

/// Resolve a codec from its on-disk `codec_id`.
///
/// Called when opening an existing container, so the reader can be
/// initialized with the right codec automatically.
pub fn codec_by_id(id: u16) -> anyhow::Result<Arc<dyn Codec>> {
    match id {
        CODEC_PASSTHROUGH => Ok(Arc::new(PassThroughCodec)),
        CODEC_ZSTD => Ok(Arc::new(ZstdCodec::default())),
        CODEC_LZ4 => Ok(Arc::new(Lz4Codec)),
        CODEC_DEFLATE => Ok(Arc::new(DeflateCodec::default())),
        CODEC_XZ => Ok(Arc::new(XzCodec::default())),
        _ => anyhow::bail!(
            "unknown codec id {}; supported: 0 (passthrough), 1 (zstd), 2 (lz4), \
             3 (deflate), 4 (xz)",
            id
        ),
    }
}

/// Build a codec for writing from its CLI name.
///
/// `level` is passed to codecs that have one (zstd, deflate, xz); `None` keeps
/// the codec's default.
pub fn codec_by_name(name: &str, level: Option<i32>) -> anyhow::Result<Box<dyn Codec>> {
    match name {
        "passthrough" | "pass" | "none" => Ok(Box::new(PassThroughCodec)),
        "zstd" | "z" => Ok(Box::new(level.map(ZstdCodec::new).unwrap_or_default())),
        "lz4" | "l" => Ok(Box::new(Lz4Codec)),
        "deflate" | "zlib" | "d" => Ok(Box::new(
            level
                .map(|l| DeflateCodec::new(l.clamp(0, 9) as u32))
                .unwrap_or_default(),
        )),
        "xz" | "lzma" | "x" => Ok(Box::new(
            level
                .map(|l| XzCodec::new(l.clamp(0, 9) as u32))
                .unwrap_or_default(),
        )),
        other => anyhow::bail!(
            "unknown codec '{}'. Valid options: passthrough, zstd, lz4, deflate, xz",
            other
        ),
    }
}

/// Open a container, picking the codec named in its header.
pub fn open_reader(path: impl AsRef<Path>) -> anyhow::Result<IntReader> {
    let path = path.as_ref();
    let header = read_header(path).with_context(|| format!("reading header of {:?}", path))?;
    let codec = codec_by_id(header.codec_id)?;
    debug!("{:?} uses codec {}", path, codec.name());
    let reader = IntReader::open(path, codec).with_context(|| format!("opening {:?}", path))?;
    Ok(reader)
}
