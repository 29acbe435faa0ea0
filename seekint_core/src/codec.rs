/// Block compression collaborator.
///
/// Each `Codec` implementation:
/// - Is identified by a stable numeric `id()` stored in the SEEKINT1 header.
/// - Must compress/decompress individual blocks independently; no cross-block
///   state is permitted. This is the invariant that makes random access possible.
/// - Is injected into [`crate::IntReader`] and [`crate::Writer`] at
///   construction time, so tests can substitute their own implementation.
pub trait Codec: Send + Sync {
    /// Stable codec ID stored in the container header.
    fn id(&self) -> u16;

    /// Human-readable codec name for CLI display.
    fn name(&self) -> &'static str;

    /// Compress a single independent block.
    fn compress_block(&self, raw: &[u8]) -> anyhow::Result<Vec<u8>>;

    /// Decompress a single independent block.
    ///
    /// `expected_len` is the uncompressed size recorded in the block index.
    /// Implementations may use it to pre-size output or to stop early; the
    /// reader checks the returned length against it either way.
    fn decompress_block(&self, compressed: &[u8], expected_len: usize) -> anyhow::Result<Vec<u8>>;
}
