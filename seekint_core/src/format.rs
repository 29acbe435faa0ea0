use serde::Serialize;

use crate::error::{Result, SeekIntError};

/// Magic bytes at the start of every SEEKINT1 file.
pub const MAGIC: &[u8; 8] = b"SEEKINT1";

/// Magic bytes closing the footer. Lets `open` reject truncated files early.
pub const FOOTER_MAGIC: &[u8; 8] = b"SEEKIDX1";

/// Current (and only) format version.
pub const FORMAT_VERSION: u16 = 1;

/// Fixed size of the header in bytes.
///   magic[8] + version:u16 + codec_id:u16 + int_width:u8 + byte_order:u8
///   + reserved:u16 + block_size:u32 + flags:u32
///   = 8 + 2 + 2 + 1 + 1 + 2 + 4 + 4 = 24
pub const HEADER_SIZE: u64 = 24;

/// Size of each BlockDescriptor in the index, in bytes.
///   compressed_offset:u64 + compressed_len:u32 + raw_len:u32
///   + raw_offset:u64 + checksum:u64
///   = 8 + 4 + 4 + 8 + 8 = 32
pub const BLOCK_DESCRIPTOR_SIZE: u64 = 32;

/// Size of the trailer in bytes.
///   index_offset:u64 + block_count:u64 + total_bytes:u64
///   + index_checksum:u64 + magic[8]
///   = 40
pub const FOOTER_SIZE: u64 = 40;

/// Default block size: 64 KB of raw integer data.
pub const DEFAULT_BLOCK_SIZE: u32 = 64 * 1024;

// ── Flags ──────────────────────────────────────────────────────────────────

/// Each block carries an xxhash3-64 checksum of its compressed bytes.
pub const FLAG_HAS_CHECKSUM: u32 = 1 << 0;

// ── Codec IDs ──────────────────────────────────────────────────────────────

pub const CODEC_PASSTHROUGH: u16 = 0;
pub const CODEC_ZSTD: u16 = 1;
pub const CODEC_LZ4: u16 = 2;
pub const CODEC_DEFLATE: u16 = 3;
pub const CODEC_XZ: u16 = 4;

// ── Element layout ─────────────────────────────────────────────────────────

/// Width of every integer stored in the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IntWidth {
    W16,
    W32,
    W64,
}

impl IntWidth {
    /// Width in bytes.
    pub fn bytes(self) -> usize {
        match self {
            IntWidth::W16 => 2,
            IntWidth::W32 => 4,
            IntWidth::W64 => 8,
        }
    }

    pub fn bits(self) -> u32 {
        self.bytes() as u32 * 8
    }

    pub fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            16 => Some(IntWidth::W16),
            32 => Some(IntWidth::W32),
            64 => Some(IntWidth::W64),
            _ => None,
        }
    }

    fn to_byte(self) -> u8 {
        self.bytes() as u8
    }

    fn from_byte(b: u8) -> Option<Self> {
        match b {
            2 => Some(IntWidth::W16),
            4 => Some(IntWidth::W32),
            8 => Some(IntWidth::W64),
            _ => None,
        }
    }
}

/// Byte order of the integer payload. Metadata fields are always little-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ByteOrder {
    Big,
    Little,
}

impl ByteOrder {
    fn to_byte(self) -> u8 {
        match self {
            ByteOrder::Big => 0,
            ByteOrder::Little => 1,
        }
    }

    fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(ByteOrder::Big),
            1 => Some(ByteOrder::Little),
            _ => None,
        }
    }
}

// ── Header ─────────────────────────────────────────────────────────────────

/// Decoded representation of the 24-byte SEEKINT1 header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerHeader {
    pub version: u16,
    pub codec_id: u16,
    pub int_width: IntWidth,
    pub byte_order: ByteOrder,
    /// Nominal raw bytes per block (the last block may be smaller).
    pub block_size: u32,
    pub flags: u32,
}

impl ContainerHeader {
    /// Serialize to exactly `HEADER_SIZE` bytes.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE as usize] {
        let mut buf = [0u8; HEADER_SIZE as usize];
        buf[..8].copy_from_slice(MAGIC);
        buf[8..10].copy_from_slice(&self.version.to_le_bytes());
        buf[10..12].copy_from_slice(&self.codec_id.to_le_bytes());
        buf[12] = self.int_width.to_byte();
        buf[13] = self.byte_order.to_byte();
        // buf[14..16] reserved, stays zero
        buf[16..20].copy_from_slice(&self.block_size.to_le_bytes());
        buf[20..24].copy_from_slice(&self.flags.to_le_bytes());
        buf
    }

    /// Deserialize from `HEADER_SIZE` bytes, checking magic, version and layout bytes.
    pub fn from_bytes(buf: &[u8; HEADER_SIZE as usize]) -> Result<Self> {
        if &buf[..8] != MAGIC {
            return Err(SeekIntError::corrupt("invalid magic bytes, not a SEEKINT1 file"));
        }
        let version = u16::from_le_bytes([buf[8], buf[9]]);
        if version != FORMAT_VERSION {
            return Err(SeekIntError::corrupt(format!(
                "unsupported format version {version} (only version {FORMAT_VERSION} is supported)"
            )));
        }
        let int_width = IntWidth::from_byte(buf[12]).ok_or_else(|| {
            SeekIntError::corrupt(format!("invalid integer width byte {}", buf[12]))
        })?;
        let byte_order = ByteOrder::from_byte(buf[13])
            .ok_or_else(|| SeekIntError::corrupt(format!("invalid byte order byte {}", buf[13])))?;
        Ok(Self {
            version,
            codec_id: u16::from_le_bytes([buf[10], buf[11]]),
            int_width,
            byte_order,
            block_size: u32::from_le_bytes(read_array(&buf[16..20])),
            flags: u32::from_le_bytes(read_array(&buf[20..24])),
        })
    }

    pub fn has_flag(&self, flag: u32) -> bool {
        self.flags & flag != 0
    }
}

// ── Block descriptor ───────────────────────────────────────────────────────

/// One entry in the block index: where a block lives on disk and which
/// uncompressed bytes it decodes to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BlockDescriptor {
    /// Position of this descriptor in the index.
    pub seq: u64,
    /// Byte offset of the compressed payload from the start of the file.
    pub compressed_offset: u64,
    pub compressed_len: u32,
    /// Byte offset of this block within the uncompressed stream.
    pub raw_offset: u64,
    pub raw_len: u32,
    /// xxhash3-64 of the compressed bytes.
    pub checksum: u64,
}

impl BlockDescriptor {
    /// Exclusive end of the uncompressed byte range.
    pub fn raw_end(&self) -> u64 {
        self.raw_offset.saturating_add(self.raw_len as u64)
    }

    /// Exclusive end of the compressed byte range.
    pub fn compressed_end(&self) -> u64 {
        self.compressed_offset.saturating_add(self.compressed_len as u64)
    }

    /// Serialize to exactly `BLOCK_DESCRIPTOR_SIZE` bytes. `seq` is implied by position.
    pub fn to_bytes(&self) -> [u8; BLOCK_DESCRIPTOR_SIZE as usize] {
        let mut buf = [0u8; BLOCK_DESCRIPTOR_SIZE as usize];
        buf[0..8].copy_from_slice(&self.compressed_offset.to_le_bytes());
        buf[8..12].copy_from_slice(&self.compressed_len.to_le_bytes());
        buf[12..16].copy_from_slice(&self.raw_len.to_le_bytes());
        buf[16..24].copy_from_slice(&self.raw_offset.to_le_bytes());
        buf[24..32].copy_from_slice(&self.checksum.to_le_bytes());
        buf
    }

    pub fn from_bytes(seq: u64, buf: &[u8; BLOCK_DESCRIPTOR_SIZE as usize]) -> Self {
        Self {
            seq,
            compressed_offset: u64::from_le_bytes(read_array(&buf[0..8])),
            compressed_len: u32::from_le_bytes(read_array(&buf[8..12])),
            raw_len: u32::from_le_bytes(read_array(&buf[12..16])),
            raw_offset: u64::from_le_bytes(read_array(&buf[16..24])),
            checksum: u64::from_le_bytes(read_array(&buf[24..32])),
        }
    }
}

// ── Footer ─────────────────────────────────────────────────────────────────

/// Trailer locating the block index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Footer {
    pub index_offset: u64,
    pub block_count: u64,
    /// Total uncompressed bytes across all blocks.
    pub total_bytes: u64,
    /// xxhash3-64 of the serialized index.
    pub index_checksum: u64,
}

impl Footer {
    pub fn to_bytes(&self) -> [u8; FOOTER_SIZE as usize] {
        let mut buf = [0u8; FOOTER_SIZE as usize];
        buf[0..8].copy_from_slice(&self.index_offset.to_le_bytes());
        buf[8..16].copy_from_slice(&self.block_count.to_le_bytes());
        buf[16..24].copy_from_slice(&self.total_bytes.to_le_bytes());
        buf[24..32].copy_from_slice(&self.index_checksum.to_le_bytes());
        buf[32..40].copy_from_slice(FOOTER_MAGIC);
        buf
    }

    pub fn from_bytes(buf: &[u8; FOOTER_SIZE as usize]) -> Result<Self> {
        if &buf[32..40] != FOOTER_MAGIC {
            return Err(SeekIntError::corrupt(
                "invalid footer magic, file truncated or not SEEKINT1",
            ));
        }
        Ok(Self {
            index_offset: u64::from_le_bytes(read_array(&buf[0..8])),
            block_count: u64::from_le_bytes(read_array(&buf[8..16])),
            total_bytes: u64::from_le_bytes(read_array(&buf[16..24])),
            index_checksum: u64::from_le_bytes(read_array(&buf[24..32])),
        })
    }
}

/// Copy a fixed-size field out of a slice whose length was already checked.
fn read_array<const N: usize>(src: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(src);
    out
}
