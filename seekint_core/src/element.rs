//! Fixed-width integer elements and decoded blocks.

use crate::format::{ByteOrder, IntWidth};

/// The fully decoded contents of one block, typed by the container's
/// declared integer width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntBlock {
    I16(Vec<i16>),
    I32(Vec<i32>),
    I64(Vec<i64>),
}

impl IntBlock {
    /// Reinterpret raw block bytes as integers.
    ///
    /// Returns `None` when `raw.len()` is not a multiple of the width.
    pub fn from_bytes(raw: &[u8], width: IntWidth, order: ByteOrder) -> Option<Self> {
        if raw.len() % width.bytes() != 0 {
            return None;
        }
        Some(match width {
            IntWidth::W16 => IntBlock::I16(i16::decode_all(raw, order)),
            IntWidth::W32 => IntBlock::I32(i32::decode_all(raw, order)),
            IntWidth::W64 => IntBlock::I64(i64::decode_all(raw, order)),
        })
    }

    /// Number of integers in the block.
    pub fn len(&self) -> usize {
        match self {
            IntBlock::I16(v) => v.len(),
            IntBlock::I32(v) => v.len(),
            IntBlock::I64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn width(&self) -> IntWidth {
        match self {
            IntBlock::I16(_) => IntWidth::W16,
            IntBlock::I32(_) => IntWidth::W32,
            IntBlock::I64(_) => IntWidth::W64,
        }
    }
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for i16 {}
    impl Sealed for i32 {}
    impl Sealed for i64 {}
}

/// An integer type that can be stored in a SEEKINT1 container.
///
/// Implemented for `i16`, `i32` and `i64`; the element type of a read must
/// match the width declared in the container header.
pub trait PackedInt: sealed::Sealed + Copy + Default + Send + 'static {
    const WIDTH: IntWidth;

    /// Borrow the block's integers if it holds this element type.
    fn view(block: &IntBlock) -> Option<&[Self]>;

    /// Decode every complete element in `raw`.
    fn decode_all(raw: &[u8], order: ByteOrder) -> Vec<Self>;

    /// Append this value's bytes in `order`.
    fn encode_into(self, order: ByteOrder, out: &mut Vec<u8>);
}

macro_rules! packed_int {
    ($ty:ty, $width:expr, $variant:ident) => {
        impl PackedInt for $ty {
            const WIDTH: IntWidth = $width;

            fn view(block: &IntBlock) -> Option<&[Self]> {
                match block {
                    IntBlock::$variant(values) => Some(values),
                    _ => None,
                }
            }

            fn decode_all(raw: &[u8], order: ByteOrder) -> Vec<Self> {
                const N: usize = std::mem::size_of::<$ty>();
                raw.chunks_exact(N)
                    .map(|chunk| {
                        let mut bytes = [0u8; N];
                        bytes.copy_from_slice(chunk);
                        match order {
                            ByteOrder::Big => <$ty>::from_be_bytes(bytes),
                            ByteOrder::Little => <$ty>::from_le_bytes(bytes),
                        }
                    })
                    .collect()
            }

            fn encode_into(self, order: ByteOrder, out: &mut Vec<u8>) {
                match order {
                    ByteOrder::Big => out.extend_from_slice(&self.to_be_bytes()),
                    ByteOrder::Little => out.extend_from_slice(&self.to_le_bytes()),
                }
            }
        }
    };
}

packed_int!(i16, IntWidth::W16, I16);
packed_int!(i32, IntWidth::W32, I32);
packed_int!(i64, IntWidth::W64, I64);
