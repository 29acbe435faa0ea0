//! Seekable reader for fixed-width integer arrays stored in SEEKINT1
//! block-compressed containers.

pub mod cache;
pub mod codec;
pub mod decoder;
pub mod element;
pub mod error;
pub mod format;
pub mod index;
pub mod reader;
pub mod writer;

#[cfg(test)]
mod test_support;

pub use codec::Codec;
pub use element::{IntBlock, PackedInt};
pub use error::{Result, SeekIntError};
pub use format::{BlockDescriptor, ByteOrder, ContainerHeader, IntWidth, HEADER_SIZE, MAGIC};
pub use index::{ContainerIndex, ReaderOptions};
pub use reader::{read_header, IntReader, ReaderStats};
pub use writer::{Writer, WriterOptions};
