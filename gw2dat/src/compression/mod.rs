//! The archive's bespoke LZ77+Huffman codec

mod bitstream;
mod huffman;
mod inflate;

#[cfg(test)]
pub(crate) mod testutil;

pub use inflate::inflate_buffer;
