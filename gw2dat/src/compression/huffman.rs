//! Canonical Huffman decoding for the archive codec
//!
//! Trees are described on the wire as runs of code lengths, themselves
//! encoded with a fixed dictionary tree that every stream shares. The
//! dictionary tables are part of the format and must match the game's
//! encoder bit for bit.

use std::sync::OnceLock;

use super::bitstream::BitReader;
use crate::error::{Error, Result};

/// Highest symbol count a per-stream tree may carry.
pub(crate) const MAX_SYMBOLS: usize = 285;

/// Longest code length, in bits (exclusive upper bound for lengths).
pub(crate) const MAX_CODE_BITS: usize = 32;

/// Canonical Huffman decoding table.
///
/// Codes are grouped into classes, one per populated code length, stored in
/// ascending length order. `min_codes[c]` is the smallest code of class `c`
/// left-justified into 32 bits; `symbol_offsets[c]` locates the class's last
/// symbol inside the flat `symbols` array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct HuffmanTable {
    min_codes: [u32; MAX_CODE_BITS],
    bit_lengths: [u8; MAX_CODE_BITS],
    symbol_offsets: [u16; MAX_CODE_BITS],
    symbols: [u16; MAX_SYMBOLS],
    num_classes: usize,
}

impl HuffmanTable {
    /// Decode one symbol from the stream.
    pub(crate) fn decode(&self, bits: &mut BitReader<'_>) -> Result<u16> {
        if self.min_codes[0] == 0 {
            return Err(Error::Malformed {
                message: "decoding against an empty Huffman table".into(),
            });
        }

        bits.ensure(32)?;
        let window = bits.peek(32);

        let mut class = 0;
        while class < self.num_classes && window < self.min_codes[class] {
            class += 1;
        }
        if class == self.num_classes {
            return Err(Error::Malformed {
                message: "bit pattern matches no Huffman code".into(),
            });
        }

        let length = self.bit_lengths[class];
        let rel = (window - self.min_codes[class]) >> (32 - length);
        let slot = usize::from(self.symbol_offsets[class])
            .checked_sub(rel as usize)
            .ok_or_else(|| Error::Malformed {
                message: "Huffman code indexes outside its class".into(),
            })?;

        let symbol = self.symbols[slot];
        bits.consume(length)?;
        Ok(symbol)
    }
}

/// Scratch tables for registering (length, symbol) pairs before a build.
///
/// `first_at_len[l]` heads a singly-linked list of the symbols registered at
/// length `l`, chained through `next` in reverse registration order.
pub(crate) struct TreeBuilder {
    first_at_len: [i16; MAX_CODE_BITS],
    next: [i16; MAX_SYMBOLS],
}

impl TreeBuilder {
    pub(crate) fn new() -> Self {
        Self {
            first_at_len: [-1; MAX_CODE_BITS],
            next: [-1; MAX_SYMBOLS],
        }
    }

    pub(crate) fn reset(&mut self) {
        self.first_at_len.fill(-1);
        self.next.fill(-1);
    }

    /// Register `symbol` with a code of `bits` bits.
    pub(crate) fn register(&mut self, bits: u8, symbol: u16) -> Result<()> {
        if bits == 0 || usize::from(bits) >= MAX_CODE_BITS {
            return Err(Error::Malformed {
                message: format!("code length {bits} out of range"),
            });
        }
        if usize::from(symbol) >= MAX_SYMBOLS {
            return Err(Error::Malformed {
                message: format!("symbol {symbol} out of range"),
            });
        }

        let bits = usize::from(bits);
        if self.first_at_len[bits] == -1 {
            self.first_at_len[bits] = symbol as i16;
        } else {
            self.next[usize::from(symbol)] = self.first_at_len[bits];
            self.first_at_len[bits] = symbol as i16;
        }
        Ok(())
    }

    /// Assign canonical codes to the registered symbols.
    ///
    /// Walks the lengths in ascending order with a down-counting code
    /// register; each populated length becomes one decoder class.
    pub(crate) fn build(&self) -> HuffmanTable {
        let mut table = HuffmanTable {
            min_codes: [0; MAX_CODE_BITS],
            bit_lengths: [0; MAX_CODE_BITS],
            symbol_offsets: [0; MAX_CODE_BITS],
            symbols: [0; MAX_SYMBOLS],
            num_classes: 0,
        };

        let mut code: u32 = 0;
        let mut emitted: u16 = 0;
        for bits in 0..MAX_CODE_BITS {
            if self.first_at_len[bits] != -1 {
                let mut symbol = self.first_at_len[bits];
                while symbol != -1 {
                    table.symbols[usize::from(emitted)] = symbol as u16;
                    emitted += 1;
                    symbol = self.next[symbol as usize];
                    code = code.wrapping_sub(1);
                }

                table.min_codes[table.num_classes] = code.wrapping_add(1) << (32 - bits);
                table.bit_lengths[table.num_classes] = bits as u8;
                table.symbol_offsets[table.num_classes] = emitted - 1;
                table.num_classes += 1;
            }
            code = (code << 1).wrapping_add(1);
        }

        table
    }
}

/// Parse an on-the-wire tree description using the dictionary tree.
///
/// The description opens with a 16-bit alphabet size, then runs of
/// dictionary-decoded codes: the low 5 bits carry a code length, the high
/// bits a repeat count. Zero-length runs skip absent symbols.
pub(crate) fn parse_tree(bits: &mut BitReader<'_>, builder: &mut TreeBuilder) -> Result<HuffmanTable> {
    let dict = dictionary_table();

    bits.ensure(16)?;
    let symbol_count = bits.peek(16);
    bits.consume(16)?;
    if symbol_count as usize > MAX_SYMBOLS {
        return Err(Error::Malformed {
            message: format!("tree declares {symbol_count} symbols"),
        });
    }

    builder.reset();
    let mut remaining = symbol_count as i32 - 1;
    while remaining >= 0 {
        let code = dict.decode(bits)?;
        let code_bits = (code & 0x1F) as u8;
        let run = i32::from(code >> 5) + 1;

        if code_bits == 0 {
            remaining -= run;
        } else {
            for _ in 0..run {
                if remaining < 0 {
                    return Err(Error::Malformed {
                        message: "tree description overruns its alphabet".into(),
                    });
                }
                builder.register(code_bits, remaining as u16)?;
                remaining -= 1;
            }
        }
    }

    Ok(builder.build())
}

/// Code lengths of the fixed dictionary alphabet, in registration order.
#[rustfmt::skip]
pub(crate) const DICT_BIT_LENGTHS: [u8; 256] = [
     3,  3,  3,  4,  4,  4,  4,  5,  5,  5,  5,  6,  6,  6,  6,  6,
     6,  6,  6,  7,  7,  7,  7,  7,  7,  7,  8,  8,  8,  8,  8,  8,
     9,  9,  9,  9,  9,  9,  9,  9,  9,  9, 10, 10, 10, 10, 10, 10,
    10, 10, 10, 10, 10, 10, 10, 10, 10, 10, 11, 11, 11, 11, 11, 11,
    11, 11, 11, 11, 11, 11, 11, 12, 12, 12, 12, 12, 12, 12, 13, 13,
    13, 13, 13, 13, 14, 14, 14, 14, 15, 15, 15, 15, 15, 15, 15, 15,
    16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16,
    16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16,
    16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16,
    16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16,
    16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16,
    16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16,
    16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16,
    16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16,
    16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16,
    16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16, 16,
];

/// Symbols of the fixed dictionary alphabet, in registration order.
#[rustfmt::skip]
pub(crate) const DICT_SYMBOLS: [u16; 256] = [
    0x0A, 0x09, 0x08, 0x0C, 0x0B, 0x07, 0x00, 0xE0, 0x2A, 0x29, 0x06, 0x4A, 0x40, 0x2C, 0x2B, 0x28,
    0x20, 0x05, 0x04, 0x49, 0x48, 0x27, 0x26, 0x25, 0x0D, 0x03, 0x6A, 0x69, 0x4C, 0x4B, 0x47, 0x24,
    0xE8, 0xA0, 0x89, 0x88, 0x68, 0x67, 0x63, 0x60, 0x46, 0x23, 0xE9, 0xC9, 0xC0, 0xA9, 0xA8, 0x8A,
    0x87, 0x80, 0x66, 0x65, 0x45, 0x44, 0x43, 0x2D, 0x02, 0x01, 0xE5, 0xC8, 0xAA, 0xA5, 0xA4, 0x8B,
    0x85, 0x84, 0x6C, 0x6B, 0x64, 0x4D, 0x0E, 0xE7, 0xCA, 0xC7, 0xA7, 0xA6, 0x86, 0x83, 0xE6, 0xE4,
    0xC4, 0x8C, 0x2E, 0x22, 0xEC, 0xC6, 0x6D, 0x4E, 0xEA, 0xCC, 0xAC, 0xAB, 0x8D, 0x11, 0x10, 0x0F,
    0xFF, 0xFE, 0xFD, 0xFC, 0xFB, 0xFA, 0xF9, 0xF8, 0xF7, 0xF6, 0xF5, 0xF4, 0xF3, 0xF2, 0xF1, 0xF0,
    0xEF, 0xEE, 0xED, 0xEB, 0xE3, 0xE2, 0xE1, 0xDF, 0xDE, 0xDD, 0xDC, 0xDB, 0xDA, 0xD9, 0xD8, 0xD7,
    0xD6, 0xD5, 0xD4, 0xD3, 0xD2, 0xD1, 0xD0, 0xCF, 0xCE, 0xCD, 0xCB, 0xC5, 0xC3, 0xC2, 0xC1, 0xBF,
    0xBE, 0xBD, 0xBC, 0xBB, 0xBA, 0xB9, 0xB8, 0xB7, 0xB6, 0xB5, 0xB4, 0xB3, 0xB2, 0xB1, 0xB0, 0xAF,
    0xAE, 0xAD, 0xA3, 0xA2, 0xA1, 0x9F, 0x9E, 0x9D, 0x9C, 0x9B, 0x9A, 0x99, 0x98, 0x97, 0x96, 0x95,
    0x94, 0x93, 0x92, 0x91, 0x90, 0x8F, 0x8E, 0x82, 0x81, 0x7F, 0x7E, 0x7D, 0x7C, 0x7B, 0x7A, 0x79,
    0x78, 0x77, 0x76, 0x75, 0x74, 0x73, 0x72, 0x71, 0x70, 0x6F, 0x6E, 0x62, 0x61, 0x5F, 0x5E, 0x5D,
    0x5C, 0x5B, 0x5A, 0x59, 0x58, 0x57, 0x56, 0x55, 0x54, 0x53, 0x52, 0x51, 0x50, 0x4F, 0x42, 0x41,
    0x3F, 0x3E, 0x3D, 0x3C, 0x3B, 0x3A, 0x39, 0x38, 0x37, 0x36, 0x35, 0x34, 0x33, 0x32, 0x31, 0x30,
    0x2F, 0x21, 0x1F, 0x1E, 0x1D, 0x1C, 0x1B, 0x1A, 0x19, 0x18, 0x17, 0x16, 0x15, 0x14, 0x13, 0x12,
];

fn build_dictionary() -> HuffmanTable {
    let mut builder = TreeBuilder::new();
    for (&bits, &symbol) in DICT_BIT_LENGTHS.iter().zip(DICT_SYMBOLS.iter()) {
        // The shipped tables only hold lengths in [3, 16] and byte symbols.
        builder
            .register(bits, symbol)
            .expect("dictionary tables are well formed");
    }
    builder.build()
}

/// The fixed tree used to decode per-stream tree descriptions.
///
/// Built once per process; reads afterwards are lock-free.
pub(crate) fn dictionary_table() -> &'static HuffmanTable {
    static DICTIONARY: OnceLock<HuffmanTable> = OnceLock::new();
    DICTIONARY.get_or_init(build_dictionary)
}
