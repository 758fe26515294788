//! LZ77+Huffman inflate engine
//!
//! Compressed payloads open with a 64-bit prefix (a version word the decoder
//! ignores, then the uncompressed length), followed by blocks that each ship
//! their own symbol and copy trees. Symbols below 0x100 are literal bytes;
//! larger symbols encode back-reference lengths through an exponent/mantissa
//! split, with the distance coming from the copy tree.

use super::bitstream::BitReader;
use super::huffman::{parse_tree, HuffmanTable, TreeBuilder};
use crate::error::{Error, Result};

/// Inflate a compressed payload.
///
/// A non-zero `cap` clamps the decoded length below the stream's declared
/// uncompressed size; a non-zero `custom_size` overrides the allocation size
/// only. Returns the output buffer together with the decoded length.
///
/// # Errors
/// Returns [`Error::Malformed`] if the payload is not a whole number of
/// 32-bit words or violates the codec's coding rules.
pub fn inflate_buffer(input: &[u8], cap: u32, custom_size: u32) -> Result<(Vec<u8>, u32)> {
    if input.len() % 4 != 0 {
        return Err(Error::Malformed {
            message: format!("payload length {} is not a multiple of 4", input.len()),
        });
    }
    let words: Vec<u32> = input
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes(chunk.try_into().unwrap()))
        .collect();
    let mut bits = BitReader::new(&words);

    // Skip the version word.
    bits.ensure(32)?;
    bits.consume(32)?;

    bits.ensure(32)?;
    let declared = bits.peek(32);
    bits.consume(32)?;

    let mut target = declared;
    if cap != 0 && target > cap {
        target = cap;
    }
    let alloc = if custom_size > 0 { custom_size } else { target };

    let mut output = vec![0u8; alloc as usize];
    inflate_data(&mut bits, &mut output, target.min(alloc))?;
    tracing::debug!(
        compressed = input.len(),
        inflated = target,
        "inflated payload"
    );
    Ok((output, target))
}

fn inflate_data(bits: &mut BitReader<'_>, output: &mut [u8], size: u32) -> Result<()> {
    let size = size as usize;
    let mut pos = 0usize;

    // Constant added to every copy length, fixed for the whole stream.
    bits.ensure(8)?;
    bits.consume(4)?;
    let length_bias = bits.peek(4) + 1;
    bits.consume(4)?;

    let mut builder = TreeBuilder::new();

    while pos < size {
        let symbol_tree = parse_tree(bits, &mut builder)?;
        let copy_tree = parse_tree(bits, &mut builder)?;

        bits.ensure(4)?;
        let max_count = (bits.peek(4) + 1) << 12;
        bits.consume(4)?;

        let mut decoded = 0u32;
        while decoded < max_count && pos < size {
            decoded += 1;

            let symbol = symbol_tree.decode(bits)?;
            if symbol < 0x100 {
                output[pos] = symbol as u8;
                pos += 1;
                continue;
            }

            let length = read_copy_length(bits, symbol)? + length_bias;
            let distance = read_copy_distance(bits, &copy_tree)?;

            if distance as usize > pos {
                return Err(Error::Malformed {
                    message: format!("copy distance {distance} reaches before output start"),
                });
            }

            // Byte-by-byte so a distance shorter than the length repeats the
            // run just written.
            let mut written = 0u32;
            while written < length && pos < size {
                output[pos] = output[pos - distance as usize];
                pos += 1;
                written += 1;
            }
        }
    }

    Ok(())
}

/// Decode the base copy length for `symbol` (already known to be >= 0x100).
fn read_copy_length(bits: &mut BitReader<'_>, symbol: u16) -> Result<u32> {
    let code = symbol - 0x100;
    let exponent = code / 4;
    let mantissa = code % 4;

    let mut length = if exponent == 0 {
        u32::from(code)
    } else if exponent < 7 {
        (1u32 << (exponent - 1)) * (4 + u32::from(mantissa))
    } else if code == 28 {
        0xFF
    } else {
        return Err(Error::Malformed {
            message: format!("invalid copy length code {code}"),
        });
    };

    if exponent > 1 && code != 28 {
        let extra = (exponent - 1) as u8;
        bits.ensure(extra)?;
        length |= bits.peek(extra);
        bits.consume(extra)?;
    }

    Ok(length)
}

/// Decode one copy distance from the copy tree.
fn read_copy_distance(bits: &mut BitReader<'_>, tree: &HuffmanTable) -> Result<u32> {
    let code = tree.decode(bits)?;
    let exponent = code / 2;

    let mut distance = if exponent == 0 {
        u32::from(code)
    } else if exponent < 17 {
        (1u32 << (exponent - 1)) * (2 + u32::from(code % 2))
    } else {
        return Err(Error::Malformed {
            message: format!("invalid copy distance code {code}"),
        });
    };

    if exponent > 1 {
        let extra = (exponent - 1) as u8;
        bits.ensure(extra)?;
        distance |= bits.peek(extra);
        bits.consume(extra)?;
    }

    Ok(distance + 1)
}
