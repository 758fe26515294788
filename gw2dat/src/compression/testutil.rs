//! Encoder-side helpers for codec tests
//!
//! The decoder consumes bits MSB-first out of little-endian 32-bit words;
//! `BitWriter` is its mirror, and `assign_codes` replays the canonical code
//! walk so tests can emit the exact bit patterns a table will decode.

use std::collections::HashMap;

use super::huffman::{DICT_BIT_LENGTHS, DICT_SYMBOLS, MAX_CODE_BITS, MAX_SYMBOLS};

/// Packs bit fields MSB-first into 32-bit words.
pub(crate) struct BitWriter {
    words: Vec<u32>,
    acc: u32,
    filled: u8,
}

impl BitWriter {
    pub(crate) fn new() -> Self {
        Self {
            words: Vec::new(),
            acc: 0,
            filled: 0,
        }
    }

    /// Append the low `count` bits of `value`, most significant first.
    pub(crate) fn put(&mut self, value: u32, count: u8) {
        assert!(count <= 32);
        for i in (0..count).rev() {
            let bit = (value >> i) & 1;
            self.acc = (self.acc << 1) | bit;
            self.filled += 1;
            if self.filled == 32 {
                self.words.push(self.acc);
                self.acc = 0;
                self.filled = 0;
            }
        }
    }

    /// Flush the partial word and append `count` zero words. The decoder
    /// peeks a full 32-bit window per symbol, so streams need trailing slack.
    pub(crate) fn pad_words(&mut self, count: usize) {
        self.flush();
        for _ in 0..count {
            self.words.push(0);
        }
    }

    pub(crate) fn into_words(mut self) -> Vec<u32> {
        self.flush();
        self.words
    }

    /// Serialize as the little-endian byte stream a payload would hold.
    pub(crate) fn into_bytes(self) -> Vec<u8> {
        self.into_words()
            .into_iter()
            .flat_map(u32::to_le_bytes)
            .collect()
    }

    fn flush(&mut self) {
        if self.filled > 0 {
            self.words.push(self.acc << (32 - self.filled));
            self.acc = 0;
            self.filled = 0;
        }
    }
}

/// Compute each registered symbol's canonical `(code, length)` for the given
/// `(length, symbol)` pairs in registration order.
pub(crate) fn assign_codes(pairs: &[(u8, u16)]) -> HashMap<u16, (u32, u8)> {
    let mut first_at_len = [-1i32; MAX_CODE_BITS];
    let mut next = [-1i32; MAX_SYMBOLS];
    for &(bits, symbol) in pairs {
        let bits = usize::from(bits);
        if first_at_len[bits] == -1 {
            first_at_len[bits] = i32::from(symbol);
        } else {
            next[usize::from(symbol)] = first_at_len[bits];
            first_at_len[bits] = i32::from(symbol);
        }
    }

    let mut codes = HashMap::new();
    let mut code: u32 = 0;
    for bits in 0..MAX_CODE_BITS {
        if first_at_len[bits] != -1 {
            let mut symbol = first_at_len[bits];
            while symbol != -1 {
                codes.insert(symbol as u16, (code, bits as u8));
                code = code.wrapping_sub(1);
                symbol = next[symbol as usize];
            }
        }
        code = (code << 1).wrapping_add(1);
    }
    codes
}

/// Canonical codes of the fixed dictionary alphabet.
pub(crate) fn dict_codes() -> HashMap<u16, (u32, u8)> {
    let pairs: Vec<(u8, u16)> = DICT_BIT_LENGTHS
        .iter()
        .copied()
        .zip(DICT_SYMBOLS.iter().copied())
        .collect();
    assign_codes(&pairs)
}
