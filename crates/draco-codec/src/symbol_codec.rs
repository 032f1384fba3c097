//! Entropy coding of unsigned residual symbols.
//!
//! Two wire schemes: *tagged* (per-entry bit lengths are rANS coded, the
//! value bits are stored raw) and *raw* (the values themselves go through
//! the rANS symbol coder). The encoder picks whichever estimates smaller;
//! values too wide for the rANS precision force the tagged scheme.

use crate::decoder_buffer::DecoderBuffer;
use crate::encoder_buffer::EncoderBuffer;
use crate::error::{corrupt, Result};
use crate::rans_symbol_codec::{
    approximate_table_bits, decode_symbol_sequence, encode_symbol_sequence, MAX_ALPHABET_BITS,
};

const SCHEME_TAGGED: u8 = 0;
const SCHEME_RAW: u8 = 1;

// Bit lengths 0..=32 form the tag alphabet.
const TAG_ALPHABET_BITS: u32 = 6;

/// Zig-zag map of a signed value onto the non-negative integers.
#[inline]
pub fn zigzag_encode(v: i32) -> u32 {
    ((v << 1) ^ (v >> 31)) as u32
}

/// Inverse of [`zigzag_encode`].
#[inline]
pub fn zigzag_decode(u: u32) -> i32 {
    ((u >> 1) as i32) ^ -((u & 1) as i32)
}

#[inline]
fn bit_length(v: u32) -> u32 {
    32 - v.leading_zeros()
}

/// Shannon cost in bits of coding `symbols` with their own statistics.
pub(crate) fn shannon_bits(symbols: &[u32]) -> u64 {
    if symbols.is_empty() {
        return 0;
    }
    let max = *symbols.iter().max().unwrap() as usize;
    let mut freqs = vec![0u64; max + 1];
    for &s in symbols {
        freqs[s as usize] += 1;
    }
    let total = symbols.len() as f64;
    let mut bits = 0.0;
    for &f in &freqs {
        if f > 0 {
            bits -= f as f64 * (f as f64 / total).log2();
        }
    }
    bits.ceil() as u64
}

/// Running Shannon-entropy estimate over a growing symbol set. `peek`
/// reports the cost as if the symbols were added; `push` commits them.
/// Used by prediction schemes that choose between configurations by coded
/// size.
#[derive(Debug, Default)]
pub(crate) struct EntropyTracker {
    frequencies: Vec<u64>,
    entropy_norm: f64,
    num_values: u64,
    max_symbol: u32,
    num_unique: u32,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct EntropySnapshot {
    entropy_norm: f64,
    num_values: u64,
    max_symbol: u32,
    num_unique: u32,
}

impl EntropySnapshot {
    /// Bits needed for the data itself.
    pub fn data_bits(&self) -> i64 {
        if self.num_values < 2 {
            return 0;
        }
        let n = self.num_values as f64;
        (n * n.log2() - self.entropy_norm).ceil() as i64
    }

    /// Bits needed for the frequency table.
    pub fn table_bits(&self) -> i64 {
        approximate_table_bits(self.max_symbol + 1, self.num_unique) as i64
    }
}

impl EntropyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn update(&mut self, symbols: &[u32], commit: bool) -> EntropySnapshot {
        let mut snapshot = EntropySnapshot {
            entropy_norm: self.entropy_norm,
            num_values: self.num_values + symbols.len() as u64,
            max_symbol: self.max_symbol,
            num_unique: self.num_unique,
        };
        for &symbol in symbols {
            let s = symbol as usize;
            if self.frequencies.len() <= s {
                self.frequencies.resize(s + 1, 0);
            }
            let freq = self.frequencies[s];
            let old_norm = if freq > 1 {
                freq as f64 * (freq as f64).log2()
            } else {
                if freq == 0 {
                    snapshot.num_unique += 1;
                    snapshot.max_symbol = snapshot.max_symbol.max(symbol);
                }
                0.0
            };
            let new_freq = freq + 1;
            snapshot.entropy_norm += new_freq as f64 * (new_freq as f64).log2() - old_norm;
            if commit {
                self.frequencies[s] = new_freq;
            }
        }
        if commit {
            self.entropy_norm = snapshot.entropy_norm;
            self.num_values = snapshot.num_values;
            self.max_symbol = snapshot.max_symbol;
            self.num_unique = snapshot.num_unique;
        }
        snapshot
    }

    pub fn peek(&mut self, symbols: &[u32]) -> EntropySnapshot {
        self.update(symbols, false)
    }

    pub fn push(&mut self, symbols: &[u32]) -> EntropySnapshot {
        self.update(symbols, true)
    }
}

fn per_chunk_bit_lengths(symbols: &[u32], num_components: usize) -> Vec<u32> {
    symbols
        .chunks(num_components)
        .map(|chunk| {
            let max = chunk.iter().copied().max().unwrap_or(0);
            bit_length(max).max(1)
        })
        .collect()
}

fn estimate_raw_bits(symbols: &[u32], max_value: u32) -> u64 {
    let mut present = 0u32;
    let max = max_value as usize;
    let mut seen = vec![false; max + 1];
    for &s in symbols {
        if !seen[s as usize] {
            seen[s as usize] = true;
            present += 1;
        }
    }
    shannon_bits(symbols) + approximate_table_bits(max_value, present)
}

fn estimate_tagged_bits(tags: &[u32], num_components: usize) -> u64 {
    let value_bits: u64 = tags.iter().map(|&t| t as u64 * num_components as u64).sum();
    value_bits + shannon_bits(tags) + approximate_table_bits(32, 1)
}

/// Estimated coded size, used by prediction-scheme trials.
pub(crate) fn estimate_symbol_bits(symbols: &[u32], num_components: usize) -> u64 {
    if symbols.is_empty() {
        return 0;
    }
    let max_value = *symbols.iter().max().unwrap();
    let tags = per_chunk_bit_lengths(symbols, num_components);
    let tagged = estimate_tagged_bits(&tags, num_components);
    if bit_length(max_value) > MAX_ALPHABET_BITS {
        tagged
    } else {
        tagged.min(estimate_raw_bits(symbols, max_value))
    }
}

/// Encodes a symbol sequence; `num_components` interleaved components form
/// one entry for the tagged scheme's shared bit length.
pub fn encode_symbols(
    symbols: &[u32],
    num_components: usize,
    buffer: &mut EncoderBuffer,
) -> Result<()> {
    if symbols.is_empty() {
        return Ok(());
    }
    debug_assert!(num_components > 0 && symbols.len() % num_components == 0);

    let max_value = *symbols.iter().max().unwrap();
    let tags = per_chunk_bit_lengths(symbols, num_components);

    let raw_viable = bit_length(max_value) <= MAX_ALPHABET_BITS;
    let use_raw =
        raw_viable && estimate_raw_bits(symbols, max_value) < estimate_tagged_bits(&tags, num_components);

    if use_raw {
        buffer.encode_u8(SCHEME_RAW)?;
        let symbol_bits = bit_length(max_value).max(1);
        buffer.encode_u8(symbol_bits as u8)?;
        encode_symbol_sequence(symbols, symbol_bits, buffer)
    } else {
        buffer.encode_u8(SCHEME_TAGGED)?;
        encode_symbol_sequence(&tags, TAG_ALPHABET_BITS, buffer)?;
        let total_bits: usize = tags
            .iter()
            .map(|&t| t as usize * num_components)
            .sum();
        buffer.start_bit_encoding(total_bits, false)?;
        for (chunk, &t) in symbols.chunks(num_components).zip(&tags) {
            for &v in chunk {
                buffer.encode_bits32(t, v)?;
            }
        }
        buffer.end_bit_encoding()
    }
}

/// Inverse of [`encode_symbols`]; `num_values` symbols are written to `out`.
pub fn decode_symbols(
    num_values: usize,
    num_components: usize,
    buffer: &mut DecoderBuffer,
    out: &mut [u32],
) -> Result<()> {
    if num_values == 0 {
        return Ok(());
    }
    debug_assert!(num_components > 0 && num_values % num_components == 0);
    debug_assert!(out.len() >= num_values);

    match buffer.decode_u8()? {
        SCHEME_RAW => {
            let symbol_bits = buffer.decode_u8()? as u32;
            if symbol_bits == 0 || symbol_bits > MAX_ALPHABET_BITS {
                return Err(corrupt(format!("invalid raw symbol bit length {symbol_bits}")));
            }
            decode_symbol_sequence(num_values, symbol_bits, buffer, out)
        }
        SCHEME_TAGGED => {
            let num_chunks = num_values / num_components;
            let mut tags = vec![0u32; num_chunks];
            decode_symbol_sequence(num_chunks, TAG_ALPHABET_BITS, buffer, &mut tags)?;
            buffer.start_bit_decoding(false)?;
            for (i, &t) in tags.iter().enumerate() {
                if t == 0 || t > 32 {
                    // Leave the buffer in byte mode before failing.
                    buffer.end_bit_decoding()?;
                    return Err(corrupt(format!("invalid symbol tag {t}")));
                }
                for c in 0..num_components {
                    out[i * num_components + c] = buffer.decode_bits32(t)?;
                }
            }
            buffer.end_bit_decoding()
        }
        other => Err(corrupt(format!("unknown symbol coding scheme {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zigzag_is_involutive() {
        for v in [0i32, 1, -1, 2, -2, 1234567, -1234567, i32::MAX, i32::MIN] {
            assert_eq!(zigzag_decode(zigzag_encode(v)), v);
        }
        assert_eq!(zigzag_encode(0), 0);
        assert_eq!(zigzag_encode(-1), 1);
        assert_eq!(zigzag_encode(1), 2);
    }

    #[test]
    fn small_alphabet_roundtrip() {
        let symbols: Vec<u32> = (0..900u32).map(|i| i % 7).collect();
        let mut enc = EncoderBuffer::new();
        encode_symbols(&symbols, 3, &mut enc).unwrap();
        let mut dec = DecoderBuffer::new(enc.data());
        let mut out = vec![0u32; symbols.len()];
        decode_symbols(symbols.len(), 3, &mut dec, &mut out).unwrap();
        assert_eq!(out, symbols);
    }

    #[test]
    fn wide_values_use_tagged_scheme() {
        let symbols: Vec<u32> = (0..60u32).map(|i| i << 20).collect();
        let mut enc = EncoderBuffer::new();
        encode_symbols(&symbols, 1, &mut enc).unwrap();
        assert_eq!(enc.data()[0], SCHEME_TAGGED);
        let mut dec = DecoderBuffer::new(enc.data());
        let mut out = vec![0u32; symbols.len()];
        decode_symbols(symbols.len(), 1, &mut dec, &mut out).unwrap();
        assert_eq!(out, symbols);
    }

    #[test]
    fn unknown_scheme_is_corrupt() {
        let data = [9u8, 0, 0];
        let mut dec = DecoderBuffer::new(&data);
        let mut out = [0u32; 1];
        assert!(decode_symbols(1, 1, &mut dec, &mut out).is_err());
    }
}
