//! Binary rANS coder with an 8-bit probability estimated from the whole
//! bit sequence.

use crate::decoder_buffer::DecoderBuffer;
use crate::encoder_buffer::EncoderBuffer;
use crate::error::Result;
use crate::rans::{RansDecoder, RansEncoder, BINARY_BASE};

/// Collects bits and writes them as one rANS block:
/// `u8 prob_zero`, varint payload length, payload bytes.
#[derive(Debug, Default)]
pub struct RansBitEncoder {
    bits: Vec<bool>,
    num_zeros: u64,
}

impl RansBitEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn encode_bit(&mut self, bit: bool) {
        if !bit {
            self.num_zeros += 1;
        }
        self.bits.push(bit);
    }

    /// Encodes the low `nbits` of `value`, most significant first.
    pub fn encode_bits32(&mut self, nbits: u32, value: u32) {
        debug_assert!(nbits > 0 && nbits <= 32);
        for i in (0..nbits).rev() {
            self.encode_bit((value >> i) & 1 != 0);
        }
    }

    pub fn end_encoding(self, buffer: &mut EncoderBuffer) -> Result<()> {
        let total = self.bits.len().max(1) as u64;
        let prob_zero =
            (((self.num_zeros as f64 / total as f64) * 256.0 + 0.5) as u32).clamp(1, 255) as u8;

        let mut coder = RansEncoder::new(BINARY_BASE);
        for &bit in self.bits.iter().rev() {
            coder.encode_bit(bit, prob_zero);
        }
        let payload = coder.finish()?;
        buffer.encode_u8(prob_zero)?;
        buffer.encode_varint(payload.len() as u64)?;
        buffer.encode_bytes(&payload)
    }
}

/// Reads bits from a block written by [`RansBitEncoder`].
#[derive(Debug)]
pub struct RansBitDecoder<'a> {
    coder: RansDecoder<'a>,
    prob_zero: u8,
}

impl<'a> RansBitDecoder<'a> {
    pub fn start_decoding(buffer: &mut DecoderBuffer<'a>) -> Result<Self> {
        let prob_zero = buffer.decode_u8()?;
        let payload_len = buffer.decode_varint()? as usize;
        let payload = buffer.decode_slice(payload_len)?;
        Ok(Self {
            coder: RansDecoder::new(payload, BINARY_BASE)?,
            prob_zero,
        })
    }

    pub fn decode_bit(&mut self) -> bool {
        self.coder.decode_bit(self.prob_zero)
    }

    /// Inverse of [`RansBitEncoder::encode_bits32`].
    pub fn decode_bits32(&mut self, nbits: u32) -> u32 {
        let mut value = 0u32;
        for _ in 0..nbits {
            value = (value << 1) | self.decode_bit() as u32;
        }
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skewed_bit_stream_roundtrip() {
        let bits: Vec<bool> = (0..1000).map(|i| i % 17 == 0).collect();
        let mut enc = RansBitEncoder::new();
        for &b in &bits {
            enc.encode_bit(b);
        }
        let mut buffer = EncoderBuffer::new();
        enc.end_encoding(&mut buffer).unwrap();
        // A heavily skewed stream compresses far below one bit per symbol.
        assert!(buffer.size() < 1000 / 8);

        let mut dec_buf = DecoderBuffer::new(buffer.data());
        let mut dec = RansBitDecoder::start_decoding(&mut dec_buf).unwrap();
        for &b in &bits {
            assert_eq!(dec.decode_bit(), b);
        }
    }

    #[test]
    fn multi_bit_values_roundtrip() {
        let values = [0u32, 1, 5, 31, 17, 2];
        let mut enc = RansBitEncoder::new();
        for &v in &values {
            enc.encode_bits32(5, v);
        }
        let mut buffer = EncoderBuffer::new();
        enc.end_encoding(&mut buffer).unwrap();

        let mut dec_buf = DecoderBuffer::new(buffer.data());
        let mut dec = RansBitDecoder::start_decoding(&mut dec_buf).unwrap();
        for &v in &values {
            assert_eq!(dec.decode_bits32(5), v);
        }
    }

    #[test]
    fn empty_stream_writes_a_block() {
        let enc = RansBitEncoder::new();
        let mut buffer = EncoderBuffer::new();
        enc.end_encoding(&mut buffer).unwrap();
        let mut dec_buf = DecoderBuffer::new(buffer.data());
        assert!(RansBitDecoder::start_decoding(&mut dec_buf).is_ok());
        assert_eq!(dec_buf.remaining_size(), 0);
    }
}
