//! Folded coder for 32-bit values: a 4-bit head modeled by adaptive rANS
//! bit coders (one per head position) and a raw tail of direct bits.

use crate::decoder_buffer::DecoderBuffer;
use crate::direct_bit_codec::{DirectBitDecoder, DirectBitEncoder};
use crate::encoder_buffer::EncoderBuffer;
use crate::error::Result;
use crate::rans_bit_codec::{RansBitDecoder, RansBitEncoder};

const HEAD_BITS: u32 = 4;

#[derive(Debug)]
pub struct FoldedBit32Encoder {
    head: Vec<RansBitEncoder>,
    tail: DirectBitEncoder,
}

impl Default for FoldedBit32Encoder {
    fn default() -> Self {
        Self {
            head: (0..HEAD_BITS).map(|_| RansBitEncoder::new()).collect(),
            tail: DirectBitEncoder::new(),
        }
    }
}

impl FoldedBit32Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encodes the low `nbits` of `value`. Both sides must agree on the
    /// width of every call.
    pub fn encode_bits32(&mut self, nbits: u32, value: u32) {
        debug_assert!(nbits > 0 && nbits <= 32);
        let head_bits = nbits.min(HEAD_BITS);
        let tail_bits = nbits - head_bits;
        for i in 0..head_bits {
            let bit = (value >> (nbits - 1 - i)) & 1 != 0;
            self.head[i as usize].encode_bit(bit);
        }
        if tail_bits > 0 {
            self.tail.encode_bits32(tail_bits, value & ((1 << tail_bits) - 1));
        }
    }

    pub fn end_encoding(self, buffer: &mut EncoderBuffer) -> Result<()> {
        for coder in self.head {
            coder.end_encoding(buffer)?;
        }
        self.tail.end_encoding(buffer)
    }
}

#[derive(Debug)]
pub struct FoldedBit32Decoder<'a> {
    head: Vec<RansBitDecoder<'a>>,
    tail: DirectBitDecoder<'a>,
}

impl<'a> FoldedBit32Decoder<'a> {
    pub fn start_decoding(buffer: &mut DecoderBuffer<'a>) -> Result<Self> {
        let mut head = Vec::with_capacity(HEAD_BITS as usize);
        for _ in 0..HEAD_BITS {
            head.push(RansBitDecoder::start_decoding(buffer)?);
        }
        Ok(Self {
            head,
            tail: DirectBitDecoder::start_decoding(buffer)?,
        })
    }

    pub fn decode_bits32(&mut self, nbits: u32) -> Result<u32> {
        debug_assert!(nbits > 0 && nbits <= 32);
        let head_bits = nbits.min(HEAD_BITS);
        let tail_bits = nbits - head_bits;
        let mut value = 0u32;
        for i in 0..head_bits {
            value = (value << 1) | self.head[i as usize].decode_bit() as u32;
        }
        if tail_bits > 0 {
            value = (value << tail_bits) | self.tail.decode_bits32(tail_bits)?;
        }
        Ok(value)
    }
}
