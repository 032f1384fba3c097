//! EdgeBreaker connectivity decoder.

use crate::decoder_buffer::DecoderBuffer;
use crate::edgebreaker::{
    rebuild_connectivity, ClersSymbol, TopologySplit, CLERS_SYMBOL_BITS,
};
use crate::error::{corrupt, Result};
use crate::rans_bit_codec::RansBitDecoder;
use crate::rans_symbol_codec::decode_symbol_sequence;

#[derive(Debug)]
pub(crate) struct DecodedConnectivity {
    pub faces: Vec<[u32; 3]>,
    pub num_points: usize,
    pub num_components: usize,
}

pub(crate) fn decode_connectivity(buffer: &mut DecoderBuffer) -> Result<DecodedConnectivity> {
    // Allocation guard: even a degenerate rANS symbol stream needs some
    // bytes per few thousand faces.
    let size_limit = buffer.remaining_size().saturating_add(1) * 4096;
    let num_points = buffer.decode_varint()? as usize;
    let num_faces = buffer.decode_varint()? as usize;
    if num_points > size_limit || num_faces > size_limit {
        return Err(corrupt("edgebreaker counts exceed the decoder limit"));
    }
    let num_components = buffer.decode_varint()? as usize;
    let num_symbols = buffer.decode_varint()? as usize;
    let num_split_symbols = buffer.decode_varint()? as usize;

    if num_faces == 0 || num_points == 0 {
        return Err(corrupt("edgebreaker stream without faces"));
    }
    if num_symbols > num_faces || num_split_symbols > num_symbols {
        return Err(corrupt("inconsistent edgebreaker symbol counts"));
    }
    if num_components == 0 || num_components > num_faces {
        return Err(corrupt("invalid component count"));
    }

    // Handle events.
    let num_splits = buffer.decode_varint()? as usize;
    if num_splits > num_split_symbols {
        return Err(corrupt("more split events than split symbols"));
    }
    let mut splits = Vec::with_capacity(num_splits);
    let mut last_source = 0u64;
    for _ in 0..num_splits {
        let source = last_source + buffer.decode_varint()?;
        let split_delta = buffer.decode_varint()?;
        if split_delta > source {
            return Err(corrupt("split event precedes the stream start"));
        }
        splits.push(TopologySplit {
            source_symbol: u32::try_from(source)
                .map_err(|_| corrupt("split event symbol id overflow"))?,
            split_symbol: (source - split_delta) as u32,
            source_on_right: false,
        });
        last_source = source;
    }
    if num_splits > 0 {
        buffer.start_bit_decoding(false)?;
        for split in &mut splits {
            split.source_on_right = buffer.decode_bits32(1)? != 0;
        }
        buffer.end_bit_decoding()?;
    }

    // Traversal symbols, stored in encode order; reverse for decoding.
    let mut symbol_ids = vec![0u32; num_symbols];
    decode_symbol_sequence(num_symbols, CLERS_SYMBOL_BITS, buffer, &mut symbol_ids)?;
    let mut symbols = Vec::with_capacity(num_symbols);
    for &id in symbol_ids.iter().rev() {
        symbols.push(ClersSymbol::from_u32(id)?);
    }

    let mut config_bits = RansBitDecoder::start_decoding(buffer)?;
    let mut next_bit = || -> Result<bool> { Ok(config_bits.decode_bit()) };
    let rebuilt = rebuild_connectivity(
        &symbols,
        &splits,
        num_faces,
        num_points + num_split_symbols,
        &mut next_bit,
    )?;

    if rebuilt.num_vertices != num_points {
        return Err(corrupt(format!(
            "decoded {} vertices, header declared {num_points}",
            rebuilt.num_vertices
        )));
    }
    Ok(DecodedConnectivity {
        faces: rebuilt.face_vertices,
        num_points,
        num_components,
    })
}
