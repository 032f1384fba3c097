//! rANS coder for symbol alphabets up to 2^12, with a serialized
//! frequency table.

use crate::decoder_buffer::DecoderBuffer;
use crate::encoder_buffer::EncoderBuffer;
use crate::error::{corrupt, internal, CodecError, Result};
use crate::rans::{interval_base, RansDecoder, RansEncoder};

/// Hard cap on the alphabet: precision never exceeds 12 bits and every
/// present symbol needs a probability slot.
pub const MAX_ALPHABET_BITS: u32 = 12;

/// Probability precision for a given symbol-size class, clamped to 8-12
/// bits.
pub(crate) fn precision_bits_for(symbol_bits: u32) -> u32 {
    (3 * symbol_bits / 2).clamp(8, 12)
}

/// Rough cost of the serialized frequency table, used by scheme selection.
pub(crate) fn approximate_table_bits(max_value: u32, num_present: u32) -> u64 {
    let absent = max_value.saturating_sub(num_present);
    (8 * num_present + 8 * (num_present + absent / 64)) as u64
}

#[derive(Debug, Clone, Copy, Default)]
struct SymbolProb {
    prob: u32,
    cum: u32,
}

/// Scales raw counts so they sum exactly to `1 << precision_bits`, each
/// present symbol keeping at least one slot. The rounding residue goes to
/// the symbol with the largest input count (ties: lowest id); a negative
/// residue that symbol cannot absorb is taken from the next largest.
pub(crate) fn normalize_frequencies(freqs: &[u64], precision_bits: u32) -> Result<Vec<u32>> {
    let precision = 1u64 << precision_bits;
    let total: u64 = freqs.iter().sum();
    if total == 0 {
        return Err(internal("cannot normalize an empty frequency set"));
    }
    let mut scaled: Vec<u32> = freqs
        .iter()
        .map(|&f| {
            if f == 0 {
                0
            } else {
                let v = ((f as u128 * precision as u128 + (total / 2) as u128)
                    / total as u128) as u32;
                v.max(1)
            }
        })
        .collect();

    let sum: u64 = scaled.iter().map(|&v| v as u64).sum();
    let mut residue = precision as i64 - sum as i64;
    if residue != 0 {
        let mut order: Vec<usize> = (0..freqs.len()).filter(|&i| freqs[i] > 0).collect();
        order.sort_by(|&a, &b| freqs[b].cmp(&freqs[a]).then(a.cmp(&b)));
        if residue > 0 {
            scaled[order[0]] += residue as u32;
        } else {
            for &i in &order {
                let take = (-residue).min(scaled[i] as i64 - 1);
                scaled[i] -= take as u32;
                residue += take;
                if residue == 0 {
                    break;
                }
            }
            if residue != 0 {
                return Err(CodecError::UnsupportedFeature(
                    "alphabet too large for the rANS precision".to_string(),
                ));
            }
        }
    }
    Ok(scaled)
}

fn write_frequency_table(scaled: &[u32], buffer: &mut EncoderBuffer) -> Result<()> {
    buffer.encode_varint(scaled.len() as u64)?;
    let mut i = 0;
    while i < scaled.len() {
        if scaled[i] > 0 {
            buffer.encode_varint((scaled[i] as u64) << 1)?;
            i += 1;
        } else {
            let mut run = 1usize;
            while i + run < scaled.len() && scaled[i + run] == 0 {
                run += 1;
            }
            buffer.encode_varint(((run as u64) << 1) | 1)?;
            i += run;
        }
    }
    Ok(())
}

fn read_frequency_table(
    buffer: &mut DecoderBuffer,
    precision_bits: u32,
) -> Result<Vec<SymbolProb>> {
    let num_symbols = buffer.decode_varint()? as usize;
    if num_symbols > (1 << MAX_ALPHABET_BITS) {
        return Err(CodecError::UnsupportedFeature(format!(
            "alphabet of {num_symbols} symbols exceeds the precision bound"
        )));
    }
    let mut table = vec![SymbolProb::default(); num_symbols];
    let mut i = 0;
    while i < num_symbols {
        let v = buffer.decode_varint()?;
        if v & 1 == 1 {
            let run = (v >> 1) as usize;
            if run == 0 || i + run > num_symbols {
                return Err(corrupt("invalid zero run in frequency table"));
            }
            i += run;
        } else {
            table[i].prob = (v >> 1) as u32;
            i += 1;
        }
    }
    let precision = 1u32 << precision_bits;
    let mut cum = 0u32;
    for entry in &mut table {
        entry.cum = cum;
        cum = cum
            .checked_add(entry.prob)
            .ok_or_else(|| corrupt("frequency table overflow"))?;
        if cum > precision {
            return Err(corrupt("frequency table exceeds precision"));
        }
    }
    if cum != precision {
        return Err(corrupt("frequency table does not sum to the precision"));
    }
    Ok(table)
}

/// Writes a symbol sequence as: frequency table, varint payload length,
/// rANS payload. `symbol_bits` selects the precision class and must cover
/// every symbol in the sequence.
pub(crate) fn encode_symbol_sequence(
    symbols: &[u32],
    symbol_bits: u32,
    buffer: &mut EncoderBuffer,
) -> Result<()> {
    debug_assert!(!symbols.is_empty());
    if symbol_bits > MAX_ALPHABET_BITS {
        return Err(CodecError::UnsupportedFeature(format!(
            "symbol bit length {symbol_bits} exceeds the precision bound"
        )));
    }
    let max_value = symbols.iter().copied().max().unwrap_or(0) as usize;
    if max_value >= 1 << MAX_ALPHABET_BITS {
        return Err(CodecError::UnsupportedFeature(format!(
            "symbol value {max_value} exceeds the precision bound"
        )));
    }
    let mut freqs = vec![0u64; max_value + 1];
    for &s in symbols {
        freqs[s as usize] += 1;
    }

    let precision_bits = precision_bits_for(symbol_bits);
    let scaled = normalize_frequencies(&freqs, precision_bits)?;
    write_frequency_table(&scaled, buffer)?;

    let mut table = vec![SymbolProb::default(); scaled.len()];
    let mut cum = 0u32;
    for (entry, &prob) in table.iter_mut().zip(&scaled) {
        entry.prob = prob;
        entry.cum = cum;
        cum += prob;
    }

    let precision = 1u32 << precision_bits;
    let mut coder = RansEncoder::new(interval_base(precision));
    for &s in symbols.iter().rev() {
        let sym = table[s as usize];
        coder.encode_span(sym.prob, sym.cum, precision);
    }
    let payload = coder.finish()?;
    buffer.encode_varint(payload.len() as u64)?;
    buffer.encode_bytes(&payload)
}

/// Reads `num_values` symbols written by
/// [`encode_symbol_sequence`] with the same `symbol_bits` class.
pub(crate) fn decode_symbol_sequence(
    num_values: usize,
    symbol_bits: u32,
    buffer: &mut DecoderBuffer,
    out: &mut [u32],
) -> Result<()> {
    debug_assert!(out.len() >= num_values);
    if symbol_bits > MAX_ALPHABET_BITS {
        return Err(CodecError::UnsupportedFeature(format!(
            "symbol bit length {symbol_bits} exceeds the precision bound"
        )));
    }
    let precision_bits = precision_bits_for(symbol_bits);
    let table = read_frequency_table(buffer, precision_bits)?;

    // Slot lookup table: slot -> symbol id.
    let precision = 1u32 << precision_bits;
    let mut lut = vec![0u32; precision as usize];
    for (id, entry) in table.iter().enumerate() {
        for slot in entry.cum..entry.cum + entry.prob {
            lut[slot as usize] = id as u32;
        }
    }

    let payload_len = buffer.decode_varint()? as usize;
    let payload = buffer.decode_slice(payload_len)?;
    let mut coder = RansDecoder::new(payload, interval_base(precision))?;
    for value in out.iter_mut().take(num_values) {
        let slot = coder.slot(precision - 1);
        let id = lut[slot as usize];
        let sym = table[id as usize];
        coder.advance(sym.prob, sym.cum, precision_bits);
        *value = id;
    }
    Ok(())
}
