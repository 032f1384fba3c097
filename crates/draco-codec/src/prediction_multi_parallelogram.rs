//! Constrained multi-parallelogram prediction.
//!
//! Every valid parallelogram around a vertex may contribute to the
//! prediction; per-parallelogram crease flags (grouped by how many
//! parallelograms were available, the "context") tell the decoder which
//! ones the encoder actually used. The encoder picks the configuration
//! with the smallest estimated coded size.

use crate::decoder_buffer::DecoderBuffer;
use crate::encoder_buffer::EncoderBuffer;
use crate::error::{corrupt, Result};
use crate::indices::CornerIndex;
use crate::prediction_scheme::{MeshPredictionContext, WrapTransform};
use crate::rans_bit_codec::{RansBitDecoder, RansBitEncoder};
use crate::symbol_codec::{zigzag_encode, EntropyTracker};

pub(crate) const MAX_PARALLELOGRAMS: usize = 4;

/// The crease-flag streams, one per context.
#[derive(Debug, Default)]
pub(crate) struct CreaseFlags {
    pub flags: [Vec<bool>; MAX_PARALLELOGRAMS],
}

impl CreaseFlags {
    pub fn write(&self, buffer: &mut EncoderBuffer) -> Result<()> {
        for stream in &self.flags {
            buffer.encode_varint(stream.len() as u64)?;
            if !stream.is_empty() {
                let mut bits = RansBitEncoder::new();
                for &flag in stream {
                    bits.encode_bit(flag);
                }
                bits.end_encoding(buffer)?;
            }
        }
        Ok(())
    }

    pub fn read(buffer: &mut DecoderBuffer, max_len: usize) -> Result<Self> {
        let mut out = Self::default();
        for stream in &mut out.flags {
            let len = buffer.decode_varint()? as usize;
            if len > max_len {
                return Err(corrupt("crease flag stream longer than the corner count"));
            }
            if len > 0 {
                let mut bits = RansBitDecoder::start_decoding(buffer)?;
                stream.reserve(len);
                for _ in 0..len {
                    stream.push(bits.decode_bit());
                }
            }
        }
        Ok(out)
    }
}

/// Collects the corners around `corner`'s vertex whose opposite face gives
/// a usable parallelogram (all three entries already decoded).
fn find_parallelogram_corners(
    ctx: &MeshPredictionContext,
    data_id: usize,
    corner: CornerIndex,
    out: &mut [CornerIndex; MAX_PARALLELOGRAMS],
) -> usize {
    let usable = |c: CornerIndex| -> bool {
        let opposite = ctx.table.opposite(c);
        if !opposite.is_valid() {
            return false;
        }
        let data_of = |cc: CornerIndex| -> i32 {
            let v = ctx.table.vertex(cc);
            ctx.vertex_to_data.get(v.index()).copied().unwrap_or(-1)
        };
        let opp = data_of(opposite);
        let next = data_of(ctx.table.next(opposite));
        let prev = data_of(ctx.table.prev(opposite));
        opp >= 0
            && next >= 0
            && prev >= 0
            && (opp as usize) < data_id
            && (next as usize) < data_id
            && (prev as usize) < data_id
    };

    let mut count = 0;
    let start = corner;
    let mut c = start;
    let mut swinging_left = true;
    while c.is_valid() && count < MAX_PARALLELOGRAMS {
        if usable(c) {
            out[count] = c;
            count += 1;
        }
        c = if swinging_left {
            ctx.table.swing_left(c)
        } else {
            ctx.table.swing_right(c)
        };
        if c == start {
            break;
        }
        if !c.is_valid() && swinging_left {
            swinging_left = false;
            c = ctx.table.swing_right(start);
        }
    }
    count
}

fn single_prediction(
    ctx: &MeshPredictionContext,
    corner: CornerIndex,
    values: &[i32],
    num_components: usize,
    out: &mut [i32],
) {
    let opposite = ctx.table.opposite(corner);
    let data_of = |c: CornerIndex| -> usize {
        ctx.vertex_to_data[ctx.table.vertex(c).index()] as usize
    };
    let opp = data_of(opposite);
    let next = data_of(ctx.table.next(opposite));
    let prev = data_of(ctx.table.prev(opposite));
    for c in 0..num_components {
        out[c] = (values[next * num_components + c] as i64
            + values[prev * num_components + c] as i64
            - values[opp * num_components + c] as i64) as i32;
    }
}

fn averaged_prediction(sums: &[i64], used: usize, out: &mut [i32]) {
    for (o, &s) in out.iter_mut().zip(sums) {
        *o = ((s + used as i64 / 2) / used as i64) as i32;
    }
}

/// Bit cost of coding `ones` set flags among `total` with the running
/// crease statistics of the context.
fn overhead_bits(context_used: i64, context_total: i64, num_flags: i64, ones: i64) -> i64 {
    if context_total == 0 {
        return num_flags;
    }
    let p = (context_used as f64 / context_total as f64).clamp(0.001, 0.999);
    let zeros = num_flags - ones;
    (-(ones as f64) * p.log2() - zeros as f64 * (1.0 - p).log2()).ceil() as i64
}

/// Encoder pass: chooses crease flags per entry and fills corrections.
pub(crate) fn multi_parallelogram_corrections(
    ctx: &MeshPredictionContext,
    values: &[i32],
    num_components: usize,
    wrap: &WrapTransform,
    out: &mut [i32],
) -> CreaseFlags {
    let num_entries = values.len() / num_components;
    let mut crease = CreaseFlags::default();
    let mut tracker = EntropyTracker::new();
    let mut total_parallelograms = [0i64; MAX_PARALLELOGRAMS];
    let mut total_used = [0i64; MAX_PARALLELOGRAMS];

    let mut corners = [CornerIndex::INVALID; MAX_PARALLELOGRAMS];
    let mut single_preds = vec![vec![0i32; num_components]; MAX_PARALLELOGRAMS];
    let mut entropy_symbols = vec![0u32; num_components];

    for data_id in 0..num_entries {
        let offset = data_id * num_components;
        let corner = ctx.data_to_corner[data_id];
        let num_parallelograms = if data_id == 0 {
            0
        } else {
            find_parallelogram_corners(ctx, data_id, corner, &mut corners)
        };

        let delta_pred = |c: usize| -> i32 {
            if data_id > 0 {
                values[offset - num_components + c]
            } else {
                0
            }
        };

        if num_parallelograms == 0 {
            for c in 0..num_components {
                let p = delta_pred(c);
                out[offset + c] = wrap.correction(values[offset + c], p);
                entropy_symbols[c] =
                    zigzag_encode((values[offset + c] as i64 - p as i64) as i32);
            }
            tracker.push(&entropy_symbols[..num_components]);
            continue;
        }

        for (i, pred) in single_preds.iter_mut().enumerate().take(num_parallelograms) {
            single_prediction(ctx, corners[i], values, num_components, pred);
        }

        // Try every configuration; config bit i set means parallelogram i
        // contributes.
        let context = num_parallelograms - 1;
        let mut best_cost = i64::MAX;
        let mut best_residual = i64::MAX;
        let mut best_config = 0usize;
        for config in 0..(1usize << num_parallelograms) {
            let used = config.count_ones() as usize;
            let mut residual = 0i64;
            for c in 0..num_components {
                let p = if used == 0 {
                    delta_pred(c)
                } else {
                    let mut sum = 0i64;
                    for i in 0..num_parallelograms {
                        if config & (1 << i) != 0 {
                            sum += single_preds[i][c] as i64;
                        }
                    }
                    ((sum + used as i64 / 2) / used as i64) as i32
                };
                let dif = values[offset + c] as i64 - p as i64;
                residual += dif.abs();
                entropy_symbols[c] = zigzag_encode(dif as i32);
            }
            let snapshot = tracker.peek(&entropy_symbols[..num_components]);
            let mut cost = snapshot.data_bits() + snapshot.table_bits();
            cost += overhead_bits(
                total_used[context],
                total_parallelograms[context],
                num_parallelograms as i64,
                used as i64,
            );
            if (cost, residual) < (best_cost, best_residual) {
                best_cost = cost;
                best_residual = residual;
                best_config = config;
            }
        }

        let used = best_config.count_ones() as usize;
        for i in 0..num_parallelograms {
            let is_used = best_config & (1 << i) != 0;
            // A set flag marks a crease: the parallelogram is skipped.
            crease.flags[context].push(!is_used);
            total_parallelograms[context] += 1;
            if is_used {
                total_used[context] += 1;
            }
        }

        for c in 0..num_components {
            let p = if used == 0 {
                delta_pred(c)
            } else {
                let mut sum = 0i64;
                for i in 0..num_parallelograms {
                    if best_config & (1 << i) != 0 {
                        sum += single_preds[i][c] as i64;
                    }
                }
                ((sum + used as i64 / 2) / used as i64) as i32
            };
            out[offset + c] = wrap.correction(values[offset + c], p);
            entropy_symbols[c] = zigzag_encode((values[offset + c] as i64 - p as i64) as i32);
        }
        tracker.push(&entropy_symbols[..num_components]);
    }
    crease
}

/// Decoder pass: consumes the crease flags and rebuilds values.
pub(crate) fn multi_parallelogram_recover(
    ctx: &MeshPredictionContext,
    corrections: &[i32],
    num_components: usize,
    wrap: &WrapTransform,
    crease: &CreaseFlags,
    out: &mut [i32],
) -> Result<()> {
    let num_entries = corrections.len() / num_components;
    let mut corners = [CornerIndex::INVALID; MAX_PARALLELOGRAMS];
    let mut positions = [0usize; MAX_PARALLELOGRAMS];
    let mut sums = vec![0i64; num_components];
    let mut pred = vec![0i32; num_components];

    for data_id in 0..num_entries {
        let offset = data_id * num_components;
        let corner = ctx.data_to_corner[data_id];
        let num_parallelograms = if data_id == 0 {
            0
        } else {
            find_parallelogram_corners(ctx, data_id, corner, &mut corners)
        };

        let mut used = 0usize;
        if num_parallelograms > 0 {
            let context = num_parallelograms - 1;
            sums.iter_mut().for_each(|s| *s = 0);
            for i in 0..num_parallelograms {
                let pos = positions[context];
                positions[context] += 1;
                let is_crease = *crease
                    .flags[context]
                    .get(pos)
                    .ok_or_else(|| corrupt("crease flag stream exhausted"))?;
                if !is_crease {
                    single_prediction(ctx, corners[i], out, num_components, &mut pred);
                    for (s, &p) in sums.iter_mut().zip(pred.iter()) {
                        *s += p as i64;
                    }
                    used += 1;
                }
            }
        }

        for c in 0..num_components {
            let p = if used == 0 {
                if data_id > 0 {
                    out[offset - num_components + c]
                } else {
                    0
                }
            } else {
                ((sums[c] + used as i64 / 2) / used as i64) as i32
            };
            out[offset + c] = wrap.recover(p, corrections[offset + c]);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corner_table::CornerTable;
    use crate::indices::VertexIndex;
    use crate::traversal::sequence_vertices;

    #[test]
    fn fan_roundtrip() {
        // A fan of four triangles around vertex 0: interior vertex with
        // several parallelogram candidates.
        let v = VertexIndex;
        let faces = [
            [v(0), v(1), v(2)],
            [v(0), v(2), v(3)],
            [v(0), v(3), v(4)],
            [v(0), v(4), v(5)],
        ];
        let table = CornerTable::from_faces(&faces, 6).unwrap();
        let order: Vec<CornerIndex> =
            (0..table.num_faces()).map(|f| CornerIndex((f * 3) as u32)).collect();
        let seq = sequence_vertices(&table, &order);
        let ctx = MeshPredictionContext {
            table: &table,
            data_to_corner: &seq.corners,
            vertex_to_data: &seq.vertex_to_data,
        };

        let grid = [[5, 5], [0, 0], [10, 0], [12, 6], [10, 12], [0, 10]];
        let values: Vec<i32> = seq.vertices.iter().flat_map(|v| grid[v.index()]).collect();

        let wrap = WrapTransform::from_values(&values);
        let mut corr = vec![0i32; values.len()];
        let crease = multi_parallelogram_corrections(&ctx, &values, 2, &wrap, &mut corr);

        let mut buffer = crate::encoder_buffer::EncoderBuffer::new();
        crease.write(&mut buffer).unwrap();
        let mut dec = crate::decoder_buffer::DecoderBuffer::new(buffer.data());
        let crease2 = CreaseFlags::read(&mut dec, table.num_corners()).unwrap();

        let mut restored = vec![0i32; values.len()];
        multi_parallelogram_recover(&ctx, &corr, 2, &wrap, &crease2, &mut restored).unwrap();
        assert_eq!(restored, values);
    }
}
