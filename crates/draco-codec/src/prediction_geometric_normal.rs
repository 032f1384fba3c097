//! Geometric normal prediction.
//!
//! The normal at a vertex is predicted as the area-weighted average of the
//! incident face normals, computed from the decoded quantized positions.
//! The result is canonicalized onto the octahedral grid; a per-entry flip
//! bit resolves the sign ambiguity of the surface orientation.

use crate::decoder_buffer::DecoderBuffer;
use crate::encoder_buffer::EncoderBuffer;
use crate::error::{corrupt, Result};
use crate::indices::CornerIndex;
use crate::octahedron::Octahedron;
use crate::prediction_scheme::MeshPredictionContext;
use crate::rans_bit_codec::{RansBitDecoder, RansBitEncoder};

#[derive(Debug, Default)]
pub(crate) struct NormalFlips {
    pub bits: Vec<bool>,
}

impl NormalFlips {
    pub fn write(&self, buffer: &mut EncoderBuffer) -> Result<()> {
        let mut coder = RansBitEncoder::new();
        for &bit in &self.bits {
            coder.encode_bit(bit);
        }
        coder.end_encoding(buffer)
    }

    pub fn read(buffer: &mut DecoderBuffer, len: usize) -> Result<Self> {
        let mut coder = RansBitDecoder::start_decoding(buffer)?;
        let mut bits = Vec::with_capacity(len);
        for _ in 0..len {
            bits.push(coder.decode_bit());
        }
        Ok(Self { bits })
    }
}

fn position(positions: &[i32], data_id: usize) -> [i64; 3] {
    let off = data_id * 3;
    [
        positions[off] as i64,
        positions[off + 1] as i64,
        positions[off + 2] as i64,
    ]
}

/// Area-weighted normal around the vertex of `corner`, canonicalized onto
/// the octahedral diamond (before any flip).
fn predicted_normal(
    ctx: &MeshPredictionContext,
    oct: &Octahedron,
    positions: &[i32],
    data_id: usize,
    corner: CornerIndex,
) -> [i32; 3] {
    let data_of = |c: CornerIndex| -> i32 {
        let v = ctx.table.vertex(c);
        ctx.vertex_to_data.get(v.index()).copied().unwrap_or(-1)
    };
    let pos_of = |c: CornerIndex| -> Option<[i64; 3]> {
        let d = data_of(c);
        (d >= 0).then(|| position(positions, d as usize))
    };

    let cent = position(positions, data_id);
    let mut normal = [0i128; 3];

    // Walk the full fan: swing left to the end, then right from the start.
    let start = corner;
    let mut c = start;
    let mut swinging_left = true;
    while c.is_valid() {
        if let (Some(prev), Some(next)) =
            (pos_of(ctx.table.prev(c)), pos_of(ctx.table.next(c)))
        {
            let v_prev = [prev[0] - cent[0], prev[1] - cent[1], prev[2] - cent[2]];
            let v_next = [next[0] - cent[0], next[1] - cent[1], next[2] - cent[2]];
            normal[0] += v_prev[1] as i128 * v_next[2] as i128
                - v_prev[2] as i128 * v_next[1] as i128;
            normal[1] += v_prev[2] as i128 * v_next[0] as i128
                - v_prev[0] as i128 * v_next[2] as i128;
            normal[2] += v_prev[0] as i128 * v_next[1] as i128
                - v_prev[1] as i128 * v_next[0] as i128;
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

    let mut int_vec = [0i32; 3];
    if normal != [0, 0, 0] {
        let nx = normal[0] as f64;
        let ny = normal[1] as f64;
        let nz = normal[2] as f64;
        let len = (nx * nx + ny * ny + nz * nz).sqrt();
        let center = oct.center_value() as f64;
        int_vec[0] = (nx / len * center) as i32;
        int_vec[1] = (ny / len * center) as i32;
        int_vec[2] = (nz / len * center) as i32;
    }
    oct.canonicalize_integer_vector(&mut int_vec);
    int_vec
}

/// Wrapped magnitude of an octahedral correction.
fn correction_cost(oct: &Octahedron, corr: [i32; 2]) -> i64 {
    let wrap = |c: i32| -> i64 {
        let c = c as i64;
        c.min(oct.max_quantized_value() as i64 - c)
    };
    wrap(corr[0]) + wrap(corr[1])
}

/// Encoder pass over octahedral (s, t) entries in data order.
pub(crate) fn geometric_normal_corrections(
    ctx: &MeshPredictionContext,
    oct: &Octahedron,
    values: &[i32],
    positions: &[i32],
    out: &mut [i32],
) -> NormalFlips {
    let num_entries = values.len() / 2;
    let mut flips = NormalFlips::default();
    for data_id in 0..num_entries {
        let corner = ctx.data_to_corner[data_id];
        let mut pred = predicted_normal(ctx, oct, positions, data_id, corner);
        let orig = [values[data_id * 2], values[data_id * 2 + 1]];

        let coords_plus = oct.integer_vector_to_coords(pred);
        let corr_plus = oct.compute_correction(orig, [coords_plus.0, coords_plus.1]);
        pred = [-pred[0], -pred[1], -pred[2]];
        oct.canonicalize_integer_vector(&mut pred);
        let coords_minus = oct.integer_vector_to_coords(pred);
        let corr_minus = oct.compute_correction(orig, [coords_minus.0, coords_minus.1]);

        let flip = correction_cost(oct, corr_minus) < correction_cost(oct, corr_plus);
        flips.bits.push(flip);
        let corr = if flip { corr_minus } else { corr_plus };
        out[data_id * 2] = corr[0];
        out[data_id * 2 + 1] = corr[1];
    }
    flips
}

/// Inverse of [`geometric_normal_corrections`].
pub(crate) fn geometric_normal_recover(
    ctx: &MeshPredictionContext,
    oct: &Octahedron,
    corrections: &[i32],
    positions: &[i32],
    flips: &NormalFlips,
    out: &mut [i32],
) -> Result<()> {
    let num_entries = corrections.len() / 2;
    if flips.bits.len() < num_entries {
        return Err(corrupt("normal flip stream exhausted"));
    }
    for data_id in 0..num_entries {
        let corner = ctx.data_to_corner[data_id];
        let mut pred = predicted_normal(ctx, oct, positions, data_id, corner);
        if flips.bits[data_id] {
            pred = [-pred[0], -pred[1], -pred[2]];
            oct.canonicalize_integer_vector(&mut pred);
        }
        let coords = oct.integer_vector_to_coords(pred);
        let corr = [corrections[data_id * 2], corrections[data_id * 2 + 1]];
        let restored = oct.apply_correction([coords.0, coords.1], corr);
        out[data_id * 2] = restored[0];
        out[data_id * 2 + 1] = restored[1];
    }
    Ok(())
}
