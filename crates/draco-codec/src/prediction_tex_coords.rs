//! Texture-coordinate prediction from quantized positions.
//!
//! The UV of a vertex is predicted by transporting the opposite edge's UV
//! delta through the 3D geometry: the tip is projected onto the edge, and
//! the perpendicular component maps onto the rotated UV edge with an
//! integer square-root scale. Each rotational prediction carries one
//! orientation bit because the handedness of the parametrization is not
//! recoverable from geometry alone.

use crate::decoder_buffer::DecoderBuffer;
use crate::encoder_buffer::EncoderBuffer;
use crate::error::{corrupt, Result};
use crate::prediction_scheme::{MeshPredictionContext, WrapTransform};
use crate::rans_bit_codec::{RansBitDecoder, RansBitEncoder};

/// Orientation bits in prediction order.
#[derive(Debug, Default)]
pub(crate) struct TexCoordOrientations {
    pub bits: Vec<bool>,
}

impl TexCoordOrientations {
    pub fn write(&self, buffer: &mut EncoderBuffer) -> Result<()> {
        buffer.encode_varint(self.bits.len() as u64)?;
        let mut coder = RansBitEncoder::new();
        let mut last = true;
        for &bit in &self.bits {
            coder.encode_bit(bit == last);
            last = bit;
        }
        coder.end_encoding(buffer)
    }

    pub fn read(buffer: &mut DecoderBuffer, max_len: usize) -> Result<Self> {
        let len = buffer.decode_varint()? as usize;
        if len > max_len {
            return Err(corrupt("orientation stream longer than the entry count"));
        }
        let mut coder = RansBitDecoder::start_decoding(buffer)?;
        let mut bits = Vec::with_capacity(len);
        let mut last = true;
        for _ in 0..len {
            let same = coder.decode_bit();
            let bit = if same { last } else { !last };
            bits.push(bit);
            last = bit;
        }
        Ok(Self { bits })
    }
}

fn int_sqrt(v: u128) -> u128 {
    if v == 0 {
        return 0;
    }
    let mut x = 1u128 << ((128 - v.leading_zeros()).div_ceil(2));
    loop {
        let next = (x + v / x) / 2;
        if next >= x {
            return x;
        }
        x = next;
    }
}

struct EdgePrediction {
    // Both rotational candidates, or a single forced prediction.
    candidates: Option<([i64; 2], [i64; 2])>,
    fallback: [i64; 2],
}

fn position(positions: &[i32], data_id: usize) -> [i128; 3] {
    let off = data_id * 3;
    [
        positions[off] as i128,
        positions[off + 1] as i128,
        positions[off + 2] as i128,
    ]
}

fn uv(values: &[i32], data_id: usize) -> [i64; 2] {
    [values[data_id * 2] as i64, values[data_id * 2 + 1] as i64]
}

/// Derives the prediction for `data_id`. Returns rotational candidates
/// when the opposite edge geometry allows them; otherwise a fallback.
fn predict(
    ctx: &MeshPredictionContext,
    data_id: usize,
    values: &[i32],
    positions: &[i32],
) -> EdgePrediction {
    let corner = ctx.data_to_corner[data_id];
    let data_of = |c| {
        let v = ctx.table.vertex(c);
        ctx.vertex_to_data.get(v.index()).copied().unwrap_or(-1)
    };
    let next_data = data_of(ctx.table.next(corner));
    let prev_data = data_of(ctx.table.prev(corner));
    let next_ready = next_data >= 0 && (next_data as usize) < data_id;
    let prev_ready = prev_data >= 0 && (prev_data as usize) < data_id;

    if next_ready && prev_ready {
        let n_uv = uv(values, next_data as usize);
        let p_uv = uv(values, prev_data as usize);
        if n_uv == p_uv {
            return EdgePrediction {
                candidates: None,
                fallback: p_uv,
            };
        }
        let tip_pos = position(positions, data_id);
        let next_pos = position(positions, next_data as usize);
        let prev_pos = position(positions, prev_data as usize);

        let pn = [
            prev_pos[0] - next_pos[0],
            prev_pos[1] - next_pos[1],
            prev_pos[2] - next_pos[2],
        ];
        let pn_norm2 = pn[0] * pn[0] + pn[1] * pn[1] + pn[2] * pn[2];
        if pn_norm2 != 0 {
            let cn = [
                tip_pos[0] - next_pos[0],
                tip_pos[1] - next_pos[1],
                tip_pos[2] - next_pos[2],
            ];
            let cn_dot_pn = pn[0] * cn[0] + pn[1] * cn[1] + pn[2] * cn[2];
            let pn_uv = [p_uv[0] - n_uv[0], p_uv[1] - n_uv[1]];

            let x_uv = [
                n_uv[0] as i128 * pn_norm2 + pn_uv[0] as i128 * cn_dot_pn,
                n_uv[1] as i128 * pn_norm2 + pn_uv[1] as i128 * cn_dot_pn,
            ];
            let x_pos = [
                next_pos[0] + pn[0] * cn_dot_pn / pn_norm2,
                next_pos[1] + pn[1] * cn_dot_pn / pn_norm2,
                next_pos[2] + pn[2] * cn_dot_pn / pn_norm2,
            ];
            let cx = [
                tip_pos[0] - x_pos[0],
                tip_pos[1] - x_pos[1],
                tip_pos[2] - x_pos[2],
            ];
            let cx_norm2 = cx[0] * cx[0] + cx[1] * cx[1] + cx[2] * cx[2];
            let scale = int_sqrt(cx_norm2 as u128 * pn_norm2 as u128) as i128;
            let cx_uv = [pn_uv[1] as i128 * scale, -(pn_uv[0] as i128) * scale];

            let plus = [
                ((x_uv[0] + cx_uv[0]) / pn_norm2) as i64,
                ((x_uv[1] + cx_uv[1]) / pn_norm2) as i64,
            ];
            let minus = [
                ((x_uv[0] - cx_uv[0]) / pn_norm2) as i64,
                ((x_uv[1] - cx_uv[1]) / pn_norm2) as i64,
            ];
            return EdgePrediction {
                candidates: Some((plus, minus)),
                fallback: p_uv,
            };
        }
    }

    let fallback = if prev_ready {
        uv(values, prev_data as usize)
    } else if next_ready {
        uv(values, next_data as usize)
    } else if data_id > 0 {
        uv(values, data_id - 1)
    } else {
        [0, 0]
    };
    EdgePrediction {
        candidates: None,
        fallback,
    }
}

/// Encoder pass over UV entries in data order.
pub(crate) fn tex_coords_corrections(
    ctx: &MeshPredictionContext,
    values: &[i32],
    positions: &[i32],
    wrap: &WrapTransform,
    out: &mut [i32],
) -> TexCoordOrientations {
    let num_entries = values.len() / 2;
    let mut orientations = TexCoordOrientations::default();
    for data_id in 0..num_entries {
        let prediction = predict(ctx, data_id, values, positions);
        let actual = uv(values, data_id);
        let pred = match prediction.candidates {
            Some((plus, minus)) => {
                let dist = |p: [i64; 2]| -> i64 {
                    let d0 = actual[0] - p[0];
                    let d1 = actual[1] - p[1];
                    d0 * d0 + d1 * d1
                };
                if dist(plus) < dist(minus) {
                    orientations.bits.push(true);
                    plus
                } else {
                    orientations.bits.push(false);
                    minus
                }
            }
            None => prediction.fallback,
        };
        for c in 0..2 {
            out[data_id * 2 + c] =
                wrap.correction(values[data_id * 2 + c], pred[c] as i32);
        }
    }
    orientations
}

/// Decoder pass; consumes orientation bits in the same order.
pub(crate) fn tex_coords_recover(
    ctx: &MeshPredictionContext,
    corrections: &[i32],
    positions: &[i32],
    wrap: &WrapTransform,
    orientations: &TexCoordOrientations,
    out: &mut [i32],
) -> Result<()> {
    let num_entries = corrections.len() / 2;
    let mut next_orientation = 0usize;
    for data_id in 0..num_entries {
        let prediction = predict(ctx, data_id, out, positions);
        let pred = match prediction.candidates {
            Some((plus, minus)) => {
                let bit = *orientations
                    .bits
                    .get(next_orientation)
                    .ok_or_else(|| corrupt("orientation bit stream exhausted"))?;
                next_orientation += 1;
                if bit {
                    plus
                } else {
                    minus
                }
            }
            None => prediction.fallback,
        };
        for c in 0..2 {
            out[data_id * 2 + c] =
                wrap.recover(pred[c] as i32, corrections[data_id * 2 + c]);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corner_table::CornerTable;
    use crate::indices::{CornerIndex, VertexIndex};
    use crate::traversal::sequence_vertices;

    #[test]
    fn int_sqrt_is_floor_sqrt() {
        for v in [0u128, 1, 2, 3, 4, 15, 16, 17, 1 << 40, (1 << 40) + 123] {
            let r = int_sqrt(v);
            assert!(r * r <= v);
            assert!((r + 1) * (r + 1) > v);
        }
    }

    #[test]
    fn flat_quad_uv_roundtrip() {
        let v = VertexIndex;
        let faces = [[v(0), v(1), v(2)], [v(0), v(2), v(3)]];
        let table = CornerTable::from_faces(&faces, 4).unwrap();
        let order: Vec<CornerIndex> =
            (0..table.num_faces()).map(|f| CornerIndex((f * 3) as u32)).collect();
        let seq = sequence_vertices(&table, &order);
        let ctx = MeshPredictionContext {
            table: &table,
            data_to_corner: &seq.corners,
            vertex_to_data: &seq.vertex_to_data,
        };

        // Quantized positions on a planar quad, UVs proportional to x/y.
        let pos = [[0, 0, 0], [1000, 0, 0], [1000, 1000, 0], [0, 1000, 0]];
        let uvs = [[0, 0], [500, 0], [500, 500], [0, 500]];
        let positions: Vec<i32> = seq.vertices.iter().flat_map(|v| pos[v.index()]).collect();
        let values: Vec<i32> = seq.vertices.iter().flat_map(|v| uvs[v.index()]).collect();

        let wrap = WrapTransform::from_values(&values);
        let mut corr = vec![0i32; values.len()];
        let orientations = tex_coords_corrections(&ctx, &values, &positions, &wrap, &mut corr);

        let mut restored = vec![0i32; values.len()];
        tex_coords_recover(&ctx, &corr, &positions, &wrap, &orientations, &mut restored)
            .unwrap();
        assert_eq!(restored, values);

        // On a flat, conformal parametrization the rotational prediction is
        // near exact: the last entry's correction must be tiny.
        let last = &corr[corr.len() - 2..];
        assert!(last[0].abs() <= 2 && last[1].abs() <= 2, "corr {last:?}");
    }
}
