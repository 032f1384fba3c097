//! Single-parallelogram prediction across the opposite face.

use crate::indices::CornerIndex;
use crate::prediction_scheme::{MeshPredictionContext, WrapTransform};

/// Predicts the entry at `data_id` from the face across the edge opposite
/// `corner`: `next + prev - opposite`, all taken from the opposite corner's
/// face. Fails when any of the three entries has not been decoded yet.
pub(crate) fn parallelogram_prediction(
    ctx: &MeshPredictionContext,
    data_id: usize,
    corner: CornerIndex,
    values: &[i32],
    num_components: usize,
    out: &mut [i32],
) -> bool {
    let opposite = ctx.table.opposite(corner);
    if !opposite.is_valid() {
        return false;
    }
    let entry = |c: CornerIndex| -> i32 {
        let v = ctx.table.vertex(c);
        ctx.vertex_to_data.get(v.index()).copied().unwrap_or(-1)
    };
    let opp = entry(opposite);
    let next = entry(ctx.table.next(opposite));
    let prev = entry(ctx.table.prev(opposite));
    if opp < 0 || next < 0 || prev < 0 {
        return false;
    }
    let (opp, next, prev) = (opp as usize, next as usize, prev as usize);
    if opp >= data_id || next >= data_id || prev >= data_id {
        return false;
    }
    for c in 0..num_components {
        let predicted = values[next * num_components + c] as i64
            + values[prev * num_components + c] as i64
            - values[opp * num_components + c] as i64;
        out[c] = predicted as i32;
    }
    true
}

/// Correction pass: parallelogram where the neighbourhood allows it, delta
/// against the previous entry otherwise.
pub(crate) fn parallelogram_corrections(
    ctx: &MeshPredictionContext,
    values: &[i32],
    num_components: usize,
    wrap: &WrapTransform,
    out: &mut [i32],
) {
    let num_entries = values.len() / num_components;
    let mut pred = vec![0i32; num_components];
    for data_id in 0..num_entries {
        let offset = data_id * num_components;
        let corner = ctx.data_to_corner[data_id];
        let has_parallelogram = data_id > 0
            && parallelogram_prediction(ctx, data_id, corner, values, num_components, &mut pred);
        for c in 0..num_components {
            let p = if has_parallelogram {
                pred[c]
            } else if data_id > 0 {
                values[offset - num_components + c]
            } else {
                0
            };
            out[offset + c] = wrap.correction(values[offset + c], p);
        }
    }
}

/// Inverse of [`parallelogram_corrections`].
pub(crate) fn parallelogram_recover(
    ctx: &MeshPredictionContext,
    corrections: &[i32],
    num_components: usize,
    wrap: &WrapTransform,
    out: &mut [i32],
) {
    let num_entries = corrections.len() / num_components;
    let mut pred = vec![0i32; num_components];
    for data_id in 0..num_entries {
        let offset = data_id * num_components;
        let corner = ctx.data_to_corner[data_id];
        let has_parallelogram = data_id > 0
            && parallelogram_prediction(ctx, data_id, corner, out, num_components, &mut pred);
        for c in 0..num_components {
            let p = if has_parallelogram {
                pred[c]
            } else if data_id > 0 {
                out[offset - num_components + c]
            } else {
                0
            };
            out[offset + c] = wrap.recover(p, corrections[offset + c]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corner_table::CornerTable;
    use crate::indices::VertexIndex;
    use crate::traversal::sequence_vertices;

    #[test]
    fn quad_roundtrip_and_exact_interior_prediction() {
        let faces = [
            [VertexIndex(0), VertexIndex(1), VertexIndex(2)],
            [VertexIndex(0), VertexIndex(2), VertexIndex(3)],
        ];
        let table = CornerTable::from_faces(&faces, 4).unwrap();
        let order: Vec<CornerIndex> =
            (0..table.num_faces()).map(|f| CornerIndex((f * 3) as u32)).collect();
        let seq = sequence_vertices(&table, &order);
        let ctx = MeshPredictionContext {
            table: &table,
            data_to_corner: &seq.corners,
            vertex_to_data: &seq.vertex_to_data,
        };

        // Planar lattice positions: the fourth vertex is an exact
        // parallelogram completion of the first three.
        let positions = [[0, 0], [10, 0], [10, 10], [0, 10]];
        let values: Vec<i32> = seq
            .vertices
            .iter()
            .flat_map(|v| positions[v.index()])
            .collect();

        let wrap = WrapTransform::from_values(&values);
        let mut corr = vec![0i32; values.len()];
        parallelogram_corrections(&ctx, &values, 2, &wrap, &mut corr);
        // The last entry closes the quad; its prediction must be exact.
        assert_eq!(&corr[corr.len() - 2..], &[0, 0]);

        let mut restored = vec![0i32; values.len()];
        parallelogram_recover(&ctx, &corr, 2, &wrap, &mut restored);
        assert_eq!(restored, values);
    }
}
