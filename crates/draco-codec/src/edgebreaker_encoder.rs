//! EdgeBreaker connectivity encoder.
//!
//! Walks each connected component face by face from a deterministic seed,
//! emitting one C/L/R/S/E symbol per face. Boundary loops are pre-marked so
//! the decoder can reconstruct them implicitly; handles surface as topology
//! split events. After writing the block, the encoder replays the decoder's
//! reconstruction and verifies the two sides agree corner for corner.

use crate::corner_table::CornerTable;
use crate::edgebreaker::{
    rebuild_connectivity, ClersSymbol, TopologySplit, CLERS_SYMBOL_BITS,
};
use crate::encoder_buffer::EncoderBuffer;
use crate::error::{internal, Result};
use crate::indices::{CornerIndex, FaceIndex, VertexIndex};
use crate::rans_bit_codec::RansBitEncoder;
use crate::rans_symbol_codec::encode_symbol_sequence;
use std::collections::HashMap;

/// Traversal result needed by the attribute stage: the encoder-side corner
/// matching each decoded face, in the decoder's face order.
pub(crate) struct EncodedConnectivity {
    pub corner_order: Vec<CornerIndex>,
    pub num_components: usize,
}

struct Traversal<'a> {
    table: &'a CornerTable,
    visited_faces: Vec<bool>,
    visited_vertices: Vec<bool>,
    // Hole id per vertex, -1 off-boundary.
    vertex_hole_id: Vec<i32>,
    visited_holes: Vec<bool>,
    symbols: Vec<ClersSymbol>,
    start_configs: Vec<bool>,
    processed_corners: Vec<CornerIndex>,
    init_corners: Vec<CornerIndex>,
    face_to_split_symbol: HashMap<u32, u32>,
    splits: Vec<TopologySplit>,
    num_split_symbols: usize,
    stack: Vec<CornerIndex>,
}

impl<'a> Traversal<'a> {
    fn new(table: &'a CornerTable) -> Self {
        Self {
            table,
            visited_faces: vec![false; table.num_faces()],
            visited_vertices: vec![false; table.num_vertices()],
            vertex_hole_id: vec![-1; table.num_vertices()],
            visited_holes: Vec::new(),
            symbols: Vec::with_capacity(table.num_faces()),
            start_configs: Vec::new(),
            processed_corners: Vec::with_capacity(table.num_faces()),
            init_corners: Vec::new(),
            face_to_split_symbol: HashMap::new(),
            splits: Vec::new(),
            num_split_symbols: 0,
            stack: Vec::new(),
        }
    }

    /// Walks every boundary loop once, assigning each boundary vertex the
    /// id of its hole.
    fn compute_boundaries(&mut self) {
        for c in 0..self.table.num_corners() {
            let corner = CornerIndex(c as u32);
            if !self.table.is_boundary_edge(corner) {
                continue;
            }
            let mut v = self.table.vertex(self.table.next(corner));
            if self.vertex_hole_id[v.index()] >= 0 {
                continue;
            }
            let hole_id = self.visited_holes.len() as i32;
            self.visited_holes.push(false);
            let mut c = corner;
            while self.vertex_hole_id[v.index()] < 0 {
                self.vertex_hole_id[v.index()] = hole_id;
                c = self.table.next(c);
                while !self.table.is_boundary_edge(c) {
                    c = self.table.next(self.table.opposite(c));
                }
                v = self.table.vertex(self.table.next(c));
            }
        }
    }

    /// Marks all vertices of the hole containing `start_corner`'s vertex.
    fn process_boundary(&mut self, start_corner: CornerIndex, mark_first_vertex: bool) {
        let mut corner = self.table.prev(start_corner);
        while !self.table.is_boundary_edge(corner) {
            corner = self.table.next(self.table.opposite(corner));
        }
        let start_v = self.table.vertex(start_corner);
        if mark_first_vertex {
            self.visited_vertices[start_v.index()] = true;
        }
        let hole = self.vertex_hole_id[start_v.index()];
        debug_assert!(hole >= 0);
        self.visited_holes[hole as usize] = true;

        let mut curr_v = self.table.vertex(self.table.prev(corner));
        while curr_v != start_v {
            self.visited_vertices[curr_v.index()] = true;
            corner = self.table.next(corner);
            while !self.table.is_boundary_edge(corner) {
                corner = self.table.next(self.table.opposite(corner));
            }
            curr_v = self.table.vertex(self.table.prev(corner));
        }
    }

    /// Picks the start configuration for a component seed face: interior
    /// (no boundary contact) or a corner facing the boundary.
    fn begin_from(&self, face: FaceIndex) -> (bool, CornerIndex) {
        let mut corner = self.table.first_corner(face);
        for _ in 0..3 {
            if self.table.is_boundary_edge(corner) {
                return (false, corner);
            }
            if self.vertex_hole_id[self.table.vertex(corner).index()] >= 0 {
                // Swing to the corner whose previous edge lies on the hole.
                let mut c = corner;
                loop {
                    let right = self.table.swing_right(c);
                    if !right.is_valid() {
                        break;
                    }
                    c = right;
                }
                return (false, self.table.prev(c));
            }
            corner = self.table.next(corner);
        }
        (true, corner)
    }

    fn check_split(&mut self, source_symbol: u32, on_right: bool, neighbor: FaceIndex) {
        if let Some(&split_symbol) = self.face_to_split_symbol.get(&neighbor.0) {
            self.splits.push(TopologySplit {
                source_symbol,
                split_symbol,
                source_on_right: on_right,
            });
        }
    }

    fn face_visited(&self, c: CornerIndex) -> bool {
        !c.is_valid() || self.visited_faces[self.table.face(c).index()]
    }

    fn traverse_from(&mut self, start: CornerIndex) -> Result<()> {
        self.stack.clear();
        self.stack.push(start);
        while let Some(&top) = self.stack.last() {
            if self.face_visited(top) {
                self.stack.pop();
                continue;
            }
            let mut c = top;
            loop {
                let symbol_index = self.symbols.len() as u32;
                let face = self.table.face(c);
                if self.visited_faces[face.index()] {
                    return Err(internal("traversal revisited a face"));
                }
                self.visited_faces[face.index()] = true;
                self.processed_corners.push(c);

                let v = self.table.vertex(c);
                if !self.visited_vertices[v.index()] {
                    self.visited_vertices[v.index()] = true;
                    if self.vertex_hole_id[v.index()] < 0 {
                        self.symbols.push(ClersSymbol::C);
                        // Interior unvisited apex: the right face exists.
                        c = self.table.right_corner(c);
                        if !c.is_valid() {
                            return Err(internal("C symbol walked off the mesh"));
                        }
                        continue;
                    }
                }

                let right_c = self.table.right_corner(c);
                let left_c = self.table.left_corner(c);
                let right_visited = self.face_visited(right_c);
                let left_visited = self.face_visited(left_c);
                if right_visited {
                    if right_c.is_valid() {
                        self.check_split(symbol_index, true, self.table.face(right_c));
                    }
                    if left_visited {
                        if left_c.is_valid() {
                            self.check_split(symbol_index, false, self.table.face(left_c));
                        }
                        self.symbols.push(ClersSymbol::E);
                        self.stack.pop();
                        break;
                    }
                    self.symbols.push(ClersSymbol::R);
                    c = left_c;
                } else if left_visited {
                    if left_c.is_valid() {
                        self.check_split(symbol_index, false, self.table.face(left_c));
                    }
                    self.symbols.push(ClersSymbol::L);
                    c = right_c;
                } else {
                    self.symbols.push(ClersSymbol::S);
                    self.num_split_symbols += 1;
                    let hole = self.vertex_hole_id[v.index()];
                    if hole >= 0 && !self.visited_holes[hole as usize] {
                        self.process_boundary(c, false);
                    }
                    self.face_to_split_symbol.insert(face.0, symbol_index);
                    *self.stack.last_mut().unwrap() = left_c;
                    self.stack.push(right_c);
                    break;
                }
            }
        }
        Ok(())
    }
}

/// Deterministic component seeds: for every connected component, the face
/// whose smallest vertex id is lowest (ties: lowest face id). Components
/// are returned in ascending order of their seed face id.
fn component_seeds(table: &CornerTable) -> Vec<FaceIndex> {
    let num_faces = table.num_faces();
    let mut component = vec![-1i32; num_faces];
    let mut seeds: Vec<FaceIndex> = Vec::new();
    let mut queue: Vec<usize> = Vec::new();

    for f in 0..num_faces {
        if component[f] >= 0 {
            continue;
        }
        let id = seeds.len() as i32;
        component[f] = id;
        queue.clear();
        queue.push(f);
        let mut best_key = (u32::MAX, u32::MAX);
        let mut best_face = FaceIndex(f as u32);
        while let Some(face) = queue.pop() {
            let first = table.first_corner(FaceIndex(face as u32));
            let mut min_vertex = u32::MAX;
            let mut corner = first;
            for _ in 0..3 {
                min_vertex = min_vertex.min(table.vertex(corner).0);
                let opp = table.opposite(corner);
                if opp.is_valid() {
                    let neighbor = table.face(opp).index();
                    if component[neighbor] < 0 {
                        component[neighbor] = id;
                        queue.push(neighbor);
                    }
                }
                corner = table.next(corner);
            }
            let key = (min_vertex, face as u32);
            if key < best_key {
                best_key = key;
                best_face = FaceIndex(face as u32);
            }
        }
        seeds.push(best_face);
    }
    seeds
}

pub(crate) fn encode_connectivity(
    table: &CornerTable,
    buffer: &mut EncoderBuffer,
) -> Result<EncodedConnectivity> {
    let mut traversal = Traversal::new(table);
    traversal.compute_boundaries();

    let seeds = component_seeds(table);
    for &seed in &seeds {
        debug_assert!(!traversal.visited_faces[seed.index()]);
        let (interior, start_corner) = traversal.begin_from(seed);
        traversal.start_configs.push(interior);
        if interior {
            let v = table.vertex(start_corner);
            let n = table.vertex(table.next(start_corner));
            let p = table.vertex(table.prev(start_corner));
            traversal.visited_vertices[v.index()] = true;
            traversal.visited_vertices[n.index()] = true;
            traversal.visited_vertices[p.index()] = true;
            traversal.visited_faces[table.face(start_corner).index()] = true;
            traversal.init_corners.push(table.next(start_corner));
            let entry = table.opposite(table.next(start_corner));
            traversal.traverse_from(entry)?;
        } else {
            traversal.process_boundary(table.next(start_corner), true);
            traversal.traverse_from(start_corner)?;
        }
    }

    let num_symbols = traversal.symbols.len();
    buffer.encode_varint(table.num_vertices() as u64)?;
    buffer.encode_varint(table.num_faces() as u64)?;
    buffer.encode_varint(seeds.len() as u64)?;
    buffer.encode_varint(num_symbols as u64)?;
    buffer.encode_varint(traversal.num_split_symbols as u64)?;

    // Handle events: delta-coded symbol ids, then one orientation bit each.
    buffer.encode_varint(traversal.splits.len() as u64)?;
    let mut last_source = 0u32;
    for split in &traversal.splits {
        buffer.encode_varint((split.source_symbol - last_source) as u64)?;
        buffer.encode_varint((split.source_symbol - split.split_symbol) as u64)?;
        last_source = split.source_symbol;
    }
    if !traversal.splits.is_empty() {
        buffer.start_bit_encoding(traversal.splits.len(), false)?;
        for split in &traversal.splits {
            buffer.encode_bits32(1, split.source_on_right as u32)?;
        }
        buffer.end_bit_encoding()?;
    }

    let symbol_ids: Vec<u32> = traversal.symbols.iter().map(|&s| s as u32).collect();
    encode_symbol_sequence(&symbol_ids, CLERS_SYMBOL_BITS, buffer)?;

    let mut config_bits = RansBitEncoder::new();
    for &interior in &traversal.start_configs {
        config_bits.encode_bit(interior);
    }
    config_bits.end_encoding(buffer)?;

    // The decoder's face order: symbol faces in reverse encode order, then
    // the interior start faces in component order.
    let mut corner_order: Vec<CornerIndex> =
        traversal.processed_corners.iter().rev().copied().collect();
    corner_order.extend_from_slice(&traversal.init_corners);

    verify_reconstruction(table, &traversal, &corner_order)?;

    Ok(EncodedConnectivity {
        corner_order,
        num_components: seeds.len(),
    })
}

/// Replays the decoder's reconstruction and checks that each rebuilt face
/// matches the encoder-side face it must correspond to. A mismatch means
/// the two traversals would disagree about attribute order, so the stream
/// is rejected before any attribute data is written.
fn verify_reconstruction(
    table: &CornerTable,
    traversal: &Traversal,
    corner_order: &[CornerIndex],
) -> Result<()> {
    let decode_symbols: Vec<ClersSymbol> =
        traversal.symbols.iter().rev().copied().collect();
    let mut configs = traversal.start_configs.iter();
    let mut next_bit = || -> Result<bool> {
        configs
            .next()
            .copied()
            .ok_or_else(|| internal("start configuration bits exhausted during replay"))
    };
    let rebuilt = rebuild_connectivity(
        &decode_symbols,
        &traversal.splits,
        table.num_faces(),
        table.num_vertices() + traversal.num_split_symbols,
        &mut next_bit,
    )?;

    if rebuilt.num_vertices != table.num_vertices() {
        return Err(internal(format!(
            "reconstruction produced {} vertices, expected {}",
            rebuilt.num_vertices,
            table.num_vertices()
        )));
    }
    if rebuilt.face_vertices.len() != corner_order.len() {
        return Err(internal("reconstruction face count mismatch"));
    }

    let mut decoded_to_original = vec![VertexIndex::INVALID; rebuilt.num_vertices];
    for (decoded_face, &corner) in rebuilt.face_vertices.iter().zip(corner_order) {
        let mut c = corner;
        for &decoded_v in decoded_face {
            let original = table.vertex(c);
            let slot = &mut decoded_to_original[decoded_v as usize];
            if !slot.is_valid() {
                *slot = original;
            } else if *slot != original {
                return Err(internal("traversal correspondence mismatch"));
            }
            c = table.next(c);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder_buffer::DecoderBuffer;
    use crate::edgebreaker_decoder::decode_connectivity;

    fn v(i: u32) -> VertexIndex {
        VertexIndex(i)
    }

    fn roundtrip(faces: &[[VertexIndex; 3]], num_vertices: usize) -> crate::edgebreaker_decoder::DecodedConnectivity {
        let table = CornerTable::from_faces(faces, num_vertices).unwrap();
        let mut buffer = EncoderBuffer::new();
        let out = encode_connectivity(&table, &mut buffer).unwrap();
        assert_eq!(out.corner_order.len(), faces.len());
        let mut dec = DecoderBuffer::new(buffer.data());
        let decoded = decode_connectivity(&mut dec).unwrap();
        assert_eq!(dec.remaining_size(), 0);
        decoded
    }

    fn face_sets(faces: &[[u32; 3]]) -> Vec<Vec<u32>> {
        let mut sets: Vec<Vec<u32>> = faces
            .iter()
            .map(|f| {
                let mut s = f.to_vec();
                s.sort();
                s
            })
            .collect();
        sets.sort();
        sets
    }

    #[test]
    fn single_triangle() {
        let decoded = roundtrip(&[[v(0), v(1), v(2)]], 3);
        assert_eq!(decoded.num_points, 3);
        assert_eq!(decoded.faces.len(), 1);
    }

    #[test]
    fn quad_preserves_topology() {
        let decoded = roundtrip(&[[v(0), v(1), v(2)], [v(0), v(2), v(3)]], 4);
        assert_eq!(decoded.num_points, 4);
        let sets = face_sets(&decoded.faces);
        // Two triangles sharing exactly one edge.
        let shared: Vec<u32> = sets[0].iter().filter(|x| sets[1].contains(x)).copied().collect();
        assert_eq!(shared.len(), 2);
    }

    #[test]
    fn closed_tetrahedron() {
        let decoded = roundtrip(
            &[
                [v(0), v(1), v(2)],
                [v(0), v(2), v(3)],
                [v(0), v(3), v(1)],
                [v(1), v(3), v(2)],
            ],
            4,
        );
        assert_eq!(decoded.num_points, 4);
        assert_eq!(decoded.faces.len(), 4);
        // Every edge of a closed tetrahedron is shared by two faces.
        let mut edge_counts: std::collections::HashMap<(u32, u32), u32> = Default::default();
        for f in &decoded.faces {
            for k in 0..3 {
                let a = f[k];
                let b = f[(k + 1) % 3];
                *edge_counts.entry((a.min(b), a.max(b))).or_default() += 1;
            }
        }
        assert!(edge_counts.values().all(|&c| c == 2));
        assert_eq!(edge_counts.len(), 6);
    }

    #[test]
    fn two_components() {
        let decoded = roundtrip(
            &[[v(0), v(1), v(2)], [v(3), v(4), v(5)]],
            6,
        );
        assert_eq!(decoded.num_points, 6);
        assert_eq!(decoded.faces.len(), 2);
        // The components must not share vertices.
        let sets = face_sets(&decoded.faces);
        assert!(sets[0].iter().all(|x| !sets[1].contains(x)));
    }

    #[test]
    fn torus_with_handle() {
        // A 3x3 torus grid: 9 vertices, 18 faces, genus 1. Exercises the
        // topology split events.
        let n = 3u32;
        let mut faces = Vec::new();
        for y in 0..n {
            for x in 0..n {
                let a = y * n + x;
                let b = y * n + (x + 1) % n;
                let c = ((y + 1) % n) * n + x;
                let d = ((y + 1) % n) * n + (x + 1) % n;
                faces.push([v(a), v(b), v(d)]);
                faces.push([v(a), v(d), v(c)]);
            }
        }
        let decoded = roundtrip(&faces, 9);
        assert_eq!(decoded.num_points, 9);
        assert_eq!(decoded.faces.len(), 18);
        // Closed surface: every edge shared by exactly two faces.
        let mut edge_counts: std::collections::HashMap<(u32, u32), u32> = Default::default();
        for f in &decoded.faces {
            for k in 0..3 {
                let a = f[k];
                let b = f[(k + 1) % 3];
                *edge_counts.entry((a.min(b), a.max(b))).or_default() += 1;
            }
        }
        assert!(edge_counts.values().all(|&c| c == 2));
        assert_eq!(edge_counts.len(), 27);
    }

    #[test]
    fn strip_with_boundary() {
        // A 6-triangle strip, all boundary vertices.
        let faces = [
            [v(0), v(1), v(2)],
            [v(2), v(1), v(3)],
            [v(2), v(3), v(4)],
            [v(4), v(3), v(5)],
            [v(4), v(5), v(6)],
            [v(6), v(5), v(7)],
        ];
        let decoded = roundtrip(&faces, 8);
        assert_eq!(decoded.num_points, 8);
        assert_eq!(decoded.faces.len(), 6);
    }

    #[test]
    fn grid_with_inner_hole() {
        // A 4x4 vertex grid with the two centre faces removed: an annulus
        // with an outer and an inner boundary loop.
        let n = 4u32;
        let mut faces = Vec::new();
        for y in 0..n - 1 {
            for x in 0..n - 1 {
                if x == 1 && y == 1 {
                    continue;
                }
                let a = y * n + x;
                let b = a + 1;
                let c = a + n;
                let d = c + 1;
                faces.push([v(a), v(b), v(d)]);
                faces.push([v(a), v(d), v(c)]);
            }
        }
        let decoded = roundtrip(&faces, 16);
        assert_eq!(decoded.num_points, 16);
        assert_eq!(decoded.faces.len(), 16);
        // Interior edges are shared by exactly two faces, boundary edges
        // (outer ring + the four-edge hole) by one.
        let mut edge_counts: std::collections::HashMap<(u32, u32), u32> = Default::default();
        for f in &decoded.faces {
            for k in 0..3 {
                let a = f[k];
                let b = f[(k + 1) % 3];
                *edge_counts.entry((a.min(b), a.max(b))).or_default() += 1;
            }
        }
        let boundary_edges = edge_counts.values().filter(|&&c| c == 1).count();
        assert_eq!(boundary_edges, 12 + 4);
    }

    #[test]
    fn symbol_count_equals_face_count_for_open_meshes() {
        let faces = [[v(0), v(1), v(2)], [v(0), v(2), v(3)]];
        let table = CornerTable::from_faces(&faces, 4).unwrap();
        let mut buffer = EncoderBuffer::new();
        encode_connectivity(&table, &mut buffer).unwrap();
        let mut dec = DecoderBuffer::new(buffer.data());
        assert_eq!(dec.decode_varint().unwrap(), 4); // points
        assert_eq!(dec.decode_varint().unwrap(), 2); // faces
        assert_eq!(dec.decode_varint().unwrap(), 1); // components
        assert_eq!(dec.decode_varint().unwrap(), 2); // symbols == faces
    }
}
