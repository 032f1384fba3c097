//! Half-edge connectivity over a triangle face list.
//!
//! For corner c: `next(c) = 3*(c/3) + (c+1)%3`, `prev(c) = 3*(c/3) +
//! (c+2)%3`, `face(c) = c/3`. Opposites are found by grouping corners by
//! the unordered key of the edge opposite each corner; an edge shared by
//! more than two corners makes the mesh non-manifold.

use crate::error::{invalid_parameter, CodecError, Result};
use crate::indices::{CornerIndex, FaceIndex, VertexIndex};
use std::collections::hash_map::Entry;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct CornerTable {
    corner_to_vertex: Vec<VertexIndex>,
    opposites: Vec<CornerIndex>,
    // Left-most corner of each vertex (any corner for interior vertices).
    vertex_corners: Vec<CornerIndex>,
    vertex_on_boundary: Vec<bool>,
    num_isolated_vertices: usize,
}

#[derive(Clone, Copy)]
enum EdgeSlot {
    Unpaired(CornerIndex),
    Paired,
}

impl CornerTable {
    /// Builds the table. Degenerate faces are rejected with
    /// `InvalidParameter`; non-manifold edges and vertices with
    /// `NonManifold`.
    pub fn from_faces(faces: &[[VertexIndex; 3]], num_vertices: usize) -> Result<Self> {
        let num_corners = faces.len() * 3;
        let mut corner_to_vertex = Vec::with_capacity(num_corners);
        for (face_id, face) in faces.iter().enumerate() {
            if face[0] == face[1] || face[1] == face[2] || face[2] == face[0] {
                return Err(invalid_parameter(format!("face {face_id} is degenerate")));
            }
            for &v in face {
                if v.index() >= num_vertices {
                    return Err(invalid_parameter(format!(
                        "face {face_id} references vertex {} out of range",
                        v.0
                    )));
                }
                corner_to_vertex.push(v);
            }
        }

        let mut table = Self {
            corner_to_vertex,
            opposites: vec![CornerIndex::INVALID; num_corners],
            vertex_corners: vec![CornerIndex::INVALID; num_vertices],
            vertex_on_boundary: vec![false; num_vertices],
            num_isolated_vertices: 0,
        };
        table.compute_opposites()?;
        table.compute_vertex_corners()?;
        Ok(table)
    }

    fn compute_opposites(&mut self) -> Result<()> {
        let mut edge_map: HashMap<(u32, u32), EdgeSlot> =
            HashMap::with_capacity(self.num_corners());
        for c in 0..self.num_corners() {
            let corner = CornerIndex(c as u32);
            let a = self.vertex(self.next(corner)).0;
            let b = self.vertex(self.prev(corner)).0;
            let key = (a.min(b), a.max(b));
            match edge_map.entry(key) {
                Entry::Vacant(slot) => {
                    slot.insert(EdgeSlot::Unpaired(corner));
                }
                Entry::Occupied(mut slot) => match *slot.get() {
                    EdgeSlot::Unpaired(other) => {
                        self.opposites[corner.index()] = other;
                        self.opposites[other.index()] = corner;
                        *slot.get_mut() = EdgeSlot::Paired;
                    }
                    EdgeSlot::Paired => return Err(CodecError::NonManifold),
                },
            }
        }
        // Remaining unpaired edges are boundary.
        for c in 0..self.num_corners() {
            let corner = CornerIndex(c as u32);
            if !self.opposite(corner).is_valid() {
                let a = self.vertex(self.next(corner));
                let b = self.vertex(self.prev(corner));
                self.vertex_on_boundary[a.index()] = true;
                self.vertex_on_boundary[b.index()] = true;
            }
        }
        Ok(())
    }

    /// Assigns each vertex its left-most corner, walking every fan. A
    /// vertex whose corners form more than one fan is non-manifold.
    fn compute_vertex_corners(&mut self) -> Result<()> {
        let mut visited_vertices = vec![false; self.num_vertices()];
        let mut visited_corners = vec![false; self.num_corners()];

        for c in 0..self.num_corners() {
            let corner = CornerIndex(c as u32);
            if visited_corners[c] {
                continue;
            }
            let v = self.vertex(corner);
            if visited_vertices[v.index()] {
                // Second disjoint fan around the same vertex.
                return Err(CodecError::NonManifold);
            }
            visited_vertices[v.index()] = true;

            // Swing left to the fan end (or full circle), marking corners.
            let mut act = corner;
            loop {
                visited_corners[act.index()] = true;
                self.vertex_corners[v.index()] = act;
                let next = self.swing_left(act);
                if next.is_valid() && next != corner && visited_corners[next.index()] {
                    // Orientation fold: the fan revisits a corner without
                    // closing the circle.
                    return Err(CodecError::NonManifold);
                }
                if next == corner || !next.is_valid() {
                    if !next.is_valid() {
                        // Open fan: also mark the corners right of the start.
                        let mut right = self.swing_right(corner);
                        while right.is_valid() && right != corner {
                            visited_corners[right.index()] = true;
                            right = self.swing_right(right);
                        }
                    }
                    break;
                }
                act = next;
            }
        }

        self.num_isolated_vertices = visited_vertices.iter().filter(|&&v| !v).count();
        Ok(())
    }

    pub fn num_corners(&self) -> usize {
        self.corner_to_vertex.len()
    }

    pub fn num_faces(&self) -> usize {
        self.corner_to_vertex.len() / 3
    }

    pub fn num_vertices(&self) -> usize {
        self.vertex_corners.len()
    }

    pub fn num_isolated_vertices(&self) -> usize {
        self.num_isolated_vertices
    }

    #[inline]
    pub fn next(&self, c: CornerIndex) -> CornerIndex {
        if !c.is_valid() {
            return c;
        }
        if c.0 % 3 == 2 {
            CornerIndex(c.0 - 2)
        } else {
            CornerIndex(c.0 + 1)
        }
    }

    #[inline]
    pub fn prev(&self, c: CornerIndex) -> CornerIndex {
        if !c.is_valid() {
            return c;
        }
        if c.0 % 3 == 0 {
            CornerIndex(c.0 + 2)
        } else {
            CornerIndex(c.0 - 1)
        }
    }

    #[inline]
    pub fn vertex(&self, c: CornerIndex) -> VertexIndex {
        if !c.is_valid() {
            return VertexIndex::INVALID;
        }
        self.corner_to_vertex[c.index()]
    }

    #[inline]
    pub fn face(&self, c: CornerIndex) -> FaceIndex {
        if !c.is_valid() {
            return FaceIndex::INVALID;
        }
        FaceIndex(c.0 / 3)
    }

    #[inline]
    pub fn first_corner(&self, f: FaceIndex) -> CornerIndex {
        CornerIndex(f.0 * 3)
    }

    #[inline]
    pub fn opposite(&self, c: CornerIndex) -> CornerIndex {
        if !c.is_valid() {
            return c;
        }
        self.opposites[c.index()]
    }

    #[inline]
    pub fn left_corner(&self, c: CornerIndex) -> CornerIndex {
        self.opposite(self.prev(c))
    }

    #[inline]
    pub fn right_corner(&self, c: CornerIndex) -> CornerIndex {
        self.opposite(self.next(c))
    }

    #[inline]
    pub fn swing_left(&self, c: CornerIndex) -> CornerIndex {
        self.prev(self.opposite(self.prev(c)))
    }

    #[inline]
    pub fn swing_right(&self, c: CornerIndex) -> CornerIndex {
        self.next(self.opposite(self.next(c)))
    }

    /// Any corner attached to the vertex (the left-most one).
    pub fn left_most_corner(&self, v: VertexIndex) -> CornerIndex {
        self.vertex_corners
            .get(v.index())
            .copied()
            .unwrap_or(CornerIndex::INVALID)
    }

    pub fn is_vertex_on_boundary(&self, v: VertexIndex) -> bool {
        self.vertex_on_boundary.get(v.index()).copied().unwrap_or(true)
    }

    /// True when the edge opposite `c` has no adjacent face.
    pub fn is_boundary_edge(&self, c: CornerIndex) -> bool {
        !self.opposite(c).is_valid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(i: u32) -> VertexIndex {
        VertexIndex(i)
    }

    #[test]
    fn quad_opposites_are_symmetric() {
        let faces = [[v(0), v(1), v(2)], [v(0), v(2), v(3)]];
        let table = CornerTable::from_faces(&faces, 4).unwrap();
        let mut paired = 0;
        for c in 0..table.num_corners() {
            let corner = CornerIndex(c as u32);
            let opp = table.opposite(corner);
            if opp.is_valid() {
                paired += 1;
                assert_eq!(table.opposite(opp), corner);
                // Shared edge endpoints agree.
                let e1 = {
                    let a = table.vertex(table.next(corner)).0;
                    let b = table.vertex(table.prev(corner)).0;
                    (a.min(b), a.max(b))
                };
                let e2 = {
                    let a = table.vertex(table.next(opp)).0;
                    let b = table.vertex(table.prev(opp)).0;
                    (a.min(b), a.max(b))
                };
                assert_eq!(e1, e2);
            }
        }
        assert_eq!(paired, 2);
        // All four vertices touch the boundary of the quad.
        for i in 0..4 {
            assert!(table.is_vertex_on_boundary(v(i)));
        }
    }

    #[test]
    fn interior_vertex_is_not_on_boundary() {
        // A fan of four triangles closed around vertex 0 (an octahedron
        // top half plus bottom cap would be needed for a fully interior
        // vertex; use a closed tetrahedron instead).
        let faces = [
            [v(0), v(1), v(2)],
            [v(0), v(2), v(3)],
            [v(0), v(3), v(1)],
            [v(1), v(3), v(2)],
        ];
        let table = CornerTable::from_faces(&faces, 4).unwrap();
        for i in 0..4 {
            assert!(!table.is_vertex_on_boundary(v(i)));
        }
        for c in 0..table.num_corners() {
            assert!(table.opposite(CornerIndex(c as u32)).is_valid());
        }
    }

    #[test]
    fn non_manifold_edge_is_rejected() {
        // Three faces sharing the edge (0, 1).
        let faces = [
            [v(0), v(1), v(2)],
            [v(1), v(0), v(3)],
            [v(0), v(1), v(4)],
        ];
        assert_eq!(
            CornerTable::from_faces(&faces, 5).unwrap_err(),
            CodecError::NonManifold
        );
    }

    #[test]
    fn bowtie_vertex_is_rejected() {
        // Two triangles joined only at vertex 0.
        let faces = [[v(0), v(1), v(2)], [v(0), v(3), v(4)]];
        assert_eq!(
            CornerTable::from_faces(&faces, 5).unwrap_err(),
            CodecError::NonManifold
        );
    }

    #[test]
    fn degenerate_face_is_rejected() {
        let faces = [[v(0), v(0), v(1)]];
        assert!(matches!(
            CornerTable::from_faces(&faces, 2),
            Err(CodecError::InvalidParameter(_))
        ));
    }

    #[test]
    fn isolated_vertices_are_counted() {
        let faces = [[v(0), v(1), v(2)]];
        let table = CornerTable::from_faces(&faces, 5).unwrap();
        assert_eq!(table.num_isolated_vertices(), 2);
    }

    #[test]
    fn swings_walk_the_fan() {
        let faces = [[v(0), v(1), v(2)], [v(0), v(2), v(3)]];
        let table = CornerTable::from_faces(&faces, 4).unwrap();
        // Corner 0 has vertex 0; swinging right crosses the shared edge.
        let c0 = CornerIndex(0);
        assert_eq!(table.vertex(c0), v(0));
        let swung = table.swing_right(c0);
        assert!(swung.is_valid());
        assert_eq!(table.vertex(swung), v(0));
        assert_ne!(table.face(swung), table.face(c0));
    }
}
