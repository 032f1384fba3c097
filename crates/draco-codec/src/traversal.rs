//! Deterministic depth-first sequencing of vertices for attribute coding.
//!
//! Encoder and decoder run this exact traversal over their corner tables,
//! starting from corresponding corners, so the i-th visited vertex on one
//! side matches the i-th on the other. The visit order also drives the
//! prediction schemes: an entry may only be predicted from entries with a
//! smaller sequence position.

use crate::corner_table::CornerTable;
use crate::indices::{CornerIndex, VertexIndex};

#[derive(Debug, Default)]
pub(crate) struct TraversalSequence {
    /// Vertex visited at each data position.
    pub vertices: Vec<VertexIndex>,
    /// Corner at which each data position's vertex was first reached.
    pub corners: Vec<CornerIndex>,
    /// Inverse map: vertex id -> data position, -1 while unvisited.
    pub vertex_to_data: Vec<i32>,
}

impl TraversalSequence {
    fn visit(&mut self, v: VertexIndex, c: CornerIndex) {
        if !v.is_valid() || self.vertex_to_data[v.index()] >= 0 {
            return;
        }
        self.vertex_to_data[v.index()] = self.vertices.len() as i32;
        self.vertices.push(v);
        self.corners.push(c);
    }
}

/// Depth-first traversal seeded from `corner_order`, one entry per
/// connectivity face in its canonical order.
pub(crate) fn sequence_vertices(
    table: &CornerTable,
    corner_order: &[CornerIndex],
) -> TraversalSequence {
    let mut seq = TraversalSequence {
        vertices: Vec::with_capacity(table.num_vertices()),
        corners: Vec::with_capacity(table.num_vertices()),
        vertex_to_data: vec![-1; table.num_vertices()],
    };
    let mut visited_faces = vec![false; table.num_faces()];
    let mut stack: Vec<CornerIndex> = Vec::new();

    let face_visited = |visited: &[bool], c: CornerIndex| -> bool {
        !c.is_valid() || visited[c.index() / 3]
    };

    for &start in corner_order {
        if face_visited(&visited_faces, start) {
            continue;
        }

        stack.clear();
        stack.push(start);
        seq.visit(table.vertex(table.next(start)), table.next(start));
        seq.visit(table.vertex(table.prev(start)), table.prev(start));

        while let Some(&top) = stack.last() {
            if face_visited(&visited_faces, top) {
                stack.pop();
                continue;
            }
            let mut corner = top;
            loop {
                if visited_faces[corner.index() / 3] {
                    break;
                }
                visited_faces[corner.index() / 3] = true;

                let v = table.vertex(corner);
                if seq.vertex_to_data[v.index()] < 0 {
                    let on_boundary = table.is_vertex_on_boundary(v);
                    seq.visit(v, corner);
                    if !on_boundary {
                        corner = table.right_corner(corner);
                        continue;
                    }
                }

                let right = table.right_corner(corner);
                let left = table.left_corner(corner);
                let right_visited = face_visited(&visited_faces, right);
                let left_visited = face_visited(&visited_faces, left);
                if right_visited {
                    if left_visited {
                        stack.pop();
                        break;
                    }
                    corner = left;
                } else if left_visited {
                    corner = right;
                } else {
                    *stack.last_mut().unwrap() = left;
                    stack.push(right);
                    break;
                }
            }
        }
    }
    seq
}
